//! Trello REST API client
//!
//! Fetches board details, cards, lists and the activity feed. Credentials are
//! optional: without them only public boards are reachable.

use std::future::Future;

use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use super::{Action, BoardInfo, BoardList, Card};

/// Base URL for the Trello API
pub const TRELLO_BASE_URL: &str = "https://api.trello.com/1";

/// Maximum number of actions requested per board
const ACTIONS_LIMIT: u32 = 100;

const BOARD_FIELDS: &str = "name,desc,url,dateLastActivity";
const CARD_FIELDS: &str = "name,desc,dateLastActivity,due,labels,idList";
const LIST_FIELDS: &str = "name,id";

/// Errors that can occur when talking to Trello
#[derive(Debug, Error)]
pub enum TrelloError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Failed to parse JSON response
    #[error("Failed to parse JSON response: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Upstream source of board data
///
/// The board service fetches through this trait so it can run against the live
/// API or an in-memory source.
pub trait BoardSource: Send + Sync {
    /// Basic board fields, or `None` if the board is missing or not accessible
    fn board_info(
        &self,
        board_id: &str,
    ) -> impl Future<Output = Result<Option<BoardInfo>, TrelloError>> + Send;

    /// All open cards on the board
    fn cards(&self, board_id: &str) -> impl Future<Output = Result<Vec<Card>, TrelloError>> + Send;

    /// All lists on the board
    fn lists(
        &self,
        board_id: &str,
    ) -> impl Future<Output = Result<Vec<BoardList>, TrelloError>> + Send;

    /// Recent actions, optionally only those after `since`
    fn actions(
        &self,
        board_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> impl Future<Output = Result<Vec<Action>, TrelloError>> + Send;
}

/// Connection settings for the Trello API
#[derive(Debug, Clone)]
pub struct TrelloConfig {
    pub api_key: Option<String>,
    pub api_token: Option<String>,
    pub base_url: String,
}

impl Default for TrelloConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_token: None,
            base_url: TRELLO_BASE_URL.to_string(),
        }
    }
}

impl TrelloConfig {
    /// Returns the key and token if both are set
    fn credentials(&self) -> Option<(&str, &str)> {
        match (self.api_key.as_deref(), self.api_token.as_deref()) {
            (Some(key), Some(token)) if !key.is_empty() && !token.is_empty() => Some((key, token)),
            _ => None,
        }
    }

    /// Whether requests will be authenticated
    pub fn has_credentials(&self) -> bool {
        self.credentials().is_some()
    }
}

/// Client for fetching board data from the Trello API
#[derive(Debug, Clone)]
pub struct TrelloClient {
    /// HTTP client for making requests
    http_client: Client,
    config: TrelloConfig,
}

impl Default for TrelloClient {
    fn default() -> Self {
        Self::new(TrelloConfig::default())
    }
}

impl TrelloClient {
    /// Creates a new TrelloClient
    pub fn new(config: TrelloConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    /// Creates a new TrelloClient with a custom HTTP client
    pub fn with_client(http_client: Client, config: TrelloConfig) -> Self {
        Self {
            http_client,
            config,
        }
    }

    /// URL of a board, or of one of its sub-resources
    fn endpoint(&self, board_id: &str, resource: Option<&str>) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        match resource {
            Some(resource) => format!("{}/boards/{}/{}", base, board_id, resource),
            None => format!("{}/boards/{}", base, board_id),
        }
    }

    /// Query parameters for a request, with credentials appended when configured
    fn query<'a>(&'a self, params: &[(&'a str, String)]) -> Vec<(&'a str, String)> {
        let mut query = params.to_vec();
        if let Some((key, token)) = self.config.credentials() {
            query.push(("key", key.to_string()));
            query.push(("token", token.to_string()));
        }
        query
    }

    /// Issues a GET request and parses the body
    ///
    /// Returns `Ok(None)` for non-success statuses.
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<Option<T>, TrelloError> {
        debug!(url, "requesting");
        let response = self
            .http_client
            .get(url)
            .query(&self.query(params))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            debug!(url, %status, "upstream returned non-success status");
            return Ok(None);
        }

        let text = response.text().await?;
        Ok(Some(serde_json::from_str(&text)?))
    }
}

impl BoardSource for TrelloClient {
    async fn board_info(&self, board_id: &str) -> Result<Option<BoardInfo>, TrelloError> {
        let url = self.endpoint(board_id, None);
        self.get_json(&url, &[("fields", BOARD_FIELDS.to_string())])
            .await
    }

    async fn cards(&self, board_id: &str) -> Result<Vec<Card>, TrelloError> {
        let url = self.endpoint(board_id, Some("cards"));
        let cards: Option<Vec<Card>> = self
            .get_json(&url, &[("fields", CARD_FIELDS.to_string())])
            .await?;
        Ok(cards.unwrap_or_default())
    }

    async fn lists(&self, board_id: &str) -> Result<Vec<BoardList>, TrelloError> {
        let url = self.endpoint(board_id, Some("lists"));
        let lists: Option<Vec<BoardList>> = self
            .get_json(&url, &[("fields", LIST_FIELDS.to_string())])
            .await?;
        Ok(lists.unwrap_or_default())
    }

    async fn actions(
        &self,
        board_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Action>, TrelloError> {
        let url = self.endpoint(board_id, Some("actions"));
        let actions: Option<Vec<Action>> = self.get_json(&url, &actions_params(since)).await?;
        Ok(actions.unwrap_or_default())
    }
}

/// Query parameters for the activity feed
fn actions_params(since: Option<DateTime<Utc>>) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("filter", "all".to_string()),
        ("limit", ACTIONS_LIMIT.to_string()),
    ];
    if let Some(since) = since {
        params.push(("since", since.to_rfc3339_opts(SecondsFormat::Millis, true)));
    }
    params
}
