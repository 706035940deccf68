//! Core data models for boardpulse
//!
//! This module contains the board, list, card and activity types read from the
//! Trello API, plus the aggregated records the service hands back to callers.

pub mod trello;

pub use trello::{BoardSource, TrelloClient, TrelloConfig, TrelloError, TRELLO_BASE_URL};

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cache::EntryInfo;

/// List name given to cards whose list could not be resolved
pub const UNKNOWN_LIST_NAME: &str = "Unknown";

/// Basic board fields returned by `GET /boards/{id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardInfo {
    /// Board identifier
    #[serde(default)]
    pub id: String,
    /// Board title
    pub name: String,
    /// Board description
    #[serde(default)]
    pub desc: String,
    /// Link to the board
    pub url: String,
    /// Last time anything happened on the board
    #[serde(default)]
    pub date_last_activity: Option<DateTime<Utc>>,
}

/// A label attached to a card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Colour name, absent for colourless labels
    #[serde(default)]
    pub color: Option<String>,
}

/// A card on a board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub date_last_activity: Option<DateTime<Utc>>,
    /// Due date, if one is set
    #[serde(default)]
    pub due: Option<DateTime<Utc>>,
    #[serde(default)]
    pub labels: Vec<Label>,
    /// Identifier of the list holding the card
    #[serde(default)]
    pub id_list: Option<String>,
    /// Name of the list holding the card, filled in during aggregation
    #[serde(default)]
    pub list_name: String,
}

/// A list (column) on a board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardList {
    pub id: String,
    pub name: String,
}

/// The member who performed an action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberCreator {
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub full_name: String,
}

/// An entry in a board's activity feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub id: String,
    /// Action type, e.g. `createCard` or `updateCard`
    #[serde(rename = "type")]
    pub kind: String,
    pub date: DateTime<Utc>,
    /// Action payload; its shape depends on the action type
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub member_creator: Option<MemberCreator>,
    /// Name of the board the action belongs to, set for cross-board activity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub board_name: Option<String>,
    /// Identifier of the board the action belongs to, set for cross-board activity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub board_id: Option<String>,
}

/// Summary counts for an aggregated board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardStats {
    pub total_cards: usize,
    pub total_lists: usize,
    pub recent_actions: usize,
}

/// Everything known about a single board, as cached and returned by the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardData {
    pub id: String,
    pub name: String,
    pub description: String,
    pub url: String,
    pub last_activity: Option<DateTime<Utc>>,
    pub cards: Vec<Card>,
    pub lists: Vec<BoardList>,
    pub actions: Vec<Action>,
    pub stats: BoardStats,
}

impl BoardData {
    /// Combines the separately fetched parts of a board into one record
    ///
    /// Each card gets the name of its list, or `"Unknown"` if the list is not
    /// among `lists`.
    pub fn assemble(
        board_id: &str,
        info: BoardInfo,
        mut cards: Vec<Card>,
        lists: Vec<BoardList>,
        actions: Vec<Action>,
    ) -> Self {
        let list_names: HashMap<&str, &str> = lists
            .iter()
            .map(|list| (list.id.as_str(), list.name.as_str()))
            .collect();

        for card in &mut cards {
            card.list_name = card
                .id_list
                .as_deref()
                .and_then(|id| list_names.get(id))
                .unwrap_or(&UNKNOWN_LIST_NAME)
                .to_string();
        }

        let stats = BoardStats {
            total_cards: cards.len(),
            total_lists: lists.len(),
            recent_actions: actions.len(),
        };

        Self {
            id: board_id.to_string(),
            name: info.name,
            description: info.desc,
            url: info.url,
            last_activity: info.date_last_activity,
            cards,
            lists,
            actions,
            stats,
        }
    }
}

/// Response for a multi-board request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardsResponse {
    pub boards: Vec<BoardData>,
    pub timestamp: DateTime<Utc>,
    /// True when every returned board was served from the cache
    pub from_cache: bool,
    pub cache_info: BTreeMap<String, EntryInfo>,
}

/// Merged activity across several boards, most recent first
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityResponse {
    pub activities: Vec<Action>,
    pub timestamp: DateTime<Utc>,
}

/// Liveness report
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
}
