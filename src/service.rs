//! Board aggregation with a fetch-or-cache policy
//!
//! The `BoardService` assembles boards from their upstream parts and keeps the
//! result in a `CacheManager` keyed by board id. Within the freshness window a
//! board is served from memory unless the caller forces a refresh.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cache::{CacheManager, EntryInfo};
use crate::data::{
    Action, ActivityResponse, BoardData, BoardSource, BoardsResponse, HealthStatus, TrelloError,
};

/// Prefix of every board cache key
pub const CACHE_KEY_PREFIX: &str = "board_data_";

/// Errors returned by the board service
#[derive(Debug, Error)]
pub enum BoardError {
    /// The board does not exist or is not visible with the configured credentials
    #[error("Board not found or not accessible: {0}")]
    NotFound(String),

    /// A multi-board request named no boards
    #[error("No board IDs provided")]
    NoBoardIds,

    /// Talking to Trello failed
    #[error(transparent)]
    Upstream(#[from] TrelloError),
}

/// A value together with where it came from
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Fetched<T> {
    #[serde(flatten)]
    pub data: T,
    /// Whether the value was served from the cache
    pub from_cache: bool,
}

/// Returns the cache key for a board
pub fn cache_key(board_id: &str) -> String {
    format!("{}{}", CACHE_KEY_PREFIX, board_id)
}

/// Serves aggregated boards, consulting the cache before going upstream
pub struct BoardService<S> {
    source: Arc<S>,
    cache: CacheManager<BoardData>,
}

impl<S> Clone for BoardService<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            cache: self.cache.clone(),
        }
    }
}

impl<S: BoardSource> BoardService<S> {
    /// Creates a service fetching from `source` and caching into `cache`
    pub fn new(source: S, cache: CacheManager<BoardData>) -> Self {
        Self {
            source: Arc::new(source),
            cache,
        }
    }

    /// The cache this service reads and writes
    pub fn cache(&self) -> &CacheManager<BoardData> {
        &self.cache
    }

    /// Fetches one board
    ///
    /// A fresh cached copy is returned unless `force_refresh` is set. Anything
    /// fetched from upstream is written back to the cache.
    ///
    /// # Arguments
    /// * `board_id` - The Trello board identifier
    /// * `force_refresh` - Skip the cache and always go upstream
    ///
    /// # Returns
    /// * `Ok(Fetched<BoardData>)` with `from_cache` telling where it came from
    /// * `Err(BoardError::NotFound)` if the board is missing or not accessible
    /// * `Err(BoardError::Upstream)` if talking to Trello failed
    pub async fn board(
        &self,
        board_id: &str,
        force_refresh: bool,
    ) -> Result<Fetched<BoardData>, BoardError> {
        let key = cache_key(board_id);

        if !force_refresh {
            if let Some(board) = self.cache.get(&key) {
                debug!(board_id, "board cache hit");
                return Ok(Fetched {
                    data: board,
                    from_cache: true,
                });
            }
            debug!(board_id, "board cache miss");
        }

        let board = self.fetch_board(board_id).await?;
        self.cache.set(key, board.clone());

        Ok(Fetched {
            data: board,
            from_cache: false,
        })
    }

    /// Fetches several boards, skipping any that are missing or hidden
    ///
    /// # Arguments
    /// * `board_ids` - Boards to fetch, in the order they should be returned
    /// * `force_refresh` - Skip the cache for every board
    ///
    /// # Returns
    /// * `Ok(BoardsResponse)` with the boards found; `from_cache` is true only
    ///   when every one of them was a cache hit
    /// * `Err(BoardError::NoBoardIds)` if `board_ids` is empty
    /// * `Err(BoardError::Upstream)` if talking to Trello failed
    pub async fn boards(
        &self,
        board_ids: &[String],
        force_refresh: bool,
    ) -> Result<BoardsResponse, BoardError> {
        if board_ids.is_empty() {
            return Err(BoardError::NoBoardIds);
        }

        let mut pending = Vec::with_capacity(board_ids.len());
        for board_id in board_ids {
            pending.push(self.board(board_id, force_refresh));
        }
        let results = join_all(pending).await;

        let mut boards = Vec::with_capacity(board_ids.len());
        let mut from_cache = true;
        for (board_id, result) in board_ids.iter().zip(results) {
            match result {
                Ok(fetched) => {
                    from_cache &= fetched.from_cache;
                    boards.push(fetched.data);
                }
                Err(BoardError::NotFound(_)) => {
                    warn!(board_id = %board_id, "Skipping board that is missing or not accessible");
                }
                Err(e) => return Err(e),
            }
        }

        Ok(BoardsResponse {
            from_cache: from_cache && !boards.is_empty(),
            boards,
            timestamp: Utc::now(),
            cache_info: self.cache.info(),
        })
    }

    /// Recent activity across several boards, most recent first
    ///
    /// Activity is never cached since it depends on `since`.
    pub async fn activity(
        &self,
        board_ids: &[String],
        since: Option<DateTime<Utc>>,
    ) -> Result<ActivityResponse, BoardError> {
        if board_ids.is_empty() {
            return Err(BoardError::NoBoardIds);
        }

        let mut pending = Vec::with_capacity(board_ids.len());
        for board_id in board_ids {
            pending.push(self.board_activity(board_id, since));
        }
        let per_board = join_all(pending).await;

        let mut activities = Vec::new();
        for actions in per_board {
            activities.extend(actions?);
        }
        activities.sort_by(|a, b| b.date.cmp(&a.date));

        Ok(ActivityResponse {
            activities,
            timestamp: Utc::now(),
        })
    }

    /// Snapshot of the board cache
    pub fn cache_info(&self) -> BTreeMap<String, EntryInfo> {
        self.cache.info()
    }

    /// Drops one board from the cache, or all of them
    pub fn clear_cache(&self, board_id: Option<&str>) {
        match board_id {
            Some(board_id) => {
                self.cache.clear(Some(&cache_key(board_id)));
                info!(board_id, "Cleared cached board");
            }
            None => {
                self.cache.clear(None);
                info!("Cleared board cache");
            }
        }
    }

    /// Liveness report
    pub fn health(&self) -> HealthStatus {
        HealthStatus {
            status: "healthy",
            timestamp: Utc::now(),
        }
    }

    /// Fetches a board's parts and assembles them
    async fn fetch_board(&self, board_id: &str) -> Result<BoardData, BoardError> {
        let info = self
            .source
            .board_info(board_id)
            .await?
            .ok_or_else(|| BoardError::NotFound(board_id.to_string()))?;

        let (cards, lists, actions) = futures::try_join!(
            self.source.cards(board_id),
            self.source.lists(board_id),
            self.source.actions(board_id, None)
        )?;

        debug!(
            board_id,
            cards = cards.len(),
            lists = lists.len(),
            actions = actions.len(),
            "Fetched board from upstream"
        );
        Ok(BoardData::assemble(board_id, info, cards, lists, actions))
    }

    /// Actions for one board, tagged with the board's id and name
    ///
    /// Boards that are missing or hidden contribute nothing.
    async fn board_activity(
        &self,
        board_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Action>, BoardError> {
        let board_name = match self.cache.get(&cache_key(board_id)) {
            Some(board) => board.name,
            None => match self.source.board_info(board_id).await? {
                Some(info) => info.name,
                None => {
                    warn!(board_id, "Skipping activity for board that is missing or not accessible");
                    return Ok(Vec::new());
                }
            },
        };

        let mut actions = self.source.actions(board_id, since).await?;
        for action in &mut actions {
            action.board_name = Some(board_name.clone());
            action.board_id = Some(board_id.to_string());
        }
        Ok(actions)
    }
}
