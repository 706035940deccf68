//! Periodic board refresh
//!
//! Polls a fixed set of boards on an interval in a background task and reports
//! each round over a tokio channel. Rounds go through the board service, so the
//! upstream API is only hit once a board's cached copy has expired.

use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

use crate::data::{BoardSource, BoardsResponse};
use crate::service::BoardService;

/// Shortest period between rounds; tokio's interval rejects a zero period
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Messages sent from the watch task to its owner
#[derive(Debug, Clone)]
pub enum WatchMessage {
    /// A refresh round finished
    BoardsUpdated(BoardsResponse),
    /// A refresh round failed
    WatchError(String),
}

/// Configuration for the watch loop
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Boards to poll
    pub board_ids: Vec<String>,
    /// Time between refresh rounds
    pub interval: Duration,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            board_ids: Vec::new(),
            interval: Duration::from_secs(300), // 5 minutes
        }
    }
}

/// Handle for controlling the watch task
pub struct WatchHandle {
    /// Channel for receiving watch messages
    pub receiver: mpsc::Receiver<WatchMessage>,
    /// Flag to signal shutdown
    shutdown_tx: mpsc::Sender<()>,
}

impl WatchHandle {
    /// Spawns the watch task
    ///
    /// The first round runs immediately. The task stops on `shutdown`, or once
    /// the handle has been dropped.
    ///
    /// # Arguments
    /// * `service` - The board service to poll through
    /// * `config` - Boards to watch and the time between rounds; a zero
    ///   interval is raised to one millisecond
    ///
    /// # Returns
    /// A `WatchHandle` for receiving round results and stopping the task
    pub fn spawn<S>(service: BoardService<S>, config: WatchConfig) -> Self
    where
        S: BoardSource + 'static,
    {
        let (msg_tx, msg_rx) = mpsc::channel(32);
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(config.interval.max(MIN_INTERVAL));

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let message = match service.boards(&config.board_ids, false).await {
                            Ok(response) => WatchMessage::BoardsUpdated(response),
                            Err(e) => WatchMessage::WatchError(e.to_string()),
                        };
                        if msg_tx.send(message).await.is_err() {
                            break;
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }
            debug!("watch task stopped");
        });

        Self {
            receiver: msg_rx,
            shutdown_tx,
        }
    }

    /// Asks the watch task to stop
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheManager;
    use crate::service::tests::{action, FakeSource};

    fn create_test_handle(board_ids: &[&str]) -> WatchHandle {
        create_test_handle_with_interval(board_ids, Duration::from_secs(60))
    }

    fn create_test_handle_with_interval(board_ids: &[&str], interval: Duration) -> WatchHandle {
        let source = FakeSource::default()
            .with_board("b1", "Roadmap", vec![action("a1", 1)])
            .with_board("b2", "Support", Vec::new());
        let service = BoardService::new(source, CacheManager::new());
        let config = WatchConfig {
            board_ids: board_ids.iter().map(|id| id.to_string()).collect(),
            interval,
        };
        WatchHandle::spawn(service, config)
    }

    #[test]
    fn test_watch_config_default() {
        let config = WatchConfig::default();
        assert!(config.board_ids.is_empty());
        assert_eq!(config.interval, Duration::from_secs(300));
    }

    #[tokio::test]
    async fn test_first_round_runs_immediately() {
        let mut handle = create_test_handle(&["b1", "b2"]);

        let message = tokio::time::timeout(Duration::from_secs(5), handle.receiver.recv())
            .await
            .expect("Watch should report without waiting for the interval")
            .expect("Channel should be open");

        match message {
            WatchMessage::BoardsUpdated(response) => {
                assert_eq!(response.boards.len(), 2);
                assert!(!response.from_cache);
            }
            WatchMessage::WatchError(e) => panic!("Unexpected error: {}", e),
        }
    }

    #[tokio::test]
    async fn test_round_errors_are_reported() {
        let mut handle = create_test_handle(&[]);

        let message = tokio::time::timeout(Duration::from_secs(5), handle.receiver.recv())
            .await
            .expect("Watch should report without waiting for the interval")
            .expect("Channel should be open");

        assert!(matches!(message, WatchMessage::WatchError(e) if e.contains("No board IDs")));
    }

    #[tokio::test]
    async fn test_shutdown_closes_channel() {
        let mut handle = create_test_handle(&["b1"]);

        handle.shutdown().await;

        let drained = tokio::time::timeout(Duration::from_secs(5), async {
            while handle.receiver.recv().await.is_some() {}
        })
        .await;
        assert!(drained.is_ok(), "Channel should close after shutdown");
        assert!(handle.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_zero_interval_keeps_polling() {
        let mut handle = create_test_handle_with_interval(&["b1"], Duration::ZERO);

        for round in 0..3 {
            let message = tokio::time::timeout(Duration::from_secs(5), handle.receiver.recv())
                .await
                .expect("Watch should keep reporting")
                .expect("Watch task should still be running");
            match message {
                WatchMessage::BoardsUpdated(response) => {
                    assert_eq!(response.boards.len(), 1);
                    assert_eq!(response.from_cache, round > 0);
                }
                WatchMessage::WatchError(e) => panic!("Unexpected error: {}", e),
            }
        }

        handle.shutdown().await;
    }
}
