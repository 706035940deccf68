//! boardpulse - Trello board aggregation from the command line
//!
//! Runs one-shot board, activity and health commands, a periodic watch loop, or
//! an interactive shell. All of them share a single board cache for the life of
//! the process.

use std::error::Error;
use std::io::{self, Write};
use std::process;
use std::time::Duration;

use clap::Parser;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use boardpulse::cache::CacheManager;
use boardpulse::cli::{parse_shell_line, Cli, ShellCommand, StartupConfig, Task, SHELL_HELP};
use boardpulse::data::{BoardSource, TrelloClient};
use boardpulse::service::BoardService;
use boardpulse::watch::{WatchConfig, WatchHandle, WatchMessage};

/// Sets up logging to stderr, filtered by `RUST_LOG`
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("boardpulse=info")),
        )
        .init();
}

/// Prints a value as pretty JSON on stdout
fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Runs a one-shot task and prints its result
async fn run_task<S: BoardSource>(
    service: &BoardService<S>,
    task: Task,
) -> Result<(), Box<dyn Error>> {
    match task {
        Task::Board {
            board_id,
            force_refresh,
        } => print_json(&service.board(&board_id, force_refresh).await?),
        Task::Boards {
            board_ids,
            force_refresh,
        } => print_json(&service.boards(&board_ids, force_refresh).await?),
        Task::Activity { board_ids, since } => {
            print_json(&service.activity(&board_ids, since).await?)
        }
        Task::Health => print_json(&service.health()),
        Task::Watch { .. } | Task::Shell => Err("not a one-shot command".into()),
    }
}

/// Reads shell commands from stdin until `quit` or end of input
async fn run_shell<S: BoardSource>(service: &BoardService<S>) -> Result<(), Box<dyn Error>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        let command = match parse_shell_line(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                eprintln!("{}", e);
                continue;
            }
        };

        match command {
            ShellCommand::Run(task) => {
                if let Err(e) = run_task(service, task).await {
                    eprintln!("error: {}", e);
                }
            }
            ShellCommand::CacheInfo => print_json(&service.cache_info())?,
            ShellCommand::CacheClear(board_id) => {
                service.clear_cache(board_id.as_deref());
                println!("cache cleared");
            }
            ShellCommand::Help => println!("{}", SHELL_HELP),
            ShellCommand::Quit => break,
        }
    }

    Ok(())
}

/// Polls boards until Ctrl-C, printing one line per board each round
async fn run_watch<S: BoardSource + 'static>(
    service: BoardService<S>,
    board_ids: Vec<String>,
    interval: Duration,
) {
    info!(boards = board_ids.len(), ?interval, "Watching boards");
    let mut handle = WatchHandle::spawn(
        service,
        WatchConfig {
            board_ids,
            interval,
        },
    );

    loop {
        tokio::select! {
            message = handle.receiver.recv() => match message {
                Some(WatchMessage::BoardsUpdated(response)) => {
                    let source = if response.from_cache { "cache" } else { "upstream" };
                    for board in &response.boards {
                        println!(
                            "{} {} ({}): {} cards, {} lists, {} actions [{}]",
                            response.timestamp.format("%H:%M:%S"),
                            board.name,
                            board.id,
                            board.stats.total_cards,
                            board.stats.total_lists,
                            board.stats.recent_actions,
                            source,
                        );
                    }
                }
                Some(WatchMessage::WatchError(e)) => warn!(error = %e, "Watch round failed"),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                handle.shutdown().await;
                break;
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing();

    let config = match StartupConfig::from_cli(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(2);
        }
    };

    if !config.trello.has_credentials() {
        info!("No Trello API credentials provided; only public boards are reachable");
    }

    let cache = CacheManager::with_ttl(config.cache_ttl);
    let service = BoardService::new(TrelloClient::new(config.trello), cache);

    match config.task {
        Task::Shell => run_shell(&service).await,
        Task::Watch {
            board_ids,
            interval,
        } => {
            run_watch(service, board_ids, interval).await;
            Ok(())
        }
        task => run_task(&service, task).await,
    }
}
