//! Command-line interface parsing for boardpulse
//!
//! This module handles parsing of CLI arguments using clap, validation of the
//! options into a `StartupConfig`, and parsing of the interactive shell's
//! line commands.

use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use thiserror::Error;

use crate::cache::DEFAULT_TTL_MINUTES;
use crate::data::{TrelloConfig, TRELLO_BASE_URL};

/// Error types for CLI argument and shell command parsing
#[derive(Debug, Error, PartialEq)]
pub enum CliError {
    /// The `--since` value is not an RFC 3339 timestamp
    #[error("Invalid timestamp: '{0}'. Expected RFC 3339, e.g. 2024-05-01T08:30:00Z")]
    InvalidSince(String),

    /// The cache freshness window is too short or too long to represent
    #[error("Invalid cache TTL: {0} minutes. Must be at least 1 and within range")]
    InvalidTtl(i64),

    /// The watch interval is zero
    #[error("Invalid watch interval: must be at least 1 second")]
    InvalidInterval,

    /// The shell does not know the command
    #[error("Unknown command: '{0}'. Type 'help' for a list of commands")]
    UnknownCommand(String),

    /// The shell command was given the wrong arguments
    #[error("Usage: {0}")]
    Usage(&'static str),
}

/// boardpulse - Trello board aggregation with a time-expiring board cache
#[derive(Parser, Debug)]
#[command(name = "boardpulse")]
#[command(about = "Trello board aggregation with a time-expiring board cache")]
#[command(version)]
pub struct Cli {
    /// Trello API key; without key and token only public boards are reachable
    #[arg(long, env = "TRELLO_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// Trello API token
    #[arg(long, env = "TRELLO_API_TOKEN", hide_env_values = true, global = true)]
    pub api_token: Option<String>,

    /// Base URL of the Trello API
    #[arg(long, env = "TRELLO_BASE_URL", default_value = TRELLO_BASE_URL, global = true)]
    pub base_url: String,

    /// How long fetched boards stay fresh, in minutes
    #[arg(
        long,
        env = "BOARDPULSE_CACHE_TTL_MINUTES",
        default_value_t = DEFAULT_TTL_MINUTES,
        global = true
    )]
    pub cache_ttl_minutes: i64,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Fetch a single board with its cards, lists and recent actions
    Board {
        board_id: String,
        /// Ignore any cached copy
        #[arg(long)]
        refresh: bool,
    },
    /// Fetch several boards
    Boards {
        #[arg(required = true)]
        board_ids: Vec<String>,
        /// Ignore any cached copies
        #[arg(long)]
        refresh: bool,
    },
    /// Show recent activity across boards, most recent first
    Activity {
        #[arg(required = true)]
        board_ids: Vec<String>,
        /// Only include actions after this RFC 3339 timestamp
        #[arg(long)]
        since: Option<String>,
    },
    /// Poll boards periodically and print a summary of each round
    Watch {
        #[arg(required = true)]
        board_ids: Vec<String>,
        /// Seconds between rounds
        #[arg(long, default_value_t = 300)]
        interval_secs: u64,
    },
    /// Interactive shell sharing one board cache across commands
    Shell,
    /// Report service health
    Health,
}

/// A unit of work to run against the board service
#[derive(Debug, Clone, PartialEq)]
pub enum Task {
    Board {
        board_id: String,
        force_refresh: bool,
    },
    Boards {
        board_ids: Vec<String>,
        force_refresh: bool,
    },
    Activity {
        board_ids: Vec<String>,
        since: Option<DateTime<Utc>>,
    },
    Watch {
        board_ids: Vec<String>,
        interval: StdDuration,
    },
    Shell,
    Health,
}

/// Configuration derived from CLI arguments for application startup
#[derive(Debug, Clone)]
pub struct StartupConfig {
    /// Trello connection settings
    pub trello: TrelloConfig,
    /// Freshness window of the board cache
    pub cache_ttl: Duration,
    /// What to run
    pub task: Task,
}

/// Parses an RFC 3339 timestamp argument
pub fn parse_since_arg(s: &str) -> Result<DateTime<Utc>, CliError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| CliError::InvalidSince(s.to_string()))
}

/// Converts a TTL in minutes to a duration
///
/// # Returns
/// * `Ok(Duration)` for a positive number of minutes
/// * `Err(CliError::InvalidTtl)` if the value is below 1 or out of range
pub fn parse_ttl_minutes(minutes: i64) -> Result<Duration, CliError> {
    if minutes < 1 {
        return Err(CliError::InvalidTtl(minutes));
    }
    Duration::try_minutes(minutes).ok_or(CliError::InvalidTtl(minutes))
}

impl StartupConfig {
    /// Creates a StartupConfig from parsed CLI arguments.
    ///
    /// # Returns
    /// * `Ok(StartupConfig)` with validated settings
    /// * `Err(CliError)` if the TTL, interval or timestamp is invalid
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        let cache_ttl = parse_ttl_minutes(cli.cache_ttl_minutes)?;

        let task = match &cli.command {
            Command::Board { board_id, refresh } => Task::Board {
                board_id: board_id.clone(),
                force_refresh: *refresh,
            },
            Command::Boards { board_ids, refresh } => Task::Boards {
                board_ids: board_ids.clone(),
                force_refresh: *refresh,
            },
            Command::Activity { board_ids, since } => Task::Activity {
                board_ids: board_ids.clone(),
                since: since.as_deref().map(parse_since_arg).transpose()?,
            },
            Command::Watch {
                board_ids,
                interval_secs,
            } => {
                if *interval_secs == 0 {
                    return Err(CliError::InvalidInterval);
                }
                Task::Watch {
                    board_ids: board_ids.clone(),
                    interval: StdDuration::from_secs(*interval_secs),
                }
            }
            Command::Shell => Task::Shell,
            Command::Health => Task::Health,
        };

        Ok(StartupConfig {
            trello: TrelloConfig {
                api_key: cli.api_key.clone(),
                api_token: cli.api_token.clone(),
                base_url: cli.base_url.clone(),
            },
            cache_ttl,
            task,
        })
    }
}

/// A command typed into the interactive shell
#[derive(Debug, Clone, PartialEq)]
pub enum ShellCommand {
    /// Fetch boards, activity or health
    Run(Task),
    /// Print the cache snapshot
    CacheInfo,
    /// Clear one board, or the whole cache
    CacheClear(Option<String>),
    Help,
    Quit,
}

/// Shell help text
pub const SHELL_HELP: &str = "\
Commands:
  board <ID> [--refresh]          fetch one board
  boards <ID>... [--refresh]      fetch several boards
  activity <ID>... [--since TS]   recent activity, most recent first
  health                          service health
  cache info                      age and expiry of cached boards
  cache clear [ID]                drop one cached board, or all of them
  help                            show this help
  quit                            leave the shell";

/// Parses one line of shell input
///
/// Returns `Ok(None)` for blank lines.
pub fn parse_shell_line(line: &str) -> Result<Option<ShellCommand>, CliError> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let parsed = match command {
        "board" => {
            let (ids, force_refresh) = split_refresh_flag(&args);
            match ids.as_slice() {
                [board_id] => ShellCommand::Run(Task::Board {
                    board_id: board_id.to_string(),
                    force_refresh,
                }),
                _ => return Err(CliError::Usage("board <ID> [--refresh]")),
            }
        }
        "boards" => {
            let (board_ids, force_refresh) = split_refresh_flag(&args);
            if board_ids.is_empty() {
                return Err(CliError::Usage("boards <ID>... [--refresh]"));
            }
            ShellCommand::Run(Task::Boards {
                board_ids,
                force_refresh,
            })
        }
        "activity" => parse_activity(&args)?,
        "health" => ShellCommand::Run(Task::Health),
        "cache" => match args.as_slice() {
            ["info"] => ShellCommand::CacheInfo,
            ["clear"] => ShellCommand::CacheClear(None),
            ["clear", board_id] => ShellCommand::CacheClear(Some(board_id.to_string())),
            _ => return Err(CliError::Usage("cache info | cache clear [ID]")),
        },
        "help" => ShellCommand::Help,
        "quit" | "exit" => ShellCommand::Quit,
        other => return Err(CliError::UnknownCommand(other.to_string())),
    };

    Ok(Some(parsed))
}

/// Separates `--refresh` from board ids
fn split_refresh_flag(args: &[&str]) -> (Vec<String>, bool) {
    let force_refresh = args.contains(&"--refresh");
    let ids = args
        .iter()
        .filter(|arg| **arg != "--refresh")
        .map(|arg| arg.to_string())
        .collect();
    (ids, force_refresh)
}

fn parse_activity(args: &[&str]) -> Result<ShellCommand, CliError> {
    const USAGE: &str = "activity <ID>... [--since TS]";

    let mut board_ids = Vec::new();
    let mut since = None;
    let mut args = args.iter();
    while let Some(arg) = args.next() {
        if *arg == "--since" {
            let value = args.next().ok_or(CliError::Usage(USAGE))?;
            since = Some(parse_since_arg(value)?);
        } else {
            board_ids.push(arg.to_string());
        }
    }

    if board_ids.is_empty() {
        return Err(CliError::Usage(USAGE));
    }
    Ok(ShellCommand::Run(Task::Activity { board_ids, since }))
}
