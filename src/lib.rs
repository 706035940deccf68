//! boardpulse library
//!
//! Aggregates Trello boards behind a time-expiring board cache. The binary and
//! the integration tests build on these modules.

pub mod cache;
pub mod cli;
pub mod data;
pub mod service;
pub mod watch;
