//! In-memory cache for aggregated board data
//!
//! This module provides a thread-safe cache manager that keeps values for a single
//! fixed freshness window. Expired entries are dropped lazily the first time a
//! read finds them stale, while the diagnostic `info` snapshot reports them
//! without touching the store.

mod clock;
mod manager;

pub use clock::{Clock, ManualClock, SystemClock};
pub use manager::{CacheManager, EntryInfo, DEFAULT_TTL_MINUTES};
