//! Local snapshot cache.
//!
//! This module provides the `CacheManager` for storing the last computed
//! Drive snapshot and certificate index as JSON, so a restarted server can
//! answer before its first refresh. Data is considered stale after
//! 60 minutes unless configured otherwise.

pub mod manager;

pub use manager::{CachedData, CacheManager, CACHE_STALE_MINUTES};
