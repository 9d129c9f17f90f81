//! Partition metadata cache interface
//!
//! The fast path for raw-partition discovery: an external service (the
//! "engine") that already knows which physical partitions satisfy a time
//! range, saving a SQL query against the time-range index views. The resolver
//! treats every cache failure as "this tier produced nothing" and falls
//! through to the SQL tiers; a cache failure is never surfaced to callers.

use chrono::NaiveDateTime;
use thiserror::Error;

/// Failure reported by a [`PartitionCache`] implementation
#[derive(Error, Debug)]
pub enum CacheError {
    /// The cache could not parse a supplied time bound
    #[error("malformed time bound: {0}")]
    MalformedTimeBound(String),

    /// The cache could not be reached
    #[error("partition cache unavailable: {0}")]
    Unavailable(String),
}

/// External fast-path lookup of raw partitions by view name
pub trait PartitionCache: Send + Sync {
    /// Partitions of the given views overlapping `[start_utc, end_utc]`
    fn table_names(
        &self,
        start_utc: NaiveDateTime,
        end_utc: NaiveDateTime,
        views: &[String],
    ) -> Result<Vec<String>, CacheError>;

    /// Most recently loaded partitions of the given views, ignoring time
    fn latest_table_names(&self, views: &[String]) -> Result<Vec<String>, CacheError>;
}
