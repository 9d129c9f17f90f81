//! # netquery
//!
//! The query layer of a network-analytics reporting backend: turns a logical
//! report request (time window, tech-pack data sources, bind parameters) into
//! executed relational queries against a partitioned, time-tiered event
//! store, with client-initiated cancellation of long-running queries.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                      report request                       │
//! └───────────────┬───────────────────────────┬───────────────┘
//!                 ▼                           ▼
//!      ┌─────────────────────┐     ┌─────────────────────┐
//!      │  PartitionResolver  │     │    QueryExecutor    │
//!      │  license filter,    │     │  named params, the  │
//!      │  views vs raw,      │     │  cancellation race  │
//!      │  tiered cascade     │     │  protocol, cleanup  │
//!      └──────────┬──────────┘     └──────────┬──────────┘
//!                 ▼                           ▼
//!      ┌─────────────────────┐     ┌─────────────────────┐
//!      │   PartitionCache    │     │  ConnectionRouter   │
//!      │   (trait, external) │     │  (trait, external)  │
//!      └─────────────────────┘     └─────────────────────┘
//! ```
//!
//! ## Key behaviors
//!
//! - **Named parameters**: query templates use `:name` placeholders, rewritten
//!   to positional form with quote-aware scanning ([`query::named`])
//! - **Cancellation**: a registry of live statement handles plus cancel-failed
//!   markers closes both sides of the cancel/execute race; a cancelled
//!   execution completes with `Ok(None)`, never an error
//! - **Partition resolution**: a tiered cascade (metadata cache, then the SQL
//!   time-range index) finds the raw partitions behind a view; window length
//!   picks the aggregation granularity from raw up to daily rollups
//! - **Resource hygiene**: every connection, statement and cursor opened by an
//!   execution is released on every exit path, failures logged not propagated
//!
//! The crate is synchronous: each request runs on its own thread, and
//! cancellation crosses threads through the shared registry.

pub mod backend;
pub mod config;
pub mod error;
pub mod license;
pub mod metadata;
pub mod partition;
pub mod query;
pub mod time;
pub mod types;

pub use config::Config;
pub use error::{Error, Result, BACKEND_IO_ERROR_MARKER};
pub use license::{LicenseService, TechPackLicensing};
pub use metadata::PartitionCache;
pub use partition::{PartitionResolver, RawTableFetcher, ViewSelector};
pub use query::{
    BindValue, NamedQuery, QueryExecutor, RequestRegistry, RowTransformer, CANCEL_UNSUPPORTED,
};
pub use time::{Granularity, TimeWindow};
pub use types::{
    AggregationInfo, OutcomeKey, ResolvedTableSet, ResolvedTechPack, TechPackDescriptor,
};
