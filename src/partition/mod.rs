//! Partition and view resolution
//!
//! Maps a (tech pack, time window) pair to the physical objects a query
//! should read:
//!
//! - **views.rs**: names the aggregation view for a granularity, honoring
//!   data tiering and the exclusive-TAC raw override
//! - **timerange.rs**: SQL lookups against the time-range index views,
//!   the slow path of raw-partition discovery
//! - **raw.rs**: the tiered cascade over the metadata cache and the SQL
//!   lookups that produces the raw partition list
//! - **resolver.rs**: per-request resolution across tech packs, after the
//!   licensing filter

pub mod raw;
pub mod resolver;
pub mod timerange;
pub mod views;

pub use raw::RawTableFetcher;
pub use resolver::PartitionResolver;
pub use timerange::{
    SqlTimeRangeQuerier, TemplateRenderer, TimeRangeQuerier, GET_LATEST_RAW_TABLES,
    GET_LATEST_RAW_TABLES_NO_TIMERANGE, GET_RAW_TABLES, GET_RAW_TABLES_NO_TIMERANGE,
};
pub use views::ViewSelector;
