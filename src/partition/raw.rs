//! Raw partition resolution
//!
//! Finding the physical partitions behind a raw view is a tiered cascade,
//! each tier consulted only when the previous one produced nothing:
//!
//! ```text
//! CacheLookup ──▶ CacheLookupLatest ──▶ IndexQuery ──▶ IndexQueryLatest
//!  (cache, by        (cache, most         (SQL, by        (SQL, most
//!   window)           recent)              window)          recent)
//! ```
//!
//! Non-volume-based views carry no time-range metadata at all and enter the
//! cascade at `IndexQuery`. Cache failures are logged and count as an empty
//! tier; SQL failures propagate, since at that point there is no cheaper
//! source of truth left.

use crate::error::Result;
use crate::metadata::PartitionCache;
use crate::partition::timerange::TimeRangeQuerier;
use crate::time::TimeWindow;
use crate::types::{OutcomeKey, TechPackDescriptor};
use std::sync::Arc;
use tracing::{debug, warn};

/// One tier of the resolution cascade
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResolveTier {
    CacheLookup,
    CacheLookupLatest,
    IndexQuery,
    IndexQueryLatest,
}

impl ResolveTier {
    /// Entry tier: views without a time-range index skip the cache
    fn entry_for(volume_based: bool) -> Self {
        if volume_based {
            ResolveTier::CacheLookup
        } else {
            ResolveTier::IndexQuery
        }
    }

    fn next(self) -> Option<Self> {
        match self {
            ResolveTier::CacheLookup => Some(ResolveTier::CacheLookupLatest),
            ResolveTier::CacheLookupLatest => Some(ResolveTier::IndexQuery),
            ResolveTier::IndexQuery => Some(ResolveTier::IndexQueryLatest),
            ResolveTier::IndexQueryLatest => None,
        }
    }
}

/// Resolves raw views to their physical partitions
pub struct RawTableFetcher {
    cache: Arc<dyn PartitionCache>,
    querier: Arc<dyn TimeRangeQuerier>,
}

impl RawTableFetcher {
    /// Create a fetcher over the metadata cache and the SQL index querier
    pub fn new(cache: Arc<dyn PartitionCache>, querier: Arc<dyn TimeRangeQuerier>) -> Self {
        Self { cache, querier }
    }

    /// Partitions behind `views` holding events in the window.
    ///
    /// Walks the cascade from the entry tier for `volume_based`, returning
    /// the first non-empty tier. An empty result after the final tier is
    /// possible only for non-volume-based views; volume-based latest lookups
    /// synthesize the default first partition.
    pub fn tables_for_views(
        &self,
        window: &TimeWindow,
        views: &[String],
        volume_based: bool,
    ) -> Result<Vec<String>> {
        let mut tier = Some(ResolveTier::entry_for(volume_based));
        while let Some(current) = tier {
            let tables = self.run_tier(current, window, views, volume_based)?;
            if !tables.is_empty() {
                debug!(?current, count = tables.len(), "tier resolved partitions");
                return Ok(tables);
            }
            tier = current.next();
        }
        Ok(Vec::new())
    }

    fn run_tier(
        &self,
        tier: ResolveTier,
        window: &TimeWindow,
        views: &[String],
        volume_based: bool,
    ) -> Result<Vec<String>> {
        match tier {
            ResolveTier::CacheLookup => {
                let (start, end) = window.lookup_bounds();
                match self.cache.table_names(start, end, views) {
                    Ok(tables) => Ok(tables),
                    Err(e) => {
                        warn!(error = %e, "partition cache lookup failed, falling through");
                        Ok(Vec::new())
                    }
                }
            }
            ResolveTier::CacheLookupLatest => match self.cache.latest_table_names(views) {
                Ok(tables) => Ok(tables),
                Err(e) => {
                    warn!(error = %e, "partition cache latest lookup failed, falling through");
                    Ok(Vec::new())
                }
            },
            ResolveTier::IndexQuery => {
                let mut tables = Vec::new();
                for view in views {
                    tables.extend(self.querier.tables_in_range(window, view, volume_based)?);
                }
                Ok(tables)
            }
            ResolveTier::IndexQueryLatest => {
                let mut tables = Vec::new();
                for view in views {
                    tables.extend(self.querier.latest_tables(view, volume_based)?);
                }
                Ok(tables)
            }
        }
    }

    fn views_for(tech_pack: &TechPackDescriptor, outcome: OutcomeKey) -> Vec<String> {
        let fragment = outcome.fragment();
        let view = |mtype: Option<&str>| {
            let mut name = tech_pack.name.clone();
            if let Some(mtype) = mtype {
                name.push('_');
                name.push_str(mtype);
            }
            if !fragment.is_empty() {
                name.push('_');
                name.push_str(fragment);
            }
            name.push_str("_RAW");
            name
        };
        if tech_pack.measurement_types.is_empty() {
            vec![view(None)]
        } else {
            tech_pack
                .measurement_types
                .iter()
                .map(|m| view(Some(m)))
                .collect()
        }
    }

    /// Partitions behind the tech pack's plain raw view
    pub fn raw_tables(
        &self,
        window: &TimeWindow,
        tech_pack: &TechPackDescriptor,
    ) -> Result<Vec<String>> {
        let views = vec![format!("{}_RAW", tech_pack.name)];
        self.tables_for_views(window, &views, tech_pack.volume_based)
    }

    /// Partitions holding failed events; empty unless the tech pack splits
    /// raw data by outcome
    pub fn raw_err_tables(
        &self,
        window: &TimeWindow,
        tech_pack: &TechPackDescriptor,
    ) -> Result<Vec<String>> {
        if !tech_pack.has_outcome_split {
            return Ok(Vec::new());
        }
        let views = vec![format!("{}_ERR_RAW", tech_pack.name)];
        self.tables_for_views(window, &views, tech_pack.volume_based)
    }

    /// Partitions holding successful events; empty unless the tech pack
    /// splits raw data by outcome
    pub fn raw_suc_tables(
        &self,
        window: &TimeWindow,
        tech_pack: &TechPackDescriptor,
    ) -> Result<Vec<String>> {
        if !tech_pack.has_outcome_split {
            return Ok(Vec::new());
        }
        let views = vec![format!("{}_SUC_RAW", tech_pack.name)];
        self.tables_for_views(window, &views, tech_pack.volume_based)
    }

    /// Partitions across the tech pack's per-measurement-type raw views, or
    /// the base view when none are configured
    pub fn raw_tables_with_measurement_types(
        &self,
        window: &TimeWindow,
        tech_pack: &TechPackDescriptor,
        outcome: OutcomeKey,
    ) -> Result<Vec<String>> {
        let views = Self::views_for(tech_pack, outcome);
        self.tables_for_views(window, &views, tech_pack.volume_based)
    }
}
