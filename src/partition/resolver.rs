//! Per-request partition resolution
//!
//! One entry point for the report planner: given the requested tech packs, a
//! time window and the known aggregation metadata, produce the full
//! [`ResolvedTableSet`] the query builder reads names from. Unlicensed tech
//! packs are dropped before any resolution work; raw partitions are fetched
//! only when the window actually reads raw events, since partition discovery
//! costs cache or SQL round trips.

use crate::error::Result;
use crate::license::TechPackLicensing;
use crate::partition::raw::RawTableFetcher;
use crate::partition::views::ViewSelector;
use crate::time::{Granularity, TimeWindow};
use crate::types::{AggregationInfo, OutcomeKey, ResolvedTableSet, ResolvedTechPack, TechPackDescriptor};
use std::collections::HashMap;
use tracing::{debug, info};

/// Resolves requested tech packs to concrete views and partitions
pub struct PartitionResolver {
    views: ViewSelector,
    raw: RawTableFetcher,
    licensing: TechPackLicensing,
}

impl PartitionResolver {
    /// Create a resolver from its three collaborators
    pub fn new(views: ViewSelector, raw: RawTableFetcher, licensing: TechPackLicensing) -> Self {
        Self {
            views,
            raw,
            licensing,
        }
    }

    /// Resolve the tech packs for a window, choosing the granularity from
    /// the window length
    pub fn resolve(
        &self,
        tech_packs: &[TechPackDescriptor],
        window: &TimeWindow,
        aggregation: &HashMap<String, AggregationInfo>,
    ) -> Result<ResolvedTableSet> {
        let granularity = self.views.granularity_for(window);
        self.resolve_with_granularity(tech_packs, window, aggregation, granularity)
    }

    /// Resolve with an explicit granularity, overriding the window-derived
    /// choice
    pub fn resolve_with_granularity(
        &self,
        tech_packs: &[TechPackDescriptor],
        window: &TimeWindow,
        aggregation: &HashMap<String, AggregationInfo>,
        granularity: Granularity,
    ) -> Result<ResolvedTableSet> {
        let licensed = self.licensing.licensed(tech_packs);
        if licensed.len() < tech_packs.len() {
            info!(
                requested = tech_packs.len(),
                licensed = licensed.len(),
                "excluded unlicensed tech packs from resolution"
            );
        }

        let use_aggregation = self.views.use_aggregation_views(granularity);
        debug!(%granularity, use_aggregation, window = %window, "resolving tech packs");

        let mut set = ResolvedTableSet::new(use_aggregation);
        for tech_pack in licensed {
            set.insert(self.resolve_one(tech_pack, window, aggregation, granularity, use_aggregation)?);
        }
        Ok(set)
    }

    fn resolve_one(
        &self,
        tech_pack: &TechPackDescriptor,
        window: &TimeWindow,
        aggregation: &HashMap<String, AggregationInfo>,
        granularity: Granularity,
        use_aggregation: bool,
    ) -> Result<ResolvedTechPack> {
        let info = aggregation.get(&tech_pack.name);
        let mut entry = ResolvedTechPack {
            name: tech_pack.name.clone(),
            ..Default::default()
        };

        if let Some(info) = info {
            if self.views.should_use_aggregation_view(granularity, Some(info)) {
                if tech_pack.has_outcome_split {
                    entry.err_aggregation_view = self.views.aggregation_view(
                        tech_pack,
                        info,
                        OutcomeKey::Error,
                        granularity,
                    );
                    entry.suc_aggregation_view = self.views.aggregation_view(
                        tech_pack,
                        info,
                        OutcomeKey::Success,
                        granularity,
                    );
                } else {
                    entry.plain_aggregation_view = self.views.aggregation_view(
                        tech_pack,
                        info,
                        OutcomeKey::Plain,
                        granularity,
                    );
                }
                entry.all_calls_aggregation_view =
                    self.views.all_calls_view(tech_pack, info, granularity);
            }
        }

        // Exclusive-TAC packs read raw events whatever the window length.
        if !use_aggregation || tech_pack.exclusive_tac_related {
            if tech_pack.has_outcome_split {
                entry.err_raw_tables = self.raw.raw_err_tables(window, tech_pack)?;
                entry.suc_raw_tables = self.raw.raw_suc_tables(window, tech_pack)?;
            } else {
                entry.raw_tables = self.raw.raw_tables(window, tech_pack)?;
            }
        }

        Ok(entry)
    }
}
