//! Aggregation view naming and the aggregation-vs-raw decision
//!
//! Physical view names are assembled from the tech pack name, an optional
//! measurement type, the aggregation key, the outcome fragment and a
//! granularity suffix:
//!
//! ```text
//! EVENT_E_SGEH_VEND_ERR_DAY
//! └─ tech pack ┘ └┬─┘ └┬┘ └┬┘
//!    aggregation key┘   │   └ granularity suffix
//!            outcome────┘
//! ```
//!
//! Two tech-pack attributes override the suffix chosen from the window:
//! data-tiered packs keep no rollups finer than 15 minutes, and
//! exclusive-TAC packs are always read from raw views.

use crate::config::Config;
use crate::time::{Granularity, TimeWindow};
use crate::types::{AggregationInfo, OutcomeKey, TechPackDescriptor};

/// Chooses granularities and names aggregation views
#[derive(Debug, Clone, Copy)]
pub struct ViewSelector {
    one_minute_enabled: bool,
}

impl ViewSelector {
    /// Create a selector; `one_minute_enabled` mirrors the global 1-minute
    /// aggregation switch
    pub fn new(one_minute_enabled: bool) -> Self {
        Self { one_minute_enabled }
    }

    /// Create a selector from the configured 1-minute aggregation switch
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.one_minute_aggregation)
    }

    /// Granularity serving the given window under the tiering policy
    pub fn granularity_for(&self, window: &TimeWindow) -> Granularity {
        Granularity::for_window(window, self.one_minute_enabled)
    }

    /// The once-per-resolution decision between aggregation views and raw
    /// partitions: raw windows read raw events, everything longer reads the
    /// rollup views
    pub fn use_aggregation_views(&self, granularity: Granularity) -> bool {
        match granularity {
            Granularity::Raw => false,
            Granularity::OneMinute => self.one_minute_enabled,
            Granularity::FifteenMinutes | Granularity::Day => true,
        }
    }

    /// Whether a specific tech pack's rollups can serve the granularity
    pub fn should_use_aggregation_view(
        &self,
        granularity: Granularity,
        info: Option<&AggregationInfo>,
    ) -> bool {
        if granularity == Granularity::OneMinute && !self.one_minute_enabled {
            return false;
        }
        info.is_some_and(|i| i.supports(granularity))
    }

    fn suffix_for(&self, tech_pack: &TechPackDescriptor, granularity: Granularity) -> &'static str {
        if tech_pack.exclusive_tac_related {
            Granularity::Raw.suffix()
        } else if tech_pack.data_tiered {
            granularity.data_tiered_suffix()
        } else {
            granularity.suffix()
        }
    }

    fn assemble(
        &self,
        tech_pack: &TechPackDescriptor,
        measurement_type: Option<&str>,
        aggregation_key: &str,
        outcome: OutcomeKey,
        granularity: Granularity,
    ) -> String {
        let mut name = tech_pack.name.clone();
        if let Some(mtype) = measurement_type {
            name.push('_');
            name.push_str(mtype);
        }
        name.push('_');
        name.push_str(aggregation_key);
        let fragment = outcome.fragment();
        if !fragment.is_empty() {
            name.push('_');
            name.push_str(fragment);
        }
        name.push_str(self.suffix_for(tech_pack, granularity));
        name
    }

    /// Name of the aggregation view for the tech pack's primary key
    pub fn aggregation_view(
        &self,
        tech_pack: &TechPackDescriptor,
        info: &AggregationInfo,
        outcome: OutcomeKey,
        granularity: Granularity,
    ) -> String {
        self.assemble(tech_pack, None, &info.aggregation_key, outcome, granularity)
    }

    /// Aggregation view for a measurement type's dedicated tables
    pub fn measurement_aggregation_view(
        &self,
        tech_pack: &TechPackDescriptor,
        info: &AggregationInfo,
        measurement_type: &str,
        outcome: OutcomeKey,
        granularity: Granularity,
    ) -> String {
        self.assemble(
            tech_pack,
            Some(measurement_type),
            &info.aggregation_key,
            outcome,
            granularity,
        )
    }

    /// All-calls view from the secondary aggregation key, when the tech pack
    /// has one
    pub fn all_calls_view(
        &self,
        tech_pack: &TechPackDescriptor,
        info: &AggregationInfo,
        granularity: Granularity,
    ) -> Option<String> {
        info.secondary_aggregation_key.as_deref().map(|key| {
            self.assemble(tech_pack, None, key, OutcomeKey::Plain, granularity)
        })
    }
}
