//! Core data types shared across the query layer
//!
//! # Key Types
//!
//! - **`TechPackDescriptor`**: a logical, versioned data source for one
//!   network technology's event stream, with its partitioning and licensing
//!   attributes
//! - **`AggregationInfo`**: the aggregation views available for a tech pack
//!   (key, optional secondary key, supported granularities)
//! - **`OutcomeKey`**: the success/error/plain outcome dimension in physical
//!   view names
//! - **`ResolvedTechPack`** / **`ResolvedTableSet`**: the output of partition
//!   resolution, concrete table and view names per requested tech pack

use crate::time::Granularity;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Outcome dimension of a physical table or view name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutcomeKey {
    /// Failed events (`_ERR` tables/views)
    Error,
    /// Successful events (`_SUC` tables/views)
    Success,
    /// No outcome split
    Plain,
}

impl OutcomeKey {
    /// Name fragment for this key, empty for [`OutcomeKey::Plain`]
    pub fn fragment(&self) -> &'static str {
        match self {
            OutcomeKey::Error => "ERR",
            OutcomeKey::Success => "SUC",
            OutcomeKey::Plain => "",
        }
    }
}

/// Aggregation views available for a tech pack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationInfo {
    /// Primary aggregation key, e.g. "VEND" or "CELL"
    pub aggregation_key: String,

    /// Secondary aggregation key for the all-calls views, when present
    pub secondary_aggregation_key: Option<String>,

    /// Granularities this tech pack has precomputed rollups for
    pub granularities: Vec<Granularity>,
}

impl AggregationInfo {
    /// Create aggregation info for a primary key and its granularities
    pub fn new(aggregation_key: impl Into<String>, granularities: Vec<Granularity>) -> Self {
        Self {
            aggregation_key: aggregation_key.into(),
            secondary_aggregation_key: None,
            granularities,
        }
    }

    /// Set the secondary aggregation key
    pub fn with_secondary_key(mut self, key: impl Into<String>) -> Self {
        self.secondary_aggregation_key = Some(key.into());
        self
    }

    /// Whether rollups exist for the given granularity
    pub fn supports(&self, granularity: Granularity) -> bool {
        self.granularities.contains(&granularity)
    }
}

/// A logical data source: one network technology's event stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechPackDescriptor {
    /// Tech pack name, e.g. "EVENT_E_SGEH"
    pub name: String,

    /// Volume-based tech packs index raw partitions by time range; their
    /// partitions are discoverable through the metadata cache and the
    /// time-range index views. Non-volume-based packs key partitions purely
    /// by ingestion time and are discovered by type-only queries.
    #[serde(default = "default_volume_based")]
    pub volume_based: bool,

    /// Data-tiered tech packs use the compressed granularity table (no raw
    /// or 1-minute rollups below the day level)
    #[serde(default)]
    pub data_tiered: bool,

    /// Terminal-analysis tech packs always query raw events regardless of
    /// window length
    #[serde(default)]
    pub exclusive_tac_related: bool,

    /// Whether raw partitions are split into error/success subsets
    #[serde(default)]
    pub has_outcome_split: bool,

    /// License codes granting access to this tech pack; any one valid code
    /// suffices. Empty means the tech pack is not installed.
    #[serde(default)]
    pub license_codes: Vec<String>,

    /// Measurement types with dedicated tables, e.g. "SOHO" or "IRAT"
    #[serde(default)]
    pub measurement_types: Vec<String>,
}

fn default_volume_based() -> bool {
    true
}

impl TechPackDescriptor {
    /// Create a volume-based descriptor with no licensing or splits configured
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            volume_based: true,
            data_tiered: false,
            exclusive_tac_related: false,
            has_outcome_split: false,
            license_codes: Vec::new(),
            measurement_types: Vec::new(),
        }
    }

    /// Mark the tech pack as keyed by ingestion time rather than time range
    pub fn time_based(mut self) -> Self {
        self.volume_based = false;
        self
    }

    /// Mark the tech pack as data-tiered
    pub fn with_data_tiering(mut self) -> Self {
        self.data_tiered = true;
        self
    }

    /// Mark the tech pack as exclusively TAC-related
    pub fn with_exclusive_tac(mut self) -> Self {
        self.exclusive_tac_related = true;
        self
    }

    /// Mark the tech pack's raw partitions as split by outcome
    pub fn with_outcome_split(mut self) -> Self {
        self.has_outcome_split = true;
        self
    }

    /// Add a license code
    pub fn with_license_code(mut self, code: impl Into<String>) -> Self {
        self.license_codes.push(code.into());
        self
    }

    /// Add a measurement type
    pub fn with_measurement_type(mut self, mtype: impl Into<String>) -> Self {
        self.measurement_types.push(mtype.into());
        self
    }
}

/// Resolved physical names for one tech pack
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedTechPack {
    /// Tech pack name this entry was resolved for
    pub name: String,

    /// Error aggregation view for the chosen granularity
    pub err_aggregation_view: String,

    /// Success aggregation view for the chosen granularity
    pub suc_aggregation_view: String,

    /// Plain (no outcome split) aggregation view for the chosen granularity
    pub plain_aggregation_view: String,

    /// All-calls aggregation view from the secondary aggregation key, when
    /// the tech pack has one
    pub all_calls_aggregation_view: Option<String>,

    /// Raw partitions holding failed events
    pub err_raw_tables: Vec<String>,

    /// Raw partitions holding successful events
    pub suc_raw_tables: Vec<String>,

    /// Raw partitions without an outcome split
    pub raw_tables: Vec<String>,
}

/// Output of partition resolution for one request: resolved names per
/// licensed tech pack plus the aggregation-vs-raw decision made once per
/// (window, tiering policy) combination
#[derive(Debug, Clone, Default)]
pub struct ResolvedTableSet {
    tech_packs: HashMap<String, ResolvedTechPack>,
    use_aggregation_views: bool,
}

impl ResolvedTableSet {
    /// Create an empty set carrying the aggregation-view decision
    pub fn new(use_aggregation_views: bool) -> Self {
        Self {
            tech_packs: HashMap::new(),
            use_aggregation_views,
        }
    }

    /// Whether queries over this set should read aggregation views rather
    /// than raw partitions
    pub fn use_aggregation_views(&self) -> bool {
        self.use_aggregation_views
    }

    /// Add a resolved tech pack
    pub fn insert(&mut self, tech_pack: ResolvedTechPack) {
        self.tech_packs.insert(tech_pack.name.clone(), tech_pack);
    }

    /// Look up a resolved tech pack by name
    pub fn get(&self, name: &str) -> Option<&ResolvedTechPack> {
        self.tech_packs.get(name)
    }

    /// Whether a tech pack survived resolution
    pub fn contains(&self, name: &str) -> bool {
        self.tech_packs.contains_key(name)
    }

    /// Names of all resolved tech packs
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tech_packs.keys().map(String::as_str)
    }

    /// Number of resolved tech packs
    pub fn len(&self) -> usize {
        self.tech_packs.len()
    }

    /// True when no tech pack survived resolution
    pub fn is_empty(&self) -> bool {
        self.tech_packs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_key_fragments() {
        assert_eq!(OutcomeKey::Error.fragment(), "ERR");
        assert_eq!(OutcomeKey::Success.fragment(), "SUC");
        assert_eq!(OutcomeKey::Plain.fragment(), "");
    }

    #[test]
    fn test_aggregation_info_supports() {
        let info = AggregationInfo::new(
            "CELL",
            vec![Granularity::FifteenMinutes, Granularity::Day],
        );
        assert!(info.supports(Granularity::Day));
        assert!(!info.supports(Granularity::OneMinute));
    }

    #[test]
    fn test_descriptor_builder() {
        let tp = TechPackDescriptor::new("EVENT_E_SGEH")
            .with_outcome_split()
            .with_license_code("CXC4010001")
            .with_license_code("CXC4010002");
        assert!(tp.volume_based);
        assert!(tp.has_outcome_split);
        assert_eq!(tp.license_codes.len(), 2);

        let dt = TechPackDescriptor::new("EVENT_E_DVTP_DT").time_based().with_data_tiering();
        assert!(!dt.volume_based);
        assert!(dt.data_tiered);
    }

    #[test]
    fn test_resolved_table_set() {
        let mut set = ResolvedTableSet::new(true);
        assert!(set.is_empty());
        set.insert(ResolvedTechPack {
            name: "EVENT_E_LTE".to_string(),
            ..Default::default()
        });
        assert!(set.contains("EVENT_E_LTE"));
        assert!(!set.contains("EVENT_E_SGEH"));
        assert_eq!(set.len(), 1);
        assert!(set.use_aggregation_views());
    }
}
