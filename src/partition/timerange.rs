//! SQL lookups against the time-range index views
//!
//! The slow path of raw-partition discovery. Every volume-based raw view has
//! a companion `<view>_TIMERANGE` index view mapping partitions to the time
//! span of the events they hold; querying it by window yields the partitions
//! worth scanning. Non-volume-based views have no such index and are listed
//! with a type-only query against the metadata store.
//!
//! Query texts come from an external [`TemplateRenderer`]; this module only
//! knows the template identifiers and the bind parameters each template
//! expects. Lookups run uncancellable: they are short, and a client cancel
//! aimed at the report query must not tear down partition discovery halfway.

use crate::error::Result;
use crate::query::executor::{QueryExecutor, CANCEL_UNSUPPORTED};
use crate::query::params::BindValue;
use crate::query::transform::StringRowsTransformer;
use crate::time::TimeWindow;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Template: partitions of a view overlapping `:dateFrom`/`:dateTo`
pub const GET_RAW_TABLES: &str = "get_raw_tables";

/// Template: most recently loaded partitions of a view
pub const GET_LATEST_RAW_TABLES: &str = "get_latest_raw_tables";

/// Template: all partitions of a non-indexed view
pub const GET_RAW_TABLES_NO_TIMERANGE: &str = "get_raw_tables_no_timerange";

/// Template: latest partitions of a non-indexed view
pub const GET_LATEST_RAW_TABLES_NO_TIMERANGE: &str = "get_latest_raw_tables_no_timerange";

/// Bind-parameter timestamp format understood by the index views
const INDEX_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Renders a named query template for one view
pub trait TemplateRenderer: Send + Sync {
    /// Produce the SQL text of `template_id` targeting `view`
    fn render(&self, template_id: &str, view: &str) -> Result<String>;
}

/// Partition lookup through the time-range index
pub trait TimeRangeQuerier: Send + Sync {
    /// Partitions of `view` overlapping the window
    fn tables_in_range(
        &self,
        window: &TimeWindow,
        view: &str,
        volume_based: bool,
    ) -> Result<Vec<String>>;

    /// Most recently loaded partitions of `view`
    fn latest_tables(&self, view: &str, volume_based: bool) -> Result<Vec<String>>;
}

/// [`TimeRangeQuerier`] executing rendered templates through the query
/// executor
pub struct SqlTimeRangeQuerier {
    executor: Arc<QueryExecutor>,
    renderer: Arc<dyn TemplateRenderer>,
}

impl SqlTimeRangeQuerier {
    /// Create a querier over the given executor and template renderer
    pub fn new(executor: Arc<QueryExecutor>, renderer: Arc<dyn TemplateRenderer>) -> Self {
        Self { executor, renderer }
    }

    fn window_parameters(window: &TimeWindow) -> HashMap<String, BindValue> {
        let (start, end) = window.lookup_bounds();
        let mut parameters = HashMap::new();
        parameters.insert(
            "dateFrom".to_string(),
            BindValue::string(start.format(INDEX_TIMESTAMP_FORMAT).to_string()),
        );
        parameters.insert(
            "dateTo".to_string(),
            BindValue::string(end.format(INDEX_TIMESTAMP_FORMAT).to_string()),
        );
        parameters
    }

    fn run(&self, query: &str, parameters: &HashMap<String, BindValue>) -> Result<Vec<String>> {
        let tables = self
            .executor
            .execute_uncancellable(query, parameters, &StringRowsTransformer)?;
        Ok(tables.unwrap_or_default())
    }

    fn run_on_metadata_store(&self, query: &str) -> Result<Vec<String>> {
        let tables = self.executor.execute_on_metadata_store(
            CANCEL_UNSUPPORTED,
            query,
            &HashMap::new(),
            &StringRowsTransformer,
        )?;
        Ok(tables.unwrap_or_default())
    }
}

impl TimeRangeQuerier for SqlTimeRangeQuerier {
    fn tables_in_range(
        &self,
        window: &TimeWindow,
        view: &str,
        volume_based: bool,
    ) -> Result<Vec<String>> {
        if volume_based {
            let query = self.renderer.render(GET_RAW_TABLES, view)?;
            self.run(&query, &Self::window_parameters(window))
        } else {
            let query = self.renderer.render(GET_RAW_TABLES_NO_TIMERANGE, view)?;
            self.run_on_metadata_store(&query)
        }
    }

    fn latest_tables(&self, view: &str, volume_based: bool) -> Result<Vec<String>> {
        if volume_based {
            let query = self.renderer.render(GET_LATEST_RAW_TABLES, view)?;
            let tables = self.run(&query, &HashMap::new())?;
            if tables.is_empty() {
                // every volume-based view ships with its first partition
                let default_partition = format!("{}_01", view);
                debug!(view, %default_partition, "no latest partitions indexed, using default");
                return Ok(vec![default_partition]);
            }
            Ok(tables)
        } else {
            let query = self
                .renderer
                .render(GET_LATEST_RAW_TABLES_NO_TIMERANGE, view)?;
            self.run_on_metadata_store(&query)
        }
    }
}
