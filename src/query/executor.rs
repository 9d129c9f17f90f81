//! Query execution with cooperative cancellation
//!
//! [`QueryExecutor`] drives the full lifecycle of a request's query:
//!
//! - acquire a connection, prepare the named-parameter statement, bind
//! - consult the cancel-failed markers; a pre-empted request never executes
//! - register the statement handle so the cancellation path can reach it
//! - execute, then re-check the registration; a handle removed mid-flight
//!   means the request was cancelled and the result is discarded
//! - transform surviving rows, then release every opened resource and
//!   deregister on every exit path
//!
//! Cancellation is never an error: a cancelled execution completes with
//! `Ok(None)`. Backend failures are classified on the way out; a cause chain
//! carrying the backend I/O marker surfaces as a database timeout.

use crate::backend::{Connection, ConnectionRouter, RoutingPolicy, Rows, Statement};
use crate::error::{Error, Result};
use crate::query::named::NamedStatement;
use crate::query::params::{bind_all, BindValue};
use crate::query::registry::RequestRegistry;
use crate::query::transform::RowTransformer;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Request identifier sentinel opting an execution out of cancellation.
///
/// Compared case-insensitively; statements executing under this identifier
/// are never registered and their results are never discarded.
pub const CANCEL_UNSUPPORTED: &str = "CANCEL_REQ_NOT_SUPPORTED";

fn is_cancellable(request_id: &str) -> bool {
    !request_id.eq_ignore_ascii_case(CANCEL_UNSUPPORTED)
}

/// Which store an execution runs against
#[derive(Clone, Copy)]
enum Store {
    Events(RoutingPolicy),
    Metadata,
}

/// Everything opened during one execute call.
///
/// Collected as the call proceeds and released in acquisition-reverse kind
/// order (cursors, statements, connections) exactly once, whatever path the
/// call exits through. A failure to close one resource is logged and does not
/// stop the release of the rest.
#[derive(Default)]
struct OpenedResources {
    rows: Vec<Box<dyn Rows>>,
    statements: Vec<Arc<dyn Statement>>,
    connections: Vec<Box<dyn Connection>>,
}

impl OpenedResources {
    fn close_all(&mut self) {
        for rows in &mut self.rows {
            if let Err(e) = rows.close() {
                warn!(error = %e, "failed to close row cursor");
            }
        }
        for statement in &self.statements {
            if let Err(e) = statement.close() {
                warn!(error = %e, "failed to close statement");
            }
        }
        for connection in &self.connections {
            if let Err(e) = connection.close() {
                warn!(error = %e, "failed to close connection");
            }
        }
        self.rows.clear();
        self.statements.clear();
        self.connections.clear();
    }
}

/// Executes named-parameter queries on behalf of identified requests
pub struct QueryExecutor {
    router: Arc<dyn ConnectionRouter>,
    registry: Arc<RequestRegistry>,
}

impl QueryExecutor {
    /// Create an executor over the given router and lifecycle registry
    pub fn new(router: Arc<dyn ConnectionRouter>, registry: Arc<RequestRegistry>) -> Self {
        Self { router, registry }
    }

    /// The registry tracking this executor's in-flight requests
    pub fn registry(&self) -> &Arc<RequestRegistry> {
        &self.registry
    }

    /// Execute one query against the event store.
    ///
    /// Returns the transformer's output, or `None` when the request was
    /// cancelled before or during execution.
    pub fn execute<T: RowTransformer>(
        &self,
        request_id: &str,
        query: &str,
        parameters: &HashMap<String, BindValue>,
        transformer: &T,
        policy: RoutingPolicy,
    ) -> Result<Option<T::Output>> {
        self.run(
            request_id,
            Store::Events(policy),
            &[query],
            parameters,
            transformer,
            false,
        )
    }

    /// Execute several queries under one request identifier and transform
    /// their row sets together.
    ///
    /// Each query gets its own connection, and the registration is
    /// re-checked after every statement: a cancellation during any query
    /// discards the whole batch and no later statement runs.
    pub fn execute_batch<T: RowTransformer>(
        &self,
        request_id: &str,
        queries: &[&str],
        parameters: &HashMap<String, BindValue>,
        transformer: &T,
        policy: RoutingPolicy,
    ) -> Result<Option<T::Output>> {
        self.run(
            request_id,
            Store::Events(policy),
            queries,
            parameters,
            transformer,
            true,
        )
    }

    /// Execute one query against the metadata store
    pub fn execute_on_metadata_store<T: RowTransformer>(
        &self,
        request_id: &str,
        query: &str,
        parameters: &HashMap<String, BindValue>,
        transformer: &T,
    ) -> Result<Option<T::Output>> {
        self.run(request_id, Store::Metadata, &[query], parameters, transformer, false)
    }

    /// Execute a query with no caller to cancel it
    pub fn execute_uncancellable<T: RowTransformer>(
        &self,
        query: &str,
        parameters: &HashMap<String, BindValue>,
        transformer: &T,
    ) -> Result<Option<T::Output>> {
        self.run(
            CANCEL_UNSUPPORTED,
            Store::Events(RoutingPolicy::Default),
            &[query],
            parameters,
            transformer,
            false,
        )
    }

    /// Execute an update statement against the metadata store; returns the
    /// affected row count, or `None` when a pending cancellation pre-empted
    /// the request.
    ///
    /// Updates are not discarded retroactively: once the statement has run,
    /// its effect stands even if a cancellation raced the execution.
    pub fn execute_update(
        &self,
        request_id: &str,
        query: &str,
        parameters: &HashMap<String, BindValue>,
    ) -> Result<Option<u64>> {
        if request_id.is_empty() {
            return Err(Error::InvalidRequest("empty request id".to_string()));
        }
        let mut resources = OpenedResources::default();
        let result = self.update_inner(request_id, query, parameters, &mut resources);
        resources.close_all();
        self.registry.remove(request_id);
        self.registry.clear_cancel_failed(request_id);
        result
    }

    fn run<T: RowTransformer>(
        &self,
        request_id: &str,
        store: Store,
        queries: &[&str],
        parameters: &HashMap<String, BindValue>,
        transformer: &T,
        batch: bool,
    ) -> Result<Option<T::Output>> {
        if request_id.is_empty() {
            return Err(Error::InvalidRequest("empty request id".to_string()));
        }
        let mut resources = OpenedResources::default();
        let result = self.run_inner(request_id, store, queries, parameters, transformer, batch, &mut resources);
        resources.close_all();
        self.registry.remove(request_id);
        self.registry.clear_cancel_failed(request_id);
        result
    }

    fn acquire(&self, store: Store) -> Result<Box<dyn Connection>> {
        let connection = match store {
            Store::Events(policy) => self.router.connection(policy)?,
            Store::Metadata => self.router.metadata_store_connection()?,
        };
        Ok(connection)
    }

    #[allow(clippy::too_many_arguments)]
    fn run_inner<T: RowTransformer>(
        &self,
        request_id: &str,
        store: Store,
        queries: &[&str],
        parameters: &HashMap<String, BindValue>,
        transformer: &T,
        batch: bool,
        resources: &mut OpenedResources,
    ) -> Result<Option<T::Output>> {
        let cancellable = is_cancellable(request_id);

        for query in queries {
            let connection = self.acquire(store)?;
            debug!(request_id, query, "executing query");
            let prepared = NamedStatement::prepare(connection.as_ref(), query);
            resources.connections.push(connection);
            let statement = prepared?;
            bind_all(&statement, parameters)?;
            resources.statements.push(statement.statement());

            // A cancellation that arrived before this statement could be
            // registered left a marker; honor it and never execute.
            if cancellable && self.registry.is_cancel_failed(request_id) {
                debug!(request_id, "pending cancellation, skipping execution");
                return Ok(None);
            }
            if cancellable {
                self.registry.register(request_id, statement.statement());
            }

            let rows = statement.execute_query()?;
            resources.rows.push(rows);

            // A registration removed while the statement was executing means
            // the request was cancelled; the rows are discarded, not an
            // error, and no further statement of the batch may run.
            if cancellable && !self.registry.contains(request_id) {
                debug!(request_id, "cancelled during execution, discarding result");
                return Ok(None);
            }
        }

        if batch {
            transformer.transform_batch(&mut resources.rows)
        } else {
            match resources.rows.last_mut() {
                Some(rows) => transformer.transform(rows.as_mut()),
                None => Ok(None),
            }
        }
    }

    fn update_inner(
        &self,
        request_id: &str,
        query: &str,
        parameters: &HashMap<String, BindValue>,
        resources: &mut OpenedResources,
    ) -> Result<Option<u64>> {
        let cancellable = is_cancellable(request_id);

        let connection = self.acquire(Store::Metadata)?;
        debug!(request_id, query, "executing update");
        let prepared = NamedStatement::prepare(connection.as_ref(), query);
        resources.connections.push(connection);
        let statement = prepared?;
        bind_all(&statement, parameters)?;
        resources.statements.push(statement.statement());

        if cancellable && self.registry.is_cancel_failed(request_id) {
            debug!(request_id, "pending cancellation, skipping update");
            return Ok(None);
        }
        if cancellable {
            self.registry.register(request_id, statement.statement());
        }

        let affected = statement.execute_update()?;
        Ok(Some(affected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::stubs::ScriptedBackend;
    use crate::backend::BackendError;
    use crate::error::BACKEND_IO_ERROR_MARKER;
    use crate::query::transform::StringRowsTransformer;
    use std::time::Duration;

    fn executor(backend: Arc<ScriptedBackend>) -> (QueryExecutor, Arc<RequestRegistry>) {
        let registry = Arc::new(RequestRegistry::new(Duration::from_secs(600)));
        (
            QueryExecutor::new(backend, Arc::clone(&registry)),
            registry,
        )
    }

    fn no_params() -> HashMap<String, BindValue> {
        HashMap::new()
    }

    #[test]
    fn test_execute_transforms_and_releases_everything() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_column(&["EVENT_E_SGEH_RAW_01", "EVENT_E_SGEH_RAW_02"]);
        let (exec, registry) = executor(Arc::clone(&backend));

        let result = exec
            .execute(
                "req-1",
                "select name from tables",
                &no_params(),
                &StringRowsTransformer,
                RoutingPolicy::Default,
            )
            .unwrap();
        assert_eq!(
            result.unwrap(),
            vec!["EVENT_E_SGEH_RAW_01", "EVENT_E_SGEH_RAW_02"]
        );
        assert_eq!(backend.rows_closed(), 1);
        assert_eq!(backend.statements_closed(), 1);
        assert_eq!(backend.connections_closed(), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_empty_request_id_is_rejected() {
        let backend = Arc::new(ScriptedBackend::new());
        let (exec, _) = executor(Arc::clone(&backend));
        let result = exec.execute(
            "",
            "select 1",
            &no_params(),
            &StringRowsTransformer,
            RoutingPolicy::Default,
        );
        assert!(matches!(result, Err(Error::InvalidRequest(_))));
        assert_eq!(backend.connections_opened(), 0);
    }

    #[test]
    fn test_pending_cancellation_pre_empts_execution() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_column(&["SHOULD_NOT_BE_SEEN"]);
        let (exec, registry) = executor(Arc::clone(&backend));
        registry.cancel("req-2");
        assert!(registry.is_cancel_failed("req-2"));

        let result = exec
            .execute(
                "req-2",
                "select name from tables",
                &no_params(),
                &StringRowsTransformer,
                RoutingPolicy::Default,
            )
            .unwrap();
        assert!(result.is_none());
        assert_eq!(backend.queries_executed(), 0);
        // the marker is consumed by the pre-empted execution
        assert!(!registry.is_cancel_failed("req-2"));
        assert_eq!(backend.statements_closed(), 1);
        assert_eq!(backend.connections_closed(), 1);
    }

    #[test]
    fn test_cancellation_during_execution_discards_result() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_column(&["STALE_RESULT"]);
        let (exec, registry) = executor(Arc::clone(&backend));

        // the cancellation path fires while the statement is executing
        let racing = Arc::clone(&registry);
        backend.before_execute(move || {
            racing.cancel("req-3");
        });

        let result = exec
            .execute(
                "req-3",
                "select name from tables",
                &no_params(),
                &StringRowsTransformer,
                RoutingPolicy::Default,
            )
            .unwrap();
        assert!(result.is_none());
        assert!(backend.statements()[0].was_cancelled());
        assert_eq!(backend.rows_closed(), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_uncancellable_sentinel_skips_registration() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_column(&["KEPT"]);
        let (exec, registry) = executor(Arc::clone(&backend));

        // never registered, so the post-execution check must not discard
        let watching = Arc::clone(&registry);
        backend.before_execute(move || {
            assert!(watching.is_empty());
        });

        let result = exec
            .execute(
                "cancel_req_not_supported",
                "select name from tables",
                &no_params(),
                &StringRowsTransformer,
                RoutingPolicy::Default,
            )
            .unwrap();
        assert_eq!(result.unwrap(), vec!["KEPT"]);
    }

    #[test]
    fn test_io_marker_in_cause_chain_is_a_timeout() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_failure(BackendError::with_source(
            "query failed",
            BackendError::new(format!("{}: connection is closed", BACKEND_IO_ERROR_MARKER)),
        ));
        let (exec, _) = executor(Arc::clone(&backend));

        let result = exec.execute(
            "req-4",
            "select 1",
            &no_params(),
            &StringRowsTransformer,
            RoutingPolicy::Default,
        );
        assert!(matches!(result, Err(Error::DatabaseTimeout)));
        // resources are still released on the failure path
        assert_eq!(backend.statements_closed(), 1);
        assert_eq!(backend.connections_closed(), 1);
    }

    #[test]
    fn test_other_failures_surface_as_service_errors() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_failure(BackendError::new("division by zero"));
        let (exec, _) = executor(Arc::clone(&backend));

        let result = exec.execute(
            "req-5",
            "select 1",
            &no_params(),
            &StringRowsTransformer,
            RoutingPolicy::Default,
        );
        assert!(matches!(result, Err(Error::Service(_))));
    }

    #[test]
    fn test_batch_runs_every_query_and_merges() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_column(&["A_RAW_01"]);
        backend.push_column(&["B_RAW_01"]);
        let (exec, registry) = executor(Arc::clone(&backend));

        let result = exec
            .execute_batch(
                "req-6",
                &["select name from a", "select name from b"],
                &no_params(),
                &StringRowsTransformer,
                RoutingPolicy::RoundRobin,
            )
            .unwrap();
        assert_eq!(result.unwrap(), vec!["A_RAW_01", "B_RAW_01"]);
        assert_eq!(backend.connections_opened(), 2);
        assert_eq!(backend.connections_closed(), 2);
        assert_eq!(backend.rows_closed(), 2);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_batch_cancelled_during_first_query_stops_the_batch() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_column(&["A_RAW_01"]);
        backend.push_column(&["B_RAW_01"]);
        let (exec, registry) = executor(Arc::clone(&backend));

        // the cancellation path fires while the first statement is executing
        let racing = Arc::clone(&registry);
        backend.before_execute(move || {
            racing.cancel("req-b");
        });

        let result = exec
            .execute_batch(
                "req-b",
                &["select name from a", "select name from b"],
                &no_params(),
                &StringRowsTransformer,
                RoutingPolicy::Default,
            )
            .unwrap();
        assert!(result.is_none());
        // the second query never runs once the first was cancelled
        assert_eq!(backend.queries_executed(), 1);
        assert_eq!(backend.connections_opened(), 1);
        assert!(backend.statements()[0].was_cancelled());
        assert_eq!(backend.connections_closed(), 1);
        assert_eq!(backend.rows_closed(), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_metadata_store_execution_uses_secondary_connection() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_column(&["VERSION_1"]);
        let (exec, _) = executor(Arc::clone(&backend));

        let result = exec
            .execute_on_metadata_store(
                "req-7",
                "select versionid from versions",
                &no_params(),
                &StringRowsTransformer,
            )
            .unwrap();
        assert_eq!(result.unwrap(), vec!["VERSION_1"]);
        assert_eq!(backend.metadata_connections_opened(), 1);
    }

    #[test]
    fn test_execute_update_reports_affected_rows() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_rows(vec![vec![None], vec![None], vec![None]]);
        let (exec, registry) = executor(Arc::clone(&backend));

        let affected = exec
            .execute_update("req-8", "delete from t where a = :a", &{
                let mut p = HashMap::new();
                p.insert("a".to_string(), BindValue::int(1));
                p
            })
            .unwrap();
        assert_eq!(affected, Some(3));
        assert!(registry.is_empty());
        assert_eq!(backend.metadata_connections_opened(), 1);
        assert_eq!(backend.statements_closed(), 1);
    }

    #[test]
    fn test_execute_update_honors_pending_cancellation() {
        let backend = Arc::new(ScriptedBackend::new());
        let (exec, registry) = executor(Arc::clone(&backend));
        registry.mark_cancel_failed("req-9");

        let affected = exec
            .execute_update("req-9", "delete from t", &no_params())
            .unwrap();
        assert!(affected.is_none());
        assert_eq!(backend.queries_executed(), 0);
    }

    #[test]
    fn test_bind_values_reach_the_statement() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_column(&[]);
        let (exec, _) = executor(Arc::clone(&backend));

        let mut params = HashMap::new();
        params.insert("dateFrom".to_string(), BindValue::string("2024-03-01 00:00:00"));
        params.insert("dateTo".to_string(), BindValue::string("2024-03-02 00:00:00"));
        exec.execute(
            "req-10",
            "select t from p where s >= :dateFrom and e <= :dateTo",
            &params,
            &StringRowsTransformer,
            RoutingPolicy::Default,
        )
        .unwrap();

        let stmt = &backend.statements()[0];
        assert_eq!(stmt.sql(), "select t from p where s >= ? and e <= ?");
        assert_eq!(stmt.bound(1).unwrap(), "2024-03-01 00:00:00");
        assert_eq!(stmt.bound(2).unwrap(), "2024-03-02 00:00:00");
    }
}
