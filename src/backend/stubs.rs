//! In-memory stub implementations of the backend traits
//!
//! These implementations are intended for unit testing without a live
//! database, and for prototyping resource handling. A [`ScriptedBackend`]
//! hands out connections whose statements consume a queue of scripted
//! outcomes (row sets or failures) and record everything that happened to
//! them: queries executed, values bound, cancellations, and how many of each
//! resource were opened and closed.
//!
//! **Not suitable for production use**: nothing is ever sent to a database.

use crate::backend::{
    BackendError, Connection, ConnectionRouter, RoutingPolicy, Rows, Statement,
};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// One scripted statement outcome
enum ScriptedOutcome {
    Rows(Vec<Vec<Option<String>>>),
    Failure(BackendError),
}

type ExecuteHook = Box<dyn Fn() + Send + Sync>;

/// Shared recording state behind a [`ScriptedBackend`]
#[derive(Default)]
struct ScriptState {
    outcomes: Mutex<VecDeque<ScriptedOutcome>>,
    before_execute: Mutex<Option<ExecuteHook>>,
    statements: Mutex<Vec<Arc<ScriptedStatement>>>,
    queries_executed: AtomicUsize,
    connections_opened: AtomicUsize,
    connections_closed: AtomicUsize,
    metadata_connections_opened: AtomicUsize,
    statements_closed: AtomicUsize,
    rows_closed: AtomicUsize,
}

/// Connection router whose statements replay scripted outcomes
#[derive(Default)]
pub struct ScriptedBackend {
    state: Arc<ScriptState>,
}

impl ScriptedBackend {
    /// Create a backend with an empty script; unscripted executions yield
    /// empty row sets
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a row set as the outcome of the next unscripted execution
    pub fn push_rows(&self, rows: Vec<Vec<Option<String>>>) {
        self.state
            .outcomes
            .lock()
            .push_back(ScriptedOutcome::Rows(rows));
    }

    /// Queue a single-column row set, one row per value
    pub fn push_column(&self, values: &[&str]) {
        self.push_rows(
            values
                .iter()
                .map(|v| vec![Some(v.to_string())])
                .collect(),
        );
    }

    /// Queue a failure as the outcome of the next execution
    pub fn push_failure(&self, error: BackendError) {
        self.state
            .outcomes
            .lock()
            .push_back(ScriptedOutcome::Failure(error));
    }

    /// Run a hook just before every statement execution; used to provoke
    /// races deterministically
    pub fn before_execute(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.state.before_execute.lock() = Some(Box::new(hook));
    }

    /// Every statement prepared so far, in preparation order
    pub fn statements(&self) -> Vec<Arc<ScriptedStatement>> {
        self.state.statements.lock().clone()
    }

    /// Number of statement executions attempted
    pub fn queries_executed(&self) -> usize {
        self.state.queries_executed.load(Ordering::SeqCst)
    }

    /// Number of event-store connections handed out
    pub fn connections_opened(&self) -> usize {
        self.state.connections_opened.load(Ordering::SeqCst)
    }

    /// Number of connections closed
    pub fn connections_closed(&self) -> usize {
        self.state.connections_closed.load(Ordering::SeqCst)
    }

    /// Number of metadata-store connections handed out
    pub fn metadata_connections_opened(&self) -> usize {
        self.state.metadata_connections_opened.load(Ordering::SeqCst)
    }

    /// Number of statements closed
    pub fn statements_closed(&self) -> usize {
        self.state.statements_closed.load(Ordering::SeqCst)
    }

    /// Number of row cursors closed
    pub fn rows_closed(&self) -> usize {
        self.state.rows_closed.load(Ordering::SeqCst)
    }
}

impl ConnectionRouter for ScriptedBackend {
    fn connection(&self, _policy: RoutingPolicy) -> Result<Box<dyn Connection>, BackendError> {
        self.state.connections_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedConnection {
            state: Arc::clone(&self.state),
        }))
    }

    fn metadata_store_connection(&self) -> Result<Box<dyn Connection>, BackendError> {
        self.state
            .metadata_connections_opened
            .fetch_add(1, Ordering::SeqCst);
        self.state.connections_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedConnection {
            state: Arc::clone(&self.state),
        }))
    }
}

/// Connection handed out by a [`ScriptedBackend`]
pub struct ScriptedConnection {
    state: Arc<ScriptState>,
}

impl Connection for ScriptedConnection {
    fn prepare(&self, sql: &str) -> Result<Arc<dyn Statement>, BackendError> {
        let statement = Arc::new(ScriptedStatement {
            sql: sql.to_string(),
            binds: Mutex::new(HashMap::new()),
            cancelled: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            state: Arc::clone(&self.state),
        });
        self.state.statements.lock().push(Arc::clone(&statement));
        Ok(statement)
    }

    fn close(&self) -> Result<(), BackendError> {
        self.state.connections_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Statement that records binds and replays scripted outcomes
pub struct ScriptedStatement {
    sql: String,
    binds: Mutex<HashMap<usize, String>>,
    cancelled: AtomicBool,
    closed: AtomicBool,
    state: Arc<ScriptState>,
}

impl ScriptedStatement {
    /// SQL text this statement was prepared with
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Rendered value bound at `position`, if any
    pub fn bound(&self, position: usize) -> Option<String> {
        self.binds.lock().get(&position).cloned()
    }

    /// Number of positions with a bound value
    pub fn bound_count(&self) -> usize {
        self.binds.lock().len()
    }

    /// Whether [`Statement::cancel`] was invoked
    pub fn was_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn record_bind(&self, position: usize, rendered: String) -> Result<(), BackendError> {
        if self.is_closed() {
            return Err(BackendError::new("bind on closed statement"));
        }
        self.binds.lock().insert(position, rendered);
        Ok(())
    }

    fn next_outcome(&self) -> Result<Box<dyn Rows>, BackendError> {
        if let Some(hook) = self.state.before_execute.lock().as_ref() {
            hook();
        }
        self.state.queries_executed.fetch_add(1, Ordering::SeqCst);
        match self.state.outcomes.lock().pop_front() {
            Some(ScriptedOutcome::Rows(rows)) => Ok(Box::new(ScriptedRows {
                rows,
                cursor: None,
                state: Arc::clone(&self.state),
            })),
            Some(ScriptedOutcome::Failure(error)) => Err(error),
            None => Ok(Box::new(ScriptedRows {
                rows: Vec::new(),
                cursor: None,
                state: Arc::clone(&self.state),
            })),
        }
    }
}

impl Statement for ScriptedStatement {
    fn bind_string(&self, position: usize, value: &str) -> Result<(), BackendError> {
        self.record_bind(position, value.to_string())
    }

    fn bind_long(&self, position: usize, value: i64) -> Result<(), BackendError> {
        self.record_bind(position, value.to_string())
    }

    fn bind_int(&self, position: usize, value: i32) -> Result<(), BackendError> {
        self.record_bind(position, value.to_string())
    }

    fn bind_null(&self, position: usize, type_code: i32) -> Result<(), BackendError> {
        self.record_bind(position, format!("NULL({})", type_code))
    }

    fn bind_untyped_null(&self, position: usize) -> Result<(), BackendError> {
        self.record_bind(position, "NULL".to_string())
    }

    fn bind_large_text(&self, position: usize, value: &str) -> Result<(), BackendError> {
        self.record_bind(position, value.to_string())
    }

    fn execute_query(&self) -> Result<Box<dyn Rows>, BackendError> {
        self.next_outcome()
    }

    fn execute_update(&self) -> Result<u64, BackendError> {
        let mut rows = self.next_outcome()?;
        let mut affected = 0;
        while rows.next_row()? {
            affected += 1;
        }
        Ok(affected)
    }

    fn cancel(&self) -> Result<(), BackendError> {
        self.cancelled.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn close(&self) -> Result<(), BackendError> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.state.statements_closed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Cursor over scripted rows
pub struct ScriptedRows {
    rows: Vec<Vec<Option<String>>>,
    cursor: Option<usize>,
    state: Arc<ScriptState>,
}

impl Rows for ScriptedRows {
    fn next_row(&mut self) -> Result<bool, BackendError> {
        let next = self.cursor.map_or(0, |c| c + 1);
        if next < self.rows.len() {
            self.cursor = Some(next);
            Ok(true)
        } else {
            self.cursor = Some(self.rows.len());
            Ok(false)
        }
    }

    fn column_string(&self, index: usize) -> Result<Option<String>, BackendError> {
        let row = self
            .cursor
            .and_then(|c| self.rows.get(c))
            .ok_or_else(|| BackendError::new("no current row"))?;
        row.get(index)
            .cloned()
            .ok_or_else(|| BackendError::new(format!("no column {}", index)))
    }

    fn close(&mut self) -> Result<(), BackendError> {
        self.state.rows_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_rows_replay_in_order() {
        let backend = ScriptedBackend::new();
        backend.push_column(&["TABLE_A", "TABLE_B"]);

        let conn = backend.connection(RoutingPolicy::Default).unwrap();
        let stmt = conn.prepare("select name from t").unwrap();
        let mut rows = stmt.execute_query().unwrap();

        assert!(rows.next_row().unwrap());
        assert_eq!(rows.column_string(0).unwrap().unwrap(), "TABLE_A");
        assert!(rows.next_row().unwrap());
        assert_eq!(rows.column_string(0).unwrap().unwrap(), "TABLE_B");
        assert!(!rows.next_row().unwrap());
    }

    #[test]
    fn test_unscripted_execution_yields_no_rows() {
        let backend = ScriptedBackend::new();
        let conn = backend.connection(RoutingPolicy::Default).unwrap();
        let stmt = conn.prepare("select 1").unwrap();
        let mut rows = stmt.execute_query().unwrap();
        assert!(!rows.next_row().unwrap());
    }

    #[test]
    fn test_scripted_failure() {
        let backend = ScriptedBackend::new();
        backend.push_failure(BackendError::new("boom"));
        let conn = backend.connection(RoutingPolicy::Default).unwrap();
        let stmt = conn.prepare("select 1").unwrap();
        assert!(stmt.execute_query().is_err());
    }

    #[test]
    fn test_resource_counters() {
        let backend = ScriptedBackend::new();
        let conn = backend.connection(RoutingPolicy::Default).unwrap();
        let stmt = conn.prepare("select 1").unwrap();
        stmt.close().unwrap();
        stmt.close().unwrap();
        conn.close().unwrap();
        assert_eq!(backend.connections_opened(), 1);
        assert_eq!(backend.connections_closed(), 1);
        // double close counted once
        assert_eq!(backend.statements_closed(), 1);
    }
}
