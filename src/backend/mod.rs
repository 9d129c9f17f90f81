//! Data-access traits consumed by the query layer
//!
//! The query layer never talks to a database driver directly; it consumes the
//! narrow trait surface defined here. Production deployments implement these
//! over their driver of choice; [`stubs`] provides in-memory implementations
//! for tests and prototyping.
//!
//! Ownership rules: every connection, statement and row cursor opened during
//! one execute call belongs to that call alone and is released by it on every
//! exit path. Statements are shared with the cancellation path through
//! [`Statement::cancel`], which must be safe to invoke from another thread
//! while `execute_query` is in flight.

pub mod stubs;

use std::sync::Arc;
use thiserror::Error;

/// Failure reported by a backend implementation.
///
/// Carries an optional chained cause, mirroring driver-level error chaining;
/// the executor classifies failures by scanning the chain for the backend
/// I/O marker.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct BackendError {
    message: String,
    #[source]
    source: Option<Box<BackendError>>,
}

impl BackendError {
    /// Create an error with no chained cause
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Create an error chaining an underlying cause
    pub fn with_source(message: impl Into<String>, source: BackendError) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Message of this error alone, without the chain
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether any message in the cause chain contains `marker`
    pub fn chain_contains(&self, marker: &str) -> bool {
        let mut current = Some(self);
        while let Some(err) = current {
            if err.message.contains(marker) {
                return true;
            }
            current = err.source.as_deref();
        }
        false
    }
}

/// Load-balancing hint used when acquiring a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoutingPolicy {
    /// Router's default policy
    #[default]
    Default,
    /// Rotate across backend replicas
    RoundRobin,
    /// Prefer the replica with the fewest open connections
    LeastLoaded,
}

/// Cursor over the rows produced by one statement execution
pub trait Rows: Send {
    /// Advance to the next row; false once the cursor is exhausted
    fn next_row(&mut self) -> Result<bool, BackendError>;

    /// Read column `index` (0-based) of the current row as a string
    fn column_string(&self, index: usize) -> Result<Option<String>, BackendError>;

    /// Release the cursor
    fn close(&mut self) -> Result<(), BackendError>;
}

/// A prepared statement with positional bind points.
///
/// Positions are 1-based, matching the placeholder indices produced by the
/// named-parameter rewrite. Implementations use interior mutability so a
/// statement registered for cancellation can be cancelled from another
/// thread.
pub trait Statement: Send + Sync {
    /// Bind a string value
    fn bind_string(&self, position: usize, value: &str) -> Result<(), BackendError>;

    /// Bind a 64-bit integer
    fn bind_long(&self, position: usize, value: i64) -> Result<(), BackendError>;

    /// Bind a 32-bit integer
    fn bind_int(&self, position: usize, value: i32) -> Result<(), BackendError>;

    /// Bind NULL with an explicit backend type code
    fn bind_null(&self, position: usize, type_code: i32) -> Result<(), BackendError>;

    /// Bind NULL without type information
    fn bind_untyped_null(&self, position: usize) -> Result<(), BackendError>;

    /// Bind a large text (CLOB) value streamed to the backend
    fn bind_large_text(&self, position: usize, value: &str) -> Result<(), BackendError>;

    /// Execute the statement, which must be a query
    fn execute_query(&self) -> Result<Box<dyn Rows>, BackendError>;

    /// Execute the statement, which must be an INSERT/UPDATE/DELETE;
    /// returns the affected row count
    fn execute_update(&self) -> Result<u64, BackendError>;

    /// Ask the backend to interrupt an in-flight execution (best effort)
    fn cancel(&self) -> Result<(), BackendError>;

    /// Release the statement
    fn close(&self) -> Result<(), BackendError>;

    /// Whether the statement has been released
    fn is_closed(&self) -> bool;
}

/// An open backend connection
pub trait Connection: Send + Sync {
    /// Prepare a positional-placeholder statement
    fn prepare(&self, sql: &str) -> Result<Arc<dyn Statement>, BackendError>;

    /// Release the connection
    fn close(&self) -> Result<(), BackendError>;
}

/// Acquires connections, load-balancing across backend replicas
pub trait ConnectionRouter: Send + Sync {
    /// Acquire a connection to the event store under the given policy
    fn connection(&self, policy: RoutingPolicy) -> Result<Box<dyn Connection>, BackendError>;

    /// Acquire a connection to the secondary metadata store
    fn metadata_store_connection(&self) -> Result<Box<dyn Connection>, BackendError>;
}
