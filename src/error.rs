//! Error types for the query layer
//!
//! The taxonomy distinguishes failures the caller can act on:
//!
//! - **Invalid invocation** (`InvalidRequest`, `ParameterNotFound`): raised
//!   synchronously before any backend I/O, never retried.
//! - **Backend timeout** (`DatabaseTimeout`): a backend failure whose chained
//!   cause carries the known I/O-timeout marker; rendered to users as a
//!   friendly "query timed out" condition rather than a generic failure.
//! - **Backend failure** (`Service`): every other backend failure, wrapped
//!   with the original cause preserved for diagnostics.
//! - **Configuration**: bad or unreadable configuration.
//!
//! Cancellation is never an error: a cancelled execution yields `Ok(None)`
//! from the executor.

use crate::backend::BackendError;
use thiserror::Error;

/// Marker text identifying a backend I/O timeout in a chained error message.
///
/// A backend failure whose cause chain contains this marker is classified as
/// [`Error::DatabaseTimeout`]; all other backend failures become
/// [`Error::Service`].
pub const BACKEND_IO_ERROR_MARKER: &str = "JZ0C0";

/// Convenience result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the query layer
#[derive(Error, Debug)]
pub enum Error {
    /// The call was malformed before any backend work was attempted
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A bind was attempted for a name the query text does not contain
    #[error("parameter not found: {0}")]
    ParameterNotFound(String),

    /// The backend reported an I/O timeout for the query
    #[error("the database query timed out")]
    DatabaseTimeout,

    /// Any other backend failure, with the original cause preserved
    #[error("service failure: {0}")]
    Service(#[source] BackendError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl From<BackendError> for Error {
    /// Classifies a backend failure.
    ///
    /// The message of every error in the cause chain is checked for the
    /// backend I/O marker; a match means the query timed out on the backend
    /// and is reported as the user-facing [`Error::DatabaseTimeout`].
    fn from(err: BackendError) -> Self {
        if err.chain_contains(BACKEND_IO_ERROR_MARKER) {
            Error::DatabaseTimeout
        } else {
            Error::Service(err)
        }
    }
}
