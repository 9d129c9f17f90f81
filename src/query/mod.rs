//! Query construction and execution
//!
//! The pipeline from a named-parameter query template to a transformed
//! result:
//!
//! ```text
//! Query text with :named parameters
//!      │
//!      ▼
//! ┌─────────────┐
//! │   Parse     │  named.rs: rewrite to positional form, index names
//! └─────────────┘
//!      │
//!      ▼
//! ┌─────────────┐
//! │    Bind     │  params.rs: typed values applied by name
//! └─────────────┘
//!      │
//!      ▼
//! ┌─────────────┐
//! │  Register   │  registry.rs: request id → cancellable handle
//! └─────────────┘
//!      │
//!      ▼
//! ┌─────────────┐
//! │  Execute    │  executor.rs: cancellation races, cleanup, classify
//! └─────────────┘
//!      │
//!      ▼
//! ┌─────────────┐
//! │  Transform  │  transform.rs: rows → caller's shape
//! └─────────────┘
//! ```
//!
//! Cancellation is cooperative: a registered statement handle is interrupted
//! through the backend driver; a cancel that arrives before registration is
//! recorded as a cancel-failed marker and pre-empts the next execution for
//! the same request id.

pub mod executor;
pub mod named;
pub mod params;
pub mod registry;
pub mod transform;

pub use executor::{QueryExecutor, CANCEL_UNSUPPORTED};
pub use named::{NamedQuery, NamedStatement};
pub use params::{bind_all, BindValue};
pub use registry::RequestRegistry;
pub use transform::{RowTransformer, StringRowsTransformer};
