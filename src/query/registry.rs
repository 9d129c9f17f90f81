//! Request lifecycle registry
//!
//! Maps externally supplied request identifiers to the live statement handle
//! executing on their behalf, so an independent cancellation path can
//! interrupt an in-flight query. A cancel that finds no live handle is
//! recorded as a timestamped cancel-failed marker; the executor consults the
//! marker before running and aborts pre-empted requests.
//!
//! Markers are evicted opportunistically when a new marker is inserted;
//! there is no background sweeper, which keeps eviction deterministic.
//! Single-key operations on both maps are linearizable without a lock shared
//! across unrelated request identifiers; only the marker map takes a
//! second-tier lock, for the cross-key eviction sweep.

use crate::backend::Statement;
use crate::config::Config;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Concurrent registry of in-flight requests and failed cancellations
pub struct RequestRegistry {
    live: DashMap<String, Arc<dyn Statement>>,
    cancel_failed: Mutex<HashMap<String, Instant>>,
    cancel_timeout: Duration,
}

impl RequestRegistry {
    /// Create a registry retaining cancel-failed markers for `cancel_timeout`
    pub fn new(cancel_timeout: Duration) -> Self {
        Self {
            live: DashMap::new(),
            cancel_failed: Mutex::new(HashMap::new()),
            cancel_timeout,
        }
    }

    /// Create a registry using the configured cancel-request timeout
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.cancel_timeout())
    }

    /// Register the statement executing for `request_id`.
    ///
    /// Returns false (a no-op, never an error) for an empty identifier.
    pub fn register(&self, request_id: &str, statement: Arc<dyn Statement>) -> bool {
        if request_id.is_empty() {
            return false;
        }
        self.live.insert(request_id.to_string(), statement);
        true
    }

    /// The live statement registered for `request_id`, if any
    pub fn lookup(&self, request_id: &str) -> Option<Arc<dyn Statement>> {
        if request_id.is_empty() {
            return None;
        }
        self.live.get(request_id).map(|entry| Arc::clone(&entry))
    }

    /// Whether a live statement is registered for `request_id`
    pub fn contains(&self, request_id: &str) -> bool {
        !request_id.is_empty() && self.live.contains_key(request_id)
    }

    /// Remove the live registration for `request_id`, if present
    pub fn remove(&self, request_id: &str) {
        if request_id.is_empty() {
            return;
        }
        self.live.remove(request_id);
    }

    /// True when no request has a live registration
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Record that a cancellation arrived for `request_id` with no live
    /// handle to act on.
    ///
    /// Evicts every marker whose age has reached the cancel timeout before
    /// inserting the new one, bounding the map without a sweep thread.
    pub fn mark_cancel_failed(&self, request_id: &str) {
        if request_id.is_empty() {
            return;
        }
        let now = Instant::now();
        let mut markers = self.cancel_failed.lock();
        markers.retain(|_, created| now.duration_since(*created) < self.cancel_timeout);
        markers.insert(request_id.to_string(), now);
    }

    /// Whether a cancel-failed marker exists for `request_id`
    pub fn is_cancel_failed(&self, request_id: &str) -> bool {
        !request_id.is_empty() && self.cancel_failed.lock().contains_key(request_id)
    }

    /// Drop the cancel-failed marker for `request_id`, if present
    pub fn clear_cancel_failed(&self, request_id: &str) {
        if request_id.is_empty() {
            return;
        }
        self.cancel_failed.lock().remove(request_id);
    }

    /// Cancel the request's in-flight execution.
    ///
    /// With a live handle: ask the backend to interrupt it and remove the
    /// registration, so the executing thread's post-check discards any
    /// result that still arrives. Without one: record a cancel-failed marker
    /// so a subsequent execution for the same identifier aborts before
    /// running. Returns whether a live handle was found.
    pub fn cancel(&self, request_id: &str) -> bool {
        if request_id.is_empty() {
            return false;
        }
        match self.lookup(request_id) {
            Some(statement) => {
                if let Err(e) = statement.cancel() {
                    warn!(request_id, error = %e, "backend cancel failed");
                }
                self.remove(request_id);
                debug!(request_id, "cancelled in-flight execution");
                true
            }
            None => {
                self.mark_cancel_failed(request_id);
                debug!(request_id, "no live execution, recorded cancel-failed marker");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::stubs::ScriptedBackend;
    use crate::backend::{ConnectionRouter, RoutingPolicy};

    fn statement(backend: &ScriptedBackend) -> Arc<dyn Statement> {
        let conn = backend.connection(RoutingPolicy::Default).unwrap();
        conn.prepare("select 1").unwrap()
    }

    fn registry() -> RequestRegistry {
        RequestRegistry::new(Duration::from_secs(600))
    }

    #[test]
    fn test_register_lookup_remove() {
        let backend = ScriptedBackend::new();
        let reg = registry();
        assert!(reg.is_empty());

        assert!(reg.register("req-1", statement(&backend)));
        assert!(reg.contains("req-1"));
        assert!(reg.lookup("req-1").is_some());
        assert!(!reg.contains("req-2"));

        reg.remove("req-1");
        assert!(!reg.contains("req-1"));
        assert!(reg.is_empty());
    }

    #[test]
    fn test_empty_id_is_rejected_quietly() {
        let backend = ScriptedBackend::new();
        let reg = registry();
        assert!(!reg.register("", statement(&backend)));
        assert!(!reg.contains(""));
        assert!(reg.lookup("").is_none());
        reg.mark_cancel_failed("");
        assert!(!reg.is_cancel_failed(""));
    }

    #[test]
    fn test_cancel_failed_marker_roundtrip() {
        let reg = registry();
        reg.mark_cancel_failed("req-9");
        assert!(reg.is_cancel_failed("req-9"));
        reg.clear_cancel_failed("req-9");
        assert!(!reg.is_cancel_failed("req-9"));
    }

    #[test]
    fn test_marker_eviction_on_insert() {
        let reg = RequestRegistry::new(Duration::from_millis(10));
        reg.mark_cancel_failed("old");
        std::thread::sleep(Duration::from_millis(20));
        // inserting for a different id sweeps the expired marker
        reg.mark_cancel_failed("new");
        assert!(!reg.is_cancel_failed("old"));
        assert!(reg.is_cancel_failed("new"));
    }

    #[test]
    fn test_fresh_marker_survives_sweep() {
        let reg = RequestRegistry::new(Duration::from_secs(600));
        reg.mark_cancel_failed("a");
        reg.mark_cancel_failed("b");
        assert!(reg.is_cancel_failed("a"));
        assert!(reg.is_cancel_failed("b"));
    }

    #[test]
    fn test_cancel_live_handle_interrupts_and_deregisters() {
        let backend = ScriptedBackend::new();
        let reg = registry();
        reg.register("req-3", statement(&backend));

        assert!(reg.cancel("req-3"));
        assert!(backend.statements()[0].was_cancelled());
        assert!(!reg.contains("req-3"));
        assert!(!reg.is_cancel_failed("req-3"));
    }

    #[test]
    fn test_cancel_without_live_handle_marks_failed() {
        let reg = registry();
        assert!(!reg.cancel("req-4"));
        assert!(reg.is_cancel_failed("req-4"));
    }

    #[test]
    fn test_concurrent_register_and_cancel() {
        let backend = Arc::new(ScriptedBackend::new());
        let reg = Arc::new(registry());

        let mut handles = Vec::new();
        for worker in 0..8 {
            let reg = Arc::clone(&reg);
            let backend = Arc::clone(&backend);
            handles.push(std::thread::spawn(move || {
                let id = format!("req-{}", worker);
                for _ in 0..100 {
                    let conn = backend.connection(RoutingPolicy::Default).unwrap();
                    let stmt = conn.prepare("select 1").unwrap();
                    reg.register(&id, stmt);
                    reg.cancel(&id);
                    reg.remove(&id);
                    reg.clear_cancel_failed(&id);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(reg.is_empty());
    }
}
