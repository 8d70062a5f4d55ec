//! Construction root for the coordination core.

use std::sync::Arc;

use tracing::info;

use courtside_core::types::UserId;

use crate::limiter::{ConnectionLimiter, ConnectionRecord};
use crate::metrics::CoordinationMetrics;
use crate::store::LeaseStore;

/// Owns the shared connection record store, the limiter, and the
/// counters.
///
/// Built once at process start and injected wherever needed — there are
/// no process-wide statics anywhere in the core. Subsystem hubs construct
/// their own state stores separately.
#[derive(Clone)]
pub struct CoordinationEngine {
    /// Per-user connection records shared by every subsystem endpoint.
    connections: Arc<LeaseStore<ConnectionRecord>>,
    /// The lifecycle filter.
    limiter: Arc<ConnectionLimiter>,
    /// Lifecycle counters.
    metrics: Arc<CoordinationMetrics>,
}

impl CoordinationEngine {
    /// Creates a new engine with a fresh store and zeroed counters.
    pub fn new() -> Self {
        let metrics = Arc::new(CoordinationMetrics::new());
        let connections = Arc::new(LeaseStore::new());
        let limiter = Arc::new(ConnectionLimiter::new(
            Arc::clone(&connections),
            Arc::clone(&metrics),
        ));

        info!("coordination engine initialized");

        Self {
            connections,
            limiter,
            metrics,
        }
    }

    /// The connection lifecycle filter.
    pub fn limiter(&self) -> &Arc<ConnectionLimiter> {
        &self.limiter
    }

    /// The lifecycle counters.
    pub fn metrics(&self) -> &Arc<CoordinationMetrics> {
        &self.metrics
    }

    /// The underlying connection record store, for diagnostics.
    pub fn connections(&self) -> &Arc<LeaseStore<ConnectionRecord>> {
        &self.connections
    }

    /// Checks whether a user currently has any live connection.
    pub fn is_user_connected(&self, user_id: UserId) -> bool {
        self.connections.peek(user_id).is_some()
    }

    /// Drops all connection records. Test harness reset only.
    pub fn reset(&self) {
        self.connections.clear();
    }
}

impl Default for CoordinationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CoordinationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoordinationEngine")
            .field("tracked_users", &self.connections.entry_count())
            .finish()
    }
}
