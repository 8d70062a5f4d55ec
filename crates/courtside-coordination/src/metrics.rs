//! Coordination core metrics.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Counters over connection lifecycle decisions.
///
/// Advisory only; nothing in the coordination logic reads these back.
#[derive(Debug)]
pub struct CoordinationMetrics {
    /// Total connections admitted.
    pub connections_opened: AtomicU64,
    /// Connections that superseded an older one for the same
    /// (user, subsystem) pair.
    pub connections_superseded: AtomicU64,
    /// Authoritative disconnects processed.
    pub connections_closed: AtomicU64,
    /// Invocations rejected because the caller was no longer
    /// authoritative.
    pub invocations_rejected: AtomicU64,
    /// Disconnects ignored because a newer connection had taken over.
    pub stale_disconnects: AtomicU64,
    /// Connection records evicted after their last entry was removed.
    pub records_evicted: AtomicU64,
    /// When this collector was created.
    started_at: DateTime<Utc>,
}

impl CoordinationMetrics {
    /// Create new zeroed metrics.
    pub fn new() -> Self {
        Self {
            connections_opened: AtomicU64::new(0),
            connections_superseded: AtomicU64::new(0),
            connections_closed: AtomicU64::new(0),
            invocations_rejected: AtomicU64::new(0),
            stale_disconnects: AtomicU64::new(0),
            records_evicted: AtomicU64::new(0),
            started_at: Utc::now(),
        }
    }

    /// Record an admitted connection.
    pub fn connection_opened(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a connection superseding an older one.
    pub fn connection_superseded(&self) {
        self.connections_superseded.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an authoritative disconnect.
    pub fn connection_closed(&self) {
        self.connections_closed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a rejected invocation.
    pub fn invocation_rejected(&self) {
        self.invocations_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an ignored stale disconnect.
    pub fn stale_disconnect(&self) {
        self.stale_disconnects.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an evicted connection record.
    pub fn record_evicted(&self) {
        self.records_evicted.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_opened: self.connections_opened.load(Ordering::Relaxed),
            connections_superseded: self.connections_superseded.load(Ordering::Relaxed),
            connections_closed: self.connections_closed.load(Ordering::Relaxed),
            invocations_rejected: self.invocations_rejected.load(Ordering::Relaxed),
            stale_disconnects: self.stale_disconnects.load(Ordering::Relaxed),
            records_evicted: self.records_evicted.load(Ordering::Relaxed),
            started_at: self.started_at,
            captured_at: Utc::now(),
        }
    }
}

impl Default for CoordinationMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializable metrics snapshot for admin/diagnostic surfaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Total connections admitted.
    pub connections_opened: u64,
    /// Connections that superseded an older one.
    pub connections_superseded: u64,
    /// Authoritative disconnects processed.
    pub connections_closed: u64,
    /// Invocations rejected as non-authoritative.
    pub invocations_rejected: u64,
    /// Stale disconnects ignored.
    pub stale_disconnects: u64,
    /// Connection records evicted.
    pub records_evicted: u64,
    /// When the collector was created.
    pub started_at: DateTime<Utc>,
    /// When this snapshot was taken.
    pub captured_at: DateTime<Utc>,
}
