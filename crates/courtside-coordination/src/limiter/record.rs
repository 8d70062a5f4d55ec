//! Per-user record of authoritative connections.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use courtside_core::types::{ConnectionId, SubsystemKind, TokenId};

/// Which connection is currently authoritative for each subsystem a user
/// is connected to.
///
/// Created lazily on a user's first connect, mutated on every
/// connect/disconnect, and evicted from the store once empty — an empty
/// record is never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionRecord {
    /// Login token presented on the most recent connect. Stored for a
    /// revocation path outside this core; never compared here.
    token_id: Option<TokenId>,
    /// Subsystem → authoritative connection.
    endpoints: HashMap<SubsystemKind, ConnectionId>,
    /// When the record was first created.
    established_at: DateTime<Utc>,
}

impl ConnectionRecord {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self {
            token_id: None,
            endpoints: HashMap::new(),
            established_at: Utc::now(),
        }
    }

    /// Makes `connection_id` the authoritative connection for
    /// `subsystem`, returning the connection it superseded, if any.
    pub fn bind(
        &mut self,
        subsystem: SubsystemKind,
        connection_id: ConnectionId,
        token_id: Option<TokenId>,
    ) -> Option<ConnectionId> {
        if token_id.is_some() {
            self.token_id = token_id;
        }
        self.endpoints.insert(subsystem, connection_id)
    }

    /// The authoritative connection for `subsystem`, if one is bound.
    pub fn authoritative(&self, subsystem: SubsystemKind) -> Option<&ConnectionId> {
        self.endpoints.get(&subsystem)
    }

    /// Whether `connection_id` is the authoritative connection for
    /// `subsystem`.
    pub fn is_authoritative(&self, subsystem: SubsystemKind, connection_id: &ConnectionId) -> bool {
        self.authoritative(subsystem) == Some(connection_id)
    }

    /// Removes the binding for `subsystem` if it is still held by
    /// `connection_id`. Returns whether a binding was removed; a stale
    /// caller leaves the record untouched.
    pub fn release_if_bound(
        &mut self,
        subsystem: SubsystemKind,
        connection_id: &ConnectionId,
    ) -> bool {
        if self.is_authoritative(subsystem, connection_id) {
            self.endpoints.remove(&subsystem);
            true
        } else {
            false
        }
    }

    /// Whether no subsystem bindings remain.
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Number of subsystems this user currently holds a connection to.
    pub fn endpoint_count(&self) -> usize {
        self.endpoints.len()
    }

    /// Login token of the most recent connect.
    pub fn token_id(&self) -> Option<TokenId> {
        self.token_id
    }

    /// When the record was first created.
    pub fn established_at(&self) -> DateTime<Utc> {
        self.established_at
    }
}

impl Default for ConnectionRecord {
    fn default() -> Self {
        Self::new()
    }
}
