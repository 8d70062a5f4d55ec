//! Ownership contract for hub-managed state.

use courtside_core::types::ConnectionId;

/// Per-user state owned by exactly one connection at a time.
///
/// Subsystems define their own payload; the hub only needs to know which
/// connection owns it. Ownership transfers are exclusive — a later
/// connection claiming the user's state replaces the old instance, never
/// merges with it.
pub trait SessionState: Send + 'static {
    /// The connection that currently owns this state.
    fn connection_id(&self) -> &ConnectionId;
}
