//! Hub base for subsystems with authoritative single-owner user state.

use async_trait::async_trait;
use tracing::{debug, error, info};

use courtside_core::error::{AppError, ErrorKind};
use courtside_core::result::AppResult;
use courtside_core::types::{ConnectionId, UserId};

use crate::store::{Lease, LeaseStore};

use super::state::SessionState;

/// Lifecycle base for subsystems that keep per-user state owned by a
/// single connection.
///
/// Per-connection state machine: no state → owned by one connection → no
/// state. Implementors supply their own [`LeaseStore`], a factory for
/// fresh state, and optionally a teardown hook; the provided methods
/// enforce the ownership and cleanup discipline.
#[async_trait]
pub trait StatefulSessionHub: Send + Sync {
    /// The per-user payload this hub manages.
    type State: SessionState;

    /// The hub's own state store, one instance per hub, injected at
    /// construction.
    fn states(&self) -> &LeaseStore<Self::State>;

    /// Fresh state owned by the claiming connection.
    fn new_state(&self, user_id: UserId, connection_id: &ConnectionId) -> Self::State;

    /// Teardown hook invoked with the about-to-be-destroyed state as sole
    /// input. Failures are logged and do not prevent destruction.
    async fn on_cleanup(&self, state: &mut Self::State) -> AppResult<()> {
        let _ = state;
        Ok(())
    }

    /// Admits a connection to this hub.
    ///
    /// Any pre-existing state for the user — left by a previous connection
    /// that disconnected uncleanly — is cleaned up first. Cleanup failure
    /// is fatal: the error propagates and the connection must be aborted,
    /// since accepting it without exclusive-state guarantees is unsafe.
    async fn handle_connect(&self, user_id: UserId, connection_id: &ConnectionId) -> AppResult<()> {
        info!(user_id = %user_id, connection_id = %connection_id, "hub connection established");

        if let Err(err) = self.cleanup_state(user_id, connection_id, false).await {
            error!(
                user_id = %user_id,
                connection_id = %connection_id,
                error = %err,
                "state cleanup on connect failed, aborting connection"
            );
            return Err(err);
        }
        Ok(())
    }

    /// Processes a disconnect, cleaning up the user's state unless a newer
    /// connection already owns it.
    async fn handle_disconnect(
        &self,
        user_id: UserId,
        connection_id: &ConnectionId,
    ) -> AppResult<()> {
        info!(user_id = %user_id, connection_id = %connection_id, "hub connection closed");
        self.cleanup_state(user_id, connection_id, true).await
    }

    /// Tears down and destroys the user's state.
    ///
    /// Absent state is a no-op. On the disconnect path, state owned by a
    /// different connection is left untouched — a newer connection claimed
    /// it. Otherwise the teardown hook runs exactly once and the entity is
    /// destroyed even if the hook fails; the lease releases on every path.
    async fn cleanup_state(
        &self,
        user_id: UserId,
        connection_id: &ConnectionId,
        is_disconnect: bool,
    ) -> AppResult<()> {
        let mut lease = match self.states().acquire(user_id).await {
            Ok(lease) => lease,
            Err(err) if err.kind == ErrorKind::NotFound => {
                // no state to clean up
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        let Some(state) = lease.get_mut() else {
            return Ok(());
        };

        debug!(user_id = %user_id, is_disconnect, "cleaning up user state");

        if is_disconnect && state.connection_id() != connection_id {
            debug!(
                user_id = %user_id,
                owner = %state.connection_id(),
                "state owned by a newer connection, leaving it"
            );
            return Ok(());
        }

        let outcome = self.on_cleanup(state).await;
        lease.destroy();

        match &outcome {
            Ok(()) => info!(user_id = %user_id, "user state cleaned up"),
            Err(err) => error!(
                user_id = %user_id,
                error = %err,
                "state teardown failed, entry destroyed regardless"
            ),
        }
        outcome
    }

    /// Acquires the calling connection's own state, creating it if absent.
    ///
    /// Fails with the `InvalidState` kind when the user's state is owned
    /// by a different connection. On success the caller holds the lease
    /// and may mutate the state until release.
    async fn claim_state(
        &self,
        user_id: UserId,
        connection_id: &ConnectionId,
    ) -> AppResult<Lease<Self::State>> {
        let mut lease = self.states().acquire_or_create(user_id).await;

        if let Some(state) = lease.get() {
            if state.connection_id() != connection_id {
                debug!(
                    user_id = %user_id,
                    connection_id = %connection_id,
                    owner = %state.connection_id(),
                    "state claim rejected, owned by another connection"
                );
                return Err(AppError::invalid_state(format!(
                    "state for user {user_id} is owned by another connection"
                )));
            }
        } else {
            lease.set(self.new_state(user_id, connection_id));
        }

        Ok(lease)
    }

    /// Acquires another user's state read-only-by-convention, for
    /// subsystems inspecting peers.
    async fn state_of(&self, user_id: UserId) -> AppResult<Lease<Self::State>> {
        self.states().acquire(user_id).await
    }

    /// Point-in-time view of every user's state, for fan-out actions.
    async fn all_states(&self) -> Vec<(UserId, Self::State)>
    where
        Self::State: Clone,
    {
        self.states().snapshot().await
    }

    /// Drops all tracked state. Test harness reset only.
    fn reset(&self) {
        self.states().clear();
    }
}
