//! Lifecycle filter enforcing "last connect wins" per (user, subsystem).

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, info, warn};

use courtside_core::error::{AppError, ErrorKind};
use courtside_core::result::AppResult;
use courtside_core::types::{ConnectionId, SubsystemKind, TokenId, UserId};

use crate::metrics::CoordinationMetrics;
use crate::store::LeaseStore;

use super::record::ConnectionRecord;

/// Identity of one lifecycle callback: who is calling, over which
/// connection, into which subsystem.
///
/// Authentication establishes all fields before any callback fires.
#[derive(Debug, Clone)]
pub struct CallContext {
    /// The authenticated user.
    pub user_id: UserId,
    /// The subsystem endpoint being addressed.
    pub subsystem: SubsystemKind,
    /// The transport connection the call arrived on.
    pub connection_id: ConnectionId,
    /// The login token the connection authenticated with.
    pub token_id: Option<TokenId>,
}

impl CallContext {
    /// Creates a context without a token.
    pub fn new(
        user_id: UserId,
        subsystem: SubsystemKind,
        connection_id: impl Into<ConnectionId>,
    ) -> Self {
        Self {
            user_id,
            subsystem,
            connection_id: connection_id.into(),
            token_id: None,
        }
    }

    /// Attaches the login token identifier.
    pub fn with_token(mut self, token_id: TokenId) -> Self {
        self.token_id = Some(token_id);
        self
    }
}

/// Cross-cutting filter around every subsystem endpoint's lifecycle.
///
/// A new connection immediately supersedes authority without contacting
/// the old one; the old connection is never forcibly dropped at the
/// transport layer, but its further invocations are rejected and its
/// eventual disconnect is ignored. Distinct subsystems for the same user
/// are tracked fully independently.
#[derive(Debug)]
pub struct ConnectionLimiter {
    /// Per-user connection records, shared across all subsystem endpoints.
    connections: Arc<LeaseStore<ConnectionRecord>>,
    /// Lifecycle counters.
    metrics: Arc<CoordinationMetrics>,
}

impl ConnectionLimiter {
    /// Creates a limiter over an injected record store.
    pub fn new(
        connections: Arc<LeaseStore<ConnectionRecord>>,
        metrics: Arc<CoordinationMetrics>,
    ) -> Self {
        Self {
            connections,
            metrics,
        }
    }

    /// Admits a connection, making it the authoritative one for its
    /// (user, subsystem) pair, then runs the endpoint's own connect logic.
    ///
    /// Always succeeds at the concurrency layer: the newest connection
    /// wins unconditionally.
    pub async fn on_connected<F, Fut>(&self, ctx: &CallContext, next: F) -> AppResult<()>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<()>>,
    {
        {
            let mut lease = self.connections.acquire_or_create(ctx.user_id).await;
            let record = lease.get_or_insert_with(ConnectionRecord::new);
            let superseded = record.bind(ctx.subsystem, ctx.connection_id.clone(), ctx.token_id);

            match superseded {
                Some(old) => {
                    info!(
                        user_id = %ctx.user_id,
                        subsystem = %ctx.subsystem,
                        old_connection = %old,
                        new_connection = %ctx.connection_id,
                        "connection superseded by newer login"
                    );
                    self.metrics.connection_superseded();
                }
                None => {
                    info!(
                        user_id = %ctx.user_id,
                        subsystem = %ctx.subsystem,
                        connection_id = %ctx.connection_id,
                        "connection established"
                    );
                }
            }
        }

        self.metrics.connection_opened();
        next().await
    }

    /// Runs an endpoint method if the calling connection is still the
    /// authoritative one for its (user, subsystem) pair.
    ///
    /// Fails with the `ConcurrentConnection` kind otherwise, without
    /// invoking `next`; the transport surfaces that as a rejected call and
    /// keeps the connection open.
    pub async fn on_invocation<F, Fut, R>(&self, ctx: &CallContext, next: F) -> AppResult<R>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<R>>,
    {
        {
            let lease = match self.connections.acquire(ctx.user_id).await {
                Ok(lease) => lease,
                Err(err) if err.kind == ErrorKind::NotFound => {
                    self.metrics.invocation_rejected();
                    return Err(self.rejected(ctx));
                }
                Err(err) => return Err(err),
            };

            let authoritative = lease
                .get()
                .is_some_and(|record| record.is_authoritative(ctx.subsystem, &ctx.connection_id));
            if !authoritative {
                self.metrics.invocation_rejected();
                return Err(self.rejected(ctx));
            }
        }

        next().await
    }

    /// Processes a disconnect: removes the caller's binding if it is still
    /// the authoritative one, evicting the record once empty. Stale
    /// disconnects are no-ops. The endpoint's own disconnect logic runs
    /// regardless.
    pub async fn on_disconnected<F, Fut>(&self, ctx: &CallContext, next: F) -> AppResult<()>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<()>>,
    {
        match self.connections.acquire(ctx.user_id).await {
            Ok(mut lease) => {
                let removed = lease
                    .get_mut()
                    .map(|record| record.release_if_bound(ctx.subsystem, &ctx.connection_id))
                    .unwrap_or(false);

                if removed {
                    info!(
                        user_id = %ctx.user_id,
                        subsystem = %ctx.subsystem,
                        connection_id = %ctx.connection_id,
                        "connection closed"
                    );
                    self.metrics.connection_closed();

                    if lease.get().is_none_or(ConnectionRecord::is_empty) {
                        lease.destroy();
                        self.metrics.record_evicted();
                        debug!(user_id = %ctx.user_id, "connection record evicted");
                    }
                } else {
                    debug!(
                        user_id = %ctx.user_id,
                        subsystem = %ctx.subsystem,
                        connection_id = %ctx.connection_id,
                        "stale disconnect ignored"
                    );
                    self.metrics.stale_disconnect();
                }
            }
            Err(err) if err.kind == ErrorKind::NotFound => {
                debug!(
                    user_id = %ctx.user_id,
                    subsystem = %ctx.subsystem,
                    "disconnect for user with no connection record"
                );
            }
            Err(err) => return Err(err),
        }

        next().await
    }

    /// Users with at least one live connection, for fan-out actions.
    pub async fn active_users(&self) -> Vec<UserId> {
        self.connections
            .snapshot()
            .await
            .into_iter()
            .map(|(user_id, _)| user_id)
            .collect()
    }

    /// Point-in-time view of every user's connection record, for admin
    /// monitoring.
    pub async fn connection_snapshot(&self) -> Vec<(UserId, ConnectionRecord)> {
        self.connections.snapshot().await
    }

    fn rejected(&self, ctx: &CallContext) -> AppError {
        warn!(
            user_id = %ctx.user_id,
            subsystem = %ctx.subsystem,
            connection_id = %ctx.connection_id,
            "invocation from non-authoritative connection rejected"
        );
        AppError::concurrent_connection(format!(
            "connection {} is no longer authoritative for user {} on {}",
            ctx.connection_id, ctx.user_id, ctx.subsystem
        ))
    }
}
