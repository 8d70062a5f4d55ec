//! Ownership and cleanup tests for stateful session hubs.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use courtside_core::error::{AppError, ErrorKind};
use courtside_core::result::AppResult;
use courtside_core::types::{ConnectionId, UserId};
use courtside_coordination::hub::{SessionState, StatefulSessionHub};
use courtside_coordination::store::LeaseStore;

/// Minimal spectating-style session payload.
#[derive(Debug, Clone)]
struct RelaySession {
    user_id: UserId,
    connection_id: ConnectionId,
    frames_relayed: u32,
}

impl SessionState for RelaySession {
    fn connection_id(&self) -> &ConnectionId {
        &self.connection_id
    }
}

/// Test hub that counts teardowns and can be told to fail them.
struct RelayHub {
    states: LeaseStore<RelaySession>,
    teardowns: AtomicUsize,
    fail_teardown: AtomicBool,
}

impl RelayHub {
    fn new() -> Self {
        Self {
            states: LeaseStore::new(),
            teardowns: AtomicUsize::new(0),
            fail_teardown: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl StatefulSessionHub for RelayHub {
    type State = RelaySession;

    fn states(&self) -> &LeaseStore<RelaySession> {
        &self.states
    }

    fn new_state(&self, user_id: UserId, connection_id: &ConnectionId) -> RelaySession {
        RelaySession {
            user_id,
            connection_id: connection_id.clone(),
            frames_relayed: 0,
        }
    }

    async fn on_cleanup(&self, state: &mut RelaySession) -> AppResult<()> {
        let _ = state;
        self.teardowns.fetch_add(1, Ordering::SeqCst);
        if self.fail_teardown.load(Ordering::SeqCst) {
            return Err(AppError::internal("relay teardown failed"));
        }
        Ok(())
    }
}

fn conn(id: &str) -> ConnectionId {
    ConnectionId::from(id)
}

#[tokio::test]
async fn test_claim_creates_state_owned_by_caller() {
    let hub = RelayHub::new();
    let user = UserId::new(1234);
    let abcd = conn("abcd");

    hub.handle_connect(user, &abcd).await.unwrap();

    let mut lease = hub.claim_state(user, &abcd).await.unwrap();
    let state = lease.get_mut().unwrap();
    assert_eq!(state.user_id, user);
    assert_eq!(state.connection_id, abcd);
    state.frames_relayed += 10;
    drop(lease);

    // reclaiming from the same connection sees the mutation
    let lease = hub.claim_state(user, &abcd).await.unwrap();
    assert_eq!(lease.get().unwrap().frames_relayed, 10);
}

#[tokio::test]
async fn test_claim_by_foreign_connection_fails() {
    let hub = RelayHub::new();
    let user = UserId::new(1234);
    let abcd = conn("abcd");
    let efgh = conn("efgh");

    let lease = hub.claim_state(user, &abcd).await.unwrap();
    drop(lease);

    let err = hub.claim_state(user, &efgh).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidState);

    // the original owner is untouched
    let lease = hub.claim_state(user, &abcd).await.unwrap();
    assert_eq!(lease.get().unwrap().connection_id, abcd);
}

#[tokio::test]
async fn test_disconnect_by_owner_destroys_state() {
    let hub = RelayHub::new();
    let user = UserId::new(1234);
    let abcd = conn("abcd");

    hub.claim_state(user, &abcd).await.unwrap();
    hub.handle_disconnect(user, &abcd).await.unwrap();

    assert_eq!(hub.teardowns.load(Ordering::SeqCst), 1);
    assert_eq!(hub.states().entry_count(), 0);
    let err = hub.state_of(user).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
}

#[tokio::test]
async fn test_disconnect_of_superseded_connection_leaves_new_state() {
    let hub = RelayHub::new();
    let user = UserId::new(1234);
    let abcd = conn("abcd");
    let efgh = conn("efgh");

    // first connection claims state, then reconnection takes over
    hub.claim_state(user, &abcd).await.unwrap();
    hub.handle_connect(user, &efgh).await.unwrap();
    assert_eq!(hub.teardowns.load(Ordering::SeqCst), 1);
    hub.claim_state(user, &efgh).await.unwrap();

    // the old connection's disconnect finally arrives
    hub.handle_disconnect(user, &abcd).await.unwrap();

    // no further teardown ran and the new owner's state survived
    assert_eq!(hub.teardowns.load(Ordering::SeqCst), 1);
    let lease = hub.state_of(user).await.unwrap();
    assert_eq!(lease.get().unwrap().connection_id, efgh);
}

#[tokio::test]
async fn test_connect_cleans_up_stale_state_before_admission() {
    let hub = RelayHub::new();
    let user = UserId::new(1234);
    let abcd = conn("abcd");
    let efgh = conn("efgh");

    hub.claim_state(user, &abcd).await.unwrap();

    // connect-path cleanup destroys state regardless of who owns it
    hub.handle_connect(user, &efgh).await.unwrap();
    assert_eq!(hub.teardowns.load(Ordering::SeqCst), 1);
    assert_eq!(hub.states().entry_count(), 0);

    let lease = hub.claim_state(user, &efgh).await.unwrap();
    assert_eq!(lease.get().unwrap().connection_id, efgh);
}

#[tokio::test]
async fn test_failing_teardown_still_destroys_state() {
    let hub = RelayHub::new();
    let user = UserId::new(1234);
    let abcd = conn("abcd");

    hub.claim_state(user, &abcd).await.unwrap();
    hub.fail_teardown.store(true, Ordering::SeqCst);

    let err = hub.handle_disconnect(user, &abcd).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Internal);

    // destruction is unconditional once attempted
    assert_eq!(hub.states().entry_count(), 0);
}

#[tokio::test]
async fn test_failing_connect_cleanup_is_fatal() {
    let hub = RelayHub::new();
    let user = UserId::new(1234);
    let abcd = conn("abcd");
    let efgh = conn("efgh");

    hub.claim_state(user, &abcd).await.unwrap();
    hub.fail_teardown.store(true, Ordering::SeqCst);

    // the new connection must be aborted: exclusive-state guarantees
    // cannot be restored
    let err = hub.handle_connect(user, &efgh).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Internal);
}

#[tokio::test]
async fn test_connect_with_no_existing_state_is_clean() {
    let hub = RelayHub::new();
    let user = UserId::new(1234);

    hub.handle_connect(user, &conn("abcd")).await.unwrap();
    assert_eq!(hub.teardowns.load(Ordering::SeqCst), 0);

    hub.handle_disconnect(user, &conn("abcd")).await.unwrap();
    assert_eq!(hub.teardowns.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_peer_state_inspection() {
    let hub = RelayHub::new();
    let watcher = UserId::new(1);
    let target = UserId::new(2);

    let mut lease = hub.claim_state(target, &conn("tttt")).await.unwrap();
    lease.get_mut().unwrap().frames_relayed = 77;
    drop(lease);

    // another user's handler inspects the target's state
    let lease = hub.state_of(target).await.unwrap();
    assert_eq!(lease.get().unwrap().frames_relayed, 77);
    drop(lease);

    let err = hub.state_of(watcher).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
}

#[tokio::test]
async fn test_all_states_fan_out_and_reset() {
    let hub = RelayHub::new();
    for user in 1..=3u64 {
        hub.claim_state(UserId::new(user), &conn("c")).await.unwrap();
    }

    let mut states = hub.all_states().await;
    states.sort_by_key(|(user_id, _)| *user_id);
    assert_eq!(states.len(), 3);
    assert_eq!(states[2].0, UserId::new(3));

    hub.reset();
    assert!(hub.all_states().await.is_empty());
}
