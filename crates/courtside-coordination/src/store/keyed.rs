//! The lease store itself — a sharded map of per-user lockable slots.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use courtside_core::error::AppError;
use courtside_core::result::AppResult;
use courtside_core::types::UserId;

use super::lease::Lease;

/// One tracked entry: a nullable value plus an eviction marker.
///
/// `retired` is set while the final lease is still held, so waiters queued
/// on the slot can tell a destroyed entry from a live one and retry
/// against the registry.
pub(crate) struct Slot<T> {
    pub(crate) value: Option<T>,
    pub(crate) retired: bool,
}

impl<T> Slot<T> {
    fn empty() -> Self {
        Self {
            value: None,
            retired: false,
        }
    }
}

pub(crate) type SlotRef<T> = Arc<tokio::sync::Mutex<Slot<T>>>;

/// Async-safe map from user id to a mutable entity with exclusive
/// per-key leases.
///
/// Acquisition suspends until the key's lock is free; leases release on
/// drop, on every exit path. Operations on the same key serialize in
/// acquisition order; operations on different keys run fully in parallel.
pub struct LeaseStore<T> {
    slots: Arc<DashMap<UserId, SlotRef<T>>>,
}

impl<T> LeaseStore<T> {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self {
            slots: Arc::new(DashMap::new()),
        }
    }

    /// Acquires the exclusive lease for `key`, suspending while another
    /// caller holds it.
    ///
    /// Fails with the `NotFound` kind if no entry exists for the key.
    pub async fn acquire(&self, key: UserId) -> AppResult<Lease<T>> {
        loop {
            let slot = match self.slots.get(&key) {
                Some(entry) => entry.value().clone(),
                None => {
                    return Err(AppError::not_found(format!("no entry for user {key}")));
                }
            };

            let guard = Arc::clone(&slot).lock_owned().await;
            if guard.retired {
                // the entry was destroyed while we waited; re-check the registry
                continue;
            }
            return Ok(Lease::new(guard, slot, Arc::clone(&self.slots), key));
        }
    }

    /// Acquires the exclusive lease for `key`, installing an empty entry
    /// first if none exists.
    ///
    /// The installed entry carries no value until the holder sets one; an
    /// entry destroyed by a previous holder is observed as fresh.
    pub async fn acquire_or_create(&self, key: UserId) -> Lease<T> {
        loop {
            let slot = self
                .slots
                .entry(key)
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(Slot::empty())))
                .value()
                .clone();

            let guard = Arc::clone(&slot).lock_owned().await;
            if guard.retired {
                continue;
            }
            return Lease::new(guard, slot, Arc::clone(&self.slots), key);
        }
    }

    /// Best-effort read of the last released value for `key`.
    ///
    /// Non-blocking: an entry whose lease is currently held reads as
    /// absent. For diagnostics and tests only — never use this to drive
    /// exclusivity decisions.
    pub fn peek(&self, key: UserId) -> Option<T>
    where
        T: Clone,
    {
        let slot = self.slots.get(&key)?.value().clone();
        let guard = slot.try_lock().ok()?;
        guard.value.clone()
    }

    /// Point-in-time collection of all (key, value) pairs.
    ///
    /// Awaits each entry's lease briefly, so the caller must not hold a
    /// lease on this store. Entries created after the call starts may be
    /// missed; entries without a value are skipped.
    pub async fn snapshot(&self) -> Vec<(UserId, T)>
    where
        T: Clone,
    {
        let slots: Vec<(UserId, SlotRef<T>)> = self
            .slots
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();

        let mut entries = Vec::with_capacity(slots.len());
        for (key, slot) in slots {
            let guard = slot.lock().await;
            if !guard.retired {
                if let Some(value) = guard.value.clone() {
                    entries.push((key, value));
                }
            }
        }
        entries
    }

    /// Drops all entries unconditionally.
    ///
    /// Process/test reset only, never steady-state; no leases may be
    /// outstanding.
    pub fn clear(&self) {
        for entry in self.slots.iter() {
            if let Ok(mut slot) = entry.value().try_lock() {
                slot.value = None;
                slot.retired = true;
            }
        }
        self.slots.clear();
        debug!("lease store cleared");
    }

    /// Number of tracked keys, for diagnostics.
    pub fn entry_count(&self) -> usize {
        self.slots.len()
    }
}

impl<T> Default for LeaseStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for LeaseStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeaseStore")
            .field("entries", &self.slots.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use courtside_core::error::ErrorKind;

    use super::*;

    #[tokio::test]
    async fn test_acquire_missing_key_fails() {
        let store: LeaseStore<u32> = LeaseStore::new();
        let err = store.acquire(UserId::new(1)).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_create_set_and_reacquire() {
        let store: LeaseStore<u32> = LeaseStore::new();

        let mut lease = store.acquire_or_create(UserId::new(7)).await;
        assert!(lease.get().is_none());
        lease.set(41);
        *lease.get_mut().unwrap() += 1;
        drop(lease);

        let lease = store.acquire(UserId::new(7)).await.unwrap();
        assert_eq!(lease.get(), Some(&42));
        assert_eq!(store.entry_count(), 1);
    }

    #[tokio::test]
    async fn test_destroy_evicts_entry() {
        let store: LeaseStore<u32> = LeaseStore::new();

        let mut lease = store.acquire_or_create(UserId::new(7)).await;
        lease.set(1);
        lease.destroy();
        drop(lease);

        assert_eq!(store.peek(UserId::new(7)), None);
        assert_eq!(store.entry_count(), 0);
        let err = store.acquire(UserId::new(7)).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_same_key_operations_serialize() {
        let store: Arc<LeaseStore<u32>> = Arc::new(LeaseStore::new());
        let key = UserId::new(9);

        let mut lease = store.acquire_or_create(key).await;
        lease.set(0);
        drop(lease);

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            tasks.push(tokio::spawn(async move {
                for _ in 0..50 {
                    let mut lease = store.acquire(key).await.unwrap();
                    let current = *lease.get().unwrap();
                    tokio::task::yield_now().await;
                    lease.set(current + 1);
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(store.peek(key), Some(8 * 50));
    }

    #[tokio::test]
    async fn test_waiter_queued_behind_destroy_sees_fresh_entry() {
        let store: Arc<LeaseStore<u32>> = Arc::new(LeaseStore::new());
        let key = UserId::new(3);

        let mut lease = store.acquire_or_create(key).await;
        lease.set(99);

        let waiter = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                let lease = store.acquire_or_create(key).await;
                lease.get().copied()
            })
        };

        // let the waiter queue up on the held slot before destroying it
        tokio::time::sleep(Duration::from_millis(20)).await;
        lease.destroy();
        drop(lease);

        assert_eq!(waiter.await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_peek_while_leased_reads_absent() {
        let store: LeaseStore<u32> = LeaseStore::new();
        let key = UserId::new(5);

        let mut lease = store.acquire_or_create(key).await;
        lease.set(10);
        assert_eq!(store.peek(key), None);
        drop(lease);
        assert_eq!(store.peek(key), Some(10));
    }

    #[tokio::test]
    async fn test_snapshot_collects_populated_entries() {
        let store: LeaseStore<u32> = LeaseStore::new();
        for id in 1..=3u64 {
            let mut lease = store.acquire_or_create(UserId::new(id)).await;
            lease.set(id as u32 * 10);
        }
        // an empty entry should not appear in the snapshot
        let lease = store.acquire_or_create(UserId::new(4)).await;
        drop(lease);

        let mut snapshot = store.snapshot().await;
        snapshot.sort_by_key(|(key, _)| *key);
        assert_eq!(
            snapshot,
            vec![
                (UserId::new(1), 10),
                (UserId::new(2), 20),
                (UserId::new(3), 30),
            ]
        );
    }

    #[tokio::test]
    async fn test_clear_resets_store() {
        let store: LeaseStore<u32> = LeaseStore::new();
        for id in 1..=3u64 {
            let mut lease = store.acquire_or_create(UserId::new(id)).await;
            lease.set(1);
        }
        store.clear();
        assert_eq!(store.entry_count(), 0);
        assert_eq!(store.peek(UserId::new(1)), None);
    }
}
