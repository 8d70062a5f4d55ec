//! RAII lease over a single store entry.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::OwnedMutexGuard;

use courtside_core::types::UserId;

use super::keyed::{Slot, SlotRef};

/// Exclusive right to read and mutate one keyed entity.
///
/// The lock releases when the lease drops, on every exit path. A lease
/// marked with [`destroy`](Lease::destroy) evicts the whole entry from the
/// store at release time.
pub struct Lease<T> {
    guard: OwnedMutexGuard<Slot<T>>,
    slot: SlotRef<T>,
    slots: Arc<DashMap<UserId, SlotRef<T>>>,
    key: UserId,
    destroy_on_release: bool,
}

impl<T> Lease<T> {
    pub(crate) fn new(
        guard: OwnedMutexGuard<Slot<T>>,
        slot: SlotRef<T>,
        slots: Arc<DashMap<UserId, SlotRef<T>>>,
        key: UserId,
    ) -> Self {
        Self {
            guard,
            slot,
            slots,
            key,
            destroy_on_release: false,
        }
    }

    /// The key this lease is held for.
    pub fn key(&self) -> UserId {
        self.key
    }

    /// The current value, if the entry has been populated.
    pub fn get(&self) -> Option<&T> {
        self.guard.value.as_ref()
    }

    /// Mutable access to the current value.
    pub fn get_mut(&mut self) -> Option<&mut T> {
        self.guard.value.as_mut()
    }

    /// Replaces the value, returning a reference to it.
    pub fn set(&mut self, value: T) -> &mut T {
        self.guard.value.insert(value)
    }

    /// Returns the value, populating it first if the entry is empty.
    pub fn get_or_insert_with(&mut self, init: impl FnOnce() -> T) -> &mut T {
        self.guard.value.get_or_insert_with(init)
    }

    /// Removes and returns the value, leaving the entry empty.
    pub fn take(&mut self) -> Option<T> {
        self.guard.value.take()
    }

    /// Marks the entry for eviction: when this lease releases, the key is
    /// removed from the store entirely.
    pub fn destroy(&mut self) {
        self.destroy_on_release = true;
    }
}

impl<T> Drop for Lease<T> {
    fn drop(&mut self) {
        if self.destroy_on_release {
            self.guard.value = None;
            self.guard.retired = true;
            // unlink before the lock frees so queued waiters re-resolve
            // the key instead of resurrecting the retired slot
            self.slots
                .remove_if(&self.key, |_, existing| Arc::ptr_eq(existing, &self.slot));
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Lease<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lease")
            .field("key", &self.key)
            .field("value", &self.guard.value)
            .field("destroy_on_release", &self.destroy_on_release)
            .finish()
    }
}
