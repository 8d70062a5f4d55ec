//! Keyed exclusive-lease store.
//!
//! A [`LeaseStore`] maps user ids to mutable entities. All mutation happens
//! under a per-key exclusive lease; operations on distinct keys never
//! contend with each other.

pub mod keyed;
pub mod lease;

pub use keyed::LeaseStore;
pub use lease::Lease;
