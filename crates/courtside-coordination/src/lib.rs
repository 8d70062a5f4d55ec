//! # courtside-coordination
//!
//! Concurrency coordination core for Courtside. Provides:
//!
//! - Keyed exclusive-lease store over per-user mutable entities
//! - Connection concurrency limiting ("last connect wins") across
//!   subsystem endpoints
//! - Single-owner per-user session state for stateful subsystems
//! - Engine construction root and coordination counters
//!
//! Everything here is transport-agnostic: the hosting server drives the
//! lifecycle callbacks from whatever wire protocol it speaks.

pub mod engine;
pub mod hub;
pub mod limiter;
pub mod metrics;
pub mod store;

pub use engine::CoordinationEngine;
pub use hub::{SessionState, StatefulSessionHub};
pub use limiter::{CallContext, ConnectionLimiter, ConnectionRecord};
pub use metrics::CoordinationMetrics;
pub use store::{Lease, LeaseStore};
