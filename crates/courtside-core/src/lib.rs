//! # courtside-core
//!
//! Core crate for Courtside, a real-time game spectating and multiplayer
//! synchronization server. Contains configuration schemas, typed
//! identifiers, the logging bootstrap, and the unified error system.
//!
//! This crate has **no** internal dependencies on other Courtside crates.

pub mod config;
pub mod error;
pub mod logging;
pub mod result;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
