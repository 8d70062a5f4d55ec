//! Subsystem endpoint enumeration.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The logical endpoints a client may hold concurrent connections to.
///
/// Each kind owns unrelated business logic but shares the coordination
/// core; authority is tracked independently per (user, kind) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubsystemKind {
    /// Live gameplay spectating.
    Spectator,
    /// Multiplayer match coordination.
    Multiplayer,
    /// Metadata synchronization (catalog and user status updates).
    Metadata,
}

impl SubsystemKind {
    /// Return the canonical string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Spectator => "spectator",
            Self::Multiplayer => "multiplayer",
            Self::Metadata => "metadata",
        }
    }
}

impl fmt::Display for SubsystemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
