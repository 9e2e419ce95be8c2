//! Access modes for shared objects
//!
//! Every operation on a shared object is performed under one of these
//! modes. The mode decides whether the operation goes through conflict
//! detection and whether it logs a compensating action.

use serde::{Deserialize, Serialize};

/// How an iteration touches a shared object
///
/// | Mode | Conflict check | Undo logged |
/// |------|----------------|-------------|
/// | `Unchecked` | no | no |
/// | `Checked` | yes | no |
/// | `UndoOnly` | no | yes |
/// | `Full` | yes | yes |
///
/// `Unchecked` is only valid when the caller already owns the object (for
/// example, traversing a neighborhood after the owning node is held).
/// Misuse is a client bug the runtime cannot detect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    /// No conflict detection, no undo
    Unchecked,
    /// Conflict detection only
    Checked,
    /// Undo logging only
    UndoOnly,
    /// Conflict detection and undo logging
    #[default]
    Full,
}

impl AccessMode {
    /// Whether this mode acquires ownership through the conflict protocol
    #[inline]
    pub fn checks_conflict(self) -> bool {
        matches!(self, AccessMode::Checked | AccessMode::Full)
    }

    /// Whether this mode records a compensating action for mutations
    #[inline]
    pub fn saves_undo(self) -> bool {
        matches!(self, AccessMode::UndoOnly | AccessMode::Full)
    }
}
