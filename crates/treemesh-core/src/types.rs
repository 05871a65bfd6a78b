//! Newtype wrappers for mesh identity and time fields.
//!
//! These types prevent accidental mixing of node identities, transport
//! tokens, and timestamps, which all reduce to plain integers on the wire.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Unique numeric identity of a mesh node.
///
/// `ChipId(0)` means "not yet identified": a freshly connected peer whose
/// node sync has not completed. Unidentified peers are excluded from
/// topology announcements.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
#[must_use]
pub struct ChipId(pub u32);

impl ChipId {
    /// The placeholder identity carried by a record before node sync.
    pub const UNIDENTIFIED: ChipId = ChipId(0);

    #[must_use]
    pub fn is_unidentified(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ChipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for ChipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChipId({})", self.0)
    }
}

/// Opaque identity token of an underlying transport connection.
///
/// Issued by the transport layer; the core only ever compares tokens for
/// reverse lookup, it never duplicates or interprets them.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[must_use]
pub struct SocketToken(pub u64);

impl fmt::Display for SocketToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sock#{}", self.0)
    }
}

/// A point on the mesh's shared logical clock, in microseconds.
///
/// The clock itself is owned by the time-sync subsystem; the core only
/// reads it and compares points.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Default)]
#[must_use]
pub struct NodeTime(pub u64);

impl NodeTime {
    /// Microseconds elapsed since `earlier`, saturating at zero if the
    /// clock was adjusted backwards by a time sync.
    #[must_use]
    pub fn since(self, earlier: NodeTime) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl fmt::Display for NodeTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}us", self.0)
    }
}
