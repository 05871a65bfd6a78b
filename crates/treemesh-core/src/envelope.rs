//! Wire envelope codec.
//!
//! Every message on a link is one self-delimiting JSON object; there is no
//! additional length prefix. The `type` discriminants are fixed by the wire
//! protocol and must not be renumbered.
//!
//! Sync messages carry fields this crate does not interpret (clock samples,
//! topology exchange state). Those round-trip untouched through
//! [`Envelope::extra`], so the sync engine sees exactly what the peer sent.

use serde::{Deserialize, Serialize};

use crate::error::CodecError;
use crate::subtree::SubtreeNode;
use crate::types::ChipId;

/// Classified message kind, mapped from the numeric `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Clock exchange, handled by the time-sync engine.
    TimeSync,
    /// Identity/topology exchange opener, handled by the node-sync engine.
    NodeSyncRequest,
    /// Identity/topology exchange answer, handled by the node-sync engine.
    NodeSyncReply,
    /// Flooded to every node in the mesh.
    Broadcast,
    /// Addressed to exactly one node.
    Single,
}

impl MessageKind {
    /// Map a wire discriminant to a kind. Unknown values yield `None`;
    /// the dispatcher reports and drops those.
    #[must_use]
    pub fn from_wire(value: u8) -> Option<Self> {
        match value {
            4 => Some(Self::TimeSync),
            5 => Some(Self::NodeSyncRequest),
            6 => Some(Self::NodeSyncReply),
            8 => Some(Self::Broadcast),
            9 => Some(Self::Single),
            _ => None,
        }
    }

    /// The numeric value carried in the `type` field.
    #[must_use]
    pub fn wire(self) -> u8 {
        match self {
            Self::TimeSync => 4,
            Self::NodeSyncRequest => 5,
            Self::NodeSyncReply => 6,
            Self::Broadcast => 8,
            Self::Single => 9,
        }
    }

    /// Whether this kind is consumed by one of the sync engines rather
    /// than routed.
    #[must_use]
    pub fn is_sync(self) -> bool {
        matches!(
            self,
            Self::TimeSync | Self::NodeSyncRequest | Self::NodeSyncReply
        )
    }
}

/// One wire message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Raw wire discriminant. Kept numeric so envelopes with unknown types
    /// still decode structurally; classify with [`Envelope::kind`].
    #[serde(rename = "type")]
    pub kind_raw: u8,
    /// Originating node.
    pub from: ChipId,
    /// Destination node. Present on `Single` messages only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dest: Option<ChipId>,
    /// Application payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    /// Topology snapshot attached to node-sync messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subs: Option<Vec<SubtreeNode>>,
    /// Sync-specific fields, preserved verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Envelope {
    /// Build a unicast application message.
    pub fn single(from: ChipId, dest: ChipId, msg: impl Into<String>) -> Self {
        Self {
            kind_raw: MessageKind::Single.wire(),
            from,
            dest: Some(dest),
            msg: Some(msg.into()),
            subs: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Build a broadcast application message.
    pub fn broadcast(from: ChipId, msg: impl Into<String>) -> Self {
        Self {
            kind_raw: MessageKind::Broadcast.wire(),
            from,
            dest: None,
            msg: Some(msg.into()),
            subs: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Build a bare envelope of the given kind; sync engines fill in
    /// their own fields through `subs` and `extra`.
    pub fn of_kind(kind: MessageKind, from: ChipId) -> Self {
        Self {
            kind_raw: kind.wire(),
            from,
            dest: None,
            msg: None,
            subs: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Classify the wire discriminant. `None` for unknown values.
    #[must_use]
    pub fn kind(&self) -> Option<MessageKind> {
        MessageKind::from_wire(self.kind_raw)
    }

    /// Decode one envelope from raw bytes.
    pub fn decode(raw: &[u8]) -> Result<Self, CodecError> {
        serde_json::from_slice(raw).map_err(CodecError::Decode)
    }

    /// Encode to the wire representation.
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(self).map_err(CodecError::Encode)
    }
}
