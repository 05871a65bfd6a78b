//! Collaborator seams: transport, sync engines, and application callbacks.
//!
//! The engine produces frames and consumes decisions; these traits are
//! where the out-of-scope subsystems plug in. Handlers are registered at
//! construction time and owned by the [`Mesh`](crate::mesh::Mesh), so
//! their lifetime is exactly the engine's.

use treemesh_core::{ChipId, Envelope, NodeTime, SocketToken, SubtreeNode};

use crate::connection::ConnectionRecord;

/// Errors reported by the transport seam.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("socket is closed")]
    Closed,
    #[error("write failed: {0}")]
    Write(String),
}

/// Non-blocking socket layer.
///
/// `transmit` hands one complete frame to the transport; completion is
/// reported back asynchronously through
/// [`Mesh::transmit_complete`](crate::mesh::Mesh::transmit_complete).
pub trait Transport {
    fn transmit(&mut self, socket: SocketToken, frame: &[u8]) -> Result<(), TransportError>;

    /// Whether the transport considers this connection closed. Closed
    /// links are evicted by the next maintenance sweep.
    fn is_closed(&self, socket: SocketToken) -> bool;

    /// Tear the connection down. Idempotent.
    fn disconnect(&mut self, socket: SocketToken);
}

/// The node-sync and time-sync subsystems, plus the identity and clock
/// queries they own.
///
/// Handlers may mutate the record they are handed — identity, subtree,
/// and sync statuses — and return reply envelopes, which the engine
/// encodes and enqueues on the same link. Returning envelopes instead of
/// calling back into the engine keeps every entry point run-to-completion.
pub trait SyncEngine {
    /// Current value of the mesh's shared logical clock.
    fn current_node_time(&self) -> NodeTime;

    /// This node's own identity.
    fn own_chip_id(&self) -> ChipId;

    /// Begin a node identity/topology exchange on this link.
    ///
    /// `local_subtree` is everything reachable from this node *except*
    /// through the link itself, pre-encoded by the engine; the exchange
    /// announces it to the peer.
    fn start_node_sync(
        &mut self,
        record: &mut ConnectionRecord,
        local_subtree: Vec<SubtreeNode>,
    ) -> Vec<Envelope>;

    /// Process a `NODE_SYNC_REQUEST` or `NODE_SYNC_REPLY` from the peer.
    fn handle_node_sync(
        &mut self,
        record: &mut ConnectionRecord,
        envelope: &Envelope,
        local_subtree: Vec<SubtreeNode>,
    ) -> Vec<Envelope>;

    /// Begin a clock exchange on this link.
    fn start_time_sync(&mut self, record: &mut ConnectionRecord) -> Vec<Envelope>;

    /// Process a `TIME_SYNC` from the peer. May shift the shared clock.
    fn handle_time_sync(&mut self, record: &mut ConnectionRecord, envelope: &Envelope)
        -> Vec<Envelope>;

    /// Whether this node adopted the peer's time base; passed through to
    /// the new-connection notification.
    fn adoption_decision(&self, record: &ConnectionRecord) -> bool;
}

/// Application-facing notifications.
pub trait MeshCallbacks {
    /// A message addressed to this node arrived (unicast or broadcast).
    fn on_receive(&mut self, from: ChipId, msg: &str);

    /// Fired once per connection after both sync phases first complete.
    fn on_new_connection(&mut self, adopted: bool);
}
