//! Test doubles for the collaborator seams.
//!
//! Shared by the in-crate unit tests and the integration tests; usable by
//! downstream crates that embed the engine and want to exercise their own
//! wiring without sockets.

use std::collections::HashSet;

use treemesh_core::{ChipId, Envelope, MessageKind, NodeTime, SocketToken, SubtreeNode};

use crate::connection::{ConnectionRecord, SyncStatus};
use crate::handlers::{MeshCallbacks, SyncEngine, Transport, TransportError};

/// Transport double that records every frame handed to it.
#[derive(Default)]
pub struct MockTransport {
    transmitted: Vec<(SocketToken, Vec<u8>)>,
    closed: HashSet<SocketToken>,
    disconnected: Vec<SocketToken>,
    fail_next: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `transmit` call fail with a write error.
    pub fn fail_next_transmit(&mut self) {
        self.fail_next = true;
    }

    /// Simulate the remote end (or the OS) closing a connection.
    pub fn mark_closed(&mut self, socket: SocketToken) {
        self.closed.insert(socket);
    }

    /// Frames transmitted on one socket, in order.
    #[must_use]
    pub fn sent_frames(&self, socket: SocketToken) -> Vec<Vec<u8>> {
        self.transmitted
            .iter()
            .filter(|(s, _)| *s == socket)
            .map(|(_, frame)| frame.clone())
            .collect()
    }

    /// Every transmitted frame with its socket, in order.
    #[must_use]
    pub fn all_frames(&self) -> &[(SocketToken, Vec<u8>)] {
        &self.transmitted
    }

    /// Sockets torn down through `disconnect`, in order.
    #[must_use]
    pub fn disconnected(&self) -> &[SocketToken] {
        &self.disconnected
    }
}

impl Transport for MockTransport {
    fn transmit(&mut self, socket: SocketToken, frame: &[u8]) -> Result<(), TransportError> {
        if self.fail_next {
            self.fail_next = false;
            return Err(TransportError::Write("injected failure".to_string()));
        }
        if self.closed.contains(&socket) {
            return Err(TransportError::Closed);
        }
        self.transmitted.push((socket, frame.to_vec()));
        Ok(())
    }

    fn is_closed(&self, socket: SocketToken) -> bool {
        self.closed.contains(&socket)
    }

    fn disconnect(&mut self, socket: SocketToken) {
        self.closed.insert(socket);
        self.disconnected.push(socket);
    }
}

/// Sync-engine double with a manually advanced clock.
///
/// Node sync adopts the peer's `from` as the record's identity and the
/// envelope's `subs` as its subtree, marks the exchange complete, and
/// answers a request with a reply — the shape of the real exchange,
/// without the merge logic.
pub struct ScriptedSync {
    pub now: NodeTime,
    pub own_chip_id: ChipId,
    pub adopt: bool,
    pub node_syncs_started: Vec<SocketToken>,
    pub time_syncs_started: Vec<SocketToken>,
    pub node_syncs_handled: usize,
    pub time_syncs_handled: usize,
}

impl ScriptedSync {
    pub fn new(own_chip_id: ChipId) -> Self {
        Self {
            now: NodeTime(0),
            own_chip_id,
            adopt: false,
            node_syncs_started: Vec::new(),
            time_syncs_started: Vec::new(),
            node_syncs_handled: 0,
            time_syncs_handled: 0,
        }
    }

    /// Move the shared clock forward.
    pub fn advance(&mut self, micros: u64) {
        self.now = NodeTime(self.now.0 + micros);
    }
}

impl SyncEngine for ScriptedSync {
    fn current_node_time(&self) -> NodeTime {
        self.now
    }

    fn own_chip_id(&self) -> ChipId {
        self.own_chip_id
    }

    fn start_node_sync(
        &mut self,
        record: &mut ConnectionRecord,
        local_subtree: Vec<SubtreeNode>,
    ) -> Vec<Envelope> {
        self.node_syncs_started.push(record.socket);
        let mut request = Envelope::of_kind(MessageKind::NodeSyncRequest, self.own_chip_id);
        request.subs = Some(local_subtree);
        vec![request]
    }

    fn handle_node_sync(
        &mut self,
        record: &mut ConnectionRecord,
        envelope: &Envelope,
        local_subtree: Vec<SubtreeNode>,
    ) -> Vec<Envelope> {
        self.node_syncs_handled += 1;
        record.chip_id = envelope.from;
        if let Some(subs) = &envelope.subs {
            record.subtree = subs.clone();
        }
        record.node_sync_status = SyncStatus::Complete;

        if envelope.kind() == Some(MessageKind::NodeSyncRequest) {
            record.time_sync_status = SyncStatus::Needed;
            let mut reply = Envelope::of_kind(MessageKind::NodeSyncReply, self.own_chip_id);
            reply.subs = Some(local_subtree);
            vec![reply]
        } else {
            Vec::new()
        }
    }

    fn start_time_sync(
        &mut self,
        record: &mut ConnectionRecord,
    ) -> Vec<Envelope> {
        self.time_syncs_started.push(record.socket);
        vec![Envelope::of_kind(MessageKind::TimeSync, self.own_chip_id)]
    }

    fn handle_time_sync(
        &mut self,
        record: &mut ConnectionRecord,
        _envelope: &Envelope,
    ) -> Vec<Envelope> {
        self.time_syncs_handled += 1;
        record.time_sync_status = SyncStatus::Complete;
        Vec::new()
    }

    fn adoption_decision(&self, _record: &ConnectionRecord) -> bool {
        self.adopt
    }
}

/// Callback double that records every notification.
#[derive(Default)]
pub struct RecordingCallbacks {
    pub received: Vec<(ChipId, String)>,
    pub new_connections: Vec<bool>,
}

impl RecordingCallbacks {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MeshCallbacks for RecordingCallbacks {
    fn on_receive(&mut self, from: ChipId, msg: &str) {
        self.received.push((from, msg.to_string()));
    }

    fn on_new_connection(&mut self, adopted: bool) {
        self.new_connections.push(adopted);
    }
}
