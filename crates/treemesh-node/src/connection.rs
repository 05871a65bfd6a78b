//! Per-link connection state.

use std::collections::VecDeque;

use treemesh_core::{ChipId, NodeTime, SocketToken, SubtreeNode};

/// Progress of one synchronization exchange on a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// No exchange required right now.
    NotNeeded,
    /// An exchange should be started on the next maintenance tick.
    Needed,
    /// An exchange was started and its answer is outstanding.
    InProgress,
    /// The exchange has completed at least once.
    Complete,
}

impl SyncStatus {
    /// Whether an exchange is either queued or underway.
    #[must_use]
    pub fn is_pending(self) -> bool {
        matches!(self, Self::Needed | Self::InProgress)
    }
}

/// Mutable state for one established link.
///
/// Records live only inside the [`ConnectionTable`](crate::table::ConnectionTable);
/// everything else refers to them by [`ConnId`](crate::table::ConnId) and
/// re-resolves at each use, so an eviction can never leave a dangling
/// reference behind.
#[derive(Debug)]
pub struct ConnectionRecord {
    /// Identity of the remote node; [`ChipId::UNIDENTIFIED`] until node sync
    /// learns it.
    pub chip_id: ChipId,
    /// Transport token of the underlying connection.
    pub socket: SocketToken,
    /// Whether the local endpoint is the listening (AP) side of this link.
    /// Only used to stagger re-sync timing.
    pub is_access_point_side: bool,
    /// Node time of the last valid inbound envelope.
    pub last_received_at: NodeTime,
    pub node_sync_status: SyncStatus,
    pub time_sync_status: SyncStatus,
    /// True until both sync phases complete once; gates the
    /// new-connection notification.
    pub is_new: bool,
    /// Descendants reachable only through this link.
    pub subtree: Vec<SubtreeNode>,
    pub(crate) send_queue: VecDeque<Vec<u8>>,
    pub(crate) send_ready: bool,
}

impl ConnectionRecord {
    /// State for a freshly established link.
    ///
    /// The connecting (STA) side opens with both sync exchanges flagged
    /// `Needed`, so the first maintenance tick after the connect starts
    /// node sync. The listening (AP) side waits for the peer's request;
    /// its statuses are flipped by the sync engine.
    pub fn new(socket: SocketToken, is_access_point_side: bool, now: NodeTime) -> Self {
        let initial = if is_access_point_side {
            SyncStatus::NotNeeded
        } else {
            SyncStatus::Needed
        };
        Self {
            chip_id: ChipId::UNIDENTIFIED,
            socket,
            is_access_point_side,
            last_received_at: now,
            node_sync_status: initial,
            time_sync_status: initial,
            is_new: true,
            subtree: Vec::new(),
            send_queue: VecDeque::new(),
            send_ready: true,
        }
    }

    /// Number of frames waiting behind the in-flight transmission.
    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.send_queue.len()
    }

    /// Whether no transmission is outstanding on this link.
    #[must_use]
    pub fn is_send_ready(&self) -> bool {
        self.send_ready
    }

    /// The frames currently waiting, oldest first.
    pub fn queued_frames(&self) -> impl Iterator<Item = &[u8]> {
        self.send_queue.iter().map(Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sta_side_starts_with_sync_needed() {
        let record = ConnectionRecord::new(SocketToken(1), false, NodeTime(100));
        assert_eq!(record.node_sync_status, SyncStatus::Needed);
        assert_eq!(record.time_sync_status, SyncStatus::Needed);
        assert!(record.is_new);
        assert!(record.is_send_ready());
        assert!(record.chip_id.is_unidentified());
    }

    #[test]
    fn ap_side_waits_for_peer() {
        let record = ConnectionRecord::new(SocketToken(1), true, NodeTime(100));
        assert_eq!(record.node_sync_status, SyncStatus::NotNeeded);
        assert_eq!(record.time_sync_status, SyncStatus::NotNeeded);
    }

    #[test]
    fn pending_statuses() {
        assert!(SyncStatus::Needed.is_pending());
        assert!(SyncStatus::InProgress.is_pending());
        assert!(!SyncStatus::NotNeeded.is_pending());
        assert!(!SyncStatus::Complete.is_pending());
    }
}
