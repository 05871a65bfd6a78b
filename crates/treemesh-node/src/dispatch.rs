//! Pure inbound message triage.
//!
//! Classifies a decoded envelope into the action the dispatcher takes,
//! extracted from [`crate::mesh`] so the routing decisions can be tested
//! without a table or transport.

use treemesh_core::{ChipId, Envelope, MessageKind};

/// What to do with one inbound envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAction {
    /// Hand to the node-sync handler together with the owning record.
    NodeSync,
    /// Hand to the time-sync handler together with the owning record.
    TimeSync,
    /// Unicast addressed to this node: deliver to the application.
    DeliverLocal,
    /// Unicast for someone else: forward the original bytes toward the
    /// destination.
    Forward(ChipId),
    /// Broadcast: flood to every other link, then deliver locally.
    Flood,
    /// The `type` field holds a value this engine does not know.
    UnknownKind(u8),
    /// A unicast without a `dest` field cannot be routed.
    MissingDestination,
}

/// Classify a decoded envelope against this node's own identity.
pub fn classify(envelope: &Envelope, own_chip_id: ChipId) -> RouteAction {
    let Some(kind) = envelope.kind() else {
        return RouteAction::UnknownKind(envelope.kind_raw);
    };
    match kind {
        MessageKind::NodeSyncRequest | MessageKind::NodeSyncReply => RouteAction::NodeSync,
        MessageKind::TimeSync => RouteAction::TimeSync,
        MessageKind::Broadcast => RouteAction::Flood,
        MessageKind::Single => match envelope.dest {
            Some(dest) if dest == own_chip_id => RouteAction::DeliverLocal,
            Some(dest) => RouteAction::Forward(dest),
            None => RouteAction::MissingDestination,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWN: ChipId = ChipId(42);

    #[test]
    fn sync_kinds_route_to_their_handlers() {
        let request = Envelope::of_kind(MessageKind::NodeSyncRequest, ChipId(5));
        let reply = Envelope::of_kind(MessageKind::NodeSyncReply, ChipId(5));
        let time = Envelope::of_kind(MessageKind::TimeSync, ChipId(5));
        assert_eq!(classify(&request, OWN), RouteAction::NodeSync);
        assert_eq!(classify(&reply, OWN), RouteAction::NodeSync);
        assert_eq!(classify(&time, OWN), RouteAction::TimeSync);
    }

    #[test]
    fn single_for_us_delivers_locally() {
        let envelope = Envelope::single(ChipId(5), OWN, "hi");
        assert_eq!(classify(&envelope, OWN), RouteAction::DeliverLocal);
    }

    #[test]
    fn single_for_other_forwards() {
        let envelope = Envelope::single(ChipId(5), ChipId(7), "hi");
        assert_eq!(classify(&envelope, OWN), RouteAction::Forward(ChipId(7)));
    }

    #[test]
    fn single_without_dest_is_unroutable() {
        let mut envelope = Envelope::single(ChipId(5), ChipId(7), "hi");
        envelope.dest = None;
        assert_eq!(classify(&envelope, OWN), RouteAction::MissingDestination);
    }

    #[test]
    fn broadcast_floods() {
        let envelope = Envelope::broadcast(ChipId(5), "hi");
        assert_eq!(classify(&envelope, OWN), RouteAction::Flood);
    }

    #[test]
    fn unknown_kind_is_reported_with_its_value() {
        let mut envelope = Envelope::broadcast(ChipId(5), "hi");
        envelope.kind_raw = 3;
        assert_eq!(classify(&envelope, OWN), RouteAction::UnknownKind(3));
    }
}
