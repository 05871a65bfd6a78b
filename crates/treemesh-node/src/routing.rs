//! Unicast path lookup, broadcast flooding, and subtree accounting over
//! the connection table.

use treemesh_core::{subtree, CodecError, SubtreeNode};

use crate::table::{ConnId, ConnectionTable};

/// The topology announced to one neighbor: every record except `exclude`,
/// skipping unidentified peers, each re-embedding its own subtree.
///
/// Excluding the link being announced to is what keeps announcements
/// loop-free on a tree: a neighbor is never told about itself or about
/// nodes reachable through it.
#[must_use]
pub fn encode_subtree(table: &ConnectionTable, exclude: Option<ConnId>) -> Vec<SubtreeNode> {
    table
        .iter()
        .filter(|(id, record)| Some(*id) != exclude && !record.chip_id.is_unidentified())
        .map(|(_, record)| SubtreeNode::with_subs(record.chip_id, record.subtree.clone()))
        .collect()
}

/// [`encode_subtree`] rendered to its wire text.
pub fn encode_subtree_text(
    table: &ConnectionTable,
    exclude: Option<ConnId>,
) -> Result<String, CodecError> {
    subtree::to_text(&encode_subtree(table, exclude))
}

/// Total reachable node count used for topology reporting.
#[must_use]
pub fn connection_count(table: &ConnectionTable, exclude: Option<ConnId>) -> usize {
    table.count_excluding(exclude)
}

/// Links a broadcast is flooded onto: every record except the one it
/// arrived on. With tree topology this delivers each broadcast exactly
/// once per node.
#[must_use]
pub fn flood_targets(table: &ConnectionTable, except: Option<ConnId>) -> Vec<ConnId> {
    table
        .iter()
        .map(|(id, _)| id)
        .filter(|id| Some(*id) != except)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionRecord;
    use treemesh_core::{ChipId, NodeTime, SocketToken};

    fn add(table: &mut ConnectionTable, socket: u64, chip: u32) -> ConnId {
        let mut record = ConnectionRecord::new(SocketToken(socket), false, NodeTime(0));
        record.chip_id = ChipId(chip);
        table.insert(record)
    }

    #[test]
    fn encode_skips_excluded_and_unidentified() {
        let mut table = ConnectionTable::new();
        let a = add(&mut table, 1, 5);
        add(&mut table, 2, 9);
        add(&mut table, 3, 0); // still unidentified

        let nodes = encode_subtree(&table, Some(a));
        assert_eq!(nodes, vec![SubtreeNode::leaf(ChipId(9))]);

        let all = encode_subtree(&table, None);
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn encode_reembeds_nested_subtrees() {
        let mut table = ConnectionTable::new();
        let b = add(&mut table, 1, 9);
        table.get_mut(b).unwrap().subtree = vec![SubtreeNode::leaf(ChipId(7))];

        let text = encode_subtree_text(&table, None).unwrap();
        assert_eq!(text, r#"[{"chipId":9,"subs":[{"chipId":7}]}]"#);
    }

    #[test]
    fn subtree_round_trip_matches_count() {
        let mut table = ConnectionTable::new();
        add(&mut table, 1, 5);
        let b = add(&mut table, 2, 9);
        table.get_mut(b).unwrap().subtree = vec![SubtreeNode::with_subs(
            ChipId(7),
            vec![SubtreeNode::leaf(ChipId(3))],
        )];

        let text = encode_subtree_text(&table, None).unwrap();
        assert_eq!(subtree::count_subtree(&text), connection_count(&table, None));
        assert_eq!(connection_count(&table, None), 4);
    }

    #[test]
    fn empty_table_encodes_empty() {
        let table = ConnectionTable::new();
        assert_eq!(encode_subtree_text(&table, None).unwrap(), "[]");
        assert_eq!(connection_count(&table, None), 0);
        assert!(flood_targets(&table, None).is_empty());
    }

    #[test]
    fn flood_excludes_arrival_link_only() {
        let mut table = ConnectionTable::new();
        let a = add(&mut table, 1, 5);
        let b = add(&mut table, 2, 9);
        let c = add(&mut table, 3, 11);

        assert_eq!(flood_targets(&table, Some(b)), vec![a, c]);
        assert_eq!(flood_targets(&table, None), vec![a, b, c]);
    }
}
