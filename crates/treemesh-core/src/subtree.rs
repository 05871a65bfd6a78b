//! Recursive subtree codec for topology announcements.
//!
//! Each link's record carries the ordered set of descendant nodes reachable
//! only through that link, as a recursively nested tree. On the wire the
//! tree is a JSON array of `{"chipId": n, "subs": [...]}` objects; `subs` is
//! omitted for leaves. This is how topology propagates one hop at a time:
//! each node tells its neighbor everything reachable through it.

use serde::{Deserialize, Serialize};

use crate::error::CodecError;
use crate::types::ChipId;

/// One descendant node and everything reachable through it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtreeNode {
    #[serde(rename = "chipId")]
    pub chip_id: ChipId,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subs: Vec<SubtreeNode>,
}

impl SubtreeNode {
    /// A descendant with nothing behind it.
    pub fn leaf(chip_id: ChipId) -> Self {
        Self {
            chip_id,
            subs: Vec::new(),
        }
    }

    /// A descendant with its own subtree.
    pub fn with_subs(chip_id: ChipId, subs: Vec<SubtreeNode>) -> Self {
        Self { chip_id, subs }
    }
}

/// Serialize a subtree to its wire text.
pub fn to_text(nodes: &[SubtreeNode]) -> Result<String, CodecError> {
    serde_json::to_string(nodes).map_err(CodecError::Encode)
}

/// Parse wire text back into a subtree.
///
/// Degenerate input (fewer than 3 characters — too short to hold even one
/// entry) means "no entries", not an error.
pub fn parse_text(text: &str) -> Result<Vec<SubtreeNode>, CodecError> {
    if text.len() < 3 {
        return Ok(Vec::new());
    }
    serde_json::from_str(text).map_err(CodecError::SubtreeParse)
}

/// Total number of nodes in a subtree: every entry counts 1 plus its own
/// nested count.
#[must_use]
pub fn count_nodes(nodes: &[SubtreeNode]) -> usize {
    nodes
        .iter()
        .map(|node| 1 + count_nodes(&node.subs))
        .sum()
}

/// Count nodes directly from wire text.
///
/// Degenerate and unparseable input both count as zero entries; a
/// malformed announcement must never take a link down.
#[must_use]
pub fn count_subtree(text: &str) -> usize {
    match parse_text(text) {
        Ok(nodes) => count_nodes(&nodes),
        Err(_) => 0,
    }
}

/// Whether `chip_id` appears anywhere in the subtree.
#[must_use]
pub fn contains(nodes: &[SubtreeNode], chip_id: ChipId) -> bool {
    nodes
        .iter()
        .any(|node| node.chip_id == chip_id || contains(&node.subs, chip_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deep_sample() -> Vec<SubtreeNode> {
        // 7
        // 9 ── 11 ── 13
        //       └─── 15
        vec![
            SubtreeNode::leaf(ChipId(7)),
            SubtreeNode::with_subs(
                ChipId(9),
                vec![SubtreeNode::with_subs(
                    ChipId(11),
                    vec![SubtreeNode::leaf(ChipId(13)), SubtreeNode::leaf(ChipId(15))],
                )],
            ),
        ]
    }

    #[test]
    fn count_empty() {
        assert_eq!(count_nodes(&[]), 0);
    }

    #[test]
    fn count_nested() {
        assert_eq!(count_nodes(&deep_sample()), 5);
    }

    #[test]
    fn text_round_trip() {
        let nodes = deep_sample();
        let text = to_text(&nodes).unwrap();
        let back = parse_text(&text).unwrap();
        assert_eq!(back, nodes);
        assert_eq!(count_subtree(&text), 5);
    }

    #[test]
    fn leaf_omits_subs_key() {
        let text = to_text(&[SubtreeNode::leaf(ChipId(7))]).unwrap();
        assert_eq!(text, r#"[{"chipId":7}]"#);
    }

    #[test]
    fn parses_explicit_empty_subs() {
        let nodes = parse_text(r#"[{"chipId":7,"subs":[]}]"#).unwrap();
        assert_eq!(nodes, vec![SubtreeNode::leaf(ChipId(7))]);
        assert_eq!(count_subtree(r#"[{"chipId":7,"subs":[]}]"#), 1);
    }

    #[test]
    fn degenerate_text_counts_zero() {
        assert_eq!(count_subtree(""), 0);
        assert_eq!(count_subtree("[]"), 0);
        assert_eq!(count_subtree("[ "), 0);
        assert!(parse_text("").unwrap().is_empty());
        assert!(parse_text("[]").unwrap().is_empty());
    }

    #[test]
    fn malformed_text_counts_zero_not_error() {
        assert_eq!(count_subtree("[{broken"), 0);
        assert_eq!(count_subtree(r#"{"chipId":7}"#), 0); // object, not array
        assert!(parse_text("[{broken").is_err());
    }

    #[test]
    fn contains_searches_nested_levels() {
        let nodes = deep_sample();
        for id in [7, 9, 11, 13, 15] {
            assert!(contains(&nodes, ChipId(id)), "missing {id}");
        }
        assert!(!contains(&nodes, ChipId(8)));
        assert!(!contains(&[], ChipId(7)));
    }
}
