//! Structure fingerprints for approved hierarchy changes.
//!
//! The approval workflow stores the fingerprint of the node set it validated
//! and compares it before committing, so a structure edited after validation
//! is never admitted on the strength of a stale result.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::types::{NodeRecord, NodeType};

#[derive(Serialize)]
struct StructuralFields<'a> {
    id: &'a str,
    parent_id: Option<&'a str>,
    node_type: NodeType,
    start_date: String,
    end_date: String,
    allocated: Option<f64>,
}

/// Compute SHA256 hash of content.
pub fn compute_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// Fingerprint the structural fields of a node set.
///
/// Input order does not matter; progress and weights are ignored.
pub fn structure_fingerprint(nodes: &[NodeRecord]) -> String {
    let mut fields: Vec<StructuralFields<'_>> = nodes
        .iter()
        .map(|n| StructuralFields {
            id: &n.id,
            parent_id: n.parent_id.as_deref(),
            node_type: n.node_type,
            start_date: n.start_date.to_string(),
            end_date: n.end_date.to_string(),
            allocated: n.budget.map(|b| b.allocated),
        })
        .collect();
    fields.sort_by(|a, b| a.id.cmp(b.id));

    let json = serde_json::to_string(&fields).unwrap_or_default();
    compute_hash(json.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn nodes() -> Vec<NodeRecord> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2026, 12, 31).unwrap();
        vec![
            NodeRecord::new("root", None, NodeType::Strategic, start, end),
            NodeRecord::new("child", Some("root"), NodeType::Tactical, start, end),
        ]
    }

    #[test]
    fn test_order_independent() {
        let forward = nodes();
        let mut reversed = nodes();
        reversed.reverse();
        assert_eq!(structure_fingerprint(&forward), structure_fingerprint(&reversed));
        assert_eq!(structure_fingerprint(&forward).len(), 64);
    }

    #[test]
    fn test_progress_does_not_change_fingerprint() {
        let base = nodes();
        let mut progressed = nodes();
        progressed[1] = progressed[1].clone().with_progress(80.0, 90.0);
        assert_eq!(structure_fingerprint(&base), structure_fingerprint(&progressed));
    }

    #[test]
    fn test_reparenting_changes_fingerprint() {
        let base = nodes();
        let mut moved = nodes();
        moved[1].parent_id = None;
        assert_ne!(structure_fingerprint(&base), structure_fingerprint(&moved));
    }
}
