//! Adapter from the flat validated node list to the nested tree shape.
//!
//! Validation works on flat records with parent references; aggregation
//! works on nested [`PlanNode`]s. [`build_tree`] converts once, after the
//! hierarchy has been validated.

use std::collections::{HashMap, HashSet};

use crate::cycle::find_cycle;
use crate::types::{NodeRecord, PlanNode};

/// Error types for tree assembly and integrity checks.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HierarchyError {
    /// The requested node is not part of the set
    #[error("Node not found: {0}")]
    UnknownNode(String),

    /// Parent links loop back on themselves
    #[error("Circular reference through: {}", .0.join(" -> "))]
    CircularReference(Vec<String>),

    /// The same id appears more than once
    #[error("Duplicate node id: {0}")]
    DuplicateId(String),

    /// A child does not point back at the node it hangs under
    #[error("Node {child} is nested under {parent} but references {declared:?}")]
    ParentMismatch {
        child: String,
        parent: String,
        declared: Option<String>,
    },
}

/// Assemble the subtree rooted at `root_id` from a flat node list.
///
/// Children keep their input order. Nodes outside the subtree are ignored.
pub fn build_tree(nodes: &[NodeRecord], root_id: &str) -> Result<PlanNode, HierarchyError> {
    if let Some(cycle) = find_cycle(nodes) {
        return Err(HierarchyError::CircularReference(cycle));
    }

    let mut by_id: HashMap<&str, &NodeRecord> = HashMap::with_capacity(nodes.len());
    let mut children: HashMap<&str, Vec<&NodeRecord>> = HashMap::new();
    for node in nodes {
        if by_id.insert(node.id.as_str(), node).is_some() {
            return Err(HierarchyError::DuplicateId(node.id.clone()));
        }
        if let Some(parent) = node.parent_id.as_deref() {
            children.entry(parent).or_default().push(node);
        }
    }

    let root = by_id
        .get(root_id)
        .copied()
        .ok_or_else(|| HierarchyError::UnknownNode(root_id.to_string()))?;

    // Iterative post-order assembly: a node is finished once all its
    // children are finished.
    let mut finished: HashMap<&str, PlanNode> = HashMap::new();
    let mut stack: Vec<(&NodeRecord, bool)> = vec![(root, false)];
    while let Some((record, expanded)) = stack.pop() {
        let kids = children.get(record.id.as_str()).map(Vec::as_slice).unwrap_or(&[]);
        if !expanded {
            stack.push((record, true));
            stack.extend(kids.iter().rev().map(|k| (*k, false)));
            continue;
        }
        let mut node = PlanNode::from_record(record);
        node.children = kids
            .iter()
            .filter_map(|k| finished.remove(k.id.as_str()))
            .collect();
        finished.insert(record.id.as_str(), node);
    }

    finished
        .remove(root_id)
        .ok_or_else(|| HierarchyError::UnknownNode(root_id.to_string()))
}

/// Check a caller-assembled tree for duplicate ids and broken parent links.
pub fn check_tree_integrity(root: &PlanNode) -> Result<(), HierarchyError> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut stack: Vec<&PlanNode> = vec![root];

    while let Some(node) = stack.pop() {
        if !seen.insert(node.id.as_str()) {
            return Err(HierarchyError::DuplicateId(node.id.clone()));
        }
        for child in &node.children {
            if child.parent_id.as_deref() != Some(node.id.as_str()) {
                return Err(HierarchyError::ParentMismatch {
                    child: child.id.clone(),
                    parent: node.id.clone(),
                    declared: child.parent_id.clone(),
                });
            }
            stack.push(child);
        }
    }

    Ok(())
}
