//! Circular ancestry and orphan detection.
//!
//! Works on any flat node set where each node names its parent. Every node
//! has at most one outgoing edge (its parent link), so the depth-first walk
//! is a straight chain: it runs with an explicit path instead of recursion
//! and handles arbitrarily deep plans without growing the native stack.

use std::collections::{HashMap, HashSet};

use crate::types::{NodeRecord, PlanNode};

/// A node that refers to its parent by id.
pub trait ParentLink {
    /// Node id
    fn id(&self) -> &str;
    /// Parent id, `None` for roots
    fn parent_id(&self) -> Option<&str>;
}

impl ParentLink for NodeRecord {
    fn id(&self) -> &str {
        &self.id
    }

    fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }
}

impl ParentLink for PlanNode {
    fn id(&self) -> &str {
        &self.id
    }

    fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }
}

/// Check if any chain of parent links loops back on itself.
pub fn has_circular_reference<N: ParentLink>(nodes: &[N]) -> bool {
    find_cycle(nodes).is_some()
}

/// Find the first cycle in input order.
///
/// Returns the ids on the cycle, starting at the node where the walk
/// re-entered its own path.
pub fn find_cycle<N: ParentLink>(nodes: &[N]) -> Option<Vec<String>> {
    let index = index_by_id(nodes);
    let mut visited: HashSet<&str> = HashSet::with_capacity(nodes.len());

    for node in nodes {
        if visited.contains(node.id()) {
            continue;
        }

        // Path doubles as the recursion stack; the set gives O(1) membership.
        let mut path: Vec<&str> = Vec::new();
        let mut on_path: HashSet<&str> = HashSet::new();
        let mut current = Some(node.id());

        while let Some(id) = current {
            if on_path.contains(id) {
                let start = path.iter().position(|p| *p == id).unwrap_or(0);
                return Some(path[start..].iter().map(|s| s.to_string()).collect());
            }
            if visited.contains(id) {
                break;
            }
            let Some(&position) = index.get(id) else {
                // Dangling parent: an orphan, not a cycle
                break;
            };
            path.push(id);
            on_path.insert(id);
            current = nodes[position].parent_id();
        }

        visited.extend(path);
    }

    None
}

/// Ids of nodes whose parent is not part of the set, in input order.
pub fn find_orphans<N: ParentLink>(nodes: &[N]) -> Vec<String> {
    let known: HashSet<&str> = nodes.iter().map(|n| n.id()).collect();
    nodes
        .iter()
        .filter(|n| matches!(n.parent_id(), Some(parent) if !known.contains(parent)))
        .map(|n| n.id().to_string())
        .collect()
}

fn index_by_id<N: ParentLink>(nodes: &[N]) -> HashMap<&str, usize> {
    let mut index = HashMap::with_capacity(nodes.len());
    for (i, node) in nodes.iter().enumerate() {
        index.entry(node.id()).or_insert(i);
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Link(&'static str, Option<&'static str>);

    impl ParentLink for Link {
        fn id(&self) -> &str {
            self.0
        }

        fn parent_id(&self) -> Option<&str> {
            self.1
        }
    }

    #[test]
    fn test_two_node_cycle() {
        let nodes = [Link("A", Some("B")), Link("B", Some("A"))];
        assert!(has_circular_reference(&nodes));

        let cycle = find_cycle(&nodes).unwrap();
        assert_eq!(cycle, vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn test_simple_chain_has_no_cycle() {
        let nodes = [Link("A", None), Link("B", Some("A"))];
        assert!(!has_circular_reference(&nodes));
    }

    #[test]
    fn test_self_reference() {
        let nodes = [Link("A", Some("A"))];
        assert_eq!(find_cycle(&nodes), Some(vec!["A".to_string()]));
    }

    #[test]
    fn test_cycle_reached_from_tail() {
        // D hangs off a loop B -> C -> B
        let nodes = [
            Link("root", None),
            Link("D", Some("B")),
            Link("B", Some("C")),
            Link("C", Some("B")),
        ];
        let cycle = find_cycle(&nodes).unwrap();
        assert_eq!(cycle, vec!["B".to_string(), "C".to_string()]);
    }

    #[test]
    fn test_shared_ancestors_visited_once() {
        let nodes = [
            Link("root", None),
            Link("a", Some("root")),
            Link("b", Some("root")),
            Link("a1", Some("a")),
            Link("a2", Some("a")),
        ];
        assert!(!has_circular_reference(&nodes));
    }

    #[test]
    fn test_deep_chain_does_not_overflow() {
        let ids: Vec<String> = (0..200_000).map(|i| format!("n{i}")).collect();
        let records: Vec<NodeRecord> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| {
                let date = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
                let parent = if i == 0 { None } else { Some(ids[i - 1].as_str()) };
                NodeRecord::new(id.clone(), parent, crate::types::NodeType::Strategic, date, date)
            })
            .collect();
        assert!(!has_circular_reference(&records));
    }

    #[test]
    fn test_orphans() {
        let nodes = [
            Link("A", None),
            Link("B", Some("A")),
            Link("C", Some("missing")),
            Link("D", Some("gone")),
        ];
        assert_eq!(find_orphans(&nodes), vec!["C".to_string(), "D".to_string()]);
        assert!(!has_circular_reference(&nodes));
    }
}
