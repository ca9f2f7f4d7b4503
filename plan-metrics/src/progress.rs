//! Progress aggregator - weighted bottom-up rollup.
//!
//! A leaf reports its own `current_progress`. A parent reports the mean of
//! its children's rolled-up progress weighted by each child's effective
//! weight; when every child weighs zero the simple mean is used instead.
//!
//! The walk uses an explicit stack so plan depth never touches the native
//! call stack, and each node is resolved exactly once per pass.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use plan_hierarchy::{clamp_progress, PlanNode};

/// Points behind target still considered on track.
pub const ON_TRACK_TOLERANCE: f64 = 10.0;

/// Points behind target before an objective is considered behind.
pub const AT_RISK_TOLERANCE: f64 = 25.0;

/// Combine child results given as `(progress, weight)` pairs.
///
/// Zero total weight falls back to the simple mean; no children yields 0.
pub fn combine(parts: &[(f64, f64)]) -> f64 {
    if parts.is_empty() {
        return 0.0;
    }
    let total_weight: f64 = parts.iter().map(|(_, w)| w).sum();
    if total_weight == 0.0 {
        return parts.iter().map(|(p, _)| p).sum::<f64>() / parts.len() as f64;
    }
    parts.iter().map(|(p, w)| p * w).sum::<f64>() / total_weight
}

/// Rolled-up progress of `node` (0-100).
pub fn aggregate_progress(node: &PlanNode) -> f64 {
    fold(node, |_, _| {})
}

/// Rolled-up progress of every node in the subtree, keyed by node id.
pub fn rollup(node: &PlanNode) -> HashMap<String, f64> {
    let mut values = HashMap::new();
    fold(node, |n, v| {
        values.insert(n.id.clone(), v);
    });
    debug!(root = %node.id, nodes = values.len(), "Progress rollup complete");
    values
}

/// Post-order walk; `visit` sees each node once its value is known.
///
/// Each finished subtree leaves exactly one value on `values`, so a parent
/// finds its children's results as the last `children.len()` entries.
fn fold<'a>(root: &'a PlanNode, mut visit: impl FnMut(&'a PlanNode, f64)) -> f64 {
    let mut work: Vec<(&PlanNode, bool)> = vec![(root, false)];
    let mut values: Vec<f64> = Vec::new();

    while let Some((node, expanded)) = work.pop() {
        if node.is_leaf() {
            let value = clamp_progress(node.current_progress);
            visit(node, value);
            values.push(value);
            continue;
        }
        if !expanded {
            work.push((node, true));
            work.extend(node.children.iter().rev().map(|c| (c, false)));
            continue;
        }

        let start = values.len().saturating_sub(node.children.len());
        let parts: Vec<(f64, f64)> = values[start..]
            .iter()
            .zip(&node.children)
            .map(|(value, child)| (*value, child.effective_weight()))
            .collect();
        values.truncate(start);

        let value = combine(&parts);
        visit(node, value);
        values.push(value);
    }

    values.pop().unwrap_or(0.0)
}

/// Progress status relative to target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    /// Progress reached 100
    Completed,
    /// Within tolerance of target
    OnTrack,
    /// Falling behind target
    AtRisk,
    /// Well behind target
    Behind,
}

impl ProgressStatus {
    /// Classify actual progress against the target progress.
    pub fn classify(actual: f64, target: f64) -> Self {
        if actual >= 100.0 {
            return Self::Completed;
        }
        let gap = target - actual;
        if gap <= ON_TRACK_TOLERANCE {
            Self::OnTrack
        } else if gap <= AT_RISK_TOLERANCE {
            Self::AtRisk
        } else {
            Self::Behind
        }
    }

    /// Get the status name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::OnTrack => "on_track",
            Self::AtRisk => "at_risk",
            Self::Behind => "behind",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use plan_hierarchy::{NodeRecord, NodeType};

    fn node(id: &str, node_type: NodeType, progress: f64) -> PlanNode {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2026, 12, 31).unwrap();
        PlanNode::from_record(&NodeRecord::new(id, None, node_type, start, end).with_progress(progress, 100.0))
    }

    fn weighted(id: &str, progress: f64, weight: f64) -> PlanNode {
        let mut n = node(id, NodeType::Operational, progress);
        n.weight = Some(weight);
        n
    }

    #[test]
    fn test_leaf_identity() {
        let leaf = node("leaf", NodeType::Operational, 37.5);
        assert_eq!(aggregate_progress(&leaf), 37.5);
    }

    #[test]
    fn test_weighted_rollup() {
        let parent = node("p", NodeType::Tactical, 0.0)
            .with_child(weighted("a", 80.0, 3.0))
            .with_child(weighted("b", 40.0, 1.0));
        assert_eq!(aggregate_progress(&parent), 70.0);
    }

    #[test]
    fn test_zero_weight_fallback() {
        let parent = node("p", NodeType::Tactical, 0.0)
            .with_child(weighted("a", 80.0, 0.0))
            .with_child(weighted("b", 40.0, 0.0));
        assert_eq!(aggregate_progress(&parent), 60.0);
    }

    #[test]
    fn test_single_zero_weight_child_contributes_nothing() {
        let parent = node("p", NodeType::Tactical, 0.0)
            .with_child(weighted("a", 90.0, 0.0))
            .with_child(weighted("b", 40.0, 2.0));
        assert_eq!(aggregate_progress(&parent), 40.0);
    }

    #[test]
    fn test_unset_weight_counts_as_one() {
        let parent = node("p", NodeType::Tactical, 0.0)
            .with_child(node("a", NodeType::Operational, 100.0))
            .with_child(node("b", NodeType::Operational, 50.0));
        assert_eq!(aggregate_progress(&parent), 75.0);
    }

    #[test]
    fn test_parent_progress_ignored_when_children_present() {
        let parent = node("p", NodeType::Tactical, 99.0).with_child(node("a", NodeType::Operational, 20.0));
        assert_eq!(aggregate_progress(&parent), 20.0);
    }

    #[test]
    fn test_rollup_covers_every_node() {
        let program = node("prog", NodeType::Tactical, 0.0)
            .with_child(weighted("obj-1", 80.0, 3.0))
            .with_child(weighted("obj-2", 40.0, 1.0));
        let root = node("root", NodeType::Strategic, 0.0)
            .with_child(program)
            .with_child(node("prog-2", NodeType::Tactical, 10.0));

        let values = rollup(&root);
        assert_eq!(values.len(), 5);
        assert_eq!(values["prog"], 70.0);
        assert_eq!(values["prog-2"], 10.0);
        assert_eq!(values["root"], 40.0);
        assert_eq!(values["root"], aggregate_progress(&root));
    }

    #[test]
    fn test_deep_chain_does_not_overflow() {
        let mut current = node("n-0", NodeType::Operational, 42.0);
        for i in 1..100_000 {
            current = node(&format!("n-{}", i), NodeType::Operational, 0.0).with_child(current);
        }
        assert_eq!(aggregate_progress(&current), 42.0);
    }

    #[test]
    fn test_combine_empty() {
        assert_eq!(combine(&[]), 0.0);
    }

    #[test]
    fn test_status_classification() {
        assert_eq!(ProgressStatus::classify(100.0, 100.0), ProgressStatus::Completed);
        assert_eq!(ProgressStatus::classify(55.0, 60.0), ProgressStatus::OnTrack);
        assert_eq!(ProgressStatus::classify(40.0, 60.0), ProgressStatus::AtRisk);
        assert_eq!(ProgressStatus::classify(20.0, 60.0), ProgressStatus::Behind);
        assert_eq!(ProgressStatus::classify(70.0, 60.0), ProgressStatus::OnTrack);
        assert_eq!(ProgressStatus::AtRisk.as_str(), "at_risk");
    }
}
