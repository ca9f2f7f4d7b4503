//! Core types for the strategic plan.
//!
//! These types model the plan tree (cycle → perspective → program → objective)
//! and the entities hanging off objectives: indicators and risks.
//!
//! With the `typescript` feature enabled, these types can be exported to TypeScript
//! using ts-rs for consistency with the dashboard frontend.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// Planning level of a node.
///
/// Children must always sit at a strictly deeper level than their parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    /// Long-horizon goals owned by leadership
    Strategic = 0,
    /// Mid-level programs
    Tactical = 1,
    /// Day-to-day objectives and initiatives
    Operational = 2,
}

impl NodeType {
    /// Position in the fixed ordering (strategic = 0).
    pub fn index(&self) -> u8 {
        *self as u8
    }

    /// Check if this type sits strictly below another one
    pub fn is_deeper_than(&self, other: &Self) -> bool {
        self.index() > other.index()
    }

    /// Get string representation for messages
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strategic => "strategic",
            Self::Tactical => "tactical",
            Self::Operational => "operational",
        }
    }
}

impl Default for NodeType {
    fn default() -> Self {
        Self::Strategic
    }
}

/// What a node represents in the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Cycle,
    Perspective,
    Program,
    Objective,
}

impl Default for NodeKind {
    fn default() -> Self {
        Self::Objective
    }
}

/// Budget attached to a node.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct Budget {
    /// Amount allocated to the node
    pub allocated: f64,
    /// Amount executed so far
    pub spent: f64,
}

/// Flat node as stored: a parent reference instead of children.
///
/// Used by the cycle detector and hierarchy validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct NodeRecord {
    /// Unique identifier
    pub id: String,
    /// Parent node, `None` for roots
    pub parent_id: Option<String>,
    /// What the node represents
    #[serde(default)]
    pub kind: NodeKind,
    /// Planning level
    pub node_type: NodeType,
    /// Relative weight among siblings (1 when absent)
    #[serde(default)]
    pub weight: Option<f64>,
    /// Current completion (0-100)
    #[serde(default)]
    pub current_progress: f64,
    /// Expected completion at this point (0-100)
    #[serde(default)]
    pub target_progress: f64,
    /// Start of the node's execution window
    pub start_date: NaiveDate,
    /// End of the node's execution window
    pub end_date: NaiveDate,
    /// Optional budget
    #[serde(default)]
    pub budget: Option<Budget>,
}

impl NodeRecord {
    /// Create a record with neutral progress and no budget.
    pub fn new(
        id: impl Into<String>,
        parent_id: Option<&str>,
        node_type: NodeType,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Self {
        Self {
            id: id.into(),
            parent_id: parent_id.map(str::to_string),
            kind: NodeKind::default(),
            node_type,
            weight: None,
            current_progress: 0.0,
            target_progress: 0.0,
            start_date,
            end_date,
            budget: None,
        }
    }

    /// Builder: set progress values (clamped to 0-100).
    pub fn with_progress(mut self, current: f64, target: f64) -> Self {
        self.current_progress = clamp_progress(current);
        self.target_progress = clamp_progress(target);
        self
    }

    /// Builder: set weight.
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    /// Builder: set budget.
    pub fn with_budget(mut self, allocated: f64, spent: f64) -> Self {
        self.budget = Some(Budget { allocated, spent });
        self
    }

    /// Weight used in rollups.
    pub fn effective_weight(&self) -> f64 {
        effective_weight(self.weight)
    }

    /// Check if this record is a root.
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Nested node as assembled by the caller for aggregation.
///
/// `Clone` and `Drop` walk the subtree with an explicit stack, so chains of
/// any depth are safe to copy and release.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct PlanNode {
    /// Unique identifier
    pub id: String,
    /// Parent node, `None` for the subtree root of a whole plan
    pub parent_id: Option<String>,
    /// What the node represents
    #[serde(default)]
    pub kind: NodeKind,
    /// Planning level
    pub node_type: NodeType,
    /// Relative weight among siblings (1 when absent)
    #[serde(default)]
    pub weight: Option<f64>,
    /// Current completion (0-100)
    #[serde(default)]
    pub current_progress: f64,
    /// Expected completion at this point (0-100)
    #[serde(default)]
    pub target_progress: f64,
    /// Start of the node's execution window
    pub start_date: NaiveDate,
    /// End of the node's execution window
    pub end_date: NaiveDate,
    /// Optional budget
    #[serde(default)]
    pub budget: Option<Budget>,
    /// Child nodes
    #[serde(default)]
    pub children: Vec<PlanNode>,
}

impl PlanNode {
    /// Build a childless node from a flat record.
    pub fn from_record(record: &NodeRecord) -> Self {
        Self {
            id: record.id.clone(),
            parent_id: record.parent_id.clone(),
            kind: record.kind,
            node_type: record.node_type,
            weight: record.weight,
            current_progress: record.current_progress,
            target_progress: record.target_progress,
            start_date: record.start_date,
            end_date: record.end_date,
            budget: record.budget,
            children: Vec::new(),
        }
    }

    /// Builder: append a child, setting its parent reference.
    pub fn with_child(mut self, mut child: PlanNode) -> Self {
        child.parent_id = Some(self.id.clone());
        self.children.push(child);
        self
    }

    /// Weight used in rollups.
    pub fn effective_weight(&self) -> f64 {
        effective_weight(self.weight)
    }

    /// Check if this node has no children.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Total number of nodes in this subtree, including itself.
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children.iter());
        }
        count
    }

    /// Copy of this node's own fields with the given children.
    fn with_children(&self, children: Vec<PlanNode>) -> Self {
        Self {
            id: self.id.clone(),
            parent_id: self.parent_id.clone(),
            kind: self.kind,
            node_type: self.node_type,
            weight: self.weight,
            current_progress: self.current_progress,
            target_progress: self.target_progress,
            start_date: self.start_date,
            end_date: self.end_date,
            budget: self.budget,
            children,
        }
    }

    /// Flatten this subtree back to records (pre-order).
    pub fn flatten(&self) -> Vec<NodeRecord> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            out.push(NodeRecord {
                id: node.id.clone(),
                parent_id: node.parent_id.clone(),
                kind: node.kind,
                node_type: node.node_type,
                weight: node.weight,
                current_progress: node.current_progress,
                target_progress: node.target_progress,
                start_date: node.start_date,
                end_date: node.end_date,
                budget: node.budget,
            });
            stack.extend(node.children.iter().rev());
        }
        out
    }
}

impl Clone for PlanNode {
    fn clone(&self) -> Self {
        // Post-order: every finished subtree leaves one copy on `done`.
        let mut work: Vec<(&PlanNode, bool)> = vec![(self, false)];
        let mut done: Vec<PlanNode> = Vec::new();
        while let Some((node, expanded)) = work.pop() {
            if expanded {
                let children = done.split_off(done.len() - node.children.len());
                done.push(node.with_children(children));
            } else {
                work.push((node, true));
                work.extend(node.children.iter().rev().map(|child| (child, false)));
            }
        }
        done.pop().unwrap_or_else(|| self.with_children(Vec::new()))
    }
}

impl Drop for PlanNode {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}

/// Weight used in rollups: absent means 1, negative means 0.
pub fn effective_weight(weight: Option<f64>) -> f64 {
    match weight {
        Some(w) if w.is_finite() => w.max(0.0),
        Some(_) => 0.0,
        None => 1.0,
    }
}

/// Clamp a progress value to 0-100 (non-finite values become 0).
pub fn clamp_progress(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

/// How often an indicator is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum MeasurementFrequency {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

/// A measured quantity tied to an objective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct Indicator {
    /// Unique identifier
    pub id: String,
    /// Objective this indicator measures
    pub objective_id: String,
    /// Arithmetic expression over `current`, `baseline` and `target`
    pub formula: String,
    /// Value at the start of the cycle
    pub baseline_value: f64,
    /// Value to reach
    pub target_value: f64,
    /// Latest measured value
    pub current_value: f64,
    /// Measurement cadence
    pub measurement_frequency: MeasurementFrequency,
    /// People accountable for the measurement
    pub responsible: Vec<String>,
}

/// Ordinal severity as captured in risk registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum SeverityLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl SeverityLevel {
    /// Position on the canonical 0-1 scale
    pub fn as_score(&self) -> f64 {
        match self {
            Self::Low => 0.25,
            Self::Medium => 0.5,
            Self::High => 0.75,
            Self::Critical => 1.0,
        }
    }
}

/// Severity of a risk, either numeric or ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(untagged)]
pub enum RiskSeverity {
    /// Numeric severity, on 0-1 or 0-100
    Score(f64),
    /// Ordinal severity
    Level(SeverityLevel),
}

impl RiskSeverity {
    /// Normalize to the canonical 0-1 scale.
    ///
    /// Numeric values up to 1 are fractions; values above 1 are read as
    /// percentages. The scale switches at 1, so `Score(1.0)` is 1.0 while
    /// `Score(1.5)` is 1.5% (0.015). Registers on the 0-100 scale should not
    /// record severities between 0 and 1.
    pub fn normalized(&self) -> f64 {
        match self {
            Self::Level(level) => level.as_score(),
            Self::Score(value) if !value.is_finite() => 0.0,
            Self::Score(value) if *value > 1.0 => (value / 100.0).min(1.0),
            Self::Score(value) => value.max(0.0),
        }
    }
}

/// Lifecycle status of a risk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum RiskStatus {
    Active,
    Mitigated,
    Materialized,
    Closed,
}

impl RiskStatus {
    /// Only active risks contribute to exposure
    pub fn contributes_exposure(&self) -> bool {
        matches!(self, Self::Active)
    }
}

/// A mitigation action against a risk.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct Mitigation {
    /// Effectiveness (0-100)
    pub effectiveness_score: f64,
}

/// A risk identified against an objective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct Risk {
    /// Unique identifier
    pub id: String,
    /// Objective the risk threatens
    pub objective_id: String,
    /// Severity (numeric or ordinal)
    pub severity: RiskSeverity,
    /// Likelihood (0-1)
    #[serde(default)]
    pub probability: f64,
    /// Lifecycle status
    pub status: RiskStatus,
    /// Compliance impact (0-1)
    #[serde(default)]
    pub compliance_impact: f64,
    /// Reputational impact (0-1)
    #[serde(default)]
    pub reputational_impact: f64,
    /// Social impact (0-1)
    #[serde(default)]
    pub social_impact: f64,
    /// Mitigations in place
    #[serde(default)]
    pub mitigations: Vec<Mitigation>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_type_ordering() {
        assert!(NodeType::Tactical.is_deeper_than(&NodeType::Strategic));
        assert!(NodeType::Operational.is_deeper_than(&NodeType::Tactical));
        assert!(!NodeType::Strategic.is_deeper_than(&NodeType::Tactical));
        assert!(!NodeType::Tactical.is_deeper_than(&NodeType::Tactical));
    }

    #[test]
    fn test_effective_weight() {
        assert_eq!(effective_weight(None), 1.0);
        assert_eq!(effective_weight(Some(3.0)), 3.0);
        assert_eq!(effective_weight(Some(-2.0)), 0.0);
        assert_eq!(effective_weight(Some(f64::NAN)), 0.0);
    }

    #[test]
    fn test_clamp_progress() {
        assert_eq!(clamp_progress(120.0), 100.0);
        assert_eq!(clamp_progress(-5.0), 0.0);
        assert_eq!(clamp_progress(42.5), 42.5);
        assert_eq!(clamp_progress(f64::INFINITY), 0.0);
    }

    #[test]
    fn test_severity_normalization() {
        assert_eq!(RiskSeverity::Score(0.6).normalized(), 0.6);
        assert_eq!(RiskSeverity::Score(60.0).normalized(), 0.6);
        assert_eq!(RiskSeverity::Level(SeverityLevel::High).normalized(), 0.75);
        assert_eq!(RiskSeverity::Level(SeverityLevel::Critical).normalized(), 1.0);
    }

    #[test]
    fn test_severity_scale_switches_above_one() {
        assert_eq!(RiskSeverity::Score(1.0).normalized(), 1.0);
        assert_eq!(RiskSeverity::Score(1.5).normalized(), 0.015);
        assert_eq!(RiskSeverity::Score(100.0).normalized(), 1.0);
        assert_eq!(RiskSeverity::Score(250.0).normalized(), 1.0);
        assert_eq!(RiskSeverity::Score(-0.5).normalized(), 0.0);
    }

    #[test]
    fn test_severity_deserializes_both_forms() {
        let numeric: RiskSeverity = serde_json::from_str("0.4").unwrap();
        assert_eq!(numeric, RiskSeverity::Score(0.4));

        let ordinal: RiskSeverity = serde_json::from_str("\"medium\"").unwrap();
        assert_eq!(ordinal, RiskSeverity::Level(SeverityLevel::Medium));
    }

    #[test]
    fn test_flatten_preorder() {
        let root = PlanNode::from_record(&NodeRecord::new(
            "root",
            None,
            NodeType::Strategic,
            date(2024, 1, 1),
            date(2027, 12, 31),
        ))
        .with_child(PlanNode::from_record(&NodeRecord::new(
            "a",
            None,
            NodeType::Tactical,
            date(2024, 1, 1),
            date(2025, 12, 31),
        )))
        .with_child(PlanNode::from_record(&NodeRecord::new(
            "b",
            None,
            NodeType::Tactical,
            date(2024, 1, 1),
            date(2025, 12, 31),
        )));

        let flat = root.flatten();
        let ids: Vec<&str> = flat.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["root", "a", "b"]);
        assert_eq!(flat[1].parent_id.as_deref(), Some("root"));
        assert_eq!(root.node_count(), 3);
    }

    fn chain(depth: usize) -> PlanNode {
        let mut current = PlanNode::from_record(
            &NodeRecord::new("leaf", None, NodeType::Operational, date(2024, 1, 1), date(2024, 12, 31))
                .with_progress(40.0, 50.0),
        );
        for i in 0..depth {
            let parent = PlanNode::from_record(&NodeRecord::new(
                format!("n{}", i),
                None,
                NodeType::Operational,
                date(2024, 1, 1),
                date(2024, 12, 31),
            ));
            current = parent.with_child(current);
        }
        current
    }

    #[test]
    fn test_deep_chain_clone_and_drop() {
        let original = chain(100_000);
        let copy = original.clone();
        assert_eq!(copy.node_count(), 100_001);
        assert_eq!(copy.id, original.id);

        let mut node = &copy;
        while let Some(child) = node.children.first() {
            node = child;
        }
        assert_eq!(node.id, "leaf");
        assert_eq!(node.current_progress, 40.0);
        drop(original);
        drop(copy);
    }

    #[test]
    fn test_clone_keeps_child_order() {
        let root = PlanNode::from_record(&NodeRecord::new("root", None, NodeType::Strategic, date(2024, 1, 1), date(2027, 12, 31)))
            .with_child(chain(2))
            .with_child(PlanNode::from_record(&NodeRecord::new("b", None, NodeType::Tactical, date(2024, 1, 1), date(2025, 12, 31))));
        let copy = root.clone();
        assert_eq!(copy.flatten(), root.flatten());
        assert_eq!(copy.children[1].id, "b");
    }
}
