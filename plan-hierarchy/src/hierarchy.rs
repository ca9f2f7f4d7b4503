//! Structural validation of the strategic plan tree.
//!
//! Composes the generic rule engine with the rules specific to the plan:
//! a root must exist, ids are unique, parent links may neither loop nor dangle, the tree may
//! not be deeper than the configured number of levels, children sit at a
//! deeper planning level than their parent and within its date range, and
//! budgets stay within what was approved.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cycle::{find_cycle, find_orphans, has_circular_reference};
use crate::rules::{Rule, RuleSet};
use crate::types::NodeRecord;
use crate::validation::ValidationResult;

/// Rule codes reported by the hierarchy validator.
pub mod codes {
    pub const NO_ROOT_OBJECTIVES: &str = "NO_ROOT_OBJECTIVES";
    pub const DUPLICATE_NODE_ID: &str = "DUPLICATE_NODE_ID";
    pub const CIRCULAR_REFERENCE: &str = "CIRCULAR_REFERENCE";
    pub const ORPHAN_OBJECTIVES: &str = "ORPHAN_OBJECTIVES";
    pub const INVALID_HIERARCHY_DEPTH: &str = "INVALID_HIERARCHY_DEPTH";
    pub const MISALIGNED_TYPE: &str = "MISALIGNED_TYPE";
    pub const INVALID_START_DATE: &str = "INVALID_START_DATE";
    pub const INVALID_END_DATE: &str = "INVALID_END_DATE";
    pub const INVALID_DATE_RANGE: &str = "INVALID_DATE_RANGE";
    pub const PROGRESS_OUT_OF_RANGE: &str = "PROGRESS_OUT_OF_RANGE";
    pub const BUDGET_EXCEEDS_ALLOCATION: &str = "BUDGET_EXCEEDS_ALLOCATION";
    pub const CHILD_BUDGET_EXCEEDS_PARENT: &str = "CHILD_BUDGET_EXCEEDS_PARENT";
}

/// Tolerance for budget comparisons.
const BUDGET_EPSILON: f64 = 1e-6;

/// Configuration for hierarchy validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HierarchyConfig {
    /// Maximum number of levels from a root down to its deepest leaf
    pub max_depth: usize,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self { max_depth: 3 }
    }
}

/// Supplies the approved allocation a node's budget is checked against.
///
/// Budget data is owned by the caller; the validator only compares.
pub trait BudgetSource: Send + Sync {
    /// Approved allocation for the node, `None` if nothing was approved.
    fn approved_allocation(&self, node: &NodeRecord) -> Option<f64>;
}

impl<F> BudgetSource for F
where
    F: Fn(&NodeRecord) -> Option<f64> + Send + Sync,
{
    fn approved_allocation(&self, node: &NodeRecord) -> Option<f64> {
        self(node)
    }
}

impl BudgetSource for HashMap<String, f64> {
    fn approved_allocation(&self, node: &NodeRecord) -> Option<f64> {
        self.get(&node.id).copied()
    }
}

/// Validator for the strategic plan tree.
///
/// Rule sets are built once at construction and never mutated.
pub struct HierarchyValidator {
    config: HierarchyConfig,
    structure_rules: RuleSet<[NodeRecord], HierarchyConfig>,
    node_rules: RuleSet<NodeRecord>,
    // Entity is the child, options carry its parent.
    pair_rules: RuleSet<NodeRecord, NodeRecord>,
    // Entity is the parent, options carry its children's allocations.
    family_rules: RuleSet<NodeRecord, [f64]>,
    // Options carry the approved allocation resolved from the caller's source.
    budget_rules: RuleSet<NodeRecord, Option<f64>>,
}

impl HierarchyValidator {
    /// Create a validator with the given configuration.
    pub fn new(config: HierarchyConfig) -> Self {
        Self {
            config,
            structure_rules: Self::structure_rules(),
            node_rules: Self::node_rules(),
            pair_rules: Self::pair_rules(),
            family_rules: Self::family_rules(),
            budget_rules: Self::budget_rules(),
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &HierarchyConfig {
        &self.config
    }

    /// Validate a whole node set.
    ///
    /// Runs the structural rules first, then the per-node rules, then the
    /// parent/child rules for every link whose parent is present.
    pub fn validate_hierarchy(&self, nodes: &[NodeRecord]) -> ValidationResult {
        let mut result = self.structure_rules.validate(nodes, &self.config);

        for node in nodes {
            result = result.merge(self.node_rules.validate_entity(node, &(), Some(&node.id)));
        }

        let by_id = index_by_id(nodes);
        for node in nodes {
            let Some(parent) = node.parent_id.as_deref().and_then(|p| by_id.get(p)) else {
                continue;
            };
            result = result.merge(self.validate_pair(parent, node));
        }

        let mut child_allocations: HashMap<&str, Vec<f64>> = HashMap::new();
        for node in nodes {
            if let (Some(parent), Some(budget)) = (node.parent_id.as_deref(), node.budget) {
                child_allocations.entry(parent).or_default().push(budget.allocated);
            }
        }
        for node in nodes {
            if let Some(allocations) = child_allocations.get(node.id.as_str()) {
                result = result.merge(self.family_rules.validate_entity(
                    node,
                    allocations.as_slice(),
                    Some(&node.id),
                ));
            }
        }

        if result.is_valid {
            debug!(nodes = nodes.len(), warnings = result.warnings.len(), "Hierarchy valid");
        } else {
            warn!(
                nodes = nodes.len(),
                errors = result.errors.len(),
                warnings = result.warnings.len(),
                "Hierarchy validation failed"
            );
        }

        result
    }

    /// Validate a single parent/child link.
    pub fn validate_pair(&self, parent: &NodeRecord, child: &NodeRecord) -> ValidationResult {
        self.pair_rules.validate_entity(child, parent, Some(&child.id))
    }

    /// Check node budgets against the caller's approved allocations.
    pub fn validate_budget(&self, nodes: &[NodeRecord], source: &dyn BudgetSource) -> ValidationResult {
        nodes
            .iter()
            .filter(|n| n.budget.is_some())
            .fold(ValidationResult::valid(), |acc, node| {
                let approved = source.approved_allocation(node);
                acc.merge(self.budget_rules.validate_entity(node, &approved, Some(&node.id)))
            })
    }

    fn structure_rules() -> RuleSet<[NodeRecord], HierarchyConfig> {
        RuleSet::builder("hierarchy-structure")
            .add_rule(Rule::error(
                codes::NO_ROOT_OBJECTIVES,
                "At least one objective must have no parent",
                |nodes: &[NodeRecord], _: &HierarchyConfig| nodes.iter().any(NodeRecord::is_root),
            ))
            .add_rule(
                Rule::error(
                    codes::DUPLICATE_NODE_ID,
                    "Objective ids must be unique",
                    |nodes: &[NodeRecord], _: &HierarchyConfig| duplicate_ids(nodes).is_empty(),
                )
                .with_detail(|nodes: &[NodeRecord], _: &HierarchyConfig| {
                    Some(duplicate_ids(nodes).join(", "))
                })
                .on_field("id"),
            )
            .add_rule(
                Rule::error(
                    codes::CIRCULAR_REFERENCE,
                    "Objective hierarchy contains a circular reference",
                    |nodes: &[NodeRecord], _: &HierarchyConfig| !has_circular_reference(nodes),
                )
                .with_detail(|nodes: &[NodeRecord], _: &HierarchyConfig| {
                    find_cycle(nodes).map(|cycle| cycle.join(" -> "))
                })
                .on_field("parentId"),
            )
            .add_rule(
                Rule::error(
                    codes::ORPHAN_OBJECTIVES,
                    "Objectives reference a parent that does not exist",
                    |nodes: &[NodeRecord], _: &HierarchyConfig| find_orphans(nodes).is_empty(),
                )
                .with_detail(|nodes: &[NodeRecord], _: &HierarchyConfig| {
                    Some(find_orphans(nodes).join(", "))
                })
                .on_field("parentId"),
            )
            .add_rule(Rule::error(
                codes::INVALID_HIERARCHY_DEPTH,
                "Objective hierarchy exceeds the maximum depth",
                |nodes: &[NodeRecord], config: &HierarchyConfig| {
                    // Depth is undefined on a loop; CIRCULAR_REFERENCE reports it.
                    hierarchy_levels(nodes).map_or(true, |levels| levels <= config.max_depth)
                },
            ))
            .build()
    }

    fn node_rules() -> RuleSet<NodeRecord> {
        RuleSet::builder("hierarchy-node")
            .add_rule(
                Rule::error(
                    codes::INVALID_DATE_RANGE,
                    "End date must not precede start date",
                    |node: &NodeRecord, _: &()| node.start_date <= node.end_date,
                )
                .on_field("endDate"),
            )
            .add_rule(
                Rule::warning(
                    codes::PROGRESS_OUT_OF_RANGE,
                    "Progress values are clamped to 0-100",
                    |node: &NodeRecord, _: &()| {
                        in_progress_range(node.current_progress)
                            && in_progress_range(node.target_progress)
                    },
                )
                .on_field("currentProgress"),
            )
            .build()
    }

    fn pair_rules() -> RuleSet<NodeRecord, NodeRecord> {
        RuleSet::builder("hierarchy-pair")
            .add_rule(
                Rule::error(
                    codes::MISALIGNED_TYPE,
                    "Child type must be deeper than its parent's type",
                    |child: &NodeRecord, parent: &NodeRecord| {
                        child.node_type.is_deeper_than(&parent.node_type)
                    },
                )
                .on_field("type"),
            )
            .add_rule(
                Rule::error(
                    codes::INVALID_START_DATE,
                    "Child start date precedes its parent's start date",
                    |child: &NodeRecord, parent: &NodeRecord| child.start_date >= parent.start_date,
                )
                .on_field("startDate"),
            )
            .add_rule(
                Rule::error(
                    codes::INVALID_END_DATE,
                    "Child end date exceeds its parent's end date",
                    |child: &NodeRecord, parent: &NodeRecord| child.end_date <= parent.end_date,
                )
                .on_field("endDate"),
            )
            .build()
    }

    fn family_rules() -> RuleSet<NodeRecord, [f64]> {
        RuleSet::builder("hierarchy-family")
            .add_rule(
                Rule::warning(
                    codes::CHILD_BUDGET_EXCEEDS_PARENT,
                    "Children are allocated more budget than their parent",
                    |parent: &NodeRecord, allocations: &[f64]| {
                        parent.budget.map_or(true, |budget| {
                            allocations.iter().sum::<f64>() <= budget.allocated + BUDGET_EPSILON
                        })
                    },
                )
                .on_field("budget"),
            )
            .build()
    }

    fn budget_rules() -> RuleSet<NodeRecord, Option<f64>> {
        RuleSet::builder("hierarchy-budget")
            .add_rule(
                Rule::error(
                    codes::BUDGET_EXCEEDS_ALLOCATION,
                    "Budget exceeds the approved planning-cycle allocation",
                    |node: &NodeRecord, approved: &Option<f64>| match (node.budget, approved) {
                        (Some(budget), Some(approved)) => budget.allocated <= approved + BUDGET_EPSILON,
                        _ => true,
                    },
                )
                .on_field("budget"),
            )
            .build()
    }
}

impl Default for HierarchyValidator {
    fn default() -> Self {
        Self::new(HierarchyConfig::default())
    }
}

/// Number of levels on the longest root-to-leaf path.
///
/// A lone root spans one level. A node whose parent is missing starts its
/// own chain. Returns `None` when the parent links loop.
pub fn hierarchy_levels(nodes: &[NodeRecord]) -> Option<usize> {
    if has_circular_reference(nodes) {
        return None;
    }

    let by_id = index_by_id(nodes);
    let mut levels: HashMap<&str, usize> = HashMap::with_capacity(nodes.len());
    let mut max_levels = 0;

    for node in nodes {
        // Walk up until a node with a known level (or a root) is found.
        let mut chain: Vec<&str> = Vec::new();
        let mut current = Some(node.id.as_str());
        let mut base = 0;
        while let Some(id) = current {
            if let Some(&known) = levels.get(id) {
                base = known;
                break;
            }
            chain.push(id);
            current = by_id
                .get(id)
                .and_then(|n| n.parent_id.as_deref())
                .filter(|p| by_id.contains_key(p));
        }
        for (offset, id) in chain.iter().rev().enumerate() {
            let level = base + offset + 1;
            levels.insert(id, level);
            max_levels = max_levels.max(level);
        }
    }

    Some(max_levels)
}

/// Ids that appear more than once, in order of first repetition.
fn duplicate_ids(nodes: &[NodeRecord]) -> Vec<&str> {
    let mut seen = HashSet::with_capacity(nodes.len());
    let mut duplicates = Vec::new();
    for node in nodes {
        let id = node.id.as_str();
        if !seen.insert(id) && !duplicates.contains(&id) {
            duplicates.push(id);
        }
    }
    duplicates
}

fn index_by_id(nodes: &[NodeRecord]) -> HashMap<&str, &NodeRecord> {
    let mut index = HashMap::with_capacity(nodes.len());
    for node in nodes {
        index.entry(node.id.as_str()).or_insert(node);
    }
    index
}

fn in_progress_range(value: f64) -> bool {
    (0.0..=100.0).contains(&value)
}
