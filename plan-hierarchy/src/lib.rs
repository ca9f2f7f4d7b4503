//! Strategic Plan Hierarchy for the planning dashboard
//!
//! This crate models the strategic-plan tree and enforces its structural
//! invariants:
//!
//! - **Strategic**: top-level goals of a planning cycle
//! - **Tactical**: programs that decompose a strategic goal
//! - **Operational**: concrete objectives, indicators and initiatives
//!
//! # Key Components
//!
//! - [`RuleSet`]: Generic named-predicate validator producing a [`ValidationResult`]
//! - [`cycle`]: Circular ancestry and orphan detection over flat node sets
//! - [`HierarchyValidator`]: Depth, type-ordering, date and budget rules for the plan tree
//! - [`build_tree`]: Adapter from the validated flat list to the nested [`PlanNode`] shape
//! - [`Formula`]: Sandboxed arithmetic evaluator for indicator formulas
//!
//! # Example
//!
//! ```ignore
//! use plan_hierarchy::{HierarchyConfig, HierarchyValidator, build_tree};
//!
//! let validator = HierarchyValidator::new(HierarchyConfig::default());
//! let result = validator.validate_hierarchy(&records);
//! if result.is_valid {
//!     let tree = build_tree(&records, "perspective-1")?;
//! }
//! ```

pub mod cycle;
pub mod fingerprint;
pub mod formula;
pub mod hierarchy;
pub mod indicator;
pub mod rules;
pub mod tree;
pub mod types;
pub mod validation;

// Re-export main types
pub use cycle::{find_cycle, find_orphans, has_circular_reference, ParentLink};
pub use fingerprint::{compute_hash, structure_fingerprint};
pub use formula::{Formula, FormulaError};
pub use hierarchy::{BudgetSource, HierarchyConfig, HierarchyValidator};
pub use indicator::{formula_variables, indicator_progress, IndicatorValidator};
pub use rules::{Rule, RuleSet, RuleSetBuilder, RuleSeverity};
pub use tree::{build_tree, check_tree_integrity, HierarchyError};
pub use types::*;
pub use validation::{ValidationIssue, ValidationResult};
