//! Resource utilization over a plan subtree.

use plan_hierarchy::PlanNode;

use crate::types::ResourceUtilization;

/// Sum allocated and spent budget over the subtree rooted at `node`.
///
/// A node carrying a budget accounts for its whole subtree, so its
/// descendants are not added again. Nodes without a budget defer to their
/// children.
pub fn resource_utilization(node: &PlanNode) -> ResourceUtilization {
    let mut allocated = 0.0;
    let mut spent = 0.0;
    let mut stack: Vec<&PlanNode> = vec![node];

    while let Some(current) = stack.pop() {
        match current.budget {
            Some(budget) => {
                allocated += budget.allocated.max(0.0);
                spent += budget.spent.max(0.0);
            }
            None => stack.extend(current.children.iter()),
        }
    }

    let utilization = if allocated > 0.0 { spent / allocated * 100.0 } else { 0.0 };
    ResourceUtilization {
        allocated,
        spent,
        utilization,
    }
}
