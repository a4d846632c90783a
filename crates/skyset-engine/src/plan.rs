//! Convergence planning
//!
//! A plan records, per node, whether convergence requires a create, an
//! update, or nothing. Each entry is computed purely from that node's
//! current vs target state; dependency order only affects *when* an action
//! executes, never *whether*.

use crate::error::{EngineError, Result};
use crate::kind::KindRegistry;
use crate::node::{Graph, ResourceIdentity};
use crate::state::StateSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Action required to converge one node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvergenceAction {
    /// Resource is absent and must be created
    Create,
    /// Resource exists but controlled fields drifted
    Update,
    /// Resource already matches its target
    Skip,
}

impl fmt::Display for ConvergenceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConvergenceAction::Create => write!(f, "create"),
            ConvergenceAction::Update => write!(f, "update"),
            ConvergenceAction::Skip => write!(f, "skip"),
        }
    }
}

/// Planned action for a single resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedChange {
    pub identity: ResourceIdentity,
    pub action: ConvergenceAction,
    pub description: String,
}

/// Plan over the whole graph, in topological order
#[derive(Debug, Clone)]
pub struct ConvergencePlan {
    changes: Vec<PlannedChange>,
    index: HashMap<String, usize>,
}

impl ConvergencePlan {
    pub fn changes(&self) -> &[PlannedChange] {
        &self.changes
    }

    pub fn change_for(&self, identity: &ResourceIdentity) -> Option<&PlannedChange> {
        self.index.get(&identity.key()).map(|&i| &self.changes[i])
    }

    pub fn has_changes(&self) -> bool {
        self.changes
            .iter()
            .any(|c| c.action != ConvergenceAction::Skip)
    }

    pub fn summary(&self) -> PlanSummary {
        let count = |action| self.changes.iter().filter(|c| c.action == action).count();
        PlanSummary {
            create: count(ConvergenceAction::Create),
            update: count(ConvergenceAction::Update),
            unchanged: count(ConvergenceAction::Skip),
        }
    }
}

/// Summary of planned actions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSummary {
    pub create: usize,
    pub update: usize,
    pub unchanged: usize,
}

impl fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to create, {} to update, {} unchanged",
            self.create, self.update, self.unchanged
        )
    }
}

/// Compute the action for every node in the graph.
///
/// Requires that both snapshots carry an entry for every node (the fetcher
/// and resolver guarantee this).
pub fn plan_convergence(
    graph: &Graph,
    current: &StateSnapshot,
    target: &StateSnapshot,
    registry: &KindRegistry,
) -> Result<ConvergencePlan> {
    let mut changes = Vec::with_capacity(graph.len());
    let mut index = HashMap::with_capacity(graph.len());

    for node in graph.topological_order()? {
        let kind = registry.require(&node.identity.resource_type)?;
        let target_state = target.get(&node.identity).ok_or_else(|| {
            EngineError::Configuration(format!(
                "target state is missing an entry for {}",
                node.identity
            ))
        })?;

        let action = match current.get(&node.identity) {
            None => ConvergenceAction::Create,
            Some(current_state) => {
                if kind.needs_update(current_state, target_state) {
                    ConvergenceAction::Update
                } else {
                    ConvergenceAction::Skip
                }
            }
        };

        tracing::debug!(resource = %node.identity, %action, "planned");
        index.insert(node.identity.key(), changes.len());
        changes.push(PlannedChange {
            identity: node.identity.clone(),
            action,
            description: kind.describe_change(&node.identity, action),
        });
    }

    Ok(ConvergencePlan { changes, index })
}
