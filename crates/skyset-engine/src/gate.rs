//! Progress reporting and confirmation gating

use crate::node::ResourceIdentity;
use std::fmt;

/// Phase notifications emitted while a run executes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressPhase {
    /// A create/update call was issued
    Started,
    /// The node reached a successful terminal state
    Done,
    /// The node failed, was short-circuited, or was cancelled
    Failed,
}

impl fmt::Display for ProgressPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressPhase::Started => write!(f, "started"),
            ProgressPhase::Done => write!(f, "done"),
            ProgressPhase::Failed => write!(f, "failed"),
        }
    }
}

/// Policy consulted before any mutating call, and notified as nodes
/// complete.
///
/// `should_proceed` is called exactly once per mutating node;
/// `report_progress` is fire-and-forget and must return promptly so a
/// no-op gate never stalls other ready nodes.
pub trait ConvergenceGate: Send + Sync {
    fn should_proceed(&self, description: &str) -> bool;

    fn report_progress(&self, identity: &ResourceIdentity, phase: ProgressPhase);
}

/// Fully automated mode: approves every change, logs progress at debug.
pub struct AutoApprove;

impl ConvergenceGate for AutoApprove {
    fn should_proceed(&self, _description: &str) -> bool {
        true
    }

    fn report_progress(&self, identity: &ResourceIdentity, phase: ProgressPhase) {
        tracing::debug!(resource = %identity, %phase, "progress");
    }
}
