//! Skyset Convergence Engine
//!
//! Topology-agnostic reconciliation of interdependent cloud resources:
//! model desired configuration as a dependency graph, read the deployed
//! state of the whole topology, resolve a target state, and converge live
//! state to target with idempotent create-or-update calls in dependency
//! order.
//!
//! # Architecture
//!
//! ```text
//! desired params ──▶ Graph (validated DAG of ResourceNodes)
//!                      │
//!                      ▼
//!               fetch_current ──▶ StateSnapshot (current)
//!                      │
//!                      ▼
//!      target resolution (topology crate) ──▶ StateSnapshot (target)
//!                      │
//!                      ▼
//!            ConvergenceExecutor ──▶ ConvergenceReport
//!        (plan → gated, ordered create/update, partial-failure safe)
//! ```
//!
//! The engine owns no network code: a [`RemoteClient`] handle is passed in
//! per run, and per-resource-type behavior is supplied through
//! [`ResourceKind`] implementations registered in a [`KindRegistry`].

pub mod cancel;
pub mod client;
pub mod error;
pub mod executor;
pub mod fetch;
pub mod gate;
pub mod kind;
pub mod naming;
pub mod node;
pub mod plan;
pub mod state;

// Re-exports
pub use cancel::CancelToken;
pub use client::RemoteClient;
pub use error::{EngineError, RemoteError, Result};
pub use executor::{
    ConvergenceExecutor, ConvergenceReport, FailureReason, NodeOutcome, NodeReport, ReportSummary,
};
pub use fetch::fetch_current;
pub use gate::{AutoApprove, ConvergenceGate, ProgressPhase};
pub use kind::{KindRegistry, ResourceKind, attributes_differ};
pub use naming::{LabelGenerator, MAX_GENERATION_ATTEMPTS, resolve_unique_label};
pub use node::{Graph, ResourceIdentity, ResourceNode};
pub use plan::{
    ConvergenceAction, ConvergencePlan, PlanSummary, PlannedChange, plan_convergence,
};
pub use state::{ResourceState, StateSnapshot};
