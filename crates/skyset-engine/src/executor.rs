//! Convergence execution
//!
//! Walks the graph in dependency order and drives each node through
//! `Pending → InFlight → Terminal`. Independent nodes at the same
//! dependency depth run concurrently; a node's mutating call never starts
//! before all of its dependencies reached a successful terminal state.
//!
//! Mutation failures are contained: dependents of a failed (or declined)
//! node are short-circuited without a call, while unrelated branches run to
//! completion. The run returns its report rather than erroring, so
//! successfully created resources are never thrown away.

use crate::cancel::CancelToken;
use crate::client::RemoteClient;
use crate::error::{EngineError, Result};
use crate::gate::{ConvergenceGate, ProgressPhase};
use crate::kind::KindRegistry;
use crate::node::{Graph, ResourceIdentity};
use crate::plan::{ConvergenceAction, ConvergencePlan, plan_convergence};
use crate::state::StateSnapshot;
use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Why a node ended up `Failed`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The node's own create/update call failed
    Mutation(String),
    /// A dependency (direct or transitive) did not converge
    Dependency(String),
    /// The run was cancelled before this node started
    Cancelled,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Mutation(message) => write!(f, "{message}"),
            FailureReason::Dependency(key) => write!(f, "dependency {key} did not converge"),
            FailureReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Terminal outcome of one node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeOutcome {
    /// Current state already matched the target; no call issued
    AlreadySatisfied,
    Created,
    Updated,
    /// The confirmation gate declined the change
    SkippedByUser,
    Failed(FailureReason),
}

impl NodeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            NodeOutcome::AlreadySatisfied | NodeOutcome::Created | NodeOutcome::Updated
        )
    }
}

impl fmt::Display for NodeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeOutcome::AlreadySatisfied => write!(f, "already satisfied"),
            NodeOutcome::Created => write!(f, "created"),
            NodeOutcome::Updated => write!(f, "updated"),
            NodeOutcome::SkippedByUser => write!(f, "skipped by user"),
            NodeOutcome::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Outcome of one node, paired with its identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeReport {
    pub identity: ResourceIdentity,
    pub outcome: NodeOutcome,
}

/// Result of a convergence run: per-node outcomes in topological order plus
/// the merged current-state view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvergenceReport {
    pub nodes: Vec<NodeReport>,
    pub state: StateSnapshot,
}

impl ConvergenceReport {
    pub fn outcome(&self, identity: &ResourceIdentity) -> Option<&NodeOutcome> {
        self.nodes
            .iter()
            .find(|n| n.identity == *identity)
            .map(|n| &n.outcome)
    }

    /// True when every node reached a successful terminal state
    pub fn is_converged(&self) -> bool {
        self.nodes.iter().all(|n| n.outcome.is_success())
    }

    pub fn summary(&self) -> ReportSummary {
        let mut summary = ReportSummary::default();
        for node in &self.nodes {
            match node.outcome {
                NodeOutcome::AlreadySatisfied => summary.already_satisfied += 1,
                NodeOutcome::Created => summary.created += 1,
                NodeOutcome::Updated => summary.updated += 1,
                NodeOutcome::SkippedByUser => summary.skipped_by_user += 1,
                NodeOutcome::Failed(_) => summary.failed += 1,
            }
        }
        summary
    }
}

/// Per-outcome counts over a finished run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportSummary {
    pub created: usize,
    pub updated: usize,
    pub already_satisfied: usize,
    pub skipped_by_user: usize,
    pub failed: usize,
}

impl fmt::Display for ReportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} created, {} updated, {} already satisfied, {} skipped by user, {} failed",
            self.created, self.updated, self.already_satisfied, self.skipped_by_user, self.failed
        )
    }
}

enum NodeState {
    Pending,
    InFlight,
    Terminal(NodeOutcome),
}

/// Drives one reconciliation run. Owns the graph view for the duration of
/// the run; the client handle is passed in explicitly.
pub struct ConvergenceExecutor<'a> {
    graph: &'a Graph,
    registry: &'a KindRegistry,
    client: &'a dyn RemoteClient,
    gate: &'a dyn ConvergenceGate,
    cancel: CancelToken,
}

impl<'a> ConvergenceExecutor<'a> {
    pub fn new(
        graph: &'a Graph,
        registry: &'a KindRegistry,
        client: &'a dyn RemoteClient,
        gate: &'a dyn ConvergenceGate,
    ) -> Self {
        Self {
            graph,
            registry,
            client,
            gate,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Plan against `current` vs `target`, then execute the plan.
    pub async fn run(
        &self,
        current: &StateSnapshot,
        target: &StateSnapshot,
    ) -> Result<ConvergenceReport> {
        let plan = plan_convergence(self.graph, current, target, self.registry)?;
        tracing::info!(summary = %plan.summary(), "convergence planned");
        self.execute(&plan, current, target).await
    }

    /// Execute a previously computed plan.
    pub async fn execute(
        &self,
        plan: &ConvergencePlan,
        current: &StateSnapshot,
        target: &StateSnapshot,
    ) -> Result<ConvergenceReport> {
        let order = self.graph.topological_order()?;
        let mut states: HashMap<String, NodeState> = order
            .iter()
            .map(|n| (n.identity.key(), NodeState::Pending))
            .collect();
        let mut view = current.clone();
        let mut in_flight = FuturesUnordered::new();

        loop {
            if self.cancel.is_cancelled() {
                // Halt further starts; in-flight calls drain naturally.
                for &node in &order {
                    let key = node.identity.key();
                    if matches!(states[&key], NodeState::Pending) {
                        tracing::info!(resource = %node.identity, "not started, run cancelled");
                        self.gate.report_progress(&node.identity, ProgressPhase::Failed);
                        states.insert(
                            key,
                            NodeState::Terminal(NodeOutcome::Failed(FailureReason::Cancelled)),
                        );
                    }
                }
            } else {
                // Start pass, run to fixpoint: every ready node is started,
                // every node doomed by a dependency is short-circuited.
                loop {
                    let mut progressed = false;
                    for &node in &order {
                        let key = node.identity.key();
                        if !matches!(states[&key], NodeState::Pending) {
                            continue;
                        }

                        let mut waiting = false;
                        let mut doomed_by: Option<String> = None;
                        for dep in &node.depends_on {
                            match &states[&dep.key()] {
                                NodeState::Terminal(outcome) if outcome.is_success() => {}
                                NodeState::Terminal(_) => {
                                    doomed_by = Some(dep.key());
                                    break;
                                }
                                _ => waiting = true,
                            }
                        }

                        if let Some(dep_key) = doomed_by {
                            tracing::warn!(
                                resource = %node.identity,
                                dependency = %dep_key,
                                "short-circuited, dependency did not converge"
                            );
                            self.gate.report_progress(&node.identity, ProgressPhase::Failed);
                            states.insert(
                                key,
                                NodeState::Terminal(NodeOutcome::Failed(
                                    FailureReason::Dependency(dep_key),
                                )),
                            );
                            progressed = true;
                            continue;
                        }
                        if waiting {
                            continue;
                        }

                        let change = plan.change_for(&node.identity).ok_or_else(|| {
                            EngineError::Configuration(format!(
                                "plan has no entry for {}",
                                node.identity
                            ))
                        })?;

                        match change.action {
                            ConvergenceAction::Skip => {
                                tracing::debug!(resource = %node.identity, "already satisfied");
                                self.gate.report_progress(&node.identity, ProgressPhase::Done);
                                states.insert(
                                    key,
                                    NodeState::Terminal(NodeOutcome::AlreadySatisfied),
                                );
                                progressed = true;
                            }
                            ConvergenceAction::Create | ConvergenceAction::Update => {
                                if !self.gate.should_proceed(&change.description) {
                                    tracing::info!(
                                        resource = %node.identity,
                                        "change declined by confirmation gate"
                                    );
                                    states.insert(
                                        key,
                                        NodeState::Terminal(NodeOutcome::SkippedByUser),
                                    );
                                    progressed = true;
                                    continue;
                                }

                                let kind = self.registry.require(&node.identity.resource_type)?;
                                let target_state =
                                    target.get(&node.identity).ok_or_else(|| {
                                        EngineError::Configuration(format!(
                                            "target state is missing an entry for {}",
                                            node.identity
                                        ))
                                    })?;
                                let spec = match change.action {
                                    ConvergenceAction::Create => {
                                        kind.create_spec(node, target_state, &view)?
                                    }
                                    _ => kind.update_spec(node, target_state, &view)?,
                                };

                                tracing::info!(
                                    resource = %node.identity,
                                    action = %change.action,
                                    "issuing remote call"
                                );
                                self.gate
                                    .report_progress(&node.identity, ProgressPhase::Started);
                                states.insert(key, NodeState::InFlight);

                                let client = self.client;
                                let identity = node.identity.clone();
                                let action = change.action;
                                in_flight.push(async move {
                                    let outcome = match action {
                                        ConvergenceAction::Create => {
                                            client.create(&identity, &spec).await
                                        }
                                        ConvergenceAction::Update => {
                                            client.update(&identity, &spec).await
                                        }
                                        ConvergenceAction::Skip => {
                                            unreachable!("skip never issues a remote call")
                                        }
                                    };
                                    (identity, action, outcome)
                                });
                                progressed = true;
                            }
                        }
                    }
                    if !progressed {
                        break;
                    }
                }
            }

            // Publish exactly one completion, then re-scan for newly ready
            // nodes.
            let Some((identity, action, outcome)) = in_flight.next().await else {
                break;
            };
            match outcome {
                Ok(state) => {
                    tracing::info!(resource = %identity, id = %state.id, "converged");
                    view.set_present(&identity, state);
                    self.gate.report_progress(&identity, ProgressPhase::Done);
                    let outcome = match action {
                        ConvergenceAction::Create => NodeOutcome::Created,
                        _ => NodeOutcome::Updated,
                    };
                    states.insert(identity.key(), NodeState::Terminal(outcome));
                }
                Err(source) => {
                    let error = EngineError::RemoteMutation {
                        resource: identity.key(),
                        source,
                    };
                    tracing::warn!(resource = %identity, %error, "mutation failed");
                    self.gate.report_progress(&identity, ProgressPhase::Failed);
                    states.insert(
                        identity.key(),
                        NodeState::Terminal(NodeOutcome::Failed(FailureReason::Mutation(
                            error.to_string(),
                        ))),
                    );
                }
            }
        }

        let nodes = order
            .iter()
            .map(|node| {
                let outcome = match states.remove(&node.identity.key()) {
                    Some(NodeState::Terminal(outcome)) => outcome,
                    _ => unreachable!("every node is terminal once the run drains"),
                };
                NodeReport {
                    identity: node.identity.clone(),
                    outcome,
                }
            })
            .collect();

        let report = ConvergenceReport { nodes, state: view };
        tracing::info!(summary = %report.summary(), "convergence finished");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RemoteError;
    use crate::kind::ResourceKind;
    use crate::node::ResourceNode;
    use crate::state::ResourceState;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::Mutex;

    struct ThingKind;

    impl ResourceKind for ThingKind {
        fn type_name(&self) -> &str {
            "thing"
        }
    }

    fn registry() -> KindRegistry {
        let mut registry = KindRegistry::new();
        registry.register(Box::new(ThingKind));
        registry
    }

    fn identity(name: &str) -> ResourceIdentity {
        ResourceIdentity::new("thing", name)
    }

    fn node(name: &str, deps: &[&str]) -> ResourceNode {
        let mut n = ResourceNode::new(identity(name), json!({}));
        for dep in deps {
            n = n.with_dependency(&identity(dep));
        }
        n
    }

    /// In-memory control plane that records mutation order and can be told
    /// to fail specific resources.
    #[derive(Default)]
    struct FakeControlPlane {
        fail: HashSet<String>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeControlPlane {
        fn failing(keys: &[&str]) -> Self {
            Self {
                fail: keys.iter().map(|k| k.to_string()).collect(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn mutate(
            &self,
            identity: &ResourceIdentity,
            spec: &serde_json::Value,
        ) -> std::result::Result<ResourceState, RemoteError> {
            let key = identity.key();
            self.calls.lock().unwrap().push(key.clone());
            if self.fail.contains(&key) {
                return Err(RemoteError::Api("injected failure".into()));
            }
            let mut state = ResourceState::new(format!("id-{}", identity.name));
            if let Some(object) = spec.as_object() {
                for (k, v) in object {
                    if k == "location" {
                        state.location = v.as_str().map(|s| s.to_string());
                    } else {
                        state.set_attribute(k.as_str(), v.clone());
                    }
                }
            }
            Ok(state)
        }
    }

    #[async_trait]
    impl RemoteClient for FakeControlPlane {
        async fn read(
            &self,
            _identity: &ResourceIdentity,
        ) -> std::result::Result<ResourceState, RemoteError> {
            Err(RemoteError::NotFound)
        }

        async fn create(
            &self,
            identity: &ResourceIdentity,
            spec: &serde_json::Value,
        ) -> std::result::Result<ResourceState, RemoteError> {
            self.mutate(identity, spec)
        }

        async fn update(
            &self,
            identity: &ResourceIdentity,
            spec: &serde_json::Value,
        ) -> std::result::Result<ResourceState, RemoteError> {
            self.mutate(identity, spec)
        }
    }

    struct Approve;

    impl ConvergenceGate for Approve {
        fn should_proceed(&self, _description: &str) -> bool {
            true
        }

        fn report_progress(&self, _identity: &ResourceIdentity, _phase: ProgressPhase) {}
    }

    /// Declines changes whose description contains a marker.
    struct DeclineMatching(&'static str);

    impl ConvergenceGate for DeclineMatching {
        fn should_proceed(&self, description: &str) -> bool {
            !description.contains(self.0)
        }

        fn report_progress(&self, _identity: &ResourceIdentity, _phase: ProgressPhase) {}
    }

    /// Cancels the shared token as soon as any call starts.
    struct CancelOnFirstStart(CancelToken);

    impl ConvergenceGate for CancelOnFirstStart {
        fn should_proceed(&self, _description: &str) -> bool {
            true
        }

        fn report_progress(&self, _identity: &ResourceIdentity, phase: ProgressPhase) {
            if phase == ProgressPhase::Started {
                self.0.cancel();
            }
        }
    }

    fn snapshots_for(graph: &Graph) -> (StateSnapshot, StateSnapshot) {
        let mut current = StateSnapshot::new();
        let mut target = StateSnapshot::new();
        for n in graph.nodes() {
            current.set_absent(&n.identity);
            target.set_present(
                &n.identity,
                ResourceState::new(n.identity.key()).with_attribute("setting", json!("on")),
            );
        }
        (current, target)
    }

    #[tokio::test]
    async fn creates_in_dependency_order() {
        let graph =
            Graph::from_nodes(vec![node("c", &["b"]), node("b", &["a"]), node("a", &[])])
                .unwrap();
        let registry = registry();
        let client = FakeControlPlane::default();
        let (current, target) = snapshots_for(&graph);

        let report = ConvergenceExecutor::new(&graph, &registry, &client, &Approve)
            .run(&current, &target)
            .await
            .unwrap();

        assert!(report.is_converged());
        assert_eq!(client.calls(), vec!["thing:a", "thing:b", "thing:c"]);
        assert_eq!(report.outcome(&identity("a")), Some(&NodeOutcome::Created));
    }

    #[tokio::test]
    async fn partial_failure_short_circuits_dependents_only() {
        // b depends on a (which fails); c is unrelated.
        let graph =
            Graph::from_nodes(vec![node("a", &[]), node("b", &["a"]), node("c", &[])]).unwrap();
        let registry = registry();
        let client = FakeControlPlane::failing(&["thing:a"]);
        let (current, target) = snapshots_for(&graph);

        let report = ConvergenceExecutor::new(&graph, &registry, &client, &Approve)
            .run(&current, &target)
            .await
            .unwrap();

        assert!(!report.is_converged());
        assert!(matches!(
            report.outcome(&identity("a")),
            Some(NodeOutcome::Failed(FailureReason::Mutation(_)))
        ));
        assert!(matches!(
            report.outcome(&identity("b")),
            Some(NodeOutcome::Failed(FailureReason::Dependency(dep))) if dep == "thing:a"
        ));
        assert_eq!(report.outcome(&identity("c")), Some(&NodeOutcome::Created));
        // No call was ever issued for b.
        assert!(!client.calls().contains(&"thing:b".to_string()));
    }

    #[tokio::test]
    async fn gate_decline_skips_node_and_cascades() {
        let graph = Graph::from_nodes(vec![node("a", &[]), node("b", &["a"])]).unwrap();
        let registry = registry();
        let client = FakeControlPlane::default();
        let (current, target) = snapshots_for(&graph);
        let gate = DeclineMatching("'a'");

        let report = ConvergenceExecutor::new(&graph, &registry, &client, &gate)
            .run(&current, &target)
            .await
            .unwrap();

        assert_eq!(
            report.outcome(&identity("a")),
            Some(&NodeOutcome::SkippedByUser)
        );
        assert!(matches!(
            report.outcome(&identity("b")),
            Some(NodeOutcome::Failed(FailureReason::Dependency(_)))
        ));
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn second_run_is_all_satisfied_with_no_calls() {
        let graph = Graph::from_nodes(vec![node("a", &[]), node("b", &["a"])]).unwrap();
        let registry = registry();
        let client = FakeControlPlane::default();
        let (current, target) = snapshots_for(&graph);

        let executor = ConvergenceExecutor::new(&graph, &registry, &client, &Approve);
        let first = executor.run(&current, &target).await.unwrap();
        assert!(first.is_converged());
        let mutations_after_first = client.calls().len();

        // No external drift: the merged view of run one is run two's current.
        let second = executor.run(&first.state, &target).await.unwrap();
        assert!(second.is_converged());
        assert!(
            second
                .nodes
                .iter()
                .all(|n| n.outcome == NodeOutcome::AlreadySatisfied)
        );
        assert_eq!(client.calls().len(), mutations_after_first);
    }

    #[tokio::test]
    async fn cancellation_lets_in_flight_finish_and_fails_unstarted() {
        // d is queued behind a, so it is guaranteed not to have started
        // when the token fires during a's call.
        let graph = Graph::from_nodes(vec![node("a", &[]), node("d", &["a"])]).unwrap();
        let registry = registry();
        let client = FakeControlPlane::default();
        let (current, target) = snapshots_for(&graph);
        let cancel = CancelToken::new();
        let gate = CancelOnFirstStart(cancel.clone());

        let report = ConvergenceExecutor::new(&graph, &registry, &client, &gate)
            .with_cancel(cancel)
            .run(&current, &target)
            .await
            .unwrap();

        assert_eq!(report.outcome(&identity("a")), Some(&NodeOutcome::Created));
        assert_eq!(
            report.outcome(&identity("d")),
            Some(&NodeOutcome::Failed(FailureReason::Cancelled))
        );
        assert_eq!(client.calls(), vec!["thing:a"]);
    }

    #[tokio::test]
    async fn dependents_observe_freshly_published_state() {
        // b's spec references a; the id it embeds must be the one a's
        // creation just returned, not anything from the pre-run snapshot.
        let graph = Graph::from_nodes(vec![node("a", &[]), node("b", &["a"])]).unwrap();
        let registry = registry();
        let client = FakeControlPlane::default();

        let mut current = StateSnapshot::new();
        let mut target = StateSnapshot::new();
        current.set_absent(&identity("a"));
        current.set_absent(&identity("b"));
        target.set_present(&identity("a"), ResourceState::new("placeholder-a"));
        target.set_present(
            &identity("b"),
            ResourceState::new("placeholder-b").with_attribute("peer_ref", json!("thing:a")),
        );

        let report = ConvergenceExecutor::new(&graph, &registry, &client, &Approve)
            .run(&current, &target)
            .await
            .unwrap();

        assert!(report.is_converged());
        let b = report.state.get(&identity("b")).unwrap();
        assert_eq!(b.get_attribute::<String>("peer_id").as_deref(), Some("id-a"));
    }
}
