//! End-to-end convergence of one scale-set topology
//!
//! Build the graph, read the deployed state, resolve the target, and drive
//! the executor. The output bundles the run report with the derived values
//! the presentation layer renders (public FQDN, allocated NAT port span).

use crate::builder::build_graph;
use crate::kinds;
use crate::params::ScaleSetParams;
use crate::ports::{self, PortRange};
use crate::resolve::{fqdn, resolve_target};
use skyset_engine::{
    CancelToken, ConvergenceExecutor, ConvergenceGate, ConvergenceReport, LabelGenerator,
    RemoteClient, Result, fetch_current,
};

/// Everything a frontend needs to render the finished run
#[derive(Debug, Clone)]
pub struct ConvergeOutput {
    pub report: ConvergenceReport,

    /// Public DNS name of the deployment
    pub fqdn: String,

    /// Frontend port range NAT'ed onto the instances
    pub nat_port_span: PortRange,
}

/// Converge live state to the desired scale-set topology.
///
/// Configuration and state-read failures abort before any mutation;
/// mutation failures are contained per dependency subtree and show up in
/// the report instead.
pub async fn converge(
    params: &ScaleSetParams,
    client: &dyn RemoteClient,
    generator: &dyn LabelGenerator,
    gate: &dyn ConvergenceGate,
    cancel: CancelToken,
) -> Result<ConvergeOutput> {
    let graph = build_graph(params)?;
    tracing::info!(scale_set = %params.name, nodes = graph.len(), "resource graph built");

    let current = fetch_current(&graph, client, &cancel).await?;
    let resolved = resolve_target(params, &graph, &current, generator).await?;

    let registry = kinds::registry();
    let executor =
        ConvergenceExecutor::new(&graph, &registry, client, gate).with_cancel(cancel);
    let report = executor.run(&current, &resolved.snapshot).await?;

    Ok(ConvergeOutput {
        fqdn: fqdn(&resolved.domain_name_label, &resolved.location),
        nat_port_span: ports::allocated_span(params.instance_count),
        report,
    })
}
