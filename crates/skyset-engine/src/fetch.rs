//! Current-state fetching
//!
//! One read per graph node, issued concurrently. "Not found" is a valid
//! outcome and becomes a confirmed-absent entry; any other failure aborts
//! the run before a single mutation is attempted.

use crate::cancel::CancelToken;
use crate::client::RemoteClient;
use crate::error::{EngineError, RemoteError, Result};
use crate::node::Graph;
use crate::state::StateSnapshot;
use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;

/// Read the current representation of every node in the graph.
///
/// Each node is read at most once per run. Reads for independent nodes run
/// concurrently; the snapshot is complete (one entry per node) on success.
pub async fn fetch_current(
    graph: &Graph,
    client: &dyn RemoteClient,
    cancel: &CancelToken,
) -> Result<StateSnapshot> {
    if cancel.is_cancelled() {
        return Err(EngineError::Cancelled);
    }

    let mut reads: FuturesUnordered<_> = graph
        .nodes()
        .map(|node| {
            let identity = node.identity.clone();
            async move {
                let outcome = client.read(&identity).await;
                (identity, outcome)
            }
        })
        .collect();

    let mut snapshot = StateSnapshot::new();
    while let Some((identity, outcome)) = reads.next().await {
        match outcome {
            Ok(state) => {
                tracing::debug!(resource = %identity, id = %state.id, "observed existing resource");
                snapshot.set_present(&identity, state);
            }
            Err(RemoteError::NotFound) => {
                tracing::debug!(resource = %identity, "resource absent");
                snapshot.set_absent(&identity);
            }
            Err(source) => {
                return Err(EngineError::RemoteRead {
                    resource: identity.key(),
                    source,
                });
            }
        }
    }

    if cancel.is_cancelled() {
        return Err(EngineError::Cancelled);
    }
    Ok(snapshot)
}
