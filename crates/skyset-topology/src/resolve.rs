//! Target-state resolution
//!
//! Pure combination of desired parameters with facts only discoverable
//! from current state: the deployment location is inherited from an
//! existing resource group, the DNS label from an existing public IP (or
//! generated and verified unique). Re-running against the same current
//! state and parameters yields the same target.

use crate::kinds::{PUBLIC_IP, RESOURCE_GROUP};
use crate::params::ScaleSetParams;
use skyset_engine::{
    EngineError, Graph, LabelGenerator, ResourceIdentity, ResourceState, Result, StateSnapshot,
    resolve_unique_label,
};
use serde_json::{Value, json};

/// Resolved desired state: parameters with all inheritable/generated
/// fields filled, plus the target snapshot for every graph node.
#[derive(Debug, Clone)]
pub struct ResolvedTarget {
    pub params: ScaleSetParams,
    pub location: String,
    pub domain_name_label: String,
    pub snapshot: StateSnapshot,
}

/// Public DNS name derived from a resolved label and location.
pub fn fqdn(label: &str, location: &str) -> String {
    format!("{label}.{location}.cloudapp.net")
}

pub async fn resolve_target(
    params: &ScaleSetParams,
    graph: &Graph,
    current: &StateSnapshot,
    generator: &dyn LabelGenerator,
) -> Result<ResolvedTarget> {
    let group = ResourceIdentity::new(RESOURCE_GROUP, params.resource_group_name());
    let location = match &params.location {
        Some(location) => location.clone(),
        None => current
            .get(&group)
            .and_then(|state| state.location.clone())
            .ok_or_else(|| {
                EngineError::Configuration(
                    "location is required when the resource group does not exist yet".into(),
                )
            })?,
    };

    let public_ip = ResourceIdentity::new(PUBLIC_IP, params.public_ip_name());
    let label = match &params.domain_name_label {
        Some(label) => label.clone(),
        None => match current
            .get(&public_ip)
            .and_then(|state| state.get_attribute::<String>("domain_name_label"))
        {
            Some(existing) => {
                tracing::debug!(label = %existing, "inheriting DNS label from existing public IP");
                existing
            }
            None => resolve_unique_label(generator, &params.name).await?,
        },
    };

    let mut resolved = params.clone();
    resolved.location = Some(location.clone());
    resolved.domain_name_label = Some(label.clone());

    let mut snapshot = StateSnapshot::new();
    for node in graph.nodes() {
        let mut state = ResourceState::new(node.identity.key()).with_location(location.as_str());
        if let Value::Object(desired) = &node.desired {
            for (key, value) in desired {
                state.set_attribute(key.as_str(), value.clone());
            }
        }
        if node.identity.resource_type == PUBLIC_IP {
            state.set_attribute("domain_name_label", json!(label));
        }
        snapshot.set_present(&node.identity, state);
    }

    tracing::info!(%location, %label, "target state resolved");
    Ok(ResolvedTarget {
        params: resolved,
        location,
        domain_name_label: label,
        snapshot,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build_graph;
    use async_trait::async_trait;
    use skyset_engine::RemoteError;

    struct AlwaysFree;

    #[async_trait]
    impl LabelGenerator for AlwaysFree {
        fn generate_candidate(&self, seed: &str, attempt: u32) -> String {
            format!("{seed}-gen{attempt}")
        }

        async fn check_available(
            &self,
            _candidate: &str,
        ) -> std::result::Result<bool, RemoteError> {
            Ok(true)
        }
    }

    fn params() -> ScaleSetParams {
        ScaleSetParams::new("web", "admin", "secret")
    }

    #[tokio::test]
    async fn location_is_inherited_from_existing_group() {
        let params = params();
        let graph = build_graph(&params).unwrap();

        let mut current = StateSnapshot::new();
        for node in graph.nodes() {
            current.set_absent(&node.identity);
        }
        current.set_present(
            &ResourceIdentity::new(RESOURCE_GROUP, "web"),
            ResourceState::new("rg-1").with_location("westeurope"),
        );

        let resolved = resolve_target(&params, &graph, &current, &AlwaysFree)
            .await
            .unwrap();
        assert_eq!(resolved.location, "westeurope");
        // Every target entry carries the inherited location.
        for node in graph.nodes() {
            let entry = resolved.snapshot.get(&node.identity).unwrap();
            assert_eq!(entry.location.as_deref(), Some("westeurope"));
        }
    }

    #[tokio::test]
    async fn missing_location_without_group_is_an_error() {
        let params = params();
        let graph = build_graph(&params).unwrap();
        let mut current = StateSnapshot::new();
        for node in graph.nodes() {
            current.set_absent(&node.identity);
        }

        let err = resolve_target(&params, &graph, &current, &AlwaysFree)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
    }

    #[tokio::test]
    async fn label_prefers_desired_then_existing_then_generated() {
        let mut params = params();
        params.location = Some("eastus".to_string());
        let graph = build_graph(&params).unwrap();
        let mut absent = StateSnapshot::new();
        for node in graph.nodes() {
            absent.set_absent(&node.identity);
        }

        // Generated when nothing is set anywhere.
        let generated = resolve_target(&params, &graph, &absent, &AlwaysFree)
            .await
            .unwrap();
        assert_eq!(generated.domain_name_label, "web-gen0");

        // Inherited from the live public IP when present.
        let mut with_ip = absent.clone();
        with_ip.set_present(
            &ResourceIdentity::new(PUBLIC_IP, "web"),
            ResourceState::new("ip-1").with_attribute("domain_name_label", json!("web-live")),
        );
        let inherited = resolve_target(&params, &graph, &with_ip, &AlwaysFree)
            .await
            .unwrap();
        assert_eq!(inherited.domain_name_label, "web-live");

        // Desired wins over both.
        params.domain_name_label = Some("pinned".to_string());
        let pinned = resolve_target(&params, &graph, &with_ip, &AlwaysFree)
            .await
            .unwrap();
        assert_eq!(pinned.domain_name_label, "pinned");
        let ip_entry = pinned
            .snapshot
            .get(&ResourceIdentity::new(PUBLIC_IP, "web"))
            .unwrap();
        assert_eq!(
            ip_entry.get_attribute::<String>("domain_name_label").as_deref(),
            Some("pinned")
        );
    }

    #[test]
    fn fqdn_joins_label_and_location() {
        assert_eq!(fqdn("web-live", "eastus"), "web-live.eastus.cloudapp.net");
    }
}
