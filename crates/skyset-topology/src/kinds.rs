//! Resource kinds of the scale-set topology
//!
//! One capability implementation per resource type, selected by the type
//! tag in a node's identity. Almost everything rides on the engine
//! defaults (controlled-attribute diff, reference materialization); only
//! genuinely type-specific behavior is overridden here.

use skyset_engine::{KindRegistry, ResourceKind, ResourceState, attributes_differ};

pub const RESOURCE_GROUP: &str = "resource-group";
pub const PUBLIC_IP: &str = "public-ip";
pub const VIRTUAL_NETWORK: &str = "virtual-network";
pub const SUBNET: &str = "subnet";
pub const LOAD_BALANCER: &str = "load-balancer";
pub const FRONTEND_IP_CONFIG: &str = "frontend-ip-config";
pub const BACKEND_POOL: &str = "backend-pool";
pub const LOAD_BALANCING_RULE: &str = "load-balancing-rule";
pub const INBOUND_NAT_POOL: &str = "inbound-nat-pool";
pub const SCALE_SET: &str = "scale-set";

/// Container only; an existing group is never updated, whatever its
/// location.
struct ResourceGroupKind;

impl ResourceKind for ResourceGroupKind {
    fn type_name(&self) -> &str {
        RESOURCE_GROUP
    }

    fn needs_update(&self, _current: &ResourceState, _target: &ResourceState) -> bool {
        false
    }
}

struct PublicIpKind;

impl ResourceKind for PublicIpKind {
    fn type_name(&self) -> &str {
        PUBLIC_IP
    }
}

struct VirtualNetworkKind;

impl ResourceKind for VirtualNetworkKind {
    fn type_name(&self) -> &str {
        VIRTUAL_NETWORK
    }
}

struct SubnetKind;

impl ResourceKind for SubnetKind {
    fn type_name(&self) -> &str {
        SUBNET
    }
}

struct LoadBalancerKind;

impl ResourceKind for LoadBalancerKind {
    fn type_name(&self) -> &str {
        LOAD_BALANCER
    }
}

struct FrontendIpConfigKind;

impl ResourceKind for FrontendIpConfigKind {
    fn type_name(&self) -> &str {
        FRONTEND_IP_CONFIG
    }
}

struct BackendPoolKind;

impl ResourceKind for BackendPoolKind {
    fn type_name(&self) -> &str {
        BACKEND_POOL
    }
}

struct LoadBalancingRuleKind;

impl ResourceKind for LoadBalancingRuleKind {
    fn type_name(&self) -> &str {
        LOAD_BALANCING_RULE
    }
}

struct InboundNatPoolKind;

impl ResourceKind for InboundNatPoolKind {
    fn type_name(&self) -> &str {
        INBOUND_NAT_POOL
    }
}

/// The admin password is write-only: control planes do not echo secrets
/// back, so it must not count as drift.
struct ScaleSetKind;

impl ResourceKind for ScaleSetKind {
    fn type_name(&self) -> &str {
        SCALE_SET
    }

    fn needs_update(&self, current: &ResourceState, target: &ResourceState) -> bool {
        attributes_differ(current, target, &["admin_password"])
    }
}

/// All kinds of the scale-set topology, keyed by type tag.
pub fn registry() -> KindRegistry {
    let mut registry = KindRegistry::new();
    registry.register(Box::new(ResourceGroupKind));
    registry.register(Box::new(PublicIpKind));
    registry.register(Box::new(VirtualNetworkKind));
    registry.register(Box::new(SubnetKind));
    registry.register(Box::new(LoadBalancerKind));
    registry.register(Box::new(FrontendIpConfigKind));
    registry.register(Box::new(BackendPoolKind));
    registry.register(Box::new(LoadBalancingRuleKind));
    registry.register(Box::new(InboundNatPoolKind));
    registry.register(Box::new(ScaleSetKind));
    registry
}
