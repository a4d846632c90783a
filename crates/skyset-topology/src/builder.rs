//! Desired-topology graph construction
//!
//! Pure function of the desired parameters; never touches the network.
//! Dependency edges mirror real provisioning order: group first, network
//! and address resources next, load-balancer sub-resources after their
//! parents, the scale set last.

use crate::image;
use crate::kinds::{
    BACKEND_POOL, FRONTEND_IP_CONFIG, INBOUND_NAT_POOL, LOAD_BALANCER, LOAD_BALANCING_RULE,
    PUBLIC_IP, RESOURCE_GROUP, SCALE_SET, SUBNET, VIRTUAL_NETWORK,
};
use crate::params::ScaleSetParams;
use crate::ports;
use skyset_engine::{Graph, ResourceIdentity, ResourceNode, Result};
use serde_json::json;

/// Build the validated dependency graph for one scale-set deployment.
pub fn build_graph(params: &ScaleSetParams) -> Result<Graph> {
    params.validate()?;
    let image = image::lookup(&params.image)?;
    let nat_ports = image::effective_nat_ports(params, &image);
    ports::validate_capacity(params.instance_count, nat_ports.len())?;

    let group = ResourceIdentity::new(RESOURCE_GROUP, params.resource_group_name());
    let public_ip = ResourceIdentity::new(PUBLIC_IP, params.public_ip_name());
    let vnet = ResourceIdentity::new(VIRTUAL_NETWORK, params.virtual_network_name());
    let subnet = ResourceIdentity::child_of(&vnet, SUBNET, params.subnet_name());
    let load_balancer = ResourceIdentity::new(LOAD_BALANCER, params.load_balancer_name());
    let frontend =
        ResourceIdentity::child_of(&load_balancer, FRONTEND_IP_CONFIG, params.frontend_pool_name());
    let backend_pool =
        ResourceIdentity::child_of(&load_balancer, BACKEND_POOL, params.backend_pool_name());

    let mut nodes = Vec::new();

    nodes.push(ResourceNode::new(group.clone(), json!({})));

    nodes.push(
        ResourceNode::new(
            public_ip.clone(),
            json!({
                "allocation_method": params.allocation_method.to_string(),
            }),
        )
        .with_dependency(&group),
    );

    nodes.push(
        ResourceNode::new(
            vnet.clone(),
            json!({
                "address_prefix": params.vnet_address_prefix,
            }),
        )
        .with_dependency(&group),
    );

    nodes.push(
        ResourceNode::new(
            subnet.clone(),
            json!({
                "address_prefix": params.subnet_address_prefix,
            }),
        )
        .with_dependency(&vnet),
    );

    nodes.push(ResourceNode::new(load_balancer.clone(), json!({})).with_dependency(&group));

    let mut frontend_desired = json!({
        "public_ip_ref": public_ip.key(),
    });
    if !params.zones.is_empty() {
        frontend_desired["zones"] = json!(params.zones);
    }
    nodes.push(
        ResourceNode::new(frontend.clone(), frontend_desired)
            .with_dependencies([&load_balancer, &public_ip]),
    );

    nodes.push(ResourceNode::new(backend_pool.clone(), json!({})).with_dependency(&load_balancer));

    // One pass-through rule per backend port, named after the balancer.
    for port in &params.backend_ports {
        let rule = ResourceIdentity::child_of(
            &load_balancer,
            LOAD_BALANCING_RULE,
            format!("{}{}", params.load_balancer_name(), port),
        );
        nodes.push(
            ResourceNode::new(
                rule,
                json!({
                    "protocol": "Tcp",
                    "frontend_port": port,
                    "backend_port": port,
                    "frontend_ref": frontend.key(),
                    "backend_pool_ref": backend_pool.key(),
                }),
            )
            .with_dependencies([&load_balancer, &frontend, &backend_pool]),
        );
    }

    // One NAT pool per NAT backend port, frontend ranges allocated by
    // index.
    let mut nat_pool_ids = Vec::with_capacity(nat_ports.len());
    for (i, port) in nat_ports.iter().enumerate() {
        let range = ports::nat_pool_range(i, params.instance_count);
        let nat_pool = ResourceIdentity::child_of(
            &load_balancer,
            INBOUND_NAT_POOL,
            format!("{}{}", params.name, port),
        );
        nodes.push(
            ResourceNode::new(
                nat_pool.clone(),
                json!({
                    "protocol": "Tcp",
                    "frontend_port_start": range.start,
                    "frontend_port_end": range.end,
                    "backend_port": port,
                    "frontend_ref": frontend.key(),
                }),
            )
            .with_dependencies([&load_balancer, &frontend]),
        );
        nat_pool_ids.push(nat_pool);
    }

    let scale_set = ResourceIdentity::new(SCALE_SET, &params.name);
    let mut scale_set_desired = json!({
        "image": image.urn,
        "os_family": image.os.to_string(),
        "vm_size": params.vm_size,
        "instance_count": params.instance_count,
        "admin_username": params.admin_username,
        "admin_password": params.admin_password,
        "subnet_ref": subnet.key(),
        "backend_pool_ref": backend_pool.key(),
        "nat_pool_refs": nat_pool_ids.iter().map(|n| n.key()).collect::<Vec<_>>(),
    });
    if let Some(policy) = params.upgrade_policy {
        scale_set_desired["upgrade_policy"] = json!(policy.to_string());
    }
    nodes.push(
        ResourceNode::new(scale_set, scale_set_desired)
            .with_dependencies([&subnet, &backend_pool])
            .with_dependencies(nat_pool_ids.iter()),
    );

    Graph::from_nodes(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ScaleSetParams;

    fn params() -> ScaleSetParams {
        ScaleSetParams::new("web", "admin", "secret")
    }

    #[test]
    fn default_topology_has_one_rule_and_one_nat_pool() {
        let graph = build_graph(&params()).unwrap();
        // group, ip, vnet, subnet, lb, frontend, pool, 1 rule, 1 NAT pool,
        // scale set
        assert_eq!(graph.len(), 10);

        let rule = ResourceIdentity::child_of(
            &ResourceIdentity::new(LOAD_BALANCER, "web"),
            LOAD_BALANCING_RULE,
            "web80",
        );
        assert!(graph.get(&rule).is_some());

        // Windows default image: NAT pool on the RDP port.
        let nat = ResourceIdentity::child_of(
            &ResourceIdentity::new(LOAD_BALANCER, "web"),
            INBOUND_NAT_POOL,
            "web3389",
        );
        assert!(graph.get(&nat).is_some());
    }

    #[test]
    fn scale_set_depends_on_subnet_pool_and_nat_pools() {
        let mut p = params();
        p.image = "UbuntuLTS".to_string();
        p.nat_backend_ports = Some(vec![22, 2222]);
        let graph = build_graph(&p).unwrap();

        let scale_set = graph.get(&ResourceIdentity::new(SCALE_SET, "web")).unwrap();
        let deps: Vec<String> = scale_set.depends_on.iter().map(|d| d.key()).collect();
        assert!(deps.contains(&"virtual-network:web/subnet:web".to_string()));
        assert!(deps.contains(&"load-balancer:web/backend-pool:web".to_string()));
        assert!(deps.contains(&"load-balancer:web/inbound-nat-pool:web22".to_string()));
        assert!(deps.contains(&"load-balancer:web/inbound-nat-pool:web2222".to_string()));
    }

    #[test]
    fn provisioning_order_starts_at_the_group() {
        let graph = build_graph(&params()).unwrap();
        let order: Vec<String> = graph
            .topological_order()
            .unwrap()
            .iter()
            .map(|n| n.identity.key())
            .collect();
        assert_eq!(order[0], "resource-group:web");
        assert_eq!(order.last().unwrap(), "scale-set:web");
        let pos = |key: &str| order.iter().position(|k| k == key).unwrap();
        assert!(pos("virtual-network:web") < pos("virtual-network:web/subnet:web"));
        assert!(pos("load-balancer:web") < pos("load-balancer:web/frontend-ip-config:web"));
    }

    #[test]
    fn nat_ranges_are_allocated_by_port_index() {
        let mut p = params();
        p.nat_backend_ports = Some(vec![80, 8080]);
        let graph = build_graph(&p).unwrap();
        let lb = ResourceIdentity::new(LOAD_BALANCER, "web");

        let first = graph
            .get(&ResourceIdentity::child_of(&lb, INBOUND_NAT_POOL, "web80"))
            .unwrap();
        assert_eq!(first.desired["frontend_port_start"], 50_000);
        assert_eq!(first.desired["frontend_port_end"], 50_004);

        let second = graph
            .get(&ResourceIdentity::child_of(&lb, INBOUND_NAT_POOL, "web8080"))
            .unwrap();
        assert_eq!(second.desired["frontend_port_start"], 52_000);
        assert_eq!(second.desired["frontend_port_end"], 52_004);
    }

    #[test]
    fn oversized_instance_count_is_rejected() {
        let mut p = params();
        p.instance_count = 1_000;
        assert!(build_graph(&p).is_err());
    }
}
