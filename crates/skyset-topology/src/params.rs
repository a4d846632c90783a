//! Desired parameters for a scale-set topology
//!
//! A flat, immutable input struct with documented defaults. Parameter
//! binding (CLI flags, config files, prompts) happens upstream; this crate
//! only consumes the finished struct.

use skyset_engine::{EngineError, Result};
use serde::{Deserialize, Serialize};

/// How the public IP address is allocated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllocationMethod {
    Static,
    Dynamic,
}

impl std::fmt::Display for AllocationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AllocationMethod::Static => write!(f, "Static"),
            AllocationMethod::Dynamic => write!(f, "Dynamic"),
        }
    }
}

/// Instance upgrade policy of the scale set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpgradePolicy {
    Automatic,
    Manual,
    Rolling,
}

impl std::fmt::Display for UpgradePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpgradePolicy::Automatic => write!(f, "Automatic"),
            UpgradePolicy::Manual => write!(f, "Manual"),
            UpgradePolicy::Rolling => write!(f, "Rolling"),
        }
    }
}

/// Desired configuration for one scale-set deployment.
///
/// Every optional resource name defaults to the scale-set name; every other
/// default matches the documented quick-create behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScaleSetParams {
    /// Scale set name, also the fallback for every other resource name
    pub name: String,

    pub admin_username: String,

    /// Write-only credential: sent in specs, never compared against remote
    /// state
    pub admin_password: String,

    /// Image alias from the catalog in [`crate::image`]
    pub image: String,

    pub instance_count: u32,

    pub vm_size: String,

    pub upgrade_policy: Option<UpgradePolicy>,

    /// Deployment location; inherited from an existing resource group when
    /// unset
    pub location: Option<String>,

    pub resource_group: Option<String>,

    pub virtual_network: Option<String>,
    pub vnet_address_prefix: String,

    pub subnet: Option<String>,
    pub subnet_address_prefix: String,

    pub public_ip: Option<String>,
    /// Generated and checked for global uniqueness when unset
    pub domain_name_label: Option<String>,
    pub allocation_method: AllocationMethod,

    /// Availability zones for the load-balancer frontend
    pub zones: Vec<String>,

    pub load_balancer: Option<String>,
    pub frontend_pool: Option<String>,
    pub backend_pool: Option<String>,

    /// Ports load-balanced straight through (frontend port == backend port)
    pub backend_ports: Vec<u16>,

    /// Per-instance NAT ports; defaults by image OS family (22 or 3389)
    pub nat_backend_ports: Option<Vec<u16>>,
}

impl ScaleSetParams {
    pub fn new(
        name: impl Into<String>,
        admin_username: impl Into<String>,
        admin_password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            admin_username: admin_username.into(),
            admin_password: admin_password.into(),
            image: "Win2016Datacenter".to_string(),
            instance_count: 2,
            vm_size: "Standard_DS1_v2".to_string(),
            upgrade_policy: None,
            location: None,
            resource_group: None,
            virtual_network: None,
            vnet_address_prefix: "192.168.0.0/16".to_string(),
            subnet: None,
            subnet_address_prefix: "192.168.1.0/24".to_string(),
            public_ip: None,
            domain_name_label: None,
            allocation_method: AllocationMethod::Static,
            zones: Vec::new(),
            load_balancer: None,
            frontend_pool: None,
            backend_pool: None,
            backend_ports: vec![80],
            nat_backend_ports: None,
        }
    }

    pub fn resource_group_name(&self) -> &str {
        self.resource_group.as_deref().unwrap_or(&self.name)
    }

    pub fn virtual_network_name(&self) -> &str {
        self.virtual_network.as_deref().unwrap_or(&self.name)
    }

    pub fn subnet_name(&self) -> &str {
        self.subnet.as_deref().unwrap_or(&self.name)
    }

    pub fn public_ip_name(&self) -> &str {
        self.public_ip.as_deref().unwrap_or(&self.name)
    }

    pub fn load_balancer_name(&self) -> &str {
        self.load_balancer.as_deref().unwrap_or(&self.name)
    }

    pub fn frontend_pool_name(&self) -> &str {
        self.frontend_pool.as_deref().unwrap_or(&self.name)
    }

    pub fn backend_pool_name(&self) -> &str {
        self.backend_pool.as_deref().unwrap_or(&self.name)
    }

    /// Pre-network sanity checks; every failure is a configuration error.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(EngineError::Configuration(
                "scale set name must not be empty".into(),
            ));
        }
        if self.admin_username.trim().is_empty() {
            return Err(EngineError::Configuration(
                "admin username must not be empty".into(),
            ));
        }
        if self.instance_count == 0 {
            return Err(EngineError::Configuration(
                "instance count must be at least 1".into(),
            ));
        }
        check_unique_ports("backend ports", &self.backend_ports)?;
        if let Some(nat_ports) = &self.nat_backend_ports {
            check_unique_ports("NAT backend ports", nat_ports)?;
        }
        Ok(())
    }
}

fn check_unique_ports(what: &str, ports: &[u16]) -> Result<()> {
    let mut seen = std::collections::HashSet::new();
    for port in ports {
        if !seen.insert(port) {
            return Err(EngineError::Configuration(format!(
                "{what} contain duplicate port {port}"
            )));
        }
    }
    Ok(())
}
