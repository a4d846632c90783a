//! Skyset Scale-Set Topology
//!
//! The concrete resource model converged by the skyset engine: a resource
//! group, virtual network and subnet, public IP, load balancer with
//! frontend/backend pools, pass-through rules and inbound NAT pools, and
//! the scale set itself.
//!
//! [`converge`] is the one-call entry point; the individual stages
//! ([`build_graph`], [`resolve_target`]) are public for frontends that
//! want to preview a plan before executing it.

pub mod builder;
pub mod converge;
pub mod image;
pub mod kinds;
pub mod labels;
pub mod params;
pub mod ports;
pub mod resolve;

// Re-exports
pub use builder::build_graph;
pub use converge::{ConvergeOutput, converge};
pub use image::{ImageReference, OsFamily};
pub use kinds::registry;
pub use labels::DnsLabelGenerator;
pub use params::{AllocationMethod, ScaleSetParams, UpgradePolicy};
pub use ports::{PORT_RANGE_BASE, PORT_RANGE_STRIDE, PortRange, allocated_span};
pub use resolve::{ResolvedTarget, fqdn, resolve_target};
