//! NAT frontend port-range allocation
//!
//! Deterministic, index-based: the i-th NAT backend port gets a frontend
//! range starting at `BASE + i * STRIDE` spanning `2 * instance_count`
//! ports. The fixed stride keeps ranges disjoint as long as
//! `2 * instance_count < STRIDE`; nothing is negotiated with the control
//! plane.

use skyset_engine::{EngineError, Result};
use serde::{Deserialize, Serialize};

pub const PORT_RANGE_BASE: u32 = 50_000;
pub const PORT_RANGE_STRIDE: u32 = 2_000;

/// Inclusive frontend port range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRange {
    pub start: u32,
    pub end: u32,
}

impl std::fmt::Display for PortRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Frontend range for the pool at `index`.
pub fn nat_pool_range(index: usize, instance_count: u32) -> PortRange {
    let start = PORT_RANGE_BASE + index as u32 * PORT_RANGE_STRIDE;
    PortRange {
        start,
        end: start + 2 * instance_count,
    }
}

/// Range reported to the presentation layer: the base pool's span.
pub fn allocated_span(instance_count: u32) -> PortRange {
    nat_pool_range(0, instance_count)
}

/// Reject configurations whose ranges would overlap or leave the valid
/// port space.
pub fn validate_capacity(instance_count: u32, pool_count: usize) -> Result<()> {
    if 2 * instance_count >= PORT_RANGE_STRIDE {
        return Err(EngineError::Configuration(format!(
            "instance count {instance_count} needs {} frontend ports per pool, \
             which overlaps the next pool's range (stride {PORT_RANGE_STRIDE})",
            2 * instance_count
        )));
    }
    if pool_count > 0 {
        let last = nat_pool_range(pool_count - 1, instance_count);
        if last.end > u16::MAX as u32 {
            return Err(EngineError::Configuration(format!(
                "{pool_count} NAT pools exceed the port space (last range {last})"
            )));
        }
    }
    Ok(())
}
