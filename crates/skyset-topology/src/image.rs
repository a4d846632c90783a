//! Image alias catalog
//!
//! Maps the documented image aliases to their marketplace URNs and OS
//! family. The OS family decides the default per-instance NAT port (SSH
//! for Linux, RDP for Windows).

use crate::params::ScaleSetParams;
use skyset_engine::{EngineError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OsFamily {
    Linux,
    Windows,
}

impl OsFamily {
    /// Default NAT backend port when none is configured
    pub fn default_nat_port(self) -> u16 {
        match self {
            OsFamily::Linux => 22,
            OsFamily::Windows => 3389,
        }
    }
}

impl std::fmt::Display for OsFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OsFamily::Linux => write!(f, "linux"),
            OsFamily::Windows => write!(f, "windows"),
        }
    }
}

/// Resolved marketplace image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageReference {
    pub alias: String,
    pub os: OsFamily,
    pub urn: String,
}

const CATALOG: &[(&str, OsFamily, &str)] = &[
    ("CentOS", OsFamily::Linux, "OpenLogic:CentOS:7.5:latest"),
    ("CoreOS", OsFamily::Linux, "CoreOS:CoreOS:Stable:latest"),
    ("Debian", OsFamily::Linux, "credativ:Debian:8:latest"),
    (
        "openSUSE-Leap",
        OsFamily::Linux,
        "SUSE:openSUSE-Leap:42.3:latest",
    ),
    ("RHEL", OsFamily::Linux, "RedHat:RHEL:7-RAW:latest"),
    ("SLES", OsFamily::Linux, "SUSE:SLES:12-SP2:latest"),
    (
        "UbuntuLTS",
        OsFamily::Linux,
        "Canonical:UbuntuServer:16.04-LTS:latest",
    ),
    (
        "Win2016Datacenter",
        OsFamily::Windows,
        "MicrosoftWindowsServer:WindowsServer:2016-Datacenter:latest",
    ),
    (
        "Win2012R2Datacenter",
        OsFamily::Windows,
        "MicrosoftWindowsServer:WindowsServer:2012-R2-Datacenter:latest",
    ),
    (
        "Win2012Datacenter",
        OsFamily::Windows,
        "MicrosoftWindowsServer:WindowsServer:2012-Datacenter:latest",
    ),
    (
        "Win2008R2SP1",
        OsFamily::Windows,
        "MicrosoftWindowsServer:WindowsServer:2008-R2-SP1:latest",
    ),
];

/// Look an alias up in the catalog (case-insensitive).
pub fn lookup(alias: &str) -> Result<ImageReference> {
    CATALOG
        .iter()
        .find(|(known, _, _)| known.eq_ignore_ascii_case(alias))
        .map(|(known, os, urn)| ImageReference {
            alias: (*known).to_string(),
            os: *os,
            urn: (*urn).to_string(),
        })
        .ok_or_else(|| {
            EngineError::Configuration(format!(
                "unknown image alias '{alias}' (known: {})",
                CATALOG
                    .iter()
                    .map(|(a, _, _)| *a)
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
        })
}

/// Configured NAT backend ports, or the OS-family default.
pub fn effective_nat_ports(params: &ScaleSetParams, image: &ImageReference) -> Vec<u16> {
    params
        .nat_backend_ports
        .clone()
        .unwrap_or_else(|| vec![image.os.default_nat_port()])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_aliases() {
        let ubuntu = lookup("UbuntuLTS").unwrap();
        assert_eq!(ubuntu.os, OsFamily::Linux);
        assert_eq!(ubuntu.urn, "Canonical:UbuntuServer:16.04-LTS:latest");

        let win = lookup("win2016datacenter").unwrap();
        assert_eq!(win.os, OsFamily::Windows);
        assert_eq!(win.alias, "Win2016Datacenter");
    }

    #[test]
    fn unknown_alias_is_a_configuration_error() {
        let err = lookup("TempleOS").unwrap_err();
        assert!(err.to_string().contains("unknown image alias"));
    }

    #[test]
    fn nat_ports_default_by_os_family() {
        let params = ScaleSetParams::new("web", "admin", "secret");
        assert_eq!(
            effective_nat_ports(&params, &lookup("UbuntuLTS").unwrap()),
            vec![22]
        );
        assert_eq!(
            effective_nat_ports(&params, &lookup("Win2016Datacenter").unwrap()),
            vec![3389]
        );

        let mut explicit = params;
        explicit.nat_backend_ports = Some(vec![2222]);
        assert_eq!(
            effective_nat_ports(&explicit, &lookup("UbuntuLTS").unwrap()),
            vec![2222]
        );
    }
}
