//! JSON report of a discovery run
//!
//! ```json
//! {
//!   "network": {"mesh": {"link_macs": {"mesh0": "02:ca:fe:00:00:01"}}},
//!   "neighbours": [
//!     {"interface": "mesh0", "address": "fe80::1", "nodeinfo": {"hostname": "node-a"}}
//!   ],
//!   "errors": []
//! }
//! ```

use crate::discovery::DiscoveryRun;
use crate::error::Result;
use mesh_types::MacAddress;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::Ipv6Addr;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryReport {
    pub network: NetworkSection,
    pub neighbours: Vec<NeighbourEntry>,
    pub errors: Vec<ErrorEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkSection {
    pub mesh: MeshSection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshSection {
    /// Device name to hardware address of our own interfaces
    pub link_macs: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeighbourEntry {
    pub interface: String,
    pub address: Ipv6Addr,
    /// Present when the address is EUI-64 derived
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac: Option<MacAddress>,
    /// Parsed payload, or the payload as text when it is not JSON
    pub nodeinfo: serde_json::Value,
}

/// Which part of the run failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorStage {
    Respondd,
    LinkDump,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub stage: ErrorStage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errno: Option<i32>,
}

impl DiscoveryReport {
    pub fn from_run(run: &DiscoveryRun) -> Self {
        let set = &run.interfaces;

        let neighbours = run
            .neighbours
            .neighbours
            .iter()
            .map(|n| NeighbourEntry {
                interface: set[n.interface].name.clone(),
                address: n.address,
                mac: n.hardware_address(),
                nodeinfo: n.payload_json().unwrap_or_else(|| {
                    serde_json::Value::String(String::from_utf8_lossy(&n.payload).into_owned())
                }),
            })
            .collect();

        let mut errors: Vec<ErrorEntry> = run
            .neighbours
            .failures
            .iter()
            .map(|f| ErrorEntry {
                stage: ErrorStage::Respondd,
                interface: Some(f.name.clone()),
                message: f.error.to_string(),
                errno: f.error.raw_os_error(),
            })
            .collect();
        if let Some(e) = &run.link_error {
            errors.push(ErrorEntry {
                stage: ErrorStage::LinkDump,
                interface: None,
                message: e.to_string(),
                errno: None,
            });
        }

        Self {
            network: NetworkSection {
                mesh: MeshSection {
                    link_macs: run.links.by_name(set),
                },
            },
            neighbours,
            errors,
        }
    }

    pub fn to_json(&self, pretty: bool) -> Result<String> {
        let json = if pretty {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        };
        Ok(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MeshError;
    use crate::link_layer::LinkLayerTable;
    use crate::neighbours::{InterfaceFailure, NeighbourCollection};
    use crate::types::{Interface, InterfaceSet, Neighbour};
    use pretty_assertions::assert_eq;
    use respondd::RespondError;
    use serde_json::json;

    fn run() -> DiscoveryRun {
        let interfaces = InterfaceSet::new(vec![
            Interface::new(1, "mesh0", true, "gluon_mesh"),
            Interface::new(2, "mesh1", true, "gluon_mesh"),
        ])
        .unwrap();
        let mesh0 = interfaces.find_index(1).unwrap();
        let mesh1 = interfaces.find_index(2).unwrap();

        let mut links = LinkLayerTable::default();
        links.insert(mesh0, MacAddress::new([0x02, 0xca, 0xfe, 0, 0, 1]));

        let neighbours = NeighbourCollection {
            neighbours: vec![
                Neighbour {
                    interface: mesh0,
                    address: "fe80::1".parse().unwrap(),
                    payload: br#"{"hostname":"node-a"}"#.to_vec(),
                },
                Neighbour {
                    interface: mesh0,
                    address: "fe80::ca:feff:fe00:2".parse().unwrap(),
                    payload: b"plain".to_vec(),
                },
            ],
            failures: vec![InterfaceFailure {
                interface: mesh1,
                name: "mesh1".to_string(),
                error: RespondError::Receive(std::io::Error::from_raw_os_error(101)),
            }],
            requests: 2,
        };

        DiscoveryRun {
            interfaces,
            neighbours,
            links,
            link_error: Some(MeshError::Netlink("Failed to bind socket".to_string())),
        }
    }

    #[test]
    fn test_report_shape() {
        let value = serde_json::to_value(DiscoveryReport::from_run(&run())).unwrap();
        assert_eq!(
            value["network"],
            json!({"mesh": {"link_macs": {"mesh0": "02:ca:fe:00:00:01"}}})
        );
        assert_eq!(
            value["neighbours"][0],
            json!({"interface": "mesh0", "address": "fe80::1", "nodeinfo": {"hostname": "node-a"}})
        );
        assert_eq!(
            value["neighbours"][1],
            json!({
                "interface": "mesh0",
                "address": "fe80::ca:feff:fe00:2",
                "mac": "02:ca:fe:00:00:02",
                "nodeinfo": "plain"
            })
        );
    }

    #[test]
    fn test_report_errors() {
        let report = DiscoveryReport::from_run(&run());
        assert_eq!(report.errors.len(), 2);
        assert_eq!(report.errors[0].stage, ErrorStage::Respondd);
        assert_eq!(report.errors[0].interface.as_deref(), Some("mesh1"));
        assert_eq!(report.errors[0].errno, Some(101));
        assert_eq!(report.errors[1].stage, ErrorStage::LinkDump);

        let value = serde_json::to_value(&report.errors[1]).unwrap();
        assert_eq!(value["stage"], "link_dump");
        assert!(value.get("interface").is_none());
    }

    #[test]
    fn test_to_json() {
        let report = DiscoveryReport::default();
        assert_eq!(
            report.to_json(false).unwrap(),
            r#"{"network":{"mesh":{"link_macs":{}}},"neighbours":[],"errors":[]}"#
        );
        assert!(report.to_json(true).unwrap().contains('\n'));
    }
}
