//! Hardware addresses of our own mesh interfaces
//!
//! A single `RTM_GETLINK` dump is scanned for `IFLA_ADDRESS`; records for
//! interfaces outside the run's [`InterfaceSet`] are ignored and the first
//! valid address per interface wins.

use crate::error::{MeshError, Result};
use crate::netlink::{IFLA_ADDRESS, LinkDumpProvider, messages};
use crate::types::{InterfaceId, InterfaceSet, LinkLayerRecord};
use mesh_types::MacAddress;
use std::collections::BTreeMap;
use tracing::{debug, instrument, trace, warn};

/// At most one [`LinkLayerRecord`] per interface, in dump order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkLayerTable {
    records: Vec<LinkLayerRecord>,
}

impl LinkLayerTable {
    /// Records `mac` for `interface` unless it already has one.
    ///
    /// Returns whether the record was kept.
    pub fn insert(&mut self, interface: InterfaceId, mac: MacAddress) -> bool {
        if self.get(interface).is_some() {
            return false;
        }
        self.records.push(LinkLayerRecord { interface, mac });
        true
    }

    pub fn get(&self, interface: InterfaceId) -> Option<MacAddress> {
        self.records
            .iter()
            .find(|r| r.interface == interface)
            .map(|r| r.mac)
    }

    pub fn records(&self) -> &[LinkLayerRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Device name to colon-hex address
    pub fn by_name(&self, set: &InterfaceSet) -> BTreeMap<String, String> {
        self.records
            .iter()
            .filter_map(|r| set.get(r.interface).map(|i| (i.name.clone(), r.mac.to_string())))
            .collect()
    }
}

/// Runs one link dump and matches its hardware addresses against `set`.
///
/// Interfaces missing from the dump are simply absent from the table. A
/// kernel `NLMSG_ERROR` inside the dump fails the whole collection.
#[instrument(skip_all, fields(interfaces = set.len()))]
pub fn collect_link_macs<P>(provider: &mut P, set: &InterfaceSet) -> Result<LinkLayerTable>
where
    P: LinkDumpProvider + ?Sized,
{
    let datagrams = provider.dump_links()?;
    let mut table = LinkLayerTable::default();

    for buf in &datagrams {
        for msg in messages(buf) {
            if let Some(errno) = msg.error_code().filter(|&e| e != 0) {
                return Err(MeshError::Netlink(format!(
                    "Link dump failed: {}",
                    std::io::Error::from_raw_os_error(errno)
                )));
            }
            let Some(link) = msg.link() else {
                continue;
            };
            let Some(id) = set.find_index(link.index) else {
                trace!(index = link.index, "Link not a mesh interface");
                continue;
            };

            let mac = link
                .attributes()
                .filter(|a| a.kind() == IFLA_ADDRESS)
                .find_map(|a| a.hardware_address());
            let Some(mac) = mac else {
                warn!(interface = %set[id].name, "No hardware address for interface");
                continue;
            };

            if table.insert(id, mac) {
                debug!(interface = %set[id].name, %mac, "Found interface hardware address");
            } else {
                trace!(interface = %set[id].name, %mac, "Ignoring repeated link record");
            }
        }
    }

    Ok(table)
}
