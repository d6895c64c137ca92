//! Core types for a discovery run
//!
//! Interfaces are owned by the run's [`InterfaceSet`]; neighbours and link
//! records refer back to them by [`InterfaceId`], the position in that set.
//!
//! # NIST 800-53 Rev 5 Control Mappings
//! - CM-8: System Component Inventory - Local mesh interfaces and their peers
//! - IA-3: Device Identification - Hardware addresses per interface

use crate::error::{MeshError, Result};
use mesh_types::{MacAddress, mac_from_link_local};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::Ipv6Addr;
use std::ops::Index;

/// One local mesh-capable network interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interface {
    /// Kernel interface index
    pub index: u32,
    /// Kernel device name (e.g. `mesh0`, `mesh-vpn`)
    pub name: String,
    /// Operational state at directory query time
    pub up: bool,
    /// Routing protocol tag reported by the directory (e.g. `gluon_mesh`)
    pub proto: String,
}

impl Interface {
    pub fn new(index: u32, name: impl Into<String>, up: bool, proto: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
            up,
            proto: proto.into(),
        }
    }
}

/// Position of an interface inside its [`InterfaceSet`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InterfaceId(usize);

impl InterfaceId {
    pub fn position(&self) -> usize {
        self.0
    }
}

/// Ordered set of interfaces for one run; kernel indexes are unique.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterfaceSet {
    interfaces: Vec<Interface>,
}

impl InterfaceSet {
    /// Builds a set in directory order, rejecting duplicate kernel indexes.
    pub fn new(interfaces: Vec<Interface>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(interfaces.len());
        for iface in &interfaces {
            if !seen.insert(iface.index) {
                return Err(MeshError::DuplicateInterface(iface.index));
            }
        }
        Ok(Self { interfaces })
    }

    pub fn len(&self) -> usize {
        self.interfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interfaces.is_empty()
    }

    pub fn get(&self, id: InterfaceId) -> Option<&Interface> {
        self.interfaces.get(id.0)
    }

    /// Looks up an interface by kernel index
    pub fn find_index(&self, ifindex: u32) -> Option<InterfaceId> {
        self.interfaces
            .iter()
            .position(|iface| iface.index == ifindex)
            .map(InterfaceId)
    }

    pub fn iter(&self) -> impl Iterator<Item = (InterfaceId, &Interface)> {
        self.interfaces
            .iter()
            .enumerate()
            .map(|(pos, iface)| (InterfaceId(pos), iface))
    }

    /// Number of interfaces that will be queried
    pub fn up_count(&self) -> usize {
        self.interfaces.iter().filter(|iface| iface.up).count()
    }
}

impl Index<InterfaceId> for InterfaceSet {
    type Output = Interface;

    fn index(&self, id: InterfaceId) -> &Interface {
        &self.interfaces[id.0]
    }
}

/// A peer that answered a respondd query on one of our interfaces
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Neighbour {
    /// Interface the query went out on
    pub interface: InterfaceId,
    /// Source address of the response
    pub address: Ipv6Addr,
    /// Raw response payload
    pub payload: Vec<u8>,
}

impl Neighbour {
    /// Hardware address, when the peer answered from an EUI-64 link-local address
    pub fn hardware_address(&self) -> Option<MacAddress> {
        mac_from_link_local(&self.address)
    }

    /// The payload decoded as JSON, if it is JSON
    pub fn payload_json(&self) -> Option<serde_json::Value> {
        serde_json::from_slice(&self.payload).ok()
    }
}

/// Hardware address of one of our own interfaces, from a link dump
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkLayerRecord {
    pub interface: InterfaceId,
    pub mac: MacAddress,
}
