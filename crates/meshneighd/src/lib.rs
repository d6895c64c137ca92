//! Mesh neighbour discovery
//!
//! Answers two questions for a mesh router: which nodes are one hop away on
//! each mesh interface, and what are the hardware addresses of our own mesh
//! interfaces.
//!
//! Neighbours are found with a respondd `nodeinfo` query sent to `ff02::1`
//! on every up mesh interface; our own addresses come from one rtnetlink
//! link dump. Both consume the interface list of a single directory query.
//!
//! # NIST 800-53 Rev 5 Control Mappings
//!
//! | Control | Description | Implementation |
//! |---------|-------------|----------------|
//! | AU-3 | Content of Audit Records | Per-interface failure records in the report |
//! | CM-6 | Configuration Settings | TOML configuration with validation |
//! | CM-8 | System Component Inventory | Mesh interfaces and their hardware addresses |
//! | IA-3 | Device Identification | Peer MAC recovered from EUI-64 addresses |
//! | SC-7 | Boundary Protection | Link-local scope for every query |
//! | SI-4 | System Monitoring | One-hop neighbour discovery |
//! | SI-10 | Input Validation | Bounds-checked netlink and attribute parsing |
//! | SI-11 | Error Handling | Structured error types |
//!
//! # Architecture
//!
//! ```text
//!                      ┌─────────────────────┐
//!                      │ InterfaceDirectory  │  ubus / static / memory
//!                      └──────────┬──────────┘
//!                                 │ InterfaceSet
//!                ┌────────────────┴────────────────┐
//!                ▼                                 ▼
//!   ┌─────────────────────────┐       ┌─────────────────────────┐
//!   │  NeighbourAggregator    │       │   collect_link_macs     │
//!   │  respondd per up iface  │       │   RTM_GETLINK dump      │
//!   └────────────┬────────────┘       └────────────┬────────────┘
//!                │ Neighbours                      │ LinkLayerTable
//!                └────────────────┬────────────────┘
//!                                 ▼
//!                          DiscoveryReport
//! ```

pub mod attr;
pub mod config;
pub mod directory;
pub mod discovery;
pub mod error;
pub mod link_layer;
pub mod neighbours;
pub mod netlink;
pub mod report;
pub mod types;

pub use config::{DirectorySource, MeshConfig};
pub use directory::{InterfaceDirectory, MemoryDirectory, StaticDirectory, UbusDirectory};
pub use discovery::{Discovery, DiscoveryRun};
pub use error::{MeshError, Result};
pub use link_layer::{LinkLayerTable, collect_link_macs};
pub use neighbours::{
    AcceptAll, InterfaceFailure, JsonPayloadFilter, NeighbourAggregator, NeighbourCollection,
    NeighbourFilter,
};
pub use netlink::{LinkDumpProvider, RecordedLinkDump, RtnlLinkDump};
pub use report::DiscoveryReport;
pub use types::{Interface, InterfaceId, InterfaceSet, LinkLayerRecord, Neighbour};
