//! Interface directory providers
//!
//! A directory answers "which local interfaces take part in the mesh" once
//! per discovery run. A failing directory is fatal to the run.
//!
//! # NIST 800-53 Rev 5 Control Mappings
//! - CM-8: System Component Inventory - Enumerate mesh interfaces
//! - SI-10: Information Input Validation - Validate netifd output

use crate::error::{MeshError, Result};
use crate::types::{Interface, InterfaceSet};
use serde::Deserialize;
use std::collections::HashSet;
use std::process::Command;
use tracing::{debug, instrument, warn};

/// Protocol tag given to interfaces of a [`StaticDirectory`]
pub const STATIC_PROTO: &str = "static";

/// Capability: enumerate the local mesh interfaces
pub trait InterfaceDirectory {
    fn mesh_interfaces(&self) -> Result<InterfaceSet>;
}

impl<D: InterfaceDirectory + ?Sized> InterfaceDirectory for Box<D> {
    fn mesh_interfaces(&self) -> Result<InterfaceSet> {
        (**self).mesh_interfaces()
    }
}

impl<D: InterfaceDirectory + ?Sized> InterfaceDirectory for &D {
    fn mesh_interfaces(&self) -> Result<InterfaceSet> {
        (**self).mesh_interfaces()
    }
}

/// Fixed interface list, or a fixed failure
#[derive(Debug, Clone)]
pub struct MemoryDirectory {
    result: std::result::Result<Vec<Interface>, String>,
}

impl MemoryDirectory {
    pub fn new(interfaces: Vec<Interface>) -> Self {
        Self {
            result: Ok(interfaces),
        }
    }

    /// A directory whose every query fails with `reason`
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            result: Err(reason.into()),
        }
    }
}

impl InterfaceDirectory for MemoryDirectory {
    fn mesh_interfaces(&self) -> Result<InterfaceSet> {
        match &self.result {
            Ok(interfaces) => InterfaceSet::new(interfaces.clone()),
            Err(reason) => Err(MeshError::Directory(reason.clone())),
        }
    }
}

/// `ubus call network.interface dump` output
#[derive(Debug, Deserialize)]
struct NetifdDump {
    #[serde(default)]
    interface: Vec<NetifdInterface>,
}

#[derive(Debug, Deserialize)]
struct NetifdInterface {
    interface: String,
    #[serde(default)]
    up: bool,
    #[serde(default)]
    proto: String,
    l3_device: Option<String>,
    device: Option<String>,
}

/// Parses a netifd interface dump.
///
/// Keeps entries whose protocol is in `protocols`, in dump order. The kernel
/// device is `l3_device`, falling back to `device`; `resolve` maps it to a
/// kernel index. Entries without a resolvable device, or that repeat an
/// index already taken, are skipped with a warning.
pub fn parse_dump<F>(json: &str, protocols: &[String], mut resolve: F) -> Result<InterfaceSet>
where
    F: FnMut(&str) -> Option<u32>,
{
    let dump: NetifdDump = serde_json::from_str(json)
        .map_err(|e| MeshError::Directory(format!("Invalid netifd dump: {}", e)))?;

    let mut seen = HashSet::new();
    let mut interfaces = Vec::new();
    for entry in dump.interface {
        if !protocols.iter().any(|p| *p == entry.proto) {
            continue;
        }

        let device = entry.l3_device.as_deref().or(entry.device.as_deref());
        let Some(device) = device else {
            warn!(interface = %entry.interface, "Mesh interface has no device, skipping");
            continue;
        };
        let Some(index) = resolve(device) else {
            warn!(interface = %entry.interface, device, "Cannot resolve device index, skipping");
            continue;
        };
        if !seen.insert(index) {
            warn!(interface = %entry.interface, device, index, "Device already listed, skipping");
            continue;
        }

        debug!(interface = %entry.interface, device, index, up = entry.up, "Found mesh interface");
        interfaces.push(Interface::new(index, device, entry.up, entry.proto));
    }

    InterfaceSet::new(interfaces)
}

/// Queries netifd over the `ubus` command line client
#[derive(Debug, Clone)]
pub struct UbusDirectory {
    command: String,
    object: String,
    protocols: Vec<String>,
}

impl UbusDirectory {
    pub fn new(command: impl Into<String>, object: impl Into<String>, protocols: Vec<String>) -> Self {
        Self {
            command: command.into(),
            object: object.into(),
            protocols,
        }
    }
}

impl InterfaceDirectory for UbusDirectory {
    #[instrument(skip(self), fields(object = %self.object))]
    fn mesh_interfaces(&self) -> Result<InterfaceSet> {
        let output = Command::new(&self.command)
            .args(["call", self.object.as_str(), "dump"])
            .output()
            .map_err(|e| MeshError::Directory(format!("Failed to run {}: {}", self.command, e)))?;

        if !output.status.success() {
            return Err(MeshError::Directory(format!(
                "{} call {} dump failed ({}): {}",
                self.command,
                self.object,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let json = String::from_utf8_lossy(&output.stdout);
        parse_dump(&json, &self.protocols, kernel_index)
    }
}

/// Interfaces named in the configuration
#[derive(Debug, Clone)]
pub struct StaticDirectory {
    names: Vec<String>,
}

impl StaticDirectory {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }
}

impl InterfaceDirectory for StaticDirectory {
    #[instrument(skip(self))]
    fn mesh_interfaces(&self) -> Result<InterfaceSet> {
        let up = up_devices()?;
        let mut interfaces = Vec::with_capacity(self.names.len());
        for name in &self.names {
            let index = kernel_index(name)
                .ok_or_else(|| MeshError::Directory(format!("Unknown interface {}", name)))?;
            interfaces.push(Interface::new(index, name.as_str(), up.contains(name), STATIC_PROTO));
        }
        InterfaceSet::new(interfaces)
    }
}

#[cfg(target_os = "linux")]
fn kernel_index(name: &str) -> Option<u32> {
    nix::net::if_::if_nametoindex(name).ok()
}

#[cfg(not(target_os = "linux"))]
fn kernel_index(_name: &str) -> Option<u32> {
    None
}

/// Names of all devices with `IFF_UP` set
#[cfg(target_os = "linux")]
fn up_devices() -> Result<HashSet<String>> {
    use nix::net::if_::InterfaceFlags;

    let addrs = nix::ifaddrs::getifaddrs()
        .map_err(|e| MeshError::Directory(format!("getifaddrs failed: {}", e)))?;
    Ok(addrs
        .filter(|a| a.flags.contains(InterfaceFlags::IFF_UP))
        .map(|a| a.interface_name)
        .collect())
}

#[cfg(not(target_os = "linux"))]
fn up_devices() -> Result<HashSet<String>> {
    Ok(HashSet::new())
}
