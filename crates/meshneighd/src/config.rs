//! Configuration file support for meshneighd
//!
//! Loads and validates meshneighd configuration from TOML files.
//! Default location: /etc/meshneighd.toml

use crate::error::{MeshError, Result};
use crate::neighbours::{DEFAULT_RESPONDD_PORT, NODEINFO_QUERY, RESPONDD_TIMEOUT};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Default configuration file
pub const DEFAULT_CONFIG_PATH: &str = "/etc/meshneighd.toml";

/// Smallest accepted receive buffer
const MIN_RECEIVE_BUFFER: usize = 64;

/// respondd request settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RespondConfig {
    /// UDP port respondd listens on at the peers
    #[serde(default = "default_port")]
    pub port: u16,

    /// Query string sent as the datagram payload
    #[serde(default = "default_query")]
    pub query: String,

    /// Budget for each interface's request in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Receive buffer size; longer responses are truncated
    #[serde(default = "default_receive_buffer")]
    pub receive_buffer: usize,
}

/// Where the mesh interface list comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectorySource {
    /// netifd over ubus
    #[default]
    Ubus,
    /// The `interfaces` list below
    Static,
}

/// Interface directory settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryConfig {
    #[serde(default)]
    pub source: DirectorySource,

    /// ubus client binary
    #[serde(default = "default_ubus_command")]
    pub ubus_command: String,

    /// ubus object exposing the interface dump
    #[serde(default = "default_ubus_object")]
    pub ubus_object: String,

    /// netifd protocols that mark an interface as a mesh interface
    #[serde(default = "default_mesh_protocols")]
    pub mesh_protocols: Vec<String>,

    /// Kernel device names for the static source
    #[serde(default)]
    pub interfaces: Vec<String>,
}

/// Report settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Drop responses whose payload is not JSON
    #[serde(default = "default_require_json")]
    pub require_json: bool,
}

/// Complete meshneighd configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshConfig {
    #[serde(default)]
    pub respondd: RespondConfig,

    #[serde(default)]
    pub directory: DirectoryConfig,

    #[serde(default)]
    pub report: ReportConfig,
}

// Default functions
fn default_port() -> u16 {
    DEFAULT_RESPONDD_PORT
}

fn default_query() -> String {
    NODEINFO_QUERY.to_string()
}

fn default_timeout_ms() -> u64 {
    RESPONDD_TIMEOUT.as_millis() as u64
}

fn default_receive_buffer() -> usize {
    respondd::DEFAULT_RECEIVE_BUFFER
}

fn default_ubus_command() -> String {
    "ubus".to_string()
}

fn default_ubus_object() -> String {
    "network.interface".to_string()
}

fn default_mesh_protocols() -> Vec<String> {
    vec!["gluon_mesh".to_string()]
}

fn default_require_json() -> bool {
    true
}

impl Default for RespondConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            query: default_query(),
            timeout_ms: default_timeout_ms(),
            receive_buffer: default_receive_buffer(),
        }
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            source: DirectorySource::default(),
            ubus_command: default_ubus_command(),
            ubus_object: default_ubus_object(),
            mesh_protocols: default_mesh_protocols(),
            interfaces: Vec::new(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            require_json: default_require_json(),
        }
    }
}

impl MeshConfig {
    /// Load configuration from file, falling back to defaults if file not found
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| {
                MeshError::Config(format!(
                    "Failed to parse config file {}: {}",
                    path.display(),
                    e
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "Config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(MeshError::Io(e)),
        }
    }

    /// Per-interface request budget as Duration
    pub fn respondd_timeout(&self) -> Duration {
        Duration::from_millis(self.respondd.timeout_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.respondd.port == 0 {
            return Err(MeshError::Config("respondd port must be > 0".to_string()));
        }

        if self.respondd.timeout_ms == 0 {
            return Err(MeshError::Config("timeout_ms must be > 0".to_string()));
        }

        if self.respondd.receive_buffer < MIN_RECEIVE_BUFFER {
            return Err(MeshError::Config(format!(
                "receive_buffer must be at least {} bytes",
                MIN_RECEIVE_BUFFER
            )));
        }

        if self.respondd.query.is_empty() {
            return Err(MeshError::Config("query must not be empty".to_string()));
        }

        if self.directory.source == DirectorySource::Static && self.directory.interfaces.is_empty()
        {
            return Err(MeshError::Config(
                "static directory needs at least one interface".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = MeshConfig::default();
        assert_eq!(config.respondd.port, 1001);
        assert_eq!(config.respondd.query, "nodeinfo");
        assert_eq!(config.respondd_timeout(), Duration::from_secs(3));
        assert_eq!(config.respondd.receive_buffer, 1500);
        assert_eq!(config.directory.source, DirectorySource::Ubus);
        assert_eq!(config.directory.mesh_protocols, vec!["gluon_mesh"]);
        assert!(config.report.require_json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_deserialization() {
        let toml_str = r#"
[respondd]
timeout_ms = 500

[directory]
source = "static"
interfaces = ["mesh0", "mesh-vpn"]
"#;
        let config: MeshConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.respondd_timeout(), Duration::from_millis(500));
        assert_eq!(config.directory.source, DirectorySource::Static);
        assert_eq!(config.directory.interfaces, vec!["mesh0", "mesh-vpn"]);
        // Unspecified values should use defaults
        assert_eq!(config.respondd.port, 1001);
        assert_eq!(config.directory.ubus_object, "network.interface");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = MeshConfig::default();
        config.respondd.port = 0;
        assert!(config.validate().is_err());

        let mut config = MeshConfig::default();
        config.respondd.timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = MeshConfig::default();
        config.respondd.receive_buffer = 16;
        assert!(config.validate().is_err());

        let mut config = MeshConfig::default();
        config.respondd.query.clear();
        assert!(config.validate().is_err());

        let mut config = MeshConfig::default();
        config.directory.source = DirectorySource::Static;
        assert!(matches!(config.validate(), Err(MeshError::Config(_))));
    }

    #[test]
    fn test_load_nonexistent_file_defaults() {
        let config = MeshConfig::load_or_default("/nonexistent/meshneighd.toml").unwrap();
        assert_eq!(config, MeshConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[respondd]\nport = 4242\n\n[report]\nrequire_json = false").unwrap();

        let config = MeshConfig::load_or_default(file.path()).unwrap();
        assert_eq!(config.respondd.port, 4242);
        assert!(!config.report.require_json);
    }

    #[test]
    fn test_load_invalid_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[respondd\nport = ").unwrap();
        assert!(matches!(
            MeshConfig::load_or_default(file.path()),
            Err(MeshError::Config(_))
        ));
    }
}
