//! Error types for meshneighd
//!
//! # NIST 800-53 Rev 5 Control Mappings
//! - SI-11: Error Handling - Structured error types with contextual information
//! - AU-3: Content of Audit Records - Errors carry the failing interface or errno

use respondd::RespondError;
use thiserror::Error;

/// Errors that can occur during a discovery run
#[derive(Debug, Error)]
pub enum MeshError {
    /// The interface directory could not be queried
    /// NIST: CM-8 (System Component Inventory) - no inventory, no run
    #[error("Interface directory error: {0}")]
    Directory(String),

    /// Two directory entries claimed the same kernel index
    #[error("Duplicate interface index {0} in directory result")]
    DuplicateInterface(u32),

    /// Netlink socket or kernel error during a link dump
    /// NIST: SC-7 (Boundary Protection) - Kernel interface errors
    #[error("Netlink error: {0}")]
    Netlink(String),

    /// A respondd request failed
    #[error("respondd error: {0}")]
    Respondd(#[from] RespondError),

    /// Configuration error
    /// NIST: CM-6 (Configuration Settings) - Configuration validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for meshneighd operations
pub type Result<T> = std::result::Result<T, MeshError>;
