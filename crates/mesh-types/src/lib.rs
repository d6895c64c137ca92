//! Common types shared by the mesh neighbour discovery crates.
//!
//! - [`MacAddress`]: 48-bit hardware addresses as reported by a link dump
//! - [`ALL_NODES`]: the link-scoped all-nodes multicast group used for respondd
//! - [`mac_from_link_local`]: hardware address behind an EUI-64 link-local address

mod ip;
mod mac;

pub use ip::{ALL_NODES, mac_from_link_local, scoped};
pub use mac::MacAddress;

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid MAC address format: {0}")]
    InvalidMacAddress(String),

    #[error("invalid hardware address length: expected 6 bytes, got {0}")]
    InvalidMacLength(usize),
}
