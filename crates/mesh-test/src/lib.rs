//! Test infrastructure for mesh neighbour discovery
//!
//! Provides:
//! - Scripted datagram sockets implementing the respondd socket seam
//! - A shared log of socket opens, closes, sends and receive timeouts
//! - Netlink link-dump message builders for attribute parsing tests

pub mod netlink_fixtures;
pub mod sockets;

pub use netlink_fixtures::*;
pub use sockets::*;
