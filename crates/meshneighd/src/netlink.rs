//! rtnetlink framing and the kernel link dump
//!
//! Messages are parsed straight out of the receive buffer; only the fixed
//! `nlmsghdr` / `ifinfomsg` headers are decoded here, attributes are left to
//! [`crate::attr`].
//!
//! # NIST 800-53 Rev 5 Control Mappings
//! - SC-7: Boundary Protection - Kernel interface for link state
//! - SI-10: Information Input Validation - Header length checks per message

use crate::attr::{self, Attributes};
use crate::error::{MeshError, Result};
use tracing::{trace, warn};

/// `sizeof(struct nlmsghdr)`
pub const NLMSG_HDRLEN: usize = 16;
/// `sizeof(struct ifinfomsg)`
pub const IFINFOMSG_LEN: usize = 16;

pub const NLMSG_ERROR: u16 = 2;
pub const NLMSG_DONE: u16 = 3;
pub const RTM_NEWLINK: u16 = 16;
pub const RTM_GETLINK: u16 = 18;

pub const NLM_F_REQUEST: u16 = 0x1;
/// `NLM_F_ROOT | NLM_F_MATCH`
pub const NLM_F_DUMP: u16 = 0x300;

pub const IFLA_ADDRESS: u16 = 1;
pub const IFLA_IFNAME: u16 = 3;
/// Highest link attribute type accepted by the resolver
pub const IFLA_MAX: u16 = 66;

pub const IFF_UP: u32 = 0x1;

/// One netlink message borrowed from a receive buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetlinkMessage<'a> {
    pub kind: u16,
    pub flags: u16,
    pub seq: u32,
    /// Bytes after the header, up to the declared message length
    pub payload: &'a [u8],
}

impl<'a> NetlinkMessage<'a> {
    /// For `NLMSG_ERROR`, the positive errno (0 for an acknowledgement)
    pub fn error_code(&self) -> Option<i32> {
        if self.kind != NLMSG_ERROR {
            return None;
        }
        let raw = <[u8; 4]>::try_from(self.payload.get(..4)?).ok()?;
        Some(-i32::from_ne_bytes(raw))
    }

    /// Decodes an `RTM_NEWLINK` message
    pub fn link(&self) -> Option<LinkMessage<'a>> {
        if self.kind != RTM_NEWLINK {
            return None;
        }
        if self.payload.len() < IFINFOMSG_LEN {
            warn!(len = self.payload.len(), "Short RTM_NEWLINK message");
            return None;
        }
        let p = self.payload;
        let index = i32::from_ne_bytes([p[4], p[5], p[6], p[7]]);
        let flags = u32::from_ne_bytes([p[8], p[9], p[10], p[11]]);
        Some(LinkMessage {
            index: u32::try_from(index).unwrap_or(0),
            flags,
            attributes: &p[IFINFOMSG_LEN..],
        })
    }
}

/// `ifinfomsg` header plus its attribute area
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkMessage<'a> {
    pub index: u32,
    pub flags: u32,
    attributes: &'a [u8],
}

impl<'a> LinkMessage<'a> {
    pub fn attributes(&self) -> Attributes<'a> {
        attr::attributes(self.attributes, IFLA_MAX)
    }

    pub fn is_up(&self) -> bool {
        self.flags & IFF_UP != 0
    }
}

/// Iterator over the messages of one datagram
#[derive(Debug, Clone)]
pub struct Messages<'a> {
    buf: &'a [u8],
    offset: usize,
}

/// Iterates the netlink messages packed into `buf`.
///
/// A header that declares a length shorter than itself or longer than the
/// rest of the buffer ends the iteration; message boundaries after it cannot
/// be trusted.
pub fn messages(buf: &[u8]) -> Messages<'_> {
    Messages { buf, offset: 0 }
}

impl<'a> Iterator for Messages<'a> {
    type Item = NetlinkMessage<'a>;

    fn next(&mut self) -> Option<NetlinkMessage<'a>> {
        let rest = self.buf.get(self.offset..)?;
        if rest.len() < NLMSG_HDRLEN {
            if !rest.is_empty() {
                trace!(trailing = rest.len(), "Ignoring trailing bytes after last message");
            }
            self.offset = self.buf.len();
            return None;
        }

        let len = u32::from_ne_bytes([rest[0], rest[1], rest[2], rest[3]]) as usize;
        if len < NLMSG_HDRLEN || len > rest.len() {
            warn!(
                offset = self.offset,
                declared = len,
                remaining = rest.len(),
                "Malformed netlink message header, dropping rest of datagram"
            );
            self.offset = self.buf.len();
            return None;
        }

        let msg = NetlinkMessage {
            kind: u16::from_ne_bytes([rest[4], rest[5]]),
            flags: u16::from_ne_bytes([rest[6], rest[7]]),
            seq: u32::from_ne_bytes([rest[8], rest[9], rest[10], rest[11]]),
            payload: &rest[NLMSG_HDRLEN..len],
        };
        self.offset += attr::align(len).min(rest.len());
        Some(msg)
    }
}

/// Builds an `RTM_GETLINK` dump request for all address families.
pub fn link_dump_request(seq: u32) -> Vec<u8> {
    let len = NLMSG_HDRLEN + IFINFOMSG_LEN;
    let mut buf = Vec::with_capacity(len);
    buf.extend_from_slice(&(len as u32).to_ne_bytes());
    buf.extend_from_slice(&RTM_GETLINK.to_ne_bytes());
    buf.extend_from_slice(&(NLM_F_REQUEST | NLM_F_DUMP).to_ne_bytes());
    buf.extend_from_slice(&seq.to_ne_bytes());
    buf.extend_from_slice(&0u32.to_ne_bytes()); // kernel assigns the port id
    // ifinfomsg, AF_UNSPEC and no filters
    buf.resize(len, 0);
    buf
}

/// Checks a dump datagram for its terminator.
///
/// Returns `Ok(true)` once `NLMSG_DONE` for `seq` is seen and fails on an
/// `NLMSG_ERROR` carrying a non-zero errno.
pub fn dump_complete(buf: &[u8], seq: u32) -> Result<bool> {
    for msg in messages(buf) {
        if msg.seq != seq {
            trace!(seq = msg.seq, expected = seq, "Ignoring message from another request");
            continue;
        }
        match msg.kind {
            NLMSG_DONE => return Ok(true),
            NLMSG_ERROR => match msg.error_code() {
                Some(0) => {}
                Some(errno) => {
                    return Err(MeshError::Netlink(format!(
                        "Kernel rejected link dump: {}",
                        std::io::Error::from_raw_os_error(errno)
                    )));
                }
                None => {
                    return Err(MeshError::Netlink("Truncated NLMSG_ERROR".to_string()));
                }
            },
            _ => {}
        }
    }
    Ok(false)
}

/// Source of raw link-dump datagrams
pub trait LinkDumpProvider {
    /// Requests a full link dump and returns every datagram of the answer.
    fn dump_links(&mut self) -> Result<Vec<Vec<u8>>>;
}

impl<P: LinkDumpProvider + ?Sized> LinkDumpProvider for Box<P> {
    fn dump_links(&mut self) -> Result<Vec<Vec<u8>>> {
        (**self).dump_links()
    }
}

/// Replays datagrams captured earlier
#[derive(Debug, Clone, Default)]
pub struct RecordedLinkDump {
    datagrams: Vec<Vec<u8>>,
}

impl RecordedLinkDump {
    pub fn new(datagrams: Vec<Vec<u8>>) -> Self {
        Self { datagrams }
    }
}

impl LinkDumpProvider for RecordedLinkDump {
    fn dump_links(&mut self) -> Result<Vec<Vec<u8>>> {
        Ok(self.datagrams.clone())
    }
}

#[cfg(target_os = "linux")]
mod linux {
    use super::{LinkDumpProvider, dump_complete, link_dump_request};
    use crate::error::{MeshError, Result};
    use netlink_sys::{Socket, protocols::NETLINK_ROUTE};
    use std::time::{SystemTime, UNIX_EPOCH};
    use tracing::{debug, instrument};

    /// Kernel link dump over a `NETLINK_ROUTE` socket
    ///
    /// Each dump opens its own socket; it is closed when the dump returns.
    #[derive(Debug, Default)]
    pub struct RtnlLinkDump;

    impl RtnlLinkDump {
        pub fn new() -> Self {
            Self
        }
    }

    impl LinkDumpProvider for RtnlLinkDump {
        #[instrument(skip(self))]
        fn dump_links(&mut self) -> Result<Vec<Vec<u8>>> {
            let mut socket = Socket::new(NETLINK_ROUTE)
                .map_err(|e| MeshError::Netlink(format!("Failed to create socket: {}", e)))?;
            socket
                .bind_auto()
                .map_err(|e| MeshError::Netlink(format!("Failed to bind socket: {}", e)))?;

            let seq = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs() as u32)
                .unwrap_or(1);
            let request = link_dump_request(seq);
            socket.send(&request, 0).map_err(|e| {
                MeshError::Netlink(format!("Failed to send link dump request: {}", e))
            })?;

            let mut datagrams = Vec::new();
            loop {
                let (buf, _) = socket
                    .recv_from_full()
                    .map_err(|e| MeshError::Netlink(format!("Failed to receive: {}", e)))?;
                if buf.is_empty() {
                    return Err(MeshError::Netlink(
                        "Socket closed before end of link dump".to_string(),
                    ));
                }
                let complete = dump_complete(&buf, seq)?;
                datagrams.push(buf);
                if complete {
                    break;
                }
            }

            debug!(seq, datagrams = datagrams.len(), "Link dump complete");
            Ok(datagrams)
        }
    }
}

#[cfg(target_os = "linux")]
pub use linux::*;

/// Mock implementation for non-Linux platforms (development only)
#[cfg(not(target_os = "linux"))]
mod mock {
    use super::LinkDumpProvider;
    use crate::error::Result;

    #[derive(Debug, Default)]
    pub struct RtnlLinkDump;

    impl RtnlLinkDump {
        pub fn new() -> Self {
            Self
        }
    }

    impl LinkDumpProvider for RtnlLinkDump {
        fn dump_links(&mut self) -> Result<Vec<Vec<u8>>> {
            Ok(Vec::new())
        }
    }
}

#[cfg(not(target_os = "linux"))]
pub use mock::*;
