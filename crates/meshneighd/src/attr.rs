//! Attribute resolver for netlink-style TLV records
//!
//! Each record is a 4-byte header (`u16` length including the header, `u16`
//! type) followed by the payload, padded to a 4-byte boundary. The resolver
//! walks a buffer strictly forward and never allocates:
//!
//! - a record whose declared length is shorter than its header or runs past
//!   the end of the buffer is skipped with a diagnostic, and the scan resumes
//!   right after that record's header
//! - a record whose type is above the caller's maximum is skipped
//! - payload lengths are checked by the typed accessors on [`Attribute`], so a
//!   mis-sized attribute is discarded on its own without ending the scan
//!
//! # NIST 800-53 Rev 5 Control Mappings
//! - SI-10: Information Input Validation - Length and type checks per record

use mesh_types::MacAddress;
use std::net::Ipv6Addr;
use tracing::{debug, trace, warn};

/// Record header size (`struct rtattr` / `struct nlattr`)
pub const ATTR_HDRLEN: usize = 4;

/// Alignment of record boundaries
pub const ATTR_ALIGNTO: usize = 4;

/// Type bits; the top two bits are the nested and byte-order flags
const ATTR_TYPE_MASK: u16 = 0x3fff;

/// Rounds `len` up to the record alignment
#[inline]
pub const fn align(len: usize) -> usize {
    (len + ATTR_ALIGNTO - 1) & !(ATTR_ALIGNTO - 1)
}

/// One well-formed record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attribute<'a> {
    kind: u16,
    payload: &'a [u8],
}

impl<'a> Attribute<'a> {
    /// Record type with the flag bits masked off
    pub fn kind(&self) -> u16 {
        self.kind
    }

    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }

    /// Interprets the payload as a hardware address (exactly 6 bytes)
    pub fn hardware_address(&self) -> Option<MacAddress> {
        match MacAddress::from_slice(self.payload) {
            Ok(mac) => Some(mac),
            Err(_) => {
                debug!(
                    kind = self.kind,
                    len = self.payload.len(),
                    "Discarding hardware address attribute with bad length"
                );
                None
            }
        }
    }

    /// Interprets the payload as an IPv6 address (exactly 16 bytes)
    pub fn ipv6_address(&self) -> Option<Ipv6Addr> {
        let Ok(octets) = <[u8; 16]>::try_from(self.payload) else {
            debug!(
                kind = self.kind,
                len = self.payload.len(),
                "Discarding address attribute with bad length"
            );
            return None;
        };
        Some(Ipv6Addr::from(octets))
    }

    /// Interprets the payload as a host-order `u32` (exactly 4 bytes),
    /// e.g. an interface index
    pub fn u32(&self) -> Option<u32> {
        <[u8; 4]>::try_from(self.payload)
            .ok()
            .map(u32::from_ne_bytes)
    }

    /// Interprets the payload as a NUL-terminated string
    pub fn string(&self) -> Option<&'a str> {
        let bytes = match self.payload.iter().position(|&b| b == 0) {
            Some(end) => &self.payload[..end],
            None => self.payload,
        };
        std::str::from_utf8(bytes).ok()
    }
}

/// Forward-only iterator over the records of a buffer
#[derive(Debug, Clone)]
pub struct Attributes<'a> {
    buf: &'a [u8],
    offset: usize,
    max_type: u16,
    skipped: usize,
}

/// Iterates the records in `buf`, accepting types `0..=max_type`.
pub fn attributes(buf: &[u8], max_type: u16) -> Attributes<'_> {
    Attributes {
        buf,
        offset: 0,
        max_type,
        skipped: 0,
    }
}

impl Attributes<'_> {
    /// Records skipped so far as malformed or out of range
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl<'a> Iterator for Attributes<'a> {
    type Item = Attribute<'a>;

    fn next(&mut self) -> Option<Attribute<'a>> {
        loop {
            let rest = self.buf.get(self.offset..)?;
            if rest.len() < ATTR_HDRLEN {
                if !rest.is_empty() {
                    trace!(trailing = rest.len(), "Ignoring trailing bytes after last attribute");
                    self.offset = self.buf.len();
                }
                return None;
            }

            let len = u16::from_ne_bytes([rest[0], rest[1]]) as usize;
            let kind = u16::from_ne_bytes([rest[2], rest[3]]) & ATTR_TYPE_MASK;

            if len < ATTR_HDRLEN || len > rest.len() {
                warn!(
                    offset = self.offset,
                    declared = len,
                    remaining = rest.len(),
                    kind,
                    "Skipping malformed attribute"
                );
                self.skipped += 1;
                self.offset += ATTR_HDRLEN;
                continue;
            }

            let payload = &rest[ATTR_HDRLEN..len];
            self.offset += align(len).min(rest.len());

            if kind > self.max_type {
                trace!(kind, max = self.max_type, "Skipping attribute with unknown type");
                self.skipped += 1;
                continue;
            }

            return Some(Attribute { kind, payload });
        }
    }
}
