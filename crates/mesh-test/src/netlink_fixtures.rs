//! Netlink link-dump fixtures
//!
//! Builds rtnetlink byte streams the way the kernel lays them out: a
//! `nlmsghdr`, an `ifinfomsg`, then 4-byte aligned `rtattr` records, all in
//! host byte order.

/// `RTM_NEWLINK`
pub const RTM_NEWLINK: u16 = 16;
/// `NLMSG_ERROR`
pub const NLMSG_ERROR: u16 = 2;
/// `NLMSG_DONE`
pub const NLMSG_DONE: u16 = 3;
/// `NLM_F_MULTI`
pub const NLM_F_MULTI: u16 = 0x2;
/// `IFLA_ADDRESS`
pub const IFLA_ADDRESS: u16 = 1;
/// `IFLA_BROADCAST`
pub const IFLA_BROADCAST: u16 = 2;
/// `IFLA_IFNAME`
pub const IFLA_IFNAME: u16 = 3;
/// `IFF_UP`
pub const IFF_UP: u32 = 0x1;

const NLMSG_HDRLEN: usize = 16;
const IFINFOMSG_LEN: usize = 16;

fn align4(len: usize) -> usize {
    (len + 3) & !3
}

/// Encodes one `rtattr` record, padded to 4 bytes.
pub fn rtattr(kind: u16, payload: &[u8]) -> Vec<u8> {
    let len = 4 + payload.len();
    let mut out = Vec::with_capacity(align4(len));
    out.extend_from_slice(&(len as u16).to_ne_bytes());
    out.extend_from_slice(&kind.to_ne_bytes());
    out.extend_from_slice(payload);
    out.resize(align4(len), 0);
    out
}

/// Encodes an `rtattr` header that claims `declared_len` bytes but carries
/// no payload, as a corrupted record would.
pub fn rtattr_header(kind: u16, declared_len: u16) -> Vec<u8> {
    let mut out = Vec::with_capacity(4);
    out.extend_from_slice(&declared_len.to_ne_bytes());
    out.extend_from_slice(&kind.to_ne_bytes());
    out
}

/// Builder for one `RTM_NEWLINK` message
#[derive(Debug, Clone)]
pub struct LinkMessageBuilder {
    index: i32,
    flags: u32,
    attributes: Vec<u8>,
}

impl LinkMessageBuilder {
    pub fn new(index: i32) -> Self {
        Self {
            index,
            flags: IFF_UP,
            attributes: Vec::new(),
        }
    }

    pub fn flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    pub fn name(self, name: &str) -> Self {
        let mut payload = name.as_bytes().to_vec();
        payload.push(0);
        self.attr(IFLA_IFNAME, &payload)
    }

    pub fn mac(self, mac: [u8; 6]) -> Self {
        self.attr(IFLA_ADDRESS, &mac)
    }

    pub fn attr(mut self, kind: u16, payload: &[u8]) -> Self {
        self.attributes.extend(rtattr(kind, payload));
        self
    }

    pub fn build(&self, seq: u32) -> Vec<u8> {
        let mut body = Vec::with_capacity(IFINFOMSG_LEN + self.attributes.len());
        body.push(0); // ifi_family
        body.push(0);
        body.extend_from_slice(&1u16.to_ne_bytes()); // ARPHRD_ETHER
        body.extend_from_slice(&self.index.to_ne_bytes());
        body.extend_from_slice(&self.flags.to_ne_bytes());
        body.extend_from_slice(&0u32.to_ne_bytes());
        body.extend_from_slice(&self.attributes);
        message(RTM_NEWLINK, NLM_F_MULTI, seq, &body)
    }
}

/// Wraps `body` into a netlink message with the given header fields.
pub fn message(kind: u16, flags: u16, seq: u32, body: &[u8]) -> Vec<u8> {
    let len = NLMSG_HDRLEN + body.len();
    let mut out = Vec::with_capacity(align4(len));
    out.extend_from_slice(&(len as u32).to_ne_bytes());
    out.extend_from_slice(&kind.to_ne_bytes());
    out.extend_from_slice(&flags.to_ne_bytes());
    out.extend_from_slice(&seq.to_ne_bytes());
    out.extend_from_slice(&0u32.to_ne_bytes());
    out.extend_from_slice(body);
    out.resize(align4(len), 0);
    out
}

/// `NLMSG_DONE` terminating a dump
pub fn done(seq: u32) -> Vec<u8> {
    message(NLMSG_DONE, NLM_F_MULTI, seq, &0i32.to_ne_bytes())
}

/// `NLMSG_ERROR` carrying `-errno` followed by a copy of an empty request header
pub fn error(seq: u32, errno: i32) -> Vec<u8> {
    let mut body = (-errno).to_ne_bytes().to_vec();
    body.extend_from_slice(&[0u8; NLMSG_HDRLEN]);
    message(NLMSG_ERROR, 0, seq, &body)
}

/// Concatenates messages into one receive buffer
pub fn datagram<I, M>(messages: I) -> Vec<u8>
where
    I: IntoIterator<Item = M>,
    M: AsRef<[u8]>,
{
    messages
        .into_iter()
        .fold(Vec::new(), |mut buf, msg| {
            buf.extend_from_slice(msg.as_ref());
            buf
        })
}
