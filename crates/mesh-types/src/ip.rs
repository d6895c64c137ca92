//! IPv6 helpers for link-scoped mesh addressing.

use crate::MacAddress;
use std::net::{Ipv6Addr, SocketAddrV6};

/// Link-scoped all-nodes multicast group (`ff02::1`).
pub const ALL_NODES: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 1);

/// Socket address for `addr:port` scoped to the interface with index `ifindex`.
pub fn scoped(addr: Ipv6Addr, port: u16, ifindex: u32) -> SocketAddrV6 {
    SocketAddrV6::new(addr, port, 0, ifindex)
}

/// Recovers the hardware address from an EUI-64 derived link-local address.
///
/// Returns `None` for addresses outside `fe80::/64` or without the `ff:fe`
/// filler in the interface identifier (privacy or manually assigned ids).
pub fn mac_from_link_local(addr: &Ipv6Addr) -> Option<MacAddress> {
    let o = addr.octets();
    if o[..8] != [0xfe, 0x80, 0, 0, 0, 0, 0, 0] || o[11] != 0xff || o[12] != 0xfe {
        return None;
    }
    Some(MacAddress::new([o[8] ^ 0x02, o[9], o[10], o[13], o[14], o[15]]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_all_nodes() {
        assert_eq!(ALL_NODES.to_string(), "ff02::1");
        assert!(ALL_NODES.is_multicast());
    }

    #[test]
    fn test_eui64_flips_universal_local_bit() {
        let addr = "fe80::ca:feff:fe00:1".parse().unwrap();
        assert_eq!(
            mac_from_link_local(&addr),
            Some(MacAddress::new([0x02, 0xca, 0xfe, 0x00, 0x00, 0x01]))
        );
    }

    #[test]
    fn test_non_eui64_addresses_have_no_mac() {
        assert_eq!(mac_from_link_local(&"fe80::1".parse().unwrap()), None);
        assert_eq!(
            mac_from_link_local(&"2001:db8::211:22ff:fe33:4455".parse().unwrap()),
            None
        );
    }

    #[test]
    fn test_scoped_sets_scope_id() {
        let addr = scoped(ALL_NODES, 1001, 7);
        assert_eq!(addr.scope_id(), 7);
        assert_eq!(addr.port(), 1001);
        assert_eq!(*addr.ip(), ALL_NODES);
    }
}
