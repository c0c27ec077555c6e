//! IPv4 routing: longest-prefix-match next-hop resolution over a prefix
//! trie, plus device-scoped link lookups for AF_LINK requests.

mod domain;
mod radix;

pub use domain::{ROUTE_TABLE, RouteScope, RouteTable};
pub use radix::{RouteEntry, prefix_len_to_mask};

use alloc::sync::Arc;

use crate::buf::NetBuffer;
use crate::error::{NetError, NetResult};
use crate::iface::{INTERFACE_TABLE, Interface};
use crate::types::{DevIndex, Endpoint, Ipv4Addr};

/// Resolve the next hop for `dst`: the route table's best entry, with the
/// gateway substituted for the destination itself when the route is a
/// directly-connected one (no gateway set).
pub fn resolve(dst: Ipv4Addr) -> NetResult<(Ipv4Addr, DevIndex)> {
    let route = ROUTE_TABLE.lookup(dst).ok_or(NetError::NetworkUnreachable)?;
    Ok((route.next_hop(dst), route.dev))
}

/// AF_LINK requests (`SIOCGIFHWADDR` and friends) name a device directly
/// rather than an IP prefix. A radix trie keyed on IPv4 bits has no
/// meaningful entry for those — routing them through it would mean either
/// degrading the trie's key space to carry device identity instead of an
/// address, or special-casing every trie walk for a key type the trie
/// isn't shaped for. Since the interface table already is the per-device
/// index, link lookups go there directly instead.
pub fn lookup_link(dev: DevIndex) -> Option<Arc<Interface>> {
    INTERFACE_TABLE.get(dev)
}

/// Stamp `buf` with `dest` as its destination and resolve the outgoing
/// device, rewriting the destination to the route's gateway when one is
/// set — the point where a socket's chosen peer address turns into the
/// next-hop address a device actually transmits to.
pub fn send_routed_data(buf: &mut NetBuffer, dest: Endpoint) -> NetResult<DevIndex> {
    let route = ROUTE_TABLE.lookup(dest.addr).ok_or(NetError::NetworkUnreachable)?;
    buf.set_destination(dest);
    if !route.gateway.is_unspecified() {
        buf.set_destination(Endpoint::new(route.gateway, dest.port));
    }
    Ok(route.dev)
}

#[cfg(test)]
mod tests {
    use super::*;
    use netstack_support::testing::TestResult;
    use netstack_support::{assert_eq_test, pass};

    pub fn test_resolve_uses_gateway_when_set() -> TestResult {
        let table = RouteTable::new();
        table
            .add(RouteEntry {
                prefix: Ipv4Addr::UNSPECIFIED,
                prefix_len: 0,
                gateway: Ipv4Addr::from_octets([10, 0, 0, 1]),
                dev: DevIndex(0),
                metric: 0,
            })
            .unwrap();
        let route = table.lookup(Ipv4Addr::from_octets([8, 8, 8, 8])).unwrap();
        assert_eq_test!(route.next_hop(Ipv4Addr::from_octets([8, 8, 8, 8])), Ipv4Addr::from_octets([10, 0, 0, 1]));
        pass!()
    }

    pub fn test_resolve_uses_destination_for_connected_route() -> TestResult {
        let table = RouteTable::new();
        table
            .add(RouteEntry {
                prefix: Ipv4Addr::from_octets([192, 168, 1, 0]),
                prefix_len: 24,
                gateway: Ipv4Addr::UNSPECIFIED,
                dev: DevIndex(0),
                metric: 0,
            })
            .unwrap();
        let dst = Ipv4Addr::from_octets([192, 168, 1, 55]);
        let route = table.lookup(dst).unwrap();
        assert_eq_test!(route.next_hop(dst), dst);
        pass!()
    }

    pub fn test_send_routed_data_rewrites_destination_to_gateway() -> TestResult {
        use crate::types::Port;
        let gateway = Ipv4Addr::from_octets([10, 0, 0, 1]);
        ROUTE_TABLE
            .add(RouteEntry { prefix: Ipv4Addr::UNSPECIFIED, prefix_len: 0, gateway, dev: DevIndex(0), metric: 0 })
            .unwrap();
        let mut buf = crate::buf::NetBuffer::alloc().unwrap();
        let dest = Endpoint::new(Ipv4Addr::from_octets([8, 8, 8, 8]), Port::new(53));
        send_routed_data(&mut buf, dest).unwrap();
        assert_eq_test!(buf.destination().unwrap().addr, gateway);
        ROUTE_TABLE.remove(Ipv4Addr::UNSPECIFIED, 0, gateway).unwrap();
        pass!()
    }

    netstack_support::define_test_suite!(
        route,
        [
            test_resolve_uses_gateway_when_set,
            test_resolve_uses_destination_for_connected_route,
            test_send_routed_data_rewrites_destination_to_gateway,
        ]
    );
}
