//! Lock-protected [`RadixTrie`] plus the route-change notification every
//! cached next-hop (ARP entries, connected sockets) needs to invalidate on.

use alloc::vec::Vec;

use netstack_abi::{RouteEntryWire, RouteFlags, SockAddrIn};
use netstack_support::IrqMutex;

use super::radix::{RadixTrie, RouteEntry};
use crate::error::{NetError, NetResult};
use crate::types::{DevIndex, Ipv4Addr};

/// What to tear down a cached route over: every route through a device, or
/// every route naming a particular address as prefix or gateway.
pub enum RouteScope {
    Interface(DevIndex),
    Address(Ipv4Addr),
}

pub struct RouteTable {
    trie: IrqMutex<RadixTrie>,
    generation: core::sync::atomic::AtomicU64,
}

impl RouteTable {
    pub const fn new() -> Self {
        Self { trie: IrqMutex::new(RadixTrie::new()), generation: core::sync::atomic::AtomicU64::new(0) }
    }

    pub fn add(&self, entry: RouteEntry) -> NetResult<()> {
        if entry.prefix_len > 32 {
            return Err(NetError::BadValue);
        }
        self.trie.lock().insert(entry);
        self.bump_generation();
        Ok(())
    }

    pub fn remove(&self, prefix: Ipv4Addr, prefix_len: u8, gateway: Ipv4Addr) -> NetResult<()> {
        if self.trie.lock().remove(prefix, prefix_len, gateway) {
            self.bump_generation();
            Ok(())
        } else {
            Err(NetError::BadValue)
        }
    }

    pub fn remove_device_routes(&self, dev: DevIndex) -> usize {
        let removed = self.trie.lock().remove_device_routes(dev);
        if removed > 0 {
            self.bump_generation();
        }
        removed
    }

    pub fn lookup(&self, dst: Ipv4Addr) -> Option<RouteEntry> {
        self.trie.lock().lookup(dst)
    }

    /// Tear down every cached route matching `scope`, bumping the
    /// generation counter once if any were removed. Called when a device
    /// goes down or an address is unbound, so nothing keeps routing traffic
    /// through a next hop that no longer exists.
    pub fn invalidate_routes(&self, scope: RouteScope) -> usize {
        let removed = match scope {
            RouteScope::Interface(dev) => self.trie.lock().remove_where(|r| r.dev == dev),
            RouteScope::Address(addr) => self.trie.lock().remove_where(|r| r.prefix == addr || r.gateway == addr),
        };
        if removed > 0 {
            self.bump_generation();
        }
        removed
    }

    pub fn route_count(&self) -> usize {
        self.trie.lock().len()
    }

    /// Alias for [`Self::route_count`] under the name the ifreq enumeration
    /// path (`SIOCGIFCONF`'s routing-table cousin) reaches for when sizing
    /// its output buffer before a call to [`Self::list_routes`].
    pub fn route_table_size(&self) -> usize {
        self.route_count()
    }

    pub fn all_routes(&self) -> Vec<RouteEntry> {
        self.trie.lock().all_routes()
    }

    pub fn dump(&self) -> Vec<RouteEntry> {
        self.all_routes()
    }

    /// Fill `out` with every route in wire form. All-or-nothing: if the
    /// table holds more routes than `out` has room for, nothing is written
    /// and the caller gets back the buffer-too-small error rather than a
    /// silently truncated list.
    pub fn list_routes(&self, out: &mut [RouteEntryWire]) -> NetResult<usize> {
        let routes = self.all_routes();
        if routes.len() > out.len() {
            return Err(NetError::NoBufferSpace);
        }
        for (slot, route) in out.iter_mut().zip(routes.iter()) {
            *slot = route_to_wire(*route);
        }
        Ok(routes.len())
    }

    /// Resolve the route used to reach `dst`, in wire form, along with the
    /// source address a packet sent to `dst` would carry — the first local
    /// address bound to the route's outgoing interface, or the unspecified
    /// address if the interface has none.
    pub fn get_route_information(&self, dst: Ipv4Addr) -> NetResult<(RouteEntryWire, Ipv4Addr)> {
        let route = self.lookup(dst).ok_or(NetError::NetworkUnreachable)?;
        let source = crate::iface::INTERFACE_TABLE
            .get(route.dev)
            .and_then(|iface| iface.addresses().first().map(|a| a.addr))
            .unwrap_or(Ipv4Addr::UNSPECIFIED);
        Ok((route_to_wire(route), source))
    }

    /// Monotonically increasing counter bumped on every table mutation.
    /// Callers that cache a resolved next hop (connected UDP sockets, ARP
    /// entries) compare against this to know their cache is stale without
    /// needing a callback registry.
    pub fn generation(&self) -> u64 {
        self.generation.load(core::sync::atomic::Ordering::Acquire)
    }

    fn bump_generation(&self) {
        self.generation.fetch_add(1, core::sync::atomic::Ordering::AcqRel);
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new()
    }
}

pub static ROUTE_TABLE: RouteTable = RouteTable::new();

fn route_to_wire(route: RouteEntry) -> RouteEntryWire {
    let mut flags = RouteFlags::UP;
    if !route.gateway.is_unspecified() {
        flags |= RouteFlags::GATEWAY;
    }
    if route.prefix_len == 32 {
        flags |= RouteFlags::HOST;
    }
    RouteEntryWire {
        flags: flags.bits(),
        destination: SockAddrIn::new(0, route.prefix.to_octets()),
        mask: SockAddrIn::new(0, super::radix::prefix_len_to_mask(route.prefix_len).to_octets()),
        gateway: SockAddrIn::new(0, route.gateway.to_octets()),
        mtu: 0,
        metric: route.metric,
        if_index: route.dev.0,
    }
}
