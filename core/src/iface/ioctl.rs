//! Datalink-control entry point: translates the wire-level ioctl requests
//! in [`netstack_abi`] into [`InterfaceTable`] operations.

use netstack_abi::{IfFlags, SockAddrIn, ioctl};

use super::interface::INTERFACE_TABLE;
use crate::error::{NetError, NetResult};
use crate::types::{DevIndex, Ipv4Addr};

/// Classful default mask for an address with no explicit netmask given —
/// the fallback `SIOCSIFADDR` uses when the caller didn't also set one
/// through `SIOCSIFNETMASK` first, same as BSD's historical `in_control`.
fn classful_mask(addr: Ipv4Addr) -> Ipv4Addr {
    let first_octet = addr.to_octets()[0];
    let prefix_len = if first_octet < 128 {
        8
    } else if first_octet < 192 {
        16
    } else {
        24
    };
    crate::route::prefix_len_to_mask(prefix_len)
}

/// Re-add the connected subnet route for `addr`/`mask` on `dev` — the
/// routing-table side effect every successful address change carries, so a
/// newly configured interface is immediately reachable on its own subnet.
fn add_connected_route(dev: DevIndex, addr: Ipv4Addr, mask: Ipv4Addr) {
    let prefix_len = mask.to_u32_be().leading_ones() as u8;
    let prefix = Ipv4Addr::from_u32_be(addr.to_u32_be() & mask.to_u32_be());
    let _ = crate::route::ROUTE_TABLE.add(crate::route::RouteEntry {
        prefix,
        prefix_len,
        gateway: Ipv4Addr::UNSPECIFIED,
        dev,
        metric: 0,
    });
}

/// Handle `SIOCGIFADDR`/`SIOCSIFADDR`/`SIOCGIFMTU` style control requests.
/// `request` is one of the `netstack_abi::ioctl::SIOC*` codes.
pub fn handle_ifreq(dev: DevIndex, request: u32, addr: Option<SockAddrIn>) -> NetResult<Option<SockAddrIn>> {
    match request {
        ioctl::SIOCGIFADDR => {
            let iface = INTERFACE_TABLE.get(dev).ok_or(NetError::DeviceNotFound)?;
            let addrs = iface.addresses();
            let first = addrs.first().ok_or(NetError::BadValue)?;
            Ok(Some(SockAddrIn::new(0, first.addr.to_octets())))
        }
        ioctl::SIOCSIFADDR => {
            let addr = addr.ok_or(NetError::BadAddress)?;
            let ip = Ipv4Addr::from_octets(addr.sin_addr);
            let mask = classful_mask(ip);
            INTERFACE_TABLE.add_address(dev, ip, mask)?;
            add_connected_route(dev, ip, mask);
            Ok(None)
        }
        ioctl::SIOCDIFADDR => {
            let addr = addr.ok_or(NetError::BadAddress)?;
            let ip = Ipv4Addr::from_octets(addr.sin_addr);
            INTERFACE_TABLE.remove_address(dev, ip)?;
            crate::route::ROUTE_TABLE.invalidate_routes(crate::route::RouteScope::Address(ip));
            Ok(None)
        }
        ioctl::SIOCGIFMTU => {
            let iface = INTERFACE_TABLE.get(dev).ok_or(NetError::DeviceNotFound)?;
            let mtu = *iface.mtu.lock() as u32;
            Ok(Some(SockAddrIn::new(mtu as u16, [0; 4])))
        }
        ioctl::SIOCSIFMTU => {
            let iface = INTERFACE_TABLE.get(dev).ok_or(NetError::DeviceNotFound)?;
            let new_mtu = addr.ok_or(NetError::BadAddress)?.port();
            *iface.mtu.lock() = new_mtu;
            Ok(None)
        }
        ioctl::SIOCGIFNETMASK => {
            let iface = INTERFACE_TABLE.get(dev).ok_or(NetError::DeviceNotFound)?;
            let addrs = iface.addresses();
            let first = addrs.first().ok_or(NetError::BadValue)?;
            Ok(Some(SockAddrIn::new(0, first.netmask.to_octets())))
        }
        ioctl::SIOCSIFNETMASK => {
            let mask_addr = addr.ok_or(NetError::BadAddress)?;
            let mask = Ipv4Addr::from_octets(mask_addr.sin_addr);
            let iface = INTERFACE_TABLE.get(dev).ok_or(NetError::DeviceNotFound)?;
            let current = iface.addresses().first().ok_or(NetError::BadValue)?.addr;
            INTERFACE_TABLE.remove_address(dev, current)?;
            INTERFACE_TABLE.add_address(dev, current, mask)?;
            add_connected_route(dev, current, mask);
            Ok(None)
        }
        ioctl::SIOCGIFFLAGS => {
            let iface = INTERFACE_TABLE.get(dev).ok_or(NetError::DeviceNotFound)?;
            let flags = iface.flags.lock().bits();
            Ok(Some(SockAddrIn::new(flags as u16, [0; 4])))
        }
        ioctl::SIOCSIFFLAGS => {
            let requested = IfFlags::from_bits_truncate(addr.ok_or(NetError::BadAddress)?.port() as u32);
            if requested.contains(IfFlags::UP) {
                INTERFACE_TABLE.set_up(dev)?;
            } else {
                INTERFACE_TABLE.set_down(dev)?;
            }
            Ok(None)
        }
        _ => Err(NetError::Unsupported),
    }
}

/// Handle `SIOCAIFADDR`: add a new alias, or replace the mask of an
/// existing one in place, rather than requiring a separate delete first.
pub fn handle_siocaifaddr(dev: DevIndex, addr: Ipv4Addr, mask: Ipv4Addr) -> NetResult<()> {
    let iface = INTERFACE_TABLE.get(dev).ok_or(NetError::DeviceNotFound)?;
    if iface.addresses().iter().any(|a| a.addr == addr) {
        INTERFACE_TABLE.remove_address(dev, addr)?;
    }
    INTERFACE_TABLE.add_address(dev, addr, mask)?;
    add_connected_route(dev, addr, mask);
    Ok(())
}
