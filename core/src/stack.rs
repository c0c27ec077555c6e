//! Top-level bring-up: register the loopback device, give it an address
//! and a connected route, and leave every other static ready for physical
//! devices to register themselves.
//!
//! Must run after [`netstack_support::register_runtime`] — bringing the
//! loopback device up spawns its reader/consumer tasks, which needs a
//! runtime to spawn into.

use alloc::boxed::Box;

use netstack_support::klog_info;

use crate::device::DEVICE_REGISTRY;
use crate::device::drivers::loopback::LoopbackDevice;
use crate::error::NetResult;
use crate::iface::{INTERFACE_TABLE, Interface};
use crate::route::{ROUTE_TABLE, RouteEntry, prefix_len_to_mask};
use crate::types::{DevIndex, Ipv4Addr};

const LOOPBACK_PREFIX_LEN: u8 = 8;

/// Bring the stack up to the point where interfaces can be registered and
/// packets can already be routed to `127.0.0.1`. Idempotent only in the
/// sense that calling it twice registers loopback twice and fails the
/// second time — callers run it exactly once during boot.
pub fn init_stack() -> NetResult<()> {
    let device = Box::new(LoopbackDevice::new());
    let iface_handle = DEVICE_REGISTRY.register(move |index| {
        crate::device::DeviceInterface::new(index, device, crate::device::drivers::loopback::deframe_loopback)
    })?;
    let lo_index = iface_handle.index;
    klog_info!("stack: loopback registered as {:?}", lo_index);

    let iface = INTERFACE_TABLE.register(Interface::new(lo_index, alloc::string::String::from("lo"), 65535));
    let netmask = prefix_len_to_mask(LOOPBACK_PREFIX_LEN);
    INTERFACE_TABLE.add_address(lo_index, Ipv4Addr::LOOPBACK, netmask)?;
    *iface.flags.lock() = netstack_abi::IfFlags::UP | netstack_abi::IfFlags::LOOPBACK | netstack_abi::IfFlags::RUNNING;

    ROUTE_TABLE.add(RouteEntry {
        prefix: Ipv4Addr::from_u32_be(Ipv4Addr::LOOPBACK.to_u32_be() & netmask.to_u32_be()),
        prefix_len: LOOPBACK_PREFIX_LEN,
        gateway: Ipv4Addr::UNSPECIFIED,
        dev: lo_index,
        metric: 0,
    })?;

    iface_handle.up();
    klog_info!("stack: loopback up, 127.0.0.0/8 routed via {:?}", lo_index);
    Ok(())
}

/// Tear down a device: bring its interface down, drop its routes and
/// addresses, and remove it from the registry. Used when a device is
/// physically unplugged or administratively removed.
pub fn teardown_device(dev: DevIndex) {
    if let Some(iface_handle) = DEVICE_REGISTRY.get(dev) {
        iface_handle.down();
    }
    ROUTE_TABLE.remove_device_routes(dev);
    INTERFACE_TABLE.unregister(dev);
    DEVICE_REGISTRY.unregister(dev);
}
