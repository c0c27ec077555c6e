//! The interface table: one entry per device, each carrying the addresses
//! bound to it, plus a reverse index for the "is this address ours"
//! question every receive path asks.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use alloc::vec::Vec;

use netstack_support::IrqMutex;
use netstack_abi::IfFlags;

use super::address::InterfaceAddress;
use crate::error::{NetError, NetResult};
use crate::types::{DevIndex, Ipv4Addr};

/// Hook a datalink module registers to approve or refuse an address change
/// before it's committed — `false` refuses the change, leaving the
/// interface's existing address (or lack of one) in place.
pub type ChangeAddressHook = Box<dyn Fn(Ipv4Addr) -> bool + Send + Sync>;

/// Hook a protocol domain registers to bring itself up when an interface's
/// `IFF_UP` flag is set — `false` fails the whole `set_up` call, which then
/// rolls the flag back down rather than leaving some domains up and others
/// not.
pub type UpHook = Box<dyn Fn(DevIndex) -> bool + Send + Sync>;

pub struct Interface {
    pub dev: DevIndex,
    pub name: alloc::string::String,
    pub flags: IrqMutex<IfFlags>,
    pub mtu: IrqMutex<u16>,
    addresses: IrqMutex<Vec<Arc<InterfaceAddress>>>,
    change_address_hook: IrqMutex<Option<ChangeAddressHook>>,
}

impl Interface {
    pub fn new(dev: DevIndex, name: alloc::string::String, mtu: u16) -> Self {
        Self {
            dev,
            name,
            flags: IrqMutex::new(IfFlags::empty()),
            mtu: IrqMutex::new(mtu),
            addresses: IrqMutex::new(Vec::new()),
            change_address_hook: IrqMutex::new(None),
        }
    }

    pub fn addresses(&self) -> Vec<Arc<InterfaceAddress>> {
        self.addresses.lock().clone()
    }

    fn add_address_entry(&self, addr: Arc<InterfaceAddress>) {
        self.addresses.lock().push(addr);
    }

    fn remove_address_entry(&self, addr: Ipv4Addr) -> Option<Arc<InterfaceAddress>> {
        let mut addrs = self.addresses.lock();
        let pos = addrs.iter().position(|a| a.addr == addr)?;
        Some(addrs.remove(pos))
    }

    /// Register the datalink hook consulted before committing an address
    /// change on this interface.
    pub fn set_change_address_hook(&self, hook: ChangeAddressHook) {
        *self.change_address_hook.lock() = Some(hook);
    }

    /// `true` if no hook is registered, or the registered hook approves
    /// `addr`.
    fn try_change_address(&self, addr: Ipv4Addr) -> bool {
        match self.change_address_hook.lock().as_ref() {
            Some(hook) => hook(addr),
            None => true,
        }
    }
}

/// Table of every interface, plus a direct `Ipv4Addr -> InterfaceAddress`
/// index so "is this address one of ours" does not have to scan every
/// interface's address list.
pub struct InterfaceTable {
    interfaces: IrqMutex<Vec<Arc<Interface>>>,
    address_index: IrqMutex<BTreeMap<u32, Arc<InterfaceAddress>>>,
    up_hooks: IrqMutex<Vec<UpHook>>,
}

impl InterfaceTable {
    pub const fn new() -> Self {
        Self {
            interfaces: IrqMutex::new(Vec::new()),
            address_index: IrqMutex::new(BTreeMap::new()),
            up_hooks: IrqMutex::new(Vec::new()),
        }
    }

    /// Register a domain's bring-up hook, consulted by every future
    /// [`Self::set_up`] call.
    pub fn register_up_hook(&self, hook: UpHook) {
        self.up_hooks.lock().push(hook);
    }

    pub fn register(&self, iface: Interface) -> Arc<Interface> {
        let iface = Arc::new(iface);
        self.interfaces.lock().push(iface.clone());
        iface
    }

    pub fn unregister(&self, dev: DevIndex) -> Option<Arc<Interface>> {
        let mut interfaces = self.interfaces.lock();
        let pos = interfaces.iter().position(|i| i.dev == dev)?;
        let iface = interfaces.remove(pos);
        let mut index = self.address_index.lock();
        for addr in iface.addresses() {
            index.remove(&addr.addr.to_u32_be());
        }
        Some(iface)
    }

    pub fn get(&self, dev: DevIndex) -> Option<Arc<Interface>> {
        self.interfaces.lock().iter().find(|i| i.dev == dev).cloned()
    }

    pub fn get_by_name(&self, name: &str) -> Option<Arc<Interface>> {
        self.interfaces.lock().iter().find(|i| i.name == name).cloned()
    }

    pub fn add_address(&self, dev: DevIndex, addr: Ipv4Addr, netmask: Ipv4Addr) -> NetResult<()> {
        let iface = self.get(dev).ok_or(NetError::DeviceNotFound)?;
        if self.address_index.lock().contains_key(&addr.to_u32_be()) {
            return Err(NetError::FileExists);
        }
        if !iface.try_change_address(addr) {
            return Err(NetError::NotAllowed);
        }
        let entry = Arc::new(InterfaceAddress::new(addr, netmask, dev));
        self.address_index.lock().insert(addr.to_u32_be(), entry.clone());
        iface.add_address_entry(entry);
        Ok(())
    }

    pub fn remove_address(&self, dev: DevIndex, addr: Ipv4Addr) -> NetResult<()> {
        let iface = self.get(dev).ok_or(NetError::DeviceNotFound)?;
        iface.remove_address_entry(addr).ok_or(NetError::BadValue)?;
        self.address_index.lock().remove(&addr.to_u32_be());
        Ok(())
    }

    /// `O(log n)` lookup answering "is `addr` bound to one of our
    /// interfaces", the question every inbound IPv4 packet's destination
    /// check asks.
    pub fn lookup_local(&self, addr: Ipv4Addr) -> Option<Arc<InterfaceAddress>> {
        self.address_index.lock().get(&addr.to_u32_be()).cloned()
    }

    pub fn interface_count(&self) -> usize {
        self.interfaces.lock().len()
    }

    /// Bring `dev` up: set `IFF_UP` and run every registered domain's
    /// bring-up hook. If any hook refuses, the flag is rolled back down
    /// rather than left up with some domains started and others not.
    pub fn set_up(&self, dev: DevIndex) -> NetResult<()> {
        let iface = self.get(dev).ok_or(NetError::DeviceNotFound)?;
        iface.flags.lock().insert(IfFlags::UP);
        let all_ok = self.up_hooks.lock().iter().all(|hook| hook(dev));
        if !all_ok {
            iface.flags.lock().remove(IfFlags::UP);
            return Err(NetError::NotAllowed);
        }
        Ok(())
    }

    pub fn set_down(&self, dev: DevIndex) -> NetResult<()> {
        let iface = self.get(dev).ok_or(NetError::DeviceNotFound)?;
        iface.flags.lock().remove(IfFlags::UP);
        Ok(())
    }

    /// Find the local address matching `addr`, either because it's bound
    /// directly to an interface or because it's that interface's broadcast
    /// address — the two cases a received packet's destination check needs
    /// to treat as "addressed to us".
    pub fn find_local_address(&self, addr: Ipv4Addr) -> Option<Arc<InterfaceAddress>> {
        if let Some(local) = self.lookup_local(addr) {
            return Some(local);
        }
        self.interfaces.lock().iter().find_map(|iface| iface.addresses().into_iter().find(|a| a.broadcast() == addr))
    }
}

impl Default for InterfaceTable {
    fn default() -> Self {
        Self::new()
    }
}

pub static INTERFACE_TABLE: InterfaceTable = InterfaceTable::new();

#[cfg(test)]
mod tests {
    use super::*;
    use netstack_support::testing::TestResult;
    use netstack_support::{assert_eq_test, assert_test, pass};

    pub fn test_add_address_then_lookup_local() -> TestResult {
        let table = InterfaceTable::new();
        table.register(Interface::new(DevIndex(0), alloc::string::String::from("eth0"), 1500));
        let addr = Ipv4Addr::from_octets([192, 168, 1, 10]);
        let mask = Ipv4Addr::from_octets([255, 255, 255, 0]);
        table.add_address(DevIndex(0), addr, mask).unwrap();
        assert_test!(table.lookup_local(addr).is_some());
        assert_test!(table.lookup_local(Ipv4Addr::from_octets([10, 0, 0, 1])).is_none());
        pass!()
    }

    pub fn test_duplicate_address_rejected() -> TestResult {
        let table = InterfaceTable::new();
        table.register(Interface::new(DevIndex(0), alloc::string::String::from("eth0"), 1500));
        let addr = Ipv4Addr::from_octets([10, 0, 0, 1]);
        let mask = Ipv4Addr::from_octets([255, 0, 0, 0]);
        table.add_address(DevIndex(0), addr, mask).unwrap();
        assert_eq_test!(table.add_address(DevIndex(0), addr, mask).unwrap_err(), NetError::FileExists);
        pass!()
    }

    pub fn test_unregister_clears_address_index() -> TestResult {
        let table = InterfaceTable::new();
        table.register(Interface::new(DevIndex(0), alloc::string::String::from("eth0"), 1500));
        let addr = Ipv4Addr::from_octets([10, 0, 0, 1]);
        table.add_address(DevIndex(0), addr, Ipv4Addr::from_octets([255, 0, 0, 0])).unwrap();
        table.unregister(DevIndex(0));
        assert_test!(table.lookup_local(addr).is_none());
        pass!()
    }

    pub fn test_change_address_hook_refusal_leaves_address_unset() -> TestResult {
        let table = InterfaceTable::new();
        let iface = table.register(Interface::new(DevIndex(0), alloc::string::String::from("eth0"), 1500));
        iface.set_change_address_hook(alloc::boxed::Box::new(|_| false));
        let addr = Ipv4Addr::from_octets([10, 0, 0, 1]);
        assert_eq_test!(
            table.add_address(DevIndex(0), addr, Ipv4Addr::from_octets([255, 0, 0, 0])).unwrap_err(),
            NetError::NotAllowed
        );
        assert_test!(table.lookup_local(addr).is_none());
        pass!()
    }

    pub fn test_set_up_rolls_back_on_hook_refusal() -> TestResult {
        let table = InterfaceTable::new();
        table.register(Interface::new(DevIndex(0), alloc::string::String::from("eth0"), 1500));
        table.register_up_hook(alloc::boxed::Box::new(|_| false));
        assert_eq_test!(table.set_up(DevIndex(0)).unwrap_err(), NetError::NotAllowed);
        let iface = table.get(DevIndex(0)).unwrap();
        assert_test!(!iface.flags.lock().contains(IfFlags::UP));
        pass!()
    }

    pub fn test_find_local_address_matches_broadcast() -> TestResult {
        let table = InterfaceTable::new();
        table.register(Interface::new(DevIndex(0), alloc::string::String::from("eth0"), 1500));
        let addr = Ipv4Addr::from_octets([192, 168, 1, 10]);
        let mask = Ipv4Addr::from_octets([255, 255, 255, 0]);
        table.add_address(DevIndex(0), addr, mask).unwrap();
        let broadcast = Ipv4Addr::from_octets([192, 168, 1, 255]);
        assert_test!(table.find_local_address(broadcast).is_some());
        pass!()
    }

    netstack_support::define_test_suite!(
        iface,
        [
            test_add_address_then_lookup_local,
            test_duplicate_address_rejected,
            test_unregister_clears_address_index,
            test_change_address_hook_refusal_leaves_address_unset,
            test_set_up_rolls_back_on_hook_refusal,
            test_find_local_address_matches_broadcast,
        ]
    );
}
