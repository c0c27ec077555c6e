//! Fixed-capacity table of registered device interfaces.

use alloc::sync::Arc;

use netstack_support::IrqMutex;

use super::interface::DeviceInterface;
use crate::error::NetError;
use crate::types::{DevIndex, MacAddr};

pub const MAX_DEVICES: usize = 8;

struct RegistryInner {
    slots: [Option<Arc<DeviceInterface>>; MAX_DEVICES],
    count: usize,
}

pub struct DeviceRegistry {
    inner: IrqMutex<RegistryInner>,
}

impl DeviceRegistry {
    pub const fn new() -> Self {
        Self {
            inner: IrqMutex::new(RegistryInner { slots: [const { None }; MAX_DEVICES], count: 0 }),
        }
    }

    pub fn register(&self, make: impl FnOnce(DevIndex) -> DeviceInterface) -> Result<Arc<DeviceInterface>, NetError> {
        let mut inner = self.inner.lock();
        let slot = inner.slots.iter().position(|s| s.is_none()).ok_or(NetError::NoBufferSpace)?;
        let iface = Arc::new(make(DevIndex(slot as u16)));
        inner.slots[slot] = Some(iface.clone());
        inner.count += 1;
        Ok(iface)
    }

    pub fn unregister(&self, index: DevIndex) -> Option<Arc<DeviceInterface>> {
        let mut inner = self.inner.lock();
        let slot = inner.slots.get_mut(index.0 as usize)?;
        let taken = slot.take();
        if taken.is_some() {
            inner.count -= 1;
        }
        taken
    }

    pub fn get(&self, index: DevIndex) -> Option<Arc<DeviceInterface>> {
        self.inner.lock().slots.get(index.0 as usize)?.clone()
    }

    pub fn enumerate(&self) -> alloc::vec::Vec<(DevIndex, MacAddr)> {
        let inner = self.inner.lock();
        inner
            .slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|iface| (DevIndex(i as u16), iface.device.mac())))
            .collect()
    }

    pub fn count(&self) -> usize {
        self.inner.lock().count
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub static DEVICE_REGISTRY: DeviceRegistry = DeviceRegistry::new();
