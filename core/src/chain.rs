//! Protocol-chain registry: the handoff point between a device's deframed
//! frames and whichever protocol module (IPv4, ARP, ...) claims that
//! EtherType. Those protocol modules are external collaborators — this
//! module only owns the registration table and the dispatch that walks it.

use netstack_support::{IrqMutex, klog_debug};

use crate::buf::NetBuffer;
use crate::types::DevIndex;

const MAX_PROTOCOLS: usize = 16;

pub type ProtocolHandler = fn(DevIndex, NetBuffer);

struct ChainRegistry {
    slots: IrqMutex<[Option<(u16, ProtocolHandler)>; MAX_PROTOCOLS]>,
}

impl ChainRegistry {
    const fn new() -> Self {
        Self { slots: IrqMutex::new([None; MAX_PROTOCOLS]) }
    }

    fn register(&self, protocol: u16, handler: ProtocolHandler) -> bool {
        let mut slots = self.slots.lock();
        if slots.iter().any(|s| matches!(s, Some((p, _)) if *p == protocol)) {
            return false;
        }
        let Some(slot) = slots.iter_mut().find(|s| s.is_none()) else { return false };
        *slot = Some((protocol, handler));
        true
    }

    fn unregister(&self, protocol: u16) -> bool {
        let mut slots = self.slots.lock();
        let Some(slot) = slots.iter_mut().find(|s| matches!(s, Some((p, _)) if *p == protocol)) else {
            return false;
        };
        *slot = None;
        true
    }

    fn handler_for(&self, protocol: u16) -> Option<ProtocolHandler> {
        self.slots.lock().iter().find_map(|s| match s {
            Some((p, h)) if *p == protocol => Some(*h),
            _ => None,
        })
    }
}

static CHAIN: ChainRegistry = ChainRegistry::new();

/// Register `handler` to receive every frame demuxed to `protocol` (an
/// EtherType such as `0x0800` for IPv4). Returns `false` if `protocol` is
/// already claimed or the registry is full.
pub fn register(protocol: u16, handler: ProtocolHandler) -> bool {
    CHAIN.register(protocol, handler)
}

pub fn unregister(protocol: u16) -> bool {
    CHAIN.unregister(protocol)
}

/// Hand `buf` (already deframed by the device layer) to whichever handler
/// claimed `protocol`. Frames for an unclaimed protocol are dropped.
pub fn dispatch(protocol: u16, dev: DevIndex, buf: NetBuffer) {
    match CHAIN.handler_for(protocol) {
        Some(handler) => handler(dev, buf),
        None => klog_debug!("chain: no handler for protocol {:#06x} on {:?}, dropping", protocol, dev),
    }
}
