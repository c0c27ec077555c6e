//! A registered device wired up to a reader task, a consumer task, and the
//! FIFO that connects them.
//!
//! The reader task blocks in [`NetDevice::receive`] and pushes whatever
//! comes back onto `receive_fifo`; the consumer task blocks popping that
//! FIFO and hands each frame to `deframe`, then either a monitor tap or the
//! protocol-chain registry. Splitting the two means a slow consumer (stuck
//! behind a congested socket) backpressures through the FIFO instead of
//! blocking the device's own receive path.

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use netstack_support::runtime::{TaskHandle, runtime};
use netstack_support::IrqMutex;

use super::netdevice::NetDevice;
use super::registry::DEVICE_REGISTRY;
use crate::buf::NetBuffer;
use crate::fifo::NetFifo;
use crate::types::DevIndex;

/// Strips the link-layer header from `buf` and returns the protocol id it
/// announces (an EtherType, for Ethernet devices), or `None` if the frame
/// is malformed or addressed to nobody this interface cares about.
pub type DeframeFn = fn(&mut NetBuffer) -> Option<u16>;

/// A tap receiving every accepted frame before it's deframed — used for
/// promiscuous monitoring.
pub type MonitorFn = fn(DevIndex, &NetBuffer);

const RECEIVE_FIFO_CAPACITY: usize = 256;

pub struct DeviceInterface {
    pub device: Arc<dyn NetDevice>,
    pub index: DevIndex,
    pub receive_fifo: NetFifo,
    deframe: DeframeFn,
    monitors: IrqMutex<Vec<MonitorFn>>,
    reader_tid: IrqMutex<TaskHandle>,
    consumer_tid: IrqMutex<TaskHandle>,
    up_count: AtomicUsize,
    ref_count: AtomicUsize,
    busy: AtomicBool,
}

impl DeviceInterface {
    pub fn new(index: DevIndex, device: Box<dyn NetDevice>, deframe: DeframeFn) -> Self {
        Self {
            device: Arc::from(device),
            index,
            receive_fifo: NetFifo::new(RECEIVE_FIFO_CAPACITY),
            deframe,
            monitors: IrqMutex::new(Vec::new()),
            reader_tid: IrqMutex::new(TaskHandle::NONE),
            consumer_tid: IrqMutex::new(TaskHandle::NONE),
            up_count: AtomicUsize::new(0),
            ref_count: AtomicUsize::new(1),
            busy: AtomicBool::new(false),
        }
    }

    pub fn add_monitor(&self, f: MonitorFn) {
        self.monitors.lock().push(f);
    }

    pub fn retain(&self) {
        self.ref_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn release(&self) -> usize {
        self.ref_count.fetch_sub(1, Ordering::AcqRel) - 1
    }

    /// Bring the interface up: mark it administratively up and, on the
    /// first concurrent opener, spawn the reader and consumer tasks.
    pub fn up(&self) {
        if self.up_count.fetch_add(1, Ordering::AcqRel) == 0 {
            while self.busy.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err() {
                core::hint::spin_loop();
            }
            self.device.set_up();
            let rt = runtime();
            let data = self.index.0 as u64;
            *self.reader_tid.lock() = rt.spawn("netif-reader", reader_loop, data);
            *self.consumer_tid.lock() = rt.spawn("netif-consumer", consumer_loop, data);
            self.busy.store(false, Ordering::Release);
        }
    }

    /// Drop an opener. Once the last one goes, close the FIFO (which wakes
    /// the consumer task so it can exit) and bring the device down.
    pub fn down(&self) {
        let prev = self.up_count.fetch_sub(1, Ordering::AcqRel);
        if prev == 1 {
            self.device.set_down();
            self.receive_fifo.close();
        }
    }

    pub fn is_up(&self) -> bool {
        self.up_count.load(Ordering::Acquire) > 0
    }
}

fn reader_loop(data: u64) {
    let Some(iface) = DEVICE_REGISTRY.get(DevIndex(data as u16)) else { return };
    while iface.is_up() {
        match iface.device.receive() {
            Some(buf) => {
                let _ = iface.receive_fifo.try_push(buf);
            }
            None => break,
        }
    }
}

fn consumer_loop(data: u64) {
    let Some(iface) = DEVICE_REGISTRY.get(DevIndex(data as u16)) else { return };
    while let Some(mut buf) = iface.receive_fifo.pop() {
        for monitor in iface.monitors.lock().iter() {
            monitor(iface.index, &buf);
        }
        if let Some(protocol) = (iface.deframe)(&mut buf) {
            buf.ancillary.push(crate::buf::AncillaryItem::Interface(iface.index));
            crate::chain::dispatch(protocol, iface.index, buf);
        }
    }
}
