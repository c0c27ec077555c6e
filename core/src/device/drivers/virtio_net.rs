//! virtio-net device adapter.
//!
//! PCI capability parsing, queue negotiation and descriptor-ring I/O are a
//! concrete device module's problem, not this stack's — they live below
//! the [`NetDevice`] boundary and are replaced here with a single
//! hand-off point, [`VirtioNetDevice::inject_frame`], that a real transport
//! would call from its interrupt handler in place of walking its own RX
//! ring. What's modeled here is everything this stack's side of the
//! boundary actually touches: negotiated feature bits, device config
//! (MAC/MTU/link status), and the stats a device module is expected to
//! keep.

use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use netstack_support::IrqMutex;

use crate::buf::NetBuffer;
use crate::device::{NetDevice, NetDeviceFeatures, NetDeviceStats};
use crate::error::{NetError, NetResult};
use crate::fifo::NetFifo;
use crate::types::MacAddr;

bitflags::bitflags! {
    /// Subset of the VIRTIO_NET_F_* feature bits this adapter understands.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct VirtioNetFeatures: u64 {
        const CSUM       = 1 << 0;
        const GUEST_CSUM = 1 << 1;
        const MTU        = 1 << 3;
        const MAC        = 1 << 5;
        const STATUS     = 1 << 16;
    }
}

const DEFAULT_MTU: u16 = 1500;
const RX_QUEUE_CAPACITY: usize = 256;
const TX_QUEUE_CAPACITY: usize = 256;

pub struct VirtioNetDevice {
    mac: MacAddr,
    mtu: IrqMutex<u16>,
    negotiated: VirtioNetFeatures,
    link_up: AtomicBool,
    rx_queue: NetFifo,
    tx_queue: NetFifo,
    rx_packets: AtomicU64,
    rx_bytes: AtomicU64,
    tx_packets: AtomicU64,
    tx_bytes: AtomicU64,
    tx_errors: AtomicU64,
}

impl VirtioNetDevice {
    pub fn new(mac: MacAddr, negotiated: VirtioNetFeatures) -> Self {
        Self {
            mac,
            mtu: IrqMutex::new(DEFAULT_MTU),
            negotiated,
            link_up: AtomicBool::new(false),
            rx_queue: NetFifo::new(RX_QUEUE_CAPACITY),
            tx_queue: NetFifo::new(TX_QUEUE_CAPACITY),
            rx_packets: AtomicU64::new(0),
            rx_bytes: AtomicU64::new(0),
            tx_packets: AtomicU64::new(0),
            tx_bytes: AtomicU64::new(0),
            tx_errors: AtomicU64::new(0),
        }
    }

    /// Called by the transport's interrupt handler when a frame lands in
    /// the hardware RX ring, in place of this stack walking descriptors
    /// itself.
    pub fn inject_frame(&self, buf: NetBuffer) -> NetResult<()> {
        self.rx_packets.fetch_add(1, Ordering::Relaxed);
        self.rx_bytes.fetch_add(buf.len() as u64, Ordering::Relaxed);
        self.rx_queue.try_push(buf).map_err(|_| NetError::NoBufferSpace)
    }

    /// Drains a frame handed to [`NetDevice::tx`], for the transport to
    /// place on the hardware TX ring.
    pub fn take_outbound(&self) -> Option<NetBuffer> {
        self.tx_queue.try_pop()
    }

    pub fn set_link_up(&self, up: bool) {
        self.link_up.store(up, Ordering::Release);
    }

    pub fn negotiated_features(&self) -> VirtioNetFeatures {
        self.negotiated
    }
}

impl NetDevice for VirtioNetDevice {
    fn tx(&self, buf: NetBuffer) -> NetResult<()> {
        if !self.link_up.load(Ordering::Acquire) {
            self.tx_errors.fetch_add(1, Ordering::Relaxed);
            return Err(NetError::DeviceNotFound);
        }
        self.tx_packets.fetch_add(1, Ordering::Relaxed);
        self.tx_bytes.fetch_add(buf.len() as u64, Ordering::Relaxed);
        self.tx_queue.try_push(buf).map_err(|_| {
            self.tx_errors.fetch_add(1, Ordering::Relaxed);
            NetError::NoBufferSpace
        })
    }

    fn receive(&self) -> Option<NetBuffer> {
        self.rx_queue.pop()
    }

    fn mac(&self) -> MacAddr {
        self.mac
    }

    fn mtu(&self) -> u16 {
        *self.mtu.lock()
    }

    fn set_up(&self) {
        self.link_up.store(true, Ordering::Release);
    }

    fn set_down(&self) {
        self.link_up.store(false, Ordering::Release);
        self.rx_queue.close();
    }

    fn is_up(&self) -> bool {
        self.link_up.load(Ordering::Acquire)
    }

    fn stats(&self) -> NetDeviceStats {
        NetDeviceStats {
            rx_packets: self.rx_packets.load(Ordering::Relaxed),
            rx_bytes: self.rx_bytes.load(Ordering::Relaxed),
            tx_packets: self.tx_packets.load(Ordering::Relaxed),
            tx_bytes: self.tx_bytes.load(Ordering::Relaxed),
            tx_errors: self.tx_errors.load(Ordering::Relaxed),
            ..Default::default()
        }
    }

    fn features(&self) -> NetDeviceFeatures {
        let mut f = NetDeviceFeatures::empty();
        if self.negotiated.contains(VirtioNetFeatures::CSUM) {
            f |= NetDeviceFeatures::CHECKSUM_TX;
        }
        if self.negotiated.contains(VirtioNetFeatures::GUEST_CSUM) {
            f |= NetDeviceFeatures::CHECKSUM_RX;
        }
        f
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netstack_support::testing::TestResult;
    use netstack_support::{assert_eq_test, assert_test, pass};

    pub fn test_inject_then_receive_round_trips() -> TestResult {
        let dev = VirtioNetDevice::new(MacAddr::new([2, 0, 0, 0, 0, 1]), VirtioNetFeatures::MAC);
        dev.inject_frame(NetBuffer::from_copy(&[9, 9]).unwrap()).unwrap();
        let mut out = [0u8; 2];
        dev.receive().unwrap().copy_to_slice(&mut out);
        assert_eq_test!(out, [9, 9]);
        pass!()
    }

    pub fn test_tx_queues_for_transport_pickup() -> TestResult {
        let dev = VirtioNetDevice::new(MacAddr::ZERO, VirtioNetFeatures::empty());
        dev.set_up();
        dev.tx(NetBuffer::from_copy(&[1, 2, 3]).unwrap()).unwrap();
        assert_test!(dev.take_outbound().is_some());
        pass!()
    }

    pub fn test_features_reflect_negotiation() -> TestResult {
        let dev = VirtioNetDevice::new(MacAddr::ZERO, VirtioNetFeatures::CSUM | VirtioNetFeatures::GUEST_CSUM);
        let f = dev.features();
        assert_test!(f.contains(NetDeviceFeatures::CHECKSUM_TX));
        assert_test!(f.contains(NetDeviceFeatures::CHECKSUM_RX));
        pass!()
    }

    netstack_support::define_test_suite!(
        virtio_net,
        [
            test_inject_then_receive_round_trips,
            test_tx_queues_for_transport_pickup,
            test_features_reflect_negotiation,
        ]
    );
}
