//! The contract a device module implements to plug into the stack.

use core::fmt;

use crate::buf::NetBuffer;
use crate::error::NetResult;
use crate::types::MacAddr;

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct NetDeviceFeatures: u32 {
        const CHECKSUM_TX = 1 << 0;
        const CHECKSUM_RX = 1 << 1;
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NetDeviceStats {
    pub rx_packets: u64,
    pub tx_packets: u64,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub rx_errors: u64,
    pub tx_errors: u64,
    pub rx_dropped: u64,
    pub tx_dropped: u64,
}

impl fmt::Display for NetDeviceStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rx {}p/{}B ({} err, {} drop) tx {}p/{}B ({} err, {} drop)",
            self.rx_packets,
            self.rx_bytes,
            self.rx_errors,
            self.rx_dropped,
            self.tx_packets,
            self.tx_bytes,
            self.tx_errors,
            self.tx_dropped,
        )
    }
}

/// A network device module: the thing that actually moves bytes on and off
/// the wire. `receive` is a blocking call, run from the interface's reader
/// task (see [`super::interface::DeviceInterface`]) — it is not polled.
pub trait NetDevice: Send + Sync {
    fn tx(&self, buf: NetBuffer) -> NetResult<()>;

    /// Block until a frame is available, or return `None` once the device
    /// has been told to stop (the reader task exits when this happens).
    fn receive(&self) -> Option<NetBuffer>;

    fn mac(&self) -> MacAddr;
    fn mtu(&self) -> u16;
    fn set_up(&self);
    fn set_down(&self);
    fn is_up(&self) -> bool;
    fn stats(&self) -> NetDeviceStats;
    fn features(&self) -> NetDeviceFeatures;
}
