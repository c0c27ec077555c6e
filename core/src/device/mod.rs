//! Device modules, the interfaces that wrap them with reader/consumer
//! tasks, and the registry tracking every interface currently attached.

pub mod drivers;
mod interface;
mod netdevice;
mod registry;

pub use interface::{DeframeFn, DeviceInterface, MonitorFn};
pub use netdevice::{NetDevice, NetDeviceFeatures, NetDeviceStats};
pub use registry::{DEVICE_REGISTRY, MAX_DEVICES};
