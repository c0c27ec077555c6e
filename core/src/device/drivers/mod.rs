//! Device modules that plug into [`super::NetDevice`]. Both are tenants of
//! the interface/registry machinery, not part of it — a real deployment
//! would add more of these without touching anything else in this crate.

pub mod loopback;
pub mod virtio_net;
