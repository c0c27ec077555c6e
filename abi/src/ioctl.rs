//! Datalink-control ioctl numbers understood by [`crate::IfReq`] and
//! [`crate::RouteEntryWire`] consumers. Values are opaque request codes, not
//! bit-exact with any particular host — callers only need them to round-trip
//! through the same control interface on both sides.

pub const SIOCGIFADDR: u32 = 0xc020_6921;
pub const SIOCSIFADDR: u32 = 0x8020_6916;
pub const SIOCGIFFLAGS: u32 = 0xc020_6911;
pub const SIOCSIFFLAGS: u32 = 0x8020_6910;
pub const SIOCGIFMTU: u32 = 0xc020_6933;
pub const SIOCSIFMTU: u32 = 0x8020_6934;
pub const SIOCGIFNETMASK: u32 = 0xc020_6925;
pub const SIOCSIFNETMASK: u32 = 0x8020_6916;
pub const SIOCGIFCONF: u32 = 0xc008_6924;
pub const SIOCADDRT: u32 = 0x8030_7210;
pub const SIOCDELRT: u32 = 0x8030_7211;
pub const SIOCGIFHWADDR: u32 = 0xc020_6927;
pub const SIOCAIFADDR: u32 = 0x8040_6943;
pub const SIOCDIFADDR: u32 = 0x8020_6919;
