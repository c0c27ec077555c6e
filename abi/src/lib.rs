//! Wire-compatible structures exchanged across the socket, datalink-control
//! and device-module boundaries.
//!
//! Everything in this crate is `#[repr(C)]` and bit-exact with the BSD-style
//! layouts a userspace caller (or a ported driver) expects: `sockaddr`
//! variants, `ifreq`/`ifconf`/`ifaliasreq`, and the routing-socket message
//! shape. None of it carries locking or allocation — it is pure data in and
//! data out.

#![no_std]

use core::ffi::c_char;

pub mod ioctl;

/// Address family constants, matching the BSD numbering the rest of this
/// crate's structures assume.
pub mod af {
    pub const UNSPEC: u8 = 0;
    pub const INET: u8 = 2;
    pub const LINK: u8 = 18;
    pub const INET6: u8 = 28;
}

/// `struct sockaddr` — the generic, family-tagged address header every
/// concrete `sockaddr_*` variant begins with.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SockAddr {
    pub sa_len: u8,
    pub sa_family: u8,
    pub sa_data: [u8; 14],
}

impl SockAddr {
    pub const fn zeroed() -> Self {
        Self { sa_len: 0, sa_family: af::UNSPEC, sa_data: [0; 14] }
    }
}

/// `struct sockaddr_in` — IPv4 socket address, network byte order fields.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SockAddrIn {
    pub sin_len: u8,
    pub sin_family: u8,
    pub sin_port: [u8; 2],
    pub sin_addr: [u8; 4],
    pub sin_zero: [u8; 8],
}

impl SockAddrIn {
    pub const fn new(port: u16, addr: [u8; 4]) -> Self {
        Self {
            sin_len: core::mem::size_of::<Self>() as u8,
            sin_family: af::INET,
            sin_port: port.to_be_bytes(),
            sin_addr: addr,
            sin_zero: [0; 8],
        }
    }

    pub fn port(&self) -> u16 {
        u16::from_be_bytes(self.sin_port)
    }
}

/// `struct sockaddr_dl` — datalink address, used to report a device's
/// hardware address and index through the AF_LINK family.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SockAddrDl {
    pub sdl_len: u8,
    pub sdl_family: u8,
    pub sdl_index: u16,
    pub sdl_type: u8,
    pub sdl_nlen: u8,
    pub sdl_alen: u8,
    pub sdl_slen: u8,
    pub sdl_data: [u8; 46],
}

impl SockAddrDl {
    pub fn for_device(index: u16, mac: [u8; 6]) -> Self {
        let mut data = [0u8; 46];
        data[..6].copy_from_slice(&mac);
        Self {
            sdl_len: core::mem::size_of::<Self>() as u8,
            sdl_family: af::LINK,
            sdl_index: index,
            sdl_type: 6, // IFT_ETHER
            sdl_nlen: 0,
            sdl_alen: 6,
            sdl_slen: 0,
            sdl_data: data,
        }
    }

    pub fn mac(&self) -> [u8; 6] {
        let mut mac = [0u8; 6];
        mac.copy_from_slice(&self.sdl_data[..6]);
        mac
    }
}

pub const IFNAMSIZ: usize = 16;

/// `struct ifreq` — the universal interface-request structure used by
/// `SIOCGIFADDR`, `SIOCSIFFLAGS`, `SIOCGIFMTU` and friends. The union is
/// modelled as a fixed byte array the caller reinterprets per request.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct IfReq {
    pub ifr_name: [c_char; IFNAMSIZ],
    pub ifr_data: IfReqData,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub union IfReqData {
    pub addr: SockAddr,
    pub flags: i16,
    pub metric: i32,
    pub mtu: i32,
    pub index: i32,
}

impl IfReq {
    pub fn name(&self) -> &[u8] {
        let bytes: &[u8] = unsafe {
            core::slice::from_raw_parts(self.ifr_name.as_ptr() as *const u8, IFNAMSIZ)
        };
        let len = bytes.iter().position(|&b| b == 0).unwrap_or(IFNAMSIZ);
        &bytes[..len]
    }
}

/// `struct ifaliasreq` — request to add/remove a secondary address on an
/// interface, carrying address, destination (for point-to-point) and mask.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct IfAliasReq {
    pub ifra_name: [c_char; IFNAMSIZ],
    pub ifra_addr: SockAddr,
    pub ifra_broadaddr: SockAddr,
    pub ifra_mask: SockAddr,
}

/// One entry of an `ifconf` enumeration buffer.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct IfConfEntry {
    pub ifr_name: [c_char; IFNAMSIZ],
    pub ifr_addr: SockAddr,
}

/// `struct ifconf` — caller-supplied buffer descriptor for interface
/// enumeration (`SIOCGIFCONF`).
#[repr(C)]
#[derive(Clone, Copy)]
pub struct IfConf {
    pub ifc_len: i32,
    pub ifc_buf: *mut IfConfEntry,
}

/// `struct route_entry` — one row exchanged with the routing table through
/// the datalink-control interface (add/delete/get route).
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RouteEntryWire {
    pub flags: u32,
    pub destination: SockAddrIn,
    pub mask: SockAddrIn,
    pub gateway: SockAddrIn,
    pub mtu: u32,
    pub metric: u32,
    pub if_index: u16,
}

bitflags::bitflags! {
    /// Routing flags as reported alongside a `route_entry` — mirrors the
    /// RTF_* constants from the BSD routing socket ABI.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct RouteFlags: u32 {
        const UP        = 1 << 0;
        const GATEWAY   = 1 << 1;
        const HOST      = 1 << 2;
        const STATIC    = 1 << 3;
        const DYNAMIC   = 1 << 4;
        const REJECT    = 1 << 5;
    }
}

bitflags::bitflags! {
    /// Interface flags reported through `SIOCGIFFLAGS`, mirroring IFF_*.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct IfFlags: u32 {
        const UP            = 1 << 0;
        const BROADCAST     = 1 << 1;
        const LOOPBACK      = 1 << 3;
        const POINTOPOINT   = 1 << 4;
        const RUNNING       = 1 << 6;
        const NOARP         = 1 << 7;
        const PROMISC       = 1 << 8;
        const ALLMULTI      = 1 << 9;
        const MULTICAST     = 1 << 15;
    }
}
