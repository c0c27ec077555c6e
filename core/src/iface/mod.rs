//! Interfaces and the addresses bound to them.

mod address;
mod interface;
mod ioctl;

pub use address::InterfaceAddress;
pub use interface::{ChangeAddressHook, INTERFACE_TABLE, Interface, InterfaceTable, UpHook};
pub use ioctl::{handle_ifreq, handle_siocaifaddr};
