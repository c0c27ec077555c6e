//! In-kernel network stack runtime: packet buffers, FIFOs and timers,
//! device interfaces, routing, protocol chains, and sockets.
//!
//! Modules map onto the stack's layered design:
//!
//! - [`buf`] — refcounted, scatter-gather packet buffers.
//! - [`fifo`] and [`timer`] — the queueing and timer primitives every other
//!   layer suspends on.
//! - [`device`] — device interfaces, their reader/consumer tasks, and the
//!   device registry.
//! - [`iface`] — interfaces and the addresses bound to them.
//! - [`route`] — the routing table.
//! - [`chain`] — the protocol-chain registry.
//! - [`socket`] — the socket object.

#![no_std]

extern crate alloc;

pub mod buf;
pub mod chain;
pub mod device;
pub mod error;
pub mod fifo;
pub mod iface;
pub mod notify;
pub mod route;
pub mod socket;
pub mod stack;
pub mod timer;
pub mod types;

pub use error::NetError;
pub use stack::init_stack;
