//! Ambient runtime support shared by the network stack: locking primitives,
//! lazy statics, a wait-queue for suspension points, structured logging, and
//! the no_std test harness.
//!
//! Nothing in this crate knows about packets or sockets — it is the floor
//! the stack is built on, the same way a kernel's `lib` crate sits under its
//! drivers.

#![no_std]

extern crate alloc;

pub mod clock;
pub mod klog;
pub mod once_lock;
pub mod runtime;
pub mod spinlock;
pub mod testing;
pub mod waitqueue;

pub use klog::{KlogLevel, klog_get_level, klog_is_enabled, klog_register_backend, klog_set_level};
pub use once_lock::OnceLock;
pub use runtime::{TaskHandle, TaskRuntime, register_runtime, runtime};
pub use spinlock::{IrqMutex, IrqMutexGuard};
pub use waitqueue::WaitQueue;

pub use paste;
