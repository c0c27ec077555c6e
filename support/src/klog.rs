//! Structured kernel logging.
//!
//! Log lines go to a registered backend function; until one is registered,
//! output falls back to COM1 through [`uart_16550`] so boot-time messages
//! are never silently dropped.

use core::fmt;
use core::sync::atomic::{AtomicPtr, AtomicU8, Ordering};

use spin::Mutex;
use uart_16550::SerialPort;

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum KlogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

static CURRENT_LEVEL: AtomicU8 = AtomicU8::new(KlogLevel::Info as u8);

pub fn klog_set_level(level: KlogLevel) {
    CURRENT_LEVEL.store(level as u8, Ordering::Relaxed);
}

pub fn klog_get_level() -> KlogLevel {
    match CURRENT_LEVEL.load(Ordering::Relaxed) {
        0 => KlogLevel::Error,
        1 => KlogLevel::Warn,
        2 => KlogLevel::Info,
        3 => KlogLevel::Debug,
        _ => KlogLevel::Trace,
    }
}

pub fn klog_is_enabled(level: KlogLevel) -> bool {
    (level as u8) <= CURRENT_LEVEL.load(Ordering::Relaxed)
}

pub type KlogBackend = fn(fmt::Arguments<'_>);

static BACKEND: AtomicPtr<()> = AtomicPtr::new(core::ptr::null_mut());

/// Install the backend used for every subsequent `klog_*!` call. Passing a
/// new backend after another is already registered replaces it.
pub fn klog_register_backend(backend: KlogBackend) {
    BACKEND.store(backend as *mut (), Ordering::Release);
}

static EARLY_PORT: Mutex<Option<SerialPort>> = Mutex::new(None);

fn early_backend(args: fmt::Arguments<'_>) {
    use core::fmt::Write;
    let mut guard = EARLY_PORT.lock();
    let port = guard.get_or_insert_with(|| {
        let mut port = unsafe { SerialPort::new(0x3F8) };
        port.init();
        port
    });
    let _ = port.write_fmt(args);
    let _ = port.write_str("\n");
}

#[doc(hidden)]
pub fn klog_dispatch(level: KlogLevel, args: fmt::Arguments<'_>) {
    if !klog_is_enabled(level) {
        return;
    }
    let ptr = BACKEND.load(Ordering::Acquire);
    if ptr.is_null() {
        early_backend(args);
    } else {
        let backend: KlogBackend = unsafe { core::mem::transmute(ptr) };
        backend(args);
    }
}

#[macro_export]
macro_rules! klog_error {
    ($($arg:tt)*) => {
        $crate::klog::klog_dispatch($crate::klog::KlogLevel::Error, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! klog_warn {
    ($($arg:tt)*) => {
        $crate::klog::klog_dispatch($crate::klog::KlogLevel::Warn, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! klog_info {
    ($($arg:tt)*) => {
        $crate::klog::klog_dispatch($crate::klog::KlogLevel::Info, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! klog_debug {
    ($($arg:tt)*) => {
        $crate::klog::klog_dispatch($crate::klog::KlogLevel::Debug, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! klog_trace {
    ($($arg:tt)*) => {
        $crate::klog::klog_dispatch($crate::klog::KlogLevel::Trace, format_args!($($arg)*))
    };
}
