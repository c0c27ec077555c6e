//! Lazy, one-time initialization container for `static` values that can't
//! be built in a `const` context (lookup tables, anything touching a boxed
//! trait object).

use core::cell::UnsafeCell;
use core::mem::MaybeUninit;
use core::sync::atomic::{AtomicU8, Ordering};

const STATE_UNINIT: u8 = 0;
const STATE_RUNNING: u8 = 1;
const STATE_COMPLETE: u8 = 2;

/// A container that runs its initializer exactly once, the first time
/// [`call_once`](Self::call_once) is reached by any caller.
pub struct OnceLock<T> {
    state: AtomicU8,
    data: UnsafeCell<MaybeUninit<T>>,
}

unsafe impl<T: Send + Sync> Send for OnceLock<T> {}
unsafe impl<T: Send + Sync> Sync for OnceLock<T> {}

impl<T> OnceLock<T> {
    #[inline]
    pub const fn new() -> Self {
        Self { state: AtomicU8::new(STATE_UNINIT), data: UnsafeCell::new(MaybeUninit::uninit()) }
    }

    #[inline]
    pub fn call_once(&self, f: impl FnOnce() -> T) {
        if self.state.load(Ordering::Acquire) == STATE_COMPLETE {
            return;
        }

        if self
            .state
            .compare_exchange(STATE_UNINIT, STATE_RUNNING, Ordering::Acquire, Ordering::Acquire)
            .is_ok()
        {
            let value = f();
            unsafe { (*self.data.get()).write(value) };
            self.state.store(STATE_COMPLETE, Ordering::Release);
        } else {
            while self.state.load(Ordering::Acquire) != STATE_COMPLETE {
                core::hint::spin_loop();
            }
        }
    }

    #[inline]
    pub fn get(&self) -> Option<&T> {
        if self.state.load(Ordering::Acquire) == STATE_COMPLETE {
            Some(unsafe { (*self.data.get()).assume_init_ref() })
        } else {
            None
        }
    }

    #[inline]
    pub fn is_completed(&self) -> bool {
        self.state.load(Ordering::Acquire) == STATE_COMPLETE
    }
}

impl<T> Default for OnceLock<T> {
    fn default() -> Self {
        Self::new()
    }
}
