//! Readiness notifications consumed by select/poll-style callers.
//!
//! Every socket and FIFO owns a [`Notifier`]: a small set of readiness bits
//! plus a wait queue. Producers call [`Notifier::set`] when a condition
//! becomes true (data queued, a peer disconnected); callers doing a
//! blocking wait for one of several events call [`Notifier::wait_any`].

use netstack_support::waitqueue::WaitQueue;
use netstack_support::IrqMutex;

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Readiness: u32 {
        const READABLE = 1 << 0;
        const WRITABLE = 1 << 1;
        const ERROR    = 1 << 2;
        const HANGUP   = 1 << 3;
        const ACCEPT   = 1 << 4;
    }
}

pub struct Notifier {
    state: IrqMutex<Readiness>,
    queue: WaitQueue,
}

impl Notifier {
    pub const fn new() -> Self {
        Self { state: IrqMutex::new(Readiness::empty()), queue: WaitQueue::new() }
    }

    pub fn set(&self, bits: Readiness) {
        let mut state = self.state.lock();
        *state |= bits;
        drop(state);
        self.queue.wake_all();
    }

    pub fn clear(&self, bits: Readiness) {
        let mut state = self.state.lock();
        *state &= !bits;
    }

    pub fn current(&self) -> Readiness {
        *self.state.lock()
    }

    /// Block until any bit in `interest` is set, returning the bits that
    /// were actually set at wake time.
    pub fn wait_any(&self, interest: Readiness) -> Readiness {
        self.queue.wait_event(|| !(self.state.lock().intersection(interest)).is_empty());
        self.state.lock().intersection(interest)
    }

    pub fn wait_any_timeout(&self, interest: Readiness, timeout_ms: u64) -> Readiness {
        self.queue
            .wait_event_timeout(|| !(self.state.lock().intersection(interest)).is_empty(), timeout_ms);
        self.state.lock().intersection(interest)
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}
