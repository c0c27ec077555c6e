//! Single global timer list.
//!
//! Every protocol and socket that needs a delayed callback — TCP
//! retransmit, ARP expiry, a blocking recv's timeout — schedules through
//! this one service rather than owning a private timer wheel. Entries are
//! kept in a flat list sorted by deadline; [`NetTimerService::process`] is
//! called periodically by the host's clock interrupt and fires everything
//! whose deadline has passed, collecting the due entries under the lock and
//! running their hooks after releasing it.

use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};

use netstack_support::IrqMutex;
use netstack_support::waitqueue::WaitQueue;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

pub type TimerHook = fn(TimerId, u64);

struct TimerEntry {
    id: TimerId,
    hook: TimerHook,
    data: u64,
    due_time_ms: u64,
}

struct TimerListInner {
    entries: Vec<TimerEntry>,
}

/// The stack's single timer list.
pub struct NetTimerService {
    inner: IrqMutex<TimerListInner>,
    next_id: AtomicU64,
    fired: WaitQueue,
}

impl NetTimerService {
    pub const fn new() -> Self {
        Self {
            inner: IrqMutex::new(TimerListInner { entries: Vec::new() }),
            next_id: AtomicU64::new(1),
            fired: WaitQueue::new(),
        }
    }

    /// Schedule `hook` to run `delay_ms` from `now_ms`, passing `data` back
    /// to it untouched. Returns the id used to cancel or reschedule it.
    pub fn schedule(&self, hook: TimerHook, data: u64, now_ms: u64, delay_ms: u64) -> TimerId {
        let id = TimerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let due_time_ms = now_ms + delay_ms;
        let mut inner = self.inner.lock();
        let pos = inner.entries.partition_point(|e| e.due_time_ms <= due_time_ms);
        inner.entries.insert(pos, TimerEntry { id, hook, data, due_time_ms });
        id
    }

    /// Reschedule (or cancel, if `delay_ms` is negative) an existing timer.
    /// Matches the BSD `set_timer()` convention this stack's scheduling
    /// calls are modeled on.
    pub fn set_timer(&self, id: TimerId, now_ms: u64, delay_ms: i64) -> bool {
        let mut inner = self.inner.lock();
        let Some(pos) = inner.entries.iter().position(|e| e.id == id) else { return false };
        if delay_ms < 0 {
            inner.entries.remove(pos);
            return true;
        }
        let mut entry = inner.entries.remove(pos);
        entry.due_time_ms = now_ms + delay_ms as u64;
        let new_pos = inner.entries.partition_point(|e| e.due_time_ms <= entry.due_time_ms);
        inner.entries.insert(new_pos, entry);
        true
    }

    pub fn cancel(&self, id: TimerId) -> bool {
        let mut inner = self.inner.lock();
        if let Some(pos) = inner.entries.iter().position(|e| e.id == id) {
            inner.entries.remove(pos);
            true
        } else {
            false
        }
    }

    /// Run every timer whose deadline is at or before `now_ms`. Safe to
    /// call from interrupt-adjacent context: the lock is held only long
    /// enough to drain the due entries, hooks run after it's released.
    pub fn process(&self, now_ms: u64) -> usize {
        let due = {
            let mut inner = self.inner.lock();
            let split = inner.entries.partition_point(|e| e.due_time_ms <= now_ms);
            inner.entries.drain(..split).collect::<Vec<_>>()
        };
        let count = due.len();
        for entry in due {
            (entry.hook)(entry.id, entry.data);
        }
        if count > 0 {
            self.fired.wake_all();
        }
        count
    }

    pub fn pending_count(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Block the caller until any timer fires, or `timeout_ms` elapses.
    /// Used by blocking socket operations that want to wake up on whatever
    /// next makes progress (a retransmit, a keepalive) without polling.
    pub fn wait_for_any(&self, timeout_ms: u64) -> bool {
        self.fired.wait_event_timeout(|| false, timeout_ms)
    }
}

impl Default for NetTimerService {
    fn default() -> Self {
        Self::new()
    }
}

pub static NET_TIMERS: NetTimerService = NetTimerService::new();

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::AtomicU32;

    use netstack_support::testing::TestResult;
    use netstack_support::{assert_eq_test, assert_test, pass};

    static FIRE_COUNT: AtomicU32 = AtomicU32::new(0);

    fn count_hook(_id: TimerId, _data: u64) {
        FIRE_COUNT.fetch_add(1, Ordering::Relaxed);
    }

    pub fn test_entries_fire_in_deadline_order() -> TestResult {
        let svc = NetTimerService::new();
        FIRE_COUNT.store(0, Ordering::Relaxed);
        svc.schedule(count_hook, 0, 0, 100);
        svc.schedule(count_hook, 0, 0, 10);
        svc.schedule(count_hook, 0, 0, 50);
        assert_eq_test!(svc.pending_count(), 3);
        let fired = svc.process(60);
        assert_eq_test!(fired, 2);
        assert_eq_test!(svc.pending_count(), 1);
        pass!()
    }

    pub fn test_cancel_removes_before_fire() -> TestResult {
        let svc = NetTimerService::new();
        let id = svc.schedule(count_hook, 0, 0, 100);
        assert_test!(svc.cancel(id));
        assert_eq_test!(svc.pending_count(), 0);
        assert_eq_test!(svc.process(1000), 0);
        pass!()
    }

    pub fn test_set_timer_with_negative_delay_cancels() -> TestResult {
        let svc = NetTimerService::new();
        let id = svc.schedule(count_hook, 0, 0, 100);
        assert_test!(svc.set_timer(id, 0, -1));
        assert_eq_test!(svc.pending_count(), 0);
        pass!()
    }

    netstack_support::define_test_suite!(
        timer,
        [
            test_entries_fire_in_deadline_order,
            test_cancel_removes_before_fire,
            test_set_timer_with_negative_delay_cancels,
        ]
    );
}
