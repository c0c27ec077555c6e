//! Fixed-capacity wait queue used at every suspension point in the stack:
//! FIFO dequeue, socket send/recv, and timer waits.

use crate::runtime::{TaskHandle, runtime};
use crate::spinlock::IrqMutex;

const WAITQUEUE_CAPACITY: usize = 32;
const NULL_HANDLE: TaskHandle = TaskHandle::NONE;

struct WaitQueueInner {
    waiters: [TaskHandle; WAITQUEUE_CAPACITY],
    count: usize,
}

impl WaitQueueInner {
    const fn new() -> Self {
        Self { waiters: [NULL_HANDLE; WAITQUEUE_CAPACITY], count: 0 }
    }

    fn enqueue(&mut self, task: TaskHandle) -> bool {
        if self.count >= WAITQUEUE_CAPACITY {
            return false;
        }
        for slot in self.waiters.iter_mut() {
            if slot.is_none() {
                *slot = task;
                self.count += 1;
                return true;
            }
        }
        false
    }

    fn dequeue_one(&mut self) -> Option<TaskHandle> {
        for slot in self.waiters.iter_mut() {
            if !slot.is_none() {
                let task = *slot;
                *slot = NULL_HANDLE;
                self.count -= 1;
                return Some(task);
            }
        }
        None
    }

    #[allow(dead_code)]
    fn dequeue_all(&mut self) -> usize {
        let mut woken = 0;
        for slot in self.waiters.iter_mut() {
            if !slot.is_none() {
                *slot = NULL_HANDLE;
                woken += 1;
            }
        }
        self.count = 0;
        woken
    }

    fn remove_task(&mut self, task: TaskHandle) -> bool {
        for slot in self.waiters.iter_mut() {
            if *slot == task {
                *slot = NULL_HANDLE;
                self.count -= 1;
                return true;
            }
        }
        false
    }
}

/// A queue of tasks blocked waiting for some condition to become true.
///
/// Construct as a `static` with [`WaitQueue::new`], then call
/// [`wait_event`](Self::wait_event) from the blocking side and
/// [`wake_one`](Self::wake_one)/[`wake_all`](Self::wake_all) from the side
/// that changes the condition.
pub struct WaitQueue {
    inner: IrqMutex<WaitQueueInner>,
}

impl WaitQueue {
    pub const fn new() -> Self {
        Self { inner: IrqMutex::new(WaitQueueInner::new()) }
    }

    /// Block the current task until `condition` returns true. Re-checks the
    /// condition immediately after enqueueing to avoid the "condition
    /// became true between check and sleep" race, and again after every
    /// wake in case of a spurious one.
    pub fn wait_event<F: Fn() -> bool>(&self, condition: F) -> bool {
        if condition() {
            return true;
        }

        let rt = runtime();
        loop {
            let task = rt.current_task();
            {
                let mut inner = self.inner.lock();
                if condition() {
                    return true;
                }
                if !inner.enqueue(task) {
                    return false;
                }
            }
            rt.block_current_task();
            if condition() {
                return true;
            }
        }
    }

    /// As [`wait_event`](Self::wait_event), but gives up after `timeout_ms`
    /// milliseconds of no wakeup, returning `false` in that case.
    pub fn wait_event_timeout<F: Fn() -> bool>(&self, condition: F, timeout_ms: u64) -> bool {
        if condition() {
            return true;
        }
        let deadline = crate::clock::uptime_ms() + timeout_ms;
        let rt = runtime();
        loop {
            let task = rt.current_task();
            {
                let mut inner = self.inner.lock();
                if condition() {
                    return true;
                }
                inner.enqueue(task);
            }
            if crate::clock::uptime_ms() >= deadline {
                self.inner.lock().remove_task(task);
                return condition();
            }
            rt.block_current_task();
            if condition() {
                return true;
            }
        }
    }

    pub fn wake_one(&self) -> bool {
        let task = self.inner.lock().dequeue_one();
        match task {
            Some(task) => {
                runtime().unblock_task(task);
                true
            }
            None => false,
        }
    }

    pub fn wake_all(&self) -> usize {
        // Drain under the lock first so we never hold it while calling into
        // the runtime, then unblock every drained task.
        let mut woken_tasks = [NULL_HANDLE; WAITQUEUE_CAPACITY];
        let count = {
            let mut inner = self.inner.lock();
            let mut i = 0;
            while let Some(task) = inner.dequeue_one() {
                woken_tasks[i] = task;
                i += 1;
            }
            i
        };
        for task in &woken_tasks[..count] {
            runtime().unblock_task(*task);
        }
        count
    }

    pub fn has_waiters(&self) -> bool {
        self.inner.lock().count > 0
    }

    pub fn waiter_count(&self) -> usize {
        self.inner.lock().count
    }

    pub fn remove_task(&self, task: TaskHandle) -> bool {
        self.inner.lock().remove_task(task)
    }
}

impl Default for WaitQueue {
    fn default() -> Self {
        Self::new()
    }
}
