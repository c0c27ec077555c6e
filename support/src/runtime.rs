//! Injection point for the host scheduler.
//!
//! This crate has no scheduler of its own — it needs one to block a task
//! waiting on a wait queue, spawn the reader/consumer threads a device
//! interface runs, and read a monotonic clock for timers. [`TaskRuntime`] is
//! the seam: whatever embeds this stack implements it once and registers it
//! with [`register_runtime`] during boot.

/// Opaque handle to a schedulable unit of execution. `0` is reserved as the
/// "no task" sentinel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskHandle(pub u64);

impl TaskHandle {
    pub const NONE: TaskHandle = TaskHandle(0);

    pub fn is_none(&self) -> bool {
        *self == Self::NONE
    }
}

/// Scheduler services the network stack needs but does not implement.
pub trait TaskRuntime: Sync {
    /// The task handle currently executing.
    fn current_task(&self) -> TaskHandle;

    /// Suspend the calling task until [`unblock_task`](Self::unblock_task)
    /// is called for it, or the runtime's own timeout/signal path fires.
    fn block_current_task(&self);

    /// Wake a previously-blocked task. Returns `false` if the handle is not
    /// currently blocked (already running, or unknown).
    fn unblock_task(&self, task: TaskHandle) -> bool;

    /// Spawn a new task running `entry(data)`, used for a device
    /// interface's reader and consumer loops. `data` is an opaque token the
    /// caller uses to identify which interface the task should service,
    /// since `entry` itself is a plain function pointer with no closure
    /// environment. Returns the new task's handle.
    fn spawn(&self, name: &'static str, entry: fn(u64), data: u64) -> TaskHandle;

    /// Milliseconds since an arbitrary but fixed epoch (boot, typically).
    fn uptime_ms(&self) -> u64;

    /// Yield the remainder of the current task's timeslice.
    fn yield_now(&self);
}

static RUNTIME: crate::once_lock::OnceLock<&'static dyn TaskRuntime> = crate::once_lock::OnceLock::new();

/// Register the runtime implementation. Only the first call takes effect;
/// later calls are ignored, matching the embedding kernel calling this once
/// during its own bring-up.
pub fn register_runtime(rt: &'static dyn TaskRuntime) {
    RUNTIME.call_once(|| rt);
}

/// Fetch the registered runtime.
///
/// # Panics
/// Panics if no runtime has been registered yet. Every entry point that
/// suspends or spawns a task runs after stack initialization, by which
/// point the embedder must have called [`register_runtime`].
pub fn runtime() -> &'static dyn TaskRuntime {
    *RUNTIME.get().expect("netstack-support: TaskRuntime not registered")
}
