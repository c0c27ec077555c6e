//! Monotonic time, sourced from the registered [`crate::runtime::TaskRuntime`].

use crate::runtime::runtime;

pub fn uptime_ms() -> u64 {
    runtime().uptime_ms()
}
