// Infrastructure module - Core background services and utilities
pub mod heartbeat;
pub mod task_manager;
pub mod timer;

pub(crate) use heartbeat::HeartbeatManager;
pub use task_manager::TaskManager;
pub use timer::{Backoff, Deadline, Timer};

use std::sync::{Mutex, MutexGuard};

/// Locks a mutex, recovering the data if a callback panicked while holding it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
