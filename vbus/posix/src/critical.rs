//! Critical section management for POSIX
//!
//! POSIX hosts have no interrupts to mask; every context that would be an
//! interrupt handler on target runs as a thread, and all of them serialize
//! on one global mutex.

use std::cell::Cell;
use std::sync::{Mutex, PoisonError};

use vbus_sync::CriticalSection;

/// Global critical section mutex
static HOST_LOCK: Mutex<()> = Mutex::new(());

thread_local! {
    /// Whether this thread is inside a critical section
    static HELD: Cell<bool> = const { Cell::new(false) };
}

/// Clears [`HELD`] on every exit path, unwinding included
struct Release;

impl Drop for Release {
    fn drop(&mut self) {
        HELD.with(|held| held.set(false));
    }
}

/// Critical section backed by a process-wide mutex
///
/// Not reentrant: entering it twice on one thread would deadlock, so that
/// panics instead.
///
/// # Examples
///
/// ```
/// use vbus_posix::HostLock;
/// use vbus_sync::CriticalSection;
///
/// let value = HostLock.with(|| 42);
/// assert_eq!(value, 42);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct HostLock;

impl HostLock {
    pub const fn new() -> Self {
        Self
    }

    /// Whether the calling thread currently holds the lock
    pub fn is_held() -> bool {
        HELD.with(Cell::get)
    }
}

// SAFETY: all `HostLock` sections in the process serialize on `HOST_LOCK`.
unsafe impl CriticalSection for HostLock {
    fn with<R>(&self, f: impl FnOnce() -> R) -> R {
        let nested = HELD.with(|held| held.get());
        assert!(!nested, "critical sections must not nest");

        // a panic inside an earlier section poisons the mutex, the unit
        // value behind it cannot be left inconsistent
        let _guard = HOST_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        HELD.with(|held| held.set(true));
        let _release = Release;
        f()
    }
}
