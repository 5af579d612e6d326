//! Clock services for POSIX
//!
//! [`HostClock`] reads the monotonic clock directly. [`Ticker`] stands in
//! for the periodic timer interrupt that advances a
//! [`TickCounter`](vbus_sync::TickCounter) on target; it sleeps until
//! absolute deadlines so it does not drift.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use vbus_core::{Clock, Tick};

/// Monotonic clock counting whole `resolution` periods since creation
#[derive(Debug, Clone, Copy)]
pub struct HostClock {
    origin: Instant,
    resolution: Duration,
}

impl HostClock {
    /// # Panics
    ///
    /// If `resolution` is zero.
    pub fn new(resolution: Duration) -> Self {
        assert!(!resolution.is_zero(), "clock resolution must be non-zero");
        Self {
            origin: Instant::now(),
            resolution,
        }
    }

    /// Microsecond ticks
    pub fn micros() -> Self {
        Self::new(Duration::from_micros(1))
    }

    /// Millisecond ticks
    pub fn millis() -> Self {
        Self::new(Duration::from_millis(1))
    }

    pub fn resolution(&self) -> Duration {
        self.resolution
    }

    /// Length of `ticks` periods
    pub fn duration_of(&self, ticks: u64) -> Duration {
        self.resolution.saturating_mul(u32::try_from(ticks).unwrap_or(u32::MAX))
    }
}

impl Default for HostClock {
    fn default() -> Self {
        Self::micros()
    }
}

impl Clock for HostClock {
    fn now(&self) -> Tick {
        let ticks = self.origin.elapsed().as_nanos() / self.resolution.as_nanos();
        Tick::new(ticks as u64)
    }
}

/// Periodic callback thread, stopped and joined on drop
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use vbus_posix::{HostLock, Ticker};
/// use vbus_sync::TickCounter;
///
/// static TICKS: TickCounter<HostLock> = TickCounter::new(HostLock);
///
/// let ticker = Ticker::start(Duration::from_millis(1), || TICKS.tick());
/// // ... run the foreground loop against &TICKS ...
/// ticker.stop();
/// ```
pub struct Ticker {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Ticker {
    /// Spawn the ticker thread calling `on_tick` once per `period`
    ///
    /// # Panics
    ///
    /// If `period` is zero.
    pub fn start<F>(period: Duration, mut on_tick: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        assert!(!period.is_zero(), "tick period must be non-zero");

        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let handle = thread::spawn(move || {
            let mut next_tick = Instant::now();
            while flag.load(Ordering::Relaxed) {
                next_tick += period;
                let now = Instant::now();
                if next_tick > now {
                    thread::sleep(next_tick - now);
                }
                on_tick();
            }
        });

        Self {
            running,
            handle: Some(handle),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Stop the thread and wait for it
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_host_clock_is_monotonic() {
        let clock = HostClock::micros();
        let first = clock.now();
        thread::sleep(Duration::from_millis(2));
        let second = clock.now();
        assert!(second > first);
        assert!(second.elapsed_since(first) >= 2_000);
    }

    #[test]
    fn test_duration_of() {
        let clock = HostClock::millis();
        assert_eq!(clock.duration_of(10), Duration::from_millis(10));
    }

    #[test]
    #[should_panic(expected = "clock resolution must be non-zero")]
    fn test_zero_resolution() {
        HostClock::new(Duration::ZERO);
    }

    #[test]
    fn test_ticker() {
        static TICK_COUNT: AtomicUsize = AtomicUsize::new(0);

        // 100 Hz for ~100ms
        let ticker = Ticker::start(Duration::from_millis(10), || {
            TICK_COUNT.fetch_add(1, Ordering::SeqCst);
        });
        assert!(ticker.is_running());
        thread::sleep(Duration::from_millis(100));
        ticker.stop();

        let count = TICK_COUNT.load(Ordering::SeqCst);
        assert!((5..=15).contains(&count), "expected ~10 ticks, got {}", count);
    }
}
