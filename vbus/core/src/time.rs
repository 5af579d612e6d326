//! Tick and clock types used by the polling scheduler

use core::fmt;

/// Monotonic tick count (microseconds on the reference hardware)
///
/// The counter is allowed to wrap; the scheduler detects the wrap and treats
/// it explicitly rather than relying on modular comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Tick(u64);

impl Tick {
    /// Zero tick
    pub const ZERO: Self = Self(0);

    /// Maximum tick value
    pub const MAX: Self = Self(u64::MAX);

    pub const fn new(ticks: u64) -> Self {
        Self(ticks)
    }

    /// Raw tick value
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Tick `period` ticks later, wrapping at the counter width
    pub const fn wrapping_add(self, period: u64) -> Self {
        Self(self.0.wrapping_add(period))
    }

    /// Ticks elapsed since `earlier` (handles one wraparound)
    pub const fn elapsed_since(self, earlier: Tick) -> u64 {
        self.0.wrapping_sub(earlier.0)
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tick:{}", self.0)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Tick {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "tick:{}", self.0);
    }
}

/// Source of the current time for the foreground loop
pub trait Clock {
    fn now(&self) -> Tick;
}

impl<T: Clock + ?Sized> Clock for &T {
    fn now(&self) -> Tick {
        (**self).now()
    }
}
