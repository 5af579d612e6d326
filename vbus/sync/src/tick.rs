//! Timer-interrupt driven tick counter

use vbus_core::{Clock, Tick};

use crate::{CriticalSection, SeqLock};

/// 64-bit tick counter advanced from a periodic timer interrupt
///
/// A 64-bit counter cannot be read atomically on 32-bit cores, so both sides
/// go through a [`SeqLock`].
pub struct TickCounter<C> {
    ticks: SeqLock<u64, C>,
}

impl<C: CriticalSection> TickCounter<C> {
    pub const fn new(cs: C) -> Self {
        Self::starting_at(cs, Tick::ZERO)
    }

    /// Counter preset to `start`, e.g. to exercise wraparound
    pub const fn starting_at(cs: C, start: Tick) -> Self {
        Self {
            ticks: SeqLock::new(cs, start.raw()),
        }
    }

    /// Advance by one tick; called from the timer interrupt
    pub fn tick(&self) {
        self.advance(1);
    }

    /// Advance by `ticks`, wrapping at the counter width
    pub fn advance(&self, ticks: u64) {
        self.ticks.write(|t| *t = t.wrapping_add(ticks));
    }
}

impl<C: CriticalSection> Clock for TickCounter<C> {
    fn now(&self) -> Tick {
        Tick::new(self.ticks.read())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IrqFree;

    #[test]
    fn test_tick_counter_advances() {
        static COUNTER: TickCounter<IrqFree> = TickCounter::new(IrqFree);
        let start = COUNTER.now();
        COUNTER.tick();
        COUNTER.advance(9);
        assert_eq!(COUNTER.now().elapsed_since(start), 10);
    }

    #[test]
    fn test_tick_counter_wraps() {
        let counter = TickCounter::starting_at(IrqFree::new(), Tick::MAX);
        counter.tick();
        assert_eq!(counter.now(), Tick::ZERO);
    }
}
