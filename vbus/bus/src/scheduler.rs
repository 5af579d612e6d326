//! Cooperative foreground loop

use vbus_core::Clock;
use vbus_sync::CriticalSection;

use crate::{Bus, BusHardware, Registry};

/// Foreground side of the firmware: drains bus events and polls devices
///
/// Single threaded and never preempted by itself; a slow device callback
/// delays everything after it in the same iteration.
pub struct Scheduler<'a, 'b, H, C, K, const RX: usize, const D: usize> {
    bus: &'b Bus<'a, H, C, RX>,
    registry: Registry<'a, D>,
    clock: K,
}

impl<'a, 'b, H, C, K, const RX: usize, const D: usize> Scheduler<'a, 'b, H, C, K, RX, D>
where
    H: BusHardware,
    C: CriticalSection,
    K: Clock,
{
    pub fn new(bus: &'b Bus<'a, H, C, RX>, registry: Registry<'a, D>, clock: K) -> Self {
        Self {
            bus,
            registry,
            clock,
        }
    }

    /// One loop iteration: dispatch the pending event, then poll
    ///
    /// Returns whether an event was dispatched.
    pub fn step(&mut self) -> bool {
        let dispatched = match self.bus.take_event() {
            Some(event) => {
                self.registry.dispatch(event, self.bus);
                true
            }
            None => false,
        };
        self.registry.poll_devices(self.clock.now(), self.bus);
        dispatched
    }

    /// Run forever
    pub fn run(&mut self) -> ! {
        loop {
            self.step();
        }
    }

    pub fn bus(&self) -> &'b Bus<'a, H, C, RX> {
        self.bus
    }

    pub fn registry(&self) -> &Registry<'a, D> {
        &self.registry
    }

    pub fn clock(&self) -> &K {
        &self.clock
    }
}
