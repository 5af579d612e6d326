//! Interrupt-facing bus handle

use vbus_core::{DeviceId, Direction, Status, DEFAULT_RX_CAPACITY};
use vbus_sync::{CriticalSection, Exclusive};

use crate::engine::{Attached, Engine, TxStep};
use crate::{BusStats, Completion, Event, PayloadSource};

/// Hook into the bus peripheral
pub trait BusHardware {
    /// The engine is ready to accept a new command
    fn rearm(&self);
}

impl<T: BusHardware + ?Sized> BusHardware for &T {
    fn rearm(&self) {
        (**self).rearm()
    }
}

/// One physical bus multiplexing up to [`vbus_core::MAX_DEVICES`] devices
///
/// The `on_*` methods and [`Bus::next_transmit`] are called from the bus
/// interrupt handlers; [`Bus::take_event`] and [`Bus::complete`] from the
/// foreground loop. `RX` is the receive buffer capacity.
pub struct Bus<'a, H, C, const RX: usize = DEFAULT_RX_CAPACITY> {
    hw: H,
    engine: Exclusive<Engine<'a, RX>, C>,
}

impl<'a, H: BusHardware, C: CriticalSection, const RX: usize> Bus<'a, H, C, RX> {
    pub const fn new(hw: H, cs: C) -> Self {
        Self {
            hw,
            engine: Exclusive::new(cs, Engine::new()),
        }
    }

    /// Make `device` addressable with `source` as its read payload
    ///
    /// Normally called through [`crate::Registry::register`].
    pub fn attach(&self, device: DeviceId, source: PayloadSource<'a>, notify_sync: bool) {
        self.engine.lock(|e| e.attach(device, Attached { source, notify_sync }));
    }

    /// Address match; `direction` as seen from the firmware
    pub fn on_address(&self, direction: Direction) {
        let (rearm, plan) = self.engine.lock(|e| {
            let rearm = e.finish();
            match direction {
                Direction::Receive => {
                    e.begin_receive();
                    (rearm, None)
                }
                Direction::Transmit => (rearm, Some(e.read_plan())),
            }
        });
        if rearm {
            self.hw.rearm();
        }

        if let Some(plan) = plan {
            let (length, overflow) = match plan.source {
                Some(PayloadSource::Linear(src)) => (src.available(), false),
                Some(PayloadSource::Ring(ring)) => (ring.start_read(), ring.overflow()),
                None => (0, false),
            };
            self.engine.lock(|e| e.begin_transmit(plan, length, overflow));
        }
    }

    /// Byte received from the master
    pub fn on_receive(&self, byte: u8) {
        self.engine.lock(|e| e.receive(byte));
    }

    /// Next byte to load into the transmit register
    pub fn next_transmit(&self) -> u8 {
        let step = self.engine.lock(|e| e.transmit_step());
        let (byte, payload) = match step {
            TxStep::Byte(b) => (b, false),
            TxStep::Linear(src, pos) => (src.byte_at(pos).unwrap_or(vbus_core::FILLER_BYTE), true),
            TxStep::Ring(ring) => (ring.get_byte().unwrap_or(vbus_core::FILLER_BYTE), true),
        };
        self.engine.lock(|e| e.record_transmit(byte, payload));
        byte
    }

    /// Stop condition
    pub fn on_stop(&self) {
        if self.engine.lock(|e| e.finish()) {
            self.hw.rearm();
        }
    }

    /// Acknowledge failure or overrun; closes the transaction like a stop
    pub fn on_error(&self) {
        let rearm = self.engine.lock(|e| {
            e.stats.bus_errors = e.stats.bus_errors.wrapping_add(1);
            e.finish()
        });
        if rearm {
            self.hw.rearm();
        }
    }

    /// Take the pending event, if any, for foreground dispatch
    pub fn take_event(&self) -> Option<Event<RX>> {
        self.engine.lock(|e| e.take_event())
    }

    /// Completion primitive; see [`Completion`]
    pub fn complete(&self, status: u8) {
        let (was_busy, rearm) = self.engine.lock(|e| e.complete(status));
        debug_assert!(was_busy, "completion without a pending command");
        if rearm {
            self.hw.rearm();
        }
    }

    /// Device waiting for completion, if any
    pub fn busy(&self) -> Option<DeviceId> {
        self.engine.lock(|e| e.busy())
    }

    /// Global status as reported by the next read
    pub fn status(&self) -> Status {
        self.engine.lock(|e| e.status())
    }

    /// Device targeted by reads
    pub fn selected(&self) -> DeviceId {
        self.engine.lock(|e| e.selected())
    }

    pub fn stats(&self) -> BusStats {
        self.engine.lock(|e| e.stats)
    }

    pub fn hardware(&self) -> &H {
        &self.hw
    }
}

impl<H: BusHardware, C: CriticalSection, const RX: usize> Completion for Bus<'_, H, C, RX> {
    fn complete(&self, status: u8) {
        Bus::complete(self, status)
    }
}
