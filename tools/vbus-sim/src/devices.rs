//! Virtual devices hosted by the simulator

use std::sync::atomic::{AtomicU32, Ordering};

use vbus_bus::{BusHardware, Completion, Device};
use vbus_core::{CommandByte, DeviceId, Status};
use vbus_posix::HostLock;
use vbus_ring::{LinearBuffer, RingBuffer};

/// Opcode flag: loopback answers with the payload reversed
pub const REVERSE: u8 = 0x10;
/// Opcode flag: sensor clears its overflow latch
pub const CLEAR_OVERFLOW: u8 = 0x10;

/// Sensor stream ring: two status bytes (warning, poll count) ahead of the
/// samples
pub type SampleRing = RingBuffer<128, 2, HostLock>;

/// Peripheral stand-in; counts re-arm requests
#[derive(Default)]
pub struct SimPins {
    rearms: AtomicU32,
}

impl SimPins {
    pub fn rearms(&self) -> u32 {
        self.rearms.load(Ordering::Relaxed)
    }
}

impl BusHardware for SimPins {
    fn rearm(&self) {
        self.rearms.fetch_add(1, Ordering::Relaxed);
    }
}

/// Answers every command with its own payload
pub struct Loopback<'a> {
    out: &'a LinearBuffer<32>,
}

impl<'a> Loopback<'a> {
    pub fn new(out: &'a LinearBuffer<32>) -> Self {
        Self { out }
    }
}

impl Device for Loopback<'_> {
    fn on_command(&mut self, command: CommandByte, payload: &[u8], done: &dyn Completion) {
        let stored = if command.has_flag(REVERSE) {
            let mut reversed = payload.to_vec();
            reversed.reverse();
            self.out.store(&reversed)
        } else {
            self.out.store(payload)
        };

        match stored {
            Ok(()) => done.complete(0),
            Err(_) => done.complete(Status::FAIL.bits()),
        }
    }
}

/// Streams timer-driven samples; the producer side lives in the ticker
pub struct Sensor {
    ring: &'static SampleRing,
    polls: u8,
}

impl Sensor {
    pub fn new(ring: &'static SampleRing) -> Self {
        Self { ring, polls: 0 }
    }
}

impl Device for Sensor {
    fn on_command(&mut self, command: CommandByte, _payload: &[u8], done: &dyn Completion) {
        if command.has_flag(CLEAR_OVERFLOW) {
            self.ring.clear_overflow();
            done.complete(0);
        } else {
            done.complete(Status::FAIL.bits());
        }
    }

    fn on_polling(&mut self, _device: DeviceId, _done: &dyn Completion) {
        self.polls = self.polls.wrapping_add(1);
        let warning = u8::from(self.ring.check_warning());
        // both bytes always fit the status prefix
        let _ = self.ring.set_status(0, &[warning, self.polls]);
    }
}
