//! Shared fixtures for vbus-bus integration tests

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::sync::atomic::{AtomicU32, Ordering};

use vbus_bus::{BusHardware, Completion, Device};
use vbus_core::{Clock, CommandByte, DeviceId, Status, Tick};
use vbus_ring::LinearBuffer;

pub fn dev(id: u8) -> DeviceId {
    DeviceId::new(id).unwrap()
}

/// Bus peripheral stand-in counting re-arm requests
#[derive(Default)]
pub struct Pins {
    rearms: AtomicU32,
}

impl Pins {
    pub fn rearms(&self) -> u32 {
        self.rearms.load(Ordering::Relaxed)
    }
}

impl BusHardware for Pins {
    fn rearm(&self) {
        self.rearms.fetch_add(1, Ordering::Relaxed);
    }
}

/// Manually advanced clock
#[derive(Default)]
pub struct ManualClock(Cell<u64>);

impl ManualClock {
    pub fn starting_at(ticks: u64) -> Self {
        Self(Cell::new(ticks))
    }

    pub fn advance(&self, ticks: u64) {
        self.0.set(self.0.get().wrapping_add(ticks));
    }

    pub fn set(&self, ticks: u64) {
        self.0.set(ticks);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Tick {
        Tick::new(self.0.get())
    }
}

/// What devices observed
#[derive(Default)]
pub struct Probe {
    pub commands: RefCell<Vec<(CommandByte, Vec<u8>)>>,
    pub reads: RefCell<Vec<(DeviceId, usize)>>,
    pub syncs: RefCell<Vec<(CommandByte, usize)>>,
    pub polls: RefCell<Vec<(DeviceId, u64)>>,
}

/// Stores every command payload as its response
pub struct Echo<'a> {
    pub out: &'a LinearBuffer<32>,
    pub probe: &'a Probe,
}

impl Device for Echo<'_> {
    fn on_command(&mut self, command: CommandByte, payload: &[u8], done: &dyn Completion) {
        self.probe.commands.borrow_mut().push((command, payload.to_vec()));
        match self.out.store(payload) {
            Ok(()) => done.complete(0),
            Err(_) => done.complete(Status::FAIL.bits()),
        }
    }

    fn on_read_done(&mut self, device: DeviceId, len: usize, done: &dyn Completion) {
        self.probe.reads.borrow_mut().push((device, len));
        done.complete(0);
    }

    fn on_sync(&mut self, command: CommandByte, received: usize, done: &dyn Completion) {
        self.probe.syncs.borrow_mut().push((command, received));
        done.complete(0);
    }
}

/// Accepts commands, records polls with the clock value seen
pub struct Poller<'a> {
    pub probe: &'a Probe,
    pub clock: &'a ManualClock,
}

impl Device for Poller<'_> {
    fn on_command(&mut self, command: CommandByte, payload: &[u8], done: &dyn Completion) {
        self.probe.commands.borrow_mut().push((command, payload.to_vec()));
        done.complete(0);
    }

    fn on_polling(&mut self, device: DeviceId, _done: &dyn Completion) {
        self.probe.polls.borrow_mut().push((device, self.clock.now().raw()));
    }
}

/// Completes each command on the next poll instead of in the callback
pub struct Deferred<'a> {
    pub probe: &'a Probe,
    pub outstanding: bool,
}

impl Device for Deferred<'_> {
    fn on_command(&mut self, command: CommandByte, payload: &[u8], _done: &dyn Completion) {
        self.probe.commands.borrow_mut().push((command, payload.to_vec()));
        self.outstanding = true;
    }

    fn on_polling(&mut self, device: DeviceId, done: &dyn Completion) {
        self.probe.polls.borrow_mut().push((device, 0));
        if self.outstanding {
            self.outstanding = false;
            done.complete(Status::FAIL.bits() | 0x0F);
        }
    }
}

/// Never completes anything
pub struct Stuck<'a> {
    pub probe: &'a Probe,
}

impl Device for Stuck<'_> {
    fn on_command(&mut self, command: CommandByte, payload: &[u8], _done: &dyn Completion) {
        self.probe.commands.borrow_mut().push((command, payload.to_vec()));
    }
}
