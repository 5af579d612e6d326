//! Device registry, event dispatch and polling

use vbus_core::{CommandByte, DeviceId, Status, Tick, VbusError, VbusResult};
use vbus_sync::CriticalSection;

use crate::{Bus, BusHardware, Completion, Device, Event, PayloadSource};

/// Everything needed to register one virtual device
pub struct DeviceEntry<'a> {
    pub id: DeviceId,
    pub source: PayloadSource<'a>,
    /// Ticks between [`Device::on_polling`] calls; `None` disables polling
    pub polling_period: Option<u64>,
    /// Deliver selection-only writes to [`Device::on_sync`]
    pub notify_sync: bool,
    pub device: &'a mut dyn Device,
}

impl<'a> DeviceEntry<'a> {
    pub fn new(id: DeviceId, source: PayloadSource<'a>, device: &'a mut dyn Device) -> Self {
        Self {
            id,
            source,
            polling_period: None,
            notify_sync: false,
            device,
        }
    }

    pub fn with_polling(mut self, period: u64) -> Self {
        self.polling_period = Some(period).filter(|&p| p > 0);
        self
    }

    pub fn with_sync(mut self) -> Self {
        self.notify_sync = true;
        self
    }
}

struct Slot<'a> {
    device: &'a mut dyn Device,
    source: PayloadSource<'a>,
    period: Option<u64>,
    deadline: Option<Tick>,
    /// The deadline wrapped past the end of the clock; skip until the clock
    /// wraps too
    overrun: bool,
}

impl Slot<'_> {
    fn schedule(&mut self, now: Tick, period: u64) {
        let next = now.wrapping_add(period);
        self.deadline = Some(next);
        self.overrun = next <= now;
    }
}

/// Fixed table of up to `D` devices indexed by device id
pub struct Registry<'a, const D: usize> {
    slots: [Option<Slot<'a>>; D],
    last_poll: Option<Tick>,
}

impl<'a, const D: usize> Registry<'a, D> {
    pub fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| None),
            last_poll: None,
        }
    }

    /// Register a device and attach its payload source to `bus`
    pub fn register<H, C, const RX: usize>(
        &mut self,
        bus: &Bus<'a, H, C, RX>,
        entry: DeviceEntry<'a>,
    ) -> VbusResult<()>
    where
        H: BusHardware,
        C: CriticalSection,
    {
        let slot = self
            .slots
            .get_mut(entry.id.index())
            .ok_or(VbusError::InvalidDevice)?;
        if slot.is_some() {
            return Err(VbusError::DuplicateDevice);
        }

        bus.attach(entry.id, entry.source, entry.notify_sync);
        *slot = Some(Slot {
            device: entry.device,
            source: entry.source,
            period: entry.polling_period,
            deadline: None,
            overrun: false,
        });
        Ok(())
    }

    pub fn contains(&self, id: DeviceId) -> bool {
        matches!(self.slots.get(id.index()), Some(Some(_)))
    }

    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot_mut(&mut self, id: DeviceId) -> Option<&mut Slot<'a>> {
        self.slots.get_mut(id.index()).and_then(Option::as_mut)
    }

    /// Route a command to its device
    ///
    /// An unknown device is completed with `FAIL` so the bus never wedges.
    pub fn dispatch_command(&mut self, command: CommandByte, payload: &[u8], done: &dyn Completion) {
        match self.slot_mut(command.device()) {
            Some(slot) => slot.device.on_command(command, payload, done),
            None => done.complete(Status::FAIL.bits()),
        }
    }

    /// Route a read completion, consuming `len` bytes of a ring source first
    pub fn dispatch_read_done(&mut self, device: DeviceId, len: usize, done: &dyn Completion) {
        match self.slot_mut(device) {
            Some(slot) => {
                if let Some(ring) = slot.source.ring() {
                    ring.stop_read(len);
                }
                slot.device.on_read_done(device, len, done);
            }
            None => done.complete(Status::FAIL.bits()),
        }
    }

    pub fn dispatch_sync(&mut self, command: CommandByte, received: usize, done: &dyn Completion) {
        match self.slot_mut(command.device()) {
            Some(slot) => slot.device.on_sync(command, received, done),
            None => done.complete(Status::FAIL.bits()),
        }
    }

    /// Route any event taken from the bus
    pub fn dispatch<const RX: usize>(&mut self, event: Event<RX>, done: &dyn Completion) {
        match event {
            Event::Command { command, payload } => self.dispatch_command(command, &payload, done),
            Event::ReadDone { device, len } => self.dispatch_read_done(device, len, done),
            Event::Sync { command, received } => self.dispatch_sync(command, received, done),
        }
    }

    /// Call `on_polling` for every device whose deadline has passed
    ///
    /// The first call only schedules. A clock smaller than on the previous
    /// call is a wraparound and re-enables devices whose deadline wrapped.
    pub fn poll_devices(&mut self, now: Tick, done: &dyn Completion) {
        if matches!(self.last_poll, Some(last) if now < last) {
            for slot in self.slots.iter_mut().flatten() {
                slot.overrun = false;
            }
        }

        for (index, slot) in self.slots.iter_mut().enumerate() {
            let Some(slot) = slot else { continue };
            let Some(period) = slot.period else { continue };
            match slot.deadline {
                None => slot.schedule(now, period),
                Some(deadline) if !slot.overrun && deadline <= now => {
                    if let Some(id) = DeviceId::new(index as u8) {
                        slot.device.on_polling(id, done);
                    }
                    slot.schedule(now, period);
                }
                Some(_) => {}
            }
        }

        self.last_poll = Some(now);
    }
}

impl<const D: usize> Default for Registry<'_, D> {
    fn default() -> Self {
        Self::new()
    }
}
