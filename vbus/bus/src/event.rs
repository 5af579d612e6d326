//! Deferred foreground events

use vbus_core::{CommandByte, DeviceId};

/// Work left by the bus engine for the foreground loop
///
/// At most one event is pending per bus; the engine gates every further
/// transaction with the busy flag until the device completes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event<const RX: usize> {
    /// A command passed length and checksum validation
    Command {
        command: CommandByte,
        payload: heapless::Vec<u8, RX>,
    },
    /// The master read `len` payload bytes of `device`
    ReadDone { device: DeviceId, len: usize },
    /// A write shorter than a command header selected a device
    Sync { command: CommandByte, received: usize },
}

impl<const RX: usize> Event<RX> {
    /// Device the event is addressed to
    pub fn device(&self) -> DeviceId {
        match self {
            Event::Command { command, .. } => command.device(),
            Event::ReadDone { device, .. } => *device,
            Event::Sync { command, .. } => command.device(),
        }
    }
}

#[cfg(feature = "defmt")]
impl<const RX: usize> defmt::Format for Event<RX> {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Event::Command { command, payload } => {
                defmt::write!(fmt, "Command({}, {} bytes)", command, payload.len())
            }
            Event::ReadDone { device, len } => defmt::write!(fmt, "ReadDone({}, {})", device, len),
            Event::Sync { command, received } => defmt::write!(fmt, "Sync({}, {})", command, received),
        }
    }
}

/// Pending event as kept by the engine; the command payload stays in the
/// receive buffer until the event is taken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Pending {
    Command { command: CommandByte, len: usize },
    ReadDone { device: DeviceId, len: usize },
    Sync { command: CommandByte, received: usize },
}
