//! Virtual device interface

use vbus_core::{CommandByte, DeviceId};
use vbus_ring::{LinearSource, RingReader};

/// Completion primitive handed to every device callback
///
/// A device must call [`Completion::complete`] exactly once per accepted
/// command, read completion or sync, either before the callback returns or
/// later (e.g. from [`Device::on_polling`]). Until it does, the bus answers
/// every transaction with the busy flag set.
pub trait Completion {
    /// Report `status` (only the flag bits are used) and release the bus
    fn complete(&self, status: u8);
}

/// Where the bus engine takes a device's read payload from
#[derive(Clone, Copy)]
pub enum PayloadSource<'a> {
    /// Flat buffer with an advertised length
    Linear(&'a dyn LinearSource),
    /// Ring buffer drained in restartable passes
    Ring(&'a dyn RingReader),
}

impl<'a> PayloadSource<'a> {
    /// Ring reader, if this source is one
    pub fn ring(&self) -> Option<&'a dyn RingReader> {
        match *self {
            PayloadSource::Ring(ring) => Some(ring),
            PayloadSource::Linear(_) => None,
        }
    }
}

impl core::fmt::Debug for PayloadSource<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            PayloadSource::Linear(src) => write!(f, "Linear({} bytes)", src.available()),
            PayloadSource::Ring(ring) => write!(f, "Ring({} bytes)", ring.total_len()),
        }
    }
}

/// Device logic driven from the foreground loop
///
/// Callbacks never run inside a critical section and never run
/// concurrently with each other.
pub trait Device {
    /// A checksummed command addressed to this device arrived
    fn on_command(&mut self, command: CommandByte, payload: &[u8], done: &dyn Completion);

    /// The master read `len` payload bytes; ring sources are already
    /// advanced by `len` when this runs
    fn on_read_done(&mut self, device: DeviceId, len: usize, done: &dyn Completion) {
        let _ = (device, len);
        done.complete(0);
    }

    /// A write shorter than a command header selected this device
    fn on_sync(&mut self, command: CommandByte, received: usize, done: &dyn Completion) {
        let _ = (command, received);
        done.complete(0);
    }

    /// Periodic hook for devices registered with a polling period
    ///
    /// `done` completes a command deferred from an earlier callback.
    fn on_polling(&mut self, device: DeviceId, done: &dyn Completion) {
        let _ = (device, done);
    }
}
