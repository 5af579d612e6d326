//! Bus transaction state machine
//!
//! The engine only holds state; it never touches payload sources. The
//! [`Bus`](crate::Bus) wrapper runs each transition under its critical
//! section and performs source I/O between transitions, so ring buffers take
//! their own critical sections without nesting.
//!
//! ```text
//! Idle --address(rx)--> Receiving    --stop/error--> Idle
//! Idle --address(tx)--> Transmitting --stop/error--> Idle
//! ```
//!
//! The address event carries the direction, so the addressed state is left
//! in the same step. A new address event while a transaction is open
//! (repeated start) first finishes the open one.

use vbus_core::{
    CommandByte, CommandHeader, DeviceId, ResponseHeader, Status, XorCrc, COMMAND_CRC_OFFSET,
    COMMAND_HEADER_LEN, FILLER_BYTE, MAX_DEVICES, RESPONSE_HEADER_LEN,
};

use crate::{BusStats, Event, PayloadSource, Pending};

#[derive(Debug, Clone, Copy)]
pub(crate) struct Attached<'a> {
    pub source: PayloadSource<'a>,
    pub notify_sync: bool,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Receive {
    /// Bytes accepted, header included
    total: usize,
    /// Payload bytes stored in the receive buffer
    data_len: usize,
    /// The bus was busy at address time; every byte is ignored
    gated: bool,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Transmit<'a> {
    response: [u8; RESPONSE_HEADER_LEN],
    source: Option<PayloadSource<'a>>,
    /// Payload length advertised in the response header
    length: usize,
    /// Bytes handed to the hardware, including the one latched at stop
    total: usize,
    /// Payload bytes handed to the hardware
    device_pos: usize,
    last: u8,
    last_was_payload: bool,
    /// Flags sent in the response header
    status: Status,
    gated: bool,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Phase<'a> {
    Idle,
    Receiving(Receive),
    Transmitting(Transmit<'a>),
}

/// Snapshot taken under the lock to prepare a read
#[derive(Debug, Clone, Copy)]
pub(crate) struct ReadPlan<'a> {
    pub device: DeviceId,
    pub source: Option<PayloadSource<'a>>,
}

/// What the next transmitted byte is
#[derive(Clone, Copy)]
pub(crate) enum TxStep<'a> {
    Byte(u8),
    Linear(&'a dyn vbus_ring::LinearSource, usize),
    Ring(&'a dyn vbus_ring::RingReader),
}

pub(crate) struct Engine<'a, const RX: usize> {
    devices: [Option<Attached<'a>>; MAX_DEVICES],
    phase: Phase<'a>,
    /// Selected by the command byte of the last accepted write
    selected: DeviceId,
    /// Running checksum; its final value is the next read's preload byte
    crc: XorCrc,
    /// Global communication status reported by reads
    status: Status,
    /// Device whose event is waiting for completion
    busy: Option<DeviceId>,
    pending: Option<Pending>,
    header: [u8; COMMAND_HEADER_LEN],
    rx: [u8; RX],
    pub stats: BusStats,
}

impl<'a, const RX: usize> Engine<'a, RX> {
    pub const fn new() -> Self {
        Self {
            devices: [None; MAX_DEVICES],
            phase: Phase::Idle,
            selected: DeviceId::from_command(0),
            crc: XorCrc::new(),
            status: Status::empty(),
            busy: None,
            pending: None,
            header: [0; COMMAND_HEADER_LEN],
            rx: [0; RX],
            stats: BusStats::new(),
        }
    }

    pub fn attach(&mut self, device: DeviceId, attached: Attached<'a>) {
        self.devices[device.index()] = Some(attached);
    }

    pub fn busy(&self) -> Option<DeviceId> {
        self.busy
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn selected(&self) -> DeviceId {
        self.selected
    }

    /// Start receiving a write
    pub fn begin_receive(&mut self) {
        let gated = self.busy.is_some();
        self.stats.transactions = self.stats.transactions.wrapping_add(1);
        if gated {
            self.stats.busy_rejects = self.stats.busy_rejects.wrapping_add(1);
        } else {
            self.status = Status::empty();
        }
        self.crc.reset();
        self.phase = Phase::Receiving(Receive {
            total: 0,
            data_len: 0,
            gated,
        });
    }

    pub fn receive(&mut self, byte: u8) {
        let Phase::Receiving(rx) = &mut self.phase else {
            return;
        };
        if rx.gated {
            return;
        }

        if rx.total < COMMAND_HEADER_LEN {
            if rx.total == 0 {
                self.selected = DeviceId::from_command(byte);
            }
            if rx.total != COMMAND_CRC_OFFSET {
                self.crc.update(byte);
            }
            self.header[rx.total] = byte;
            rx.total += 1;
        } else if rx.data_len < RX {
            self.rx[rx.data_len] = byte;
            rx.data_len += 1;
            rx.total += 1;
            self.crc.update(byte);
        } else {
            if !self.status.contains(Status::FAIL) {
                self.stats.rx_overruns = self.stats.rx_overruns.wrapping_add(1);
            }
            self.status |= Status::FAIL;
        }
    }

    /// Snapshot what a read of the selected device needs
    pub fn read_plan(&self) -> ReadPlan<'a> {
        ReadPlan {
            device: self.selected,
            source: self.devices[self.selected.index()].map(|a| a.source),
        }
    }

    /// Start transmitting; `length` and `overflow` come from the source
    pub fn begin_transmit(&mut self, plan: ReadPlan<'a>, length: usize, overflow: bool) {
        let gated = self.busy.is_some();
        let mut status = self.status;
        if gated {
            status |= Status::BUSY;
        }
        if overflow {
            status |= Status::OVERFLOW;
        }
        let length = match plan.source {
            Some(_) => length.min(u16::MAX as usize),
            None => {
                status |= Status::FAIL;
                0
            }
        };

        let header = ResponseHeader::new(self.crc.value(), status, plan.device, length as u16);
        self.crc.reset();
        self.stats.transactions = self.stats.transactions.wrapping_add(1);
        self.phase = Phase::Transmitting(Transmit {
            response: header.to_bytes(),
            source: plan.source,
            length,
            total: 0,
            device_pos: 0,
            last: 0,
            last_was_payload: false,
            status,
            gated,
        });
    }

    /// Decide where the next transmitted byte comes from
    pub fn transmit_step(&self) -> TxStep<'a> {
        let Phase::Transmitting(tx) = &self.phase else {
            return TxStep::Byte(FILLER_BYTE);
        };
        if tx.total < RESPONSE_HEADER_LEN {
            return TxStep::Byte(tx.response[tx.total]);
        }
        match tx.source {
            Some(PayloadSource::Linear(src)) if tx.device_pos < tx.length => {
                TxStep::Linear(src, tx.device_pos)
            }
            Some(PayloadSource::Ring(ring)) if tx.device_pos < tx.length => TxStep::Ring(ring),
            _ => TxStep::Byte(FILLER_BYTE),
        }
    }

    /// Account for a byte handed to the hardware
    pub fn record_transmit(&mut self, byte: u8, payload: bool) {
        let Phase::Transmitting(tx) = &mut self.phase else {
            return;
        };
        tx.total += 1;
        if payload {
            tx.device_pos += 1;
        }
        tx.last = byte;
        tx.last_was_payload = payload;
        self.crc.update(byte);
    }

    /// Close the open transaction (stop, error or repeated start)
    ///
    /// Returns `true` when the bus should be re-armed right away, `false`
    /// when an event was armed or the bus is busy.
    pub fn finish(&mut self) -> bool {
        match core::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Idle => false,
            Phase::Receiving(rx) => self.finish_receive(rx),
            Phase::Transmitting(tx) => self.finish_transmit(tx),
        }
    }

    fn finish_receive(&mut self, rx: Receive) -> bool {
        if rx.gated {
            return false;
        }
        if rx.total < COMMAND_HEADER_LEN {
            // an empty write addresses the device selected earlier
            let command = if rx.total == 0 {
                CommandByte::new(self.selected, 0)
            } else {
                CommandByte(self.header[0])
            };
            return match self.devices[command.device().index()] {
                Some(attached) if attached.notify_sync => {
                    self.stats.syncs = self.stats.syncs.wrapping_add(1);
                    self.arm(
                        command.device(),
                        Pending::Sync {
                            command,
                            received: rx.total,
                        },
                    )
                }
                _ => true,
            };
        }

        let command = CommandByte(self.header[0]);
        let header = CommandHeader::from_bytes(self.header);
        if usize::from(header.length) != rx.data_len {
            self.status |= Status::FAIL;
            self.stats.length_errors = self.stats.length_errors.wrapping_add(1);
            #[cfg(feature = "defmt")]
            defmt::warn!("length mismatch: declared {} received {}", header.length, rx.data_len);
        }
        if header.control_crc != self.crc.value() {
            self.status |= Status::CRC;
            self.stats.crc_errors = self.stats.crc_errors.wrapping_add(1);
            #[cfg(feature = "defmt")]
            defmt::warn!("crc mismatch: {=u8:#x} != {=u8:#x}", header.control_crc, self.crc.value());
        }
        if self.status.intersects(Status::FAIL | Status::CRC) {
            return true;
        }

        if self.devices[command.device().index()].is_none() {
            self.status |= Status::FAIL;
            self.stats.unknown_device = self.stats.unknown_device.wrapping_add(1);
            return true;
        }

        self.stats.commands = self.stats.commands.wrapping_add(1);
        self.arm(
            command.device(),
            Pending::Command {
                command,
                len: rx.data_len,
            },
        )
    }

    fn finish_transmit(&mut self, mut tx: Transmit<'a>) -> bool {
        // The hardware always holds one more byte than the master clocked out
        if tx.total > 0 {
            tx.total -= 1;
            self.crc.update(tx.last);
            if tx.last_was_payload {
                tx.device_pos -= 1;
            }
        }

        if tx.gated {
            return false;
        }
        if tx.device_pos == 0 || tx.source.is_none() {
            return true;
        }
        // the host was told the exchange failed and will read again
        if tx.status.intersects(Status::FAIL | Status::CRC) {
            return true;
        }

        self.stats.reads = self.stats.reads.wrapping_add(1);
        self.arm(
            self.selected,
            Pending::ReadDone {
                device: self.selected,
                len: tx.device_pos,
            },
        )
    }

    fn arm(&mut self, device: DeviceId, pending: Pending) -> bool {
        #[cfg(feature = "defmt")]
        defmt::debug!("armed event for {}", device);
        self.busy = Some(device);
        self.pending = Some(pending);
        false
    }

    /// Hand the pending event to the foreground
    pub fn take_event(&mut self) -> Option<Event<RX>> {
        let event = match self.pending.take()? {
            Pending::Command { command, len } => {
                let mut payload = heapless::Vec::new();
                // len never exceeds RX
                let _ = payload.extend_from_slice(&self.rx[..len]);
                Event::Command { command, payload }
            }
            Pending::ReadDone { device, len } => Event::ReadDone { device, len },
            Pending::Sync { command, received } => Event::Sync { command, received },
        };
        Some(event)
    }

    /// Completion primitive
    ///
    /// Returns whether a command was actually outstanding and whether the bus
    /// should be re-armed.
    pub fn complete(&mut self, status: u8) -> (bool, bool) {
        let was_busy = self.busy.take().is_some();
        self.status |= Status::from_wire(status);
        (was_busy, self.pending.is_none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vbus_ring::LinearBuffer;

    fn feed<const RX: usize>(engine: &mut Engine<'_, RX>, bytes: &[u8]) -> bool {
        engine.begin_receive();
        for &b in bytes {
            engine.receive(b);
        }
        engine.finish()
    }

    #[test]
    fn test_command_without_device_fails() {
        let mut engine = Engine::<8>::new();
        let header = CommandHeader::for_payload(CommandByte(0x02), &[]);
        assert!(feed(&mut engine, &header.to_bytes()));
        assert!(engine.status().contains(Status::FAIL));
        assert!(engine.take_event().is_none());
        assert_eq!(engine.stats.unknown_device, 1);
    }

    #[test]
    fn test_valid_command_arms_event() {
        static LINEAR: LinearBuffer<4> = LinearBuffer::new();
        let dev = DeviceId::new(2).unwrap();
        let mut engine = Engine::<8>::new();
        engine.attach(
            dev,
            Attached {
                source: PayloadSource::Linear(&LINEAR),
                notify_sync: false,
            },
        );

        let header = CommandHeader::for_payload(CommandByte(0x12), &[7, 8]);
        let mut frame = [0u8; 6];
        frame[..4].copy_from_slice(&header.to_bytes());
        frame[4..].copy_from_slice(&[7, 8]);
        assert!(!feed(&mut engine, &frame));
        assert_eq!(engine.busy(), Some(dev));

        match engine.take_event() {
            Some(Event::Command { command, payload }) => {
                assert_eq!(command, CommandByte(0x12));
                assert_eq!(&payload[..], &[7, 8]);
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(engine.complete(0), (true, true));
        assert_eq!(engine.busy(), None);
    }

    #[test]
    fn test_receive_overrun_sets_fail() {
        static LINEAR: LinearBuffer<4> = LinearBuffer::new();
        let mut engine = Engine::<2>::new();
        engine.attach(
            DeviceId::from_command(1),
            Attached {
                source: PayloadSource::Linear(&LINEAR),
                notify_sync: false,
            },
        );
        let payload = [1, 2, 3];
        let header = CommandHeader::for_payload(CommandByte(0x01), &payload);
        engine.begin_receive();
        for b in header.to_bytes().into_iter().chain(payload) {
            engine.receive(b);
        }
        assert!(engine.finish());
        assert!(engine.status().contains(Status::FAIL));
        assert_eq!(engine.stats.rx_overruns, 1);
        assert_eq!(engine.stats.length_errors, 1);
    }

    #[test]
    fn test_empty_write_syncs_selected_device() {
        static LINEAR: LinearBuffer<4> = LinearBuffer::new();
        let dev = DeviceId::from_command(4);
        let mut engine = Engine::<4>::new();
        engine.attach(
            dev,
            Attached {
                source: PayloadSource::Linear(&LINEAR),
                notify_sync: true,
            },
        );

        // selection write, then address and stop with no bytes
        assert!(!feed(&mut engine, &[0x24]));
        engine.take_event();
        engine.complete(0);
        assert!(!feed(&mut engine, &[]));
        assert_eq!(
            engine.take_event(),
            Some(Event::Sync {
                command: CommandByte::new(dev, 0),
                received: 0,
            })
        );
    }

    #[test]
    fn test_empty_write_without_sync_rearms() {
        let mut engine = Engine::<4>::new();
        assert!(feed(&mut engine, &[]));
        assert!(engine.take_event().is_none());
    }

    #[test]
    fn test_stray_stop_is_ignored() {
        let mut engine = Engine::<4>::new();
        assert!(!engine.finish());
        assert_eq!(engine.stats.transactions, 0);
    }
}
