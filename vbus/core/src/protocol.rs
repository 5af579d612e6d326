//! Wire protocol types shared with the bus master
//!
//! Every write from the master starts with a [`CommandHeader`]; every read
//! returns a [`ResponseHeader`] whose first byte is the checksum of the
//! previous transaction. Multi-byte fields are little-endian.

use core::fmt;

use crate::{VbusError, VbusResult, XorCrc};

/// Number of addressable virtual devices
pub const MAX_DEVICES: usize = 16;

/// Bits of the command byte carrying the device id
pub const DEVICE_ID_MASK: u8 = 0x0F;

/// Bits of the command byte carrying device specific opcode flags
pub const COMMAND_FLAGS_MASK: u8 = !DEVICE_ID_MASK;

/// Byte clocked out once the advertised payload is exhausted
pub const FILLER_BYTE: u8 = 0xBB;

/// Size of the command header on the wire
pub const COMMAND_HEADER_LEN: usize = 4;

/// Size of the response header on the wire, preload byte included
pub const RESPONSE_HEADER_LEN: usize = 4;

/// Offset of the checksum inside the command header
pub const COMMAND_CRC_OFFSET: usize = 3;

/// Default capacity of the shared receive buffer
pub const DEFAULT_RX_CAPACITY: usize = 128;

bitflags::bitflags! {
    /// Communication status bits reported in the response header
    ///
    /// The low nibble of the status byte on the wire carries the addressed
    /// device id, so only the high nibble is available for flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Status: u8 {
        /// A command is pending foreground handling; nothing new is accepted
        const BUSY = 0x80;
        /// Protocol or device level failure
        const FAIL = 0x40;
        /// Checksum mismatch on the last command
        const CRC = 0x20;
        /// The device ring buffer overflowed since it was last acknowledged
        const OVERFLOW = 0x10;
    }
}

impl Status {
    /// Status byte as sent on the wire for `device`
    pub const fn wire_byte(self, device: DeviceId) -> u8 {
        (self.bits() & COMMAND_FLAGS_MASK) | device.raw()
    }

    /// Decode the flag part of a wire status byte
    pub const fn from_wire(byte: u8) -> Self {
        Self::from_bits_truncate(byte & COMMAND_FLAGS_MASK)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Status {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "Status({=u8:#x})", self.bits());
    }
}

/// Identifier of a virtual device (low nibble of the command byte)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceId(u8);

impl DeviceId {
    /// Create a device id, rejecting values outside the addressable range
    pub const fn new(raw: u8) -> Option<Self> {
        if raw <= DEVICE_ID_MASK {
            Some(Self(raw))
        } else {
            None
        }
    }

    /// Device id addressed by a command byte
    pub const fn from_command(byte: u8) -> Self {
        Self(byte & DEVICE_ID_MASK)
    }

    /// Raw id value
    pub const fn raw(self) -> u8 {
        self.0
    }

    /// Table index for this id
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dev{}", self.0)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for DeviceId {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "dev{}", self.0);
    }
}

/// First byte of every command: device id plus device specific flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandByte(pub u8);

impl CommandByte {
    /// Build a command byte from a device id and opcode flags
    pub const fn new(device: DeviceId, flags: u8) -> Self {
        Self((flags & COMMAND_FLAGS_MASK) | device.raw())
    }

    /// Addressed device
    pub const fn device(self) -> DeviceId {
        DeviceId::from_command(self.0)
    }

    /// Device specific opcode flags (high nibble, unshifted)
    pub const fn flags(self) -> u8 {
        self.0 & COMMAND_FLAGS_MASK
    }

    /// Check whether all bits of `flag` are set
    pub const fn has_flag(self, flag: u8) -> bool {
        self.flags() & flag == flag & COMMAND_FLAGS_MASK
    }

    /// Raw byte value
    pub const fn raw(self) -> u8 {
        self.0
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for CommandByte {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "Cmd({=u8:#x})", self.0);
    }
}

/// Direction of a bus transaction as seen from the firmware
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// The master writes, the firmware receives
    Receive,
    /// The master reads, the firmware transmits
    Transmit,
}

#[cfg(feature = "defmt")]
impl defmt::Format for Direction {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Direction::Receive => defmt::write!(fmt, "Receive"),
            Direction::Transmit => defmt::write!(fmt, "Transmit"),
        }
    }
}

/// Header preceding every command payload (host to firmware)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandHeader {
    pub command: CommandByte,
    /// Declared payload length
    pub length: u16,
    /// XOR of every header and payload byte except this one
    pub control_crc: u8,
}

impl CommandHeader {
    /// Build a header for `payload`, computing its checksum
    ///
    /// # Panics
    ///
    /// In debug builds, if `payload` is longer than the `u16` length field
    /// can declare. Use [`CommandHeader::try_for_payload`] when the length
    /// is not known to fit.
    pub fn for_payload(command: CommandByte, payload: &[u8]) -> Self {
        debug_assert!(
            payload.len() <= usize::from(u16::MAX),
            "payload longer than a command can declare"
        );
        Self::framed(command, payload, payload.len() as u16)
    }

    /// Build a header for `payload`; `Overflow` if it cannot be declared
    pub fn try_for_payload(command: CommandByte, payload: &[u8]) -> VbusResult<Self> {
        let length = u16::try_from(payload.len()).map_err(|_| VbusError::Overflow)?;
        Ok(Self::framed(command, payload, length))
    }

    fn framed(command: CommandByte, payload: &[u8], length: u16) -> Self {
        let [lo, hi] = length.to_le_bytes();
        let mut crc = XorCrc::new();
        crc.update(command.raw());
        crc.update(lo);
        crc.update(hi);
        crc.update_slice(payload);
        Self {
            command,
            length,
            control_crc: crc.value(),
        }
    }

    /// Decode from wire order
    pub const fn from_bytes(bytes: [u8; COMMAND_HEADER_LEN]) -> Self {
        Self {
            command: CommandByte(bytes[0]),
            length: u16::from_le_bytes([bytes[1], bytes[2]]),
            control_crc: bytes[COMMAND_CRC_OFFSET],
        }
    }

    /// Encode in wire order
    pub const fn to_bytes(self) -> [u8; COMMAND_HEADER_LEN] {
        let [lo, hi] = self.length.to_le_bytes();
        [self.command.0, lo, hi, self.control_crc]
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for CommandHeader {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(
            fmt,
            "CommandHeader{{ cmd: {}, len: {}, crc: {=u8:#x} }}",
            self.command,
            self.length,
            self.control_crc
        );
    }
}

/// Header preceding every response payload (firmware to host)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHeader {
    /// Checksum of the previous transaction, preloaded into the shift register
    pub last_crc: u8,
    /// Status flags ORed with the addressed device id
    pub status: u8,
    /// Payload bytes available when the read started
    pub length: u16,
}

impl ResponseHeader {
    pub const fn new(last_crc: u8, status: Status, device: DeviceId, length: u16) -> Self {
        Self {
            last_crc,
            status: status.wire_byte(device),
            length,
        }
    }

    /// Status flags without the device id
    pub const fn flags(&self) -> Status {
        Status::from_wire(self.status)
    }

    /// Device id echoed in the status byte
    pub const fn device(&self) -> DeviceId {
        DeviceId::from_command(self.status)
    }

    /// Decode from wire order
    pub const fn from_bytes(bytes: [u8; RESPONSE_HEADER_LEN]) -> Self {
        Self {
            last_crc: bytes[0],
            status: bytes[1],
            length: u16::from_le_bytes([bytes[2], bytes[3]]),
        }
    }

    /// Encode in wire order
    pub const fn to_bytes(self) -> [u8; RESPONSE_HEADER_LEN] {
        let [lo, hi] = self.length.to_le_bytes();
        [self.last_crc, self.status, lo, hi]
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ResponseHeader {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(
            fmt,
            "ResponseHeader{{ last_crc: {=u8:#x}, status: {=u8:#x}, len: {} }}",
            self.last_crc,
            self.status,
            self.length
        );
    }
}
