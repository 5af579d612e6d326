//! Simulated bus master
//!
//! Replays the interrupt event sequence a real peripheral produces, so the
//! whole engine can run on the host. On a read the peripheral always loads
//! one byte more than the master clocks out; [`Master::read`] reproduces
//! that.

use vbus_core::{CommandByte, CommandHeader, Direction, ResponseHeader, RESPONSE_HEADER_LEN};
use vbus_sync::CriticalSection;

use crate::{Bus, BusHardware};

/// Response of a simulated read: decoded header plus raw payload bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response<const N: usize> {
    pub header: ResponseHeader,
    pub payload: heapless::Vec<u8, N>,
}

/// Bus master driving a [`Bus`] through its interrupt entry points
pub struct Master<'b, 'a, H, C, const RX: usize> {
    bus: &'b Bus<'a, H, C, RX>,
}

impl<'b, 'a, H: BusHardware, C: CriticalSection, const RX: usize> Master<'b, 'a, H, C, RX> {
    pub fn new(bus: &'b Bus<'a, H, C, RX>) -> Self {
        Self { bus }
    }

    /// Raw write transaction
    pub fn write(&self, bytes: &[u8]) {
        self.bus.on_address(Direction::Receive);
        for &b in bytes {
            self.bus.on_receive(b);
        }
        self.bus.on_stop();
    }

    /// Write a framed command with a correct checksum
    pub fn command(&self, command: CommandByte, payload: &[u8]) {
        let header = CommandHeader::for_payload(command, payload);
        self.bus.on_address(Direction::Receive);
        for b in header.to_bytes().into_iter().chain(payload.iter().copied()) {
            self.bus.on_receive(b);
        }
        self.bus.on_stop();
    }

    /// Selection-only write
    pub fn select(&self, command: CommandByte) {
        self.write(&[command.raw()]);
    }

    /// Raw read transaction of `len` bytes, header included; `N` bounds the
    /// whole transfer
    pub fn read<const N: usize>(&self, len: usize) -> heapless::Vec<u8, N> {
        let mut out = heapless::Vec::new();
        self.bus.on_address(Direction::Transmit);
        for _ in 0..len {
            let byte = self.bus.next_transmit();
            let _ = out.push(byte);
        }
        // byte latched in the data register when the master stops
        self.bus.next_transmit();
        self.bus.on_stop();
        out
    }

    /// Read the response header and `payload_len` payload bytes; `N` bounds
    /// header plus payload
    pub fn query<const N: usize>(&self, payload_len: usize) -> Response<N> {
        let raw: heapless::Vec<u8, N> = self.read(RESPONSE_HEADER_LEN + payload_len);
        let mut header = [0u8; RESPONSE_HEADER_LEN];
        for (dst, src) in header.iter_mut().zip(raw.iter()) {
            *dst = *src;
        }
        let payload = raw.iter().skip(RESPONSE_HEADER_LEN).copied().collect();
        Response {
            header: ResponseHeader::from_bytes(header),
            payload,
        }
    }

    /// Read only the response header
    pub fn status(&self) -> ResponseHeader {
        self.query::<RESPONSE_HEADER_LEN>(0).header
    }

    /// Read the header, then re-read with exactly the advertised length
    pub fn fetch<const N: usize>(&self) -> Response<N> {
        let header = self.status();
        self.query(usize::from(header.length))
    }
}
