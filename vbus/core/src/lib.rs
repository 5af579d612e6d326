#![no_std]
#![forbid(unsafe_code)]

//! # vbus Core
//!
//! Types shared by every layer of the vbus firmware core: the byte-level wire
//! protocol spoken with the bus master, the status flags reported back to it,
//! the XOR checksum, tick/clock types and the framework error type.

#[cfg(feature = "std")]
extern crate std;

use core::fmt;

pub mod crc;
pub mod protocol;
pub mod time;

pub use crc::*;
pub use protocol::*;
pub use time::*;

/// vbus core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Result type used throughout the vbus crates
pub type VbusResult<T> = Result<T, VbusError>;

/// Error types for vbus operations
///
/// Only configuration and registration paths return these. Protocol-level
/// failures are never Rust errors; they travel to the host as [`Status`] bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VbusError {
    /// Device id is outside the addressable range or the registry size
    InvalidDevice,
    /// A device with this id has already been registered
    DuplicateDevice,
    /// Buffer has no room for the requested operation
    Overflow,
    /// Invalid buffer or registry configuration
    InvalidConfig,
}

impl fmt::Display for VbusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VbusError::InvalidDevice => write!(f, "Invalid device id"),
            VbusError::DuplicateDevice => write!(f, "Device id already registered"),
            VbusError::Overflow => write!(f, "Buffer overflow"),
            VbusError::InvalidConfig => write!(f, "Invalid configuration"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for VbusError {}

#[cfg(feature = "defmt")]
impl defmt::Format for VbusError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            VbusError::InvalidDevice => defmt::write!(fmt, "InvalidDevice"),
            VbusError::DuplicateDevice => defmt::write!(fmt, "DuplicateDevice"),
            VbusError::Overflow => defmt::write!(fmt, "Overflow"),
            VbusError::InvalidConfig => defmt::write!(fmt, "InvalidConfig"),
        }
    }
}
