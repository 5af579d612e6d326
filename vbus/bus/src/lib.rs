#![no_std]

//! # vbus Bus
//!
//! The multiplexing core of the firmware: one bus slave peripheral shared by
//! up to sixteen virtual devices.
//!
//! - [`Bus`]: interrupt-driven transaction engine (framing, checksum, device
//!   selection, busy gating, one-deep event slot)
//! - [`Registry`]: device table, event dispatch and periodic polling
//! - [`Scheduler`]: the foreground loop tying both together
//!
//! ## Example
//!
//! ```rust,ignore
//! static BUS: Bus<'static, Pins, IrqFree> = Bus::new(Pins, IrqFree);
//!
//! #[interrupt]
//! fn I2C1_EV() {
//!     // translate peripheral flags into BUS.on_address / on_receive /
//!     // next_transmit / on_stop
//! }
//!
//! let mut registry = Registry::<16>::new();
//! registry.register(&BUS, DeviceEntry::new(id, PayloadSource::Ring(&ADC_RING), adc))?;
//! Scheduler::new(&BUS, registry, &TICKS).run();
//! ```

pub mod bus;
pub mod device;
pub mod event;
pub mod registry;
pub mod scheduler;
pub mod stats;

mod engine;

#[cfg(feature = "sim")]
pub mod sim;

pub use bus::*;
pub use device::*;
pub use event::*;
pub use registry::*;
pub use scheduler::*;
pub use stats::*;
