//! # vbus POSIX Port
//!
//! Runs the firmware core on Linux/Unix hosts. Interrupt handlers become
//! threads, so masking interrupts becomes a process-wide mutex, and the
//! timer interrupt becomes a ticker thread.
//!
//! - [`HostLock`]: critical section backed by an OS mutex
//! - [`HostClock`]: monotonic [`Clock`](vbus_core::Clock) with a fixed
//!   resolution
//! - [`Ticker`]: drift-free periodic callback thread

pub mod critical;
pub mod time;

pub use critical::HostLock;
pub use time::{HostClock, Ticker};
