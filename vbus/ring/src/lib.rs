#![no_std]

//! # vbus Buffers
//!
//! Payload storage shared between device logic and the bus engine:
//!
//! - [`RingBuffer`]: circular buffer with byte or block producers, a fixed
//!   status prefix and restartable read passes
//! - [`LinearBuffer`]: flat response buffer with an advertised length
//!
//! Both are `const`-constructible so they can live in `static`s.

pub mod config;
pub mod linear;
pub mod ring;
pub mod source;

pub use config::*;
pub use linear::*;
pub use ring::*;
pub use source::*;
