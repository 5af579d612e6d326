#![no_std]
#![allow(unsafe_code)] // Sharing cells between interrupt and foreground contexts requires unsafe Sync impls

//! # vbus Synchronization
//!
//! The only primitives the firmware core needs to share state between
//! interrupt handlers and the foreground loop:
//!
//! - [`CriticalSection`]: scoped mutual exclusion, injected as a type
//!   parameter so the same logic runs under interrupt masking on the target
//!   and under a host mutex in tests
//! - [`Exclusive`]: a value only reachable inside the critical section
//! - [`SeqLock`]: retry-based writer discipline for short state updates
//! - [`TickCounter`]: timer-interrupt driven [`vbus_core::Clock`]

#[cfg(test)]
extern crate std;

pub mod critical;
pub mod exclusive;
pub mod seqlock;
pub mod tick;

pub use critical::*;
pub use exclusive::*;
pub use seqlock::*;
pub use tick::*;
