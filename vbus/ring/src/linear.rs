//! Fixed-size response buffer

use core::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

use vbus_core::{VbusError, VbusResult};

use crate::LinearSource;

/// Flat byte buffer holding the latest response of a device
///
/// The device stores a whole response at once; the bus engine streams
/// `available()` bytes of it on every read. Storing while a read is in flight
/// mixes old and new bytes, so devices update it before completing a command.
pub struct LinearBuffer<const N: usize> {
    data: [AtomicU8; N],
    available: AtomicUsize,
}

impl<const N: usize> LinearBuffer<N> {
    pub const fn new() -> Self {
        assert!(N <= u16::MAX as usize, "buffer capacity must fit the wire length");
        Self {
            data: [const { AtomicU8::new(0) }; N],
            available: AtomicUsize::new(0),
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Replace the content and advertise `bytes.len()` bytes
    pub fn store(&self, bytes: &[u8]) -> VbusResult<()> {
        if bytes.len() > N {
            return Err(VbusError::Overflow);
        }
        for (cell, &b) in self.data.iter().zip(bytes) {
            cell.store(b, Ordering::Relaxed);
        }
        self.available.store(bytes.len(), Ordering::Release);
        Ok(())
    }

    /// Advertise `len` bytes of the current content
    pub fn set_available(&self, len: usize) -> VbusResult<()> {
        if len > N {
            return Err(VbusError::Overflow);
        }
        self.available.store(len, Ordering::Release);
        Ok(())
    }

    /// Advertise nothing
    pub fn clear(&self) {
        self.available.store(0, Ordering::Release);
    }
}

impl<const N: usize> Default for LinearBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> LinearSource for LinearBuffer<N> {
    fn available(&self) -> usize {
        self.available.load(Ordering::Acquire)
    }

    fn byte_at(&self, index: usize) -> Option<u8> {
        if index < self.available() {
            self.data.get(index).map(|b| b.load(Ordering::Relaxed))
        } else {
            None
        }
    }
}
