//! Payload source traits consumed by the bus engine
//!
//! The engine streams payload bytes from interrupt context, so both traits
//! work through shared references and require `Sync`.

/// Ring-structured payload read in start/get/stop passes
pub trait RingReader: Sync {
    /// Start a read pass from the oldest committed byte; returns the number
    /// of bytes the pass will yield, status prefix included
    fn start_read(&self) -> usize;

    /// Next byte of the pass, `None` when exhausted
    fn get_byte(&self) -> Option<u8>;

    /// Release `consumed` bytes of the pass; returns the data length left
    fn stop_read(&self, consumed: usize) -> usize;

    /// Bytes a full pass returns, status prefix included
    fn total_len(&self) -> usize;

    /// Sticky overflow flag
    fn overflow(&self) -> bool;
}

/// Flat payload with an advertised length
pub trait LinearSource: Sync {
    /// Bytes advertised to the bus master
    fn available(&self) -> usize;

    /// Byte at `index`, `None` past the advertised length
    fn byte_at(&self, index: usize) -> Option<u8>;
}
