//! Circular byte buffer shared between one producer and one consumer
//!
//! The payload bytes live in atomics so both sides can reach them through a
//! shared reference; all cursor and length bookkeeping is guarded by a
//! [`SeqLock`]. A read pass is split in three steps so an interrupted bus
//! transfer never loses data: [`RingBuffer::start_read`] takes a cursor,
//! [`RingBuffer::get_byte`] walks status then data bytes and only
//! [`RingBuffer::stop_read`] actually releases space.

use core::sync::atomic::{AtomicU8, Ordering};

use vbus_core::{VbusError, VbusResult};
use vbus_sync::{CriticalSection, SeqLock};

use crate::{ProducerMode, RingConfig, RingReader};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RingState {
    put_pos: usize,
    start_pos: usize,
    committed_len: usize,
    // read cursor, taken by start_read
    read_pos: usize,
    read_len: usize,
    bytes_read: usize,
    low_watermark: usize,
    high_watermark: usize,
    overflow: bool,
    warning: bool,
    reserved: bool,
}

impl RingState {
    const fn empty(low_watermark: usize, high_watermark: usize) -> Self {
        Self {
            put_pos: 0,
            start_pos: 0,
            committed_len: 0,
            read_pos: 0,
            read_len: 0,
            bytes_read: 0,
            low_watermark,
            high_watermark,
            overflow: false,
            warning: false,
            reserved: false,
        }
    }

    fn update_warning(&mut self) {
        if self.committed_len >= self.high_watermark {
            self.warning = true;
        } else if self.committed_len <= self.low_watermark {
            self.warning = false;
        }
    }
}

/// Where the next read byte comes from
enum ReadSlot {
    Status(usize),
    Data(usize),
}

/// Block reserved for writing by [`RingBuffer::reserve_block`]
///
/// Must be handed back through [`RingBuffer::commit_block`] or
/// [`RingBuffer::cancel_block`].
#[must_use = "a reserved block must be committed or cancelled"]
#[derive(Debug, PartialEq, Eq)]
pub struct BlockSlot {
    offset: usize,
}

impl BlockSlot {
    /// Offset of the block inside the ring storage
    pub fn offset(&self) -> usize {
        self.offset
    }
}

/// Ring buffer with `N` bytes of storage and an `S` byte status prefix
///
/// Every read pass returns the `S` status bytes first, then the committed
/// data in FIFO order.
pub struct RingBuffer<const N: usize, const S: usize, C> {
    mode: ProducerMode,
    data: [AtomicU8; N],
    status: [AtomicU8; S],
    state: SeqLock<RingState, C>,
}

impl<const N: usize, const S: usize, C: CriticalSection> RingBuffer<N, S, C> {
    /// Create an empty ring
    ///
    /// # Panics
    ///
    /// On a block size of zero, larger than `N` or not dividing `N`, and on
    /// watermarks outside `0..=N` or with `low > high`. In a `static`
    /// initializer these are compile errors.
    pub const fn new(cs: C, config: RingConfig) -> Self {
        let block_size = config.block_size();
        assert!(N > 0 && N <= u16::MAX as usize, "ring capacity must fit the wire length");
        assert!(block_size > 0 && block_size <= N, "block size must be within capacity");
        assert!(N % block_size == 0, "capacity must be a multiple of the block size");
        let high = match config.high_watermark {
            Some(high) => high,
            None => N,
        };
        assert!(high <= N && config.low_watermark <= high, "invalid watermarks");

        Self {
            mode: config.mode,
            data: [const { AtomicU8::new(0) }; N],
            status: [const { AtomicU8::new(0) }; S],
            state: SeqLock::new(cs, RingState::empty(config.low_watermark, high)),
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub const fn status_len(&self) -> usize {
        S
    }

    pub fn block_size(&self) -> usize {
        match self.mode {
            ProducerMode::InterruptBacked => 1,
            ProducerMode::DmaBacked { block_size } => block_size,
        }
    }

    pub fn mode(&self) -> ProducerMode {
        self.mode
    }

    /// Discard all content and flags; watermarks are kept
    pub fn reset(&self) {
        self.state.write(|s| {
            debug_assert!(!s.reserved, "reset with an outstanding block reservation");
            *s = RingState::empty(s.low_watermark, s.high_watermark);
        });
    }

    /// Append one byte (byte mode only)
    ///
    /// A full ring sets the sticky overflow flag and drops the byte.
    pub fn put_byte(&self, byte: u8) -> VbusResult<()> {
        debug_assert!(
            self.mode == ProducerMode::InterruptBacked,
            "put_byte on a block mode ring"
        );
        self.state.write(|s| {
            if s.committed_len >= N {
                s.overflow = true;
                return Err(VbusError::Overflow);
            }
            // the slot is outside committed data until this commit succeeds
            self.data[s.put_pos].store(byte, Ordering::Relaxed);
            s.put_pos = (s.put_pos + 1) % N;
            s.committed_len += 1;
            s.update_warning();
            Ok(())
        })
    }

    /// Reserve the next block for writing (block mode only)
    ///
    /// Committed length is not changed. The free-space check only looks at
    /// the committed length, never at the reader position: it fails once
    /// `capacity - block_size < committed_len`.
    pub fn reserve_block(&self) -> VbusResult<BlockSlot> {
        debug_assert!(self.mode != ProducerMode::InterruptBacked, "reserve_block on a byte mode ring");
        let free_size = N - self.block_size();
        self.state.write(|s| {
            debug_assert!(!s.reserved, "block already reserved");
            if free_size < s.committed_len {
                s.overflow = true;
                return Err(VbusError::Overflow);
            }
            s.reserved = true;
            Ok(BlockSlot { offset: s.put_pos })
        })
    }

    /// Raw pointer to a reserved block, valid for `block_size` bytes
    ///
    /// Meant to be handed to a DMA controller. The region belongs to the
    /// reserving side until the slot is committed or cancelled.
    pub fn block_ptr(&self, slot: &BlockSlot) -> *mut u8 {
        self.data[slot.offset].as_ptr()
    }

    /// Copy `bytes` into a reserved block
    pub fn write_block(&self, slot: &BlockSlot, bytes: &[u8]) {
        debug_assert!(bytes.len() <= self.block_size(), "write exceeds block size");
        for (cell, &b) in self.data[slot.offset..].iter().zip(bytes.iter()) {
            cell.store(b, Ordering::Relaxed);
        }
    }

    /// Make a reserved block visible to the consumer
    pub fn commit_block(&self, slot: BlockSlot) {
        let block_size = self.block_size();
        self.state.write(|s| {
            debug_assert!(s.reserved, "commit without reservation");
            debug_assert_eq!(s.put_pos, slot.offset, "commit of a stale block");
            s.put_pos = (s.put_pos + block_size) % N;
            s.committed_len += block_size;
            s.reserved = false;
            s.update_warning();
        });
    }

    /// Drop a reservation without changing any content
    pub fn cancel_block(&self, slot: BlockSlot) {
        self.state.write(|s| {
            debug_assert!(s.reserved, "cancel without reservation");
            debug_assert_eq!(s.put_pos, slot.offset, "cancel of a stale block");
            s.reserved = false;
        });
    }

    /// Start a read pass from the oldest committed byte
    ///
    /// Returns the length of the pass: status plus data committed now.
    /// Data committed later is left for the next pass.
    pub fn start_read(&self) -> usize {
        self.state.write(|s| {
            s.read_pos = s.start_pos;
            s.read_len = s.committed_len;
            s.bytes_read = 0;
            S + s.read_len
        })
    }

    /// Next byte of the current read pass
    ///
    /// Status bytes come first, then data committed when the pass started.
    /// Returns `None` once both are exhausted. Committed state is untouched,
    /// so a pass that is never stopped can be restarted from the same place.
    pub fn get_byte(&self) -> Option<u8> {
        let slot = self.state.write(|s| {
            if s.bytes_read < S {
                s.bytes_read += 1;
                Some(ReadSlot::Status(s.bytes_read - 1))
            } else if s.bytes_read - S < s.read_len {
                let pos = s.read_pos;
                s.read_pos = (pos + 1) % N;
                s.bytes_read += 1;
                Some(ReadSlot::Data(pos))
            } else {
                None
            }
        })?;
        Some(match slot {
            ReadSlot::Status(i) => self.status[i].load(Ordering::Relaxed),
            ReadSlot::Data(pos) => self.data[pos].load(Ordering::Relaxed),
        })
    }

    /// Release the data part of `consumed` bytes read in this pass
    ///
    /// Consuming only status bytes leaves the ring unchanged. Returns the
    /// committed length left.
    pub fn stop_read(&self, consumed: usize) -> usize {
        let block_size = self.block_size();
        self.state.write(|s| {
            if consumed > S {
                let data = consumed - S;
                debug_assert!(data % block_size == 0, "ring must be consumed in whole blocks");
                let data = data.min(s.committed_len);
                s.committed_len -= data;
                s.start_pos = (s.start_pos + data) % N;
                s.update_warning();
            }
            s.committed_len
        })
    }

    /// Committed data length, status excluded
    pub fn len(&self) -> usize {
        self.state.read_with_lock(|s| s.committed_len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes a full read pass returns: status plus committed data
    pub fn total_len(&self) -> usize {
        S + self.len()
    }

    /// Sticky overflow flag
    pub fn overflow(&self) -> bool {
        self.state.read_with_lock(|s| s.overflow)
    }

    /// Acknowledge an overflow (consumer side)
    pub fn clear_overflow(&self) {
        self.state.write(|s| s.overflow = false);
    }

    /// Watermark warning, with hysteresis between the low and high marks
    pub fn check_warning(&self) -> bool {
        self.state.read_with_lock(|s| s.warning)
    }

    pub fn set_watermarks(&self, low: usize, high: usize) -> VbusResult<()> {
        if high > N || low > high {
            return Err(VbusError::InvalidConfig);
        }
        self.state.write(|s| {
            s.low_watermark = low;
            s.high_watermark = high;
            s.update_warning();
        });
        Ok(())
    }

    /// Overwrite status bytes starting at `offset`
    pub fn set_status(&self, offset: usize, bytes: &[u8]) -> VbusResult<()> {
        let end = offset.checked_add(bytes.len()).ok_or(VbusError::Overflow)?;
        if end > S {
            return Err(VbusError::Overflow);
        }
        for (cell, &b) in self.status[offset..end].iter().zip(bytes) {
            cell.store(b, Ordering::Relaxed);
        }
        Ok(())
    }

    pub fn status_byte(&self, index: usize) -> Option<u8> {
        self.status.get(index).map(|b| b.load(Ordering::Relaxed))
    }
}

impl<const N: usize, const S: usize, C: CriticalSection + Sync> RingReader for RingBuffer<N, S, C> {
    fn start_read(&self) -> usize {
        RingBuffer::start_read(self)
    }

    fn get_byte(&self) -> Option<u8> {
        RingBuffer::get_byte(self)
    }

    fn stop_read(&self, consumed: usize) -> usize {
        RingBuffer::stop_read(self, consumed)
    }

    fn total_len(&self) -> usize {
        RingBuffer::total_len(self)
    }

    fn overflow(&self) -> bool {
        RingBuffer::overflow(self)
    }
}
