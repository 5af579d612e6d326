//! Ring buffer configuration

/// How the producer side fills a ring buffer
///
/// Chosen once at construction; the buffer rejects operations belonging to
/// the other mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerMode {
    /// Bytes are appended one by one, typically from an interrupt handler
    InterruptBacked,
    /// Fixed-size blocks are reserved, filled asynchronously (DMA) and
    /// committed
    DmaBacked { block_size: usize },
}

#[cfg(feature = "defmt")]
impl defmt::Format for ProducerMode {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            ProducerMode::InterruptBacked => defmt::write!(fmt, "InterruptBacked"),
            ProducerMode::DmaBacked { block_size } => {
                defmt::write!(fmt, "DmaBacked({})", block_size)
            }
        }
    }
}

/// Construction-time ring buffer settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingConfig {
    pub mode: ProducerMode,
    /// Warning clears once the committed length drops to this value
    pub low_watermark: usize,
    /// Warning sets once the committed length reaches this value; `None`
    /// means the buffer capacity
    pub high_watermark: Option<usize>,
}

impl RingConfig {
    /// Byte mode configuration
    pub const fn interrupt_backed() -> Self {
        Self {
            mode: ProducerMode::InterruptBacked,
            low_watermark: 0,
            high_watermark: None,
        }
    }

    /// Block mode configuration
    pub const fn dma_backed(block_size: usize) -> Self {
        Self {
            mode: ProducerMode::DmaBacked { block_size },
            low_watermark: 0,
            high_watermark: None,
        }
    }

    pub const fn with_watermarks(mut self, low: usize, high: usize) -> Self {
        self.low_watermark = low;
        self.high_watermark = Some(high);
        self
    }

    /// Write unit in bytes (1 in byte mode)
    pub const fn block_size(&self) -> usize {
        match self.mode {
            ProducerMode::InterruptBacked => 1,
            ProducerMode::DmaBacked { block_size } => block_size,
        }
    }

    pub const fn is_block_mode(&self) -> bool {
        matches!(self.mode, ProducerMode::DmaBacked { .. })
    }
}

impl Default for RingConfig {
    fn default() -> Self {
        Self::interrupt_backed()
    }
}
