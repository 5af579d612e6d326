//! XOR checksum used to protect every bus transaction

/// Initial value of the checksum accumulator
pub const CRC_INIT: u8 = 0;

/// Running XOR checksum over transaction bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XorCrc(u8);

impl XorCrc {
    pub const fn new() -> Self {
        Self(CRC_INIT)
    }

    /// Fold one byte into the checksum. XOR is its own inverse, so folding
    /// the same byte again removes it.
    #[inline]
    pub fn update(&mut self, byte: u8) {
        self.0 ^= byte;
    }

    pub fn update_slice(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.update(b);
        }
    }

    pub fn reset(&mut self) {
        self.0 = CRC_INIT;
    }

    pub const fn value(self) -> u8 {
        self.0
    }
}

impl Default for XorCrc {
    fn default() -> Self {
        Self::new()
    }
}

/// Checksum of a byte slice
pub fn xor_crc(bytes: &[u8]) -> u8 {
    let mut crc = XorCrc::new();
    crc.update_slice(bytes);
    crc.value()
}

#[cfg(feature = "defmt")]
impl defmt::Format for XorCrc {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "XorCrc({=u8:#x})", self.0);
    }
}
