//! Bus event counters

/// Counters maintained by the bus engine
///
/// Wrapping counters; read a snapshot with `Bus::stats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusStats {
    /// Address events (one per transaction)
    pub transactions: u32,
    /// Commands queued for the foreground
    pub commands: u32,
    /// Read completions queued for the foreground
    pub reads: u32,
    /// Sync writes queued for the foreground
    pub syncs: u32,
    pub crc_errors: u32,
    pub length_errors: u32,
    /// Payload bytes dropped because the receive buffer was full
    pub rx_overruns: u32,
    /// Writes ignored because the bus was busy
    pub busy_rejects: u32,
    /// Commands addressed to an unregistered device
    pub unknown_device: u32,
    /// Hardware error events (acknowledge failure, overrun)
    pub bus_errors: u32,
}

impl BusStats {
    pub const fn new() -> Self {
        Self {
            transactions: 0,
            commands: 0,
            reads: 0,
            syncs: 0,
            crc_errors: 0,
            length_errors: 0,
            rx_overruns: 0,
            busy_rejects: 0,
            unknown_device: 0,
            bus_errors: 0,
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for BusStats {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(
            fmt,
            "BusStats{{ tx: {}, cmd: {}, rd: {}, sync: {}, crc: {}, len: {}, ovr: {}, busy: {}, unk: {}, err: {} }}",
            self.transactions,
            self.commands,
            self.reads,
            self.syncs,
            self.crc_errors,
            self.length_errors,
            self.rx_overruns,
            self.busy_rejects,
            self.unknown_device,
            self.bus_errors
        );
    }
}
