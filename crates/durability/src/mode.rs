//! Durability mode configuration
//!
//! Controls log sync behavior (Cache, Standard, Always).

/// Durability mode for log appends
///
/// Controls when the log is fsynced to disk.
///
/// # Modes
///
/// | Mode | fsync | Data Loss Window |
/// |------|-------|-----------------|
/// | Cache | Never (flush to OS only) | Everything since the OS last wrote back |
/// | Always | Every append | Zero |
/// | Standard | Periodic, and on close | Up to interval/batch |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurabilityMode {
    /// Flush to OS buffers only, never fsync
    ///
    /// Use case: tests, caches, scratch data.
    Cache,

    /// fsync after every append (slow, maximum durability)
    ///
    /// Use when data loss is unacceptable, even for a single write.
    Always,

    /// fsync every N appends OR every T milliseconds (the default)
    ///
    /// May lose up to batch_size writes or interval_ms of data on crash.
    Standard {
        /// Maximum time between fsyncs in milliseconds
        interval_ms: u64,
        /// Maximum writes between fsyncs
        batch_size: usize,
    },
}

impl DurabilityMode {
    /// Check if this mode requires immediate fsync on every append
    pub fn requires_immediate_fsync(&self) -> bool {
        matches!(self, DurabilityMode::Always)
    }

    /// Human-readable description of the mode
    pub fn description(&self) -> &'static str {
        match self {
            DurabilityMode::Cache => "Cache (fastest, unsynced)",
            DurabilityMode::Always => "Always sync (safest, slowest)",
            DurabilityMode::Standard { .. } => "Standard (balanced speed/safety)",
        }
    }

    /// Create a standard mode with recommended defaults
    ///
    /// Returns `Standard { interval_ms: 100, batch_size: 1000 }`.
    pub fn standard_default() -> Self {
        DurabilityMode::Standard {
            interval_ms: 100,
            batch_size: 1000,
        }
    }
}

impl Default for DurabilityMode {
    fn default() -> Self {
        Self::standard_default()
    }
}
