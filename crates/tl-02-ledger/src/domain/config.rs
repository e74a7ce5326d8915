//! Ledger configuration.

use shared_types::CanonicalEncoder;

/// Attempts made when the tail moves between read and write.
pub const MAX_APPEND_ATTEMPTS: u32 = 2;

/// Default depth of the append queue in front of the single writer.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Encoder for content hashes. Must match the device-side encoder.
    pub encoder: CanonicalEncoder,
    /// Verify the whole stored chain before accepting appends.
    pub verify_on_start: bool,
    /// Pending appends buffered in front of the writer.
    pub queue_capacity: usize,
    /// Append attempts before giving up with `ChainInconsistency`.
    pub max_append_attempts: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            encoder: CanonicalEncoder::telemetry(),
            verify_on_start: true,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_append_attempts: MAX_APPEND_ATTEMPTS,
        }
    }
}
