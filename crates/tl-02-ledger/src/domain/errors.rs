//! # Domain Errors
//!
//! Error types for the ledger subsystem.
//!
//! ## Design Principles
//!
//! - A store failure is never retried: a partial write followed by a retry
//!   could record one reading twice.
//! - A moved tail is retried once, then surfaced as `ChainInconsistency`.

use shared_types::EncodingError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by `LedgerStore` adapters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerStoreError {
    /// Underlying I/O failed.
    #[error("Ledger I/O error: {message}")]
    Io { message: String },

    /// A stored entry could not be decoded.
    #[error("Ledger corrupt at line {line}: {message}")]
    Corrupt { line: usize, message: String },

    /// The block does not extend the current tail.
    #[error("Index conflict: expected {expected}, got {got}")]
    IndexConflict { expected: u64, got: u64 },

    /// Another process owns the data directory.
    #[error("Data directory locked{}: {}", .pid.map(|p| format!(" by process {}", p)).unwrap_or_default(), .path.display())]
    Locked { pid: Option<u32>, path: PathBuf },
}

impl From<std::io::Error> for LedgerStoreError {
    fn from(err: std::io::Error) -> Self {
        LedgerStoreError::Io {
            message: err.to_string(),
        }
    }
}

/// A structural defect found by chain verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainViolation {
    /// Indices are not contiguous from 0.
    #[error("Index gap at position {position}: expected {expected}, found {found}")]
    IndexGap {
        position: usize,
        expected: u64,
        found: u64,
    },

    /// Block 0 does not link to the genesis constant.
    #[error("Genesis block does not link to GENESIS_HASH")]
    GenesisLinkBroken,

    /// `previousHash` differs from the prior block's hash.
    #[error("Block {index} previousHash does not match block {prior}", prior = .index.saturating_sub(1))]
    PreviousHashMismatch { index: u64 },

    /// Recomputed content hash differs from the stored one.
    #[error("Block {index} content hash mismatch")]
    HashMismatch { index: u64 },

    /// A stored measurement is not in normal form, so the stored value is
    /// not the one that was hashed.
    #[error("Block {index} holds a non-normalized measurement")]
    NonNormalizedData { index: u64 },

    /// The block's data could not be encoded at all.
    #[error("Block {index} could not be encoded: {message}")]
    Unencodable { index: u64, message: String },
}

impl ChainViolation {
    /// Index of the offending block.
    pub fn index(&self) -> u64 {
        match self {
            ChainViolation::IndexGap { found, .. } => *found,
            ChainViolation::GenesisLinkBroken => 0,
            ChainViolation::PreviousHashMismatch { index }
            | ChainViolation::HashMismatch { index }
            | ChainViolation::NonNormalizedData { index }
            | ChainViolation::Unencodable { index, .. } => *index,
        }
    }
}

/// Errors from the ledger API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// The snapshot could not be canonically encoded.
    #[error("Encoding error: {0}")]
    Encoding(#[from] EncodingError),

    /// The store failed. The reading is not committed.
    #[error("Persistence failure: {0}")]
    Persistence(#[from] LedgerStoreError),

    /// The tail moved between read and write on every attempt.
    #[error("Chain inconsistency: tail moved during append ({attempts} attempts)")]
    ChainInconsistency { attempts: u32 },

    /// The stored chain failed verification.
    #[error("Chain violation: {0}")]
    Violation(#[from] ChainViolation),

    /// The single writer is gone (shutdown in progress).
    #[error("Ledger writer stopped")]
    WriterStopped,
}
