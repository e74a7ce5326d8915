//! # Chain Verification
//!
//! Walks a full ledger and reports the first structural defect.
//!
//! ## Checks (per block, in order)
//!
//! 1. `index` equals its position (contiguous from 0)
//! 2. Block 0 links to `GENESIS_HASH`, every later block to its predecessor
//! 3. Stored measurements are already normalized
//! 4. The recomputed content hash equals the stored one

use crate::domain::block::recompute_hash;
use crate::domain::errors::ChainViolation;
use shared_types::{Block, CanonicalEncoder, GENESIS_HASH};

/// Summary of a verified chain.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChainSummary {
    /// Number of blocks verified.
    pub length: u64,
    /// Hash of the last block, if any.
    pub tail_hash: Option<String>,
}

/// Verify a chain ordered by index.
pub fn verify_chain(encoder: &CanonicalEncoder, blocks: &[Block]) -> Result<ChainSummary, ChainViolation> {
    let mut verifier = ChainVerifier::new(encoder);
    for block in blocks {
        verifier.push(block)?;
    }
    Ok(verifier.finish())
}

/// Incremental form of [`verify_chain`] for chains read one block at a
/// time. Holds only the previous block's hash.
#[derive(Debug)]
pub struct ChainVerifier<'a> {
    encoder: &'a CanonicalEncoder,
    length: u64,
    tail_hash: Option<String>,
}

impl<'a> ChainVerifier<'a> {
    pub fn new(encoder: &'a CanonicalEncoder) -> Self {
        Self {
            encoder,
            length: 0,
            tail_hash: None,
        }
    }

    /// Check the next block in index order.
    pub fn push(&mut self, block: &Block) -> Result<(), ChainViolation> {
        let expected = self.length;
        if block.index != expected {
            return Err(ChainViolation::IndexGap {
                position: expected as usize,
                expected,
                found: block.index,
            });
        }

        match self.tail_hash.as_deref() {
            None if block.previous_hash != GENESIS_HASH => {
                return Err(ChainViolation::GenesisLinkBroken);
            }
            Some(prior) if block.previous_hash != prior => {
                return Err(ChainViolation::PreviousHashMismatch { index: block.index });
            }
            _ => {}
        }

        let data = block
            .data
            .to_object()
            .map_err(|e| ChainViolation::Unencodable {
                index: block.index,
                message: e.to_string(),
            })?;
        if !self.encoder.is_normalized(&data) {
            return Err(ChainViolation::NonNormalizedData { index: block.index });
        }

        let recomputed = recompute_hash(self.encoder, block).map_err(|e| ChainViolation::Unencodable {
            index: block.index,
            message: e.to_string(),
        })?;
        if recomputed != block.hash {
            return Err(ChainViolation::HashMismatch { index: block.index });
        }

        self.length += 1;
        self.tail_hash = Some(recomputed);
        Ok(())
    }

    pub fn finish(self) -> ChainSummary {
        ChainSummary {
            length: self.length,
            tail_hash: self.tail_hash,
        }
    }
}
