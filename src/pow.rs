//! Proof of work: pluggable difficulty predicates over block hashes

use serde::{Deserialize, Serialize};

use crate::block::Block;
use crate::constants::DEFAULT_DIFFICULTY_BITS;
use crate::error::{LedgerError, Result};
use crate::types::Hash;

/// Decides whether a block hash carries enough work
pub trait DifficultyPolicy: Send + Sync {
    fn is_satisfied_by(&self, hash: &Hash) -> bool;
}

/// Hash must start with at least this many zero bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeadingZeroBits(pub u32);

impl DifficultyPolicy for LeadingZeroBits {
    fn is_satisfied_by(&self, hash: &Hash) -> bool {
        hash.leading_zero_bits() >= self.0
    }
}

/// Hash, read as a big-endian 256-bit integer, must be below the target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetThreshold(pub Hash);

impl DifficultyPolicy for TargetThreshold {
    fn is_satisfied_by(&self, hash: &Hash) -> bool {
        // Byte-wise ordering of equal-length arrays is big-endian numeric ordering
        hash < &self.0
    }
}

/// Difficulty policy as written in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DifficultyConfig {
    LeadingZeroBits { bits: u32 },
    Target { target: Hash },
}

impl Default for DifficultyConfig {
    fn default() -> Self {
        DifficultyConfig::LeadingZeroBits { bits: DEFAULT_DIFFICULTY_BITS }
    }
}

impl DifficultyPolicy for DifficultyConfig {
    fn is_satisfied_by(&self, hash: &Hash) -> bool {
        match self {
            DifficultyConfig::LeadingZeroBits { bits } => LeadingZeroBits(*bits).is_satisfied_by(hash),
            DifficultyConfig::Target { target } => TargetThreshold(*target).is_satisfied_by(hash),
        }
    }
}

/// CheckProofOfWork: ℬ → {valid, invalid}
///
/// 1. Recompute the block hash from header fields and transaction hashes
/// 2. It must equal the stored hash
/// 3. It must satisfy the difficulty policy
pub fn check_proof_of_work(block: &Block, policy: &dyn DifficultyPolicy) -> Result<()> {
    let recomputed = block.compute_hash();
    if recomputed != *block.hash() {
        return Err(LedgerError::ProofOfWork(format!(
            "stored hash {} does not match recomputed {}",
            block.hash(),
            recomputed
        )));
    }

    if !policy.is_satisfied_by(&recomputed) {
        return Err(LedgerError::ProofOfWork(format!(
            "hash {} does not meet the difficulty target",
            recomputed
        )));
    }

    Ok(())
}
