//! Chain validation: the staged acceptance of candidate blocks onto the
//! locally known chain

use std::collections::{HashMap, HashSet};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::block::Block;
use crate::constants::GENESIS_PREVIOUS_HASH;
use crate::error::{LedgerError, LinkageError, Result};
use crate::mempool::PendingPool;
use crate::pow::{check_proof_of_work, DifficultyPolicy};
use crate::transaction::check_transaction;
use crate::types::*;
use crate::utxo::UtxoSet;

/// Accepted blocks, indexed by height and by hash
#[derive(Debug, Clone, Default)]
pub struct Chain {
    blocks: Vec<Block>,
    by_hash: HashMap<Hash, Height>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn tip(&self) -> Option<&Block> {
        self.blocks.last()
    }

    pub fn tip_height(&self) -> Option<Height> {
        self.tip().map(Block::height)
    }

    /// Height the next block must carry
    pub fn next_height(&self) -> Height {
        self.blocks.len() as Height
    }

    pub fn get(&self, height: Height) -> Option<&Block> {
        usize::try_from(height).ok().and_then(|h| self.blocks.get(h))
    }

    pub fn get_by_hash(&self, hash: &Hash) -> Option<&Block> {
        self.by_hash.get(hash).and_then(|&h| self.get(h))
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.by_hash.contains_key(hash)
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    fn push(&mut self, block: Block) {
        self.by_hash.insert(*block.hash(), block.height());
        self.blocks.push(block);
    }
}

/// Progress of a candidate block through validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ValidationStage {
    Received,
    HeaderValid,
    LinkageValid,
    ProofOfWorkValid,
    TransactionsValid,
    Accepted,
}

impl fmt::Display for ValidationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValidationStage::Received => "received",
            ValidationStage::HeaderValid => "header-valid",
            ValidationStage::LinkageValid => "linkage-valid",
            ValidationStage::ProofOfWorkValid => "proof-of-work-valid",
            ValidationStage::TransactionsValid => "transactions-valid",
            ValidationStage::Accepted => "accepted",
        };
        f.write_str(name)
    }
}

/// Successful outcome of submitting a block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceptance {
    Accepted { height: Height, hash: Hash },
    /// The identical block was accepted earlier; nothing changed
    AlreadyAccepted { height: Height, hash: Hash },
}

/// A block rejected after reaching `stage`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("block rejected after stage {stage}: {error}")]
pub struct Rejection {
    pub stage: ValidationStage,
    pub error: LedgerError,
}

impl Rejection {
    pub fn is_retryable(&self) -> bool {
        self.error.is_retryable()
    }
}

enum Linkage {
    Extends,
    Known,
}

/// Validates candidate blocks and applies accepted ones
pub struct ChainValidator {
    supported_versions: Vec<u32>,
    difficulty: Box<dyn DifficultyPolicy>,
    block_reward: Amount,
}

impl fmt::Debug for ChainValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainValidator")
            .field("supported_versions", &self.supported_versions)
            .field("block_reward", &self.block_reward)
            .finish_non_exhaustive()
    }
}

impl ChainValidator {
    pub fn new(
        supported_versions: Vec<u32>,
        difficulty: Box<dyn DifficultyPolicy>,
        block_reward: Amount,
    ) -> Self {
        Self { supported_versions, difficulty, block_reward }
    }

    pub fn difficulty(&self) -> &dyn DifficultyPolicy {
        self.difficulty.as_ref()
    }

    pub fn supports_version(&self, version: u32) -> bool {
        self.supported_versions.contains(&version)
    }

    /// Validate: ℬ × Chain × 𝒰𝒮 × Pool → {accepted, rejected(stage, reason)}
    ///
    /// Received → HeaderValid → LinkageValid → ProofOfWorkValid →
    /// TransactionsValid → Accepted. On acceptance the block is appended,
    /// the UTXO set updated, and confirmed, conflicting or expired
    /// transactions leave the pool. On rejection nothing changes.
    pub fn validate(
        &self,
        block: &Block,
        chain: &mut Chain,
        utxos: &mut UtxoSet,
        pool: &mut PendingPool,
    ) -> std::result::Result<Acceptance, Rejection> {
        let height = block.height();
        let hash = *block.hash();
        let reject = |stage: ValidationStage, error: LedgerError| {
            warn!(height, %hash, %stage, error = %error, "block rejected");
            Rejection { stage, error }
        };

        self.check_header(block).map_err(|e| reject(ValidationStage::Received, e))?;

        match check_linkage(block, chain).map_err(|e| reject(ValidationStage::HeaderValid, e))? {
            Linkage::Known => {
                debug!(height, %hash, "block already accepted");
                return Ok(Acceptance::AlreadyAccepted { height, hash });
            }
            Linkage::Extends => {}
        }

        check_proof_of_work(block, self.difficulty.as_ref())
            .map_err(|e| reject(ValidationStage::LinkageValid, e))?;

        check_block_transactions(block, &self.supported_versions)
            .map_err(|e| reject(ValidationStage::ProofOfWorkValid, e))?;
        utxos
            .apply_block(height, block.transactions(), self.block_reward)
            .map_err(|e| reject(ValidationStage::ProofOfWorkValid, e))?;

        // TransactionsValid: commit
        let confirmed = block.transaction_hashes();
        let spent: Vec<OutPoint> =
            block.transactions().iter().flat_map(|tx| tx.outpoints()).collect();
        chain.push(block.clone());

        let removed = pool.remove(&confirmed).len();
        let conflicts = pool.purge_spent(&spent).len();
        let expired = pool.purge_expired(height + 1).len();

        info!(
            height,
            %hash,
            transactions = confirmed.len(),
            removed,
            conflicts,
            expired,
            "block accepted"
        );
        Ok(Acceptance::Accepted { height, hash })
    }

    /// HeaderValid: version is supported
    pub fn check_header(&self, block: &Block) -> Result<()> {
        if !self.supports_version(block.version()) {
            return Err(LedgerError::Validation(format!(
                "unsupported block version {}",
                block.version()
            )));
        }
        Ok(())
    }
}

/// LinkageValid: the block extends the tip, or is an exact resubmission
fn check_linkage(block: &Block, chain: &Chain) -> Result<Linkage> {
    let height = block.height();

    if let Some(existing) = chain.get(height) {
        if existing.hash() == block.hash() {
            return Ok(Linkage::Known);
        }
        return Err(LinkageError::HeightConflict { height, existing: *existing.hash() }.into());
    }

    if height == 0 {
        if *block.previous_hash() != GENESIS_PREVIOUS_HASH {
            return Err(LinkageError::InvalidGenesis { found: *block.previous_hash() }.into());
        }
        return Ok(Linkage::Extends);
    }

    let parent = match chain.tip() {
        Some(tip) if tip.height() + 1 == height => tip,
        _ => {
            return Err(LinkageError::Orphan { height, tip_height: chain.tip_height() }.into());
        }
    };

    if block.previous_hash() != parent.hash() {
        return Err(LinkageError::PreviousHashMismatch {
            height,
            expected: *parent.hash(),
            found: *block.previous_hash(),
        }
        .into());
    }

    Ok(Linkage::Extends)
}

/// TransactionsValid, stateless part: every transaction well-formed,
/// supported, unique within the block and not past its lock height
fn check_block_transactions(block: &Block, supported_versions: &[u32]) -> Result<()> {
    let mut seen = HashSet::with_capacity(block.transactions().len());
    for (i, tx) in block.transactions().iter().enumerate() {
        check_transaction(tx)?;

        if !supported_versions.contains(&tx.version()) {
            return Err(LedgerError::Validation(format!(
                "transaction {} at index {} has unsupported version {}",
                tx.hash(),
                i,
                tx.version()
            )));
        }

        if !seen.insert(*tx.hash()) {
            return Err(LedgerError::Duplicate(format!(
                "transaction {} appears twice in block {}",
                tx.hash(),
                block.height()
            )));
        }

        if tx.is_expired_at(block.height())? {
            return Err(LedgerError::Validation(format!(
                "transaction {} expired before block {}",
                tx.hash(),
                block.height()
            )));
        }
    }
    Ok(())
}
