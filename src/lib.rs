//! # Epicoin Ledger
//!
//! Ledger core of a minimal proof-of-work cryptocurrency: canonical
//! transaction and block hashing, secp256k1 authorization, the UTXO set,
//! staged chain validation and the pool of pending transactions.
//!
//! ## Design Principles
//!
//! 1. **Single writer**: all ledger state sits behind one lock owned by [`Ledger`]
//! 2. **Atomic application**: a rejected block or transaction leaves no trace
//! 3. **Unambiguous hashing**: length-prefixed, order-independent encoding
//! 4. **Pluggable policy**: difficulty and input selection are trait objects
//! 5. **Exact Version Pinning**: all ledger-critical cryptography pinned to exact versions
//!
//! ## Usage
//!
//! ```rust
//! use epicoin_ledger::*;
//!
//! let config = LedgerConfig {
//!     difficulty: DifficultyConfig::LeadingZeroBits { bits: 0 },
//!     ..LedgerConfig::default()
//! };
//! let alice = KeyPair::from_secret_bytes(&[1; 32])?;
//! let bob = KeyPair::from_secret_bytes(&[2; 32])?;
//!
//! let reward = Transaction::signed(
//!     PROTOCOL_VERSION,
//!     vec![],
//!     vec![Output { index: 0, address: alice.address(), amount: 100 }],
//!     Properties::new(),
//!     &alice,
//! )?;
//! let ledger = Ledger::with_genesis(&config, &Block::genesis(vec![reward], 0))?;
//! assert_eq!(ledger.available_balance(&alice.address()), 100);
//!
//! let payment = ledger.post_transaction(TransactionBuilder::new(bob.address(), 40), &alice)?;
//! assert_eq!(payment.outputs().len(), 2);
//! assert_eq!(ledger.pending().len(), 1);
//! # Ok::<(), LedgerError>(())
//! ```

pub mod types;
pub mod constants;
pub mod error;
pub mod config;
pub mod serialize;
pub mod hash;
pub mod crypto;
pub mod transaction;
pub mod utxo;
pub mod pow;
pub mod block;
pub mod chain;
pub mod mempool;

// Re-export commonly used types
pub use types::*;
pub use constants::*;
pub use error::{LedgerError, LinkageError, Result};
pub use block::Block;
pub use chain::{Acceptance, Chain, ChainValidator, Rejection, ValidationStage};
pub use config::LedgerConfig;
pub use crypto::{KeyPair, KeyProvider, NoKeys};
pub use mempool::{PendingPool, PoolOrdering};
pub use pow::{DifficultyConfig, DifficultyPolicy, LeadingZeroBits, TargetThreshold};
pub use transaction::{Transaction, TransactionBuilder};
pub use utxo::{Selection, SelectionPolicy, SelectionStrategy, UtxoEntry, UtxoSet};

use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Everything a ledger mutates, guarded as one unit
#[derive(Debug, Clone, Default)]
pub struct LedgerState {
    chain: Chain,
    utxos: UtxoSet,
    pool: PendingPool,
}

impl LedgerState {
    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    pub fn utxos(&self) -> &UtxoSet {
        &self.utxos
    }

    pub fn pool(&self) -> &PendingPool {
        &self.pool
    }
}

/// Shared handle to one ledger
///
/// Cloning is cheap; clones share state. Block arrival and local spends may
/// race from different threads: writers are serialized by the inner lock and
/// readers always observe a state between two complete writes.
#[derive(Clone)]
pub struct Ledger {
    state: Arc<RwLock<LedgerState>>,
    validator: Arc<ChainValidator>,
    selection: Arc<dyn SelectionPolicy>,
}

impl fmt::Debug for Ledger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("Ledger")
            .field("height", &state.chain.tip_height())
            .field("utxos", &state.utxos.len())
            .field("pending", &state.pool.len())
            .field("validator", &self.validator)
            .finish_non_exhaustive()
    }
}

impl Ledger {
    /// Empty ledger using the policies named in `config`
    pub fn new(config: &LedgerConfig) -> Result<Self> {
        Self::with_policies(config, Box::new(config.difficulty), Arc::new(config.selection))
    }

    /// Empty ledger with caller-supplied difficulty and selection policies;
    /// `config.difficulty` and `config.selection` are ignored
    pub fn with_policies(
        config: &LedgerConfig,
        difficulty: Box<dyn DifficultyPolicy>,
        selection: Arc<dyn SelectionPolicy>,
    ) -> Result<Self> {
        config.validate()?;
        let state = LedgerState {
            chain: Chain::new(),
            utxos: UtxoSet::new(),
            pool: PendingPool::new(config.max_pool_size, config.pool_ordering),
        };
        let validator =
            ChainValidator::new(config.supported_versions.clone(), difficulty, config.block_reward);
        Ok(Self {
            state: Arc::new(RwLock::new(state)),
            validator: Arc::new(validator),
            selection,
        })
    }

    /// Ledger whose chain starts at `genesis`
    pub fn with_genesis(config: &LedgerConfig, genesis: &Block) -> Result<Self> {
        if !genesis.is_genesis() {
            return Err(LedgerError::Validation(format!(
                "genesis block must have height 0, found {}",
                genesis.height()
            )));
        }
        let ledger = Self::new(config)?;
        ledger.submit_block(genesis).map_err(|rejection| rejection.error)?;
        Ok(ledger)
    }

    /// SubmitBlock: run the block through every validation stage and
    /// commit it on success
    pub fn submit_block(&self, block: &Block) -> std::result::Result<Acceptance, Rejection> {
        let mut guard = self.state.write();
        let state = &mut *guard;
        self.validator.validate(block, &mut state.chain, &mut state.utxos, &mut state.pool)
    }

    /// SubmitTransaction: 𝒯𝒳 → {pending, rejected}
    ///
    /// 1. Well-formed, hash-consistent, supported version
    /// 2. Not an issuance transaction
    /// 3. Still confirmable in the next block
    /// 4. Authorized, unspent and balanced against confirmed outputs
    /// 5. Admitted to the pool with its fee
    pub fn submit_transaction(&self, tx: Transaction) -> Result<Amount> {
        let mut state = self.state.write();
        self.admit(&mut state, tx)
    }

    /// Build, sign and submit in one step, so no block can slip in between
    pub fn post_transaction(
        &self,
        builder: TransactionBuilder,
        keys: &dyn KeyProvider,
    ) -> Result<Transaction> {
        let mut state = self.state.write();
        let reserved = state.pool.reserved_outpoints();
        let tx = builder.build(&state.utxos, &reserved, self.selection.as_ref(), keys)?;
        self.admit(&mut state, tx.clone())?;
        Ok(tx)
    }

    fn admit(&self, state: &mut LedgerState, tx: Transaction) -> Result<Amount> {
        transaction::check_transaction(&tx)?;

        if !self.validator.supports_version(tx.version()) {
            return Err(LedgerError::Validation(format!(
                "unsupported transaction version {}",
                tx.version()
            )));
        }

        if tx.is_issuance() {
            return Err(LedgerError::Validation(format!(
                "issuance transaction {} can only be confirmed by its block",
                tx.hash()
            )));
        }

        let next_height = state.chain.next_height();
        if tx.is_expired_at(next_height)? {
            return Err(LedgerError::Validation(format!(
                "transaction {} expired before block {}",
                tx.hash(),
                next_height
            )));
        }

        let fee = state.utxos.check_spend(&tx)?;
        let hash = *tx.hash();
        state.pool.add(tx, fee)?;
        info!(%hash, fee, "transaction pending");
        Ok(fee)
    }

    /// Drop pending transactions by hash, returning those that were present
    pub fn remove_pending(&self, hashes: &[Hash]) -> Vec<Transaction> {
        let removed = self.state.write().pool.remove(hashes);
        debug!(requested = hashes.len(), removed = removed.len(), "removed pending transactions");
        removed
    }

    /// Confirmed balance of `address`; pending spends are not subtracted
    pub fn available_balance(&self, address: &str) -> Amount {
        self.state.read().utxos.available_balance(address)
    }

    /// Inputs covering `amount` from `address`, skipping outputs already
    /// claimed by pending transactions
    pub fn select_inputs(&self, address: &str, amount: Amount) -> Result<Selection> {
        let state = self.state.read();
        let reserved = state.pool.reserved_outpoints();
        state
            .utxos
            .select_inputs_excluding(address, amount, self.selection.as_ref(), &reserved)
    }

    /// Build and sign a transaction against the current state without
    /// submitting it
    pub fn build_transaction(
        &self,
        builder: TransactionBuilder,
        keys: &dyn KeyProvider,
    ) -> Result<Transaction> {
        let state = self.state.read();
        let reserved = state.pool.reserved_outpoints();
        builder.build(&state.utxos, &reserved, self.selection.as_ref(), keys)
    }

    /// Pending transactions in pool order
    pub fn pending(&self) -> Vec<Transaction> {
        self.state.read().pool.contents().into_iter().cloned().collect()
    }

    pub fn tip(&self) -> Option<Block> {
        self.state.read().chain.tip().cloned()
    }

    pub fn height(&self) -> Option<Height> {
        self.state.read().chain.tip_height()
    }

    pub fn blocks(&self) -> Vec<Block> {
        self.state.read().chain.blocks().to_vec()
    }

    pub fn block_at(&self, height: Height) -> Option<Block> {
        self.state.read().chain.get(height).cloned()
    }

    pub fn utxo(&self, outpoint: &OutPoint) -> Option<UtxoEntry> {
        self.state.read().utxos.get(outpoint).cloned()
    }

    /// Run `f` against one consistent snapshot of the whole state
    pub fn read<R>(&self, f: impl FnOnce(&LedgerState) -> R) -> R {
        f(&self.state.read())
    }

    pub fn difficulty(&self) -> &dyn DifficultyPolicy {
        self.validator.difficulty()
    }
}
