//! Error types for ledger validation

use thiserror::Error;

use crate::types::{Amount, Hash, Height, OutPoint};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Chain linkage failed: {0}")]
    Linkage(LinkageError),

    #[error("Invalid proof of work: {0}")]
    ProofOfWork(String),

    #[error("Double spend: output {outpoint} is unknown or already spent")]
    DoubleSpend { outpoint: OutPoint },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Imbalanced transaction: outputs {outputs} exceed inputs {inputs}")]
    Imbalanced { inputs: Amount, outputs: Amount },

    #[error("Insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds { requested: Amount, available: Amount },

    #[error("Duplicate: {0}")]
    Duplicate(String),

    #[error("Pending pool is full ({capacity} transactions)")]
    PoolFull { capacity: usize },

    #[error("Key error: {0}")]
    Key(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Reasons a block fails to link onto the local chain
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkageError {
    /// Parent not known locally; resubmit once it arrives
    #[error("orphan block at height {height} (local tip height {tip_height:?})")]
    Orphan { height: Height, tip_height: Option<Height> },

    #[error("previous hash {found} at height {height} does not match parent {expected}")]
    PreviousHashMismatch { height: Height, expected: Hash, found: Hash },

    #[error("height {height} is already occupied by block {existing}")]
    HeightConflict { height: Height, existing: Hash },

    #[error("genesis block must reference the genesis sentinel, found {found}")]
    InvalidGenesis { found: Hash },
}

impl LedgerError {
    /// True for failures the caller may cure by resubmitting later
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Linkage(LinkageError::Orphan { .. }))
    }
}

impl From<LinkageError> for LedgerError {
    fn from(err: LinkageError) -> Self {
        LedgerError::Linkage(err)
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
