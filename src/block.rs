//! Block model: an immutable, hash-linked batch of transactions

use serde::{Deserialize, Serialize};

use crate::constants::{GENESIS_PREVIOUS_HASH, PROTOCOL_VERSION};
use crate::error::Result;
use crate::hash::block_hash;
use crate::serialize::HeaderFields;
use crate::transaction::Transaction;
use crate::types::*;

/// Block: ℬ = version × height × ℍ(prev) × ℍ × nonce × 𝒯𝒳* × properties
///
/// The hash commits to version, height, previous hash, the ordered
/// transaction hashes and the nonce. Properties are metadata and are not
/// committed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    version: u32,
    height: Height,
    previous_hash: Hash,
    hash: Hash,
    nonce: u64,
    transactions: Vec<Transaction>,
    #[serde(default)]
    properties: Properties,
}

impl Block {
    /// Assemble a block and compute its hash
    pub fn new(
        version: u32,
        height: Height,
        previous_hash: Hash,
        nonce: u64,
        transactions: Vec<Transaction>,
        properties: Properties,
    ) -> Self {
        let mut block = Self {
            version,
            height,
            previous_hash,
            hash: Hash::ZERO,
            nonce,
            transactions,
            properties,
        };
        block.hash = block.compute_hash();
        block
    }

    /// Genesis block at height 0 carrying the genesis sentinel
    pub fn genesis(transactions: Vec<Transaction>, nonce: u64) -> Self {
        Self::new(
            PROTOCOL_VERSION,
            0,
            GENESIS_PREVIOUS_HASH,
            nonce,
            transactions,
            Properties::new(),
        )
    }

    /// Reassemble a block exactly as received; nothing is checked here
    pub fn from_parts(
        version: u32,
        height: Height,
        previous_hash: Hash,
        hash: Hash,
        nonce: u64,
        transactions: Vec<Transaction>,
        properties: Properties,
    ) -> Self {
        Self { version, height, previous_hash, hash, nonce, transactions, properties }
    }

    /// The same block with a different nonce, rehashed
    pub fn with_nonce(&self, nonce: u64) -> Self {
        Self::new(
            self.version,
            self.height,
            self.previous_hash,
            nonce,
            self.transactions.clone(),
            self.properties.clone(),
        )
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn height(&self) -> Height {
        self.height
    }

    pub fn previous_hash(&self) -> &Hash {
        &self.previous_hash
    }

    pub fn hash(&self) -> &Hash {
        &self.hash
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn is_genesis(&self) -> bool {
        self.height == 0
    }

    pub fn transaction_hashes(&self) -> Vec<Hash> {
        self.transactions.iter().map(|tx| *tx.hash()).collect()
    }

    pub fn compute_hash(&self) -> Hash {
        let transaction_hashes = self.transaction_hashes();
        block_hash(&HeaderFields {
            version: self.version,
            height: self.height,
            previous_hash: &self.previous_hash,
            transaction_hashes: &transaction_hashes,
            nonce: self.nonce,
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
