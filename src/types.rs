//! Core ledger types shared by every component

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::LedgerError;

/// Amount of value carried by an output
pub type Amount = u64;

/// Block height, genesis is 0
pub type Height = u64;

/// Fixed-length address string derived from a public key
pub type Address = String;

/// Open string-to-string metadata carried by transactions and blocks
pub type Properties = BTreeMap<String, String>;

/// 256-bit digest, rendered as 64 lowercase hex characters
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Hash([u8; 32]);

impl Hash {
    pub const LEN: usize = 32;
    pub const ZERO: Hash = Hash([0u8; 32]);

    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Hash(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, LedgerError> {
        let bytes = hex::decode(s)
            .map_err(|e| LedgerError::Serialization(format!("invalid hash hex {:?}: {}", s, e)))?;
        let bytes: [u8; 32] = bytes.try_into().map_err(|b: Vec<u8>| {
            LedgerError::Serialization(format!("hash must be {} bytes, got {}", Self::LEN, b.len()))
        })?;
        Ok(Hash(bytes))
    }

    /// Number of leading zero bits, reading the digest big-endian
    pub fn leading_zero_bits(&self) -> u32 {
        let mut bits = 0;
        for &byte in &self.0 {
            if byte == 0 {
                bits += 8;
            } else {
                bits += byte.leading_zeros();
                break;
            }
        }
        bits
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.to_hex())
    }
}

impl FromStr for Hash {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Hash::from_hex(s)
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Hash::from_hex(&s).map_err(D::Error::custom)
    }
}

/// Reference to one output of a confirmed transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutPoint {
    pub transaction_hash: Hash,
    pub index: u32,
}

impl OutPoint {
    pub fn new(transaction_hash: Hash, index: u32) -> Self {
        Self { transaction_hash, index }
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.transaction_hash, self.index)
    }
}

/// Transaction input: spends the output `index` of `transaction_hash`,
/// confirmed at `block_height`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Input {
    pub block_height: Height,
    pub transaction_hash: Hash,
    pub index: u32,
}

impl Input {
    pub fn outpoint(&self) -> OutPoint {
        OutPoint::new(self.transaction_hash, self.index)
    }
}

/// Transaction output: a new spendable unit owned by `address`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Output {
    pub index: u32,
    pub address: Address,
    pub amount: Amount,
}
