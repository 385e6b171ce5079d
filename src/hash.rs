//! Hash engine: digests over canonical encodings

use bitcoin_hashes::{sha256d, Hash as _};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

use crate::serialize::{serialize_block_header, serialize_transaction_body, HeaderFields};
use crate::types::*;

/// SHA256(SHA256(data))
pub fn sha256d(data: &[u8]) -> Hash {
    Hash::from_bytes(sha256d::Hash::hash(data).into_inner())
}

/// RIPEMD160(SHA256(data))
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let sha256_hash = Sha256::digest(data);
    let ripemd160_hash = Ripemd160::digest(sha256_hash);
    let mut out = [0u8; 20];
    out.copy_from_slice(&ripemd160_hash);
    out
}

/// TxHash: ℐ* × 𝒪* → ℍ
///
/// SHA256d over the canonical body; independent of input/output order.
pub fn tx_hash(inputs: &[Input], outputs: &[Output]) -> Hash {
    sha256d(&serialize_transaction_body(inputs, outputs))
}

/// BlockHash: ℋ → ℍ
pub fn block_hash(fields: &HeaderFields<'_>) -> Hash {
    sha256d(&serialize_block_header(fields))
}
