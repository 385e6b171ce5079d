//! Canonical byte encoding of transaction bodies and block headers
//!
//! Every field is fixed-width big-endian or length-prefixed, so no two
//! distinct bodies share an encoding. Inputs and outputs are sorted before
//! encoding, which makes the bytes independent of list order.

use crate::constants::{BLOCK_ENCODING_TAG, TX_ENCODING_TAG};
use crate::types::*;

/// SerializeTransactionBody: ℐ* × 𝒪* → 𝔹*
///
/// 1. Sort inputs by (index, block_height, transaction_hash)
/// 2. Sort outputs by (index, address, amount)
/// 3. Emit tag ‖ |ins| ‖ ins ‖ |outs| ‖ outs
pub fn serialize_transaction_body(inputs: &[Input], outputs: &[Output]) -> Vec<u8> {
    let mut sorted_inputs: Vec<&Input> = inputs.iter().collect();
    sorted_inputs.sort_by(|a, b| {
        a.index
            .cmp(&b.index)
            .then_with(|| a.block_height.cmp(&b.block_height))
            .then_with(|| a.transaction_hash.cmp(&b.transaction_hash))
    });

    let mut sorted_outputs: Vec<&Output> = outputs.iter().collect();
    sorted_outputs.sort_by(|a, b| {
        a.index
            .cmp(&b.index)
            .then_with(|| a.address.cmp(&b.address))
            .then_with(|| a.amount.cmp(&b.amount))
    });

    let mut bytes = Vec::with_capacity(
        TX_ENCODING_TAG.len() + 8 + inputs.len() * 44 + outputs.len() * 56,
    );
    bytes.extend_from_slice(TX_ENCODING_TAG);

    write_len(&mut bytes, sorted_inputs.len());
    for input in sorted_inputs {
        bytes.extend_from_slice(&input.block_height.to_be_bytes());
        bytes.extend_from_slice(input.transaction_hash.as_bytes());
        bytes.extend_from_slice(&input.index.to_be_bytes());
    }

    write_len(&mut bytes, sorted_outputs.len());
    for output in sorted_outputs {
        bytes.extend_from_slice(&output.index.to_be_bytes());
        write_len(&mut bytes, output.address.len());
        bytes.extend_from_slice(output.address.as_bytes());
        bytes.extend_from_slice(&output.amount.to_be_bytes());
    }

    bytes
}

/// Header fields committed to by a block hash
#[derive(Debug, Clone, Copy)]
pub struct HeaderFields<'a> {
    pub version: u32,
    pub height: Height,
    pub previous_hash: &'a Hash,
    pub transaction_hashes: &'a [Hash],
    pub nonce: u64,
}

/// SerializeBlockHeader: ℋ → 𝔹*
///
/// tag ‖ version ‖ height ‖ previous_hash ‖ |txs| ‖ tx hashes (block order) ‖ nonce
pub fn serialize_block_header(fields: &HeaderFields<'_>) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(
        BLOCK_ENCODING_TAG.len() + 60 + fields.transaction_hashes.len() * Hash::LEN,
    );
    bytes.extend_from_slice(BLOCK_ENCODING_TAG);
    bytes.extend_from_slice(&fields.version.to_be_bytes());
    bytes.extend_from_slice(&fields.height.to_be_bytes());
    bytes.extend_from_slice(fields.previous_hash.as_bytes());
    write_len(&mut bytes, fields.transaction_hashes.len());
    for hash in fields.transaction_hashes {
        bytes.extend_from_slice(hash.as_bytes());
    }
    bytes.extend_from_slice(&fields.nonce.to_be_bytes());
    bytes
}

fn write_len(bytes: &mut Vec<u8>, len: usize) {
    // Lengths are bounded well below u32::MAX by MAX_INPUTS/MAX_OUTPUTS and address checks
    bytes.extend_from_slice(&(len as u32).to_be_bytes());
}
