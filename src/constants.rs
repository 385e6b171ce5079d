//! Ledger protocol constants

use crate::types::Hash;

/// Current transaction and block version
pub const PROTOCOL_VERSION: u32 = 1;

/// Address length: hex-encoded HASH160 of a compressed public key
pub const ADDRESS_LENGTH: usize = 40;

/// Transaction property naming the last block height (exclusive) the
/// transaction may be confirmed before
pub const LOCK_HEIGHT_PROP: &str = "lockHeight";

/// `previous_hash` carried by the genesis block
pub const GENESIS_PREVIOUS_HASH: Hash = Hash::ZERO;

/// Default issuance allowed per block, on top of collected fees
pub const DEFAULT_BLOCK_REWARD: u64 = 100;

/// Default leading zero bits demanded of a block hash
pub const DEFAULT_DIFFICULTY_BITS: u32 = 8;

/// Default pending pool capacity
pub const DEFAULT_MAX_POOL_SIZE: usize = 10_000;

/// Maximum number of inputs per transaction
pub const MAX_INPUTS: usize = 1000;

/// Maximum number of outputs per transaction
pub const MAX_OUTPUTS: usize = 1000;

/// Domain separation tag prefixed to serialized transaction bodies
pub const TX_ENCODING_TAG: &[u8] = b"epicoin/tx/v1";

/// Domain separation tag prefixed to serialized block headers
pub const BLOCK_ENCODING_TAG: &[u8] = b"epicoin/block/v1";
