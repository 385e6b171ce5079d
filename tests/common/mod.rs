//! Shared fixtures for integration tests
#![allow(dead_code)]

use epicoin_ledger::*;

/// Low enough that a nonce search takes a handful of hashes
pub const TEST_DIFFICULTY_BITS: u32 = 4;

pub fn keys(fill: u8) -> KeyPair {
    KeyPair::from_secret_bytes(&[fill; 32]).expect("valid secret key")
}

pub fn config() -> LedgerConfig {
    LedgerConfig {
        difficulty: DifficultyConfig::LeadingZeroBits { bits: TEST_DIFFICULTY_BITS },
        ..LedgerConfig::default()
    }
}

/// Search nonces from zero until the block satisfies `policy`
pub fn mine(block: Block, policy: &dyn DifficultyPolicy) -> Block {
    (0u64..)
        .map(|nonce| block.with_nonce(nonce))
        .find(|candidate| policy.is_satisfied_by(candidate.hash()))
        .expect("nonce space exhausted")
}

/// Issuance transaction with one output per payee
pub fn reward(signer: &KeyPair, payees: &[(&KeyPair, Amount)]) -> Transaction {
    let outputs = payees
        .iter()
        .enumerate()
        .map(|(i, (owner, amount))| Output { index: i as u32, address: owner.address(), amount: *amount })
        .collect();
    Transaction::signed(PROTOCOL_VERSION, vec![], outputs, Properties::new(), signer)
        .expect("signed issuance")
}

pub fn mined_genesis(transactions: Vec<Transaction>, policy: &dyn DifficultyPolicy) -> Block {
    mine(Block::genesis(transactions, 0), policy)
}

/// Ledger at height 0 whose genesis pays `amount` to `owner`
pub fn funded_ledger(owner: &KeyPair, amount: Amount) -> (Ledger, Block) {
    let config = config();
    let genesis = mined_genesis(vec![reward(owner, &[(owner, amount)])], &config.difficulty);
    let ledger = Ledger::with_genesis(&config, &genesis).expect("genesis accepted");
    (ledger, genesis)
}

/// Mined block extending the ledger's tip
pub fn next_block(ledger: &Ledger, transactions: Vec<Transaction>) -> Block {
    let (height, previous) = match ledger.tip() {
        Some(tip) => (tip.height() + 1, *tip.hash()),
        None => (0, GENESIS_PREVIOUS_HASH),
    };
    let block = Block::new(PROTOCOL_VERSION, height, previous, 0, transactions, Properties::new());
    mine(block, ledger.difficulty())
}
