//! Error path tests: every rejection leaves the ledger as it was

mod common;

use common::*;
use epicoin_ledger::*;

fn spend(signer: &KeyPair, input: Input, outputs: Vec<Output>) -> Transaction {
    Transaction::signed(PROTOCOL_VERSION, vec![input], outputs, Properties::new(), signer).unwrap()
}

fn genesis_input(genesis: &Block, index: u32) -> Input {
    Input { block_height: 0, transaction_hash: genesis.transaction_hashes()[0], index }
}

fn pay(to: &KeyPair, amount: Amount) -> Vec<Output> {
    vec![Output { index: 0, address: to.address(), amount }]
}

#[test]
fn test_spending_foreign_output_is_unauthorized() {
    let alice = keys(1);
    let mallory = keys(2);
    let (ledger, genesis) = funded_ledger(&alice, 100);

    let theft = spend(&mallory, genesis_input(&genesis, 0), pay(&mallory, 100));
    assert!(theft.verify_signature());
    assert!(matches!(ledger.submit_transaction(theft), Err(LedgerError::Unauthorized(_))));
    assert!(ledger.pending().is_empty());
}

#[test]
fn test_forged_signature_is_unauthorized() {
    let alice = keys(1);
    let bob = keys(2);
    let (ledger, genesis) = funded_ledger(&alice, 100);

    let honest = spend(&alice, genesis_input(&genesis, 0), pay(&bob, 100));
    let other = spend(&alice, genesis_input(&genesis, 0), pay(&bob, 99));
    let forged = Transaction::from_parts(
        honest.version(),
        honest.inputs().to_vec(),
        honest.outputs().to_vec(),
        *honest.hash(),
        other.signature().to_string(),
        honest.public_key().to_string(),
        Properties::new(),
    );
    assert!(matches!(ledger.submit_transaction(forged), Err(LedgerError::Unauthorized(_))));
}

#[test]
fn test_altered_outputs_break_hash() {
    let alice = keys(1);
    let bob = keys(2);
    let mallory = keys(3);
    let (ledger, genesis) = funded_ledger(&alice, 100);

    let honest = spend(&alice, genesis_input(&genesis, 0), pay(&bob, 100));
    let redirected = Transaction::from_parts(
        honest.version(),
        honest.inputs().to_vec(),
        pay(&mallory, 100),
        *honest.hash(),
        honest.signature().to_string(),
        honest.public_key().to_string(),
        Properties::new(),
    );
    assert!(!redirected.has_consistent_hash());
    assert!(matches!(ledger.submit_transaction(redirected), Err(LedgerError::Validation(_))));
}

#[test]
fn test_input_must_name_confirming_height() {
    let alice = keys(1);
    let (ledger, genesis) = funded_ledger(&alice, 100);
    let mut input = genesis_input(&genesis, 0);
    input.block_height = 3;

    let tx = spend(&alice, input, pay(&alice, 100));
    assert!(matches!(ledger.submit_transaction(tx), Err(LedgerError::Validation(_))));
}

#[test]
fn test_outputs_exceeding_inputs_are_imbalanced() {
    let alice = keys(1);
    let (ledger, genesis) = funded_ledger(&alice, 100);
    let tx = spend(&alice, genesis_input(&genesis, 0), pay(&alice, 101));
    assert_eq!(
        ledger.submit_transaction(tx),
        Err(LedgerError::Imbalanced { inputs: 100, outputs: 101 })
    );
}

#[test]
fn test_unknown_input_is_double_spend() {
    let alice = keys(1);
    let (ledger, _) = funded_ledger(&alice, 100);
    let input = Input { block_height: 0, transaction_hash: Hash::from_bytes([4; 32]), index: 0 };
    let outpoint = input.outpoint();
    let tx = spend(&alice, input, pay(&alice, 1));
    assert_eq!(ledger.submit_transaction(tx), Err(LedgerError::DoubleSpend { outpoint }));
}

#[test]
fn test_building_requires_keys_and_valid_recipient() {
    let alice = keys(1);
    let bob = keys(2);
    let (ledger, _) = funded_ledger(&alice, 100);

    assert!(matches!(
        ledger.build_transaction(TransactionBuilder::new(bob.address(), 10), &NoKeys),
        Err(LedgerError::Key(_))
    ));
    assert!(matches!(
        ledger.build_transaction(TransactionBuilder::new("not-an-address", 10), &alice),
        Err(LedgerError::Validation(_))
    ));
    assert!(matches!(
        ledger.build_transaction(TransactionBuilder::new(bob.address(), 0), &alice),
        Err(LedgerError::Validation(_))
    ));
}

#[test]
fn test_duplicate_and_conflicting_submissions() -> anyhow::Result<()> {
    let alice = keys(1);
    let bob = keys(2);
    let (ledger, genesis) = funded_ledger(&alice, 100);

    let first = spend(&alice, genesis_input(&genesis, 0), pay(&bob, 100));
    ledger.submit_transaction(first.clone())?;
    assert!(matches!(ledger.submit_transaction(first), Err(LedgerError::Duplicate(_))));

    let conflicting = spend(&alice, genesis_input(&genesis, 0), pay(&alice, 100));
    assert!(matches!(ledger.submit_transaction(conflicting), Err(LedgerError::Duplicate(_))));
    assert_eq!(ledger.pending().len(), 1);
    Ok(())
}

#[test]
fn test_full_pool_rejects_or_evicts() -> anyhow::Result<()> {
    let alice = keys(1);
    let bob = keys(2);

    for (ordering, evicts) in [(PoolOrdering::Insertion, false), (PoolOrdering::FeePriority, true)] {
        let config = LedgerConfig { max_pool_size: 1, pool_ordering: ordering, ..config() };
        let genesis = mined_genesis(
            vec![reward(&alice, &[(&alice, 50), (&alice, 50)])],
            &config.difficulty,
        );
        let ledger = Ledger::with_genesis(&config, &genesis)?;

        let cheap = spend(&alice, genesis_input(&genesis, 0), pay(&bob, 49));
        let rich = spend(&alice, genesis_input(&genesis, 1), pay(&bob, 45));
        assert_eq!(ledger.submit_transaction(cheap)?, 1);

        let outcome = ledger.submit_transaction(rich.clone());
        if evicts {
            assert_eq!(outcome, Ok(5));
            assert_eq!(ledger.pending(), vec![rich]);
        } else {
            assert_eq!(outcome, Err(LedgerError::PoolFull { capacity: 1 }));
            assert_eq!(ledger.pending().len(), 1);
        }
    }
    Ok(())
}

#[test]
fn test_malformed_wire_data() {
    assert!(matches!(Transaction::from_json("{"), Err(LedgerError::Serialization(_))));
    assert!(matches!(
        Block::from_json(r#"{"version":1,"height":0,"previousHash":"zz"}"#),
        Err(LedgerError::Serialization(_))
    ));
    assert!(matches!(LedgerConfig::from_json(r#"{"blockReward": "many"}"#), Err(LedgerError::Config(_))));
}
