//! Integration tests for block validation stages and pool upkeep

mod common;

use common::*;
use epicoin_ledger::*;

fn spend_all(owner: &KeyPair, funding: &Transaction, height: Height, to: &KeyPair, amount: Amount) -> Transaction {
    let input = Input { block_height: height, transaction_hash: *funding.hash(), index: 0 };
    let outputs = vec![Output { index: 0, address: to.address(), amount }];
    Transaction::signed(PROTOCOL_VERSION, vec![input], outputs, Properties::new(), owner).unwrap()
}

#[test]
fn test_orphan_accepted_after_parent_arrives() -> anyhow::Result<()> {
    let miner = keys(1);
    let config = config();
    let genesis = mined_genesis(vec![reward(&miner, &[(&miner, 100)])], &config.difficulty);
    let ledger = Ledger::new(&config)?;

    let child = mine(
        Block::new(PROTOCOL_VERSION, 1, *genesis.hash(), 0, vec![], Properties::new()),
        &config.difficulty,
    );
    let rejection = ledger.submit_block(&child).unwrap_err();
    assert!(rejection.is_retryable());
    assert!(matches!(
        rejection.error,
        LedgerError::Linkage(LinkageError::Orphan { height: 1, tip_height: None })
    ));

    ledger.submit_block(&genesis)?;
    assert!(matches!(ledger.submit_block(&child)?, Acceptance::Accepted { height: 1, .. }));
    Ok(())
}

#[test]
fn test_block_beyond_next_height_is_orphan() {
    let miner = keys(1);
    let (ledger, genesis) = funded_ledger(&miner, 100);
    let far = mine(
        Block::new(PROTOCOL_VERSION, 5, *genesis.hash(), 0, vec![], Properties::new()),
        ledger.difficulty(),
    );
    let rejection = ledger.submit_block(&far).unwrap_err();
    assert_eq!(
        rejection.error,
        LedgerError::Linkage(LinkageError::Orphan { height: 5, tip_height: Some(0) })
    );
}

#[test]
fn test_competing_block_at_same_height() {
    let miner = keys(1);
    let (ledger, genesis) = funded_ledger(&miner, 100);
    let rival = mined_genesis(vec![reward(&miner, &[(&miner, 99)])], ledger.difficulty());

    let rejection = ledger.submit_block(&rival).unwrap_err();
    assert_eq!(
        rejection.error,
        LedgerError::Linkage(LinkageError::HeightConflict { height: 0, existing: *genesis.hash() })
    );
}

#[test]
fn test_insufficient_work_rejected() {
    let miner = keys(1);
    let config = LedgerConfig {
        difficulty: DifficultyConfig::LeadingZeroBits { bits: 255 },
        ..LedgerConfig::default()
    };
    let ledger = Ledger::new(&config).unwrap();
    let genesis = Block::genesis(vec![reward(&miner, &[(&miner, 100)])], 0);

    let rejection = ledger.submit_block(&genesis).unwrap_err();
    assert_eq!(rejection.stage, ValidationStage::LinkageValid);
    assert!(matches!(rejection.error, LedgerError::ProofOfWork(_)));
    assert!(ledger.tip().is_none());
}

#[test]
fn test_target_threshold_policy() -> anyhow::Result<()> {
    let miner = keys(1);
    let mut target = [0; 32];
    target[0] = 0x10;
    let config = LedgerConfig {
        difficulty: DifficultyConfig::Target { target: Hash::from_bytes(target) },
        ..LedgerConfig::default()
    };
    let genesis = mined_genesis(vec![reward(&miner, &[(&miner, 100)])], &config.difficulty);
    assert!(genesis.hash().as_bytes()[0] < 0x10);

    let ledger = Ledger::with_genesis(&config, &genesis)?;
    assert_eq!(ledger.available_balance(&miner.address()), 100);
    Ok(())
}

#[test]
fn test_custom_policies() -> anyhow::Result<()> {
    struct EvenFirstByte;
    impl DifficultyPolicy for EvenFirstByte {
        fn is_satisfied_by(&self, hash: &Hash) -> bool {
            hash.as_bytes()[0] % 2 == 0
        }
    }

    let miner = keys(1);
    let ledger = Ledger::with_policies(
        &LedgerConfig::default(),
        Box::new(EvenFirstByte),
        std::sync::Arc::new(SelectionStrategy::LargestFirst),
    )?;
    let genesis = mine(
        Block::genesis(vec![reward(&miner, &[(&miner, 10), (&miner, 60), (&miner, 30)])], 0),
        &EvenFirstByte,
    );
    ledger.submit_block(&genesis)?;

    let selection = ledger.select_inputs(&miner.address(), 50)?;
    assert_eq!(selection.inputs.len(), 1);
    assert_eq!(selection.total, 60);
    Ok(())
}

#[test]
fn test_issuance_bounded_by_reward_and_fees() -> anyhow::Result<()> {
    let alice = keys(1);
    let bob = keys(2);
    let miner = keys(3);
    let (ledger, _) = funded_ledger(&alice, 100);
    ledger.post_transaction(TransactionBuilder::new(bob.address(), 40).fee(5), &alice)?;
    let pending = ledger.pending();

    let greedy = next_block(&ledger, [vec![reward(&miner, &[(&miner, 106)])], pending.clone()].concat());
    let rejection = ledger.submit_block(&greedy).unwrap_err();
    assert_eq!(rejection.error, LedgerError::Imbalanced { inputs: 105, outputs: 106 });
    assert_eq!(ledger.available_balance(&alice.address()), 100);
    assert_eq!(ledger.pending().len(), 1);

    let fair = next_block(&ledger, [vec![reward(&miner, &[(&miner, 105)])], pending].concat());
    ledger.submit_block(&fair)?;
    assert_eq!(ledger.available_balance(&miner.address()), 105);
    assert_eq!(ledger.available_balance(&bob.address()), 40);
    assert_eq!(ledger.available_balance(&alice.address()), 55);
    Ok(())
}

#[test]
fn test_issuance_must_lead_block() -> anyhow::Result<()> {
    let alice = keys(1);
    let miner = keys(3);
    let (ledger, genesis) = funded_ledger(&alice, 100);
    let spend = spend_all(&alice, &genesis.transactions()[0], 0, &alice, 100);

    let block = next_block(&ledger, vec![spend, reward(&miner, &[(&miner, 100)])]);
    let rejection = ledger.submit_block(&block).unwrap_err();
    assert_eq!(rejection.stage, ValidationStage::ProofOfWorkValid);
    assert!(matches!(rejection.error, LedgerError::Validation(_)));
    Ok(())
}

#[test]
fn test_failed_block_leaves_state_untouched() -> anyhow::Result<()> {
    let alice = keys(1);
    let bob = keys(2);
    let (ledger, genesis) = funded_ledger(&alice, 100);
    let funding = &genesis.transactions()[0];

    let first = spend_all(&alice, funding, 0, &bob, 100);
    let again = spend_all(&alice, funding, 0, &alice, 100);
    let block = next_block(&ledger, vec![first, again]);

    let before = ledger.read(|s| (s.chain().len(), s.utxos().len()));
    let rejection = ledger.submit_block(&block).unwrap_err();
    assert!(matches!(rejection.error, LedgerError::DoubleSpend { .. }));
    assert_eq!(ledger.read(|s| (s.chain().len(), s.utxos().len())), before);
    assert_eq!(ledger.available_balance(&alice.address()), 100);
    assert_eq!(ledger.available_balance(&bob.address()), 0);
    Ok(())
}

#[test]
fn test_confirmed_conflict_purges_pending() -> anyhow::Result<()> {
    let alice = keys(1);
    let bob = keys(2);
    let carol = keys(3);
    let (ledger, genesis) = funded_ledger(&alice, 100);

    let pending = ledger.post_transaction(TransactionBuilder::new(bob.address(), 10), &alice)?;
    let rival = spend_all(&alice, &genesis.transactions()[0], 0, &carol, 100);
    ledger.submit_block(&next_block(&ledger, vec![rival]))?;

    assert!(ledger.pending().is_empty());
    assert!(ledger.read(|s| !s.pool().contains(pending.hash())));
    assert_eq!(ledger.available_balance(&carol.address()), 100);
    Ok(())
}

#[test]
fn test_expired_pending_purged_on_acceptance() -> anyhow::Result<()> {
    let alice = keys(1);
    let bob = keys(2);
    let config = config();
    let genesis = mined_genesis(
        vec![reward(&alice, &[(&alice, 50), (&alice, 50)])],
        &config.difficulty,
    );
    let ledger = Ledger::with_genesis(&config, &genesis)?;

    // Confirmable in block 1 only
    let short = ledger.post_transaction(TransactionBuilder::new(bob.address(), 50).lock_height(2), &alice)?;
    let long = ledger.post_transaction(TransactionBuilder::new(bob.address(), 50).lock_height(9), &alice)?;
    assert_eq!(ledger.pending().len(), 2);

    ledger.submit_block(&next_block(&ledger, vec![]))?;
    assert_eq!(ledger.pending(), vec![long]);

    let late = next_block(&ledger, vec![short]);
    let rejection = ledger.submit_block(&late).unwrap_err();
    assert!(matches!(rejection.error, LedgerError::Validation(_)));
    Ok(())
}

#[test]
fn test_unsupported_versions_rejected() {
    let miner = keys(1);
    let config = config();
    let ledger = Ledger::new(&config).unwrap();

    let block = mine(
        Block::new(2, 0, GENESIS_PREVIOUS_HASH, 0, vec![], Properties::new()),
        &config.difficulty,
    );
    let rejection = ledger.submit_block(&block).unwrap_err();
    assert_eq!(rejection.stage, ValidationStage::Received);

    let outputs = vec![Output { index: 0, address: miner.address(), amount: 1 }];
    let tx = Transaction::signed(7, vec![], outputs, Properties::new(), &miner).unwrap();
    let block = mined_genesis(vec![tx], &config.difficulty);
    let rejection = ledger.submit_block(&block).unwrap_err();
    assert_eq!(rejection.stage, ValidationStage::ProofOfWorkValid);
    assert!(matches!(rejection.error, LedgerError::Validation(_)));
}
