//! UTXO accounting: what is spendable, by whom, and how confirmed
//! transactions move value

use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, warn};

use crate::error::{LedgerError, Result};
use crate::transaction::{check_transaction, Transaction};
use crate::types::*;

/// An unspent output together with where it was confirmed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtxoEntry {
    pub output: Output,
    pub height: Height,
    /// Creation order across the whole set
    pub sequence: u64,
}

/// Spendable output offered to a selection policy
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub outpoint: OutPoint,
    pub entry: &'a UtxoEntry,
}

/// Decides which unspent outputs fund a payment.
///
/// Candidates arrive in creation order; the policy reorders them and inputs
/// are then taken from the front until the target is covered. Sorting must
/// be stable so ties keep creation order.
pub trait SelectionPolicy: Send + Sync {
    fn order(&self, candidates: &mut [Candidate<'_>]);
}

/// Built-in selection policies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SelectionStrategy {
    #[default]
    OldestFirst,
    SmallestFirst,
    LargestFirst,
}

impl SelectionPolicy for SelectionStrategy {
    fn order(&self, candidates: &mut [Candidate<'_>]) {
        match self {
            SelectionStrategy::OldestFirst => {}
            SelectionStrategy::SmallestFirst => {
                candidates.sort_by_key(|c| c.entry.output.amount)
            }
            SelectionStrategy::LargestFirst => {
                candidates.sort_by_key(|c| Reverse(c.entry.output.amount))
            }
        }
    }
}

/// Inputs chosen to cover a payment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub inputs: Vec<Input>,
    pub total: Amount,
}

/// What a single applied transaction changed, for rollback
#[derive(Debug, Clone, Default)]
pub struct TransactionUndo {
    spent: Vec<(OutPoint, UtxoEntry)>,
    created: Vec<OutPoint>,
}

/// What an applied block changed, newest transaction last
#[derive(Debug, Clone, Default)]
pub struct BlockUndo {
    transactions: Vec<TransactionUndo>,
}

impl BlockUndo {
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

/// Set of unspent outputs keyed by (transaction hash, output index)
#[derive(Debug, Clone, Default)]
pub struct UtxoSet {
    entries: HashMap<OutPoint, UtxoEntry>,
    by_address: HashMap<Address, BTreeMap<u64, OutPoint>>,
    next_sequence: u64,
}

impl UtxoSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, outpoint: &OutPoint) -> Option<&UtxoEntry> {
        self.entries.get(outpoint)
    }

    pub fn contains(&self, outpoint: &OutPoint) -> bool {
        self.entries.contains_key(outpoint)
    }

    /// Add a new unspent output; an outpoint may appear only once
    pub fn insert(&mut self, outpoint: OutPoint, output: Output, height: Height) -> Result<()> {
        if self.entries.contains_key(&outpoint) {
            return Err(LedgerError::Duplicate(format!("output {} already unspent", outpoint)));
        }
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.restore(outpoint, UtxoEntry { output, height, sequence });
        Ok(())
    }

    pub fn remove(&mut self, outpoint: &OutPoint) -> Option<UtxoEntry> {
        let entry = self.entries.remove(outpoint)?;
        if let Some(index) = self.by_address.get_mut(&entry.output.address) {
            index.remove(&entry.sequence);
            if index.is_empty() {
                self.by_address.remove(&entry.output.address);
            }
        }
        Some(entry)
    }

    /// Reinsert an entry with its original creation sequence
    fn restore(&mut self, outpoint: OutPoint, entry: UtxoEntry) {
        self.by_address
            .entry(entry.output.address.clone())
            .or_default()
            .insert(entry.sequence, outpoint);
        self.entries.insert(outpoint, entry);
    }

    /// Unspent outputs owned by `address`, oldest first
    pub fn unspent_for<'a>(&'a self, address: &str) -> Vec<Candidate<'a>> {
        self.by_address
            .get(address)
            .into_iter()
            .flat_map(|index| index.values())
            .filter_map(|outpoint| {
                self.entries.get(outpoint).map(|entry| Candidate { outpoint: *outpoint, entry })
            })
            .collect()
    }

    /// AvailableBalance: 𝔸 → ℕ
    pub fn available_balance(&self, address: &str) -> Amount {
        self.unspent_for(address)
            .iter()
            .fold(0u64, |acc, c| acc.saturating_add(c.entry.output.amount))
    }

    /// SelectInputs: 𝔸 × ℕ → ℐ* ∪ {insufficient}
    pub fn select_inputs(
        &self,
        address: &str,
        amount: Amount,
        policy: &dyn SelectionPolicy,
    ) -> Result<Selection> {
        self.select_inputs_excluding(address, amount, policy, &HashSet::new())
    }

    /// As [`select_inputs`](Self::select_inputs), never choosing an outpoint in `reserved`
    pub fn select_inputs_excluding(
        &self,
        address: &str,
        amount: Amount,
        policy: &dyn SelectionPolicy,
        reserved: &HashSet<OutPoint>,
    ) -> Result<Selection> {
        if amount == 0 {
            return Err(LedgerError::Validation("cannot select inputs for a zero amount".to_string()));
        }

        let mut candidates: Vec<Candidate<'_>> = self
            .unspent_for(address)
            .into_iter()
            .filter(|c| !reserved.contains(&c.outpoint))
            .collect();
        policy.order(&mut candidates);

        let mut inputs = Vec::new();
        let mut total: Amount = 0;
        for candidate in &candidates {
            if total >= amount {
                break;
            }
            inputs.push(Input {
                block_height: candidate.entry.height,
                transaction_hash: candidate.outpoint.transaction_hash,
                index: candidate.outpoint.index,
            });
            total = total.saturating_add(candidate.entry.output.amount);
        }

        if total < amount {
            let available = candidates
                .iter()
                .fold(0u64, |acc, c| acc.saturating_add(c.entry.output.amount));
            return Err(LedgerError::InsufficientFunds { requested: amount, available });
        }

        Ok(Selection { inputs, total })
    }

    /// CheckSpend: 𝒯𝒳 × 𝒰𝒮 → ℕ ∪ {error}
    ///
    /// For a non-issuance transaction tx against this set:
    /// 1. tx.signature must verify over tx.hash under tx.public_key
    /// 2. every input must exist here, confirmed at the height it names
    /// 3. every referenced output must belong to address_of(tx.public_key)
    /// 4. Σ inputs ≥ Σ outputs
    ///
    /// Returns the fee Σ inputs − Σ outputs. Nothing is mutated.
    pub fn check_spend(&self, tx: &Transaction) -> Result<Amount> {
        if !tx.verify_signature() {
            return Err(LedgerError::Unauthorized(format!("bad signature on {}", tx.hash())));
        }
        if tx.is_issuance() {
            return Ok(0);
        }

        let signer = tx.signer_address()?;
        let mut input_total: Amount = 0;
        for input in tx.inputs() {
            let outpoint = input.outpoint();
            let entry = self.entries.get(&outpoint).ok_or(LedgerError::DoubleSpend { outpoint })?;

            if entry.height != input.block_height {
                return Err(LedgerError::Validation(format!(
                    "input {} names block {} but was confirmed at {}",
                    outpoint, input.block_height, entry.height
                )));
            }
            if entry.output.address != signer {
                return Err(LedgerError::Unauthorized(format!(
                    "{} may not spend output {} owned by {}",
                    signer, outpoint, entry.output.address
                )));
            }
            input_total = input_total.checked_add(entry.output.amount).ok_or_else(|| {
                LedgerError::Validation(format!("input total overflows in {}", tx.hash()))
            })?;
        }

        let output_total = tx.output_total()?;
        if output_total > input_total {
            return Err(LedgerError::Imbalanced { inputs: input_total, outputs: output_total });
        }
        Ok(input_total - output_total)
    }

    /// ApplyTransaction: 𝒯𝒳 × 𝒰𝒮 → 𝒰𝒮
    ///
    /// us' = (us \ {i.outpoint : i ∈ tx.inputs}) ∪ {(tx.hash, o.index) ↦ o : o ∈ tx.outputs}
    ///
    /// Issuance has no inputs to balance against and is only applied through
    /// [`apply_block`](Self::apply_block), where its reward bound is known.
    /// A failure leaves the set untouched.
    pub fn apply_transaction(&mut self, tx: &Transaction, height: Height) -> Result<TransactionUndo> {
        if tx.is_issuance() {
            return Err(LedgerError::Imbalanced { inputs: 0, outputs: tx.output_total()? });
        }
        self.apply_with_fee(tx, height).map(|(undo, _)| undo)
    }

    fn apply_with_fee(&mut self, tx: &Transaction, height: Height) -> Result<(TransactionUndo, Amount)> {
        check_transaction(tx)?;
        let fee = self.check_spend(tx)?;

        for (outpoint, _) in tx.created_outpoints() {
            if self.entries.contains_key(&outpoint) {
                return Err(LedgerError::Duplicate(format!("output {} already unspent", outpoint)));
            }
        }

        let mut undo = TransactionUndo::default();
        for outpoint in tx.outpoints() {
            match self.remove(&outpoint) {
                Some(entry) => undo.spent.push((outpoint, entry)),
                None => {
                    self.revert_transaction(undo);
                    return Err(LedgerError::DoubleSpend { outpoint });
                }
            }
        }
        for (outpoint, output) in tx.created_outpoints() {
            if let Err(err) = self.insert(outpoint, output.clone(), height) {
                self.revert_transaction(undo);
                return Err(err);
            }
            undo.created.push(outpoint);
        }
        Ok((undo, fee))
    }

    pub fn revert_transaction(&mut self, undo: TransactionUndo) {
        for outpoint in &undo.created {
            self.remove(outpoint);
        }
        for (outpoint, entry) in undo.spent {
            self.restore(outpoint, entry);
        }
    }

    /// ApplyBlock: 𝒯𝒳* × 𝒰𝒮 × ℕ → 𝒰𝒮 ∪ {error}
    ///
    /// 1. At most one issuance transaction, and only at position 0
    /// 2. Apply every transaction in order, summing fees
    /// 3. Issuance output total must not exceed block_reward + fees
    /// 4. Any failure reverts everything applied so far
    pub fn apply_block(
        &mut self,
        height: Height,
        transactions: &[Transaction],
        block_reward: Amount,
    ) -> Result<BlockUndo> {
        for (i, tx) in transactions.iter().enumerate() {
            if tx.is_issuance() && i != 0 {
                return Err(LedgerError::Validation(format!(
                    "issuance transaction {} must be first in block {}",
                    tx.hash(),
                    height
                )));
            }
        }

        let mut undo = BlockUndo::default();
        match self.apply_all(height, transactions, block_reward, &mut undo) {
            Ok(()) => {
                debug!(height, transactions = transactions.len(), utxos = self.len(), "applied block");
                Ok(undo)
            }
            Err(err) => {
                warn!(height, error = %err, "rolling back partially applied block");
                self.revert_block(undo);
                Err(err)
            }
        }
    }

    fn apply_all(
        &mut self,
        height: Height,
        transactions: &[Transaction],
        block_reward: Amount,
        undo: &mut BlockUndo,
    ) -> Result<()> {
        let mut fees: Amount = 0;
        for tx in transactions {
            let (tx_undo, fee) = self.apply_with_fee(tx, height)?;
            undo.transactions.push(tx_undo);
            fees = fees.saturating_add(fee);
        }

        if let Some(issuance) = transactions.first().filter(|tx| tx.is_issuance()) {
            let allowance = block_reward.saturating_add(fees);
            let minted = issuance.output_total()?;
            if minted > allowance {
                return Err(LedgerError::Imbalanced { inputs: allowance, outputs: minted });
            }
        }
        Ok(())
    }

    pub fn revert_block(&mut self, undo: BlockUndo) {
        for tx_undo in undo.transactions.into_iter().rev() {
            self.revert_transaction(tx_undo);
        }
    }
}
