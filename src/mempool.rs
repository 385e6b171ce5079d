//! Pending pool: transactions seen but not yet confirmed in a block

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

use crate::constants::DEFAULT_MAX_POOL_SIZE;
use crate::error::{LedgerError, Result};
use crate::transaction::Transaction;
use crate::types::*;

/// Order in which pool contents are listed and evicted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PoolOrdering {
    /// Oldest first; a full pool rejects newcomers
    #[default]
    Insertion,
    /// Highest fee first; a full pool evicts its cheapest entry for a
    /// newcomer paying strictly more
    FeePriority,
}

/// A pending transaction with pool bookkeeping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolEntry {
    pub transaction: Transaction,
    pub fee: Amount,
    sequence: u64,
}

/// Pending transactions keyed by hash
#[derive(Debug, Clone)]
pub struct PendingPool {
    entries: HashMap<Hash, PoolEntry>,
    arrival: BTreeMap<u64, Hash>,
    spent_by: HashMap<OutPoint, Hash>,
    next_sequence: u64,
    capacity: usize,
    ordering: PoolOrdering,
}

impl Default for PendingPool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_POOL_SIZE, PoolOrdering::Insertion)
    }
}

impl PendingPool {
    pub fn new(capacity: usize, ordering: PoolOrdering) -> Self {
        Self {
            entries: HashMap::new(),
            arrival: BTreeMap::new(),
            spent_by: HashMap::new(),
            next_sequence: 0,
            capacity,
            ordering,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.entries.contains_key(hash)
    }

    pub fn get(&self, hash: &Hash) -> Option<&PoolEntry> {
        self.entries.get(hash)
    }

    /// Outpoints already claimed by pending transactions
    pub fn reserved_outpoints(&self) -> HashSet<OutPoint> {
        self.spent_by.keys().copied().collect()
    }

    /// AddPending: 𝒯𝒳 × ℕ → {accepted, duplicate, full}
    ///
    /// 1. Reject if the hash is already pending
    /// 2. Reject if any input is already claimed by another pending transaction
    /// 3. If full: under fee priority evict the cheapest entry when the
    ///    newcomer pays more, otherwise reject
    /// 4. Insert and claim the inputs
    pub fn add(&mut self, transaction: Transaction, fee: Amount) -> Result<()> {
        let hash = *transaction.hash();
        if self.entries.contains_key(&hash) {
            return Err(LedgerError::Duplicate(format!("transaction {} already pending", hash)));
        }

        for outpoint in transaction.outpoints() {
            if let Some(other) = self.spent_by.get(&outpoint) {
                return Err(LedgerError::Duplicate(format!(
                    "output {} already spent by pending transaction {}",
                    outpoint, other
                )));
            }
        }

        if self.entries.len() >= self.capacity {
            match self.eviction_candidate() {
                Some((victim, victim_fee)) if fee > victim_fee => {
                    debug!(evicted = %victim, fee = victim_fee, "evicting cheapest pending transaction");
                    self.remove_one(&victim);
                }
                _ => return Err(LedgerError::PoolFull { capacity: self.capacity }),
            }
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        for outpoint in transaction.outpoints() {
            self.spent_by.insert(outpoint, hash);
        }
        self.arrival.insert(sequence, hash);
        self.entries.insert(hash, PoolEntry { transaction, fee, sequence });
        debug!(%hash, fee, pending = self.entries.len(), "added pending transaction");
        Ok(())
    }

    fn eviction_candidate(&self) -> Option<(Hash, Amount)> {
        match self.ordering {
            PoolOrdering::Insertion => None,
            PoolOrdering::FeePriority => self
                .entries
                .values()
                .min_by_key(|e| (e.fee, std::cmp::Reverse(e.sequence)))
                .map(|e| (*e.transaction.hash(), e.fee)),
        }
    }

    fn remove_one(&mut self, hash: &Hash) -> Option<Transaction> {
        let entry = self.entries.remove(hash)?;
        self.arrival.remove(&entry.sequence);
        for outpoint in entry.transaction.outpoints() {
            if self.spent_by.get(&outpoint) == Some(hash) {
                self.spent_by.remove(&outpoint);
            }
        }
        Some(entry.transaction)
    }

    /// Purge the given hashes, returning what was actually removed
    pub fn remove(&mut self, hashes: &[Hash]) -> Vec<Transaction> {
        hashes.iter().filter_map(|hash| self.remove_one(hash)).collect()
    }

    /// Purge every pending transaction that spends one of `outpoints`
    pub fn purge_spent<'a>(&mut self, outpoints: impl IntoIterator<Item = &'a OutPoint>) -> Vec<Transaction> {
        let conflicting: Vec<Hash> = outpoints
            .into_iter()
            .filter_map(|outpoint| self.spent_by.get(outpoint).copied())
            .collect();
        self.remove(&conflicting)
    }

    /// Purge transactions that may no longer be confirmed at `next_height`
    pub fn purge_expired(&mut self, next_height: Height) -> Vec<Transaction> {
        let expired: Vec<Hash> = self
            .entries
            .values()
            .filter(|e| e.transaction.is_expired_at(next_height).unwrap_or(true))
            .map(|e| *e.transaction.hash())
            .collect();
        self.remove(&expired)
    }

    /// Pending transactions in listing order
    pub fn contents(&self) -> Vec<&Transaction> {
        self.ordered_entries().into_iter().map(|e| &e.transaction).collect()
    }

    pub fn ordered_entries(&self) -> Vec<&PoolEntry> {
        let mut entries: Vec<&PoolEntry> =
            self.arrival.values().filter_map(|hash| self.entries.get(hash)).collect();
        if self.ordering == PoolOrdering::FeePriority {
            // Stable sort keeps arrival order among equal fees
            entries.sort_by(|a, b| b.fee.cmp(&a.fee));
        }
        entries
    }
}
