//! Transaction model: the immutable transaction value, structural checks,
//! and the builder used by the local client to spend its own outputs

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::constants::*;
use crate::crypto::{address_of, is_valid_address, verify, KeyProvider};
use crate::error::{LedgerError, Result};
use crate::hash::tx_hash;
use crate::types::*;
use crate::utxo::{SelectionPolicy, UtxoSet};

/// A signed transfer of value.
///
/// The hash covers inputs and outputs only; it is fixed at construction and
/// checked against a fresh recomputation on every validation path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    version: u32,
    inputs: Vec<Input>,
    outputs: Vec<Output>,
    hash: Hash,
    signature: String,
    public_key: String,
    #[serde(default)]
    properties: Properties,
}

impl Transaction {
    /// Hash `inputs` and `outputs` and sign the result with `keys`
    pub fn signed(
        version: u32,
        inputs: Vec<Input>,
        outputs: Vec<Output>,
        properties: Properties,
        keys: &dyn KeyProvider,
    ) -> Result<Self> {
        if !keys.has_key_pair() {
            return Err(LedgerError::Key(
                "a key pair is required to sign a transaction".to_string(),
            ));
        }
        let hash = tx_hash(&inputs, &outputs);
        let signature = keys.sign(&hash)?;
        let public_key = keys.public_key()?;
        Ok(Self { version, inputs, outputs, hash, signature, public_key, properties })
    }

    /// Reassemble a transaction exactly as received; nothing is checked here
    pub fn from_parts(
        version: u32,
        inputs: Vec<Input>,
        outputs: Vec<Output>,
        hash: Hash,
        signature: String,
        public_key: String,
        properties: Properties,
    ) -> Self {
        Self { version, inputs, outputs, hash, signature, public_key, properties }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn inputs(&self) -> &[Input] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    pub fn hash(&self) -> &Hash {
        &self.hash
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn recompute_hash(&self) -> Hash {
        tx_hash(&self.inputs, &self.outputs)
    }

    pub fn has_consistent_hash(&self) -> bool {
        self.recompute_hash() == self.hash
    }

    /// Issuance transactions mint the block reward and spend nothing
    pub fn is_issuance(&self) -> bool {
        self.inputs.is_empty()
    }

    pub fn outpoints(&self) -> impl Iterator<Item = OutPoint> + '_ {
        self.inputs.iter().map(Input::outpoint)
    }

    pub fn created_outpoints(&self) -> impl Iterator<Item = (OutPoint, &Output)> + '_ {
        self.outputs.iter().map(move |o| (OutPoint::new(self.hash, o.index), o))
    }

    pub fn output_total(&self) -> Result<Amount> {
        self.outputs.iter().try_fold(0u64, |acc, o| {
            acc.checked_add(o.amount).ok_or_else(|| {
                LedgerError::Validation(format!("output total overflows in {}", self.hash))
            })
        })
    }

    /// Lock height from the `lockHeight` property, if present
    pub fn lock_height(&self) -> Result<Option<Height>> {
        match self.property(LOCK_HEIGHT_PROP) {
            None => Ok(None),
            Some(raw) => raw.parse::<Height>().map(Some).map_err(|_| {
                LedgerError::Validation(format!("invalid {} property {:?}", LOCK_HEIGHT_PROP, raw))
            }),
        }
    }

    /// A transaction must be confirmed in a block below its lock height
    pub fn is_expired_at(&self, height: Height) -> Result<bool> {
        Ok(matches!(self.lock_height()?, Some(lock) if height >= lock))
    }

    pub fn verify_signature(&self) -> bool {
        verify(&self.public_key, &self.hash, &self.signature)
    }

    /// Address controlled by the signing key
    pub fn signer_address(&self) -> Result<Address> {
        address_of(&self.public_key)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// CheckTransaction: 𝒯𝒳 → {valid, invalid}
///
/// A transaction is well-formed if and only if:
/// 1. |outs| > 0, |ins| ≤ MAX_INPUTS, |outs| ≤ MAX_OUTPUTS
/// 2. output indices are unique and every output address is well-shaped
/// 3. no input is listed twice
/// 4. the output total does not overflow
/// 5. the lock height property, if any, parses
/// 6. the stored hash equals a fresh recomputation
pub fn check_transaction(tx: &Transaction) -> Result<()> {
    if tx.outputs.is_empty() {
        return Err(LedgerError::Validation(format!("transaction {} has no outputs", tx.hash)));
    }

    if tx.inputs.len() > MAX_INPUTS {
        return Err(LedgerError::Validation(format!("too many inputs: {}", tx.inputs.len())));
    }

    if tx.outputs.len() > MAX_OUTPUTS {
        return Err(LedgerError::Validation(format!("too many outputs: {}", tx.outputs.len())));
    }

    let mut indices = HashSet::with_capacity(tx.outputs.len());
    for output in &tx.outputs {
        if !indices.insert(output.index) {
            return Err(LedgerError::Validation(format!(
                "duplicate output index {} in {}",
                output.index, tx.hash
            )));
        }
        if !is_valid_address(&output.address) {
            return Err(LedgerError::Validation(format!(
                "output {} has malformed address {:?}",
                output.index, output.address
            )));
        }
    }

    let mut spent = HashSet::with_capacity(tx.inputs.len());
    for input in &tx.inputs {
        if !spent.insert(input.outpoint()) {
            return Err(LedgerError::Validation(format!(
                "input {} listed twice in {}",
                input.outpoint(),
                tx.hash
            )));
        }
    }

    tx.output_total()?;
    tx.lock_height()?;

    if !tx.has_consistent_hash() {
        return Err(LedgerError::Validation(format!(
            "stored hash {} does not match contents ({})",
            tx.hash,
            tx.recompute_hash()
        )));
    }

    Ok(())
}

/// Builds a payment from the local key holder's unspent outputs.
///
/// Output 0 pays the recipient, output 1 returns change to the sender when
/// the selected inputs exceed amount plus fee.
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    recipient: Address,
    amount: Amount,
    fee: Amount,
    version: u32,
    properties: Properties,
}

impl TransactionBuilder {
    pub fn new(recipient: impl Into<Address>, amount: Amount) -> Self {
        Self {
            recipient: recipient.into(),
            amount,
            fee: 0,
            version: PROTOCOL_VERSION,
            properties: Properties::new(),
        }
    }

    pub fn fee(mut self, fee: Amount) -> Self {
        self.fee = fee;
        self
    }

    pub fn lock_height(mut self, height: Height) -> Self {
        self.properties.insert(LOCK_HEIGHT_PROP.to_string(), height.to_string());
        self
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Select inputs, lay out outputs, hash and sign.
    ///
    /// Outpoints in `reserved` (spent by pending transactions) are never selected.
    pub fn build(
        self,
        utxos: &UtxoSet,
        reserved: &HashSet<OutPoint>,
        policy: &dyn SelectionPolicy,
        keys: &dyn KeyProvider,
    ) -> Result<Transaction> {
        if !keys.has_key_pair() {
            return Err(LedgerError::Key(
                "you need a key pair in order to post a transaction".to_string(),
            ));
        }

        if !is_valid_address(&self.recipient) {
            return Err(LedgerError::Validation(format!(
                "recipient address must be {} hex characters",
                ADDRESS_LENGTH
            )));
        }

        if self.amount == 0 {
            return Err(LedgerError::Validation("amount must be positive".to_string()));
        }

        let required = self
            .amount
            .checked_add(self.fee)
            .ok_or_else(|| LedgerError::Validation("amount plus fee overflows".to_string()))?;

        let sender = address_of(&keys.public_key()?)?;
        let selection = utxos.select_inputs_excluding(&sender, required, policy, reserved)?;

        let mut outputs = vec![Output { index: 0, address: self.recipient, amount: self.amount }];
        let change = selection.total - required;
        if change > 0 {
            outputs.push(Output { index: 1, address: sender, amount: change });
        }

        Transaction::signed(self.version, selection.inputs, outputs, self.properties, keys)
    }
}
