//! Signature engine: secp256k1 ECDSA over transaction hashes, and
//! address derivation from public keys

use secp256k1::ecdsa::Signature;
use secp256k1::{All, Message, PublicKey, Secp256k1, SecretKey};
use std::fmt;

use crate::constants::ADDRESS_LENGTH;
use crate::error::{LedgerError, Result};
use crate::hash::hash160;
use crate::types::{Address, Hash};

/// Source of the local signing key
///
/// Key storage lives outside the ledger; this is the seam it plugs into.
pub trait KeyProvider {
    fn has_key_pair(&self) -> bool;

    /// Sign `hash`, returning the hex-encoded compact signature
    fn sign(&self, hash: &Hash) -> Result<String>;

    /// Hex-encoded compressed public key
    fn public_key(&self) -> Result<String>;
}

/// In-memory secp256k1 key pair
#[derive(Clone)]
pub struct KeyPair {
    secp: Secp256k1<All>,
    secret_key: SecretKey,
    public_key: PublicKey,
}

impl KeyPair {
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self> {
        let secp = Secp256k1::new();
        let secret_key = SecretKey::from_slice(bytes)
            .map_err(|e| LedgerError::Key(format!("invalid secret key: {}", e)))?;
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        Ok(Self { secp, secret_key, public_key })
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key.serialize())
    }

    pub fn address(&self) -> Address {
        address_from_key(&self.public_key)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}

impl KeyProvider for KeyPair {
    fn has_key_pair(&self) -> bool {
        true
    }

    fn sign(&self, hash: &Hash) -> Result<String> {
        sign_with(&self.secp, &self.secret_key, hash)
    }

    fn public_key(&self) -> Result<String> {
        Ok(self.public_key_hex())
    }
}

/// Provider for a client that has not generated keys yet
#[derive(Debug, Clone, Copy, Default)]
pub struct NoKeys;

impl KeyProvider for NoKeys {
    fn has_key_pair(&self) -> bool {
        false
    }

    fn sign(&self, _hash: &Hash) -> Result<String> {
        Err(LedgerError::Key("no key pair available for signing".to_string()))
    }

    fn public_key(&self) -> Result<String> {
        Err(LedgerError::Key("no key pair available".to_string()))
    }
}

/// Sign: 𝕂ₚᵣᵢᵥ × ℍ → 𝕊
pub fn sign(secret_key: &SecretKey, hash: &Hash) -> Result<String> {
    sign_with(&Secp256k1::signing_only(), secret_key, hash)
}

fn sign_with<C: secp256k1::Signing>(
    secp: &Secp256k1<C>,
    secret_key: &SecretKey,
    hash: &Hash,
) -> Result<String> {
    let message = Message::from_digest_slice(hash.as_bytes())
        .map_err(|e| LedgerError::Key(format!("cannot sign digest: {}", e)))?;
    let signature = secp.sign_ecdsa(&message, secret_key);
    Ok(hex::encode(signature.serialize_compact()))
}

/// Verify: 𝕂ₚᵤ₆ × ℍ × 𝕊 → {true, false}
///
/// Fails closed: any malformed key or signature yields false.
pub fn verify(public_key_hex: &str, hash: &Hash, signature_hex: &str) -> bool {
    let public_key = match parse_public_key(public_key_hex) {
        Some(pk) => pk,
        None => return false,
    };

    let signature = match hex::decode(signature_hex)
        .ok()
        .and_then(|bytes| Signature::from_compact(&bytes).ok())
    {
        Some(sig) => sig,
        None => return false,
    };

    let message = match Message::from_digest_slice(hash.as_bytes()) {
        Ok(msg) => msg,
        Err(_) => return false,
    };

    Secp256k1::verification_only()
        .verify_ecdsa(&message, &signature, &public_key)
        .is_ok()
}

/// AddressOf: 𝕂ₚᵤ₆ → 𝔸
///
/// Lowercase hex of HASH160 over the compressed public key, always
/// `ADDRESS_LENGTH` characters.
pub fn address_of(public_key_hex: &str) -> Result<Address> {
    let public_key = parse_public_key(public_key_hex)
        .ok_or_else(|| LedgerError::Unauthorized(format!("malformed public key {:?}", public_key_hex)))?;
    Ok(address_from_key(&public_key))
}

/// Whether `address` has the shape produced by [`address_of`]
pub fn is_valid_address(address: &str) -> bool {
    address.len() == ADDRESS_LENGTH && address.bytes().all(|b| b.is_ascii_hexdigit())
}

fn address_from_key(public_key: &PublicKey) -> Address {
    hex::encode(hash160(&public_key.serialize()))
}

fn parse_public_key(public_key_hex: &str) -> Option<PublicKey> {
    let bytes = hex::decode(public_key_hex).ok()?;
    PublicKey::from_slice(&bytes).ok()
}
