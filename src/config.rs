//! Ledger configuration
//!
//! Every tunable of the ledger core lives here. Difficulty and input
//! selection are policies; the config picks one of the built-ins, and
//! [`Ledger::with_policies`](crate::Ledger::with_policies) accepts custom ones.

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::{LedgerError, Result};
use crate::mempool::PoolOrdering;
use crate::pow::DifficultyConfig;
use crate::utxo::SelectionStrategy;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LedgerConfig {
    /// Block and transaction versions this client validates
    pub supported_versions: Vec<u32>,

    /// Proof-of-work predicate applied to block hashes
    pub difficulty: DifficultyConfig,

    /// Value an issuance transaction may mint per block, on top of fees
    pub block_reward: u64,

    /// Maximum number of pending transactions held
    pub max_pool_size: usize,

    pub pool_ordering: PoolOrdering,

    pub selection: SelectionStrategy,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            supported_versions: vec![PROTOCOL_VERSION],
            difficulty: DifficultyConfig::default(),
            block_reward: DEFAULT_BLOCK_REWARD,
            max_pool_size: DEFAULT_MAX_POOL_SIZE,
            pool_ordering: PoolOrdering::default(),
            selection: SelectionStrategy::default(),
        }
    }
}

impl LedgerConfig {
    /// Parse from JSON; absent fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: LedgerConfig = serde_json::from_str(json)
            .map_err(|e| LedgerError::Config(format!("invalid ledger config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.supported_versions.is_empty() {
            return Err(LedgerError::Config("at least one supported version is required".to_string()));
        }
        if self.max_pool_size == 0 {
            return Err(LedgerError::Config("max_pool_size must be positive".to_string()));
        }
        if let DifficultyConfig::LeadingZeroBits { bits } = self.difficulty {
            if bits > 256 {
                return Err(LedgerError::Config(format!("difficulty of {} bits is unreachable", bits)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = LedgerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.supported_versions, vec![PROTOCOL_VERSION]);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = LedgerConfig::from_json(
            r#"{"blockReward": 50, "poolOrdering": "feePriority", "selection": "smallestFirst"}"#,
        )
        .unwrap();
        assert_eq!(config.block_reward, 50);
        assert_eq!(config.pool_ordering, PoolOrdering::FeePriority);
        assert_eq!(config.selection, SelectionStrategy::SmallestFirst);
        assert_eq!(config.max_pool_size, DEFAULT_MAX_POOL_SIZE);
    }

    #[test]
    fn test_target_difficulty_from_json() {
        let target = "00".repeat(2) + &"ff".repeat(30);
        let json = format!(r#"{{"difficulty": {{"kind": "target", "target": "{}"}}}}"#, target);
        let config = LedgerConfig::from_json(&json).unwrap();
        assert!(matches!(config.difficulty, DifficultyConfig::Target { .. }));
    }

    #[test]
    fn test_invalid_configs() {
        assert!(matches!(
            LedgerConfig::from_json(r#"{"supportedVersions": []}"#),
            Err(LedgerError::Config(_))
        ));
        assert!(LedgerConfig::from_json(r#"{"maxPoolSize": 0}"#).is_err());
        assert!(LedgerConfig::from_json(r#"{"difficulty": {"kind": "leadingZeroBits", "bits": 300}}"#).is_err());
        assert!(LedgerConfig::from_json("not json").is_err());
    }
}
