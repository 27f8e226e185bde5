use std::{collections::HashMap, fs, path::Path, time::Duration};

use alloy::primitives::{address, Address};
use clmint_common::models::{
    error::RegistryError,
    position::DEADLINE_WINDOW,
    token::{TokenRegistry, TokenSymbol},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Static description of the chain liquidity is provided on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    pub name: String,
    pub chain_id: u64,
    pub rpc_url: String,
    /// Position router, spender of every approval.
    pub router: Address,
    pub tokens: HashMap<TokenSymbol, Address>,
}

impl ChainConfig {
    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&contents)?)
    }

    pub fn pharos_testnet() -> Self {
        Self {
            name: "pharos-testnet".to_string(),
            chain_id: 688688,
            rpc_url: "https://testnet.pharosnetwork.xyz".to_string(),
            router: address!("f8a1d4ff0f9b9af7ce58e1fc1833688f3bfd6115"),
            tokens: HashMap::from([
                (TokenSymbol::Phrs, address!("76aaada469d23216be5f7c596fa25f282ff9b364")),
                (TokenSymbol::Usdc, address!("72df0bcd7276f2dfbac900d1ce63c272c4bccced")),
                (TokenSymbol::Usdt, address!("d4071393f8716661958f766df660033b3d35fd29")),
            ]),
        }
    }

    pub fn registry(&self) -> Result<TokenRegistry, RegistryError> {
        TokenRegistry::new(self.router, self.tokens.clone())
    }
}

/// Retry policy of the confirmation tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    pub retry_delay: Duration,
    /// Upper bound for a single receipt lookup.
    pub attempt_timeout: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            retry_delay: Duration::from_millis(5000),
            attempt_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasConfig {
    /// Used when the node cannot estimate the mint call.
    pub fallback_gas_limit: u64,
    /// Safety margin applied to every gas limit, in percent of the base value.
    pub margin_percent: u64,
}

impl Default for GasConfig {
    fn default() -> Self {
        Self { fallback_gas_limit: 500_000, margin_percent: 120 }
    }
}

impl GasConfig {
    pub fn with_margin(&self, gas: u64) -> u64 {
        gas.saturating_mul(self.margin_percent) / 100
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProvisionerConfig {
    pub tracker: TrackerConfig,
    pub gas: GasConfig,
    /// How long the mint call stays executable after assembly.
    pub deadline_window: Duration,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            tracker: TrackerConfig::default(),
            gas: GasConfig::default(),
            deadline_window: DEADLINE_WINDOW,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use rstest::rstest;

    use super::*;

    #[test]
    fn test_pharos_testnet_builds_registry() {
        let registry = ChainConfig::pharos_testnet()
            .registry()
            .unwrap();

        assert_eq!(registry.router(), address!("f8a1d4ff0f9b9af7ce58e1fc1833688f3bfd6115"));
        assert_eq!(
            registry.resolve("wphrs").unwrap().address,
            address!("76aaada469d23216be5f7c596fa25f282ff9b364")
        );
    }

    #[test]
    fn test_from_yaml() {
        let yaml = r#"
name: local
chain_id: 31337
rpc_url: http://localhost:8545
router: "0x0000000000000000000000000000000000000001"
tokens:
  PHRS: "0x0000000000000000000000000000000000000002"
  USDC: "0x0000000000000000000000000000000000000003"
  USDT: "0x0000000000000000000000000000000000000004"
"#;
        let path = std::env::temp_dir().join(format!("clmint-chain-{}.yaml", std::process::id()));
        fs::File::create(&path)
            .unwrap()
            .write_all(yaml.as_bytes())
            .unwrap();

        let config = ChainConfig::from_yaml(&path).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(config.chain_id, 31337);
        assert_eq!(config.tokens[&TokenSymbol::Usdt], Address::with_last_byte(4));
        assert!(config.registry().is_ok());
    }

    #[test]
    fn test_from_yaml_missing_file() {
        let err = ChainConfig::from_yaml("/nonexistent/clmint.yaml").unwrap_err();

        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[rstest]
    #[case::fallback(500_000, 600_000)]
    #[case::estimate(250_000, 300_000)]
    #[case::rounds_down(1, 1)]
    fn test_gas_margin(#[case] gas: u64, #[case] expected: u64) {
        assert_eq!(GasConfig::default().with_margin(gas), expected);
    }

    #[test]
    fn test_defaults() {
        let config = ProvisionerConfig::default();

        assert_eq!(config.tracker.max_attempts, 5);
        assert_eq!(config.tracker.retry_delay, Duration::from_secs(5));
        assert_eq!(config.tracker.attempt_timeout, Duration::from_secs(60));
        assert_eq!(config.deadline_window, Duration::from_secs(1800));
    }
}
