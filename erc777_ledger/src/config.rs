//! Token configuration.
//!
//! A [`LedgerConfig`] is fixed when a token contract is constructed. It can be built in code or
//! parsed from JSON with the `json` feature; any field missing from the JSON takes its default.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ledger::state::DEFAULT_HAMT_BIT_WIDTH;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("granularity must be at least 1")]
    ZeroGranularity,
    #[error("token {0} must not be empty")]
    Empty(&'static str),
    #[error("hamt bit width must be between 1 and 8, got {0}")]
    InvalidBitWidth(u32),
    #[cfg(feature = "json")]
    #[error("malformed config: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct LedgerConfig {
    pub name: String,
    pub symbol: String,
    /// Smallest indivisible amount, in atto units
    pub granularity: u64,
    /// Whether the token starts out exposing its ERC20 view
    pub erc20_compatible: bool,
    pub hamt_bit_width: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            name: String::from("ERC777 Token"),
            symbol: String::from("XRC"),
            granularity: 1,
            erc20_compatible: true,
            hamt_bit_width: DEFAULT_HAMT_BIT_WIDTH,
        }
    }
}

impl LedgerConfig {
    pub fn new(name: impl Into<String>, symbol: impl Into<String>, granularity: u64) -> Self {
        Self { name: name.into(), symbol: symbol.into(), granularity, ..Default::default() }
    }

    /// Parses and validates a JSON config
    #[cfg(feature = "json")]
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.granularity == 0 {
            return Err(ConfigError::ZeroGranularity);
        }
        if self.name.trim().is_empty() {
            return Err(ConfigError::Empty("name"));
        }
        if self.symbol.trim().is_empty() {
            return Err(ConfigError::Empty("symbol"));
        }
        if !(1..=8).contains(&self.hamt_bit_width) {
            return Err(ConfigError::InvalidBitWidth(self.hamt_bit_width));
        }
        Ok(())
    }
}
