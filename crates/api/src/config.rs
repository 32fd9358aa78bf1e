//! Application configuration loaded from environment variables.

use domain::{AccountId, ItemError};
use saga::{Gas, HopCosts};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} is not a valid account id: {source}")]
    InvalidAccount {
        var: &'static str,
        #[source]
        source: ItemError,
    },

    #[error("{var} must be an unsigned integer, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },
}

/// Server configuration.
///
/// Reads from environment variables:
/// - `HOST`, `PORT`: bind address (default `0.0.0.0:3000`)
/// - `RUST_LOG`: tracing filter directive (default `info`)
/// - `ORCHESTRATOR_ACCOUNT`: account the saga calls collaborators as
///   (default `composition.near`)
/// - `OWNER_ACCOUNT`: manages oracles (default `owner.near`)
/// - `GAS_LOCK_UNLOCK`, `GAS_METADATA`, `GAS_ROLLBACK`, `GAS_REPORTING`:
///   per-hop costs in gas units
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub orchestrator: AccountId,
    pub owner: AccountId,
    pub hop_costs: HopCosts,
}

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ORCHESTRATOR: &str = "composition.near";
const DEFAULT_OWNER: &str = "owner.near";

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let account = |var: &'static str, default: &str| {
            let value = lookup(var).unwrap_or_else(|| default.to_string());
            AccountId::parse(value).map_err(|source| ConfigError::InvalidAccount { var, source })
        };
        let gas = |var: &'static str, default: Gas| match lookup(var) {
            Some(value) => value
                .parse::<u64>()
                .map(Gas::new)
                .map_err(|_| ConfigError::InvalidNumber { var, value }),
            None => Ok(default),
        };

        let port = match lookup("PORT") {
            Some(value) => value
                .parse()
                .map_err(|_| ConfigError::InvalidNumber { var: "PORT", value })?,
            None => DEFAULT_PORT,
        };
        let costs = HopCosts::default();

        Ok(Self {
            host: lookup("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            log_level: lookup("RUST_LOG").unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            orchestrator: account("ORCHESTRATOR_ACCOUNT", DEFAULT_ORCHESTRATOR)?,
            owner: account("OWNER_ACCOUNT", DEFAULT_OWNER)?,
            hop_costs: HopCosts {
                lock_unlock_call: gas("GAS_LOCK_UNLOCK", costs.lock_unlock_call)?,
                metadata_call: gas("GAS_METADATA", costs.metadata_call)?,
                rollback_call: gas("GAS_ROLLBACK", costs.rollback_call)?,
                reporting_call: gas("GAS_REPORTING", costs.reporting_call)?,
            },
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
