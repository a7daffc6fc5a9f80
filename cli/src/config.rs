//! Vault configuration file
//!
//! ```toml
//! [vault]
//! genesis_timestamp = 1700000000
//! epoch_length_secs = 604800
//! lock_epochs = 16
//! maturity_rounding = "ceil"
//! base_token = "<base58>"
//! vault_address = "<base58>"
//! distributor = "<base58>"
//!
//! [roles]
//! harvester = "<base58>"
//! root_updater = "<base58>"
//! ```

use lockvault::{Address, MaturityRounding, Roles, VaultParams};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid address for `{field}`: {reason}")]
    InvalidAddress { field: String, reason: String },

    #[error("invalid vault parameters: {0}")]
    InvalidParams(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    pub vault: VaultSection,
    pub roles: RolesSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultSection {
    pub genesis_timestamp: u64,
    pub epoch_length_secs: u64,
    pub lock_epochs: u64,
    #[serde(default)]
    pub maturity_rounding: MaturityRounding,
    pub base_token: String,
    pub vault_address: String,
    pub distributor: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolesSection {
    pub harvester: String,
    pub root_updater: String,
}

impl VaultConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn params(&self) -> Result<VaultParams, ConfigError> {
        let v = &self.vault;
        let params = VaultParams {
            genesis_timestamp: v.genesis_timestamp,
            epoch_length_secs: v.epoch_length_secs,
            lock_epochs: v.lock_epochs,
            maturity_rounding: v.maturity_rounding,
            base_token: parse_address("vault.base_token", &v.base_token)?,
            vault_address: parse_address("vault.vault_address", &v.vault_address)?,
            distributor: parse_address("vault.distributor", &v.distributor)?,
        };
        params
            .validate()
            .map_err(|e| ConfigError::InvalidParams(e.to_string()))?;
        Ok(params)
    }

    pub fn roles(&self) -> Result<Roles, ConfigError> {
        Ok(Roles {
            harvester: parse_address("roles.harvester", &self.roles.harvester)?,
            root_updater: parse_address("roles.root_updater", &self.roles.root_updater)?,
        })
    }

    /// Sample configuration with deterministic placeholder addresses
    pub fn example() -> Self {
        let addr = |b: u8| bs58::encode([b; 32]).into_string();
        VaultConfig {
            vault: VaultSection {
                genesis_timestamp: 1_700_000_000,
                epoch_length_secs: 7 * 24 * 3600,
                lock_epochs: 16,
                maturity_rounding: MaturityRounding::Ceil,
                base_token: addr(0xBB),
                vault_address: addr(0xF0),
                distributor: addr(0xD0),
            },
            roles: RolesSection {
                harvester: addr(0xE1),
                root_updater: addr(0xE2),
            },
        }
    }

    pub fn to_toml(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Decode a base58 32-byte address
pub fn parse_address(field: &str, text: &str) -> Result<Address, ConfigError> {
    let bytes = bs58::decode(text.trim())
        .into_vec()
        .map_err(|e| ConfigError::InvalidAddress {
            field: field.to_string(),
            reason: e.to_string(),
        })?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| ConfigError::InvalidAddress {
            field: field.to_string(),
            reason: format!("expected 32 bytes, got {}", b.len()),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_example_round_trips_through_toml() {
        let text = VaultConfig::example().to_toml().unwrap();
        let parsed: VaultConfig = toml::from_str(&text).unwrap();
        let params = parsed.params().unwrap();
        assert_eq!(params.lock_epochs, 16);
        assert_eq!(params.maturity_rounding, MaturityRounding::Ceil);
        assert_eq!(params.base_token, [0xBB; 32]);
        assert_eq!(parsed.roles().unwrap().harvester, [0xE1; 32]);
    }

    #[test]
    fn test_rounding_defaults_to_ceil() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let addr = bs58::encode([7u8; 32]).into_string();
        let dist = bs58::encode([8u8; 32]).into_string();
        write!(
            file,
            "[vault]\ngenesis_timestamp = 0\nepoch_length_secs = 60\nlock_epochs = 2\n\
             base_token = \"{a}\"\nvault_address = \"{a}\"\ndistributor = \"{d}\"\n\
             [roles]\nharvester = \"{a}\"\nroot_updater = \"{a}\"\n",
            a = addr,
            d = dist
        )
        .unwrap();

        let config = VaultConfig::load(file.path()).unwrap();
        assert_eq!(config.params().unwrap().maturity_rounding, MaturityRounding::Ceil);
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut config = VaultConfig::example();
        config.vault.lock_epochs = 0;
        assert!(matches!(config.params(), Err(ConfigError::InvalidParams(_))));

        let mut config = VaultConfig::example();
        config.vault.base_token = bs58::encode([1u8; 31]).into_string();
        assert!(matches!(config.params(), Err(ConfigError::InvalidAddress { .. })));

        assert!(matches!(
            VaultConfig::load(Path::new("/nonexistent/lockvault.toml")),
            Err(ConfigError::Io { .. })
        ));
    }
}
