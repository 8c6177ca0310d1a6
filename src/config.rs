use crate::ledger::clock::{
    LedgerClock, LedgerState, DEFAULT_BASE_RESERVE, DEFAULT_MAX_ENTRY_TTL,
    DEFAULT_MIN_PERSISTENT_ENTRY_TTL, DEFAULT_MIN_TEMP_ENTRY_TTL, DEFAULT_NETWORK_PASSPHRASE,
    DEFAULT_PROTOCOL_VERSION, DEFAULT_SEQUENCE_NUMBER, DEFAULT_TIMESTAMP,
};
use crate::runtime::FeeConfiguration;
use crate::{Result, SandboxError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::warn;

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = ".soroban-sandbox.toml";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct SandboxConfig {
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub fees: FeeConfiguration,
}

/// Initial ledger header. Unset fields take the documented defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct LedgerConfig {
    #[serde(default)]
    pub network_passphrase: Option<String>,
    #[serde(default)]
    pub protocol_version: Option<u32>,
    #[serde(default)]
    pub sequence_number: Option<u32>,
    #[serde(default)]
    pub timestamp: Option<u64>,
    #[serde(default)]
    pub base_reserve: Option<u32>,
    #[serde(default)]
    pub min_temp_entry_ttl: Option<u32>,
    #[serde(default)]
    pub min_persistent_entry_ttl: Option<u32>,
    #[serde(default)]
    pub max_entry_ttl: Option<u32>,
}

impl LedgerConfig {
    pub fn passphrase(&self) -> &str {
        self.network_passphrase
            .as_deref()
            .unwrap_or(DEFAULT_NETWORK_PASSPHRASE)
    }

    pub fn initial_state(&self) -> LedgerState {
        LedgerState {
            protocol_version: self.protocol_version.unwrap_or(DEFAULT_PROTOCOL_VERSION),
            sequence_number: self.sequence_number.unwrap_or(DEFAULT_SEQUENCE_NUMBER),
            timestamp: self.timestamp.unwrap_or(DEFAULT_TIMESTAMP),
            network_id: crate::ledger::clock::network_id_for(self.passphrase()),
            base_reserve: self.base_reserve.unwrap_or(DEFAULT_BASE_RESERVE),
            min_temp_entry_ttl: self.min_temp_entry_ttl.unwrap_or(DEFAULT_MIN_TEMP_ENTRY_TTL),
            min_persistent_entry_ttl: self
                .min_persistent_entry_ttl
                .unwrap_or(DEFAULT_MIN_PERSISTENT_ENTRY_TTL),
            max_entry_ttl: self.max_entry_ttl.unwrap_or(DEFAULT_MAX_ENTRY_TTL),
        }
    }

    pub fn clock(&self) -> LedgerClock {
        LedgerClock::new(self.passphrase(), self.initial_state())
    }
}

impl SandboxConfig {
    /// Load configuration from `.soroban-sandbox.toml` in the working directory
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(DEFAULT_CONFIG_FILE))
    }

    /// Load configuration from `path`. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(SandboxConfig::default());
        }

        let content = fs::read_to_string(path).map_err(|e| {
            SandboxError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        Self::from_toml_str(&content).map_err(|e| match e {
            SandboxError::Config(msg) => SandboxError::Config(format!("{:?}: {}", path, msg)),
            other => other,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: SandboxConfig = toml::from_str(content)
            .map_err(|e| SandboxError::Config(format!("Failed to parse TOML config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let state = self.ledger.initial_state();
        if state.min_temp_entry_ttl == 0 || state.min_persistent_entry_ttl == 0 {
            return Err(SandboxError::Config(
                "minimum entry TTLs must be at least 1".to_string(),
            ));
        }
        if state.max_entry_ttl < state.min_persistent_entry_ttl
            || state.max_entry_ttl < state.min_temp_entry_ttl
        {
            return Err(SandboxError::Config(format!(
                "max_entry_ttl {} is below a minimum entry TTL",
                state.max_entry_ttl
            )));
        }
        Ok(())
    }

    /// Load default config if file is missing or unreadable
    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(config) => config,
            Err(e) => {
                warn!("Warning: Failed to load config: {}. Using defaults.", e);
                SandboxConfig::default()
            }
        }
    }
}
