use crate::logging;
use crate::utils::sha256;
use serde::{Deserialize, Serialize};

pub const DEFAULT_NETWORK_PASSPHRASE: &str = "Standalone Network ; February 2017";
pub const DEFAULT_PROTOCOL_VERSION: u32 = 22;
pub const DEFAULT_SEQUENCE_NUMBER: u32 = 1_000_000;
pub const DEFAULT_TIMESTAMP: u64 = 12_345_678;
pub const DEFAULT_BASE_RESERVE: u32 = 5_000_000;
pub const DEFAULT_MIN_TEMP_ENTRY_TTL: u32 = 16;
pub const DEFAULT_MIN_PERSISTENT_ENTRY_TTL: u32 = 100_000;
pub const DEFAULT_MAX_ENTRY_TTL: u32 = 10_000_000;

/// Ledger header values visible to contracts and clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerState {
    pub protocol_version: u32,
    pub sequence_number: u32,
    pub timestamp: u64,
    #[serde(with = "hex::serde")]
    pub network_id: [u8; 32],
    pub base_reserve: u32,
    pub min_temp_entry_ttl: u32,
    pub min_persistent_entry_ttl: u32,
    pub max_entry_ttl: u32,
}

impl Default for LedgerState {
    fn default() -> Self {
        Self {
            protocol_version: DEFAULT_PROTOCOL_VERSION,
            sequence_number: DEFAULT_SEQUENCE_NUMBER,
            timestamp: DEFAULT_TIMESTAMP,
            network_id: network_id_for(DEFAULT_NETWORK_PASSPHRASE),
            base_reserve: DEFAULT_BASE_RESERVE,
            min_temp_entry_ttl: DEFAULT_MIN_TEMP_ENTRY_TTL,
            min_persistent_entry_ttl: DEFAULT_MIN_PERSISTENT_ENTRY_TTL,
            max_entry_ttl: DEFAULT_MAX_ENTRY_TTL,
        }
    }
}

pub fn network_id_for(passphrase: &str) -> [u8; 32] {
    sha256(passphrase.as_bytes())
}

/// Simulated ledger clock. Moves only when told to; backward jumps are allowed.
#[derive(Debug, Clone)]
pub struct LedgerClock {
    state: LedgerState,
    passphrase: String,
}

impl Default for LedgerClock {
    fn default() -> Self {
        Self::new(DEFAULT_NETWORK_PASSPHRASE, LedgerState::default())
    }
}

impl LedgerClock {
    /// Build a clock for `passphrase`. The network id in `state` is
    /// recomputed from the passphrase.
    pub fn new(passphrase: impl Into<String>, mut state: LedgerState) -> Self {
        let passphrase = passphrase.into();
        state.network_id = network_id_for(&passphrase);
        Self { state, passphrase }
    }

    pub fn set_time(&mut self, timestamp: u64) {
        logging::log_clock_changed("timestamp", self.state.timestamp, timestamp);
        self.state.timestamp = timestamp;
    }

    pub fn set_sequence(&mut self, sequence_number: u32) {
        logging::log_clock_changed(
            "sequence_number",
            self.state.sequence_number as u64,
            sequence_number as u64,
        );
        self.state.sequence_number = sequence_number;
    }

    pub fn get_info(&self) -> LedgerState {
        self.state
    }

    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    pub fn sequence(&self) -> u32 {
        self.state.sequence_number
    }

    pub fn timestamp(&self) -> u64 {
        self.state.timestamp
    }

    pub fn network_passphrase(&self) -> &str {
        &self.passphrase
    }

    pub fn network_id(&self) -> [u8; 32] {
        self.state.network_id
    }
}
