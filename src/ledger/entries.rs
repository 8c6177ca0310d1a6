use super::clock::LedgerState;
use crate::utils::{describe_key, ledger_key_of, sha256};
use crate::{Result, SandboxError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use stellar_xdr::curr::{
    BytesM, ContractCodeEntry, ContractCodeEntryExt, ContractDataDurability, Hash, LedgerEntry,
    LedgerEntryData, LedgerEntryExt, LedgerKey, LedgerKeyContractCode,
};

/// Storage class of a contract entry. Carries the TTL rules for new and
/// extended entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Durability {
    Temporary,
    Persistent,
}

impl Durability {
    /// Durability of the entry addressed by `key`. Contract code is persistent;
    /// keys that are not contract entries have none.
    pub fn of_key(key: &LedgerKey) -> Option<Self> {
        match key {
            LedgerKey::ContractData(data) => Some(data.durability.into()),
            LedgerKey::ContractCode(_) => Some(Durability::Persistent),
            _ => None,
        }
    }

    pub fn min_ttl(self, state: &LedgerState) -> u32 {
        match self {
            Durability::Temporary => state.min_temp_entry_ttl,
            Durability::Persistent => state.min_persistent_entry_ttl,
        }
    }

    /// Last ledger a freshly written entry stays live for.
    pub fn default_live_until(self, state: &LedgerState) -> u32 {
        state
            .sequence_number
            .saturating_add(self.min_ttl(state))
            .saturating_sub(1)
    }

    pub fn max_live_until(self, state: &LedgerState) -> u32 {
        state
            .sequence_number
            .saturating_add(state.max_entry_ttl)
            .saturating_sub(1)
    }

    /// Clamp a requested expiration into `[default_live_until, max_live_until]`.
    pub fn clamp_live_until(self, requested: u32, state: &LedgerState) -> u32 {
        requested
            .max(self.default_live_until(state))
            .min(self.max_live_until(state))
    }
}

impl From<ContractDataDurability> for Durability {
    fn from(value: ContractDataDurability) -> Self {
        match value {
            ContractDataDurability::Temporary => Durability::Temporary,
            ContractDataDurability::Persistent => Durability::Persistent,
        }
    }
}

impl From<Durability> for ContractDataDurability {
    fn from(value: Durability) -> Self {
        match value {
            Durability::Temporary => ContractDataDurability::Temporary,
            Durability::Persistent => ContractDataDurability::Persistent,
        }
    }
}

impl FromStr for Durability {
    type Err = SandboxError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "temporary" | "temp" => Ok(Durability::Temporary),
            "persistent" => Ok(Durability::Persistent),
            other => Err(SandboxError::MalformedInput(format!(
                "unknown durability '{other}', expected 'temporary' or 'persistent'"
            ))),
        }
    }
}

impl fmt::Display for Durability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Durability::Temporary => write!(f, "temporary"),
            Durability::Persistent => write!(f, "persistent"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    pub entry: LedgerEntry,
    pub live_until_ledger_seq: u32,
}

impl StoredEntry {
    pub fn is_live(&self, sequence: u32) -> bool {
        self.live_until_ledger_seq >= sequence
    }
}

/// Contract code and contract data, keyed by XDR `LedgerKey`.
///
/// Expired entries stay stored until `reap_expired` runs but are invisible
/// to `get`.
#[derive(Debug, Clone, Default)]
pub struct EntryStore {
    entries: BTreeMap<LedgerKey, StoredEntry>,
}

impl EntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &LedgerKey, sequence: u32) -> Result<&StoredEntry> {
        self.entries
            .get(key)
            .filter(|stored| stored.is_live(sequence))
            .ok_or_else(|| SandboxError::NotFound(describe_key(key)))
    }

    /// Physical lookup ignoring expiration.
    pub fn get_raw(&self, key: &LedgerKey) -> Option<&StoredEntry> {
        self.entries.get(key)
    }

    pub fn put(&mut self, entry: LedgerEntry, live_until_ledger_seq: u32) -> Result<LedgerKey> {
        let key = entry_key(&entry)?;
        self.entries.insert(
            key.clone(),
            StoredEntry {
                entry,
                live_until_ledger_seq,
            },
        );
        Ok(key)
    }

    /// Move the expiration of `key` to `new_live_until`. Never shortens;
    /// returns the resulting expiration.
    pub fn extend_ttl(&mut self, key: &LedgerKey, new_live_until: u32) -> Result<u32> {
        let stored = self
            .entries
            .get_mut(key)
            .ok_or_else(|| SandboxError::NotFound(describe_key(key)))?;
        stored.live_until_ledger_seq = stored.live_until_ledger_seq.max(new_live_until);
        Ok(stored.live_until_ledger_seq)
    }

    pub fn remove(&mut self, key: &LedgerKey) -> Option<StoredEntry> {
        self.entries.remove(key)
    }

    /// Install wasm directly as a code entry and return its content hash.
    /// Test-only fast path: no authorization, no fee.
    pub fn deploy_code(&mut self, code: &[u8], state: &LedgerState) -> Result<Hash> {
        let hash = Hash(sha256(code));
        let code = BytesM::try_from(code.to_vec())
            .map_err(|e| SandboxError::MalformedInput(format!("contract code too large: {e}")))?;
        let entry = LedgerEntry {
            last_modified_ledger_seq: state.sequence_number,
            data: LedgerEntryData::ContractCode(ContractCodeEntry {
                ext: ContractCodeEntryExt::V0,
                hash: hash.clone(),
                code,
            }),
            ext: LedgerEntryExt::V0,
        };
        let live_until = Durability::Persistent.default_live_until(state);
        match self.entries.get(&code_key(&hash)) {
            // same bytes: keep the longer expiration
            Some(existing) if existing.live_until_ledger_seq >= live_until => {}
            _ => {
                self.put(entry, live_until)?;
            }
        }
        Ok(hash)
    }

    /// Physically drop every entry that has expired at `sequence`.
    pub fn reap_expired(&mut self, sequence: u32) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, stored| stored.is_live(sequence));
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&LedgerKey, &StoredEntry)> {
        self.entries.iter()
    }
}

pub fn code_key(hash: &Hash) -> LedgerKey {
    LedgerKey::ContractCode(LedgerKeyContractCode { hash: hash.clone() })
}

fn entry_key(entry: &LedgerEntry) -> Result<LedgerKey> {
    match ledger_key_of(entry) {
        Some(key @ (LedgerKey::ContractData(_) | LedgerKey::ContractCode(_))) => Ok(key),
        _ => Err(SandboxError::MalformedInput(
            "only contract code and contract data entries can be stored".to_string(),
        )),
    }
}
