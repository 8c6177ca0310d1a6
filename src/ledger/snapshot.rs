use super::accounts::{render_account, AccountStore};
use super::clock::{LedgerClock, LedgerState};
use super::entries::EntryStore;
use stellar_xdr::curr::{LedgerEntry, LedgerKey};

/// Entry as seen through a snapshot. Accounts never expire and carry no TTL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotEntry {
    pub entry: LedgerEntry,
    pub live_until: Option<u32>,
}

/// Read-only view over the ledger stores at the current clock position.
#[derive(Debug, Clone, Copy)]
pub struct LedgerSnapshot<'a> {
    clock: &'a LedgerClock,
    accounts: &'a AccountStore,
    entries: &'a EntryStore,
}

impl<'a> LedgerSnapshot<'a> {
    pub fn new(clock: &'a LedgerClock, accounts: &'a AccountStore, entries: &'a EntryStore) -> Self {
        Self {
            clock,
            accounts,
            entries,
        }
    }

    pub fn state(&self) -> &'a LedgerState {
        self.clock.state()
    }

    pub fn network_passphrase(&self) -> &'a str {
        self.clock.network_passphrase()
    }

    /// Live entry for `key`, or `None` when missing or expired.
    pub fn get(&self, key: &LedgerKey) -> Option<SnapshotEntry> {
        let sequence = self.clock.sequence();
        match key {
            LedgerKey::Account(k) => self.accounts.get(&k.account_id).ok().map(|account| {
                SnapshotEntry {
                    entry: render_account(account, sequence),
                    live_until: None,
                }
            }),
            LedgerKey::ContractData(_) | LedgerKey::ContractCode(_) => {
                self.entries.get(key, sequence).ok().map(|stored| SnapshotEntry {
                    entry: stored.entry.clone(),
                    live_until: Some(stored.live_until_ledger_seq),
                })
            }
            _ => None,
        }
    }

    pub fn accounts(&self) -> &'a AccountStore {
        self.accounts
    }

    pub fn entries(&self) -> &'a EntryStore {
        self.entries
    }
}
