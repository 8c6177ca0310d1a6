//! Ledger state owned by a sandbox: clock, accounts, contract entries and
//! the authorization nonces already consumed.

pub mod accounts;
pub mod clock;
pub mod entries;
pub mod snapshot;

pub use accounts::{Account, AccountInfo, AccountStore};
pub use clock::{LedgerClock, LedgerState};
pub use entries::{Durability, EntryStore, StoredEntry};
pub use snapshot::{LedgerSnapshot, SnapshotEntry};

use std::collections::BTreeSet;
use stellar_xdr::curr::ScAddress;

#[derive(Debug, Clone, Default)]
pub struct Ledger {
    pub clock: LedgerClock,
    pub accounts: AccountStore,
    pub entries: EntryStore,
    consumed_nonces: BTreeSet<(ScAddress, i64)>,
}

impl Ledger {
    pub fn new(clock: LedgerClock) -> Self {
        Self {
            clock,
            ..Self::default()
        }
    }

    pub fn snapshot(&self) -> LedgerSnapshot<'_> {
        LedgerSnapshot::new(&self.clock, &self.accounts, &self.entries)
    }

    pub fn is_nonce_consumed(&self, address: &ScAddress, nonce: i64) -> bool {
        self.consumed_nonces.contains(&(address.clone(), nonce))
    }

    pub fn consume_nonce(&mut self, address: ScAddress, nonce: i64) {
        self.consumed_nonces.insert((address, nonce));
    }
}
