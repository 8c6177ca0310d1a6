//! Overlay of the changes an evaluation asked for, applied to the ledger
//! only when the transaction commits.

use super::footprint::FootprintTracker;
use super::host::{EntryChange, Trap};
use crate::ledger::{Durability, Ledger, LedgerSnapshot, SnapshotEntry};
use crate::utils::{describe_key, ledger_key_of, xdr_len};
use crate::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use stellar_xdr::curr::{
    AccountId, LedgerEntry, LedgerEntryChange, LedgerEntryData, LedgerKey,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StateChangeKind {
    Created,
    Updated,
    Deleted,
}

/// Before and after image of one entry touched by an invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChange {
    pub kind: StateChangeKind,
    pub key: LedgerKey,
    pub before: Option<LedgerEntry>,
    pub after: Option<LedgerEntry>,
}

#[derive(Debug, Clone)]
struct Staged {
    before: Option<SnapshotEntry>,
    after: Option<SnapshotEntry>,
}

#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    staged: BTreeMap<LedgerKey, Staged>,
}

impl ChangeSet {
    /// Validate `changes` against the snapshot and apply TTL rules. Writes are
    /// recorded in `tracker`; footprint violations are left in the tracker for
    /// the caller to inspect.
    pub fn stage(
        snapshot: LedgerSnapshot<'_>,
        tracker: &mut FootprintTracker,
        changes: &[EntryChange],
    ) -> std::result::Result<Self, Trap> {
        let mut set = ChangeSet::default();
        for change in changes {
            match change {
                EntryChange::Upsert { entry, live_until } => {
                    set.upsert(snapshot, tracker, entry, *live_until)?
                }
                EntryChange::Remove(key) => set.remove(snapshot, tracker, key)?,
                EntryChange::ExtendTtl { key, live_until } => {
                    set.extend(snapshot, tracker, key, *live_until)?
                }
            }
        }
        Ok(set)
    }

    fn current(&mut self, snapshot: LedgerSnapshot<'_>, key: &LedgerKey) -> &mut Staged {
        self.staged.entry(key.clone()).or_insert_with(|| {
            let before = snapshot.get(key);
            Staged {
                after: before.clone(),
                before,
            }
        })
    }

    fn upsert(
        &mut self,
        snapshot: LedgerSnapshot<'_>,
        tracker: &mut FootprintTracker,
        entry: &LedgerEntry,
        requested: Option<u32>,
    ) -> std::result::Result<(), Trap> {
        let key = ledger_key_of(entry)
            .ok_or_else(|| Trap::new("host wrote an unsupported ledger entry kind"))?;
        let state = snapshot.state();
        let _ = tracker.record_write(&key, xdr_len(entry));

        let mut entry = entry.clone();
        entry.last_modified_ledger_seq = state.sequence_number;

        let staged = self.current(snapshot, &key);
        let live_until = match (&entry.data, Durability::of_key(&key)) {
            (LedgerEntryData::Account(account), _) => {
                if staged.after.is_none() {
                    return Err(Trap::new(format!("{} does not exist", describe_key(&key))));
                }
                if account.balance < 0 {
                    return Err(Trap::new(format!(
                        "{} balance would become negative",
                        describe_key(&key)
                    )));
                }
                None
            }
            (_, Some(durability)) => {
                let default = durability.default_live_until(state);
                let existing = staged
                    .after
                    .as_ref()
                    .and_then(|e| e.live_until)
                    .unwrap_or(default);
                let requested = requested
                    .map(|r| durability.clamp_live_until(r, state))
                    .unwrap_or(default);
                Some(existing.max(requested))
            }
            (_, None) => {
                return Err(Trap::new(format!(
                    "host cannot write {}",
                    describe_key(&key)
                )))
            }
        };
        staged.after = Some(SnapshotEntry { entry, live_until });
        Ok(())
    }

    fn remove(
        &mut self,
        snapshot: LedgerSnapshot<'_>,
        tracker: &mut FootprintTracker,
        key: &LedgerKey,
    ) -> std::result::Result<(), Trap> {
        if Durability::of_key(key).is_none() {
            return Err(Trap::new(format!("host cannot remove {}", describe_key(key))));
        }
        let _ = tracker.record_write(key, 0);
        self.current(snapshot, key).after = None;
        Ok(())
    }

    fn extend(
        &mut self,
        snapshot: LedgerSnapshot<'_>,
        tracker: &mut FootprintTracker,
        key: &LedgerKey,
        requested: u32,
    ) -> std::result::Result<(), Trap> {
        let durability = Durability::of_key(key)
            .ok_or_else(|| Trap::new(format!("{} has no TTL", describe_key(key))))?;
        let state = snapshot.state();
        let staged = self.current(snapshot, key);
        let size = staged.after.as_ref().map(|e| xdr_len(&e.entry)).unwrap_or(0);
        let after = staged.after.as_mut().ok_or_else(|| {
            Trap::new(format!(
                "cannot extend the TTL of missing {}",
                describe_key(key)
            ))
        })?;
        let target = requested.min(durability.max_live_until(state));
        after.live_until = Some(after.live_until.unwrap_or(target).max(target));
        let _ = tracker.record_read(key, size);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    /// Balance `account` would have after the changes, if they touch it.
    pub fn staged_balance(&self, account: &AccountId) -> Option<i64> {
        self.staged.values().find_map(|staged| match &staged.after {
            Some(SnapshotEntry {
                entry:
                    LedgerEntry {
                        data: LedgerEntryData::Account(a),
                        ..
                    },
                ..
            }) if &a.account_id == account => Some(a.balance),
            _ => None,
        })
    }

    pub fn state_changes(&self) -> Vec<StateChange> {
        self.staged
            .iter()
            .filter_map(|(key, staged)| {
                let kind = match (&staged.before, &staged.after) {
                    (None, Some(_)) => StateChangeKind::Created,
                    (Some(_), Some(_)) => StateChangeKind::Updated,
                    (Some(_), None) => StateChangeKind::Deleted,
                    (None, None) => return None,
                };
                Some(StateChange {
                    kind,
                    key: key.clone(),
                    before: staged.before.as_ref().map(|e| e.entry.clone()),
                    after: staged.after.as_ref().map(|e| e.entry.clone()),
                })
            })
            .collect()
    }

    /// Changes in `TransactionMeta` form.
    pub fn ledger_entry_changes(&self) -> Vec<LedgerEntryChange> {
        let mut out = Vec::new();
        for (key, staged) in &self.staged {
            match (&staged.before, &staged.after) {
                (None, Some(after)) => out.push(LedgerEntryChange::Created(after.entry.clone())),
                (Some(before), Some(after)) => {
                    out.push(LedgerEntryChange::State(before.entry.clone()));
                    out.push(LedgerEntryChange::Updated(after.entry.clone()));
                }
                (Some(before), None) => {
                    out.push(LedgerEntryChange::State(before.entry.clone()));
                    out.push(LedgerEntryChange::Removed(key.clone()));
                }
                (None, None) => {}
            }
        }
        out
    }

    /// Number of entries written (created, updated or removed).
    pub fn write_count(&self) -> usize {
        self.staged.len()
    }

    /// Write the staged changes into `ledger`.
    pub fn apply(self, ledger: &mut Ledger) -> Result<()> {
        for (key, staged) in self.staged {
            match staged.after {
                Some(SnapshotEntry {
                    entry:
                        LedgerEntry {
                            data: LedgerEntryData::Account(account),
                            ..
                        },
                    ..
                }) => ledger
                    .accounts
                    .set_balance(&account.account_id, account.balance)?,
                Some(SnapshotEntry { entry, live_until }) => {
                    let live_until = live_until.unwrap_or_else(|| {
                        Durability::Persistent.default_live_until(ledger.clock.state())
                    });
                    ledger.entries.put(entry, live_until)?;
                }
                None => {
                    ledger.entries.remove(&key);
                }
            }
        }
        Ok(())
    }
}
