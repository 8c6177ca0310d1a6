use crate::logging;
use crate::utils::account_strkey;
use crate::{Result, SandboxError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use stellar_xdr::curr::{
    AccountEntry, AccountEntryExt, AccountId, LedgerEntry, LedgerEntryData, LedgerEntryExt,
    SequenceNumber, Thresholds,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: AccountId,
    pub balance: i64,
    pub sequence_number: i64,
}

/// Public view of an account, as returned by `account_info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    pub id: String,
    pub sequence_number: i64,
}

#[derive(Debug, Clone, Default)]
pub struct AccountStore {
    accounts: BTreeMap<AccountId, Account>,
}

impl AccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the account with sequence 0, or overwrite the balance of an
    /// existing one. The sequence number of an existing account is kept.
    pub fn fund(&mut self, id: &AccountId, balance: i64) -> Result<()> {
        if balance < 0 {
            return Err(SandboxError::MalformedInput(format!(
                "cannot fund {} with negative balance {balance}",
                account_strkey(id)
            )));
        }
        self.accounts
            .entry(id.clone())
            .and_modify(|account| account.balance = balance)
            .or_insert_with(|| Account {
                id: id.clone(),
                balance,
                sequence_number: 0,
            });
        logging::log_account_funded(&account_strkey(id), balance);
        Ok(())
    }

    pub fn get(&self, id: &AccountId) -> Result<&Account> {
        self.accounts
            .get(id)
            .ok_or_else(|| SandboxError::NotFound(format!("account {}", account_strkey(id))))
    }

    pub fn contains(&self, id: &AccountId) -> bool {
        self.accounts.contains_key(id)
    }

    pub fn balance(&self, id: &AccountId) -> Result<i64> {
        self.get(id).map(|account| account.balance)
    }

    pub fn account_info(&self, id: &AccountId) -> Result<AccountInfo> {
        let account = self.get(id)?;
        Ok(AccountInfo {
            id: account_strkey(&account.id),
            sequence_number: account.sequence_number,
        })
    }

    /// Debit `fee` from the source account. Fails without changes when the
    /// balance does not cover it.
    pub fn apply_source_debit(&mut self, id: &AccountId, fee: i64) -> Result<()> {
        let account = self.get_mut(id)?;
        if account.balance < fee {
            return Err(SandboxError::InsufficientBalance {
                balance: account.balance,
                required: fee,
            });
        }
        account.balance -= fee;
        Ok(())
    }

    pub fn advance_sequence(&mut self, id: &AccountId) -> Result<i64> {
        let account = self.get_mut(id)?;
        account.sequence_number += 1;
        Ok(account.sequence_number)
    }

    /// Set a balance directly. Used when committing balance changes staged by
    /// a contract invocation.
    pub fn set_balance(&mut self, id: &AccountId, balance: i64) -> Result<()> {
        self.get_mut(id)?.balance = balance;
        Ok(())
    }

    /// XDR rendering of the account with a single master key of weight 1.
    pub fn account_entry(&self, id: &AccountId, last_modified: u32) -> Result<LedgerEntry> {
        let account = self.get(id)?;
        Ok(render_account(account, last_modified))
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }

    fn get_mut(&mut self, id: &AccountId) -> Result<&mut Account> {
        self.accounts
            .get_mut(id)
            .ok_or_else(|| SandboxError::NotFound(format!("account {}", account_strkey(id))))
    }
}

pub(crate) fn render_account(account: &Account, last_modified: u32) -> LedgerEntry {
    LedgerEntry {
        last_modified_ledger_seq: last_modified,
        data: LedgerEntryData::Account(AccountEntry {
            account_id: account.id.clone(),
            balance: account.balance,
            seq_num: SequenceNumber(account.sequence_number),
            num_sub_entries: 0,
            inflation_dest: None,
            flags: 0,
            home_domain: Default::default(),
            thresholds: Thresholds([1, 0, 0, 0]),
            signers: Default::default(),
            ext: AccountEntryExt::V0,
        }),
        ext: LedgerEntryExt::V0,
    }
}
