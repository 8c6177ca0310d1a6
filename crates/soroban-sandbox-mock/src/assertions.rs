use crate::tx::TestAccount;
use soroban_sandbox::{Durability, HostEvaluator, Sandbox, SandboxError, TransactionRecord};
use stellar_xdr::curr::{LedgerEntryData, ScAddress, ScVal};

pub struct LedgerAssertions<'a, E> {
    sandbox: &'a Sandbox<E>,
}

impl<'a, E: HostEvaluator> LedgerAssertions<'a, E> {
    pub fn new(sandbox: &'a Sandbox<E>) -> Self {
        Self { sandbox }
    }

    #[track_caller]
    pub fn assert_balance(&self, account: &TestAccount, expected: i64) {
        let actual = self
            .sandbox
            .balance(&account.address())
            .unwrap_or_else(|e| panic!("balance of {}: {e}", account.address()));
        assert_eq!(actual, expected, "balance of {}", account.address());
    }

    #[track_caller]
    pub fn assert_sequence(&self, account: &TestAccount, expected: i64) {
        let info = self
            .sandbox
            .account_info(&account.address())
            .unwrap_or_else(|e| panic!("account {}: {e}", account.address()));
        assert_eq!(info.sequence_number, expected, "sequence of {}", account.address());
    }

    #[track_caller]
    pub fn assert_value_eq(
        &self,
        contract: &ScAddress,
        key: &ScVal,
        durability: Durability,
        expected: &ScVal,
    ) {
        let found = self
            .sandbox
            .contract_data(contract, key, durability)
            .unwrap_or_else(|e| panic!("{key:?}: {e}"));
        match found.entry.data {
            LedgerEntryData::ContractData(data) => assert_eq!(&data.val, expected, "{key:?}"),
            other => panic!("{key:?} is not contract data: {other:?}"),
        }
    }

    #[track_caller]
    pub fn assert_missing(&self, contract: &ScAddress, key: &ScVal, durability: Durability) {
        match self.sandbox.contract_data(contract, key, durability) {
            Err(SandboxError::NotFound(_)) => {}
            Ok(found) => panic!("{key:?} unexpectedly present: {:?}", found.entry),
            Err(e) => panic!("{key:?}: unexpected error {e}"),
        }
    }

    #[track_caller]
    pub fn assert_success(&self, record: &TransactionRecord) {
        assert!(
            record.is_success(),
            "transaction {} failed: {:?}",
            record.hash,
            record.error
        );
        let stored = self
            .sandbox
            .get_transaction(&record.hash)
            .unwrap_or_else(|e| panic!("transaction {}: {e}", record.hash));
        assert!(stored.is_success());
    }

    #[track_caller]
    pub fn assert_trapped(&self, record: &TransactionRecord, message: &str) {
        assert!(!record.is_success(), "transaction {} succeeded", record.hash);
        let error = record.error.as_deref().unwrap_or_default();
        assert!(
            error.contains(message),
            "trap message {error:?} does not mention {message:?}"
        );
    }
}
