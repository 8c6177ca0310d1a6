//! The owned sandbox facade.
//!
//! A `Sandbox` owns one ledger, one transaction log and the host evaluator
//! contracts run on. State changes only through `&mut self`; simulation and
//! queries borrow it shared.

use crate::config::SandboxConfig;
use crate::ledger::{AccountInfo, Durability, Ledger, LedgerState, SnapshotEntry};
use crate::logging;
use crate::rpc::{
    GetLedgerEntriesResponse, GetTransactionResponse, LatestLedger, LedgerEntryResult,
    NetworkInfo, SendTransactionResponse, SimulateTransactionResponse,
};
use crate::runtime::{
    FeeConfiguration, HostEvaluator, ParsedEnvelope, SimulationResult, TransactionExecutor,
    TransactionRecord, TransactionSimulator, TxLog,
};
use crate::utils::{from_xdr_base64, parse_account_id, parse_sc_address};
use crate::Result;
use stellar_xdr::curr::{LedgerKey, LedgerKeyContractData, ScAddress, ScVal};

pub struct Sandbox<E> {
    config: SandboxConfig,
    ledger: Ledger,
    log: TxLog,
    evaluator: E,
}

impl<E: HostEvaluator + Default> Default for Sandbox<E> {
    fn default() -> Self {
        Self::new(E::default())
    }
}

impl<E: HostEvaluator> Sandbox<E> {
    /// Sandbox with the default ledger header and fee schedule.
    pub fn new(evaluator: E) -> Self {
        Self::with_config(SandboxConfig::default(), evaluator)
    }

    pub fn with_config(config: SandboxConfig, evaluator: E) -> Self {
        let ledger = Ledger::new(config.ledger.clock());
        Self {
            config,
            ledger,
            log: TxLog::new(),
            evaluator,
        }
    }

    pub fn evaluator(&self) -> &E {
        &self.evaluator
    }

    pub fn evaluator_mut(&mut self) -> &mut E {
        &mut self.evaluator
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    pub fn fees(&self) -> &FeeConfiguration {
        &self.config.fees
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn transactions(&self) -> &TxLog {
        &self.log
    }

    // Clock

    pub fn set_time(&mut self, timestamp: u64) {
        self.ledger.clock.set_time(timestamp);
    }

    pub fn set_sequence(&mut self, sequence_number: u32) {
        self.ledger.clock.set_sequence(sequence_number);
    }

    pub fn get_info(&self) -> LedgerState {
        self.ledger.clock.get_info()
    }

    pub fn network_passphrase(&self) -> String {
        self.ledger.clock.network_passphrase().to_string()
    }

    pub fn network_info(&self) -> NetworkInfo {
        NetworkInfo {
            passphrase: self.network_passphrase(),
            protocol_version: self.ledger.clock.state().protocol_version,
        }
    }

    pub fn latest_ledger(&self) -> LatestLedger {
        LatestLedger::from_state(self.ledger.clock.state())
    }

    // Accounts

    /// Create `account` or overwrite its balance.
    pub fn fund(&mut self, account: &str, balance: i64) -> Result<()> {
        let id = parse_account_id(account)?;
        self.ledger.accounts.fund(&id, balance)
    }

    pub fn balance(&self, account: &str) -> Result<i64> {
        self.ledger.accounts.balance(&parse_account_id(account)?)
    }

    pub fn account_info(&self, account: &str) -> Result<AccountInfo> {
        self.ledger.accounts.account_info(&parse_account_id(account)?)
    }

    // Entries

    /// Install contract code without a transaction and return its hex hash.
    /// Skips authorization and fees; meant for test setup only.
    pub fn deploy_code(&mut self, owner: &str, code: &[u8]) -> Result<String> {
        let owner = parse_account_id(owner)?;
        let hash = self
            .ledger
            .entries
            .deploy_code(code, self.ledger.clock.state())?;
        let hash = hex::encode(hash.0);
        logging::log_code_deployed(&crate::utils::account_strkey(&owner), &hash, code.len());
        Ok(hash)
    }

    /// Physically drop every expired entry. Reads already treat them as absent.
    pub fn reap_expired(&mut self) -> usize {
        let sequence = self.ledger.clock.sequence();
        let count = self.ledger.entries.reap_expired(sequence);
        if count > 0 {
            logging::log_entries_reaped(count, sequence);
        }
        count
    }

    /// Live contract data entry stored by `address` under `key`.
    pub fn contract_data(
        &self,
        address: &ScAddress,
        key: &ScVal,
        durability: Durability,
    ) -> Result<SnapshotEntry> {
        let ledger_key = LedgerKey::ContractData(LedgerKeyContractData {
            contract: address.clone(),
            key: key.clone(),
            durability: durability.into(),
        });
        let stored = self
            .ledger
            .entries
            .get(&ledger_key, self.ledger.clock.sequence())?;
        Ok(SnapshotEntry {
            entry: stored.entry.clone(),
            live_until: Some(stored.live_until_ledger_seq),
        })
    }

    /// `address` is a `C...`/`G...` strkey or base64 XDR `ScAddress`, `key` a
    /// base64 XDR `ScVal`.
    pub fn get_contract_data(
        &self,
        address: &str,
        key: &str,
        durability: Durability,
    ) -> Result<LedgerEntryResult> {
        let address = parse_sc_address(address)?;
        let key: ScVal = from_xdr_base64(key, "contract data key")?;
        let found = self.contract_data(&address, &key, durability)?;
        let ledger_key = LedgerKey::ContractData(LedgerKeyContractData {
            contract: address,
            key,
            durability: durability.into(),
        });
        LedgerEntryResult::new(&ledger_key, found)
    }

    /// Batch lookup of base64 XDR `LedgerKey`s. Absent and expired keys are
    /// left out of the response.
    pub fn get_ledger_entries(&self, keys: &[&str]) -> Result<GetLedgerEntriesResponse> {
        let snapshot = self.ledger.snapshot();
        let mut entries = Vec::with_capacity(keys.len());
        for key in keys {
            let key: LedgerKey = from_xdr_base64(key, "ledger key")?;
            if let Some(found) = snapshot.get(&key) {
                entries.push(LedgerEntryResult::new(&key, found)?);
            }
        }
        Ok(GetLedgerEntriesResponse {
            entries,
            latest_ledger: self.ledger.clock.sequence(),
        })
    }

    // Transactions

    /// Hex hash of a base64 XDR envelope on this sandbox's network.
    pub fn transaction_hash(&self, envelope: &str) -> Result<String> {
        Ok(ParsedEnvelope::from_base64(envelope, &self.ledger.clock.network_id())?.hash_hex())
    }

    pub fn simulate(&self, envelope: &str) -> Result<SimulationResult> {
        TransactionSimulator::new(&self.ledger, &self.config.fees, &self.evaluator)
            .simulate(envelope)
    }

    /// `simulateTransaction` response for `envelope`.
    pub fn simulate_transaction(&self, envelope: &str) -> Result<SimulateTransactionResponse> {
        SimulateTransactionResponse::from_result(&self.simulate(envelope)?)
    }

    /// Validate and apply a signed envelope. Rejections leave the ledger
    /// untouched; a contract trap is applied as a failed transaction.
    pub fn execute(&mut self, envelope: &str) -> Result<TransactionRecord> {
        TransactionExecutor::new(&mut self.ledger, &mut self.log, &self.evaluator)
            .execute(envelope)
    }

    /// `sendTransaction` response for `envelope`. Validation failures become
    /// an `ERROR` response; only undecodable input is an `Err`. Resubmitting
    /// an applied envelope answers `DUPLICATE`.
    pub fn send_transaction(&mut self, envelope: &str) -> Result<SendTransactionResponse> {
        let parsed = ParsedEnvelope::from_base64(envelope, &self.ledger.clock.network_id())?;
        let hash = parsed.hash_hex();
        if self.log.contains(&hash) {
            return Ok(SendTransactionResponse::duplicate(
                hash,
                self.ledger.clock.state(),
            ));
        }

        let outcome = TransactionExecutor::new(&mut self.ledger, &mut self.log, &self.evaluator)
            .execute_parsed(&parsed);
        let state = self.ledger.clock.state();
        match outcome {
            Ok(_) => Ok(SendTransactionResponse::pending(hash, state)),
            Err(e) => {
                logging::log_transaction_rejected(&hash, &e);
                SendTransactionResponse::rejected(hash, &e, state)
            }
        }
    }

    pub fn get_transaction(&self, hash: &str) -> Result<&TransactionRecord> {
        self.log.get(hash)
    }

    /// `getTransaction` response for `hash`.
    pub fn get_transaction_response(&self, hash: &str) -> Result<GetTransactionResponse> {
        let record = self.log.get(hash)?;
        let oldest = self.log.oldest().unwrap_or(record);
        GetTransactionResponse::from_record(record, oldest, self.ledger.clock.state())
    }
}
