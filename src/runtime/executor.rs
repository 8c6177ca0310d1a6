use super::envelope::ParsedEnvelope;
use super::footprint::{EvaluationMode, Footprint};
use super::host::{Evaluation, HostEvaluator, Trap};
use super::staging::ChangeSet;
use super::validation;
use crate::ledger::Ledger;
use crate::logging;
use crate::utils::{sha256, to_xdr_bytes};
use crate::{Result, SandboxError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use stellar_xdr::curr::{
    AccountId, ContractEvent, DiagnosticEvent, ExtensionPoint, Hash, InvokeHostFunctionResult,
    InvokeHostFunctionSuccessPreImage, LedgerEntry, LedgerEntryChange, LedgerEntryChanges, OperationMeta,
    OperationResult, OperationResultTr, ScAddress, ScVal, SorobanTransactionMeta, SorobanTransactionMetaExt,
    TransactionMeta, TransactionMetaV3, TransactionResult, TransactionResultExt,
    TransactionResultResult,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Success,
    Failed,
}

/// An applied transaction. Never changes once appended to the log.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRecord {
    pub hash: String,
    pub envelope: Vec<u8>,
    pub status: TransactionStatus,
    /// XDR `TransactionResult`.
    pub result: Vec<u8>,
    /// XDR `TransactionMeta` (V3).
    pub meta: Vec<u8>,
    pub return_value: Option<ScVal>,
    pub error: Option<String>,
    pub events: Vec<ContractEvent>,
    pub diagnostic_events: Vec<DiagnosticEvent>,
    pub ledger: u32,
    pub created_at: u64,
    pub application_order: u32,
    pub fee_charged: i64,
}

impl TransactionRecord {
    pub fn is_success(&self) -> bool {
        self.status == TransactionStatus::Success
    }

    /// Return value of a successful transaction, or `ContractTrap` with the
    /// trap message of a failed one.
    pub fn ok_or_trap(&self) -> Result<&ScVal> {
        match (&self.status, &self.return_value) {
            (TransactionStatus::Success, Some(value)) => Ok(value),
            _ => Err(SandboxError::ContractTrap(
                self.error
                    .clone()
                    .unwrap_or_else(|| "transaction failed".to_string()),
            )),
        }
    }
}

/// Applied transactions by hash, in application order.
#[derive(Debug, Clone, Default)]
pub struct TxLog {
    records: HashMap<String, TransactionRecord>,
    order: Vec<String>,
}

impl TxLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, hash: &str) -> Result<&TransactionRecord> {
        self.records
            .get(&hash.to_ascii_lowercase())
            .ok_or_else(|| SandboxError::NotFound(format!("transaction {hash}")))
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.records.contains_key(&hash.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Records in the order they were applied.
    pub fn iter(&self) -> impl Iterator<Item = &TransactionRecord> {
        self.order.iter().filter_map(|hash| self.records.get(hash))
    }

    pub fn oldest(&self) -> Option<&TransactionRecord> {
        self.order.first().and_then(|hash| self.records.get(hash))
    }

    fn next_application_order(&self, ledger: u32) -> u32 {
        self.iter().filter(|r| r.ledger == ledger).count() as u32 + 1
    }

    fn append(&mut self, record: TransactionRecord) {
        self.order.push(record.hash.clone());
        self.records.insert(record.hash.clone(), record);
    }
}

/// Validates and applies signed transactions. The only writer of ledger state
/// besides the test-only shortcuts on the sandbox.
pub struct TransactionExecutor<'a, E: ?Sized> {
    ledger: &'a mut Ledger,
    log: &'a mut TxLog,
    evaluator: &'a E,
}

enum Applied {
    Success {
        evaluation: Evaluation,
        changes: ChangeSet,
        nonces: Vec<(ScAddress, i64)>,
    },
    Trapped(Trap),
}

impl<'a, E: HostEvaluator + ?Sized> TransactionExecutor<'a, E> {
    pub fn new(ledger: &'a mut Ledger, log: &'a mut TxLog, evaluator: &'a E) -> Self {
        Self {
            ledger,
            log,
            evaluator,
        }
    }

    /// Execute a signed base64 XDR envelope. Rejections leave no trace;
    /// contract traps are applied as failed transactions.
    pub fn execute(&mut self, envelope: &str) -> Result<TransactionRecord> {
        let parsed = ParsedEnvelope::from_base64(envelope, &self.ledger.clock.network_id())
            .inspect_err(|e| logging::log_transaction_rejected("-", e))?;
        self.execute_parsed(&parsed)
            .inspect_err(|e| logging::log_transaction_rejected(&parsed.hash_hex(), e))
    }

    pub fn execute_parsed(&mut self, parsed: &ParsedEnvelope) -> Result<TransactionRecord> {
        validation::verify_signatures(parsed)?;

        let source = parsed.source_account();
        let account = self.ledger.accounts.get(&source)?.clone();
        let expected = account.sequence_number + 1;
        if parsed.sequence_number() != expected {
            return Err(SandboxError::SequenceMismatch {
                expected,
                actual: parsed.sequence_number(),
            });
        }

        validation::check_time_bounds(&parsed.envelope.tx.cond, self.ledger.clock.timestamp())?;

        let fee = parsed.fee() as i64;
        if account.balance < fee {
            return Err(SandboxError::InsufficientBalance {
                balance: account.balance,
                required: fee,
            });
        }

        let data = parsed.soroban_data().ok_or_else(|| {
            SandboxError::MalformedInput(
                "transaction has no soroban transaction data; simulate it first".to_string(),
            )
        })?;
        let declared = Footprint::from_xdr(&data.resources.footprint);
        logging::log_footprint(&parsed.hash_hex(), declared.len());

        match self.evaluate(parsed, declared)? {
            Applied::Success {
                evaluation,
                changes,
                nonces,
            } => {
                let staged_balance = changes.staged_balance(&source).unwrap_or(account.balance);
                if staged_balance < fee {
                    return Err(SandboxError::InsufficientBalance {
                        balance: staged_balance,
                        required: fee,
                    });
                }
                self.commit_success(parsed, &source, fee, evaluation, changes, nonces)
            }
            Applied::Trapped(trap) => self.commit_failure(parsed, &source, fee, trap),
        }
    }

    /// Enforcing-mode evaluation against the declared footprint. A footprint
    /// violation rejects the transaction even when the evaluator trapped on it.
    fn evaluate(&self, parsed: &ParsedEnvelope, declared: Footprint) -> Result<Applied> {
        let snapshot = self.ledger.snapshot();
        let (outcome, mut tracker) = super::evaluate(
            self.evaluator,
            snapshot,
            parsed,
            EvaluationMode::Enforcing(declared),
        );

        let staged = outcome.map(|evaluation| {
            let changes = ChangeSet::stage(snapshot, &mut tracker, &evaluation.changes);
            (evaluation, changes)
        });

        if !tracker.violations().is_empty() {
            let detail = tracker
                .violations()
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(SandboxError::ResourceLimitExceeded(detail));
        }

        match staged {
            Ok((evaluation, Ok(changes))) => {
                let nonces = validation::verify_authorization(&*self.ledger, parsed, &evaluation.auth)?;
                Ok(Applied::Success {
                    evaluation,
                    changes,
                    nonces,
                })
            }
            Ok((_, Err(trap))) | Err(trap) => Ok(Applied::Trapped(trap)),
        }
    }

    fn commit_success(
        &mut self,
        parsed: &ParsedEnvelope,
        source: &AccountId,
        fee: i64,
        evaluation: Evaluation,
        changes: ChangeSet,
        nonces: Vec<(ScAddress, i64)>,
    ) -> Result<TransactionRecord> {
        let operation_changes = changes.ledger_entry_changes();
        let account_before = self.account_entry(source)?;

        changes.apply(self.ledger)?;
        self.ledger.accounts.advance_sequence(source)?;
        self.ledger.accounts.apply_source_debit(source, fee)?;
        for (address, nonce) in nonces {
            self.ledger.consume_nonce(address, nonce);
        }
        let account_after = self.account_entry(source)?;

        let success_hash = sha256(&to_xdr_bytes(&InvokeHostFunctionSuccessPreImage {
            return_value: evaluation.return_value.clone(),
            events: evaluation.events.clone().try_into()?,
        })?);
        let result = TransactionResult {
            fee_charged: fee,
            result: TransactionResultResult::TxSuccess(
                vec![OperationResult::OpInner(OperationResultTr::InvokeHostFunction(
                    InvokeHostFunctionResult::Success(Hash(success_hash)),
                ))]
                .try_into()?,
            ),
            ext: TransactionResultExt::V0,
        };
        let diagnostic_events =
            super::diagnostic_events(&evaluation.events, &evaluation.diagnostic_events);
        let meta = transaction_meta(
            vec![
                LedgerEntryChange::State(account_before),
                LedgerEntryChange::Updated(account_after),
            ],
            Some(operation_changes),
            &evaluation.events,
            evaluation.return_value.clone(),
            &diagnostic_events,
        )?;

        let record = self.record(
            parsed,
            TransactionStatus::Success,
            &result,
            &meta,
            Some(evaluation.return_value),
            None,
            evaluation.events,
            diagnostic_events,
            fee,
        )?;
        Ok(record)
    }

    fn commit_failure(
        &mut self,
        parsed: &ParsedEnvelope,
        source: &AccountId,
        fee: i64,
        trap: Trap,
    ) -> Result<TransactionRecord> {
        logging::log_contract_trap(&parsed.hash_hex(), &trap.message);
        let account_before = self.account_entry(source)?;
        self.ledger.accounts.advance_sequence(source)?;
        self.ledger.accounts.apply_source_debit(source, fee)?;
        let account_after = self.account_entry(source)?;

        let result = TransactionResult {
            fee_charged: fee,
            result: TransactionResultResult::TxFailed(
                vec![OperationResult::OpInner(OperationResultTr::InvokeHostFunction(
                    InvokeHostFunctionResult::Trapped,
                ))]
                .try_into()?,
            ),
            ext: TransactionResultExt::V0,
        };
        let meta = transaction_meta(
            vec![
                LedgerEntryChange::State(account_before),
                LedgerEntryChange::Updated(account_after),
            ],
            None,
            &[],
            ScVal::Void,
            &trap.diagnostic_events,
        )?;

        self.record(
            parsed,
            TransactionStatus::Failed,
            &result,
            &meta,
            None,
            Some(trap.message),
            Vec::new(),
            trap.diagnostic_events,
            fee,
        )
    }

    fn account_entry(&self, source: &AccountId) -> Result<LedgerEntry> {
        self.ledger
            .accounts
            .account_entry(source, self.ledger.clock.sequence())
    }

    #[allow(clippy::too_many_arguments)]
    fn record(
        &mut self,
        parsed: &ParsedEnvelope,
        status: TransactionStatus,
        result: &TransactionResult,
        meta: &TransactionMeta,
        return_value: Option<ScVal>,
        error: Option<String>,
        events: Vec<ContractEvent>,
        diagnostic_events: Vec<DiagnosticEvent>,
        fee_charged: i64,
    ) -> Result<TransactionRecord> {
        let ledger = self.ledger.clock.sequence();
        let record = TransactionRecord {
            hash: parsed.hash_hex(),
            envelope: parsed.raw.clone(),
            status,
            result: to_xdr_bytes(result)?,
            meta: to_xdr_bytes(meta)?,
            return_value,
            error,
            events,
            diagnostic_events,
            ledger,
            created_at: self.ledger.clock.timestamp(),
            application_order: self.log.next_application_order(ledger),
            fee_charged,
        };
        logging::log_transaction_applied(&record.hash, status, fee_charged, ledger);
        self.log.append(record.clone());
        Ok(record)
    }
}

fn transaction_meta(
    tx_changes_before: Vec<LedgerEntryChange>,
    operation_changes: Option<Vec<LedgerEntryChange>>,
    events: &[ContractEvent],
    return_value: ScVal,
    diagnostic_events: &[DiagnosticEvent],
) -> Result<TransactionMeta> {
    let operations = match operation_changes {
        Some(changes) => vec![OperationMeta {
            changes: LedgerEntryChanges(changes.try_into()?),
        }],
        None => Vec::new(),
    };
    Ok(TransactionMeta::V3(TransactionMetaV3 {
        ext: ExtensionPoint::V0,
        tx_changes_before: LedgerEntryChanges(tx_changes_before.try_into()?),
        operations: operations.try_into()?,
        tx_changes_after: LedgerEntryChanges(Default::default()),
        soroban_meta: Some(SorobanTransactionMeta {
            ext: SorobanTransactionMetaExt::V0,
            events: events.to_vec().try_into()?,
            return_value,
            diagnostic_events: diagnostic_events.to_vec().try_into()?,
        }),
    }))
}
