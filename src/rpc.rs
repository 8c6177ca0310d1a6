//! JSON shapes of the Soroban RPC methods the sandbox stands in for.
//!
//! All XDR payloads are base64 encoded. Field names follow the RPC so client
//! SDKs can parse the responses unchanged.

use crate::ledger::{LedgerState, SnapshotEntry};
use crate::runtime::{SimulationOutcome, SimulationResult, StateChangeKind, TransactionRecord};
use crate::runtime::TransactionStatus;
use crate::utils::{encode_base64, sha256, to_xdr_base64};
use crate::{Result, SandboxError};
use serde::Serialize;
use stellar_xdr::curr::{
    DiagnosticEvent, InvokeHostFunctionResult, LedgerEntry, LedgerKey, OperationResult,
    OperationResultTr, TransactionResult, TransactionResultExt, TransactionResultResult,
};

const SIMULATION_ID: &str = "1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInfo {
    pub passphrase: String,
    pub protocol_version: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestLedger {
    pub id: String,
    pub protocol_version: u32,
    pub sequence: u32,
}

impl LatestLedger {
    pub fn from_state(state: &LedgerState) -> Self {
        let mut preimage = state.network_id.to_vec();
        preimage.extend_from_slice(&state.sequence_number.to_be_bytes());
        Self {
            id: hex::encode(sha256(&preimage)),
            protocol_version: state.protocol_version,
            sequence: state.sequence_number,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum SimulateTransactionResponse {
    Success(SimulateTransactionSuccessResponse),
    Error(SimulateTransactionErrorResponse),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulateTransactionSuccessResponse {
    pub id: String,
    pub latest_ledger: u32,
    pub events: Vec<String>,
    #[serde(rename = "_parsed")]
    pub parsed: bool,
    pub transaction_data: String,
    pub min_resource_fee: String,
    pub result: SimulateHostFunctionResult,
    pub state_changes: Vec<StateChangeResponse>,
    pub cost: SimulationCost,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulateTransactionErrorResponse {
    pub id: String,
    pub latest_ledger: u32,
    pub events: Vec<String>,
    #[serde(rename = "_parsed")]
    pub parsed: bool,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulateHostFunctionResult {
    pub auth: Vec<String>,
    pub retval: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StateChangeResponse {
    #[serde(rename = "type")]
    pub kind: StateChangeKind,
    pub key: String,
    pub before: Option<String>,
    pub after: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationCost {
    pub cpu_insns: String,
    pub mem_bytes: String,
}

impl SimulateTransactionResponse {
    pub fn from_result(result: &SimulationResult) -> Result<Self> {
        let events = encode_events(&result.events)?;
        let retval = match &result.outcome {
            SimulationOutcome::Returned(value) => value,
            SimulationOutcome::Failed(error) => {
                return Ok(Self::Error(SimulateTransactionErrorResponse {
                    id: SIMULATION_ID.to_string(),
                    latest_ledger: result.latest_ledger,
                    events,
                    parsed: true,
                    error: error.clone(),
                }))
            }
        };
        let transaction_data = match &result.transaction_data {
            Some(data) => to_xdr_base64(data)?,
            None => String::new(),
        };
        Ok(Self::Success(SimulateTransactionSuccessResponse {
            id: SIMULATION_ID.to_string(),
            latest_ledger: result.latest_ledger,
            events,
            parsed: true,
            transaction_data,
            min_resource_fee: result.minimum_resource_fee.to_string(),
            result: SimulateHostFunctionResult {
                auth: result
                    .authorization_requirements
                    .iter()
                    .map(to_xdr_base64)
                    .collect::<Result<_>>()?,
                retval: to_xdr_base64(retval)?,
            },
            state_changes: result
                .state_changes
                .iter()
                .map(|change| {
                    Ok(StateChangeResponse {
                        kind: change.kind,
                        key: to_xdr_base64(&change.key)?,
                        before: change.before.as_ref().map(to_xdr_base64).transpose()?,
                        after: change.after.as_ref().map(to_xdr_base64).transpose()?,
                    })
                })
                .collect::<Result<_>>()?,
            cost: SimulationCost {
                cpu_insns: result.cost.instructions.to_string(),
                mem_bytes: result.cost.memory_bytes.to_string(),
            },
        }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SendTransactionStatus {
    Pending,
    Duplicate,
    TryAgainLater,
    Error,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendTransactionResponse {
    pub status: SendTransactionStatus,
    pub hash: String,
    pub latest_ledger: u32,
    pub latest_ledger_close_time: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_result_xdr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic_events_xdr: Option<Vec<String>>,
}

impl SendTransactionResponse {
    /// Accepted transaction. Execution is synchronous, so `PENDING` means the
    /// result is already available from `getTransaction`.
    pub fn pending(hash: String, state: &LedgerState) -> Self {
        Self {
            status: SendTransactionStatus::Pending,
            hash,
            latest_ledger: state.sequence_number,
            latest_ledger_close_time: state.timestamp,
            error_result_xdr: None,
            diagnostic_events_xdr: None,
        }
    }

    pub fn duplicate(hash: String, state: &LedgerState) -> Self {
        Self {
            status: SendTransactionStatus::Duplicate,
            ..Self::pending(hash, state)
        }
    }

    pub fn rejected(hash: String, error: &SandboxError, state: &LedgerState) -> Result<Self> {
        Ok(Self {
            status: SendTransactionStatus::Error,
            error_result_xdr: Some(to_xdr_base64(&error_result(error)?)?),
            ..Self::pending(hash, state)
        })
    }
}

/// `TransactionResult` reported for a rejected transaction. Nothing is charged.
pub fn error_result(error: &SandboxError) -> Result<TransactionResult> {
    let op_failure = |result: InvokeHostFunctionResult| -> Result<TransactionResultResult> {
        Ok(TransactionResultResult::TxFailed(
            vec![OperationResult::OpInner(OperationResultTr::InvokeHostFunction(result))]
                .try_into()?,
        ))
    };
    let result = match error {
        SandboxError::SequenceMismatch { .. } => TransactionResultResult::TxBadSeq,
        SandboxError::Unauthorized(_) => TransactionResultResult::TxBadAuth,
        SandboxError::NotFound(_) => TransactionResultResult::TxNoAccount,
        SandboxError::InsufficientBalance { .. } => TransactionResultResult::TxInsufficientBalance,
        SandboxError::PreconditionFailed { now, min_time, .. } if now < min_time => {
            TransactionResultResult::TxTooEarly
        }
        SandboxError::PreconditionFailed { .. } => TransactionResultResult::TxTooLate,
        SandboxError::MalformedInput(_) | SandboxError::InvalidKey(_) => {
            TransactionResultResult::TxMalformed
        }
        SandboxError::ResourceLimitExceeded(_) => {
            op_failure(InvokeHostFunctionResult::ResourceLimitExceeded)?
        }
        SandboxError::ContractTrap(_) => op_failure(InvokeHostFunctionResult::Trapped)?,
        SandboxError::Config(_) => TransactionResultResult::TxInternalError,
    };
    Ok(TransactionResult {
        fee_charged: 0,
        result,
        ext: TransactionResultExt::V0,
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status")]
pub enum GetTransactionResponse {
    #[serde(rename = "SUCCESS")]
    Success(TransactionDetails),
    #[serde(rename = "FAILED")]
    Failed(TransactionDetails),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDetails {
    pub tx_hash: String,
    pub latest_ledger: u32,
    pub latest_ledger_close_time: u64,
    pub oldest_ledger: u32,
    pub oldest_ledger_close_time: u64,
    pub ledger: u32,
    pub created_at: u64,
    pub application_order: u32,
    pub fee_bump: bool,
    pub envelope_xdr: String,
    pub result_xdr: String,
    pub result_meta_xdr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic_events_xdr: Option<Vec<String>>,
}

impl GetTransactionResponse {
    pub fn from_record(
        record: &TransactionRecord,
        oldest: &TransactionRecord,
        state: &LedgerState,
    ) -> Result<Self> {
        let details = TransactionDetails {
            tx_hash: record.hash.clone(),
            latest_ledger: state.sequence_number,
            latest_ledger_close_time: state.timestamp,
            oldest_ledger: oldest.ledger,
            oldest_ledger_close_time: oldest.created_at,
            ledger: record.ledger,
            created_at: record.created_at,
            application_order: record.application_order,
            fee_bump: false,
            envelope_xdr: encode_base64(&record.envelope),
            result_xdr: encode_base64(&record.result),
            result_meta_xdr: encode_base64(&record.meta),
            return_value: record.return_value.as_ref().map(to_xdr_base64).transpose()?,
            diagnostic_events_xdr: if record.diagnostic_events.is_empty() {
                None
            } else {
                Some(encode_events(&record.diagnostic_events)?)
            },
        };
        Ok(match record.status {
            TransactionStatus::Success => Self::Success(details),
            TransactionStatus::Failed => Self::Failed(details),
        })
    }

    pub fn details(&self) -> &TransactionDetails {
        match self {
            Self::Success(details) | Self::Failed(details) => details,
        }
    }
}

/// One item of a `getLedgerEntries` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntryResult {
    pub key: String,
    /// base64 XDR `LedgerEntryData`.
    pub xdr: String,
    pub last_modified_ledger_seq: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub live_until_ledger_seq: Option<u32>,
    #[serde(skip)]
    pub entry: LedgerEntry,
}

impl LedgerEntryResult {
    pub fn new(key: &LedgerKey, found: SnapshotEntry) -> Result<Self> {
        Ok(Self {
            key: to_xdr_base64(key)?,
            xdr: to_xdr_base64(&found.entry.data)?,
            last_modified_ledger_seq: found.entry.last_modified_ledger_seq,
            live_until_ledger_seq: found.live_until,
            entry: found.entry,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetLedgerEntriesResponse {
    pub entries: Vec<LedgerEntryResult>,
    pub latest_ledger: u32,
}

fn encode_events(events: &[DiagnosticEvent]) -> Result<Vec<String>> {
    events.iter().map(to_xdr_base64).collect()
}
