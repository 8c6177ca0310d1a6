pub mod config;
pub mod ledger;
pub mod logging;
pub mod rpc;
pub mod runtime;
pub mod sandbox;
pub mod utils;
use miette::Diagnostic;

pub use ledger::{Durability, LedgerState};
pub use runtime::executor::{TransactionRecord, TransactionStatus};
pub use runtime::host::{
    AuthRequirement, EntryChange, Evaluation, ExecutionCost, HostEvaluator, HostStorage,
    Invocation, Trap,
};
pub use runtime::simulator::{SimulationOutcome, SimulationResult};
pub use sandbox::Sandbox;

/// Result type alias for the sandbox
pub type Result<T, E = SandboxError> = std::result::Result<T, E>;

/// Error types for the sandbox
#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum SandboxError {
    #[error("Malformed input: {0}")]
    #[diagnostic(
        code(sandbox::malformed_input),
        help("Binary payloads are base64-encoded XDR. Make sure the value was produced by a Stellar SDK targeting the same protocol version.")
    )]
    MalformedInput(String),

    #[error("Not found: {0}")]
    #[diagnostic(
        code(sandbox::not_found),
        help("Accounts must be funded before use, and contract entries are unreadable once their TTL has passed.")
    )]
    NotFound(String),

    #[error("Invalid key: {0}")]
    #[diagnostic(
        code(sandbox::invalid_key),
        help("Accounts are given as G... strkeys or base64 XDR AccountIds, contracts as C... strkeys or base64 XDR ScAddresses.")
    )]
    InvalidKey(String),

    #[error("Sequence number mismatch: expected {expected}, got {actual}")]
    #[diagnostic(
        code(sandbox::sequence_mismatch),
        help("Reload the source account and build the transaction with its sequence number plus one.")
    )]
    SequenceMismatch { expected: i64, actual: i64 },

    #[error("Unauthorized: {0}")]
    #[diagnostic(
        code(sandbox::unauthorized),
        help("Sign the envelope with the source account key and include every authorization entry returned by simulation.")
    )]
    Unauthorized(String),

    #[error("Insufficient balance: has {balance}, needs {required}")]
    #[diagnostic(
        code(sandbox::insufficient_balance),
        help("Fund the source account with enough to cover the declared fee.")
    )]
    InsufficientBalance { balance: i64, required: i64 },

    #[error("Resource limit exceeded: {0}")]
    #[diagnostic(
        code(sandbox::resource_limit_exceeded),
        help("Simulate the transaction and attach the returned transaction data so the footprint covers every entry the contract touches.")
    )]
    ResourceLimitExceeded(String),

    #[error("Contract trapped: {0}")]
    #[diagnostic(code(sandbox::contract_trap))]
    ContractTrap(String),

    #[error("Ledger time {now} is outside the transaction time bounds [{min_time}, {max_time}]")]
    #[diagnostic(
        code(sandbox::precondition_failed),
        help("Adjust the time bounds or move the sandbox clock with set_time.")
    )]
    PreconditionFailed {
        now: u64,
        min_time: u64,
        max_time: u64,
    },

    #[error("Configuration error: {0}")]
    #[diagnostic(
        code(sandbox::config_error),
        help("Check the syntax of .soroban-sandbox.toml.")
    )]
    Config(String),
}

impl From<stellar_xdr::curr::Error> for SandboxError {
    fn from(e: stellar_xdr::curr::Error) -> Self {
        SandboxError::MalformedInput(format!("XDR error: {e}"))
    }
}
