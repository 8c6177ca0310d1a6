//! Structured logging helpers for the sandbox.
//!
//! Every state transition of the ledger is reported through one of these
//! functions so the field names stay consistent across modules.

use crate::runtime::TransactionStatus;
use crate::utils::describe_key;
use crate::SandboxError;
use stellar_xdr::curr::LedgerKey;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Environment variable switching log output to JSON lines.
pub const JSON_ENV_VAR: &str = "SOROBAN_SANDBOX_JSON";

/// Install a global `tracing` subscriber writing to stderr.
///
/// `RUST_LOG` takes precedence over `default_level`. Does nothing when a
/// subscriber is already installed, so tests may call it repeatedly.
pub fn init_tracing(default_level: &str) {
    let fallback_filter = format!("soroban_sandbox={default_level}");
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| fallback_filter.into());

    if std::env::var(JSON_ENV_VAR).is_ok() {
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_level(true);
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(json_layer)
            .try_init();
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_level(true);
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init();
    }
}

pub fn log_account_funded(account: &str, balance: i64) {
    tracing::info!(account, balance, "Account funded");
}

pub fn log_clock_changed(field: &'static str, from: u64, to: u64) {
    if to < from {
        tracing::warn!(field, from, to, "Ledger clock moved backwards");
    } else {
        tracing::info!(field, from, to, "Ledger clock changed");
    }
}

pub fn log_code_deployed(owner: &str, hash: &str, bytes: usize) {
    tracing::info!(owner, hash, bytes, "Contract code deployed");
}

pub fn log_entries_reaped(count: usize, sequence: u32) {
    tracing::info!(count, sequence, "Expired entries reaped");
}

/// Log a storage read made by the host evaluator.
pub fn log_storage_read(key: &LedgerKey, found: bool) {
    if tracing::enabled!(tracing::Level::DEBUG) {
        tracing::debug!(key = %describe_key(key), found, "Storage read");
    }
}

pub fn log_footprint(tx_hash: &str, keys: usize) {
    tracing::debug!(tx_hash, keys, "Declared footprint");
}

pub fn log_simulation(tx_hash: &str, success: bool, footprint_keys: usize) {
    if success {
        tracing::info!(tx_hash, footprint_keys, "Transaction simulated");
    } else {
        tracing::warn!(tx_hash, footprint_keys, "Simulation failed");
    }
}

pub fn log_transaction_applied(tx_hash: &str, status: TransactionStatus, fee: i64, ledger: u32) {
    tracing::info!(tx_hash, status = ?status, fee, ledger, "Transaction applied");
}

pub fn log_transaction_rejected(tx_hash: &str, error: &SandboxError) {
    tracing::warn!(tx_hash, error = %error, "Transaction rejected");
}

pub fn log_contract_trap(tx_hash: &str, message: &str) {
    tracing::warn!(tx_hash, message, "Contract trapped");
}
