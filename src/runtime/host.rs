//! Boundary between the ledger and the contract interpreter.
//!
//! The sandbox does not execute wasm itself. A [`HostEvaluator`] receives the
//! host function of a transaction together with a [`HostStorage`] view of the
//! ledger and reports what the invocation did. Every read goes through
//! `HostStorage` so the footprint can be recorded or enforced.

use super::footprint::{EvaluationMode, FootprintTracker, FootprintViolation};
use crate::ledger::{LedgerSnapshot, LedgerState, SnapshotEntry};
use crate::logging;
use crate::utils::xdr_len;
use stellar_xdr::curr::{
    AccountId, ContractEvent, DiagnosticEvent, HostFunction, LedgerEntry, LedgerKey, ScAddress,
    ScVal, SorobanAuthorizedInvocation,
};

/// Storage handed to the evaluator: the ledger snapshot plus footprint tracking.
#[derive(Debug)]
pub struct HostStorage<'a> {
    snapshot: LedgerSnapshot<'a>,
    tracker: FootprintTracker,
}

impl<'a> HostStorage<'a> {
    pub fn new(snapshot: LedgerSnapshot<'a>, mode: EvaluationMode) -> Self {
        Self {
            snapshot,
            tracker: FootprintTracker::new(mode),
        }
    }

    /// Read `key`. Missing and expired entries read as `None`. In enforcing
    /// mode a key outside the footprint is an error; the violation is kept
    /// even if the evaluator swallows it.
    pub fn get(&mut self, key: &LedgerKey) -> Result<Option<SnapshotEntry>, FootprintViolation> {
        let found = self.snapshot.get(key);
        let size = found.as_ref().map(|e| xdr_len(&e.entry)).unwrap_or(0);
        logging::log_storage_read(key, found.is_some());
        self.tracker.record_read(key, size)?;
        Ok(found)
    }

    pub fn has(&mut self, key: &LedgerKey) -> Result<bool, FootprintViolation> {
        self.get(key).map(|entry| entry.is_some())
    }

    pub fn ledger(&self) -> &'a LedgerState {
        self.snapshot.state()
    }

    pub fn network_passphrase(&self) -> &'a str {
        self.snapshot.network_passphrase()
    }

    pub fn mode(&self) -> &EvaluationMode {
        self.tracker.mode()
    }

    pub fn tracker(&self) -> &FootprintTracker {
        &self.tracker
    }

    pub(crate) fn into_tracker(self) -> FootprintTracker {
        self.tracker
    }
}

/// What to run and on whose behalf.
#[derive(Debug, Clone, Copy)]
pub struct Invocation<'a> {
    pub host_function: &'a HostFunction,
    pub source_account: &'a AccountId,
}

/// Instructions and memory consumed by an evaluation, as reported by the evaluator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionCost {
    pub instructions: u64,
    pub memory_bytes: u64,
}

/// A state change requested by a successful evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryChange {
    /// Create or replace an entry. `live_until` is only honoured when it
    /// extends the default TTL of the entry's durability.
    Upsert {
        entry: LedgerEntry,
        live_until: Option<u32>,
    },
    Remove(LedgerKey),
    ExtendTtl { key: LedgerKey, live_until: u32 },
}

/// An address whose authorization the invocation required, with the
/// invocation tree it authorizes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRequirement {
    pub address: ScAddress,
    pub invocation: SorobanAuthorizedInvocation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub return_value: ScVal,
    pub changes: Vec<EntryChange>,
    pub auth: Vec<AuthRequirement>,
    pub events: Vec<ContractEvent>,
    pub diagnostic_events: Vec<DiagnosticEvent>,
    pub cost: ExecutionCost,
}

impl Evaluation {
    pub fn returning(return_value: ScVal) -> Self {
        Self {
            return_value,
            changes: Vec::new(),
            auth: Vec::new(),
            events: Vec::new(),
            diagnostic_events: Vec::new(),
            cost: ExecutionCost::default(),
        }
    }
}

/// Evaluator failure: a contract trap, a missing contract or function, or a
/// storage access the footprint does not allow.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct Trap {
    pub message: String,
    pub diagnostic_events: Vec<DiagnosticEvent>,
    pub cost: ExecutionCost,
}

impl Trap {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            diagnostic_events: Vec::new(),
            cost: ExecutionCost::default(),
        }
    }

    pub fn with_diagnostics(mut self, events: Vec<DiagnosticEvent>) -> Self {
        self.diagnostic_events = events;
        self
    }
}

impl From<FootprintViolation> for Trap {
    fn from(violation: FootprintViolation) -> Self {
        Trap::new(violation.to_string())
    }
}

/// The contract interpreter.
pub trait HostEvaluator {
    fn evaluate(
        &self,
        storage: &mut HostStorage<'_>,
        invocation: &Invocation<'_>,
    ) -> Result<Evaluation, Trap>;
}

impl<E: HostEvaluator + ?Sized> HostEvaluator for &E {
    fn evaluate(
        &self,
        storage: &mut HostStorage<'_>,
        invocation: &Invocation<'_>,
    ) -> Result<Evaluation, Trap> {
        (**self).evaluate(storage, invocation)
    }
}

impl<E: HostEvaluator + ?Sized> HostEvaluator for Box<E> {
    fn evaluate(
        &self,
        storage: &mut HostStorage<'_>,
        invocation: &Invocation<'_>,
    ) -> Result<Evaluation, Trap> {
        (**self).evaluate(storage, invocation)
    }
}
