pub mod envelope;
pub mod executor;
pub mod fees;
pub mod footprint;
pub mod host;
pub mod simulator;
pub mod staging;
pub mod validation;

pub use envelope::ParsedEnvelope;
pub use executor::{TransactionExecutor, TransactionRecord, TransactionStatus, TxLog};
pub use fees::{FeeConfiguration, ResourceUsage};
pub use footprint::{EvaluationMode, Footprint, FootprintTracker, FootprintViolation};
pub use host::{HostEvaluator, HostStorage, Invocation};
pub use simulator::{SimulationOutcome, SimulationResult, TransactionSimulator};
pub use staging::{ChangeSet, StateChange, StateChangeKind};

use crate::ledger::LedgerSnapshot;
use host::{Evaluation, Trap};
use stellar_xdr::curr::{ContractEvent, DiagnosticEvent};

/// Run the host function of `parsed` once against `snapshot`. Simulation and
/// execution both go through here; only `mode` differs.
pub(crate) fn evaluate<E: HostEvaluator + ?Sized>(
    evaluator: &E,
    snapshot: LedgerSnapshot<'_>,
    parsed: &ParsedEnvelope,
    mode: EvaluationMode,
) -> (Result<Evaluation, Trap>, FootprintTracker) {
    let source = parsed.invocation_source();
    let invocation = Invocation {
        host_function: &parsed.operation().host_function,
        source_account: &source,
    };
    let mut storage = HostStorage::new(snapshot, mode);
    let outcome = evaluator.evaluate(&mut storage, &invocation);
    (outcome, storage.into_tracker())
}

/// Contract events as diagnostic events of a successful call, followed by
/// the evaluator's own diagnostics.
pub(crate) fn diagnostic_events(
    events: &[ContractEvent],
    diagnostics: &[DiagnosticEvent],
) -> Vec<DiagnosticEvent> {
    events
        .iter()
        .map(|event| DiagnosticEvent {
            in_successful_contract_call: true,
            event: event.clone(),
        })
        .chain(diagnostics.iter().cloned())
        .collect()
}
