use super::envelope::ParsedEnvelope;
use super::fees::{FeeConfiguration, ResourceUsage};
use super::footprint::{EvaluationMode, Footprint, FootprintTracker};
use super::host::{AuthRequirement, ExecutionCost, HostEvaluator};
use super::staging::{ChangeSet, StateChange};
use crate::ledger::Ledger;
use crate::logging;
use crate::utils::{account_key_bytes, sha256, to_xdr_bytes, xdr_len};
use crate::Result;
use stellar_xdr::curr::{
    AccountId, DiagnosticEvent, ExtensionPoint, ScAddress, ScVal, SorobanAddressCredentials,
    SorobanAuthorizationEntry, SorobanCredentials, SorobanResources, SorobanTransactionData,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimulationOutcome {
    Returned(ScVal),
    Failed(String),
}

/// Everything a client needs to assemble a transaction for submission.
#[derive(Debug, Clone)]
pub struct SimulationResult {
    pub footprint: Footprint,
    pub authorization_requirements: Vec<SorobanAuthorizationEntry>,
    pub minimum_resource_fee: i64,
    pub transaction_data: Option<SorobanTransactionData>,
    pub events: Vec<DiagnosticEvent>,
    pub state_changes: Vec<StateChange>,
    pub cost: ExecutionCost,
    pub outcome: SimulationOutcome,
    pub latest_ledger: u32,
}

impl SimulationResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, SimulationOutcome::Returned(_))
    }

    pub fn return_value(&self) -> Option<&ScVal> {
        match &self.outcome {
            SimulationOutcome::Returned(value) => Some(value),
            SimulationOutcome::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            SimulationOutcome::Returned(_) => None,
            SimulationOutcome::Failed(message) => Some(message),
        }
    }

    fn failed(
        tracker: &FootprintTracker,
        message: String,
        events: Vec<DiagnosticEvent>,
        cost: ExecutionCost,
        latest_ledger: u32,
    ) -> Self {
        Self {
            footprint: tracker.footprint().clone(),
            authorization_requirements: Vec::new(),
            minimum_resource_fee: 0,
            transaction_data: None,
            events,
            state_changes: Vec::new(),
            cost,
            outcome: SimulationOutcome::Failed(message),
            latest_ledger,
        }
    }
}

/// Dry run of a transaction against a borrowed ledger. Holding only `&Ledger`
/// it cannot change state whatever the evaluator does.
pub struct TransactionSimulator<'a, E: ?Sized> {
    ledger: &'a Ledger,
    fees: &'a FeeConfiguration,
    evaluator: &'a E,
}

impl<'a, E: HostEvaluator + ?Sized> TransactionSimulator<'a, E> {
    pub fn new(ledger: &'a Ledger, fees: &'a FeeConfiguration, evaluator: &'a E) -> Self {
        Self {
            ledger,
            fees,
            evaluator,
        }
    }

    /// Simulate a base64 XDR envelope. Decode failures are errors; traps are
    /// reported in the result.
    pub fn simulate(&self, envelope: &str) -> Result<SimulationResult> {
        let parsed = ParsedEnvelope::from_base64(envelope, &self.ledger.clock.network_id())?;
        self.simulate_parsed(&parsed)
    }

    pub fn simulate_parsed(&self, parsed: &ParsedEnvelope) -> Result<SimulationResult> {
        let snapshot = self.ledger.snapshot();
        let latest_ledger = self.ledger.clock.sequence();
        let (outcome, mut tracker) =
            super::evaluate(self.evaluator, snapshot, parsed, EvaluationMode::Recording);

        let evaluation = match outcome {
            Ok(evaluation) => evaluation,
            Err(trap) => {
                logging::log_simulation(&parsed.hash_hex(), false, tracker.footprint().len());
                return Ok(SimulationResult::failed(
                    &tracker,
                    trap.message,
                    trap.diagnostic_events,
                    trap.cost,
                    latest_ledger,
                ));
            }
        };
        let events = super::diagnostic_events(&evaluation.events, &evaluation.diagnostic_events);

        let changes = match ChangeSet::stage(snapshot, &mut tracker, &evaluation.changes) {
            Ok(changes) => changes,
            Err(trap) => {
                logging::log_simulation(&parsed.hash_hex(), false, tracker.footprint().len());
                return Ok(SimulationResult::failed(
                    &tracker,
                    trap.message,
                    events,
                    evaluation.cost,
                    latest_ledger,
                ));
            }
        };

        let auth = authorization_entries(
            &evaluation.auth,
            &parsed.invocation_source(),
            parsed.sequence_number(),
            &self.ledger.clock.network_id(),
        )?;

        let footprint = tracker.footprint().clone();
        let instructions = u32::try_from(evaluation.cost.instructions).unwrap_or(u32::MAX);
        let mut data = SorobanTransactionData {
            ext: ExtensionPoint::V0,
            resources: SorobanResources {
                footprint: footprint.to_xdr()?,
                instructions,
                read_bytes: tracker.read_bytes(),
                write_bytes: tracker.write_bytes(),
            },
            resource_fee: 0,
        };

        let transaction_size = (parsed.raw.len() as u32)
            .saturating_add(xdr_len(&data))
            .saturating_add(auth.iter().map(xdr_len).sum::<u32>());
        let usage = ResourceUsage {
            instructions,
            read_entries: footprint.read_only().count() as u32,
            write_entries: footprint.read_write().count() as u32,
            read_bytes: tracker.read_bytes(),
            write_bytes: tracker.write_bytes(),
            contract_events_size_bytes: evaluation.events.iter().map(xdr_len).sum(),
            transaction_size_bytes: transaction_size,
        };
        let fee = self.fees.estimate_resource_fee(&usage);
        data.resource_fee = fee;

        logging::log_simulation(&parsed.hash_hex(), true, footprint.len());
        Ok(SimulationResult {
            footprint,
            authorization_requirements: auth,
            minimum_resource_fee: fee,
            transaction_data: Some(data),
            events,
            state_changes: changes.state_changes(),
            cost: evaluation.cost,
            outcome: SimulationOutcome::Returned(evaluation.return_value),
            latest_ledger,
        })
    }
}

/// Turn recorded requirements into authorization entries. The invoking
/// account is covered by its transaction signature; every other address gets
/// unsigned address credentials with a deterministic nonce.
fn authorization_entries(
    requirements: &[AuthRequirement],
    source: &AccountId,
    tx_sequence: i64,
    network_id: &[u8; 32],
) -> Result<Vec<SorobanAuthorizationEntry>> {
    let invoker = ScAddress::Account(source.clone());
    requirements
        .iter()
        .enumerate()
        .map(|(index, requirement)| {
            let credentials = if requirement.address == invoker {
                SorobanCredentials::SourceAccount
            } else {
                SorobanCredentials::Address(SorobanAddressCredentials {
                    address: requirement.address.clone(),
                    nonce: auth_nonce(network_id, source, tx_sequence, requirement, index)?,
                    signature_expiration_ledger: 0,
                    signature: ScVal::Void,
                })
            };
            Ok(SorobanAuthorizationEntry {
                credentials,
                root_invocation: requirement.invocation.clone(),
            })
        })
        .collect()
}

fn auth_nonce(
    network_id: &[u8; 32],
    source: &AccountId,
    tx_sequence: i64,
    requirement: &AuthRequirement,
    index: usize,
) -> Result<i64> {
    let mut preimage = Vec::with_capacity(128);
    preimage.extend_from_slice(network_id);
    preimage.extend_from_slice(&account_key_bytes(source));
    preimage.extend_from_slice(&tx_sequence.to_be_bytes());
    preimage.extend_from_slice(&to_xdr_bytes(&requirement.address)?);
    preimage.extend_from_slice(&(index as u64).to_be_bytes());
    let digest = sha256(&preimage);
    let mut nonce = [0u8; 8];
    nonce.copy_from_slice(&digest[..8]);
    Ok(i64::from_be_bytes(nonce))
}
