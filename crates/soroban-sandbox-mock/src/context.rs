use crate::mock::MockHost;
use soroban_sandbox::runtime::FootprintViolation;
use soroban_sandbox::utils::{describe_key, xdr_len};
use soroban_sandbox::{
    AuthRequirement, Durability, EntryChange, Evaluation, ExecutionCost, HostStorage, LedgerState,
    SandboxError,
};
use std::collections::BTreeMap;
use stellar_xdr::curr::{
    AccountId, ContractDataEntry, ContractEvent, ContractEventBody, ContractEventType,
    ContractEventV0, ExtensionPoint, Hash, InvokeContractArgs, LedgerEntry, LedgerEntryData,
    LedgerEntryExt, LedgerKey, LedgerKeyAccount, LedgerKeyContractData, ScAddress, ScVal,
    SorobanAuthorizedFunction, SorobanAuthorizedInvocation,
};

pub(crate) const CALL_COST: u64 = 10_000;
const READ_COST: u64 = 2_500;
const WRITE_COST: u64 = 5_000;
const EVENT_COST: u64 = 1_000;

#[derive(Debug, thiserror::Error)]
pub enum ContractError {
    #[error("{0}")]
    Trap(String),
    #[error(transparent)]
    Footprint(#[from] FootprintViolation),
}

impl ContractError {
    pub fn trap(message: impl Into<String>) -> Self {
        ContractError::Trap(message.into())
    }
}

impl From<SandboxError> for ContractError {
    fn from(e: SandboxError) -> Self {
        ContractError::Trap(e.to_string())
    }
}

impl From<stellar_xdr::curr::Error> for ContractError {
    fn from(e: stellar_xdr::curr::Error) -> Self {
        ContractError::Trap(format!("xdr: {e}"))
    }
}

/// Effects accumulated over one host function call, nested calls included.
#[derive(Debug, Default)]
pub(crate) struct InvocationState {
    overlay: BTreeMap<LedgerKey, Option<LedgerEntry>>,
    changes: Vec<EntryChange>,
    auth: Vec<AuthRequirement>,
    events: Vec<ContractEvent>,
    pub(crate) cost: ExecutionCost,
}

impl InvocationState {
    pub(crate) fn finish(self, return_value: ScVal) -> Evaluation {
        let mut evaluation = Evaluation::returning(return_value);
        evaluation.changes = self.changes;
        evaluation.auth = self.auth;
        evaluation.events = self.events;
        evaluation.cost = self.cost;
        evaluation
    }

    pub(crate) fn charge(&mut self, instructions: u64) {
        self.cost.instructions += instructions;
    }
}

/// What a mock contract sees while it runs: its own storage, the ledger
/// header, and ways to require auth, emit events and call other contracts.
pub struct CallContext<'a, 's> {
    host: &'a MockHost,
    storage: &'a mut HostStorage<'s>,
    state: &'a mut InvocationState,
    contract: ScAddress,
    invoker: ScAddress,
    source: AccountId,
    call: InvokeContractArgs,
}

impl<'a, 's> CallContext<'a, 's> {
    pub(crate) fn new(
        host: &'a MockHost,
        storage: &'a mut HostStorage<'s>,
        state: &'a mut InvocationState,
        invoker: ScAddress,
        source: AccountId,
        call: InvokeContractArgs,
    ) -> Self {
        Self {
            host,
            storage,
            state,
            contract: call.contract_address.clone(),
            invoker,
            source,
            call,
        }
    }

    pub fn contract(&self) -> &ScAddress {
        &self.contract
    }

    /// The transaction source for a top-level call, the calling contract otherwise.
    pub fn invoker(&self) -> &ScAddress {
        &self.invoker
    }

    pub fn source_account(&self) -> &AccountId {
        &self.source
    }

    pub fn ledger(&self) -> &LedgerState {
        self.storage.ledger()
    }

    pub fn charge(&mut self, instructions: u64) {
        self.state.charge(instructions);
    }

    pub fn get(
        &mut self,
        key: &ScVal,
        durability: Durability,
    ) -> Result<Option<ScVal>, ContractError> {
        let ledger_key = self.data_key(key, durability);
        Ok(match self.read(&ledger_key)? {
            Some(LedgerEntry {
                data: LedgerEntryData::ContractData(data),
                ..
            }) => Some(data.val),
            _ => None,
        })
    }

    pub fn has(&mut self, key: &ScVal, durability: Durability) -> Result<bool, ContractError> {
        self.get(key, durability).map(|value| value.is_some())
    }

    pub fn set(&mut self, key: ScVal, val: ScVal, durability: Durability) {
        self.put(key, val, durability, None);
    }

    /// Write and ask for the entry to live until at least `live_until`.
    pub fn set_with_ttl(&mut self, key: ScVal, val: ScVal, durability: Durability, live_until: u32) {
        self.put(key, val, durability, Some(live_until));
    }

    pub fn remove(&mut self, key: &ScVal, durability: Durability) {
        let ledger_key = self.data_key(key, durability);
        self.state.charge(WRITE_COST);
        self.state.overlay.insert(ledger_key.clone(), None);
        self.state.changes.push(EntryChange::Remove(ledger_key));
    }

    pub fn extend_ttl(&mut self, key: &ScVal, durability: Durability, live_until: u32) {
        let key = self.data_key(key, durability);
        self.state.charge(WRITE_COST);
        self.state
            .changes
            .push(EntryChange::ExtendTtl { key, live_until });
    }

    /// Require `address` to authorize the current call.
    pub fn require_auth(&mut self, address: &ScAddress) {
        let requirement = AuthRequirement {
            address: address.clone(),
            invocation: SorobanAuthorizedInvocation {
                function: SorobanAuthorizedFunction::ContractFn(self.call.clone()),
                sub_invocations: Default::default(),
            },
        };
        self.push_auth(requirement);
    }

    pub fn emit(&mut self, topics: Vec<ScVal>, data: ScVal) -> Result<(), ContractError> {
        self.state.charge(EVENT_COST);
        self.state.events.push(ContractEvent {
            ext: ExtensionPoint::V0,
            contract_id: contract_hash(&self.contract).cloned(),
            type_: ContractEventType::Contract,
            body: ContractEventBody::V0(ContractEventV0 {
                topics: topics.try_into()?,
                data,
            }),
        });
        Ok(())
    }

    /// Call another contract with this one as the invoker.
    pub fn call(
        &mut self,
        contract: &ScAddress,
        function: &str,
        args: Vec<ScVal>,
    ) -> Result<ScVal, ContractError> {
        let call = InvokeContractArgs {
            contract_address: contract.clone(),
            function_name: soroban_sandbox::utils::symbol(function)?,
            args: args.try_into()?,
        };
        self.host.invoke_contract(
            self.storage,
            self.state,
            self.contract.clone(),
            self.source.clone(),
            call,
        )
    }

    pub fn account_balance(&mut self, account: &AccountId) -> Result<Option<i64>, ContractError> {
        Ok(match self.read(&account_key(account))? {
            Some(LedgerEntry {
                data: LedgerEntryData::Account(entry),
                ..
            }) => Some(entry.balance),
            _ => None,
        })
    }

    /// Overwrite the native balance of an existing account.
    pub fn set_account_balance(
        &mut self,
        account: &AccountId,
        balance: i64,
    ) -> Result<(), ContractError> {
        let key = account_key(account);
        let mut entry = self
            .read(&key)?
            .ok_or_else(|| ContractError::trap(format!("{} does not exist", describe_key(&key))))?;
        if let LedgerEntryData::Account(account) = &mut entry.data {
            account.balance = balance;
        }
        self.write(key, entry, None);
        Ok(())
    }

    pub(crate) fn push_auth(&mut self, requirement: AuthRequirement) {
        if !self.state.auth.contains(&requirement) {
            self.state.auth.push(requirement);
        }
    }

    pub(crate) fn read(&mut self, key: &LedgerKey) -> Result<Option<LedgerEntry>, ContractError> {
        self.state.charge(READ_COST);
        if let Some(pending) = self.state.overlay.get(key) {
            return Ok(pending.clone());
        }
        Ok(self.storage.get(key)?.map(|found| found.entry))
    }

    pub(crate) fn write(&mut self, key: LedgerKey, entry: LedgerEntry, live_until: Option<u32>) {
        self.state.charge(WRITE_COST);
        self.state.cost.memory_bytes += u64::from(xdr_len(&entry));
        self.state.overlay.insert(key, Some(entry.clone()));
        self.state
            .changes
            .push(EntryChange::Upsert { entry, live_until });
    }

    fn put(&mut self, key: ScVal, val: ScVal, durability: Durability, live_until: Option<u32>) {
        let ledger_key = self.data_key(&key, durability);
        let entry = LedgerEntry {
            last_modified_ledger_seq: self.ledger().sequence_number,
            data: LedgerEntryData::ContractData(ContractDataEntry {
                ext: ExtensionPoint::V0,
                contract: self.contract.clone(),
                key,
                durability: durability.into(),
                val,
            }),
            ext: LedgerEntryExt::V0,
        };
        self.write(ledger_key, entry, live_until);
    }

    fn data_key(&self, key: &ScVal, durability: Durability) -> LedgerKey {
        LedgerKey::ContractData(LedgerKeyContractData {
            contract: self.contract.clone(),
            key: key.clone(),
            durability: durability.into(),
        })
    }
}

fn account_key(account: &AccountId) -> LedgerKey {
    LedgerKey::Account(LedgerKeyAccount {
        account_id: account.clone(),
    })
}

pub(crate) fn contract_hash(address: &ScAddress) -> Option<&Hash> {
    match address {
        ScAddress::Contract(hash) => Some(hash),
        ScAddress::Account(_) => None,
    }
}
