use crate::context::{CallContext, ContractError, InvocationState, CALL_COST};
use soroban_sandbox::ledger::entries::code_key;
use soroban_sandbox::utils::{address_strkey, sha256, symbol, to_xdr_bytes};
use soroban_sandbox::{
    AuthRequirement, Evaluation, HostEvaluator, HostStorage, Invocation, Trap,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use stellar_xdr::curr::{
    AccountId, BytesM, ContractCodeEntry, ContractCodeEntryExt, ContractDataDurability,
    ContractDataEntry, ContractEvent, ContractEventBody, ContractEventType, ContractEventV0,
    ContractExecutable, ContractIdPreimage, ContractIdPreimageFromAddress, DiagnosticEvent, ExtensionPoint, Hash, HashIdPreimage,
    HashIdPreimageContractId, HostFunction, InvokeContractArgs, LedgerEntry, LedgerEntryData,
    LedgerEntryExt, LedgerKey, LedgerKeyContractData, ScAddress, ScBytes, ScContractInstance,
    ScString, ScVal, SorobanAuthorizedFunction, StringM, SorobanAuthorizedInvocation, Uint256,
};

/// Rust stand-in for a wasm contract.
pub trait MockContract: Send + Sync {
    fn call(
        &self,
        ctx: &mut CallContext<'_, '_>,
        function: &str,
        args: &[ScVal],
    ) -> Result<ScVal, ContractError>;

    /// Runs once when an instance is created with constructor arguments.
    fn construct(&self, _ctx: &mut CallContext<'_, '_>, _args: &[ScVal]) -> Result<(), ContractError> {
        Ok(())
    }
}

/// Host evaluator backed by registered [`MockContract`]s.
///
/// Code is keyed by the sha256 of its wasm bytes, so uploading the same bytes
/// through a transaction or `Sandbox::deploy_code` binds them to the mock.
#[derive(Clone, Default)]
pub struct MockHost {
    code: HashMap<[u8; 32], Arc<dyn MockContract>>,
    mocks: BTreeMap<(ScAddress, String), ScVal>,
}

impl MockHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, wasm: &[u8], contract: impl MockContract + 'static) -> [u8; 32] {
        let hash = sha256(wasm);
        self.code.insert(hash, Arc::new(contract));
        hash
    }

    /// Answer `function` on `contract` with a fixed value, without touching storage.
    pub fn mock_call(&mut self, contract: ScAddress, function: &str, return_value: ScVal) {
        self.mocks
            .insert((contract, function.to_string()), return_value);
    }

    /// Address a contract created by `deployer` with `salt` gets on `network_id`.
    pub fn contract_address(
        network_id: &[u8; 32],
        deployer: &ScAddress,
        salt: [u8; 32],
    ) -> Result<ScAddress, ContractError> {
        let preimage = ContractIdPreimage::Address(ContractIdPreimageFromAddress {
            address: deployer.clone(),
            salt: Uint256(salt),
        });
        contract_id(network_id, &preimage)
    }

    pub(crate) fn invoke_contract(
        &self,
        storage: &mut HostStorage<'_>,
        state: &mut InvocationState,
        invoker: ScAddress,
        source: AccountId,
        call: InvokeContractArgs,
    ) -> Result<ScVal, ContractError> {
        state.charge(CALL_COST);
        let function = call.function_name.0.to_utf8_string_lossy();
        if let Some(value) = self.mocks.get(&(call.contract_address.clone(), function.clone())) {
            return Ok(value.clone());
        }

        let contract = self.instance_code(storage, state, &invoker, &source, &call)?;
        let args = call.args.to_vec();
        let mut ctx = CallContext::new(self, storage, state, invoker, source, call);
        contract.call(&mut ctx, &function, &args)
    }

    fn instance_code(
        &self,
        storage: &mut HostStorage<'_>,
        state: &mut InvocationState,
        invoker: &ScAddress,
        source: &AccountId,
        call: &InvokeContractArgs,
    ) -> Result<Arc<dyn MockContract>, ContractError> {
        let mut ctx = CallContext::new(
            self,
            storage,
            state,
            invoker.clone(),
            source.clone(),
            call.clone(),
        );
        let instance = ctx.read(&instance_key(&call.contract_address))?;
        let hash = match instance.map(|entry| entry.data) {
            Some(LedgerEntryData::ContractData(ContractDataEntry {
                val:
                    ScVal::ContractInstance(ScContractInstance {
                        executable: ContractExecutable::Wasm(hash),
                        ..
                    }),
                ..
            })) => hash,
            Some(_) => {
                return Err(ContractError::trap(format!(
                    "{} is not a wasm contract",
                    address_strkey(&call.contract_address)
                )))
            }
            None => {
                return Err(ContractError::trap(format!(
                    "contract {} not found",
                    address_strkey(&call.contract_address)
                )))
            }
        };
        if ctx.read(&code_key(&hash))?.is_none() {
            return Err(ContractError::trap(format!(
                "wasm {} is missing or archived",
                hex(&hash)
            )));
        }
        self.code.get(&hash.0).cloned().ok_or_else(|| {
            ContractError::trap(format!("no mock contract registered for wasm {}", hex(&hash)))
        })
    }

    fn upload(
        &self,
        storage: &mut HostStorage<'_>,
        state: &mut InvocationState,
        source: &AccountId,
        wasm: &BytesM,
    ) -> Result<ScVal, ContractError> {
        state.charge(CALL_COST);
        let hash = Hash(sha256(wasm.as_slice()));
        let key = code_key(&hash);
        let mut ctx = self.system_context(storage, state, source)?;
        if ctx.read(&key)?.is_none() {
            let entry = LedgerEntry {
                last_modified_ledger_seq: ctx.ledger().sequence_number,
                data: LedgerEntryData::ContractCode(ContractCodeEntry {
                    ext: ContractCodeEntryExt::V0,
                    hash: hash.clone(),
                    code: wasm.clone(),
                }),
                ext: LedgerEntryExt::V0,
            };
            ctx.write(key, entry, None);
        }
        Ok(ScVal::Bytes(ScBytes(hash.0.to_vec().try_into()?)))
    }

    #[allow(clippy::too_many_arguments)]
    fn create(
        &self,
        storage: &mut HostStorage<'_>,
        state: &mut InvocationState,
        source: &AccountId,
        preimage: &ContractIdPreimage,
        executable: &ContractExecutable,
        constructor_args: &[ScVal],
        authorized: SorobanAuthorizedFunction,
    ) -> Result<ScVal, ContractError> {
        state.charge(CALL_COST);
        let hash = match executable {
            ContractExecutable::Wasm(hash) => hash.clone(),
            ContractExecutable::StellarAsset => {
                return Err(ContractError::trap(
                    "stellar asset contracts are not supported",
                ))
            }
        };
        let network_id = storage.ledger().network_id;
        let address = contract_id(&network_id, preimage)?;

        let mut ctx = self.system_context(storage, state, source)?;
        if ctx.read(&code_key(&hash))?.is_none() {
            return Err(ContractError::trap(format!("wasm {} is not uploaded", hex(&hash))));
        }
        let key = instance_key(&address);
        if ctx.read(&key)?.is_some() {
            return Err(ContractError::trap(format!(
                "contract {} already exists",
                address_strkey(&address)
            )));
        }
        if let ContractIdPreimage::Address(from) = preimage {
            ctx.push_auth(AuthRequirement {
                address: from.address.clone(),
                invocation: SorobanAuthorizedInvocation {
                    function: authorized,
                    sub_invocations: Default::default(),
                },
            });
        }
        let entry = LedgerEntry {
            last_modified_ledger_seq: ctx.ledger().sequence_number,
            data: LedgerEntryData::ContractData(ContractDataEntry {
                ext: ExtensionPoint::V0,
                contract: address.clone(),
                key: ScVal::LedgerKeyContractInstance,
                durability: ContractDataDurability::Persistent,
                val: ScVal::ContractInstance(ScContractInstance {
                    executable: executable.clone(),
                    storage: None,
                }),
            }),
            ext: LedgerEntryExt::V0,
        };
        ctx.write(key, entry, None);

        if !constructor_args.is_empty() {
            let contract = self.code.get(&hash.0).cloned().ok_or_else(|| {
                ContractError::trap(format!("no mock contract registered for wasm {}", hex(&hash)))
            })?;
            let call = InvokeContractArgs {
                contract_address: address.clone(),
                function_name: symbol("__constructor")?,
                args: constructor_args.to_vec().try_into()?,
            };
            let mut ctx = CallContext::new(
                self,
                storage,
                state,
                ScAddress::Account(source.clone()),
                source.clone(),
                call,
            );
            contract.construct(&mut ctx, constructor_args)?;
        }
        Ok(ScVal::Address(address))
    }

    /// Context for host functions that are not contract calls.
    fn system_context<'a, 's>(
        &'a self,
        storage: &'a mut HostStorage<'s>,
        state: &'a mut InvocationState,
        source: &AccountId,
    ) -> Result<CallContext<'a, 's>, ContractError> {
        let invoker = ScAddress::Account(source.clone());
        let call = InvokeContractArgs {
            contract_address: invoker.clone(),
            function_name: symbol("host")?,
            args: Default::default(),
        };
        Ok(CallContext::new(self, storage, state, invoker, source.clone(), call))
    }
}

impl HostEvaluator for MockHost {
    fn evaluate(
        &self,
        storage: &mut HostStorage<'_>,
        invocation: &Invocation<'_>,
    ) -> Result<Evaluation, Trap> {
        let mut state = InvocationState::default();
        let source = invocation.source_account.clone();
        let outcome = match invocation.host_function {
            HostFunction::InvokeContract(call) => self.invoke_contract(
                storage,
                &mut state,
                ScAddress::Account(source.clone()),
                source,
                call.clone(),
            ),
            HostFunction::UploadContractWasm(wasm) => self.upload(storage, &mut state, &source, wasm),
            HostFunction::CreateContract(args) => self.create(
                storage,
                &mut state,
                &source,
                &args.contract_id_preimage,
                &args.executable,
                &[],
                SorobanAuthorizedFunction::CreateContractHostFn(args.clone()),
            ),
            HostFunction::CreateContractV2(args) => self.create(
                storage,
                &mut state,
                &source,
                &args.contract_id_preimage,
                &args.executable,
                &args.constructor_args,
                SorobanAuthorizedFunction::CreateContractV2HostFn(args.clone()),
            ),
        };
        match outcome {
            Ok(value) => Ok(state.finish(value)),
            Err(error) => {
                let message = error.to_string();
                let mut trap = Trap::new(message.clone()).with_diagnostics(vec![error_event(&message)]);
                trap.cost = state.cost;
                Err(trap)
            }
        }
    }
}

impl From<ContractError> for Trap {
    fn from(error: ContractError) -> Self {
        Trap::new(error.to_string())
    }
}

fn contract_id(network_id: &[u8; 32], preimage: &ContractIdPreimage) -> Result<ScAddress, ContractError> {
    let preimage = HashIdPreimage::ContractId(HashIdPreimageContractId {
        network_id: Hash(*network_id),
        contract_id_preimage: preimage.clone(),
    });
    let bytes = to_xdr_bytes(&preimage)?;
    Ok(ScAddress::Contract(Hash(sha256(&bytes))))
}

pub fn instance_key(contract: &ScAddress) -> LedgerKey {
    LedgerKey::ContractData(LedgerKeyContractData {
        contract: contract.clone(),
        key: ScVal::LedgerKeyContractInstance,
        durability: ContractDataDurability::Persistent,
    })
}

fn error_event(message: &str) -> DiagnosticEvent {
    let data = StringM::try_from(message)
        .map(|s| ScVal::String(ScString(s)))
        .unwrap_or(ScVal::Void);
    let topics = symbol("error")
        .map(|s| vec![ScVal::Symbol(s)])
        .unwrap_or_default();
    DiagnosticEvent {
        in_successful_contract_call: false,
        event: ContractEvent {
            ext: ExtensionPoint::V0,
            contract_id: None,
            type_: ContractEventType::Diagnostic,
            body: ContractEventBody::V0(ContractEventV0 {
                topics: topics.try_into().unwrap_or_default(),
                data,
            }),
        },
    }
}

fn hex(hash: &Hash) -> String {
    hex::encode(hash.0)
}
