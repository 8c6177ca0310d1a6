//! Keys, envelope construction and the simulate-sign-submit round trip a
//! client SDK would perform.

use ed25519_dalek::{Signer, SigningKey};
use soroban_sandbox::runtime::validation::{account_signature_value, authorization_payload};
use soroban_sandbox::utils::{account_id_from_bytes, account_strkey, sha256, symbol, to_xdr_base64, tx_hash};
use soroban_sandbox::{HostEvaluator, Result, Sandbox, SandboxError, SimulationResult, TransactionRecord};
use stellar_xdr::curr::{
    AccountId, ContractExecutable, ContractIdPreimage, ContractIdPreimageFromAddress,
    CreateContractArgs, CreateContractArgsV2, DecoratedSignature, ExtensionPoint, Hash,
    HostFunction, InvokeContractArgs, InvokeHostFunctionOp, LedgerFootprint, LedgerKey, Memo,
    MuxedAccount, Operation, OperationBody, Preconditions, ScAddress, ScVal, SequenceNumber,
    Signature, SignatureHint, SorobanAuthorizationEntry, SorobanCredentials, SorobanResources,
    SorobanTransactionData, TimeBounds, TimePoint, Transaction, TransactionEnvelope,
    TransactionExt, TransactionV1Envelope, Uint256,
};

/// Default inclusion fee of built transactions, in stroops.
pub const BASE_FEE: u32 = 100;

/// Ledgers an address signature stays valid for after the current one.
pub const SIGNATURE_VALIDITY_LEDGERS: u32 = 100;

/// An ed25519 keypair standing for a Stellar account.
#[derive(Clone)]
pub struct TestAccount {
    key: SigningKey,
}

impl TestAccount {
    /// Deterministic keypair derived from `seed`.
    pub fn from_seed(seed: &str) -> Self {
        Self {
            key: SigningKey::from_bytes(&sha256(seed.as_bytes())),
        }
    }

    pub fn public_key(&self) -> [u8; 32] {
        self.key.verifying_key().to_bytes()
    }

    pub fn account_id(&self) -> AccountId {
        account_id_from_bytes(self.public_key())
    }

    /// `G...` strkey.
    pub fn address(&self) -> String {
        account_strkey(&self.account_id())
    }

    pub fn sc_address(&self) -> ScAddress {
        ScAddress::Account(self.account_id())
    }

    pub fn sign_hash(&self, hash: &[u8; 32]) -> Result<DecoratedSignature> {
        let public = self.public_key();
        let signature = self.key.sign(hash).to_bytes();
        Ok(DecoratedSignature {
            hint: SignatureHint([public[28], public[29], public[30], public[31]]),
            signature: Signature(signature.to_vec().try_into()?),
        })
    }

    /// Sign `entry` if it carries address credentials for this account;
    /// other entries are returned unchanged.
    pub fn authorize(
        &self,
        entry: &SorobanAuthorizationEntry,
        network_id: &[u8; 32],
        expiration_ledger: u32,
    ) -> Result<SorobanAuthorizationEntry> {
        let mut entry = entry.clone();
        if let SorobanCredentials::Address(creds) = &mut entry.credentials {
            if creds.address == self.sc_address() {
                let payload = authorization_payload(
                    network_id,
                    creds.nonce,
                    expiration_ledger,
                    &entry.root_invocation,
                )?;
                creds.signature_expiration_ledger = expiration_ledger;
                creds.signature =
                    account_signature_value(self.public_key(), self.key.sign(&payload).to_bytes())?;
            }
        }
        Ok(entry)
    }
}

/// Builder for single-operation Soroban transactions.
#[derive(Clone)]
pub struct TxBuilder {
    source: AccountId,
    sequence: i64,
    fee: u32,
    host_function: HostFunction,
    auth: Vec<SorobanAuthorizationEntry>,
    soroban_data: Option<SorobanTransactionData>,
    cond: Preconditions,
    operation_source: Option<AccountId>,
}

impl TxBuilder {
    pub fn new(source: &TestAccount, sequence: i64, host_function: HostFunction) -> Self {
        Self {
            source: source.account_id(),
            sequence,
            fee: BASE_FEE,
            host_function,
            auth: Vec::new(),
            soroban_data: None,
            cond: Preconditions::None,
            operation_source: None,
        }
    }

    pub fn invoke(
        source: &TestAccount,
        sequence: i64,
        contract: &ScAddress,
        function: &str,
        args: Vec<ScVal>,
    ) -> Result<Self> {
        Ok(Self::new(
            source,
            sequence,
            invoke_function(contract, function, args)?,
        ))
    }

    pub fn upload(source: &TestAccount, sequence: i64, wasm: &[u8]) -> Result<Self> {
        Ok(Self::new(
            source,
            sequence,
            HostFunction::UploadContractWasm(wasm.to_vec().try_into()?),
        ))
    }

    /// Create a contract instance of uploaded code, deployed by the source.
    pub fn create(source: &TestAccount, sequence: i64, wasm_hash: [u8; 32], salt: [u8; 32]) -> Self {
        Self::new(
            source,
            sequence,
            HostFunction::CreateContract(CreateContractArgs {
                contract_id_preimage: deployer_preimage(source, salt),
                executable: ContractExecutable::Wasm(Hash(wasm_hash)),
            }),
        )
    }

    pub fn create_with_constructor(
        source: &TestAccount,
        sequence: i64,
        wasm_hash: [u8; 32],
        salt: [u8; 32],
        constructor_args: Vec<ScVal>,
    ) -> Result<Self> {
        Ok(Self::new(
            source,
            sequence,
            HostFunction::CreateContractV2(CreateContractArgsV2 {
                contract_id_preimage: deployer_preimage(source, salt),
                executable: ContractExecutable::Wasm(Hash(wasm_hash)),
                constructor_args: constructor_args.try_into()?,
            }),
        ))
    }

    pub fn host_function(&self) -> &HostFunction {
        &self.host_function
    }

    pub fn fee(mut self, fee: u32) -> Self {
        self.fee = fee;
        self
    }

    pub fn time_bounds(mut self, min_time: u64, max_time: u64) -> Self {
        self.cond = Preconditions::Time(TimeBounds {
            min_time: TimePoint(min_time),
            max_time: TimePoint(max_time),
        });
        self
    }

    /// Set an explicit source on the operation itself.
    pub fn operation_source(mut self, account: &TestAccount) -> Self {
        self.operation_source = Some(account.account_id());
        self
    }

    pub fn auth(mut self, entries: Vec<SorobanAuthorizationEntry>) -> Self {
        self.auth = entries;
        self
    }

    pub fn soroban_data(mut self, data: SorobanTransactionData) -> Self {
        self.soroban_data = Some(data);
        self
    }

    /// Declare a footprint by hand, without simulating.
    pub fn footprint(self, read_only: Vec<LedgerKey>, read_write: Vec<LedgerKey>) -> Result<Self> {
        Ok(self.soroban_data(SorobanTransactionData {
            ext: ExtensionPoint::V0,
            resources: SorobanResources {
                footprint: LedgerFootprint {
                    read_only: read_only.try_into()?,
                    read_write: read_write.try_into()?,
                },
                instructions: 0,
                read_bytes: 0,
                write_bytes: 0,
            },
            resource_fee: 0,
        }))
    }

    /// Attach the transaction data and authorization entries of a successful
    /// simulation and add the resource fee to the inclusion fee.
    pub fn prepare(mut self, simulation: &SimulationResult) -> Result<Self> {
        let data = simulation.transaction_data.clone().ok_or_else(|| {
            SandboxError::ContractTrap(simulation.error().unwrap_or("simulation failed").to_string())
        })?;
        let resource_fee = u32::try_from(simulation.minimum_resource_fee).unwrap_or(u32::MAX);
        self.fee = self.fee.saturating_add(resource_fee);
        self.auth = simulation.authorization_requirements.clone();
        self.soroban_data = Some(data);
        Ok(self)
    }

    /// Sign every address credential that belongs to one of `signers`.
    pub fn sign_auth(
        mut self,
        signers: &[&TestAccount],
        network_id: &[u8; 32],
        expiration_ledger: u32,
    ) -> Result<Self> {
        for signer in signers {
            self.auth = self
                .auth
                .iter()
                .map(|entry| signer.authorize(entry, network_id, expiration_ledger))
                .collect::<Result<_>>()?;
        }
        Ok(self)
    }

    pub fn transaction(&self) -> Result<Transaction> {
        Ok(Transaction {
            source_account: MuxedAccount::Ed25519(Uint256(
                soroban_sandbox::utils::account_key_bytes(&self.source),
            )),
            fee: self.fee,
            seq_num: SequenceNumber(self.sequence),
            cond: self.cond.clone(),
            memo: Memo::None,
            operations: vec![Operation {
                source_account: self.operation_source.as_ref().map(|id| {
                    MuxedAccount::Ed25519(Uint256(soroban_sandbox::utils::account_key_bytes(id)))
                }),
                body: OperationBody::InvokeHostFunction(InvokeHostFunctionOp {
                    host_function: self.host_function.clone(),
                    auth: self.auth.clone().try_into()?,
                }),
            }]
            .try_into()?,
            ext: match &self.soroban_data {
                Some(data) => TransactionExt::V1(data.clone()),
                None => TransactionExt::V0,
            },
        })
    }

    /// Base64 XDR envelope signed by `signers` for `network_id`.
    pub fn envelope(&self, signers: &[&TestAccount], network_id: &[u8; 32]) -> Result<String> {
        let tx = self.transaction()?;
        let hash = tx_hash(&tx, network_id)?;
        let signatures = signers
            .iter()
            .map(|signer| signer.sign_hash(&hash))
            .collect::<Result<Vec<_>>>()?;
        to_xdr_base64(&TransactionEnvelope::Tx(TransactionV1Envelope {
            tx,
            signatures: signatures.try_into()?,
        }))
    }

    pub fn unsigned(&self) -> Result<String> {
        self.envelope(&[], &[0u8; 32])
    }
}

pub fn invoke_function(contract: &ScAddress, function: &str, args: Vec<ScVal>) -> Result<HostFunction> {
    Ok(HostFunction::InvokeContract(InvokeContractArgs {
        contract_address: contract.clone(),
        function_name: symbol(function)?,
        args: args.try_into()?,
    }))
}

fn deployer_preimage(source: &TestAccount, salt: [u8; 32]) -> ContractIdPreimage {
    ContractIdPreimage::Address(ContractIdPreimageFromAddress {
        address: source.sc_address(),
        salt: Uint256(salt),
    })
}

/// Sequence number the next transaction of `account` must carry.
pub fn next_sequence<E: HostEvaluator>(sandbox: &Sandbox<E>, account: &TestAccount) -> Result<i64> {
    Ok(sandbox.account_info(&account.address())?.sequence_number + 1)
}

/// Simulate `host_function` from `source`, attach the simulated footprint
/// and auth, sign address credentials with `cosigners`, sign the envelope
/// and return it ready to execute.
pub fn prepare<E: HostEvaluator>(
    sandbox: &Sandbox<E>,
    source: &TestAccount,
    host_function: HostFunction,
    cosigners: &[&TestAccount],
) -> Result<String> {
    let network_id = sandbox.get_info().network_id;
    let builder = TxBuilder::new(source, next_sequence(sandbox, source)?, host_function);
    let simulation = sandbox.simulate(&builder.unsigned()?)?;
    let expiration = sandbox.get_info().sequence_number + SIGNATURE_VALIDITY_LEDGERS;
    builder
        .prepare(&simulation)?
        .sign_auth(cosigners, &network_id, expiration)?
        .envelope(&[source], &network_id)
}

/// [`prepare`] followed by `execute`.
pub fn submit<E: HostEvaluator>(
    sandbox: &mut Sandbox<E>,
    source: &TestAccount,
    host_function: HostFunction,
    cosigners: &[&TestAccount],
) -> Result<TransactionRecord> {
    let envelope = prepare(sandbox, source, host_function, cosigners)?;
    sandbox.execute(&envelope)
}

/// Upload `wasm` and create an instance of it deployed by `source`.
pub fn install<E: HostEvaluator>(
    sandbox: &mut Sandbox<E>,
    source: &TestAccount,
    wasm: &[u8],
    salt: [u8; 32],
) -> Result<ScAddress> {
    let upload = TxBuilder::upload(source, 0, wasm)?.host_function;
    submit(sandbox, source, upload, &[])?.ok_or_trap()?;
    let create = TxBuilder::create(source, 0, sha256(wasm), salt).host_function;
    match submit(sandbox, source, create, &[])?.ok_or_trap()? {
        ScVal::Address(address) => Ok(address.clone()),
        other => Err(SandboxError::ContractTrap(format!(
            "create returned {other:?} instead of an address"
        ))),
    }
}
