use crate::fixtures::*;
use ed25519_dalek::{Signer, SigningKey};
use soroban_sandbox::runtime::validation::{account_signature_value, authorization_payload};
use soroban_sandbox::utils::{sha256, symbol};
use soroban_sandbox::{Durability, Sandbox, SandboxError};
use soroban_sandbox_mock::tx::{invoke_function, next_sequence, TxBuilder, SIGNATURE_VALIDITY_LEDGERS};
use soroban_sandbox_mock::{LedgerAssertions, MockHost, TestAccount};
use stellar_xdr::curr::{
    HostFunction, InvokeContractArgs, OperationBody, ScAddress, ScVal, SorobanAddressCredentials,
    SorobanAuthorizationEntry, SorobanAuthorizedFunction, SorobanAuthorizedInvocation,
    SorobanCredentials,
};

struct Toll {
    sandbox: Sandbox<MockHost>,
    alice: TestAccount,
    relayer: TestAccount,
    contract: ScAddress,
}

fn toll() -> Toll {
    let mut sandbox = sandbox();
    let alice = funded(&mut sandbox, "alice");
    let relayer = funded(&mut sandbox, "relayer");
    let contract = deploy(&mut sandbox, &relayer, TOLL_WASM);
    Toll {
        sandbox,
        alice,
        relayer,
        contract,
    }
}

impl Toll {
    fn pay(&self, amount: i64) -> HostFunction {
        invoke_function(
            &self.contract,
            "pay",
            vec![ScVal::Address(self.alice.sc_address()), ScVal::I64(amount)],
        )
        .unwrap()
    }

    /// Simulated builder for a relayed payment, auth entries still unsigned.
    fn relayed(&self, amount: i64) -> TxBuilder {
        let sequence = next_sequence(&self.sandbox, &self.relayer).unwrap();
        let builder = TxBuilder::new(&self.relayer, sequence, self.pay(amount));
        let simulation = self.sandbox.simulate(&builder.unsigned().unwrap()).unwrap();
        builder.prepare(&simulation).unwrap()
    }

    fn network_id(&self) -> [u8; 32] {
        self.sandbox.get_info().network_id
    }

    fn expiration(&self) -> u32 {
        self.sandbox.get_info().sequence_number + SIGNATURE_VALIDITY_LEDGERS
    }

    fn submit(&mut self, builder: &TxBuilder) -> soroban_sandbox::Result<soroban_sandbox::TransactionRecord> {
        let envelope = builder.envelope(&[&self.relayer], &self.network_id()).unwrap();
        self.sandbox.execute(&envelope)
    }
}

fn auth_entries(builder: &TxBuilder) -> Vec<SorobanAuthorizationEntry> {
    let tx = builder.transaction().unwrap();
    match &tx.operations[0].body {
        OperationBody::InvokeHostFunction(op) => op.auth.to_vec(),
        other => panic!("unexpected operation {other:?}"),
    }
}

#[test]
fn test_relayed_payment_needs_the_payers_signature() {
    let mut toll = toll();
    let balance = toll.sandbox.balance(&toll.alice.address()).unwrap();
    let relayer_sequence = toll.sandbox.account_info(&toll.relayer.address()).unwrap().sequence_number;

    let unsigned = toll.relayed(10);
    let err = toll.submit(&unsigned).unwrap_err();
    assert!(matches!(err, SandboxError::Unauthorized(_)), "{err:?}");
    LedgerAssertions::new(&toll.sandbox).assert_balance(&toll.alice, balance);
    LedgerAssertions::new(&toll.sandbox).assert_sequence(&toll.relayer, relayer_sequence);

    let (network_id, expiration) = (toll.network_id(), toll.expiration());
    let signed = toll
        .relayed(10)
        .sign_auth(&[&toll.alice], &network_id, expiration)
        .unwrap();
    let record = toll.submit(&signed).unwrap();
    let checks = LedgerAssertions::new(&toll.sandbox);
    checks.assert_success(&record);
    checks.assert_balance(&toll.alice, balance - 10);
    checks.assert_sequence(&toll.alice, 0);
}

#[test]
fn test_authorization_nonce_cannot_be_replayed() {
    let mut toll = toll();
    let (network_id, expiration) = (toll.network_id(), toll.expiration());
    let first = toll
        .relayed(10)
        .sign_auth(&[&toll.alice], &network_id, expiration)
        .unwrap();
    toll.submit(&first).unwrap();

    let replay = toll.relayed(10).auth(auth_entries(&first));
    let err = toll.submit(&replay).unwrap_err();
    match err {
        SandboxError::Unauthorized(message) => assert!(message.contains("already used"), "{message}"),
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn test_expired_signature_is_rejected() {
    let mut toll = toll();
    let now = toll.sandbox.get_info().sequence_number;
    let network_id = toll.network_id();
    let signed = toll
        .relayed(10)
        .sign_auth(&[&toll.alice], &network_id, now + 5)
        .unwrap();

    toll.sandbox.set_sequence(now + 6);
    let err = toll.submit(&signed).unwrap_err();
    match err {
        SandboxError::Unauthorized(message) => assert!(message.contains("expired"), "{message}"),
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn test_signature_covers_the_arguments() {
    let mut toll = toll();
    let (network_id, expiration) = (toll.network_id(), toll.expiration());
    let signed_for_ten = toll
        .relayed(10)
        .sign_auth(&[&toll.alice], &network_id, expiration)
        .unwrap();

    let tampered = toll.relayed(1_000).auth(auth_entries(&signed_for_ten));
    assert!(matches!(
        toll.submit(&tampered),
        Err(SandboxError::Unauthorized(_))
    ));
}

#[test]
fn test_signature_from_another_key_is_rejected() {
    let mut toll = toll();
    let mallory = TestAccount::from_seed("mallory");
    let (network_id, expiration) = (toll.network_id(), toll.expiration());
    let builder = toll.relayed(10);

    let forged = auth_entries(&builder)
        .into_iter()
        .map(|mut entry| {
            if let SorobanCredentials::Address(creds) = &mut entry.credentials {
                let payload =
                    authorization_payload(&network_id, creds.nonce, expiration, &entry.root_invocation)
                        .unwrap();
                let signature = SigningKey::from_bytes(&sha256(b"mallory")).sign(&payload);
                creds.signature_expiration_ledger = expiration;
                creds.signature =
                    account_signature_value(mallory.public_key(), signature.to_bytes()).unwrap();
            }
            entry
        })
        .collect();

    let err = toll.submit(&builder.auth(forged)).unwrap_err();
    assert!(matches!(err, SandboxError::Unauthorized(_)), "{err:?}");
}

#[test]
fn test_source_credentials_only_cover_the_source() {
    let mut toll = toll();
    let builder = toll.relayed(10);
    let claimed = auth_entries(&builder)
        .into_iter()
        .map(|mut entry| {
            entry.credentials = SorobanCredentials::SourceAccount;
            entry
        })
        .collect();

    let err = toll.submit(&builder.auth(claimed)).unwrap_err();
    match err {
        SandboxError::Unauthorized(message) => {
            assert!(message.contains("source account credentials"), "{message}")
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn test_envelope_signed_by_someone_else_is_rejected() {
    let mut toll = toll();
    let network_id = toll.network_id();
    let envelope = toll
        .relayed(10)
        .sign_auth(&[&toll.alice], &network_id, toll.expiration())
        .unwrap()
        .envelope(&[&toll.alice], &network_id)
        .unwrap();
    let err = toll.sandbox.execute(&envelope).unwrap_err();
    match err {
        SandboxError::Unauthorized(message) => assert!(message.contains("signature hint"), "{message}"),
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn test_operation_source_cannot_stand_in_for_another_account() {
    let mut sandbox = sandbox();
    let alice = funded(&mut sandbox, "alice");
    let mallory = funded(&mut sandbox, "mallory");
    let contract = deploy(&mut sandbox, &alice, OWNER_WASM);
    call(&mut sandbox, &alice, &contract, "init", vec![ScVal::Address(alice.sc_address())]).unwrap();
    let network_id = sandbox.get_info().network_id;
    let args = vec![ScVal::Address(mallory.sc_address())];

    // as alice's own call the owner check is covered by source account credentials
    let as_alice = TxBuilder::invoke(
        &alice,
        next_sequence(&sandbox, &alice).unwrap(),
        &contract,
        "change_owner",
        args.clone(),
    )
    .unwrap();
    let simulation = sandbox.simulate(&as_alice.unsigned().unwrap()).unwrap();
    assert!(matches!(
        simulation.authorization_requirements[0].credentials,
        SorobanCredentials::SourceAccount
    ));

    let borrowed = TxBuilder::invoke(
        &mallory,
        next_sequence(&sandbox, &mallory).unwrap(),
        &contract,
        "change_owner",
        args,
    )
    .unwrap()
    .operation_source(&alice)
    .prepare(&simulation)
    .unwrap()
    .envelope(&[&mallory], &network_id)
    .unwrap();
    let mallory_sequence = sandbox.account_info(&mallory.address()).unwrap().sequence_number;

    assert!(matches!(
        sandbox.simulate(&borrowed),
        Err(SandboxError::MalformedInput(_))
    ));
    assert!(matches!(
        sandbox.execute(&borrowed),
        Err(SandboxError::MalformedInput(_))
    ));
    let checks = LedgerAssertions::new(&sandbox);
    checks.assert_value_eq(
        &contract,
        &sym("owner"),
        Durability::Persistent,
        &ScVal::Address(alice.sc_address()),
    );
    checks.assert_sequence(&mallory, mallory_sequence);

    // naming the transaction source on the operation is still fine
    let own = as_alice
        .operation_source(&alice)
        .prepare(&simulation)
        .unwrap()
        .envelope(&[&alice], &network_id)
        .unwrap();
    assert!(sandbox.execute(&own).unwrap().is_success());
    LedgerAssertions::new(&sandbox).assert_value_eq(
        &contract,
        &sym("owner"),
        Durability::Persistent,
        &ScVal::Address(mallory.sc_address()),
    );
}

#[test]
fn test_authorization_entry_nobody_requires_is_rejected() {
    let mut sandbox = sandbox();
    let alice = funded(&mut sandbox, "alice");
    let bob = funded(&mut sandbox, "bob");
    let counter = deploy(&mut sandbox, &alice, COUNTER_WASM);
    let network_id = sandbox.get_info().network_id;

    let builder = TxBuilder::invoke(
        &alice,
        next_sequence(&sandbox, &alice).unwrap(),
        &counter,
        "increment",
        vec![],
    )
    .unwrap();
    let simulation = sandbox.simulate(&builder.unsigned().unwrap()).unwrap();
    let prepared = builder.prepare(&simulation).unwrap();
    assert!(auth_entries(&prepared).is_empty());

    let unsigned_for_bob = SorobanAuthorizationEntry {
        credentials: SorobanCredentials::Address(SorobanAddressCredentials {
            address: bob.sc_address(),
            nonce: 7,
            signature_expiration_ledger: sandbox.get_info().sequence_number + 10,
            signature: ScVal::Void,
        }),
        root_invocation: SorobanAuthorizedInvocation {
            function: SorobanAuthorizedFunction::ContractFn(InvokeContractArgs {
                contract_address: counter.clone(),
                function_name: symbol("increment").unwrap(),
                args: Default::default(),
            }),
            sub_invocations: Default::default(),
        },
    };
    let padded = prepared
        .clone()
        .auth(vec![unsigned_for_bob])
        .envelope(&[&alice], &network_id)
        .unwrap();

    match sandbox.execute(&padded).unwrap_err() {
        SandboxError::Unauthorized(message) => assert!(message.contains("not required"), "{message}"),
        other => panic!("unexpected error {other:?}"),
    }
    LedgerAssertions::new(&sandbox).assert_missing(&counter, &sym("count"), Durability::Persistent);

    let clean = prepared.envelope(&[&alice], &network_id).unwrap();
    assert!(sandbox.execute(&clean).unwrap().is_success());
}
