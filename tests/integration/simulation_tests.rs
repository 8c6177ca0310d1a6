use crate::fixtures::*;
use soroban_sandbox::runtime::StateChangeKind;
use soroban_sandbox::{Durability, SimulationOutcome};
use soroban_sandbox_mock::mock::instance_key;
use soroban_sandbox_mock::tx::{invoke_function, next_sequence, TxBuilder};
use soroban_sandbox_mock::LedgerAssertions;
use stellar_xdr::curr::{LedgerKey, LedgerKeyContractData, ScVal, SorobanCredentials};

fn simulate_call(
    sandbox: &soroban_sandbox::Sandbox<soroban_sandbox_mock::MockHost>,
    source: &soroban_sandbox_mock::TestAccount,
    contract: &stellar_xdr::curr::ScAddress,
    function: &str,
    args: Vec<ScVal>,
) -> soroban_sandbox::SimulationResult {
    let sequence = next_sequence(sandbox, source).unwrap();
    let envelope = TxBuilder::invoke(source, sequence, contract, function, args)
        .unwrap()
        .unsigned()
        .unwrap();
    sandbox.simulate(&envelope).unwrap()
}

#[test]
fn test_simulation_discovers_footprint_and_changes() {
    let mut sandbox = sandbox();
    let alice = funded(&mut sandbox, "alice");
    let counter = deploy(&mut sandbox, &alice, COUNTER_WASM);

    let result = simulate_call(&sandbox, &alice, &counter, "increment", vec![]);
    assert!(result.is_success());
    assert_eq!(result.return_value(), Some(&ScVal::U32(1)));

    let count = LedgerKey::ContractData(LedgerKeyContractData {
        contract: counter.clone(),
        key: sym("count"),
        durability: Durability::Persistent.into(),
    });
    assert!(result.footprint.contains(&instance_key(&counter)));
    assert!(!result.footprint.is_writable(&instance_key(&counter)));
    assert!(result.footprint.is_writable(&count));

    assert_eq!(result.state_changes.len(), 1);
    assert_eq!(result.state_changes[0].kind, StateChangeKind::Created);
    assert_eq!(result.state_changes[0].key, count);
    assert!(result.state_changes[0].before.is_none());

    assert!(result.minimum_resource_fee > 0);
    let data = result.transaction_data.as_ref().unwrap();
    assert_eq!(data.resource_fee, result.minimum_resource_fee);
    assert_eq!(data.resources.footprint.read_write.len(), 1);
    assert!(result.authorization_requirements.is_empty());
    assert!(result.cost.instructions > 0);
}

#[test]
fn test_simulation_never_mutates_the_ledger() {
    let mut sandbox = sandbox();
    let alice = funded(&mut sandbox, "alice");
    let counter = deploy(&mut sandbox, &alice, COUNTER_WASM);
    let info = sandbox.account_info(&alice.address()).unwrap();
    let balance = sandbox.balance(&alice.address()).unwrap();
    let transactions = sandbox.transactions().len();

    let first = simulate_call(&sandbox, &alice, &counter, "increment", vec![]);
    let second = simulate_call(&sandbox, &alice, &counter, "increment", vec![]);

    assert_eq!(first.return_value(), second.return_value());
    assert_eq!(first.minimum_resource_fee, second.minimum_resource_fee);
    assert_eq!(sandbox.account_info(&alice.address()).unwrap(), info);
    assert_eq!(sandbox.transactions().len(), transactions);
    let checks = LedgerAssertions::new(&sandbox);
    checks.assert_balance(&alice, balance);
    checks.assert_missing(&counter, &sym("count"), Durability::Persistent);
}

#[test]
fn test_simulation_reports_foreign_auth_as_unsigned_credentials() {
    let mut sandbox = sandbox();
    let alice = funded(&mut sandbox, "alice");
    let bob = funded(&mut sandbox, "bob");
    let contract = deploy(&mut sandbox, &alice, OWNER_WASM);
    call(&mut sandbox, &alice, &contract, "init", vec![ScVal::Address(alice.sc_address())])
        .unwrap();

    let result = simulate_call(
        &sandbox,
        &bob,
        &contract,
        "change_owner",
        vec![ScVal::Address(bob.sc_address())],
    );
    assert!(result.is_success());
    assert_eq!(result.authorization_requirements.len(), 1);
    match &result.authorization_requirements[0].credentials {
        SorobanCredentials::Address(creds) => {
            assert_eq!(creds.address, alice.sc_address());
            assert_eq!(creds.signature, ScVal::Void);
        }
        other => panic!("expected address credentials, got {other:?}"),
    }

    // from the owner it is covered by the transaction signature
    let result = simulate_call(
        &sandbox,
        &alice,
        &contract,
        "change_owner",
        vec![ScVal::Address(bob.sc_address())],
    );
    assert!(matches!(
        result.authorization_requirements[0].credentials,
        SorobanCredentials::SourceAccount
    ));
}

#[test]
fn test_simulation_reports_traps_in_the_result() {
    let mut sandbox = sandbox();
    let alice = funded(&mut sandbox, "alice");
    let counter = deploy(&mut sandbox, &alice, COUNTER_WASM);
    sandbox.set_time(5_000);

    let result = simulate_call(
        &sandbox,
        &alice,
        &counter,
        "increment_before",
        vec![ScVal::U64(4_000)],
    );
    assert_eq!(
        result.outcome,
        SimulationOutcome::Failed("deadline passed".to_string())
    );
    assert!(result.transaction_data.is_none());
    assert!(result.state_changes.is_empty());
    assert!(!result.events.is_empty());

    let missing = simulate_call(&sandbox, &alice, &counter, "decrement", vec![]);
    assert_eq!(missing.error(), Some("function 'decrement' not found"));
}

#[test]
fn test_simulation_of_create_without_code_fails() {
    let mut sandbox = sandbox();
    let alice = funded(&mut sandbox, "alice");
    let sequence = next_sequence(&sandbox, &alice).unwrap();
    let envelope = TxBuilder::create(&alice, sequence, [9u8; 32], [0u8; 32])
        .unsigned()
        .unwrap();
    let result = sandbox.simulate(&envelope).unwrap();
    assert!(!result.is_success());
    assert!(result.error().is_some());
}

#[test]
fn test_simulation_tracks_the_clock() {
    let mut sandbox = sandbox();
    let alice = funded(&mut sandbox, "alice");
    let counter = deploy(&mut sandbox, &alice, COUNTER_WASM);
    let deadline = sandbox.get_info().timestamp + 60;

    let args = vec![ScVal::U64(deadline)];
    assert!(simulate_call(&sandbox, &alice, &counter, "increment_before", args.clone()).is_success());
    sandbox.set_time(deadline + 1);
    assert!(!simulate_call(&sandbox, &alice, &counter, "increment_before", args).is_success());

    let function = invoke_function(&counter, "get", vec![]).unwrap();
    let envelope = TxBuilder::new(&alice, 1, function).unsigned().unwrap();
    assert_eq!(
        sandbox.simulate(&envelope).unwrap().return_value(),
        Some(&ScVal::U32(0))
    );
}
