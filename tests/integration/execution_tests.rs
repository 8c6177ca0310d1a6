use crate::fixtures::*;
use soroban_sandbox::{Durability, SandboxError, TransactionStatus};
use soroban_sandbox_mock::tx::{self, invoke_function, next_sequence, TxBuilder};
use soroban_sandbox_mock::{LedgerAssertions, TestAccount};
use stellar_xdr::curr::{LedgerKey, LedgerKeyContractData, ScVal, TransactionMeta};

fn count_key(contract: &stellar_xdr::curr::ScAddress) -> LedgerKey {
    LedgerKey::ContractData(LedgerKeyContractData {
        contract: contract.clone(),
        key: sym("count"),
        durability: Durability::Persistent.into(),
    })
}

#[test]
fn test_success_advances_sequence_by_one() {
    let mut sandbox = sandbox();
    let alice = funded(&mut sandbox, "alice");
    let counter = deploy(&mut sandbox, &alice, COUNTER_WASM);
    let before = sandbox.account_info(&alice.address()).unwrap().sequence_number;
    let balance = sandbox.balance(&alice.address()).unwrap();

    let function = invoke_function(&counter, "increment", vec![]).unwrap();
    let envelope = tx::prepare(&sandbox, &alice, function, &[]).unwrap();
    let hash = sandbox.transaction_hash(&envelope).unwrap();
    let record = sandbox.execute(&envelope).unwrap();

    assert_eq!(record.hash, hash);
    assert_eq!(record.return_value, Some(ScVal::U32(1)));
    assert_eq!(
        sandbox.account_info(&alice.address()).unwrap().sequence_number,
        before + 1
    );
    assert_eq!(
        sandbox.get_transaction(&hash).unwrap().status,
        TransactionStatus::Success
    );
    LedgerAssertions::new(&sandbox).assert_balance(&alice, balance - record.fee_charged);

    let TransactionMeta::V3(meta) = decode_meta(&record) else {
        panic!("expected v3 meta");
    };
    assert_eq!(meta.operations.len(), 1);
    assert!(!meta.operations[0].changes.0.is_empty());
    assert_eq!(meta.soroban_meta.unwrap().return_value, ScVal::U32(1));
}

#[test]
fn test_resubmitting_an_envelope_is_a_sequence_mismatch() {
    let mut sandbox = sandbox();
    let alice = funded(&mut sandbox, "alice");
    let counter = deploy(&mut sandbox, &alice, COUNTER_WASM);

    let function = invoke_function(&counter, "increment", vec![]).unwrap();
    let envelope = tx::prepare(&sandbox, &alice, function, &[]).unwrap();
    sandbox.execute(&envelope).unwrap();

    let err = sandbox.execute(&envelope).unwrap_err();
    let expected = sandbox.account_info(&alice.address()).unwrap().sequence_number + 1;
    match err {
        SandboxError::SequenceMismatch { expected: e, actual } => {
            assert_eq!(e, expected);
            assert_eq!(actual, expected - 1);
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn test_trap_consumes_sequence_and_fee_but_not_writes() {
    let mut sandbox = sandbox();
    let alice = funded(&mut sandbox, "alice");
    let counter = deploy(&mut sandbox, &alice, COUNTER_WASM);
    let deadline = sandbox.get_info().timestamp + 10;

    let function = invoke_function(&counter, "increment_before", vec![ScVal::U64(deadline)]).unwrap();
    let envelope = tx::prepare(&sandbox, &alice, function, &[]).unwrap();
    let sequence = sandbox.account_info(&alice.address()).unwrap().sequence_number;
    let balance = sandbox.balance(&alice.address()).unwrap();

    sandbox.set_time(deadline + 1);
    let record = sandbox.execute(&envelope).unwrap();

    let checks = LedgerAssertions::new(&sandbox);
    checks.assert_trapped(&record, "deadline passed");
    checks.assert_sequence(&alice, sequence + 1);
    checks.assert_balance(&alice, balance - record.fee_charged);
    checks.assert_missing(&counter, &sym("count"), Durability::Persistent);
    assert!(record.fee_charged > 0);
    assert_eq!(
        sandbox.get_transaction(&record.hash).unwrap().status,
        TransactionStatus::Failed
    );
    assert!(matches!(
        record.ok_or_trap(),
        Err(SandboxError::ContractTrap(_))
    ));
}

#[test]
fn test_out_of_footprint_access_is_rejected() {
    let mut sandbox = sandbox();
    let alice = funded(&mut sandbox, "alice");
    let counter = deploy(&mut sandbox, &alice, COUNTER_WASM);
    let sequence = next_sequence(&sandbox, &alice).unwrap();
    let network_id = sandbox.get_info().network_id;

    // the instance is readable but the counter is not declared writable
    let envelope = TxBuilder::invoke(&alice, sequence, &counter, "increment", vec![])
        .unwrap()
        .footprint(
            vec![
                soroban_sandbox_mock::mock::instance_key(&counter),
                soroban_sandbox::ledger::entries::code_key(&stellar_xdr::curr::Hash(
                    soroban_sandbox::utils::sha256(COUNTER_WASM),
                )),
                count_key(&counter),
            ],
            vec![],
        )
        .unwrap()
        .envelope(&[&alice], &network_id)
        .unwrap();

    let err = sandbox.execute(&envelope).unwrap_err();
    assert!(matches!(err, SandboxError::ResourceLimitExceeded(_)), "{err:?}");
    LedgerAssertions::new(&sandbox).assert_sequence(&alice, sequence - 1);
    LedgerAssertions::new(&sandbox).assert_missing(&counter, &sym("count"), Durability::Persistent);
}

#[test]
fn test_transaction_without_soroban_data_is_malformed() {
    let mut sandbox = sandbox();
    let alice = funded(&mut sandbox, "alice");
    let counter = deploy(&mut sandbox, &alice, COUNTER_WASM);
    let sequence = next_sequence(&sandbox, &alice).unwrap();
    let envelope = TxBuilder::invoke(&alice, sequence, &counter, "increment", vec![])
        .unwrap()
        .envelope(&[&alice], &sandbox.get_info().network_id)
        .unwrap();
    assert!(matches!(
        sandbox.execute(&envelope),
        Err(SandboxError::MalformedInput(_))
    ));
}

#[test]
fn test_time_bounds_are_checked_against_the_clock() {
    let mut sandbox = sandbox();
    let alice = funded(&mut sandbox, "alice");
    let counter = deploy(&mut sandbox, &alice, COUNTER_WASM);
    let now = sandbox.get_info().timestamp;
    let sequence = next_sequence(&sandbox, &alice).unwrap();
    let network_id = sandbox.get_info().network_id;

    let builder = TxBuilder::invoke(&alice, sequence, &counter, "increment", vec![])
        .unwrap()
        .time_bounds(now + 100, now + 200);
    let simulation = sandbox.simulate(&builder.unsigned().unwrap()).unwrap();
    let envelope = builder
        .prepare(&simulation)
        .unwrap()
        .envelope(&[&alice], &network_id)
        .unwrap();

    assert!(matches!(
        sandbox.execute(&envelope),
        Err(SandboxError::PreconditionFailed { .. })
    ));
    sandbox.set_time(now + 150);
    assert!(sandbox.execute(&envelope).unwrap().is_success());
}

#[test]
fn test_fee_above_balance_is_rejected() {
    let mut sandbox = sandbox();
    let alice = funded(&mut sandbox, "alice");
    let counter = deploy(&mut sandbox, &alice, COUNTER_WASM);

    let function = invoke_function(&counter, "increment", vec![]).unwrap();
    let envelope = tx::prepare(&sandbox, &alice, function, &[]).unwrap();
    sandbox.fund(&alice.address(), 10).unwrap();

    let err = sandbox.execute(&envelope).unwrap_err();
    assert!(matches!(err, SandboxError::InsufficientBalance { balance: 10, .. }), "{err:?}");
    LedgerAssertions::new(&sandbox).assert_balance(&alice, 10);
}

#[test]
fn test_contract_spending_the_fee_is_rejected_before_commit() {
    let mut sandbox = sandbox();
    let alice = funded(&mut sandbox, "alice");
    let toll = deploy(&mut sandbox, &alice, TOLL_WASM);
    let balance = sandbox.balance(&alice.address()).unwrap();
    let sequence = sandbox.account_info(&alice.address()).unwrap().sequence_number;

    // leaves one stroop, less than any fee
    let function = invoke_function(
        &toll,
        "pay",
        vec![ScVal::Address(alice.sc_address()), ScVal::I64(balance - 1)],
    )
    .unwrap();
    let err = tx::submit(&mut sandbox, &alice, function, &[]).unwrap_err();
    assert!(matches!(err, SandboxError::InsufficientBalance { balance: 1, .. }), "{err:?}");

    let checks = LedgerAssertions::new(&sandbox);
    checks.assert_balance(&alice, balance);
    checks.assert_sequence(&alice, sequence);
}

#[test]
fn test_contract_can_move_native_balance() {
    let mut sandbox = sandbox();
    let alice = funded(&mut sandbox, "alice");
    let toll = deploy(&mut sandbox, &alice, TOLL_WASM);
    let balance = sandbox.balance(&alice.address()).unwrap();

    let function = invoke_function(
        &toll,
        "pay",
        vec![ScVal::Address(alice.sc_address()), ScVal::I64(1_000)],
    )
    .unwrap();
    let record = tx::submit(&mut sandbox, &alice, function, &[]).unwrap();
    LedgerAssertions::new(&sandbox).assert_balance(&alice, balance - 1_000 - record.fee_charged);
}

#[test]
fn test_unknown_source_and_hash_are_not_found() {
    let mut sandbox = sandbox();
    let alice = funded(&mut sandbox, "alice");
    let counter = deploy(&mut sandbox, &alice, COUNTER_WASM);
    let ghost = TestAccount::from_seed("ghost");

    let envelope = TxBuilder::invoke(&ghost, 1, &counter, "increment", vec![])
        .unwrap()
        .footprint(vec![], vec![])
        .unwrap()
        .envelope(&[&ghost], &sandbox.get_info().network_id)
        .unwrap();
    assert!(matches!(
        sandbox.execute(&envelope),
        Err(SandboxError::NotFound(_))
    ));
    assert!(matches!(
        sandbox.get_transaction(&"00".repeat(32)),
        Err(SandboxError::NotFound(_))
    ));
    assert!(matches!(
        sandbox.balance(&ghost.address()),
        Err(SandboxError::NotFound(_))
    ));
}

#[test]
fn test_garbage_envelope_is_malformed() {
    let mut sandbox = sandbox();
    assert!(matches!(
        sandbox.execute("not base64 at all!"),
        Err(SandboxError::MalformedInput(_))
    ));
    assert!(matches!(
        sandbox.execute("AAAA"),
        Err(SandboxError::MalformedInput(_))
    ));
}
