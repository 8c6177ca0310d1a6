use crate::fixtures::*;
use soroban_sandbox::{Durability, SandboxError};
use soroban_sandbox_mock::tx::{self, invoke_function, TxBuilder};
use soroban_sandbox_mock::LedgerAssertions;
use stellar_xdr::curr::ScVal;

#[test]
fn test_owner_handover_lifecycle() {
    let mut sandbox = sandbox();
    let alice = funded(&mut sandbox, "alice");
    let bob = funded(&mut sandbox, "bob");

    // upload, then create from the uploaded hash
    let upload = TxBuilder::upload(&alice, 0, OWNER_WASM).unwrap();
    let uploaded = tx::submit(&mut sandbox, &alice, upload.host_function().clone(), &[]).unwrap();
    let hash = match uploaded.ok_or_trap().unwrap() {
        ScVal::Bytes(bytes) => bytes.0.to_vec(),
        other => panic!("upload returned {other:?}"),
    };
    assert_eq!(hash, soroban_sandbox::utils::sha256(OWNER_WASM).to_vec());

    let create = TxBuilder::create(&alice, 0, hash.try_into().unwrap(), [7u8; 32]);
    let created = tx::submit(&mut sandbox, &alice, create.host_function().clone(), &[]).unwrap();
    let contract = match created.ok_or_trap().unwrap() {
        ScVal::Address(address) => address.clone(),
        other => panic!("create returned {other:?}"),
    };

    let init = call(&mut sandbox, &alice, &contract, "init", vec![ScVal::Address(alice.sc_address())])
        .unwrap();
    let checks = LedgerAssertions::new(&sandbox);
    checks.assert_success(&init);
    checks.assert_value_eq(
        &contract,
        &sym("owner"),
        Durability::Persistent,
        &ScVal::Address(alice.sc_address()),
    );

    let handover = call(
        &mut sandbox,
        &alice,
        &contract,
        "change_owner",
        vec![ScVal::Address(alice.sc_address())],
    )
    .unwrap();
    LedgerAssertions::new(&sandbox).assert_success(&handover);
    assert_eq!(handover.events.len(), 1);

    let err = call(
        &mut sandbox,
        &bob,
        &contract,
        "change_owner",
        vec![ScVal::Address(bob.sc_address())],
    )
    .unwrap_err();
    assert!(matches!(err, SandboxError::Unauthorized(_)), "{err:?}");

    let checks = LedgerAssertions::new(&sandbox);
    checks.assert_sequence(&alice, 4);
    checks.assert_sequence(&bob, 0);
    checks.assert_balance(&bob, STARTING_BALANCE);
    checks.assert_value_eq(
        &contract,
        &sym("owner"),
        Durability::Persistent,
        &ScVal::Address(alice.sc_address()),
    );
}

#[test]
fn test_new_owner_can_hand_back() {
    let mut sandbox = sandbox();
    let alice = funded(&mut sandbox, "alice");
    let bob = funded(&mut sandbox, "bob");
    let contract = deploy(&mut sandbox, &alice, OWNER_WASM);

    call(&mut sandbox, &alice, &contract, "init", vec![ScVal::Address(alice.sc_address())])
        .unwrap();
    call(
        &mut sandbox,
        &alice,
        &contract,
        "change_owner",
        vec![ScVal::Address(bob.sc_address())],
    )
    .unwrap();

    // bob now owns it and signs for himself through source credentials
    let record = call(
        &mut sandbox,
        &bob,
        &contract,
        "change_owner",
        vec![ScVal::Address(alice.sc_address())],
    )
    .unwrap();
    LedgerAssertions::new(&sandbox).assert_success(&record);
}

#[test]
fn test_third_party_can_relay_a_signed_authorization() {
    let mut sandbox = sandbox();
    let alice = funded(&mut sandbox, "alice");
    let relayer = funded(&mut sandbox, "relayer");
    let contract = deploy(&mut sandbox, &alice, OWNER_WASM);
    call(&mut sandbox, &alice, &contract, "init", vec![ScVal::Address(alice.sc_address())])
        .unwrap();

    let function = invoke_function(
        &contract,
        "change_owner",
        vec![ScVal::Address(relayer.sc_address())],
    )
    .unwrap();
    let record = tx::submit(&mut sandbox, &relayer, function, &[&alice]).unwrap();
    let checks = LedgerAssertions::new(&sandbox);
    checks.assert_success(&record);
    checks.assert_value_eq(
        &contract,
        &sym("owner"),
        Durability::Persistent,
        &ScVal::Address(relayer.sc_address()),
    );
}

#[test]
fn test_clock_controls_are_visible_in_info() {
    let mut sandbox = sandbox();
    sandbox.set_time(1200);
    sandbox.set_sequence(1301);
    let info = sandbox.get_info();
    assert_eq!(info.timestamp, 1200);
    assert_eq!(info.sequence_number, 1301);
}
