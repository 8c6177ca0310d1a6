//! Mock contracts and setup helpers shared by the integration suites.
#![allow(dead_code)]

use soroban_sandbox::{Durability, Sandbox};
use soroban_sandbox_mock::tx::{self, invoke_function};
use soroban_sandbox_mock::{CallContext, ContractError, MockContract, MockHost, MockHostBuilder, TestAccount};
use stellar_xdr::curr::{ScAddress, ScVal, TransactionMeta};

pub const OWNER_WASM: &[u8] = b"\0asm\x01\0\0\0owner-fixture";
pub const COUNTER_WASM: &[u8] = b"\0asm\x01\0\0\0counter-fixture";
pub const TOLL_WASM: &[u8] = b"\0asm\x01\0\0\0toll-fixture";

pub const STARTING_BALANCE: i64 = 1_000_000_000;

pub fn sym(name: &str) -> ScVal {
    ScVal::Symbol(soroban_sandbox::utils::symbol(name).unwrap())
}

fn arg<'a>(args: &'a [ScVal], index: usize) -> Result<&'a ScVal, ContractError> {
    args.get(index)
        .ok_or_else(|| ContractError::trap(format!("missing argument {index}")))
}

fn address_arg(args: &[ScVal], index: usize) -> Result<ScAddress, ContractError> {
    match arg(args, index)? {
        ScVal::Address(address) => Ok(address.clone()),
        other => Err(ContractError::trap(format!("expected an address, got {other:?}"))),
    }
}

/// Single owner stored in persistent storage; only the owner may hand it over.
pub struct OwnerContract;

impl MockContract for OwnerContract {
    fn call(
        &self,
        ctx: &mut CallContext<'_, '_>,
        function: &str,
        args: &[ScVal],
    ) -> Result<ScVal, ContractError> {
        match function {
            "init" => {
                if ctx.has(&sym("owner"), Durability::Persistent)? {
                    return Err(ContractError::trap("already initialized"));
                }
                let owner = address_arg(args, 0)?;
                ctx.set(sym("owner"), ScVal::Address(owner), Durability::Persistent);
                Ok(ScVal::Void)
            }
            "change_owner" => {
                let current = match ctx.get(&sym("owner"), Durability::Persistent)? {
                    Some(ScVal::Address(owner)) => owner,
                    _ => return Err(ContractError::trap("not initialized")),
                };
                ctx.require_auth(&current);
                let next = address_arg(args, 0)?;
                ctx.set(sym("owner"), ScVal::Address(next.clone()), Durability::Persistent);
                ctx.emit(vec![sym("owner_changed")], ScVal::Address(next))?;
                Ok(ScVal::Void)
            }
            "owner" => ctx
                .get(&sym("owner"), Durability::Persistent)?
                .ok_or_else(|| ContractError::trap("not initialized")),
            other => Err(ContractError::trap(format!("function '{other}' not found"))),
        }
    }
}

/// Counter in persistent storage plus a scratch value in temporary storage.
pub struct CounterContract;

impl CounterContract {
    fn bump(ctx: &mut CallContext<'_, '_>) -> Result<u32, ContractError> {
        let current = match ctx.get(&sym("count"), Durability::Persistent)? {
            Some(ScVal::U32(n)) => n,
            _ => 0,
        };
        ctx.set(sym("count"), ScVal::U32(current + 1), Durability::Persistent);
        Ok(current + 1)
    }
}

impl MockContract for CounterContract {
    fn call(
        &self,
        ctx: &mut CallContext<'_, '_>,
        function: &str,
        args: &[ScVal],
    ) -> Result<ScVal, ContractError> {
        match function {
            "increment" => {
                let value = Self::bump(ctx)?;
                ctx.emit(vec![sym("count")], ScVal::U32(value))?;
                Ok(ScVal::U32(value))
            }
            "get" => Ok(ctx
                .get(&sym("count"), Durability::Persistent)?
                .unwrap_or(ScVal::U32(0))),
            // increments, then fails once the ledger clock is past the deadline
            "increment_before" => {
                let deadline = match arg(args, 0)? {
                    ScVal::U64(deadline) => *deadline,
                    other => return Err(ContractError::trap(format!("bad deadline {other:?}"))),
                };
                let value = Self::bump(ctx)?;
                if ctx.ledger().timestamp > deadline {
                    return Err(ContractError::trap("deadline passed"));
                }
                Ok(ScVal::U32(value))
            }
            "stash" => {
                let value = arg(args, 0)?.clone();
                ctx.set(sym("stash"), value, Durability::Temporary);
                Ok(ScVal::Void)
            }
            "peek" => Ok(ctx
                .get(&sym("stash"), Durability::Temporary)?
                .unwrap_or(ScVal::Void)),
            "extend" => {
                let live_until = match arg(args, 0)? {
                    ScVal::U32(n) => *n,
                    other => return Err(ContractError::trap(format!("bad ledger {other:?}"))),
                };
                ctx.get(&sym("count"), Durability::Persistent)?;
                ctx.extend_ttl(&sym("count"), Durability::Persistent, live_until);
                Ok(ScVal::Void)
            }
            "reset" => {
                ctx.remove(&sym("count"), Durability::Persistent);
                Ok(ScVal::Void)
            }
            other => Err(ContractError::trap(format!("function '{other}' not found"))),
        }
    }
}

/// Charges the caller a native-balance toll before doing nothing.
pub struct TollContract;

impl MockContract for TollContract {
    fn call(
        &self,
        ctx: &mut CallContext<'_, '_>,
        function: &str,
        args: &[ScVal],
    ) -> Result<ScVal, ContractError> {
        match function {
            "pay" => {
                let payer = address_arg(args, 0)?;
                let amount = match arg(args, 1)? {
                    ScVal::I64(amount) => *amount,
                    other => return Err(ContractError::trap(format!("bad amount {other:?}"))),
                };
                let ScAddress::Account(account) = &payer else {
                    return Err(ContractError::trap("only accounts pay tolls"));
                };
                ctx.require_auth(&payer);
                let balance = ctx
                    .account_balance(account)?
                    .ok_or_else(|| ContractError::trap("payer has no account"))?;
                ctx.set_account_balance(account, balance - amount)?;
                Ok(ScVal::I64(balance - amount))
            }
            other => Err(ContractError::trap(format!("function '{other}' not found"))),
        }
    }
}

pub fn host() -> MockHost {
    MockHostBuilder::new()
        .with_contract(OWNER_WASM, OwnerContract)
        .with_contract(COUNTER_WASM, CounterContract)
        .with_contract(TOLL_WASM, TollContract)
        .build()
}

pub fn sandbox() -> Sandbox<MockHost> {
    Sandbox::new(host())
}

pub fn funded(sandbox: &mut Sandbox<MockHost>, seed: &str) -> TestAccount {
    let account = TestAccount::from_seed(seed);
    sandbox.fund(&account.address(), STARTING_BALANCE).unwrap();
    account
}

/// Upload `wasm` and create an instance through real transactions.
pub fn deploy(sandbox: &mut Sandbox<MockHost>, deployer: &TestAccount, wasm: &[u8]) -> ScAddress {
    tx::install(sandbox, deployer, wasm, [1u8; 32]).unwrap()
}

pub fn call(
    sandbox: &mut Sandbox<MockHost>,
    source: &TestAccount,
    contract: &ScAddress,
    function: &str,
    args: Vec<ScVal>,
) -> soroban_sandbox::Result<soroban_sandbox::TransactionRecord> {
    tx::submit(
        sandbox,
        source,
        invoke_function(contract, function, args).unwrap(),
        &[],
    )
}

pub fn decode_meta(record: &soroban_sandbox::TransactionRecord) -> TransactionMeta {
    use stellar_xdr::curr::{Limits, ReadXdr};
    TransactionMeta::from_xdr(&record.meta, Limits::none()).unwrap()
}
