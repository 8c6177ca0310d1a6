use crate::fixtures::*;
use proptest::prelude::*;
use soroban_sandbox::SandboxError;
use soroban_sandbox_mock::TestAccount;

proptest! {
    #[test]
    fn test_fund_overwrites_balance(
        seed in "[a-z]{1,12}",
        first in 0i64..i64::MAX,
        second in 0i64..i64::MAX,
    ) {
        let mut sandbox = sandbox();
        let account = TestAccount::from_seed(&seed);
        sandbox.fund(&account.address(), first).unwrap();
        sandbox.fund(&account.address(), second).unwrap();

        prop_assert_eq!(sandbox.balance(&account.address()).unwrap(), second);
        prop_assert_eq!(sandbox.account_info(&account.address()).unwrap().sequence_number, 0);
    }

    #[test]
    fn test_unfunded_accounts_are_not_found(seed in "[a-z]{1,12}") {
        let mut sandbox = sandbox();
        sandbox.fund(&TestAccount::from_seed("someone-else").address(), 1).unwrap();
        let account = TestAccount::from_seed(&seed);
        prop_assume!(seed != "someone-else");

        let balance = sandbox.balance(&account.address());
        prop_assert!(matches!(balance, Err(SandboxError::NotFound(_))));
        let info = sandbox.account_info(&account.address());
        prop_assert!(matches!(info, Err(SandboxError::NotFound(_))));
    }

    #[test]
    fn test_clock_reads_back_what_was_set(
        timestamp in any::<u64>(),
        sequence in any::<u32>(),
    ) {
        let mut sandbox = sandbox();
        sandbox.set_time(timestamp);
        sandbox.set_sequence(sequence);
        let info = sandbox.get_info();
        prop_assert_eq!(info.timestamp, timestamp);
        prop_assert_eq!(info.sequence_number, sequence);
        prop_assert_eq!(sandbox.latest_ledger().sequence, sequence);
    }
}
