#![no_main]

use libfuzzer_sys::fuzz_target;
use soroban_sandbox::utils::{parse_account_id, parse_sc_address};

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = parse_account_id(s);
        let _ = parse_sc_address(s);
    }
});
