#![no_main]

use libfuzzer_sys::fuzz_target;
use soroban_sandbox::runtime::ParsedEnvelope;
use soroban_sandbox::utils::encode_base64;

fuzz_target!(|data: &[u8]| {
    let network_id = [0u8; 32];
    let _ = ParsedEnvelope::from_base64(&encode_base64(data), &network_id);
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = ParsedEnvelope::from_base64(s, &network_id);
    }
});
