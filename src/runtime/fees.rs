//! Linear resource fee model used to estimate `minResourceFee`.
//!
//! The sandbox never charges this amount; executed transactions pay their
//! declared fee.

use serde::{Deserialize, Serialize};

const INSTRUCTION_INCREMENT: i64 = 10_000;
const DATA_SIZE_1KB: i64 = 1024;
/// Fixed envelope overhead charged as historical data on top of the tx size.
const TX_BASE_RESULT_SIZE: i64 = 300;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeConfiguration {
    pub fee_per_instruction_increment: i64,
    pub fee_per_read_entry: i64,
    pub fee_per_write_entry: i64,
    pub fee_per_read_1kb: i64,
    pub fee_per_write_1kb: i64,
    pub fee_per_historical_1kb: i64,
    pub fee_per_contract_event_1kb: i64,
    pub fee_per_transaction_size_1kb: i64,
}

impl Default for FeeConfiguration {
    fn default() -> Self {
        Self {
            fee_per_instruction_increment: 10,
            fee_per_read_entry: 20,
            fee_per_write_entry: 30,
            fee_per_read_1kb: 40,
            fee_per_write_1kb: 50,
            fee_per_historical_1kb: 60,
            fee_per_contract_event_1kb: 70,
            fee_per_transaction_size_1kb: 80,
        }
    }
}

/// Resources consumed by one invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceUsage {
    pub instructions: u32,
    pub read_entries: u32,
    pub write_entries: u32,
    pub read_bytes: u32,
    pub write_bytes: u32,
    pub contract_events_size_bytes: u32,
    pub transaction_size_bytes: u32,
}

impl FeeConfiguration {
    pub fn estimate_resource_fee(&self, usage: &ResourceUsage) -> i64 {
        let compute = div_ceil(
            usage.instructions as i64 * self.fee_per_instruction_increment,
            INSTRUCTION_INCREMENT,
        );
        // read-write entries are read before they are written
        let entries = (usage.read_entries as i64 + usage.write_entries as i64)
            * self.fee_per_read_entry
            + usage.write_entries as i64 * self.fee_per_write_entry;
        let read = per_kb(usage.read_bytes, self.fee_per_read_1kb);
        let write = per_kb(usage.write_bytes, self.fee_per_write_1kb);
        let historical = div_ceil(
            (usage.transaction_size_bytes as i64 + TX_BASE_RESULT_SIZE)
                * self.fee_per_historical_1kb,
            DATA_SIZE_1KB,
        );
        let events = per_kb(usage.contract_events_size_bytes, self.fee_per_contract_event_1kb);
        let bandwidth = per_kb(usage.transaction_size_bytes, self.fee_per_transaction_size_1kb);

        compute + entries + read + write + historical + events + bandwidth
    }
}

fn per_kb(bytes: u32, fee: i64) -> i64 {
    div_ceil(bytes as i64 * fee, DATA_SIZE_1KB)
}

fn div_ceil(n: i64, d: i64) -> i64 {
    (n + d - 1) / d
}
