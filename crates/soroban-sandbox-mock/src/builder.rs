use crate::context::ContractError;
use crate::mock::{MockContract, MockHost};
use crate::storage::StorageHelper;
use serde_json::Value;
use soroban_sandbox::config::SandboxConfig;
use soroban_sandbox::Sandbox;
use stellar_xdr::curr::{ScAddress, ScVal};

pub struct MockHostBuilder {
    host: MockHost,
}

impl Default for MockHostBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MockHostBuilder {
    pub fn new() -> Self {
        Self::from_host(MockHost::new())
    }

    pub fn from_host(host: MockHost) -> Self {
        Self { host }
    }

    /// Bind `wasm` to `contract`. The same bytes must later be uploaded or
    /// deployed for instances to find the code.
    pub fn with_contract(mut self, wasm: &[u8], contract: impl MockContract + 'static) -> Self {
        self.host.register(wasm, contract);
        self
    }

    pub fn with_mock_call(mut self, contract: &ScAddress, function: &str, return_value: ScVal) -> Self {
        self.host
            .mock_call(contract.clone(), function, return_value);
        self
    }

    pub fn with_mock_call_json(
        self,
        contract: &ScAddress,
        function: &str,
        return_value: &Value,
    ) -> Result<Self, ContractError> {
        let value = StorageHelper::json_to_scval(return_value)?;
        Ok(self.with_mock_call(contract, function, value))
    }

    pub fn build(self) -> MockHost {
        self.host
    }

    pub fn sandbox(self) -> Sandbox<MockHost> {
        Sandbox::new(self.host)
    }

    pub fn sandbox_with_config(self, config: SandboxConfig) -> Sandbox<MockHost> {
        Sandbox::with_config(config, self.host)
    }
}
