pub mod assertions;
pub mod builder;
pub mod context;
pub mod mock;
pub mod storage;
pub mod tx;

pub use assertions::LedgerAssertions;
pub use builder::MockHostBuilder;
pub use context::{CallContext, ContractError};
pub use mock::{MockContract, MockHost};
pub use tx::{TestAccount, TxBuilder};
