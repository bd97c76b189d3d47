// crates/tx-scope/src/domain/transaction/mod.rs

mod transaction;
mod transaction_factory;
mod transaction_options;

pub use transaction::{Transaction, TransactionState};
pub use transaction_factory::TransactionFactory;
pub use transaction_options::{IsolationLevel, TransactionOptions};

#[cfg(any(test, feature = "test-utils"))]
mod transaction_stub;
#[cfg(any(test, feature = "test-utils"))]
mod transaction_factory_stub;

#[cfg(any(test, feature = "test-utils"))]
pub use transaction_stub::FakeTransaction;
#[cfg(any(test, feature = "test-utils"))]
pub use transaction_factory_stub::StubTxFactory;
