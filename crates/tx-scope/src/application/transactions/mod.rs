// crates/tx-scope/src/application/transactions/mod.rs

mod transaction_manager;
mod transactional;

pub use transaction_manager::{TransactionManager, TRANSACTION_KEY};
pub use transactional::transactional;
