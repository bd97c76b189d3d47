// crates/tx-scope/src/infrastructure/postgres/mod.rs

pub mod dispatch;
pub mod factories;
pub mod mappers;
pub mod transactions;

mod registry;

pub use dispatch::ScopedPool;
pub use registry::{get_transaction, initialize, run_in_transaction, scoped_pool, transaction_manager};
