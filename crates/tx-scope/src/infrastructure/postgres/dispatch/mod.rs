// crates/tx-scope/src/infrastructure/postgres/dispatch/mod.rs

mod scoped_pool;

pub use scoped_pool::ScopedPool;
