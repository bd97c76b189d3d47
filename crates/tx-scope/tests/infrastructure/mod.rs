// crates/tx-scope/tests/infrastructure/mod.rs

mod postgres_context_it;
mod scoped_pool_it;
