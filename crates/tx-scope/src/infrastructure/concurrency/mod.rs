// crates/tx-scope/src/infrastructure/concurrency/mod.rs

mod context_store;

pub use context_store::ContextStore;
