// crates/tx-scope/src/domain/mod.rs

pub mod transaction;
