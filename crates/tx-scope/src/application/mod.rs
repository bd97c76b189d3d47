// crates/tx-scope/src/application/mod.rs

pub mod transactions;
