// crates/tx-scope/src/infrastructure/http/mod.rs

mod transaction_layer;

pub use transaction_layer::{TransactionLayer, TransactionService};
