// crates/tx-scope/src/errors/mod.rs

mod error;
mod result;

pub use error::TxError;
pub use result::Result;
