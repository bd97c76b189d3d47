// crates/tx-scope/src/errors/result.rs

use crate::errors::TxError;

/// Result utilisé par tout le crate (manager, dispatch, middleware).
pub type Result<T> = std::result::Result<T, TxError>;
