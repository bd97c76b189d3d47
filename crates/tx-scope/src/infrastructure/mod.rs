// crates/tx-scope/src/infrastructure/mod.rs

pub mod concurrency;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "http")]
pub mod http;

mod retry;

pub use retry::{with_retry, RetryConfig, Retryable};
