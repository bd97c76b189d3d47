// crates/tx-scope/src/infrastructure/retry.rs

use std::time::Duration;
use rand::Rng;
use crate::errors::TxError;

#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 20,
        }
    }
}

/// Erreurs pour lesquelles rejouer toute l'unité de travail peut réussir.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for TxError {
    fn is_retryable(&self) -> bool {
        TxError::is_retryable(self)
    }
}

/// Rejoue `action` (typiquement un `run_in_transaction` complet) sur conflit
/// de sérialisation ou deadlock, avec backoff exponentiel + jitter.
///
/// La dernière erreur est renvoyée telle quelle une fois les tentatives épuisées.
pub async fn with_retry<F, Fut, T, E>(config: RetryConfig, mut action: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: Retryable + std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        match action().await {
            Ok(res) => return Ok(res),
            Err(e) if e.is_retryable() && attempt < config.max_retries => {
                // 2^attempt * base
                let base_backoff = config.initial_backoff_ms * 2u64.pow(attempt);

                // Jitter entre 0 et 25% de la base
                let jitter = rand::rng().random_range(0..base_backoff / 4 + 1);
                let backoff = Duration::from_millis(base_backoff + jitter);

                tracing::warn!(
                    error = %e,
                    "🔄 Transaction conflict (attempt {}/{}), retrying in {:?}...",
                    attempt + 1,
                    config.max_retries,
                    backoff
                );

                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
