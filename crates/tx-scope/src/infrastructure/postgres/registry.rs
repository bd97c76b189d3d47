// crates/tx-scope/src/infrastructure/postgres/registry.rs

//! Liaison process-wide entre le pool de l'application et son handle de dispatch.
//!
//! `initialize` est appelé une fois au démarrage, avant de servir du trafic.
//! Le reste du code récupère ensuite le handle via `scoped_pool()`.

use std::future::Future;
use std::sync::Arc;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use sqlx::PgPool;
use crate::application::transactions::TransactionManager;
use crate::domain::transaction::{Transaction, TransactionOptions};
use crate::errors::{Result, TxError};
use crate::infrastructure::postgres::dispatch::ScopedPool;

static BINDING: Lazy<RwLock<Option<ScopedPool>>> = Lazy::new(|| RwLock::new(None));

/// Idempotent pour un même pool. Un pool différent remplace la liaison existante.
pub fn initialize(pool: PgPool) -> ScopedPool {
    let mut slot = BINDING.write();

    if let Some(existing) = slot.as_ref() {
        if existing.is_bound_to(&pool) {
            return existing.clone();
        }
        tracing::warn!("⚠️ Transaction manager re-initialized with a different pool, replacing binding");
    }

    let scoped = ScopedPool::new(pool);
    *slot = Some(scoped.clone());
    tracing::debug!("Transaction manager initialized");
    scoped
}

pub fn scoped_pool() -> Result<ScopedPool> {
    BINDING.read().clone().ok_or(TxError::NotInitialized)
}

pub fn transaction_manager() -> Result<Arc<TransactionManager>> {
    Ok(scoped_pool()?.manager())
}

pub fn get_transaction() -> Result<Option<Arc<dyn Transaction>>> {
    Ok(scoped_pool()?.get_transaction())
}

pub async fn run_in_transaction<F, Fut, T, E>(
    options: TransactionOptions,
    f: F,
) -> std::result::Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: From<TxError>,
{
    let scoped = scoped_pool()?;
    scoped.run_in_transaction_with(options, f).await
}
