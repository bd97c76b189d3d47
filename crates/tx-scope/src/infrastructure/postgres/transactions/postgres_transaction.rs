// crates/tx-scope/src/infrastructure/postgres/transactions/postgres_transaction.rs

use std::any::Any;
use std::future::Future;
use async_trait::async_trait;
use parking_lot::Mutex;
use sqlx::{Postgres, Transaction as PostgresTx};
use tokio::sync::{Mutex as AsyncMutex, MutexGuard};
use uuid::Uuid;
use crate::domain::transaction::{Transaction, TransactionOptions, TransactionState};
use crate::errors::{Result, TxError};
use crate::infrastructure::postgres::mappers::SqlxErrorExt;

tokio::task_local! {
    /// Transaction dont la connexion est prêtée à un callback `with_connection`
    static BORROWED: Uuid;
}

/// Transaction sqlx partagée par toutes les opérations d'une unité de travail.
///
/// La connexion est protégée par un mutex async : des sous-opérations concurrentes
/// (`join!`) d'une même unité de travail passent l'une après l'autre sur la même connexion.
/// `None` une fois la transaction finalisée.
pub struct PostgresTransaction {
    id: Uuid,
    options: TransactionOptions,
    inner: AsyncMutex<Option<PostgresTx<'static, Postgres>>>,
    state: Mutex<TransactionState>,
}

impl PostgresTransaction {
    pub fn new(tx: PostgresTx<'static, Postgres>, options: TransactionOptions) -> Self {
        Self {
            id: Uuid::now_v7(),
            options,
            inner: AsyncMutex::new(Some(tx)),
            state: Mutex::new(TransactionState::Open),
        }
    }

    pub fn downcast(tx: &dyn Transaction) -> Result<&PostgresTransaction> {
        tx.as_any()
            .downcast_ref::<PostgresTransaction>()
            .ok_or(TxError::TypeMismatch("PostgresTransaction"))
    }

    /// Verrouille la connexion liée à la transaction.
    ///
    /// Refuse l'accès depuis un callback `with_connection` de cette même transaction
    /// (le mutex n'est pas réentrant) et une fois la transaction terminée.
    pub async fn lock(&self) -> Result<MutexGuard<'_, Option<PostgresTx<'static, Postgres>>>> {
        self.ensure_not_borrowed()?;

        let mut slot = self.inner.lock().await;
        if self.state().is_terminal() {
            // abandon() n'a pas pu vider le slot pendant que le verrou était tenu
            if slot.take().is_some() {
                tracing::debug!(tx_id = %self.id, "Releasing connection of abandoned transaction");
            }
            return Err(self.completed_error());
        }
        Ok(slot)
    }

    /// Exécute `fut` en marquant la connexion comme prêtée pour la tâche courante.
    pub(crate) async fn lend<F: Future>(&self, fut: F) -> F::Output {
        BORROWED.scope(self.id, fut).await
    }

    fn ensure_not_borrowed(&self) -> Result<()> {
        if BORROWED.try_with(|id| *id == self.id).unwrap_or(false) {
            return Err(TxError::ConnectionInUse(self.id));
        }
        Ok(())
    }

    pub fn completed_error(&self) -> TxError {
        TxError::AlreadyCompleted {
            id: self.id,
            state: self.state(),
        }
    }

    async fn take(&self) -> Result<PostgresTx<'static, Postgres>> {
        self.ensure_not_borrowed()?;
        let mut slot = self.inner.lock().await;
        slot.take().ok_or_else(|| self.completed_error())
    }

    fn set_state(&self, state: TransactionState) {
        *self.state.lock() = state;
    }
}

#[async_trait]
impl Transaction for PostgresTransaction {
    fn id(&self) -> Uuid {
        self.id
    }

    fn options(&self) -> &TransactionOptions {
        &self.options
    }

    fn state(&self) -> TransactionState {
        *self.state.lock()
    }

    async fn commit(&self) -> Result<()> {
        let tx = self.take().await?;
        match tx.commit().await.map_commit_err() {
            Ok(()) => {
                self.set_state(TransactionState::Committed);
                Ok(())
            }
            Err(err) => {
                // Postgres termine la transaction sur un COMMIT en échec
                self.set_state(TransactionState::RolledBack);
                Err(err)
            }
        }
    }

    async fn rollback(&self) -> Result<()> {
        let tx = self.take().await?;
        let result = tx.rollback().await;
        self.set_state(TransactionState::RolledBack);
        result.map_err(|e| TxError::Rollback(e.to_string()))
    }

    fn abandon(&self) {
        {
            let mut state = self.state.lock();
            if state.is_terminal() {
                return;
            }
            *state = TransactionState::RolledBack;
        }

        // Le drop d'une sqlx::Transaction encore ouverte planifie le ROLLBACK
        // avant le retour de la connexion au pool.
        // Si le verrou est tenu, le prochain lock() ou la dernière référence s'en chargera.
        if let Ok(mut slot) = self.inner.try_lock() {
            drop(slot.take());
        }
        tracing::warn!(tx_id = %self.id, "Transaction abandoned, rollback scheduled by the driver");
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
