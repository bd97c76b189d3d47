// crates/tx-scope/src/application/transactions/transaction_manager.rs

use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;
use crate::domain::transaction::{Transaction, TransactionFactory, TransactionOptions};
use crate::errors::{Result, TxError};
use crate::infrastructure::concurrency::ContextStore;

/// Clé fixe sous laquelle la transaction active est publiée dans le ContextStore.
pub const TRANSACTION_KEY: &str = "transaction";

/// Valeur stockée sous `TRANSACTION_KEY` : les transactions actives du scope,
/// par manager (plusieurs managers indépendants peuvent s'imbriquer).
#[derive(Clone, Default)]
struct ActiveTransactions(Vec<(Uuid, Arc<dyn Transaction>)>);

impl ActiveTransactions {
    fn find(&self, manager_id: Uuid) -> Option<Arc<dyn Transaction>> {
        self.0
            .iter()
            .rev()
            .find(|(id, _)| *id == manager_id)
            .map(|(_, tx)| tx.clone())
    }

    fn push(&mut self, manager_id: Uuid, tx: Arc<dyn Transaction>) {
        self.0.push((manager_id, tx));
    }
}

/// Rollback de secours quand l'unité de travail est abandonnée
/// (timeout, abort de la tâche, panic) avant commit/rollback.
struct CompletionGuard {
    tx: Arc<dyn Transaction>,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if !self.tx.is_completed() {
            tracing::warn!(
                tx_id = %self.tx.id(),
                "⚠️ Unit of work dropped before completion, rolling back transaction"
            );
            self.tx.abandon();
        }
    }
}

/// Orchestration du cycle de vie : ouverture, publication dans le scope,
/// commit sur succès, rollback sur échec.
///
/// Politique d'imbrication : réutilisation. Un `run_in_transaction` appelé alors qu'une
/// transaction ouverte de CE manager est active exécute le callback directement dessus :
/// pas de nouvelle transaction, pas de commit intermédiaire, l'erreur remonte au scope parent.
pub struct TransactionManager {
    id: Uuid,
    factory: Arc<dyn TransactionFactory>,
    default_options: TransactionOptions,
}

impl TransactionManager {
    pub fn new(factory: Arc<dyn TransactionFactory>) -> Self {
        Self {
            id: Uuid::now_v7(),
            factory,
            default_options: TransactionOptions::default(),
        }
    }

    pub fn with_default_options(mut self, options: TransactionOptions) -> Self {
        self.default_options = options;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn default_options(&self) -> TransactionOptions {
        self.default_options
    }

    /// Transaction de ce manager active dans le scope courant.
    pub fn get_transaction(&self) -> Option<Arc<dyn Transaction>> {
        let store = ContextStore::current()?;
        store
            .get::<ActiveTransactions>(TRANSACTION_KEY)?
            .find(self.id)
    }

    /// Comme `get_transaction`, mais l'absence est une erreur d'usage.
    pub fn require_transaction(&self) -> Result<Arc<dyn Transaction>> {
        self.get_transaction().ok_or(TxError::NoActiveTransaction)
    }

    pub async fn run_in_transaction<F, Fut, T, E>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: From<TxError>,
    {
        self.run_in_transaction_with(self.default_options, f).await
    }

    pub async fn run_in_transaction_with<F, Fut, T, E>(
        &self,
        options: TransactionOptions,
        f: F,
    ) -> std::result::Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: From<TxError>,
    {
        // 1. Réutilisation si une transaction ouverte existe déjà dans le scope
        if let Some(active) = self.get_transaction().filter(|tx| !tx.is_completed()) {
            if active.options() != &options {
                tracing::debug!(
                    tx_id = %active.id(),
                    ?options,
                    "Nested unit of work keeps the enclosing transaction options"
                );
            }
            return f().await;
        }

        if let Some(level) = options.isolation_level {
            if !self.factory.supports(level) {
                return Err(TxError::InvalidIsolationLevel(level.to_string()).into());
            }
        }

        // 2. Ouverture sur le handle de base
        let tx = self.factory.begin(&options).await?;
        let _guard = CompletionGuard { tx: tx.clone() };
        tracing::debug!(tx_id = %tx.id(), ?options, "Transaction opened");

        // 3. Publication dans un store propre à cette unité de travail
        let store = match ContextStore::current() {
            Some(parent) => parent.fork(),
            None => ContextStore::new(),
        };
        let mut active = store
            .get::<ActiveTransactions>(TRANSACTION_KEY)
            .map(|a| a.as_ref().clone())
            .unwrap_or_default();
        active.push(self.id, tx.clone());
        store.set(TRANSACTION_KEY, active);

        // 4. Exécution du callback dans le scope, puis finalisation
        let outcome = ContextStore::run_scoped(store, async move { f().await }).await;
        Self::finalize(&tx, outcome).await
    }

    async fn finalize<T, E>(
        tx: &Arc<dyn Transaction>,
        outcome: std::result::Result<T, E>,
    ) -> std::result::Result<T, E>
    where
        E: From<TxError>,
    {
        match outcome {
            Ok(value) => {
                if tx.is_completed() {
                    tracing::warn!(
                        tx_id = %tx.id(),
                        state = %tx.state(),
                        "Transaction already finalized inside the unit of work, skipping commit"
                    );
                    return Ok(value);
                }
                tx.commit().await?;
                tracing::debug!(tx_id = %tx.id(), "Transaction committed");
                Ok(value)
            }
            Err(err) => {
                if tx.is_completed() {
                    tracing::debug!(
                        tx_id = %tx.id(),
                        state = %tx.state(),
                        "Transaction already finalized inside the unit of work, skipping rollback"
                    );
                } else if let Err(rollback_err) = tx.rollback().await {
                    // L'erreur du callback reste la cause principale
                    tracing::error!(
                        tx_id = %tx.id(),
                        error = %rollback_err,
                        "❌ Rollback failed after unit of work failure"
                    );
                } else {
                    tracing::debug!(tx_id = %tx.id(), "Transaction rolled back");
                }
                Err(err)
            }
        }
    }
}
