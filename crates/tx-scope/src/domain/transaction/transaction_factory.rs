// crates/tx-scope/src/domain/transaction/transaction_factory.rs

use std::sync::Arc;
use async_trait::async_trait;
use crate::domain::transaction::{IsolationLevel, Transaction, TransactionOptions};
use crate::errors::Result;

/// Port vers l'opération "begin" du handle de base (pool, connexion...).
#[async_trait]
pub trait TransactionFactory: Send + Sync {
    async fn begin(&self, options: &TransactionOptions) -> Result<Arc<dyn Transaction>>;

    /// Niveaux acceptés par la base sous-jacente.
    fn supports(&self, _level: IsolationLevel) -> bool {
        true
    }
}
