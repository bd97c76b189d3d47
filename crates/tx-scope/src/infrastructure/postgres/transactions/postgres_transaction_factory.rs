// crates/tx-scope/src/infrastructure/postgres/transactions/postgres_transaction_factory.rs

use std::sync::Arc;
use async_trait::async_trait;
use sqlx::{Executor, PgPool};
use crate::domain::transaction::{Transaction, TransactionFactory, TransactionOptions};
use crate::errors::{Result, TxError};
use crate::infrastructure::postgres::transactions::PostgresTransaction;

/// Ouvre les transactions sur le pool de base (jamais sur une transaction active).
pub struct PostgresTransactionFactory {
    pool: PgPool,
}

impl PostgresTransactionFactory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// `SET TRANSACTION ...` à exécuter en première instruction, `None` si rien à régler.
pub(crate) fn set_transaction_statement(options: &TransactionOptions) -> Option<String> {
    let mut modes = Vec::new();
    if let Some(level) = options.isolation_level {
        modes.push(format!("ISOLATION LEVEL {}", level.as_sql()));
    }
    if options.read_only {
        modes.push("READ ONLY".to_string());
    }

    if modes.is_empty() {
        None
    } else {
        Some(format!("SET TRANSACTION {}", modes.join(", ")))
    }
}

#[async_trait]
impl TransactionFactory for PostgresTransactionFactory {
    async fn begin(&self, options: &TransactionOptions) -> Result<Arc<dyn Transaction>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| TxError::Begin(e.to_string()))?;

        if let Some(statement) = set_transaction_statement(options) {
            // En cas d'échec, le drop de `tx` annule la transaction
            (&mut *tx)
                .execute(statement.as_str())
                .await
                .map_err(|e| TxError::Begin(format!("{}: {}", statement, e)))?;
        }

        Ok(Arc::new(PostgresTransaction::new(tx, *options)))
    }
}
