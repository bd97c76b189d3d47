// crates/tx-scope/src/domain/transaction/transaction_factory_stub.rs

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use async_trait::async_trait;
use parking_lot::Mutex;
use crate::domain::transaction::{FakeTransaction, Transaction, TransactionFactory, TransactionOptions};
use crate::errors::{Result, TxError};

/// Factory en mémoire : garde une trace de chaque transaction ouverte.
#[derive(Default)]
pub struct StubTxFactory {
    begun: Mutex<Vec<Arc<FakeTransaction>>>,
    fail_begin: AtomicBool,
    fail_commit: AtomicBool,
    fail_rollback: AtomicBool,
}

impl StubTxFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_begin(self) -> Self {
        self.fail_begin.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_commit(self) -> Self {
        self.fail_commit.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_rollback(self) -> Self {
        self.fail_rollback.store(true, Ordering::SeqCst);
        self
    }

    pub fn begun(&self) -> Vec<Arc<FakeTransaction>> {
        self.begun.lock().clone()
    }

    pub fn begin_count(&self) -> usize {
        self.begun.lock().len()
    }

    /// Toutes les écritures committées, toutes transactions confondues
    pub fn published(&self) -> Vec<String> {
        self.begun.lock().iter().flat_map(|tx| tx.published()).collect()
    }
}

#[async_trait]
impl TransactionFactory for StubTxFactory {
    async fn begin(&self, options: &TransactionOptions) -> Result<Arc<dyn Transaction>> {
        if self.fail_begin.load(Ordering::SeqCst) {
            return Err(TxError::Begin("pool timed out while waiting for an open connection".into()));
        }

        let mut tx = FakeTransaction::new(*options);
        if self.fail_commit.load(Ordering::SeqCst) {
            tx = tx.failing_commit();
        }
        if self.fail_rollback.load(Ordering::SeqCst) {
            tx = tx.failing_rollback();
        }

        let tx = Arc::new(tx);
        self.begun.lock().push(tx.clone());
        Ok(tx)
    }
}
