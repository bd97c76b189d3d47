// crates/tx-scope/src/domain/transaction/transaction_stub.rs

use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;
use crate::domain::transaction::{Transaction, TransactionOptions, TransactionState};
use crate::errors::{Result, TxError};

// --- TRANSACTION EN MÉMOIRE ---
// Les écritures sont bufferisées puis publiées dans `published` au commit seulement.
pub struct FakeTransaction {
    id: Uuid,
    options: TransactionOptions,
    state: Mutex<TransactionState>,
    writes: Mutex<Vec<String>>,
    published: Mutex<Vec<String>>,
    commit_calls: AtomicUsize,
    rollback_calls: AtomicUsize,
    abandoned: AtomicBool,
    fail_commit: AtomicBool,
    fail_rollback: AtomicBool,
}

impl FakeTransaction {
    pub fn new(options: TransactionOptions) -> Self {
        Self {
            id: Uuid::now_v7(),
            options,
            state: Mutex::new(TransactionState::Open),
            writes: Mutex::new(Vec::new()),
            published: Mutex::new(Vec::new()),
            commit_calls: AtomicUsize::new(0),
            rollback_calls: AtomicUsize::new(0),
            abandoned: AtomicBool::new(false),
            fail_commit: AtomicBool::new(false),
            fail_rollback: AtomicBool::new(false),
        }
    }

    pub fn failing_commit(self) -> Self {
        self.fail_commit.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_rollback(self) -> Self {
        self.fail_rollback.store(true, Ordering::SeqCst);
        self
    }

    /// Écriture bufferisée dans la transaction
    pub fn write(&self, value: impl Into<String>) {
        self.writes.lock().push(value.into());
    }

    /// Ce qui est visible "en base" après finalisation
    pub fn published(&self) -> Vec<String> {
        self.published.lock().clone()
    }

    pub fn pending_writes(&self) -> Vec<String> {
        self.writes.lock().clone()
    }

    pub fn commit_calls(&self) -> usize {
        self.commit_calls.load(Ordering::SeqCst)
    }

    pub fn rollback_calls(&self) -> usize {
        self.rollback_calls.load(Ordering::SeqCst)
    }

    pub fn was_abandoned(&self) -> bool {
        self.abandoned.load(Ordering::SeqCst)
    }

    fn finish(&self, target: TransactionState) -> Result<()> {
        let mut state = self.state.lock();
        if state.is_terminal() {
            return Err(TxError::AlreadyCompleted { id: self.id, state: *state });
        }
        *state = target;
        Ok(())
    }
}

#[async_trait]
impl Transaction for FakeTransaction {
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
        self.commit_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_commit.load(Ordering::SeqCst) {
            self.finish(TransactionState::RolledBack)?;
            self.writes.lock().clear();
            return Err(TxError::commit("injected commit failure"));
        }
        self.finish(TransactionState::Committed)?;
        let writes: Vec<String> = self.writes.lock().drain(..).collect();
        self.published.lock().extend(writes);
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        self.rollback_calls.fetch_add(1, Ordering::SeqCst);
        self.finish(TransactionState::RolledBack)?;
        self.writes.lock().clear();
        if self.fail_rollback.load(Ordering::SeqCst) {
            return Err(TxError::Rollback("injected rollback failure".into()));
        }
        Ok(())
    }

    fn abandon(&self) {
        if self.finish(TransactionState::RolledBack).is_ok() {
            self.abandoned.store(true, Ordering::SeqCst);
            self.writes.lock().clear();
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
