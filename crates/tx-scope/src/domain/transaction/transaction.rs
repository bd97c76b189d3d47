// crates/tx-scope/src/domain/transaction/transaction.rs

use std::any::Any;
use std::fmt;
use async_trait::async_trait;
use uuid::Uuid;
use crate::domain::transaction::TransactionOptions;
use crate::errors::Result;

/// Cycle de vie d'une transaction. Une seule transition terminale par transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Open,
    Committed,
    RolledBack,
}

impl TransactionState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Open)
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Committed => write!(f, "committed"),
            Self::RolledBack => write!(f, "rolled back"),
        }
    }
}

/// Handle opaque fourni par le driver. Le manager ne fait qu'orchestrer son cycle de vie.
///
/// `commit` et `rollback` sur une transaction déjà terminée doivent renvoyer
/// `TxError::AlreadyCompleted`, jamais rejouer l'opération.
#[async_trait]
pub trait Transaction: Send + Sync + Any {
    fn id(&self) -> Uuid;

    fn options(&self) -> &TransactionOptions;

    fn state(&self) -> TransactionState;

    fn is_completed(&self) -> bool {
        self.state().is_terminal()
    }

    async fn commit(&self) -> Result<()>;

    async fn rollback(&self) -> Result<()>;

    /// Chemin synchrone pour l'annulation (timeout, abort, panic) :
    /// la transaction ne doit pas rester ouverte une fois l'unité de travail abandonnée.
    fn abandon(&self);

    fn as_any(&self) -> &dyn Any;
}
