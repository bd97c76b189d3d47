// crates/tx-scope/src/errors/error.rs

use thiserror::Error;
use uuid::Uuid;
use crate::domain::transaction::TransactionState;

/// SQLSTATE Postgres pour lesquels rejouer l'unité de travail a du sens.
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TxError {
    /// Usage avant `initialize()` : erreur fatale, jamais retry
    #[error("Transaction manager not initialized: call initialize() before serving traffic")]
    NotInitialized,

    /// Du code exige une transaction mais s'exécute hors de toute unité de travail
    #[error("No active transaction in the current scope")]
    NoActiveTransaction,

    #[error("Failed to begin transaction: {0}")]
    Begin(String),

    /// `code` : SQLSTATE renvoyé au COMMIT (40001 sous SERIALIZABLE)
    #[error("Failed to commit transaction: {message}")]
    Commit {
        code: Option<String>,
        message: String,
    },

    #[error("Failed to rollback transaction: {0}")]
    Rollback(String),

    /// Double finalisation (commit après rollback, etc.)
    #[error("Transaction {id} is already {state}")]
    AlreadyCompleted {
        id: Uuid,
        state: TransactionState,
    },

    #[error("Unsupported isolation level: '{0}'")]
    InvalidIsolationLevel(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Appel dispatché depuis un callback `with_connection` qui détient déjà la connexion
    #[error("Connection of transaction {0} is already borrowed by with_connection")]
    ConnectionInUse(Uuid),

    #[error("Type mismatch: expected {0}")]
    TypeMismatch(&'static str),

    #[error("Database error: {message}")]
    Database {
        code: Option<String>,
        message: String,
    },
}

impl TxError {
    /// Utilisé par la boucle de retry (conflits de sérialisation, deadlocks)
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Database { code: Some(code), .. } | Self::Commit { code: Some(code), .. } => {
                code == SERIALIZATION_FAILURE || code == DEADLOCK_DETECTED
            }
            _ => false,
        }
    }

    pub fn is_already_completed(&self) -> bool {
        matches!(self, Self::AlreadyCompleted { .. })
    }

    pub fn commit(message: impl Into<String>) -> Self {
        Self::Commit {
            code: None,
            message: message.into(),
        }
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            code: None,
            message: message.into(),
        }
    }
}
