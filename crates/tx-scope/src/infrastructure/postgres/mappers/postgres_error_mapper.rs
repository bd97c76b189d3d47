// crates/tx-scope/src/infrastructure/postgres/mappers/postgres_error_mapper.rs

use crate::errors::TxError;

pub trait SqlxErrorExt<T> {
    /// Conserve le SQLSTATE (utile pour le retry sur 40001 / 40P01)
    fn map_tx_err(self, context: &'static str) -> Result<T, TxError>;

    /// Échec du COMMIT : `TxError::Commit`, SQLSTATE conservé
    fn map_commit_err(self) -> Result<T, TxError>;
}

/// SQLSTATE + message d'une erreur sqlx
fn split(err: sqlx::Error) -> (Option<String>, String) {
    match err {
        sqlx::Error::Database(db_err) => (
            db_err.code().map(|c| c.into_owned()),
            db_err.message().to_string(),
        ),
        other => (None, other.to_string()),
    }
}

impl<T> SqlxErrorExt<T> for std::result::Result<T, sqlx::Error> {
    fn map_tx_err(self, context: &'static str) -> Result<T, TxError> {
        self.map_err(|e| {
            let (code, message) = split(e);
            TxError::Database {
                code,
                message: format!("{}: {}", context, message),
            }
        })
    }

    fn map_commit_err(self) -> Result<T, TxError> {
        self.map_err(|e| {
            let (code, message) = split(e);
            TxError::Commit { code, message }
        })
    }
}
