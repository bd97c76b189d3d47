// crates/tx-scope/src/infrastructure/postgres/dispatch/scoped_pool.rs

//! Handle de dispatch partagé par tout le code applicatif.
//!
//! Chaque opération est routée au moment de l'appel :
//! - transaction active dans le scope courant : connexion de la transaction
//! - sinon : pool de base (autocommit)
//!
//! Le code appelant n'a jamais à savoir s'il tourne dans une unité de travail.

use std::future::Future;
use std::sync::Arc;
use futures::future::BoxFuture;
use sqlx::postgres::{PgArguments, PgConnectOptions, PgQueryResult, PgRow};
use sqlx::query::{Query, QueryAs, QueryScalar};
use sqlx::{FromRow, PgConnection, PgPool, Postgres};
use crate::application::transactions::TransactionManager;
use crate::domain::transaction::{Transaction, TransactionFactory, TransactionOptions};
use crate::errors::{Result, TxError};
use crate::infrastructure::postgres::mappers::SqlxErrorExt;
use crate::infrastructure::postgres::transactions::{PostgresTransaction, PostgresTransactionFactory};

/// Exécute `$call` sur la connexion de la transaction active, ou sur le pool.
/// `$executor` est lié à `&mut PgConnection` ou `&PgPool` selon le cas.
macro_rules! dispatch {
    ($self:ident, $op:literal, |$executor:ident| $call:expr) => {{
        match $self.inner.manager.get_transaction() {
            Some(active) => {
                let tx = PostgresTransaction::downcast(active.as_ref())?;
                let mut guard = tx.lock().await?;
                let Some(conn) = guard.as_mut() else {
                    return Err(tx.completed_error());
                };
                let $executor = &mut **conn;
                $call.await.map_tx_err($op)
            }
            None => {
                let $executor = &$self.inner.pool;
                $call.await.map_tx_err($op)
            }
        }
    }};
}

struct Inner {
    pool: PgPool,
    factory: Arc<PostgresTransactionFactory>,
    manager: Arc<TransactionManager>,
}

#[derive(Clone)]
pub struct ScopedPool {
    inner: Arc<Inner>,
}

impl ScopedPool {
    pub fn new(pool: PgPool) -> Self {
        Self::with_default_options(pool, TransactionOptions::default())
    }

    pub fn with_default_options(pool: PgPool, options: TransactionOptions) -> Self {
        let factory = Arc::new(PostgresTransactionFactory::new(pool.clone()));
        let manager = Arc::new(TransactionManager::new(factory.clone()).with_default_options(options));

        Self {
            inner: Arc::new(Inner { pool, factory, manager }),
        }
    }

    /// Associe un manager existant au pool (tests, factory personnalisée).
    pub fn from_parts(pool: PgPool, manager: Arc<TransactionManager>) -> Self {
        let factory = Arc::new(PostgresTransactionFactory::new(pool.clone()));
        Self {
            inner: Arc::new(Inner { pool, factory, manager }),
        }
    }

    pub fn manager(&self) -> Arc<TransactionManager> {
        self.inner.manager.clone()
    }

    pub fn get_transaction(&self) -> Option<Arc<dyn Transaction>> {
        self.inner.manager.get_transaction()
    }

    pub async fn run_in_transaction<F, Fut, T, E>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: From<TxError>,
    {
        self.inner.manager.run_in_transaction(f).await
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
        self.inner.manager.run_in_transaction_with(options, f).await
    }

    // --- Opérations dispatchées ---

    pub async fn execute<'q>(&self, query: Query<'q, Postgres, PgArguments>) -> Result<PgQueryResult> {
        dispatch!(self, "Execute", |executor| query.execute(executor))
    }

    /// SQL brut, protocole simple (plusieurs instructions autorisées, pas de paramètres)
    pub async fn execute_raw(&self, sql: &str) -> Result<PgQueryResult> {
        dispatch!(self, "ExecuteRaw", |executor| sqlx::raw_sql(sql).execute(executor))
    }

    pub async fn fetch_all<'q>(&self, query: Query<'q, Postgres, PgArguments>) -> Result<Vec<PgRow>> {
        dispatch!(self, "FetchAll", |executor| query.fetch_all(executor))
    }

    pub async fn fetch_one<'q>(&self, query: Query<'q, Postgres, PgArguments>) -> Result<PgRow> {
        dispatch!(self, "FetchOne", |executor| query.fetch_one(executor))
    }

    pub async fn fetch_optional<'q>(&self, query: Query<'q, Postgres, PgArguments>) -> Result<Option<PgRow>> {
        dispatch!(self, "FetchOptional", |executor| query.fetch_optional(executor))
    }

    pub async fn fetch_all_as<'q, O>(&self, query: QueryAs<'q, Postgres, O, PgArguments>) -> Result<Vec<O>>
    where
        O: Send + Unpin + for<'r> FromRow<'r, PgRow>,
    {
        dispatch!(self, "FetchAllAs", |executor| query.fetch_all(executor))
    }

    pub async fn fetch_one_as<'q, O>(&self, query: QueryAs<'q, Postgres, O, PgArguments>) -> Result<O>
    where
        O: Send + Unpin + for<'r> FromRow<'r, PgRow>,
    {
        dispatch!(self, "FetchOneAs", |executor| query.fetch_one(executor))
    }

    pub async fn fetch_optional_as<'q, O>(
        &self,
        query: QueryAs<'q, Postgres, O, PgArguments>,
    ) -> Result<Option<O>>
    where
        O: Send + Unpin + for<'r> FromRow<'r, PgRow>,
    {
        dispatch!(self, "FetchOptionalAs", |executor| query.fetch_optional(executor))
    }

    pub async fn fetch_scalar<'q, O>(&self, query: QueryScalar<'q, Postgres, O, PgArguments>) -> Result<O>
    where
        O: Send + Unpin,
        (O,): for<'r> FromRow<'r, PgRow>,
    {
        dispatch!(self, "FetchScalar", |executor| query.fetch_one(executor))
    }

    /// Accès direct à la connexion routée : celle de la transaction active,
    /// ou une connexion empruntée au pool pour la durée du callback.
    ///
    /// Dans une unité de travail, le callback détient la connexion de la transaction :
    /// il doit passer par `conn`. Toute autre opération de ce handle sur la même
    /// transaction depuis le callback échoue avec `TxError::ConnectionInUse`.
    pub async fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: for<'c> FnOnce(&'c mut PgConnection) -> BoxFuture<'c, Result<T>>,
    {
        match self.inner.manager.get_transaction() {
            Some(active) => {
                let tx = PostgresTransaction::downcast(active.as_ref())?;
                let mut guard = tx.lock().await?;
                let Some(conn) = guard.as_mut() else {
                    return Err(tx.completed_error());
                };
                tx.lend(f(&mut **conn)).await
            }
            None => {
                let mut conn = self.inner.pool.acquire().await.map_tx_err("Acquire")?;
                f(&mut *conn).await
            }
        }
    }

    /// Toujours sur le pool de base, même depuis une unité de travail.
    pub async fn begin(&self, options: &TransactionOptions) -> Result<Arc<dyn Transaction>> {
        self.inner.factory.begin(options).await
    }

    // --- Pass-through vers le pool ---

    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    pub fn size(&self) -> u32 {
        self.inner.pool.size()
    }

    pub fn num_idle(&self) -> usize {
        self.inner.pool.num_idle()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.pool.is_closed()
    }

    pub fn connect_options(&self) -> Arc<PgConnectOptions> {
        self.inner.pool.connect_options()
    }

    /// Même pool sous-jacent (les clones d'un `PgPool` partagent leurs options).
    pub fn is_bound_to(&self, pool: &PgPool) -> bool {
        Arc::ptr_eq(&self.inner.pool.connect_options(), &pool.connect_options())
    }
}
