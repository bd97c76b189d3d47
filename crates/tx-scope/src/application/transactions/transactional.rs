// crates/tx-scope/src/application/transactions/transactional.rs

use std::future::Future;
use std::sync::Arc;
use futures::future::BoxFuture;
use crate::application::transactions::TransactionManager;
use crate::domain::transaction::TransactionOptions;
use crate::errors::TxError;

/// Enveloppe une fonction d'unité de travail : chaque appel du résultat
/// s'exécute dans `manager.run_in_transaction_with(options, ..)`.
///
/// ```ignore
/// let create_user = transactional(manager.clone(), TransactionOptions::default(), move |name: String| {
///     let db = db.clone();
///     async move { insert_user(&db, &name).await }
/// });
/// create_user("alice".into()).await?;
/// ```
pub fn transactional<A, F, Fut, T, E>(
    manager: Arc<TransactionManager>,
    options: TransactionOptions,
    f: F,
) -> impl Fn(A) -> BoxFuture<'static, Result<T, E>> + Clone + Send + Sync
where
    A: Send + 'static,
    F: Fn(A) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: From<TxError> + Send + 'static,
{
    move |args: A| {
        let manager = manager.clone();
        let f = f.clone();
        Box::pin(async move {
            manager
                .run_in_transaction_with(options, move || f(args))
                .await
        })
    }
}
