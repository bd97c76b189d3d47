// crates/tx-scope/src/infrastructure/http/transaction_layer.rs

//! Middleware tower : une requête = une unité de travail.
//!
//! Réponse `2xx` / `3xx` : commit. Erreur du service ou tout autre statut : rollback,
//! la réponse est tout de même renvoyée au client.

use std::sync::Arc;
use std::task::{Context, Poll};
use futures::future::BoxFuture;
use http::{Request, Response};
use tower::{BoxError, Layer, Service};
use crate::application::transactions::TransactionManager;
use crate::domain::transaction::TransactionOptions;
use crate::errors::TxError;

#[derive(Clone)]
pub struct TransactionLayer {
    manager: Arc<TransactionManager>,
    options: Option<TransactionOptions>,
}

impl TransactionLayer {
    pub fn new(manager: Arc<TransactionManager>) -> Self {
        Self { manager, options: None }
    }

    /// Sans appel, les options par défaut du manager s'appliquent.
    pub fn with_options(mut self, options: TransactionOptions) -> Self {
        self.options = Some(options);
        self
    }
}

impl<S> Layer<S> for TransactionLayer {
    type Service = TransactionService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TransactionService {
            inner,
            manager: self.manager.clone(),
            options: self.options,
        }
    }
}

#[derive(Clone)]
pub struct TransactionService<S> {
    inner: S,
    manager: Arc<TransactionManager>,
    options: Option<TransactionOptions>,
}

/// Issue d'une requête vue par le manager : tout sauf `Ok` déclenche le rollback.
enum RequestFailure<B> {
    Service(BoxError),
    Rejected(Response<B>),
    Tx(TxError),
}

impl<B> From<TxError> for RequestFailure<B> {
    fn from(err: TxError) -> Self {
        Self::Tx(err)
    }
}

fn should_commit<B>(response: &Response<B>) -> bool {
    let status = response.status();
    status.is_success() || status.is_redirection()
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for TransactionService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Into<BoxError>,
    ReqBody: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        // Le clone prêt est celui sur lequel poll_ready a été appelé
        let clone = self.inner.clone();
        let inner = std::mem::replace(&mut self.inner, clone);
        let manager = self.manager.clone();
        let options = self.options.unwrap_or_else(|| manager.default_options());

        Box::pin(async move {
            let outcome = manager
                .run_in_transaction_with(options, move || async move {
                    let mut inner = inner;
                    match inner.call(request).await {
                        Ok(response) if should_commit(&response) => Ok(response),
                        Ok(response) => Err(RequestFailure::Rejected(response)),
                        Err(err) => Err(RequestFailure::Service(err.into())),
                    }
                })
                .await;

            match outcome {
                Ok(response) => Ok(response),
                Err(RequestFailure::Rejected(response)) => {
                    tracing::debug!(status = %response.status(), "Request rejected, transaction rolled back");
                    Ok(response)
                }
                Err(RequestFailure::Service(err)) => Err(err),
                Err(RequestFailure::Tx(err)) => Err(err.into()),
            }
        })
    }
}
