// crates/tx-scope/src/infrastructure/postgres/factories/postgres_context.rs

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use crate::errors::{Result, TxError};
use crate::infrastructure::postgres::dispatch::ScopedPool;
use crate::infrastructure::postgres::factories::{PostgresConfig, PostgresContextBuilder};

pub struct PostgresContext {
    pool: PgPool,
    url: String,
    config: PostgresConfig,
}

impl PostgresContext {
    pub fn builder() -> Result<PostgresContextBuilder> {
        PostgresContextBuilder::new()
    }

    pub fn builder_raw() -> PostgresContextBuilder {
        PostgresContextBuilder::default()
    }

    pub fn pool(&self) -> PgPool {
        self.pool.clone()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn config(&self) -> &PostgresConfig {
        &self.config
    }

    /// Handle de dispatch sur ce pool, avec les options par défaut configurées
    pub fn scoped_pool(&self) -> ScopedPool {
        ScopedPool::with_default_options(self.pool.clone(), self.config.default_options)
    }

    pub(crate) async fn restore(builder: PostgresContextBuilder) -> Result<Self> {
        let config = builder.config();

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .connect(&builder.url)
            .await
            .map_err(|e| TxError::Configuration(format!("Postgres Connection Failed: {}", e)))?;

        tracing::info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            "🐘 Postgres pool ready"
        );

        Ok(Self {
            pool,
            url: builder.url,
            config,
        })
    }
}
