// crates/tx-scope/src/infrastructure/postgres/factories/postgres_config.rs

use std::time::Duration;
use crate::domain::transaction::TransactionOptions;

#[derive(Debug, Clone, PartialEq)]
pub struct PostgresConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    /// Options appliquées par `run_in_transaction` sans options explicites
    pub default_options: TransactionOptions,
}

impl PostgresConfig {
    pub fn new(
        max_connections: u32,
        min_connections: u32,
        connect_timeout: Duration,
        default_options: TransactionOptions,
    ) -> Self {
        Self {
            max_connections,
            min_connections,
            connect_timeout,
            default_options,
        }
    }
}
