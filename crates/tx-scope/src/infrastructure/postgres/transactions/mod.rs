mod postgres_transaction;
mod postgres_transaction_factory;

pub use postgres_transaction::PostgresTransaction;
pub use postgres_transaction_factory::PostgresTransactionFactory;
