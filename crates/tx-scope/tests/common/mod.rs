// crates/tx-scope/tests/common/mod.rs


pub use setup_postgres_test_db::{count_accounts, setup_postgres_test_db};
