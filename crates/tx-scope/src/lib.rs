// crates/tx-scope/src/lib.rs

//! Transactions liées au scope d'exécution.
//!
//! Le code applicatif utilise un seul handle partagé ([`infrastructure::postgres::ScopedPool`]).
//! À l'intérieur d'un `run_in_transaction`, chaque opération est automatiquement routée
//! vers la transaction de l'unité de travail courante, sans passer le handle en paramètre.

pub mod application;
pub mod domain;
pub mod errors;
pub mod infrastructure;
