//! # Creditor Bank
//!
//! Pooled CPU/NET resource lending: creditors stake tokens, the bank matches
//! delegation orders to them and keeps one active creditor per pool.
//!
//! ## Architecture
//!
//! - `chain`: Account names, assets and the ledger, identity, scheduler and clock interfaces
//! - `tables`: Creditor, plan, dividend and safe creditor tables
//! - `bank`: Matching, pricing and rotation behind an atomic facade
//! - `config`: Configuration management and validation
//! - `persistence`: SQLite-based table persistence and JSON snapshots
//! - `error`: Core error type

pub mod bank;
pub mod chain;
pub mod config;
pub mod error;
pub mod persistence;
pub mod tables;

pub use bank::{Bank, BankParams};
pub use config::Config;
pub use error::{BankError, BankResult};
