//! Error types for the creditor bank core.

use crate::chain::{AccountName, Asset, Symbol};
use thiserror::Error;

/// Failures of a bank invocation.
///
/// Any error aborts the whole invocation; no table mutation made before the
/// failure survives it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BankError {
    #[error("account not found in creditor table: {account}")]
    NotFound { account: AccountName },

    #[error("no active paid plan configured")]
    Unconfigured,

    #[error("arithmetic fault: {reason}")]
    ArithmeticFault { reason: String },

    #[error("asset symbol mismatch: expected {expected}, got {actual}")]
    SymbolMismatch { expected: Symbol, actual: Symbol },

    #[error("invalid account name: {input}")]
    InvalidAccountName { input: String },

    #[error("invalid symbol: {input}")]
    InvalidSymbol { input: String },

    #[error("invalid asset: {input}")]
    InvalidAsset { input: String },

    #[error("account does not exist: {account}")]
    UnknownAccount { account: AccountName },

    #[error("insufficient creditor capacity: requested {requested}, available {available}")]
    InsufficientCapacity { requested: Asset, available: Asset },

    #[error("deferred notification already pending for sender id {sender_id}")]
    DuplicateDeferred { sender_id: u128 },

    #[error("ledger query failed for {account}: {message}")]
    Ledger { account: AccountName, message: String },
}

impl BankError {
    pub(crate) fn arithmetic(reason: impl Into<String>) -> Self {
        BankError::ArithmeticFault {
            reason: reason.into(),
        }
    }
}

pub type BankResult<T> = Result<T, BankError>;
