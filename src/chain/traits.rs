//! Interfaces to the collaborators surrounding the bank core.
//!
//! The core never talks to the chain directly. It consumes:
//! - a ledger for live token balances
//! - an identity directory for account existence checks
//! - a scheduler accepting deferred notifications
//! - a clock supplying the invocation timestamp

use super::types::{AccountName, Asset, Symbol};
use crate::error::BankResult;
use crate::tables::Pool;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Synchronous balance lookups against the token ledger.
#[cfg_attr(test, mockall::automock)]
pub trait Ledger {
    /// Balance of `owner` in `symbol`. Accounts without a balance row hold zero.
    fn get_balance(&self, owner: &AccountName, symbol: &Symbol) -> BankResult<Asset>;
}

/// Account existence checks.
pub trait IdentityDirectory {
    fn exists(&self, account: &AccountName) -> bool;
}

/// Source of the invocation timestamp.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Async balance source used to build ledger snapshots (e.g. chain RPC).
#[async_trait]
pub trait BalanceSource: Send + Sync {
    async fn fetch_balance(&self, owner: &AccountName, symbol: &Symbol) -> anyhow::Result<Asset>;
}

/// Permission the deferred action is authorized with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionLevel {
    pub actor: AccountName,
    pub permission: String,
}

/// Payload of the follow-up action sent after every activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationNotice {
    pub account: AccountName,
    pub pool: Pool,
}

/// A deferred notification handed to the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeferredNotification {
    /// Delivery key; a pending notification with the same key may be replaced.
    pub sender_id: u128,
    pub payer: AccountName,
    pub replace: bool,
    pub authorization: PermissionLevel,
    pub notice: RotationNotice,
    pub scheduled_at: DateTime<Utc>,
}

/// Delivery of deferred notifications in later, independent invocations.
pub trait Scheduler {
    /// Queue the notifications staged by one invocation, in order.
    ///
    /// All or nothing: on error none of `batch` is queued. An entry whose key
    /// matches a pending or earlier entry replaces it only if `replace` is set.
    fn send_batch(&mut self, batch: Vec<DeferredNotification>) -> BankResult<()>;
}
