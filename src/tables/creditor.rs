//! Creditor table with its secondary orderings.

use crate::chain::{AccountName, Asset};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::warn;

/// Partition a creditor belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pool {
    Free,
    Paid,
}

impl Pool {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pool::Free => "free",
            Pool::Paid => "paid",
        }
    }
}

impl fmt::Display for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for Pool {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Pool::Free),
            "paid" => Ok(Pool::Paid),
            other => anyhow::bail!("unknown pool: {}", other),
        }
    }
}

/// A staking account lending its balance to requesters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditorRecord {
    pub account: AccountName,
    pub pool: Pool,
    /// Cached ledger balance; may lag until the next refresh.
    pub balance: Asset,
    pub is_active: bool,
    pub updated_at: DateTime<Utc>,
    /// Resource payer of the last write.
    pub payer: AccountName,
}

type ActiveKey = (bool, AccountName);
type UpdatedKey = (DateTime<Utc>, AccountName);

/// Creditor records keyed by account, with by-active-flag and
/// by-`updated_at` indices kept in step with every write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreditorRegistry {
    records: BTreeMap<AccountName, CreditorRecord>,
    by_active: BTreeSet<ActiveKey>,
    by_updated: BTreeSet<UpdatedKey>,
}

impl CreditorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Insert or overwrite a record (seeding is done by the storage layer).
    pub fn insert(&mut self, record: CreditorRecord) {
        if let Some(previous) = self.records.remove(&record.account) {
            self.unindex(&previous);
        }
        self.index(&record);
        self.records.insert(record.account.clone(), record);
    }

    pub fn find(&self, account: &AccountName) -> Option<&CreditorRecord> {
        self.records.get(account)
    }

    /// Apply `update` to the record of `account`, re-indexing it.
    ///
    /// Returns `false` when no such record exists, or when `update` changes
    /// the account key; the stored record is then left untouched.
    pub fn modify<F>(&mut self, account: &AccountName, payer: &AccountName, update: F) -> bool
    where
        F: FnOnce(&mut CreditorRecord),
    {
        let Some(current) = self.records.get(account) else {
            return false;
        };
        let mut record = current.clone();
        update(&mut record);
        if &record.account != account {
            warn!(
                %account,
                changed_to = %record.account,
                "Rejected creditor update that changes the account key"
            );
            return false;
        }
        record.payer = payer.clone();

        if let Some(previous) = self.records.remove(account) {
            self.unindex(&previous);
        }
        self.index(&record);
        self.records.insert(account.clone(), record);
        true
    }

    /// Records in primary (account) order.
    pub fn iter(&self) -> impl Iterator<Item = &CreditorRecord> {
        self.records.values()
    }

    /// Records ordered by active flag: inactive first, then active.
    pub fn by_active(&self) -> impl Iterator<Item = &CreditorRecord> {
        self.by_active
            .iter()
            .filter_map(|(_, account)| self.records.get(account))
    }

    /// Records ordered by `updated_at`, oldest first, across both pools.
    pub fn by_updated_at(&self) -> impl Iterator<Item = &CreditorRecord> {
        self.by_updated
            .iter()
            .filter_map(|(_, account)| self.records.get(account))
    }

    /// Records of `pool`, oldest-touched first.
    pub fn oldest_first(&self, pool: Pool) -> impl Iterator<Item = &CreditorRecord> + '_ {
        self.by_updated_at().filter(move |record| record.pool == pool)
    }

    /// The active creditor of `pool`, if any.
    pub fn active_creditor(&self, pool: Pool) -> Option<&AccountName> {
        self.by_active()
            .find(|record| record.is_active && record.pool == pool)
            .map(|record| &record.account)
    }

    /// Accounts of `pool` in primary order.
    pub fn accounts_in(&self, pool: Pool) -> Vec<AccountName> {
        self.iter()
            .filter(|record| record.pool == pool)
            .map(|record| record.account.clone())
            .collect()
    }

    fn index(&mut self, record: &CreditorRecord) {
        self.by_active
            .insert((record.is_active, record.account.clone()));
        self.by_updated
            .insert((record.updated_at, record.account.clone()));
    }

    fn unindex(&mut self, record: &CreditorRecord) {
        self.by_active
            .remove(&(record.is_active, record.account.clone()));
        self.by_updated
            .remove(&(record.updated_at, record.account.clone()));
    }
}
