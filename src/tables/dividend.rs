//! Per-creditor dividend percentages.

use crate::chain::AccountName;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DividendTable {
    percentages: BTreeMap<AccountName, u8>,
}

impl DividendTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the share of order income paid to `account` (clamped to 100).
    pub fn insert(&mut self, account: AccountName, percentage: u8) {
        self.percentages.insert(account, percentage.min(100));
    }

    pub fn get(&self, account: &AccountName) -> Option<u8> {
        self.percentages.get(account).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AccountName, u8)> {
        self.percentages.iter().map(|(account, pct)| (account, *pct))
    }
}
