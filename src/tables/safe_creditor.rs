//! Creditors opted into safe delegation.

use crate::chain::AccountName;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SafeCreditorSet {
    members: BTreeSet<AccountName>,
}

impl SafeCreditorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, account: AccountName) -> bool {
        self.members.insert(account)
    }

    pub fn is_safe_creditor(&self, account: &AccountName) -> bool {
        self.members.contains(account)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AccountName> {
        self.members.iter()
    }
}
