//! Paid creditor selection for delegation requests.

use super::balance::BalanceTracker;
use crate::chain::{AccountName, Asset};
use crate::error::BankResult;
use crate::tables::{CreditorRegistry, Pool};
use serde::Serialize;
use tracing::debug;

/// A creditor together with its freshly refreshed balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BundleEntry {
    pub account: AccountName,
    pub balance: Asset,
}

pub struct OrderMatcher<'a> {
    tracker: &'a BalanceTracker<'a>,
    max_order_splits: usize,
}

impl<'a> OrderMatcher<'a> {
    pub fn new(tracker: &'a BalanceTracker<'a>, max_order_splits: usize) -> Self {
        Self {
            tracker,
            max_order_splits,
        }
    }

    /// First paid creditor, in active-flag order, whose balance covers `amount`.
    ///
    /// First fit: the smallest sufficient balance is not sought.
    pub fn find_single(
        &self,
        registry: &mut CreditorRegistry,
        amount: &Asset,
    ) -> BankResult<Option<AccountName>> {
        self.tracker.check_symbol(amount)?;

        let candidates: Vec<AccountName> = registry
            .by_active()
            .filter(|record| record.pool == Pool::Paid)
            .map(|record| record.account.clone())
            .collect();

        for account in candidates {
            let balance = self.tracker.refresh_balance(registry, &account)?;
            if balance.amount >= amount.amount {
                debug!(creditor = %account, %balance, %amount, "Single creditor qualifies");
                return Ok(Some(account));
            }
        }

        Ok(None)
    }

    /// Leftmost window of paid creditors, by ascending balance, covering `amount`.
    ///
    /// Windows start at each creditor in ascending balance order and grow
    /// until they cover `amount` or hold `max_order_splits` creditors. The
    /// first covering window wins. When none covers the amount the last
    /// window tried is returned, so callers must check capacity themselves.
    pub fn find_bundle(
        &self,
        registry: &mut CreditorRegistry,
        amount: &Asset,
    ) -> BankResult<Vec<BundleEntry>> {
        self.tracker.check_symbol(amount)?;

        let mut creditors = Vec::new();
        for account in registry.accounts_in(Pool::Paid) {
            let balance = self.tracker.refresh_balance(registry, &account)?;
            creditors.push(BundleEntry { account, balance });
        }
        creditors.sort_by_key(|entry| entry.balance.amount);

        let target = i128::from(amount.amount);
        let mut window: &[BundleEntry] = &[];
        for start in 0..creditors.len() {
            let mut total = i128::from(creditors[start].balance.amount);
            let mut end = start + 1;
            while total < target && end < creditors.len() && end - start < self.max_order_splits {
                total += i128::from(creditors[end].balance.amount);
                end += 1;
            }

            window = &creditors[start..end];
            if total >= target {
                break;
            }
        }

        let mut bundle = window.to_vec();
        bundle.sort_by_key(|entry| entry.balance.amount);

        debug!(
            %amount,
            candidates = creditors.len(),
            bundle_size = bundle.len(),
            "Selected creditor bundle"
        );
        Ok(bundle)
    }
}
