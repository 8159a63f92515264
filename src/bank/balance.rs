//! Live balance lookups with cache-on-read refresh of creditor records.

use crate::chain::{AccountName, Asset, Ledger, Symbol};
use crate::error::{BankError, BankResult};
use crate::tables::CreditorRegistry;
use chrono::{DateTime, Utc};
use tracing::debug;

/// Balance access for one invocation.
///
/// Carries the invocation timestamp and the payer attributed to every write.
pub struct BalanceTracker<'a> {
    ledger: &'a dyn Ledger,
    symbol: &'a Symbol,
    payer: &'a AccountName,
    now: DateTime<Utc>,
}

impl<'a> BalanceTracker<'a> {
    pub fn new(
        ledger: &'a dyn Ledger,
        symbol: &'a Symbol,
        payer: &'a AccountName,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            ledger,
            symbol,
            payer,
            now,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn payer(&self) -> &AccountName {
        self.payer
    }

    pub fn zero(&self) -> Asset {
        Asset::zero(self.symbol.clone())
    }

    /// Reject amounts not denominated in the system symbol.
    pub fn check_symbol(&self, asset: &Asset) -> BankResult<()> {
        if &asset.symbol != self.symbol {
            return Err(BankError::SymbolMismatch {
                expected: self.symbol.clone(),
                actual: asset.symbol.clone(),
            });
        }
        Ok(())
    }

    /// Ledger balance of `owner`. No table access.
    pub fn get_balance(&self, owner: &AccountName) -> BankResult<Asset> {
        self.ledger.get_balance(owner, self.symbol)
    }

    /// Ledger balance of `owner`, written back to its creditor record when stale.
    pub fn refresh_balance(
        &self,
        registry: &mut CreditorRegistry,
        owner: &AccountName,
    ) -> BankResult<Asset> {
        let balance = self.get_balance(owner)?;

        let stale = registry
            .find(owner)
            .is_some_and(|record| record.balance != balance);
        if stale {
            registry.modify(owner, self.payer, |record| {
                record.balance = balance.clone();
                record.updated_at = self.now;
            });
            debug!(creditor = %owner, %balance, "Refreshed cached creditor balance");
        }

        Ok(balance)
    }
}
