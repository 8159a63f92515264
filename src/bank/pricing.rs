//! Order pricing and creditor income.

use crate::chain::{AccountName, Asset, Symbol};
use crate::error::{BankError, BankResult};
use crate::tables::DividendTable;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

pub struct PricingEngine<'a> {
    dividends: &'a DividendTable,
    default_percentage: u8,
    symbol: &'a Symbol,
}

impl<'a> PricingEngine<'a> {
    pub fn new(dividends: &'a DividendTable, default_percentage: u8, symbol: &'a Symbol) -> Self {
        Self {
            dividends,
            default_percentage,
            symbol,
        }
    }

    /// Share of `total_price` owed for `partial_requested` out of `total_requested`.
    ///
    /// Computed as `trunc((partial / total) * price)` with the ratio held as a
    /// `Decimal` (28 significant digits). A non-terminating ratio such as 1/3
    /// is rounded before the multiply, so the result can sit one unit below
    /// the exact proportional share but never above it.
    pub fn price_for_partial(
        &self,
        total_requested: &Asset,
        partial_requested: &Asset,
        total_price: &Asset,
    ) -> BankResult<Asset> {
        total_requested.try_cmp(partial_requested)?;
        if total_requested.amount == 0 {
            return Err(BankError::arithmetic("requested total is zero"));
        }

        let ratio = Decimal::from(partial_requested.amount)
            .checked_div(Decimal::from(total_requested.amount))
            .ok_or_else(|| BankError::arithmetic("price ratio out of range"))?;
        let amount = ratio
            .checked_mul(Decimal::from(total_price.amount))
            .and_then(|price| price.trunc().to_i64())
            .ok_or_else(|| BankError::arithmetic("partial price overflow"))?;

        Ok(Asset::new(amount, total_price.symbol.clone()))
    }

    /// Income credited to `creditor` for an order priced at `price`.
    pub fn dividend_income(&self, creditor: &AccountName, price: &Asset) -> BankResult<Asset> {
        let percentage = self
            .dividends
            .get(creditor)
            .unwrap_or(self.default_percentage);
        let amount = price
            .amount
            .checked_mul(i64::from(percentage))
            .ok_or_else(|| BankError::arithmetic("income overflow"))?
            / 100;

        Ok(Asset::new(amount, price.symbol.clone()))
    }

    /// Total of `prices`, all of which must be in the system symbol.
    pub fn sum(&self, prices: &[Asset]) -> BankResult<Asset> {
        prices
            .iter()
            .try_fold(Asset::zero(self.symbol.clone()), |total, price| {
                total.checked_add(price)
            })
    }
}
