//! Splitting a delegation request into per-creditor legs.

use super::matcher::OrderMatcher;
use super::pricing::PricingEngine;
use crate::chain::{AccountName, Asset};
use crate::error::{BankError, BankResult};
use crate::tables::{CreditorRegistry, SafeCreditorSet};
use serde::Serialize;
use tracing::info;

/// One creditor's share of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderLeg {
    pub creditor: AccountName,
    /// Stake this creditor delegates.
    pub amount: Asset,
    /// Share of the order price attributed to this leg.
    pub price: Asset,
    /// Part of `price` credited to the creditor.
    pub income: Asset,
    /// Creditor opted into safe delegation.
    pub is_safe: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderPlan {
    pub to_delegate: Asset,
    pub legs: Vec<OrderLeg>,
    pub total_price: Asset,
}

impl OrderPlan {
    pub fn is_split(&self) -> bool {
        self.legs.len() > 1
    }
}

/// Pick creditors for `to_delegate`: one creditor if any can serve it alone,
/// otherwise a bundle whose combined balance must cover the request.
pub(crate) fn allocate(
    matcher: &OrderMatcher<'_>,
    registry: &mut CreditorRegistry,
    to_delegate: &Asset,
) -> BankResult<Vec<(AccountName, Asset)>> {
    if to_delegate.amount <= 0 {
        return Err(BankError::InvalidAsset {
            input: to_delegate.to_string(),
        });
    }

    if let Some(creditor) = matcher.find_single(registry, to_delegate)? {
        return Ok(vec![(creditor, to_delegate.clone())]);
    }

    let bundle = matcher.find_bundle(registry, to_delegate)?;
    let mut available = Asset::zero(to_delegate.symbol.clone());
    for entry in &bundle {
        available = available.checked_add(&entry.balance)?;
    }
    if available.amount < to_delegate.amount {
        return Err(BankError::InsufficientCapacity {
            requested: to_delegate.clone(),
            available,
        });
    }

    let mut remaining = to_delegate.amount;
    let mut legs = Vec::with_capacity(bundle.len());
    for entry in bundle {
        if remaining == 0 {
            break;
        }
        let take = entry.balance.amount.min(remaining);
        if take <= 0 {
            continue;
        }
        remaining -= take;
        legs.push((entry.account, Asset::new(take, to_delegate.symbol.clone())));
    }
    Ok(legs)
}

/// Price each allocation and attach creditor income.
pub(crate) fn price_legs(
    pricing: &PricingEngine<'_>,
    safe_creditors: &SafeCreditorSet,
    to_delegate: &Asset,
    price: &Asset,
    allocations: Vec<(AccountName, Asset)>,
) -> BankResult<OrderPlan> {
    let mut legs = Vec::with_capacity(allocations.len());
    for (creditor, amount) in allocations {
        let leg_price = pricing.price_for_partial(to_delegate, &amount, price)?;
        let income = pricing.dividend_income(&creditor, &leg_price)?;
        legs.push(OrderLeg {
            is_safe: safe_creditors.is_safe_creditor(&creditor),
            creditor,
            amount,
            price: leg_price,
            income,
        });
    }

    let prices: Vec<Asset> = legs.iter().map(|leg| leg.price.clone()).collect();
    let total_price = pricing.sum(&prices)?;

    info!(
        %to_delegate,
        %price,
        legs = legs.len(),
        %total_price,
        "Planned order"
    );

    Ok(OrderPlan {
        to_delegate: to_delegate.clone(),
        legs,
        total_price,
    })
}
