//! Creditor bank core.
//!
//! Contains the logic behind delegation matching and creditor rotation:
//! - Balance tracking with cache-on-read refresh
//! - Order pricing and dividend income
//! - Single creditor and bundle matching
//! - Active creditor rotation
//!
//! `Bank` runs every operation as one atomic invocation: work happens on a
//! copy of the tables, which replaces the committed state only on success.
//! Deferred notifications reach the scheduler only after success as well.

mod balance;
mod beneficiary;
mod matcher;
mod order;
mod pricing;
mod rotation;

pub use balance::BalanceTracker;
pub use beneficiary::resolve_beneficiary;
pub use matcher::{BundleEntry, OrderMatcher};
pub use order::{OrderLeg, OrderPlan};
pub use pricing::PricingEngine;
pub use rotation::{PoolOutcome, RotationController, RotationReport};

use crate::chain::{
    AccountName, Asset, Clock, DeferredNotification, IdentityDirectory, Ledger, Scheduler, Symbol,
};
use crate::config::BankConfig;
use crate::error::BankResult;
use crate::tables::BankState;
use std::sync::Arc;
use tracing::{debug, warn};

/// Validated bank parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankParams {
    /// Contract account; high half of every deferred delivery key.
    pub code_account: AccountName,
    /// Resource payer attributed to every table write.
    pub ram_payer: AccountName,
    /// Permission the rotation notification is authorized with.
    pub notify_permission: String,
    pub system_symbol: Symbol,
    /// Balance the active free creditor must exceed.
    pub min_free_creditor_balance: Asset,
    /// Income share for creditors without a dividend record.
    pub default_dividend_percentage: u8,
    /// Largest number of creditors one order may be split across.
    pub max_order_splits: usize,
}

impl BankParams {
    pub fn from_config(config: &BankConfig) -> BankResult<Self> {
        let system_symbol: Symbol = config.system_symbol.parse()?;
        let min_free_creditor_balance =
            Asset::from_decimal(config.min_free_creditor_balance, system_symbol.clone())?;

        Ok(Self {
            code_account: config.code_account.parse()?,
            ram_payer: config.ram_payer.parse()?,
            notify_permission: config.notify_permission.clone(),
            system_symbol,
            min_free_creditor_balance,
            default_dividend_percentage: config.default_dividend_percentage.min(100),
            max_order_splits: config.max_order_splits.max(1),
        })
    }
}

/// The bank: tables plus the collaborators each invocation runs against.
pub struct Bank<L, S> {
    params: BankParams,
    state: BankState,
    ledger: L,
    scheduler: S,
    clock: Arc<dyn Clock>,
}

impl<L: Ledger, S: Scheduler> Bank<L, S> {
    pub fn new(
        params: BankParams,
        state: BankState,
        ledger: L,
        scheduler: S,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            params,
            state,
            ledger,
            scheduler,
            clock,
        }
    }

    pub fn params(&self) -> &BankParams {
        &self.params
    }

    pub fn state(&self) -> &BankState {
        &self.state
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut L {
        &mut self.ledger
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    /// Make `account` the only active creditor of its pool.
    pub fn activate(&mut self, account: &AccountName) -> BankResult<()> {
        self.transact("activate", |state, tracker, params, outbox| {
            RotationController::new(tracker, params).activate(&mut state.creditors, account, outbox)
        })
    }

    /// Heartbeat: replace depleted active creditors in both pools.
    pub fn rotate(&mut self) -> BankResult<RotationReport> {
        self.transact("rotate", |state, tracker, params, outbox| {
            RotationController::new(tracker, params).rotate(
                &mut state.creditors,
                &state.plans,
                outbox,
            )
        })
    }

    /// First paid creditor able to serve `amount` alone.
    pub fn find_single(&mut self, amount: &Asset) -> BankResult<Option<AccountName>> {
        self.transact("find_single", |state, tracker, params, _| {
            OrderMatcher::new(tracker, params.max_order_splits)
                .find_single(&mut state.creditors, amount)
        })
    }

    /// Bundle of paid creditors for `amount`; capacity is not checked.
    pub fn find_bundle(&mut self, amount: &Asset) -> BankResult<Vec<BundleEntry>> {
        self.transact("find_bundle", |state, tracker, params, _| {
            OrderMatcher::new(tracker, params.max_order_splits)
                .find_bundle(&mut state.creditors, amount)
        })
    }

    /// Split a delegation of `to_delegate` priced at `price` across creditors.
    pub fn plan_order(&mut self, to_delegate: &Asset, price: &Asset) -> BankResult<OrderPlan> {
        self.transact("plan_order", |state, tracker, params, _| {
            tracker.check_symbol(price)?;
            let matcher = OrderMatcher::new(tracker, params.max_order_splits);
            let allocations = order::allocate(&matcher, &mut state.creditors, to_delegate)?;

            let pricing = PricingEngine::new(
                &state.dividends,
                params.default_dividend_percentage,
                &params.system_symbol,
            );
            order::price_legs(
                &pricing,
                &state.safe_creditors,
                to_delegate,
                price,
                allocations,
            )
        })
    }

    pub fn pricing(&self) -> PricingEngine<'_> {
        PricingEngine::new(
            &self.state.dividends,
            self.params.default_dividend_percentage,
            &self.params.system_symbol,
        )
    }

    pub fn price_for_partial(
        &self,
        total_requested: &Asset,
        partial_requested: &Asset,
        total_price: &Asset,
    ) -> BankResult<Asset> {
        self.pricing()
            .price_for_partial(total_requested, partial_requested, total_price)
    }

    pub fn dividend_income(&self, creditor: &AccountName, price: &Asset) -> BankResult<Asset> {
        self.pricing().dividend_income(creditor, price)
    }

    pub fn is_safe_creditor(&self, account: &AccountName) -> bool {
        self.state.safe_creditors.is_safe_creditor(account)
    }

    /// Run `operation` on a working copy of the tables, committing it and
    /// sending queued notifications only if the operation succeeds.
    fn transact<T, F>(&mut self, operation: &'static str, f: F) -> BankResult<T>
    where
        F: FnOnce(
            &mut BankState,
            &BalanceTracker<'_>,
            &BankParams,
            &mut Vec<DeferredNotification>,
        ) -> BankResult<T>,
    {
        let now = self.clock.now();
        let mut working = self.state.clone();
        let mut outbox = Vec::new();

        let tracker = BalanceTracker::new(
            &self.ledger,
            &self.params.system_symbol,
            &self.params.ram_payer,
            now,
        );
        let value = match f(&mut working, &tracker, &self.params, &mut outbox) {
            Ok(value) => value,
            Err(err) => {
                warn!(operation, error = %err, "Invocation aborted, changes discarded");
                return Err(err);
            }
        };

        if !outbox.is_empty() {
            if let Err(err) = self.scheduler.send_batch(outbox) {
                warn!(operation, error = %err, "Scheduler rejected notifications, changes discarded");
                return Err(err);
            }
        }
        self.state = working;

        debug!(operation, %now, "Invocation committed");
        Ok(value)
    }
}

impl<L: Ledger + IdentityDirectory, S: Scheduler> Bank<L, S> {
    /// Beneficiary named by a transfer memo, or the sender.
    pub fn resolve_beneficiary(&self, memo: &str, sender: &AccountName) -> BankResult<AccountName> {
        resolve_beneficiary(&self.ledger, memo, sender)
    }
}
