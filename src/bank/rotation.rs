//! Active creditor rotation.
//!
//! Each pool has exactly one active creditor. `activate` swaps it and queues
//! a follow-up notification; `rotate` is the heartbeat that swaps away from
//! an active creditor whose balance no longer clears the pool threshold.

use super::balance::BalanceTracker;
use super::BankParams;
use crate::chain::{
    AccountName, Asset, DeferredNotification, PermissionLevel, RotationNotice,
};
use crate::error::{BankError, BankResult};
use crate::tables::{CreditorRegistry, PlanTable, Pool};
use serde::Serialize;
use tracing::{debug, info, warn};

/// What a rotation pass did for one pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PoolOutcome {
    /// The active creditor already clears the threshold.
    Healthy { active: AccountName },
    /// A new creditor was activated.
    Rotated {
        from: Option<AccountName>,
        to: AccountName,
    },
    /// No candidate clears the threshold; the current creditor stays.
    Starved { active: Option<AccountName> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RotationReport {
    pub free: PoolOutcome,
    pub paid: PoolOutcome,
}

impl RotationReport {
    pub fn rotated(&self) -> bool {
        matches!(self.free, PoolOutcome::Rotated { .. })
            || matches!(self.paid, PoolOutcome::Rotated { .. })
    }
}

/// Rotation bookkeeping for one pool during a pass.
struct Lane {
    pool: Pool,
    active: Option<AccountName>,
    threshold: Asset,
    satisfied: bool,
    rotated_to: Option<AccountName>,
}

impl Lane {
    fn outcome(self) -> PoolOutcome {
        let satisfied = self.satisfied;
        match (self.rotated_to, self.active) {
            (Some(to), from) => PoolOutcome::Rotated { from, to },
            (None, Some(active)) if satisfied => PoolOutcome::Healthy { active },
            (None, active) => PoolOutcome::Starved { active },
        }
    }
}

pub struct RotationController<'a> {
    tracker: &'a BalanceTracker<'a>,
    params: &'a BankParams,
}

impl<'a> RotationController<'a> {
    pub fn new(tracker: &'a BalanceTracker<'a>, params: &'a BankParams) -> Self {
        Self { tracker, params }
    }

    /// Make `account` the only active creditor of its pool.
    ///
    /// The follow-up notification is pushed onto `outbox`; the caller hands
    /// it to the scheduler once the invocation succeeds.
    pub fn activate(
        &self,
        registry: &mut CreditorRegistry,
        account: &AccountName,
        outbox: &mut Vec<DeferredNotification>,
    ) -> BankResult<()> {
        let pool = registry
            .find(account)
            .map(|record| record.pool)
            .ok_or_else(|| BankError::NotFound {
                account: account.clone(),
            })?;
        let now = self.tracker.now();
        let payer = self.tracker.payer();

        let balance = self.tracker.get_balance(account)?;
        registry.modify(account, payer, |record| {
            record.is_active = true;
            record.balance = balance.clone();
            record.updated_at = now;
        });

        let others: Vec<AccountName> = registry
            .iter()
            .filter(|record| record.pool == pool && record.is_active && &record.account != account)
            .map(|record| record.account.clone())
            .collect();
        for other in &others {
            let balance = self.tracker.get_balance(other)?;
            registry.modify(other, payer, |record| {
                record.is_active = false;
                record.balance = balance.clone();
                record.updated_at = now;
            });
        }

        outbox.push(DeferredNotification {
            sender_id: self.sender_id(),
            payer: payer.clone(),
            replace: true,
            authorization: PermissionLevel {
                actor: self.params.code_account.clone(),
                permission: self.params.notify_permission.clone(),
            },
            notice: RotationNotice {
                account: account.clone(),
                pool,
            },
            scheduled_at: now,
        });

        info!(
            creditor = %account,
            %pool,
            %balance,
            deactivated = others.len(),
            "Activated creditor"
        );
        Ok(())
    }

    /// One heartbeat pass over both pools.
    ///
    /// A missing active paid plan aborts the pass for both pools.
    pub fn rotate(
        &self,
        registry: &mut CreditorRegistry,
        plans: &PlanTable,
        outbox: &mut Vec<DeferredNotification>,
    ) -> BankResult<RotationReport> {
        let free_active = registry.active_creditor(Pool::Free).cloned();
        let paid_active = registry.active_creditor(Pool::Paid).cloned();
        let free_balance = self.refresh_active(registry, free_active.as_ref())?;
        let paid_balance = self.refresh_active(registry, paid_active.as_ref())?;

        let paid_threshold = plans.min_paid_stake()?;
        let mut free = self.lane(
            Pool::Free,
            free_active,
            &free_balance,
            self.params.min_free_creditor_balance.clone(),
        )?;
        let mut paid = self.lane(Pool::Paid, paid_active, &paid_balance, paid_threshold)?;

        if free.satisfied && paid.satisfied {
            debug!("Both pools healthy, nothing to rotate");
            return Ok(RotationReport {
                free: free.outcome(),
                paid: paid.outcome(),
            });
        }

        let candidates: Vec<(AccountName, Pool)> = registry
            .by_updated_at()
            .map(|record| (record.account.clone(), record.pool))
            .collect();

        for (account, pool) in candidates {
            let lane = match pool {
                Pool::Free => &mut free,
                Pool::Paid => &mut paid,
            };
            if lane.satisfied {
                continue;
            }

            let balance = self.tracker.refresh_balance(registry, &account)?;
            let is_current = lane.active.as_ref() == Some(&account);
            if !is_current && balance.try_cmp(&lane.threshold)?.is_gt() {
                self.activate(registry, &account, outbox)?;
                lane.satisfied = true;
                lane.rotated_to = Some(account);
            }
        }

        for lane in [&free, &paid] {
            if !lane.satisfied {
                warn!(
                    pool = %lane.pool,
                    active = ?lane.active.as_ref().map(AccountName::as_str),
                    threshold = %lane.threshold,
                    "No creditor clears the pool threshold"
                );
            }
        }

        Ok(RotationReport {
            free: free.outcome(),
            paid: paid.outcome(),
        })
    }

    fn refresh_active(
        &self,
        registry: &mut CreditorRegistry,
        active: Option<&AccountName>,
    ) -> BankResult<Asset> {
        match active {
            Some(account) => self.tracker.refresh_balance(registry, account),
            None => Ok(self.tracker.zero()),
        }
    }

    fn lane(
        &self,
        pool: Pool,
        active: Option<AccountName>,
        balance: &Asset,
        threshold: Asset,
    ) -> BankResult<Lane> {
        let satisfied = active.is_some() && balance.try_cmp(&threshold)?.is_gt();
        Ok(Lane {
            pool,
            active,
            threshold,
            satisfied,
            rotated_to: None,
        })
    }

    /// Delivery key: contract account in the high 64 bits, invocation time
    /// in microseconds in the low 64 bits.
    fn sender_id(&self) -> u128 {
        let micros = u64::try_from(self.tracker.now().timestamp_micros()).unwrap_or(0);
        (u128::from(self.params.code_account.to_u64()) << 64) | u128::from(micros)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::InMemoryLedger;
    use crate::tables::fixtures::{at, creditor, eos, name, plan, symbol};
    use crate::tables::{BankState, CreditorRecord};

    fn params() -> BankParams {
        BankParams {
            code_account: name("bankofstaked"),
            ram_payer: name("bankofstaked"),
            notify_permission: "bankperm".to_string(),
            system_symbol: symbol(),
            min_free_creditor_balance: eos(1000),
            default_dividend_percentage: 50,
            max_order_splits: 3,
        }
    }

    fn ledger_for(state: &BankState) -> InMemoryLedger {
        let mut ledger = InMemoryLedger::new();
        for record in state.creditors.iter() {
            ledger.set_balance(record.account.clone(), record.balance.clone());
        }
        ledger
    }

    fn state(records: Vec<CreditorRecord>) -> BankState {
        let mut state = BankState::new();
        for record in records {
            state.creditors.insert(record);
        }
        state.plans.insert(plan(1, 400, 100, false, true)); // paid threshold 500
        state
    }

    fn active_in(registry: &CreditorRegistry, pool: Pool) -> Vec<&str> {
        registry
            .iter()
            .filter(|r| r.pool == pool && r.is_active)
            .map(|r| r.account.as_str())
            .collect()
    }

    #[test]
    fn test_activate_leaves_single_active_and_other_pool_untouched() {
        let mut state = state(vec![
            creditor("alice", Pool::Free, 5000, true, 0),
            creditor("bob", Pool::Free, 5000, false, 0),
            creditor("carol", Pool::Paid, 5000, true, 0),
            creditor("dave", Pool::Paid, 5000, false, 0),
        ]);
        let ledger = ledger_for(&state);
        let params = params();
        let tracker = BalanceTracker::new(&ledger, &params.system_symbol, &params.ram_payer, at(10));
        let controller = RotationController::new(&tracker, &params);
        let paid_before: Vec<_> = state
            .creditors
            .iter()
            .filter(|r| r.pool == Pool::Paid)
            .cloned()
            .collect();

        let mut outbox = Vec::new();
        controller
            .activate(&mut state.creditors, &name("bob"), &mut outbox)
            .unwrap();

        assert_eq!(active_in(&state.creditors, Pool::Free), vec!["bob"]);
        let paid_after: Vec<_> = state
            .creditors
            .iter()
            .filter(|r| r.pool == Pool::Paid)
            .cloned()
            .collect();
        assert_eq!(paid_before, paid_after);

        let alice = state.creditors.find(&name("alice")).unwrap();
        assert_eq!(alice.updated_at, at(10));
        let bob = state.creditors.find(&name("bob")).unwrap();
        assert_eq!(bob.updated_at, at(10));
    }

    #[test]
    fn test_activate_queues_one_notification() {
        let mut state = state(vec![
            creditor("alice", Pool::Free, 5000, true, 0),
            creditor("bob", Pool::Free, 5000, false, 0),
        ]);
        let ledger = ledger_for(&state);
        let params = params();
        let tracker = BalanceTracker::new(&ledger, &params.system_symbol, &params.ram_payer, at(10));
        let controller = RotationController::new(&tracker, &params);

        let mut outbox = Vec::new();
        controller
            .activate(&mut state.creditors, &name("bob"), &mut outbox)
            .unwrap();

        assert_eq!(outbox.len(), 1);
        let sent = &outbox[0];
        assert_eq!(sent.notice.account, name("bob"));
        assert_eq!(sent.notice.pool, Pool::Free);
        assert!(sent.replace);
        assert_eq!(sent.authorization.permission, "bankperm");
        assert_eq!((sent.sender_id >> 64) as u64, name("bankofstaked").to_u64());
        assert_eq!(sent.sender_id as u64, at(10).timestamp_micros() as u64);
    }

    #[test]
    fn test_activate_refreshes_balances() {
        let mut state = state(vec![
            creditor("alice", Pool::Free, 5000, true, 0),
            creditor("bob", Pool::Free, 5000, false, 0),
        ]);
        let mut ledger = ledger_for(&state);
        ledger.set_balance(name("alice"), eos(10));
        ledger.set_balance(name("bob"), eos(7777));
        let params = params();
        let tracker = BalanceTracker::new(&ledger, &params.system_symbol, &params.ram_payer, at(10));
        let controller = RotationController::new(&tracker, &params);

        controller
            .activate(&mut state.creditors, &name("bob"), &mut Vec::new())
            .unwrap();

        assert_eq!(state.creditors.find(&name("alice")).unwrap().balance, eos(10));
        assert_eq!(state.creditors.find(&name("bob")).unwrap().balance, eos(7777));
    }

    #[test]
    fn test_activate_unknown_account() {
        let mut state = state(vec![creditor("alice", Pool::Free, 5000, true, 0)]);
        let before = state.clone();
        let ledger = ledger_for(&state);
        let params = params();
        let tracker = BalanceTracker::new(&ledger, &params.system_symbol, &params.ram_payer, at(10));
        let controller = RotationController::new(&tracker, &params);

        let mut outbox = Vec::new();
        let err = controller
            .activate(&mut state.creditors, &name("ghost"), &mut outbox)
            .unwrap_err();

        assert!(matches!(err, BankError::NotFound { .. }));
        assert_eq!(state, before);
        assert!(outbox.is_empty());
    }

    #[test]
    fn test_rotate_noop_when_healthy() {
        let mut state = state(vec![
            creditor("alice", Pool::Free, 5000, true, 0),
            creditor("bob", Pool::Free, 5000, false, 0),
            creditor("carol", Pool::Paid, 5000, true, 0),
            creditor("dave", Pool::Paid, 5000, false, 0),
        ]);
        let before = state.clone();
        let ledger = ledger_for(&state);
        let params = params();
        let tracker = BalanceTracker::new(&ledger, &params.system_symbol, &params.ram_payer, at(10));
        let controller = RotationController::new(&tracker, &params);

        let mut outbox = Vec::new();
        let report = controller
            .rotate(&mut state.creditors, &state.plans, &mut outbox)
            .unwrap();

        assert_eq!(state, before);
        assert!(outbox.is_empty());
        assert!(!report.rotated());
        assert_eq!(report.free, PoolOutcome::Healthy { active: name("alice") });
    }

    #[test]
    fn test_rotate_swaps_depleted_free_creditor() {
        let mut state = state(vec![
            creditor("alice", Pool::Free, 5000, true, 0),
            creditor("bob", Pool::Free, 500, false, 1),
            creditor("carol", Pool::Free, 3000, false, 2),
            creditor("dave", Pool::Paid, 5000, true, 0),
        ]);
        let mut ledger = ledger_for(&state);
        ledger.set_balance(name("alice"), eos(20));
        let params = params();
        let tracker = BalanceTracker::new(&ledger, &params.system_symbol, &params.ram_payer, at(10));
        let controller = RotationController::new(&tracker, &params);

        let mut outbox = Vec::new();
        let report = controller
            .rotate(&mut state.creditors, &state.plans, &mut outbox)
            .unwrap();

        assert_eq!(
            report.free,
            PoolOutcome::Rotated {
                from: Some(name("alice")),
                to: name("carol")
            }
        );
        assert_eq!(report.paid, PoolOutcome::Healthy { active: name("dave") });
        assert_eq!(active_in(&state.creditors, Pool::Free), vec!["carol"]);
        assert_eq!(active_in(&state.creditors, Pool::Paid), vec!["dave"]);
        assert_eq!(outbox.len(), 1);
    }

    #[test]
    fn test_rotate_prefers_oldest_qualifying_candidate() {
        let mut state = state(vec![
            creditor("alice", Pool::Paid, 100, true, 0),
            creditor("bob", Pool::Paid, 9000, false, 30),
            creditor("carol", Pool::Paid, 9000, false, 20),
            creditor("zed", Pool::Free, 5000, true, 0),
        ]);
        let ledger = ledger_for(&state);
        let params = params();
        let tracker = BalanceTracker::new(&ledger, &params.system_symbol, &params.ram_payer, at(100));
        let controller = RotationController::new(&tracker, &params);

        let report = controller
            .rotate(&mut state.creditors, &state.plans, &mut Vec::new())
            .unwrap();

        assert_eq!(
            report.paid,
            PoolOutcome::Rotated {
                from: Some(name("alice")),
                to: name("carol")
            }
        );
    }

    #[test]
    fn test_rotate_both_pools_in_one_pass() {
        let mut state = state(vec![
            creditor("alice", Pool::Free, 10, true, 0),
            creditor("bob", Pool::Free, 2000, false, 1),
            creditor("carol", Pool::Paid, 10, true, 0),
            creditor("dave", Pool::Paid, 2000, false, 2),
        ]);
        let ledger = ledger_for(&state);
        let params = params();
        let tracker = BalanceTracker::new(&ledger, &params.system_symbol, &params.ram_payer, at(10));
        let controller = RotationController::new(&tracker, &params);

        let mut outbox = Vec::new();
        let report = controller
            .rotate(&mut state.creditors, &state.plans, &mut outbox)
            .unwrap();

        assert!(matches!(report.free, PoolOutcome::Rotated { .. }));
        assert!(matches!(report.paid, PoolOutcome::Rotated { .. }));
        assert_eq!(active_in(&state.creditors, Pool::Free), vec!["bob"]);
        assert_eq!(active_in(&state.creditors, Pool::Paid), vec!["dave"]);
        // Same invocation time, so both notifications share a delivery key
        assert_eq!(outbox.len(), 2);
        assert_eq!(outbox[0].sender_id, outbox[1].sender_id);
    }

    #[test]
    fn test_rotate_starved_pool_keeps_active() {
        let mut state = state(vec![
            creditor("alice", Pool::Free, 10, true, 0),
            creditor("bob", Pool::Free, 20, false, 1),
            creditor("carol", Pool::Paid, 5000, true, 0),
        ]);
        let ledger = ledger_for(&state);
        let params = params();
        let tracker = BalanceTracker::new(&ledger, &params.system_symbol, &params.ram_payer, at(10));
        let controller = RotationController::new(&tracker, &params);

        let report = controller
            .rotate(&mut state.creditors, &state.plans, &mut Vec::new())
            .unwrap();

        assert_eq!(report.free, PoolOutcome::Starved { active: Some(name("alice")) });
        assert_eq!(active_in(&state.creditors, Pool::Free), vec!["alice"]);
    }

    #[test]
    fn test_rotate_threshold_is_strict() {
        // Balance equal to the threshold does not clear it
        let mut state = state(vec![
            creditor("alice", Pool::Free, 5000, true, 0),
            creditor("carol", Pool::Paid, 500, true, 0),
            creditor("dave", Pool::Paid, 500, false, 1),
        ]);
        let ledger = ledger_for(&state);
        let params = params();
        let tracker = BalanceTracker::new(&ledger, &params.system_symbol, &params.ram_payer, at(10));
        let controller = RotationController::new(&tracker, &params);

        let report = controller
            .rotate(&mut state.creditors, &state.plans, &mut Vec::new())
            .unwrap();

        assert_eq!(report.paid, PoolOutcome::Starved { active: Some(name("carol")) });
    }

    #[test]
    fn test_rotate_without_active_creditor() {
        let mut state = state(vec![
            creditor("alice", Pool::Free, 5000, false, 0),
            creditor("carol", Pool::Paid, 5000, true, 0),
        ]);
        let ledger = ledger_for(&state);
        let params = params();
        let tracker = BalanceTracker::new(&ledger, &params.system_symbol, &params.ram_payer, at(10));
        let controller = RotationController::new(&tracker, &params);

        let report = controller
            .rotate(&mut state.creditors, &state.plans, &mut Vec::new())
            .unwrap();

        assert_eq!(
            report.free,
            PoolOutcome::Rotated {
                from: None,
                to: name("alice")
            }
        );
    }

    #[test]
    fn test_rotate_unconfigured_plans() {
        let mut state = state(vec![
            creditor("alice", Pool::Free, 10, true, 0),
            creditor("bob", Pool::Free, 5000, false, 1),
        ]);
        state.plans = PlanTable::new();
        let ledger = ledger_for(&state);
        let params = params();
        let tracker = BalanceTracker::new(&ledger, &params.system_symbol, &params.ram_payer, at(10));
        let controller = RotationController::new(&tracker, &params);

        let err = controller
            .rotate(&mut state.creditors, &state.plans, &mut Vec::new())
            .unwrap_err();

        assert_eq!(err, BankError::Unconfigured);
    }
}
