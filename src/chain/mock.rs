//! In-memory collaborators for simulation, the CLI and tests.

use super::traits::{
    BalanceSource, Clock, DeferredNotification, IdentityDirectory, Ledger, Scheduler,
};
use super::types::{AccountName, Asset, Symbol};
use crate::error::{BankError, BankResult};
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::{debug, info};

/// Ledger backed by a balance map. Known accounts double as the identity directory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    balances: BTreeMap<AccountName, Asset>,
    accounts: BTreeSet<AccountName>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the balance of `owner`, registering the account if needed.
    pub fn set_balance(&mut self, owner: AccountName, balance: Asset) {
        self.accounts.insert(owner.clone());
        self.balances.insert(owner, balance);
    }

    /// Register an account without a balance row.
    pub fn add_account(&mut self, account: AccountName) {
        self.accounts.insert(account);
    }

    pub fn balances(&self) -> impl Iterator<Item = (&AccountName, &Asset)> {
        self.balances.iter()
    }

    pub fn accounts(&self) -> impl Iterator<Item = &AccountName> {
        self.accounts.iter()
    }
}

impl Ledger for InMemoryLedger {
    fn get_balance(&self, owner: &AccountName, symbol: &Symbol) -> BankResult<Asset> {
        match self.balances.get(owner) {
            Some(balance) if &balance.symbol == symbol => Ok(balance.clone()),
            _ => Ok(Asset::zero(symbol.clone())),
        }
    }
}

impl IdentityDirectory for InMemoryLedger {
    fn exists(&self, account: &AccountName) -> bool {
        self.accounts.contains(account)
    }
}

/// Scheduler queue with replace-by-key semantics.
#[derive(Debug, Default)]
pub struct DeferredQueue {
    pending: BTreeMap<u128, DeferredNotification>,
}

impl DeferredQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn pending(&self) -> impl Iterator<Item = &DeferredNotification> {
        self.pending.values()
    }

    /// Hand every pending notification to the consumer, emptying the queue.
    pub fn drain(&mut self) -> Vec<DeferredNotification> {
        std::mem::take(&mut self.pending).into_values().collect()
    }
}

impl Scheduler for DeferredQueue {
    fn send_batch(&mut self, batch: Vec<DeferredNotification>) -> BankResult<()> {
        let mut staged = BTreeSet::new();
        for notification in &batch {
            let sender_id = notification.sender_id;
            let collides = self.pending.contains_key(&sender_id) || staged.contains(&sender_id);
            if collides && !notification.replace {
                return Err(BankError::DuplicateDeferred { sender_id });
            }
            staged.insert(sender_id);
        }

        for notification in batch {
            let sender_id = notification.sender_id;
            if let Some(previous) = self.pending.insert(sender_id, notification) {
                debug!(
                    sender_id,
                    replaced_account = %previous.notice.account,
                    "Replaced pending deferred notification"
                );
            }
        }
        Ok(())
    }
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock with microsecond resolution.
#[derive(Debug)]
pub struct ManualClock {
    micros: AtomicI64,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            micros: AtomicI64::new(start.timestamp_micros()),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        let step = by.num_microseconds().unwrap_or(i64::MAX);
        self.micros.fetch_add(step, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_micros(self.micros.load(Ordering::SeqCst)).unwrap_or_default()
    }
}

/// Fetch balances for `accounts` from `source` into a ledger snapshot.
pub async fn snapshot_ledger(
    source: &dyn BalanceSource,
    accounts: &[AccountName],
    symbol: &Symbol,
) -> Result<InMemoryLedger> {
    let mut ledger = InMemoryLedger::new();
    for account in accounts {
        let balance = source.fetch_balance(account, symbol).await?;
        debug!(%account, %balance, "Fetched balance");
        ledger.set_balance(account.clone(), balance);
    }
    info!(accounts = accounts.len(), "Ledger snapshot complete");
    Ok(ledger)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::traits::{PermissionLevel, RotationNotice};
    use crate::tables::Pool;
    use async_trait::async_trait;

    fn eos() -> Symbol {
        Symbol::new(4, "EOS").unwrap()
    }

    fn name(s: &str) -> AccountName {
        AccountName::new(s).unwrap()
    }

    fn notification(sender_id: u128, account: &str, replace: bool) -> DeferredNotification {
        DeferredNotification {
            sender_id,
            payer: name("bank"),
            replace,
            authorization: PermissionLevel {
                actor: name("bank"),
                permission: "bankperm".to_string(),
            },
            notice: RotationNotice {
                account: name(account),
                pool: Pool::Free,
            },
            scheduled_at: Utc::now(),
        }
    }

    #[test]
    fn test_ledger_unknown_account_is_zero() {
        let ledger = InMemoryLedger::new();
        let balance = ledger.get_balance(&name("nobody"), &eos()).unwrap();
        assert!(balance.is_zero());
        assert!(!ledger.exists(&name("nobody")));
    }

    #[test]
    fn test_ledger_returns_set_balance() {
        let mut ledger = InMemoryLedger::new();
        ledger.set_balance(name("alice"), Asset::new(50000, eos()));
        assert_eq!(ledger.get_balance(&name("alice"), &eos()).unwrap().amount, 50000);
        assert!(ledger.exists(&name("alice")));
    }

    fn accounts(queue: &DeferredQueue) -> Vec<&str> {
        queue.pending().map(|n| n.notice.account.as_str()).collect()
    }

    #[test]
    fn test_queue_replaces_colliding_key() {
        let mut queue = DeferredQueue::new();
        queue.send_batch(vec![notification(7, "alice", true)]).unwrap();
        queue.send_batch(vec![notification(7, "bob", true)]).unwrap();

        assert_eq!(queue.len(), 1);
        assert_eq!(accounts(&queue), vec!["bob"]);
    }

    #[test]
    fn test_queue_later_entry_in_batch_wins() {
        let mut queue = DeferredQueue::new();
        queue
            .send_batch(vec![notification(7, "alice", true), notification(7, "bob", true)])
            .unwrap();
        assert_eq!(accounts(&queue), vec!["bob"]);
    }

    #[test]
    fn test_queue_rejects_collision_without_replace() {
        let mut queue = DeferredQueue::new();
        queue.send_batch(vec![notification(7, "alice", true)]).unwrap();
        let err = queue
            .send_batch(vec![notification(7, "bob", false)])
            .unwrap_err();
        assert!(matches!(err, BankError::DuplicateDeferred { sender_id: 7 }));
        assert_eq!(accounts(&queue), vec!["alice"]);
    }

    #[test]
    fn test_queue_rejected_batch_queues_nothing() {
        let mut queue = DeferredQueue::new();
        queue.send_batch(vec![notification(7, "alice", true)]).unwrap();

        // First entry is fine on its own, second collides without replace
        let err = queue
            .send_batch(vec![notification(8, "carol", true), notification(7, "bob", false)])
            .unwrap_err();

        assert!(matches!(err, BankError::DuplicateDeferred { sender_id: 7 }));
        assert_eq!(accounts(&queue), vec!["alice"]);
    }

    #[test]
    fn test_queue_rejects_duplicate_within_batch() {
        let mut queue = DeferredQueue::new();
        let err = queue
            .send_batch(vec![notification(9, "alice", true), notification(9, "bob", false)])
            .unwrap_err();
        assert!(matches!(err, BankError::DuplicateDeferred { sender_id: 9 }));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_queue_drain() {
        let mut queue = DeferredQueue::new();
        queue
            .send_batch(vec![notification(1, "alice", true), notification(2, "bob", true)])
            .unwrap();
        assert_eq!(queue.drain().len(), 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_manual_clock_advances() {
        let start = DateTime::from_timestamp(1_600_000_000, 0).unwrap();
        let clock = ManualClock::new(start);
        clock.advance(chrono::Duration::seconds(30));
        assert_eq!(clock.now(), start + chrono::Duration::seconds(30));
    }

    struct FixedSource;

    #[async_trait]
    impl BalanceSource for FixedSource {
        async fn fetch_balance(&self, owner: &AccountName, symbol: &Symbol) -> Result<Asset> {
            Ok(Asset::new(owner.as_str().len() as i64 * 10000, symbol.clone()))
        }
    }

    #[test]
    fn test_snapshot_ledger() {
        let accounts = vec![name("alice"), name("bob")];
        let ledger = tokio_test::block_on(snapshot_ledger(&FixedSource, &accounts, &eos())).unwrap();

        assert_eq!(ledger.get_balance(&name("alice"), &eos()).unwrap().amount, 50000);
        assert_eq!(ledger.get_balance(&name("bob"), &eos()).unwrap().amount, 30000);
    }
}
