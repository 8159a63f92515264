//! Resource plans offered by the bank.

use crate::chain::Asset;
use crate::error::{BankError, BankResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A delegation plan: the CPU and NET stake it grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanRecord {
    pub id: u64,
    pub cpu_cost: Asset,
    pub net_cost: Asset,
    pub is_free: bool,
    pub is_active: bool,
}

impl PlanRecord {
    /// Stake a creditor must hold to serve this plan.
    pub fn required_stake(&self) -> BankResult<Asset> {
        self.cpu_cost.checked_add(&self.net_cost)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanTable {
    plans: BTreeMap<u64, PlanRecord>,
}

impl PlanTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, plan: PlanRecord) {
        self.plans.insert(plan.id, plan);
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlanRecord> {
        self.plans.values()
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    /// Smallest stake required by any active paid plan.
    ///
    /// This is the balance a paid creditor must exceed to stay active.
    pub fn min_paid_stake(&self) -> BankResult<Asset> {
        let mut min: Option<Asset> = None;
        for plan in self.iter().filter(|p| !p.is_free && p.is_active) {
            let required = plan.required_stake()?;
            min = match min {
                Some(current) if current.try_cmp(&required)?.is_le() => Some(current),
                _ => Some(required),
            };
        }
        min.ok_or(BankError::Unconfigured)
    }
}
