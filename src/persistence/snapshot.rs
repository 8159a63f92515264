//! JSON snapshot format used to seed and export bank tables.

use crate::chain::{AccountName, Asset, InMemoryLedger};
use crate::tables::{BankState, CreditorRecord, PlanRecord};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DividendEntry {
    pub account: AccountName,
    pub percentage: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceEntry {
    pub account: AccountName,
    pub balance: Asset,
}

/// Flat, serializable view of the bank tables and the mirrored ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankSnapshot {
    #[serde(default)]
    pub creditors: Vec<CreditorRecord>,
    #[serde(default)]
    pub plans: Vec<PlanRecord>,
    #[serde(default)]
    pub dividends: Vec<DividendEntry>,
    #[serde(default)]
    pub safe_creditors: Vec<AccountName>,
    #[serde(default)]
    pub balances: Vec<BalanceEntry>,
    /// Accounts known to exist without a balance row.
    #[serde(default)]
    pub accounts: Vec<AccountName>,
}

impl BankSnapshot {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read snapshot {:?}", path.as_ref()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse snapshot {:?}", path.as_ref()))
    }

    pub fn from_parts(state: &BankState, ledger: &InMemoryLedger) -> Self {
        Self {
            creditors: state.creditors.iter().cloned().collect(),
            plans: state.plans.iter().cloned().collect(),
            dividends: state
                .dividends
                .iter()
                .map(|(account, percentage)| DividendEntry {
                    account: account.clone(),
                    percentage,
                })
                .collect(),
            safe_creditors: state.safe_creditors.iter().cloned().collect(),
            balances: ledger
                .balances()
                .map(|(account, balance)| BalanceEntry {
                    account: account.clone(),
                    balance: balance.clone(),
                })
                .collect(),
            accounts: Vec::new(),
        }
    }

    pub fn into_parts(self) -> (BankState, InMemoryLedger) {
        let mut state = BankState::new();
        for record in self.creditors {
            state.creditors.insert(record);
        }
        for plan in self.plans {
            state.plans.insert(plan);
        }
        for entry in self.dividends {
            state.dividends.insert(entry.account, entry.percentage);
        }
        for account in self.safe_creditors {
            state.safe_creditors.insert(account);
        }

        let mut ledger = InMemoryLedger::new();
        for entry in self.balances {
            ledger.set_balance(entry.account, entry.balance);
        }
        for account in self.accounts {
            ledger.add_account(account);
        }
        (state, ledger)
    }
}
