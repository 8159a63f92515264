//! Shared builders for table tests.

use super::{CreditorRecord, PlanRecord, Pool};
use crate::chain::{AccountName, Asset, Symbol};
use chrono::{DateTime, Utc};

pub(crate) fn symbol() -> Symbol {
    Symbol::new(4, "EOS").unwrap()
}

pub(crate) fn eos(amount: i64) -> Asset {
    Asset::new(amount, symbol())
}

pub(crate) fn name(s: &str) -> AccountName {
    AccountName::new(s).unwrap()
}

/// A timestamp `secs` seconds after a fixed epoch.
pub(crate) fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_600_000_000 + secs, 0).unwrap()
}

pub(crate) fn creditor(
    account: &str,
    pool: Pool,
    balance: i64,
    is_active: bool,
    updated: i64,
) -> CreditorRecord {
    CreditorRecord {
        account: name(account),
        pool,
        balance: eos(balance),
        is_active,
        updated_at: at(updated),
        payer: name("bank"),
    }
}

pub(crate) fn plan(id: u64, cpu: i64, net: i64, is_free: bool, is_active: bool) -> PlanRecord {
    PlanRecord {
        id,
        cpu_cost: eos(cpu),
        net_cost: eos(net),
        is_free,
        is_active,
    }
}
