//! Bank tables.
//!
//! Each table is an ordered map owned by `BankState`; the bank facade clones
//! the state for every invocation and commits it only on success.

mod creditor;
mod dividend;
mod plan;
mod safe_creditor;

#[cfg(test)]
pub(crate) mod fixtures;

pub use creditor::{CreditorRecord, CreditorRegistry, Pool};
pub use dividend::DividendTable;
pub use plan::{PlanRecord, PlanTable};
pub use safe_creditor::SafeCreditorSet;

/// All tables the bank reads and writes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BankState {
    pub creditors: CreditorRegistry,
    pub plans: PlanTable,
    pub dividends: DividendTable,
    pub safe_creditors: SafeCreditorSet,
}

impl BankState {
    pub fn new() -> Self {
        Self::default()
    }
}
