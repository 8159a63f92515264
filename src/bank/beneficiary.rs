//! Beneficiary resolution from transfer memos.

use crate::chain::{AccountName, IdentityDirectory};
use crate::error::{BankError, BankResult};

/// The account a delegation is for: the memo if it names an existing
/// account, the sender when the memo is empty.
pub fn resolve_beneficiary(
    identity: &dyn IdentityDirectory,
    memo: &str,
    sender: &AccountName,
) -> BankResult<AccountName> {
    let memo = memo.trim();
    if memo.is_empty() {
        return Ok(sender.clone());
    }

    let beneficiary = AccountName::new(memo)?;
    if !identity.exists(&beneficiary) {
        return Err(BankError::UnknownAccount {
            account: beneficiary,
        });
    }
    Ok(beneficiary)
}
