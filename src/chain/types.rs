//! Chain value types: account names, symbols and assets.

use crate::error::{BankError, BankResult};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Maximum length of an account name.
const MAX_NAME_LEN: usize = 12;

/// Maximum length of a symbol code.
const MAX_SYMBOL_CODE_LEN: usize = 7;

/// Maximum decimal precision of a symbol.
const MAX_PRECISION: u8 = 18;

/// A chain account name (`a-z`, `1-5` and `.`, at most 12 characters).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountName(String);

impl AccountName {
    /// Parse and validate an account name.
    pub fn new(name: impl Into<String>) -> BankResult<Self> {
        let name = name.into();
        let valid = !name.is_empty()
            && name.len() <= MAX_NAME_LEN
            && !name.ends_with('.')
            && name
                .bytes()
                .all(|b| matches!(b, b'a'..=b'z' | b'1'..=b'5' | b'.'));

        if valid {
            Ok(Self(name))
        } else {
            Err(BankError::InvalidAccountName { input: name })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The 64-bit base-32 encoding of the name used in on-chain keys.
    pub fn to_u64(&self) -> u64 {
        let bytes = self.0.as_bytes();
        let mut value = 0u64;
        for i in 0..MAX_NAME_LEN {
            let c = bytes.get(i).map(|&b| char_to_symbol(b)).unwrap_or(0);
            value |= (c & 0x1f) << (64 - 5 * (i + 1));
        }
        value
    }
}

fn char_to_symbol(c: u8) -> u64 {
    match c {
        b'a'..=b'z' => u64::from(c - b'a') + 6,
        b'1'..=b'5' => u64::from(c - b'1') + 1,
        _ => 0,
    }
}

impl fmt::Display for AccountName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AccountName {
    type Err = BankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for AccountName {
    type Error = BankError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AccountName> for String {
    fn from(name: AccountName) -> Self {
        name.0
    }
}

/// Token symbol: decimal precision plus an upper-case code (e.g. `4,EOS`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol {
    precision: u8,
    code: String,
}

impl Symbol {
    pub fn new(precision: u8, code: impl Into<String>) -> BankResult<Self> {
        let code = code.into();
        let valid = precision <= MAX_PRECISION
            && !code.is_empty()
            && code.len() <= MAX_SYMBOL_CODE_LEN
            && code.bytes().all(|b| b.is_ascii_uppercase());

        if valid {
            Ok(Self { precision, code })
        } else {
            Err(BankError::InvalidSymbol {
                input: format!("{},{}", precision, code),
            })
        }
    }

    pub fn precision(&self) -> u8 {
        self.precision
    }

    pub fn code(&self) -> &str {
        &self.code
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.precision, self.code)
    }
}

impl FromStr for Symbol {
    type Err = BankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || BankError::InvalidSymbol {
            input: s.to_string(),
        };
        let (precision, code) = s.split_once(',').ok_or_else(invalid)?;
        let precision: u8 = precision.trim().parse().map_err(|_| invalid())?;
        Self::new(precision, code.trim())
    }
}

impl TryFrom<String> for Symbol {
    type Error = BankError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.to_string()
    }
}

/// An integer token amount in units of `10^-precision`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Asset {
    pub amount: i64,
    pub symbol: Symbol,
}

impl Asset {
    pub fn new(amount: i64, symbol: Symbol) -> Self {
        Self { amount, symbol }
    }

    pub fn zero(symbol: Symbol) -> Self {
        Self::new(0, symbol)
    }

    /// Build an asset from a human amount, e.g. `10.5` with `4,EOS`.
    pub fn from_decimal(value: Decimal, symbol: Symbol) -> BankResult<Self> {
        let invalid = || BankError::InvalidAsset {
            input: format!("{} {}", value, symbol.code()),
        };
        let precision = u32::from(symbol.precision);
        if value.round_dp(precision) != value {
            return Err(invalid());
        }
        let scaled = value
            .checked_mul(Decimal::from(10i64.pow(precision)))
            .ok_or_else(invalid)?;
        let amount = scaled.to_i64().ok_or_else(invalid)?;
        Ok(Self::new(amount, symbol))
    }

    /// Human amount with the symbol's precision.
    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.amount, u32::from(self.symbol.precision))
    }

    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }

    fn ensure_same_symbol(&self, other: &Asset) -> BankResult<()> {
        if self.symbol != other.symbol {
            return Err(BankError::SymbolMismatch {
                expected: self.symbol.clone(),
                actual: other.symbol.clone(),
            });
        }
        Ok(())
    }

    pub fn checked_add(&self, other: &Asset) -> BankResult<Asset> {
        self.ensure_same_symbol(other)?;
        let amount = self
            .amount
            .checked_add(other.amount)
            .ok_or_else(|| BankError::arithmetic("addition overflow"))?;
        Ok(Asset::new(amount, self.symbol.clone()))
    }

    /// Compare amounts, refusing assets of different symbols.
    pub fn try_cmp(&self, other: &Asset) -> BankResult<Ordering> {
        self.ensure_same_symbol(other)?;
        Ok(self.amount.cmp(&other.amount))
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.to_decimal(), self.symbol.code)
    }
}

impl FromStr for Asset {
    type Err = BankError;

    /// Parse `"12.3400 EOS"`; the precision is taken from the decimal places.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || BankError::InvalidAsset {
            input: s.to_string(),
        };
        let (number, code) = s.trim().split_once(' ').ok_or_else(invalid)?;
        let value = Decimal::from_str(number).map_err(|_| invalid())?;
        let precision = u8::try_from(value.scale()).map_err(|_| invalid())?;
        let symbol = Symbol::new(precision, code.trim()).map_err(|_| invalid())?;
        let amount = i64::try_from(value.mantissa()).map_err(|_| invalid())?;
        Ok(Asset::new(amount, symbol))
    }
}

impl TryFrom<String> for Asset {
    type Error = BankError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Asset> for String {
    fn from(asset: Asset) -> Self {
        asset.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn eos() -> Symbol {
        Symbol::new(4, "EOS").unwrap()
    }

    #[test]
    fn test_account_name_validation() {
        assert!(AccountName::new("bankofstaked").is_ok());
        assert!(AccountName::new("eosio.token").is_ok());
        assert!(AccountName::new("").is_err());
        assert!(AccountName::new("UpperCase").is_err());
        assert!(AccountName::new("toolongaccount").is_err());
        assert!(AccountName::new("has6digit").is_err());
        assert!(AccountName::new("trailing.").is_err());
    }

    #[test]
    fn test_account_name_encoding() {
        // Well-known on-chain values
        assert_eq!(AccountName::new("eosio").unwrap().to_u64(), 6138663577826885632);
        assert_eq!(
            AccountName::new("eosio.token").unwrap().to_u64(),
            6138663591592764928
        );
    }

    #[test]
    fn test_encoding_preserves_order() {
        let a = AccountName::new("alice").unwrap();
        let b = AccountName::new("bob").unwrap();
        assert!(a < b);
        assert!(a.to_u64() < b.to_u64());
    }

    #[test]
    fn test_symbol_parse_and_display() {
        let symbol: Symbol = "4,EOS".parse().unwrap();
        assert_eq!(symbol, eos());
        assert_eq!(symbol.to_string(), "4,EOS");
        assert!("EOS".parse::<Symbol>().is_err());
        assert!("4,eos".parse::<Symbol>().is_err());
    }

    #[test]
    fn test_asset_display_keeps_precision() {
        assert_eq!(Asset::new(10000, eos()).to_string(), "1.0000 EOS");
        assert_eq!(Asset::new(123456, eos()).to_string(), "12.3456 EOS");
        assert_eq!(Asset::zero(eos()).to_string(), "0.0000 EOS");
    }

    #[test]
    fn test_asset_parse() {
        let asset: Asset = "12.3400 EOS".parse().unwrap();
        assert_eq!(asset.amount, 123400);
        assert_eq!(asset.symbol, eos());
        assert!("12.34".parse::<Asset>().is_err());
        assert!("abc EOS".parse::<Asset>().is_err());
    }

    #[test]
    fn test_asset_from_decimal() {
        let asset = Asset::from_decimal(dec!(10.5), eos()).unwrap();
        assert_eq!(asset.amount, 105000);
        // Too many decimal places for the symbol
        assert!(Asset::from_decimal(dec!(0.00001), eos()).is_err());
    }

    #[test]
    fn test_checked_add_rejects_symbol_mismatch() {
        let sys = Symbol::new(4, "SYS").unwrap();
        let err = Asset::new(1, eos())
            .checked_add(&Asset::new(1, sys))
            .unwrap_err();
        assert!(matches!(err, BankError::SymbolMismatch { .. }));
    }

    #[test]
    fn test_checked_add_overflow() {
        let err = Asset::new(i64::MAX, eos())
            .checked_add(&Asset::new(1, eos()))
            .unwrap_err();
        assert!(matches!(err, BankError::ArithmeticFault { .. }));
    }
}
