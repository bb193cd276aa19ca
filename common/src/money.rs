use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum MoneyError {
    #[error("amount must be greater than zero")]
    NonPositiveAmount,
    #[error("currency code must be a 3-letter ISO-4217 code, got: {0}")]
    InvalidCurrency(String),
}

/// ISO-4217 three-letter currency code, always stored upper-case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(transparent)]
pub struct Currency(String);

impl Currency {
    pub fn parse(code: &str) -> Result<Self, MoneyError> {
        let upper = code.trim().to_uppercase();
        if upper.len() != 3 || !upper.bytes().all(|b| b.is_ascii_alphabetic()) {
            return Err(MoneyError::InvalidCurrency(code.to_string()));
        }
        Ok(Self(upper))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fixed-point amount paired with its currency.
///
/// Amounts carry 15 integer digits and 4 fractional digits per
/// the transaction data model; validation of the positive-amount
/// invariant is the caller's responsibility (e.g. `Transaction::new`)
/// since `Money` itself is also used to represent deltas internally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    pub amount: Decimal,
    pub currency: Currency,
}

impl Money {
    pub fn new(amount: Decimal, currency: Currency) -> Self {
        Self { amount, currency }
    }

    pub fn is_positive(&self) -> bool {
        self.amount.is_sign_positive() && !self.amount.is_zero()
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_currency() {
        let c = Currency::parse("usd").unwrap();
        assert_eq!(c.as_str(), "USD");
    }

    #[test]
    fn rejects_bad_currency() {
        assert!(Currency::parse("US").is_err());
        assert!(Currency::parse("US1").is_err());
        assert!(Currency::parse("USDD").is_err());
    }

    #[test]
    fn money_positive_check() {
        let m = Money::new(Decimal::new(0, 0), Currency::parse("USD").unwrap());
        assert!(!m.is_positive());
        let m = Money::new(Decimal::new(100, 2), Currency::parse("USD").unwrap());
        assert!(m.is_positive());
    }
}
