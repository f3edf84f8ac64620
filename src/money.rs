//! Fixed-point money arithmetic.
//!
//! Every monetary amount in the settlement core is an integer count of
//! minor units (cents). Percentages and exchange rates arrive as
//! `rust_decimal::Decimal` values parsed at the configuration or API
//! boundary, so non-finite rates cannot reach the arithmetic here.
//! Rounding is half-up to the minor unit, applied exactly once per
//! multiply or convert.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("amount cannot be negative: {0}")]
    NegativeAmount(String),

    #[error("invalid amount '{amount}': {reason}")]
    InvalidAmount { amount: String, reason: String },

    #[error("invalid rate '{0}': must be a non-negative finite decimal")]
    InvalidRate(String),

    #[error("currency mismatch: {left} vs {right}")]
    CurrencyMismatch { left: Currency, right: Currency },

    #[error("amount overflow")]
    Overflow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Eur,
    Kes,
}

impl Currency {
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Kes => "KES",
        }
    }

    /// Minor units per major unit. All supported currencies use exponent 2.
    pub fn minor_per_major(&self) -> i64 {
        100
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Currency {
    type Err = MoneyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_uppercase().as_str() {
            "USD" => Ok(Currency::Usd),
            "EUR" => Ok(Currency::Eur),
            "KES" => Ok(Currency::Kes),
            other => Err(MoneyError::InvalidAmount {
                amount: other.to_string(),
                reason: "unsupported currency".to_string(),
            }),
        }
    }
}

/// A non-negative amount of money in a single currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Money {
    minor: i64,
    currency: Currency,
}

impl Money {
    pub fn from_minor(minor: i64, currency: Currency) -> Result<Self, MoneyError> {
        if minor < 0 {
            return Err(MoneyError::NegativeAmount(minor.to_string()));
        }
        Ok(Self { minor, currency })
    }

    pub fn zero(currency: Currency) -> Self {
        Self { minor: 0, currency }
    }

    /// Parse a major-unit decimal string like `"108.00"`.
    ///
    /// At most two fraction digits are accepted; the wire format never
    /// carries sub-cent precision.
    pub fn parse(amount: &str, currency: Currency) -> Result<Self, MoneyError> {
        let parsed = Decimal::from_str(amount.trim()).map_err(|e| MoneyError::InvalidAmount {
            amount: amount.to_string(),
            reason: e.to_string(),
        })?;
        if parsed.is_sign_negative() {
            return Err(MoneyError::NegativeAmount(amount.to_string()));
        }
        if parsed.scale() > 2 {
            return Err(MoneyError::InvalidAmount {
                amount: amount.to_string(),
                reason: "more than two fraction digits".to_string(),
            });
        }
        let minor = (parsed * Decimal::from(currency.minor_per_major()))
            .to_i64()
            .ok_or(MoneyError::Overflow)?;
        Self::from_minor(minor, currency)
    }

    pub fn minor(&self) -> i64 {
        self.minor
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    /// Major-unit decimal string, always with two fraction digits.
    pub fn to_decimal_string(&self) -> String {
        format!(
            "{}.{:02}",
            self.minor / self.currency.minor_per_major(),
            self.minor % self.currency.minor_per_major()
        )
    }

    fn ensure_same_currency(&self, other: &Money) -> Result<(), MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch {
                left: self.currency,
                right: other.currency,
            });
        }
        Ok(())
    }

    pub fn checked_add(&self, other: &Money) -> Result<Money, MoneyError> {
        self.ensure_same_currency(other)?;
        let minor = self
            .minor
            .checked_add(other.minor)
            .ok_or(MoneyError::Overflow)?;
        Money::from_minor(minor, self.currency)
    }

    /// Subtraction that refuses to go below zero.
    pub fn checked_sub(&self, other: &Money) -> Result<Money, MoneyError> {
        self.ensure_same_currency(other)?;
        if other.minor > self.minor {
            return Err(MoneyError::NegativeAmount(format!(
                "{} - {}",
                self.to_decimal_string(),
                other.to_decimal_string()
            )));
        }
        Money::from_minor(self.minor - other.minor, self.currency)
    }

    pub fn checked_mul(&self, quantity: u32) -> Result<Money, MoneyError> {
        let minor = self
            .minor
            .checked_mul(i64::from(quantity))
            .ok_or(MoneyError::Overflow)?;
        Money::from_minor(minor, self.currency)
    }

    /// Apply a percentage (e.g. tax, commission, withdrawal fee).
    ///
    /// `percent` is in percent, so `8` means 8%. Rounds half-up to the
    /// minor unit once; callers must not round the result again.
    pub fn multiply_by_rate(&self, percent: Decimal) -> Result<Money, MoneyError> {
        if percent.is_sign_negative() {
            return Err(MoneyError::InvalidRate(percent.to_string()));
        }
        let exact = Decimal::from(self.minor) * percent / Decimal::from(100);
        let rounded = exact.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        let minor = rounded.to_i64().ok_or(MoneyError::Overflow)?;
        Money::from_minor(minor, self.currency)
    }

    /// Convert to another currency at an externally supplied rate
    /// (target units per source unit). Rounds half-up once.
    pub fn convert(&self, to: Currency, rate: Decimal) -> Result<Money, MoneyError> {
        if rate <= Decimal::ZERO {
            return Err(MoneyError::InvalidRate(rate.to_string()));
        }
        let exact = Decimal::from(self.minor) * rate;
        let rounded = exact.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        let minor = rounded.to_i64().ok_or(MoneyError::Overflow)?;
        Money::from_minor(minor, to)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.to_decimal_string(), self.currency)
    }
}

/// Wire form: `{"amount":"108.00","currency":"USD"}`.
#[derive(Serialize, Deserialize)]
struct MoneyRepr {
    amount: String,
    currency: Currency,
}

impl Serialize for Money {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        MoneyRepr {
            amount: self.to_decimal_string(),
            currency: self.currency,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let repr = MoneyRepr::deserialize(deserializer)?;
        Money::parse(&repr.amount, repr.currency).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usd(minor: i64) -> Money {
        Money::from_minor(minor, Currency::Usd).expect("valid amount")
    }

    #[test]
    fn parse_accepts_two_fraction_digits() {
        let m = Money::parse("108.00", Currency::Usd).expect("parse should succeed");
        assert_eq!(m.minor(), 10800);
        assert_eq!(m.to_decimal_string(), "108.00");
    }

    #[test]
    fn parse_rejects_negative_and_subcent() {
        assert!(matches!(
            Money::parse("-1.00", Currency::Usd),
            Err(MoneyError::NegativeAmount(_))
        ));
        assert!(matches!(
            Money::parse("1.005", Currency::Usd),
            Err(MoneyError::InvalidAmount { .. })
        ));
        assert!(Money::parse("not-a-number", Currency::Usd).is_err());
    }

    #[test]
    fn from_minor_rejects_negative() {
        assert!(matches!(
            Money::from_minor(-1, Currency::Usd),
            Err(MoneyError::NegativeAmount(_))
        ));
    }

    #[test]
    fn add_and_sub_keep_currency_discipline() {
        let a = usd(10_000);
        let b = usd(800);
        assert_eq!(a.checked_add(&b).unwrap().minor(), 10_800);
        assert_eq!(a.checked_sub(&b).unwrap().minor(), 9_200);

        let kes = Money::from_minor(100, Currency::Kes).unwrap();
        assert!(matches!(
            a.checked_add(&kes),
            Err(MoneyError::CurrencyMismatch { .. })
        ));
    }

    #[test]
    fn sub_refuses_to_go_negative() {
        assert!(matches!(
            usd(100).checked_sub(&usd(101)),
            Err(MoneyError::NegativeAmount(_))
        ));
    }

    #[test]
    fn rate_rounds_half_up_once() {
        // 8% of 100.00 is exactly 8.00
        assert_eq!(
            usd(10_000).multiply_by_rate(Decimal::from(8)).unwrap().minor(),
            800
        );
        // 2.5% of 100.00 is exactly 2.50
        let fee_rate = Decimal::from_str("2.5").unwrap();
        assert_eq!(usd(10_000).multiply_by_rate(fee_rate).unwrap().minor(), 250);
        // 8% of 0.06 = 0.0048 -> rounds to 0.00; 8% of 0.07 = 0.0056 -> 0.01
        assert_eq!(usd(6).multiply_by_rate(Decimal::from(8)).unwrap().minor(), 0);
        assert_eq!(usd(7).multiply_by_rate(Decimal::from(8)).unwrap().minor(), 1);
        // midpoint goes up: 50% of 0.01 = 0.005 -> 0.01
        assert_eq!(usd(1).multiply_by_rate(Decimal::from(50)).unwrap().minor(), 1);
    }

    #[test]
    fn rate_rejects_negative() {
        assert!(matches!(
            usd(100).multiply_by_rate(Decimal::from(-1)),
            Err(MoneyError::InvalidRate(_))
        ));
    }

    #[test]
    fn convert_applies_external_rate() {
        let total = usd(10_800); // 108.00 USD
        let kes = total.convert(Currency::Kes, Decimal::from(130)).unwrap();
        assert_eq!(kes.currency(), Currency::Kes);
        assert_eq!(kes.minor(), 1_404_000); // 14,040.00 KES
    }

    #[test]
    fn convert_rejects_non_positive_rate() {
        assert!(usd(100).convert(Currency::Kes, Decimal::ZERO).is_err());
        assert!(usd(100).convert(Currency::Kes, Decimal::from(-130)).is_err());
    }

    #[test]
    fn serde_round_trips_wire_form() {
        let m = usd(10_800);
        let json = serde_json::to_value(m).expect("serialize");
        assert_eq!(json["amount"], "108.00");
        assert_eq!(json["currency"], "USD");
        let back: Money = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, m);
    }
}
