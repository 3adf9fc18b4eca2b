//! Validated value types shared across CareLink crates.
//!
//! Each type guarantees its invariant once constructed, so downstream code never re-checks
//! emptiness, sign or scale.

use rust_decimal::{Decimal, RoundingStrategy};
use std::fmt;
use std::str::FromStr;

/// Errors that can occur when constructing validated value types.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValueError {
    /// The input text was empty or contained only whitespace
    #[error("text cannot be empty")]
    EmptyText,
    /// A currency amount was negative
    #[error("amount cannot be negative: {0}")]
    NegativeAmount(Decimal),
    /// A percentage fell outside 0..=100
    #[error("percentage must be between 0 and 100, got {0}")]
    PercentageOutOfRange(Decimal),
    /// A decimal string could not be parsed
    #[error("invalid decimal value: {0}")]
    InvalidDecimal(String),
}

/// A string type that guarantees non-empty content.
///
/// The input is trimmed of leading and trailing whitespace during construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText`, returning [`ValueError::EmptyText`] when the trimmed
    /// input is empty.
    pub fn new(input: impl AsRef<str>) -> Result<Self, ValueError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(ValueError::EmptyText);
        }
        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for NonEmptyText {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for NonEmptyText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NonEmptyText::new(&s).map_err(serde::de::Error::custom)
    }
}

/// Rounds to two decimal places, half away from zero (commercial rounding).
pub fn round_currency(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// A non-negative currency amount held at two decimal places.
///
/// No currency code is carried; the platform operates in a single currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// Creates a `Money` value, rounding to two places.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::NegativeAmount`] if `amount` is below zero.
    pub fn new(amount: Decimal) -> Result<Self, ValueError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(ValueError::NegativeAmount(amount));
        }
        Ok(Self(round_currency(amount)))
    }

    /// Whole-unit amount, e.g. `Money::from_units(500)` is 500.00.
    pub fn from_units(units: u32) -> Self {
        Self(Decimal::from(units).round_dp(2))
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Multiplies by a unit count (line totals).
    pub fn times(&self, quantity: u32) -> Money {
        Money(round_currency(self.0 * Decimal::from(quantity)))
    }

    /// `rate` percent of this amount, rounded to two places.
    pub fn percent(&self, rate: Percentage) -> Money {
        Money(round_currency(self.0 * rate.value() / Decimal::ONE_HUNDRED))
    }

    /// Subtracts `other`, saturating at zero.
    pub fn saturating_sub(&self, other: Money) -> Money {
        if other.0 >= self.0 {
            Money::ZERO
        } else {
            Money(self.0 - other.0)
        }
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl FromStr for Money {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value =
            Decimal::from_str(s.trim()).map_err(|_| ValueError::InvalidDecimal(s.to_owned()))?;
        Money::new(value)
    }
}

impl serde::Serialize for Money {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for Money {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = <Decimal as serde::Deserialize>::deserialize(deserializer)?;
        Money::new(value).map_err(serde::de::Error::custom)
    }
}

/// A percentage in the closed range 0..=100, e.g. a hospital's commission rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Percentage(Decimal);

impl Percentage {
    /// # Errors
    ///
    /// Returns [`ValueError::PercentageOutOfRange`] outside 0..=100.
    pub fn new(value: Decimal) -> Result<Self, ValueError> {
        if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED {
            return Err(ValueError::PercentageOutOfRange(value));
        }
        Ok(Self(value))
    }

    /// Clamps `value` into 0..=100. Intended for compile-time defaults.
    pub fn saturating(value: Decimal) -> Self {
        Self(value.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

impl FromStr for Percentage {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value =
            Decimal::from_str(s.trim()).map_err(|_| ValueError::InvalidDecimal(s.to_owned()))?;
        Percentage::new(value)
    }
}

impl serde::Serialize for Percentage {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for Percentage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = <Decimal as serde::Deserialize>::deserialize(deserializer)?;
        Percentage::new(value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_empty_text_trims_input() {
        let text = NonEmptyText::new("  chest pain ").expect("should accept padded text");
        assert_eq!(text.as_str(), "chest pain");
    }

    #[test]
    fn test_non_empty_text_rejects_whitespace() {
        assert_eq!(NonEmptyText::new("   "), Err(ValueError::EmptyText));
    }

    #[test]
    fn test_money_rounds_half_away_from_zero() {
        let money = Money::new(Decimal::new(12345, 3)).expect("positive amount");
        assert_eq!(money.to_string(), "12.35");
    }

    #[test]
    fn test_money_rejects_negative() {
        let err = Money::new(Decimal::new(-1, 0)).expect_err("negative should fail");
        assert!(matches!(err, ValueError::NegativeAmount(_)));
    }

    #[test]
    fn test_money_times_quantity() {
        let unit: Money = "12.50".parse().expect("valid money");
        assert_eq!(unit.times(3).to_string(), "37.50");
    }

    #[test]
    fn test_money_serializes_as_string() {
        let json = serde_json::to_string(&Money::from_units(500)).expect("serialize");
        assert_eq!(json, "\"500.00\"");
        let parsed: Money = serde_json::from_str("\"25.5\"").expect("deserialize");
        assert_eq!(parsed.to_string(), "25.50");
    }

    #[test]
    fn test_money_percent_rounds_to_cents() {
        let fee: Money = "333.33".parse().expect("valid money");
        let rate: Percentage = "7.5".parse().expect("valid rate");
        assert_eq!(fee.percent(rate).to_string(), "25.00");
    }

    #[test]
    fn test_percentage_bounds() {
        assert!(Percentage::new(Decimal::new(5, 0)).is_ok());
        assert!(Percentage::new(Decimal::new(101, 0)).is_err());
        assert!(Percentage::new(Decimal::new(-1, 0)).is_err());
    }

    #[test]
    fn test_money_json_round_trip() {
        let fee: Money = "1250.5".parse().expect("valid money");
        let json = serde_json::to_string(&fee).expect("serialize");
        let back: Money = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, fee);
        assert!(serde_json::from_str::<Money>("\"-3.00\"").is_err());
    }

    #[test]
    fn test_percentage_json_round_trip() {
        let rate: Percentage = "12.5".parse().expect("valid rate");
        let json = serde_json::to_string(&rate).expect("serialize");
        assert_eq!(json, "\"12.5\"");
        let back: Percentage = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, rate);
        assert!(serde_json::from_str::<Percentage>("\"150\"").is_err());
    }
}
