use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use std::str::FromStr;

/// number of decimal places carried by every amount
pub const MONEY_SCALE: u32 = 2;

/// Money type held at cent precision; deserialized values are rounded like any other input
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(from = "Decimal")]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);
    pub const CENT: Money = Money(Decimal::from_parts(1, 0, 0, false, MONEY_SCALE));

    /// create from decimal, rounding half away from zero to cents
    pub fn from_decimal(d: Decimal) -> Self {
        Money(round_to_cents(d))
    }

    /// create from string with exact parsing
    pub fn from_str_exact(s: &str) -> Result<Self, rust_decimal::Error> {
        Ok(Money::from_decimal(Decimal::from_str(s.trim())?))
    }

    /// parse user input such as "1234.56" or the pt-BR "1.234,56". With a comma
    /// present, dots are thousands separators and the comma is the decimal mark.
    pub fn parse(s: &str) -> crate::errors::Result<Self> {
        let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        let normalized = if compact.contains(',') {
            compact.replace('.', "").replacen(',', ".", 1)
        } else {
            compact
        };
        Money::from_str_exact(&normalized).map_err(|e| crate::errors::BillingError::InvalidPurchaseDetails {
            message: format!("malformed amount {s:?}: {e}"),
        })
    }

    /// create from integer amount (reais, dollars, euros)
    pub fn from_major(amount: i64) -> Self {
        let mut d = Decimal::from(amount);
        d.rescale(MONEY_SCALE);
        Money(d)
    }

    /// create from minor units (cents)
    pub fn from_cents(cents: i64) -> Self {
        Money(Decimal::new(cents, MONEY_SCALE))
    }

    /// amount in minor units
    pub fn to_cents(&self) -> i128 {
        let mut d = self.0;
        d.rescale(MONEY_SCALE);
        d.mantissa()
    }

    /// get underlying decimal
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// strictly greater than zero
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    pub fn min(self, other: Self) -> Self {
        Money(self.0.min(other.0))
    }

    pub fn max(self, other: Self) -> Self {
        Money(self.0.max(other.0))
    }

    /// share of `whole` this amount represents, on a 0-100 scale
    pub fn percent_of(&self, whole: Money) -> Option<Percent> {
        if !whole.is_positive() {
            return None;
        }
        Some(Percent::from_decimal(self.0 / whole.0 * Decimal::ONE_HUNDRED))
    }
}

fn round_to_cents(d: Decimal) -> Decimal {
    let mut rounded =
        d.round_dp_with_strategy(MONEY_SCALE, rust_decimal::RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(MONEY_SCALE);
    rounded
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Money {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Money::from_str_exact(s)
    }
}

impl From<Decimal> for Money {
    fn from(d: Decimal) -> Self {
        Money::from_decimal(d)
    }
}

impl From<i32> for Money {
    fn from(i: i32) -> Self {
        Money::from_major(i as i64)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, other: Money) -> Money {
        Money(round_to_cents(self.0 + other.0))
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, other: Money) {
        self.0 = round_to_cents(self.0 + other.0);
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, other: Money) -> Money {
        Money(round_to_cents(self.0 - other.0))
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, other: Money) {
        self.0 = round_to_cents(self.0 - other.0);
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, x| acc + x)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, x| acc + *x)
    }
}

/// percentage on a 0-100 scale (e.g. 80 for 80%)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct Percent(Decimal);

impl Percent {
    pub const ZERO: Percent = Percent(Decimal::ZERO);
    pub const HUNDRED: Percent = Percent(Decimal::ONE_HUNDRED);

    pub fn from_decimal(d: Decimal) -> Self {
        Percent(d)
    }

    pub fn from_whole(p: u32) -> Self {
        Percent(Decimal::from(p))
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// rounded for display and event payloads
    pub fn round_dp(&self, dp: u32) -> Self {
        Percent(self.0.round_dp(dp))
    }

    pub fn is_within_bounds(&self) -> bool {
        *self >= Percent::ZERO && *self <= Percent::HUNDRED
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0.normalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_money_cent_precision() {
        let m = Money::from_str_exact("100.125").unwrap();
        assert_eq!(m.to_string(), "100.13");

        let m = Money::from_str_exact("0.004").unwrap();
        assert_eq!(m, Money::ZERO);
    }

    #[test]
    fn test_parse_accepts_both_decimal_marks() {
        assert_eq!(Money::parse(" 59.90 ").unwrap(), Money::from_cents(5_990));
        assert_eq!(Money::parse("12,50").unwrap(), Money::from_cents(1_250));
        assert_eq!(Money::parse("1.234,56").unwrap(), Money::from_cents(123_456));
        assert!(Money::parse("R$ 10").is_err());
        assert!(Money::parse("").is_err());
        assert!(Money::parse("12,50,1").is_err());
    }

    #[test]
    fn test_deserialize_rounds_to_cents() {
        let m: Money = serde_json::from_str("\"10.005\"").unwrap();
        assert_eq!(m, Money::from_cents(1_001));
        assert_eq!(m.to_string(), "10.01");

        let tiny: Money = serde_json::from_str("\"0.001\"").unwrap();
        assert!(!tiny.is_positive());
    }

    #[test]
    fn test_from_major_handles_large_amounts() {
        let m = Money::from_major(i64::MAX);
        assert_eq!(m.to_cents(), i64::MAX as i128 * 100);
        assert_eq!(Money::from_major(-3).to_string(), "-3.00");
    }

    #[test]
    fn test_cents_conversion() {
        assert_eq!(Money::from_cents(33_334).to_string(), "333.34");
        assert_eq!(Money::from_major(1_000).to_cents(), 100_000);
        assert_eq!(Money::from_decimal(dec!(12.5)).to_cents(), 1_250);
        assert_eq!(Money::from_cents(5), Money::CENT + Money::from_cents(4));
    }

    #[test]
    fn test_sum_has_no_drift() {
        let parts = vec![Money::from_cents(1); 300];
        let total: Money = parts.iter().sum();
        assert_eq!(total, Money::from_major(3));
    }

    #[test]
    fn test_percent_of() {
        let used = Money::from_major(850);
        let limit = Money::from_major(1_000);
        assert_eq!(used.percent_of(limit), Some(Percent::from_whole(85)));
        assert_eq!(used.percent_of(Money::ZERO), None);
    }

    #[test]
    fn test_percent_bounds_and_display() {
        assert!(Percent::from_whole(80).is_within_bounds());
        assert!(!Percent::from_whole(101).is_within_bounds());
        assert_eq!(Percent::from_decimal(dec!(75.50)).to_string(), "75.5%");
    }
}
