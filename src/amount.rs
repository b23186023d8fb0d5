//! Amounts in the smallest currency unit
//!
//! Amounts cross every text boundary as decimal strings so no consumer ever
//! routes them through floating point.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::Add;
use std::str::FromStr;

use crate::error::AirgapError;

/// Non-negative integer amount, serialized as a decimal string
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(u128);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn new(value: u128) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u128 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn saturating_sub(self, other: Amount) -> Amount {
        Amount(self.0.saturating_sub(other.0))
    }

    /// Parse a strict decimal string: ASCII digits only, no sign or whitespace
    pub fn parse_decimal(s: &str) -> Result<Self, AirgapError> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AirgapError::malformed(format!(
                "'{}' is not a non-negative decimal integer",
                s
            )));
        }
        s.parse::<u128>()
            .map(Amount)
            .map_err(|e| AirgapError::malformed(format!("'{}': {}", s, e)))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = AirgapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_decimal(s)
    }
}

impl From<u64> for Amount {
    fn from(value: u64) -> Self {
        Amount(value as u128)
    }
}

impl From<u128> for Amount {
    fn from(value: u128) -> Self {
        Amount(value)
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0.saturating_add(rhs.0))
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Amount {
        iter.fold(Amount::ZERO, |acc, a| acc + a)
    }
}

impl<'a> Sum<&'a Amount> for Amount {
    fn sum<I: Iterator<Item = &'a Amount>>(iter: I) -> Amount {
        iter.copied().sum()
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Amount::parse_decimal(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_as_decimal_string() {
        let amount = Amount::new(340_282_366_920_938_463_463_374_607_431_768_211_455);
        let json = serde_json::to_string(&amount).unwrap();
        assert_eq!(json, "\"340282366920938463463374607431768211455\"");
        let back: Amount = serde_json::from_str(&json).unwrap();
        assert_eq!(back, amount);
    }

    #[test]
    fn test_rejects_signed_and_blank_strings() {
        assert!(Amount::parse_decimal("-5").is_err());
        assert!(Amount::parse_decimal("+5").is_err());
        assert!(Amount::parse_decimal(" 5").is_err());
        assert!(Amount::parse_decimal("").is_err());
        assert!(Amount::parse_decimal("1.5").is_err());
        assert_eq!(Amount::parse_decimal("007").unwrap(), Amount::new(7));
    }

    #[test]
    fn test_sum() {
        let total: Amount = [Amount::new(1), Amount::new(2), Amount::new(3)].iter().sum();
        assert_eq!(total, Amount::new(6));
    }
}
