//! Token amounts in Winston.
//!
//! Amounts are fixed-point integers (u128) to avoid floating-point errors.
//! 1 AR = 10^12 Winston; the Winston is the smallest denomination.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Sub};

/// Winston per AR.
pub const WINSTON_PER_AR: u128 = 1_000_000_000_000;

/// An amount of the native token, in Winston.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Winston(u128);

impl Winston {
    pub const ZERO: Self = Self(0);

    pub fn new(raw: u128) -> Self {
        Self(raw)
    }

    /// Whole AR converted to Winston.
    pub fn from_ar(ar: u128) -> Self {
        Self(ar * WINSTON_PER_AR)
    }

    pub fn raw(&self) -> u128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Decimal string rendering, as used in transaction signature data.
    pub fn to_decimal(&self) -> String {
        self.0.to_string()
    }

    /// Parse a decimal string, rejecting anything longer than `max_digits`.
    pub fn from_decimal(s: &str, max_digits: usize) -> Option<Self> {
        if s.is_empty() || s.len() > max_digits || !s.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        s.parse::<u128>().ok().map(Self)
    }
}

impl Add for Winston {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Winston {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl Sum for Winston {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, w| Self(acc.0 + w.0))
    }
}

impl fmt::Display for Winston {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} winston", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_ar_scales() {
        assert_eq!(Winston::from_ar(1).raw(), WINSTON_PER_AR);
    }

    #[test]
    fn decimal_roundtrip() {
        let w = Winston::new(123_456_789);
        assert_eq!(Winston::from_decimal(&w.to_decimal(), 21), Some(w));
    }

    #[test]
    fn from_decimal_rejects_oversized_and_garbage() {
        assert_eq!(Winston::from_decimal(&"9".repeat(22), 21), None);
        assert_eq!(Winston::from_decimal("12a4", 21), None);
        assert_eq!(Winston::from_decimal("", 21), None);
    }
}
