//! Money in integer minor currency units.
//!
//! All ledger arithmetic happens on `i64` minor units (e.g. cents). Decimal
//! strings only appear at the presentation boundary via
//! [`Money::parse_decimal`] and [`Money::to_decimal_string`].

use core::fmt;
use core::ops::{Add, AddAssign, Sub, SubAssign};

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

/// Largest supported number of fractional digits in a display amount.
pub const MAX_SCALE: u32 = 6;

/// Signed amount in minor currency units.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl ValueObject for Money {}

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    pub const fn minor(self) -> i64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Money)
    }

    /// Split into `parts` shares: `(base, remainder)` with
    /// `base * parts + remainder == self` and `0 <= remainder < parts`.
    ///
    /// Only meaningful for non-negative amounts; returns `None` for
    /// `parts == 0` or a negative amount.
    pub fn split(self, parts: usize) -> Option<(Money, i64)> {
        if parts == 0 || self.0 < 0 {
            return None;
        }
        let n = i64::try_from(parts).ok()?;
        Some((Money(self.0 / n), self.0 % n))
    }

    /// Parse a non-negative decimal string (`"12"`, `"12.5"`, `"12.50"`) into
    /// minor units with `scale` fractional digits.
    pub fn parse_decimal(text: &str, scale: u32) -> DomainResult<Money> {
        if scale > MAX_SCALE {
            return Err(DomainError::validation(format!(
                "unsupported currency scale {scale} (max {MAX_SCALE})"
            )));
        }

        let text = text.trim();
        let (whole, frac) = match text.split_once('.') {
            Some((w, f)) => (w, f),
            None => (text, ""),
        };

        if whole.is_empty() && frac.is_empty() {
            return Err(DomainError::validation("amount cannot be empty"));
        }
        if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit())
        {
            return Err(DomainError::validation(format!("malformed amount '{text}'")));
        }
        if frac.len() > scale as usize {
            return Err(DomainError::validation(format!(
                "amount '{text}' has more than {scale} fractional digits"
            )));
        }

        let factor = 10i64.pow(scale);
        let overflow = || DomainError::validation(format!("amount '{text}' is too large"));

        let whole_units: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| overflow())?
        };
        let mut frac_units: i64 = if frac.is_empty() {
            0
        } else {
            frac.parse().map_err(|_| overflow())?
        };
        for _ in frac.len()..scale as usize {
            frac_units *= 10;
        }

        whole_units
            .checked_mul(factor)
            .and_then(|w| w.checked_add(frac_units))
            .map(Money)
            .ok_or_else(overflow)
    }

    /// Render with `scale` fractional digits (`10000` at scale 2 is `"100.00"`).
    pub fn to_decimal_string(self, scale: u32) -> String {
        let scale = scale.min(MAX_SCALE);
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        if scale == 0 {
            return format!("{sign}{abs}");
        }
        let factor = 10u64.pow(scale);
        format!(
            "{sign}{}.{:0width$}",
            abs / factor,
            abs % factor,
            width = scale as usize
        )
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl core::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parse_decimal_handles_partial_fractions() {
        assert_eq!(Money::parse_decimal("100.00", 2).unwrap(), Money::from_minor(10_000));
        assert_eq!(Money::parse_decimal("12.5", 2).unwrap(), Money::from_minor(1_250));
        assert_eq!(Money::parse_decimal("7", 2).unwrap(), Money::from_minor(700));
        assert_eq!(Money::parse_decimal(".05", 2).unwrap(), Money::from_minor(5));
        assert_eq!(Money::parse_decimal("42", 0).unwrap(), Money::from_minor(42));
    }

    #[test]
    fn parse_decimal_rejects_bad_input() {
        for text in ["", ".", "-1.00", "1.234", "1,00", "abc", "99999999999999999999"] {
            assert!(
                matches!(Money::parse_decimal(text, 2), Err(DomainError::Validation(_))),
                "expected rejection for {text:?}"
            );
        }
        assert!(Money::parse_decimal("1", MAX_SCALE + 1).is_err());
    }

    #[test]
    fn decimal_string_pads_fraction_and_keeps_sign() {
        assert_eq!(Money::from_minor(10_000).to_decimal_string(2), "100.00");
        assert_eq!(Money::from_minor(3_333).to_decimal_string(2), "33.33");
        assert_eq!(Money::from_minor(5).to_decimal_string(2), "0.05");
        assert_eq!(Money::from_minor(-6_666).to_decimal_string(2), "-66.66");
        assert_eq!(Money::from_minor(12).to_decimal_string(0), "12");
    }

    #[test]
    fn extreme_amounts_render_and_overflow_checked() {
        assert_eq!(Money::from_minor(i64::MIN).to_decimal_string(0), i64::MIN.to_string());
        assert_eq!(
            Money::from_minor(i64::MIN).to_decimal_string(2),
            "-92233720368547758.08"
        );
        assert!(Money::from_minor(i64::MAX).checked_add(Money::from_minor(1)).is_none());
        assert!(Money::from_minor(i64::MIN).is_negative());
        assert!(!Money::ZERO.is_negative() && !Money::ZERO.is_positive());
    }

    #[test]
    fn split_yields_base_and_remainder() {
        assert_eq!(Money::from_minor(10_000).split(3), Some((Money::from_minor(3_333), 1)));
        assert_eq!(Money::from_minor(2).split(5), Some((Money::ZERO, 2)));
        assert_eq!(Money::from_minor(10).split(0), None);
        assert_eq!(Money::from_minor(-10).split(2), None);
    }

    proptest! {
        #[test]
        fn split_reassembles_exactly(amount in 0i64..1_000_000_000, parts in 1usize..50) {
            let (base, remainder) = Money::from_minor(amount).split(parts).unwrap();
            prop_assert!(remainder >= 0 && remainder < parts as i64);
            prop_assert_eq!(base.minor() * parts as i64 + remainder, amount);
        }

        #[test]
        fn decimal_string_parses_back(amount in 0i64..1_000_000_000_000) {
            let m = Money::from_minor(amount);
            prop_assert_eq!(Money::parse_decimal(&m.to_decimal_string(2), 2).unwrap(), m);
        }
    }
}
