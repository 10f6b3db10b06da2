//! # Money — Fixed-Point Amounts
//!
//! [`Amount`] stores a non-negative quantity in minor currency units (cents)
//! and crosses every serialization boundary as a two-decimal string
//! (`"1000.00"`). Fractional payouts computed from fault scores are rounded
//! to the nearest cent, half away from zero, exactly once.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ValidationError;

const MINOR_PER_MAJOR: i64 = 100;

/// A non-negative monetary amount with two decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(i64);

impl Amount {
    /// Zero.
    pub const ZERO: Amount = Amount(0);

    /// Construct from minor units (cents).
    pub fn from_minor(minor: i64) -> Result<Self, ValidationError> {
        if minor < 0 {
            return Err(ValidationError::InvalidAmount(format_minor(minor)));
        }
        Ok(Self(minor))
    }

    /// Construct from whole major units.
    pub fn from_major(major: i64) -> Result<Self, ValidationError> {
        let minor = major
            .checked_mul(MINOR_PER_MAJOR)
            .ok_or_else(|| ValidationError::AmountOverflow {
                operation: "from_major".to_string(),
            })?;
        Self::from_minor(minor)
    }

    /// Parse a decimal string such as `"1000"`, `"1000.5"` or `"1000.00"`.
    ///
    /// More than two fractional digits, signs, exponents and empty parts are
    /// rejected rather than rounded.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::InvalidAmount(s.to_string());
        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        if frac.len() > 2 || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        if s.contains('.') && frac.is_empty() {
            return Err(invalid());
        }
        let major: i64 = whole.parse().map_err(|_| invalid())?;
        let mut cents: i64 = if frac.is_empty() { 0 } else { frac.parse().map_err(|_| invalid())? };
        if frac.len() == 1 {
            cents *= 10;
        }
        major
            .checked_mul(MINOR_PER_MAJOR)
            .and_then(|m| m.checked_add(cents))
            .map(Self)
            .ok_or_else(invalid)
    }

    /// Convert from a float number of major units, rounding to the nearest cent.
    pub fn from_major_f64(value: f64) -> Result<Self, ValidationError> {
        if !value.is_finite() || value < 0.0 {
            return Err(ValidationError::InvalidAmount(value.to_string()));
        }
        let minor = (value * MINOR_PER_MAJOR as f64).round();
        if minor > i64::MAX as f64 {
            return Err(ValidationError::AmountOverflow {
                operation: "from_major_f64".to_string(),
            });
        }
        Ok(Self(minor as i64))
    }

    /// Minor units (cents).
    pub fn minor_units(&self) -> i64 {
        self.0
    }

    /// Value in major units as a float, for heuristics only.
    pub fn as_major_f64(&self) -> f64 {
        self.0 as f64 / MINOR_PER_MAJOR as f64
    }

    /// Whether the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Whether the amount is strictly positive.
    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checked addition.
    pub fn checked_add(self, other: Amount) -> Result<Amount, ValidationError> {
        self.0
            .checked_add(other.0)
            .map(Amount)
            .ok_or_else(|| ValidationError::AmountOverflow {
                operation: "add".to_string(),
            })
    }

    /// Subtraction clamped at zero.
    pub fn saturating_sub(self, other: Amount) -> Amount {
        Amount((self.0 - other.0).max(0))
    }

    /// Multiply by a fraction in `[0, 1]`, rounding to the nearest cent.
    ///
    /// The fraction is clamped first, so the result never exceeds `self`.
    pub fn mul_fraction(self, fraction: f64) -> Amount {
        let f = if fraction.is_nan() { 0.0 } else { fraction.clamp(0.0, 1.0) };
        let minor = (self.0 as f64 * f).round() as i64;
        Amount(minor.clamp(0, self.0))
    }

    /// Two-decimal string form.
    pub fn to_decimal_string(&self) -> String {
        format_minor(self.0)
    }
}

fn format_minor(minor: i64) -> String {
    let sign = if minor < 0 { "-" } else { "" };
    let abs = minor.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_decimal_string())
    }
}

impl std::str::FromStr for Amount {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_decimal_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(AmountVisitor)
    }
}

struct AmountVisitor;

impl<'de> Visitor<'de> for AmountVisitor {
    type Value = Amount;

    fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("a non-negative decimal amount as string or number")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
        Amount::parse(v).map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
        let major = i64::try_from(v).map_err(E::custom)?;
        Amount::from_major(major).map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amount, E> {
        Amount::from_major(v).map_err(E::custom)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Amount, E> {
        Amount::from_major_f64(v).map_err(E::custom)
    }
}
