//! Wallet money amounts.
//!
//! The ledger speaks decimal major units (rupees) on the wire. Internally an
//! amount is a whole number of minor units (paise) so balances compare and
//! subtract exactly.

use crate::error::ValidationError;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Minor units per major unit.
const MINOR_PER_MAJOR: i64 = 100;

/// Decimal places of a minor unit.
const MINOR_DIGITS: u32 = 2;

/// An amount of wallet money, stored in minor units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Money(i64);

impl Money {
    /// Zero.
    pub const ZERO: Self = Self(0);

    /// Create from minor units (paise).
    #[must_use]
    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    /// Create from whole major units (rupees).
    #[must_use]
    pub const fn from_whole(major: i64) -> Self {
        Self(major.saturating_mul(MINOR_PER_MAJOR))
    }

    /// Create from a decimal major-unit value, rounding half away from zero
    /// to the nearest minor unit.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidAmount`] if the value does not fit.
    pub fn from_decimal(major: Decimal) -> Result<Self, ValidationError> {
        let mut minor =
            major.round_dp_with_strategy(MINOR_DIGITS, RoundingStrategy::MidpointAwayFromZero);
        minor.rescale(MINOR_DIGITS);
        i64::try_from(minor.mantissa())
            .map(Self)
            .map_err(|_| ValidationError::InvalidAmount)
    }

    /// Parse user-entered text such as `"100"` or `" 49.5 "`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidAmount`] if the text is not a plain
    /// decimal number.
    pub fn parse(text: &str) -> Result<Self, ValidationError> {
        let major = Decimal::from_str(text.trim()).map_err(|_| ValidationError::InvalidAmount)?;
        Self::from_decimal(major)
    }

    /// Amount in minor units.
    #[must_use]
    pub const fn minor(self) -> i64 {
        self.0
    }

    /// Amount in decimal major units, without trailing zeros.
    #[must_use]
    pub fn to_decimal(self) -> Decimal {
        Decimal::new(self.0, MINOR_DIGITS).normalize()
    }

    /// Whether the amount is strictly greater than zero.
    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Return `self` if it can be charged.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::NonPositiveAmount`] for zero or negative
    /// amounts.
    pub const fn ensure_positive(self) -> Result<Self, ValidationError> {
        if self.is_positive() {
            Ok(self)
        } else {
            Err(ValidationError::NonPositiveAmount)
        }
    }

    /// Checked addition.
    #[must_use]
    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    /// Checked subtraction.
    #[must_use]
    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let per = MINOR_PER_MAJOR.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / per, abs % per)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        rust_decimal::serde::arbitrary_precision::serialize(&self.to_decimal(), serializer)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let major = rust_decimal::serde::arbitrary_precision::deserialize(deserializer)?;
        Self::from_decimal(major).map_err(serde::de::Error::custom)
    }
}
