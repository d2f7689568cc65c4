// consensus/math/mod.rs
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MathError {
    #[error("zero denominator")]
    ZeroDenominator,
    #[error("decimal overflow")]
    Overflow,
    #[error("invalid decimal literal")]
    InvalidLiteral,
}

/// Fixed-precision decimal with an explicit not-a-number sentinel.
///
/// NaN means "no opinion": any arithmetic touching a NaN operand yields NaN
/// instead of an error. An operation only fails when both operands carry
/// values and the operation itself is invalid (zero denominator, overflow).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dec(Option<Decimal>);

impl Dec {
    pub const fn nan() -> Self {
        Dec(None)
    }

    pub const fn zero() -> Self {
        Dec(Some(Decimal::ZERO))
    }

    pub const fn one() -> Self {
        Dec(Some(Decimal::ONE))
    }

    /// Exact value `mantissa * 10^(-scale)`, e.g. `Dec::new(5, 2)` is 0.05.
    pub fn new(mantissa: i64, scale: u32) -> Self {
        Dec(Some(Decimal::new(mantissa, scale)))
    }

    pub fn from_int(value: i64) -> Self {
        Dec(Some(Decimal::from(value)))
    }

    pub const fn is_nan(&self) -> bool {
        self.0.is_none()
    }

    pub fn is_zero(&self) -> bool {
        matches!(self.0, Some(d) if d.is_zero())
    }

    pub fn abs(self) -> Self {
        Dec(self.0.map(|d| d.abs()))
    }

    pub fn checked_add(self, rhs: Self) -> Result<Self, MathError> {
        lift(self, rhs, |a, b| a.checked_add(b))
    }

    pub fn checked_sub(self, rhs: Self) -> Result<Self, MathError> {
        lift(self, rhs, |a, b| a.checked_sub(b))
    }

    pub fn checked_mul(self, rhs: Self) -> Result<Self, MathError> {
        lift(self, rhs, |a, b| a.checked_mul(b))
    }

    pub fn checked_div(self, rhs: Self) -> Result<Self, MathError> {
        match (self.0, rhs.0) {
            (Some(_), Some(b)) if b.is_zero() => Err(MathError::ZeroDenominator),
            (Some(a), Some(b)) => a
                .checked_div(b)
                .map(|d| Dec(Some(d)))
                .ok_or(MathError::Overflow),
            _ => Ok(Dec::nan()),
        }
    }

    /// Integer power by repeated multiplication. NaN base yields NaN.
    pub fn powi(self, exp: u64) -> Result<Self, MathError> {
        if self.is_nan() {
            return Ok(Dec::nan());
        }
        let mut acc = Dec::one();
        for _ in 0..exp {
            acc = acc.checked_mul(self)?;
        }
        Ok(acc)
    }

    /// Clamps into `[lo, hi]`. NaN passes through unchanged.
    pub fn clamp(self, lo: Self, hi: Self) -> Self {
        if self.is_nan() {
            return self;
        }
        if self < lo {
            lo
        } else if self > hi {
            hi
        } else {
            self
        }
    }
}

fn lift(
    lhs: Dec,
    rhs: Dec,
    op: impl FnOnce(Decimal, Decimal) -> Option<Decimal>,
) -> Result<Dec, MathError> {
    match (lhs.0, rhs.0) {
        (Some(a), Some(b)) => op(a, b).map(|d| Dec(Some(d))).ok_or(MathError::Overflow),
        _ => Ok(Dec::nan()),
    }
}

impl Default for Dec {
    fn default() -> Self {
        Dec::zero()
    }
}

impl PartialOrd for Dec {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self.0, other.0) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            // Two NaNs compare equal so ordering stays consistent with Eq;
            // NaN against a value is incomparable.
            (None, None) => Some(Ordering::Equal),
            _ => None,
        }
    }
}

impl From<Decimal> for Dec {
    fn from(value: Decimal) -> Self {
        Dec(Some(value))
    }
}

impl FromStr for Dec {
    type Err = MathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("nan") {
            return Ok(Dec::nan());
        }
        Decimal::from_str(s)
            .map(|d| Dec(Some(d)))
            .map_err(|_| MathError::InvalidLiteral)
    }
}

impl fmt::Display for Dec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(d) => write!(f, "{}", d),
            None => write!(f, "NaN"),
        }
    }
}
