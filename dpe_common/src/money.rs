use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const THB_CURRENCY_CODE: &str = "THB";
pub const THB_CURRENCY_CODE_LOWER: &str = "thb";

//--------------------------------------       Money         ---------------------------------------------------------
/// A fixed-point amount of money, denominated in satang (1/100 THB).
///
/// All engine arithmetic happens on the integer satang value, so amounts are exact to two decimal places and never
/// accumulate floating point error. Fractional results (commission splits, per-km fees) are rounded half away from
/// zero at the point they are produced.
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Money(i64);

op!(binary Money, Add, add);
op!(binary Money, Sub, sub);
op!(inplace Money, SubAssign, sub_assign);
op!(unary Money, Neg, neg);

impl Mul<i64> for Money {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self(self.0 * rhs)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in satang: {0}")]
pub struct MoneyConversionError(String);

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl TryFrom<u64> for Money {
    type Error = MoneyConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(MoneyConversionError(format!("Value {} is too large to convert to Money", value)))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let cents = self.0.unsigned_abs();
        write!(f, "{sign}฿{}.{:02}", cents / 100, cents % 100)
    }
}

impl Money {
    pub const ZERO: Money = Money(0);

    /// The amount in satang.
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Whole baht, e.g. `Money::from_baht(20)` is ฿20.00.
    pub fn from_baht(baht: i64) -> Self {
        Self(baht * 100)
    }

    /// Rounds an amount expressed as a float of baht to the nearest satang.
    pub fn from_baht_f64(baht: f64) -> Self {
        Self((baht * 100.0).round() as i64)
    }

    pub fn to_baht_f64(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Clamps negative amounts to zero. Derived balances use this so that they never report a negative figure.
    pub fn max_zero(self) -> Self {
        Self(self.0.max(0))
    }

    /// The given fraction of this amount, rounded half away from zero to the nearest satang.
    /// `rate` is a fraction, not a percentage: 10% commission is `rate = 0.1`.
    pub fn fraction(self, rate: f64) -> Self {
        Self((self.0 as f64 * rate).round() as i64)
    }

    /// Splits this amount into `(commission, remainder)` for the given commission rate.
    ///
    /// The commission is rounded to the nearest satang and the remainder is the exact complement, so the two parts
    /// always sum back to the original amount.
    pub fn commission_split(self, rate: f64) -> (Self, Self) {
        let commission = self.fraction(rate);
        (commission, self - commission)
    }
}
