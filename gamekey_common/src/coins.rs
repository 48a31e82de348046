use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

/// The currency code recorded against orders that were paid from the in-store coin balance.
pub const COIN_CURRENCY_CODE: &str = "GCOIN";

//--------------------------------------       Coins         ---------------------------------------------------------
/// The store's internal balance unit. Coins are indivisible, so this is a plain integer count.
///
/// Ledger entries carry signed amounts (credits are positive, debits negative), which is why the inner value is an
/// `i64` rather than an unsigned type.
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, Eq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Coins(i64);

op!(binary Coins, Add, add);
op!(binary Coins, Sub, sub);
op!(inplace Coins, AddAssign, add_assign);
op!(inplace Coins, SubAssign, sub_assign);
op!(unary Coins, Neg, neg);

impl Sum for Coins {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in coins: {0}")]
pub struct CoinsConversionError(String);

impl From<i64> for Coins {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl TryFrom<u64> for Coins {
    type Error = CoinsConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(CoinsConversionError(format!("Value {value} is too large to convert to Coins")))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl Display for Coins {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} GC", self.0)
    }
}

impl Coins {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Multiplies a unit price by a quantity, returning `None` on overflow.
    pub fn checked_mul(&self, quantity: i64) -> Option<Self> {
        self.0.checked_mul(quantity).map(Self)
    }

    pub fn abs(&self) -> Self {
        Self(self.0.abs())
    }
}
