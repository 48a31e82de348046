use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

//--------------------------------------     FiatAmount      ---------------------------------------------------------
/// An amount in an external currency, held in minor units (cents for USD).
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, Eq, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct FiatAmount(i64);

#[derive(Debug, Clone, Error)]
#[error("Invalid fiat amount: {0}")]
pub struct FiatParseError(String);

impl From<i64> for FiatAmount {
    fn from(cents: i64) -> Self {
        Self(cents)
    }
}

impl FiatAmount {
    pub fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub fn cents(&self) -> i64 {
        self.0
    }

    pub fn checked_mul(&self, quantity: i64) -> Option<Self> {
        self.0.checked_mul(quantity).map(Self)
    }

    /// The amount as a decimal number of major units, as payment providers expect it in their request bodies.
    pub fn as_major_units(&self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl Display for FiatAmount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl FromStr for FiatAmount {
    type Err = FiatParseError;

    /// Parses strings like `"12"`, `"12.5"` or `"12.50"`. More than two decimal places is an error.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (whole, frac) = s.split_once('.').unwrap_or((s, ""));
        if frac.len() > 2 || whole.is_empty() {
            return Err(FiatParseError(s.to_string()));
        }
        let negative = whole.starts_with('-');
        let whole = whole.parse::<i64>().map_err(|e| FiatParseError(format!("{s}: {e}")))?;
        let frac = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().map_err(|e| FiatParseError(format!("{s}: {e}")))? * 10,
            _ => frac.parse::<i64>().map_err(|e| FiatParseError(format!("{s}: {e}")))?,
        };
        whole
            .checked_mul(100)
            .and_then(|w| if negative { w.checked_sub(frac) } else { w.checked_add(frac) })
            .map(Self)
            .ok_or_else(|| FiatParseError(format!("{s} is out of range")))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(FiatAmount::from_cents(1299).to_string(), "12.99");
        assert_eq!(FiatAmount::from_cents(5).to_string(), "0.05");
        assert_eq!(FiatAmount::from_cents(-250).to_string(), "-2.50");
    }

    #[test]
    fn parse() {
        assert_eq!("12".parse::<FiatAmount>().unwrap().cents(), 1200);
        assert_eq!("12.5".parse::<FiatAmount>().unwrap().cents(), 1250);
        assert_eq!("0.07".parse::<FiatAmount>().unwrap().cents(), 7);
        assert!("1.234".parse::<FiatAmount>().is_err());
        assert!("abc".parse::<FiatAmount>().is_err());
    }
}
