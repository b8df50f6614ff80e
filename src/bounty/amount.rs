//! Fixed-point token amounts with 18 fractional digits.
//!
//! Amounts are held as integer base units (1 token = 10^18 units) so that
//! arithmetic and comparisons never go through floating point. The range
//! matches a `NUMERIC(32,18)` column: at most 14 integer digits.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

pub const TOKEN_DECIMALS: u32 = 18;
pub const BASE_UNIT: u128 = 1_000_000_000_000_000_000;

const MAX_INTEGER_DIGITS: usize = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TokenAmount(u128);

impl TokenAmount {
    pub const ZERO: Self = Self(0);
    /// 10^32 - 1 base units, the largest value a NUMERIC(32,18) column holds.
    pub const MAX: Self = Self(100_000_000_000_000 * BASE_UNIT - 1);

    pub fn from_base_units(units: u128) -> Option<Self> {
        (units <= Self::MAX.0).then_some(Self(units))
    }

    pub fn from_tokens(tokens: u64) -> Option<Self> {
        Self::from_base_units(tokens as u128 * BASE_UNIT)
    }

    pub fn to_base_units(&self) -> u128 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseAmountError(String);

impl fmt::Display for ParseAmountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid token amount: {}", self.0)
    }
}

impl std::error::Error for ParseAmountError {}

impl FromStr for TokenAmount {
    type Err = ParseAmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.starts_with('-') {
            return Err(ParseAmountError(format!("{s} is negative")));
        }
        let s = s.strip_prefix('+').unwrap_or(s);

        let (int_part, frac_part) = match s.split_once('.') {
            Some((i, f)) => (i, f),
            None => (s, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(ParseAmountError("empty value".to_string()));
        }
        if !int_part.chars().all(|c| c.is_ascii_digit())
            || !frac_part.chars().all(|c| c.is_ascii_digit())
        {
            return Err(ParseAmountError(format!("{s} is not a decimal number")));
        }
        if frac_part.len() > TOKEN_DECIMALS as usize {
            return Err(ParseAmountError(format!(
                "{s} has more than {TOKEN_DECIMALS} fractional digits"
            )));
        }

        let int_digits = int_part.trim_start_matches('0');
        if int_digits.len() > MAX_INTEGER_DIGITS {
            return Err(ParseAmountError(format!("{s} is out of range")));
        }

        let whole: u128 = if int_digits.is_empty() {
            0
        } else {
            int_digits
                .parse()
                .map_err(|_| ParseAmountError(format!("{s} is out of range")))?
        };
        let frac: u128 = if frac_part.is_empty() {
            0
        } else {
            let padded = format!("{:0<width$}", frac_part, width = TOKEN_DECIMALS as usize);
            padded
                .parse()
                .map_err(|_| ParseAmountError(format!("{s} is not a decimal number")))?
        };

        whole
            .checked_mul(BASE_UNIT)
            .and_then(|w| w.checked_add(frac))
            .and_then(Self::from_base_units)
            .ok_or_else(|| ParseAmountError(format!("{s} is out of range")))
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / BASE_UNIT;
        let frac = self.0 % BASE_UNIT;
        if frac == 0 {
            return write!(f, "{whole}");
        }
        let frac = format!("{:0>width$}", frac, width = TOKEN_DECIMALS as usize);
        write!(f, "{}.{}", whole, frac.trim_end_matches('0'))
    }
}

impl Serialize for TokenAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

struct TokenAmountVisitor;

impl Visitor<'_> for TokenAmountVisitor {
    type Value = TokenAmount;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a non-negative decimal string or integer")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        v.parse().map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        TokenAmount::from_tokens(v).ok_or_else(|| E::custom(format!("{v} is out of range")))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        u64::try_from(v)
            .map_err(|_| E::custom(format!("{v} is negative")))
            .and_then(|v| self.visit_u64(v))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        // JSON floats are only accepted when their shortest representation is exact
        self.visit_str(&v.to_string())
    }
}

impl<'de> Deserialize<'de> for TokenAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(TokenAmountVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_whole_and_fractional() {
        let amount: TokenAmount = "100".parse().unwrap();
        assert_eq!(amount.to_base_units(), 100 * BASE_UNIT);

        let amount: TokenAmount = "0.000000000000000001".parse().unwrap();
        assert_eq!(amount.to_base_units(), 1);

        let amount: TokenAmount = "12.5".parse().unwrap();
        assert_eq!(amount.to_string(), "12.5");
    }

    #[test]
    fn test_rejects_negative_and_excess_precision() {
        assert!("-1".parse::<TokenAmount>().is_err());
        assert!("1.0000000000000000001".parse::<TokenAmount>().is_err());
        assert!("abc".parse::<TokenAmount>().is_err());
        assert!("".parse::<TokenAmount>().is_err());
        assert!(".".parse::<TokenAmount>().is_err());
    }

    #[test]
    fn test_numeric_column_range() {
        assert!("99999999999999.999999999999999999".parse::<TokenAmount>().is_ok());
        assert!("100000000000000".parse::<TokenAmount>().is_err());
        assert_eq!(
            "99999999999999.999999999999999999".parse::<TokenAmount>().unwrap(),
            TokenAmount::MAX
        );
    }

    #[test]
    fn test_display_trims_trailing_zeros() {
        let amount: TokenAmount = "3.140000".parse().unwrap();
        assert_eq!(amount.to_string(), "3.14");
        assert_eq!(TokenAmount::ZERO.to_string(), "0");
    }

    #[test]
    fn test_json_accepts_strings_and_integers() {
        let from_str: TokenAmount = serde_json::from_str("\"42.5\"").unwrap();
        let from_int: TokenAmount = serde_json::from_str("42").unwrap();
        assert_eq!(from_str.to_string(), "42.5");
        assert_eq!(from_int, TokenAmount::from_tokens(42).unwrap());
        assert!(serde_json::from_str::<TokenAmount>("-3").is_err());
        assert_eq!(serde_json::to_string(&from_str).unwrap(), "\"42.5\"");
    }
}
