//! # Fixed-Point Decimal
//!
//! `SqlDecimal` is a 96-bit signed mantissa with a decimal scale of 0..=28,
//! the value range of `decimal`, `money` and `smallmoney` columns.
//!
//! ## Wire Layout
//!
//! Two little-endian 64-bit words:
//!
//! ```text
//! word 0: bits  0..64  magnitude low 64 bits
//! word 1: bits  0..32  magnitude high 32 bits
//!         bits 48..56  scale
//!         bit  63      sign (1 = negative)
//! ```
//!
//! All other bits of word 1 must be zero. The representation keeps the
//! scale, so `1.0` and `1.00` are distinct values.

use std::fmt;
use std::str::FromStr;

use eyre::{bail, ensure, Result};

use crate::config::{DECIMAL_MAX_MANTISSA, DECIMAL_MAX_SCALE, MONEY_SCALE};
use crate::error::SnapError;

const SCALE_SHIFT: u32 = 48;
const SIGN_BIT: u64 = 1 << 63;
const RESERVED_MASK: u64 = !(0xFFFF_FFFF | (0xFF << SCALE_SHIFT) | SIGN_BIT);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SqlDecimal {
    mantissa: i128,
    scale: u8,
}

impl SqlDecimal {
    pub const ZERO: SqlDecimal = SqlDecimal {
        mantissa: 0,
        scale: 0,
    };

    pub fn new(mantissa: i128, scale: u8) -> Result<Self> {
        ensure!(
            scale <= DECIMAL_MAX_SCALE,
            SnapError::Format(format!(
                "decimal scale {} exceeds maximum {}",
                scale, DECIMAL_MAX_SCALE
            ))
        );
        ensure!(
            mantissa.unsigned_abs() <= DECIMAL_MAX_MANTISSA,
            SnapError::Format(format!("decimal mantissa {} exceeds 96 bits", mantissa))
        );
        Ok(Self { mantissa, scale })
    }

    /// Builds a money value from its integer count of ten-thousandths.
    pub fn money(ten_thousandths: i64) -> Self {
        Self {
            mantissa: ten_thousandths as i128,
            scale: MONEY_SCALE,
        }
    }

    pub fn mantissa(&self) -> i128 {
        self.mantissa
    }

    pub fn scale(&self) -> u8 {
        self.scale
    }

    pub fn is_negative(&self) -> bool {
        self.mantissa < 0
    }

    pub fn to_f64(&self) -> f64 {
        self.mantissa as f64 / 10f64.powi(self.scale as i32)
    }

    pub fn to_words(&self) -> [u64; 2] {
        let magnitude = self.mantissa.unsigned_abs();
        let lo = magnitude as u64;
        let mut hi = ((magnitude >> 64) as u32) as u64;
        hi |= (self.scale as u64) << SCALE_SHIFT;
        if self.mantissa < 0 {
            hi |= SIGN_BIT;
        }
        [lo, hi]
    }

    pub fn from_words(words: [u64; 2]) -> Result<Self> {
        let [lo, hi] = words;
        ensure!(
            hi & RESERVED_MASK == 0,
            SnapError::Format(format!("decimal flag word has reserved bits set: {:#x}", hi))
        );
        let scale = ((hi >> SCALE_SHIFT) & 0xFF) as u8;
        let magnitude = ((hi & 0xFFFF_FFFF) as u128) << 64 | lo as u128;
        let mantissa = if hi & SIGN_BIT != 0 {
            -(magnitude as i128)
        } else {
            magnitude as i128
        };
        Self::new(mantissa, scale)
    }
}

impl From<i64> for SqlDecimal {
    fn from(value: i64) -> Self {
        Self {
            mantissa: value as i128,
            scale: 0,
        }
    }
}

impl fmt::Display for SqlDecimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let magnitude = self.mantissa.unsigned_abs();
        let sign = if self.mantissa < 0 { "-" } else { "" };
        if self.scale == 0 {
            return write!(f, "{}{}", sign, magnitude);
        }
        let divisor = 10u128.pow(self.scale as u32);
        write!(
            f,
            "{}{}.{:0>width$}",
            sign,
            magnitude / divisor,
            magnitude % divisor,
            width = self.scale as usize
        )
    }
}

impl FromStr for SqlDecimal {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let (negative, body) = match trimmed.as_bytes().first() {
            Some(b'-') => (true, &trimmed[1..]),
            Some(b'+') => (false, &trimmed[1..]),
            _ => (false, trimmed),
        };
        let (int_part, frac_part) = match body.split_once('.') {
            Some((i, f)) => (i, f),
            None => (body, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            bail!("invalid decimal literal: '{}'", s);
        }

        let mut magnitude: u128 = 0;
        for c in int_part.chars().chain(frac_part.chars()) {
            let digit = match c.to_digit(10) {
                Some(d) => d as u128,
                None => bail!("invalid decimal literal: '{}'", s),
            };
            magnitude = magnitude
                .checked_mul(10)
                .and_then(|m| m.checked_add(digit))
                .filter(|m| *m <= DECIMAL_MAX_MANTISSA)
                .ok_or_else(|| eyre::eyre!("decimal literal out of range: '{}'", s))?;
        }

        let scale = u8::try_from(frac_part.len())
            .map_err(|_| eyre::eyre!("too many fractional digits in '{}'", s))?;
        let mantissa = if negative {
            -(magnitude as i128)
        } else {
            magnitude as i128
        };
        Self::new(mantissa, scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::snap_error;

    #[test]
    fn words_roundtrip_boundaries() {
        let max = DECIMAL_MAX_MANTISSA as i128;
        let values = [
            SqlDecimal::ZERO,
            SqlDecimal::new(1, 0).unwrap(),
            SqlDecimal::new(-1, 0).unwrap(),
            SqlDecimal::new(max, 0).unwrap(),
            SqlDecimal::new(-max, 0).unwrap(),
            SqlDecimal::new(max, DECIMAL_MAX_SCALE).unwrap(),
            SqlDecimal::new(-123_456_789, 4).unwrap(),
            SqlDecimal::money(i64::MAX),
            SqlDecimal::money(i64::MIN),
        ];

        for value in values {
            let words = value.to_words();
            assert_eq!(SqlDecimal::from_words(words).unwrap(), value);
        }
    }

    #[test]
    fn word_layout() {
        let value = SqlDecimal::new(-5, 2).unwrap();
        let [lo, hi] = value.to_words();
        assert_eq!(lo, 5);
        assert_eq!(hi, SIGN_BIT | (2u64 << SCALE_SHIFT));
    }

    #[test]
    fn from_words_rejects_reserved_bits_and_large_scale() {
        let err = SqlDecimal::from_words([0, 1 << 40]).unwrap_err();
        assert!(matches!(snap_error(&err), Some(SnapError::Format(_))));

        let err = SqlDecimal::from_words([0, 29u64 << SCALE_SHIFT]).unwrap_err();
        assert!(matches!(snap_error(&err), Some(SnapError::Format(_))));
    }

    #[test]
    fn new_rejects_mantissa_over_96_bits() {
        assert!(SqlDecimal::new(1i128 << 96, 0).is_err());
        assert!(SqlDecimal::new(-(1i128 << 96), 0).is_err());
    }

    #[test]
    fn display_formats_scale_and_sign() {
        assert_eq!(SqlDecimal::new(12345, 2).unwrap().to_string(), "123.45");
        assert_eq!(SqlDecimal::new(-5, 1).unwrap().to_string(), "-0.5");
        assert_eq!(SqlDecimal::new(7, 3).unwrap().to_string(), "0.007");
        assert_eq!(SqlDecimal::from(-42).to_string(), "-42");
        assert_eq!(SqlDecimal::money(12_3400).to_string(), "12.3400");
    }

    #[test]
    fn parse_literals() {
        let d: SqlDecimal = "123.45".parse().unwrap();
        assert_eq!((d.mantissa(), d.scale()), (12345, 2));

        let d: SqlDecimal = "-0.007".parse().unwrap();
        assert_eq!((d.mantissa(), d.scale()), (-7, 3));

        let d: SqlDecimal = "+10".parse().unwrap();
        assert_eq!((d.mantissa(), d.scale()), (10, 0));

        assert!("".parse::<SqlDecimal>().is_err());
        assert!("1.2.3".parse::<SqlDecimal>().is_err());
        assert!("abc".parse::<SqlDecimal>().is_err());
        assert!("79228162514264337593543950336".parse::<SqlDecimal>().is_err());
    }

    #[test]
    fn parse_display_agree() {
        for literal in ["0", "1.50", "-99999.0001", "79228162514264337593543950335"] {
            let d: SqlDecimal = literal.parse().unwrap();
            assert_eq!(d.to_string(), literal);
        }
    }

    #[test]
    fn to_f64_applies_scale() {
        assert_eq!(SqlDecimal::new(150, 2).unwrap().to_f64(), 1.5);
        assert_eq!(SqlDecimal::money(-25_000).to_f64(), -2.5);
    }
}
