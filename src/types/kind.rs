//! # Value Kinds
//!
//! `ValueKind` is the closed set of database value types a snapshot can carry.
//! Discriminants follow the classic SQL type numbering, so a kind survives the
//! trip through a column's flag byte unchanged.
//!
//! ## Type Categories
//!
//! | Category | Kinds | Payload |
//! |----------|-------|---------|
//! | **Boolean** | Bit | 1 byte |
//! | **Integer** | TinyInt, SmallInt, Int, BigInt | 1 byte, 2 bytes, varint, varint |
//! | **Float** | Real, Float | 4, 8 bytes |
//! | **Fixed-point** | Decimal, Money, SmallMoney | 16 bytes |
//! | **Date/Time** | DateTime, SmallDateTime, DateTime2, Date, Time, DateTimeOffset | varint ticks (+2 bytes offset) |
//! | **Identifier** | UniqueIdentifier | 16 bytes |
//! | **Binary** | Binary, VarBinary, Image, Timestamp | length-prefixed |
//! | **ANSI text** | Char, VarChar, Text | collation + length-prefixed code page bytes |
//! | **Unicode text** | NChar, NVarChar, NText | collation + length-prefixed UTF-16LE |
//! | **Document** | Xml | length-prefixed UTF-8 |
//! | **User-defined** | Udt | discriminator + payload |
//! | **Unsupported** | Variant, Structured | not implemented |
//!
//! ## Usage
//!
//! ```ignore
//! use sqlsnap::types::ValueKind;
//!
//! let kind = ValueKind::try_from(8)?;
//! assert_eq!(kind, ValueKind::Int);
//! assert!(kind.is_integer());
//! ```

use crate::config::MAX_KIND_DISCRIMINANT;
use crate::error::SnapError;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueKind {
    BigInt = 0,
    Binary = 1,
    Bit = 2,
    Char = 3,
    DateTime = 4,
    Decimal = 5,
    Float = 6,
    Image = 7,
    Int = 8,
    Money = 9,
    NChar = 10,
    NText = 11,
    NVarChar = 12,
    Real = 13,
    UniqueIdentifier = 14,
    SmallDateTime = 15,
    SmallInt = 16,
    SmallMoney = 17,
    Text = 18,
    Timestamp = 19,
    TinyInt = 20,
    VarBinary = 21,
    VarChar = 22,
    Variant = 23,
    Xml = 25,
    Udt = 29,
    Structured = 30,
    Date = 31,
    Time = 32,
    DateTime2 = 33,
    DateTimeOffset = 34,
}

impl ValueKind {
    pub const ALL: [ValueKind; 31] = [
        ValueKind::BigInt,
        ValueKind::Binary,
        ValueKind::Bit,
        ValueKind::Char,
        ValueKind::DateTime,
        ValueKind::Decimal,
        ValueKind::Float,
        ValueKind::Image,
        ValueKind::Int,
        ValueKind::Money,
        ValueKind::NChar,
        ValueKind::NText,
        ValueKind::NVarChar,
        ValueKind::Real,
        ValueKind::UniqueIdentifier,
        ValueKind::SmallDateTime,
        ValueKind::SmallInt,
        ValueKind::SmallMoney,
        ValueKind::Text,
        ValueKind::Timestamp,
        ValueKind::TinyInt,
        ValueKind::VarBinary,
        ValueKind::VarChar,
        ValueKind::Variant,
        ValueKind::Xml,
        ValueKind::Udt,
        ValueKind::Structured,
        ValueKind::Date,
        ValueKind::Time,
        ValueKind::DateTime2,
        ValueKind::DateTimeOffset,
    ];

    pub fn discriminant(self) -> u8 {
        self as u8
    }

    /// Returns false for kinds whose codecs raise `NotImplemented`.
    pub fn is_implemented(self) -> bool {
        !matches!(self, ValueKind::Variant | ValueKind::Structured)
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            ValueKind::TinyInt | ValueKind::SmallInt | ValueKind::Int | ValueKind::BigInt
        )
    }

    pub fn is_fixed_point(self) -> bool {
        matches!(
            self,
            ValueKind::Decimal | ValueKind::Money | ValueKind::SmallMoney
        )
    }

    pub fn is_datetime(self) -> bool {
        matches!(
            self,
            ValueKind::DateTime
                | ValueKind::SmallDateTime
                | ValueKind::DateTime2
                | ValueKind::Date
                | ValueKind::Time
                | ValueKind::DateTimeOffset
        )
    }

    pub fn is_binary(self) -> bool {
        matches!(
            self,
            ValueKind::Binary | ValueKind::VarBinary | ValueKind::Image | ValueKind::Timestamp
        )
    }

    pub fn is_ansi_text(self) -> bool {
        matches!(self, ValueKind::Char | ValueKind::VarChar | ValueKind::Text)
    }

    pub fn is_unicode_text(self) -> bool {
        matches!(self, ValueKind::NChar | ValueKind::NVarChar | ValueKind::NText)
    }

    pub fn is_text(self) -> bool {
        self.is_ansi_text() || self.is_unicode_text()
    }
}

impl TryFrom<u8> for ValueKind {
    type Error = SnapError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if value > MAX_KIND_DISCRIMINANT {
            return Err(SnapError::UnknownKind(value));
        }
        ValueKind::ALL
            .iter()
            .copied()
            .find(|kind| *kind as u8 == value)
            .ok_or(SnapError::UnknownKind(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_roundtrips_through_its_discriminant() {
        for kind in ValueKind::ALL {
            assert_eq!(ValueKind::try_from(kind.discriminant()), Ok(kind));
        }
    }

    #[test]
    fn gaps_and_out_of_range_discriminants_are_rejected() {
        for value in [24u8, 26, 27, 28, 35, 63, 255] {
            assert_eq!(ValueKind::try_from(value), Err(SnapError::UnknownKind(value)));
        }
    }

    #[test]
    fn largest_discriminant_matches_config() {
        let max = ValueKind::ALL.iter().map(|k| *k as u8).max().unwrap();
        assert_eq!(max, MAX_KIND_DISCRIMINANT);
    }

    #[test]
    fn categories() {
        assert!(ValueKind::NVarChar.is_unicode_text());
        assert!(ValueKind::VarChar.is_ansi_text());
        assert!(!ValueKind::Xml.is_text());
        assert!(ValueKind::Timestamp.is_binary());
        assert!(ValueKind::DateTimeOffset.is_datetime());
        assert!(ValueKind::SmallMoney.is_fixed_point());
        assert!(!ValueKind::Variant.is_implemented());
        assert!(!ValueKind::Structured.is_implemented());
        assert!(ValueKind::Udt.is_implemented());
    }
}
