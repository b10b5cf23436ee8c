//! # Value Representations
//!
//! Every column value exists in two forms:
//!
//! - [`SqlValue`]: the provider representation. One variant per provider type,
//!   each wrapping an `Option` so a null still knows its type. Rows are decoded
//!   into this form.
//! - [`Value`]: the native representation. Plain Rust values with a single
//!   untyped `Null`. Computed from `SqlValue` on demand.
//!
//! ## Provider Variants
//!
//! | Variant | Payload | Kinds |
//! |---------|---------|-------|
//! | Boolean | bool | Bit |
//! | Byte | u8 | TinyInt |
//! | Int16 / Int32 / Int64 | i16 / i32 / i64 | SmallInt / Int / BigInt |
//! | Single / Double | f32 / f64 | Real / Float |
//! | Decimal | SqlDecimal | Decimal |
//! | Money | SqlDecimal | Money, SmallMoney |
//! | DateTime | NaiveDateTime | DateTime, SmallDateTime, DateTime2 |
//! | Date / Time | NaiveDate / NaiveTime | Date / Time |
//! | DateTimeOffset | DateTime<FixedOffset> | DateTimeOffset |
//! | Guid | Uuid | UniqueIdentifier |
//! | Binary | Vec<u8> | Binary, VarBinary, Image, Timestamp |
//! | String | SqlString | Char, VarChar, Text, NChar, NVarChar, NText |
//! | Xml | String | Xml |
//! | Udt | UdtValue | Udt |

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use eyre::{bail, Result};
use uuid::Uuid;

use super::collation::SqlString;
use super::decimal::SqlDecimal;
use super::kind::ValueKind;
use super::registry::{NativeType, ProviderType};
use super::udt::UdtValue;
use crate::error::SnapError;

#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Boolean(Option<bool>),
    Byte(Option<u8>),
    Int16(Option<i16>),
    Int32(Option<i32>),
    Int64(Option<i64>),
    Single(Option<f32>),
    Double(Option<f64>),
    Decimal(Option<SqlDecimal>),
    Money(Option<SqlDecimal>),
    DateTime(Option<NaiveDateTime>),
    Date(Option<NaiveDate>),
    Time(Option<NaiveTime>),
    DateTimeOffset(Option<DateTime<FixedOffset>>),
    Guid(Option<Uuid>),
    Binary(Option<Vec<u8>>),
    String(Option<SqlString>),
    Xml(Option<String>),
    Udt(Option<UdtValue>),
}

impl SqlValue {
    /// The typed null a column of `kind` holds.
    pub fn null_of(kind: ValueKind) -> Result<SqlValue> {
        Ok(match kind {
            ValueKind::Bit => SqlValue::Boolean(None),
            ValueKind::TinyInt => SqlValue::Byte(None),
            ValueKind::SmallInt => SqlValue::Int16(None),
            ValueKind::Int => SqlValue::Int32(None),
            ValueKind::BigInt => SqlValue::Int64(None),
            ValueKind::Real => SqlValue::Single(None),
            ValueKind::Float => SqlValue::Double(None),
            ValueKind::Decimal => SqlValue::Decimal(None),
            ValueKind::Money | ValueKind::SmallMoney => SqlValue::Money(None),
            ValueKind::DateTime | ValueKind::SmallDateTime | ValueKind::DateTime2 => {
                SqlValue::DateTime(None)
            }
            ValueKind::Date => SqlValue::Date(None),
            ValueKind::Time => SqlValue::Time(None),
            ValueKind::DateTimeOffset => SqlValue::DateTimeOffset(None),
            ValueKind::UniqueIdentifier => SqlValue::Guid(None),
            ValueKind::Binary | ValueKind::VarBinary | ValueKind::Image | ValueKind::Timestamp => {
                SqlValue::Binary(None)
            }
            ValueKind::Char
            | ValueKind::VarChar
            | ValueKind::Text
            | ValueKind::NChar
            | ValueKind::NVarChar
            | ValueKind::NText => SqlValue::String(None),
            ValueKind::Xml => SqlValue::Xml(None),
            ValueKind::Udt => SqlValue::Udt(None),
            ValueKind::Variant => bail!(SnapError::NotImplemented("sql_variant values")),
            ValueKind::Structured => bail!(SnapError::NotImplemented("structured values")),
        })
    }

    pub fn is_null(&self) -> bool {
        match self {
            SqlValue::Boolean(v) => v.is_none(),
            SqlValue::Byte(v) => v.is_none(),
            SqlValue::Int16(v) => v.is_none(),
            SqlValue::Int32(v) => v.is_none(),
            SqlValue::Int64(v) => v.is_none(),
            SqlValue::Single(v) => v.is_none(),
            SqlValue::Double(v) => v.is_none(),
            SqlValue::Decimal(v) | SqlValue::Money(v) => v.is_none(),
            SqlValue::DateTime(v) => v.is_none(),
            SqlValue::Date(v) => v.is_none(),
            SqlValue::Time(v) => v.is_none(),
            SqlValue::DateTimeOffset(v) => v.is_none(),
            SqlValue::Guid(v) => v.is_none(),
            SqlValue::Binary(v) => v.is_none(),
            SqlValue::String(v) => v.is_none(),
            SqlValue::Xml(v) => v.is_none(),
            SqlValue::Udt(v) => v.is_none(),
        }
    }

    pub fn provider_type(&self) -> ProviderType {
        match self {
            SqlValue::Boolean(_) => ProviderType::SqlBoolean,
            SqlValue::Byte(_) => ProviderType::SqlByte,
            SqlValue::Int16(_) => ProviderType::SqlInt16,
            SqlValue::Int32(_) => ProviderType::SqlInt32,
            SqlValue::Int64(_) => ProviderType::SqlInt64,
            SqlValue::Single(_) => ProviderType::SqlSingle,
            SqlValue::Double(_) => ProviderType::SqlDouble,
            SqlValue::Decimal(_) => ProviderType::SqlDecimal,
            SqlValue::Money(_) => ProviderType::SqlMoney,
            SqlValue::DateTime(_) => ProviderType::SqlDateTime,
            SqlValue::Date(_) => ProviderType::SqlDate,
            SqlValue::Time(_) => ProviderType::SqlTime,
            SqlValue::DateTimeOffset(_) => ProviderType::SqlDateTimeOffset,
            SqlValue::Guid(_) => ProviderType::SqlGuid,
            SqlValue::Binary(_) => ProviderType::SqlBinary,
            SqlValue::String(_) => ProviderType::SqlString,
            SqlValue::Xml(_) => ProviderType::SqlXml,
            SqlValue::Udt(_) => ProviderType::SqlUdt,
        }
    }

    pub fn to_native(&self) -> Value {
        match self {
            SqlValue::Boolean(v) => v.map_or(Value::Null, Value::Boolean),
            SqlValue::Byte(v) => v.map_or(Value::Null, Value::Byte),
            SqlValue::Int16(v) => v.map_or(Value::Null, Value::Int16),
            SqlValue::Int32(v) => v.map_or(Value::Null, Value::Int32),
            SqlValue::Int64(v) => v.map_or(Value::Null, Value::Int64),
            SqlValue::Single(v) => v.map_or(Value::Null, Value::Single),
            SqlValue::Double(v) => v.map_or(Value::Null, Value::Double),
            SqlValue::Decimal(v) | SqlValue::Money(v) => v.map_or(Value::Null, Value::Decimal),
            SqlValue::DateTime(v) => v.map_or(Value::Null, Value::DateTime),
            SqlValue::Date(v) => v.map_or(Value::Null, Value::Date),
            SqlValue::Time(v) => v.map_or(Value::Null, Value::Time),
            SqlValue::DateTimeOffset(v) => v.map_or(Value::Null, Value::DateTimeOffset),
            SqlValue::Guid(v) => v.map_or(Value::Null, Value::Guid),
            SqlValue::Binary(v) => v.clone().map_or(Value::Null, Value::Bytes),
            SqlValue::String(v) => v
                .as_ref()
                .map_or(Value::Null, |s| Value::String(s.as_str().to_string())),
            SqlValue::Xml(v) => v.clone().map_or(Value::Null, Value::String),
            SqlValue::Udt(v) => v.clone().map_or(Value::Null, Value::Udt),
        }
    }
}

macro_rules! impl_from_for_sql_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for SqlValue {
                fn from(value: $ty) -> Self {
                    SqlValue::$variant(Some(value.into()))
                }
            }
        )*
    };
}

impl_from_for_sql_value! {
    bool => Boolean,
    u8 => Byte,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    f32 => Single,
    f64 => Double,
    SqlDecimal => Decimal,
    NaiveDateTime => DateTime,
    NaiveDate => Date,
    NaiveTime => Time,
    DateTime<FixedOffset> => DateTimeOffset,
    Uuid => Guid,
    Vec<u8> => Binary,
    &str => String,
    String => String,
    SqlString => String,
    UdtValue => Udt,
}

/// Native representation of a column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Byte(u8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Single(f32),
    Double(f64),
    Decimal(SqlDecimal),
    DateTime(NaiveDateTime),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTimeOffset(DateTime<FixedOffset>),
    Guid(Uuid),
    Bytes(Vec<u8>),
    String(String),
    Udt(UdtValue),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// `None` for `Null`.
    pub fn native_type(&self) -> Option<NativeType> {
        Some(match self {
            Value::Null => return None,
            Value::Boolean(_) => NativeType::Bool,
            Value::Byte(_) => NativeType::U8,
            Value::Int16(_) => NativeType::I16,
            Value::Int32(_) => NativeType::I32,
            Value::Int64(_) => NativeType::I64,
            Value::Single(_) => NativeType::F32,
            Value::Double(_) => NativeType::F64,
            Value::Decimal(_) => NativeType::Decimal,
            Value::DateTime(_) => NativeType::NaiveDateTime,
            Value::Date(_) => NativeType::NaiveDate,
            Value::Time(_) => NativeType::NaiveTime,
            Value::DateTimeOffset(_) => NativeType::DateTimeOffset,
            Value::Guid(_) => NativeType::Uuid,
            Value::Bytes(_) => NativeType::Bytes,
            Value::String(_) => NativeType::String,
            Value::Udt(_) => NativeType::Udt,
        })
    }

    pub fn type_name(&self) -> &'static str {
        self.native_type().map_or("null", NativeType::name)
    }
}
