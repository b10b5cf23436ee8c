//! # Type Registry
//!
//! One static [`TypeDescriptor`] per [`ValueKind`], resolved by an exhaustive
//! match. Adding a kind without a descriptor is a compile error.
//!
//! A descriptor names the kind (`"int"`, `"nvarchar"`, ...), tags its generic,
//! native and provider representations, and carries the codec entry points:
//!
//! | Field | Signature |
//! |-------|-----------|
//! | `serialize` | `fn(&SqlValue, &mut Vec<u8>) -> Result<()>` |
//! | `read_provider` | `fn(&[u8], &mut usize) -> Result<SqlValue>` |
//! | `read_native` | `fn(&[u8], &mut usize) -> Result<Value>` |
//! | `to_native` | `fn(&SqlValue) -> Value` |
//!
//! `Variant` and `Structured` have descriptors whose codecs fail with
//! `SnapError::NotImplemented`.
//!
//! ## Usage
//!
//! ```ignore
//! use sqlsnap::types::{TypeDescriptor, ValueKind};
//!
//! let desc = TypeDescriptor::get(ValueKind::NVarChar);
//! assert_eq!(desc.name, "nvarchar");
//! (desc.serialize)(&value, &mut row_buffer)?;
//! ```

use std::fmt;

use eyre::Result;

use super::codec;
use super::kind::ValueKind;
use super::value::{SqlValue, Value};

/// Language-neutral category of a kind's values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenericType {
    Boolean,
    Byte,
    Int16,
    Int32,
    Int64,
    Single,
    Double,
    Decimal,
    DateTime,
    DateTimeOffset,
    TimeSpan,
    Guid,
    Binary,
    String,
    Xml,
    Object,
}

/// Rust type a kind's non-null values materialize as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeType {
    Bool,
    U8,
    I16,
    I32,
    I64,
    F32,
    F64,
    Decimal,
    NaiveDateTime,
    NaiveDate,
    NaiveTime,
    DateTimeOffset,
    Uuid,
    Bytes,
    String,
    Udt,
    Unsupported,
}

impl NativeType {
    pub fn name(self) -> &'static str {
        match self {
            NativeType::Bool => "bool",
            NativeType::U8 => "u8",
            NativeType::I16 => "i16",
            NativeType::I32 => "i32",
            NativeType::I64 => "i64",
            NativeType::F32 => "f32",
            NativeType::F64 => "f64",
            NativeType::Decimal => "SqlDecimal",
            NativeType::NaiveDateTime => "NaiveDateTime",
            NativeType::NaiveDate => "NaiveDate",
            NativeType::NaiveTime => "NaiveTime",
            NativeType::DateTimeOffset => "DateTime<FixedOffset>",
            NativeType::Uuid => "Uuid",
            NativeType::Bytes => "Vec<u8>",
            NativeType::String => "String",
            NativeType::Udt => "UdtValue",
            NativeType::Unsupported => "unsupported",
        }
    }
}

/// Provider-side wrapper type, one per [`SqlValue`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderType {
    SqlBoolean,
    SqlByte,
    SqlInt16,
    SqlInt32,
    SqlInt64,
    SqlSingle,
    SqlDouble,
    SqlDecimal,
    SqlMoney,
    SqlDateTime,
    SqlDate,
    SqlTime,
    SqlDateTimeOffset,
    SqlGuid,
    SqlBinary,
    SqlString,
    SqlXml,
    SqlUdt,
    Unsupported,
}

impl ProviderType {
    pub fn name(self) -> &'static str {
        match self {
            ProviderType::SqlBoolean => "SqlBoolean",
            ProviderType::SqlByte => "SqlByte",
            ProviderType::SqlInt16 => "SqlInt16",
            ProviderType::SqlInt32 => "SqlInt32",
            ProviderType::SqlInt64 => "SqlInt64",
            ProviderType::SqlSingle => "SqlSingle",
            ProviderType::SqlDouble => "SqlDouble",
            ProviderType::SqlDecimal => "SqlDecimal",
            ProviderType::SqlMoney => "SqlMoney",
            ProviderType::SqlDateTime => "SqlDateTime",
            ProviderType::SqlDate => "SqlDate",
            ProviderType::SqlTime => "SqlTime",
            ProviderType::SqlDateTimeOffset => "SqlDateTimeOffset",
            ProviderType::SqlGuid => "SqlGuid",
            ProviderType::SqlBinary => "SqlBinary",
            ProviderType::SqlString => "SqlString",
            ProviderType::SqlXml => "SqlXml",
            ProviderType::SqlUdt => "SqlUdt",
            ProviderType::Unsupported => "unsupported",
        }
    }
}

pub type SerializeFn = fn(&SqlValue, &mut Vec<u8>) -> Result<()>;
pub type ReadProviderFn = fn(&[u8], &mut usize) -> Result<SqlValue>;
pub type ReadNativeFn = fn(&[u8], &mut usize) -> Result<Value>;
pub type ToNativeFn = fn(&SqlValue) -> Value;

pub struct TypeDescriptor {
    pub kind: ValueKind,
    pub name: &'static str,
    pub generic: GenericType,
    pub native: NativeType,
    pub provider: ProviderType,
    pub serialize: SerializeFn,
    pub read_provider: ReadProviderFn,
    pub read_native: ReadNativeFn,
    pub to_native: ToNativeFn,
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("generic", &self.generic)
            .field("native", &self.native)
            .field("provider", &self.provider)
            .finish_non_exhaustive()
    }
}

macro_rules! descriptors {
    ($(
        $static:ident: $kind:ident, $name:literal, $generic:ident, $native:ident, $provider:ident,
            $write:ident, $read:ident, $read_native:ident;
    )*) => {
        $(
            static $static: TypeDescriptor = TypeDescriptor {
                kind: ValueKind::$kind,
                name: $name,
                generic: GenericType::$generic,
                native: NativeType::$native,
                provider: ProviderType::$provider,
                serialize: codec::$write,
                read_provider: codec::$read,
                read_native: codec::$read_native,
                to_native: SqlValue::to_native,
            };
        )*
    };
}

descriptors! {
    BIG_INT: BigInt, "bigint", Int64, I64, SqlInt64,
        write_big_int, read_big_int, read_big_int_native;
    BINARY: Binary, "binary", Binary, Bytes, SqlBinary,
        write_binary, read_binary, read_binary_native;
    BIT: Bit, "bit", Boolean, Bool, SqlBoolean,
        write_bit, read_bit, read_bit_native;
    CHAR: Char, "char", String, String, SqlString,
        write_ansi_text, read_ansi_text, read_ansi_text_native;
    DATE_TIME: DateTime, "datetime", DateTime, NaiveDateTime, SqlDateTime,
        write_date_time, read_date_time, read_date_time_native;
    DECIMAL: Decimal, "decimal", Decimal, Decimal, SqlDecimal,
        write_decimal, read_decimal, read_decimal_native;
    FLOAT: Float, "float", Double, F64, SqlDouble,
        write_float, read_float, read_float_native;
    IMAGE: Image, "image", Binary, Bytes, SqlBinary,
        write_binary, read_binary, read_binary_native;
    INT: Int, "int", Int32, I32, SqlInt32,
        write_int, read_int, read_int_native;
    MONEY: Money, "money", Decimal, Decimal, SqlMoney,
        write_money, read_money, read_money_native;
    NCHAR: NChar, "nchar", String, String, SqlString,
        write_unicode_text, read_unicode_text, read_unicode_text_native;
    NTEXT: NText, "ntext", String, String, SqlString,
        write_unicode_text, read_unicode_text, read_unicode_text_native;
    NVARCHAR: NVarChar, "nvarchar", String, String, SqlString,
        write_unicode_text, read_unicode_text, read_unicode_text_native;
    REAL: Real, "real", Single, F32, SqlSingle,
        write_real, read_real, read_real_native;
    UNIQUE_IDENTIFIER: UniqueIdentifier, "uniqueidentifier", Guid, Uuid, SqlGuid,
        write_guid, read_guid, read_guid_native;
    SMALL_DATE_TIME: SmallDateTime, "smalldatetime", DateTime, NaiveDateTime, SqlDateTime,
        write_date_time, read_date_time, read_date_time_native;
    SMALL_INT: SmallInt, "smallint", Int16, I16, SqlInt16,
        write_small_int, read_small_int, read_small_int_native;
    SMALL_MONEY: SmallMoney, "smallmoney", Decimal, Decimal, SqlMoney,
        write_money, read_money, read_money_native;
    TEXT: Text, "text", String, String, SqlString,
        write_ansi_text, read_ansi_text, read_ansi_text_native;
    TIMESTAMP: Timestamp, "timestamp", Binary, Bytes, SqlBinary,
        write_binary, read_binary, read_binary_native;
    TINY_INT: TinyInt, "tinyint", Byte, U8, SqlByte,
        write_tiny_int, read_tiny_int, read_tiny_int_native;
    VAR_BINARY: VarBinary, "varbinary", Binary, Bytes, SqlBinary,
        write_binary, read_binary, read_binary_native;
    VAR_CHAR: VarChar, "varchar", String, String, SqlString,
        write_ansi_text, read_ansi_text, read_ansi_text_native;
    VARIANT: Variant, "sql_variant", Object, Unsupported, Unsupported,
        write_variant, read_variant, read_variant_native;
    XML: Xml, "xml", Xml, String, SqlXml,
        write_xml, read_xml, read_xml_native;
    UDT: Udt, "udt", Object, Udt, SqlUdt,
        write_udt_value, read_udt_value, read_udt_native;
    STRUCTURED: Structured, "table", Object, Unsupported, Unsupported,
        write_structured, read_structured, read_structured_native;
    DATE: Date, "date", DateTime, NaiveDate, SqlDate,
        write_date, read_date, read_date_native;
    TIME: Time, "time", TimeSpan, NaiveTime, SqlTime,
        write_time, read_time, read_time_native;
    DATE_TIME2: DateTime2, "datetime2", DateTime, NaiveDateTime, SqlDateTime,
        write_date_time, read_date_time, read_date_time_native;
    DATE_TIME_OFFSET: DateTimeOffset, "datetimeoffset", DateTimeOffset, DateTimeOffset,
        SqlDateTimeOffset,
        write_date_time_offset, read_date_time_offset, read_date_time_offset_native;
}

impl TypeDescriptor {
    pub fn get(kind: ValueKind) -> &'static TypeDescriptor {
        match kind {
            ValueKind::BigInt => &BIG_INT,
            ValueKind::Binary => &BINARY,
            ValueKind::Bit => &BIT,
            ValueKind::Char => &CHAR,
            ValueKind::DateTime => &DATE_TIME,
            ValueKind::Decimal => &DECIMAL,
            ValueKind::Float => &FLOAT,
            ValueKind::Image => &IMAGE,
            ValueKind::Int => &INT,
            ValueKind::Money => &MONEY,
            ValueKind::NChar => &NCHAR,
            ValueKind::NText => &NTEXT,
            ValueKind::NVarChar => &NVARCHAR,
            ValueKind::Real => &REAL,
            ValueKind::UniqueIdentifier => &UNIQUE_IDENTIFIER,
            ValueKind::SmallDateTime => &SMALL_DATE_TIME,
            ValueKind::SmallInt => &SMALL_INT,
            ValueKind::SmallMoney => &SMALL_MONEY,
            ValueKind::Text => &TEXT,
            ValueKind::Timestamp => &TIMESTAMP,
            ValueKind::TinyInt => &TINY_INT,
            ValueKind::VarBinary => &VAR_BINARY,
            ValueKind::VarChar => &VAR_CHAR,
            ValueKind::Variant => &VARIANT,
            ValueKind::Xml => &XML,
            ValueKind::Udt => &UDT,
            ValueKind::Structured => &STRUCTURED,
            ValueKind::Date => &DATE,
            ValueKind::Time => &TIME,
            ValueKind::DateTime2 => &DATE_TIME2,
            ValueKind::DateTimeOffset => &DATE_TIME_OFFSET,
        }
    }

    pub fn all() -> impl Iterator<Item = &'static TypeDescriptor> {
        ValueKind::ALL.into_iter().map(TypeDescriptor::get)
    }

    pub fn is_implemented(&self) -> bool {
        self.kind.is_implemented()
    }
}
