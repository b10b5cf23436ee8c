//! # Per-Kind Value Codecs
//!
//! Serialize and deserialize routines for every [`ValueKind`](super::ValueKind). The registry
//! hands these out as function pointers; nothing else should call them by name.
//!
//! Writers take a non-null provider value and append its payload to a row
//! buffer. Readers decode one payload from a row body, advancing `offset`.
//! Nulls never reach a codec: they live in the row's null bitmap.
//!
//! ## Date/Time Ticks
//!
//! Date and time values are counts of 100 ns ticks:
//!
//! ```text
//! DateTime / DateTime2 / SmallDateTime   ticks since 0001-01-01T00:00:00
//! Date                                   ticks of the date's midnight
//! Time                                   ticks since midnight
//! DateTimeOffset                         i16 LE offset minutes, then ticks of the local clock time
//! ```
//!
//! Sub-tick precision is truncated, and offsets are stored in whole minutes.

use chrono::{DateTime, FixedOffset, NaiveDateTime, NaiveTime, TimeZone, Timelike};
use eyre::{bail, ensure, Result};
use uuid::Uuid;

use super::collation::{CompareOptions, SqlString};
use super::decimal::SqlDecimal;
use super::udt::{read_udt, write_udt};
use super::value::{SqlValue, Value};
use crate::config::{NANOS_PER_TICK, TICKS_PER_DAY, TICKS_PER_SECOND, UNIX_EPOCH_TICKS};
use crate::encoding::io::{
    take_array, take_f32, take_f64, take_i16, take_len_prefixed, take_u64, take_u8,
    take_varint_i32, take_varint_i64, take_varint_u32, WireWrite,
};
use crate::error::SnapError;

pub(crate) fn cast_error(requested: &'static str, value: &SqlValue) -> eyre::Report {
    if value.is_null() {
        return SnapError::NullValue.into();
    }
    SnapError::InvalidCast {
        requested,
        actual: value.provider_type().name(),
    }
    .into()
}

/// Pulls the non-null payload out of the expected provider variant.
macro_rules! expect_value {
    ($value:expr, $variant:ident, $requested:literal) => {
        match $value {
            SqlValue::$variant(Some(v)) => v,
            other => return Err(cast_error($requested, other)),
        }
    };
}

/// Defines a native reader in terms of a provider reader.
macro_rules! native_reader {
    ($($native:ident => $provider:ident),* $(,)?) => {
        $(
            pub fn $native(data: &[u8], offset: &mut usize) -> Result<Value> {
                $provider(data, offset).map(|v| v.to_native())
            }
        )*
    };
}

native_reader! {
    read_bit_native => read_bit,
    read_tiny_int_native => read_tiny_int,
    read_small_int_native => read_small_int,
    read_int_native => read_int,
    read_big_int_native => read_big_int,
    read_real_native => read_real,
    read_float_native => read_float,
    read_decimal_native => read_decimal,
    read_money_native => read_money,
    read_date_time_native => read_date_time,
    read_date_native => read_date,
    read_time_native => read_time,
    read_date_time_offset_native => read_date_time_offset,
    read_guid_native => read_guid,
    read_binary_native => read_binary,
    read_ansi_text_native => read_ansi_text,
    read_unicode_text_native => read_unicode_text,
    read_xml_native => read_xml,
    read_udt_native => read_udt_value,
}

// ============================================================================
// Booleans and integers
// ============================================================================

pub fn write_bit(value: &SqlValue, out: &mut Vec<u8>) -> Result<()> {
    let v = expect_value!(value, Boolean, "bit");
    out.write_byte(u8::from(*v))
}

pub fn read_bit(data: &[u8], offset: &mut usize) -> Result<SqlValue> {
    match take_u8(data, offset, "bit")? {
        0 => Ok(SqlValue::Boolean(Some(false))),
        1 => Ok(SqlValue::Boolean(Some(true))),
        other => bail!(SnapError::Format(format!("invalid bit value {}", other))),
    }
}

pub fn write_tiny_int(value: &SqlValue, out: &mut Vec<u8>) -> Result<()> {
    let v = expect_value!(value, Byte, "tinyint");
    out.write_byte(*v)
}

pub fn read_tiny_int(data: &[u8], offset: &mut usize) -> Result<SqlValue> {
    Ok(SqlValue::Byte(Some(take_u8(data, offset, "tinyint")?)))
}

pub fn write_small_int(value: &SqlValue, out: &mut Vec<u8>) -> Result<()> {
    let v = expect_value!(value, Int16, "smallint");
    out.write_i16_le(*v)
}

pub fn read_small_int(data: &[u8], offset: &mut usize) -> Result<SqlValue> {
    Ok(SqlValue::Int16(Some(take_i16(data, offset, "smallint")?)))
}

pub fn write_int(value: &SqlValue, out: &mut Vec<u8>) -> Result<()> {
    let v = expect_value!(value, Int32, "int");
    out.write_varint_i32(*v)
}

pub fn read_int(data: &[u8], offset: &mut usize) -> Result<SqlValue> {
    Ok(SqlValue::Int32(Some(take_varint_i32(data, offset)?)))
}

pub fn write_big_int(value: &SqlValue, out: &mut Vec<u8>) -> Result<()> {
    let v = expect_value!(value, Int64, "bigint");
    out.write_varint_i64(*v)
}

pub fn read_big_int(data: &[u8], offset: &mut usize) -> Result<SqlValue> {
    Ok(SqlValue::Int64(Some(take_varint_i64(data, offset)?)))
}

// ============================================================================
// Floating and fixed point
// ============================================================================

pub fn write_real(value: &SqlValue, out: &mut Vec<u8>) -> Result<()> {
    let v = expect_value!(value, Single, "real");
    out.write_f32_le(*v)
}

pub fn read_real(data: &[u8], offset: &mut usize) -> Result<SqlValue> {
    Ok(SqlValue::Single(Some(take_f32(data, offset, "real")?)))
}

pub fn write_float(value: &SqlValue, out: &mut Vec<u8>) -> Result<()> {
    let v = expect_value!(value, Double, "float");
    out.write_f64_le(*v)
}

pub fn read_float(data: &[u8], offset: &mut usize) -> Result<SqlValue> {
    Ok(SqlValue::Double(Some(take_f64(data, offset, "float")?)))
}

fn write_decimal_words(v: &SqlDecimal, out: &mut Vec<u8>) -> Result<()> {
    let [lo, hi] = v.to_words();
    out.write_u64_le(lo)?;
    out.write_u64_le(hi)
}

fn read_decimal_words(data: &[u8], offset: &mut usize) -> Result<SqlDecimal> {
    let lo = take_u64(data, offset, "decimal")?;
    let hi = take_u64(data, offset, "decimal")?;
    SqlDecimal::from_words([lo, hi])
}

pub fn write_decimal(value: &SqlValue, out: &mut Vec<u8>) -> Result<()> {
    let v = expect_value!(value, Decimal, "decimal");
    write_decimal_words(v, out)
}

pub fn read_decimal(data: &[u8], offset: &mut usize) -> Result<SqlValue> {
    Ok(SqlValue::Decimal(Some(read_decimal_words(data, offset)?)))
}

pub fn write_money(value: &SqlValue, out: &mut Vec<u8>) -> Result<()> {
    let v = expect_value!(value, Money, "money");
    write_decimal_words(v, out)
}

pub fn read_money(data: &[u8], offset: &mut usize) -> Result<SqlValue> {
    Ok(SqlValue::Money(Some(read_decimal_words(data, offset)?)))
}

// ============================================================================
// Date and time
// ============================================================================

/// Computed in i128. A tick count that does not fit i64 is a format error.
pub(crate) fn date_time_to_ticks(value: &NaiveDateTime) -> Result<i64> {
    let utc = value.and_utc();
    let ticks = UNIX_EPOCH_TICKS as i128
        + utc.timestamp() as i128 * TICKS_PER_SECOND as i128
        + (utc.timestamp_subsec_nanos() as i64 / NANOS_PER_TICK) as i128;
    i64::try_from(ticks).map_err(|_| {
        SnapError::Format(format!("{} is outside the date range", value)).into()
    })
}

pub(crate) fn ticks_to_date_time(ticks: i64) -> Result<NaiveDateTime> {
    let out_of_range =
        || SnapError::Format(format!("tick count {} is outside the date range", ticks));
    let since_unix = ticks.checked_sub(UNIX_EPOCH_TICKS).ok_or_else(out_of_range)?;
    let seconds = since_unix.div_euclid(TICKS_PER_SECOND);
    let nanos = (since_unix.rem_euclid(TICKS_PER_SECOND) * NANOS_PER_TICK) as u32;
    let value = DateTime::from_timestamp(seconds, nanos).ok_or_else(out_of_range)?;
    Ok(value.naive_utc())
}

pub(crate) fn time_to_ticks(value: &NaiveTime) -> i64 {
    value.num_seconds_from_midnight() as i64 * TICKS_PER_SECOND
        + value.nanosecond() as i64 / NANOS_PER_TICK
}

pub(crate) fn ticks_to_time(ticks: i64) -> Result<NaiveTime> {
    ensure!(
        (0..TICKS_PER_DAY).contains(&ticks),
        SnapError::Format(format!("time of day {} ticks is out of range", ticks))
    );
    let seconds = (ticks / TICKS_PER_SECOND) as u32;
    let nanos = ((ticks % TICKS_PER_SECOND) * NANOS_PER_TICK) as u32;
    NaiveTime::from_num_seconds_from_midnight_opt(seconds, nanos)
        .ok_or_else(|| SnapError::Format(format!("invalid time of day {} ticks", ticks)).into())
}

pub fn write_date_time(value: &SqlValue, out: &mut Vec<u8>) -> Result<()> {
    let v = expect_value!(value, DateTime, "datetime");
    out.write_varint_i64(date_time_to_ticks(v)?)
}

pub fn read_date_time(data: &[u8], offset: &mut usize) -> Result<SqlValue> {
    let ticks = take_varint_i64(data, offset)?;
    Ok(SqlValue::DateTime(Some(ticks_to_date_time(ticks)?)))
}

pub fn write_date(value: &SqlValue, out: &mut Vec<u8>) -> Result<()> {
    let v = expect_value!(value, Date, "date");
    out.write_varint_i64(date_time_to_ticks(&v.and_time(NaiveTime::MIN))?)
}

pub fn read_date(data: &[u8], offset: &mut usize) -> Result<SqlValue> {
    let ticks = take_varint_i64(data, offset)?;
    let value = ticks_to_date_time(ticks)?;
    ensure!(
        value.time() == NaiveTime::MIN,
        SnapError::Format(format!("date payload {} is not a midnight tick count", ticks))
    );
    Ok(SqlValue::Date(Some(value.date())))
}

pub fn write_time(value: &SqlValue, out: &mut Vec<u8>) -> Result<()> {
    let v = expect_value!(value, Time, "time");
    out.write_varint_i64(time_to_ticks(v))
}

pub fn read_time(data: &[u8], offset: &mut usize) -> Result<SqlValue> {
    let ticks = take_varint_i64(data, offset)?;
    Ok(SqlValue::Time(Some(ticks_to_time(ticks)?)))
}

pub fn write_date_time_offset(value: &SqlValue, out: &mut Vec<u8>) -> Result<()> {
    let v = expect_value!(value, DateTimeOffset, "datetimeoffset");
    let seconds = v.offset().local_minus_utc();
    ensure!(
        seconds % 60 == 0,
        SnapError::Format(format!("utc offset {} is not a whole number of minutes", v.offset()))
    );
    let ticks = date_time_to_ticks(&v.naive_local())?;
    out.write_i16_le((seconds / 60) as i16)?;
    out.write_varint_i64(ticks)
}

pub fn read_date_time_offset(data: &[u8], offset: &mut usize) -> Result<SqlValue> {
    let minutes = take_i16(data, offset, "datetimeoffset offset")?;
    let ticks = take_varint_i64(data, offset)?;
    let zone = FixedOffset::east_opt(minutes as i32 * 60).ok_or_else(|| {
        SnapError::Format(format!("utc offset of {} minutes is out of range", minutes))
    })?;
    let local = ticks_to_date_time(ticks)?;
    let value: DateTime<FixedOffset> = zone
        .from_local_datetime(&local)
        .single()
        .ok_or_else(|| SnapError::Format("datetimeoffset is out of range".into()))?;
    Ok(SqlValue::DateTimeOffset(Some(value)))
}

// ============================================================================
// Identifiers, binary, text
// ============================================================================

pub fn write_guid(value: &SqlValue, out: &mut Vec<u8>) -> Result<()> {
    let v = expect_value!(value, Guid, "uniqueidentifier");
    out.extend_from_slice(v.as_bytes());
    Ok(())
}

pub fn read_guid(data: &[u8], offset: &mut usize) -> Result<SqlValue> {
    let bytes = take_array::<16>(data, offset, "uniqueidentifier")?;
    Ok(SqlValue::Guid(Some(Uuid::from_bytes(bytes))))
}

pub fn write_binary(value: &SqlValue, out: &mut Vec<u8>) -> Result<()> {
    let v = expect_value!(value, Binary, "varbinary");
    out.write_len_prefixed(v)
}

pub fn read_binary(data: &[u8], offset: &mut usize) -> Result<SqlValue> {
    let bytes = take_len_prefixed(data, offset, "binary payload")?;
    Ok(SqlValue::Binary(Some(bytes.to_vec())))
}

fn write_collation(v: &SqlString, out: &mut Vec<u8>) -> Result<()> {
    out.write_varint_u32(v.lcid())?;
    out.write_varint_u32(v.compare_options().bits())
}

fn read_collation(data: &[u8], offset: &mut usize) -> Result<(u32, CompareOptions)> {
    let lcid = take_varint_u32(data, offset)?;
    let options = CompareOptions::from_bits(take_varint_u32(data, offset)?);
    Ok((lcid, options))
}

pub fn write_ansi_text(value: &SqlValue, out: &mut Vec<u8>) -> Result<()> {
    let v = expect_value!(value, String, "varchar");
    write_collation(v, out)?;
    out.write_len_prefixed(&v.to_ansi_bytes())
}

pub fn read_ansi_text(data: &[u8], offset: &mut usize) -> Result<SqlValue> {
    let (lcid, options) = read_collation(data, offset)?;
    let bytes = take_len_prefixed(data, offset, "ansi text payload")?;
    Ok(SqlValue::String(Some(SqlString::from_ansi_bytes(
        bytes, lcid, options,
    ))))
}

pub fn write_unicode_text(value: &SqlValue, out: &mut Vec<u8>) -> Result<()> {
    let v = expect_value!(value, String, "nvarchar");
    write_collation(v, out)?;
    out.write_len_prefixed(&v.to_utf16_bytes())
}

pub fn read_unicode_text(data: &[u8], offset: &mut usize) -> Result<SqlValue> {
    let (lcid, options) = read_collation(data, offset)?;
    let bytes = take_len_prefixed(data, offset, "unicode text payload")?;
    Ok(SqlValue::String(Some(SqlString::from_utf16_bytes(
        bytes, lcid, options,
    )?)))
}

pub fn write_xml(value: &SqlValue, out: &mut Vec<u8>) -> Result<()> {
    let v = expect_value!(value, Xml, "xml");
    out.write_len_prefixed(v.as_bytes())
}

pub fn read_xml(data: &[u8], offset: &mut usize) -> Result<SqlValue> {
    let bytes = take_len_prefixed(data, offset, "xml payload")?;
    let text = std::str::from_utf8(bytes)
        .map_err(|_| SnapError::Format("xml payload is not valid UTF-8".into()))?;
    Ok(SqlValue::Xml(Some(text.to_string())))
}

pub fn write_udt_value(value: &SqlValue, out: &mut Vec<u8>) -> Result<()> {
    let v = expect_value!(value, Udt, "udt");
    write_udt(Some(v), out)
}

pub fn read_udt_value(data: &[u8], offset: &mut usize) -> Result<SqlValue> {
    Ok(SqlValue::Udt(read_udt(data, offset)?))
}

// ============================================================================
// Unsupported kinds
// ============================================================================

pub fn write_variant(_: &SqlValue, _: &mut Vec<u8>) -> Result<()> {
    bail!(SnapError::NotImplemented("sql_variant serialization"))
}

pub fn read_variant(_: &[u8], _: &mut usize) -> Result<SqlValue> {
    bail!(SnapError::NotImplemented("sql_variant deserialization"))
}

pub fn read_variant_native(_: &[u8], _: &mut usize) -> Result<Value> {
    bail!(SnapError::NotImplemented("sql_variant deserialization"))
}

pub fn write_structured(_: &SqlValue, _: &mut Vec<u8>) -> Result<()> {
    bail!(SnapError::NotImplemented("structured value serialization"))
}

pub fn read_structured(_: &[u8], _: &mut usize) -> Result<SqlValue> {
    bail!(SnapError::NotImplemented("structured value deserialization"))
}

pub fn read_structured_native(_: &[u8], _: &mut usize) -> Result<Value> {
    bail!(SnapError::NotImplemented("structured value deserialization"))
}
