//! # sqlsnap Protocol Constants
//!
//! This module centralizes every constant that shapes the snapshot wire format.
//! Values that depend on each other are co-located and their relationships are
//! enforced with compile-time assertions.
//!
//! ## Dependency Graph
//!
//! ```text
//! PROTOCOL_VERSION (1)
//!       │
//!       └─> Header version byte. Readers reject any other value.
//!
//! COLUMN_FLAG_ALLOW_NULL (bit 0)
//! COLUMN_FLAG_NAME_IS_NULL (bit 1)
//! COLUMN_KIND_SHIFT (2)
//!       │
//!       └─> flags = kind << COLUMN_KIND_SHIFT | name/null bits
//!           MAX_KIND_DISCRIMINANT must fit in the remaining 6 bits.
//!
//! TICKS_PER_SECOND (10_000_000)
//!       │
//!       ├─> NANOS_PER_TICK (100)
//!       └─> TICKS_PER_DAY (derived)
//!
//! MAX_VARINT32_LEN (5) / MAX_VARINT64_LEN (10)
//!       │
//!       └─> ceil(bits / 7) for each width
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use crate::config::{PROTOCOL_VERSION, TICKS_PER_SECOND};
//! ```

// ============================================================================
// Stream framing
// ============================================================================

/// Version byte written at the start of every snapshot stream.
pub const PROTOCOL_VERSION: u8 = 1;

/// Table descriptor header value that marks the end of the stream.
pub const END_OF_STREAM_MARKER: u64 = 0;

/// Row length value that marks the end of a result set's rows.
pub const END_OF_ROWS_MARKER: u64 = 0;

/// Largest payload (row body, binary, text) accepted by the decoder.
pub const MAX_PAYLOAD_LEN: usize = i32::MAX as usize;

// ============================================================================
// Column flags
// ============================================================================

pub const COLUMN_FLAG_ALLOW_NULL: u8 = 0b0000_0001;
pub const COLUMN_FLAG_NAME_IS_NULL: u8 = 0b0000_0010;
pub const COLUMN_KIND_SHIFT: u32 = 2;

/// Highest `ValueKind` discriminant.
pub const MAX_KIND_DISCRIMINANT: u8 = 34;

const _: () = assert!(
    (MAX_KIND_DISCRIMINANT as u32) < (1 << (8 - COLUMN_KIND_SHIFT)),
    "ValueKind discriminants must fit in the column flag bits above COLUMN_KIND_SHIFT"
);

const _: () = assert!(
    COLUMN_FLAG_ALLOW_NULL & COLUMN_FLAG_NAME_IS_NULL == 0,
    "column flag bits overlap"
);

// ============================================================================
// Variable-length integers
// ============================================================================

pub const VARINT_CONTINUATION_BIT: u8 = 0x80;
pub const VARINT_DATA_MASK: u8 = 0x7F;
pub const MAX_VARINT32_LEN: usize = 5;
pub const MAX_VARINT64_LEN: usize = 10;

const _: () = assert!(MAX_VARINT32_LEN == 32_usize.div_ceil(7));
const _: () = assert!(MAX_VARINT64_LEN == 64_usize.div_ceil(7));

// ============================================================================
// Date and time
// ============================================================================

/// Tick resolution of every date/time payload: 100 nanoseconds.
pub const TICKS_PER_SECOND: i64 = 10_000_000;
pub const NANOS_PER_TICK: i64 = 100;
pub const SECONDS_PER_DAY: i64 = 86_400;
pub const TICKS_PER_DAY: i64 = TICKS_PER_SECOND * SECONDS_PER_DAY;

/// Ticks from 0001-01-01T00:00:00 to 1970-01-01T00:00:00.
pub const UNIX_EPOCH_TICKS: i64 = 621_355_968_000_000_000;

/// Days from 0001-01-01 to 1970-01-01.
const UNIX_EPOCH_DAYS: i64 = 719_162;

const _: () = assert!(
    TICKS_PER_SECOND * NANOS_PER_TICK == 1_000_000_000,
    "tick resolution mismatch"
);

const _: () = assert!(UNIX_EPOCH_TICKS == UNIX_EPOCH_DAYS * TICKS_PER_DAY);

// ============================================================================
// Decimal
// ============================================================================

pub const DECIMAL_MAX_SCALE: u8 = 28;

/// Mantissas are limited to 96 bits of magnitude.
pub const DECIMAL_MAX_MANTISSA: u128 = (1u128 << 96) - 1;

/// Scale used by money and smallmoney values.
pub const MONEY_SCALE: u8 = 4;

const _: () = assert!(MONEY_SCALE <= DECIMAL_MAX_SCALE);

// ============================================================================
// Text and collation
// ============================================================================

/// Locale identifier used when a string carries none (en-US).
pub const DEFAULT_LCID: u32 = 1033;

/// Windows code page used for locales without a dedicated mapping.
pub const DEFAULT_ANSI_CODE_PAGE: u16 = 1252;

/// Substitute byte for characters the target code page cannot represent.
pub const ANSI_REPLACEMENT_BYTE: u8 = b'?';

// ============================================================================
// Spatial types
// ============================================================================

/// SRID of the well-known geography zero point (WGS 84).
pub const GEOGRAPHY_DEFAULT_SRID: i32 = 4326;

/// SRID of the well-known geometry zero point.
pub const GEOMETRY_DEFAULT_SRID: i32 = 0;

/// Serialization version byte of a spatial point body.
pub const SPATIAL_BODY_VERSION: u8 = 1;

/// Properties byte of a single valid point (`P` + `V` flags).
pub const SPATIAL_POINT_PROPERTIES: u8 = 0x0C;

// ============================================================================
// Writer
// ============================================================================

/// Initial capacity of the per-row scratch buffer.
pub const DEFAULT_ROW_BUFFER_CAPACITY: usize = 256;

/// Nullable column ordinals tracked inline before spilling to the heap.
pub const INLINE_NULLABLE_COLUMNS: usize = 16;
