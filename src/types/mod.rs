//! # Type System
//!
//! The closed set of value kinds a snapshot can carry, their in-memory
//! representations, and the codecs that move them on and off the wire.
//!
//! ## Module Structure
//!
//! - `kind`: `ValueKind`, the kind discriminant stored in column flags
//! - `decimal`: `SqlDecimal` fixed-point values (decimal, money)
//! - `collation`: `SqlString` with locale id and compare options
//! - `udt`: spatial, hierarchy id, binary and JSON user types
//! - `value`: provider (`SqlValue`) and native (`Value`) representations
//! - `codec`: per-kind serialize/deserialize routines
//! - `registry`: `TypeDescriptor` lookup by kind
//!
//! ## Key Types
//!
//! | Type | Purpose |
//! |------|---------|
//! | `ValueKind` | Column type discriminant |
//! | `TypeDescriptor` | Name, representation tags and codec entry points of a kind |
//! | `SqlValue` | Typed, nullable provider value (what rows decode to) |
//! | `Value` | Plain native value with a single `Null` |
//!
//! ## Usage
//!
//! ```ignore
//! use sqlsnap::types::{SqlValue, TypeDescriptor, ValueKind};
//!
//! let desc = TypeDescriptor::get(ValueKind::Int);
//! let mut buf = Vec::new();
//! (desc.serialize)(&SqlValue::from(42), &mut buf)?;
//! ```

pub mod codec;
mod collation;
mod decimal;
mod kind;
mod registry;
mod udt;
mod value;

pub use collation::{ansi_code_page, encoding_for_code_page, CompareOptions, SqlString};
pub use decimal::SqlDecimal;
pub use kind::ValueKind;
pub use registry::{
    GenericType, NativeType, ProviderType, ReadNativeFn, ReadProviderFn, SerializeFn, ToNativeFn,
    TypeDescriptor,
};
pub use udt::{simplified_type_name, BinaryUdt, HierarchyId, SpatialData, UdtValue};
pub use value::{SqlValue, Value};
