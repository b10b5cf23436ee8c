//! # User-Defined Types
//!
//! Values of `udt` columns. A handful of well-known CLR types get dedicated
//! representations; everything else is carried either as an opaque binary
//! payload tagged with its type name, or as a JSON document.
//!
//! ## Wire Layout
//!
//! Every UDT payload starts with a discriminator byte:
//!
//! | Byte | Meaning | Payload |
//! |------|---------|---------|
//! | 0 | null instance | none |
//! | 1 | geography zero point | none |
//! | 2 | geometry zero point | none |
//! | 3 | geography | srid (i32 LE), varint len + body |
//! | 4 | geometry | srid (i32 LE), varint len + body |
//! | 5 | hierarchy id | varint level count, per level varint label count + zig-zag labels |
//! | 6 | binary user type | varint len + type name, varint len + payload |
//! | 7 | generic object | varint len + type name, varint len + JSON |
//!
//! The zero points are common enough (default column values) that they are
//! written without a body; the reader rebuilds the full point.

use std::fmt;
use std::str::FromStr;

use eyre::{bail, ensure, Result, WrapErr};
use serde::de::DeserializeOwned;
use serde::Serialize;
use smallvec::SmallVec;

use crate::config::{
    GEOGRAPHY_DEFAULT_SRID, GEOMETRY_DEFAULT_SRID, SPATIAL_BODY_VERSION, SPATIAL_POINT_PROPERTIES,
};
use crate::encoding::io::{
    take, take_i32, take_len, take_len_prefixed, take_u8, take_varint_i64, WireWrite,
};
use crate::error::SnapError;

mod discriminant {
    pub const NULL: u8 = 0;
    pub const GEOGRAPHY_ZERO_POINT: u8 = 1;
    pub const GEOMETRY_ZERO_POINT: u8 = 2;
    pub const GEOGRAPHY: u8 = 3;
    pub const GEOMETRY: u8 = 4;
    pub const HIERARCHY_ID: u8 = 5;
    pub const BINARY: u8 = 6;
    pub const OBJECT: u8 = 7;
}

// ============================================================================
// Spatial
// ============================================================================

/// A spatial instance: spatial reference id plus the serialized shape body.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialData {
    srid: i32,
    body: Vec<u8>,
}

impl SpatialData {
    pub fn new(srid: i32, body: Vec<u8>) -> Self {
        Self { srid, body }
    }

    /// Builds the body of a single point.
    pub fn point(srid: i32, x: f64, y: f64) -> Self {
        let mut body = Vec::with_capacity(18);
        body.push(SPATIAL_BODY_VERSION);
        body.push(SPATIAL_POINT_PROPERTIES);
        body.extend_from_slice(&x.to_le_bytes());
        body.extend_from_slice(&y.to_le_bytes());
        Self { srid, body }
    }

    pub fn srid(&self) -> i32 {
        self.srid
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Coordinates of a single-point body, if this is one.
    pub fn point_coordinates(&self) -> Option<(f64, f64)> {
        match self.body.as_slice() {
            [SPATIAL_BODY_VERSION, SPATIAL_POINT_PROPERTIES, rest @ ..] if rest.len() == 16 => {
                let mut x = [0u8; 8];
                let mut y = [0u8; 8];
                x.copy_from_slice(&rest[..8]);
                y.copy_from_slice(&rest[8..]);
                Some((f64::from_le_bytes(x), f64::from_le_bytes(y)))
            }
            _ => None,
        }
    }

    fn is_zero_point_with(&self, srid: i32) -> bool {
        self.srid == srid
            && self
                .point_coordinates()
                .is_some_and(|(x, y)| x.to_bits() == 0 && y.to_bits() == 0)
    }
}

// ============================================================================
// HierarchyId
// ============================================================================

type Level = SmallVec<[i64; 2]>;

/// A position in a tree, written as `/1/3.2/` (root is `/`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct HierarchyId {
    levels: Vec<Level>,
}

impl HierarchyId {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn from_levels<I, L>(levels: I) -> Result<Self>
    where
        I: IntoIterator<Item = L>,
        L: IntoIterator<Item = i64>,
    {
        let levels: Vec<Level> = levels
            .into_iter()
            .map(|l| l.into_iter().collect())
            .collect();
        ensure!(
            levels.iter().all(|l| !l.is_empty()),
            "hierarchy id levels must have at least one label"
        );
        Ok(Self { levels })
    }

    pub fn levels(&self) -> impl Iterator<Item = &[i64]> {
        self.levels.iter().map(|l| l.as_slice())
    }

    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    pub fn parent(&self) -> Option<HierarchyId> {
        if self.levels.is_empty() {
            return None;
        }
        Some(Self {
            levels: self.levels[..self.levels.len() - 1].to_vec(),
        })
    }

    /// True if `self` is `ancestor` or lies below it.
    pub fn is_descendant_of(&self, ancestor: &HierarchyId) -> bool {
        self.levels.starts_with(&ancestor.levels)
    }
}

impl fmt::Display for HierarchyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("/")?;
        for level in &self.levels {
            for (i, label) in level.iter().enumerate() {
                if i > 0 {
                    f.write_str(".")?;
                }
                write!(f, "{}", label)?;
            }
            f.write_str("/")?;
        }
        Ok(())
    }
}

impl FromStr for HierarchyId {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        if s == "/" {
            return Ok(Self::root());
        }
        let inner = s
            .strip_prefix('/')
            .and_then(|rest| rest.strip_suffix('/'))
            .filter(|inner| !inner.is_empty())
            .ok_or_else(|| eyre::eyre!("malformed hierarchy id: '{}'", s))?;

        let mut levels = Vec::new();
        for part in inner.split('/') {
            let mut level = Level::new();
            for label in part.split('.') {
                let label: i64 = label
                    .parse()
                    .wrap_err_with(|| format!("invalid hierarchy id label in '{}'", s))?;
                level.push(label);
            }
            levels.push(level);
        }
        Ok(Self { levels })
    }
}

// ============================================================================
// Binary-serializable user types
// ============================================================================

/// A user type with its own binary format.
///
/// The writer stores [`BinaryUdt::udt_type_name`] next to the payload so the
/// reader can check it is decoding the type it expects.
pub trait BinaryUdt: Sized {
    fn write_to(&self, out: &mut Vec<u8>) -> Result<()>;

    fn read_from(bytes: &[u8]) -> Result<Self>;

    fn udt_type_name() -> &'static str {
        simplified_type_name(std::any::type_name::<Self>())
    }
}

/// Strips the module path (and generic arguments) from a type name.
pub fn simplified_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

// ============================================================================
// UdtValue
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum UdtValue {
    Geography(SpatialData),
    Geometry(SpatialData),
    HierarchyId(HierarchyId),
    Binary { type_name: String, payload: Vec<u8> },
    Object {
        type_name: String,
        payload: serde_json::Value,
    },
}

impl UdtValue {
    pub fn geography_zero_point() -> Self {
        UdtValue::Geography(SpatialData::point(GEOGRAPHY_DEFAULT_SRID, 0.0, 0.0))
    }

    pub fn geometry_zero_point() -> Self {
        UdtValue::Geometry(SpatialData::point(GEOMETRY_DEFAULT_SRID, 0.0, 0.0))
    }

    pub fn from_binary<T: BinaryUdt>(value: &T) -> Result<Self> {
        let mut payload = Vec::new();
        value.write_to(&mut payload)?;
        Ok(UdtValue::Binary {
            type_name: T::udt_type_name().to_string(),
            payload,
        })
    }

    pub fn to_binary<T: BinaryUdt>(&self) -> Result<T> {
        match self {
            UdtValue::Binary { type_name, payload } if type_name == T::udt_type_name() => {
                T::read_from(payload)
            }
            other => bail!(SnapError::InvalidCast {
                requested: T::udt_type_name(),
                actual: other.kind_name(),
            }),
        }
    }

    pub fn from_object<T: Serialize>(type_name: impl Into<String>, value: &T) -> Result<Self> {
        let payload = serde_json::to_value(value).wrap_err("serializing user type to JSON")?;
        Ok(UdtValue::Object {
            type_name: type_name.into(),
            payload,
        })
    }

    pub fn to_object<T: DeserializeOwned>(&self) -> Result<T> {
        match self {
            UdtValue::Object { payload, .. } => serde_json::from_value(payload.clone())
                .wrap_err("deserializing user type from JSON"),
            other => bail!(SnapError::InvalidCast {
                requested: "object",
                actual: other.kind_name(),
            }),
        }
    }

    /// Short name of the UDT category, for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            UdtValue::Geography(_) => "geography",
            UdtValue::Geometry(_) => "geometry",
            UdtValue::HierarchyId(_) => "hierarchyid",
            UdtValue::Binary { .. } => "binary udt",
            UdtValue::Object { .. } => "object",
        }
    }

    /// Type name reported for the value's column data type.
    pub fn type_name(&self) -> &str {
        match self {
            UdtValue::Binary { type_name, .. } | UdtValue::Object { type_name, .. } => type_name,
            other => other.kind_name(),
        }
    }
}

// ============================================================================
// Codec
// ============================================================================

pub(crate) fn write_udt(value: Option<&UdtValue>, out: &mut Vec<u8>) -> Result<()> {
    let value = match value {
        Some(v) => v,
        None => return out.write_byte(discriminant::NULL),
    };

    match value {
        UdtValue::Geography(s) if s.is_zero_point_with(GEOGRAPHY_DEFAULT_SRID) => {
            out.write_byte(discriminant::GEOGRAPHY_ZERO_POINT)
        }
        UdtValue::Geometry(s) if s.is_zero_point_with(GEOMETRY_DEFAULT_SRID) => {
            out.write_byte(discriminant::GEOMETRY_ZERO_POINT)
        }
        UdtValue::Geography(s) => write_spatial(discriminant::GEOGRAPHY, s, out),
        UdtValue::Geometry(s) => write_spatial(discriminant::GEOMETRY, s, out),
        UdtValue::HierarchyId(h) => {
            out.write_byte(discriminant::HIERARCHY_ID)?;
            out.write_varint_u64(h.levels.len() as u64)?;
            for level in &h.levels {
                out.write_varint_u64(level.len() as u64)?;
                for &label in level {
                    out.write_varint_i64(label)?;
                }
            }
            Ok(())
        }
        UdtValue::Binary { type_name, payload } => {
            out.write_byte(discriminant::BINARY)?;
            out.write_len_prefixed(type_name.as_bytes())?;
            out.write_len_prefixed(payload)
        }
        UdtValue::Object { type_name, payload } => {
            out.write_byte(discriminant::OBJECT)?;
            out.write_len_prefixed(type_name.as_bytes())?;
            let json = serde_json::to_vec(payload).wrap_err("encoding user type JSON")?;
            out.write_len_prefixed(&json)
        }
    }
}

fn write_spatial(tag: u8, data: &SpatialData, out: &mut Vec<u8>) -> Result<()> {
    out.write_byte(tag)?;
    out.write_i32_le(data.srid)?;
    out.write_len_prefixed(&data.body)
}

pub(crate) fn read_udt(data: &[u8], offset: &mut usize) -> Result<Option<UdtValue>> {
    let tag = take_u8(data, offset, "udt discriminator")?;
    let value = match tag {
        discriminant::NULL => return Ok(None),
        discriminant::GEOGRAPHY_ZERO_POINT => UdtValue::geography_zero_point(),
        discriminant::GEOMETRY_ZERO_POINT => UdtValue::geometry_zero_point(),
        discriminant::GEOGRAPHY => UdtValue::Geography(read_spatial(data, offset)?),
        discriminant::GEOMETRY => UdtValue::Geometry(read_spatial(data, offset)?),
        discriminant::HIERARCHY_ID => {
            let count = take_len(data, offset)?;
            let mut levels = Vec::with_capacity(count.min(64));
            for _ in 0..count {
                let labels = take_len(data, offset)?;
                ensure!(
                    labels > 0,
                    SnapError::Format("hierarchy id level without labels".into())
                );
                let mut level = Level::with_capacity(labels.min(64));
                for _ in 0..labels {
                    level.push(take_varint_i64(data, offset)?);
                }
                levels.push(level);
            }
            UdtValue::HierarchyId(HierarchyId { levels })
        }
        discriminant::BINARY => {
            let type_name = read_type_name(data, offset)?;
            let payload = take_len_prefixed(data, offset, "binary udt payload")?.to_vec();
            UdtValue::Binary { type_name, payload }
        }
        discriminant::OBJECT => {
            let type_name = read_type_name(data, offset)?;
            let json = take_len_prefixed(data, offset, "udt object payload")?;
            let payload = serde_json::from_slice(json)
                .map_err(|e| SnapError::Format(format!("invalid udt JSON payload: {}", e)))?;
            UdtValue::Object { type_name, payload }
        }
        other => bail!(SnapError::Format(format!(
            "unknown udt discriminator {}",
            other
        ))),
    };
    Ok(Some(value))
}

fn read_spatial(data: &[u8], offset: &mut usize) -> Result<SpatialData> {
    let srid = take_i32(data, offset, "spatial srid")?;
    let len = take_len(data, offset)?;
    let body = take(data, offset, len, "spatial body")?.to_vec();
    Ok(SpatialData { srid, body })
}

fn read_type_name(data: &[u8], offset: &mut usize) -> Result<String> {
    let bytes = take_len_prefixed(data, offset, "udt type name")?;
    let name = std::str::from_utf8(bytes)
        .map_err(|_| SnapError::Format("udt type name is not valid UTF-8".into()))?;
    Ok(name.to_string())
}
