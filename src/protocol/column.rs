//! # Column Descriptor
//!
//! One column of a result set: ordinal, optional name, kind and nullability.
//!
//! ## Wire Layout
//!
//! ```text
//! +-----------------+-----------+---------------------------------+
//! | ordinal: varint | flags: u8 | [name_len: varint][name: utf8]  |
//! +-----------------+-----------+---------------------------------+
//!
//! flags: bit 0   allow null
//!        bit 1   name is null (no name bytes follow)
//!        bit 2.. kind discriminant
//! ```

use std::io::{Read, Write};

use eyre::Result;
use tokio::io::AsyncRead;

use crate::config::{COLUMN_FLAG_ALLOW_NULL, COLUMN_FLAG_NAME_IS_NULL, COLUMN_KIND_SHIFT};
use crate::encoding::async_io;
use crate::encoding::{WireRead, WireWrite};
use crate::error::SnapError;
use crate::types::{TypeDescriptor, ValueKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    ordinal: usize,
    name: Option<String>,
    kind: ValueKind,
    allow_null: bool,
}

impl ColumnDescriptor {
    pub fn new(ordinal: usize, name: Option<String>, kind: ValueKind, allow_null: bool) -> Self {
        Self {
            ordinal,
            name,
            kind,
            allow_null,
        }
    }

    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn allow_null(&self) -> bool {
        self.allow_null
    }

    pub fn type_descriptor(&self) -> &'static TypeDescriptor {
        TypeDescriptor::get(self.kind)
    }

    pub fn flags(&self) -> u8 {
        let mut flags = self.kind.discriminant() << COLUMN_KIND_SHIFT;
        if self.allow_null {
            flags |= COLUMN_FLAG_ALLOW_NULL;
        }
        if self.name.is_none() {
            flags |= COLUMN_FLAG_NAME_IS_NULL;
        }
        flags
    }

    pub fn serialize<W: Write + ?Sized>(&self, out: &mut W) -> Result<()> {
        out.write_varint_u64(self.ordinal as u64)?;
        out.write_byte(self.flags())?;
        if let Some(name) = &self.name {
            out.write_len_prefixed(name.as_bytes())?;
        }
        Ok(())
    }

    pub fn read<R: Read + ?Sized>(input: &mut R) -> Result<Self> {
        let ordinal = input.read_varint_u32()? as usize;
        let flags = input.read_byte("column flags")?;
        let name = if flags & COLUMN_FLAG_NAME_IS_NULL == 0 {
            Some(input.read_len_prefixed("column name")?)
        } else {
            None
        };
        Self::from_parts(ordinal, flags, name)
    }

    pub async fn read_async<R>(input: &mut R) -> Result<Self>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let ordinal = async_io::read_varint_u32(input).await? as usize;
        let flags = async_io::read_byte(input, "column flags").await?;
        let name = if flags & COLUMN_FLAG_NAME_IS_NULL == 0 {
            let len = async_io::read_len(input).await?;
            Some(async_io::read_vec(input, len, "column name").await?)
        } else {
            None
        };
        Self::from_parts(ordinal, flags, name)
    }

    fn from_parts(ordinal: usize, flags: u8, name: Option<Vec<u8>>) -> Result<Self> {
        let kind = ValueKind::try_from(flags >> COLUMN_KIND_SHIFT)?;
        let name = match name {
            Some(bytes) => Some(String::from_utf8(bytes).map_err(|_| {
                SnapError::Format(format!("column {} name is not valid UTF-8", ordinal))
            })?),
            None => None,
        };
        Ok(Self {
            ordinal,
            name,
            kind,
            allow_null: flags & COLUMN_FLAG_ALLOW_NULL != 0,
        })
    }
}
