//! # Stream Header
//!
//! First record of every snapshot: `version:u8`, then records affected and
//! nesting depth as zig-zag varints. The version must equal
//! [`PROTOCOL_VERSION`]; there is no compatibility path for other versions.

use std::io::{Read, Write};

use eyre::{bail, Result};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;

use crate::config::PROTOCOL_VERSION;
use crate::encoding::async_io;
use crate::encoding::{WireRead, WireWrite};
use crate::error::SnapError;
use crate::source::RowSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    version: u8,
    records_affected: i32,
    depth: i32,
}

impl Header {
    pub fn new(records_affected: i32, depth: i32) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            records_affected,
            depth,
        }
    }

    pub fn from_source<S: RowSource + ?Sized>(source: &S) -> Self {
        Self::new(source.records_affected(), source.depth())
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    /// Rows changed by the statement, or -1 when not applicable.
    pub fn records_affected(&self) -> i32 {
        self.records_affected
    }

    pub fn depth(&self) -> i32 {
        self.depth
    }

    fn check_version(found: u8) -> Result<()> {
        if found != PROTOCOL_VERSION {
            bail!(SnapError::ProtocolVersion {
                expected: PROTOCOL_VERSION,
                found,
            });
        }
        Ok(())
    }

    pub fn read<R: Read + ?Sized>(input: &mut R) -> Result<Self> {
        let version = input.read_byte("header version")?;
        Self::check_version(version)?;
        let records_affected = input.read_varint_i32()?;
        let depth = input.read_varint_i32()?;
        Ok(Self {
            version,
            records_affected,
            depth,
        })
    }

    pub async fn read_async<R>(input: &mut R) -> Result<Self>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let version = async_io::read_byte(input, "header version").await?;
        Self::check_version(version)?;
        let records_affected = async_io::read_varint_i32(input).await?;
        let depth = async_io::read_varint_i32(input).await?;
        Ok(Self {
            version,
            records_affected,
            depth,
        })
    }

    pub fn serialize<W: Write + ?Sized>(&self, out: &mut W) -> Result<()> {
        out.write_byte(self.version)?;
        out.write_varint_i32(self.records_affected)?;
        out.write_varint_i32(self.depth)
    }

    /// Writes the header as one chunk, unless `cancel` has already fired.
    pub async fn write_async<W>(&self, out: &mut W, cancel: &CancellationToken) -> Result<()>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let mut buf = Vec::with_capacity(11);
        self.serialize(&mut buf)?;
        async_io::write_chunk(out, &buf, cancel).await
    }
}
