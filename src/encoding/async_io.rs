//! # Async Wire Primitives
//!
//! Non-blocking counterparts of [`WireRead`](super::io::WireRead) /
//! [`WireWrite`](super::io::WireWrite) over `tokio::io`. Byte layouts are
//! identical: anything written with one family decodes with the other.
//!
//! ## Cancellation
//!
//! Writers take a `CancellationToken` and check it before every discrete write
//! ([`write_chunk`]). A value is never split: cancellation is observed between
//! header, descriptor and row records, never inside one.

use eyre::{bail, ensure, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::config::{MAX_VARINT32_LEN, MAX_VARINT64_LEN};
use crate::encoding::io::checked_len;
use crate::encoding::varint::{
    encode_varint, zigzag_decode_i32, zigzag_decode_i64, zigzag_encode_i64, VarintAccumulator,
};
use crate::error::{map_io, SnapError};

pub async fn read_byte<R>(reader: &mut R, context: &'static str) -> Result<u8>
where
    R: AsyncRead + Unpin + ?Sized,
{
    reader.read_u8().await.map_err(|e| map_io(e, context))
}

async fn read_varint_with<R>(reader: &mut R, max_len: usize) -> Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut acc = VarintAccumulator::new(max_len);
    loop {
        let byte = read_byte(reader, "varint").await?;
        if let Some(value) = acc.push(byte)? {
            return Ok(value);
        }
    }
}

pub async fn read_varint_u64<R>(reader: &mut R) -> Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
{
    read_varint_with(reader, MAX_VARINT64_LEN).await
}

pub async fn read_varint_u32<R>(reader: &mut R) -> Result<u32>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let value = read_varint_with(reader, MAX_VARINT32_LEN).await?;
    match u32::try_from(value) {
        Ok(v) => Ok(v),
        Err(_) => bail!(SnapError::Format(format!(
            "varint value {} overflows 32 bits",
            value
        ))),
    }
}

pub async fn read_varint_i64<R>(reader: &mut R) -> Result<i64>
where
    R: AsyncRead + Unpin + ?Sized,
{
    read_varint_u64(reader).await.map(zigzag_decode_i64)
}

pub async fn read_varint_i32<R>(reader: &mut R) -> Result<i32>
where
    R: AsyncRead + Unpin + ?Sized,
{
    read_varint_u32(reader).await.map(zigzag_decode_i32)
}

pub async fn read_len<R>(reader: &mut R) -> Result<usize>
where
    R: AsyncRead + Unpin + ?Sized,
{
    checked_len(read_varint_u64(reader).await?)
}

pub async fn read_vec<R>(reader: &mut R, len: usize, context: &'static str) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buf = Vec::with_capacity(len.min(64 * 1024));
    (&mut *reader)
        .take(len as u64)
        .read_to_end(&mut buf)
        .await
        .map_err(|e| map_io(e, context))?;
    ensure!(buf.len() == len, SnapError::UnexpectedEof { context });
    Ok(buf)
}

pub async fn skip_bytes<R>(reader: &mut R, len: usize, context: &'static str) -> Result<()>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut limited = (&mut *reader).take(len as u64);
    let copied = tokio::io::copy(&mut limited, &mut tokio::io::sink())
        .await
        .map_err(|e| map_io(e, context))?;
    ensure!(copied == len as u64, SnapError::UnexpectedEof { context });
    Ok(())
}

pub async fn write_varint_u64<W>(writer: &mut W, value: u64) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buf = [0u8; MAX_VARINT64_LEN];
    let n = encode_varint(value, &mut buf);
    writer.write_all(&buf[..n]).await?;
    Ok(())
}

pub async fn write_varint_i64<W>(writer: &mut W, value: i64) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    write_varint_u64(writer, zigzag_encode_i64(value)).await
}

pub fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        bail!(SnapError::Cancelled);
    }
    Ok(())
}

/// Writes one complete record after checking for cancellation.
pub async fn write_chunk<W>(writer: &mut W, bytes: &[u8], cancel: &CancellationToken) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    check_cancelled(cancel)?;
    writer.write_all(bytes).await?;
    Ok(())
}
