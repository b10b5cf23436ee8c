//! # Wire Primitives
//!
//! Two families of helpers share one wire vocabulary:
//!
//! - **Slice cursors** (`take_*`): decode from an in-memory buffer while
//!   advancing an `offset`. Row bodies and value payloads are decoded this way
//!   once their length-prefixed record has been pulled off the stream.
//! - **Stream extensions** ([`WireRead`], [`WireWrite`]): blanket extension
//!   traits over `std::io::Read` / `std::io::Write` used for stream framing
//!   (header, table descriptors, row records) and for writing value payloads
//!   into row buffers.
//!
//! Fixed-width integers and floats are little-endian. Lengths are unsigned
//! varints and are bounded by `MAX_PAYLOAD_LEN`.
//!
//! ## Errors
//!
//! Running out of bytes is always `SnapError::UnexpectedEof` with a short
//! description of what was being read; any other I/O error is propagated with
//! context attached.

use std::io::{self, Read, Write};

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use eyre::{ensure, Result};

use crate::config::{MAX_PAYLOAD_LEN, MAX_VARINT32_LEN, MAX_VARINT64_LEN};
use crate::encoding::varint::{
    decode_varint, decode_varint_u32, encode_varint, zigzag_decode_i32, zigzag_decode_i64,
    zigzag_encode_i32, zigzag_encode_i64, VarintAccumulator,
};
use crate::error::{map_io, SnapError};

// ============================================================================
// Slice cursors
// ============================================================================

pub fn take<'a>(
    data: &'a [u8],
    offset: &mut usize,
    len: usize,
    context: &'static str,
) -> Result<&'a [u8]> {
    let end = offset
        .checked_add(len)
        .filter(|&end| end <= data.len())
        .ok_or(SnapError::UnexpectedEof { context })?;
    let slice = &data[*offset..end];
    *offset = end;
    Ok(slice)
}

pub fn take_array<const N: usize>(
    data: &[u8],
    offset: &mut usize,
    context: &'static str,
) -> Result<[u8; N]> {
    let slice = take(data, offset, N, context)?;
    let mut out = [0u8; N];
    out.copy_from_slice(slice);
    Ok(out)
}

pub fn take_u8(data: &[u8], offset: &mut usize, context: &'static str) -> Result<u8> {
    Ok(take(data, offset, 1, context)?[0])
}

pub fn take_i16(data: &[u8], offset: &mut usize, context: &'static str) -> Result<i16> {
    Ok(LittleEndian::read_i16(take(data, offset, 2, context)?))
}

pub fn take_i32(data: &[u8], offset: &mut usize, context: &'static str) -> Result<i32> {
    Ok(LittleEndian::read_i32(take(data, offset, 4, context)?))
}

pub fn take_u64(data: &[u8], offset: &mut usize, context: &'static str) -> Result<u64> {
    Ok(LittleEndian::read_u64(take(data, offset, 8, context)?))
}

pub fn take_f32(data: &[u8], offset: &mut usize, context: &'static str) -> Result<f32> {
    Ok(LittleEndian::read_f32(take(data, offset, 4, context)?))
}

pub fn take_f64(data: &[u8], offset: &mut usize, context: &'static str) -> Result<f64> {
    Ok(LittleEndian::read_f64(take(data, offset, 8, context)?))
}

fn remaining<'a>(data: &'a [u8], offset: usize) -> &'a [u8] {
    data.get(offset..).unwrap_or(&[])
}

pub fn take_varint(data: &[u8], offset: &mut usize) -> Result<u64> {
    let (value, read) = decode_varint(remaining(data, *offset))?;
    *offset += read;
    Ok(value)
}

pub fn take_varint_u32(data: &[u8], offset: &mut usize) -> Result<u32> {
    let (value, read) = decode_varint_u32(remaining(data, *offset))?;
    *offset += read;
    Ok(value)
}

pub fn take_varint_i64(data: &[u8], offset: &mut usize) -> Result<i64> {
    take_varint(data, offset).map(zigzag_decode_i64)
}

pub fn take_varint_i32(data: &[u8], offset: &mut usize) -> Result<i32> {
    take_varint_u32(data, offset).map(zigzag_decode_i32)
}

pub fn take_len(data: &[u8], offset: &mut usize) -> Result<usize> {
    checked_len(take_varint(data, offset)?)
}

pub fn take_len_prefixed<'a>(
    data: &'a [u8],
    offset: &mut usize,
    context: &'static str,
) -> Result<&'a [u8]> {
    let len = take_len(data, offset)?;
    take(data, offset, len, context)
}

pub(crate) fn checked_len(len: u64) -> Result<usize> {
    ensure!(
        len <= MAX_PAYLOAD_LEN as u64,
        SnapError::Format(format!(
            "length {} exceeds the {} byte payload limit",
            len, MAX_PAYLOAD_LEN
        ))
    );
    Ok(len as usize)
}

// ============================================================================
// Stream extensions
// ============================================================================

pub trait WireRead: Read {
    fn read_byte(&mut self, context: &'static str) -> Result<u8> {
        ReadBytesExt::read_u8(self).map_err(|e| map_io(e, context))
    }

    fn read_varint_u64(&mut self) -> Result<u64> {
        read_varint_with(self, MAX_VARINT64_LEN)
    }

    fn read_varint_u32(&mut self) -> Result<u32> {
        let value = read_varint_with(self, MAX_VARINT32_LEN)?;
        u32::try_from(value).map_err(|_| {
            eyre::Report::new(SnapError::Format(format!(
                "varint value {} overflows 32 bits",
                value
            )))
        })
    }

    fn read_varint_i64(&mut self) -> Result<i64> {
        self.read_varint_u64().map(zigzag_decode_i64)
    }

    fn read_varint_i32(&mut self) -> Result<i32> {
        self.read_varint_u32().map(zigzag_decode_i32)
    }

    fn read_len(&mut self) -> Result<usize> {
        checked_len(self.read_varint_u64()?)
    }

    /// Reads exactly `len` bytes. The buffer grows with the data actually
    /// received, so a corrupt length cannot force a huge up-front allocation.
    fn read_vec(&mut self, len: usize, context: &'static str) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(len.min(64 * 1024));
        Read::take(&mut *self, len as u64)
            .read_to_end(&mut buf)
            .map_err(|e| map_io(e, context))?;
        ensure!(buf.len() == len, SnapError::UnexpectedEof { context });
        Ok(buf)
    }

    fn read_len_prefixed(&mut self, context: &'static str) -> Result<Vec<u8>> {
        let len = self.read_len()?;
        self.read_vec(len, context)
    }

    fn skip_bytes(&mut self, len: usize, context: &'static str) -> Result<()> {
        let copied = io::copy(&mut Read::take(&mut *self, len as u64), &mut io::sink())
            .map_err(|e| map_io(e, context))?;
        ensure!(copied == len as u64, SnapError::UnexpectedEof { context });
        Ok(())
    }
}

impl<R: Read + ?Sized> WireRead for R {}

fn read_varint_with<R: Read + ?Sized>(reader: &mut R, max_len: usize) -> Result<u64> {
    let mut acc = VarintAccumulator::new(max_len);
    loop {
        let byte = ReadBytesExt::read_u8(reader).map_err(|e| map_io(e, "varint"))?;
        if let Some(value) = acc.push(byte)? {
            return Ok(value);
        }
    }
}

pub trait WireWrite: Write {
    fn write_byte(&mut self, value: u8) -> Result<()> {
        WriteBytesExt::write_u8(self, value)?;
        Ok(())
    }

    fn write_varint_u64(&mut self, value: u64) -> Result<()> {
        let mut buf = [0u8; MAX_VARINT64_LEN];
        let n = encode_varint(value, &mut buf);
        self.write_all(&buf[..n])?;
        Ok(())
    }

    fn write_varint_u32(&mut self, value: u32) -> Result<()> {
        self.write_varint_u64(value as u64)
    }

    fn write_varint_i64(&mut self, value: i64) -> Result<()> {
        self.write_varint_u64(zigzag_encode_i64(value))
    }

    fn write_varint_i32(&mut self, value: i32) -> Result<()> {
        self.write_varint_u64(zigzag_encode_i32(value) as u64)
    }

    fn write_i16_le(&mut self, value: i16) -> Result<()> {
        self.write_i16::<LittleEndian>(value)?;
        Ok(())
    }

    fn write_i32_le(&mut self, value: i32) -> Result<()> {
        self.write_i32::<LittleEndian>(value)?;
        Ok(())
    }

    fn write_u64_le(&mut self, value: u64) -> Result<()> {
        self.write_u64::<LittleEndian>(value)?;
        Ok(())
    }

    fn write_f32_le(&mut self, value: f32) -> Result<()> {
        self.write_f32::<LittleEndian>(value)?;
        Ok(())
    }

    fn write_f64_le(&mut self, value: f64) -> Result<()> {
        self.write_f64::<LittleEndian>(value)?;
        Ok(())
    }

    fn write_len_prefixed(&mut self, bytes: &[u8]) -> Result<()> {
        checked_len(bytes.len() as u64)?;
        self.write_varint_u64(bytes.len() as u64)?;
        self.write_all(bytes)?;
        Ok(())
    }
}

impl<W: Write + ?Sized> WireWrite for W {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::snap_error;
    use std::io::Cursor;

    #[test]
    fn take_advances_offset() {
        let data = [1u8, 2, 3, 4, 5];
        let mut offset = 1;
        assert_eq!(take(&data, &mut offset, 3, "test").unwrap(), &[2, 3, 4]);
        assert_eq!(offset, 4);
    }

    #[test]
    fn take_past_end_is_eof_and_leaves_offset() {
        let data = [1u8, 2];
        let mut offset = 1;
        let err = take(&data, &mut offset, 2, "payload").unwrap_err();
        assert_eq!(
            snap_error(&err),
            Some(&SnapError::UnexpectedEof { context: "payload" })
        );
        assert_eq!(offset, 1);
    }

    #[test]
    fn take_varint_at_end_of_buffer_is_eof() {
        let data = [0x05u8];
        let mut offset = 1;
        let err = take_varint(&data, &mut offset).unwrap_err();
        assert!(matches!(
            snap_error(&err),
            Some(SnapError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn stream_and_slice_agree() {
        let mut out = Vec::new();
        out.write_varint_i64(-12345).unwrap();
        out.write_varint_u32(u32::MAX).unwrap();
        out.write_i16_le(-2).unwrap();
        out.write_f64_le(1.5).unwrap();
        out.write_len_prefixed(b"abc").unwrap();

        let mut offset = 0;
        assert_eq!(take_varint_i64(&out, &mut offset).unwrap(), -12345);
        assert_eq!(take_varint_u32(&out, &mut offset).unwrap(), u32::MAX);
        assert_eq!(take_i16(&out, &mut offset, "i16").unwrap(), -2);
        assert_eq!(take_f64(&out, &mut offset, "f64").unwrap(), 1.5);
        assert_eq!(take_len_prefixed(&out, &mut offset, "bytes").unwrap(), b"abc");
        assert_eq!(offset, out.len());

        let mut cursor = Cursor::new(&out);
        assert_eq!(cursor.read_varint_i64().unwrap(), -12345);
        assert_eq!(cursor.read_varint_u32().unwrap(), u32::MAX);
        cursor.skip_bytes(2 + 8, "fixed").unwrap();
        assert_eq!(cursor.read_len_prefixed("bytes").unwrap(), b"abc");
    }

    #[test]
    fn read_vec_short_stream_is_eof() {
        let mut cursor = Cursor::new(vec![1u8, 2, 3]);
        let err = cursor.read_vec(10, "row body").unwrap_err();
        assert_eq!(
            snap_error(&err),
            Some(&SnapError::UnexpectedEof { context: "row body" })
        );
    }

    #[test]
    fn skip_bytes_short_stream_is_eof() {
        let mut cursor = Cursor::new(vec![1u8, 2, 3]);
        let err = cursor.skip_bytes(4, "row skip").unwrap_err();
        assert!(matches!(
            snap_error(&err),
            Some(SnapError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn stream_varint_unterminated_is_eof() {
        let mut cursor = Cursor::new(vec![0x80u8, 0x80]);
        let err = cursor.read_varint_u64().unwrap_err();
        assert!(matches!(
            snap_error(&err),
            Some(SnapError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn oversized_length_is_format_error() {
        let mut out = Vec::new();
        out.write_varint_u64(MAX_PAYLOAD_LEN as u64 + 1).unwrap();
        let mut offset = 0;
        let err = take_len(&out, &mut offset).unwrap_err();
        assert!(matches!(snap_error(&err), Some(SnapError::Format(_))));
    }
}
