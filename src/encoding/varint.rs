//! # Variable-Length Integer Encoding
//!
//! Every length field, count field, 32/64-bit integer column and date/time tick
//! count in a snapshot stream is written with this encoding.
//!
//! ## Encoding Format
//!
//! Each byte carries 7 data bits, least-significant group first, and uses its
//! high bit as a continuation flag:
//!
//! ```text
//! value 300 = 0b1_0010_1100
//!
//!   byte 0: 1 0101100   (continuation, low 7 bits)
//!   byte 1: 0 0000010   (last byte, next 7 bits)
//! ```
//!
//! | Value Range                 | Bytes |
//! |-----------------------------|-------|
//! | 0 - 127                     | 1     |
//! | 128 - 16383                 | 2     |
//! | 16384 - 2097151             | 3     |
//! | 2097152 - 268435455         | 4     |
//! | 268435456 - u32::MAX        | 5     |
//! | ... - u64::MAX              | 10    |
//!
//! Encoding stops as soon as the remaining magnitude is zero, so encodings are
//! always minimal.
//!
//! ## Signed Values
//!
//! Signed integers are mapped with zig-zag before byte encoding so small
//! magnitudes of either sign stay short:
//!
//! ```text
//!  0 -> 0,  -1 -> 1,  1 -> 2,  -2 -> 3,  2 -> 4, ...
//! ```
//!
//! ## Usage Example
//!
//! ```rust
//! use sqlsnap::encoding::varint::{decode_varint, encode_varint, varint_len};
//!
//! let mut buf = [0u8; 10];
//! let written = encode_varint(300, &mut buf);
//! assert_eq!(written, 2);
//! assert_eq!(varint_len(300), 2);
//!
//! let (value, read) = decode_varint(&buf[..written]).unwrap();
//! assert_eq!((value, read), (300, 2));
//! ```
//!
//! ## Error Handling
//!
//! - A sequence whose continuation bit never clears before the buffer ends
//!   raises `SnapError::UnexpectedEof`.
//! - A sequence longer than the target width allows (5 bytes for 32-bit,
//!   10 bytes for 64-bit) or whose value overflows the width raises
//!   `SnapError::Format`.

use eyre::{bail, Result};

use crate::config::{
    MAX_VARINT32_LEN, MAX_VARINT64_LEN, VARINT_CONTINUATION_BIT, VARINT_DATA_MASK,
};
use crate::error::SnapError;

pub fn varint_len(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.div_ceil(7).max(1)
}

pub fn encode_varint(mut value: u64, buf: &mut [u8]) -> usize {
    let mut i = 0;
    loop {
        let byte = (value as u8) & VARINT_DATA_MASK;
        value >>= 7;
        if value == 0 {
            buf[i] = byte;
            return i + 1;
        }
        buf[i] = byte | VARINT_CONTINUATION_BIT;
        i += 1;
    }
}

pub fn decode_varint(buf: &[u8]) -> Result<(u64, usize)> {
    let mut value = 0u64;
    for (i, &byte) in buf.iter().enumerate() {
        if i == MAX_VARINT64_LEN - 1 && byte > 1 {
            bail!(SnapError::Format("varint overflows 64 bits".into()));
        }
        value |= ((byte & VARINT_DATA_MASK) as u64) << (7 * i);
        if byte & VARINT_CONTINUATION_BIT == 0 {
            return Ok((value, i + 1));
        }
    }
    bail!(SnapError::UnexpectedEof { context: "varint" })
}

pub fn decode_varint_u32(buf: &[u8]) -> Result<(u32, usize)> {
    let limit = buf.len().min(MAX_VARINT32_LEN);
    let (value, read) = match decode_varint(&buf[..limit]) {
        Ok(decoded) => decoded,
        Err(_) if buf.len() > MAX_VARINT32_LEN => {
            bail!(SnapError::Format(
                "varint exceeds 5 bytes for a 32-bit value".into()
            ))
        }
        Err(e) => return Err(e),
    };
    let narrowed = u32::try_from(value)
        .map_err(|_| SnapError::Format(format!("varint value {} overflows 32 bits", value)))?;
    Ok((narrowed, read))
}

#[inline]
pub fn zigzag_encode_i64(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

#[inline]
pub fn zigzag_decode_i64(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

#[inline]
pub fn zigzag_encode_i32(value: i32) -> u32 {
    ((value << 1) ^ (value >> 31)) as u32
}

#[inline]
pub fn zigzag_decode_i32(value: u32) -> i32 {
    ((value >> 1) as i32) ^ -((value & 1) as i32)
}

/// Incremental decoder for byte-at-a-time sources (streams, async readers).
///
/// Feed bytes with [`VarintAccumulator::push`] until it returns `Some`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct VarintAccumulator {
    value: u64,
    count: usize,
    max_len: usize,
}

impl VarintAccumulator {
    pub(crate) fn new(max_len: usize) -> Self {
        Self {
            value: 0,
            count: 0,
            max_len,
        }
    }

    pub(crate) fn push(&mut self, byte: u8) -> Result<Option<u64>> {
        if self.count == MAX_VARINT64_LEN - 1 && byte > 1 {
            bail!(SnapError::Format("varint overflows 64 bits".into()));
        }
        self.value |= ((byte & VARINT_DATA_MASK) as u64) << (7 * self.count);
        self.count += 1;
        if byte & VARINT_CONTINUATION_BIT == 0 {
            return Ok(Some(self.value));
        }
        if self.count >= self.max_len {
            bail!(SnapError::Format(format!(
                "varint exceeds {} bytes",
                self.max_len
            )));
        }
        Ok(None)
    }
}
