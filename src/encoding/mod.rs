//! # Encoding Module
//!
//! Low-level wire primitives shared by every snapshot record:
//!
//! - **Varint encoding**: 7-bit continuation integers with zig-zag for signed
//!   values, used for all lengths, counts, integer columns and tick counts
//! - **Wire I/O**: slice cursors and `std::io` extension traits for fixed-width
//!   little-endian values and length-prefixed payloads
//! - **Async wire I/O**: the same vocabulary over `tokio::io`, with cooperative
//!   cancellation on the write side

pub mod async_io;
pub mod io;
pub mod varint;

pub use io::{WireRead, WireWrite};
pub use varint::{decode_varint, encode_varint, varint_len};
