//! Fuzz testing for the varint codec.
//!
//! Decoding arbitrary bytes must never panic, and every value that decodes
//! must re-encode minimally to a prefix of the input.

#![no_main]

use libfuzzer_sys::fuzz_target;

use sqlsnap::encoding::varint::{decode_varint, encode_varint, varint_len};

fuzz_target!(|data: &[u8]| {
    let Ok((value, consumed)) = decode_varint(data) else {
        return;
    };

    let mut buf = [0u8; 10];
    let len = encode_varint(value, &mut buf);
    assert_eq!(len, varint_len(value));
    assert!(len <= consumed);
    if len == consumed {
        assert_eq!(&buf[..len], &data[..consumed]);
    }
});
