//! Fuzz testing for the snapshot reader.
//!
//! Feeds arbitrary bytes to `SnapshotReader` and walks every result set,
//! touching every column of every row. Malformed input must surface as an
//! error, never as a panic or an unbounded allocation.

#![no_main]

use libfuzzer_sys::fuzz_target;
use std::io::Cursor;

use sqlsnap::SnapshotReader;

fuzz_target!(|data: &[u8]| {
    let Ok(mut reader) = SnapshotReader::new(Cursor::new(data)) else {
        return;
    };

    loop {
        loop {
            match reader.read() {
                Ok(true) => {
                    let count = reader.field_count().unwrap_or(0);
                    for ordinal in 0..count {
                        let _ = reader.value(ordinal);
                        let _ = reader.data_type_name(ordinal);
                    }
                }
                Ok(false) | Err(_) => break,
            }
        }
        match reader.next_result() {
            Ok(true) => continue,
            Ok(false) | Err(_) => break,
        }
    }

    reader.close();
    assert!(reader.is_closed());
});
