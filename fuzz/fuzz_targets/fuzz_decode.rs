#![no_main]
use std::io::Cursor;

use libfuzzer_sys::fuzz_target;
use zenraster::{DecodeRequest, Limits};

fuzz_target!(|data: &[u8]| {
    let limits = Limits {
        max_pixels: Some(1 << 22),
        max_memory_bytes: Some(1 << 26),
        ..Default::default()
    };
    let request = DecodeRequest::new().with_limits(&limits);

    // Auto-detect, then every format explicitly: must never panic, and a
    // failed decode must leave the stream where it started.
    let mut cursor = Cursor::new(data);
    if request.decode(&mut cursor, enough::Unstoppable).is_err() {
        assert_eq!(cursor.position(), 0);
    }
    let _ = request.decode_png(&mut Cursor::new(data), enough::Unstoppable);
    let _ = request.decode_bmp(&mut Cursor::new(data), enough::Unstoppable);
    let _ = request.decode_ico(&mut Cursor::new(data), enough::Unstoppable);
    let _ = request.parse_jpeg(&mut Cursor::new(data), enough::Unstoppable);
});
