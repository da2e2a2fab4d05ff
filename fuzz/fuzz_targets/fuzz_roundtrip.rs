#![no_main]
use std::io::Cursor;

use libfuzzer_sys::fuzz_target;
use zenraster::*;

fuzz_target!(|data: &[u8]| {
    // If we can decode it, re-encoding and decoding again must produce identical pixels
    let limits = Limits {
        max_pixels: Some(1 << 20),
        max_memory_bytes: Some(1 << 24),
        ..Default::default()
    };
    let Ok(decoded) = DecodeRequest::new()
        .with_limits(&limits)
        .decode(&mut Cursor::new(data), enough::Unstoppable)
    else {
        return;
    };

    let format = decoded.format();
    let images = match decoded {
        Decoded::Png(image) | Decoded::Bmp(image) => vec![image],
        Decoded::Ico(images) => images,
        _ => return, // JPEG headers only
    };

    let request = match format {
        ImageFormat::Png => EncodeRequest::png(),
        ImageFormat::Bmp => EncodeRequest::bmp(),
        _ => EncodeRequest::ico(),
    };
    let Ok(reencoded) = request.encode_all(&images, enough::Unstoppable) else {
        return;
    };
    let Ok(decoded2) = decode(&mut Cursor::new(&reencoded), enough::Unstoppable) else {
        panic!("re-encoded data failed to decode");
    };

    let images2 = match decoded2 {
        Decoded::Png(image) | Decoded::Bmp(image) => vec![image],
        Decoded::Ico(images) => images,
        _ => panic!("re-encoded data changed format"),
    };
    assert_eq!(images.len(), images2.len());
    for (a, b) in images.iter().zip(&images2) {
        assert_eq!(a.width(), b.width());
        assert_eq!(a.height(), b.height());
        // ICO entries without alpha go through a DIB, which drops palette alpha.
        if format != ImageFormat::Ico {
            assert_eq!(a, b, "roundtrip pixel mismatch");
        }
    }
});
