#![cfg(all(feature = "png", feature = "bmp", feature = "ico"))]

use std::io::Cursor;

use enough::Unstoppable;
use proptest::prelude::*;
use zenraster::huffman::{BitSource, HuffmanTable, assign_codes};
use zenraster::*;

/// Formats both PNG and BMP encode and decode losslessly.
fn format_strategy() -> impl Strategy<Value = PixelFormat> {
    prop_oneof![
        Just(PixelFormat::Indexed1),
        Just(PixelFormat::Indexed4),
        Just(PixelFormat::Indexed8),
        Just(PixelFormat::Gray8),
        Just(PixelFormat::Rgb24),
        Just(PixelFormat::Rgba32),
    ]
}

fn image_strategy() -> impl Strategy<Value = PixelBuffer> {
    (format_strategy(), 1u32..40, 1u32..24).prop_flat_map(|(format, w, h)| {
        let len = packed_stride(w, format.bits_per_pixel()) * h as usize;
        prop::collection::vec(any::<u8>(), len).prop_map(move |bytes| {
            let img = PixelBuffer::from_bytes(w, h, format, bytes).unwrap();
            if format.is_indexed() {
                img.with_palette(Palette::grayscale(format.bits_per_pixel()))
            } else {
                img
            }
        })
    })
}

struct Bits {
    bits: Vec<u8>,
    pos: usize,
}

impl BitSource for Bits {
    fn read_bit(&mut self) -> Result<u8, RasterError> {
        let bit = *self.bits.get(self.pos).ok_or(RasterError::UnexpectedEof)?;
        self.pos += 1;
        Ok(bit)
    }
}

/// Code-length counts satisfying the Kraft inequality.
fn counts_strategy() -> impl Strategy<Value = [u8; 16]> {
    prop::collection::vec(1u8..=16, 1..60).prop_filter_map("over-subscribed", |lengths| {
        let kraft: u32 = lengths.iter().map(|&l| 1u32 << (16 - l)).sum();
        if kraft > 1 << 16 {
            return None;
        }
        let mut counts = [0u8; 16];
        for l in lengths {
            counts[usize::from(l) - 1] += 1;
        }
        Some(counts)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_png_roundtrip(img in image_strategy()) {
        let mut out = Vec::new();
        encode_png(&img, &mut out, Unstoppable).unwrap();
        let decoded = decode_png(&mut Cursor::new(out), Unstoppable).unwrap();
        prop_assert_eq!(decoded, img);
    }

    #[test]
    fn prop_bmp_roundtrip(img in image_strategy()) {
        let mut out = Vec::new();
        encode_bmp(&img, &mut out, Unstoppable).unwrap();
        let decoded = decode_bmp(&mut Cursor::new(out), Unstoppable).unwrap();
        prop_assert_eq!(decoded, img);
    }

    #[test]
    fn prop_decode_never_panics_and_rewinds(data in prop::collection::vec(any::<u8>(), 0..512)) {
        let limits = Limits { max_memory_bytes: Some(1 << 24), ..Default::default() };
        let mut cursor = Cursor::new(data);
        if DecodeRequest::new().with_limits(&limits).decode(&mut cursor, Unstoppable).is_err() {
            prop_assert_eq!(cursor.position(), 0);
        }
    }

    #[test]
    fn prop_truncation_fails_and_rewinds(
        img in image_strategy(),
        cut in any::<prop::sample::Index>(),
    ) {
        for request in [EncodeRequest::png(), EncodeRequest::bmp(), EncodeRequest::ico()] {
            let bytes = request.encode(&img, Unstoppable).unwrap();
            let cut = cut.index(bytes.len());
            let mut cursor = Cursor::new(&bytes[..cut]);
            prop_assert!(decode(&mut cursor, Unstoppable).is_err());
            prop_assert_eq!(cursor.position(), 0);
        }
    }

    #[test]
    fn prop_canonical_codes_are_prefix_free(counts in counts_strategy()) {
        let codes = assign_codes(&counts).unwrap();
        let total: usize = counts.iter().map(|&c| usize::from(c)).sum();
        prop_assert_eq!(codes.len(), total);
        for pair in codes.windows(2) {
            // Non-decreasing length; consecutive codes within a length.
            prop_assert!(pair[0].length <= pair[1].length);
            if pair[0].length == pair[1].length {
                prop_assert_eq!(pair[0].code + 1, pair[1].code);
            }
        }
        for a in &codes {
            prop_assert!(u32::from(a.code) < 1 << a.length);
            for b in &codes {
                if a.symbol != b.symbol && a.length <= b.length {
                    prop_assert_ne!(b.code >> (b.length - a.length), a.code);
                }
            }
        }
    }

    #[test]
    fn prop_huffman_decodes_its_own_codes(
        counts in counts_strategy(),
        picks in prop::collection::vec(any::<prop::sample::Index>(), 1..20),
    ) {
        let codes = assign_codes(&counts).unwrap();
        let symbols: Vec<u8> = (0..codes.len()).map(|i| (i * 7) as u8).collect();
        let table = HuffmanTable::from_counts(&counts, &symbols).unwrap();

        let mut bits = Vec::new();
        let mut expected = Vec::new();
        for pick in &picks {
            let code = codes[pick.index(codes.len())];
            for i in (0..code.length).rev() {
                bits.push(((code.code >> i) & 1) as u8);
            }
            expected.push(symbols[usize::from(code.symbol)]);
        }
        let mut src = Bits { bits, pos: 0 };
        for &want in &expected {
            prop_assert_eq!(table.decode_symbol(&mut src).unwrap(), want);
        }
        prop_assert_eq!(src.pos, src.bits.len());
    }
}
