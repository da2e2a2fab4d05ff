//! BMP decoder and encoder (internal).
//!
//! Use top-level [`crate::decode_bmp`], [`crate::encode_bmp`], etc. The DIB
//! entry points serve ICO/CUR entries, which store a BMP without its file
//! header.

mod decode;
mod encode;
mod utils;

use std::io::{Read, Seek, Write};

use enough::Stop;

use crate::buffer::PixelBuffer;
use crate::error::RasterError;
use crate::limits::Limits;
use crate::stream::with_rewind;

#[cfg(feature = "ico")]
pub(crate) use decode::INFO_HEADER_SIZES;

/// Decode a BMP file, rewinding the stream on failure.
///
/// With `native_order`, 24/32-bit images come back as BGR(A) instead of
/// RGB(A).
pub(crate) fn decode<R: Read + Seek + ?Sized>(
    reader: &mut R,
    limits: Option<&Limits>,
    native_order: bool,
    stop: &dyn Stop,
) -> Result<PixelBuffer, RasterError> {
    with_rewind(reader, |r| decode::decode_bmp(r, limits, native_order, stop))
}

/// Decode an ICO/CUR DIB entry, rewinding the stream on failure.
#[cfg(feature = "ico")]
pub(crate) fn decode_dib<R: Read + Seek + ?Sized>(
    reader: &mut R,
    limits: Option<&Limits>,
    stop: &dyn Stop,
) -> Result<PixelBuffer, RasterError> {
    with_rewind(reader, |r| decode::decode_dib(r, limits, stop))
}

/// Encode to BMP.
pub(crate) fn encode<W: Write + ?Sized>(
    buffer: &PixelBuffer,
    writer: &mut W,
    stop: &dyn Stop,
) -> Result<(), RasterError> {
    encode::encode_bmp(buffer, writer, stop)
}

/// Encode as an ICO/CUR DIB entry.
#[cfg(feature = "ico")]
pub(crate) fn encode_dib<W: Write + ?Sized>(
    buffer: &PixelBuffer,
    writer: &mut W,
    stop: &dyn Stop,
) -> Result<(), RasterError> {
    encode::encode_dib(buffer, writer, stop)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixel::{Palette, PixelFormat};
    use enough::Unstoppable;
    use rgb::RGBA8;
    use std::io::Cursor;

    fn encode_vec(buffer: &PixelBuffer) -> Vec<u8> {
        let mut out = Vec::new();
        encode(buffer, &mut out, &Unstoppable).unwrap();
        out
    }

    fn decode_vec(data: &[u8]) -> Result<PixelBuffer, RasterError> {
        decode(&mut Cursor::new(data), None, false, &Unstoppable)
    }

    fn rgba_pattern(w: u32, h: u32) -> PixelBuffer {
        let data = (0..w * h * 4).map(|i| (i * 37 % 256) as u8).collect();
        PixelBuffer::from_bytes(w, h, PixelFormat::Rgba32, data).unwrap()
    }

    #[test]
    fn header_fields_at_fixed_offsets() {
        let bmp = encode_vec(&rgba_pattern(3, 2));
        assert_eq!(&bmp[..2], b"BM");
        assert_eq!(u32::from_le_bytes(bmp[2..6].try_into().unwrap()), 54 + 24);
        assert_eq!(u32::from_le_bytes(bmp[10..14].try_into().unwrap()), 54);
        assert_eq!(u32::from_le_bytes(bmp[14..18].try_into().unwrap()), 40);
        assert_eq!(i32::from_le_bytes(bmp[18..22].try_into().unwrap()), 3);
        assert_eq!(i32::from_le_bytes(bmp[22..26].try_into().unwrap()), 2);
        assert_eq!(u16::from_le_bytes(bmp[28..30].try_into().unwrap()), 32);
    }

    #[test]
    fn rgba_roundtrip() {
        let buf = rgba_pattern(5, 3);
        let decoded = decode_vec(&encode_vec(&buf)).unwrap();
        assert_eq!(decoded, buf);
        assert_eq!(decoded.stride(), 20);
    }

    #[test]
    fn native_order_keeps_bgr() {
        let buf =
            PixelBuffer::from_bytes(2, 1, PixelFormat::Rgb24, vec![1, 2, 3, 4, 5, 6]).unwrap();
        let bmp = encode_vec(&buf);
        let native = decode(&mut Cursor::new(&bmp[..]), None, true, &Unstoppable).unwrap();
        assert_eq!(native.format(), PixelFormat::Bgr24);
        assert_eq!(native.row(0), &[3, 2, 1, 6, 5, 4]);
        assert_eq!(native.stride(), 8);
    }

    #[test]
    fn top_down_matches_bottom_up() {
        let buf = rgba_pattern(4, 3);
        let bottom_up = encode_vec(&buf);

        // Rewrite as top-down: negate the height and reverse the rows.
        let mut top_down = bottom_up[..54].to_vec();
        top_down[22..26].copy_from_slice(&(-3i32).to_le_bytes());
        for row in bottom_up[54..].chunks(16).rev() {
            top_down.extend_from_slice(row);
        }

        assert_eq!(decode_vec(&bottom_up).unwrap(), decode_vec(&top_down).unwrap());
    }

    #[test]
    fn indexed_roundtrip_with_padding() {
        let palette = Palette::from_entries(
            1,
            &[RGBA8::new(10, 20, 30, 255), RGBA8::new(200, 100, 50, 255)],
        )
        .unwrap();
        let data = vec![0b1010_0000, 0b0100_0000];
        let buf = PixelBuffer::from_bytes(3, 2, PixelFormat::Indexed1, data)
            .unwrap()
            .with_palette(palette);
        let bmp = encode_vec(&buf);
        assert_eq!(bmp.len(), 54 + 8 + 8);
        let decoded = decode_vec(&bmp).unwrap();
        assert_eq!(decoded, buf);
        assert_eq!(decoded.stride(), 4);
    }

    #[test]
    fn gray8_has_no_palette() {
        let buf = PixelBuffer::from_bytes(3, 1, PixelFormat::Gray8, vec![0, 128, 255]).unwrap();
        let bmp = encode_vec(&buf);
        assert_eq!(bmp.len(), 54 + 4);
        assert_eq!(decode_vec(&bmp).unwrap(), buf);
    }

    #[test]
    fn legacy_signature_accepted() {
        let buf = rgba_pattern(2, 2);
        let mut bmp = encode_vec(&buf);
        bmp[..2].copy_from_slice(b"CI");
        assert_eq!(decode_vec(&bmp).unwrap(), buf);
        bmp[..2].copy_from_slice(b"XY");
        assert!(matches!(decode_vec(&bmp), Err(RasterError::UnrecognizedFormat)));
    }

    #[test]
    fn oversized_palette_rejected() {
        let entries: Vec<RGBA8> = (0..40).map(|i| RGBA8::new(i, 0, 0, 255)).collect();
        let buf = PixelBuffer::new(4, 4, PixelFormat::Indexed4)
            .unwrap()
            .with_palette(Palette::from_entries(8, &entries).unwrap());
        let mut out = Vec::new();
        assert!(matches!(
            encode(&buf, &mut out, &Unstoppable),
            Err(RasterError::PaletteOverflow { capacity: 16 })
        ));
        assert!(out.is_empty());
    }

    #[test]
    fn huge_header_without_pixels_is_eof() {
        let mut bmp = Vec::new();
        bmp.extend_from_slice(b"BM");
        bmp.extend_from_slice(&54u32.to_le_bytes());
        bmp.extend_from_slice(&[0; 4]);
        bmp.extend_from_slice(&54u32.to_le_bytes());
        bmp.extend_from_slice(&40u32.to_le_bytes());
        bmp.extend_from_slice(&200_000i32.to_le_bytes());
        bmp.extend_from_slice(&200_000i32.to_le_bytes());
        bmp.extend_from_slice(&1u16.to_le_bytes());
        bmp.extend_from_slice(&32u16.to_le_bytes());
        bmp.resize(54, 0);

        let mut cursor = Cursor::new(&bmp[..]);
        let err = decode(&mut cursor, None, false, &Unstoppable).unwrap_err();
        assert!(matches!(err, RasterError::UnexpectedEof));
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn short_pixel_data_rewinds() {
        let bmp = encode_vec(&rgba_pattern(4, 4));
        let mut cursor = Cursor::new(&bmp[..bmp.len() - 5]);
        let err = decode(&mut cursor, None, false, &Unstoppable).unwrap_err();
        assert!(matches!(err, RasterError::UnexpectedEof));
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn x1r5g5b5_expands() {
        let mut bmp = Vec::new();
        bmp.extend_from_slice(b"BM");
        bmp.extend_from_slice(&(54u32 + 4).to_le_bytes());
        bmp.extend_from_slice(&[0; 4]);
        bmp.extend_from_slice(&54u32.to_le_bytes());
        bmp.extend_from_slice(&40u32.to_le_bytes());
        bmp.extend_from_slice(&2i32.to_le_bytes());
        bmp.extend_from_slice(&1i32.to_le_bytes());
        bmp.extend_from_slice(&1u16.to_le_bytes());
        bmp.extend_from_slice(&16u16.to_le_bytes());
        bmp.resize(54, 0);
        bmp.extend_from_slice(&0x7C00u16.to_le_bytes());
        bmp.extend_from_slice(&0x03E0u16.to_le_bytes());
        let decoded = decode_vec(&bmp).unwrap();
        assert_eq!(decoded.format(), PixelFormat::Rgb24);
        assert_eq!(decoded.row(0), &[255, 0, 0, 0, 255, 0]);
    }

    #[cfg(feature = "ico")]
    #[test]
    fn dib_roundtrip_halves_height() {
        let buf = PixelBuffer::from_bytes(3, 2, PixelFormat::Rgb24, (0..18).collect()).unwrap();
        let mut dib = Vec::new();
        encode_dib(&buf, &mut dib, &Unstoppable).unwrap();
        assert_eq!(i32::from_le_bytes(dib[8..12].try_into().unwrap()), 4);
        // header + XOR plane + AND mask
        assert_eq!(dib.len(), 40 + 12 * 2 + 4 * 2);
        let decoded = decode_dib(&mut Cursor::new(dib), None, &Unstoppable).unwrap();
        assert_eq!(decoded, buf);
    }
}
