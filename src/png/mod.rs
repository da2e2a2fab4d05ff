//! PNG decoder and encoder (internal).
//!
//! Supports 1/2/4/8-bit grayscale and indexed images, 8-bit RGB and RGBA,
//! non-interlaced. Use top-level [`crate::decode_png`], [`crate::encode_png`].

mod decode;
mod encode;
mod filter;
mod inflate;

use std::io::{Read, Seek, Write};

use enough::Stop;

use crate::buffer::PixelBuffer;
use crate::error::RasterError;
use crate::limits::Limits;
use crate::stream::with_rewind;

/// The 8-byte PNG file signature.
pub(crate) const SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Largest chunk length and image dimension PNG allows (2^31 - 1).
pub(crate) const MAX_CHUNK_LEN: u32 = 0x7FFF_FFFF;

/// Decode a PNG, rewinding the stream on failure.
pub(crate) fn decode<R: Read + Seek + ?Sized>(
    reader: &mut R,
    limits: Option<&Limits>,
    stop: &dyn Stop,
) -> Result<PixelBuffer, RasterError> {
    with_rewind(reader, |r| decode::decode_png(r, limits, stop))
}

/// Encode to PNG.
pub(crate) fn encode<W: Write + ?Sized>(
    buffer: &PixelBuffer,
    writer: &mut W,
    stop: &dyn Stop,
) -> Result<(), RasterError> {
    encode::encode_png(buffer, writer, stop)
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
        decode(&mut Cursor::new(data), None, &Unstoppable)
    }

    fn chunk(out: &mut Vec<u8>, kind: &[u8; 4], payload: &[u8]) {
        let mut digest = crc_fast::Digest::new(crc_fast::CrcAlgorithm::Crc32IsoHdlc);
        digest.update(kind);
        digest.update(payload);
        out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        out.extend_from_slice(kind);
        out.extend_from_slice(payload);
        out.extend_from_slice(&(digest.finalize() as u32).to_be_bytes());
    }

    /// Byte offset of the first payload byte of chunk `kind`.
    fn chunk_payload_offset(png: &[u8], kind: &[u8; 4]) -> usize {
        let mut pos = 8;
        loop {
            let len = u32::from_be_bytes(png[pos..pos + 4].try_into().unwrap()) as usize;
            if &png[pos + 4..pos + 8] == kind {
                return pos + 8;
            }
            pos += 12 + len;
        }
    }

    #[test]
    fn indexed_roundtrip_keeps_palette() {
        let palette = Palette::from_entries(
            8,
            &[
                RGBA8::new(255, 0, 0, 255),
                RGBA8::new(0, 255, 0, 128),
                RGBA8::new(0, 0, 255, 0),
            ],
        )
        .unwrap();
        let data: Vec<u8> = (0..20u8).map(|i| i % 3).collect();
        let buf = PixelBuffer::from_bytes(5, 4, PixelFormat::Indexed8, data)
            .unwrap()
            .with_palette(palette);
        let png = encode_vec(&buf);
        let decoded = decode_vec(&png).unwrap();
        assert_eq!(decoded, buf);
        assert_eq!(decoded.stride(), 5);
    }

    #[test]
    fn idat_corruption_is_integrity_error() {
        let buf = PixelBuffer::from_bytes(4, 4, PixelFormat::Rgb24, (0..48).collect()).unwrap();
        let mut png = encode_vec(&buf);
        let off = chunk_payload_offset(&png, b"IDAT");
        png[off + 3] ^= 0x5A;
        let mut cursor = Cursor::new(&png[..]);
        let err = decode(&mut cursor, None, &Unstoppable).unwrap_err();
        assert!(matches!(err, RasterError::ChecksumMismatch { .. }), "{err:?}");
        assert_eq!(err.kind(), crate::ErrorKind::Integrity);
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn bad_signature_rewinds() {
        let mut cursor = Cursor::new(b"BM not a png at all".to_vec());
        let err = decode(&mut cursor, None, &Unstoppable).unwrap_err();
        assert!(matches!(err, RasterError::UnrecognizedFormat));
        assert!(err.is_recoverable());
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn truncated_png_is_eof() {
        let buf = PixelBuffer::from_bytes(8, 8, PixelFormat::Gray8, (0..64).collect()).unwrap();
        let png = encode_vec(&buf);
        let err = decode_vec(&png[..png.len() - 20]).unwrap_err();
        assert!(matches!(err, RasterError::UnexpectedEof), "{err:?}");
    }

    #[test]
    fn unknown_chunks_are_skipped() {
        let buf = PixelBuffer::from_bytes(2, 1, PixelFormat::Rgba32, vec![1; 8]).unwrap();
        let png = encode_vec(&buf);
        let idat = chunk_payload_offset(&png, b"IDAT") - 8;
        let mut patched = png[..idat].to_vec();
        // tEXt chunk with a deliberately wrong CRC; skipped chunks are not verified.
        patched.extend_from_slice(&5u32.to_be_bytes());
        patched.extend_from_slice(b"tEXtabcde");
        patched.extend_from_slice(&0u32.to_be_bytes());
        patched.extend_from_slice(&png[idat..]);
        assert_eq!(decode_vec(&patched).unwrap(), buf);
    }

    #[test]
    fn oversized_palette_rejected_before_writing() {
        let entries: Vec<RGBA8> = (0..40).map(|i| RGBA8::new(i, i, i, 255)).collect();
        let buf = PixelBuffer::new(4, 4, PixelFormat::Indexed4)
            .unwrap()
            .with_palette(Palette::from_entries(8, &entries).unwrap());
        let mut out = Vec::new();
        let err = encode(&buf, &mut out, &Unstoppable).unwrap_err();
        assert!(matches!(err, RasterError::PaletteOverflow { capacity: 16 }));
        assert_eq!(err.kind(), crate::error::ErrorKind::ConstraintViolation);
        assert!(out.is_empty());
    }

    #[test]
    fn huge_header_without_data_is_eof() {
        let mut ihdr = Vec::new();
        ihdr.extend_from_slice(&200_000u32.to_be_bytes());
        ihdr.extend_from_slice(&200_000u32.to_be_bytes());
        ihdr.extend_from_slice(&[8, 6, 0, 0, 0]);
        let mut png = SIGNATURE.to_vec();
        chunk(&mut png, b"IHDR", &ihdr);
        chunk(&mut png, b"IEND", &[]);
        assert_eq!(png.len(), 45);

        let mut cursor = Cursor::new(&png[..]);
        let err = decode(&mut cursor, None, &Unstoppable).unwrap_err();
        assert!(matches!(err, RasterError::UnexpectedEof), "{err:?}");
        assert!(err.is_recoverable());
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn unknown_critical_chunk_skipped() {
        let buf = PixelBuffer::from_bytes(2, 1, PixelFormat::Gray8, vec![1, 2]).unwrap();
        let png = encode_vec(&buf);
        let idat = chunk_payload_offset(&png, b"IDAT") - 8;
        let mut patched = png[..idat].to_vec();
        // Uppercase first letter, payload and CRC that would not verify.
        patched.extend_from_slice(&3u32.to_be_bytes());
        patched.extend_from_slice(b"ABCDxyz");
        patched.extend_from_slice(&0u32.to_be_bytes());
        patched.extend_from_slice(&png[idat..]);
        assert_eq!(decode_vec(&patched).unwrap(), buf);
    }

    #[test]
    fn bgr_input_written_as_rgb() {
        let bgr = PixelBuffer::from_bytes(1, 1, PixelFormat::Bgra32, vec![3, 2, 1, 4]).unwrap();
        let decoded = decode_vec(&encode_vec(&bgr)).unwrap();
        assert_eq!(decoded.format(), PixelFormat::Rgba32);
        assert_eq!(decoded.row(0), &[1, 2, 3, 4]);
    }

    #[test]
    fn sub_byte_gray_roundtrip() {
        let data = vec![0x1B, 0xC0, 0xE4, 0x40, 0x55, 0x80];
        let buf = PixelBuffer::from_bytes(5, 3, PixelFormat::Gray2, data).unwrap();
        let decoded = decode_vec(&encode_vec(&buf)).unwrap();
        assert_eq!(decoded, buf);
        assert!(decoded.palette().is_none());
    }

    #[test]
    fn limits_checked_at_ihdr() {
        let buf = PixelBuffer::new(16, 16, PixelFormat::Rgb24).unwrap();
        let png = encode_vec(&buf);
        let limits = Limits {
            max_width: Some(8),
            ..Default::default()
        };
        let err = decode(&mut Cursor::new(&png[..]), Some(&limits), &Unstoppable).unwrap_err();
        assert!(matches!(err, RasterError::LimitExceeded(_)));
    }
}
