//! PNG encoder: one zlib-compressed IDAT, filter type 0 on every row.

use alloc::vec::Vec;
use std::io::Write;

use enough::Stop;
use flate2::Compression;
use flate2::write::ZlibEncoder;

use super::{MAX_CHUNK_LEN, SIGNATURE};
use crate::buffer::PixelBuffer;
use crate::error::RasterError;
use crate::pixel::{Palette, PixelFormat};
use crate::stream::Crc32Writer;

/// Encode `buffer` as a complete PNG file.
pub(crate) fn encode_png<W: Write + ?Sized>(
    buffer: &PixelBuffer,
    writer: &mut W,
    stop: &dyn Stop,
) -> Result<(), RasterError> {
    let (width, height) = (buffer.width(), buffer.height());
    if width > MAX_CHUNK_LEN || height > MAX_CHUNK_LEN {
        return Err(RasterError::DimensionsTooLarge { width, height });
    }
    buffer.check_palette()?;
    let format = buffer.format();
    let bits = format.bits_per_pixel();
    let (bit_depth, color_type) = match format {
        f if f.is_gray() => (bits, 0u8),
        f if f.is_indexed() => (bits, 3),
        PixelFormat::Rgb24 | PixelFormat::Bgr24 => (8, 2),
        PixelFormat::Rgba32 | PixelFormat::Bgra32 => (8, 6),
        other => {
            return Err(RasterError::UnsupportedVariant(alloc::format!(
                "cannot encode {other:?} as PNG"
            )));
        }
    };

    stop.check()?;
    writer.write_all(&SIGNATURE)?;
    let mut out = Crc32Writer::new(writer);

    let mut ihdr = Vec::with_capacity(13);
    ihdr.extend_from_slice(&width.to_be_bytes());
    ihdr.extend_from_slice(&height.to_be_bytes());
    ihdr.extend_from_slice(&[bit_depth, color_type, 0, 0, 0]);
    write_chunk(&mut out, b"IHDR", &ihdr)?;

    if format.is_indexed() {
        let palette = match buffer.palette() {
            Some(p) if !p.is_empty() => p.clone(),
            _ => Palette::grayscale(bits),
        };
        let plte: Vec<u8> = palette
            .entries()
            .iter()
            .flat_map(|e| [e.r, e.g, e.b])
            .collect();
        write_chunk(&mut out, b"PLTE", &plte)?;

        if palette.has_transparency() {
            let mut alphas: Vec<u8> = palette.entries().iter().map(|e| e.a).collect();
            while alphas.last() == Some(&255) {
                alphas.pop();
            }
            write_chunk(&mut out, b"tRNS", &alphas)?;
        }
    }

    let idat = compress_rows(buffer, stop)?;
    log::debug!(
        "PNG encode {width}x{height} {format:?}: IDAT {} bytes",
        idat.len()
    );
    write_chunk(&mut out, b"IDAT", &idat)?;
    write_chunk(&mut out, b"IEND", &[])?;
    out.flush()?;
    Ok(())
}

fn write_chunk<W: Write + ?Sized>(
    out: &mut Crc32Writer<'_, W>,
    kind: &[u8; 4],
    payload: &[u8],
) -> Result<(), RasterError> {
    let len = u32::try_from(payload.len())
        .ok()
        .filter(|&l| l <= MAX_CHUNK_LEN)
        .ok_or_else(|| {
            RasterError::InvalidData(alloc::format!(
                "chunk payload of {} bytes exceeds 2^31-1",
                payload.len()
            ))
        })?;
    out.inner().write_all(&len.to_be_bytes())?;
    out.reset();
    out.write_all(kind)?;
    out.write_all(payload)?;
    let crc = out.crc();
    out.inner().write_all(&crc.to_be_bytes())?;
    Ok(())
}

/// zlib-compress every row prefixed with filter type 0, swizzling BGR
/// orders to RGB.
fn compress_rows(buffer: &PixelBuffer, stop: &dyn Stop) -> Result<Vec<u8>, RasterError> {
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    let channels = buffer.format().channels();
    let swizzle = buffer.format().is_bgr_order();
    let mut scratch = Vec::with_capacity(buffer.row_bytes() + 1);

    for (y, row) in buffer.rows().enumerate() {
        if y % 16 == 0 {
            stop.check()?;
        }
        scratch.clear();
        scratch.push(0);
        if swizzle {
            for px in row.chunks_exact(channels) {
                scratch.extend_from_slice(&[px[2], px[1], px[0]]);
                if channels == 4 {
                    scratch.push(px[3]);
                }
            }
        } else {
            scratch.extend_from_slice(row);
        }
        enc.write_all(&scratch)?;
    }
    Ok(enc.finish()?)
}
