//! BMP encoder: uncompressed, bottom-up, BITMAPINFOHEADER.

use alloc::vec;
use alloc::vec::Vec;
use std::io::Write;

use enough::Stop;

use super::decode::FILE_HEADER_LEN;
use super::utils::swap_red_blue;
use crate::buffer::PixelBuffer;
use crate::error::RasterError;
use crate::pixel::{Palette, PixelFormat, bmp_stride};

const INFO_HEADER_LEN: u32 = 40;

/// 72 DPI in pixels per meter.
const RESOLUTION: u32 = 2835;

/// What gets written for a given buffer: bit depth and optional palette.
struct Layout {
    bpp: u16,
    palette: Option<Palette>,
    stride: usize,
    pixel_data_size: u32,
}

impl Layout {
    fn for_buffer(buffer: &PixelBuffer) -> Result<Self, RasterError> {
        buffer.check_palette()?;
        let format = buffer.format();
        let bits = format.bits_per_pixel();
        let palette = match format {
            f if f.is_indexed() => Some(match buffer.palette() {
                Some(p) if !p.is_empty() => p.clone(),
                _ => Palette::grayscale(bits),
            }),
            PixelFormat::Gray8 => None,
            f if f.is_gray() => Some(Palette::grayscale(bits)),
            _ => None,
        };
        let (width, height) = (buffer.width(), buffer.height());
        let stride = bmp_stride(width, bits);
        let pixel_data_size = stride
            .checked_mul(height as usize)
            .and_then(|n| u32::try_from(n).ok())
            .ok_or(RasterError::DimensionsTooLarge { width, height })?;
        Ok(Self {
            bpp: u16::from(bits),
            palette,
            stride,
            pixel_data_size,
        })
    }

    fn palette_len(&self) -> u32 {
        self.palette.as_ref().map_or(0, |p| p.len() as u32)
    }
}

/// Encode `buffer` as a complete BMP file.
pub(crate) fn encode_bmp<W: Write + ?Sized>(
    buffer: &PixelBuffer,
    writer: &mut W,
    stop: &dyn Stop,
) -> Result<(), RasterError> {
    let layout = Layout::for_buffer(buffer)?;
    let (width, height) = (buffer.width(), buffer.height());
    let data_offset = FILE_HEADER_LEN + INFO_HEADER_LEN + layout.palette_len() * 4;
    let file_size = data_offset
        .checked_add(layout.pixel_data_size)
        .ok_or(RasterError::DimensionsTooLarge { width, height })?;

    stop.check()?;
    let mut header = Vec::with_capacity(data_offset as usize);
    // File header (14 bytes)
    header.extend_from_slice(b"BM");
    header.extend_from_slice(&file_size.to_le_bytes());
    header.extend_from_slice(&[0u8; 4]); // reserved
    header.extend_from_slice(&data_offset.to_le_bytes());
    write_info_header(&mut header, buffer, &layout, height)?;
    write_palette(&mut header, &layout);
    writer.write_all(&header)?;

    write_rows(buffer, writer, &layout, stop)?;
    log::debug!(
        "BMP encode {width}x{height} {:?} -> {}bpp, {file_size} bytes",
        buffer.format(),
        layout.bpp
    );
    Ok(())
}

/// Encode `buffer` as an ICO/CUR DIB entry: info header with doubled
/// height, palette, XOR plane, then an all-zero AND mask.
#[cfg(feature = "ico")]
pub(crate) fn encode_dib<W: Write + ?Sized>(
    buffer: &PixelBuffer,
    writer: &mut W,
    stop: &dyn Stop,
) -> Result<(), RasterError> {
    let mut layout = Layout::for_buffer(buffer)?;
    if layout.palette.is_none() && layout.bpp <= 8 {
        // DIB readers expect a color table for every depth up to 8.
        layout.palette = Some(Palette::grayscale(8));
    }
    let (width, height) = (buffer.width(), buffer.height());
    let doubled = height
        .checked_mul(2)
        .ok_or(RasterError::DimensionsTooLarge { width, height })?;

    stop.check()?;
    let mut header = Vec::with_capacity(INFO_HEADER_LEN as usize + 1024);
    write_info_header(&mut header, buffer, &layout, doubled)?;
    write_palette(&mut header, &layout);
    writer.write_all(&header)?;
    write_rows(buffer, writer, &layout, stop)?;

    let mask_row = vec![0u8; bmp_stride(width, 1)];
    for _ in 0..height {
        writer.write_all(&mask_row)?;
    }
    Ok(())
}

fn write_info_header(
    out: &mut Vec<u8>,
    buffer: &PixelBuffer,
    layout: &Layout,
    height: u32,
) -> Result<(), RasterError> {
    let too_large = |_| RasterError::DimensionsTooLarge {
        width: buffer.width(),
        height,
    };
    let w = i32::try_from(buffer.width()).map_err(too_large)?;
    let h = i32::try_from(height).map_err(too_large)?;
    out.extend_from_slice(&INFO_HEADER_LEN.to_le_bytes());
    out.extend_from_slice(&w.to_le_bytes());
    out.extend_from_slice(&h.to_le_bytes()); // positive = bottom-up
    out.extend_from_slice(&1u16.to_le_bytes()); // planes
    out.extend_from_slice(&layout.bpp.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes()); // BI_RGB
    out.extend_from_slice(&layout.pixel_data_size.to_le_bytes());
    out.extend_from_slice(&RESOLUTION.to_le_bytes());
    out.extend_from_slice(&RESOLUTION.to_le_bytes());
    out.extend_from_slice(&layout.palette_len().to_le_bytes()); // colors used
    out.extend_from_slice(&0u32.to_le_bytes()); // important colors
    Ok(())
}

fn write_palette(out: &mut Vec<u8>, layout: &Layout) {
    if let Some(palette) = &layout.palette {
        for e in palette.entries() {
            out.extend_from_slice(&[e.b, e.g, e.r, 0]);
        }
    }
}

/// Write rows bottom-up through one stride-sized scratch row.
fn write_rows<W: Write + ?Sized>(
    buffer: &PixelBuffer,
    writer: &mut W,
    layout: &Layout,
    stop: &dyn Stop,
) -> Result<(), RasterError> {
    let format = buffer.format();
    let mut scratch = vec![0u8; layout.stride];
    for (n, y) in (0..buffer.height()).rev().enumerate() {
        if n % 16 == 0 {
            stop.check()?;
        }
        let row = buffer.row(y);
        match format {
            PixelFormat::Rgb24 | PixelFormat::Rgba32 => {
                swap_red_blue(row, &mut scratch, format.channels());
            }
            _ => scratch[..row.len()].copy_from_slice(row),
        }
        writer.write_all(&scratch)?;
    }
    Ok(())
}
