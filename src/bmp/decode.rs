//! BMP decoder: uncompressed (BI_RGB) files and headerless DIBs.
//!
//! Supports 1/2/4/8-bit palette images, 8-bit gray (no palette), 16-bit
//! x1r5g5b5, 24-bit and 32-bit. Bottom-up and top-down row orders.

use alloc::vec;
use std::io::{Read, Seek, SeekFrom};

use enough::Stop;
use rgb::RGBA8;

use super::utils::{expand_555, swap_red_blue};
use crate::buffer::PixelBuffer;
use crate::error::RasterError;
use crate::limits::{Limits, check_limits};
use crate::pixel::{Palette, PixelFormat, bmp_stride};
use crate::stream::{ReadExt, stream_len};

/// Size of the `BITMAPFILEHEADER` that precedes the info header in files.
pub(crate) const FILE_HEADER_LEN: u32 = 14;

/// "BM" plus the legacy OS/2 array, icon, pointer and cursor signatures.
const SIGNATURES: [[u8; 2]; 6] = [*b"BM", *b"BA", *b"CI", *b"CP", *b"IC", *b"PT"];

/// Info header sizes we know how to read.
pub(crate) const INFO_HEADER_SIZES: [u32; 8] = [12, 16, 40, 52, 56, 64, 108, 124];

/// Fields of the info header (`BITMAPCOREHEADER` through `BITMAPV5HEADER`)
/// that matter for uncompressed decoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct InfoHeader {
    pub header_size: u32,
    pub width: u32,
    /// Row count as stored (doubled for ICO DIBs).
    pub height: u32,
    pub top_down: bool,
    pub bpp: u16,
    /// `biClrUsed`; zero when the header has no such field.
    pub colors_used: u32,
}

impl InfoHeader {
    /// Bytes per palette entry: 3 for OS/2 core headers, 4 otherwise.
    fn palette_entry_size(&self) -> u32 {
        if self.header_size == 12 { 3 } else { 4 }
    }
}

/// Read an info header, leaving the reader just past it.
pub(crate) fn read_info_header<R: Read + Seek + ?Sized>(
    reader: &mut R,
) -> Result<InfoHeader, RasterError> {
    let header_size = reader.read_u32_le()?;
    if !INFO_HEADER_SIZES.contains(&header_size) {
        return Err(RasterError::InvalidHeader(alloc::format!(
            "unknown BMP info header size: {header_size}"
        )));
    }

    let (width, height, planes, bpp) = if header_size == 12 {
        let width = i32::from(reader.read_u16_le()?);
        let height = i32::from(reader.read_u16_le()?);
        (width, height, reader.read_u16_le()?, reader.read_u16_le()?)
    } else {
        let width = reader.read_u32_le()? as i32;
        let height = reader.read_u32_le()? as i32;
        (width, height, reader.read_u16_le()?, reader.read_u16_le()?)
    };

    let mut colors_used = 0;
    let mut consumed = if header_size == 12 { 12 } else { 16 };
    if header_size >= 40 {
        let compression = reader.read_u32_le()?;
        let _image_size = reader.read_u32_le()?;
        let _x_ppm = reader.read_u32_le()?;
        let _y_ppm = reader.read_u32_le()?;
        colors_used = reader.read_u32_le()?;
        let _important = reader.read_u32_le()?;
        consumed = 40;
        if compression != 0 {
            let name = match compression {
                1 => "RLE8",
                2 => "RLE4",
                3 => "BITFIELDS",
                4 => "JPEG",
                5 => "PNG",
                6 => "ALPHABITFIELDS",
                _ => "unknown",
            };
            return Err(RasterError::UnsupportedVariant(alloc::format!(
                "BMP compression {compression} ({name})"
            )));
        }
    }
    if header_size > consumed {
        reader.seek(SeekFrom::Current(i64::from(header_size - consumed)))?;
    }

    if width <= 0 {
        return Err(RasterError::InvalidHeader(alloc::format!(
            "BMP width {width} must be positive"
        )));
    }
    if height == 0 {
        return Err(RasterError::InvalidHeader("BMP height is zero".into()));
    }
    if planes != 1 {
        return Err(RasterError::InvalidHeader(alloc::format!(
            "BMP planes field is {planes}, expected 1"
        )));
    }

    Ok(InfoHeader {
        header_size,
        width: width as u32,
        height: height.unsigned_abs(),
        top_down: height < 0,
        bpp,
        colors_used,
    })
}

/// Pick the output pixel format for a bit depth.
fn output_format(
    bpp: u16,
    has_palette: bool,
    native_order: bool,
) -> Result<PixelFormat, RasterError> {
    match (bpp, has_palette) {
        (1 | 2 | 4 | 8, true) => {
            Ok(PixelFormat::indexed(bpp as u8).unwrap_or(PixelFormat::Indexed8))
        }
        (8, false) => Ok(PixelFormat::Gray8),
        (1 | 2 | 4, false) => Err(RasterError::UnsupportedVariant(alloc::format!(
            "{bpp}-bit BMP without a palette"
        ))),
        (16 | 24, _) if native_order => Ok(PixelFormat::Bgr24),
        (16 | 24, _) => Ok(PixelFormat::Rgb24),
        (32, _) if native_order => Ok(PixelFormat::Bgra32),
        (32, _) => Ok(PixelFormat::Rgba32),
        _ => Err(RasterError::UnsupportedVariant(alloc::format!(
            "BMP bit depth {bpp}"
        ))),
    }
}

/// Palette entry count: `biClrUsed`, or `2^bpp` when that is zero.
fn palette_count(header: &InfoHeader) -> Result<u32, RasterError> {
    let max = 1u32 << header.bpp;
    match header.colors_used {
        0 => Ok(max),
        n if n > max => Err(RasterError::InvalidHeader(alloc::format!(
            "BMP palette count ({n}) exceeds max for {}-bit depth ({max})",
            header.bpp
        ))),
        n => Ok(n),
    }
}

fn read_palette<R: Read + ?Sized>(
    reader: &mut R,
    header: &InfoHeader,
    count: u32,
) -> Result<Palette, RasterError> {
    let mut palette = Palette::new(header.bpp as u8);
    for _ in 0..count {
        let [b, g, r] = reader.read_bytes()?;
        if header.palette_entry_size() == 4 {
            let _reserved = reader.read_u8()?;
        }
        palette.push(RGBA8::new(r, g, b, 255))?;
    }
    Ok(palette)
}

/// Decode a BMP file positioned at its signature.
pub(crate) fn decode_bmp<R: Read + Seek + ?Sized>(
    reader: &mut R,
    limits: Option<&Limits>,
    native_order: bool,
    stop: &dyn Stop,
) -> Result<PixelBuffer, RasterError> {
    let origin = reader.stream_position()?;
    let signature: [u8; 2] = reader.read_bytes()?;
    if !SIGNATURES.contains(&signature) {
        return Err(RasterError::UnrecognizedFormat);
    }
    let _file_size = reader.read_u32_le()?;
    let _reserved = reader.read_u32_le()?;
    let data_offset = reader.read_u32_le()?;
    let header = read_info_header(reader)?;

    let palette_start = FILE_HEADER_LEN + header.header_size;
    if data_offset < palette_start {
        return Err(RasterError::InvalidHeader(alloc::format!(
            "BMP data offset {data_offset} inside the {palette_start}-byte header"
        )));
    }
    log::debug!(
        "BMP {:?} {}x{} {}bpp, header {} bytes, data at {data_offset}",
        core::str::from_utf8(&signature).unwrap_or("??"),
        header.width,
        header.height,
        header.bpp,
        header.header_size
    );

    let palette = if palette_start < data_offset && header.bpp <= 8 {
        let available = (data_offset - palette_start) / header.palette_entry_size();
        let mut count = palette_count(&header)?;
        if header.colors_used == 0 && header.header_size < 40 {
            count = count.min(available);
        } else if count > available {
            log::warn!("BMP palette of {count} entries overlaps pixel data; reading {available}");
            count = available;
        }
        match count {
            0 => None,
            _ => Some(read_palette(reader, &header, count)?),
        }
    } else {
        None
    };

    reader.seek(SeekFrom::Start(origin + u64::from(data_offset)))?;
    read_pixels(reader, &header, header.height, palette, limits, native_order, stop)
}

/// Decode a headerless DIB as stored inside ICO/CUR files.
///
/// The stored height covers the XOR color plane and the AND mask, so the
/// image height is half of it. The palette follows the info header
/// directly and pixel data follows the palette. The AND mask is not read.
#[cfg(feature = "ico")]
pub(crate) fn decode_dib<R: Read + Seek + ?Sized>(
    reader: &mut R,
    limits: Option<&Limits>,
    stop: &dyn Stop,
) -> Result<PixelBuffer, RasterError> {
    let header = read_info_header(reader)?;
    let height = header.height / 2;
    if height == 0 {
        return Err(RasterError::InvalidHeader(alloc::format!(
            "DIB height {} leaves no XOR plane",
            header.height
        )));
    }
    let palette = if header.bpp <= 8 {
        let count = palette_count(&header)?;
        Some(read_palette(reader, &header, count)?)
    } else {
        None
    };
    read_pixels(reader, &header, height, palette, limits, false, stop)
}

/// Read `height` rows of file-stride pixel data into a new buffer.
///
/// Fails with `UnexpectedEof` before allocating if the stream is too short
/// to hold every row.
fn read_pixels<R: Read + Seek + ?Sized>(
    reader: &mut R,
    header: &InfoHeader,
    height: u32,
    palette: Option<Palette>,
    limits: Option<&Limits>,
    native_order: bool,
    stop: &dyn Stop,
) -> Result<PixelBuffer, RasterError> {
    let width = header.width;
    let format = output_format(header.bpp, palette.is_some(), native_order)?;
    let in_stride = bmp_stride(width, header.bpp as u8);
    let available = stream_len(reader)?.saturating_sub(reader.stream_position()?);
    if (in_stride as u64).saturating_mul(u64::from(height)) > available {
        log::debug!("BMP needs {height} rows of {in_stride} bytes, stream has {available}");
        return Err(RasterError::UnexpectedEof);
    }
    let out_stride = bmp_stride(width, format.bits_per_pixel());
    let out_bytes = out_stride
        .checked_mul(height as usize)
        .ok_or(RasterError::DimensionsTooLarge { width, height })?;
    check_limits(limits, width, height, out_bytes)?;
    stop.check()?;

    let mut image = PixelBuffer::with_stride(width, height, format, out_stride)?;
    image.set_palette(palette);

    let mut row = vec![0u8; in_stride];
    for i in 0..height {
        if i % 16 == 0 {
            stop.check()?;
        }
        reader.read_exact(&mut row)?;
        let y = if header.top_down { i } else { height - 1 - i };
        let out = image.row_mut(y);
        match header.bpp {
            16 => {
                for (px, rgb) in row.chunks_exact(2).zip(out.chunks_exact_mut(3)) {
                    let mut c = expand_555(u16::from_le_bytes([px[0], px[1]]));
                    if native_order {
                        c.reverse();
                    }
                    rgb.copy_from_slice(&c);
                }
            }
            24 | 32 if !native_order => {
                swap_red_blue(&row, out, usize::from(header.bpp / 8));
            }
            _ => {
                let len = out.len();
                out.copy_from_slice(&row[..len]);
            }
        }
    }
    log::trace!("BMP: read {height} rows of {} bytes", row.len());
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn info_header(size: u32, width: i32, height: i32, bpp: u16, compression: u32) -> Vec<u8> {
        let mut v = Vec::new();
        v.extend_from_slice(&size.to_le_bytes());
        v.extend_from_slice(&width.to_le_bytes());
        v.extend_from_slice(&height.to_le_bytes());
        v.extend_from_slice(&1u16.to_le_bytes());
        v.extend_from_slice(&bpp.to_le_bytes());
        v.extend_from_slice(&compression.to_le_bytes());
        v.resize(size as usize, 0);
        v
    }

    #[test]
    fn info_header_v5_skips_extra_fields() {
        let mut bytes = info_header(124, 7, -3, 24, 0);
        bytes.push(0xAB);
        let mut c = Cursor::new(bytes);
        let h = read_info_header(&mut c).unwrap();
        assert_eq!((h.width, h.height, h.top_down, h.bpp), (7, 3, true, 24));
        assert_eq!(c.position(), 124);
    }

    #[test]
    fn rle_is_unsupported() {
        let mut c = Cursor::new(info_header(40, 4, 4, 8, 1));
        assert!(matches!(
            read_info_header(&mut c),
            Err(RasterError::UnsupportedVariant(_))
        ));
    }

    #[test]
    fn bad_planes_and_sizes() {
        let mut bytes = info_header(40, 4, 4, 8, 0);
        bytes[12] = 2;
        assert!(matches!(
            read_info_header(&mut Cursor::new(bytes)),
            Err(RasterError::InvalidHeader(_))
        ));
        assert!(matches!(
            read_info_header(&mut Cursor::new(info_header(20, 4, 4, 8, 0))),
            Err(RasterError::InvalidHeader(_))
        ));
        assert!(matches!(
            read_info_header(&mut Cursor::new(info_header(40, 0, 4, 8, 0))),
            Err(RasterError::InvalidHeader(_))
        ));
    }

    #[test]
    fn os2_core_header() {
        let mut v = Vec::new();
        v.extend_from_slice(&12u32.to_le_bytes());
        v.extend_from_slice(&5u16.to_le_bytes());
        v.extend_from_slice(&2u16.to_le_bytes());
        v.extend_from_slice(&1u16.to_le_bytes());
        v.extend_from_slice(&8u16.to_le_bytes());
        let h = read_info_header(&mut Cursor::new(v)).unwrap();
        assert_eq!((h.width, h.height, h.top_down), (5, 2, false));
        assert_eq!(h.palette_entry_size(), 3);
    }

    #[test]
    fn format_dispatch() {
        assert_eq!(output_format(4, true, false).unwrap(), PixelFormat::Indexed4);
        assert_eq!(output_format(8, false, false).unwrap(), PixelFormat::Gray8);
        assert_eq!(output_format(24, false, true).unwrap(), PixelFormat::Bgr24);
        assert_eq!(output_format(16, false, false).unwrap(), PixelFormat::Rgb24);
        assert!(output_format(1, false, false).is_err());
        assert!(output_format(12, false, false).is_err());
    }

    #[test]
    fn palette_count_rules() {
        let mut h = read_info_header(&mut Cursor::new(info_header(40, 1, 1, 4, 0))).unwrap();
        assert_eq!(palette_count(&h).unwrap(), 16);
        h.colors_used = 3;
        assert_eq!(palette_count(&h).unwrap(), 3);
        h.colors_used = 17;
        assert!(matches!(palette_count(&h), Err(RasterError::InvalidHeader(_))));
    }
}
