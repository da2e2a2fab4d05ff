//! ICO encoder.
//!
//! Writes the header and every directory entry with zeroed size and offset,
//! then each image, patching its entry once the encoded length is known.

use alloc::borrow::Cow;
use alloc::vec::Vec;
use std::io::{Seek, SeekFrom, Write};

use enough::Stop;

use super::{DIR_ENTRY_LEN, HEADER_LEN, IcoKind, MAX_DIMENSION};
use crate::bmp;
use crate::buffer::PixelBuffer;
use crate::error::RasterError;
use crate::png;

/// Dimensions that fit within 256x256 keeping the aspect ratio.
pub(crate) fn fit_dimensions(width: u32, height: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= MAX_DIMENSION {
        return (width, height);
    }
    let scale = |d: u32| {
        ((u64::from(d) * u64::from(MAX_DIMENSION) / u64::from(longest)) as u32).max(1)
    };
    (scale(width), scale(height))
}

/// Directory byte for a dimension; 256 is stored as 0.
fn dimension_byte(d: u32) -> u8 {
    if d >= MAX_DIMENSION { 0 } else { d as u8 }
}

/// Whether an image is stored as PNG (alpha formats) rather than DIB.
fn stored_as_png(image: &PixelBuffer) -> bool {
    image.format().has_alpha()
}

fn directory_entry(image: &PixelBuffer) -> [u8; DIR_ENTRY_LEN as usize] {
    let mut entry = [0u8; DIR_ENTRY_LEN as usize];
    entry[0] = dimension_byte(image.width());
    entry[1] = dimension_byte(image.height());
    entry[2] = match image.palette() {
        Some(p) if image.format().is_indexed() && p.len() < 256 => p.len() as u8,
        _ => 0,
    };
    entry[4..6].copy_from_slice(&1u16.to_le_bytes());
    entry[6..8].copy_from_slice(&u16::from(image.format().bits_per_pixel()).to_le_bytes());
    // size and offset are patched after the image is written
    entry
}

/// Encode `images` as an ICO file.
pub(crate) fn encode_ico<W: Write + Seek + ?Sized>(
    images: &[PixelBuffer],
    writer: &mut W,
    stop: &dyn Stop,
) -> Result<(), RasterError> {
    if images.is_empty() {
        return Err(RasterError::InvalidDimensions {
            width: 0,
            height: 0,
        });
    }
    let count = u16::try_from(images.len()).map_err(|_| {
        RasterError::InvalidData(alloc::format!(
            "{} images exceed the ICO directory limit of 65535",
            images.len()
        ))
    })?;

    let fitted: Vec<Cow<'_, PixelBuffer>> = images
        .iter()
        .map(|image| {
            let (w, h) = fit_dimensions(image.width(), image.height());
            if (w, h) == (image.width(), image.height()) {
                Ok(Cow::Borrowed(image))
            } else {
                log::debug!(
                    "downscaling {}x{} icon to {w}x{h}",
                    image.width(),
                    image.height()
                );
                image.resize_nearest(w, h).map(Cow::Owned)
            }
        })
        .collect::<Result<_, _>>()?;

    let origin = writer.stream_position()?;
    writer.write_all(&0u16.to_le_bytes())?;
    writer.write_all(&(IcoKind::Icon as u16).to_le_bytes())?;
    writer.write_all(&count.to_le_bytes())?;
    for image in &fitted {
        writer.write_all(&directory_entry(image))?;
    }

    for (index, image) in fitted.iter().enumerate() {
        stop.check()?;
        let start = writer.stream_position()?;
        if stored_as_png(image) {
            png::encode(image, writer, stop)?;
        } else {
            bmp::encode_dib(image, writer, stop)?;
        }
        let end = writer.stream_position()?;

        let too_large = || RasterError::DimensionsTooLarge {
            width: image.width(),
            height: image.height(),
        };
        let size = u32::try_from(end - start).map_err(|_| too_large())?;
        let offset = u32::try_from(start - origin).map_err(|_| too_large())?;
        let size_field = u64::from(HEADER_LEN) + index as u64 * u64::from(DIR_ENTRY_LEN) + 8;
        writer.seek(SeekFrom::Start(origin + size_field))?;
        writer.write_all(&size.to_le_bytes())?;
        writer.write_all(&offset.to_le_bytes())?;
        writer.seek(SeekFrom::Start(end))?;
        log::trace!("entry {index}: {size} bytes at {offset}");
    }
    writer.flush()?;
    Ok(())
}
