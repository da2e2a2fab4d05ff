//! ICO/CUR decoder.
//!
//! The directory is read up front and its entries are keyed by absolute
//! offset, so payloads are visited in file order whatever order the
//! directory lists them in. Each payload is sniffed from its first eight
//! bytes and handed to the PNG or BMP decoder through a [`SpliceReader`].

use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use std::io::{Read, Seek, SeekFrom};

use enough::Stop;

use super::splice::{IDENT_LEN, SpliceReader};
use super::{DIR_ENTRY_LEN, DirEntry, HEADER_LEN, IcoKind};
use crate::bmp;
use crate::buffer::PixelBuffer;
use crate::error::RasterError;
use crate::limits::Limits;
use crate::png;
use crate::stream::{ReadExt, stream_len};

/// How an entry's payload is stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Payload {
    Png,
    /// Complete BMP file, "BM" header included.
    Bmp,
    /// Headerless DIB with doubled height.
    Dib,
}

fn sniff(ident: &[u8; IDENT_LEN]) -> Option<Payload> {
    if *ident == png::SIGNATURE {
        return Some(Payload::Png);
    }
    if ident.starts_with(b"BM") {
        return Some(Payload::Bmp);
    }
    let header_size = u32::from_le_bytes([ident[0], ident[1], ident[2], ident[3]]);
    bmp::INFO_HEADER_SIZES
        .contains(&header_size)
        .then_some(Payload::Dib)
}

fn read_dir_entry<R: Read + ?Sized>(reader: &mut R) -> Result<DirEntry, RasterError> {
    let [width, height, palette_count, _reserved] = reader.read_bytes()?;
    Ok(DirEntry {
        width: if width == 0 { 256 } else { u32::from(width) },
        height: if height == 0 { 256 } else { u32::from(height) },
        palette_count,
        planes_or_hotspot_x: reader.read_u16_le()?,
        bpp_or_hotspot_y: reader.read_u16_le()?,
        size: reader.read_u32_le()?,
        offset: reader.read_u32_le()?,
    })
}

/// Decode every image of an ICO/CUR file, in directory order.
pub(crate) fn decode_ico<R: Read + Seek + ?Sized>(
    reader: &mut R,
    limits: Option<&Limits>,
    stop: &dyn Stop,
) -> Result<Vec<PixelBuffer>, RasterError> {
    let origin = reader.stream_position()?;
    let file_len = stream_len(reader)?.saturating_sub(origin);

    let reserved = reader.read_u16_le()?;
    let kind = IcoKind::from_u16(reader.read_u16_le()?);
    let count = reader.read_u16_le()?;
    let kind = match (reserved, kind) {
        (0, Some(kind)) => kind,
        _ => return Err(RasterError::UnrecognizedFormat),
    };
    if count == 0 {
        return Err(RasterError::InvalidHeader("ICO directory is empty".into()));
    }
    log::debug!("{kind:?} with {count} entries");

    let directory_end = u64::from(HEADER_LEN) + u64::from(count) * u64::from(DIR_ENTRY_LEN);
    let mut by_offset: BTreeMap<u32, (usize, DirEntry)> = BTreeMap::new();
    for index in 0..usize::from(count) {
        let entry = read_dir_entry(reader)?;
        let end = u64::from(entry.offset) + u64::from(entry.size);
        if u64::from(entry.offset) < directory_end {
            return Err(RasterError::InvalidData(alloc::format!(
                "entry {index} at offset {} overlaps the directory",
                entry.offset
            )));
        }
        if end > file_len {
            log::debug!("entry {index} ends at {end}, file is {file_len} bytes");
            return Err(RasterError::UnexpectedEof);
        }
        if (entry.size as usize) < IDENT_LEN {
            return Err(RasterError::InvalidData(alloc::format!(
                "entry {index} is only {} bytes",
                entry.size
            )));
        }
        if by_offset.insert(entry.offset, (index, entry)).is_some() {
            return Err(RasterError::InvalidData(alloc::format!(
                "two directory entries share offset {}",
                entry.offset
            )));
        }
    }

    let mut images: Vec<Option<PixelBuffer>> = (0..count).map(|_| None).collect();
    for (&offset, &(index, entry)) in &by_offset {
        stop.check()?;
        reader.seek(SeekFrom::Start(origin + u64::from(offset)))?;
        let ident: [u8; IDENT_LEN] = reader.read_bytes()?;
        let payload = sniff(&ident).ok_or_else(|| {
            RasterError::InvalidData(alloc::format!(
                "entry {index} payload is neither PNG nor BMP"
            ))
        })?;
        log::debug!(
            "entry {index}: {payload:?} at {offset}, {} bytes, directory says {}x{} \
             ({} colors, planes/hotspot {}, {})",
            entry.size,
            entry.width,
            entry.height,
            entry.palette_count,
            entry.planes_or_hotspot_x,
            entry.bpp_or_hotspot_y
        );

        let mut splice = SpliceReader::new(ident, reader, u64::from(entry.size))?;
        let image = match payload {
            Payload::Png => png::decode(&mut splice, limits, stop)?,
            Payload::Bmp => bmp::decode(&mut splice, limits, false, stop)?,
            Payload::Dib => bmp::decode_dib(&mut splice, limits, stop)?,
        };
        if (image.width(), image.height()) != (entry.width, entry.height) {
            log::warn!(
                "entry {index}: directory says {}x{}, image is {}x{}",
                entry.width,
                entry.height,
                image.width(),
                image.height()
            );
        }
        images[index] = Some(image);
    }

    images
        .into_iter()
        .map(|image| image.ok_or_else(|| RasterError::InvalidData("missing ICO entry".into())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniff_payloads() {
        assert_eq!(sniff(&png::SIGNATURE), Some(Payload::Png));
        assert_eq!(sniff(b"BM\x36\0\0\0\0\0"), Some(Payload::Bmp));
        assert_eq!(sniff(&[40, 0, 0, 0, 16, 0, 0, 0]), Some(Payload::Dib));
        assert_eq!(sniff(&[41, 0, 0, 0, 16, 0, 0, 0]), None);
    }

    #[test]
    fn zero_dimension_means_256() {
        let mut bytes = vec![0u8, 0, 0, 0];
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&32u16.to_le_bytes());
        bytes.extend_from_slice(&100u32.to_le_bytes());
        bytes.extend_from_slice(&22u32.to_le_bytes());
        let e = read_dir_entry(&mut std::io::Cursor::new(bytes)).unwrap();
        assert_eq!((e.width, e.height, e.bpp_or_hotspot_y), (256, 256, 32));
        assert_eq!((e.size, e.offset), (100, 22));
    }
}
