//! ICO/CUR container decoder and encoder (internal).
//!
//! Entries hold either a PNG stream or a BMP (usually a headerless DIB
//! with an AND mask). Use top-level [`crate::decode_ico`],
//! [`crate::encode_ico`].

mod decode;
mod encode;
mod splice;

use alloc::vec::Vec;
use std::io::{Read, Seek, Write};

use enough::Stop;

use crate::buffer::PixelBuffer;
use crate::error::RasterError;
use crate::limits::Limits;
use crate::stream::with_rewind;

const HEADER_LEN: u32 = 6;
const DIR_ENTRY_LEN: u32 = 16;

/// Largest icon dimension; stored as 0 in the directory.
const MAX_DIMENSION: u32 = 256;

/// Resource type from the ICO header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u16)]
enum IcoKind {
    Icon = 1,
    Cursor = 2,
}

impl IcoKind {
    fn from_u16(v: u16) -> Option<Self> {
        match v {
            1 => Some(Self::Icon),
            2 => Some(Self::Cursor),
            _ => None,
        }
    }
}

/// One 16-byte directory entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct DirEntry {
    /// Pixel width; a stored 0 reads as 256.
    width: u32,
    height: u32,
    palette_count: u8,
    /// Color planes for icons, hotspot x for cursors.
    planes_or_hotspot_x: u16,
    /// Bits per pixel for icons, hotspot y for cursors.
    bpp_or_hotspot_y: u16,
    size: u32,
    /// Absolute offset from the start of the file.
    offset: u32,
}

/// Decode all images, rewinding the stream on failure.
pub(crate) fn decode<R: Read + Seek + ?Sized>(
    reader: &mut R,
    limits: Option<&Limits>,
    stop: &dyn Stop,
) -> Result<Vec<PixelBuffer>, RasterError> {
    with_rewind(reader, |r| decode::decode_ico(r, limits, stop))
}

/// Encode images into one ICO file.
pub(crate) fn encode<W: Write + Seek + ?Sized>(
    images: &[PixelBuffer],
    writer: &mut W,
    stop: &dyn Stop,
) -> Result<(), RasterError> {
    encode::encode_ico(images, writer, stop)
}
