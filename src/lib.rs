//! # zenraster
//!
//! PNG, BMP and ICO/CUR decoder and encoder, plus a JPEG marker parser with
//! canonical Huffman table construction.
//!
//! All decoders read from any `Read + Seek` stream. If decoding fails the
//! stream is moved back to where it started, so a caller can probe several
//! formats on one stream.
//!
//! ## Supported Formats
//!
//! ### PNG (`png` feature)
//! - Grayscale and indexed at 1, 2, 4 and 8 bits; 8-bit RGB and RGBA
//! - `PLTE` and `tRNS` (palette alpha) on decode and encode
//! - Chunk CRCs verified; all five scanline filters
//!
//! ### BMP (`bmp` feature)
//! - Uncompressed (`BI_RGB`) 1/2/4/8-bit indexed, 16-bit x1r5g5b5, 24 and 32-bit
//! - OS/2 and Windows info headers, bottom-up and top-down rows
//!
//! ### ICO/CUR (`ico` feature)
//! - Entries holding PNG streams, BMP files or headerless DIBs, in any order
//! - Encoder downscales images larger than 256x256
//!
//! ### JPEG (`jpeg` feature)
//! - JFIF/JFXX, DQT, SOF0-SOF3, DHT, DRI and SOS segments parsed; other
//!   segments skipped; entropy-coded data skipped
//! - No pixel decoding
//!
//! ## Non-Goals
//!
//! - 16-bit PNG samples, gray+alpha PNG, Adam7 interlacing
//! - BMP RLE and bitfield compression
//! - Progressive, arithmetic or hierarchical JPEG
//!
//! ## Usage
//!
//! ```no_run
//! use std::io::Cursor;
//! use zenraster::{DecodeRequest, EncodeRequest, PixelBuffer, PixelFormat, Unstoppable};
//!
//! let mut image = PixelBuffer::new(4, 4, PixelFormat::Rgba32)?;
//! image.data_mut().fill(0x80);
//!
//! // Encode to PNG
//! let png = EncodeRequest::png().encode(&image, Unstoppable)?;
//!
//! // Decode with format detection
//! let decoded = DecodeRequest::new()
//!     .decode(&mut Cursor::new(&png), Unstoppable)?
//!     .into_image()
//!     .unwrap();
//! assert_eq!(decoded, image);
//! # Ok::<(), zenraster::RasterError>(())
//! ```

#![forbid(unsafe_code)]

extern crate alloc;

mod buffer;
mod error;
mod info;
mod limits;
mod pixel;
mod stream;

pub mod huffman;

#[cfg(feature = "png")]
mod png;

#[cfg(feature = "bmp")]
mod bmp;

#[cfg(feature = "ico")]
mod ico;

#[cfg(feature = "jpeg")]
pub mod jpeg;

mod decode;
mod encode;

// Re-exports
pub use buffer::PixelBuffer;
#[cfg(feature = "imgref")]
pub use buffer::DecodePixel;
pub use decode::{DecodeRequest, Decoded};
pub use encode::EncodeRequest;
pub use enough::{Stop, Unstoppable};
pub use error::{ErrorKind, RasterError};
pub use info::ImageFormat;
pub use limits::Limits;
pub use pixel::{Palette, PixelFormat, bmp_stride, packed_stride};
pub use rgb::RGBA8;

#[cfg(feature = "jpeg")]
pub use jpeg::JpegHeaders;

use std::io::{Read, Seek, Write};

// ── Top-level convenience functions ─────────────────────────────────

/// Decode any supported format, detected from its leading bytes.
pub fn decode<R: Read + Seek + ?Sized>(
    reader: &mut R,
    stop: impl Stop,
) -> Result<Decoded, RasterError> {
    DecodeRequest::new().decode(reader, stop)
}

/// Decode a PNG image.
#[cfg(feature = "png")]
pub fn decode_png<R: Read + Seek + ?Sized>(
    reader: &mut R,
    stop: impl Stop,
) -> Result<PixelBuffer, RasterError> {
    png::decode(reader, None, &stop)
}

/// Encode a PNG image.
#[cfg(feature = "png")]
pub fn encode_png<W: Write + ?Sized>(
    image: &PixelBuffer,
    writer: &mut W,
    stop: impl Stop,
) -> Result<(), RasterError> {
    png::encode(image, writer, &stop)
}

/// Decode a BMP image (24/32-bit output in RGB/RGBA order).
#[cfg(feature = "bmp")]
pub fn decode_bmp<R: Read + Seek + ?Sized>(
    reader: &mut R,
    stop: impl Stop,
) -> Result<PixelBuffer, RasterError> {
    bmp::decode(reader, None, false, &stop)
}

/// Decode a BMP image keeping the stored BGR/BGRA order.
#[cfg(feature = "bmp")]
pub fn decode_bmp_native<R: Read + Seek + ?Sized>(
    reader: &mut R,
    stop: impl Stop,
) -> Result<PixelBuffer, RasterError> {
    bmp::decode(reader, None, true, &stop)
}

/// Encode a BMP image.
#[cfg(feature = "bmp")]
pub fn encode_bmp<W: Write + ?Sized>(
    image: &PixelBuffer,
    writer: &mut W,
    stop: impl Stop,
) -> Result<(), RasterError> {
    bmp::encode(image, writer, &stop)
}

/// Decode every image in an ICO or CUR file.
#[cfg(feature = "ico")]
pub fn decode_ico<R: Read + Seek + ?Sized>(
    reader: &mut R,
    stop: impl Stop,
) -> Result<alloc::vec::Vec<PixelBuffer>, RasterError> {
    ico::decode(reader, None, &stop)
}

/// Encode images into an ICO file.
#[cfg(feature = "ico")]
pub fn encode_ico<W: Write + Seek + ?Sized>(
    images: &[PixelBuffer],
    writer: &mut W,
    stop: impl Stop,
) -> Result<(), RasterError> {
    ico::encode(images, writer, &stop)
}

/// Parse the marker segments of a JPEG stream.
#[cfg(feature = "jpeg")]
pub fn parse_jpeg_headers<R: Read + Seek + ?Sized>(
    reader: &mut R,
    stop: impl Stop,
) -> Result<JpegHeaders, RasterError> {
    jpeg::parse(reader, None, &stop)
}
