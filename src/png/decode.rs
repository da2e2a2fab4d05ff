//! PNG chunk-stream decoder.
//!
//! Chunks are read one at a time: length, type, payload, CRC. The payload
//! is staged and its CRC verified before it is interpreted. IDAT payloads
//! feed one persistent [`Inflater`]; decompressed bytes fill a `stride + 1`
//! scanline buffer that is defiltered into the output as soon as it is
//! full, whatever the chunk or zlib block boundaries.

use alloc::vec::Vec;
use std::io::{Read, Seek, SeekFrom};

use enough::Stop;
use rgb::RGBA8;

use super::filter::unfilter;
use super::inflate::Inflater;
use super::{MAX_CHUNK_LEN, SIGNATURE};
use crate::buffer::PixelBuffer;
use crate::error::RasterError;
use crate::limits::{Limits, check_limits};
use crate::pixel::{Palette, PixelFormat, packed_stride};
use crate::stream::{Crc32Reader, ReadExt};

/// Parsed IHDR chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct PngHeader {
    pub width: u32,
    pub height: u32,
    pub bit_depth: u8,
    pub color_type: u8,
    pub format: PixelFormat,
}

pub(crate) fn parse_ihdr(payload: &[u8]) -> Result<PngHeader, RasterError> {
    let fields: &[u8; 13] = payload
        .try_into()
        .map_err(|_| {
            RasterError::InvalidHeader(alloc::format!(
                "IHDR length {} (expected 13)",
                payload.len()
            ))
        })?;
    let width = u32::from_be_bytes([fields[0], fields[1], fields[2], fields[3]]);
    let height = u32::from_be_bytes([fields[4], fields[5], fields[6], fields[7]]);
    let [bit_depth, color_type, compression, filter, interlace] = [
        fields[8], fields[9], fields[10], fields[11], fields[12],
    ];

    if width == 0 || height == 0 || width > MAX_CHUNK_LEN || height > MAX_CHUNK_LEN {
        return Err(RasterError::InvalidHeader(alloc::format!(
            "PNG dimensions {width}x{height} out of range"
        )));
    }
    if bit_depth == 16 {
        return Err(RasterError::UnsupportedVariant("16-bit PNG samples".into()));
    }
    if color_type == 4 {
        return Err(RasterError::UnsupportedVariant("PNG gray+alpha color type".into()));
    }
    if compression != 0 {
        return Err(RasterError::UnsupportedVariant(alloc::format!(
            "PNG compression method {compression}"
        )));
    }
    if filter != 0 {
        return Err(RasterError::UnsupportedVariant(alloc::format!(
            "PNG filter method {filter}"
        )));
    }
    if interlace != 0 {
        return Err(RasterError::UnsupportedVariant("interlaced PNG".into()));
    }

    let format = match (color_type, bit_depth) {
        (0, 1 | 2 | 4 | 8) => PixelFormat::gray(bit_depth),
        (2, 8) => Some(PixelFormat::Rgb24),
        (3, 1 | 2 | 4 | 8) => PixelFormat::indexed(bit_depth),
        (6, 8) => Some(PixelFormat::Rgba32),
        _ => None,
    }
    .ok_or_else(|| {
        RasterError::InvalidHeader(alloc::format!(
            "invalid PNG color type {color_type} with bit depth {bit_depth}"
        ))
    })?;

    Ok(PngHeader {
        width,
        height,
        bit_depth,
        color_type,
        format,
    })
}

/// Scanline reassembly and defiltering state.
///
/// Every buffer here grows with the decompressed data, so a header that
/// declares a huge image costs nothing until its rows actually arrive.
struct Scanlines {
    /// Filter byte plus row bytes of the scanline being assembled.
    line: Vec<u8>,
    /// Previous reconstructed row; empty until the first row completes.
    prev: Vec<u8>,
    stride: usize,
    row: u32,
    height: u32,
    unit: usize,
}

impl Scanlines {
    fn new(header: &PngHeader) -> Self {
        Self {
            line: Vec::new(),
            prev: Vec::new(),
            stride: packed_stride(header.width, header.format.bits_per_pixel()),
            row: 0,
            height: header.height,
            unit: header.format.bytes_per_pixel(),
        }
    }

    /// Append decompressed bytes, moving each completed row into `out`.
    fn push(&mut self, out: &mut Vec<u8>, mut data: &[u8]) -> Result<(), RasterError> {
        while !data.is_empty() && self.row < self.height {
            let take = (self.stride + 1 - self.line.len()).min(data.len());
            self.line.extend_from_slice(&data[..take]);
            data = &data[take..];

            if self.line.len() == self.stride + 1 {
                if self.prev.is_empty() {
                    self.prev.resize(self.stride, 0);
                }
                let filter = self.line[0];
                let cur = &mut self.line[1..];
                unfilter(filter, self.unit, &self.prev, cur)?;
                out.extend_from_slice(cur);
                self.prev.copy_from_slice(cur);
                self.row += 1;
                self.line.clear();
            }
        }
        if !data.is_empty() {
            log::trace!("discarding {} bytes past the last scanline", data.len());
        }
        Ok(())
    }
}

/// Image being reconstructed once IHDR is known.
struct Frame {
    header: PngHeader,
    palette: Option<Palette>,
    /// Reconstructed rows so far, tightly packed.
    data: Vec<u8>,
    lines: Scanlines,
    inflater: Inflater,
    seen_idat: bool,
}

impl Frame {
    fn on_plte(&mut self, payload: &[u8]) -> Result<(), RasterError> {
        if payload.len() % 3 != 0 || payload.is_empty() {
            return Err(RasterError::InvalidData(alloc::format!(
                "PLTE length {} is not a positive multiple of 3",
                payload.len()
            )));
        }
        if self.seen_idat {
            return Err(RasterError::InvalidData("PLTE after IDAT".into()));
        }
        if !self.header.format.is_indexed() {
            log::debug!("ignoring suggested palette on truecolor/gray PNG");
            return Ok(());
        }
        let mut palette = Palette::new(self.header.bit_depth);
        let count = payload.len() / 3;
        if count > palette.capacity() {
            return Err(RasterError::InvalidData(alloc::format!(
                "PLTE has {count} entries, more than {}-bit indices allow",
                self.header.bit_depth
            )));
        }
        for rgb in payload.chunks_exact(3) {
            palette.push(RGBA8::new(rgb[0], rgb[1], rgb[2], 255))?;
        }
        log::trace!("PLTE: {count} entries");
        self.palette = Some(palette);
        Ok(())
    }

    fn on_trns(&mut self, payload: &[u8]) -> Result<(), RasterError> {
        if !self.header.format.is_indexed() {
            log::debug!("ignoring tRNS color key on non-indexed PNG");
            return Ok(());
        }
        let palette = self
            .palette
            .as_mut()
            .ok_or_else(|| RasterError::InvalidData("tRNS before PLTE".into()))?;
        if payload.len() > palette.len() {
            return Err(RasterError::InvalidData(alloc::format!(
                "tRNS has {} entries for a {}-entry palette",
                payload.len(),
                palette.len()
            )));
        }
        for (i, &alpha) in payload.iter().enumerate() {
            palette.set_alpha(i, alpha);
        }
        Ok(())
    }

    fn on_idat(&mut self, payload: &[u8]) -> Result<(), RasterError> {
        if self.header.format.is_indexed() && self.palette.is_none() {
            return Err(RasterError::InvalidData("indexed PNG has no PLTE before IDAT".into()));
        }
        self.seen_idat = true;
        let Frame {
            data,
            lines,
            inflater,
            ..
        } = self;
        inflater.feed(payload, |bytes| lines.push(data, bytes))
    }

    fn finish(self) -> Result<PixelBuffer, RasterError> {
        if self.lines.row < self.header.height {
            log::debug!(
                "PNG ended after {} of {} rows",
                self.lines.row,
                self.header.height
            );
            return Err(RasterError::UnexpectedEof);
        }
        if !self.inflater.is_finished() {
            log::debug!("zlib stream not terminated; all rows present");
        }
        let header = self.header;
        let mut image =
            PixelBuffer::from_bytes(header.width, header.height, header.format, self.data)?;
        image.set_palette(self.palette);
        Ok(image)
    }
}

/// Decode a PNG stream positioned at its signature.
pub(crate) fn decode_png<R: Read + Seek + ?Sized>(
    reader: &mut R,
    limits: Option<&Limits>,
    stop: &dyn Stop,
) -> Result<PixelBuffer, RasterError> {
    let signature: [u8; 8] = reader.read_bytes()?;
    if signature != SIGNATURE {
        return Err(RasterError::UnrecognizedFormat);
    }

    let mut reader = Crc32Reader::new(reader);
    let mut frame: Option<Frame> = None;

    loop {
        stop.check()?;
        let length = reader.inner().read_u32_be()?;
        if length > MAX_CHUNK_LEN {
            return Err(RasterError::InvalidData(alloc::format!(
                "chunk length {length} exceeds 2^31-1"
            )));
        }
        reader.reset();
        let kind: [u8; 4] = reader.read_bytes()?;
        let name = chunk_name(&kind);

        if frame.is_none() && &kind != b"IHDR" {
            return Err(RasterError::InvalidHeader(alloc::format!(
                "first chunk is {name}, expected IHDR"
            )));
        }

        if !matches!(&kind, b"IHDR" | b"PLTE" | b"tRNS" | b"IDAT" | b"IEND") {
            if kind[0].is_ascii_uppercase() {
                log::warn!("skipping unknown critical chunk {name} ({length} bytes)");
            } else {
                log::debug!("skipping {name} chunk ({length} bytes)");
            }
            reader
                .inner()
                .seek(SeekFrom::Current(i64::from(length) + 4))?;
            continue;
        }

        let payload = reader.read_vec(length as usize)?;
        let computed = reader.crc();
        let stored = reader.inner().read_u32_be()?;
        if stored != computed {
            return Err(RasterError::ChecksumMismatch {
                chunk: name,
                stored,
                computed,
            });
        }
        log::trace!("{name} chunk: {length} bytes");

        match (&kind, frame.as_mut()) {
            (b"IHDR", None) => {
                let header = parse_ihdr(&payload)?;
                log::debug!(
                    "PNG {}x{} color type {} depth {}",
                    header.width,
                    header.height,
                    header.color_type,
                    header.bit_depth
                );
                let stride = packed_stride(header.width, header.format.bits_per_pixel());
                let bytes = stride.checked_mul(header.height as usize).ok_or(
                    RasterError::DimensionsTooLarge {
                        width: header.width,
                        height: header.height,
                    },
                )?;
                check_limits(limits, header.width, header.height, bytes)?;
                frame = Some(Frame {
                    header,
                    palette: None,
                    data: Vec::new(),
                    lines: Scanlines::new(&header),
                    inflater: Inflater::new(),
                    seen_idat: false,
                });
            }
            (b"IHDR", Some(_)) => {
                return Err(RasterError::InvalidData("duplicate IHDR".into()));
            }
            (b"PLTE", Some(f)) => f.on_plte(&payload)?,
            (b"tRNS", Some(f)) => f.on_trns(&payload)?,
            (b"IDAT", Some(f)) => f.on_idat(&payload)?,
            (b"IEND", Some(_)) => break,
            _ => {
                return Err(RasterError::InvalidData(alloc::format!(
                    "unexpected {name} chunk"
                )));
            }
        }
    }

    frame
        .ok_or_else(|| RasterError::InvalidHeader("missing IHDR".into()))?
        .finish()
}

fn chunk_name(kind: &[u8; 4]) -> alloc::string::String {
    kind.iter()
        .map(|&b| if b.is_ascii_alphabetic() { b as char } else { '?' })
        .collect()
}
