//! JPEG marker parsing.
//!
//! Reads every marker segment from SOI to EOI and collects the JFIF header,
//! quantization tables, Huffman tables, the frame header and one header per
//! scan. Entropy-coded data is skipped after its first DC category has been
//! decoded; no pixels are reconstructed. Use [`crate::parse_jpeg_headers`].

mod entropy;
mod markers;
mod parse;

use alloc::vec::Vec;
use std::io::{Read, Seek};

use enough::Stop;

use crate::error::RasterError;
use crate::huffman::HuffmanTable;
use crate::limits::Limits;
use crate::stream::with_rewind;

/// Units of the JFIF pixel density fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DensityUnit {
    /// Densities only give the aspect ratio.
    None,
    DotsPerInch,
    DotsPerCm,
}

/// Contents of an APP0 "JFIF" segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JfifInfo {
    /// (major, minor)
    pub version: (u8, u8),
    pub units: DensityUnit,
    pub x_density: u16,
    pub y_density: u16,
    /// Embedded thumbnail (width, height); (0, 0) when absent.
    pub thumbnail: (u8, u8),
}

/// One DQT table, values in zigzag order as stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuantTable {
    /// 0 for 8-bit values, 1 for 16-bit.
    pub precision: u8,
    pub values: [u16; 64],
}

/// Coding process named by the SOF marker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CodingProcess {
    /// SOF0
    Baseline,
    /// SOF1
    ExtendedSequential,
    /// SOF2
    Progressive,
    /// SOF3
    Lossless,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameComponent {
    pub id: u8,
    pub h_sampling: u8,
    pub v_sampling: u8,
    pub quant_table: u8,
}

/// Parsed SOF segment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameHeader {
    pub process: CodingProcess,
    /// Bits per sample.
    pub precision: u8,
    pub width: u16,
    pub height: u16,
    pub components: Vec<FrameComponent>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScanComponent {
    pub id: u8,
    pub dc_table: u8,
    pub ac_table: u8,
}

/// Parsed SOS segment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanHeader {
    pub components: Vec<ScanComponent>,
    pub spectral_start: u8,
    pub spectral_end: u8,
    pub approx_high: u8,
    pub approx_low: u8,
    /// Magnitude category of the first DC difference in the scan, decoded
    /// with the first component's DC table. `None` for scans that carry no
    /// Huffman-coded DC values, or whose entropy data is empty.
    pub first_dc_category: Option<u8>,
}

/// Everything collected from a JPEG stream.
#[derive(Clone, Debug)]
pub struct JpegHeaders {
    pub jfif: Option<JfifInfo>,
    /// Whether an APP0 "JFXX" extension segment was present.
    pub has_jfxx: bool,
    /// Quantization tables by id.
    pub quant_tables: [Option<QuantTable>; 4],
    /// DC Huffman tables by id (class 0).
    pub dc_tables: [Option<HuffmanTable>; 4],
    /// AC Huffman tables by id (class 1).
    pub ac_tables: [Option<HuffmanTable>; 4],
    pub frame: FrameHeader,
    /// Scans in stream order.
    pub scans: Vec<ScanHeader>,
    /// MCUs between restart markers; 0 when restarts are off.
    pub restart_interval: u16,
}

/// Parse JPEG headers, rewinding the stream on failure.
pub(crate) fn parse<R: Read + Seek + ?Sized>(
    reader: &mut R,
    limits: Option<&Limits>,
    stop: &dyn Stop,
) -> Result<JpegHeaders, RasterError> {
    with_rewind(reader, |r| parse::parse_headers(r, limits, stop))
}
