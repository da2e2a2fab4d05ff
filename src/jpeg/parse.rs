//! Marker-segment scanner.

use alloc::vec::Vec;
use std::io::{Read, Seek, SeekFrom};

use enough::Stop;

use super::entropy::EntropyReader;
use super::markers::{self, *};
use super::{
    CodingProcess, DensityUnit, FrameComponent, FrameHeader, JfifInfo, JpegHeaders, QuantTable,
    ScanComponent, ScanHeader,
};
use crate::error::RasterError;
use crate::huffman::{CodeCounts, HuffmanTable, MAX_CODE_LENGTH};
use crate::limits::{Limits, check_limits};
use crate::stream::ReadExt;

/// Tables and headers collected so far.
#[derive(Default)]
struct State {
    jfif: Option<JfifInfo>,
    has_jfxx: bool,
    quant_tables: [Option<QuantTable>; 4],
    dc_tables: [Option<HuffmanTable>; 4],
    ac_tables: [Option<HuffmanTable>; 4],
    frame: Option<FrameHeader>,
    scans: Vec<ScanHeader>,
    restart_interval: u16,
}

fn invalid(msg: impl Into<alloc::string::String>) -> RasterError {
    RasterError::InvalidData(msg.into())
}

/// Read the next marker code, skipping stray bytes and fill bytes.
fn next_marker<R: Read + ?Sized>(reader: &mut R) -> Result<u8, RasterError> {
    let mut stray = 0u32;
    loop {
        if reader.read_u8()? != 0xFF {
            stray += 1;
            continue;
        }
        let mut code = reader.read_u8()?;
        while code == 0xFF {
            code = reader.read_u8()?;
        }
        if code == 0x00 {
            stray += 2;
            continue;
        }
        if stray > 0 {
            log::warn!("skipped {stray} bytes before marker {code:#04x}");
        }
        return Ok(code);
    }
}

/// Read a segment's length field and return the payload length.
fn segment_len<R: Read + ?Sized>(reader: &mut R, code: u8) -> Result<usize, RasterError> {
    let len = reader.read_u16_be()?;
    if len < 2 {
        return Err(invalid(alloc::format!(
            "{} segment length {len} is less than 2",
            markers::name(code)
        )));
    }
    Ok(usize::from(len - 2))
}

fn parse_app0(state: &mut State, payload: &[u8]) -> Result<(), RasterError> {
    if let Some(rest) = payload.strip_prefix(b"JFIF\0") {
        let f: &[u8; 9] = rest
            .get(..9)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| RasterError::InvalidHeader("JFIF segment too short".into()))?;
        let units = match f[2] {
            0 => DensityUnit::None,
            1 => DensityUnit::DotsPerInch,
            2 => DensityUnit::DotsPerCm,
            u => {
                return Err(RasterError::InvalidHeader(alloc::format!(
                    "JFIF density unit {u}"
                )));
            }
        };
        let info = JfifInfo {
            version: (f[0], f[1]),
            units,
            x_density: u16::from_be_bytes([f[3], f[4]]),
            y_density: u16::from_be_bytes([f[5], f[6]]),
            thumbnail: (f[7], f[8]),
        };
        log::debug!("JFIF {}.{:02}", info.version.0, info.version.1);
        state.jfif = Some(info);
        Ok(())
    } else if payload.starts_with(b"JFXX\0") {
        log::debug!("JFXX extension segment");
        state.has_jfxx = true;
        Ok(())
    } else {
        Err(RasterError::InvalidHeader(
            "APP0 segment is neither JFIF nor JFXX".into(),
        ))
    }
}

fn parse_dqt(state: &mut State, mut payload: &[u8]) -> Result<(), RasterError> {
    while let Some((&pq_tq, rest)) = payload.split_first() {
        let precision = pq_tq >> 4;
        let id = usize::from(pq_tq & 0x0F);
        if precision > 1 {
            return Err(invalid(alloc::format!("DQT precision {precision}")));
        }
        if id > 3 {
            return Err(invalid(alloc::format!("DQT table id {id}")));
        }
        let len = 64 * (usize::from(precision) + 1);
        let bytes = rest
            .get(..len)
            .ok_or_else(|| invalid("DQT table truncated"))?;
        let mut values = [0u16; 64];
        if precision == 0 {
            for (v, &b) in values.iter_mut().zip(bytes) {
                *v = u16::from(b);
            }
        } else {
            for (v, b) in values.iter_mut().zip(bytes.chunks_exact(2)) {
                *v = u16::from_be_bytes([b[0], b[1]]);
            }
        }
        log::trace!("DQT table {id}, {}-bit", 8 << precision);
        state.quant_tables[id] = Some(QuantTable { precision, values });
        payload = &rest[len..];
    }
    Ok(())
}

fn parse_sof(
    state: &mut State,
    code: u8,
    payload: &[u8],
    limits: Option<&Limits>,
) -> Result<(), RasterError> {
    if state.frame.is_some() {
        return Err(invalid("second SOF marker"));
    }
    let process = match code {
        0xC0 => CodingProcess::Baseline,
        0xC1 => CodingProcess::ExtendedSequential,
        0xC2 => CodingProcess::Progressive,
        _ => CodingProcess::Lossless,
    };
    let [precision, h0, h1, w0, w1, count]: [u8; 6] = payload
        .get(..6)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| RasterError::InvalidHeader("SOF segment too short".into()))?;
    let height = u16::from_be_bytes([h0, h1]);
    let width = u16::from_be_bytes([w0, w1]);

    let precision_ok = match process {
        CodingProcess::Baseline => precision == 8,
        CodingProcess::ExtendedSequential | CodingProcess::Progressive => {
            precision == 8 || precision == 12
        }
        CodingProcess::Lossless => (2..=16).contains(&precision),
    };
    if !precision_ok {
        return Err(RasterError::InvalidHeader(alloc::format!(
            "{precision}-bit samples in a {process:?} frame"
        )));
    }
    if width == 0 {
        return Err(RasterError::InvalidHeader("JPEG width is zero".into()));
    }
    if height == 0 {
        return Err(RasterError::UnsupportedVariant(
            "JPEG height defined by DNL".into(),
        ));
    }
    if count == 0 || payload.len() != 6 + 3 * usize::from(count) {
        return Err(RasterError::InvalidHeader(alloc::format!(
            "SOF declares {count} components in {} bytes",
            payload.len()
        )));
    }

    let components = payload[6..]
        .chunks_exact(3)
        .map(|c| {
            let (h, v) = (c[1] >> 4, c[1] & 0x0F);
            if !(1..=4).contains(&h) || !(1..=4).contains(&v) {
                return Err(RasterError::InvalidHeader(alloc::format!(
                    "component {} sampling factors {h}x{v}",
                    c[0]
                )));
            }
            if c[2] > 3 {
                return Err(RasterError::InvalidHeader(alloc::format!(
                    "component {} uses quantization table {}",
                    c[0], c[2]
                )));
            }
            Ok(FrameComponent {
                id: c[0],
                h_sampling: h,
                v_sampling: v,
                quant_table: c[2],
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let (w, h) = (u32::from(width), u32::from(height));
    check_limits(limits, w, h, w as usize * h as usize * components.len())?;
    log::debug!("{process:?} frame {width}x{height}, {count} components, {precision}-bit");
    state.frame = Some(FrameHeader {
        process,
        precision,
        width,
        height,
        components,
    });
    Ok(())
}

fn parse_dht(state: &mut State, mut payload: &[u8]) -> Result<(), RasterError> {
    while let Some((&tc_th, rest)) = payload.split_first() {
        let class = tc_th >> 4;
        let id = usize::from(tc_th & 0x0F);
        if class > 1 || id > 3 {
            return Err(invalid(alloc::format!("DHT class {class} id {id}")));
        }
        let counts: &CodeCounts = rest
            .get(..usize::from(MAX_CODE_LENGTH))
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| invalid("DHT counts truncated"))?;
        let total: usize = counts.iter().map(|&c| usize::from(c)).sum();
        let symbols = rest
            .get(16..16 + total)
            .ok_or_else(|| invalid("DHT symbols truncated"))?;
        let table = HuffmanTable::from_counts(counts, symbols)?;
        log::trace!(
            "DHT {} table {id}: {total} codes",
            if class == 0 { "DC" } else { "AC" }
        );
        if class == 0 {
            state.dc_tables[id] = Some(table);
        } else {
            state.ac_tables[id] = Some(table);
        }
        payload = &rest[16 + total..];
    }
    Ok(())
}

/// Parse the scan header, then read the scan's leading DC category and skip
/// its entropy-coded data. Returns the marker that ended the segment.
fn parse_sos<R: Read + ?Sized>(
    state: &mut State,
    payload: &[u8],
    reader: &mut R,
) -> Result<u8, RasterError> {
    let frame = state
        .frame
        .as_ref()
        .ok_or_else(|| invalid("SOS before SOF"))?;
    let count = usize::from(*payload.first().ok_or_else(|| invalid("empty SOS"))?);
    if !(1..=4).contains(&count) || payload.len() != 4 + 2 * count {
        return Err(invalid(alloc::format!(
            "SOS declares {count} components in {} bytes",
            payload.len()
        )));
    }
    let tail = &payload[1 + 2 * count..];
    let (spectral_start, spectral_end) = (tail[0], tail[1]);
    let (approx_high, approx_low) = (tail[2] >> 4, tail[2] & 0x0F);

    let mut components = Vec::with_capacity(count);
    for c in payload[1..1 + 2 * count].chunks_exact(2) {
        let (id, dc_table, ac_table) = (c[0], c[1] >> 4, c[1] & 0x0F);
        if !frame.components.iter().any(|f| f.id == id) {
            return Err(invalid(alloc::format!(
                "scan references unknown component {id}"
            )));
        }
        let defined = |tables: &[Option<HuffmanTable>; 4], id: u8| {
            tables.get(usize::from(id)).is_some_and(Option::is_some)
        };
        if spectral_start == 0 && !defined(&state.dc_tables, dc_table) {
            return Err(invalid(alloc::format!(
                "component {id} uses undefined DC table {dc_table}"
            )));
        }
        if spectral_end > 0 && !defined(&state.ac_tables, ac_table) {
            return Err(invalid(alloc::format!(
                "component {id} uses undefined AC table {ac_table}"
            )));
        }
        components.push(ScanComponent {
            id,
            dc_table,
            ac_table,
        });
    }

    let mut bits = EntropyReader::new(reader);
    let first_dc_category = match (spectral_start, approx_high) {
        (0, 0) => {
            let table = state.dc_tables[usize::from(components[0].dc_table)]
                .as_ref()
                .ok_or_else(|| invalid("missing DC table"))?;
            match table.decode_symbol(&mut bits) {
                Ok(category) => Some(category),
                Err(_) if bits.at_marker() => None,
                Err(e) => return Err(e),
            }
        }
        _ => None,
    };
    log::debug!(
        "SOS: {count} components, spectral {spectral_start}..={spectral_end}, \
         approximation {approx_high}/{approx_low}, first DC category {first_dc_category:?}"
    );
    let next = bits.skip_to_marker()?;

    state.scans.push(ScanHeader {
        components,
        spectral_start,
        spectral_end,
        approx_high,
        approx_low,
        first_dc_category,
    });
    Ok(next)
}

/// Parse a JPEG stream positioned at its SOI marker, up to EOI.
pub(crate) fn parse_headers<R: Read + Seek + ?Sized>(
    reader: &mut R,
    limits: Option<&Limits>,
    stop: &dyn Stop,
) -> Result<JpegHeaders, RasterError> {
    if reader.read_bytes::<2>()? != [0xFF, SOI] {
        return Err(RasterError::UnrecognizedFormat);
    }

    let mut state = State::default();
    let mut pending: Option<u8> = None;
    loop {
        stop.check()?;
        let code = match pending.take() {
            Some(code) => code,
            None => next_marker(reader)?,
        };

        match code {
            EOI => break,
            SOI => return Err(invalid("SOI inside image")),
            TEM | RST0..=RST7 => {
                log::trace!("standalone {} marker", markers::name(code));
                continue;
            }
            c if markers::is_unsupported_sof(c) => {
                return Err(RasterError::UnsupportedVariant(alloc::format!(
                    "JPEG frame type SOF{}",
                    c - SOF0
                )));
            }
            DHP | EXP => {
                return Err(RasterError::UnsupportedVariant(
                    "hierarchical JPEG".into(),
                ));
            }
            _ => {}
        }

        let len = segment_len(reader, code)?;
        match code {
            APP0 | DQT | SOF0..=SOF3 | DHT | DRI | SOS => {
                let payload = reader.read_vec(len)?;
                match code {
                    APP0 => parse_app0(&mut state, &payload)?,
                    DQT => parse_dqt(&mut state, &payload)?,
                    DHT => parse_dht(&mut state, &payload)?,
                    DRI => {
                        let [hi, lo]: [u8; 2] = payload
                            .as_slice()
                            .try_into()
                            .map_err(|_| invalid("DRI segment length must be 4"))?;
                        state.restart_interval = u16::from_be_bytes([hi, lo]);
                        log::trace!("restart interval {}", state.restart_interval);
                    }
                    SOS => pending = Some(parse_sos(&mut state, &payload, reader)?),
                    _ => parse_sof(&mut state, code, &payload, limits)?,
                }
            }
            _ => {
                log::trace!("skipping {} segment {code:#04x}, {len} bytes", markers::name(code));
                reader.seek(SeekFrom::Current(len as i64))?;
            }
        }
    }

    let frame = state
        .frame
        .ok_or_else(|| invalid("no frame header before EOI"))?;
    Ok(JpegHeaders {
        jfif: state.jfif,
        has_jfxx: state.has_jfxx,
        quant_tables: state.quant_tables,
        dc_tables: state.dc_tables,
        ac_tables: state.ac_tables,
        frame,
        scans: state.scans,
        restart_interval: state.restart_interval,
    })
}
