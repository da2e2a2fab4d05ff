//! Reading through an entropy-coded segment.
//!
//! Inside a scan, `FF 00` is a stuffed `FF` data byte and `FF D0`..`FF D7`
//! are restart markers; any other `FF xx` ends the segment.

use std::io::Read;

use super::markers::{RST0, RST7};
use crate::error::RasterError;
use crate::huffman::BitSource;
use crate::stream::ReadExt;

/// Bit reader over entropy-coded bytes, most significant bit first.
pub(crate) struct EntropyReader<'a, R: ?Sized> {
    inner: &'a mut R,
    byte: u8,
    bits_left: u8,
    /// Marker that ended the segment while reading bits.
    marker: Option<u8>,
}

impl<'a, R: Read + ?Sized> EntropyReader<'a, R> {
    pub(crate) fn new(inner: &'a mut R) -> Self {
        Self {
            inner,
            byte: 0,
            bits_left: 0,
            marker: None,
        }
    }

    /// Whether bit reading stopped at a marker.
    pub(crate) fn at_marker(&self) -> bool {
        self.marker.is_some()
    }

    /// Read the marker code following a `FF`, skipping fill bytes.
    fn marker_after_ff(&mut self) -> Result<u8, RasterError> {
        let mut code = self.inner.read_u8()?;
        while code == 0xFF {
            code = self.inner.read_u8()?;
        }
        Ok(code)
    }

    /// Skip the rest of the segment and return the marker that ends it.
    ///
    /// Stuffed bytes and restart markers are passed over.
    pub(crate) fn skip_to_marker(mut self) -> Result<u8, RasterError> {
        let mut skipped = 0u64;
        let mut restarts = 0u32;
        if let Some(code) = self.marker.take() {
            if !(RST0..=RST7).contains(&code) {
                return Ok(code);
            }
            restarts += 1;
        }
        loop {
            if self.inner.read_u8()? != 0xFF {
                skipped += 1;
                continue;
            }
            match self.marker_after_ff()? {
                0x00 => skipped += 1,
                RST0..=RST7 => restarts += 1,
                code => {
                    log::trace!(
                        "entropy segment: {skipped} bytes, {restarts} restart markers"
                    );
                    return Ok(code);
                }
            }
        }
    }
}

impl<R: Read + ?Sized> BitSource for EntropyReader<'_, R> {
    fn read_bit(&mut self) -> Result<u8, RasterError> {
        if self.bits_left == 0 {
            if let Some(code) = self.marker {
                return Err(RasterError::InvalidData(alloc::format!(
                    "entropy-coded data ended at marker {code:#04x}"
                )));
            }
            let b = self.inner.read_u8()?;
            if b == 0xFF {
                let code = self.marker_after_ff()?;
                if code != 0x00 {
                    self.marker = Some(code);
                    return Err(RasterError::InvalidData(alloc::format!(
                        "entropy-coded data ended at marker {code:#04x}"
                    )));
                }
            }
            self.byte = b;
            self.bits_left = 8;
        }
        self.bits_left -= 1;
        Ok((self.byte >> self.bits_left) & 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn unstuffs_ff00() {
        let mut c = Cursor::new([0xFFu8, 0x00, 0x80]);
        let mut r = EntropyReader::new(&mut c);
        let bits: Vec<u8> = (0..9).map(|_| r.read_bit().unwrap()).collect();
        assert_eq!(bits, [1, 1, 1, 1, 1, 1, 1, 1, 1]);
    }

    #[test]
    fn stops_at_marker() {
        let mut c = Cursor::new([0xA0u8, 0xFF, 0xD9]);
        let mut r = EntropyReader::new(&mut c);
        for _ in 0..8 {
            r.read_bit().unwrap();
        }
        assert!(r.read_bit().is_err());
        assert!(r.at_marker());
        assert_eq!(r.skip_to_marker().unwrap(), 0xD9);
    }

    #[test]
    fn skip_passes_restarts_and_stuffing() {
        let data = [0x12u8, 0xFF, 0x00, 0x34, 0xFF, 0xD3, 0x56, 0xFF, 0xFF, 0xC4];
        let mut c = Cursor::new(data);
        assert_eq!(EntropyReader::new(&mut c).skip_to_marker().unwrap(), 0xC4);
        assert_eq!(c.position(), data.len() as u64);
    }

    #[test]
    fn truncated_segment_is_eof() {
        let mut c = Cursor::new([0x00u8, 0x11]);
        assert!(matches!(
            EntropyReader::new(&mut c).skip_to_marker(),
            Err(RasterError::UnexpectedEof)
        ));
    }
}
