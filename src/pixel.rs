use alloc::vec::Vec;
use rgb::RGBA8;

use crate::error::RasterError;

/// Pixel memory layout.
///
/// Sub-byte formats pack samples most-significant-bit first, the order
/// shared by PNG and BMP.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 1-bit palette index.
    Indexed1,
    /// 2-bit palette index.
    Indexed2,
    /// 4-bit palette index.
    Indexed4,
    /// 8-bit palette index.
    Indexed8,
    /// 1-bit grayscale.
    Gray1,
    /// 2-bit grayscale.
    Gray2,
    /// 4-bit grayscale.
    Gray4,
    /// 8-bit grayscale.
    Gray8,
    /// 3 channels, 8-bit RGB.
    Rgb24,
    /// 3 channels, 8-bit BGR (BMP native order).
    Bgr24,
    /// 4 channels, 8-bit RGBA.
    Rgba32,
    /// 4 channels, 8-bit BGRA (BMP native order).
    Bgra32,
}

impl PixelFormat {
    /// Indexed format for a palette of `2^bits` entries.
    pub fn indexed(bits: u8) -> Option<Self> {
        match bits {
            1 => Some(Self::Indexed1),
            2 => Some(Self::Indexed2),
            4 => Some(Self::Indexed4),
            8 => Some(Self::Indexed8),
            _ => None,
        }
    }

    /// Grayscale format with `bits` per sample.
    pub fn gray(bits: u8) -> Option<Self> {
        match bits {
            1 => Some(Self::Gray1),
            2 => Some(Self::Gray2),
            4 => Some(Self::Gray4),
            8 => Some(Self::Gray8),
            _ => None,
        }
    }

    pub fn bits_per_pixel(&self) -> u8 {
        match self {
            Self::Indexed1 | Self::Gray1 => 1,
            Self::Indexed2 | Self::Gray2 => 2,
            Self::Indexed4 | Self::Gray4 => 4,
            Self::Indexed8 | Self::Gray8 => 8,
            Self::Rgb24 | Self::Bgr24 => 24,
            Self::Rgba32 | Self::Bgra32 => 32,
        }
    }

    /// Whole bytes per pixel, rounded up to at least 1.
    ///
    /// This is the byte distance PNG filters use for the "left" neighbor.
    pub fn bytes_per_pixel(&self) -> usize {
        usize::from(self.bits_per_pixel()).div_ceil(8)
    }

    /// Number of channels.
    pub fn channels(&self) -> usize {
        match self {
            Self::Rgb24 | Self::Bgr24 => 3,
            Self::Rgba32 | Self::Bgra32 => 4,
            _ => 1,
        }
    }

    pub fn is_indexed(&self) -> bool {
        matches!(
            self,
            Self::Indexed1 | Self::Indexed2 | Self::Indexed4 | Self::Indexed8
        )
    }

    pub fn is_gray(&self) -> bool {
        matches!(self, Self::Gray1 | Self::Gray2 | Self::Gray4 | Self::Gray8)
    }

    pub fn has_alpha(&self) -> bool {
        matches!(self, Self::Rgba32 | Self::Bgra32)
    }

    /// Whether blue is stored before red.
    pub fn is_bgr_order(&self) -> bool {
        matches!(self, Self::Bgr24 | Self::Bgra32)
    }
}

/// Row length in bytes with byte alignment (PNG rows).
pub fn packed_stride(width: u32, bits_per_pixel: u8) -> usize {
    (width as usize * usize::from(bits_per_pixel)).div_ceil(8)
}

/// Row length in bytes padded to a 4-byte boundary (BMP rows).
pub fn bmp_stride(width: u32, bits_per_pixel: u8) -> usize {
    (width as usize * usize::from(bits_per_pixel)).div_ceil(32) * 4
}

/// Ordered color table for indexed formats.
///
/// Holds at most `capacity` entries (`2^bits` of the format it serves).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Palette {
    entries: Vec<RGBA8>,
    capacity: usize,
}

impl Palette {
    /// Empty palette for `bits`-per-index pixels.
    pub fn new(bits: u8) -> Self {
        Self {
            entries: Vec::new(),
            capacity: 1usize << bits.min(8),
        }
    }

    /// Evenly spaced opaque gray ramp with `2^bits` entries.
    pub fn grayscale(bits: u8) -> Self {
        let bits = bits.min(8);
        let count = 1usize << bits;
        let max = (count - 1) as u32;
        let entries = (0..count as u32)
            .map(|i| {
                let v = if max == 0 { 0 } else { (i * 255 / max) as u8 };
                RGBA8::new(v, v, v, 255)
            })
            .collect();
        Self {
            entries,
            capacity: count,
        }
    }

    /// Build a palette from existing entries.
    pub fn from_entries(bits: u8, entries: &[RGBA8]) -> Result<Self, RasterError> {
        let mut palette = Self::new(bits);
        for &entry in entries {
            palette.push(entry)?;
        }
        Ok(palette)
    }

    /// Append an entry, keeping duplicates.
    pub fn push(&mut self, color: RGBA8) -> Result<u8, RasterError> {
        if self.entries.len() >= self.capacity {
            return Err(RasterError::PaletteOverflow {
                capacity: self.capacity,
            });
        }
        self.entries.push(color);
        Ok((self.entries.len() - 1) as u8)
    }

    /// Index of `color`, appending it if not yet present.
    pub fn lookup_or_insert(&mut self, color: RGBA8) -> Result<u8, RasterError> {
        match self.entries.iter().position(|&e| e == color) {
            Some(idx) => Ok(idx as u8),
            None => self.push(color),
        }
    }

    pub fn get(&self, index: usize) -> Option<RGBA8> {
        self.entries.get(index).copied()
    }

    pub(crate) fn set_alpha(&mut self, index: usize, alpha: u8) {
        if let Some(entry) = self.entries.get_mut(index) {
            entry.a = alpha;
        }
    }

    pub fn entries(&self) -> &[RGBA8] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn has_transparency(&self) -> bool {
        self.entries.iter().any(|e| e.a != 255)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stride_rules() {
        assert_eq!(bmp_stride(3, 1), 4);
        assert_eq!(packed_stride(3, 1), 1);
        assert_eq!(bmp_stride(10, 24), 32);
        assert_eq!(packed_stride(10, 24), 30);
        assert_eq!(packed_stride(5, 4), 3);
        assert_eq!(bmp_stride(1, 32), 4);
    }

    #[test]
    fn filter_unit() {
        assert_eq!(PixelFormat::Indexed1.bytes_per_pixel(), 1);
        assert_eq!(PixelFormat::Gray8.bytes_per_pixel(), 1);
        assert_eq!(PixelFormat::Bgr24.bytes_per_pixel(), 3);
        assert_eq!(PixelFormat::Rgba32.bytes_per_pixel(), 4);
    }

    #[test]
    fn lookup_or_insert_dedups() {
        let mut p = Palette::new(1);
        let red = RGBA8::new(255, 0, 0, 255);
        let blue = RGBA8::new(0, 0, 255, 255);
        assert_eq!(p.lookup_or_insert(red).unwrap(), 0);
        assert_eq!(p.lookup_or_insert(blue).unwrap(), 1);
        assert_eq!(p.lookup_or_insert(red).unwrap(), 0);
        assert_eq!(p.len(), 2);
        match p.lookup_or_insert(RGBA8::new(1, 2, 3, 255)) {
            Err(RasterError::PaletteOverflow { capacity: 2 }) => {}
            other => panic!("expected overflow, got {other:?}"),
        }
    }

    #[test]
    fn push_keeps_duplicates() {
        let mut p = Palette::new(2);
        let c = RGBA8::new(9, 9, 9, 255);
        assert_eq!(p.push(c).unwrap(), 0);
        assert_eq!(p.push(c).unwrap(), 1);
        assert_eq!(p.len(), 2);
    }

    #[test]
    fn grayscale_ramp_endpoints() {
        let p = Palette::grayscale(2);
        let values: Vec<u8> = p.entries().iter().map(|e| e.r).collect();
        assert_eq!(values, [0, 85, 170, 255]);
        assert_eq!(Palette::grayscale(8).len(), 256);
        assert!(!p.has_transparency());
    }
}
