use alloc::vec;
use alloc::vec::Vec;

use rgb::RGBA8;

use crate::error::RasterError;
use crate::pixel::{Palette, PixelFormat, packed_stride};

/// Owned raster image.
///
/// Rows are `stride` bytes apart; only the first
/// [`row_bytes`](Self::row_bytes) of each row are pixel data. Indexed
/// buffers carry their own [`Palette`].
#[derive(Clone, Debug)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    stride: usize,
    data: Vec<u8>,
    format: PixelFormat,
    palette: Option<Palette>,
}

impl PixelBuffer {
    /// Zeroed buffer with byte-aligned rows.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Result<Self, RasterError> {
        Self::with_stride(width, height, format, packed_stride(width, format.bits_per_pixel()))
    }

    /// Zeroed buffer with an explicit row stride.
    pub fn with_stride(
        width: u32,
        height: u32,
        format: PixelFormat,
        stride: usize,
    ) -> Result<Self, RasterError> {
        if width == 0 || height == 0 {
            return Err(RasterError::InvalidDimensions { width, height });
        }
        let min_stride = packed_stride(width, format.bits_per_pixel());
        if stride < min_stride {
            return Err(RasterError::BufferTooSmall {
                needed: min_stride,
                actual: stride,
            });
        }
        let len = stride
            .checked_mul(height as usize)
            .ok_or(RasterError::DimensionsTooLarge { width, height })?;
        Ok(Self {
            width,
            height,
            stride,
            data: vec![0u8; len],
            format,
            palette: None,
        })
    }

    /// Wrap tightly packed pixel bytes (byte-aligned rows).
    pub fn from_bytes(
        width: u32,
        height: u32,
        format: PixelFormat,
        mut data: Vec<u8>,
    ) -> Result<Self, RasterError> {
        if width == 0 || height == 0 {
            return Err(RasterError::InvalidDimensions { width, height });
        }
        let stride = packed_stride(width, format.bits_per_pixel());
        let needed = stride
            .checked_mul(height as usize)
            .ok_or(RasterError::DimensionsTooLarge { width, height })?;
        if data.len() < needed {
            return Err(RasterError::BufferTooSmall {
                needed,
                actual: data.len(),
            });
        }
        data.truncate(needed);
        Ok(Self {
            width,
            height,
            stride,
            data,
            format,
            palette: None,
        })
    }

    /// Attach a palette (builder style).
    pub fn with_palette(mut self, palette: Palette) -> Self {
        self.palette = Some(palette);
        self
    }

    pub fn set_palette(&mut self, palette: Option<Palette>) {
        self.palette = palette;
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn palette(&self) -> Option<&Palette> {
        self.palette.as_ref()
    }

    /// Fails with [`RasterError::PaletteOverflow`] when an indexed buffer
    /// carries more palette entries than its bit depth can address.
    pub(crate) fn check_palette(&self) -> Result<(), RasterError> {
        if let Some(palette) = &self.palette {
            let capacity = 1usize << self.format.bits_per_pixel();
            if self.format.is_indexed() && palette.len() > capacity {
                return Err(RasterError::PaletteOverflow { capacity });
            }
        }
        Ok(())
    }

    /// Raw storage including row padding.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Bytes of pixel data in each row (stride minus padding).
    pub fn row_bytes(&self) -> usize {
        packed_stride(self.width, self.format.bits_per_pixel())
    }

    /// Pixel bytes of row `y`, without padding.
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride;
        &self.data[start..start + self.row_bytes()]
    }

    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let start = y as usize * self.stride;
        let len = self.row_bytes();
        &mut self.data[start..start + len]
    }

    /// Iterator over rows, top to bottom, without padding.
    pub fn rows(&self) -> impl Iterator<Item = &[u8]> + '_ {
        let len = self.row_bytes();
        self.data.chunks(self.stride).map(move |row| &row[..len])
    }

    /// Raw sample value at (x, y): palette index, gray level, or the pixel
    /// bytes in storage order packed big-endian into a `u32`.
    pub fn sample(&self, x: u32, y: u32) -> u32 {
        let row = self.row(y);
        let bits = self.format.bits_per_pixel();
        if bits < 8 {
            let bit_pos = x as usize * usize::from(bits);
            let byte = row[bit_pos / 8];
            let shift = 8 - usize::from(bits) - bit_pos % 8;
            let mask = (1u8 << bits) - 1;
            u32::from((byte >> shift) & mask)
        } else {
            let bpp = self.format.bytes_per_pixel();
            let off = x as usize * bpp;
            row[off..off + bpp]
                .iter()
                .fold(0u32, |acc, &b| (acc << 8) | u32::from(b))
        }
    }

    /// Store a raw sample value; the inverse of [`sample`](Self::sample).
    pub fn set_sample(&mut self, x: u32, y: u32, value: u32) {
        let bits = self.format.bits_per_pixel();
        let bpp = self.format.bytes_per_pixel();
        let row = self.row_mut(y);
        if bits < 8 {
            let bit_pos = x as usize * usize::from(bits);
            let shift = 8 - usize::from(bits) - bit_pos % 8;
            let mask = ((1u8 << bits) - 1) << shift;
            let byte = &mut row[bit_pos / 8];
            *byte = (*byte & !mask) | (((value as u8) << shift) & mask);
        } else {
            let off = x as usize * bpp;
            for (i, b) in row[off..off + bpp].iter_mut().enumerate() {
                *b = (value >> (8 * (bpp - 1 - i))) as u8;
            }
        }
    }

    /// Color at (x, y), resolving palette indices and gray levels.
    ///
    /// Indexed buffers without a palette are read as a gray ramp; indices
    /// past the end of the palette read as opaque black.
    pub fn color_at(&self, x: u32, y: u32) -> RGBA8 {
        let v = self.sample(x, y);
        let bits = self.format.bits_per_pixel();
        match self.format {
            f if f.is_indexed() => match &self.palette {
                Some(palette) => palette
                    .get(v as usize)
                    .unwrap_or(RGBA8::new(0, 0, 0, 255)),
                None => gray(scale_to_u8(v, bits)),
            },
            f if f.is_gray() => gray(scale_to_u8(v, bits)),
            PixelFormat::Rgb24 => RGBA8::new((v >> 16) as u8, (v >> 8) as u8, v as u8, 255),
            PixelFormat::Bgr24 => RGBA8::new(v as u8, (v >> 8) as u8, (v >> 16) as u8, 255),
            PixelFormat::Rgba32 => {
                RGBA8::new((v >> 24) as u8, (v >> 16) as u8, (v >> 8) as u8, v as u8)
            }
            PixelFormat::Bgra32 => {
                RGBA8::new((v >> 8) as u8, (v >> 16) as u8, (v >> 24) as u8, v as u8)
            }
            _ => RGBA8::new(0, 0, 0, 255),
        }
    }

    /// Nearest-neighbor resample to `width` x `height`. Keeps the format and
    /// palette.
    pub fn resize_nearest(&self, width: u32, height: u32) -> Result<PixelBuffer, RasterError> {
        let mut out = PixelBuffer::new(width, height, self.format)?;
        out.palette = self.palette.clone();
        let bits = self.format.bits_per_pixel();
        let bpp = self.format.bytes_per_pixel();
        for y in 0..height {
            let src_y = (u64::from(y) * u64::from(self.height) / u64::from(height)) as u32;
            for x in 0..width {
                let src_x = (u64::from(x) * u64::from(self.width) / u64::from(width)) as u32;
                if bits < 8 {
                    let v = self.sample(src_x, src_y);
                    out.set_sample(x, y, v);
                } else {
                    let src = &self.row(src_y)[src_x as usize * bpp..][..bpp];
                    out.row_mut(y)[x as usize * bpp..][..bpp].copy_from_slice(src);
                }
            }
        }
        Ok(out)
    }

    /// Convert to an indexed buffer with `2^bits` palette entries, building
    /// the palette from the distinct colors in first-seen order.
    ///
    /// Fails with [`RasterError::PaletteOverflow`] when the image has more
    /// distinct colors than the palette can hold.
    pub fn to_indexed(&self, bits: u8) -> Result<PixelBuffer, RasterError> {
        let format = PixelFormat::indexed(bits).ok_or_else(|| {
            RasterError::UnsupportedVariant(alloc::format!("{bits}-bit indexed format"))
        })?;
        let mut out = PixelBuffer::new(self.width, self.height, format)?;
        let mut palette = Palette::new(bits);
        for y in 0..self.height {
            for x in 0..self.width {
                let idx = palette.lookup_or_insert(self.color_at(x, y))?;
                out.set_sample(x, y, u32::from(idx));
            }
        }
        out.palette = Some(palette);
        Ok(out)
    }

    /// Copy into an [`imgref::ImgVec`] of typed pixels.
    ///
    /// Returns [`RasterError::LayoutMismatch`] if the pixel format doesn't match `P`.
    #[cfg(feature = "imgref")]
    pub fn to_imgvec<P: DecodePixel>(&self) -> Result<imgref::ImgVec<P>, RasterError> {
        if self.format != P::format() {
            return Err(RasterError::LayoutMismatch {
                expected: P::format(),
                actual: self.format,
            });
        }
        let bpp = self.format.bytes_per_pixel();
        let mut pixels = Vec::with_capacity(self.width as usize * self.height as usize);
        for row in self.rows() {
            pixels.extend(row.chunks_exact(bpp).map(P::from_bytes));
        }
        Ok(imgref::ImgVec::new(
            pixels,
            self.width as usize,
            self.height as usize,
        ))
    }
}

impl PartialEq for PixelBuffer {
    /// Buffers are equal when dimensions, format, palette and pixel bytes
    /// match; stride padding is ignored.
    fn eq(&self, other: &Self) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.format == other.format
            && self.palette == other.palette
            && self.rows().eq(other.rows())
    }
}

impl Eq for PixelBuffer {}

/// Pixel types that [`PixelBuffer::to_imgvec`] can produce.
#[cfg(feature = "imgref")]
pub trait DecodePixel: Copy {
    fn format() -> PixelFormat;
    fn from_bytes(bytes: &[u8]) -> Self;
}

#[cfg(feature = "imgref")]
impl DecodePixel for u8 {
    fn format() -> PixelFormat {
        PixelFormat::Gray8
    }
    fn from_bytes(bytes: &[u8]) -> Self {
        bytes[0]
    }
}

#[cfg(feature = "imgref")]
impl DecodePixel for rgb::RGB8 {
    fn format() -> PixelFormat {
        PixelFormat::Rgb24
    }
    fn from_bytes(bytes: &[u8]) -> Self {
        rgb::RGB8::new(bytes[0], bytes[1], bytes[2])
    }
}

#[cfg(feature = "imgref")]
impl DecodePixel for RGBA8 {
    fn format() -> PixelFormat {
        PixelFormat::Rgba32
    }
    fn from_bytes(bytes: &[u8]) -> Self {
        RGBA8::new(bytes[0], bytes[1], bytes[2], bytes[3])
    }
}

fn gray(v: u8) -> RGBA8 {
    RGBA8::new(v, v, v, 255)
}

fn scale_to_u8(v: u32, bits: u8) -> u8 {
    let max = (1u32 << bits) - 1;
    (v.min(max) * 255 / max) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_byte_samples_pack_msb_first() {
        let mut buf = PixelBuffer::new(5, 1, PixelFormat::Indexed4).unwrap();
        for x in 0..5 {
            buf.set_sample(x, 0, x + 10);
        }
        assert_eq!(buf.row(0), &[0xAB, 0xCD, 0xE0]);
        assert_eq!(buf.sample(3, 0), 13);

        let mut bits = PixelBuffer::new(9, 1, PixelFormat::Gray1).unwrap();
        bits.set_sample(0, 0, 1);
        bits.set_sample(8, 0, 1);
        assert_eq!(bits.row(0), &[0x80, 0x80]);
    }

    #[test]
    fn color_at_resolves_orders() {
        let rgb = PixelBuffer::from_bytes(1, 1, PixelFormat::Rgb24, vec![1, 2, 3]).unwrap();
        let bgr = PixelBuffer::from_bytes(1, 1, PixelFormat::Bgr24, vec![3, 2, 1]).unwrap();
        assert_eq!(rgb.color_at(0, 0), bgr.color_at(0, 0));
        let bgra = PixelBuffer::from_bytes(1, 1, PixelFormat::Bgra32, vec![3, 2, 1, 9]).unwrap();
        assert_eq!(bgra.color_at(0, 0), RGBA8::new(1, 2, 3, 9));
        let g = PixelBuffer::from_bytes(2, 1, PixelFormat::Gray2, vec![0b1101_0000]).unwrap();
        assert_eq!(g.color_at(0, 0).r, 255);
        assert_eq!(g.color_at(1, 0).r, 85);
    }

    #[test]
    fn equality_ignores_padding() {
        let mut a = PixelBuffer::with_stride(3, 2, PixelFormat::Gray8, 8).unwrap();
        a.row_mut(0).copy_from_slice(&[1, 2, 3]);
        a.row_mut(1).copy_from_slice(&[4, 5, 6]);
        a.data_mut()[7] = 0xEE;
        let b = PixelBuffer::from_bytes(3, 2, PixelFormat::Gray8, vec![1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn zero_dimensions_rejected() {
        assert!(matches!(
            PixelBuffer::new(0, 4, PixelFormat::Rgb24),
            Err(RasterError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn resize_nearest_halves() {
        let data: Vec<u8> = (0..16).collect();
        let buf = PixelBuffer::from_bytes(4, 4, PixelFormat::Gray8, data).unwrap();
        let small = buf.resize_nearest(2, 2).unwrap();
        assert_eq!(small.row(0), &[0, 2]);
        assert_eq!(small.row(1), &[8, 10]);
    }

    #[test]
    fn to_indexed_builds_palette() {
        let data = vec![255, 0, 0, 0, 255, 0, 255, 0, 0, 0, 255, 0];
        let buf = PixelBuffer::from_bytes(2, 2, PixelFormat::Rgb24, data).unwrap();
        let idx = buf.to_indexed(1).unwrap();
        assert_eq!(idx.palette().unwrap().len(), 2);
        assert_eq!(idx.row(0), &[0b0100_0000]);
        assert!(matches!(
            PixelBuffer::from_bytes(3, 1, PixelFormat::Gray8, vec![1, 2, 3])
                .unwrap()
                .to_indexed(1),
            Err(RasterError::PaletteOverflow { capacity: 2 })
        ));
    }
}
