use alloc::vec::Vec;
use std::io::{Read, Seek, SeekFrom};

use enough::Stop;

use crate::buffer::PixelBuffer;
use crate::error::RasterError;
use crate::info::ImageFormat;
use crate::limits::Limits;

#[cfg(feature = "jpeg")]
use crate::jpeg::JpegHeaders;

/// Result of an auto-detecting [`DecodeRequest::decode`].
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum Decoded {
    Png(PixelBuffer),
    Bmp(PixelBuffer),
    /// ICO/CUR images in directory order.
    Ico(Vec<PixelBuffer>),
    #[cfg(feature = "jpeg")]
    Jpeg(JpegHeaders),
}

impl Decoded {
    pub fn format(&self) -> ImageFormat {
        match self {
            Self::Png(_) => ImageFormat::Png,
            Self::Bmp(_) => ImageFormat::Bmp,
            Self::Ico(_) => ImageFormat::Ico,
            #[cfg(feature = "jpeg")]
            Self::Jpeg(_) => ImageFormat::Jpeg,
        }
    }

    /// The decoded raster; the first image for ICO, `None` for JPEG headers.
    pub fn into_image(self) -> Option<PixelBuffer> {
        match self {
            Self::Png(image) | Self::Bmp(image) => Some(image),
            Self::Ico(images) => images.into_iter().next(),
            #[cfg(feature = "jpeg")]
            Self::Jpeg(_) => None,
        }
    }
}

/// Decode options shared by every format.
///
/// ```no_run
/// use zenraster::{DecodeRequest, Limits, Unstoppable};
///
/// let limits = Limits { max_pixels: Some(1 << 24), ..Default::default() };
/// let mut file = std::fs::File::open("icon.ico")?;
/// let decoded = DecodeRequest::new()
///     .with_limits(&limits)
///     .decode(&mut file, Unstoppable)?;
/// println!("{:?}", decoded.format());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct DecodeRequest<'a> {
    limits: Option<&'a Limits>,
    native_order: bool,
}

impl<'a> DecodeRequest<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject images whose header exceeds `limits`.
    pub fn with_limits(mut self, limits: &'a Limits) -> Self {
        self.limits = Some(limits);
        self
    }

    /// Return 24/32-bit BMP pixels as stored (BGR/BGRA) instead of RGB/RGBA.
    pub fn with_native_order(mut self, native_order: bool) -> Self {
        self.native_order = native_order;
        self
    }

    /// Sniff the format and decode with the matching codec.
    ///
    /// On failure the stream is left where it was.
    pub fn decode<R: Read + Seek + ?Sized>(
        &self,
        reader: &mut R,
        stop: impl Stop,
    ) -> Result<Decoded, RasterError> {
        let start = reader.stream_position()?;
        let mut probe = Vec::with_capacity(ImageFormat::PROBE_LEN);
        let sniffed = Read::take(&mut *reader, ImageFormat::PROBE_LEN as u64)
            .read_to_end(&mut probe)
            .map(|_| ImageFormat::detect(&probe));
        reader.seek(SeekFrom::Start(start))?;
        let format = sniffed?.ok_or(RasterError::UnrecognizedFormat)?;
        log::debug!("detected {format:?}");

        match format {
            #[cfg(feature = "png")]
            ImageFormat::Png => self.decode_png(reader, stop).map(Decoded::Png),
            #[cfg(feature = "bmp")]
            ImageFormat::Bmp => self.decode_bmp(reader, stop).map(Decoded::Bmp),
            #[cfg(feature = "ico")]
            ImageFormat::Ico => self.decode_ico(reader, stop).map(Decoded::Ico),
            #[cfg(feature = "jpeg")]
            ImageFormat::Jpeg => self.parse_jpeg(reader, stop).map(Decoded::Jpeg),
            #[allow(unreachable_patterns)]
            other => Err(RasterError::UnsupportedVariant(alloc::format!(
                "{other:?} support is not compiled in"
            ))),
        }
    }

    #[cfg(feature = "png")]
    pub fn decode_png<R: Read + Seek + ?Sized>(
        &self,
        reader: &mut R,
        stop: impl Stop,
    ) -> Result<PixelBuffer, RasterError> {
        crate::png::decode(reader, self.limits, &stop)
    }

    #[cfg(feature = "bmp")]
    pub fn decode_bmp<R: Read + Seek + ?Sized>(
        &self,
        reader: &mut R,
        stop: impl Stop,
    ) -> Result<PixelBuffer, RasterError> {
        crate::bmp::decode(reader, self.limits, self.native_order, &stop)
    }

    /// Decode every image of an ICO or CUR file.
    #[cfg(feature = "ico")]
    pub fn decode_ico<R: Read + Seek + ?Sized>(
        &self,
        reader: &mut R,
        stop: impl Stop,
    ) -> Result<Vec<PixelBuffer>, RasterError> {
        crate::ico::decode(reader, self.limits, &stop)
    }

    /// Parse JPEG marker segments up to EOI.
    #[cfg(feature = "jpeg")]
    pub fn parse_jpeg<R: Read + Seek + ?Sized>(
        &self,
        reader: &mut R,
        stop: impl Stop,
    ) -> Result<JpegHeaders, RasterError> {
        crate::jpeg::parse(reader, self.limits, &stop)
    }
}
