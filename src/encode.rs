use alloc::vec::Vec;
use std::io::{Cursor, Seek, Write};

use enough::Stop;

use crate::buffer::PixelBuffer;
use crate::error::RasterError;
use crate::info::ImageFormat;

/// Encoder selection.
///
/// ```no_run
/// use zenraster::{EncodeRequest, PixelBuffer, PixelFormat, Unstoppable};
///
/// let image = PixelBuffer::new(16, 16, PixelFormat::Rgba32)?;
/// let png = EncodeRequest::png().encode(&image, Unstoppable)?;
/// let ico = EncodeRequest::ico().encode_all(&[image], Unstoppable)?;
/// # Ok::<(), zenraster::RasterError>(())
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EncodeRequest {
    format: ImageFormat,
}

impl EncodeRequest {
    #[cfg(feature = "png")]
    pub fn png() -> Self {
        Self {
            format: ImageFormat::Png,
        }
    }

    /// Uncompressed BMP with a 40-byte info header.
    #[cfg(feature = "bmp")]
    pub fn bmp() -> Self {
        Self {
            format: ImageFormat::Bmp,
        }
    }

    /// ICO container; images with alpha are stored as PNG, others as DIBs.
    #[cfg(feature = "ico")]
    pub fn ico() -> Self {
        Self {
            format: ImageFormat::Ico,
        }
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    /// Encode one image into a new byte vector.
    pub fn encode(&self, image: &PixelBuffer, stop: impl Stop) -> Result<Vec<u8>, RasterError> {
        self.encode_all(core::slice::from_ref(image), stop)
    }

    /// Encode several images; only ICO holds more than one.
    pub fn encode_all(
        &self,
        images: &[PixelBuffer],
        stop: impl Stop,
    ) -> Result<Vec<u8>, RasterError> {
        let mut out = Cursor::new(Vec::new());
        self.write_all(images, &mut out, stop)?;
        Ok(out.into_inner())
    }

    /// Encode into `writer`. Only ICO seeks; PNG and BMP write sequentially.
    pub fn write_all<W: Write + Seek + ?Sized>(
        &self,
        images: &[PixelBuffer],
        writer: &mut W,
        stop: impl Stop,
    ) -> Result<(), RasterError> {
        if self.format != ImageFormat::Ico && images.len() != 1 {
            return Err(RasterError::InvalidData(alloc::format!(
                "{:?} holds exactly one image, got {}",
                self.format,
                images.len()
            )));
        }
        log::debug!("encoding {} image(s) as {:?}", images.len(), self.format);
        match self.format {
            #[cfg(feature = "png")]
            ImageFormat::Png => crate::png::encode(&images[0], writer, &stop),
            #[cfg(feature = "bmp")]
            ImageFormat::Bmp => crate::bmp::encode(&images[0], writer, &stop),
            #[cfg(feature = "ico")]
            ImageFormat::Ico => crate::ico::encode(images, writer, &stop),
            other => Err(RasterError::UnsupportedVariant(alloc::format!(
                "no {other:?} encoder"
            ))),
        }
    }
}
