//! Byte-stream helpers shared by the codecs.
//!
//! - [`ReadExt`]: fixed-width little/big-endian reads that map a short read
//!   to [`RasterError::UnexpectedEof`].
//! - [`with_rewind`]: snapshot the stream position, restore it if the
//!   decoder fails.
//! - [`Crc32Reader`] / [`Crc32Writer`]: pass-through streams accumulating a
//!   CRC-32 (ISO-HDLC) over the bytes they see, reset at chunk boundaries.

use alloc::vec::Vec;
use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::error::RasterError;

pub(crate) trait ReadExt: Read {
    fn read_bytes<const N: usize>(&mut self) -> Result<[u8; N], RasterError> {
        let mut buf = [0u8; N];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn read_u8(&mut self) -> Result<u8, RasterError> {
        Ok(self.read_bytes::<1>()?[0])
    }

    fn read_u16_le(&mut self) -> Result<u16, RasterError> {
        Ok(u16::from_le_bytes(self.read_bytes()?))
    }

    fn read_u32_le(&mut self) -> Result<u32, RasterError> {
        Ok(u32::from_le_bytes(self.read_bytes()?))
    }

    fn read_u16_be(&mut self) -> Result<u16, RasterError> {
        Ok(u16::from_be_bytes(self.read_bytes()?))
    }

    fn read_u32_be(&mut self) -> Result<u32, RasterError> {
        Ok(u32::from_be_bytes(self.read_bytes()?))
    }

    /// Read exactly `len` bytes without trusting `len` for preallocation.
    fn read_vec(&mut self, len: usize) -> Result<Vec<u8>, RasterError> {
        let mut buf = Vec::with_capacity(len.min(1 << 16));
        Read::take(&mut *self, len as u64).read_to_end(&mut buf)?;
        if buf.len() != len {
            return Err(RasterError::UnexpectedEof);
        }
        Ok(buf)
    }
}

impl<R: Read + ?Sized> ReadExt for R {}

/// Run `decode` and restore the stream to its entry position if it fails.
///
/// A failed restore is logged; the decoder's error is returned either way.
pub(crate) fn with_rewind<R, T>(
    reader: &mut R,
    decode: impl FnOnce(&mut R) -> Result<T, RasterError>,
) -> Result<T, RasterError>
where
    R: Read + Seek + ?Sized,
{
    let start = reader.stream_position()?;
    let result = decode(reader);
    if let Err(err) = &result {
        log::debug!("decode failed at entry offset {start}: {err}; rewinding");
        if let Err(seek_err) = reader.seek(SeekFrom::Start(start)) {
            log::warn!("could not rewind stream to {start}: {seek_err}");
        }
    }
    result
}

/// Total stream length, leaving the position unchanged.
pub(crate) fn stream_len<S: Seek + ?Sized>(stream: &mut S) -> io::Result<u64> {
    let pos = stream.stream_position()?;
    let len = stream.seek(SeekFrom::End(0))?;
    if pos != len {
        stream.seek(SeekFrom::Start(pos))?;
    }
    Ok(len)
}

#[cfg(feature = "png")]
fn new_digest() -> crc_fast::Digest {
    crc_fast::Digest::new(crc_fast::CrcAlgorithm::Crc32IsoHdlc)
}

/// Reader that checksums everything read through it.
#[cfg(feature = "png")]
pub(crate) struct Crc32Reader<'a, R: ?Sized> {
    inner: &'a mut R,
    digest: crc_fast::Digest,
}

#[cfg(feature = "png")]
impl<'a, R: Read + ?Sized> Crc32Reader<'a, R> {
    pub(crate) fn new(inner: &'a mut R) -> Self {
        Self {
            inner,
            digest: new_digest(),
        }
    }

    /// Start a new checksum (chunk boundary).
    pub(crate) fn reset(&mut self) {
        self.digest = new_digest();
    }

    pub(crate) fn crc(&self) -> u32 {
        self.digest.finalize() as u32
    }

    /// The wrapped reader, for bytes that must not be checksummed.
    pub(crate) fn inner(&mut self) -> &mut R {
        self.inner
    }
}

#[cfg(feature = "png")]
impl<R: Read + ?Sized> Read for Crc32Reader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.digest.update(&buf[..n]);
        Ok(n)
    }
}

/// Writer that checksums everything written through it.
#[cfg(feature = "png")]
pub(crate) struct Crc32Writer<'a, W: ?Sized> {
    inner: &'a mut W,
    digest: crc_fast::Digest,
}

#[cfg(feature = "png")]
impl<'a, W: Write + ?Sized> Crc32Writer<'a, W> {
    pub(crate) fn new(inner: &'a mut W) -> Self {
        Self {
            inner,
            digest: new_digest(),
        }
    }

    pub(crate) fn reset(&mut self) {
        self.digest = new_digest();
    }

    pub(crate) fn crc(&self) -> u32 {
        self.digest.finalize() as u32
    }

    pub(crate) fn inner(&mut self) -> &mut W {
        self.inner
    }
}

#[cfg(feature = "png")]
impl<W: Write + ?Sized> Write for Crc32Writer<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.digest.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
