use std::io::{self, Read, Seek, SeekFrom};

/// Bytes sniffed from the start of an entry before choosing its decoder.
pub(crate) const IDENT_LEN: usize = 8;

/// One ICO entry viewed as its own stream: the identifier bytes already
/// consumed, followed by the rest of the entry read from the container.
///
/// Positions are relative to the start of the entry and reads stop at the
/// entry's declared size.
pub(crate) struct SpliceReader<'a, R: ?Sized> {
    prefix: [u8; IDENT_LEN],
    inner: &'a mut R,
    /// Container position of the first byte after the prefix.
    base: u64,
    len: u64,
    pos: u64,
    /// Whether `inner` sits at the container position matching `pos`.
    synced: bool,
}

impl<'a, R: Read + Seek + ?Sized> SpliceReader<'a, R> {
    /// `inner` must be positioned right after the prefix; `len` is the full
    /// entry size including the prefix.
    pub(crate) fn new(prefix: [u8; IDENT_LEN], inner: &'a mut R, len: u64) -> io::Result<Self> {
        let base = inner.stream_position()?;
        Ok(Self {
            prefix,
            inner,
            base,
            len,
            pos: 0,
            synced: false,
        })
    }
}

impl<R: Read + Seek + ?Sized> Read for SpliceReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.len.saturating_sub(self.pos);
        if remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        if self.pos < IDENT_LEN as u64 {
            let start = self.pos as usize;
            let n = (IDENT_LEN - start).min(buf.len()).min(remaining as usize);
            buf[..n].copy_from_slice(&self.prefix[start..start + n]);
            self.pos += n as u64;
            self.synced = false;
            return Ok(n);
        }
        if !self.synced {
            let target = self.base + (self.pos - IDENT_LEN as u64);
            self.inner.seek(SeekFrom::Start(target))?;
            self.synced = true;
        }
        let max = remaining.min(buf.len() as u64) as usize;
        let n = self.inner.read(&mut buf[..max])?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl<R: Read + Seek + ?Sized> Seek for SpliceReader<'_, R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::End(d) => self.len.checked_add_signed(d),
            SeekFrom::Current(d) => self.pos.checked_add_signed(d),
        }
        .ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek before start of ICO entry")
        })?;
        if target != self.pos {
            self.pos = target;
            self.synced = false;
        }
        Ok(target)
    }
}
