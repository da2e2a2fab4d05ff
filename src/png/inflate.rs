//! Incremental zlib inflation across IDAT chunks.

use alloc::vec;
use alloc::vec::Vec;

use flate2::{Decompress, FlushDecompress, Status};

use crate::error::RasterError;

const OUT_CHUNK: usize = 32 * 1024;

/// A zlib stream that is fed compressed bytes as they arrive and hands
/// decompressed bytes to a sink, keeping its state between feeds.
pub(crate) struct Inflater {
    inner: Decompress,
    out: Vec<u8>,
    finished: bool,
}

impl Inflater {
    pub(crate) fn new() -> Self {
        Self {
            inner: Decompress::new(true),
            out: vec![0u8; OUT_CHUNK],
            finished: false,
        }
    }

    /// Whether the zlib end-of-stream marker has been seen.
    pub(crate) fn is_finished(&self) -> bool {
        self.finished
    }

    /// Decompress all of `input`, passing each decompressed run to `sink`.
    pub(crate) fn feed(
        &mut self,
        mut input: &[u8],
        mut sink: impl FnMut(&[u8]) -> Result<(), RasterError>,
    ) -> Result<(), RasterError> {
        while !self.finished {
            let before_in = self.inner.total_in();
            let before_out = self.inner.total_out();
            let status = self
                .inner
                .decompress(input, &mut self.out, FlushDecompress::None)
                .map_err(|e| RasterError::InvalidData(alloc::format!("zlib stream: {e}")))?;
            let consumed = (self.inner.total_in() - before_in) as usize;
            let produced = (self.inner.total_out() - before_out) as usize;
            input = &input[consumed..];

            if produced > 0 {
                sink(&self.out[..produced])?;
            }

            match status {
                Status::StreamEnd => self.finished = true,
                Status::Ok | Status::BufError => {
                    let stalled = consumed == 0 && produced == 0;
                    let drained = input.is_empty() && produced < self.out.len();
                    if stalled || drained {
                        break;
                    }
                }
            }
        }
        if self.finished && !input.is_empty() {
            log::debug!("ignoring {} bytes after end of zlib stream", input.len());
        }
        Ok(())
    }
}
