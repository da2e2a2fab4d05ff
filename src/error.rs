use alloc::string::String;
use enough::StopReason;

/// Errors from PNG/BMP/ICO decoding and encoding and JPEG header parsing.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum RasterError {
    #[error("unrecognized format magic bytes")]
    UnrecognizedFormat,

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("CRC mismatch in {chunk} chunk: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch {
        chunk: String,
        stored: u32,
        computed: u32,
    },

    #[error("unsupported format variant: {0}")]
    UnsupportedVariant(String),

    #[error("palette overflow: more than {capacity} distinct colors")]
    PaletteOverflow { capacity: usize },

    #[error("invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("dimensions too large: {width}x{height}")]
    DimensionsTooLarge { width: u32, height: u32 },

    #[error("buffer too small: need {needed} bytes, got {actual}")]
    BufferTooSmall { needed: usize, actual: usize },

    #[error("pixel format mismatch: expected {expected:?}, got {actual:?}")]
    LayoutMismatch {
        expected: crate::PixelFormat,
        actual: crate::PixelFormat,
    },

    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    #[error("operation cancelled")]
    Cancelled(StopReason),

    #[error("I/O error: {0}")]
    Io(#[source] std::io::Error),
}

/// Coarse classification of a [`RasterError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Bad magic, or malformed structure inside a recognized format.
    Format,
    /// Input ended before the structure was complete.
    TruncatedInput,
    /// Stored checksum does not match the data.
    Integrity,
    /// Recognized but unimplemented variant (16-bit PNG, interlacing, RLE, ...).
    UnsupportedFeature,
    /// Caller-supplied data cannot be encoded as requested.
    ConstraintViolation,
    /// A configured [`crate::Limits`] bound was exceeded.
    Limit,
    Cancelled,
    Io,
}

impl RasterError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnrecognizedFormat | Self::InvalidHeader(_) | Self::InvalidData(_) => {
                ErrorKind::Format
            }
            Self::UnexpectedEof => ErrorKind::TruncatedInput,
            Self::ChecksumMismatch { .. } => ErrorKind::Integrity,
            Self::UnsupportedVariant(_) => ErrorKind::UnsupportedFeature,
            Self::PaletteOverflow { .. }
            | Self::InvalidDimensions { .. }
            | Self::DimensionsTooLarge { .. }
            | Self::BufferTooSmall { .. }
            | Self::LayoutMismatch { .. } => ErrorKind::ConstraintViolation,
            Self::LimitExceeded(_) => ErrorKind::Limit,
            Self::Cancelled(_) => ErrorKind::Cancelled,
            Self::Io(_) => ErrorKind::Io,
        }
    }

    /// Whether another codec may reasonably be tried on the same stream.
    ///
    /// True for "not this format", truncation and unsupported variants.
    /// Decoders rewind the stream before returning any error.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::UnrecognizedFormat | Self::UnexpectedEof | Self::UnsupportedVariant(_)
        )
    }
}

impl From<StopReason> for RasterError {
    fn from(r: StopReason) -> Self {
        RasterError::Cancelled(r)
    }
}

impl From<std::io::Error> for RasterError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            RasterError::UnexpectedEof
        } else {
            RasterError::Io(e)
        }
    }
}
