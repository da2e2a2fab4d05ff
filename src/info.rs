/// Container format, as identified from leading bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ImageFormat {
    Png,
    Bmp,
    /// ICO or CUR.
    Ico,
    Jpeg,
}

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// "BM" plus the legacy OS/2 array, icon and pointer signatures.
const BMP_SIGNATURES: [[u8; 2]; 6] = [*b"BM", *b"BA", *b"CI", *b"CP", *b"IC", *b"PT"];

impl ImageFormat {
    /// Bytes [`detect`](Self::detect) needs to see to identify every format
    /// (a BMP file header).
    pub const PROBE_LEN: usize = 14;

    /// Identify the format from the first bytes of a file.
    ///
    /// Returns `None` if nothing matches or `data` is too short to tell.
    pub fn detect(data: &[u8]) -> Option<Self> {
        if data.starts_with(&PNG_SIGNATURE) {
            return Some(Self::Png);
        }
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }
        if let [0, 0, 1 | 2, 0, lo, hi, ..] = *data {
            if lo != 0 || hi != 0 {
                return Some(Self::Ico);
            }
        }
        if data.len() >= Self::PROBE_LEN && BMP_SIGNATURES.iter().any(|s| data.starts_with(s)) {
            return Some(Self::Bmp);
        }
        None
    }

    /// Conventional file extension.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Bmp => "bmp",
            Self::Ico => "ico",
            Self::Jpeg => "jpg",
        }
    }
}
