//! Canonical Huffman decode tables.
//!
//! A table is described the way JPEG DHT segments describe it: for each code
//! length 1..=16, how many codes have that length, followed by the symbols in
//! code order. Codes are assigned canonically (codes of equal length are
//! consecutive integers) and stored keyed by `(length, code)`; decoding reads
//! one bit at a time and probes after each bit, so the first hit is the
//! longest-prefix match of a prefix-free code.

use std::collections::HashMap;

use crate::error::RasterError;

/// Longest code length a table may declare.
pub const MAX_CODE_LENGTH: u8 = 16;

/// Most codes one table may hold: one per byte-valued symbol.
pub const MAX_SYMBOLS: usize = 256;

/// Per-length code counts; entry `i` counts codes of length `i + 1`.
pub type CodeCounts = [u8; MAX_CODE_LENGTH as usize];

/// A single bit source, most significant bit first.
pub trait BitSource {
    fn read_bit(&mut self) -> Result<u8, RasterError>;
}

/// One assigned code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HuffmanCode {
    pub length: u8,
    pub code: u16,
    pub symbol: u8,
}

#[derive(Clone, Debug)]
pub struct HuffmanTable {
    codes: HashMap<(u8, u16), u8>,
    max_length: u8,
}

impl HuffmanTable {
    /// Build a table from per-length code counts and the symbols they label.
    ///
    /// `counts[i]` is the number of codes of length `i + 1`.
    pub fn from_counts(counts: &CodeCounts, symbols: &[u8]) -> Result<Self, RasterError> {
        let total: usize = counts.iter().map(|&c| usize::from(c)).sum();
        if total != symbols.len() {
            return Err(RasterError::InvalidData(alloc::format!(
                "Huffman table declares {total} codes but has {} symbols",
                symbols.len()
            )));
        }

        let mut codes = HashMap::with_capacity(total);
        let mut max_length = 0u8;
        for code in assign_codes(counts)?.into_iter().zip(symbols) {
            let (HuffmanCode { length, code, .. }, &symbol) = code;
            codes.insert((length, code), symbol);
            max_length = max_length.max(length);
        }
        log::trace!("built Huffman table: {total} codes, max length {max_length}");
        Ok(Self { codes, max_length })
    }

    /// Symbol for the exact `(length, code)` pair.
    pub fn lookup(&self, length: u8, code: u16) -> Option<u8> {
        self.codes.get(&(length, code)).copied()
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn max_length(&self) -> u8 {
        self.max_length
    }

    /// Decode one symbol, consuming only the bits of its code.
    pub fn decode_symbol<B: BitSource + ?Sized>(&self, bits: &mut B) -> Result<u8, RasterError> {
        let mut code = 0u16;
        for length in 1..=self.max_length {
            code = (code << 1) | u16::from(bits.read_bit()?);
            if let Some(symbol) = self.lookup(length, code) {
                return Ok(symbol);
            }
        }
        Err(RasterError::InvalidData(alloc::format!(
            "no Huffman code matches within {} bits",
            self.max_length
        )))
    }
}

/// Canonical code assignment, in symbol order.
///
/// Keeps a running `(last_code, last_bits)` pair starting at `(-1, 0)`: each
/// new code is the previous one plus one, widened when the increment carries
/// into a new bit, then left-shifted up to the target length.
pub fn assign_codes(counts: &CodeCounts) -> Result<Vec<HuffmanCode>, RasterError> {
    let total: usize = counts.iter().map(|&c| usize::from(c)).sum();
    if total > MAX_SYMBOLS {
        return Err(RasterError::InvalidData(alloc::format!(
            "Huffman table declares {total} codes, at most {MAX_SYMBOLS} allowed"
        )));
    }
    let mut out = Vec::with_capacity(total);
    let mut last_code: i32 = -1;
    let mut last_bits: u8 = 0;
    for (i, &count) in counts.iter().enumerate() {
        let length = i as u8 + 1;
        for _ in 0..count {
            last_code += 1;
            if (last_code >> last_bits) & 1 == 1 {
                last_bits += 1;
            }
            if last_bits < length {
                last_code <<= length - last_bits;
                last_bits = length;
            }
            if last_bits > length {
                return Err(RasterError::InvalidData(alloc::format!(
                    "over-subscribed Huffman table at length {length}"
                )));
            }
            out.push(HuffmanCode {
                length,
                code: last_code as u16,
                symbol: out.len() as u8,
            });
        }
    }
    Ok(out)
}
