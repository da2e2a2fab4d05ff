//! Channel shuffling and bitfield expansion shared by the BMP reader and writer.

/// Scale factors for widening an N-bit channel to 8 bits.
const MUL_TABLE: [u32; 9] = [0, 0xff, 0x55, 0x49, 0x11, 0x21, 0x41, 0x81, 0x01];

const SHIFT_TABLE: [i32; 9] = [0, 0, 0, 1, 0, 2, 4, 6, 0];

/// Extract a masked channel value and scale it to the 8-bit range.
///
/// `shift` moves the top of the mask to bit 7 (negative shifts left);
/// `bits` is the mask width.
pub(crate) fn shift_signed(mut v: u32, shift: i32, bits: u32) -> u32 {
    if shift < 0 {
        v <<= -shift;
    } else {
        v >>= shift;
    }
    let bits = bits.min(8);
    v >>= 8 - bits;
    (v.wrapping_mul(MUL_TABLE[bits as usize])) >> SHIFT_TABLE[bits as usize]
}

/// Default 16-bit BI_RGB layout: x1r5g5b5.
const MASKS_555: [u32; 3] = [0x7C00, 0x03E0, 0x001F];

/// Expand one little-endian x1r5g5b5 pixel to (r, g, b).
pub(crate) fn expand_555(px: u16) -> [u8; 3] {
    MASKS_555.map(|mask| {
        let shift = (32 - mask.leading_zeros()) as i32 - 8;
        shift_signed(u32::from(px) & mask, shift, mask.count_ones()) as u8
    })
}

/// Copy pixels between RGB(A) and BGR(A) order, `channels` bytes each.
pub(crate) fn swap_red_blue(src: &[u8], dst: &mut [u8], channels: usize) {
    for (s, d) in src.chunks_exact(channels).zip(dst.chunks_exact_mut(channels)) {
        d[0] = s[2];
        d[1] = s[1];
        d[2] = s[0];
        if channels == 4 {
            d[3] = s[3];
        }
    }
}
