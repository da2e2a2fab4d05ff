//! PNG scanline filter reversal (filter method 0).

use crate::error::RasterError;

/// Paeth predictor: whichever of left `a`, up `b`, upper-left `c` is closest
/// to `a + b - c`, ties broken in that order.
#[inline]
pub(crate) fn paeth_predictor(a: u8, b: u8, c: u8) -> u8 {
    let (a_, b_, c_) = (i16::from(a), i16::from(b), i16::from(c));
    let pa = (b_ - c_).abs();
    let pb = (a_ - c_).abs();
    let pc = (a_ + b_ - 2 * c_).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

/// Reverse `filter` on `cur` in place.
///
/// `prev` is the previous reconstructed row (all zeros for the first row)
/// and `unit` the byte distance to the left neighbor.
pub(crate) fn unfilter(
    filter: u8,
    unit: usize,
    prev: &[u8],
    cur: &mut [u8],
) -> Result<(), RasterError> {
    let len = cur.len();
    match filter {
        0 => {}
        1 => {
            for i in unit..len {
                cur[i] = cur[i].wrapping_add(cur[i - unit]);
            }
        }
        2 => {
            for (c, &p) in cur.iter_mut().zip(prev) {
                *c = c.wrapping_add(p);
            }
        }
        3 => {
            for i in 0..len {
                let left = if i >= unit { cur[i - unit] } else { 0 };
                let avg = ((u16::from(left) + u16::from(prev[i])) / 2) as u8;
                cur[i] = cur[i].wrapping_add(avg);
            }
        }
        4 => {
            for i in 0..len {
                let (left, upper_left) = if i >= unit {
                    (cur[i - unit], prev[i - unit])
                } else {
                    (0, 0)
                };
                cur[i] = cur[i].wrapping_add(paeth_predictor(left, prev[i], upper_left));
            }
        }
        other => {
            return Err(RasterError::InvalidData(alloc::format!(
                "unknown PNG filter type {other}"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Forward filter, for checking that `unfilter` inverts it.
    fn filter(kind: u8, unit: usize, prev: &[u8], raw: &[u8]) -> Vec<u8> {
        let left = |i: usize| if i >= unit { raw[i - unit] } else { 0 };
        let upper_left = |i: usize| if i >= unit { prev[i - unit] } else { 0 };
        (0..raw.len())
            .map(|i| {
                let predicted = match kind {
                    0 => 0,
                    1 => left(i),
                    2 => prev[i],
                    3 => ((u16::from(left(i)) + u16::from(prev[i])) / 2) as u8,
                    _ => paeth_predictor(left(i), prev[i], upper_left(i)),
                };
                raw[i].wrapping_sub(predicted)
            })
            .collect()
    }

    #[test]
    fn paeth_prefers_upper_left_on_gradient() {
        // pa = |b-c| = 5, pb = |a-c| = 5, pc = |a+b-2c| = 0.
        assert_eq!(paeth_predictor(10, 20, 15), 15);
        let mut cur = [0, 0, 0, 5];
        let prev = [0, 0, 15, 20];
        // Left neighbor of byte 3 with unit 1 is cur[2]; force it to 10.
        cur[2] = 10u8.wrapping_sub(paeth_predictor(0, 15, 0));
        unfilter(4, 1, &prev, &mut cur).unwrap();
        assert_eq!(cur[2], 10);
        assert_eq!(cur[3], 20);
    }

    #[test]
    fn paeth_tie_order() {
        assert_eq!(paeth_predictor(7, 7, 7), 7);
        // a == b, c far away: pa = |b-c| and pb = |a-c| tie, a wins.
        assert_eq!(paeth_predictor(100, 100, 0), 100);
        assert_eq!(paeth_predictor(0, 100, 0), 100);
    }

    #[test]
    fn every_filter_inverts() {
        let prev: Vec<u8> = (0..12u8).map(|v| v.wrapping_mul(37)).collect();
        let raw: Vec<u8> = (0..12u8).map(|v| v.wrapping_mul(91).wrapping_add(3)).collect();
        for unit in [1, 3, 4] {
            for kind in 0..=4 {
                let mut cur = filter(kind, unit, &prev, &raw);
                unfilter(kind, unit, &prev, &mut cur).unwrap();
                assert_eq!(cur, raw, "filter {kind} unit {unit}");
            }
        }
    }

    #[test]
    fn average_wraps_modulo_256() {
        let prev = [255u8, 255];
        let mut cur = [200u8, 0];
        unfilter(3, 1, &prev, &mut cur).unwrap();
        // 200 + 127 = 327 mod 256 = 71; then 0 + (71 + 255) / 2 = 163.
        assert_eq!(cur, [71, 163]);
    }

    #[test]
    fn unknown_filter_rejected() {
        let mut cur = [0u8; 3];
        assert!(unfilter(5, 1, &[0; 3], &mut cur).is_err());
    }
}
