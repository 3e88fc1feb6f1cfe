//! Alignment of a new pixel grid against a cached one
//!
//! Pixel boundaries are whole sample indices derived from floating point view
//! parameters. Rebuilding a cache repeatedly from its predecessor would let
//! rounding drift accumulate, so the new grid is nudged by a sub-pixel
//! correction that lands its boundaries on the old ones wherever they overlap.

use std::ops::Range;

use crate::audio::sequence::SampleCount;

/// Where a new grid lands inside an old one
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correction {
    /// Old column index matching new column 0; equal to the old length when
    /// nothing overlaps
    pub old_x0: i64,
    /// Samples added to the new grid origin, within one pixel's worth either way
    pub correction: f64,
}

impl Correction {
    /// "No usable overlap" for an old grid of `old_len` columns
    pub fn none(old_len: usize) -> Self {
        Self {
            old_x0: old_len as i64,
            correction: 0.0,
        }
    }
}

/// Align a new grid against the old one
///
/// # Parameters
/// * `old_where` - Sample boundaries of the old grid (`old_len + 1` entries)
/// * `old_len` - Columns in the old grid
/// * `new_len` - Columns requested
/// * `t0` - Requested time of column 0, seconds from the clip start
/// * `rate` - Sample rate
/// * `samples_per_pixel` - Pitch shared by both grids
///
/// # Returns
/// The old column matching new column 0 and the origin correction. Disjoint
/// grids, or an old grid too short to measure, give [`Correction::none`].
pub fn find_correction(
    old_where: &[SampleCount],
    old_len: usize,
    new_len: usize,
    t0: f64,
    rate: f64,
    samples_per_pixel: f64,
) -> Correction {
    let Some(&old_where1) = old_where.get(1) else {
        return Correction::none(old_len);
    };

    // Column 1 is the first boundary not clamped at zero
    let old_where0 = old_where1 as f64 - samples_per_pixel;
    let old_where_last = old_where0 + old_len as f64 * samples_per_pixel;
    let denom = old_where_last - old_where0;

    let guess_where0 = t0 * rate;

    if old_where_last <= guess_where0
        || guess_where0 + new_len as f64 * samples_per_pixel <= old_where0
        || denom < 0.5
    {
        return Correction::none(old_len);
    }

    let old_x0 = (0.5 + old_len as f64 * (guess_where0 - old_where0) / denom).floor() as i64;
    let where0 = old_where0 + old_x0 as f64 * samples_per_pixel;
    let correction = (where0 - guess_where0)
        .max(-samples_per_pixel)
        .min(samples_per_pixel);

    Correction { old_x0, correction }
}

/// Fill the sample boundaries of a grid
///
/// # Parameters
/// * `positions` - Receives `len + 1` boundaries
/// * `bias` - Extra origin shift in samples (0.5 centres spectrogram windows)
/// * `correction` - Result of [`find_correction`], 0 for a fresh grid
/// * `t0`, `rate`, `samples_per_pixel` - The view
///
/// Boundaries never go below zero, so the result is non-decreasing from a
/// non-negative start even for views beginning before the clip.
pub fn fill_where(
    positions: &mut [SampleCount],
    bias: f64,
    correction: f64,
    t0: f64,
    rate: f64,
    samples_per_pixel: f64,
) {
    let w0 = 0.5 + correction + bias + t0 * rate;
    for (x, position) in positions.iter_mut().enumerate() {
        *position = (w0 + x as f64 * samples_per_pixel).floor().max(0.0) as SampleCount;
    }
}

/// Columns of the new grid that can be copied from the old one
///
/// New column `x` in the returned range reads old column `x + old_x0`.
pub fn copy_range(old_x0: i64, old_len: usize, new_len: usize) -> Range<usize> {
    let new_len = new_len as i64;
    let copy_begin = new_len.min((-old_x0).max(0));
    let copy_end = new_len.min(copy_begin + old_len as i64 - old_x0.max(0));
    if copy_end > copy_begin {
        copy_begin as usize..copy_end as usize
    } else {
        0..0
    }
}
