//! Per-view display caches and the bookkeeping that keeps them incremental

pub mod correction;
pub mod invalid_regions;
pub mod spec_cache;
pub mod wave_cache;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock `mutex`, recovering the data if a panicking thread poisoned it
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Views with no columns or no usable time axis are answered with zeros
pub(crate) fn is_degenerate_view(num_pixels: usize, t0: f64, pixels_per_second: f64) -> bool {
    num_pixels == 0 || !t0.is_finite() || !pixels_per_second.is_finite() || pixels_per_second <= 0.0
}

/// Cached and requested pitches agree when the drift they accumulate across
/// `columns` pixels stays under one sample period
pub(crate) fn pitch_matches(
    cached_pixels_per_second: f64,
    pixels_per_second: f64,
    columns: usize,
    rate: f64,
) -> bool {
    if cached_pixels_per_second <= 0.0 || pixels_per_second <= 0.0 || rate <= 0.0 {
        return false;
    }
    (1.0 / pixels_per_second - 1.0 / cached_pixels_per_second).abs() * (columns as f64) < 1.0 / rate
}
