//! Cached min/max/RMS columns for one waveform view

use std::ops::Range;
use std::sync::Arc;

use super::invalid_regions::InvalidRegions;
use super::pitch_matches;
use crate::audio::sequence::{ColumnsMut, SampleCount, SampleSequence};
use crate::error::ClipResult;

/// The per-column arrays of a waveform view
///
/// `positions` has one more entry than the other arrays: column `i` covers
/// samples `[positions[i], positions[i + 1])`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WaveColumns {
    pub min: Vec<f32>,
    pub max: Vec<f32>,
    pub rms: Vec<f32>,
    /// Block status, negative while the block is still being decoded
    pub bl: Vec<i32>,
    pub positions: Vec<SampleCount>,
}

impl WaveColumns {
    pub fn new(len: usize) -> Self {
        Self::with_positions(vec![0; len + 1])
    }

    /// Zeroed columns for caller-supplied boundaries
    pub fn with_positions(positions: Vec<SampleCount>) -> Self {
        let len = positions.len().saturating_sub(1);
        Self {
            min: vec![0.0; len],
            max: vec![0.0; len],
            rms: vec![0.0; len],
            bl: vec![0; len],
            positions,
        }
    }

    pub fn len(&self) -> usize {
        self.min.len()
    }

    pub fn is_empty(&self) -> bool {
        self.min.is_empty()
    }

    /// Writable columns in `range` plus their `range.len() + 1` boundaries
    pub fn split_mut(&mut self, range: Range<usize>) -> (ColumnsMut<'_>, &[SampleCount]) {
        let positions = &self.positions[range.start..=range.end];
        let columns = ColumnsMut {
            min: &mut self.min[range.clone()],
            max: &mut self.max[range.clone()],
            rms: &mut self.rms[range.clone()],
            bl: &mut self.bl[range],
        };
        (columns, positions)
    }

    /// Columns in `range` whose block is still being decoded
    pub fn count_loading(&self, range: Range<usize>) -> usize {
        self.bl[range].iter().filter(|&&status| status < 0).count()
    }

    /// Copy old columns `src_start..` into `dst`
    pub fn copy_from(&mut self, other: &WaveColumns, dst: Range<usize>, src_start: usize) {
        let src = src_start..src_start + dst.len();
        self.min[dst.clone()].copy_from_slice(&other.min[src.clone()]);
        self.max[dst.clone()].copy_from_slice(&other.max[src.clone()]);
        self.rms[dst.clone()].copy_from_slice(&other.rms[src.clone()]);
        self.bl[dst].copy_from_slice(&other.bl[src]);
    }
}

/// One materialized waveform view plus its pending invalidations
#[derive(Debug, Default)]
pub struct WaveCache {
    dirty: u64,
    len: usize,
    start: f64,
    pixels_per_second: f64,
    rate: f64,
    columns: Arc<WaveColumns>,
    num_loading: usize,
    regions: InvalidRegions,
}

impl WaveCache {
    /// Empty cache for a view; columns are zeroed until filled
    pub fn new(len: usize, start: f64, pixels_per_second: f64, rate: f64, dirty: u64) -> Self {
        Self {
            dirty,
            len,
            start,
            pixels_per_second,
            rate,
            columns: Arc::new(WaveColumns::new(len)),
            num_loading: 0,
            regions: InvalidRegions::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn pixels_per_second(&self) -> f64 {
        self.pixels_per_second
    }

    pub fn dirty(&self) -> u64 {
        self.dirty
    }

    pub fn columns(&self) -> &Arc<WaveColumns> {
        &self.columns
    }

    /// Writable columns; copies them first if a display still holds them
    pub fn columns_mut(&mut self) -> &mut WaveColumns {
        Arc::make_mut(&mut self.columns)
    }

    /// Columns still waiting for background decode
    pub fn num_loading(&self) -> usize {
        self.num_loading
    }

    pub fn regions(&self) -> &InvalidRegions {
        &self.regions
    }

    /// Same generation and a pitch close enough over `columns` pixels
    pub fn matches(&self, dirty: u64, pixels_per_second: f64, columns: usize, rate: f64) -> bool {
        self.len > 0
            && self.dirty == dirty
            && pitch_matches(self.pixels_per_second, pixels_per_second, columns, rate)
    }

    pub fn recount_loading(&mut self) {
        self.num_loading = self.columns.count_loading(0..self.columns.len());
    }

    /// Mark the columns showing samples `[sample_start, sample_end)` stale
    ///
    /// Ranges wholly before or wholly after the view are dropped; a later
    /// query for that part of the clip misses the cache anyway.
    pub fn add_invalid_region(&self, sample_start: SampleCount, sample_end: SampleCount) {
        if self.pixels_per_second <= 0.0 {
            return;
        }

        let samples_per_pixel = self.rate / self.pixels_per_second;
        let origin = self.start * self.rate;
        let inval_start = ((sample_start as f64 - origin) / samples_per_pixel) as i64;
        let inval_end = ((sample_end as f64 - origin) / samples_per_pixel) as i64 + 1;
        let len = self.len as i64;

        if (inval_start < 0 && inval_end < 0) || (inval_start >= len && inval_end >= len) {
            log::trace!(
                "invalid samples {}..{} fall outside the cached view",
                sample_start,
                sample_end
            );
            return;
        }

        let start = inval_start.clamp(0, len) as usize;
        let end = inval_end.clamp(0, len) as usize;
        log::trace!("invalidating columns {}..{}", start, end);
        self.regions.insert(start, end);
    }

    /// Recompute every invalid region from `sequence`, then clear them
    ///
    /// With `update_count` the loading-column count is adjusted by the change
    /// inside each region only.
    pub fn load_invalid_regions<S: SampleSequence + ?Sized>(
        &mut self,
        sequence: &S,
        update_count: bool,
    ) -> ClipResult<()> {
        if self.regions.is_empty() {
            return Ok(());
        }

        let columns = Arc::make_mut(&mut self.columns);
        let num_loading = &mut self.num_loading;
        self.regions.drain_with(|region| {
            let range = region.start..region.end.min(columns.len());
            if range.is_empty() {
                return Ok(());
            }

            let before = columns.count_loading(range.clone());
            let (view, positions) = columns.split_mut(range.clone());
            sequence.wave_display(view, positions)?;

            if update_count {
                let after = columns.count_loading(range);
                *num_loading = (*num_loading + after).saturating_sub(before);
            }
            Ok(())
        })
    }
}

/// Output of a waveform query
///
/// Normally shares the cache's columns without copying. A display built with
/// [`WaveDisplay::with_positions`] owns its arrays instead and is filled
/// directly for the boundaries the caller chose, bypassing the cache.
#[derive(Debug, Clone)]
pub struct WaveDisplay {
    width: usize,
    columns: Arc<WaveColumns>,
    owns_positions: bool,
}

impl WaveDisplay {
    /// Display of `width` columns served from the clip's cache
    pub fn new(width: usize) -> Self {
        Self {
            width,
            columns: Arc::new(WaveColumns::default()),
            owns_positions: false,
        }
    }

    /// Display over caller-chosen sample boundaries
    pub fn with_positions(positions: Vec<SampleCount>) -> Self {
        let columns = WaveColumns::with_positions(positions);
        Self {
            width: columns.len(),
            columns: Arc::new(columns),
            owns_positions: true,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn owns_positions(&self) -> bool {
        self.owns_positions
    }

    pub(crate) fn set_columns(&mut self, columns: Arc<WaveColumns>) {
        self.columns = columns;
    }

    pub(crate) fn columns_mut(&mut self) -> &mut WaveColumns {
        Arc::make_mut(&mut self.columns)
    }

    fn visible(&self) -> usize {
        self.width.min(self.columns.len())
    }

    pub fn min(&self) -> &[f32] {
        &self.columns.min[..self.visible()]
    }

    pub fn max(&self) -> &[f32] {
        &self.columns.max[..self.visible()]
    }

    pub fn rms(&self) -> &[f32] {
        &self.columns.rms[..self.visible()]
    }

    pub fn bl(&self) -> &[i32] {
        &self.columns.bl[..self.visible()]
    }

    /// Sample boundaries, one more than the visible columns
    pub fn positions(&self) -> &[SampleCount] {
        let end = (self.visible() + 1).min(self.columns.positions.len());
        &self.columns.positions[..end]
    }

    /// True when this display shares its arrays with `other`
    pub fn shares_columns_with(&self, other: &WaveDisplay) -> bool {
        Arc::ptr_eq(&self.columns, &other.columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::memory_sequence::MemorySequence;
    use crate::audio::sample_format::SampleFormat;

    fn cache(len: usize) -> WaveCache {
        // 100 samples per column at 44.1 kHz
        WaveCache::new(len, 0.0, 441.0, 44100.0, 0)
    }

    #[test]
    fn test_sample_range_maps_to_columns() {
        let cache = cache(100);
        cache.add_invalid_region(1000, 1999);
        assert_eq!(cache.regions().snapshot()[0].start, 10);
        assert_eq!(cache.regions().snapshot()[0].end, 20);
    }

    #[test]
    fn test_region_beyond_either_side_is_dropped() {
        let cache = WaveCache::new(100, 1.0, 441.0, 44100.0, 0);
        cache.add_invalid_region(0, 1000);
        cache.add_invalid_region(200_000, 300_000);
        assert!(cache.regions().is_empty());
    }

    #[test]
    fn test_region_straddling_edge_is_clipped() {
        let cache = cache(100);
        cache.add_invalid_region(9_500, 20_000);
        assert_eq!(cache.regions().snapshot()[0].start, 95);
        assert_eq!(cache.regions().snapshot()[0].end, 100);
    }

    #[test]
    fn test_zero_pitch_ignores_regions() {
        let cache = WaveCache::default();
        cache.add_invalid_region(0, 10);
        assert!(cache.regions().is_empty());
    }

    #[test]
    fn test_drain_updates_loading_count_locally() {
        let mut sequence = MemorySequence::with_block_size(SampleFormat::Float, 1000);
        sequence.append_on_demand(10_000).unwrap();

        let mut cache = cache(100);
        {
            let columns = cache.columns_mut();
            for (x, position) in columns.positions.iter_mut().enumerate() {
                *position = x as SampleCount * 100;
            }
            let (view, positions) = columns.split_mut(0..100);
            sequence.wave_display(view, positions).unwrap();
        }
        cache.recount_loading();
        assert_eq!(cache.num_loading(), 100);

        let range = sequence.load_on_demand_block(2, &[0.5; 1000]).unwrap();
        cache.add_invalid_region(range.start, range.end);
        cache.load_invalid_regions(&sequence, true).unwrap();

        assert_eq!(cache.num_loading(), 90);
        assert!(cache.regions().is_empty());
        assert_eq!(cache.columns().max[25], 0.5);
    }

    #[test]
    fn test_display_slices_to_width() {
        let mut display = WaveDisplay::new(3);
        assert!(display.min().is_empty());
        display.set_columns(Arc::new(WaveColumns::new(10)));
        assert_eq!(display.min().len(), 3);
        assert_eq!(display.positions().len(), 4);
    }
}
