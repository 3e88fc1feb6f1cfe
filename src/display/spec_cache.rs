//! Cached spectrogram columns for one view
//!
//! A query that overlaps the cached view at the same pitch keeps the
//! overlapping columns and only analyzes the rest. Reassignment moves energy
//! across columns, so it is reused only on a complete hit.

use std::ops::Range;
use std::sync::Arc;

use super::correction::{copy_range, fill_where, find_correction};
use super::pitch_matches;
use crate::audio::constants::MAX_REASSIGNMENT_MARGIN;
use crate::audio::read_cache::{ReadKey, SampleReadCache};
use crate::audio::sequence::{SampleCount, SampleSequence};
use crate::audio::spectrum::{column_analyzer, ColumnAnalyzer, ColumnSink};
use crate::config::{Algorithm, SpectrogramSettings};
use crate::error::ClipResult;

/// Column-major bins plus the sample position of every column
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecColumns {
    /// `len * half` values, column `x` at `[x * half, (x + 1) * half)`
    pub freq: Vec<f32>,
    /// `len + 1` sample positions
    pub positions: Vec<SampleCount>,
    pub half: usize,
}

impl SpecColumns {
    fn new(len: usize, half: usize) -> Self {
        Self {
            freq: vec![0.0; len * half],
            positions: vec![0; len + 1],
            half,
        }
    }

    fn len(&self) -> usize {
        self.positions.len().saturating_sub(1)
    }
}

/// Output of a spectrogram query, sharing the cache's arrays
#[derive(Debug, Clone)]
pub struct Spectrogram {
    columns: Arc<SpecColumns>,
    width: usize,
}

impl Spectrogram {
    pub(crate) fn empty() -> Self {
        Self {
            columns: Arc::new(SpecColumns::default()),
            width: 0,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Bins per column
    pub fn bins(&self) -> usize {
        self.columns.half
    }

    pub fn column(&self, x: usize) -> Option<&[f32]> {
        if x >= self.width {
            return None;
        }
        let half = self.columns.half;
        self.columns.freq.get(x * half..(x + 1) * half)
    }

    /// All visible columns, `width * bins` values
    pub fn values(&self) -> &[f32] {
        &self.columns.freq[..self.width * self.columns.half]
    }

    pub fn positions(&self) -> &[SampleCount] {
        let end = (self.width + 1).min(self.columns.positions.len());
        &self.columns.positions[..end]
    }
}

/// The view a spectrogram query asks for
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpecView {
    pub num_pixels: usize,
    /// Seconds from the clip start of column 0
    pub t0: f64,
    pub pixels_per_second: f64,
    pub rate: f64,
    /// Clip generation the samples belong to
    pub dirty: u64,
}

impl SpecView {
    fn samples_per_pixel(&self) -> f64 {
        self.rate / self.pixels_per_second
    }
}

#[derive(Debug)]
pub struct SpecCache {
    len: usize,
    start: f64,
    pixels_per_second: f64,
    dirty: u64,
    settings: SpectrogramSettings,
    columns: Arc<SpecColumns>,
}

impl Default for SpecCache {
    fn default() -> Self {
        Self {
            len: 0,
            start: 0.0,
            pixels_per_second: 0.0,
            dirty: 0,
            settings: SpectrogramSettings::default(),
            columns: Arc::new(SpecColumns::default()),
        }
    }
}

impl SpecCache {
    fn new(settings: &SpectrogramSettings, view: &SpecView) -> Self {
        Self {
            len: view.num_pixels,
            start: view.t0,
            pixels_per_second: view.pixels_per_second,
            dirty: view.dirty,
            settings: settings.clone(),
            columns: Arc::new(SpecColumns::new(view.num_pixels, settings.half())),
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

    pub fn dirty(&self) -> u64 {
        self.dirty
    }

    /// Same generation, pitch and analysis parameters
    pub fn matches(
        &self,
        dirty: u64,
        pixels_per_second: f64,
        settings: &SpectrogramSettings,
        rate: f64,
    ) -> bool {
        self.len > 0
            && pitch_matches(self.pixels_per_second, pixels_per_second, self.len, rate)
            && self.dirty == dirty
            && self.settings.algorithm == settings.algorithm
            && self.settings.window_type == settings.window_type
            && self.settings.window_size == settings.window_size
            && self.settings.effective_zero_padding() == settings.effective_zero_padding()
            && self.settings.frequency_gain == settings.frequency_gain
    }

    /// The cache can serve `view` without any analysis
    pub fn is_full_hit(&self, settings: &SpectrogramSettings, view: &SpecView) -> bool {
        self.matches(view.dirty, view.pixels_per_second, settings, view.rate)
            && self.start == view.t0
            && self.len >= view.num_pixels
    }

    /// The first `width` cached columns
    pub fn spectrogram(&self, width: usize) -> Spectrogram {
        if self.len == 0 {
            return Spectrogram::empty();
        }
        Spectrogram {
            columns: Arc::clone(&self.columns),
            width: width.min(self.len),
        }
    }

    /// Build the cache for `view`, reusing this one where it overlaps
    ///
    /// # Returns
    /// The new cache and the number of columns analyzed
    pub fn rebuild<S: SampleSequence + ?Sized>(
        &self,
        sequence: &S,
        read_cache: &mut SampleReadCache,
        key: ReadKey,
        settings: &SpectrogramSettings,
        view: &SpecView,
    ) -> ClipResult<(SpecCache, usize)> {
        let samples_per_pixel = view.samples_per_pixel();
        let reusable = settings.algorithm != Algorithm::Reassignment
            && view.t0 >= 0.0
            && self.start >= 0.0
            && self.matches(view.dirty, view.pixels_per_second, settings, view.rate);

        let (old_x0, correction, copy) = if reusable {
            let found = find_correction(
                &self.columns.positions,
                self.len,
                view.num_pixels,
                view.t0,
                view.rate,
                samples_per_pixel,
            );
            let copy = copy_range(found.old_x0, self.len, view.num_pixels);
            (found.old_x0, found.correction, copy)
        } else {
            (0, 0.0, 0..0)
        };

        let mut cache = SpecCache::new(settings, view);
        {
            let columns = Arc::make_mut(&mut cache.columns);
            fill_where(
                &mut columns.positions,
                0.5,
                correction,
                view.t0,
                view.rate,
                samples_per_pixel,
            );

            if !copy.is_empty() {
                let half = columns.half;
                let src_start = (copy.start as i64 + old_x0) as usize * half;
                let dst = copy.start * half..copy.end * half;
                let src = src_start..src_start + dst.len();
                columns.freq[dst].copy_from_slice(&self.columns.freq[src]);
            }
        }

        let analyzed = view.num_pixels - copy.len();
        log::debug!(
            "spectrogram {:?} rebuild: {} of {} columns reused",
            settings.algorithm,
            copy.len(),
            view.num_pixels
        );
        cache.populate(sequence, read_cache, key, copy, view.rate)?;
        Ok((cache, analyzed))
    }

    /// Analyze every column outside `copy`
    fn populate<S: SampleSequence + ?Sized>(
        &mut self,
        sequence: &S,
        read_cache: &mut SampleReadCache,
        key: ReadKey,
        copy: Range<usize>,
        rate: f64,
    ) -> ClipResult<()> {
        let settings = &self.settings;
        let half = settings.half();
        let len = self.len as i64;
        let columns_per_sample = self.pixels_per_second / rate;
        let mut analyzer = column_analyzer(settings, rate);

        let SpecColumns {
            freq, positions, ..
        } = Arc::make_mut(&mut self.columns);
        let mut framer = ColumnFramer {
            sequence,
            read_cache,
            key,
            positions: &positions[..],
            samples_per_pixel: rate / self.pixels_per_second,
            window_size: settings.window_size,
            padding: settings.padding(),
            frame: vec![0.0; settings.fft_len()],
        };

        let limit = ((0.5 + settings.fft_len() as f64 * columns_per_sample) as i64)
            .min(MAX_REASSIGNMENT_MARGIN);

        for bounds in [0..copy.start as i64, copy.end as i64..len] {
            if bounds.is_empty() {
                continue;
            }
            let mut sink =
                ColumnSink::new(&mut freq[..], half, bounds.clone(), columns_per_sample);

            for x in bounds.clone() {
                calculate_one_spectrum(&mut framer, analyzer.as_mut(), &mut sink, x)?;
            }

            if analyzer.reassigns() {
                // Columns outside the range can still push energy into it
                for x in (bounds.start - limit..bounds.start).rev() {
                    if !calculate_one_spectrum(&mut framer, analyzer.as_mut(), &mut sink, x)? {
                        break;
                    }
                }
                for x in bounds.end..bounds.end + limit {
                    if !calculate_one_spectrum(&mut framer, analyzer.as_mut(), &mut sink, x)? {
                        break;
                    }
                }
                analyzer.finish(&mut sink);
            }
        }
        Ok(())
    }
}

/// Cuts the zero-padded analysis frame for a column out of the sequence
struct ColumnFramer<'a, S: ?Sized> {
    sequence: &'a S,
    read_cache: &'a mut SampleReadCache,
    key: ReadKey,
    positions: &'a [SampleCount],
    samples_per_pixel: f64,
    window_size: usize,
    padding: usize,
    frame: Vec<f32>,
}

impl<S: SampleSequence + ?Sized> ColumnFramer<'_, S> {
    /// Sample position of column `x`, extrapolated outside the grid
    fn centre(&self, x: i64) -> SampleCount {
        let len = self.positions.len() as i64 - 1;
        if x < 0 {
            (self.positions[0] as f64 + x as f64 * self.samples_per_pixel) as SampleCount
        } else if x > len {
            (self.positions[len as usize] as f64 + (x - len) as f64 * self.samples_per_pixel)
                as SampleCount
        } else {
            self.positions[x as usize]
        }
    }

    /// Frame centred on column `x`, `None` when the column lies outside the clip
    fn frame_at(&mut self, x: i64) -> ClipResult<Option<&[f32]>> {
        let num_samples = self.sequence.num_samples();
        let centre = self.centre(x);
        if centre <= 0 || centre >= num_samples {
            return Ok(None);
        }

        self.frame.fill(0.0);
        let mut start = centre - (self.window_size / 2) as SampleCount;
        let mut len = self.window_size as SampleCount;
        let mut offset = self.padding;
        if start < 0 {
            offset += (-start) as usize;
            len += start;
            start = 0;
        }
        if start + len > num_samples {
            len = num_samples - start;
        }

        if len > 0 {
            let len = len as usize;
            let samples = self.read_cache.get(self.sequence, self.key, start, len)?;
            self.frame[offset..offset + len].copy_from_slice(samples);
        }
        Ok(Some(self.frame.as_slice()))
    }
}

fn calculate_one_spectrum<S: SampleSequence + ?Sized>(
    framer: &mut ColumnFramer<'_, S>,
    analyzer: &mut dyn ColumnAnalyzer,
    sink: &mut ColumnSink<'_>,
    x: i64,
) -> ClipResult<bool> {
    match framer.frame_at(x)? {
        Some(frame) => analyzer.analyze(frame, x, sink),
        None => {
            if sink.bounds().contains(&x) {
                if let Some(column) = sink.column_mut(x) {
                    column.fill(0.0);
                }
            }
            Ok(false)
        }
    }
}
