//! A clip: samples, gain envelope, cut lines and the two display caches
//!
//! Every content edit goes through [`Clip::mark_changed`], which bumps the
//! dirty generation. Both caches record the generation they were built
//! against, so a view computed before an edit is never served after it.

use std::fmt;
use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::audio::append_buffer::AppendBuffer;
use crate::audio::constants::{APPEND_BUFFER_COLUMN, CUT_LINE_TOLERANCE, DEFAULT_MAX_BLOCK_SIZE};
use crate::audio::envelope::Envelope;
use crate::audio::read_cache::{ReadKey, SampleReadCache};
use crate::audio::sample_format::{SampleBuffer, SampleFormat};
use crate::audio::sequence::{SampleCount, SampleSequence};
use crate::audio::summary::ColumnSummary;
use crate::config::SpectrogramSettings;
use crate::display::correction::{copy_range, fill_where, find_correction};
use crate::display::{is_degenerate_view, lock};
use crate::display::spec_cache::{SpecCache, SpecView, Spectrogram};
use crate::display::wave_cache::{WaveCache, WaveColumns, WaveDisplay};
use crate::error::{ClipError, ClipResult};

static NEXT_CLIP_ID: AtomicU64 = AtomicU64::new(1);

/// External sample rate converter
pub trait Resampler {
    /// Convert `input` by `factor` (new rate / old rate) into `output`
    ///
    /// `last` is set on the final block; the converter may keep producing
    /// samples on later calls with empty input until it is drained.
    ///
    /// # Returns
    /// Samples consumed from `input` and samples written to `output`
    fn process(
        &mut self,
        factor: f64,
        input: &[f32],
        last: bool,
        output: &mut [f32],
    ) -> ClipResult<(usize, usize)>;
}

/// Lets a background decoder invalidate waveform columns from another thread
#[derive(Debug, Clone)]
pub struct InvalidationHandle {
    wave_cache: Arc<Mutex<WaveCache>>,
    decodes: Arc<AtomicU64>,
}

impl InvalidationHandle {
    /// Mark samples `[start, end)` of the clip as changed
    pub fn add_invalid_region(&self, start: SampleCount, end: SampleCount) {
        self.decodes.fetch_add(1, Ordering::Relaxed);
        lock(&self.wave_cache).add_invalid_region(start, end);
    }
}

pub struct Clip<S: SampleSequence> {
    id: u64,
    sequence: S,
    envelope: Envelope,
    offset: f64,
    rate: u32,
    dirty: u64,
    append_buffer: AppendBuffer,
    cut_lines: Vec<Clip<S>>,
    wave_cache: Arc<Mutex<WaveCache>>,
    spec_cache: Mutex<SpecCache>,
    /// Bumped per invalid region so read caches refetch decoded samples
    decodes: Arc<AtomicU64>,
}

impl<S: SampleSequence> fmt::Debug for Clip<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Clip")
            .field("id", &self.id)
            .field("offset", &self.offset)
            .field("rate", &self.rate)
            .field("dirty", &self.dirty)
            .field("num_samples", &self.sequence.num_samples())
            .field("appended", &self.append_buffer.len())
            .field("cut_lines", &self.cut_lines)
            .finish_non_exhaustive()
    }
}

impl<S: SampleSequence> Clip<S> {
    /// Clip at offset 0 over `sequence`, recorded at `rate` Hz
    pub fn new(sequence: S, rate: u32) -> Self {
        let append_buffer =
            AppendBuffer::new(sequence.sample_format(), sequence.max_block_size());
        let mut clip = Self {
            id: NEXT_CLIP_ID.fetch_add(1, Ordering::Relaxed),
            sequence,
            envelope: Envelope::default(),
            offset: 0.0,
            rate,
            dirty: 0,
            append_buffer,
            cut_lines: Vec::new(),
            wave_cache: Arc::new(Mutex::new(WaveCache::default())),
            spec_cache: Mutex::new(SpecCache::default()),
            decodes: Arc::new(AtomicU64::new(0)),
        };
        clip.update_envelope_track_len();
        clip
    }

    /// Process-unique identity
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn rate(&self) -> u32 {
        self.rate
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Current content generation
    pub fn dirty(&self) -> u64 {
        self.dirty
    }

    pub fn sequence(&self) -> &S {
        &self.sequence
    }

    /// Direct access for a background decoder
    ///
    /// Content changed through this reference is not an edit: report it with
    /// [`Clip::add_invalid_region`] instead of expecting a new generation.
    /// Reporting also retires samples a [`SampleReadCache`] read before the
    /// decode; spectrogram columns already cached keep their old values until
    /// the view or the generation changes.
    pub fn sequence_mut(&mut self) -> &mut S {
        &mut self.sequence
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    pub fn envelope_mut(&mut self) -> &mut Envelope {
        &mut self.envelope
    }

    /// Samples appended but not yet committed to the sequence
    pub fn appended_len(&self) -> usize {
        self.append_buffer.len()
    }

    /// Start a new content generation
    pub fn mark_changed(&mut self) {
        self.dirty += 1;
        log::trace!("clip {} now at generation {}", self.id, self.dirty);
    }

    fn update_envelope_track_len(&mut self) {
        self.envelope
            .set_track_len(self.sequence.num_samples() as f64 / f64::from(self.rate));
    }

    pub fn set_offset(&mut self, offset: f64) {
        self.offset = offset;
        self.envelope.set_offset(offset);
    }

    pub fn offset_by(&mut self, delta: f64) {
        self.set_offset(self.offset + delta);
    }

    // Time and sample queries

    /// Clip start in seconds, negative when the clip begins before zero
    pub fn start_time(&self) -> f64 {
        self.offset
    }

    /// End in seconds, counting appended samples not yet committed
    pub fn end_time(&self) -> f64 {
        let total = self.sequence.num_samples() + self.append_buffer.len() as SampleCount;
        self.offset + total as f64 / f64::from(self.rate)
    }

    pub fn start_sample(&self) -> SampleCount {
        (self.offset * f64::from(self.rate) + 0.5).floor() as SampleCount
    }

    pub fn end_sample(&self) -> SampleCount {
        self.start_sample() + self.sequence.num_samples()
    }

    /// Committed samples
    pub fn num_samples(&self) -> SampleCount {
        self.sequence.num_samples()
    }

    fn time_to_sample(&self, t: f64) -> SampleCount {
        (t * f64::from(self.rate) + 0.5).floor() as SampleCount
    }

    pub fn within_clip(&self, t: f64) -> bool {
        let ts = self.time_to_sample(t);
        let appended = self.append_buffer.len() as SampleCount;
        ts > self.start_sample() && ts < self.end_sample() + appended
    }

    pub fn before_clip(&self, t: f64) -> bool {
        self.time_to_sample(t) <= self.start_sample()
    }

    pub fn after_clip(&self, t: f64) -> bool {
        self.time_to_sample(t) >= self.end_sample() + self.append_buffer.len() as SampleCount
    }

    /// Sample index of absolute time `t`, clamped to the committed samples
    pub fn time_to_samples_clip(&self, t: f64) -> SampleCount {
        let num_samples = self.sequence.num_samples();
        if t < self.offset {
            0
        } else if t > self.offset + num_samples as f64 / f64::from(self.rate) {
            num_samples
        } else {
            ((t - self.offset) * f64::from(self.rate) + 0.5).floor() as SampleCount
        }
    }

    // Sample access

    pub fn get_samples(&self, start: SampleCount, out: &mut [f32]) -> ClipResult<()> {
        self.sequence.get(start, out)
    }

    pub fn set_samples(&mut self, start: SampleCount, samples: &[f32]) -> ClipResult<()> {
        self.sequence.set(start, samples)?;
        self.mark_changed();
        Ok(())
    }

    /// Minimum and maximum between absolute times `t0` and `t1`
    pub fn get_min_max(&self, t0: f64, t1: f64) -> ClipResult<(f32, f32)> {
        let (s0, s1) = self.sample_span(t0, t1)?;
        if s0 == s1 {
            return Ok((0.0, 0.0));
        }
        self.sequence.min_max(s0, s1 - s0)
    }

    /// RMS between absolute times `t0` and `t1`
    pub fn get_rms(&self, t0: f64, t1: f64) -> ClipResult<f32> {
        let (s0, s1) = self.sample_span(t0, t1)?;
        if s0 == s1 {
            return Ok(0.0);
        }
        self.sequence.rms(s0, s1 - s0)
    }

    fn sample_span(&self, t0: f64, t1: f64) -> ClipResult<(SampleCount, SampleCount)> {
        if t0 > t1 {
            return Err(ClipError::InvalidInput(format!(
                "time range {}..{} is reversed",
                t0, t1
            )));
        }
        if t0 == t1 {
            return Ok((0, 0));
        }
        Ok((self.time_to_samples_clip(t0), self.time_to_samples_clip(t1)))
    }

    pub fn convert_to_sample_format(&mut self, format: SampleFormat) -> ClipResult<()> {
        if self.sequence.convert_to_sample_format(format)? {
            self.append_buffer.convert(format);
            self.mark_changed();
        }
        Ok(())
    }

    // Append and flush

    /// Append samples, committing whole blocks as soon as enough are buffered
    ///
    /// A failed commit leaves earlier blocks committed and the clip marked changed.
    pub fn append(&mut self, samples: &SampleBuffer) -> ClipResult<()> {
        let result = self.append_blocks(samples);
        if let Err(err) = &result {
            log::warn!("clip {} append stopped early: {}", self.id, err);
        }
        self.update_envelope_track_len();
        self.mark_changed();
        result
    }

    fn append_blocks(&mut self, samples: &SampleBuffer) -> ClipResult<()> {
        let mut block_size = self.sequence.ideal_append_len().max(1);
        let mut consumed = 0;

        loop {
            if self.append_buffer.len() >= block_size {
                let block = self.append_buffer.front(block_size);
                self.sequence.append(&block)?;
                self.append_buffer.discard_front(block_size);
                block_size = self.sequence.ideal_append_len().max(1);
            }
            if consumed == samples.len() {
                return Ok(());
            }
            consumed += self
                .append_buffer
                .write_samples(samples, consumed..samples.len());
        }
    }

    /// Commit whatever is still buffered
    pub fn flush(&mut self) -> ClipResult<()> {
        if self.append_buffer.is_empty() {
            return Ok(());
        }
        let pending = self.append_buffer.len();
        let block = self.append_buffer.front(pending);
        self.sequence.append(&block)?;
        self.append_buffer.clear();
        log::debug!("clip {} flushed {} samples", self.id, pending);
        self.update_envelope_track_len();
        self.mark_changed();
        Ok(())
    }

    /// Append `len` samples a background decoder will fill in later
    pub fn append_on_demand(&mut self, len: usize) -> ClipResult<()> {
        self.sequence.append_on_demand(len)?;
        self.update_envelope_track_len();
        self.mark_changed();
        Ok(())
    }

    /// New clip holding the audio of `other` between absolute times `t0` and `t1`
    pub fn from_range(other: &Clip<S>, t0: f64, t1: f64) -> ClipResult<Clip<S>> {
        let s0 = other.time_to_samples_clip(t0);
        let s1 = other.time_to_samples_clip(t1);
        let rate = f64::from(other.rate);

        let mut clip = Clip::new(other.sequence.copy(s0, s1)?, other.rate);
        clip.envelope = other.envelope.copy_range(
            other.offset + s0 as f64 / rate,
            other.offset + s1 as f64 / rate,
        );
        clip.mark_changed();
        Ok(clip)
    }

    // Editing

    /// Insert `len` seconds of silence at absolute time `t`
    pub fn insert_silence(&mut self, t: f64, len: f64) -> ClipResult<()> {
        let s0 = self.time_to_samples_clip(t);
        let slen = (len * f64::from(self.rate) + 0.5).floor() as SampleCount;
        self.sequence.insert_silence(s0, slen)?;
        self.offset_cut_lines(t, len);
        self.envelope.insert_space(t, len);
        self.mark_changed();
        Ok(())
    }

    /// Delete `[t0, t1)`, dropping the cut lines inside it
    pub fn clear(&mut self, t0: f64, t1: f64) -> ClipResult<()> {
        let s0 = self.time_to_samples_clip(t0);
        let s1 = self.time_to_samples_clip(t1);
        let clip_t0 = t0.max(self.start_time());
        let clip_t1 = t1.min(self.end_time());

        self.sequence.delete(s0, s1 - s0)?;

        let offset = self.offset;
        self.cut_lines.retain_mut(|cut_line| {
            let position = offset + cut_line.offset;
            if position >= t0 && position <= t1 {
                return false;
            }
            if position >= t1 {
                cut_line.offset_by(clip_t0 - clip_t1);
            }
            true
        });

        self.envelope.collapse_region(t0, t1);
        if t0 < self.start_time() {
            self.offset_by(-(self.start_time() - t0));
        }
        self.mark_changed();
        Ok(())
    }

    /// Delete `[t0, t1)`, keeping the removed audio as a cut line
    ///
    /// Cut lines inside the range move into the new one.
    pub fn clear_and_add_cut_line(&mut self, t0: f64, t1: f64) -> ClipResult<()> {
        if t0 > self.end_time() || t1 < self.start_time() {
            return Ok(());
        }

        let clip_t0 = t0.max(self.start_time());
        let clip_t1 = t1.min(self.end_time());

        let mut cut = Clip::from_range(self, clip_t0, clip_t1)?;
        cut.set_offset(clip_t0 - self.offset);

        let s0 = self.time_to_samples_clip(t0);
        let s1 = self.time_to_samples_clip(t1);
        self.sequence.delete(s0, s1 - s0)?;

        let offset = self.offset;
        let mut kept = Vec::with_capacity(self.cut_lines.len());
        for mut cut_line in self.cut_lines.drain(..) {
            let position = offset + cut_line.offset;
            if position >= t0 && position <= t1 {
                cut_line.set_offset(position - cut.offset - offset);
                cut.cut_lines.push(cut_line);
            } else {
                if position >= t1 {
                    cut_line.offset_by(clip_t0 - clip_t1);
                }
                kept.push(cut_line);
            }
        }
        self.cut_lines = kept;

        self.envelope.collapse_region(t0, t1);
        if t0 < self.start_time() {
            self.offset_by(-(self.start_time() - t0));
        }
        self.mark_changed();
        log::debug!(
            "clip {} cut {:.4}..{:.4} into a cut line",
            self.id,
            clip_t0,
            clip_t1
        );
        self.cut_lines.push(cut);
        Ok(())
    }

    // Cut lines

    pub fn cut_lines(&self) -> &[Clip<S>] {
        &self.cut_lines
    }

    fn cut_line_index(&self, position: f64) -> Option<usize> {
        self.cut_lines.iter().position(|cut_line| {
            (self.offset + cut_line.offset - position).abs() < CUT_LINE_TOLERANCE
        })
    }

    /// Absolute start and end of the cut line at `position`
    pub fn find_cut_line(&self, position: f64) -> Option<(f64, f64)> {
        self.cut_line_index(position).map(|index| {
            let cut_line = &self.cut_lines[index];
            (
                self.offset + cut_line.start_time(),
                self.offset + cut_line.end_time(),
            )
        })
    }

    /// Discard the cut line at `position`
    pub fn remove_cut_line(&mut self, position: f64) -> bool {
        match self.cut_line_index(position) {
            Some(index) => {
                self.cut_lines.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn remove_all_cut_lines(&mut self) {
        self.cut_lines.clear();
    }

    /// Move every cut line at or after absolute time `t0` by `len` seconds
    pub fn offset_cut_lines(&mut self, t0: f64, len: f64) {
        let offset = self.offset;
        for cut_line in &mut self.cut_lines {
            if offset + cut_line.offset >= t0 {
                cut_line.offset_by(len);
            }
        }
    }

    // Rate

    /// Reinterpret the samples at a new rate without converting them
    pub fn set_rate(&mut self, rate: u32) {
        self.rate = rate;
        self.update_envelope_track_len();
        self.mark_changed();
    }

    /// Convert the committed samples to `rate` through `resampler`
    ///
    /// The clip is untouched unless the whole conversion succeeds.
    pub fn resample(&mut self, rate: u32, resampler: &mut dyn Resampler) -> ClipResult<()> {
        if rate == self.rate {
            return Ok(());
        }
        if rate == 0 {
            return Err(ClipError::InvalidInput(
                "sample rate must be positive".to_string(),
            ));
        }

        let factor = f64::from(rate) / f64::from(self.rate);
        let block_size = DEFAULT_MAX_BLOCK_SIZE;
        let num_samples = self.sequence.num_samples();
        let mut resampled = self.sequence.empty_like();
        let mut input = vec![0.0; block_size];
        let mut output = vec![0.0; block_size];
        let mut pos: SampleCount = 0;
        let mut generated = 0;

        while pos < num_samples || generated > 0 {
            let in_len = (num_samples - pos).min(block_size as SampleCount) as usize;
            let last = pos + in_len as SampleCount == num_samples;
            self.sequence.get(pos, &mut input[..in_len])?;

            let (used, produced) =
                resampler.process(factor, &input[..in_len], last, &mut output)?;
            if used > in_len || produced > output.len() {
                return Err(ClipError::Processing(format!(
                    "resampler reported {} in / {} out for buffers of {} / {}",
                    used,
                    produced,
                    in_len,
                    output.len()
                )));
            }
            if used == 0 && produced == 0 && pos < num_samples {
                return Err(ClipError::Processing("resampler made no progress".to_string()));
            }

            pos += used as SampleCount;
            generated = produced;
            if produced > 0 {
                let block = SampleBuffer::from_f32(SampleFormat::Float, &output[..produced]);
                resampled.append(&block)?;
            }
        }

        log::debug!(
            "clip {} resampled {} -> {} Hz ({} -> {} samples)",
            self.id,
            self.rate,
            rate,
            num_samples,
            resampled.num_samples()
        );
        self.sequence = resampled;
        self.rate = rate;
        *lock(&self.wave_cache) = WaveCache::default();
        *lock(&self.spec_cache) = SpecCache::default();
        self.update_envelope_track_len();
        self.mark_changed();
        Ok(())
    }

    // Cache control

    /// Forget the waveform cache so the next query recomputes everything
    pub fn delete_wave_cache(&self) {
        log::debug!("clip {} waveform cache dropped", self.id);
        *lock(&self.wave_cache) = WaveCache::default();
    }

    /// Mark samples `[start, end)` as changed underneath the waveform cache
    pub fn add_invalid_region(&self, start: SampleCount, end: SampleCount) {
        self.decodes.fetch_add(1, Ordering::Relaxed);
        lock(&self.wave_cache).add_invalid_region(start, end);
    }

    pub fn invalidation_handle(&self) -> InvalidationHandle {
        InvalidationHandle {
            wave_cache: Arc::clone(&self.wave_cache),
            decodes: Arc::clone(&self.decodes),
        }
    }

    // Display queries

    /// Fill `display` for the view starting `t0` seconds into the clip
    ///
    /// A display created with [`WaveDisplay::with_positions`] is filled for its
    /// own boundaries and the cache is left alone. Otherwise the clip's cache
    /// is reused, extended or rebuilt and the display shares its columns.
    ///
    /// # Returns
    /// Whether any column still shows a block waiting for background decode.
    /// On error the previous cache stays in place.
    pub fn get_wave_display(
        &self,
        display: &mut WaveDisplay,
        t0: f64,
        pixels_per_second: f64,
    ) -> ClipResult<bool> {
        if display.owns_positions() {
            let columns = display.columns_mut();
            let width = columns.len();
            self.fill_wave_columns(columns, 0..width)?;
            return Ok(columns.count_loading(0..width) > 0);
        }

        let num_pixels = display.width();
        if is_degenerate_view(num_pixels, t0, pixels_per_second) {
            log::trace!(
                "degenerate waveform view: {} columns at {} px/s",
                num_pixels,
                pixels_per_second
            );
            display.set_columns(Arc::new(WaveColumns::new(num_pixels)));
            return Ok(false);
        }

        let rate = f64::from(self.rate);
        let samples_per_pixel = rate / pixels_per_second;
        let mut current = lock(&self.wave_cache);
        let matched = current.matches(self.dirty, pixels_per_second, num_pixels, rate);

        if matched && current.start() == t0 && current.len() >= num_pixels {
            current.load_invalid_regions(&self.sequence, true)?;
            log::debug!("clip {} waveform cache hit ({} columns)", self.id, num_pixels);
            display.set_columns(Arc::clone(current.columns()));
            return Ok(current.num_loading() > 0);
        }

        let (old_x0, correction, copy) = if matched && t0 >= 0.0 && current.start() >= 0.0 {
            let found = find_correction(
                &current.columns().positions,
                current.len(),
                num_pixels,
                t0,
                rate,
                samples_per_pixel,
            );
            let copy = copy_range(found.old_x0, current.len(), num_pixels);
            (found.old_x0, found.correction, copy)
        } else {
            (0, 0.0, 0..0)
        };

        let mut rebuilt = WaveCache::new(num_pixels, t0, pixels_per_second, rate, self.dirty);
        {
            let columns = rebuilt.columns_mut();
            fill_where(
                &mut columns.positions,
                0.0,
                correction,
                t0,
                rate,
                samples_per_pixel,
            );

            if !copy.is_empty() {
                current.load_invalid_regions(&self.sequence, false)?;
                let src_start = (copy.start as i64 + old_x0) as usize;
                columns.copy_from(current.columns(), copy.clone(), src_start);
            }

            let p0 = if copy.start > 0 { 0 } else { copy.end };
            let p1 = if copy.end >= num_pixels { copy.start } else { num_pixels };
            log::debug!(
                "clip {} waveform rebuild: copied {:?}, computing {}..{}",
                self.id,
                copy,
                p0,
                p1
            );
            if p1 > p0 {
                self.fill_wave_columns(columns, p0..p1)?;
            }
        }

        rebuilt.recount_loading();
        *current = rebuilt;
        display.set_columns(Arc::clone(current.columns()));
        Ok(current.num_loading() > 0)
    }

    /// Compute columns `range` from the append buffer and the sequence
    fn fill_wave_columns(&self, columns: &mut WaveColumns, range: Range<usize>) -> ClipResult<()> {
        let num_samples = self.sequence.num_samples();
        let p0 = range.start;
        let mut p1 = range.end;

        // Columns reaching past the committed samples come from the append buffer
        let first_appended = (p0..p1)
            .find(|&x| columns.positions[x + 1] > num_samples)
            .unwrap_or(p1);

        if first_appended < p1 {
            let buffered = self.append_buffer.len() as SampleCount;
            let mut samples = Vec::new();
            let mut did_update = false;

            for x in first_appended..p1 {
                let left = (columns.positions[x] - num_samples).max(0);
                let right = (columns.positions[x + 1] - num_samples).min(buffered);
                if right <= left {
                    continue;
                }
                self.append_buffer
                    .read_f32(left as usize..right as usize, &mut samples);
                if let Some(summary) = ColumnSummary::of(&samples) {
                    columns.min[x] = summary.min;
                    columns.max[x] = summary.max;
                    columns.rms[x] = summary.rms;
                    columns.bl[x] = APPEND_BUFFER_COLUMN;
                    did_update = true;
                }
            }

            if did_update {
                p1 = first_appended;
            }
        }

        if p1 > p0 {
            let (view, positions) = columns.split_mut(p0..p1);
            if let Err(err) = self.sequence.wave_display(view, positions) {
                log::warn!(
                    "clip {} waveform columns {}..{} failed: {}",
                    self.id,
                    p0,
                    p1,
                    err
                );
                return Err(err);
            }
        }
        Ok(())
    }

    /// Spectrogram of `num_pixels` columns starting `t0` seconds into the clip
    ///
    /// # Returns
    /// The columns and whether any of them had to be computed
    pub fn get_spectrogram(
        &self,
        read_cache: &mut SampleReadCache,
        settings: &SpectrogramSettings,
        num_pixels: usize,
        t0: f64,
        pixels_per_second: f64,
    ) -> ClipResult<(Spectrogram, bool)> {
        settings.validate()?;
        if is_degenerate_view(num_pixels, t0, pixels_per_second) {
            log::trace!(
                "degenerate spectrogram view: {} columns at {} px/s",
                num_pixels,
                pixels_per_second
            );
            return Ok((Spectrogram::empty(), false));
        }

        let view = SpecView {
            num_pixels,
            t0,
            pixels_per_second,
            rate: f64::from(self.rate),
            dirty: self.dirty,
        };
        let key = ReadKey {
            clip: self.id,
            generation: self.dirty,
            decodes: self.decodes.load(Ordering::Relaxed),
        };

        let mut current = lock(&self.spec_cache);
        if current.is_full_hit(settings, &view) {
            log::debug!("clip {} spectrogram cache hit", self.id);
            return Ok((current.spectrogram(num_pixels), false));
        }

        let (rebuilt, analyzed) =
            current.rebuild(&self.sequence, read_cache, key, settings, &view)?;
        log::trace!("clip {} analyzed {} spectrogram columns", self.id, analyzed);
        *current = rebuilt;
        Ok((current.spectrogram(num_pixels), true))
    }
}

impl<S: SampleSequence + Clone> Clip<S> {
    /// Insert the audio of `other` at absolute time `t0`
    ///
    /// Both clips must share a rate; the samples are converted to this clip's
    /// format. Cut lines after `t0` move right and `other`'s cut lines are
    /// copied in.
    pub fn paste(&mut self, t0: f64, other: &Clip<S>) -> ClipResult<()> {
        if other.rate != self.rate {
            return Err(ClipError::RateMismatch {
                expected: self.rate,
                found: other.rate,
            });
        }

        let s0 = self.time_to_samples_clip(t0);
        self.sequence.paste(s0, &other.sequence)?;
        self.mark_changed();

        self.envelope
            .paste(s0 as f64 / f64::from(self.rate) + self.offset, &other.envelope);
        self.envelope.remove_unneeded_points();
        self.offset_cut_lines(t0, other.end_time() - other.start_time());

        for cut_line in &other.cut_lines {
            let mut copy = cut_line.clone();
            copy.offset_by(t0 - self.offset);
            self.cut_lines.push(copy);
        }
        Ok(())
    }

    /// Paste the cut line at `position` back into the clip
    ///
    /// # Returns
    /// Whether a cut line was found there
    pub fn expand_cut_line(&mut self, position: f64) -> ClipResult<bool> {
        let Some(index) = self.cut_line_index(position) else {
            return Ok(false);
        };
        let cut_line = self.cut_lines.remove(index);
        if let Err(err) = self.paste(self.offset + cut_line.offset, &cut_line) {
            self.cut_lines.insert(index, cut_line);
            return Err(err);
        }
        Ok(true)
    }
}

/// Copies carry the content with fresh caches and an empty append buffer
impl<S: SampleSequence + Clone> Clone for Clip<S> {
    fn clone(&self) -> Self {
        let mut envelope = Envelope::default();
        envelope.paste(0.0, &self.envelope);
        envelope.set_offset(self.offset);

        let mut clip = Clip::new(self.sequence.clone(), self.rate);
        clip.envelope = envelope;
        clip.offset = self.offset;
        clip.cut_lines = self.cut_lines.clone();
        clip.update_envelope_track_len();
        clip
    }
}
