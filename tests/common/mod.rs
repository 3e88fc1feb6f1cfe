#![allow(dead_code)]

use std::f64::consts::PI;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use waveclip_cache::audio::sequence::ColumnsMut;
use waveclip_cache::{
    ClipError, ClipResult, MemorySequence, SampleBuffer, SampleCount, SampleFormat,
    SampleSequence,
};

pub const RATE: u32 = 44100;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// `len` samples of a sine at `frequency` Hz
pub fn sine(len: usize, frequency: f64, amplitude: f32) -> Vec<f32> {
    (0..len)
        .map(|n| amplitude * (2.0 * PI * frequency * n as f64 / f64::from(RATE)).sin() as f32)
        .collect()
}

/// Sine whose frequency rises linearly, so neighbouring columns differ
pub fn sweep(len: usize) -> Vec<f32> {
    (0..len)
        .map(|n| {
            let t = n as f64 / f64::from(RATE);
            (2.0 * PI * (200.0 * t + 400.0 * t * t)).sin() as f32 * 0.8
        })
        .collect()
}

/// Sequence wrapper that counts summarized columns and can be made to fail
#[derive(Debug, Clone)]
pub struct CountingSequence {
    inner: MemorySequence,
    pub columns: Arc<AtomicUsize>,
    pub fail: Arc<AtomicBool>,
    /// Appends still allowed to succeed
    pub appends_left: Arc<AtomicUsize>,
}

impl CountingSequence {
    pub fn new(samples: &[f32]) -> Self {
        Self::wrap(MemorySequence::from_samples(
            SampleFormat::Float,
            65536,
            samples,
        ))
    }

    /// Empty sequence writing blocks of `max_block_size` samples
    pub fn with_block_size(max_block_size: usize) -> Self {
        Self::wrap(MemorySequence::with_block_size(
            SampleFormat::Float,
            max_block_size,
        ))
    }

    pub fn on_demand_blocks(&self) -> Vec<usize> {
        self.inner.on_demand_blocks()
    }

    pub fn load_on_demand_block(
        &mut self,
        index: usize,
        samples: &[f32],
    ) -> ClipResult<Range<SampleCount>> {
        self.inner.load_on_demand_block(index, samples)
    }

    fn wrap(inner: MemorySequence) -> Self {
        Self {
            inner,
            columns: Arc::new(AtomicUsize::new(0)),
            fail: Arc::new(AtomicBool::new(false)),
            appends_left: Arc::new(AtomicUsize::new(usize::MAX)),
        }
    }

    /// Columns summarized since the last call
    pub fn take_columns(&self) -> usize {
        self.columns.swap(0, Ordering::SeqCst)
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Let `count` more appends through, then fail every later one
    pub fn fail_appends_after(&self, count: usize) {
        self.appends_left.store(count, Ordering::SeqCst);
    }
}

impl SampleSequence for CountingSequence {
    fn num_samples(&self) -> SampleCount {
        self.inner.num_samples()
    }

    fn sample_format(&self) -> SampleFormat {
        self.inner.sample_format()
    }

    fn max_block_size(&self) -> usize {
        self.inner.max_block_size()
    }

    fn ideal_append_len(&self) -> usize {
        self.inner.ideal_append_len()
    }

    fn get(&self, start: SampleCount, out: &mut [f32]) -> ClipResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ClipError::Storage("injected read failure".to_string()));
        }
        self.inner.get(start, out)
    }

    fn set(&mut self, start: SampleCount, samples: &[f32]) -> ClipResult<()> {
        self.inner.set(start, samples)
    }

    fn append(&mut self, samples: &SampleBuffer) -> ClipResult<()> {
        if self.appends_left.load(Ordering::SeqCst) == 0 {
            return Err(ClipError::Storage("injected append failure".to_string()));
        }
        self.appends_left.fetch_sub(1, Ordering::SeqCst);
        self.inner.append(samples)
    }

    fn append_on_demand(&mut self, len: usize) -> ClipResult<()> {
        self.inner.append_on_demand(len)
    }

    fn delete(&mut self, start: SampleCount, len: SampleCount) -> ClipResult<()> {
        self.inner.delete(start, len)
    }

    fn insert_silence(&mut self, start: SampleCount, len: SampleCount) -> ClipResult<()> {
        self.inner.insert_silence(start, len)
    }

    fn paste(&mut self, start: SampleCount, other: &Self) -> ClipResult<()> {
        self.inner.paste(start, &other.inner)
    }

    fn copy(&self, start: SampleCount, end: SampleCount) -> ClipResult<Self> {
        Ok(Self::wrap(self.inner.copy(start, end)?))
    }

    fn empty_like(&self) -> Self {
        Self::wrap(self.inner.empty_like())
    }

    fn min_max(&self, start: SampleCount, len: SampleCount) -> ClipResult<(f32, f32)> {
        self.inner.min_max(start, len)
    }

    fn rms(&self, start: SampleCount, len: SampleCount) -> ClipResult<f32> {
        self.inner.rms(start, len)
    }

    fn convert_to_sample_format(&mut self, format: SampleFormat) -> ClipResult<bool> {
        self.inner.convert_to_sample_format(format)
    }

    fn wave_display(&self, columns: ColumnsMut<'_>, positions: &[SampleCount]) -> ClipResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ClipError::Storage("injected summary failure".to_string()));
        }
        self.columns.fetch_add(columns.len(), Ordering::SeqCst);
        self.inner.wave_display(columns, positions)
    }
}
