use crate::audio::sequence::{SampleCount, SampleSequence};
use crate::error::ClipResult;

/// Samples fetched per refill when the request is smaller
pub const DEFAULT_READ_AHEAD: usize = 65536;

/// Identifies whose samples a [`SampleReadCache`] holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReadKey {
    /// Process-unique clip id
    pub clip: u64,
    /// The clip's dirty generation when the samples were read
    pub generation: u64,
    /// Regions reported decoded in place, which leave the generation alone
    pub decodes: u64,
}

/// Caller-owned read-ahead buffer over one contiguous run of samples
///
/// Spectrogram columns read overlapping windows in increasing order, so one
/// forward read serves many columns. The buffer is dropped whenever the key
/// changes, which happens on any edit of the clip it was filled from and on
/// every region a background decoder reports.
#[derive(Debug)]
pub struct SampleReadCache {
    key: Option<ReadKey>,
    start: SampleCount,
    buffer: Vec<f32>,
    read_ahead: usize,
}

impl Default for SampleReadCache {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleReadCache {
    pub fn new() -> Self {
        Self::with_read_ahead(DEFAULT_READ_AHEAD)
    }

    pub fn with_read_ahead(read_ahead: usize) -> Self {
        Self {
            key: None,
            start: 0,
            buffer: Vec::new(),
            read_ahead: read_ahead.max(1),
        }
    }

    /// Forget the buffered samples
    pub fn invalidate(&mut self) {
        self.key = None;
        self.buffer.clear();
    }

    fn covers(&self, key: ReadKey, start: SampleCount, len: usize) -> bool {
        self.key == Some(key)
            && start >= self.start
            && start + len as SampleCount <= self.start + self.buffer.len() as SampleCount
    }

    /// `len` samples from `start`, refilling from `sequence` on a miss
    pub fn get<S: SampleSequence + ?Sized>(
        &mut self,
        sequence: &S,
        key: ReadKey,
        start: SampleCount,
        len: usize,
    ) -> ClipResult<&[f32]> {
        if !self.covers(key, start, len) {
            let available = (sequence.num_samples() - start).max(0) as usize;
            let fetch = len.max(self.read_ahead).min(available).max(len);
            self.buffer.resize(fetch, 0.0);
            if let Err(err) = sequence.get(start, &mut self.buffer) {
                log::warn!("read of {} samples at {} failed: {}", fetch, start, err);
                self.invalidate();
                return Err(err);
            }
            log::trace!("read cache refilled {}+{}", start, fetch);
            self.key = Some(key);
            self.start = start;
        }
        let offset = (start - self.start) as usize;
        Ok(&self.buffer[offset..offset + len])
    }
}
