//! The sample store a clip is built on
//!
//! A clip never touches audio storage directly. It reads, edits and summarizes
//! through [`SampleSequence`], which keeps samples in blocks of at most
//! [`SampleSequence::max_block_size`] samples in one [`SampleFormat`].

use crate::audio::sample_format::{SampleBuffer, SampleFormat};
use crate::error::ClipResult;

/// Absolute sample index or length within a sequence
pub type SampleCount = i64;

/// Mutable views of the four per-column waveform arrays for one run of columns
///
/// All four slices have the same length. The matching sample boundaries are
/// passed alongside as a slice one element longer.
#[derive(Debug)]
pub struct ColumnsMut<'a> {
    pub min: &'a mut [f32],
    pub max: &'a mut [f32],
    pub rms: &'a mut [f32],
    /// Block status per column: block index, or `-1 - block` while that block
    /// is still waiting for background decode
    pub bl: &'a mut [i32],
}

impl ColumnsMut<'_> {
    pub fn len(&self) -> usize {
        self.min.len()
    }

    pub fn is_empty(&self) -> bool {
        self.min.is_empty()
    }
}

/// Addressable store of audio samples with a bulk per-column summarizer
pub trait SampleSequence: Send {
    /// Committed samples
    fn num_samples(&self) -> SampleCount;

    fn sample_format(&self) -> SampleFormat;

    /// Largest block the store writes
    fn max_block_size(&self) -> usize;

    /// How many samples an append should carry to fill the current last block
    fn ideal_append_len(&self) -> usize;

    /// Read `out.len()` samples starting at `start` as floats
    fn get(&self, start: SampleCount, out: &mut [f32]) -> ClipResult<()>;

    /// Overwrite samples starting at `start`
    fn set(&mut self, start: SampleCount, samples: &[f32]) -> ClipResult<()>;

    /// Commit samples at the end, converting them to the sequence format
    fn append(&mut self, samples: &SampleBuffer) -> ClipResult<()>;

    /// Append `len` samples whose content a background decoder will supply later
    fn append_on_demand(&mut self, len: usize) -> ClipResult<()>;

    fn delete(&mut self, start: SampleCount, len: SampleCount) -> ClipResult<()>;

    fn insert_silence(&mut self, start: SampleCount, len: SampleCount) -> ClipResult<()>;

    /// Insert all of `other` at `start`
    fn paste(&mut self, start: SampleCount, other: &Self) -> ClipResult<()>
    where
        Self: Sized;

    /// New sequence holding `[start, end)`
    fn copy(&self, start: SampleCount, end: SampleCount) -> ClipResult<Self>
    where
        Self: Sized;

    /// New empty sequence with the same format and block size
    fn empty_like(&self) -> Self
    where
        Self: Sized;

    /// Minimum and maximum over `[start, start + len)`, zeros when empty
    fn min_max(&self, start: SampleCount, len: SampleCount) -> ClipResult<(f32, f32)>;

    /// RMS over `[start, start + len)`, zero when empty
    fn rms(&self, start: SampleCount, len: SampleCount) -> ClipResult<f32>;

    /// Returns whether anything was converted
    fn convert_to_sample_format(&mut self, format: SampleFormat) -> ClipResult<bool>;

    /// Summarize each column `i` over `[positions[i], positions[i + 1])`
    ///
    /// `positions` holds one more entry than there are columns. Ranges past
    /// the end of the sequence summarize as silence.
    fn wave_display(&self, columns: ColumnsMut<'_>, positions: &[SampleCount]) -> ClipResult<()>;
}
