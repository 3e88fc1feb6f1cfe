//! Error types for clip display caches and clip editing

use thiserror::Error;

use crate::audio::sequence::SampleCount;

/// Errors that can occur while querying or editing a clip
#[derive(Error, Debug)]
pub enum ClipError {
    /// Invalid input parameters
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A sample range reached outside the backing sequence
    #[error("Sample range {start}+{len} is outside the sequence ({available} samples)")]
    OutOfRange {
        start: SampleCount,
        len: SampleCount,
        available: SampleCount,
    },

    /// The sample store failed to read or summarize its data
    #[error("Backing store failure: {0}")]
    Storage(String),

    /// Pasting between clips recorded at different rates
    #[error("Sample rate mismatch: clip is {expected} Hz, source is {found} Hz")]
    RateMismatch { expected: u32, found: u32 },

    #[error("FFT failed: {0}")]
    Fft(#[from] realfft::FftError),

    /// Processing error during resampling or analysis
    #[error("Processing error: {0}")]
    Processing(String),
}

/// Result alias used throughout the crate
pub type ClipResult<T> = Result<T, ClipError>;
