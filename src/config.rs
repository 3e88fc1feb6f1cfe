//! Spectrogram configuration

use crate::audio::constants::MIN_WINDOW_SIZE;
use crate::audio::window_functions::WindowType;
use crate::error::{ClipError, ClipResult};

/// How spectrogram columns are computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    /// Windowed FFT power in dB
    Standard,
    /// Time/frequency reassigned power in dB
    Reassignment,
    /// Enhanced autocorrelation for pitch display
    PitchEac,
}

/// Spectrogram parameters; a cache built with different values is never reused
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrogramSettings {
    /// Column algorithm (default: Standard)
    pub algorithm: Algorithm,

    /// Analysis window shape (default: Hann)
    pub window_type: WindowType,

    /// Samples per analysis window, a power of two (default: 1024)
    pub window_size: usize,

    /// Transform length multiplier (default: 1, always 1 for PitchEac)
    pub zero_padding_factor: usize,

    /// Tilt in dB per decade referenced to 1 kHz, applied when positive (default: 0)
    pub frequency_gain: i32,
}

impl Default for SpectrogramSettings {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::Standard,
            window_type: WindowType::Hann,
            window_size: 1024,
            zero_padding_factor: 1,
            frequency_gain: 0,
        }
    }
}

impl SpectrogramSettings {
    /// Reject window sizes and padding factors the analyzers cannot use
    pub fn validate(&self) -> ClipResult<()> {
        if self.window_size < MIN_WINDOW_SIZE || !self.window_size.is_power_of_two() {
            return Err(ClipError::InvalidInput(format!(
                "window size {} must be a power of two of at least {}",
                self.window_size, MIN_WINDOW_SIZE
            )));
        }
        if self.zero_padding_factor == 0 {
            return Err(ClipError::InvalidInput(
                "zero padding factor must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Padding factor actually used by the algorithm
    pub fn effective_zero_padding(&self) -> usize {
        match self.algorithm {
            Algorithm::PitchEac => 1,
            _ => self.zero_padding_factor.max(1),
        }
    }

    pub fn fft_len(&self) -> usize {
        self.window_size * self.effective_zero_padding()
    }

    /// Frequency bins per column
    pub fn half(&self) -> usize {
        self.fft_len() / 2
    }

    /// Zeros placed on each side of the window
    pub fn padding(&self) -> usize {
        self.window_size * (self.effective_zero_padding() - 1) / 2
    }
}
