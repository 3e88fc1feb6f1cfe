/// Window functions for spectrogram analysis
///
/// This module provides the window shapes selectable in the spectrogram
/// settings, plus the derivative and time-ramp companions the reassignment
/// analyzer needs.
use apodize::{blackman_iter, cosine_iter, hamming_iter, hanning_iter};
use libm::expf;

/// Window function types for spectrogram analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowType {
    /// Rectangular: No windowing, maximum frequency resolution
    Rectangular,
    /// Bartlett: Triangular taper
    Bartlett,
    /// Hamming: Better first sidelobe than Hann, does not reach zero at the edges
    Hamming,
    /// Hann: Good general-purpose balance
    Hann,
    /// Blackman: Excellent sidelobe suppression, wider main lobe
    Blackman,
    /// Blackman-Harris: Four-term cosine sum, sidelobes below -90 dB
    BlackmanHarris,
    /// Welch: Parabolic taper
    Welch,
    /// Gaussian with a = 2.5
    Gaussian25,
    /// Gaussian with a = 3.5
    Gaussian35,
    /// Gaussian with a = 4.5
    Gaussian45,
}

impl WindowType {
    /// Generate window coefficients for this window type
    pub fn generate(self, window_size: usize) -> Vec<f32> {
        match self {
            Self::Rectangular => vec![1.0; window_size],
            Self::Bartlett => generate_bartlett_window(window_size),
            Self::Hamming => hamming_iter(window_size).map(|w| w as f32).collect(),
            Self::Hann => hanning_iter(window_size).map(|w| w as f32).collect(),
            Self::Blackman => blackman_iter(window_size).map(|w| w as f32).collect(),
            Self::BlackmanHarris => cosine_iter(0.35875, 0.48829, 0.14128, 0.01168, window_size)
                .map(|w| w as f32)
                .collect(),
            Self::Welch => generate_welch_window(window_size),
            Self::Gaussian25 => generate_gaussian_window(window_size, 2.5),
            Self::Gaussian35 => generate_gaussian_window(window_size, 3.5),
            Self::Gaussian45 => generate_gaussian_window(window_size, 4.5),
        }
    }

    /// Get the coherent gain for this window type
    pub fn coherent_gain(self, coefficients: &[f32]) -> f32 {
        if coefficients.is_empty() {
            return 1.0;
        }
        coefficients.iter().sum::<f32>() / coefficients.len() as f32
    }
}

/// Generates Bartlett (triangular) window coefficients reaching zero at both ends
pub fn generate_bartlett_window(window_size: usize) -> Vec<f32> {
    let center = (window_size as f32 - 1.0) / 2.0;
    if center <= 0.0 {
        return vec![1.0; window_size];
    }

    (0..window_size)
        .map(|i| 1.0 - ((i as f32 - center) / center).abs())
        .collect()
}

/// Generates Welch window coefficients
///
/// # Mathematical Background
/// Welch formula: w[n] = 1 - ((n - c) / c)^2 with c = (N - 1) / 2
pub fn generate_welch_window(window_size: usize) -> Vec<f32> {
    let center = (window_size as f32 - 1.0) / 2.0;
    if center <= 0.0 {
        return vec![1.0; window_size];
    }

    (0..window_size)
        .map(|i| {
            let position = (i as f32 - center) / center;
            1.0 - position * position
        })
        .collect()
}

/// Generates Gaussian window coefficients
///
/// # Parameters
/// * `window_size` - Number of samples in the window
/// * `a` - Shape parameter, larger values give a narrower bell
///
/// # Mathematical Background
/// Gaussian formula: w[n] = exp(-0.5 * (a * (n - c) / c)^2) with c = (N - 1) / 2
pub fn generate_gaussian_window(window_size: usize, a: f32) -> Vec<f32> {
    let center = (window_size as f32 - 1.0) / 2.0;
    if center <= 0.0 {
        return vec![1.0; window_size];
    }

    (0..window_size)
        .map(|i| {
            let position = a * (i as f32 - center) / center;
            expf(-0.5 * position * position)
        })
        .collect()
}

/// Pre-computed windows for one spectrogram configuration
///
/// Each vector is `fft_len` long with the window shape centred and zeros in
/// the padding on both sides. All three are scaled by the same factor so a
/// full-scale sine reads 0 dB.
#[derive(Debug, Clone)]
pub struct SpectrogramWindows {
    /// The analysis window
    pub window: Vec<f32>,

    /// Per-sample derivative of the window (frequency reassignment)
    pub derivative: Vec<f32>,

    /// Window multiplied by the offset from its centre in samples (time reassignment)
    pub time_ramp: Vec<f32>,
}

impl SpectrogramWindows {
    /// Build the window family for `window_type`
    ///
    /// # Parameters
    /// * `window_type` - Shape of the analysis window
    /// * `window_size` - Samples covered by the window
    /// * `fft_len` - Transform length, at least `window_size`; the surplus is zero padding
    pub fn new(window_type: WindowType, window_size: usize, fft_len: usize) -> Self {
        let padding = fft_len.saturating_sub(window_size) / 2;
        let shape = window_type.generate(window_size);

        // Scale the window function to give 0dB spectrum for 0dB sine tone
        let gain = window_type.coherent_gain(&shape) * window_size as f32;
        let scale = if gain > 0.0 { 2.0 / gain } else { 1.0 };

        let mut window = vec![0.0; fft_len];
        let mut derivative = vec![0.0; fft_len];
        let mut time_ramp = vec![0.0; fft_len];

        let center = (window_size as f32 - 1.0) / 2.0;
        let at = |i: isize| -> f32 {
            if i < 0 {
                0.0
            } else {
                shape.get(i as usize).copied().unwrap_or(0.0)
            }
        };

        for i in 0..window_size {
            let slot = padding + i;
            window[slot] = shape[i] * scale;
            derivative[slot] = (at(i as isize + 1) - at(i as isize - 1)) * 0.5 * scale;
            time_ramp[slot] = shape[i] * (i as f32 - center) * scale;
        }

        Self {
            window,
            derivative,
            time_ramp,
        }
    }
}
