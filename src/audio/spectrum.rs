//! Spectrogram column strategies
//!
//! A spectrogram column is computed from one zero-padded frame of samples
//! centred on the column's sample position. The three algorithms share that
//! framing and differ only in what they do with the frame, so each is a
//! [`ColumnAnalyzer`] chosen from [`SpectrogramSettings::algorithm`].

use core::f32::consts::PI;
use std::ops::Range;

use realfft::num_complex::Complex32;

use super::constants::{power_to_db, GAIN_REFERENCE_HZ, REASSIGNMENT_POWER_EPSILON};
use super::fft_engine::FftEngine;
use super::window_functions::SpectrogramWindows;
use crate::config::{Algorithm, SpectrogramSettings};
use crate::error::ClipResult;

/// Output area one populate pass may write into
///
/// `freq` holds `half` bins for every column of the cache. Reassigned energy is
/// only accepted for columns inside `bounds`, the range the pass is filling.
pub struct ColumnSink<'a> {
    freq: &'a mut [f32],
    half: usize,
    bounds: Range<i64>,
    /// Pixel columns per sample, converts a time correction in samples to columns
    columns_per_sample: f64,
}

impl<'a> ColumnSink<'a> {
    pub fn new(
        freq: &'a mut [f32],
        half: usize,
        bounds: Range<i64>,
        columns_per_sample: f64,
    ) -> Self {
        Self {
            freq,
            half,
            bounds,
            columns_per_sample,
        }
    }

    pub fn half(&self) -> usize {
        self.half
    }

    pub fn bounds(&self) -> Range<i64> {
        self.bounds.clone()
    }

    pub fn columns_per_sample(&self) -> f64 {
        self.columns_per_sample
    }

    /// Bins of column `x`, `None` outside the cache
    pub fn column_mut(&mut self, x: i64) -> Option<&mut [f32]> {
        if x < 0 || self.half == 0 {
            return None;
        }
        let start = x as usize * self.half;
        self.freq.get_mut(start..start + self.half)
    }

    /// Add `power` to `(x, bin)` when `x` is inside the pass bounds
    pub fn accumulate(&mut self, x: i64, bin: usize, power: f32) -> bool {
        if !self.bounds.contains(&x) || bin >= self.half {
            return false;
        }
        match self.column_mut(x) {
            Some(column) => {
                column[bin] += power;
                true
            }
            None => false,
        }
    }
}

/// One way of turning a frame into spectrogram output
pub trait ColumnAnalyzer {
    /// Analyze the frame centred on column `x`
    ///
    /// # Returns
    /// Whether anything landed inside the sink's bounds. Only the reassignment
    /// analyzer can miss; it uses this to stop scanning outside the range.
    fn analyze(&mut self, frame: &[f32], x: i64, sink: &mut ColumnSink<'_>) -> ClipResult<bool>;

    /// True when output can land in columns other than the analyzed one
    fn reassigns(&self) -> bool {
        false
    }

    /// Finalize every column inside the sink's bounds after the pass
    fn finish(&self, _sink: &mut ColumnSink<'_>) {}
}

/// Build the analyzer for `settings`
pub fn column_analyzer(settings: &SpectrogramSettings, rate: f64) -> Box<dyn ColumnAnalyzer> {
    let gains = gain_factors(settings, rate);
    match settings.algorithm {
        Algorithm::Standard => Box::new(StandardAnalyzer::new(settings, gains)),
        Algorithm::Reassignment => Box::new(ReassignmentAnalyzer::new(settings, gains)),
        Algorithm::PitchEac => Box::new(PitchEacAnalyzer::new(settings)),
    }
}

/// Per-bin gain in dB for the frequency gain setting
///
/// # Parameters
/// * `settings` - Supplies the gain in dB per decade and the transform length
/// * `rate` - Sample rate of the clip
///
/// # Returns
/// `half` values to add to each column, empty when the gain is off or the
/// algorithm is autocorrelation
///
/// # Mathematical Background
/// gain[k] = g * log10(k * rate / fft_len / 1000); bin 0 uses k = 1
pub fn gain_factors(settings: &SpectrogramSettings, rate: f64) -> Vec<f32> {
    if settings.frequency_gain <= 0 || settings.algorithm == Algorithm::PitchEac {
        return Vec::new();
    }
    let gain = f64::from(settings.frequency_gain);
    let factor = (rate / settings.fft_len() as f64) / GAIN_REFERENCE_HZ;
    (0..settings.half())
        .map(|bin| (gain * libm::log10(factor * bin.max(1) as f64)) as f32)
        .collect()
}

fn add_gains(column: &mut [f32], gains: &[f32]) {
    for (value, gain) in column.iter_mut().zip(gains) {
        *value += gain;
    }
}

fn power(bin: Complex32) -> f32 {
    bin.re * bin.re + bin.im * bin.im
}

/// Windowed FFT power in dB
pub struct StandardAnalyzer {
    engine: FftEngine,
    window: Vec<f32>,
    spectrum: Vec<Complex32>,
    gains: Vec<f32>,
}

impl StandardAnalyzer {
    pub fn new(settings: &SpectrogramSettings, gains: Vec<f32>) -> Self {
        let fft_len = settings.fft_len();
        let engine = FftEngine::new(fft_len);
        let spectrum = engine.make_output();
        let windows = SpectrogramWindows::new(settings.window_type, settings.window_size, fft_len);
        Self {
            engine,
            window: windows.window,
            spectrum,
            gains,
        }
    }
}

impl ColumnAnalyzer for StandardAnalyzer {
    fn analyze(&mut self, frame: &[f32], x: i64, sink: &mut ColumnSink<'_>) -> ClipResult<bool> {
        self.engine
            .process_windowed(frame, &self.window, &mut self.spectrum)?;
        let Some(column) = sink.column_mut(x) else {
            return Ok(false);
        };
        for (value, &bin) in column.iter_mut().zip(&self.spectrum) {
            *value = power_to_db(power(bin));
        }
        add_gains(column, &self.gains);
        Ok(true)
    }
}

/// Reassigned spectrogram
///
/// Three transforms of the same frame (window, derivative window, time-ramp
/// window) give for every bin an instantaneous frequency and a group delay.
/// The bin's power is moved to the corrected bin and column instead of
/// staying where it was measured, which sharpens both axes.
pub struct ReassignmentAnalyzer {
    engine: FftEngine,
    windows: SpectrogramWindows,
    spectrum: Vec<Complex32>,
    derivative_spectrum: Vec<Complex32>,
    time_spectrum: Vec<Complex32>,
    gains: Vec<f32>,
    half: usize,
}

impl ReassignmentAnalyzer {
    pub fn new(settings: &SpectrogramSettings, gains: Vec<f32>) -> Self {
        let fft_len = settings.fft_len();
        let engine = FftEngine::new(fft_len);
        let spectrum = engine.make_output();
        Self {
            windows: SpectrogramWindows::new(settings.window_type, settings.window_size, fft_len),
            derivative_spectrum: spectrum.clone(),
            time_spectrum: spectrum.clone(),
            spectrum,
            engine,
            gains,
            half: settings.half(),
        }
    }
}

impl ColumnAnalyzer for ReassignmentAnalyzer {
    fn analyze(&mut self, frame: &[f32], x: i64, sink: &mut ColumnSink<'_>) -> ClipResult<bool> {
        self.engine
            .process_windowed(frame, &self.windows.window, &mut self.spectrum)?;
        self.engine.process_windowed(
            frame,
            &self.windows.derivative,
            &mut self.derivative_spectrum,
        )?;
        self.engine
            .process_windowed(frame, &self.windows.time_ramp, &mut self.time_spectrum)?;

        // Converts the phase slope to a bin offset
        let multiplier = -(self.engine.size() as f32) / (2.0 * PI);
        let mut landed = false;

        for bin in 0..self.half {
            let denom = self.spectrum[bin];
            let bin_power = power(denom);
            if bin_power < REASSIGNMENT_POWER_EPSILON {
                continue;
            }

            let num = self.derivative_spectrum[bin];
            let quot_im = (num.im * denom.re - num.re * denom.im) / bin_power;
            let corrected_bin = (bin as f32 + multiplier * quot_im + 0.5) as i64;
            if corrected_bin < 0 || corrected_bin >= self.half as i64 {
                continue;
            }

            let num = self.time_spectrum[bin];
            let time_correction = (num.re * denom.re + num.im * denom.im) / bin_power;
            let corrected_x = (0.5
                + x as f64
                + f64::from(time_correction) * sink.columns_per_sample())
            .floor() as i64;

            if sink.accumulate(corrected_x, corrected_bin as usize, bin_power) {
                landed = true;
            }
        }
        Ok(landed)
    }

    fn reassigns(&self) -> bool {
        true
    }

    fn finish(&self, sink: &mut ColumnSink<'_>) {
        for x in sink.bounds() {
            if let Some(column) = sink.column_mut(x) {
                for value in column.iter_mut() {
                    *value = power_to_db(*value);
                }
                add_gains(column, &self.gains);
            }
        }
    }
}

/// Enhanced autocorrelation for pitch display
///
/// # Mathematical Background
/// The frame's power spectrum is compressed with a cube root and transformed
/// again, giving a generalized autocorrelation. Peak pruning then subtracts a
/// time-doubled copy to suppress the sub-harmonic peaks, and the result is
/// reversed so low lags sit at the top of the column.
pub struct PitchEacAnalyzer {
    engine: FftEngine,
    window: Vec<f32>,
    spectrum: Vec<Complex32>,
    compressed: Vec<f32>,
    autocorrelation: Vec<Complex32>,
    processed: Vec<f32>,
    clipped: Vec<f32>,
    half: usize,
    scale: f32,
}

impl PitchEacAnalyzer {
    pub fn new(settings: &SpectrogramSettings) -> Self {
        let size = settings.window_size;
        let engine = FftEngine::new(size);
        let spectrum = engine.make_output();
        let half = size / 2;
        Self {
            window: settings.window_type.generate(size),
            autocorrelation: spectrum.clone(),
            spectrum,
            engine,
            compressed: vec![0.0; size],
            processed: vec![0.0; half],
            clipped: vec![0.0; half],
            half,
            scale: (size / 4) as f32,
        }
    }
}

impl ColumnAnalyzer for PitchEacAnalyzer {
    fn analyze(&mut self, frame: &[f32], x: i64, sink: &mut ColumnSink<'_>) -> ClipResult<bool> {
        let size = self.engine.size();
        self.engine
            .process_windowed(frame, &self.window, &mut self.spectrum)?;

        // Cube root of the power, mirrored to a full symmetric spectrum
        for (k, &bin) in self.spectrum.iter().enumerate() {
            let value = libm::cbrtf(power(bin));
            self.compressed[k] = value;
            if k > 0 && k < size - k {
                self.compressed[size - k] = value;
            }
        }
        self.engine
            .process(&self.compressed, &mut self.autocorrelation)?;

        let half = self.half;
        for i in 0..half {
            self.clipped[i] = self.autocorrelation[i].re.max(0.0);
        }
        for i in 0..half {
            let doubled = if i % 2 == 0 {
                self.clipped[i / 2]
            } else {
                (self.clipped[i / 2] + self.clipped[i / 2 + 1]) / 2.0
            };
            self.processed[i] = (self.clipped[i] - doubled).max(0.0);
        }

        let Some(column) = sink.column_mut(x) else {
            return Ok(false);
        };
        for i in 0..half {
            column[half - 1 - i] = self.processed[i] / self.scale;
        }
        Ok(true)
    }
}
