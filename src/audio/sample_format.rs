//! Typed sample storage and format conversion
//!
//! Sequences and append buffers keep samples in their native format and only
//! widen to `f32` when summarizing or analysing. Conversion goes through
//! `dasp`'s `Sample` trait so every format pair uses the same scaling rules.

use std::ops::Range;

use dasp::sample::{Sample, I24};

/// Storage format of a sample sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleFormat {
    Int16,
    /// 24-bit integer stored in the low bits of an `i32`
    Int24,
    Float,
}

/// A run of samples held in one [`SampleFormat`]
#[derive(Debug, Clone, PartialEq)]
pub enum SampleBuffer {
    Int16(Vec<i16>),
    Int24(Vec<i32>),
    Float(Vec<f32>),
}

const I24_MIN: i32 = -(1 << 23);
const I24_MAX: i32 = (1 << 23) - 1;

fn i16_to_f32(sample: i16) -> f32 {
    sample.to_sample::<f32>()
}

fn i24_to_f32(sample: i32) -> f32 {
    I24::new_unchecked(sample.clamp(I24_MIN, I24_MAX)).to_sample::<f32>()
}

fn f32_to_i16(sample: f32) -> i16 {
    sample.clamp(-1.0, 1.0).to_sample::<i16>()
}

fn f32_to_i24(sample: f32) -> i32 {
    sample
        .clamp(-1.0, 1.0)
        .to_sample::<I24>()
        .inner()
        .clamp(I24_MIN, I24_MAX)
}

impl SampleBuffer {
    /// Empty buffer in `format`
    pub fn new(format: SampleFormat) -> Self {
        Self::with_capacity(format, 0)
    }

    pub fn with_capacity(format: SampleFormat, capacity: usize) -> Self {
        match format {
            SampleFormat::Int16 => Self::Int16(Vec::with_capacity(capacity)),
            SampleFormat::Int24 => Self::Int24(Vec::with_capacity(capacity)),
            SampleFormat::Float => Self::Float(Vec::with_capacity(capacity)),
        }
    }

    /// `len` samples of digital silence
    pub fn silence(format: SampleFormat, len: usize) -> Self {
        match format {
            SampleFormat::Int16 => Self::Int16(vec![0; len]),
            SampleFormat::Int24 => Self::Int24(vec![0; len]),
            SampleFormat::Float => Self::Float(vec![0.0; len]),
        }
    }

    /// Convert float samples into a buffer of `format`
    pub fn from_f32(format: SampleFormat, samples: &[f32]) -> Self {
        let mut buffer = Self::with_capacity(format, samples.len());
        buffer.extend_from_f32(samples);
        buffer
    }

    pub fn format(&self) -> SampleFormat {
        match self {
            Self::Int16(_) => SampleFormat::Int16,
            Self::Int24(_) => SampleFormat::Int24,
            Self::Float(_) => SampleFormat::Float,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Int16(v) => v.len(),
            Self::Int24(v) => v.len(),
            Self::Float(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append float samples, converting to this buffer's format
    pub fn extend_from_f32(&mut self, samples: &[f32]) {
        match self {
            Self::Int16(v) => v.extend(samples.iter().map(|&s| f32_to_i16(s))),
            Self::Int24(v) => v.extend(samples.iter().map(|&s| f32_to_i24(s))),
            Self::Float(v) => v.extend_from_slice(samples),
        }
    }

    /// Append `range` of `other`, converting when the formats differ
    pub fn extend_from(&mut self, other: &SampleBuffer, range: Range<usize>) {
        match (self, other) {
            (Self::Int16(dst), Self::Int16(src)) => dst.extend_from_slice(&src[range]),
            (Self::Int24(dst), Self::Int24(src)) => dst.extend_from_slice(&src[range]),
            (Self::Float(dst), Self::Float(src)) => dst.extend_from_slice(&src[range]),
            (dst, src) => {
                let mut floats = Vec::with_capacity(range.len());
                src.read_f32(range, &mut floats);
                dst.extend_from_f32(&floats);
            }
        }
    }

    /// Widen `range` to floats, replacing the contents of `out`
    pub fn read_f32(&self, range: Range<usize>, out: &mut Vec<f32>) {
        out.clear();
        match self {
            Self::Int16(v) => out.extend(v[range].iter().map(|&s| i16_to_f32(s))),
            Self::Int24(v) => out.extend(v[range].iter().map(|&s| i24_to_f32(s))),
            Self::Float(v) => out.extend_from_slice(&v[range]),
        }
    }

    /// Widen `range` into an exactly-sized slice
    pub fn copy_to_f32(&self, range: Range<usize>, out: &mut [f32]) {
        match self {
            Self::Int16(v) => {
                for (dst, &src) in out.iter_mut().zip(&v[range]) {
                    *dst = i16_to_f32(src);
                }
            }
            Self::Int24(v) => {
                for (dst, &src) in out.iter_mut().zip(&v[range]) {
                    *dst = i24_to_f32(src);
                }
            }
            Self::Float(v) => out.copy_from_slice(&v[range]),
        }
    }

    /// Overwrite samples starting at `offset` with converted floats
    pub fn write_f32(&mut self, offset: usize, samples: &[f32]) {
        let range = offset..offset + samples.len();
        match self {
            Self::Int16(v) => {
                for (dst, &src) in v[range].iter_mut().zip(samples) {
                    *dst = f32_to_i16(src);
                }
            }
            Self::Int24(v) => {
                for (dst, &src) in v[range].iter_mut().zip(samples) {
                    *dst = f32_to_i24(src);
                }
            }
            Self::Float(v) => v[range].copy_from_slice(samples),
        }
    }

    /// Split into `[0, at)` (kept) and `[at, len)` (returned)
    pub fn split_off(&mut self, at: usize) -> Self {
        match self {
            Self::Int16(v) => Self::Int16(v.split_off(at)),
            Self::Int24(v) => Self::Int24(v.split_off(at)),
            Self::Float(v) => Self::Float(v.split_off(at)),
        }
    }

    /// Remove and return the first `count` samples
    pub fn drain_front(&mut self, count: usize) -> Self {
        let rest = self.split_off(count);
        std::mem::replace(self, rest)
    }

    /// Copy of this buffer in another format
    pub fn converted(&self, format: SampleFormat) -> Self {
        if self.format() == format {
            return self.clone();
        }
        let mut out = Self::with_capacity(format, self.len());
        out.extend_from(self, 0..self.len());
        out
    }

    pub fn clear(&mut self) {
        match self {
            Self::Int16(v) => v.clear(),
            Self::Int24(v) => v.clear(),
            Self::Float(v) => v.clear(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int16_round_trip_is_close() {
        let floats = [0.0, 0.5, -0.5, 0.999];
        let buffer = SampleBuffer::from_f32(SampleFormat::Int16, &floats);
        let mut back = Vec::new();
        buffer.read_f32(0..buffer.len(), &mut back);
        for (a, b) in floats.iter().zip(&back) {
            assert!((a - b).abs() < 1e-4, "{} vs {}", a, b);
        }
    }

    #[test]
    fn test_full_scale_is_clamped() {
        let buffer = SampleBuffer::from_f32(SampleFormat::Int24, &[1.5, -1.5]);
        match &buffer {
            SampleBuffer::Int24(v) => {
                assert_eq!(v[0], I24_MAX);
                assert_eq!(v[1], I24_MIN);
            }
            other => panic!("unexpected format {:?}", other.format()),
        }
    }

    #[test]
    fn test_extend_from_converts_between_formats() {
        let source = SampleBuffer::from_f32(SampleFormat::Float, &[0.25, -0.25, 0.75]);
        let mut target = SampleBuffer::new(SampleFormat::Int16);
        target.extend_from(&source, 1..3);
        assert_eq!(target.len(), 2);
        let mut out = [0.0; 2];
        target.copy_to_f32(0..2, &mut out);
        assert!((out[0] + 0.25).abs() < 1e-4);
        assert!((out[1] - 0.75).abs() < 1e-4);
    }

    #[test]
    fn test_drain_front_keeps_tail() {
        let mut buffer = SampleBuffer::from_f32(SampleFormat::Float, &[1.0, 2.0, 3.0]);
        let head = buffer.drain_front(1);
        assert_eq!(head, SampleBuffer::Float(vec![1.0]));
        assert_eq!(buffer, SampleBuffer::Float(vec![2.0, 3.0]));
    }
}
