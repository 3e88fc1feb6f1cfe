use std::ops::Range;

use crate::audio::sample_format::{SampleBuffer, SampleFormat};

/// Samples accepted by a clip but not yet committed to its sequence
///
/// Holds at most one block (`capacity` samples) in the sequence's format. The
/// clip commits whole blocks from the front as soon as enough has piled up.
#[derive(Debug, Clone)]
pub struct AppendBuffer {
    samples: SampleBuffer,

    // Largest number of samples held before the clip must commit
    capacity: usize,
}

impl AppendBuffer {
    pub fn new(format: SampleFormat, capacity: usize) -> Self {
        Self {
            samples: SampleBuffer::with_capacity(format, capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn format(&self) -> SampleFormat {
        self.samples.format()
    }

    /// Room left before the buffer is full
    pub fn free_space(&self) -> usize {
        self.capacity.saturating_sub(self.samples.len())
    }

    /// Copy as much of `source[range]` as fits
    ///
    /// # Returns
    /// Number of samples taken from the front of `range`
    pub fn write_samples(&mut self, source: &SampleBuffer, range: Range<usize>) -> usize {
        let count = range.len().min(self.free_space());
        self.samples
            .extend_from(source, range.start..range.start + count);
        count
    }

    /// Copy of the first `count` samples, ready to hand to the sequence
    pub fn front(&self, count: usize) -> SampleBuffer {
        let count = count.min(self.samples.len());
        let mut head = SampleBuffer::with_capacity(self.samples.format(), count);
        head.extend_from(&self.samples, 0..count);
        head
    }

    /// Drop the first `count` samples once the sequence has committed them
    pub fn discard_front(&mut self, count: usize) {
        self.samples.drain_front(count.min(self.samples.len()));
    }

    /// Widen `range` of the buffered samples to floats
    pub fn read_f32(&self, range: Range<usize>, out: &mut Vec<f32>) {
        self.samples.read_f32(range, out);
    }

    /// Follow a sequence format change
    pub fn convert(&mut self, format: SampleFormat) {
        self.samples = self.samples.converted(format);
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_stops_at_capacity() {
        let mut buffer = AppendBuffer::new(SampleFormat::Float, 4);
        let source = SampleBuffer::Float(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);

        assert_eq!(buffer.write_samples(&source, 0..6), 4);
        assert_eq!(buffer.free_space(), 0);
        assert_eq!(buffer.write_samples(&source, 4..6), 0);
    }

    #[test]
    fn test_discard_front_keeps_remainder() {
        let mut buffer = AppendBuffer::new(SampleFormat::Int16, 8);
        let source = SampleBuffer::Float(vec![0.5, -0.5, 0.25]);
        buffer.write_samples(&source, 0..3);

        let head = buffer.front(2);
        assert_eq!(head.len(), 2);
        assert_eq!(head.format(), SampleFormat::Int16);
        assert_eq!(buffer.len(), 3);

        buffer.discard_front(2);
        assert_eq!(buffer.len(), 1);

        let mut rest = Vec::new();
        buffer.read_f32(0..1, &mut rest);
        assert!((rest[0] - 0.25).abs() < 1e-4);
    }
}
