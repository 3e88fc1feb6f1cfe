//! In-memory block store implementing [`SampleSequence`]
//!
//! Blocks keep their samples in the sequence's [`SampleFormat`]. Blocks
//! appended with [`SampleSequence::append_on_demand`] hold silence and report a
//! negative status until [`MemorySequence::load_on_demand_block`] supplies the
//! decoded audio, which is how a background decoder drives the display caches.

use std::ops::Range;

use crate::audio::constants::DEFAULT_MAX_BLOCK_SIZE;
use crate::audio::sample_format::{SampleBuffer, SampleFormat};
use crate::audio::sequence::{ColumnsMut, SampleCount, SampleSequence};
use crate::audio::summary::ColumnSummary;
use crate::error::{ClipError, ClipResult};

#[derive(Debug, Clone)]
struct Block {
    samples: SampleBuffer,
    /// Placeholder still waiting for the background decoder
    on_demand: bool,
}

impl Block {
    fn len(&self) -> SampleCount {
        self.samples.len() as SampleCount
    }
}

/// Sample sequence held entirely in memory
#[derive(Debug, Clone)]
pub struct MemorySequence {
    format: SampleFormat,
    max_block_size: usize,
    blocks: Vec<Block>,
    num_samples: SampleCount,
}

impl MemorySequence {
    pub fn new(format: SampleFormat) -> Self {
        Self::with_block_size(format, DEFAULT_MAX_BLOCK_SIZE)
    }

    pub fn with_block_size(format: SampleFormat, max_block_size: usize) -> Self {
        Self {
            format,
            max_block_size: max_block_size.max(1),
            blocks: Vec::new(),
            num_samples: 0,
        }
    }

    /// Sequence pre-filled with `samples`
    pub fn from_samples(format: SampleFormat, max_block_size: usize, samples: &[f32]) -> Self {
        let mut sequence = Self::with_block_size(format, max_block_size);
        let end = sequence.blocks.len();
        sequence.insert_blocks(end, &SampleBuffer::from_f32(format, samples), false);
        sequence
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Sample range covered by block `index`
    pub fn block_range(&self, index: usize) -> Option<Range<SampleCount>> {
        let start: SampleCount = self.blocks.get(..index)?.iter().map(Block::len).sum();
        let block = self.blocks.get(index)?;
        Some(start..start + block.len())
    }

    /// Indices of blocks still waiting for decode
    pub fn on_demand_blocks(&self) -> Vec<usize> {
        self.blocks
            .iter()
            .enumerate()
            .filter(|(_, block)| block.on_demand)
            .map(|(index, _)| index)
            .collect()
    }

    /// Fill an on-demand block with decoded audio
    ///
    /// # Returns
    /// The sample range that changed, ready to hand to `add_invalid_region`
    pub fn load_on_demand_block(
        &mut self,
        index: usize,
        samples: &[f32],
    ) -> ClipResult<Range<SampleCount>> {
        let range = self
            .block_range(index)
            .ok_or_else(|| ClipError::InvalidInput(format!("no block {}", index)))?;
        let block = &mut self.blocks[index];
        if !block.on_demand {
            return Err(ClipError::InvalidInput(format!(
                "block {} is not waiting for decode",
                index
            )));
        }
        if samples.len() != block.samples.len() {
            return Err(ClipError::InvalidInput(format!(
                "block {} holds {} samples, decoder supplied {}",
                index,
                block.samples.len(),
                samples.len()
            )));
        }
        block.samples.write_f32(0, samples);
        block.on_demand = false;
        log::trace!("decoded block {} covering {:?}", index, range);
        Ok(range)
    }

    fn check_range(&self, start: SampleCount, len: SampleCount) -> ClipResult<()> {
        if start < 0 || len < 0 || start + len > self.num_samples {
            return Err(ClipError::OutOfRange {
                start,
                len,
                available: self.num_samples,
            });
        }
        Ok(())
    }

    fn block_starts(&self) -> Vec<SampleCount> {
        let mut start = 0;
        self.blocks
            .iter()
            .map(|block| {
                let block_start = start;
                start += block.len();
                block_start
            })
            .collect()
    }

    /// Index of the first block beginning at `pos`, splitting a block if needed
    fn split_at(&mut self, pos: SampleCount) -> usize {
        if pos <= 0 {
            return 0;
        }
        let mut start = 0;
        for index in 0..self.blocks.len() {
            let len = self.blocks[index].len();
            if pos == start {
                return index;
            }
            if pos < start + len {
                let tail = self.blocks[index].samples.split_off((pos - start) as usize);
                let on_demand = self.blocks[index].on_demand;
                self.blocks.insert(
                    index + 1,
                    Block {
                        samples: tail,
                        on_demand,
                    },
                );
                return index + 1;
            }
            start += len;
        }
        self.blocks.len()
    }

    /// Insert `buffer` as blocks before block `at`, chunked to the block size
    fn insert_blocks(&mut self, at: usize, buffer: &SampleBuffer, on_demand: bool) {
        let buffer = buffer.converted(self.format);
        let mut blocks = Vec::with_capacity(buffer.len() / self.max_block_size + 1);
        let mut offset = 0;
        while offset < buffer.len() {
            let end = (offset + self.max_block_size).min(buffer.len());
            let mut samples = SampleBuffer::with_capacity(self.format, end - offset);
            samples.extend_from(&buffer, offset..end);
            blocks.push(Block {
                samples,
                on_demand,
            });
            offset = end;
        }
        self.num_samples += buffer.len() as SampleCount;
        self.blocks.splice(at..at, blocks);
    }

    /// Read `out.len()` samples from `start`, range already validated
    fn read_range(&self, start: SampleCount, out: &mut [f32]) {
        let end = start + out.len() as SampleCount;
        let mut block_start = 0;
        for block in &self.blocks {
            let block_end = block_start + block.len();
            if block_end > start && block_start < end {
                let from = start.max(block_start);
                let to = end.min(block_end);
                let src = (from - block_start) as usize..(to - block_start) as usize;
                let dst = (from - start) as usize..(to - start) as usize;
                block.samples.copy_to_f32(src, &mut out[dst]);
            }
            if block_end >= end {
                break;
            }
            block_start = block_end;
        }
    }

    fn read_vec(&self, start: SampleCount, len: SampleCount) -> Vec<f32> {
        let mut samples = vec![0.0; len as usize];
        self.read_range(start, &mut samples);
        samples
    }

    fn block_status(&self, starts: &[SampleCount], pos: SampleCount) -> i32 {
        if pos >= self.num_samples || self.blocks.is_empty() {
            return 0;
        }
        let index = starts.partition_point(|&start| start <= pos).saturating_sub(1);
        if self.blocks[index].on_demand {
            -1 - index as i32
        } else {
            index as i32
        }
    }
}

impl SampleSequence for MemorySequence {
    fn num_samples(&self) -> SampleCount {
        self.num_samples
    }

    fn sample_format(&self) -> SampleFormat {
        self.format
    }

    fn max_block_size(&self) -> usize {
        self.max_block_size
    }

    fn ideal_append_len(&self) -> usize {
        match self.blocks.last() {
            Some(last) if !last.on_demand && last.samples.len() < self.max_block_size => {
                self.max_block_size - last.samples.len()
            }
            _ => self.max_block_size,
        }
    }

    fn get(&self, start: SampleCount, out: &mut [f32]) -> ClipResult<()> {
        self.check_range(start, out.len() as SampleCount)?;
        self.read_range(start, out);
        Ok(())
    }

    fn set(&mut self, start: SampleCount, samples: &[f32]) -> ClipResult<()> {
        self.check_range(start, samples.len() as SampleCount)?;
        let end = start + samples.len() as SampleCount;
        let mut block_start = 0;
        for block in &mut self.blocks {
            let block_end = block_start + block.len();
            if block_end > start && block_start < end {
                let from = start.max(block_start);
                let to = end.min(block_end);
                block.samples.write_f32(
                    (from - block_start) as usize,
                    &samples[(from - start) as usize..(to - start) as usize],
                );
            }
            block_start = block_end;
        }
        Ok(())
    }

    fn append(&mut self, samples: &SampleBuffer) -> ClipResult<()> {
        let samples = samples.converted(self.format);
        let mut consumed = 0;
        if let Some(last) = self.blocks.last_mut() {
            if !last.on_demand && last.samples.len() < self.max_block_size {
                consumed = (self.max_block_size - last.samples.len()).min(samples.len());
                last.samples.extend_from(&samples, 0..consumed);
                self.num_samples += consumed as SampleCount;
            }
        }
        if consumed < samples.len() {
            let mut rest = SampleBuffer::with_capacity(self.format, samples.len() - consumed);
            rest.extend_from(&samples, consumed..samples.len());
            let end = self.blocks.len();
            self.insert_blocks(end, &rest, false);
        }
        Ok(())
    }

    fn append_on_demand(&mut self, len: usize) -> ClipResult<()> {
        let end = self.blocks.len();
        self.insert_blocks(end, &SampleBuffer::silence(self.format, len), true);
        Ok(())
    }

    fn delete(&mut self, start: SampleCount, len: SampleCount) -> ClipResult<()> {
        self.check_range(start, len)?;
        if len == 0 {
            return Ok(());
        }
        let first = self.split_at(start);
        let last = self.split_at(start + len);
        self.blocks.drain(first..last);
        self.num_samples -= len;
        Ok(())
    }

    fn insert_silence(&mut self, start: SampleCount, len: SampleCount) -> ClipResult<()> {
        if start < 0 || start > self.num_samples || len < 0 {
            return Err(ClipError::OutOfRange {
                start,
                len,
                available: self.num_samples,
            });
        }
        let at = self.split_at(start);
        self.insert_blocks(at, &SampleBuffer::silence(self.format, len as usize), false);
        Ok(())
    }

    fn paste(&mut self, start: SampleCount, other: &Self) -> ClipResult<()> {
        if start < 0 || start > self.num_samples {
            return Err(ClipError::OutOfRange {
                start,
                len: other.num_samples,
                available: self.num_samples,
            });
        }
        let mut at = self.split_at(start);
        for block in &other.blocks {
            let before = self.blocks.len();
            self.insert_blocks(at, &block.samples, block.on_demand);
            at += self.blocks.len() - before;
        }
        Ok(())
    }

    fn copy(&self, start: SampleCount, end: SampleCount) -> ClipResult<Self> {
        self.check_range(start, end - start)?;
        let mut out = self.empty_like();
        let mut block_start = 0;
        for block in &self.blocks {
            let block_end = block_start + block.len();
            if block_end > start && block_start < end {
                let from = (start.max(block_start) - block_start) as usize;
                let to = (end.min(block_end) - block_start) as usize;
                let mut samples = SampleBuffer::with_capacity(self.format, to - from);
                samples.extend_from(&block.samples, from..to);
                out.blocks.push(Block {
                    samples,
                    on_demand: block.on_demand,
                });
            }
            block_start = block_end;
        }
        out.num_samples = end - start;
        Ok(out)
    }

    fn empty_like(&self) -> Self {
        Self::with_block_size(self.format, self.max_block_size)
    }

    fn min_max(&self, start: SampleCount, len: SampleCount) -> ClipResult<(f32, f32)> {
        self.check_range(start, len)?;
        let summary = ColumnSummary::of(&self.read_vec(start, len)).unwrap_or_default();
        Ok((summary.min, summary.max))
    }

    fn rms(&self, start: SampleCount, len: SampleCount) -> ClipResult<f32> {
        self.check_range(start, len)?;
        Ok(ColumnSummary::of(&self.read_vec(start, len))
            .unwrap_or_default()
            .rms)
    }

    fn convert_to_sample_format(&mut self, format: SampleFormat) -> ClipResult<bool> {
        if format == self.format {
            return Ok(false);
        }
        for block in &mut self.blocks {
            block.samples = block.samples.converted(format);
        }
        self.format = format;
        Ok(true)
    }

    fn wave_display(&self, columns: ColumnsMut<'_>, positions: &[SampleCount]) -> ClipResult<()> {
        let count = columns.len();
        if positions.len() != count + 1 {
            return Err(ClipError::InvalidInput(format!(
                "{} columns need {} positions, got {}",
                count,
                count + 1,
                positions.len()
            )));
        }
        if count == 0 {
            return Ok(());
        }

        let first = positions[0].clamp(0, self.num_samples);
        let last = positions[count].clamp(first, self.num_samples);
        let samples = self.read_vec(first, last - first);
        let starts = self.block_starts();

        for i in 0..count {
            let start = positions[i].clamp(first, last);
            let end = positions[i + 1].clamp(start, last);
            let span = (start - first) as usize..(end - first) as usize;
            let summary = ColumnSummary::of(&samples[span]).unwrap_or_default();
            columns.min[i] = summary.min;
            columns.max[i] = summary.max;
            columns.rms[i] = summary.rms;
            columns.bl[i] = self.block_status(&starts, start);
        }
        Ok(())
    }
}
