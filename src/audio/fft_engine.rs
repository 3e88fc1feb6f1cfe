use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};
use std::sync::Arc;

use crate::error::ClipResult;

/// Real-to-complex FFT of one fixed length with reusable buffers
///
/// Every spectrum strategy goes through this engine, so there is exactly one
/// transform implementation behind the spectrogram.
pub struct FftEngine {
    // FFT instance
    fft: Arc<dyn RealToComplex<f32>>,

    // Buffers
    input_buffer: Vec<f32>,    // Windowed samples, consumed by each transform
    scratch: Vec<Complex32>,

    // FFT size
    size: usize,
}

impl FftEngine {
    pub fn new(size: usize) -> Self {
        // Create FFT planner and get FFT instance
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(size);

        let scratch = fft.make_scratch_vec();

        Self {
            fft,
            input_buffer: vec![0.0; size],
            scratch,
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Output buffer sized for this engine (N/2+1 bins)
    pub fn make_output(&self) -> Vec<Complex32> {
        self.fft.make_output_vec()
    }

    /// Transform `samples` multiplied by `window` into `output`
    ///
    /// # Parameters
    /// * `samples` - Time domain frame, `size` long
    /// * `window` - Window coefficients, `size` long
    /// * `output` - Receives N/2+1 complex bins
    pub fn process_windowed(
        &mut self,
        samples: &[f32],
        window: &[f32],
        output: &mut [Complex32],
    ) -> ClipResult<()> {
        // Step 1: Apply window function to input
        for ((dst, &sample), &w) in self.input_buffer.iter_mut().zip(samples).zip(window) {
            *dst = sample * w;
        }

        // Step 2: Run FFT (time domain -> frequency domain)
        self.fft
            .process_with_scratch(&mut self.input_buffer, output, &mut self.scratch)?;
        Ok(())
    }

    /// Transform `samples` as they are
    pub fn process(&mut self, samples: &[f32], output: &mut [Complex32]) -> ClipResult<()> {
        self.input_buffer.copy_from_slice(&samples[..self.size]);
        self.fft
            .process_with_scratch(&mut self.input_buffer, output, &mut self.scratch)?;
        Ok(())
    }
}
