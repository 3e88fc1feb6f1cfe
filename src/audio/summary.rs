/// Per-column level summary (min, max and RMS over a run of samples)
///
/// Every waveform column is reduced to the same three numbers whether the
/// samples come from the committed sequence or the in-flight append buffer.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ColumnSummary {
    pub min: f32,
    pub max: f32,
    pub rms: f32,
}

impl ColumnSummary {
    /// Summarize `samples`, `None` when there is nothing to summarize
    ///
    /// # Parameters
    /// * `samples` - Floating point samples covered by one pixel column
    ///
    /// # Returns
    /// Minimum, maximum and root-mean-square of the samples
    pub fn of(samples: &[f32]) -> Option<Self> {
        let (&first, rest) = samples.split_first()?;

        let mut min = first;
        let mut max = first;
        let mut sum_squares = f64::from(first) * f64::from(first);

        for &sample in rest {
            min = min.min(sample);
            max = max.max(sample);
            sum_squares += f64::from(sample) * f64::from(sample);
        }

        Some(Self {
            min,
            max,
            rms: (sum_squares / samples.len() as f64).sqrt() as f32,
        })
    }
}
