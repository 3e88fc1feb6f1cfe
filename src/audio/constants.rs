/// Display cache constants and small dB helpers
/// Shared by the waveform cache, spectrogram cache and clip editing code

/// Floor used when power is zero or negative, avoids -inf in the spectrogram
pub const SPECTRUM_FLOOR_DB: f32 = -160.0;

/// Power below this is skipped by the reassignment analyzer (phase is noise there)
pub const REASSIGNMENT_POWER_EPSILON: f32 = 1e-16;

/// Upper bound on columns evaluated outside the requested range when reassigning
pub const MAX_REASSIGNMENT_MARGIN: i64 = 100;

/// Frequency gain is referenced to this frequency (0 dB at 1 kHz)
pub const GAIN_REFERENCE_HZ: f64 = 1000.0;

/// Tolerance in seconds used when searching cut lines by position
pub const CUT_LINE_TOLERANCE: f64 = 0.0001;

/// Flag written into columns synthesized from the append buffer ("not on-demand")
pub const APPEND_BUFFER_COLUMN: i32 = 1;

/// Block size of the in-memory sequence when none is given
pub const DEFAULT_MAX_BLOCK_SIZE: usize = 65536;

/// Smallest spectrogram window accepted by the settings
pub const MIN_WINDOW_SIZE: usize = 8;

// === HELPER FUNCTIONS ===

/// Convert power to dB, non-positive power maps to [`SPECTRUM_FLOOR_DB`]
pub fn power_to_db(power: f32) -> f32 {
    if power <= 0.0 {
        SPECTRUM_FLOOR_DB
    } else {
        10.0 * libm::log10f(power)
    }
}

/// Convert dB back to linear power
pub fn db_to_power(db: f32) -> f32 {
    libm::powf(10.0, db / 10.0)
}
