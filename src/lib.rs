//! Incremental display caches for sample-addressed audio clips
//!
//! A [`Clip`] turns its samples into per-pixel waveform summaries
//! ([`Clip::get_wave_display`]) and spectrogram columns
//! ([`Clip::get_spectrogram`]). Each query reuses whatever part of the previous
//! view still applies, so scrolling only computes the newly exposed columns.
//! Blocks decoded in the background are patched in through
//! [`InvalidationHandle::add_invalid_region`].
//!
//! ```
//! use waveclip_cache::{Clip, MemorySequence, SampleFormat, WaveDisplay};
//!
//! let samples: Vec<f32> = (0..44100).map(|n| (n as f32 * 0.01).sin()).collect();
//! let sequence = MemorySequence::from_samples(SampleFormat::Float, 65536, &samples);
//! let clip = Clip::new(sequence, 44100);
//!
//! let mut display = WaveDisplay::new(400);
//! let loading = clip.get_wave_display(&mut display, 0.0, 400.0).unwrap();
//! assert!(!loading);
//! assert_eq!(display.max().len(), 400);
//! ```

pub mod audio;
pub mod clip;
pub mod config;
pub mod display;
pub mod error;

pub use audio::memory_sequence::MemorySequence;
pub use audio::read_cache::SampleReadCache;
pub use audio::sample_format::{SampleBuffer, SampleFormat};
pub use audio::sequence::{SampleCount, SampleSequence};
pub use audio::window_functions::WindowType;
pub use clip::{Clip, InvalidationHandle, Resampler};
pub use config::{Algorithm, SpectrogramSettings};
pub use display::spec_cache::Spectrogram;
pub use display::wave_cache::WaveDisplay;
pub use error::{ClipError, ClipResult};
