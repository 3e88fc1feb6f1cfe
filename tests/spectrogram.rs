mod common;

use common::{init_logging, sine, sweep, RATE};
use waveclip_cache::audio::constants::db_to_power;
use waveclip_cache::{
    Algorithm, Clip, ClipError, MemorySequence, SampleFormat, SampleReadCache,
    SpectrogramSettings, WindowType,
};

fn clip_of(samples: &[f32]) -> Clip<MemorySequence> {
    Clip::new(
        MemorySequence::from_samples(SampleFormat::Float, 65536, samples),
        RATE,
    )
}

fn peak_bin(column: &[f32]) -> usize {
    column
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(bin, _)| bin)
        .unwrap()
}

#[test]
fn test_same_view_is_not_recomputed() {
    init_logging();
    let clip = clip_of(&sweep(RATE as usize * 2));
    let settings = SpectrogramSettings::default();
    let mut read_cache = SampleReadCache::new();

    let (first, computed) = clip
        .get_spectrogram(&mut read_cache, &settings, 100, 0.2, 100.0)
        .unwrap();
    assert!(computed);
    assert_eq!(first.width(), 100);
    assert_eq!(first.bins(), 512);

    let (second, computed) = clip
        .get_spectrogram(&mut read_cache, &settings, 100, 0.2, 100.0)
        .unwrap();
    assert!(!computed);
    assert_eq!(second.values(), first.values());

    let (shifted, computed) = clip
        .get_spectrogram(&mut read_cache, &settings, 100, 0.3, 100.0)
        .unwrap();
    assert!(computed);
    // Ten columns of overlap carried over unchanged
    assert_eq!(shifted.column(0), first.column(10));
    assert_eq!(shifted.column(89), first.column(99));
}

#[test]
fn test_settings_change_recomputes() {
    let clip = clip_of(&sweep(RATE as usize));
    let mut read_cache = SampleReadCache::new();
    let settings = SpectrogramSettings::default();
    clip.get_spectrogram(&mut read_cache, &settings, 50, 0.0, 100.0)
        .unwrap();

    let blackman = SpectrogramSettings {
        window_type: WindowType::Blackman,
        ..settings.clone()
    };
    let (_, computed) = clip
        .get_spectrogram(&mut read_cache, &blackman, 50, 0.0, 100.0)
        .unwrap();
    assert!(computed);

    let tilted = SpectrogramSettings {
        frequency_gain: 20,
        ..blackman
    };
    let (_, computed) = clip
        .get_spectrogram(&mut read_cache, &tilted, 50, 0.0, 100.0)
        .unwrap();
    assert!(computed);
}

#[test]
fn test_edit_recomputes() {
    let mut clip = clip_of(&sweep(RATE as usize));
    let mut read_cache = SampleReadCache::new();
    let settings = SpectrogramSettings::default();
    clip.get_spectrogram(&mut read_cache, &settings, 50, 0.0, 100.0)
        .unwrap();

    clip.set_samples(1000, &[0.0; 100]).unwrap();
    let (_, computed) = clip
        .get_spectrogram(&mut read_cache, &settings, 50, 0.0, 100.0)
        .unwrap();
    assert!(computed);
}

#[test]
fn test_tone_peaks_at_its_bin() {
    let clip = clip_of(&sine(RATE as usize, 1000.0, 0.5));
    let settings = SpectrogramSettings::default();
    let mut read_cache = SampleReadCache::new();

    let (spectrogram, _) = clip
        .get_spectrogram(&mut read_cache, &settings, 40, 0.2, 100.0)
        .unwrap();

    // 1000 Hz sits at bin 1000 * 1024 / 44100 = 23.2
    for x in 0..40 {
        let peak = peak_bin(spectrogram.column(x).unwrap());
        assert!((22..=24).contains(&peak), "column {} peaks at bin {}", x, peak);
    }
}

#[test]
fn test_reassignment_keeps_tone_energy() {
    let clip = clip_of(&sine(RATE as usize * 2, 1000.0, 0.5));
    let mut read_cache = SampleReadCache::new();

    let standard = SpectrogramSettings::default();
    let reassigned = SpectrogramSettings {
        algorithm: Algorithm::Reassignment,
        ..SpectrogramSettings::default()
    };

    let (plain, _) = clip
        .get_spectrogram(&mut read_cache, &standard, 60, 0.5, 100.0)
        .unwrap();
    let (sharp, _) = clip
        .get_spectrogram(&mut read_cache, &reassigned, 60, 0.5, 100.0)
        .unwrap();

    let energy = |values: &[f32]| -> f64 {
        values.iter().map(|&db| f64::from(db_to_power(db))).sum()
    };
    // Edge columns gain or lose energy to the margins, compare the middle
    let half = plain.bins();
    let middle = 10 * half..50 * half;
    let ratio = energy(&sharp.values()[middle.clone()]) / energy(&plain.values()[middle]);
    assert!((0.7..1.4).contains(&ratio), "energy ratio {}", ratio);

    let peak = peak_bin(sharp.column(30).unwrap());
    assert!((22..=24).contains(&peak), "reassigned peak at bin {}", peak);
}

#[test]
fn test_reassignment_reuses_only_full_hits() {
    let clip = clip_of(&sweep(RATE as usize));
    let mut read_cache = SampleReadCache::new();
    let settings = SpectrogramSettings {
        algorithm: Algorithm::Reassignment,
        ..SpectrogramSettings::default()
    };
    clip.get_spectrogram(&mut read_cache, &settings, 40, 0.1, 100.0)
        .unwrap();

    let (_, computed) = clip
        .get_spectrogram(&mut read_cache, &settings, 40, 0.1, 100.0)
        .unwrap();
    assert!(!computed);
    let (_, computed) = clip
        .get_spectrogram(&mut read_cache, &settings, 40, 0.15, 100.0)
        .unwrap();
    assert!(computed);
}

#[test]
fn test_pitch_columns_are_finite_and_non_negative() {
    let clip = clip_of(&sine(RATE as usize, 220.0, 0.8));
    let mut read_cache = SampleReadCache::new();
    let settings = SpectrogramSettings {
        algorithm: Algorithm::PitchEac,
        window_size: 2048,
        zero_padding_factor: 4,
        ..SpectrogramSettings::default()
    };

    let (spectrogram, _) = clip
        .get_spectrogram(&mut read_cache, &settings, 30, 0.1, 100.0)
        .unwrap();
    // Padding never applies to autocorrelation
    assert_eq!(spectrogram.bins(), 1024);
    assert!(spectrogram
        .values()
        .iter()
        .all(|&v| v.is_finite() && v >= 0.0));
    assert!(spectrogram.values().iter().any(|&v| v > 0.0));
}

#[test]
fn test_padding_factor_ignored_for_pitch_cache_match() {
    let clip = clip_of(&sine(RATE as usize, 220.0, 0.8));
    let mut read_cache = SampleReadCache::new();
    let settings = SpectrogramSettings {
        algorithm: Algorithm::PitchEac,
        ..SpectrogramSettings::default()
    };
    clip.get_spectrogram(&mut read_cache, &settings, 30, 0.1, 100.0)
        .unwrap();

    let padded = SpectrogramSettings {
        zero_padding_factor: 2,
        ..settings
    };
    let (_, computed) = clip
        .get_spectrogram(&mut read_cache, &padded, 30, 0.1, 100.0)
        .unwrap();
    assert!(!computed);
}

#[test]
fn test_invalid_settings_are_rejected() {
    let clip = clip_of(&sweep(4410));
    let mut read_cache = SampleReadCache::new();

    for settings in [
        SpectrogramSettings {
            window_size: 1000,
            ..SpectrogramSettings::default()
        },
        SpectrogramSettings {
            window_size: 4,
            ..SpectrogramSettings::default()
        },
        SpectrogramSettings {
            zero_padding_factor: 0,
            ..SpectrogramSettings::default()
        },
    ] {
        assert!(matches!(
            clip.get_spectrogram(&mut read_cache, &settings, 10, 0.0, 100.0),
            Err(ClipError::InvalidInput(_))
        ));
    }
}

#[test]
fn test_degenerate_view_is_empty() {
    let clip = clip_of(&sweep(4410));
    let mut read_cache = SampleReadCache::new();
    let settings = SpectrogramSettings::default();

    let (spectrogram, computed) = clip
        .get_spectrogram(&mut read_cache, &settings, 10, 0.0, 0.0)
        .unwrap();
    assert!(!computed);
    assert_eq!(spectrogram.width(), 0);
    assert!(spectrogram.values().is_empty());
    assert!(spectrogram.positions().is_empty());
    assert!(spectrogram.column(0).is_none());
}

#[test]
fn test_decoded_blocks_reach_a_kept_read_cache() {
    init_logging();
    let mut clip = Clip::new(
        MemorySequence::with_block_size(SampleFormat::Float, 4096),
        RATE,
    );
    clip.append_on_demand(RATE as usize).unwrap();
    let settings = SpectrogramSettings::default();
    let mut read_cache = SampleReadCache::new();

    // Fills the read cache with undecoded silence
    clip.get_spectrogram(&mut read_cache, &settings, 20, 0.0, 100.0)
        .unwrap();

    let tone = sine(RATE as usize, 1000.0, 0.5);
    let handle = clip.invalidation_handle();
    let pending = clip.sequence().on_demand_blocks();
    for index in pending {
        let start = index * 4096;
        let end = (start + 4096).min(tone.len());
        let range = clip
            .sequence_mut()
            .load_on_demand_block(index, &tone[start..end])
            .unwrap();
        handle.add_invalid_region(range.start, range.end);
    }

    let (spectrogram, computed) = clip
        .get_spectrogram(&mut read_cache, &settings, 20, 0.5, 100.0)
        .unwrap();
    assert!(computed);
    for x in 0..20 {
        let peak = peak_bin(spectrogram.column(x).unwrap());
        assert!((22..=24).contains(&peak), "column {} peaks at bin {}", x, peak);
    }
}
