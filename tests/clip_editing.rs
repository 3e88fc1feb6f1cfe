mod common;

use common::init_logging;
use waveclip_cache::{
    Clip, ClipError, InvalidationHandle, MemorySequence, SampleBuffer, SampleFormat,
    SampleSequence, WaveDisplay,
};

const RATE: u32 = 1000;

fn ramp_clip(len: usize) -> Clip<MemorySequence> {
    let samples: Vec<f32> = (0..len).map(|n| n as f32 / len as f32).collect();
    Clip::new(
        MemorySequence::from_samples(SampleFormat::Float, 256, &samples),
        RATE,
    )
}

fn contents(clip: &Clip<MemorySequence>) -> Vec<f32> {
    let mut out = vec![0.0; clip.num_samples() as usize];
    clip.get_samples(0, &mut out).unwrap();
    out
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn test_cut_line_round_trip_restores_audio() {
    init_logging();
    let mut clip = ramp_clip(1000);
    let original = contents(&clip);

    clip.clear_and_add_cut_line(0.2, 0.4).unwrap();
    assert_eq!(clip.num_samples(), 800);
    assert_eq!(clip.cut_lines().len(), 1);

    let (start, end) = clip.find_cut_line(0.2).unwrap();
    assert!(approx(start, 0.2));
    assert!(approx(end, 0.4));
    assert!(clip.find_cut_line(0.3).is_none());

    assert!(clip.expand_cut_line(0.2).unwrap());
    assert!(clip.cut_lines().is_empty());
    assert_eq!(contents(&clip), original);
    assert!(!clip.expand_cut_line(0.2).unwrap());
}

#[test]
fn test_remove_cut_line() {
    let mut clip = ramp_clip(1000);
    clip.clear_and_add_cut_line(0.5, 0.6).unwrap();
    assert!(!clip.remove_cut_line(0.7));
    assert!(clip.remove_cut_line(0.5));
    assert!(clip.find_cut_line(0.5).is_none());
    assert_eq!(clip.num_samples(), 900);
}

#[test]
fn test_clear_moves_and_drops_cut_lines() {
    let mut clip = ramp_clip(1000);
    clip.clear_and_add_cut_line(0.5, 0.6).unwrap();

    // Before the cut line: it moves left with the audio
    clip.clear(0.1, 0.2).unwrap();
    assert_eq!(clip.num_samples(), 800);
    assert!(clip.find_cut_line(0.4).is_some());

    // Around it: it goes with the cleared audio
    clip.clear(0.3, 0.5).unwrap();
    assert!(clip.cut_lines().is_empty());
    assert_eq!(clip.num_samples(), 600);
}

#[test]
fn test_nested_cut_lines_move_into_new_cut() {
    let mut clip = ramp_clip(1000);
    clip.clear_and_add_cut_line(0.4, 0.5).unwrap();
    clip.clear_and_add_cut_line(0.3, 0.6).unwrap();

    assert_eq!(clip.cut_lines().len(), 1);
    let outer = &clip.cut_lines()[0];
    assert!(approx(outer.offset(), 0.3));
    assert_eq!(outer.cut_lines().len(), 1);
    assert!(approx(outer.cut_lines()[0].offset(), 0.1));
}

#[test]
fn test_cut_outside_clip_is_ignored() {
    let mut clip = ramp_clip(1000);
    let before = clip.dirty();
    clip.clear_and_add_cut_line(2.0, 3.0).unwrap();
    assert!(clip.cut_lines().is_empty());
    assert_eq!(clip.dirty(), before);
}

#[test]
fn test_paste_shifts_later_cut_lines() {
    let mut clip = ramp_clip(1000);
    clip.clear_and_add_cut_line(0.5, 0.6).unwrap();
    let other = ramp_clip(200);

    let before = clip.dirty();
    clip.paste(0.1, &other).unwrap();
    assert!(clip.dirty() > before);
    assert_eq!(clip.num_samples(), 1100);
    assert!(clip.find_cut_line(0.7).is_some());
    assert!(clip.find_cut_line(0.5).is_none());

    let mut pasted = vec![0.0; 200];
    clip.get_samples(100, &mut pasted).unwrap();
    assert_eq!(pasted, contents(&other));
}

#[test]
fn test_paste_converts_format() {
    let mut clip = Clip::new(
        MemorySequence::from_samples(SampleFormat::Int16, 256, &[0.0; 100]),
        RATE,
    );
    let other = ramp_clip(50);
    clip.paste(0.0, &other).unwrap();
    assert_eq!(clip.sequence().sample_format(), SampleFormat::Int16);
    assert_eq!(clip.num_samples(), 150);
}

#[test]
fn test_paste_rejects_other_rate() {
    let mut clip = ramp_clip(100);
    let other = Clip::new(
        MemorySequence::from_samples(SampleFormat::Float, 256, &[0.0; 10]),
        RATE * 2,
    );
    assert!(matches!(
        clip.paste(0.0, &other),
        Err(ClipError::RateMismatch { .. })
    ));
    assert_eq!(clip.num_samples(), 100);
}

#[test]
fn test_from_range_copies_samples_between_times() {
    let mut source = ramp_clip(1000);
    source.set_offset(1.0);

    let copy = Clip::from_range(&source, 1.2, 1.5).unwrap();
    assert_eq!(copy.num_samples(), 300);
    assert_eq!(copy.offset(), 0.0);
    assert_ne!(copy.id(), source.id());

    let mut expected = vec![0.0; 300];
    source.get_samples(200, &mut expected).unwrap();
    assert_eq!(contents(&copy), expected);
}

#[test]
fn test_insert_silence_shifts_audio_and_cut_lines() {
    let mut clip = ramp_clip(1000);
    clip.clear_and_add_cut_line(0.5, 0.6).unwrap();

    clip.insert_silence(0.2, 0.1).unwrap();
    assert_eq!(clip.num_samples(), 1000);
    assert!(clip.find_cut_line(0.6).is_some());

    let mut gap = vec![1.0; 100];
    clip.get_samples(200, &mut gap).unwrap();
    assert!(gap.iter().all(|&v| v == 0.0));
}

#[test]
fn test_set_samples_invalidates_display() {
    let mut clip = ramp_clip(1000);
    let mut display = WaveDisplay::new(10);
    clip.get_wave_display(&mut display, 0.0, 10.0).unwrap();
    assert!(display.max()[0] < 0.1);

    let before = clip.dirty();
    clip.set_samples(0, &[0.9; 100]).unwrap();
    assert!(clip.dirty() > before);

    clip.get_wave_display(&mut display, 0.0, 10.0).unwrap();
    assert_eq!(display.max()[0], 0.9);
}

#[test]
fn test_rejected_write_keeps_generation() {
    let mut clip = ramp_clip(100);
    let before = clip.dirty();
    assert!(clip.set_samples(90, &[0.5; 20]).is_err());
    assert_eq!(clip.dirty(), before);
    assert_eq!(contents(&clip), contents(&ramp_clip(100)));
}

#[test]
fn test_convert_format_marks_changed_once() {
    let mut clip = ramp_clip(1000);
    clip.append(&SampleBuffer::from_f32(SampleFormat::Float, &[0.5; 10]))
        .unwrap();

    let before = clip.dirty();
    clip.convert_to_sample_format(SampleFormat::Int16).unwrap();
    assert_eq!(clip.sequence().sample_format(), SampleFormat::Int16);
    let after = clip.dirty();
    assert!(after > before);

    clip.convert_to_sample_format(SampleFormat::Int16).unwrap();
    assert_eq!(clip.dirty(), after);

    clip.flush().unwrap();
    assert_eq!(clip.appended_len(), 0);
    let mut tail = vec![0.0; 10];
    clip.get_samples(clip.num_samples() - 10, &mut tail).unwrap();
    assert!(tail.iter().all(|&v| (v - 0.5).abs() < 1e-3));
}

#[test]
fn test_offset_moves_time_queries() {
    let mut clip = ramp_clip(1000);
    clip.offset_by(2.0);
    assert_eq!(clip.start_time(), 2.0);
    assert_eq!(clip.end_time(), 3.0);
    assert!(clip.before_clip(1.5));
    assert!(clip.within_clip(2.5));
    assert!(clip.after_clip(3.5));

    let (min, max) = clip.get_min_max(2.0, 2.5).unwrap();
    assert_eq!(min, 0.0);
    assert!(max < 0.5);
}

#[test]
fn test_clone_copies_content_and_cut_lines() {
    let mut clip = ramp_clip(1000);
    clip.set_offset(0.5);
    clip.clear_and_add_cut_line(0.7, 0.8).unwrap();

    let copy = clip.clone();
    assert_ne!(copy.id(), clip.id());
    assert_eq!(copy.offset(), 0.5);
    assert_eq!(copy.num_samples(), clip.num_samples());
    assert_eq!(copy.cut_lines().len(), 1);
    assert_eq!(contents(&copy), contents(&clip));
}

fn assert_send_sync<T: Send + Sync>() {}

#[test]
fn test_shared_types_are_thread_safe() {
    assert_send_sync::<InvalidationHandle>();
    assert_send_sync::<Clip<MemorySequence>>();
    assert_send_sync::<WaveDisplay>();
}
