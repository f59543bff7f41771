use super::*;

use crate::foundation::core::{Rgba8Premul, Size};
use crate::scene::model::Scene;
use crate::sequence::engine::SequenceSettings;
use crate::transport::clock::TransportConfig;

fn sequence_with_scene(duration_ms: f64) -> Sequence {
    let settings = SequenceSettings {
        canvas: Size::new(2, 2),
        clear_rgba: Rgba8Premul::TRANSPARENT,
        seed: 0,
    };
    let mut seq = Sequence::new(settings, TransportConfig::default()).unwrap();
    seq.add_scene(
        Scene::new("only", 0.0, duration_ms)
            .unwrap()
            .with_size(Size::new(2, 2)),
    );
    seq
}

#[test]
fn manual_scheduler_hands_out_increasing_handles() {
    let mut s = ManualScheduler::default();
    assert_eq!(s.schedule(), FrameHandle(1));
    assert_eq!(s.schedule(), FrameHandle(2));
}

#[test]
fn runner_rejects_bad_fps() {
    for fps in [0.0, -30.0, f64::NAN, f64::INFINITY] {
        assert!(FixedStepRunner::new(fps).is_err());
    }
    let r = FixedStepRunner::new(50.0).unwrap();
    assert_eq!(r.frame_interval_ms(), 20.0);
    assert_eq!(r.fps(), 50.0);
}

#[test]
fn runs_until_the_timeline_is_exhausted() {
    let mut seq = sequence_with_scene(100.0);
    let mut seen = Vec::new();
    let stats = FixedStepRunner::new(100.0)
        .unwrap()
        .run(&mut seq, |i, s| {
            seen.push((i, s.current_time_ms()));
            Ok(())
        })
        .unwrap();

    // 0, 10, ..., 90 render; 100 finds nothing left.
    assert_eq!(stats, RunStats { frames: 11, rendered: 10 });
    assert_eq!(seen.first(), Some(&(0, 0.0)));
    assert_eq!(seen.last(), Some(&(9, 90.0)));
    assert!(!seq.is_playing());
    assert_eq!(seq.pending_frame(), None);
}

#[test]
fn max_frames_caps_the_run() {
    let mut seq = sequence_with_scene(10_000.0);
    let stats = FixedStepRunner::new(60.0)
        .unwrap()
        .with_max_frames(5)
        .run(&mut seq, |_, _| Ok(()))
        .unwrap();
    assert_eq!(stats.frames, 5);
    assert!(seq.is_playing());
}

#[test]
fn callback_can_pause_and_errors_abort() {
    let mut seq = sequence_with_scene(10_000.0);
    let stats = FixedStepRunner::new(60.0)
        .unwrap()
        .run(&mut seq, |i, s| {
            if i == 2 {
                s.pause();
            }
            Ok(())
        })
        .unwrap();
    assert_eq!(stats.rendered, 3);

    let mut seq = sequence_with_scene(10_000.0);
    let res = FixedStepRunner::new(60.0)
        .unwrap()
        .run(&mut seq, |_, _| Err(BeatlineError::render("disk full")));
    assert!(res.is_err());
}
