use super::*;

use crate::foundation::core::Size;
use crate::render::surface::Surface;
use crate::sequence::view::SequenceView;
use crate::transport::clock::{MusicalPosition, TransportConfig};

const WHITE: Rgba8Premul = Rgba8Premul {
    r: 255,
    g: 255,
    b: 255,
    a: 255,
};

fn view(time_ms: f64, seed: u64, fft: Option<&[u8]>) -> SequenceView<'_> {
    SequenceView {
        time_ms,
        position: MusicalPosition::default(),
        last_beat_ms: 0.0,
        transport: TransportConfig::default(),
        fft_data: fft,
        scene: None,
        duration_ms: 0.0,
        seed,
    }
}

fn beat_view(time_ms: f64, last_beat_ms: f64) -> SequenceView<'static> {
    SequenceView {
        last_beat_ms,
        ..view(time_ms, 0, None)
    }
}

fn make(kind: &str, props: Value, size: u32) -> Entity {
    EntityRegistry::with_builtins()
        .create(kind, kind, &props)
        .unwrap()
        .with_size(Size::new(size, size))
}

fn render(e: &mut Entity, v: &SequenceView<'_>) -> Surface {
    e.update(v.time_ms, 0.0, Some(v)).unwrap();
    e.surface().clone()
}

#[test]
fn factories_reject_bad_props() {
    let r = EntityRegistry::with_builtins();
    let bad = [
        ("solid", serde_json::json!({ "color": 5 })),
        ("solid", serde_json::json!({ "color": "#12" })),
        ("beat_flash", serde_json::json!({ "decay_ms": 0 })),
        ("spectrum_bars", serde_json::json!({ "bars": 0 })),
        ("noise", serde_json::json!({ "density": 2.0 })),
    ];
    for (kind, props) in bad {
        assert!(r.create(kind, "x", &props).is_err(), "{kind} {props}");
    }
}

#[test]
fn solid_fills_with_color() {
    let mut e = make("solid", serde_json::json!({ "color": "#ff0000" }), 2);
    let s = render(&mut e, &view(0.0, 0, None));
    assert_eq!(s.pixel(1, 1), Some(Rgba8Premul::from_straight_rgba(255, 0, 0, 255)));
}

#[test]
fn solid_reads_props_every_frame() {
    let mut e = make("solid", Value::Null, 1);
    assert_eq!(render(&mut e, &view(0.0, 0, None)).pixel(0, 0), Some(WHITE));
    e.props_mut()["color"] = serde_json::json!("#000000");
    assert_eq!(
        render(&mut e, &view(10.0, 0, None)).pixel(0, 0),
        Some(Rgba8Premul::BLACK)
    );
}

#[test]
fn beat_flash_decays_between_beats() {
    let mut e = make("beat_flash", serde_json::json!({ "decay_ms": 250 }), 1);
    assert_eq!(render(&mut e, &beat_view(0.0, 0.0)).pixel(0, 0), Some(WHITE));

    let mid = render(&mut e, &beat_view(125.0, 0.0)).pixel(0, 0).unwrap();
    assert!(mid.a > 0 && mid.a < 255, "{mid:?}");

    assert_eq!(
        render(&mut e, &beat_view(300.0, 0.0)).pixel(0, 0),
        Some(Rgba8Premul::TRANSPARENT)
    );
    assert_eq!(render(&mut e, &beat_view(500.0, 500.0)).pixel(0, 0), Some(WHITE));
}

#[test]
fn beat_flash_follows_late_beats() {
    let mut e = make("beat_flash", serde_json::json!({ "decay_ms": 100 }), 1);
    // The grid says 500 ms, but the frame that fired the beat landed at 520.
    assert_eq!(
        render(&mut e, &beat_view(520.0, 520.0)).pixel(0, 0),
        Some(WHITE)
    );
    // Still lit 100 ms after the grid beat because the fade started at 520.
    let tail = render(&mut e, &beat_view(600.0, 520.0)).pixel(0, 0).unwrap();
    assert!(tail.a > 0, "{tail:?}");
    // No beat fired yet: before the transport's beat the flash stays dark.
    assert_eq!(
        render(&mut e, &beat_view(400.0, 0.0)).pixel(0, 0),
        Some(Rgba8Premul::TRANSPARENT)
    );
}

#[test]
fn beat_flash_needs_a_sequence() {
    let mut e = make("beat_flash", Value::Null, 1);
    e.update(0.0, 0.0, None).unwrap();
    assert_eq!(e.surface().pixel(0, 0), Some(Rgba8Premul::TRANSPARENT));
}

#[test]
fn spectrum_bars_draw_from_fft() {
    let mut e = make("spectrum_bars", serde_json::json!({ "bars": 2 }), 4);

    let silent = render(&mut e, &view(0.0, 0, None));
    assert!(silent.data().iter().all(|&b| b == 0));

    let fft = [255u8, 255, 0, 0];
    let s = render(&mut e, &view(10.0, 0, Some(&fft)));
    assert_eq!(s.pixel(0, 0), Some(WHITE));
    assert_eq!(s.pixel(0, 3), Some(WHITE));
    assert_eq!(s.pixel(2, 3), Some(Rgba8Premul::TRANSPARENT));
}

#[test]
fn noise_is_seeded_not_global() {
    let props = serde_json::json!({ "density": 0.2 });
    let mut a = make("noise", props.clone(), 16);
    let mut b = make("noise", props.clone(), 16);

    let first = render(&mut a, &view(40.0, 3, None));
    assert_eq!(first, render(&mut b, &view(40.0, 3, None)));
    assert!(first.data().iter().any(|&v| v != 0));

    let other_seed = render(&mut b, &view(40.0, 4, None));
    assert_ne!(first, other_seed);

    let mut none = make("noise", serde_json::json!({ "density": 0.0 }), 8);
    assert!(render(&mut none, &view(0.0, 0, None)).data().iter().all(|&v| v == 0));
}
