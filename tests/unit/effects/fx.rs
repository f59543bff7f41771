use super::*;

use crate::foundation::core::{Rgba8Premul, Size};
use crate::transport::clock::{MusicalPosition, TransportConfig};

fn view(time_ms: f64, seed: u64) -> SequenceView<'static> {
    SequenceView {
        time_ms,
        position: MusicalPosition::default(),
        last_beat_ms: 0.0,
        transport: TransportConfig::default(),
        fft_data: None,
        scene: None,
        duration_ms: 0.0,
        seed,
    }
}

fn inst(kind: &str, params: serde_json::Value) -> EffectInstance {
    EffectInstance {
        kind: kind.to_string(),
        params,
    }
}

fn checker(size: u32) -> Surface {
    let mut s = Surface::new(Size::new(size, size));
    for y in 0..size {
        for x in 0..size {
            if (x + y) % 2 == 0 {
                s.put_pixel(x, y, Rgba8Premul::from_straight_rgba(255, 255, 255, 255));
            }
        }
    }
    s
}

#[test]
fn parse_known_kinds_and_aliases() {
    assert_eq!(
        parse_post_effect(&inst("Invert", serde_json::Value::Null)).unwrap(),
        PostEffect::Invert
    );
    assert_eq!(
        parse_post_effect(&inst("opacity-mul", serde_json::json!({ "value": 0.25 }))).unwrap(),
        PostEffect::OpacityMul { value: 0.25 }
    );
    assert_eq!(
        parse_post_effect(&inst("shake", serde_json::json!({ "amplitude_px": 3 }))).unwrap(),
        PostEffect::Shake { amplitude_px: 3.0 }
    );
}

#[test]
fn blur_sigma_defaults_from_radius() {
    assert_eq!(
        parse_post_effect(&inst("blur", serde_json::json!({ "radius_px": 4 }))).unwrap(),
        PostEffect::Blur {
            radius_px: 4,
            sigma: 2.0
        }
    );
    assert_eq!(
        parse_post_effect(&inst("blur", serde_json::json!({ "radius_px": 0 }))).unwrap(),
        PostEffect::Blur {
            radius_px: 0,
            sigma: 0.5
        }
    );
}

#[test]
fn parse_rejects_invalid_params() {
    let bad = [
        inst("", serde_json::Value::Null),
        inst("sparkle", serde_json::Value::Null),
        inst("opacity_mul", serde_json::json!({})),
        inst("opacity_mul", serde_json::json!({ "value": -1.0 })),
        inst("blur", serde_json::json!({ "radius_px": MAX_BLUR_RADIUS_PX + 1 })),
        inst("blur", serde_json::json!({ "radius_px": 2, "sigma": 0.0 })),
        inst("blur", serde_json::json!({ "radius_px": 1.5 })),
        inst("shake", serde_json::json!({ "amplitude_px": -2.0 })),
    ];
    for i in bad {
        assert!(parse_post_effect(&i).is_err(), "{i:?} must be rejected");
    }
}

#[test]
fn invert_respects_premultiplied_alpha() {
    let mut s = Surface::new(Size::new(1, 1));
    s.put_pixel(
        0,
        0,
        Rgba8Premul {
            r: 100,
            g: 50,
            b: 0,
            a: 200,
        },
    );
    PostEffect::Invert.apply(&mut s, &view(0.0, 0)).unwrap();
    assert_eq!(
        s.pixel(0, 0),
        Some(Rgba8Premul {
            r: 100,
            g: 150,
            b: 200,
            a: 200
        })
    );
}

#[test]
fn opacity_mul_scales_all_channels() {
    let mut s = Surface::new(Size::new(1, 1));
    s.fill(Rgba8Premul {
        r: 200,
        g: 200,
        b: 200,
        a: 200,
    });
    PostEffect::OpacityMul { value: 0.5 }
        .apply(&mut s, &view(0.0, 0))
        .unwrap();
    assert_eq!(s.data(), &[100, 100, 100, 100]);
}

#[test]
fn blur_keeps_flat_regions() {
    let mut s = Surface::new(Size::new(5, 5));
    s.fill(Rgba8Premul::from_straight_rgba(10, 20, 30, 255));
    let before = s.clone();
    PostEffect::Blur {
        radius_px: 2,
        sigma: 1.0,
    }
    .apply(&mut s, &view(0.0, 0))
    .unwrap();
    assert_eq!(s, before);
}

#[test]
fn shake_is_deterministic_per_frame() {
    let fx = PostEffect::Shake { amplitude_px: 3.0 };

    let mut a = checker(16);
    let mut b = checker(16);
    fx.apply(&mut a, &view(120.0, 9)).unwrap();
    fx.apply(&mut b, &view(120.0, 9)).unwrap();
    assert_eq!(a, b);
}

#[test]
fn zero_amplitude_shake_is_noop() {
    let mut s = checker(4);
    let before = s.clone();
    PostEffect::Shake { amplitude_px: 0.0 }
        .apply(&mut s, &view(0.0, 1))
        .unwrap();
    assert_eq!(s, before);
}

#[test]
fn post_processor_wraps_apply() {
    let mut p = PostEffect::Invert.into_post_processor();
    let mut s = Surface::new(Size::new(1, 1));
    s.fill(Rgba8Premul::BLACK);
    p(&mut s, &view(0.0, 0)).unwrap();
    assert_eq!(s.pixel(0, 0), Some(Rgba8Premul::from_straight_rgba(255, 255, 255, 255)));
}
