use std::{cell::RefCell, rc::Rc};

use super::*;

use crate::foundation::core::{Rgba8Premul, TimeRange};
use crate::foundation::error::BeatlineError;
use crate::scene::model::SceneInfo;
use crate::transport::clock::TransportConfig;

const RED: Rgba8Premul = Rgba8Premul {
    r: 255,
    g: 0,
    b: 0,
    a: 255,
};

fn info(start_ms: f64) -> SceneInfo {
    SceneInfo {
        name: "main".to_string(),
        range: TimeRange::new(start_ms, 10_000.0).unwrap(),
    }
}

fn view(time_ms: f64, scene: &SceneInfo) -> SequenceView<'_> {
    SequenceView {
        time_ms,
        position: MusicalPosition::default(),
        last_beat_ms: 0.0,
        transport: TransportConfig::default(),
        fft_data: None,
        scene: Some(scene),
        duration_ms: scene.end_ms(),
        seed: 0,
    }
}

fn red_fill() -> impl FnMut(&FrameCtx<'_>, &mut Surface, &mut Value) -> BeatlineResult<()> {
    |_: &FrameCtx<'_>, s: &mut Surface, _: &mut Value| {
        s.fill(RED);
        Ok(())
    }
}

#[test]
fn lifetime_window_is_inclusive() {
    let lt = Lifetime {
        start_offset_ms: Some(1000.0),
        duration_ms: Some(2000.0),
    };
    // Scene starts at 5000: live over [6000, 8000].
    assert!(!lt.is_active(5999.0, 5000.0));
    assert!(lt.is_active(6000.0, 5000.0));
    assert!(lt.is_active(8000.0, 5000.0));
    assert!(!lt.is_active(8001.0, 5000.0));
    assert_eq!(lt.elapsed_ms(7000.0, 5000.0), 1000.0);
}

#[test]
fn lifetime_without_bounds_is_always_active() {
    assert!(Lifetime::ALWAYS.is_active(-50.0, 5000.0));
    assert!(Lifetime::ALWAYS.is_active(1e9, 0.0));

    let open_ended = Lifetime {
        start_offset_ms: Some(500.0),
        duration_ms: None,
    };
    assert!(!open_ended.is_active(400.0, 0.0));
    assert!(open_ended.is_active(1e9, 0.0));
}

#[test]
fn update_clears_then_renders_when_active() {
    let mut e = Entity::new("flash")
        .with_size(Size::new(2, 2))
        .with_action(red_fill());
    assert!(e.update(0.0, 0.0, None).unwrap());
    assert_eq!(e.surface().pixel(1, 1), Some(RED));
}

#[test]
fn inactive_entity_is_left_untouched() {
    let calls = Rc::new(RefCell::new(0));
    let seen = calls.clone();
    let mut e = Entity::new("late")
        .with_size(Size::new(1, 1))
        .with_lifetime(Some(1000.0), Some(500.0))
        .with_action(move |_, s, _| {
            *seen.borrow_mut() += 1;
            s.fill(RED);
            Ok(())
        });

    assert!(!e.update(500.0, 0.0, None).unwrap());
    assert_eq!(*calls.borrow(), 0);

    assert!(e.update(1200.0, 0.0, None).unwrap());
    assert!(!e.update(2000.0, 0.0, None).unwrap());
    assert_eq!(*calls.borrow(), 1);
    // Last frame survives the window closing.
    assert_eq!(e.surface().pixel(0, 0), Some(RED));
}

#[test]
fn renderer_sees_entity_relative_time_and_mutable_props() {
    let mut e = Entity::new("counter")
        .with_size(Size::new(1, 1))
        .with_lifetime(Some(250.0), None)
        .with_props(serde_json::json!({ "frames": 0 }))
        .with_action(|frame, _, props| {
            assert_eq!(frame.elapsed_ms, frame.timestamp_ms - 1250.0);
            let n = props["frames"].as_u64().unwrap_or(0);
            props["frames"] = serde_json::json!(n + 1);
            Ok(())
        });
    e.update(1300.0, 1000.0, None).unwrap();
    e.update(1400.0, 1000.0, None).unwrap();
    assert_eq!(e.props()["frames"], 2);
}

#[test]
fn update_propagates_renderer_error() {
    let mut e = Entity::new("broken")
        .with_size(Size::new(1, 1))
        .with_action(|_, _, _| Err(BeatlineError::render("boom")));
    assert!(e.update(0.0, 0.0, None).is_err());
}

#[test]
fn copy_to_target_runs_post_processors_in_order() {
    let order = Rc::new(RefCell::new(Vec::new()));
    let (a, b) = (order.clone(), order.clone());
    let mut e = Entity::new("fx")
        .with_size(Size::new(1, 1))
        .with_action(red_fill())
        .with_post_processor(move |_, _| {
            a.borrow_mut().push("first");
            Ok(())
        })
        .with_post_processor(move |_, _| {
            b.borrow_mut().push("second");
            Err(BeatlineError::render("ignored"))
        });
    let scene = info(0.0);
    let v = view(10.0, &scene);
    let mut dest = Surface::new(Size::new(2, 2));

    e.update(10.0, 0.0, Some(&v)).unwrap();
    assert!(e.copy_to_target(&mut dest, &v));
    assert_eq!(*order.borrow(), vec!["first", "second"]);
    assert_eq!(dest.pixel(0, 0), Some(RED));
    assert_eq!(dest.pixel(1, 1), Some(Rgba8Premul::TRANSPARENT));
}

#[test]
fn copy_to_target_honours_position_and_lifetime() {
    let scene = info(5000.0);
    let mut e = Entity::new("dot")
        .with_size(Size::new(1, 1))
        .with_position(Vec2::new(1.0, 1.0))
        .with_lifetime(Some(1000.0), Some(2000.0))
        .with_action(red_fill());
    let mut dest = Surface::new(Size::new(2, 2));

    let early = view(5500.0, &scene);
    assert!(!e.copy_to_target(&mut dest, &early));

    let live = view(6000.0, &scene);
    e.update(6000.0, 5000.0, Some(&live)).unwrap();
    assert!(e.copy_to_target(&mut dest, &live));
    assert_eq!(dest.pixel(1, 1), Some(RED));
    assert_eq!(dest.pixel(0, 0), Some(Rgba8Premul::TRANSPARENT));
}

#[test]
fn bind_adopts_scene_size_unless_explicit() {
    let mut free = Entity::new("free");
    assert_eq!(free.size(), Size::new(0, 0));
    free.bind(Size::new(8, 4));
    assert_eq!(free.size(), Size::new(8, 4));

    let mut fixed = Entity::new("fixed").with_size(Size::new(2, 2));
    fixed.bind(Size::new(8, 4));
    assert_eq!(fixed.size(), Size::new(2, 2));
    assert_eq!(fixed.explicit_size(), Some(Size::new(2, 2)));
}

#[test]
fn transport_dispatch_fires_bar_then_beat_then_tick() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut e = Entity::new("listener");
    for (name, kind) in [("bar", 0), ("beat", 1), ("tick", 2)] {
        let log = log.clone();
        let push = move |_: &MusicalPosition| {
            log.borrow_mut().push(name);
            Ok(())
        };
        match kind {
            0 => e.on_bar(push),
            1 => e.on_beat(push),
            _ => e.on_tick(push),
        }
    }

    let all = TransportEvents {
        bar: true,
        beat: true,
        tick: true,
    };
    e.dispatch_transport(all, &MusicalPosition::default());
    assert_eq!(*log.borrow(), vec!["bar", "beat", "tick"]);

    let tick_only = TransportEvents {
        tick: true,
        ..TransportEvents::default()
    };
    e.dispatch_transport(tick_only, &MusicalPosition::default());
    assert_eq!(log.borrow().len(), 4);
}

#[test]
fn opacity_above_one_is_clamped() {
    let scene = info(0.0);
    let v = view(0.0, &scene);
    let mut e = Entity::new("x")
        .with_size(Size::new(1, 1))
        .with_opacity(3.0)
        .with_action(red_fill());
    let mut dest = Surface::new(Size::new(1, 1));
    e.update(0.0, 0.0, Some(&v)).unwrap();
    e.copy_to_target(&mut dest, &v);
    assert_eq!(dest.pixel(0, 0), Some(RED));
}

#[test]
fn new_entity_is_inert() {
    let e = Entity::new("x");
    assert!(!e.has_renderer());
    assert_eq!(e.post_processor_count(), 0);
    assert_eq!(e.lifetime(), Lifetime::ALWAYS);
    assert!(e.props().is_null());
}
