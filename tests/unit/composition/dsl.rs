use std::{cell::Cell, rc::Rc};

use super::*;

#[test]
fn builder_requires_name_and_duration() {
    assert!(SceneBuilder::new("  ").duration_ms(10.0).build().is_err());
    assert!(SceneBuilder::new("intro").build().is_err());
    assert!(SceneBuilder::new("intro").duration_ms(-1.0).build().is_err());
}

#[test]
fn musical_durations_use_transport() {
    let t = TransportConfig {
        bpm: 120.0,
        ..TransportConfig::default()
    };
    let beats = SceneBuilder::new("a").duration_beats(8.0, &t).build().unwrap();
    assert_eq!(beats.duration_ms(), 4000.0);
    let bars = SceneBuilder::new("b").duration_bars(2.0, &t).build().unwrap();
    assert_eq!(bars.duration_ms(), 4000.0);
}

#[test]
fn after_chains_scenes_back_to_back() {
    let a = SceneBuilder::new("a")
        .start_ms(1000.0)
        .duration_ms(500.0)
        .build()
        .unwrap();
    let b = SceneBuilder::new("b").after(&a).duration_ms(250.0).build().unwrap();
    assert_eq!(b.start_ms(), 1500.0);
    assert_eq!(b.end_ms(), 1750.0);
}

#[test]
fn builder_applies_size_entities_and_hooks() {
    let entered = Rc::new(Cell::new(false));
    let e = entered.clone();
    let mut scene = SceneBuilder::new("a")
        .duration_ms(1000.0)
        .size(Size::new(8, 8))
        .entity(Entity::new("one"))
        .entity(Entity::new("two").with_size(Size::new(1, 1)))
        .on_enter(move |_, _| {
            e.set(true);
            Ok(())
        })
        .on_exit(|_| Ok(()))
        .build()
        .unwrap();

    assert_eq!(scene.size(), Size::new(8, 8));
    assert_eq!(scene.get_entity("one").map(Entity::size), Some(Size::new(8, 8)));
    assert_eq!(scene.get_entity("two").map(Entity::size), Some(Size::new(1, 1)));
    scene.enter(0.0);
    assert!(entered.get());
}

#[test]
fn out_transition_at_end_tracks_final_duration() {
    let scene = SceneBuilder::new("a")
        .transition_out_at_end(200.0, Ease::Linear, |_, _, _| Ok(()))
        .transition_in(0.0, 100.0, Ease::Linear, |_, _, _| Ok(()))
        .duration_ms(1000.0)
        .build()
        .unwrap();
    assert_eq!(scene.transition_count(), (1, 1));

    let too_long = SceneBuilder::new("b")
        .duration_ms(100.0)
        .transition_out_at_end(200.0, Ease::Linear, |_, _, _| Ok(()))
        .build();
    assert!(too_long.is_err());
}

#[test]
fn registry_creates_by_name() {
    let mut r = EntityRegistry::new();
    r.register("blank", |key, props| Ok(Entity::new(key).with_props(props.clone())));
    assert!(r.contains("blank"));
    assert_eq!(r.names().collect::<Vec<_>>(), vec!["blank"]);

    let e = r.create("blank", "k", &serde_json::json!({ "a": 1 })).unwrap();
    assert_eq!(e.key(), "k");
    assert_eq!(e.props()["a"], 1);

    let err = r.create("missing", "k", &Value::Null).unwrap_err();
    assert!(matches!(err, BeatlineError::Lookup(_)));
}

#[test]
fn builtins_are_registered() {
    let r = EntityRegistry::with_builtins();
    for name in ["solid", "beat_flash", "spectrum_bars", "noise"] {
        assert!(r.contains(name), "{name}");
    }
}

#[test]
fn entity_builder_needs_a_target_scene() {
    let r = EntityRegistry::with_builtins();
    let mut b = EntityBuilder::new(&r);
    let err = b
        .add_entity_by_name("solid", "bg", Value::Null)
        .unwrap_err();
    assert!(matches!(err, BeatlineError::Lookup(_)));
}

#[test]
fn entity_builder_appends_to_scene() {
    let r = EntityRegistry::with_builtins();
    let mut scene = SceneBuilder::new("a")
        .duration_ms(1000.0)
        .size(Size::new(4, 4))
        .build()
        .unwrap();
    {
        let mut b = EntityBuilder::new(&r).target(&mut scene);
        let e = b
            .add_entity_by_name("solid", "bg", serde_json::json!({ "color": "#00ff00" }))
            .unwrap();
        assert_eq!(e.size(), Size::new(4, 4));
        assert!(matches!(
            b.add_entity_by_name("hologram", "x", Value::Null),
            Err(BeatlineError::Lookup(_))
        ));
    }
    assert_eq!(scene.entities().len(), 1);
    assert_eq!(scene.entities()[0].key(), "bg");
}
