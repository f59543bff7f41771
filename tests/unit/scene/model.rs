use std::{cell::RefCell, rc::Rc};

use super::*;

use crate::foundation::core::Rgba8Premul;

#[test]
fn scene_window_is_half_open() {
    let s = Scene::new("intro", 5000.0, 15_000.0).unwrap();
    assert!(!s.contains(4999.0));
    assert!(s.contains(5000.0));
    assert!(s.contains(19_999.0));
    assert!(!s.contains(20_000.0));
    assert_eq!(s.end_ms(), 20_000.0);
}

#[test]
fn rejects_negative_window() {
    assert!(Scene::new("bad", -1.0, 10.0).is_err());
    assert!(Scene::new("bad", 0.0, -10.0).is_err());
    let mut s = Scene::new("ok", 0.0, 10.0).unwrap();
    assert!(s.set_duration_ms(f64::NAN).is_err());
    assert_eq!(s.duration_ms(), 10.0);
}

#[test]
fn remaining_time_is_clamped() {
    let s = Scene::new("a", 1000.0, 2000.0).unwrap();
    assert_eq!(s.info().remaining_ms(1500.0), 1500.0);
    assert_eq!(s.info().remaining_ms(9000.0), 0.0);
}

#[test]
fn entities_inherit_scene_size_and_first_key_wins() {
    let mut s = Scene::new("a", 0.0, 100.0)
        .unwrap()
        .with_size(Size::new(16, 9));
    s.add_entity(Entity::new("dup").with_props(serde_json::json!(1)));
    s.add_entity(Entity::new("dup").with_props(serde_json::json!(2)));
    s.add_entity(Entity::new("small").with_size(Size::new(2, 2)));

    assert_eq!(s.entities().len(), 3);
    assert_eq!(s.get_entity("dup").map(|e| e.props().clone()), Some(serde_json::json!(1)));
    assert_eq!(s.get_entity("dup").map(Entity::size), Some(Size::new(16, 9)));
    assert_eq!(s.get_entity("small").map(Entity::size), Some(Size::new(2, 2)));
    assert!(s.get_entity("missing").is_none());

    s.set_size(Size::new(4, 4));
    assert_eq!(s.get_entity("dup").map(Entity::size), Some(Size::new(4, 4)));
    assert_eq!(s.get_entity("small").map(Entity::size), Some(Size::new(2, 2)));
}

#[test]
fn transition_progress_is_inclusive_and_eased() {
    let noop: TransitionFn = Box::new(|_: &mut Surface, _: &SceneInfo, _: f64| Ok(()));
    let t = Transition::new(1000.0, 500.0, Ease::InQuad, noop).unwrap();
    assert_eq!(t.progress_at(999.0), None);
    assert_eq!(t.progress_at(1000.0), Some(0.0));
    assert_eq!(t.progress_at(1250.0), Some(0.25));
    assert_eq!(t.progress_at(1500.0), Some(1.0));
    assert_eq!(t.progress_at(1501.0), None);
}

#[test]
fn out_transition_at_end_must_fit() {
    let mut s = Scene::new("a", 0.0, 1000.0).unwrap();
    assert!(
        s.transition_out_at_end(2000.0, Ease::Linear, |_, _, _| Ok(()))
            .is_err()
    );
    s.transition_out_at_end(250.0, Ease::Linear, |_, _, _| Ok(()))
        .unwrap();
    assert_eq!(s.transition_count(), (0, 1));
}

#[test]
fn apply_transitions_runs_in_then_out_within_window() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut s = Scene::new("a", 0.0, 1000.0).unwrap();
    let (a, b) = (log.clone(), log.clone());
    s.transition_out(0.0, 1000.0, Ease::Linear, move |_, _, p| {
        b.borrow_mut().push(("out", p));
        Ok(())
    })
    .unwrap();
    s.transition_in(0.0, 200.0, Ease::Linear, move |_, info, p| {
        assert_eq!(info.name(), "a");
        a.borrow_mut().push(("in", p));
        Ok(())
    })
    .unwrap();

    let mut target = Surface::new(Size::new(1, 1));
    assert_eq!(s.apply_transitions(&mut target, 100.0), 2);
    assert_eq!(*log.borrow(), vec![("in", 0.5), ("out", 0.1)]);

    assert_eq!(s.apply_transitions(&mut target, 500.0), 1);
}

#[test]
fn failing_transition_does_not_stop_others() {
    let mut s = Scene::new("a", 0.0, 1000.0).unwrap();
    s.transition_in(0.0, 1000.0, Ease::Linear, |_, _, _| {
        Err(crate::foundation::error::BeatlineError::render("nope"))
    })
    .unwrap();
    s.transition_in(0.0, 1000.0, Ease::Linear, |t, _, _| {
        t.fill(Rgba8Premul::BLACK);
        Ok(())
    })
    .unwrap();
    let mut target = Surface::new(Size::new(1, 1));
    assert_eq!(s.apply_transitions(&mut target, 10.0), 2);
    assert_eq!(target.pixel(0, 0), Some(Rgba8Premul::BLACK));
}

#[test]
fn enter_and_exit_hooks_receive_scene_info() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let (a, b) = (log.clone(), log.clone());
    let mut s = Scene::new("verse", 2000.0, 1000.0).unwrap();
    s.on_enter(move |info, elapsed| {
        a.borrow_mut().push(format!("enter {} {elapsed}", info.name()));
        Ok(())
    });
    s.on_exit(move |info| {
        b.borrow_mut().push(format!("exit {}", info.name()));
        Ok(())
    });

    s.enter(40.0);
    s.exit();
    assert_eq!(*log.borrow(), vec!["enter verse 40", "exit verse"]);
}
