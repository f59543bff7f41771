use std::{cell::Cell, rc::Rc};

use super::*;

fn transport() -> Transport {
    Transport::new(TransportConfig::default()).unwrap()
}

/// Drive 10 ms frames over `[0, end_ms]`.
fn drive(t: &mut Transport, end_ms: u32) {
    for i in 0..=(end_ms / 10) {
        t.advance(f64::from(i) * 10.0);
    }
}

#[test]
fn rejects_non_positive_bpm() {
    for bpm in [0.0, -120.0, f64::NAN, f64::INFINITY] {
        let cfg = TransportConfig {
            bpm,
            ..TransportConfig::default()
        };
        assert!(Transport::new(cfg).is_err(), "bpm {bpm} must be rejected");
    }
}

#[test]
fn rejects_zero_subdivisions() {
    let cfg = TransportConfig {
        ticks_per_beat: 0,
        ..TransportConfig::default()
    };
    assert!(cfg.validate().is_err());
    let cfg = TransportConfig {
        beats_per_bar: 0,
        ..TransportConfig::default()
    };
    assert!(cfg.validate().is_err());
}

#[test]
fn intervals_follow_bpm() {
    let cfg = TransportConfig::default();
    assert_eq!(cfg.beat_interval_ms(), 500.0);
    assert_eq!(cfg.tick_interval_ms(), 125.0);
    assert_eq!(cfg.bars_to_ms(2.0), 4000.0);
}

#[test]
fn four_beats_complete_one_bar_and_beat_resets_to_one() {
    let mut t = transport();
    let bars = Rc::new(Cell::new(0));
    let b = bars.clone();
    t.on_bar(move |_| {
        b.set(b.get() + 1);
        Ok(())
    });

    drive(&mut t, 2000);

    assert_eq!(t.beat_counter(), 4);
    assert_eq!(bars.get(), 1);
    assert_eq!(t.current_bar(), 1);
    assert_eq!(t.current_beat(), 1);
}

#[test]
fn beat_counter_survives_bar_resets() {
    let mut t = transport();
    let beats = Rc::new(Cell::new(0u64));
    let b = beats.clone();
    t.on_beat(move |_| {
        b.set(b.get() + 1);
        Ok(())
    });

    drive(&mut t, 5000);

    assert_eq!(beats.get(), 10);
    assert_eq!(t.beat_counter(), 10);
    assert_eq!(t.current_bar(), 2);
    assert_eq!(t.current_beat(), 3);
}

#[test]
fn ticks_reset_at_each_beat_and_counter_never_resets() {
    let mut t = transport();
    let mut last_tick = 0;
    let mut last_counter = 0;
    for i in 0..=500u32 {
        let ev = t.advance(f64::from(i) * 10.0);
        if ev.beat {
            assert!(ev.tick, "the beat frame also fires tick 0 of the new beat");
            assert_eq!(t.current_tick(), 1);
        } else {
            assert!(t.current_tick() >= last_tick);
        }
        assert!(t.current_tick() <= 4);
        assert!(t.tick_counter() >= last_counter);
        last_tick = t.current_tick();
        last_counter = t.tick_counter();
    }
    assert_eq!(t.tick_counter(), 41);
}

#[test]
fn slow_frames_fire_at_most_one_beat_per_call() {
    let mut t = transport();
    t.advance(0.0);
    let ev = t.advance(1200.0);
    assert!(ev.beat);
    assert_eq!(t.beat_counter(), 1);
    assert_eq!(t.last_beat_ms(), 1200.0);

    t.advance(2400.0);
    assert_eq!(t.beat_counter(), 2);
}

#[test]
fn bar_fires_before_beat_before_tick() {
    let mut t = transport();
    let order = Rc::new(std::cell::RefCell::new(Vec::new()));
    for (name, which) in [("bar", 0), ("beat", 1), ("tick", 2)] {
        let o = order.clone();
        let f = move |_: &MusicalPosition| {
            o.borrow_mut().push(name);
            Ok(())
        };
        match which {
            0 => t.on_bar(f),
            1 => t.on_beat(f),
            _ => t.on_tick(f),
        }
    }
    drive(&mut t, 1990);
    order.borrow_mut().clear();

    t.advance(2000.0);
    assert_eq!(*order.borrow(), vec!["bar", "beat", "tick"]);
}

#[test]
fn seek_matches_polled_counters() {
    let mut polled = transport();
    drive(&mut polled, 5000);

    let mut sought = transport();
    sought.seek(5000.0);

    assert_eq!(sought.position(), polled.position());
}

#[test]
fn seek_does_not_fire_listeners_and_reset_restores_downbeat() {
    let mut t = transport();
    let hits = Rc::new(Cell::new(0));
    let h = hits.clone();
    t.on_beat(move |_| {
        h.set(h.get() + 1);
        Ok(())
    });

    t.seek(9_750.0);
    assert_eq!(hits.get(), 0);
    assert_eq!(t.beat_counter(), 19);

    t.reset();
    assert_eq!(t.position(), MusicalPosition {
        bar: 0,
        beat: 1,
        tick: 0,
        beat_counter: 0,
        tick_counter: 0,
    });
}
