use crate::{
    foundation::error::{BeatlineError, BeatlineResult},
    transport::listeners::Listeners,
};

/// Tempo and meter of a sequence.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Tempo in beats per minute.
    pub bpm: f64,
    /// Ticks subdividing each beat.
    pub ticks_per_beat: u32,
    /// Beats per bar.
    pub beats_per_bar: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            bpm: 120.0,
            ticks_per_beat: 4,
            beats_per_bar: 4,
        }
    }
}

impl TransportConfig {
    /// Fails unless bpm is finite and positive and both counts are non-zero.
    pub fn validate(&self) -> BeatlineResult<()> {
        if !self.bpm.is_finite() || self.bpm <= 0.0 {
            return Err(BeatlineError::validation(format!(
                "bpm must be finite and > 0 (got {})",
                self.bpm
            )));
        }
        if self.ticks_per_beat == 0 {
            return Err(BeatlineError::validation("ticks_per_beat must be > 0"));
        }
        if self.beats_per_bar == 0 {
            return Err(BeatlineError::validation("beats_per_bar must be > 0"));
        }
        Ok(())
    }

    /// Milliseconds per beat.
    pub fn beat_interval_ms(&self) -> f64 {
        60_000.0 / self.bpm
    }

    /// Milliseconds per tick.
    pub fn tick_interval_ms(&self) -> f64 {
        self.beat_interval_ms() / f64::from(self.ticks_per_beat)
    }

    /// Length of `beats` in milliseconds.
    pub fn beats_to_ms(&self, beats: f64) -> f64 {
        beats * self.beat_interval_ms()
    }

    /// Length of `bars` in milliseconds.
    pub fn bars_to_ms(&self, bars: f64) -> f64 {
        self.beats_to_ms(bars * f64::from(self.beats_per_bar))
    }
}

/// Snapshot of the musical clock handed to listeners and effects.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct MusicalPosition {
    /// Completed bars since play.
    pub bar: u64,
    /// Beat within the bar, `1..=beats_per_bar`.
    pub beat: u32,
    /// Ticks fired within the current beat.
    pub tick: u32,
    /// Beats since play; never reset at bar lines.
    pub beat_counter: u64,
    /// Ticks since play; never reset at beats.
    pub tick_counter: u64,
}

/// Which discrete events one [`Transport::advance`] call produced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TransportEvents {
    /// A bar boundary was crossed.
    pub bar: bool,
    /// A beat fired.
    pub beat: bool,
    /// A tick fired.
    pub tick: bool,
}

impl TransportEvents {
    /// Whether anything fired.
    pub fn any(self) -> bool {
        self.bar || self.beat || self.tick
    }
}

/// Maps animation timestamps to bars, beats and ticks by polling.
///
/// Each [`advance`](Self::advance) call fires at most one beat and at most one
/// tick. When frames arrive slower than beats, beats are delayed rather than
/// caught up, and the beat phase re-anchors on the frame timestamp that fired it.
#[derive(Debug)]
pub struct Transport {
    config: TransportConfig,
    current_tick: u32,
    current_beat: u32,
    current_bar: u64,
    tick_counter: u64,
    beat_counter: u64,
    last_beat_ms: f64,
    bar_listeners: Listeners<MusicalPosition>,
    beat_listeners: Listeners<MusicalPosition>,
    tick_listeners: Listeners<MusicalPosition>,
}

impl Transport {
    /// Transport at the first downbeat. Fails on an invalid config.
    pub fn new(config: TransportConfig) -> BeatlineResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            current_tick: 0,
            current_beat: 1,
            current_bar: 0,
            tick_counter: 0,
            beat_counter: 0,
            last_beat_ms: 0.0,
            bar_listeners: Listeners::new(),
            beat_listeners: Listeners::new(),
            tick_listeners: Listeners::new(),
        })
    }

    /// Tempo and meter.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Back to the downbeat of the first bar. Listeners are kept.
    pub fn reset(&mut self) {
        self.current_tick = 0;
        self.current_beat = 1;
        self.current_bar = 0;
        self.tick_counter = 0;
        self.beat_counter = 0;
        self.last_beat_ms = 0.0;
    }

    /// Derive musical events for a new frame at `timestamp_ms` and dispatch
    /// bar, beat, then tick listeners for whatever fired.
    pub fn advance(&mut self, timestamp_ms: f64) -> TransportEvents {
        let beat_interval = self.config.beat_interval_ms();
        let tick_interval = self.config.tick_interval_ms();
        let mut events = TransportEvents::default();

        if timestamp_ms - self.last_beat_ms >= beat_interval {
            self.last_beat_ms = timestamp_ms;
            self.beat_counter += 1;
            self.current_beat += 1;
            self.current_tick = 0;
            events.beat = true;

            if self.current_beat > self.config.beats_per_bar {
                self.current_bar += 1;
                self.current_beat = 1;
                events.bar = true;
            }
        }

        // Checked against the (possibly just re-anchored) beat time.
        if timestamp_ms - self.last_beat_ms >= f64::from(self.current_tick) * tick_interval {
            self.current_tick += 1;
            self.tick_counter += 1;
            events.tick = true;
        }

        let pos = self.position();
        if events.bar {
            self.bar_listeners.dispatch(&pos, "bar");
        }
        if events.beat {
            self.beat_listeners.dispatch(&pos, "beat");
        }
        if events.tick {
            self.tick_listeners.dispatch(&pos, "tick");
        }
        events
    }

    /// Place the clock at `timestamp_ms` on the ideal beat grid without firing
    /// listeners. Counters match what uninterrupted polling at a frame rate
    /// faster than the tick rate would have produced.
    pub fn seek(&mut self, timestamp_ms: f64) {
        let t = timestamp_ms.max(0.0);
        let beat_interval = self.config.beat_interval_ms();
        let tick_interval = self.config.tick_interval_ms();
        let bpb = u64::from(self.config.beats_per_bar);
        let tpb = self.config.ticks_per_beat;

        let beats = (t / beat_interval).floor() as u64;
        self.last_beat_ms = beats as f64 * beat_interval;
        self.beat_counter = beats;
        self.current_bar = beats / bpb;
        self.current_beat = (beats % bpb) as u32 + 1;

        let phase = t - self.last_beat_ms;
        let fired = ((phase / tick_interval).floor() as u64 + 1).min(u64::from(tpb));
        self.current_tick = fired as u32;
        self.tick_counter = beats * u64::from(tpb) + fired;
    }

    /// Snapshot of the clock.
    pub fn position(&self) -> MusicalPosition {
        MusicalPosition {
            bar: self.current_bar,
            beat: self.current_beat,
            tick: self.current_tick,
            beat_counter: self.beat_counter,
            tick_counter: self.tick_counter,
        }
    }

    /// Tick within the beat.
    pub fn current_tick(&self) -> u32 {
        self.current_tick
    }

    /// Beat within the bar, `1..=beats_per_bar`.
    pub fn current_beat(&self) -> u32 {
        self.current_beat
    }

    /// Completed bars.
    pub fn current_bar(&self) -> u64 {
        self.current_bar
    }

    /// Ticks since reset.
    pub fn tick_counter(&self) -> u64 {
        self.tick_counter
    }

    /// Beats since reset.
    pub fn beat_counter(&self) -> u64 {
        self.beat_counter
    }

    /// Timestamp of the frame that fired the last beat.
    pub fn last_beat_ms(&self) -> f64 {
        self.last_beat_ms
    }

    /// Listener for bar boundaries.
    pub fn on_bar(&mut self, f: impl FnMut(&MusicalPosition) -> BeatlineResult<()> + 'static) {
        self.bar_listeners.push(f);
    }

    /// Listener for beats.
    pub fn on_beat(&mut self, f: impl FnMut(&MusicalPosition) -> BeatlineResult<()> + 'static) {
        self.beat_listeners.push(f);
    }

    /// Listener for ticks.
    pub fn on_tick(&mut self, f: impl FnMut(&MusicalPosition) -> BeatlineResult<()> + 'static) {
        self.tick_listeners.push(f);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/transport/clock.rs"]
mod tests;
