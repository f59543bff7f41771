use crate::{
    foundation::math::{SplitMix64, frame_seed},
    scene::model::SceneInfo,
    transport::clock::{MusicalPosition, TransportConfig},
};

/// Read-only snapshot of the sequence for the frame being rendered.
///
/// Effects receive this instead of the sequence itself, which is mutably
/// borrowed while it drives them.
#[derive(Clone, Copy, Debug)]
pub struct SequenceView<'a> {
    /// Timeline time of the frame (ms since play).
    pub time_ms: f64,
    /// Musical position as of the previous frame.
    pub position: MusicalPosition,
    /// Timeline time of the last beat the transport fired. Beats are polled,
    /// so this can trail the ideal grid.
    pub last_beat_ms: f64,
    /// Tempo and meter.
    pub transport: TransportConfig,
    /// Analyser output for this frame; `None` without audio.
    pub fft_data: Option<&'a [u8]>,
    /// Current scene, if one is selected.
    pub scene: Option<&'a SceneInfo>,
    /// Total timeline length.
    pub duration_ms: f64,
    /// Seed for per-frame random streams.
    pub seed: u64,
}

impl SequenceView<'_> {
    /// Start of the current scene, `0` without one.
    pub fn scene_start_ms(&self) -> f64 {
        self.scene.map_or(0.0, SceneInfo::start_ms)
    }

    /// Time since the transport's last beat, `>= 0`.
    pub fn beat_phase_ms(&self) -> f64 {
        (self.time_ms - self.last_beat_ms).max(0.0)
    }

    /// Time since the current scene started.
    pub fn scene_elapsed_ms(&self) -> f64 {
        self.time_ms - self.scene_start_ms()
    }

    /// `max(0, duration - elapsed)` of the current scene, `0` without one.
    pub fn scene_remaining_ms(&self) -> f64 {
        self.scene
            .map_or(0.0, |s| s.remaining_ms(self.time_ms))
    }

    /// Deterministic generator for `key` on this frame.
    pub fn rng_for(&self, key: &str) -> SplitMix64 {
        SplitMix64::new(frame_seed(self.seed, key, self.time_ms))
    }
}
