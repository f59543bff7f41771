use crate::{
    assets::loader::{AssetLoader, DecodedAudio},
    audio::analyser::{AudioAnalyser, DEFAULT_FFT_SIZE, SpectrumAnalyser},
    foundation::core::{DEFAULT_SIZE, Rgba8Premul, Size},
    foundation::error::{BeatlineError, BeatlineResult},
    render::surface::Surface,
    scene::entity::PostProcessor,
    scene::model::Scene,
    sequence::scheduler::{FrameHandle, FrameScheduler, ManualScheduler},
    sequence::view::SequenceView,
    transport::clock::{MusicalPosition, Transport, TransportConfig, TransportEvents},
};

/// Playback state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayState {
    /// Not started, or stopped.
    Stopped,
    /// Consuming frames.
    Playing,
    /// Holding the current position.
    Paused,
}

/// What one call to [`Sequence::render_frame`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    /// A scene was current and the frame was composited.
    Rendered,
    /// Waiting for an upcoming scene; nothing was drawn.
    Idle,
    /// No scene at or after this time; playback stopped.
    Finished,
    /// Not playing, or the frame callback was stale.
    NotPlaying,
}

/// Sequence-wide render settings.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SequenceSettings {
    /// Size of the shared render target.
    pub canvas: Size,
    /// Colour the shared target is cleared to before each frame.
    pub clear_rgba: Rgba8Premul,
    /// Root of every deterministic random stream.
    pub seed: u64,
}

impl Default for SequenceSettings {
    fn default() -> Self {
        Self {
            canvas: DEFAULT_SIZE,
            clear_rgba: Rgba8Premul::TRANSPARENT,
            seed: 0,
        }
    }
}

impl SequenceSettings {
    /// Fails on an empty canvas.
    pub fn validate(&self) -> BeatlineResult<()> {
        if self.canvas.is_empty() {
            return Err(BeatlineError::validation(
                "canvas width/height must be non-zero",
            ));
        }
        Ok(())
    }
}

enum Selection {
    Scene(usize),
    Idle,
    Exhausted,
}

/// Top-level orchestrator: owns the scenes, the transport and the frame loop.
///
/// Per frame it selects the scene whose window contains the timestamp (lowest
/// index wins on overlap), updates and composites that scene's entities, runs
/// scene transitions and sequence post-processors, then advances the
/// transport. Per-entity and per-callback failures are logged and skipped.
pub struct Sequence {
    settings: SequenceSettings,
    scenes: Vec<Scene>,
    current_scene: Option<usize>,
    state: PlayState,
    current_time_ms: f64,
    host_origin_ms: Option<f64>,
    transport: Transport,
    entity_snapshot: MusicalPosition,
    target: Surface,
    post_processors: Vec<PostProcessor>,
    analyser: Option<Box<dyn AudioAnalyser>>,
    fft_data: Option<Vec<u8>>,
    scheduler: Box<dyn FrameScheduler>,
    pending: Option<FrameHandle>,
}

impl Sequence {
    /// Stopped sequence with no scenes.
    pub fn new(settings: SequenceSettings, transport: TransportConfig) -> BeatlineResult<Self> {
        settings.validate()?;
        let transport = Transport::new(transport)?;
        Ok(Self {
            target: Surface::new(settings.canvas),
            settings,
            scenes: Vec::new(),
            current_scene: None,
            state: PlayState::Stopped,
            current_time_ms: 0.0,
            host_origin_ms: None,
            entity_snapshot: transport.position(),
            transport,
            post_processors: Vec::new(),
            analyser: None,
            fft_data: None,
            scheduler: Box::new(ManualScheduler::default()),
            pending: None,
        })
    }

    /// Replace the frame scheduler, moving any pending request over.
    pub fn with_scheduler(mut self, scheduler: Box<dyn FrameScheduler>) -> Self {
        let was_pending = self.pending.is_some();
        self.cancel_pending();
        self.scheduler = scheduler;
        if was_pending {
            self.request_frame();
        }
        self
    }

    /// Render settings.
    pub fn settings(&self) -> &SequenceSettings {
        &self.settings
    }

    // ---- scenes ----

    /// Append a scene.
    pub fn add_scene(&mut self, scene: Scene) {
        self.scenes.push(scene);
    }

    /// Append several scenes.
    pub fn add_scenes(&mut self, scenes: impl IntoIterator<Item = Scene>) {
        self.scenes.extend(scenes);
    }

    /// Remove the first scene called `name`.
    pub fn remove_scene(&mut self, name: &str) -> Option<Scene> {
        let index = self.scenes.iter().position(|s| s.name() == name)?;
        self.remove_scene_at(index)
    }

    /// Remove the scene at `index`, exiting it if current.
    pub fn remove_scene_at(&mut self, index: usize) -> Option<Scene> {
        if index >= self.scenes.len() {
            return None;
        }
        let mut scene = self.scenes.remove(index);
        match self.current_scene {
            Some(cur) if cur == index => {
                scene.exit();
                self.current_scene = None;
            }
            Some(cur) if cur > index => self.current_scene = Some(cur - 1),
            _ => {}
        }
        Some(scene)
    }

    /// Scenes in priority order.
    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    /// First scene called `name`.
    pub fn scene(&self, name: &str) -> Option<&Scene> {
        self.scenes.iter().find(|s| s.name() == name)
    }

    /// Mutable access to the first scene called `name`.
    pub fn scene_mut(&mut self, name: &str) -> Option<&mut Scene> {
        self.scenes.iter_mut().find(|s| s.name() == name)
    }

    /// Scene rendered by the last frame, if any.
    pub fn current_scene(&self) -> Option<&Scene> {
        self.current_scene.and_then(|i| self.scenes.get(i))
    }

    /// Mutable current scene.
    pub fn current_scene_mut(&mut self) -> Option<&mut Scene> {
        self.current_scene.and_then(|i| self.scenes.get_mut(i))
    }

    /// Index of the current scene.
    pub fn current_scene_index(&self) -> Option<usize> {
        self.current_scene
    }

    /// Latest scene end over the current scene list; `0` when empty.
    pub fn duration_ms(&self) -> f64 {
        self.scenes.iter().map(Scene::end_ms).fold(0.0, f64::max)
    }

    /// `max(0, duration - (timestamp - start))` of the current scene, `0` without one.
    pub fn scene_remaining_time_ms(&self, timestamp_ms: f64) -> f64 {
        self.current_scene()
            .map_or(0.0, |s| s.info().remaining_ms(timestamp_ms))
    }

    // ---- playback ----

    /// Playback state.
    pub fn state(&self) -> PlayState {
        self.state
    }

    /// Whether frames are being consumed.
    pub fn is_playing(&self) -> bool {
        self.state == PlayState::Playing
    }

    /// Timeline time of the last frame.
    pub fn current_time_ms(&self) -> f64 {
        self.current_time_ms
    }

    /// Frame request awaiting [`Self::on_frame`].
    pub fn pending_frame(&self) -> Option<FrameHandle> {
        self.pending
    }

    /// Start from the top when stopped, resume when paused, no-op when playing.
    pub fn play(&mut self) {
        match self.state {
            PlayState::Playing => return,
            PlayState::Stopped => {
                self.current_scene = None;
                self.current_time_ms = 0.0;
                self.transport.reset();
                self.entity_snapshot = self.transport.position();
                tracing::info!(scenes = self.scenes.len(), duration_ms = self.duration_ms(), "play");
            }
            PlayState::Paused => tracing::info!(at_ms = self.current_time_ms, "resume"),
        }
        self.state = PlayState::Playing;
        self.host_origin_ms = None;
        self.request_frame();
    }

    /// Stop consuming frames, keeping time, scene and transport state.
    pub fn pause(&mut self) {
        if self.state != PlayState::Playing {
            return;
        }
        self.state = PlayState::Paused;
        self.host_origin_ms = None;
        self.cancel_pending();
        tracing::info!(at_ms = self.current_time_ms, "pause");
    }

    /// Halt and rewind to 0. Transport counters are kept until the next `play`.
    pub fn stop(&mut self) {
        self.cancel_pending();
        self.exit_current();
        self.state = PlayState::Stopped;
        self.current_time_ms = 0.0;
        self.host_origin_ms = None;
        tracing::info!("stop");
    }

    /// Jump to `timestamp_ms` and render it without firing transport events.
    ///
    /// The transport is recomputed from absolute time. A stopped sequence
    /// becomes paused at that time, so the next `play` continues from there.
    pub fn seek(&mut self, timestamp_ms: f64) -> BeatlineResult<FrameOutcome> {
        if !timestamp_ms.is_finite() || timestamp_ms < 0.0 {
            return Err(BeatlineError::validation(format!(
                "seek time must be finite and >= 0 (got {timestamp_ms})"
            )));
        }
        self.current_time_ms = timestamp_ms;
        self.host_origin_ms = None;
        self.transport.seek(timestamp_ms);
        self.entity_snapshot = self.transport.position();
        if self.state == PlayState::Stopped {
            self.state = PlayState::Paused;
        }
        tracing::info!(at_ms = timestamp_ms, "seek");

        Ok(match self.select_scene(timestamp_ms) {
            Selection::Scene(idx) => {
                self.switch_to(idx, timestamp_ms);
                self.compose(idx, timestamp_ms);
                FrameOutcome::Rendered
            }
            Selection::Idle | Selection::Exhausted => {
                self.exit_current();
                self.target.fill(self.settings.clear_rgba);
                FrameOutcome::Idle
            }
        })
    }

    /// Frame callback from the host scheduler. Handles other than the pending
    /// one are ignored. Host time maps to timeline time continuing from the
    /// current position, so the first frame after `play` or a resume lands
    /// where playback left off.
    pub fn on_frame(&mut self, handle: FrameHandle, host_timestamp_ms: f64) -> FrameOutcome {
        if self.pending != Some(handle) {
            tracing::debug!(?handle, "ignoring stale frame callback");
            return FrameOutcome::NotPlaying;
        }
        self.pending = None;
        let origin = *self
            .host_origin_ms
            .get_or_insert(host_timestamp_ms - self.current_time_ms);
        self.render_frame(host_timestamp_ms - origin)
    }

    /// Process one frame at timeline time `timestamp_ms`.
    #[tracing::instrument(level = "trace", skip(self))]
    pub fn render_frame(&mut self, timestamp_ms: f64) -> FrameOutcome {
        if self.state != PlayState::Playing {
            return FrameOutcome::NotPlaying;
        }
        self.current_time_ms = timestamp_ms;

        let outcome = match self.select_scene(timestamp_ms) {
            Selection::Exhausted => {
                self.finish(timestamp_ms);
                return FrameOutcome::Finished;
            }
            Selection::Idle => {
                // Waiting for an upcoming scene: the transport, the current
                // scene and the target stay as the last rendered frame left them.
                tracing::debug!(at_ms = timestamp_ms, "idle between scenes");
                self.request_frame();
                return FrameOutcome::Idle;
            }
            Selection::Scene(idx) => {
                self.switch_to(idx, timestamp_ms);
                self.compose(idx, timestamp_ms);
                FrameOutcome::Rendered
            }
        };

        self.transport.advance(timestamp_ms);
        self.request_frame();
        outcome
    }

    fn select_scene(&self, timestamp_ms: f64) -> Selection {
        if let Some(idx) = self.scenes.iter().position(|s| s.contains(timestamp_ms)) {
            return Selection::Scene(idx);
        }
        if self.scenes.iter().any(|s| s.start_ms() > timestamp_ms) {
            Selection::Idle
        } else {
            Selection::Exhausted
        }
    }

    fn switch_to(&mut self, idx: usize, timestamp_ms: f64) {
        if self.current_scene == Some(idx) {
            return;
        }
        self.exit_current();
        self.current_scene = Some(idx);
        if let Some(scene) = self.scenes.get_mut(idx) {
            let elapsed = timestamp_ms - scene.start_ms();
            tracing::debug!(scene = scene.name(), index = idx, elapsed_ms = elapsed, "scene switch");
            scene.enter(elapsed);
        }
    }

    fn exit_current(&mut self) {
        if let Some(scene) = self.current_scene.take().and_then(|i| self.scenes.get_mut(i)) {
            scene.exit();
        }
    }

    fn finish(&mut self, timestamp_ms: f64) {
        self.exit_current();
        self.cancel_pending();
        self.state = PlayState::Stopped;
        self.host_origin_ms = None;
        tracing::info!(at_ms = timestamp_ms, duration_ms = self.duration_ms(), "timeline exhausted");
    }

    fn compose(&mut self, idx: usize, timestamp_ms: f64) {
        let duration_ms = self.duration_ms();
        let Self {
            settings,
            scenes,
            transport,
            entity_snapshot,
            target,
            post_processors,
            analyser,
            fft_data,
            ..
        } = self;

        if let Some(analyser) = analyser.as_mut() {
            let buf = fft_data.get_or_insert_with(Vec::new);
            if let Err(err) = analyser.frequency_data(timestamp_ms, buf) {
                tracing::warn!(%err, "audio analysis failed");
            }
        }
        target.fill(settings.clear_rgba);

        let pos = transport.position();
        let events = TransportEvents {
            bar: pos.bar != entity_snapshot.bar,
            beat: pos.beat_counter != entity_snapshot.beat_counter,
            tick: pos.tick_counter != entity_snapshot.tick_counter,
        };
        *entity_snapshot = pos;

        let Some(scene) = scenes.get_mut(idx) else {
            return;
        };
        let scene_start = scene.start_ms();
        let base = SequenceView {
            time_ms: timestamp_ms,
            position: pos,
            last_beat_ms: transport.last_beat_ms(),
            transport: *transport.config(),
            fft_data: fft_data.as_deref(),
            scene: None,
            duration_ms,
            seed: settings.seed,
        };

        {
            let (info, entities) = scene.parts_mut();
            let view = SequenceView {
                scene: Some(info),
                ..base
            };
            for entity in entities.iter_mut() {
                if let Err(err) = entity.update(timestamp_ms, scene_start, Some(&view)) {
                    tracing::warn!(entity = entity.key(), %err, "entity update failed");
                    continue;
                }
                if entity.copy_to_target(target, &view) && events.any() {
                    entity.dispatch_transport(events, &pos);
                }
            }
        }

        scene.apply_transitions(target, timestamp_ms - scene_start);

        let view = SequenceView {
            scene: Some(scene.info()),
            ..base
        };
        for (index, post) in post_processors.iter_mut().enumerate() {
            if let Err(err) = post(target, &view) {
                tracing::warn!(index, %err, "sequence post-processor failed");
            }
        }
    }

    fn request_frame(&mut self) {
        if self.pending.is_none() {
            self.pending = Some(self.scheduler.schedule());
        }
    }

    fn cancel_pending(&mut self) {
        if let Some(handle) = self.pending.take() {
            self.scheduler.cancel(handle);
        }
    }

    // ---- transport ----

    /// The musical clock.
    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Current musical position.
    pub fn position(&self) -> MusicalPosition {
        self.transport.position()
    }

    /// Beat within the bar.
    pub fn current_beat(&self) -> u32 {
        self.transport.current_beat()
    }

    /// Completed bars.
    pub fn current_bar(&self) -> u64 {
        self.transport.current_bar()
    }

    /// Tick within the beat.
    pub fn current_tick(&self) -> u32 {
        self.transport.current_tick()
    }

    /// Beats since play.
    pub fn beat_counter(&self) -> u64 {
        self.transport.beat_counter()
    }

    /// Ticks since play.
    pub fn tick_counter(&self) -> u64 {
        self.transport.tick_counter()
    }

    /// Sequence-level bar listener.
    pub fn on_bar(&mut self, f: impl FnMut(&MusicalPosition) -> BeatlineResult<()> + 'static) {
        self.transport.on_bar(f);
    }

    /// Sequence-level beat listener.
    pub fn on_beat(&mut self, f: impl FnMut(&MusicalPosition) -> BeatlineResult<()> + 'static) {
        self.transport.on_beat(f);
    }

    /// Sequence-level tick listener.
    pub fn on_tick(&mut self, f: impl FnMut(&MusicalPosition) -> BeatlineResult<()> + 'static) {
        self.transport.on_tick(f);
    }

    // ---- output ----

    /// Shared render target holding the last composited frame.
    pub fn target(&self) -> &Surface {
        &self.target
    }

    /// Run `f` on the shared target after scene transitions.
    pub fn add_post_processor<F>(&mut self, f: F)
    where
        F: FnMut(&mut Surface, &SequenceView<'_>) -> BeatlineResult<()> + 'static,
    {
        self.post_processors.push(Box::new(f));
    }

    /// Add an already boxed post-processor.
    pub fn add_boxed_post_processor(&mut self, p: PostProcessor) {
        self.post_processors.push(p);
    }

    /// Snapshot of the current state, as effects see it.
    pub fn view(&self) -> SequenceView<'_> {
        SequenceView {
            time_ms: self.current_time_ms,
            position: self.transport.position(),
            last_beat_ms: self.transport.last_beat_ms(),
            transport: *self.transport.config(),
            fft_data: self.fft_data.as_deref(),
            scene: self.current_scene().map(Scene::info),
            duration_ms: self.duration_ms(),
            seed: self.settings.seed,
        }
    }

    // ---- audio ----

    /// Latest analyser output; `None` until an analyser produced a frame.
    pub fn fft_data(&self) -> Option<&[u8]> {
        self.fft_data.as_deref()
    }

    /// Whether an analyser is attached.
    pub fn has_analyser(&self) -> bool {
        self.analyser.is_some()
    }

    /// Attach an analyser, replacing any previous one.
    pub fn attach_analyser(&mut self, analyser: Box<dyn AudioAnalyser>) {
        self.fft_data = None;
        self.analyser = Some(analyser);
    }

    /// Detach the analyser and drop its last spectrum.
    pub fn detach_analyser(&mut self) -> Option<Box<dyn AudioAnalyser>> {
        self.fft_data = None;
        self.analyser.take()
    }

    /// Analyse `audio` with a default [`SpectrumAnalyser`].
    pub fn attach_audio(&mut self, audio: DecodedAudio) -> BeatlineResult<()> {
        let analyser = SpectrumAnalyser::new(audio, DEFAULT_FFT_SIZE)?;
        self.attach_analyser(Box::new(analyser));
        Ok(())
    }

    /// Load and attach audio. Failures are logged and leave the sequence
    /// silent; returns whether audio is attached.
    pub fn load_audio(&mut self, loader: &mut dyn AssetLoader, path: &str) -> bool {
        match loader.load_audio(path).and_then(|a| self.attach_audio(a)) {
            Ok(()) => {
                tracing::info!(path, "audio attached");
                true
            }
            Err(err) => {
                tracing::warn!(path, %err, "audio unavailable, continuing without analysis");
                false
            }
        }
    }
}

impl std::fmt::Debug for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequence")
            .field("settings", &self.settings)
            .field("scenes", &self.scenes.len())
            .field("current_scene", &self.current_scene)
            .field("state", &self.state)
            .field("current_time_ms", &self.current_time_ms)
            .field("position", &self.transport.position())
            .field("has_analyser", &self.analyser.is_some())
            .field("pending", &self.pending)
            .finish()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/sequence/engine.rs"]
mod tests;
