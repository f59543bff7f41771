use crate::{
    animation::ease::Ease,
    foundation::core::{DEFAULT_SIZE, Size, TimeRange},
    foundation::error::{BeatlineError, BeatlineResult},
    render::surface::Surface,
    scene::entity::Entity,
};

/// Name and timeline window of a scene, as seen by hooks and effects.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct SceneInfo {
    /// Scene name.
    pub name: String,
    /// Window on the global timeline.
    pub range: TimeRange,
}

impl SceneInfo {
    /// Scene name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Timeline start.
    pub fn start_ms(&self) -> f64 {
        self.range.start_ms
    }

    /// Length in milliseconds.
    pub fn duration_ms(&self) -> f64 {
        self.range.duration_ms
    }

    /// Exclusive timeline end.
    pub fn end_ms(&self) -> f64 {
        self.range.end_ms()
    }

    /// `max(0, duration - (timestamp - start))`.
    pub fn remaining_ms(&self, timestamp_ms: f64) -> f64 {
        (self.duration_ms() - (timestamp_ms - self.start_ms())).max(0.0)
    }
}

/// `(target, scene, progress)`; progress is eased and in `[0, 1]`.
pub type TransitionFn = Box<dyn FnMut(&mut Surface, &SceneInfo, f64) -> BeatlineResult<()>>;
/// `(scene, entry elapsed ms)`.
pub type EnterHook = Box<dyn FnMut(&SceneInfo, f64) -> BeatlineResult<()>>;
/// `(scene)`.
pub type ExitHook = Box<dyn FnMut(&SceneInfo) -> BeatlineResult<()>>;

/// A progress-driven callback bound to a scene-relative window.
pub struct Transition {
    window: TimeRange,
    ease: Ease,
    callback: TransitionFn,
}

impl Transition {
    /// Transition over `[start_offset_ms, start_offset_ms + duration_ms]` relative to the scene start.
    pub fn new(
        start_offset_ms: f64,
        duration_ms: f64,
        ease: Ease,
        callback: TransitionFn,
    ) -> BeatlineResult<Self> {
        Ok(Self {
            window: TimeRange::new(start_offset_ms, duration_ms)?,
            ease,
            callback,
        })
    }

    /// Scene-relative window.
    pub fn window(&self) -> TimeRange {
        self.window
    }

    /// Eased progress at `scene_elapsed_ms`, or `None` outside the inclusive window.
    pub fn progress_at(&self, scene_elapsed_ms: f64) -> Option<f64> {
        let start = self.window.start_ms;
        if scene_elapsed_ms < start || scene_elapsed_ms > self.window.end_ms() {
            return None;
        }
        Some(
            self.ease
                .progress(scene_elapsed_ms, start, self.window.duration_ms),
        )
    }
}

impl std::fmt::Debug for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transition")
            .field("window", &self.window)
            .field("ease", &self.ease)
            .finish()
    }
}

/// Time-bounded, ordered collection of entities.
///
/// A scene never drives its own loop; the sequence calls [`Scene::enter`] once
/// when it becomes current and updates entities from its frame loop.
pub struct Scene {
    info: SceneInfo,
    size: Size,
    entities: Vec<Entity>,
    transitions_in: Vec<Transition>,
    transitions_out: Vec<Transition>,
    enter_hooks: Vec<EnterHook>,
    exit_hooks: Vec<ExitHook>,
}

impl Scene {
    /// Empty scene over `[start_ms, start_ms + duration_ms)`.
    pub fn new(name: impl Into<String>, start_ms: f64, duration_ms: f64) -> BeatlineResult<Self> {
        Ok(Self {
            info: SceneInfo {
                name: name.into(),
                range: TimeRange::new(start_ms, duration_ms)?,
            },
            size: DEFAULT_SIZE,
            entities: Vec::new(),
            transitions_in: Vec::new(),
            transitions_out: Vec::new(),
            enter_hooks: Vec::new(),
            exit_hooks: Vec::new(),
        })
    }

    /// Render size inherited by unsized entities, including ones already added.
    pub fn with_size(mut self, size: Size) -> Self {
        self.set_size(size);
        self
    }

    /// Default size for entities that do not set one.
    pub fn set_size(&mut self, size: Size) {
        self.size = size;
        for e in &mut self.entities {
            e.bind(size);
        }
    }

    /// Move the scene on the timeline.
    pub fn set_start_ms(&mut self, start_ms: f64) -> BeatlineResult<()> {
        self.info.range = TimeRange::new(start_ms, self.info.range.duration_ms)?;
        Ok(())
    }

    /// Change the scene length.
    pub fn set_duration_ms(&mut self, duration_ms: f64) -> BeatlineResult<()> {
        self.info.range = TimeRange::new(self.info.range.start_ms, duration_ms)?;
        Ok(())
    }

    /// Name and window.
    pub fn info(&self) -> &SceneInfo {
        &self.info
    }

    /// Scene name.
    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Timeline start.
    pub fn start_ms(&self) -> f64 {
        self.info.start_ms()
    }

    /// Length in milliseconds.
    pub fn duration_ms(&self) -> f64 {
        self.info.duration_ms()
    }

    /// Exclusive timeline end.
    pub fn end_ms(&self) -> f64 {
        self.info.end_ms()
    }

    /// Default entity size.
    pub fn size(&self) -> Size {
        self.size
    }

    /// `[start, start + duration)`.
    pub fn contains(&self, timestamp_ms: f64) -> bool {
        self.info.range.contains(timestamp_ms)
    }

    /// Append `entity`, sizing it to the scene when it has no size of its own.
    pub fn add_entity(&mut self, mut entity: Entity) -> &mut Entity {
        entity.bind(self.size);
        let idx = self.entities.len();
        self.entities.push(entity);
        &mut self.entities[idx]
    }

    /// Append several entities.
    pub fn add_entities(&mut self, entities: impl IntoIterator<Item = Entity>) {
        for e in entities {
            self.add_entity(e);
        }
    }

    /// First entity with `key`.
    pub fn get_entity(&self, key: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.key() == key)
    }

    /// First entity with `key`.
    pub fn get_entity_mut(&mut self, key: &str) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|e| e.key() == key)
    }

    /// Entities in draw order.
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Scene info alongside mutable entities, for callers that need both.
    pub fn parts_mut(&mut self) -> (&SceneInfo, &mut [Entity]) {
        (&self.info, &mut self.entities)
    }

    /// Add an in-transition.
    pub fn transition_in(
        &mut self,
        start_offset_ms: f64,
        duration_ms: f64,
        ease: Ease,
        callback: impl FnMut(&mut Surface, &SceneInfo, f64) -> BeatlineResult<()> + 'static,
    ) -> BeatlineResult<()> {
        let t = Transition::new(start_offset_ms, duration_ms, ease, Box::new(callback))?;
        self.transitions_in.push(t);
        Ok(())
    }

    /// Add an out-transition.
    pub fn transition_out(
        &mut self,
        start_offset_ms: f64,
        duration_ms: f64,
        ease: Ease,
        callback: impl FnMut(&mut Surface, &SceneInfo, f64) -> BeatlineResult<()> + 'static,
    ) -> BeatlineResult<()> {
        let t = Transition::new(start_offset_ms, duration_ms, ease, Box::new(callback))?;
        self.transitions_out.push(t);
        Ok(())
    }

    /// Out-transition that ends exactly at the scene's end.
    pub fn transition_out_at_end(
        &mut self,
        duration_ms: f64,
        ease: Ease,
        callback: impl FnMut(&mut Surface, &SceneInfo, f64) -> BeatlineResult<()> + 'static,
    ) -> BeatlineResult<()> {
        if duration_ms > self.duration_ms() {
            return Err(BeatlineError::validation(format!(
                "transition of {duration_ms}ms does not fit scene '{}' ({}ms)",
                self.name(),
                self.duration_ms()
            )));
        }
        self.transition_out(self.duration_ms() - duration_ms, duration_ms, ease, callback)
    }

    /// `(in, out)` transition counts.
    pub fn transition_count(&self) -> (usize, usize) {
        (self.transitions_in.len(), self.transitions_out.len())
    }

    /// Hook run when the scene becomes current.
    pub fn on_enter(&mut self, f: impl FnMut(&SceneInfo, f64) -> BeatlineResult<()> + 'static) {
        self.enter_hooks.push(Box::new(f));
    }

    /// Hook run when the scene stops being current.
    pub fn on_exit(&mut self, f: impl FnMut(&SceneInfo) -> BeatlineResult<()> + 'static) {
        self.exit_hooks.push(Box::new(f));
    }

    /// One-shot entry hook, run when the scene becomes current `elapsed_ms` into it.
    pub fn enter(&mut self, elapsed_ms: f64) {
        for (index, hook) in self.enter_hooks.iter_mut().enumerate() {
            if let Err(err) = hook(&self.info, elapsed_ms) {
                tracing::warn!(scene = %self.info.name, index, %err, "enter hook failed");
            }
        }
    }

    /// Run exit hooks. Failures are logged.
    pub fn exit(&mut self) {
        for (index, hook) in self.exit_hooks.iter_mut().enumerate() {
            if let Err(err) = hook(&self.info) {
                tracing::warn!(scene = %self.info.name, index, %err, "exit hook failed");
            }
        }
    }

    /// Run every in- then out-transition whose window contains `scene_elapsed_ms`.
    /// Returns how many ran.
    pub(crate) fn apply_transitions(&mut self, target: &mut Surface, scene_elapsed_ms: f64) -> usize {
        let mut ran = 0;
        let all = self
            .transitions_in
            .iter_mut()
            .chain(self.transitions_out.iter_mut());
        for t in all {
            let Some(progress) = t.progress_at(scene_elapsed_ms) else {
                continue;
            };
            ran += 1;
            if let Err(err) = (t.callback)(target, &self.info, progress) {
                tracing::warn!(scene = %self.info.name, %err, "transition failed");
            }
        }
        ran
    }
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene")
            .field("info", &self.info)
            .field("size", &self.size)
            .field("entities", &self.entities)
            .field("transitions_in", &self.transitions_in)
            .field("transitions_out", &self.transitions_out)
            .finish()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/model.rs"]
mod tests;
