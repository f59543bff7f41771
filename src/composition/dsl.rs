use std::collections::BTreeMap;

use serde_json::Value;

use crate::{
    animation::ease::Ease,
    composition::presets,
    effects::transitions::TransitionPhase,
    foundation::core::Size,
    foundation::error::{BeatlineError, BeatlineResult},
    render::surface::Surface,
    scene::entity::Entity,
    scene::model::{EnterHook, ExitHook, Scene, SceneInfo, TransitionFn},
    transport::clock::TransportConfig,
};

struct PendingTransition {
    phase: TransitionPhase,
    /// `None`: scene start for `In`, flush with the scene end for `Out`.
    start_offset_ms: Option<f64>,
    duration_ms: f64,
    ease: Ease,
    callback: TransitionFn,
}

/// Builds a [`Scene`], with durations in ms, beats or bars.
pub struct SceneBuilder {
    name: String,
    start_ms: f64,
    duration_ms: Option<f64>,
    size: Option<Size>,
    entities: Vec<Entity>,
    transitions: Vec<PendingTransition>,
    enter_hooks: Vec<EnterHook>,
    exit_hooks: Vec<ExitHook>,
}

impl SceneBuilder {
    /// Empty builder starting at `0` ms. A duration must be set before [`build`](Self::build).
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start_ms: 0.0,
            duration_ms: None,
            size: None,
            entities: Vec::new(),
            transitions: Vec::new(),
            enter_hooks: Vec::new(),
            exit_hooks: Vec::new(),
        }
    }

    /// Timeline start of the scene.
    pub fn start_ms(mut self, start_ms: f64) -> Self {
        self.start_ms = start_ms;
        self
    }

    /// Start where `prev` ends.
    pub fn after(mut self, prev: &Scene) -> Self {
        self.start_ms = prev.end_ms();
        self
    }

    /// Scene length in milliseconds.
    pub fn duration_ms(mut self, duration_ms: f64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// Scene length in beats at the tempo of `transport`.
    pub fn duration_beats(mut self, beats: f64, transport: &TransportConfig) -> Self {
        self.duration_ms = Some(transport.beats_to_ms(beats));
        self
    }

    /// Scene length in bars.
    pub fn duration_bars(mut self, bars: f64, transport: &TransportConfig) -> Self {
        self.duration_ms = Some(transport.bars_to_ms(bars));
        self
    }

    /// Render size for the scene's entities.
    pub fn size(mut self, size: Size) -> Self {
        self.size = Some(size);
        self
    }

    /// Append an entity.
    pub fn entity(mut self, entity: Entity) -> Self {
        self.entities.push(entity);
        self
    }

    /// In-transition over a scene-relative window.
    pub fn transition_in(
        self,
        start_offset_ms: f64,
        duration_ms: f64,
        ease: Ease,
        callback: impl FnMut(&mut Surface, &SceneInfo, f64) -> BeatlineResult<()> + 'static,
    ) -> Self {
        self.push_transition(
            TransitionPhase::In,
            Some(start_offset_ms),
            duration_ms,
            ease,
            Box::new(callback),
        )
    }

    /// Out-transition over a scene-relative window.
    pub fn transition_out(
        self,
        start_offset_ms: f64,
        duration_ms: f64,
        ease: Ease,
        callback: impl FnMut(&mut Surface, &SceneInfo, f64) -> BeatlineResult<()> + 'static,
    ) -> Self {
        self.push_transition(
            TransitionPhase::Out,
            Some(start_offset_ms),
            duration_ms,
            ease,
            Box::new(callback),
        )
    }

    /// Out-transition ending with the scene, however long the scene ends up.
    pub fn transition_out_at_end(
        self,
        duration_ms: f64,
        ease: Ease,
        callback: impl FnMut(&mut Surface, &SceneInfo, f64) -> BeatlineResult<()> + 'static,
    ) -> Self {
        self.push_transition(
            TransitionPhase::Out,
            None,
            duration_ms,
            ease,
            Box::new(callback),
        )
    }

    /// Pre-boxed transition, as produced by [`crate::TransitionKind::into_callback`].
    pub fn transition(
        self,
        phase: TransitionPhase,
        start_offset_ms: f64,
        duration_ms: f64,
        ease: Ease,
        callback: TransitionFn,
    ) -> Self {
        self.push_transition(phase, Some(start_offset_ms), duration_ms, ease, callback)
    }

    fn push_transition(
        mut self,
        phase: TransitionPhase,
        start_offset_ms: Option<f64>,
        duration_ms: f64,
        ease: Ease,
        callback: TransitionFn,
    ) -> Self {
        self.transitions.push(PendingTransition {
            phase,
            start_offset_ms,
            duration_ms,
            ease,
            callback,
        });
        self
    }

    /// Hook run when the scene becomes current.
    pub fn on_enter(
        mut self,
        f: impl FnMut(&SceneInfo, f64) -> BeatlineResult<()> + 'static,
    ) -> Self {
        self.enter_hooks.push(Box::new(f));
        self
    }

    /// Hook run when the scene stops being current.
    pub fn on_exit(mut self, f: impl FnMut(&SceneInfo) -> BeatlineResult<()> + 'static) -> Self {
        self.exit_hooks.push(Box::new(f));
        self
    }

    /// Validate and assemble the scene.
    pub fn build(self) -> BeatlineResult<Scene> {
        if self.name.trim().is_empty() {
            return Err(BeatlineError::validation("scene name must be non-empty"));
        }
        let Some(duration_ms) = self.duration_ms else {
            return Err(BeatlineError::validation(format!(
                "scene '{}' needs a duration",
                self.name
            )));
        };

        let mut scene = Scene::new(self.name, self.start_ms, duration_ms)?;
        if let Some(size) = self.size {
            scene.set_size(size);
        }
        scene.add_entities(self.entities);
        for t in self.transitions {
            let start = t.start_offset_ms.unwrap_or(match t.phase {
                TransitionPhase::In => 0.0,
                TransitionPhase::Out => duration_ms - t.duration_ms,
            });
            match t.phase {
                TransitionPhase::In => scene.transition_in(start, t.duration_ms, t.ease, t.callback)?,
                TransitionPhase::Out => {
                    scene.transition_out(start, t.duration_ms, t.ease, t.callback)?
                }
            }
        }
        for hook in self.enter_hooks {
            scene.on_enter(hook);
        }
        for hook in self.exit_hooks {
            scene.on_exit(hook);
        }
        Ok(scene)
    }
}

/// Creates an entity from its key and props.
pub type EntityFactory = Box<dyn Fn(&str, &Value) -> BeatlineResult<Entity>>;

/// Named entity factories, used by documents and [`EntityBuilder`].
#[derive(Default)]
pub struct EntityRegistry {
    factories: BTreeMap<String, EntityFactory>,
}

impl EntityRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with `solid`, `beat_flash`, `spectrum_bars` and `noise`.
    pub fn with_builtins() -> Self {
        let mut r = Self::new();
        presets::register_builtins(&mut r);
        r
    }

    /// Register (or replace) the factory for `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&str, &Value) -> BeatlineResult<Entity> + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
    }

    /// Whether a factory is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Build entity `key` with the factory registered as `name`.
    pub fn create(&self, name: &str, key: &str, props: &Value) -> BeatlineResult<Entity> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| BeatlineError::lookup(format!("no entity named '{name}' is registered")))?;
        factory(key, props)
    }
}

impl std::fmt::Debug for EntityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityRegistry")
            .field("names", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Adds registry entities to a target scene by name.
pub struct EntityBuilder<'r, 's> {
    registry: &'r EntityRegistry,
    scene: Option<&'s mut Scene>,
}

impl<'r, 's> EntityBuilder<'r, 's> {
    /// Builder with no target scene yet.
    pub fn new(registry: &'r EntityRegistry) -> Self {
        Self {
            registry,
            scene: None,
        }
    }

    /// Scene that receives created entities.
    pub fn target(mut self, scene: &'s mut Scene) -> Self {
        self.scene = Some(scene);
        self
    }

    /// Create `name` with `key` and `props` and append it to the target scene.
    /// Fails with a lookup error when no scene is targeted or `name` is unknown.
    pub fn add_entity_by_name(
        &mut self,
        name: &str,
        key: &str,
        props: Value,
    ) -> BeatlineResult<&mut Entity> {
        let Some(scene) = self.scene.as_deref_mut() else {
            return Err(BeatlineError::lookup(format!(
                "cannot add '{name}': no target scene set"
            )));
        };
        let entity = self.registry.create(name, key, &props)?;
        Ok(scene.add_entity(entity))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/composition/dsl.rs"]
mod tests;
