use std::path::Path;

use anyhow::Context;
use serde_json::Value;

use crate::{
    animation::ease::Ease,
    assets::loader::normalize_rel_path,
    composition::dsl::{EntityRegistry, SceneBuilder},
    conductor::events::{Conductor, FirePolicy, TimelineEvent},
    effects::fx::{PostEffect, parse_post_effect},
    effects::transitions::{TransitionPhase, parse_transition},
    foundation::core::{Rgba8Premul, Size, Vec2},
    foundation::error::{BeatlineError, BeatlineResult},
    scene::entity::Entity,
    scene::model::Scene,
    sequence::engine::{Sequence, SequenceSettings},
    transport::clock::TransportConfig,
};

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
/// A complete timeline document.
///
/// Documents are plain data: they can be written by hand as JSON, validated,
/// and turned into a playable [`Sequence`] plus [`Conductor`] with
/// [`TimelineDoc::build`].
pub struct TimelineDoc {
    /// Shared render target and seed.
    #[serde(default)]
    pub settings: DocSettings,
    /// Tempo and meter.
    #[serde(default)]
    pub transport: TransportConfig,
    /// Audio file to analyse, relative to the document directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
    /// Scenes in timeline order.
    pub scenes: Vec<SceneDoc>,
    /// Conductor events.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<EventDoc>,
    /// Post effects applied to every composited frame.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post: Vec<EffectInstance>,
}

#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
/// Document-level render settings.
pub struct DocSettings {
    /// Output canvas size.
    pub canvas: Size,
    /// Clear colour as `#rrggbb[aa]`; transparent when omitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clear: Option<String>,
    /// Global deterministic seed.
    pub seed: u64,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
/// One scene. Exactly one of the duration fields must be set.
pub struct SceneDoc {
    /// Scene label (lookups use the first match).
    pub name: String,
    /// Global start in ms. Omitted: where the previous scene ends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_ms: Option<f64>,
    /// Length in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
    /// Length in beats at the document tempo.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_beats: Option<f64>,
    /// Length in bars at the document tempo and meter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_bars: Option<f64>,
    /// Render size inherited by unsized entities.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Size>,
    /// Entities in draw order.
    #[serde(default)]
    pub entities: Vec<EntityDoc>,
    /// Transitions played as the scene enters.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transition_in: Vec<TransitionSpec>,
    /// Transitions played as the scene leaves.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transition_out: Vec<TransitionSpec>,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
/// One entity, created through an [`EntityRegistry`] factory.
pub struct EntityDoc {
    /// Key, unique within its scene.
    pub key: String,
    /// Registry name of the factory.
    pub kind: String,
    /// Props handed to the factory and kept as the entity's state.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub props: Value,
    /// Lifetime start relative to the scene start.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_offset_ms: Option<f64>,
    /// Lifetime length; unbounded when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
    /// Explicit surface size; the scene size when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Size>,
    /// Top-left position on the shared target, `[x, y]`.
    #[serde(default)]
    pub position: [f64; 2],
    /// Compositing opacity in `[0, 1]`.
    #[serde(default = "default_opacity")]
    pub opacity: f32,
    /// Post effects run on the entity surface before compositing.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub effects: Vec<EffectInstance>,
}

fn default_opacity() -> f32 {
    1.0
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
/// Effect kind plus free-form parameters.
pub struct EffectInstance {
    /// Effect kind identifier.
    pub kind: String,
    /// Effect parameter object.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub params: serde_json::Value,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
/// Transition attached to a scene edge.
pub struct TransitionSpec {
    /// Transition kind identifier.
    pub kind: String,
    /// Window start relative to the scene start. Omitted: `0` for an
    /// in-transition, `scene duration - duration_ms` for an out-transition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_offset_ms: Option<f64>,
    /// Window length in milliseconds.
    pub duration_ms: f64,
    /// Easing applied to progress.
    #[serde(default)]
    pub ease: Ease,
    /// Transition parameter object.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub params: serde_json::Value,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
/// Conductor event. At least one threshold must be set.
pub struct EventDoc {
    /// Entity key looked up in the current scene.
    pub target: String,
    /// Fire once the timeline reaches this time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at_time_ms: Option<f64>,
    /// Fire once the beat counter reaches this value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at_beat_count: Option<u64>,
    /// Fire once this many bars have completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at_bar_count: Option<u64>,
    /// What happens to the target.
    pub action: EventActionDoc,
    /// Whether the event fires once or every frame past the threshold.
    #[serde(default)]
    pub repeat: FirePolicy,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
/// Data-only conductor actions.
pub enum EventActionDoc {
    /// Shallow-merge `props` into the entity's props object.
    SetProps {
        /// Props merged over the current ones.
        props: Value,
    },
    /// Append a post effect to the entity.
    AddEffect {
        /// Effect to parse and attach.
        effect: EffectInstance,
    },
}

/// A built document: the sequence plus the events that drive it.
#[derive(Debug)]
pub struct Timeline {
    /// Sequence with every scene, entity and post effect built.
    pub sequence: Sequence,
    /// Events from the document.
    pub conductor: Conductor,
    /// Audio path from the document, still to be loaded.
    pub audio: Option<String>,
}

impl TimelineDoc {
    /// Parse and validate a JSON document.
    pub fn from_json_str(s: &str) -> BeatlineResult<Self> {
        let doc: Self = serde_json::from_str(s)?;
        doc.validate()?;
        Ok(doc)
    }

    /// Read, parse and validate a JSON file.
    pub fn from_json_path(path: &Path) -> BeatlineResult<Self> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("read timeline '{}'", path.display()))?;
        Self::from_json_str(&s)
    }

    /// Pretty-printed JSON.
    pub fn to_json_pretty(&self) -> BeatlineResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Validate document invariants, including every effect and transition.
    pub fn validate(&self) -> BeatlineResult<()> {
        self.sequence_settings()?.validate()?;
        self.transport.validate()?;
        if let Some(audio) = &self.audio {
            normalize_rel_path(audio)?;
        }
        if self.scenes.is_empty() {
            return Err(BeatlineError::validation(
                "timeline must contain at least one scene",
            ));
        }
        for scene in &self.scenes {
            scene.validate(&self.transport)?;
        }
        for fx in &self.post {
            parse_post_effect(fx)?;
        }
        for (i, ev) in self.events.iter().enumerate() {
            ev.validate()
                .map_err(|e| BeatlineError::validation(format!("event #{i}: {e}")))?;
        }
        Ok(())
    }

    /// Sequence settings with the clear colour parsed.
    pub fn sequence_settings(&self) -> BeatlineResult<SequenceSettings> {
        let clear_rgba = match &self.settings.clear {
            Some(hex) => Rgba8Premul::parse_hex(hex)?,
            None => Rgba8Premul::TRANSPARENT,
        };
        Ok(SequenceSettings {
            canvas: self.settings.canvas,
            clear_rgba,
            seed: self.settings.seed,
        })
    }

    /// Instantiate scenes and events. Entities come from `registry`.
    pub fn build(&self, registry: &EntityRegistry) -> BeatlineResult<Timeline> {
        self.validate()?;
        let mut sequence = Sequence::new(self.sequence_settings()?, self.transport)?;

        let mut scenes: Vec<Scene> = Vec::with_capacity(self.scenes.len());
        for doc in &self.scenes {
            let scene = doc.build(registry, &self.transport, scenes.last())?;
            scenes.push(scene);
        }
        sequence.add_scenes(scenes);

        for fx in &self.post {
            sequence.add_boxed_post_processor(parse_post_effect(fx)?.into_post_processor());
        }

        let mut conductor = Conductor::new();
        for ev in &self.events {
            conductor.add_event(ev.build()?);
        }

        Ok(Timeline {
            sequence,
            conductor,
            audio: self.audio.clone(),
        })
    }
}

impl SceneDoc {
    fn validate(&self, transport: &TransportConfig) -> BeatlineResult<()> {
        let name = &self.name;
        if name.trim().is_empty() {
            return Err(BeatlineError::validation("scene name must be non-empty"));
        }
        if let Some(start) = self.start_ms {
            if !start.is_finite() || start < 0.0 {
                return Err(BeatlineError::validation(format!(
                    "scene '{name}' start_ms must be finite and >= 0"
                )));
            }
        }
        let duration = self.duration(transport)?;
        if let Some(size) = self.size {
            if size.is_empty() {
                return Err(BeatlineError::validation(format!(
                    "scene '{name}' size must be non-zero"
                )));
            }
        }

        let mut seen = std::collections::BTreeSet::new();
        for e in &self.entities {
            if e.key.trim().is_empty() {
                return Err(BeatlineError::validation(format!(
                    "scene '{name}' has an entity with an empty key"
                )));
            }
            if !seen.insert(e.key.as_str()) {
                return Err(BeatlineError::validation(format!(
                    "scene '{name}' has duplicate entity key '{}'",
                    e.key
                )));
            }
            e.validate()?;
        }

        for (phase, list) in [
            (TransitionPhase::In, &self.transition_in),
            (TransitionPhase::Out, &self.transition_out),
        ] {
            for t in list {
                parse_transition(t)?;
                let start = transition_start(t, phase, duration);
                if !t.duration_ms.is_finite() || t.duration_ms < 0.0 || start < 0.0 {
                    return Err(BeatlineError::validation(format!(
                        "scene '{name}' has a transition window outside the scene"
                    )));
                }
            }
        }
        Ok(())
    }

    fn duration(&self, transport: &TransportConfig) -> BeatlineResult<f64> {
        let ms = match (self.duration_ms, self.duration_beats, self.duration_bars) {
            (Some(ms), None, None) => ms,
            (None, Some(beats), None) => transport.beats_to_ms(beats),
            (None, None, Some(bars)) => transport.bars_to_ms(bars),
            _ => {
                return Err(BeatlineError::validation(format!(
                    "scene '{}' needs exactly one of duration_ms, duration_beats, duration_bars",
                    self.name
                )));
            }
        };
        if !ms.is_finite() || ms < 0.0 {
            return Err(BeatlineError::validation(format!(
                "scene '{}' duration must be finite and >= 0",
                self.name
            )));
        }
        Ok(ms)
    }

    fn build(
        &self,
        registry: &EntityRegistry,
        transport: &TransportConfig,
        prev: Option<&Scene>,
    ) -> BeatlineResult<Scene> {
        let duration = self.duration(transport)?;
        let mut b = SceneBuilder::new(&self.name).duration_ms(duration);
        b = match (self.start_ms, prev) {
            (Some(start), _) => b.start_ms(start),
            (None, Some(prev)) => b.after(prev),
            (None, None) => b.start_ms(0.0),
        };
        if let Some(size) = self.size {
            b = b.size(size);
        }
        for e in &self.entities {
            b = b.entity(e.build(registry)?);
        }
        for (phase, list) in [
            (TransitionPhase::In, &self.transition_in),
            (TransitionPhase::Out, &self.transition_out),
        ] {
            for t in list {
                let kind = parse_transition(t)?;
                b = b.transition(
                    phase,
                    transition_start(t, phase, duration),
                    t.duration_ms,
                    t.ease,
                    kind.into_callback(phase),
                );
            }
        }
        b.build()
    }
}

fn transition_start(t: &TransitionSpec, phase: TransitionPhase, scene_duration: f64) -> f64 {
    t.start_offset_ms.unwrap_or(match phase {
        TransitionPhase::In => 0.0,
        TransitionPhase::Out => scene_duration - t.duration_ms,
    })
}

impl EntityDoc {
    fn validate(&self) -> BeatlineResult<()> {
        if self.kind.trim().is_empty() {
            return Err(BeatlineError::validation(format!(
                "entity '{}' kind must be non-empty",
                self.key
            )));
        }
        for (field, v) in [
            ("start_offset_ms", self.start_offset_ms),
            ("duration_ms", self.duration_ms),
        ] {
            if let Some(v) = v {
                if !v.is_finite() || v < 0.0 {
                    return Err(BeatlineError::validation(format!(
                        "entity '{}' {field} must be finite and >= 0",
                        self.key
                    )));
                }
            }
        }
        if !self.position.iter().all(|v| v.is_finite()) {
            return Err(BeatlineError::validation(format!(
                "entity '{}' position must be finite",
                self.key
            )));
        }
        if !self.opacity.is_finite() || !(0.0..=1.0).contains(&self.opacity) {
            return Err(BeatlineError::validation(format!(
                "entity '{}' opacity must be in [0, 1]",
                self.key
            )));
        }
        for fx in &self.effects {
            parse_post_effect(fx)?;
        }
        Ok(())
    }

    fn build(&self, registry: &EntityRegistry) -> BeatlineResult<Entity> {
        let mut e = registry
            .create(&self.kind, &self.key, &self.props)?
            .with_lifetime(self.start_offset_ms, self.duration_ms)
            .with_position(Vec2::new(self.position[0], self.position[1]))
            .with_opacity(self.opacity);
        if let Some(size) = self.size {
            e = e.with_size(size);
        }
        for fx in &self.effects {
            e.add_boxed_post_processor(parse_post_effect(fx)?.into_post_processor());
        }
        Ok(e)
    }
}

impl EventDoc {
    fn validate(&self) -> BeatlineResult<()> {
        if self.target.trim().is_empty() {
            return Err(BeatlineError::validation("target must be non-empty"));
        }
        if self.at_time_ms.is_none() && self.at_beat_count.is_none() && self.at_bar_count.is_none()
        {
            return Err(BeatlineError::validation(
                "one of at_time_ms, at_beat_count, at_bar_count is required",
            ));
        }
        if let Some(t) = self.at_time_ms {
            if !t.is_finite() || t < 0.0 {
                return Err(BeatlineError::validation("at_time_ms must be finite and >= 0"));
            }
        }
        match &self.action {
            EventActionDoc::SetProps { props } if !props.is_object() => Err(
                BeatlineError::validation("set_props.props must be an object"),
            ),
            EventActionDoc::SetProps { .. } => Ok(()),
            EventActionDoc::AddEffect { effect } => parse_post_effect(effect).map(|_| ()),
        }
    }

    fn build(&self) -> BeatlineResult<TimelineEvent> {
        let mut ev = match &self.action {
            EventActionDoc::SetProps { props } => {
                TimelineEvent::new(&self.target, |entity, props| {
                    merge_props(entity.props_mut(), props);
                    Ok(())
                })
                .with_props(props.clone())
            }
            EventActionDoc::AddEffect { effect } => {
                let fx: PostEffect = parse_post_effect(effect)?;
                TimelineEvent::new(&self.target, move |entity, _props| {
                    entity.add_boxed_post_processor(fx.clone().into_post_processor());
                    Ok(())
                })
            }
        };
        if let Some(t) = self.at_time_ms {
            ev = ev.at_time_ms(t);
        }
        if let Some(b) = self.at_beat_count {
            ev = ev.at_beat_count(b);
        }
        if let Some(b) = self.at_bar_count {
            ev = ev.at_bar_count(b);
        }
        Ok(ev.repeat(self.repeat))
    }
}

/// Shallow merge: keys of `patch` overwrite keys of `dst`. A non-object `dst`
/// is replaced by an empty object first.
pub fn merge_props(dst: &mut Value, patch: &Value) {
    let Some(patch) = patch.as_object() else {
        return;
    };
    if !dst.is_object() {
        *dst = Value::Object(serde_json::Map::new());
    }
    if let Some(obj) = dst.as_object_mut() {
        for (k, v) in patch {
            obj.insert(k.clone(), v.clone());
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/composition/model.rs"]
mod tests;
