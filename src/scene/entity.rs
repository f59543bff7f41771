use serde_json::Value;

use crate::{
    foundation::core::{Size, Vec2},
    foundation::error::BeatlineResult,
    render::surface::Surface,
    scene::shader::{ShaderProgram, ShaderRenderer, ShaderSource},
    sequence::view::SequenceView,
    transport::clock::{MusicalPosition, TransportEvents},
    transport::listeners::Listeners,
};

/// Per-frame arguments handed to an entity's renderer.
#[derive(Clone, Copy, Debug)]
pub struct FrameCtx<'a> {
    /// Timeline time of the frame.
    pub timestamp_ms: f64,
    /// Time since the entity's lifetime window opened.
    pub elapsed_ms: f64,
    /// Present when a sequence drives the frame, `None` for standalone updates.
    pub sequence: Option<&'a SequenceView<'a>>,
}

/// Draws an entity's content into its own surface.
///
/// Backends plug in here: plain closures through [`Entity::with_action`],
/// shader programs through [`ShaderRenderer`].
pub trait Renderer {
    /// Draw one frame into `target`. `props` may be changed in place.
    fn render(
        &mut self,
        frame: &FrameCtx<'_>,
        target: &mut Surface,
        props: &mut Value,
    ) -> BeatlineResult<()>;
}

struct FnRenderer<F>(F);

impl<F> Renderer for FnRenderer<F>
where
    F: FnMut(&FrameCtx<'_>, &mut Surface, &mut Value) -> BeatlineResult<()>,
{
    fn render(
        &mut self,
        frame: &FrameCtx<'_>,
        target: &mut Surface,
        props: &mut Value,
    ) -> BeatlineResult<()> {
        (self.0)(frame, target, props)
    }
}

/// Box a closure as a [`Renderer`].
pub fn action_renderer<F>(f: F) -> Box<dyn Renderer>
where
    F: FnMut(&FrameCtx<'_>, &mut Surface, &mut Value) -> BeatlineResult<()> + 'static,
{
    Box::new(FnRenderer(f))
}

/// Runs against the entity surface after its renderer, before compositing.
pub type PostProcessor = Box<dyn FnMut(&mut Surface, &SequenceView<'_>) -> BeatlineResult<()>>;

/// Lifetime window relative to the owning scene's start.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Lifetime {
    /// Delay after the scene start; `None` means from the start.
    pub start_offset_ms: Option<f64>,
    /// Length of the window; `None` means until the scene ends.
    pub duration_ms: Option<f64>,
}

impl Lifetime {
    /// Active for the whole scene.
    pub const ALWAYS: Self = Self {
        start_offset_ms: None,
        duration_ms: None,
    };

    /// Time since the lifetime window opened. Negative before it.
    pub fn elapsed_ms(&self, timestamp_ms: f64, scene_start_ms: f64) -> f64 {
        timestamp_ms - scene_start_ms - self.start_offset_ms.unwrap_or(0.0)
    }

    /// `0 <= elapsed <= duration`, inclusive on both ends. Always true when
    /// neither bound is set.
    pub fn is_active(&self, timestamp_ms: f64, scene_start_ms: f64) -> bool {
        if self.start_offset_ms.is_none() && self.duration_ms.is_none() {
            return true;
        }
        let elapsed = self.elapsed_ms(timestamp_ms, scene_start_ms);
        elapsed >= 0.0 && elapsed <= self.duration_ms.unwrap_or(f64::INFINITY)
    }
}

/// A renderable unit with its own offscreen surface.
pub struct Entity {
    key: String,
    size: Option<Size>,
    position: Vec2,
    opacity: f32,
    lifetime: Lifetime,
    props: Value,
    renderer: Option<Box<dyn Renderer>>,
    surface: Surface,
    post_processors: Vec<PostProcessor>,
    bar_listeners: Listeners<MusicalPosition>,
    beat_listeners: Listeners<MusicalPosition>,
    tick_listeners: Listeners<MusicalPosition>,
}

impl Entity {
    /// An inert entity: no renderer, always active, 0x0 until sized or added to a scene.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            size: None,
            position: Vec2::ZERO,
            opacity: 1.0,
            lifetime: Lifetime::ALWAYS,
            props: Value::Null,
            renderer: None,
            surface: Surface::new(Size::new(0, 0)),
            post_processors: Vec::new(),
            bar_listeners: Listeners::new(),
            beat_listeners: Listeners::new(),
            tick_listeners: Listeners::new(),
        }
    }

    /// Shader-backed entity. Fails when the fragment source is empty or the
    /// program does not compile.
    pub fn shader(
        key: impl Into<String>,
        source: ShaderSource,
        program: Box<dyn ShaderProgram>,
    ) -> BeatlineResult<Self> {
        let renderer = ShaderRenderer::new(source, program)?;
        Ok(Self::new(key).with_renderer(Box::new(renderer)))
    }

    /// Size of the entity surface. Without it the scene size is used.
    pub fn with_size(mut self, size: Size) -> Self {
        self.size = Some(size);
        self.surface = Surface::new(size);
        self
    }

    /// Offset of the surface on the shared target.
    pub fn with_position(mut self, position: Vec2) -> Self {
        self.position = position;
        self
    }

    /// Composite opacity, clamped to `[0, 1]`.
    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity.clamp(0.0, 1.0);
        self
    }

    /// Restrict the entity to a scene-relative window.
    pub fn with_lifetime(mut self, start_offset_ms: Option<f64>, duration_ms: Option<f64>) -> Self {
        self.lifetime = Lifetime {
            start_offset_ms,
            duration_ms,
        };
        self
    }

    /// Initial props.
    pub fn with_props(mut self, props: Value) -> Self {
        self.props = props;
        self
    }

    /// Draw with a closure.
    pub fn with_action<F>(self, f: F) -> Self
    where
        F: FnMut(&FrameCtx<'_>, &mut Surface, &mut Value) -> BeatlineResult<()> + 'static,
    {
        self.with_renderer(action_renderer(f))
    }

    /// Draw with a custom renderer.
    pub fn with_renderer(mut self, renderer: Box<dyn Renderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Builder form of [`add_post_processor`](Self::add_post_processor).
    pub fn with_post_processor<F>(mut self, f: F) -> Self
    where
        F: FnMut(&mut Surface, &SequenceView<'_>) -> BeatlineResult<()> + 'static,
    {
        self.add_post_processor(f);
        self
    }

    /// Run `f` on the entity surface after rendering.
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

    /// Listener for bar changes seen by this entity.
    pub fn on_bar(&mut self, f: impl FnMut(&MusicalPosition) -> BeatlineResult<()> + 'static) {
        self.bar_listeners.push(f);
    }

    /// Listener for beats seen by this entity.
    pub fn on_beat(&mut self, f: impl FnMut(&MusicalPosition) -> BeatlineResult<()> + 'static) {
        self.beat_listeners.push(f);
    }

    /// Listener for ticks seen by this entity.
    pub fn on_tick(&mut self, f: impl FnMut(&MusicalPosition) -> BeatlineResult<()> + 'static) {
        self.tick_listeners.push(f);
    }

    /// Lookup key, unique within a scene by convention.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Explicit size, if one was set.
    pub fn explicit_size(&self) -> Option<Size> {
        self.size
    }

    /// Surface size.
    pub fn size(&self) -> Size {
        self.surface.size()
    }

    /// Composite offset.
    pub fn position(&self) -> Vec2 {
        self.position
    }

    /// Scene-relative lifetime window.
    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    /// Current props.
    pub fn props(&self) -> &Value {
        &self.props
    }

    /// Mutable props, as used by conductor actions.
    pub fn props_mut(&mut self) -> &mut Value {
        &mut self.props
    }

    /// Last rendered image.
    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    /// Whether a renderer is attached.
    pub fn has_renderer(&self) -> bool {
        self.renderer.is_some()
    }

    /// Number of attached post-processors.
    pub fn post_processor_count(&self) -> usize {
        self.post_processors.len()
    }

    /// Whether the lifetime window contains `timestamp_ms`.
    pub fn is_active(&self, timestamp_ms: f64, scene_start_ms: f64) -> bool {
        self.lifetime.is_active(timestamp_ms, scene_start_ms)
    }

    /// Adopt the scene's size unless an explicit one was set.
    pub(crate) fn bind(&mut self, scene_size: Size) {
        if self.size.is_none() && self.surface.size() != scene_size {
            self.surface = Surface::new(scene_size);
        }
    }

    /// Clear the surface and run the renderer, if the entity is active at
    /// `timestamp_ms`. Returns whether the entity was active.
    ///
    /// An inactive entity is left untouched and keeps its last frame.
    pub fn update(
        &mut self,
        timestamp_ms: f64,
        scene_start_ms: f64,
        sequence: Option<&SequenceView<'_>>,
    ) -> BeatlineResult<bool> {
        if !self.is_active(timestamp_ms, scene_start_ms) {
            return Ok(false);
        }
        self.surface.clear();
        if let Some(renderer) = self.renderer.as_mut() {
            let frame = FrameCtx {
                timestamp_ms,
                elapsed_ms: self.lifetime.elapsed_ms(timestamp_ms, scene_start_ms),
                sequence,
            };
            renderer.render(&frame, &mut self.surface, &mut self.props)?;
        }
        Ok(true)
    }

    /// Run post-processors in registration order, then draw onto `dest` at the
    /// entity position. Skipped (returns `false`) when inactive at the view's time.
    ///
    /// A failing post-processor is logged; the rest still run.
    pub fn copy_to_target(&mut self, dest: &mut Surface, view: &SequenceView<'_>) -> bool {
        if !self.is_active(view.time_ms, view.scene_start_ms()) {
            return false;
        }
        for (index, post) in self.post_processors.iter_mut().enumerate() {
            if let Err(err) = post(&mut self.surface, view) {
                tracing::warn!(entity = %self.key, index, %err, "post-processor failed");
            }
        }
        dest.draw_surface(&self.surface, self.position, self.opacity);
        true
    }

    /// Fire this entity's listener lists for the events in `events`, bar first.
    pub(crate) fn dispatch_transport(&mut self, events: TransportEvents, pos: &MusicalPosition) {
        if events.bar {
            self.bar_listeners.dispatch(pos, "entity.bar");
        }
        if events.beat {
            self.beat_listeners.dispatch(pos, "entity.beat");
        }
        if events.tick {
            self.tick_listeners.dispatch(pos, "entity.tick");
        }
    }
}

impl std::fmt::Debug for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entity")
            .field("key", &self.key)
            .field("size", &self.surface.size())
            .field("position", &self.position)
            .field("lifetime", &self.lifetime)
            .field("has_renderer", &self.renderer.is_some())
            .field("post_processors", &self.post_processors.len())
            .finish()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/entity.rs"]
mod tests;
