use serde_json::Value;

use crate::{
    foundation::error::{BeatlineError, BeatlineResult},
    render::surface::Surface,
    scene::entity::{FrameCtx, Renderer},
};

/// Shader sources for a shader-backed entity. The engine only checks presence;
/// compiling is the program's job.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ShaderSource {
    /// Optional vertex stage.
    #[serde(default)]
    pub vertex: Option<String>,
    /// Fragment stage; must be non-empty.
    pub fragment: String,
}

impl ShaderSource {
    /// Fragment-only source.
    pub fn fragment(fragment: impl Into<String>) -> Self {
        Self {
            vertex: None,
            fragment: fragment.into(),
        }
    }
}

/// A compiled shader backend driven once per active frame.
pub trait ShaderProgram {
    /// Compile `source`. Called once when the renderer is built.
    fn compile(&mut self, source: &ShaderSource) -> BeatlineResult<()>;

    /// Render at `time_secs` (entity-relative) into `target`.
    fn update(&mut self, time_secs: f64, target: &mut Surface, props: &Value)
    -> BeatlineResult<()>;
}

/// [`Renderer`] that runs an optional action, then the shader program.
pub struct ShaderRenderer {
    source: ShaderSource,
    program: Box<dyn ShaderProgram>,
    action: Option<Box<dyn Renderer>>,
}

impl ShaderRenderer {
    /// Validate the source and compile it with `program`.
    pub fn new(source: ShaderSource, mut program: Box<dyn ShaderProgram>) -> BeatlineResult<Self> {
        if source.fragment.trim().is_empty() {
            return Err(BeatlineError::validation(
                "shader entity requires a fragment shader source",
            ));
        }
        program.compile(&source)?;
        Ok(Self {
            source,
            program,
            action: None,
        })
    }

    /// Action run before the shader each frame.
    pub fn with_action(mut self, action: Box<dyn Renderer>) -> Self {
        self.action = Some(action);
        self
    }

    /// Source the program was compiled from.
    pub fn source(&self) -> &ShaderSource {
        &self.source
    }
}

impl Renderer for ShaderRenderer {
    fn render(
        &mut self,
        frame: &FrameCtx<'_>,
        target: &mut Surface,
        props: &mut Value,
    ) -> BeatlineResult<()> {
        if let Some(action) = self.action.as_mut() {
            action.render(frame, target, props)?;
        }
        self.program.update(frame.elapsed_ms / 1000.0, target, props)
    }
}

impl std::fmt::Debug for ShaderRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShaderRenderer")
            .field("source", &self.source)
            .field("has_action", &self.action.is_some())
            .finish()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/shader.rs"]
mod tests;
