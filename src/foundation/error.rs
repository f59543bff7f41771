/// Convenience result type used across beatline.
pub type BeatlineResult<T> = Result<T, BeatlineError>;

/// Top-level error taxonomy used by engine APIs.
#[derive(thiserror::Error, Debug)]
pub enum BeatlineError {
    /// Invalid user-provided configuration or timeline data.
    #[error("validation error: {0}")]
    Validation(String),

    /// A lookup the caller required to succeed came back empty.
    #[error("lookup error: {0}")]
    Lookup(String),

    /// Failures while drawing or compositing a frame.
    #[error("render error: {0}")]
    Render(String),

    /// Asset IO or decode failures.
    #[error("asset error: {0}")]
    Asset(String),

    /// Errors when serializing or deserializing data structures.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BeatlineError {
    /// Build a [`BeatlineError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`BeatlineError::Lookup`] value.
    pub fn lookup(msg: impl Into<String>) -> Self {
        Self::Lookup(msg.into())
    }

    /// Build a [`BeatlineError::Render`] value.
    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    /// Build a [`BeatlineError::Asset`] value.
    pub fn asset(msg: impl Into<String>) -> Self {
        Self::Asset(msg.into())
    }

    /// Build a [`BeatlineError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

impl From<serde_json::Error> for BeatlineError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serde(value.to_string())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
