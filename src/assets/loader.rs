use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context;

use crate::{
    assets::decode::{AUDIO_SAMPLE_RATE, decode_audio_f32_stereo, decode_image},
    foundation::error::{BeatlineError, BeatlineResult},
    render::surface::Surface,
};

/// Decoded audio clip stored as interleaved `f32` PCM.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedAudio {
    sample_rate: u32,
    channels: u16,
    interleaved_f32: Arc<Vec<f32>>,
}

impl DecodedAudio {
    /// Fails when the rate or channel count is zero, or the samples do not split evenly into frames.
    pub fn new(sample_rate: u32, channels: u16, interleaved_f32: Vec<f32>) -> BeatlineResult<Self> {
        if sample_rate == 0 {
            return Err(BeatlineError::asset("audio sample rate must be > 0"));
        }
        if channels == 0 {
            return Err(BeatlineError::asset("audio must have at least one channel"));
        }
        if interleaved_f32.len() % usize::from(channels) != 0 {
            return Err(BeatlineError::asset(
                "interleaved sample count is not a multiple of the channel count",
            ));
        }
        Ok(Self {
            sample_rate,
            channels,
            interleaved_f32: Arc::new(interleaved_f32),
        })
    }

    /// Samples per second per channel.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Interleaved channel count.
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Interleaved PCM samples.
    pub fn samples(&self) -> &[f32] {
        &self.interleaved_f32
    }

    /// Sample frames (one sample per channel).
    pub fn frame_count(&self) -> usize {
        self.interleaved_f32.len() / usize::from(self.channels)
    }

    /// Clip length in milliseconds.
    pub fn duration_ms(&self) -> f64 {
        self.frame_count() as f64 * 1000.0 / f64::from(self.sample_rate)
    }

    /// Average of all channels at `frame`; silence past the end.
    pub fn mono_at(&self, frame: usize) -> f32 {
        let ch = usize::from(self.channels);
        let start = frame * ch;
        match self.interleaved_f32.get(start..start + ch) {
            Some(s) => s.iter().sum::<f32>() / ch as f32,
            None => 0.0,
        }
    }
}

/// Source of decoded assets. Loads run before playback starts.
pub trait AssetLoader {
    /// Load and decode an image at a relative path.
    fn load_image(&mut self, path: &str) -> BeatlineResult<Arc<Surface>>;
    /// Load and decode an audio clip at a relative path.
    fn load_audio(&mut self, path: &str) -> BeatlineResult<DecodedAudio>;
}

/// Filesystem loader rooted at a directory, caching by normalized path.
#[derive(Debug)]
pub struct FsAssetLoader {
    root: PathBuf,
    images: HashMap<String, Arc<Surface>>,
    audio: HashMap<String, DecodedAudio>,
}

impl FsAssetLoader {
    /// Loader for paths relative to `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            images: HashMap::new(),
            audio: HashMap::new(),
        }
    }

    /// Directory every relative path resolves against.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of cached images plus audio clips.
    pub fn cached_len(&self) -> usize {
        self.images.len() + self.audio.len()
    }

    fn resolve(&self, norm: &str) -> PathBuf {
        self.root.join(norm)
    }
}

impl AssetLoader for FsAssetLoader {
    fn load_image(&mut self, path: &str) -> BeatlineResult<Arc<Surface>> {
        let norm = normalize_rel_path(path)?;
        if let Some(img) = self.images.get(&norm) {
            return Ok(img.clone());
        }
        let full = self.resolve(&norm);
        let bytes = std::fs::read(&full)
            .with_context(|| format!("read image '{}'", full.display()))
            .map_err(|e| BeatlineError::asset(format!("{e:#}")))?;
        let img = Arc::new(decode_image(&bytes)?);
        tracing::debug!(path = %norm, width = img.width(), height = img.height(), "image loaded");
        self.images.insert(norm, img.clone());
        Ok(img)
    }

    fn load_audio(&mut self, path: &str) -> BeatlineResult<DecodedAudio> {
        let norm = normalize_rel_path(path)?;
        if let Some(a) = self.audio.get(&norm) {
            return Ok(a.clone());
        }
        let full = self.resolve(&norm);
        if !full.is_file() {
            return Err(BeatlineError::asset(format!(
                "audio file '{}' does not exist",
                full.display()
            )));
        }
        let audio = decode_audio_f32_stereo(&full, AUDIO_SAMPLE_RATE)?;
        tracing::debug!(path = %norm, duration_ms = audio.duration_ms(), "audio loaded");
        self.audio.insert(norm, audio.clone());
        Ok(audio)
    }
}

/// Normalize a relative asset path to `/`-separated form. Rejects absolute
/// paths and `..` segments.
pub fn normalize_rel_path(source: &str) -> BeatlineResult<String> {
    let s = source.replace('\\', "/");
    if s.starts_with('/') {
        return Err(BeatlineError::validation("asset paths must be relative"));
    }
    if s.is_empty() {
        return Err(BeatlineError::validation("asset path must be non-empty"));
    }

    let mut out = Vec::<&str>::new();
    for part in s.split('/') {
        match part {
            "" | "." => continue,
            ".." => {
                return Err(BeatlineError::validation(
                    "asset paths must not contain '..'",
                ));
            }
            _ => out.push(part),
        }
    }
    if out.is_empty() {
        return Err(BeatlineError::validation(
            "asset path must contain a file name",
        ));
    }
    Ok(out.join("/"))
}

#[cfg(test)]
#[path = "../../tests/unit/assets/loader.rs"]
mod tests;
