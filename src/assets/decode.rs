use std::path::Path;

use anyhow::Context;

use crate::{
    assets::loader::DecodedAudio,
    foundation::error::{BeatlineError, BeatlineResult},
    render::surface::Surface,
};

/// Sample rate every audio asset is decoded to.
pub const AUDIO_SAMPLE_RATE: u32 = 48_000;

/// Decode an encoded raster image into a premultiplied surface.
pub fn decode_image(bytes: &[u8]) -> BeatlineResult<Surface> {
    let dyn_img = image::load_from_memory(bytes).context("decode image from memory")?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut data = rgba.into_raw();
    premultiply_rgba8_in_place(&mut data);
    Surface::from_rgba8_premul(width, height, data)
}

fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = u16::from(px[3]);
        for c in px.iter_mut().take(3) {
            *c = ((u16::from(*c) * a + 127) / 255) as u8;
        }
    }
}

/// Decode any ffmpeg-readable file to interleaved stereo `f32` at `sample_rate`.
#[cfg(feature = "media-ffmpeg")]
pub fn decode_audio_f32_stereo(path: &Path, sample_rate: u32) -> BeatlineResult<DecodedAudio> {
    let out = std::process::Command::new("ffmpeg")
        .args(["-v", "error", "-i"])
        .arg(path)
        .args([
            "-vn",
            "-f",
            "f32le",
            "-acodec",
            "pcm_f32le",
            "-ac",
            "2",
            "-ar",
            &sample_rate.to_string(),
            "pipe:1",
        ])
        .output()
        .map_err(|e| BeatlineError::asset(format!("failed to run ffmpeg: {e}")))?;

    if !out.status.success() {
        return Err(BeatlineError::asset(format!(
            "ffmpeg audio decode failed for '{}': {}",
            path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }
    if out.stdout.len() % 4 != 0 {
        return Err(BeatlineError::asset(
            "decoded audio byte length is not aligned to f32 samples",
        ));
    }

    let pcm: Vec<f32> = out
        .stdout
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    DecodedAudio::new(sample_rate, 2, pcm)
}

/// Without the `media-ffmpeg` feature audio cannot be decoded; always an asset error.
#[cfg(not(feature = "media-ffmpeg"))]
pub fn decode_audio_f32_stereo(path: &Path, _sample_rate: u32) -> BeatlineResult<DecodedAudio> {
    Err(BeatlineError::asset(format!(
        "cannot decode '{}': audio assets require the 'media-ffmpeg' feature",
        path.display()
    )))
}

#[cfg(test)]
#[path = "../../tests/unit/assets/decode.rs"]
mod tests;
