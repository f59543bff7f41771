use std::{f32::consts::PI, fmt, sync::Arc};

use realfft::{RealFftPlanner, RealToComplex, num_complex::Complex32};

use crate::{
    assets::loader::DecodedAudio,
    foundation::error::{BeatlineError, BeatlineResult},
};

/// FFT window length used when none is given.
pub const DEFAULT_FFT_SIZE: usize = 2048;
/// Default smoothing between successive spectra.
pub const DEFAULT_SMOOTHING: f32 = 0.8;
/// Decibel level mapped to byte `0`.
pub const MIN_DECIBELS: f32 = -100.0;
/// Decibel level mapped to byte `255`.
pub const MAX_DECIBELS: f32 = -30.0;

/// Frequency analysis source polled once per rendered frame.
pub trait AudioAnalyser {
    /// Bins per spectrum, half the FFT size.
    fn frequency_bin_count(&self) -> usize;

    /// Overwrite `out` with one byte per bin for playback position `time_ms`.
    fn frequency_data(&mut self, time_ms: f64, out: &mut Vec<u8>) -> BeatlineResult<()>;
}

/// Byte spectrum of decoded audio at the playback position.
///
/// Takes a Hann-windowed FFT of the mono mixdown centred on the requested time,
/// smooths magnitudes across calls and maps decibels in
/// `[MIN_DECIBELS, MAX_DECIBELS]` onto `0..=255`.
pub struct SpectrumAnalyser {
    audio: DecodedAudio,
    fft_size: usize,
    smoothing: f32,
    plan: Arc<dyn RealToComplex<f32>>,
    input: Vec<f32>,
    spectrum: Vec<Complex32>,
    scratch: Vec<Complex32>,
    window: Vec<f32>,
    smoothed: Vec<f32>,
}

impl SpectrumAnalyser {
    /// Analyser over `audio` with a power-of-two `fft_size` in `32..=32768`.
    pub fn new(audio: DecodedAudio, fft_size: usize) -> BeatlineResult<Self> {
        if !fft_size.is_power_of_two() || !(32..=32_768).contains(&fft_size) {
            return Err(BeatlineError::validation(format!(
                "fft size must be a power of two in 32..=32768 (got {fft_size})"
            )));
        }
        let mut planner = RealFftPlanner::<f32>::new();
        let plan = planner.plan_fft_forward(fft_size);
        let input = plan.make_input_vec();
        let spectrum = plan.make_output_vec();
        let scratch = plan.make_scratch_vec();
        let window = (0..fft_size).map(|i| hann_value(i, fft_size)).collect();
        Ok(Self {
            audio,
            fft_size,
            smoothing: DEFAULT_SMOOTHING,
            plan,
            input,
            spectrum,
            scratch,
            window,
            smoothed: vec![0.0; fft_size / 2],
        })
    }

    /// Smoothing factor in `[0, 1)`; `0` disables smoothing.
    pub fn with_smoothing(mut self, smoothing: f32) -> Self {
        self.smoothing = smoothing.clamp(0.0, 0.99);
        self
    }

    /// FFT window length in samples.
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// The clip being analysed.
    pub fn audio(&self) -> &DecodedAudio {
        &self.audio
    }
}

impl AudioAnalyser for SpectrumAnalyser {
    fn frequency_bin_count(&self) -> usize {
        self.fft_size / 2
    }

    fn frequency_data(&mut self, time_ms: f64, out: &mut Vec<u8>) -> BeatlineResult<()> {
        let n = self.fft_size;
        let center = (time_ms.max(0.0) * f64::from(self.audio.sample_rate()) / 1000.0) as i64;
        let start = center - (n / 2) as i64;
        for (i, slot) in self.input.iter_mut().enumerate() {
            let frame = start + i as i64;
            let s = if frame < 0 {
                0.0
            } else {
                self.audio.mono_at(frame as usize)
            };
            *slot = s * self.window[i];
        }

        self.plan
            .process_with_scratch(&mut self.input, &mut self.spectrum, &mut self.scratch)
            .map_err(|e| BeatlineError::render(format!("fft failed: {e}")))?;

        let range = MAX_DECIBELS - MIN_DECIBELS;
        out.clear();
        for (bin, smoothed) in self.spectrum.iter().zip(self.smoothed.iter_mut()) {
            let mag = bin.norm() / n as f32;
            *smoothed = self.smoothing * *smoothed + (1.0 - self.smoothing) * mag;
            let db = if *smoothed > 0.0 {
                20.0 * smoothed.log10()
            } else {
                f32::NEG_INFINITY
            };
            let scaled = 255.0 * (db - MIN_DECIBELS) / range;
            out.push(scaled.clamp(0.0, 255.0) as u8);
        }
        Ok(())
    }
}

impl fmt::Debug for SpectrumAnalyser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectrumAnalyser")
            .field("fft_size", &self.fft_size)
            .field("smoothing", &self.smoothing)
            .field("audio_ms", &self.audio.duration_ms())
            .finish()
    }
}

fn hann_value(index: usize, len: usize) -> f32 {
    if len <= 1 {
        return 1.0;
    }
    0.5 - 0.5 * ((2.0 * PI * index as f32) / (len as f32 - 1.0)).cos()
}

#[cfg(test)]
#[path = "../../tests/unit/audio/analyser.rs"]
mod tests;
