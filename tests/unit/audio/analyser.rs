use super::*;

const RATE: u32 = 48_000;
const N: usize = 1024;
// Bin 64 of a 1024-point FFT at 48 kHz.
const TONE_HZ: f32 = 3000.0;

fn sine(amplitude: f32, seconds: f32) -> DecodedAudio {
    let frames = (RATE as f32 * seconds) as usize;
    let mut pcm = Vec::with_capacity(frames * 2);
    for i in 0..frames {
        let v = amplitude * (2.0 * PI * TONE_HZ * i as f32 / RATE as f32).sin();
        pcm.push(v);
        pcm.push(v);
    }
    DecodedAudio::new(RATE, 2, pcm).unwrap()
}

fn argmax(bins: &[u8]) -> usize {
    bins.iter()
        .enumerate()
        .max_by_key(|(_, v)| **v)
        .map(|(i, _)| i)
        .unwrap()
}

#[test]
fn rejects_unsupported_fft_sizes() {
    for size in [0, 16, 1000, 65_536] {
        assert!(SpectrumAnalyser::new(sine(1.0, 0.1), size).is_err(), "{size}");
    }
    let a = SpectrumAnalyser::new(sine(1.0, 0.1), N).unwrap();
    assert_eq!(a.fft_size(), N);
    assert_eq!(a.frequency_bin_count(), N / 2);
}

#[test]
fn tone_peaks_in_its_bin() {
    let mut a = SpectrumAnalyser::new(sine(0.01, 1.0), N)
        .unwrap()
        .with_smoothing(0.0);
    let mut out = Vec::new();
    a.frequency_data(500.0, &mut out).unwrap();

    assert_eq!(out.len(), N / 2);
    assert_eq!(argmax(&out), 64);
    assert!(out[64] > out[63] && out[64] > out[65]);
    assert!(out[300] < 32, "far bin {} should be near the floor", out[300]);
}

#[test]
fn loud_tone_saturates() {
    let mut a = SpectrumAnalyser::new(sine(1.0, 1.0), N)
        .unwrap()
        .with_smoothing(0.0);
    let mut out = Vec::new();
    a.frequency_data(500.0, &mut out).unwrap();
    assert_eq!(out[64], 255);
}

#[test]
fn silence_and_past_end_map_to_zero() {
    let mut a = SpectrumAnalyser::new(sine(1.0, 0.1), N)
        .unwrap()
        .with_smoothing(0.0);
    let mut out = vec![7u8; 3];
    a.frequency_data(10_000.0, &mut out).unwrap();
    assert_eq!(out.len(), N / 2);
    assert!(out.iter().all(|&v| v == 0));
}

#[test]
fn smoothing_ramps_towards_the_raw_level() {
    let mut raw = SpectrumAnalyser::new(sine(0.01, 1.0), N)
        .unwrap()
        .with_smoothing(0.0);
    let mut smooth = SpectrumAnalyser::new(sine(0.01, 1.0), N).unwrap();
    let mut out = Vec::new();

    raw.frequency_data(500.0, &mut out).unwrap();
    let target = out[64];

    let mut levels = Vec::new();
    for _ in 0..4 {
        smooth.frequency_data(500.0, &mut out).unwrap();
        levels.push(out[64]);
    }
    assert!(levels[0] < target);
    assert!(levels.windows(2).all(|w| w[0] <= w[1]), "{levels:?}");
    assert!(levels[3] <= target);
}

#[test]
fn window_start_before_zero_is_padded() {
    let mut a = SpectrumAnalyser::new(sine(1.0, 1.0), N).unwrap();
    let mut out = Vec::new();
    a.frequency_data(0.0, &mut out).unwrap();
    assert_eq!(out.len(), N / 2);
}
