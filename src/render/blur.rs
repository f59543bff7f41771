use crate::{
    foundation::error::{BeatlineError, BeatlineResult},
    render::surface::Surface,
};

/// Separable Gaussian blur of a premultiplied surface, in place.
///
/// Weights are 16.16 fixed point and sum to exactly `1 << 16`, so flat regions
/// come out unchanged.
pub fn blur_surface_in_place(surface: &mut Surface, radius: u32, sigma: f32) -> BeatlineResult<()> {
    if radius == 0 || surface.width() == 0 || surface.height() == 0 {
        return Ok(());
    }
    let kernel = gaussian_kernel_q16(radius, sigma)?;
    let (w, h) = (surface.width() as usize, surface.height() as usize);

    let mut tmp = vec![0u8; surface.data().len()];
    convolve(surface.data(), &mut tmp, w, h, &kernel, Axis::X);
    convolve(&tmp, surface.data_mut(), w, h, &kernel, Axis::Y);
    Ok(())
}

#[derive(Clone, Copy)]
enum Axis {
    X,
    Y,
}

fn gaussian_kernel_q16(radius: u32, sigma: f32) -> BeatlineResult<Vec<u32>> {
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(BeatlineError::validation("blur sigma must be finite and > 0"));
    }
    let r = radius as i64;
    let two_sigma_sq = 2.0 * f64::from(sigma) * f64::from(sigma);
    let raw: Vec<f64> = (-r..=r)
        .map(|i| (-((i * i) as f64) / two_sigma_sq).exp())
        .collect();
    let sum: f64 = raw.iter().sum();
    if sum <= 0.0 {
        return Err(BeatlineError::render("gaussian kernel sum is zero"));
    }

    let mut weights: Vec<u32> = raw
        .iter()
        .map(|w| ((w / sum) * 65536.0).round().clamp(0.0, 65536.0) as u32)
        .collect();
    let total: i64 = weights.iter().map(|&w| i64::from(w)).sum();
    let mid = weights.len() / 2;
    weights[mid] = (i64::from(weights[mid]) + (65536 - total)).clamp(0, 65536) as u32;
    Ok(weights)
}

fn convolve(src: &[u8], dst: &mut [u8], w: usize, h: usize, kernel: &[u32], axis: Axis) {
    let radius = (kernel.len() / 2) as i64;
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0u64; 4];
            for (k, &kw) in kernel.iter().enumerate() {
                let d = k as i64 - radius;
                let (sx, sy) = match axis {
                    Axis::X => ((x as i64 + d).clamp(0, w as i64 - 1) as usize, y),
                    Axis::Y => (x, (y as i64 + d).clamp(0, h as i64 - 1) as usize),
                };
                let si = (sy * w + sx) * 4;
                for (c, a) in acc.iter_mut().enumerate() {
                    *a += u64::from(kw) * u64::from(src[si + c]);
                }
            }
            let di = (y * w + x) * 4;
            for (c, a) in acc.iter().enumerate() {
                dst[di + c] = ((a + 32768) >> 16).min(255) as u8;
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/blur.rs"]
mod tests;
