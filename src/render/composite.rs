use crate::effects::transitions::WipeDir;
use crate::foundation::error::{BeatlineError, BeatlineResult};
use crate::foundation::math::mul_div255_u8 as mul_div255;

/// One premultiplied pixel as `[r, g, b, a]`.
pub type PremulRgba8 = [u8; 4];

/// Source-over of `src` onto `dst`, with `src` scaled by `opacity`.
pub fn over(dst: PremulRgba8, src: PremulRgba8, opacity: f32) -> PremulRgba8 {
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 || src[3] == 0 {
        return dst;
    }

    let op = ((opacity * 255.0).round() as i32).clamp(0, 255) as u16;
    let sa = mul_div255(u16::from(src[3]), op);
    if sa == 0 {
        return dst;
    }

    let inv = 255u16 - u16::from(sa);

    let mut out = [0u8; 4];
    out[3] = sa.saturating_add(mul_div255(u16::from(dst[3]), inv));

    for i in 0..3 {
        let sc = mul_div255(u16::from(src[i]), op);
        let dc = mul_div255(u16::from(dst[i]), inv);
        out[i] = sc.saturating_add(dc);
    }
    out
}

/// Linear blend from `a` (`t = 0`) to `b` (`t = 1`).
pub fn crossfade(a: PremulRgba8, b: PremulRgba8, t: f32) -> PremulRgba8 {
    let t = t.clamp(0.0, 1.0);
    let tt = ((t * 255.0).round() as i32).clamp(0, 255) as u16;
    let it = 255u16 - tt;

    let mut out = [0u8; 4];
    for i in 0..4 {
        let av = mul_div255(u16::from(a[i]), it);
        let bv = mul_div255(u16::from(b[i]), tt);
        out[i] = av.saturating_add(bv);
    }
    out
}

/// Multiplies every channel (premultiplied) by `factor`.
pub fn scale_in_place(buf: &mut [u8], factor: f32) {
    let f = ((factor.clamp(0.0, 1.0) * 255.0).round() as i32).clamp(0, 255) as u16;
    if f == 255 {
        return;
    }
    for c in buf.iter_mut() {
        *c = mul_div255(u16::from(*c), f);
    }
}

/// Blends every pixel toward `color`: `t = 0` leaves the buffer, `t = 1` is solid `color`.
pub fn fade_toward_in_place(buf: &mut [u8], color: PremulRgba8, t: f32) -> BeatlineResult<()> {
    if buf.len() % 4 != 0 {
        return Err(BeatlineError::render(
            "fade_toward_in_place expects an rgba8 buffer",
        ));
    }
    if t <= 0.0 {
        return Ok(());
    }
    for px in buf.chunks_exact_mut(4) {
        let out = crossfade([px[0], px[1], px[2], px[3]], color, t);
        px.copy_from_slice(&out);
    }
    Ok(())
}

/// Geometry and progress of a wipe.
#[derive(Clone, Copy, Debug)]
pub struct WipeParams {
    /// Surface width.
    pub width: u32,
    /// Surface height.
    pub height: u32,
    /// Revealed fraction in `[0, 1]`.
    pub t: f32,
    /// Direction of travel.
    pub dir: WipeDir,
    /// Width of the soft edge as a fraction of the travel axis.
    pub soft_edge: f32,
}

/// Reveals `buf` along a moving edge: pixels ahead of the edge are replaced by `hidden`.
/// `t = 0` hides everything, `t = 1` shows the buffer untouched.
pub fn wipe_reveal_in_place(
    buf: &mut [u8],
    hidden: PremulRgba8,
    params: WipeParams,
) -> BeatlineResult<()> {
    let WipeParams {
        width,
        height,
        t,
        dir,
        soft_edge,
    } = params;
    let expected_len = (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(4))
        .ok_or_else(|| BeatlineError::render("wipe buffer size overflow"))?;
    if buf.len() != expected_len {
        return Err(BeatlineError::render(
            "wipe_reveal_in_place expects a buffer matching width*height*4",
        ));
    }

    let t = t.clamp(0.0, 1.0);
    let soft_edge = soft_edge.max(0.0);

    let axis_len = match dir {
        WipeDir::LeftToRight | WipeDir::RightToLeft => width as f32,
        WipeDir::TopToBottom | WipeDir::BottomToTop => height as f32,
    };
    let soft_px = soft_edge * axis_len;

    let edge = t * (axis_len + 2.0 * soft_px) - soft_px;
    let a_edge = edge - soft_px;
    let b_edge = edge + soft_px;

    for y in 0..height {
        for x in 0..width {
            let pos = match dir {
                WipeDir::LeftToRight => x as f32,
                WipeDir::RightToLeft => (width - 1 - x) as f32,
                WipeDir::TopToBottom => y as f32,
                WipeDir::BottomToTop => (height - 1 - y) as f32,
            };

            // 1.0 = revealed
            let m = if soft_px <= 0.0 {
                if pos < edge { 1.0 } else { 0.0 }
            } else {
                1.0 - smoothstep(a_edge, b_edge, pos)
            };

            let idx = ((y as usize) * (width as usize) + (x as usize)) * 4;
            let px = [buf[idx], buf[idx + 1], buf[idx + 2], buf[idx + 3]];
            buf[idx..idx + 4].copy_from_slice(&crossfade(hidden, px, m));
        }
    }

    Ok(())
}

fn smoothstep(a: f32, b: f32, x: f32) -> f32 {
    if x <= a {
        return 0.0;
    }
    if x >= b {
        return 1.0;
    }
    let t = (x - a) / (b - a);
    (t * t * (3.0 - 2.0 * t)).clamp(0.0, 1.0)
}

#[cfg(test)]
#[path = "../../tests/unit/render/composite.rs"]
mod tests;
