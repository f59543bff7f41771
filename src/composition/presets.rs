//! Built-in entity factories registered by [`EntityRegistry::with_builtins`].
//!
//! Props are read on every frame, so conductor `set_props` events take effect
//! immediately. Factories parse them once up front to reject bad documents.

use serde_json::Value;

use crate::{
    composition::dsl::EntityRegistry,
    foundation::core::Rgba8Premul,
    foundation::error::{BeatlineError, BeatlineResult},
    foundation::math::{SplitMix64, frame_seed},
    scene::entity::{Entity, FrameCtx},
};

pub(crate) fn register_builtins(r: &mut EntityRegistry) {
    r.register("solid", solid);
    r.register("beat_flash", beat_flash);
    r.register("spectrum_bars", spectrum_bars);
    r.register("noise", noise);
}

/// Fills its surface with `color`.
fn solid(key: &str, props: &Value) -> BeatlineResult<Entity> {
    color_prop(props, "#ffffff")?;
    Ok(Entity::new(key)
        .with_props(props.clone())
        .with_action(|_frame, target, props| {
            target.fill(color_prop(props, "#ffffff")?);
            Ok(())
        }))
}

/// Full-surface flash on every beat the transport fires, fading over `decay_ms`.
/// Follows the polled beats, so a late beat flashes late.
fn beat_flash(key: &str, props: &Value) -> BeatlineResult<Entity> {
    color_prop(props, "#ffffff")?;
    positive_prop(props, "decay_ms", 250.0)?;
    Ok(Entity::new(key)
        .with_props(props.clone())
        .with_action(|frame, target, props| {
            let Some(view) = frame.sequence else {
                return Ok(());
            };
            let decay = positive_prop(props, "decay_ms", 250.0)?;
            let level = (1.0 - view.beat_phase_ms() / decay).clamp(0.0, 1.0);
            if level > 0.0 {
                target.fill(color_prop(props, "#ffffff")?);
                target.multiply_opacity(level as f32);
            }
            Ok(())
        }))
}

/// Bottom-aligned bar graph of the frequency data. Draws nothing without audio.
fn spectrum_bars(key: &str, props: &Value) -> BeatlineResult<Entity> {
    color_prop(props, "#ffffff")?;
    count_prop(props, "bars", 32)?;
    Ok(Entity::new(key)
        .with_props(props.clone())
        .with_action(|frame, target, props| {
            let Some(fft) = frame.sequence.and_then(|v| v.fft_data) else {
                return Ok(());
            };
            if fft.is_empty() {
                return Ok(());
            }
            let color = color_prop(props, "#ffffff")?;
            let bars = count_prop(props, "bars", 32)?.min(fft.len());
            let (w, h) = (target.width(), target.height());
            let bar_w = (w as usize / bars).max(1);
            let per_bar = fft.len() / bars;
            for i in 0..bars {
                let chunk = &fft[i * per_bar..(i + 1) * per_bar];
                let avg = chunk.iter().map(|&v| u32::from(v)).sum::<u32>() / chunk.len() as u32;
                let bar_h = (avg * h) / 255;
                target.fill_rect(
                    (i * bar_w) as i64,
                    i64::from(h - bar_h),
                    (bar_w as u32).saturating_sub(1).max(1),
                    bar_h,
                    color,
                );
            }
            Ok(())
        }))
}

/// Random single pixels covering `density` of the surface, reseeded per frame
/// from the sequence seed and the entity key.
fn noise(key: &str, props: &Value) -> BeatlineResult<Entity> {
    color_prop(props, "#ffffff")?;
    unit_prop(props, "density", 0.05)?;
    let owned_key = key.to_string();
    Ok(Entity::new(key)
        .with_props(props.clone())
        .with_action(move |frame: &FrameCtx<'_>, target, props| {
            let color = color_prop(props, "#ffffff")?;
            let density = unit_prop(props, "density", 0.05)?;
            let mut rng = match frame.sequence {
                Some(view) => view.rng_for(&owned_key),
                None => SplitMix64::new(frame_seed(0, &owned_key, frame.timestamp_ms)),
            };
            let (w, h) = (target.width(), target.height());
            if w == 0 || h == 0 {
                return Ok(());
            }
            let count = (density * f64::from(w) * f64::from(h)).round() as u64;
            for _ in 0..count {
                let x = (rng.next_u64() % u64::from(w)) as u32;
                let y = (rng.next_u64() % u64::from(h)) as u32;
                target.put_pixel(x, y, color);
            }
            Ok(())
        }))
}

fn color_prop(props: &Value, default: &str) -> BeatlineResult<Rgba8Premul> {
    match props.get("color") {
        None => Rgba8Premul::parse_hex(default),
        Some(Value::String(s)) => Rgba8Premul::parse_hex(s),
        Some(_) => Err(BeatlineError::validation("prop 'color' must be a hex string")),
    }
}

fn number_prop(props: &Value, key: &str, default: f64) -> BeatlineResult<f64> {
    match props.get(key) {
        None => Ok(default),
        Some(v) => v
            .as_f64()
            .filter(|n| n.is_finite())
            .ok_or_else(|| BeatlineError::validation(format!("prop '{key}' must be a finite number"))),
    }
}

fn positive_prop(props: &Value, key: &str, default: f64) -> BeatlineResult<f64> {
    let v = number_prop(props, key, default)?;
    if v <= 0.0 {
        return Err(BeatlineError::validation(format!("prop '{key}' must be > 0")));
    }
    Ok(v)
}

fn unit_prop(props: &Value, key: &str, default: f64) -> BeatlineResult<f64> {
    let v = number_prop(props, key, default)?;
    if !(0.0..=1.0).contains(&v) {
        return Err(BeatlineError::validation(format!("prop '{key}' must be in [0, 1]")));
    }
    Ok(v)
}

fn count_prop(props: &Value, key: &str, default: usize) -> BeatlineResult<usize> {
    match props.get(key) {
        None => Ok(default),
        Some(v) => v
            .as_u64()
            .filter(|&n| n > 0)
            .map(|n| n as usize)
            .ok_or_else(|| BeatlineError::validation(format!("prop '{key}' must be a positive integer"))),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/composition/presets.rs"]
mod tests;
