use crate::{
    composition::model::EffectInstance,
    foundation::core::Vec2,
    foundation::error::{BeatlineError, BeatlineResult},
    render::blur::blur_surface_in_place,
    render::surface::Surface,
    scene::entity::PostProcessor,
    sequence::view::SequenceView,
};

/// Largest blur radius accepted from timeline documents.
pub const MAX_BLUR_RADIUS_PX: u32 = 64;

/// Built-in post-processing pass, usable on an entity or on the whole sequence.
#[derive(Clone, Debug, PartialEq)]
pub enum PostEffect {
    /// Invert colour channels, keeping alpha.
    Invert,
    /// Scale every channel by `value`.
    OpacityMul {
        /// Factor in `[0, 1]`.
        value: f32,
    },
    /// Separable gaussian blur.
    Blur {
        /// Kernel radius, at most [`MAX_BLUR_RADIUS_PX`].
        radius_px: u32,
        /// Gaussian standard deviation in pixels.
        sigma: f32,
    },
    /// Offsets the whole surface by a jitter drawn from the frame seed.
    Shake {
        /// Largest offset on either axis.
        amplitude_px: f32,
    },
}

impl PostEffect {
    /// Apply the effect to `target` in place.
    pub fn apply(&self, target: &mut Surface, view: &SequenceView<'_>) -> BeatlineResult<()> {
        match *self {
            PostEffect::Invert => {
                for px in target.data_mut().chunks_exact_mut(4) {
                    let a = px[3];
                    for c in px.iter_mut().take(3) {
                        *c = a.saturating_sub(*c);
                    }
                }
                Ok(())
            }
            PostEffect::OpacityMul { value } => {
                target.multiply_opacity(value);
                Ok(())
            }
            PostEffect::Blur { radius_px, sigma } => blur_surface_in_place(target, radius_px, sigma),
            PostEffect::Shake { amplitude_px } => {
                if amplitude_px <= 0.0 {
                    return Ok(());
                }
                let amp = f64::from(amplitude_px);
                let mut rng = view.rng_for("shake");
                let offset = Vec2::new(rng.range_f64(-amp, amp), rng.range_f64(-amp, amp));
                let src = target.clone();
                target.clear();
                target.draw_surface(&src, offset, 1.0);
                Ok(())
            }
        }
    }

    /// Box the effect as a post-processor.
    pub fn into_post_processor(self) -> PostProcessor {
        Box::new(move |target: &mut Surface, view: &SequenceView<'_>| self.apply(target, view))
    }
}

/// Parse a document effect. Unknown kinds and bad params are validation errors.
pub fn parse_post_effect(inst: &EffectInstance) -> BeatlineResult<PostEffect> {
    let kind = inst.kind.trim().to_ascii_lowercase();
    if kind.is_empty() {
        return Err(BeatlineError::validation("effect kind must be non-empty"));
    }

    match kind.as_str() {
        "invert" => Ok(PostEffect::Invert),
        "opacitymul" | "opacity_mul" | "opacity-mul" => {
            let value = get_f32(&inst.params, "value")?;
            if value < 0.0 {
                return Err(BeatlineError::validation(
                    "opacity_mul.value must be finite and >= 0",
                ));
            }
            Ok(PostEffect::OpacityMul { value })
        }
        "blur" => {
            let radius_px = get_u32(&inst.params, "radius_px")?;
            if radius_px > MAX_BLUR_RADIUS_PX {
                return Err(BeatlineError::validation(format!(
                    "blur.radius_px must be <= {MAX_BLUR_RADIUS_PX}"
                )));
            }
            let sigma = match inst.params.get("sigma") {
                Some(_) => {
                    let s = get_f32(&inst.params, "sigma")?;
                    if s <= 0.0 {
                        return Err(BeatlineError::validation("blur.sigma must be > 0"));
                    }
                    s
                }
                None => (radius_px as f32 / 2.0).max(0.5),
            };
            Ok(PostEffect::Blur { radius_px, sigma })
        }
        "shake" => {
            let amplitude_px = get_f32(&inst.params, "amplitude_px")?;
            if amplitude_px < 0.0 {
                return Err(BeatlineError::validation("shake.amplitude_px must be >= 0"));
            }
            Ok(PostEffect::Shake { amplitude_px })
        }
        _ => Err(BeatlineError::validation(format!(
            "unknown effect kind '{kind}'"
        ))),
    }
}

fn get_u32(obj: &serde_json::Value, key: &str) -> BeatlineResult<u32> {
    let v = obj
        .get(key)
        .ok_or_else(|| BeatlineError::validation(format!("missing effect param '{key}'")))?;
    let n = v.as_u64().ok_or_else(|| {
        BeatlineError::validation(format!("effect param '{key}' must be an integer"))
    })?;
    u32::try_from(n)
        .map_err(|_| BeatlineError::validation(format!("effect param '{key}' is out of range")))
}

fn get_f32(obj: &serde_json::Value, key: &str) -> BeatlineResult<f32> {
    let v = obj
        .get(key)
        .ok_or_else(|| BeatlineError::validation(format!("missing effect param '{key}'")))?;
    let n = v.as_f64().ok_or_else(|| {
        BeatlineError::validation(format!("effect param '{key}' must be a number"))
    })? as f32;
    if !n.is_finite() {
        return Err(BeatlineError::validation(format!(
            "effect param '{key}' must be finite"
        )));
    }
    Ok(n)
}

#[cfg(test)]
#[path = "../../tests/unit/effects/fx.rs"]
mod tests;
