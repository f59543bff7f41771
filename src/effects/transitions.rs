use crate::{
    composition::model::TransitionSpec,
    foundation::core::Rgba8Premul,
    foundation::error::{BeatlineError, BeatlineResult},
    render::composite::{WipeParams, fade_toward_in_place, wipe_reveal_in_place},
    render::surface::Surface,
    scene::model::{SceneInfo, TransitionFn},
};

/// Direction a wipe travels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WipeDir {
    /// Reveal from the left edge.
    LeftToRight,
    /// Reveal from the right edge.
    RightToLeft,
    /// Reveal from the top edge.
    TopToBottom,
    /// Reveal from the bottom edge.
    BottomToTop,
}

/// Whether a transition plays as the scene enters or as it leaves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransitionPhase {
    /// Plays as the scene enters.
    In,
    /// Plays as the scene leaves.
    Out,
}

/// Built-in transition effect.
#[derive(Clone, Debug, PartialEq)]
pub enum TransitionKind {
    /// Fade from `color` on the way in, to `color` on the way out.
    Fade {
        /// Colour faded through.
        color: Rgba8Premul,
    },
    /// Reveal on the way in, cover on the way out. Hidden pixels become `color`.
    Wipe {
        /// Direction of travel.
        dir: WipeDir,
        /// Soft edge width as a fraction of the travel axis.
        soft_edge: f32,
        /// Colour of hidden pixels.
        color: Rgba8Premul,
    },
}

impl TransitionKind {
    /// Pixel work for one frame. `progress` is the eased window position in `[0, 1]`.
    pub fn apply(
        &self,
        target: &mut Surface,
        phase: TransitionPhase,
        progress: f64,
    ) -> BeatlineResult<()> {
        let p = progress.clamp(0.0, 1.0) as f32;
        // 0 = scene fully hidden.
        let shown = match phase {
            TransitionPhase::In => p,
            TransitionPhase::Out => 1.0 - p,
        };
        match *self {
            TransitionKind::Fade { color } => {
                fade_toward_in_place(target.data_mut(), color.to_array(), 1.0 - shown)
            }
            TransitionKind::Wipe {
                dir,
                soft_edge,
                color,
            } => {
                let (width, height) = (target.width(), target.height());
                wipe_reveal_in_place(
                    target.data_mut(),
                    color.to_array(),
                    WipeParams {
                        width,
                        height,
                        t: shown,
                        dir,
                        soft_edge,
                    },
                )
            }
        }
    }

    /// Box the transition as a scene callback for `phase`.
    pub fn into_callback(self, phase: TransitionPhase) -> TransitionFn {
        Box::new(move |target: &mut Surface, _scene: &SceneInfo, progress: f64| {
            self.apply(target, phase, progress)
        })
    }
}

/// Parse a document transition. Unknown kinds and bad params are validation errors.
pub fn parse_transition(spec: &TransitionSpec) -> BeatlineResult<TransitionKind> {
    let kind = spec.kind.trim().to_ascii_lowercase();
    if kind.is_empty() {
        return Err(BeatlineError::validation("transition kind must be non-empty"));
    }

    let params = if spec.params.is_null() {
        None
    } else {
        Some(spec.params.as_object().ok_or_else(|| {
            BeatlineError::validation(format!("{kind} params must be an object"))
        })?)
    };
    let color = |default: Rgba8Premul| -> BeatlineResult<Rgba8Premul> {
        match params.and_then(|p| p.get("color")) {
            None => Ok(default),
            Some(v) => {
                let s = v.as_str().ok_or_else(|| {
                    BeatlineError::validation(format!("{kind}.color must be a hex string"))
                })?;
                Rgba8Premul::parse_hex(s)
            }
        }
    };

    match kind.as_str() {
        "fade" | "fade_color" | "dip" => Ok(TransitionKind::Fade {
            color: color(Rgba8Premul::BLACK)?,
        }),
        "wipe" => {
            let dir = match params.and_then(|p| p.get("dir")).and_then(|v| v.as_str()) {
                None => WipeDir::LeftToRight,
                Some(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "left_to_right" | "lefttoright" | "ltr" => WipeDir::LeftToRight,
                    "right_to_left" | "righttoleft" | "rtl" => WipeDir::RightToLeft,
                    "top_to_bottom" | "toptobottom" | "ttb" => WipeDir::TopToBottom,
                    "bottom_to_top" | "bottomtotop" | "btt" => WipeDir::BottomToTop,
                    other => {
                        return Err(BeatlineError::validation(format!(
                            "unknown wipe.dir '{other}'"
                        )));
                    }
                },
            };

            let soft_edge = match params
                .and_then(|p| p.get("soft_edge"))
                .and_then(|v| v.as_f64())
            {
                None => 0.0,
                Some(v) => {
                    let f = v as f32;
                    if !f.is_finite() {
                        return Err(BeatlineError::validation(
                            "wipe.soft_edge must be finite when set",
                        ));
                    }
                    f.clamp(0.0, 1.0)
                }
            };

            Ok(TransitionKind::Wipe {
                dir,
                soft_edge,
                color: color(Rgba8Premul::TRANSPARENT)?,
            })
        }
        _ => Err(BeatlineError::validation(format!(
            "unknown transition kind '{kind}'"
        ))),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/effects/transitions.rs"]
mod tests;
