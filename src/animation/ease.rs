/// Easing curve applied to a normalized progress value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ease {
    /// No easing.
    #[default]
    Linear,
    /// Quadratic, accelerating.
    InQuad,
    /// Quadratic, decelerating.
    OutQuad,
    /// Quadratic, accelerating then decelerating.
    InOutQuad,
    /// Cubic, accelerating.
    InCubic,
    /// Cubic, decelerating.
    OutCubic,
    /// Cubic, accelerating then decelerating.
    InOutCubic,
}

#[derive(Clone, Copy)]
enum Shape {
    In,
    Out,
    InOut,
}

impl Ease {
    /// Every curve, in declaration order.
    pub const ALL: [Ease; 7] = [
        Ease::Linear,
        Ease::InQuad,
        Ease::OutQuad,
        Ease::InOutQuad,
        Ease::InCubic,
        Ease::OutCubic,
        Ease::InOutCubic,
    ];

    fn polynomial(self) -> Option<(i32, Shape)> {
        match self {
            Self::Linear => None,
            Self::InQuad => Some((2, Shape::In)),
            Self::OutQuad => Some((2, Shape::Out)),
            Self::InOutQuad => Some((2, Shape::InOut)),
            Self::InCubic => Some((3, Shape::In)),
            Self::OutCubic => Some((3, Shape::Out)),
            Self::InOutCubic => Some((3, Shape::InOut)),
        }
    }

    /// Map linear progress onto the curve. Input is clamped to `[0, 1]`.
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        let Some((n, shape)) = self.polynomial() else {
            return t;
        };
        match shape {
            Shape::In => t.powi(n),
            Shape::Out => 1.0 - (1.0 - t).powi(n),
            Shape::InOut if t < 0.5 => 2f64.powi(n - 1) * t.powi(n),
            Shape::InOut => 1.0 - (2.0 - 2.0 * t).powi(n) / 2.0,
        }
    }

    /// Progress of `t` through `[start, start + duration]`, eased and clamped to `[0, 1]`.
    ///
    /// A zero-length window reports `1.0` once reached.
    pub fn progress(self, t: f64, start: f64, duration: f64) -> f64 {
        if duration <= 0.0 {
            return if t >= start { 1.0 } else { 0.0 };
        }
        self.apply((t - start) / duration)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/animation/ease.rs"]
mod tests;
