use crate::foundation::error::{BeatlineError, BeatlineResult};

pub use kurbo::Vec2;

/// Render size used when neither the entity nor its scene sets one.
pub const DEFAULT_SIZE: Size = Size {
    width: 800,
    height: 450,
};

/// Pixel dimensions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Size {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Size {
    /// Size of `width` by `height` pixels.
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Pixel count.
    pub fn area(self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    /// Whether either side is zero.
    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl Default for Size {
    fn default() -> Self {
        DEFAULT_SIZE
    }
}

/// Half-open window `[start_ms, start_ms + duration_ms)` on the global timeline.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TimeRange {
    /// Window start on the global timeline.
    pub start_ms: f64,
    /// Window length, `>= 0`.
    pub duration_ms: f64,
}

impl TimeRange {
    /// Fails unless both values are finite and non-negative.
    pub fn new(start_ms: f64, duration_ms: f64) -> BeatlineResult<Self> {
        if !start_ms.is_finite() || start_ms < 0.0 {
            return Err(BeatlineError::validation(
                "time range start must be finite and >= 0",
            ));
        }
        if !duration_ms.is_finite() || duration_ms < 0.0 {
            return Err(BeatlineError::validation(
                "time range duration must be finite and >= 0",
            ));
        }
        Ok(Self {
            start_ms,
            duration_ms,
        })
    }

    /// Exclusive end of the window.
    pub fn end_ms(self) -> f64 {
        self.start_ms + self.duration_ms
    }

    /// Whether `t_ms` lies in `[start, end)`.
    pub fn contains(self, t_ms: f64) -> bool {
        self.start_ms <= t_ms && t_ms < self.end_ms()
    }
}

/// Premultiplied RGBA8 (r,g,b already multiplied by a).
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Rgba8Premul {
    /// Red, premultiplied.
    pub r: u8,
    /// Green, premultiplied.
    pub g: u8,
    /// Blue, premultiplied.
    pub b: u8,
    /// Alpha.
    pub a: u8,
}

impl Rgba8Premul {
    /// All channels zero.
    pub const TRANSPARENT: Self = Self {
        r: 0,
        g: 0,
        b: 0,
        a: 0,
    };

    /// Opaque black.
    pub const BLACK: Self = Self {
        r: 0,
        g: 0,
        b: 0,
        a: 255,
    };

    /// Same as [`Self::TRANSPARENT`].
    pub fn transparent() -> Self {
        Self::TRANSPARENT
    }

    /// Premultiply straight-alpha channels.
    pub fn from_straight_rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        fn premul(c: u8, a: u8) -> u8 {
            let c = u16::from(c);
            let a = u16::from(a);
            (((c * a) + 127) / 255) as u8
        }

        Self {
            r: premul(r, a),
            g: premul(g, a),
            b: premul(b, a),
            a,
        }
    }

    /// Parse `#rrggbb` or `#rrggbbaa` (straight alpha).
    pub fn parse_hex(s: &str) -> BeatlineResult<Self> {
        let hex = s.trim().trim_start_matches('#');
        if !hex.is_ascii() || (hex.len() != 6 && hex.len() != 8) {
            return Err(BeatlineError::validation(format!(
                "color '{s}' must be #rrggbb or #rrggbbaa"
            )));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map_err(|_| BeatlineError::validation(format!("color '{s}' is not valid hex")))
        };
        let a = if hex.len() == 8 { channel(6)? } else { 255 };
        Ok(Self::from_straight_rgba(channel(0)?, channel(2)?, channel(4)?, a))
    }

    /// `[r, g, b, a]`.
    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl Default for Rgba8Premul {
    fn default() -> Self {
        Self::TRANSPARENT
    }
}
