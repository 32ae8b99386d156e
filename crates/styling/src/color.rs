use std::fmt;

use serde::{Serialize, Serializer};

/// Straight (non-premultiplied) RGBA color with channels in `0..=1`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Color = Color::new(0.0, 0.0, 0.0, 1.0);
    pub const TRANSPARENT: Color = Color::new(0.0, 0.0, 0.0, 0.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Parse any CSS color string (`#rgb`, `rgba()`, `hsl()`, named colors).
    pub fn parse(s: &str) -> Option<Self> {
        let c = csscolorparser::parse(s.trim()).ok()?;
        Some(Self::new(c.r as f32, c.g as f32, c.b as f32, c.a as f32))
    }

    pub fn from_rgba8(r: u8, g: u8, b: u8, a: f32) -> Self {
        Self::new(
            r as f32 / 255.0,
            g as f32 / 255.0,
            b as f32 / 255.0,
            a.clamp(0.0, 1.0),
        )
    }

    pub fn to_rgba8(self) -> [u8; 4] {
        [
            channel_to_u8(self.r),
            channel_to_u8(self.g),
            channel_to_u8(self.b),
            channel_to_u8(self.a),
        ]
    }

    /// Multiply alpha by `opacity`. Fully transparent results are dropped so
    /// callers can skip the primitive entirely.
    pub fn with_opacity(self, opacity: f64) -> Option<Self> {
        if self.a == 0.0 || opacity <= 0.0 || !opacity.is_finite() {
            return None;
        }
        Some(Self {
            a: (self.a as f64 * opacity.min(1.0)) as f32,
            ..self
        })
    }

    pub fn lerp(self, other: Self, t: f64) -> Self {
        let t = t as f32;
        Self::new(
            self.r + (other.r - self.r) * t,
            self.g + (other.g - self.g) * t,
            self.b + (other.b - self.b) * t,
            self.a + (other.a - self.a) * t,
        )
    }

    pub fn to_tiny_skia(self) -> tiny_skia::Color {
        tiny_skia::Color::from_rgba(
            self.r.clamp(0.0, 1.0),
            self.g.clamp(0.0, 1.0),
            self.b.clamp(0.0, 1.0),
            self.a.clamp(0.0, 1.0),
        )
        .unwrap_or(tiny_skia::Color::TRANSPARENT)
    }
}

fn channel_to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b, _] = self.to_rgba8();
        write!(f, "rgba({r},{g},{b},{})", self.a)
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
