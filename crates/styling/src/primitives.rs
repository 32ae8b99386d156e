//! Drawable style primitives handed to the renderer.

use std::fmt;
use std::rc::Rc;

use serde::{Serialize, Serializer};
use tiny_skia::Pixmap;

use crate::color::Color;

/// A composited raster shared between the caches and emitted styles.
/// Equality is identity: two bitmaps are equal when they are the same cached
/// surface.
#[derive(Clone)]
pub struct Bitmap(Rc<Pixmap>);

impl Bitmap {
    pub fn new(pixmap: Pixmap) -> Self {
        Self(Rc::new(pixmap))
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.0
    }

    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }
}

impl PartialEq for Bitmap {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bitmap({}x{})", self.width(), self.height())
    }
}

impl Serialize for Bitmap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        [self.width(), self.height()].serialize(serializer)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LineCap {
    #[default]
    Butt,
    Round,
    Square,
}

impl LineCap {
    pub fn parse(s: &str) -> Self {
        match s {
            "round" => LineCap::Round,
            "square" => LineCap::Square,
            _ => LineCap::Butt,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LineJoin {
    Bevel,
    Round,
    #[default]
    Miter,
}

impl LineJoin {
    pub fn parse(s: &str) -> Self {
        match s {
            "bevel" => LineJoin::Bevel,
            "round" => LineJoin::Round,
            _ => LineJoin::Miter,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stroke {
    pub color: Color,
    pub width: f64,
    pub line_cap: LineCap,
    pub line_join: LineJoin,
    pub miter_limit: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_dash: Option<Vec<f64>>,
}

impl Stroke {
    pub fn solid(color: Color, width: f64) -> Self {
        Self {
            color,
            width,
            line_cap: LineCap::Butt,
            line_join: LineJoin::Miter,
            miter_limit: 10.0,
            line_dash: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pattern {
    pub icon: String,
    pub opacity: f64,
    pub tile: Bitmap,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Fill {
    Color(Color),
    Pattern(Pattern),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Icon {
    pub name: String,
    pub bitmap: Bitmap,
    /// Anchor in bitmap pixels, measured from the top-left corner.
    pub anchor: [f64; 2],
    pub scale: f64,
    /// Radians, clockwise.
    pub rotation: f64,
    pub rotate_with_view: bool,
    pub opacity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Circle {
    pub radius: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill: Option<Color>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stroke: Option<Stroke>,
    /// Screen offset, y up.
    pub displacement: [f64; 2],
    pub bitmap: Bitmap,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Image {
    Icon(Icon),
    Circle(Circle),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TextPlacement {
    Point,
    Line,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TextBaseline {
    Top,
    Middle,
    Bottom,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Text {
    pub text: String,
    pub font: String,
    pub placement: TextPlacement,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_angle: Option<f64>,
    pub align: TextAlign,
    pub justify: TextAlign,
    pub baseline: TextBaseline,
    pub offset: [f64; 2],
    pub rotation: f64,
    pub rotate_with_view: bool,
    /// `[top, right, bottom, left]` in pixels.
    pub padding: [f64; 4],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill: Option<Color>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub halo: Option<Stroke>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Style {
    pub z_index: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill: Option<Fill>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stroke: Option<Stroke>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<Image>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<Text>,
    /// Render position override in map units (line midpoints for icons).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry: Option<[f64; 2]>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitmaps_compare_by_identity() {
        let a = Bitmap::new(Pixmap::new(2, 2).expect("pixmap"));
        let b = Bitmap::new(Pixmap::new(2, 2).expect("pixmap"));
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_eq!(format!("{a:?}"), "Bitmap(2x2)");
    }

    #[test]
    fn serializes_style() {
        let style = Style {
            z_index: 3,
            stroke: Some(Stroke::solid(Color::BLACK, 2.0)),
            ..Style::default()
        };
        let json = serde_json::to_value(&style).expect("serialize");
        assert_eq!(json["z_index"], 3);
        assert_eq!(json["stroke"]["width"], 2.0);
        assert_eq!(json["stroke"]["line_cap"], "butt");
        assert!(json.get("fill").is_none());
    }
}
