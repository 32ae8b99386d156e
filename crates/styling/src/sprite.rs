//! Sprite atlas access and the icon, pattern and circle rasters derived from
//! it.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tiny_skia::{FillRule, PathBuilder, Pixmap, PixmapPaint, PremultipliedColorU8, Transform};

use crate::color::Color;
use crate::primitives::{Bitmap, Circle, Icon, Stroke};

/// Largest circle raster, in pixels per side. Bigger circles are not drawn.
const MAX_CIRCLE_SIDE: f64 = 2048.0;

#[derive(Debug)]
pub enum SpriteError {
    Metadata(serde_json::Error),
    Image(String),
}

impl fmt::Display for SpriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpriteError::Metadata(err) => write!(f, "invalid sprite metadata: {err}"),
            SpriteError::Image(reason) => write!(f, "invalid sprite image: {reason}"),
        }
    }
}

impl std::error::Error for SpriteError {}

impl From<serde_json::Error> for SpriteError {
    fn from(err: serde_json::Error) -> Self {
        SpriteError::Metadata(err)
    }
}

fn default_pixel_ratio() -> f64 {
    1.0
}

/// One named sub-rectangle of the atlas image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpriteEntry {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    #[serde(rename = "pixelRatio", default = "default_pixel_ratio")]
    pub pixel_ratio: f64,
}

/// Sprite metadata plus the decoded atlas image, which may arrive after the
/// metadata.
#[derive(Debug, Clone, Default)]
pub struct SpriteAtlas {
    entries: HashMap<String, SpriteEntry>,
    image: Option<Pixmap>,
}

impl SpriteAtlas {
    pub fn new(entries: HashMap<String, SpriteEntry>) -> Self {
        Self {
            entries,
            image: None,
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, SpriteError> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    pub fn set_image(&mut self, image: Pixmap) {
        self.image = Some(image);
    }

    pub fn set_png(&mut self, bytes: &[u8]) -> Result<(), SpriteError> {
        let image = Pixmap::decode_png(bytes).map_err(|err| SpriteError::Image(err.to_string()))?;
        self.image = Some(image);
        Ok(())
    }

    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }

    pub fn entry(&self, name: &str) -> Option<&SpriteEntry> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy the named sub-rectangle onto a fresh surface at 1:1 with the
    /// given global alpha.
    fn extract(&self, name: &str, opacity: f64) -> Option<(SpriteEntry, Pixmap)> {
        let Some(entry) = self.entries.get(name) else {
            tracing::trace!(icon = name, "sprite entry missing");
            return None;
        };
        let Some(image) = &self.image else {
            tracing::trace!(icon = name, "sprite image not loaded");
            return None;
        };
        let right = entry.x.checked_add(entry.width)?;
        let bottom = entry.y.checked_add(entry.height)?;
        if right > image.width() || bottom > image.height() {
            tracing::debug!(icon = name, "sprite entry outside atlas bounds");
            return None;
        }
        let mut out = Pixmap::new(entry.width, entry.height)?;
        let paint = PixmapPaint {
            opacity: opacity.clamp(0.0, 1.0) as f32,
            ..PixmapPaint::default()
        };
        out.draw_pixmap(
            -(entry.x as i32),
            -(entry.y as i32),
            image.as_ref(),
            &paint,
            Transform::identity(),
            None,
        );
        Some((*entry, out))
    }
}

/// Anchor keyword to a fraction of the icon box. All four corners map to the
/// origin.
pub fn anchor_fraction(anchor: &str) -> [f64; 2] {
    match anchor {
        "top-left" | "top-right" | "bottom-left" | "bottom-right" => [0.0, 0.0],
        "left" => [0.0, 0.5],
        "right" => [1.0, 0.5],
        "bottom" => [0.5, 1.0],
        "top" => [0.5, 0.0],
        _ => [0.5, 0.5],
    }
}

/// Replace the RGB of every visible pixel, keeping its alpha.
fn recolor(pixmap: &mut Pixmap, color: Color) {
    let [r, g, b, _] = color.to_rgba8();
    let premultiply = |c: u8, a: u8| ((c as u16 * a as u16 + 127) / 255) as u8;
    for pixel in pixmap.pixels_mut() {
        let a = pixel.alpha();
        if a == 0 {
            continue;
        }
        if let Some(tinted) =
            PremultipliedColorU8::from_rgba(premultiply(r, a), premultiply(g, a), premultiply(b, a), a)
        {
            *pixel = tinted;
        }
    }
}

/// Parameters of a point icon. Rotation and opacity are applied by the
/// caller on the returned icon.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IconRequest<'a> {
    pub name: &'a str,
    pub size: f64,
    pub color: Option<Color>,
    pub translate: [f64; 2],
    pub translate_anchor: &'a str,
    pub anchor: &'a str,
    pub offset: [f64; 2],
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct IconKey {
    name: String,
    size: u64,
    translate: [u64; 2],
    translate_anchor: String,
    anchor: String,
    offset: [u64; 2],
    color: Option<[u8; 4]>,
}

impl IconKey {
    fn new(request: &IconRequest<'_>) -> Self {
        Self {
            name: request.name.to_string(),
            size: request.size.to_bits(),
            translate: request.translate.map(f64::to_bits),
            translate_anchor: request.translate_anchor.to_string(),
            anchor: request.anchor.to_string(),
            offset: request.offset.map(f64::to_bits),
            color: request.color.map(Color::to_rgba8),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CircleKey {
    radius: u64,
    stroke_color: Option<[u8; 4]>,
    fill_color: Option<[u8; 4]>,
    stroke_width: u64,
    translate: [u64; 2],
}

/// Caches of composited rasters. Entries live as long as the compositor;
/// missing sprite data is never cached so that a late atlas image takes
/// effect on the next call.
#[derive(Debug, Default)]
pub struct Compositor {
    patterns: HashMap<(String, u64), Bitmap>,
    icons: HashMap<IconKey, Icon>,
    circles: HashMap<CircleKey, Circle>,
}

impl Compositor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Repeating fill tile for `icon` drawn with `opacity`.
    pub fn pattern(&mut self, atlas: &SpriteAtlas, icon: &str, opacity: f64) -> Option<Bitmap> {
        let key = (icon.to_string(), opacity.to_bits());
        if let Some(tile) = self.patterns.get(&key) {
            return Some(tile.clone());
        }
        let (_, pixmap) = atlas.extract(icon, opacity)?;
        let tile = Bitmap::new(pixmap);
        self.patterns.insert(key, tile.clone());
        Some(tile)
    }

    pub fn icon(&mut self, atlas: &SpriteAtlas, request: &IconRequest<'_>) -> Option<Icon> {
        let key = IconKey::new(request);
        if let Some(icon) = self.icons.get(&key) {
            return Some(icon.clone());
        }
        let (entry, mut pixmap) = atlas.extract(request.name, 1.0)?;
        if let Some(color) = request.color {
            recolor(&mut pixmap, color);
        }

        let ratio = entry.pixel_ratio;
        let [fx, fy] = anchor_fraction(request.anchor);
        let translate_scale = if request.size > 0.0 {
            ratio / request.size
        } else {
            ratio
        };
        // Moving the icon right or down moves its anchor left or up.
        let anchor = [
            fx * entry.width as f64 - request.offset[0] * ratio - request.translate[0] * translate_scale,
            fy * entry.height as f64 - request.offset[1] * ratio - request.translate[1] * translate_scale,
        ];
        let icon = Icon {
            name: request.name.to_string(),
            bitmap: Bitmap::new(pixmap),
            anchor,
            scale: request.size / ratio,
            rotation: 0.0,
            rotate_with_view: false,
            opacity: 1.0,
        };
        self.icons.insert(key, icon.clone());
        Some(icon)
    }

    /// Rasterized disc with an optional ring. Opacities are expected to be
    /// folded into the colors.
    pub fn circle(
        &mut self,
        radius: f64,
        fill: Option<Color>,
        stroke: Option<(Color, f64)>,
        translate: [f64; 2],
    ) -> Option<Circle> {
        if radius <= 0.0 || !radius.is_finite() {
            return None;
        }
        let stroke = stroke.filter(|(_, width)| *width > 0.0);
        let stroke_width = stroke.map_or(0.0, |(_, width)| width);
        let side = (2.0 * radius + stroke_width).ceil() + 2.0;
        if side > MAX_CIRCLE_SIDE {
            tracing::trace!(radius, stroke_width, "circle too large to rasterize");
            return None;
        }
        let key = CircleKey {
            radius: radius.to_bits(),
            stroke_color: stroke.map(|(color, _)| color.to_rgba8()),
            fill_color: fill.map(Color::to_rgba8),
            stroke_width: stroke_width.to_bits(),
            translate: translate.map(f64::to_bits),
        };
        if let Some(circle) = self.circles.get(&key) {
            return Some(circle.clone());
        }

        let side = side as u32;
        let mut pixmap = Pixmap::new(side, side)?;
        let center = side as f32 / 2.0;
        let path = PathBuilder::from_circle(center, center, radius as f32)?;
        let mut paint = tiny_skia::Paint {
            anti_alias: true,
            ..tiny_skia::Paint::default()
        };
        if let Some(color) = fill {
            paint.set_color(color.to_tiny_skia());
            pixmap.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
        }
        if let Some((color, width)) = stroke {
            paint.set_color(color.to_tiny_skia());
            let ring = tiny_skia::Stroke {
                width: width as f32,
                ..tiny_skia::Stroke::default()
            };
            pixmap.stroke_path(&path, &paint, &ring, Transform::identity(), None);
        }

        let circle = Circle {
            radius,
            fill,
            stroke: stroke.map(|(color, width)| Stroke::solid(color, width)),
            displacement: [translate[0], -translate[1]],
            bitmap: Bitmap::new(pixmap),
        };
        self.circles.insert(key, circle.clone());
        Some(circle)
    }

    pub fn clear(&mut self) {
        self.patterns.clear();
        self.icons.clear();
        self.circles.clear();
    }
}
