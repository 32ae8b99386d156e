//! The per-feature style function: walks the resolved layers for a feature
//! and writes drawable styles into a reused output list.

use std::collections::HashMap;
use std::rc::Rc;

use foundation::{line_midpoint, segment_angle_at};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use tiny_skia::Pixmap;

use crate::document::PropertyBag::{Layout, Paint};
use crate::document::{LayerType, StyleDocument};
use crate::error::StyleError;
use crate::expression::{EvalContext, FeatureContext};
use crate::feature::{GeometryType, StyleFeature};
use crate::filter::FilterCache;
use crate::primitives::{
    Fill, Image, LineCap, LineJoin, Pattern, Stroke, Style, Text, TextAlign, TextBaseline,
    TextPlacement,
};
use crate::property::PropertyCache;
use crate::resolver::{ResolvedLayer, ResolvedStyle, SourceSelector, resolve};
use crate::sprite::{Compositor, IconRequest, SpriteAtlas, SpriteError};
use crate::template::substitute;
use crate::text::{TextMeasure, TextShaper, apply_letter_spacing};

/// Resolution of zoom level 0 in the default web mercator pyramid.
pub const MAX_RESOLUTION: f64 = 78271.516_964_020_48;
pub const DEFAULT_ZOOM_LEVELS: usize = 21;

/// Icons on lines need this many pixels of screen extent.
const LINE_ICON_MIN_EXTENT: f64 = 150.0;
/// Symbols draw above fills and strokes whatever their document position.
const SYMBOL_Z_BASE: i64 = 99_999;

pub fn default_resolutions() -> Vec<f64> {
    (0..DEFAULT_ZOOM_LEVELS)
        .map(|z| MAX_RESOLUTION / 2f64.powi(z as i32))
        .collect()
}

/// Fractional zoom for `resolution`: the index of an exact match, otherwise
/// a log interpolation between the neighbouring levels.
pub fn zoom_for_resolution(resolution: f64, resolutions: &[f64]) -> f64 {
    if let Some(index) = resolutions.iter().position(|r| *r == resolution) {
        return index as f64;
    }
    for (i, pair) in resolutions.windows(2).enumerate() {
        if pair[0] < resolution {
            let zoom = i as f64 + (pair[0] / resolution).ln() / (pair[0] / pair[1]).ln();
            return zoom.max(0.0);
        }
    }
    resolutions.len().saturating_sub(1) as f64
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StyleFunctionOptions {
    pub selector: SourceSelector,
    #[serde(default = "default_resolutions")]
    pub resolutions: Vec<f64>,
    #[serde(skip)]
    pub sprite: Option<SpriteAtlas>,
    /// Where the host fetches the atlas image from.
    #[serde(default)]
    pub sprite_image_url: Option<String>,
    #[serde(default)]
    pub available_fonts: Option<Vec<String>>,
}

impl StyleFunctionOptions {
    pub fn new(selector: SourceSelector) -> Self {
        Self {
            selector,
            resolutions: default_resolutions(),
            sprite: None,
            sprite_image_url: None,
            available_fonts: None,
        }
    }

    pub fn source(name: impl Into<String>) -> Self {
        Self::new(SourceSelector::Source(name.into()))
    }

    pub fn layers<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(SourceSelector::Layers(ids.into_iter().map(Into::into).collect()))
    }
}

fn state_key(id: &Json) -> String {
    match id {
        Json::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Evaluates a style document for the features of one source.
///
/// All caches are owned by the instance. Evaluation never fails: missing
/// sprite data, fonts or properties degrade to fewer primitives or defaults.
#[derive(Debug)]
pub struct StyleFunction {
    document: StyleDocument,
    selector: SourceSelector,
    resolutions: Vec<f64>,
    sprite_image_url: Option<String>,
    resolved: Rc<ResolvedStyle>,
    properties: PropertyCache,
    filters: FilterCache,
    compositor: Compositor,
    shaper: TextShaper,
    sprite: SpriteAtlas,
    feature_state: HashMap<String, Map<String, Json>>,
    styles: Vec<Style>,
    count: usize,
    contributing: Vec<String>,
}

impl StyleFunction {
    pub fn new(document: StyleDocument, options: StyleFunctionOptions) -> Result<Self, StyleError> {
        let mut function = Self {
            document: StyleDocument::default(),
            selector: options.selector,
            resolutions: options.resolutions,
            sprite_image_url: options.sprite_image_url,
            resolved: Rc::default(),
            properties: PropertyCache::new(),
            filters: FilterCache::new(),
            compositor: Compositor::new(),
            shaper: TextShaper::default(),
            sprite: options.sprite.unwrap_or_default(),
            feature_state: HashMap::new(),
            styles: Vec::new(),
            count: 0,
            contributing: Vec::new(),
        };
        function.shaper.set_available_fonts(options.available_fonts);
        function.set_style(document)?;
        Ok(function)
    }

    pub fn from_json_str(json: &str, options: StyleFunctionOptions) -> Result<Self, StyleError> {
        Self::new(StyleDocument::from_json_str(json)?, options)
    }

    /// Replace the style document. Every expression and filter of the
    /// selected layers is compiled before the new document takes effect.
    pub fn set_style(&mut self, document: StyleDocument) -> Result<(), StyleError> {
        document.validate_version()?;
        let resolved = resolve(&document, &self.selector)?;

        for id in resolved
            .document_layer_ids
            .iter()
            .chain(&self.resolved.document_layer_ids)
        {
            self.properties.invalidate(id);
            self.filters.invalidate(id);
        }

        let mut errors = Vec::new();
        for entry in &resolved.layers {
            errors.extend(self.properties.compile_layer(&entry.layer));
            errors.extend(self.filters.compile_layer(&entry.layer));
        }
        if !errors.is_empty() {
            // Leave no half-compiled entries behind for the old document.
            for id in &resolved.document_layer_ids {
                self.properties.invalidate(id);
                self.filters.invalidate(id);
            }
            return Err(StyleError::Expressions(errors));
        }

        tracing::debug!(
            source = %resolved.source,
            layers = resolved.layers.len(),
            "style function ready"
        );
        self.document = document;
        self.resolved = Rc::new(resolved);
        self.styles.clear();
        self.contributing.clear();
        Ok(())
    }

    pub fn document(&self) -> &StyleDocument {
        &self.document
    }

    /// Name of the source whose features this function styles.
    pub fn source_name(&self) -> &str {
        &self.resolved.source
    }

    /// Ids of the selected layers, in document order.
    pub fn layer_ids(&self) -> &[String] {
        &self.resolved.layer_ids
    }

    /// Ids of the layers that produced at least one style in the last call.
    pub fn last_layers(&self) -> &[String] {
        &self.contributing
    }

    pub fn resolutions(&self) -> &[f64] {
        &self.resolutions
    }

    pub fn sprite_image_url(&self) -> Option<&str> {
        self.sprite_image_url.as_deref()
    }

    pub fn zoom_for_resolution(&self, resolution: f64) -> f64 {
        zoom_for_resolution(resolution, &self.resolutions)
    }

    /// Swap the sprite atlas. Composited icons and patterns are dropped.
    pub fn set_sprite(&mut self, atlas: SpriteAtlas) {
        self.sprite = atlas;
        self.compositor.clear();
    }

    pub fn set_sprite_image(&mut self, image: Pixmap) {
        self.sprite.set_image(image);
        self.compositor.clear();
    }

    pub fn set_sprite_png(&mut self, bytes: &[u8]) -> Result<(), SpriteError> {
        self.sprite.set_png(bytes)?;
        self.compositor.clear();
        Ok(())
    }

    pub fn set_text_measure(&mut self, measure: Box<dyn TextMeasure>) {
        let fonts = self.shaper.available_fonts().map(<[String]>::to_vec);
        self.shaper = TextShaper::new(measure, fonts);
    }

    pub fn set_available_fonts(&mut self, fonts: Option<Vec<String>>) {
        self.shaper.set_available_fonts(fonts);
    }

    /// Attach state to a feature id for `feature-state` expressions. `None`
    /// clears it.
    pub fn set_feature_state(&mut self, id: &Json, state: Option<Map<String, Json>>) {
        let key = state_key(id);
        match state {
            Some(state) => {
                self.feature_state.insert(key, state);
            }
            None => {
                self.feature_state.remove(&key);
            }
        }
    }

    pub fn evaluate<F: StyleFeature + ?Sized>(&mut self, feature: &F, resolution: f64) -> Option<&[Style]> {
        self.evaluate_layer(feature, resolution, None)
    }

    /// Like [`StyleFunction::evaluate`], restricted to one layer id when
    /// `only_layer` is given.
    pub fn evaluate_layer<F: StyleFeature + ?Sized>(
        &mut self,
        feature: &F,
        resolution: f64,
        only_layer: Option<&str>,
    ) -> Option<&[Style]> {
        self.count = 0;
        self.contributing.clear();

        let zoom = self.zoom_for_resolution(resolution);
        let resolved = Rc::clone(&self.resolved);
        let source_layer = if resolved.source_type == "geojson" {
            None
        } else {
            feature.source_layer()
        };
        let state = feature
            .id()
            .and_then(|id| self.feature_state.get(&state_key(id)))
            .cloned();
        let ctx = EvalContext::new(
            zoom,
            FeatureContext {
                id: feature.id(),
                properties: feature.properties(),
                geometry_type: feature.geometry_type(),
                state: state.as_ref(),
            },
        );

        for &position in resolved.candidates(source_layer) {
            let Some(entry) = resolved.layer(position) else {
                continue;
            };
            let layer = &entry.layer;
            if only_layer.is_some_and(|id| id != layer.id) {
                continue;
            }
            if !layer.is_visible() || !layer.in_zoom_range(zoom) {
                continue;
            }
            if !self.filters.evaluate(&layer.id, layer.filter.as_ref(), &ctx) {
                continue;
            }

            let before = self.count;
            let geometry_type = ctx.feature.geometry_type;
            match layer.layer_type {
                LayerType::Fill if geometry_type == GeometryType::Polygon => {
                    self.emit_fill(entry, &ctx);
                }
                LayerType::Line if geometry_type != GeometryType::Point => {
                    self.emit_line(entry, &ctx);
                }
                LayerType::Circle if geometry_type == GeometryType::Point => {
                    self.emit_circle(entry, &ctx);
                }
                LayerType::Symbol => self.emit_symbol(entry, feature, &ctx, resolution),
                _ => {}
            }
            if self.count > before && self.contributing.last() != Some(&layer.id) {
                self.contributing.push(layer.id.clone());
            }
        }

        self.styles.truncate(self.count);
        if self.count == 0 {
            None
        } else {
            Some(self.styles.as_slice())
        }
    }

    /// Write `style` into the next output slot, reusing the list allocation.
    fn emit(&mut self, style: Style) -> usize {
        let index = self.count;
        match self.styles.get_mut(index) {
            Some(slot) => *slot = style,
            None => self.styles.push(style),
        }
        self.count += 1;
        index
    }

    fn emit_fill(&mut self, entry: &ResolvedLayer, ctx: &EvalContext<'_>) {
        let layer = &entry.layer;
        let z_index = entry.index as i64;
        let opacity = self.properties.number(layer, Paint, "fill-opacity", ctx);

        if layer.paint.contains_key("fill-pattern") {
            let icon = self.properties.string(layer, Paint, "fill-pattern", ctx);
            if icon.is_empty() {
                return;
            }
            if let Some(tile) = self.compositor.pattern(&self.sprite, &icon, opacity) {
                self.emit(Style {
                    z_index,
                    fill: Some(Fill::Pattern(Pattern { icon, opacity, tile })),
                    ..Style::default()
                });
            }
            return;
        }

        let Some(color) = self
            .properties
            .color(layer, Paint, "fill-color", ctx)
            .and_then(|c| c.with_opacity(opacity))
        else {
            return;
        };
        self.emit(Style {
            z_index,
            fill: Some(Fill::Color(color)),
            ..Style::default()
        });

        let outline = if layer.paint.contains_key("fill-outline-color") {
            self.properties
                .color(layer, Paint, "fill-outline-color", ctx)
                .and_then(|c| c.with_opacity(opacity))
        } else if layer.paint.contains_key("fill-antialias")
            && self.properties.boolean(layer, Paint, "fill-antialias", ctx)
        {
            Some(color)
        } else {
            None
        };
        if let Some(outline) = outline {
            self.emit(Style {
                z_index,
                stroke: Some(Stroke::solid(outline, 1.0)),
                ..Style::default()
            });
        }
    }

    fn emit_line(&mut self, entry: &ResolvedLayer, ctx: &EvalContext<'_>) {
        let layer = &entry.layer;
        // Patterned lines are not drawn.
        if layer.paint.contains_key("line-pattern") {
            return;
        }
        let width = self.properties.number(layer, Paint, "line-width", ctx);
        if width <= 0.0 {
            return;
        }
        let opacity = self.properties.number(layer, Paint, "line-opacity", ctx);
        let Some(color) = self
            .properties
            .color(layer, Paint, "line-color", ctx)
            .and_then(|c| c.with_opacity(opacity))
        else {
            return;
        };
        // Dash lengths are multiples of the line width.
        let line_dash = if layer.paint.contains_key("line-dasharray") {
            let dash: Vec<f64> = self
                .properties
                .numbers(layer, Paint, "line-dasharray", ctx)
                .into_iter()
                .map(|d| d * width)
                .collect();
            (!dash.is_empty()).then_some(dash)
        } else {
            None
        };
        let line_cap = LineCap::parse(&self.properties.string(layer, Layout, "line-cap", ctx));
        let line_join = LineJoin::parse(&self.properties.string(layer, Layout, "line-join", ctx));
        let miter_limit = self.properties.number(layer, Layout, "line-miter-limit", ctx);

        self.emit(Style {
            z_index: entry.index as i64,
            stroke: Some(Stroke {
                color,
                width,
                line_cap,
                line_join,
                miter_limit,
                line_dash,
            }),
            ..Style::default()
        });
    }

    fn emit_circle(&mut self, entry: &ResolvedLayer, ctx: &EvalContext<'_>) {
        let layer = &entry.layer;
        if !layer.paint.contains_key("circle-radius") {
            return;
        }
        let radius = self.properties.number(layer, Paint, "circle-radius", ctx);
        if radius <= 0.0 {
            return;
        }
        let opacity = self.properties.number(layer, Paint, "circle-opacity", ctx);
        let fill = self
            .properties
            .color(layer, Paint, "circle-color", ctx)
            .and_then(|c| c.with_opacity(opacity));
        let stroke_width = self.properties.number(layer, Paint, "circle-stroke-width", ctx);
        let stroke = if stroke_width > 0.0 {
            let stroke_opacity = self.properties.number(layer, Paint, "circle-stroke-opacity", ctx);
            self.properties
                .color(layer, Paint, "circle-stroke-color", ctx)
                .and_then(|c| c.with_opacity(stroke_opacity))
                .map(|c| (c, stroke_width))
        } else {
            None
        };
        if fill.is_none() && stroke.is_none() {
            return;
        }
        let translate = self.properties.pair(layer, Paint, "circle-translate", ctx);
        let Some(circle) = self.compositor.circle(radius, fill, stroke, translate) else {
            return;
        };
        self.emit(Style {
            z_index: entry.index as i64,
            image: Some(Image::Circle(circle)),
            ..Style::default()
        });
    }

    fn emit_symbol<F: StyleFeature + ?Sized>(
        &mut self,
        entry: &ResolvedLayer,
        feature: &F,
        ctx: &EvalContext<'_>,
        resolution: f64,
    ) {
        let layer = &entry.layer;
        let geometry_type = ctx.feature.geometry_type;
        let z_index = SYMBOL_Z_BASE - entry.index as i64;
        let placement = self.properties.string(layer, Layout, "symbol-placement", ctx);

        let mut image_slot = None;
        let mut skip_label = false;
        if geometry_type != GeometryType::Polygon && layer.layout.contains_key("icon-image") {
            let name = self.properties.string(layer, Layout, "icon-image", ctx);
            if !name.is_empty() {
                let mut position = None;
                let mut line_angle = None;
                if geometry_type == GeometryType::LineString {
                    let extent = feature.extent();
                    let diagonal = extent.width().hypot(extent.height()) / resolution;
                    if diagonal > LINE_ICON_MIN_EXTENT
                        && let Some(line) = feature.first_line()
                        && let Some(midpoint) = line_midpoint(line)
                    {
                        position = Some(midpoint);
                        line_angle = segment_angle_at(line, midpoint);
                    }
                }
                if geometry_type == GeometryType::LineString && position.is_none() {
                    skip_label = true;
                } else {
                    image_slot = self.emit_icon(entry, &name, ctx, z_index, line_angle, &placement);
                    if let (Some(slot), Some(p)) = (image_slot, position) {
                        self.styles[slot].geometry = Some([p.x, p.y]);
                    }
                }
            }
        }

        if skip_label || !layer.layout.contains_key("text-field") {
            return;
        }
        let Some(text) = self.label(entry, feature, ctx, &placement, image_slot.is_none()) else {
            return;
        };
        match image_slot {
            Some(slot) => self.styles[slot].text = Some(text),
            None => {
                self.emit(Style {
                    z_index,
                    text: Some(text),
                    ..Style::default()
                });
            }
        }
    }

    fn emit_icon(
        &mut self,
        entry: &ResolvedLayer,
        name: &str,
        ctx: &EvalContext<'_>,
        z_index: i64,
        line_angle: Option<f64>,
        placement: &str,
    ) -> Option<usize> {
        let layer = &entry.layer;
        let size = self.properties.number(layer, Layout, "icon-size", ctx);
        let color = if layer.paint.contains_key("icon-color") {
            self.properties.color(layer, Paint, "icon-color", ctx)
        } else {
            None
        };
        let translate = self.properties.pair(layer, Paint, "icon-translate", ctx);
        let translate_anchor = self.properties.string(layer, Paint, "icon-translate-anchor", ctx);
        let anchor = self.properties.string(layer, Layout, "icon-anchor", ctx);
        let offset = self.properties.pair(layer, Layout, "icon-offset", ctx);
        let request = IconRequest {
            name,
            size,
            color,
            translate,
            translate_anchor: &translate_anchor,
            anchor: &anchor,
            offset,
        };
        let mut icon = self.compositor.icon(&self.sprite, &request)?;

        let alignment = self.properties.string(layer, Layout, "icon-rotation-alignment", ctx);
        let rotate_with_view = alignment == "map";
        let mut rotation = self
            .properties
            .number(layer, Layout, "icon-rotate", ctx)
            .to_radians();
        if placement == "line"
            && alignment != "viewport"
            && let Some(angle) = line_angle
        {
            rotation += angle;
        }
        icon.rotation = rotation;
        icon.rotate_with_view = rotate_with_view;
        icon.opacity = self.properties.number(layer, Paint, "icon-opacity", ctx);

        Some(self.emit(Style {
            z_index,
            image: Some(Image::Icon(icon)),
            ..Style::default()
        }))
    }

    fn label<F: StyleFeature + ?Sized>(
        &mut self,
        entry: &ResolvedLayer,
        feature: &F,
        ctx: &EvalContext<'_>,
        placement: &str,
        may_follow_line: bool,
    ) -> Option<Text> {
        let layer = &entry.layer;
        let template = self.properties.string(layer, Layout, "text-field", ctx);
        let mut label = substitute(&template, feature.properties());
        if label.trim().is_empty() {
            return None;
        }
        match self.properties.string(layer, Layout, "text-transform", ctx).as_str() {
            "uppercase" => label = label.to_uppercase(),
            "lowercase" => label = label.to_lowercase(),
            _ => {}
        }

        let opacity = self.properties.number(layer, Paint, "text-opacity", ctx);
        let fill = self
            .properties
            .color(layer, Paint, "text-color", ctx)
            .and_then(|c| c.with_opacity(opacity));
        let size = self.properties.number(layer, Layout, "text-size", ctx);
        let halo_width = self.properties.number(layer, Paint, "text-halo-width", ctx);
        let halo = if halo_width > 0.0 {
            self.properties
                .color(layer, Paint, "text-halo-color", ctx)
                .and_then(|c| c.with_opacity(opacity))
                .map(|c| Stroke::solid(c, (halo_width * 2.0).min(size / 2.0)))
        } else {
            None
        };
        if fill.is_none() && halo.is_none() {
            return None;
        }

        let stack = self.properties.strings(layer, Layout, "text-font", ctx);
        let font_name = self.shaper.choose_font(&stack);
        let line_height = self.properties.number(layer, Layout, "text-line-height", ctx);
        let font = self.shaper.css_font(&font_name, size, line_height);
        let letter_spacing = self.properties.number(layer, Layout, "text-letter-spacing", ctx);

        // Labels of line geometries are spaced but never wrapped.
        let on_line = ctx.feature.geometry_type == GeometryType::LineString;
        let text = if on_line {
            apply_letter_spacing(&label, letter_spacing)
        } else {
            let max_width = self.properties.number(layer, Layout, "text-max-width", ctx);
            self.shaper.wrap(&label, &font, max_width, letter_spacing)
        };
        let (placement, max_angle) = if on_line && may_follow_line && placement == "line" {
            let max_angle_deg = self.properties.number(layer, Layout, "text-max-angle", ctx);
            let ratio = label.chars().count() as f64 / text.chars().count().max(1) as f64;
            (TextPlacement::Line, Some(max_angle_deg.to_radians() * ratio))
        } else {
            (TextPlacement::Point, None)
        };

        let anchor = self.properties.string(layer, Layout, "text-anchor", ctx);
        let (align, h_offset) = if anchor.contains("left") {
            (TextAlign::Left, halo_width)
        } else if anchor.contains("right") {
            (TextAlign::Right, -halo_width)
        } else {
            (TextAlign::Center, 0.0)
        };
        let extra_leading = 0.5 * (line_height - 1.0) * size;
        let (baseline, v_offset) = if anchor.starts_with("top") {
            (TextBaseline::Top, halo_width + extra_leading)
        } else if anchor.starts_with("bottom") {
            (TextBaseline::Bottom, -halo_width - extra_leading)
        } else {
            (TextBaseline::Middle, 0.0)
        };
        let justify = match self.properties.string(layer, Layout, "text-justify", ctx).as_str() {
            "left" => TextAlign::Left,
            "right" => TextAlign::Right,
            "center" => TextAlign::Center,
            _ => align,
        };

        let text_offset = self.properties.pair(layer, Layout, "text-offset", ctx);
        let translate = self.properties.pair(layer, Paint, "text-translate", ctx);
        let offset = [
            text_offset[0] * size + h_offset + translate[0],
            text_offset[1] * size + v_offset + translate[1],
        ];
        let rotation = self
            .properties
            .number(layer, Layout, "text-rotate", ctx)
            .to_radians();
        let rotate_with_view =
            self.properties.string(layer, Layout, "text-rotation-alignment", ctx) == "map";
        let padding = self.properties.number(layer, Layout, "text-padding", ctx);

        Some(Text {
            text,
            font,
            placement,
            max_angle,
            align,
            justify,
            baseline,
            offset,
            rotation,
            rotate_with_view,
            padding: [padding; 4],
            fill,
            halo,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use foundation::Vec2;
    use formats::{VectorFeature, VectorGeometry};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn feature(properties: Json, geometry: VectorGeometry) -> VectorFeature {
        VectorFeature {
            id: Some(json!(7)),
            properties: properties.as_object().cloned().unwrap_or_default(),
            geometry,
        }
    }

    fn point(properties: Json) -> VectorFeature {
        feature(properties, VectorGeometry::Point(Vec2::new(0.0, 0.0)))
    }

    fn line(properties: Json, length: f64) -> VectorFeature {
        feature(
            properties,
            VectorGeometry::LineString(vec![Vec2::new(0.0, 0.0), Vec2::new(length, 0.0)]),
        )
    }

    fn polygon(properties: Json) -> VectorFeature {
        feature(
            properties,
            VectorGeometry::Polygon(vec![vec![
                Vec2::new(0.0, 0.0),
                Vec2::new(10.0, 0.0),
                Vec2::new(10.0, 10.0),
                Vec2::new(0.0, 0.0),
            ]]),
        )
    }

    fn style(layers: Json) -> StyleDocument {
        StyleDocument::from_value(json!({
            "version": 8,
            "sources": {"shapes": {"type": "geojson", "data": {}}},
            "layers": layers
        }))
        .expect("document")
    }

    fn function(layers: Json) -> StyleFunction {
        StyleFunction::new(style(layers), StyleFunctionOptions::source("shapes")).expect("function")
    }

    fn res(zoom: usize) -> f64 {
        default_resolutions()[zoom]
    }

    fn sprite() -> SpriteAtlas {
        let mut atlas = SpriteAtlas::from_json_str(
            r#"{"marker": {"x": 0, "y": 0, "width": 4, "height": 4, "pixelRatio": 1}}"#,
        )
        .expect("sprite");
        let mut image = Pixmap::new(4, 4).expect("pixmap");
        image.fill(tiny_skia::Color::from_rgba8(255, 0, 0, 255));
        atlas.set_image(image);
        atlas
    }

    #[test]
    fn zoom_from_resolution() {
        let resolutions = default_resolutions();
        assert_eq!(resolutions.len(), 21);
        assert_eq!(zoom_for_resolution(resolutions[3], &resolutions), 3.0);
        let zoom = zoom_for_resolution(resolutions[2] * 1.5, &resolutions);
        assert!((zoom - (2.0 - 1.5f64.log2())).abs() < 1e-9, "zoom {zoom}");
        assert_eq!(zoom_for_resolution(0.001, &resolutions), 20.0);
    }

    #[test]
    fn rejects_unsupported_version() {
        let err = StyleFunction::from_json_str(
            r#"{"version": 7, "sources": {}, "layers": []}"#,
            StyleFunctionOptions::source("shapes"),
        )
        .expect_err("version 7");
        assert!(matches!(err, StyleError::UnsupportedVersion { found: Some(7) }));
    }

    #[test]
    fn aggregates_compile_errors() {
        let err = StyleFunction::new(
            style(json!([{
                "id": "broken", "type": "fill", "source": "shapes",
                "filter": ["==", ["get"], 1],
                "paint": {
                    "fill-color": ["get"],
                    "fill-opacity": ["interpolate", ["linear"], ["zoom"], 5, 1, 3, 2]
                }
            }])),
            StyleFunctionOptions::source("shapes"),
        )
        .expect_err("invalid expressions");
        let StyleError::Expressions(errors) = err else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(errors.len(), 3, "{errors:?}");
        assert!(errors.iter().any(|e| e.starts_with("layers.broken.filter")));
        assert!(errors.iter().any(|e| e.starts_with("layers.broken.paint.fill-opacity")));
    }

    #[test]
    fn zoom_range_is_half_open() {
        let mut f = function(json!([{
            "id": "roads", "type": "line", "source": "shapes", "minzoom": 5, "maxzoom": 10
        }]));
        let road = line(json!({}), 100.0);
        assert!(f.evaluate(&road, res(4)).is_none());
        assert!(f.evaluate(&road, res(5)).is_some());
        assert!(f.evaluate(&road, res(9)).is_some());
        assert!(f.evaluate(&road, res(10)).is_none());
    }

    #[test]
    fn fill_outline_requires_antialias_or_outline_color() {
        let red = Color::new(1.0, 0.0, 0.0, 1.0);
        let mut f = function(json!([
            {"id": "plain", "type": "fill", "source": "shapes", "paint": {"fill-color": "#ff0000"}}
        ]));
        let styles = f.evaluate(&polygon(json!({})), res(3)).expect("styles");
        assert_eq!(styles.len(), 1);
        assert_eq!(styles[0].fill, Some(Fill::Color(red)));

        let mut f = function(json!([
            {"id": "aa", "type": "fill", "source": "shapes",
             "paint": {"fill-color": "#ff0000", "fill-antialias": true}}
        ]));
        let styles = f.evaluate(&polygon(json!({})), res(3)).expect("styles");
        assert_eq!(styles.len(), 2);
        assert_eq!(styles[1].stroke.as_ref().map(|s| s.color), Some(red));
        assert_eq!(f.last_layers(), ["aa"]);

        let mut f = function(json!([
            {"id": "outlined", "type": "fill", "source": "shapes",
             "paint": {"fill-color": "#ff0000", "fill-outline-color": "#000000"}}
        ]));
        let styles = f.evaluate(&polygon(json!({})), res(3)).expect("styles");
        assert_eq!(styles[1].stroke.as_ref().map(|s| s.color), Some(Color::BLACK));
    }

    #[test]
    fn geometry_gating() {
        let mut f = function(json!([
            {"id": "area", "type": "fill", "source": "shapes"},
            {"id": "edge", "type": "line", "source": "shapes"},
            {"id": "dot", "type": "circle", "source": "shapes", "paint": {"circle-radius": 3}}
        ]));
        assert!(f.evaluate(&point(json!({})), res(3)).is_some());
        assert_eq!(f.last_layers(), ["dot"]);
        f.evaluate(&line(json!({}), 10.0), res(3));
        assert_eq!(f.last_layers(), ["edge"]);
        let styles = f.evaluate(&polygon(json!({})), res(3)).expect("styles").to_vec();
        assert_eq!(f.last_layers(), ["area", "edge"]);
        assert_eq!(styles.iter().map(|s| s.z_index).collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn fill_pattern_waits_for_sprite_image() {
        let layers = json!([
            {"id": "hatch", "type": "fill", "source": "shapes",
             "paint": {"fill-pattern": "marker", "fill-color": "#00f"}}
        ]);
        let mut options = StyleFunctionOptions::source("shapes");
        options.sprite = Some(
            SpriteAtlas::from_json_str(r#"{"marker": {"x": 0, "y": 0, "width": 4, "height": 4}}"#)
                .expect("sprite"),
        );
        let mut f = StyleFunction::new(style(layers), options).expect("function");
        assert!(f.evaluate(&polygon(json!({})), res(3)).is_none());

        let mut image = Pixmap::new(4, 4).expect("pixmap");
        image.fill(tiny_skia::Color::BLACK);
        f.set_sprite_image(image);
        let styles = f.evaluate(&polygon(json!({})), res(3)).expect("styles");
        assert!(matches!(&styles[0].fill, Some(Fill::Pattern(p)) if p.icon == "marker"));
    }

    #[test]
    fn line_stroke() {
        let mut f = function(json!([{
            "id": "dashed", "type": "line", "source": "shapes",
            "layout": {"line-cap": "round"},
            "paint": {"line-width": 2, "line-dasharray": [2, 1], "line-color": "#000"}
        }]));
        let styles = f.evaluate(&line(json!({}), 10.0), res(3)).expect("styles");
        let stroke = styles[0].stroke.as_ref().expect("stroke");
        assert_eq!(stroke.width, 2.0);
        assert_eq!(stroke.line_dash, Some(vec![4.0, 2.0]));
        assert_eq!(stroke.line_cap, LineCap::Round);
        assert_eq!(stroke.miter_limit, 2.0);
    }

    #[test]
    fn zero_line_width_draws_nothing() {
        let mut f = function(json!([
            {"id": "hidden", "type": "line", "source": "shapes", "paint": {"line-width": 0}},
            {"id": "patterned", "type": "line", "source": "shapes", "paint": {"line-pattern": "x"}}
        ]));
        assert!(f.evaluate(&line(json!({}), 10.0), res(3)).is_none());
        assert!(f.last_layers().is_empty());
    }

    #[test]
    fn circles() {
        let mut f = function(json!([
            {"id": "undeclared", "type": "circle", "source": "shapes"},
            {"id": "dot", "type": "circle", "source": "shapes",
             "paint": {"circle-radius": 4, "circle-color": "#f00", "circle-stroke-width": 0}}
        ]));
        let styles = f.evaluate(&point(json!({})), res(3)).expect("styles");
        assert_eq!(styles.len(), 1);
        let Some(Image::Circle(circle)) = &styles[0].image else {
            panic!("expected a circle");
        };
        assert_eq!(circle.radius, 4.0);
        assert!(circle.stroke.is_none());
        assert_eq!(f.last_layers(), ["dot"]);
    }

    #[test]
    fn point_icons_and_labels_share_a_slot() {
        let layers = style(json!([
            {"id": "fill", "type": "fill", "source": "shapes"},
            {"id": "poi", "type": "symbol", "source": "shapes",
             "layout": {"icon-image": "marker", "icon-size": 2, "icon-rotate": 90, "text-field": "{name}"}}
        ]));
        let mut options = StyleFunctionOptions::source("shapes");
        options.sprite = Some(sprite());
        let mut f = StyleFunction::new(layers, options).expect("function");
        let styles = f.evaluate(&point(json!({"name": "Cafe"})), res(12)).expect("styles");
        assert_eq!(styles.len(), 1);
        assert_eq!(styles[0].z_index, SYMBOL_Z_BASE - 1);
        let Some(Image::Icon(icon)) = &styles[0].image else {
            panic!("expected an icon");
        };
        assert_eq!(icon.scale, 2.0);
        assert_eq!(icon.anchor, [2.0, 2.0]);
        assert!((icon.rotation - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
        assert_eq!(styles[0].text.as_ref().map(|t| t.text.as_str()), Some("Cafe"));
    }

    #[test]
    fn short_lines_get_no_icon_or_label() {
        let layers = style(json!([
            {"id": "shield", "type": "symbol", "source": "shapes",
             "layout": {"icon-image": "marker", "text-field": "{ref}"}}
        ]));
        let mut options = StyleFunctionOptions::source("shapes");
        options.sprite = Some(sprite());
        let mut f = StyleFunction::new(layers, options).expect("function");

        // 100 map units at zoom 0 is far below a pixel.
        assert!(f.evaluate(&line(json!({"ref": "A1"}), 100.0), res(0)).is_none());

        // 20 km at zoom 10 spans about 260 pixels.
        let styles = f
            .evaluate(&line(json!({"ref": "A1"}), 20_000.0), res(10))
            .expect("styles");
        assert_eq!(styles.len(), 1);
        assert_eq!(styles[0].geometry, Some([10_000.0, 0.0]));
        assert!(styles[0].image.is_some());
        assert_eq!(styles[0].text.as_ref().map(|t| t.placement), Some(TextPlacement::Point));
    }

    #[test]
    fn line_labels_follow_the_line() {
        let mut f = function(json!([{
            "id": "names", "type": "symbol", "source": "shapes",
            "layout": {"symbol-placement": "line", "text-field": "{name}", "text-max-angle": 30}
        }]));
        let styles = f
            .evaluate(&line(json!({"name": "Long Road Name"}), 50.0), res(3))
            .expect("styles");
        let text = styles[0].text.as_ref().expect("text");
        assert_eq!(text.placement, TextPlacement::Line);
        assert_eq!(text.text, "Long Road Name");
        assert!((text.max_angle.expect("angle") - 30f64.to_radians()).abs() < 1e-12);
    }

    #[test]
    fn long_words_are_not_split() {
        let mut f = function(json!([{
            "id": "labels", "type": "symbol", "source": "shapes",
            "layout": {"text-field": "{name}", "text-max-width": 4, "text-transform": "uppercase"}
        }]));
        let styles = f
            .evaluate(&point(json!({"name": "supercalifragilisticexpialidocious"})), res(3))
            .expect("styles");
        let text = styles[0].text.as_ref().expect("text");
        assert_eq!(text.text, "SUPERCALIFRAGILISTICEXPIALIDOCIOUS");
        assert_eq!(text.font, "normal 400 16px/1.2 \"Open Sans\", sans-serif");
        assert_eq!(styles[0].z_index, SYMBOL_Z_BASE);
    }

    #[test]
    fn halo_offsets_follow_the_anchor() {
        let mut f = function(json!([{
            "id": "labels", "type": "symbol", "source": "shapes",
            "layout": {"text-field": "x", "text-anchor": "left", "text-size": 10},
            "paint": {"text-halo-width": 2, "text-halo-color": "#fff", "text-translate": [1, 1]}
        }]));
        let styles = f.evaluate(&point(json!({})), res(3)).expect("styles");
        let text = styles[0].text.as_ref().expect("text");
        assert_eq!(text.align, TextAlign::Left);
        assert_eq!(text.justify, TextAlign::Center);
        assert_eq!(text.baseline, TextBaseline::Middle);
        assert_eq!(text.offset, [3.0, 1.0]);
        assert_eq!(text.halo.as_ref().map(|h| h.width), Some(4.0));
    }

    #[test]
    fn empty_labels_are_skipped() {
        let mut f = function(json!([{
            "id": "labels", "type": "symbol", "source": "shapes",
            "layout": {"text-field": "{name}"}
        }]));
        assert!(f.evaluate(&point(json!({})), res(3)).is_none());
    }

    #[test]
    fn repeated_evaluation_is_idempotent() {
        let mut options = StyleFunctionOptions::source("shapes");
        options.sprite = Some(sprite());
        let mut f = StyleFunction::new(
            style(json!([
                {"id": "dot", "type": "circle", "source": "shapes",
                 "paint": {"circle-radius": ["get", "size"], "circle-color": "#0f0"}},
                {"id": "poi", "type": "symbol", "source": "shapes",
                 "layout": {"icon-image": "marker", "text-field": "{name}"}}
            ])),
            options,
        )
        .expect("function");
        let feature = point(json!({"size": 6, "name": "Stop"}));
        let first = f.evaluate(&feature, res(8)).expect("styles").to_vec();
        let second = f.evaluate(&feature, res(8)).expect("styles").to_vec();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn output_list_is_truncated_per_call() {
        let mut f = function(json!([
            {"id": "big", "type": "circle", "source": "shapes",
             "filter": [">", ["get", "rank"], 1], "paint": {"circle-radius": 5}},
            {"id": "small", "type": "circle", "source": "shapes", "paint": {"circle-radius": 2}}
        ]));
        assert_eq!(f.evaluate(&point(json!({"rank": 2})), res(3)).map(<[Style]>::len), Some(2));
        assert_eq!(f.evaluate(&point(json!({"rank": 0})), res(3)).map(<[Style]>::len), Some(1));
        assert_eq!(f.last_layers(), ["small"]);
    }

    #[test]
    fn filters_recompile_after_style_update() {
        let layers = |class: &str| {
            style(json!([{
                "id": "parks", "type": "fill", "source": "shapes",
                "filter": ["==", "class", class]
            }]))
        };
        let mut f = StyleFunction::new(layers("park"), StyleFunctionOptions::source("shapes"))
            .expect("function");
        let park = polygon(json!({"class": "park"}));
        assert!(f.evaluate(&park, res(3)).is_some());

        f.set_style(layers("wood")).expect("update");
        assert!(f.evaluate(&park, res(3)).is_none());
        assert!(f.evaluate(&polygon(json!({"class": "wood"})), res(3)).is_some());
    }

    #[test]
    fn only_layer_restricts_evaluation() {
        let mut f = function(json!([
            {"id": "a", "type": "circle", "source": "shapes", "paint": {"circle-radius": 1}},
            {"id": "b", "type": "circle", "source": "shapes", "paint": {"circle-radius": 2}}
        ]));
        let styles = f.evaluate_layer(&point(json!({})), res(3), Some("b")).expect("styles");
        assert_eq!(styles.len(), 1);
        assert_eq!(f.last_layers(), ["b"]);
    }

    #[test]
    fn feature_state_feeds_expressions() {
        let mut f = function(json!([{
            "id": "hover", "type": "circle", "source": "shapes",
            "paint": {"circle-radius": ["case", ["boolean", ["feature-state", "hover"], false], 8, 4]}
        }]));
        let dot = point(json!({}));
        let radius = |f: &mut StyleFunction| match f.evaluate(&dot, res(3)).map(|s| s[0].image.clone()) {
            Some(Some(Image::Circle(c))) => c.radius,
            _ => 0.0,
        };
        assert_eq!(radius(&mut f), 4.0);
        let state = json!({"hover": true}).as_object().cloned().unwrap_or_default();
        f.set_feature_state(&json!(7), Some(state));
        assert_eq!(radius(&mut f), 8.0);
        f.set_feature_state(&json!(7), None);
        assert_eq!(radius(&mut f), 4.0);
    }

    #[test]
    fn exposes_resolved_source() {
        let f = function(json!([
            {"id": "a", "type": "circle", "source": "shapes"},
            {"id": "b", "type": "line", "source": "shapes"}
        ]));
        assert_eq!(f.source_name(), "shapes");
        assert_eq!(f.layer_ids(), ["a", "b"]);
        assert!(f.sprite_image_url().is_none());
    }

    fn diagonal(properties: Json) -> VectorFeature {
        feature(
            properties,
            VectorGeometry::LineString(vec![Vec2::new(0.0, 0.0), Vec2::new(20_000.0, 20_000.0)]),
        )
    }

    #[test]
    fn oversized_data_driven_values_do_not_panic() {
        let mut f = function(json!([{
            "id": "dots", "type": "circle", "source": "shapes",
            "paint": {"circle-radius": ["get", "r"]}
        }]));
        assert!(f.evaluate(&point(json!({"r": 3e9})), res(3)).is_none());
        assert!(f.evaluate(&point(json!({"r": 20_000})), res(3)).is_none());
        assert!(f.evaluate(&point(json!({"r": 4})), res(3)).is_some());

        let mut f = function(json!([{
            "id": "labels", "type": "symbol", "source": "shapes",
            "layout": {"text-field": "{name}", "text-letter-spacing": ["get", "ls"]}
        }]));
        let styles = f
            .evaluate(&point(json!({"name": "ab", "ls": 1e300})), res(3))
            .expect("styles");
        let text = styles[0].text.as_ref().expect("text");
        assert_eq!(text.text.chars().filter(|c| *c == '\u{200A}').count(), 32);
    }

    #[test]
    fn line_placed_icons_follow_the_segment() {
        let icon_rotation = |alignment: &str| {
            let layers = style(json!([{
                "id": "arrows", "type": "symbol", "source": "shapes",
                "layout": {
                    "symbol-placement": "line",
                    "icon-image": "marker",
                    "icon-rotate": 90,
                    "icon-rotation-alignment": alignment
                }
            }]));
            let mut options = StyleFunctionOptions::source("shapes");
            options.sprite = Some(sprite());
            let mut f = StyleFunction::new(layers, options).expect("function");
            let styles = f.evaluate(&diagonal(json!({})), res(10)).expect("styles");
            assert_eq!(styles[0].geometry, Some([10_000.0, 10_000.0]));
            match &styles[0].image {
                Some(Image::Icon(icon)) => icon.rotation,
                other => panic!("expected an icon, got {other:?}"),
            }
        };
        let quarter = std::f64::consts::FRAC_PI_2;
        let rotation = icon_rotation("map");
        assert!((rotation - (quarter - std::f64::consts::FRAC_PI_4)).abs() < 1e-12, "{rotation}");
        let rotation = icon_rotation("viewport");
        assert!((rotation - quarter).abs() < 1e-12, "{rotation}");
    }

    #[test]
    fn letter_spacing_narrows_line_label_angle() {
        let mut f = function(json!([{
            "id": "names", "type": "symbol", "source": "shapes",
            "layout": {
                "symbol-placement": "line",
                "text-field": "{name}",
                "text-max-angle": 30,
                "text-letter-spacing": 0.1
            }
        }]));
        let styles = f.evaluate(&line(json!({"name": "Road"}), 50.0), res(3)).expect("styles");
        let text = styles[0].text.as_ref().expect("text");
        assert_eq!(text.text, "R\u{200A}o\u{200A}a\u{200A}d");
        let expected = 30f64.to_radians() * 4.0 / 7.0;
        assert!((text.max_angle.expect("angle") - expected).abs() < 1e-12);
    }

    #[test]
    fn line_labels_are_never_wrapped() {
        let mut f = function(json!([{
            "id": "names", "type": "symbol", "source": "shapes",
            "layout": {"text-field": "{name}", "text-max-width": 2}
        }]));
        let styles = f
            .evaluate(&line(json!({"name": "Long Road Name"}), 50.0), res(3))
            .expect("styles");
        let text = styles[0].text.as_ref().expect("text");
        assert_eq!(text.text, "Long Road Name");
        assert_eq!(text.placement, TextPlacement::Point);

        let styles = f
            .evaluate(&point(json!({"name": "Long Road Name"})), res(3))
            .expect("styles");
        assert!(styles[0].text.as_ref().expect("text").text.contains('\n'));
    }

    #[test]
    fn vertical_anchors_offset_by_halo_and_leading() {
        let offsets = |anchor: &str| {
            let mut f = function(json!([{
                "id": "labels", "type": "symbol", "source": "shapes",
                "layout": {"text-field": "x", "text-anchor": anchor, "text-size": 10},
                "paint": {"text-halo-width": 2, "text-halo-color": "#fff"}
            }]));
            let styles = f.evaluate(&point(json!({})), res(3)).expect("styles");
            let text = styles[0].text.clone().expect("text");
            (text.align, text.baseline, text.offset)
        };
        // Halo 2 plus half of the 0.2 extra line height at size 10.
        let (align, baseline, offset) = offsets("top");
        assert_eq!((align, baseline), (TextAlign::Center, TextBaseline::Top));
        assert!(offset[0].abs() < 1e-12 && (offset[1] - 3.0).abs() < 1e-9, "{offset:?}");

        let (align, baseline, offset) = offsets("bottom-right");
        assert_eq!((align, baseline), (TextAlign::Right, TextBaseline::Bottom));
        assert!((offset[0] + 2.0).abs() < 1e-12 && (offset[1] + 3.0).abs() < 1e-9, "{offset:?}");
    }
}
