//! Style document model.
//!
//! Layers are kept as raw JSON in [`StyleDocument`] so that `ref` inheritance
//! can be expanded before they are materialized into typed [`StyleLayer`]s.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{StyleError, SUPPORTED_VERSION};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StyleDocument {
    #[serde(default)]
    pub version: Option<u64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub sources: Map<String, Value>,
    #[serde(default)]
    pub layers: Vec<Value>,
    /// Sprite base URL (or list of named sprites); resolved by the host.
    #[serde(default)]
    pub sprite: Option<Value>,
    #[serde(default)]
    pub glyphs: Option<String>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

impl StyleDocument {
    pub fn from_json_str(json: &str) -> Result<Self, StyleError> {
        let doc: StyleDocument = serde_json::from_str(json)?;
        doc.validate_version()?;
        Ok(doc)
    }

    pub fn from_value(value: Value) -> Result<Self, StyleError> {
        let doc: StyleDocument = serde_json::from_value(value)?;
        doc.validate_version()?;
        Ok(doc)
    }

    pub fn validate_version(&self) -> Result<(), StyleError> {
        if self.version != Some(SUPPORTED_VERSION) {
            return Err(StyleError::UnsupportedVersion {
                found: self.version,
            });
        }
        Ok(())
    }

    /// Source `type` for a declared source id.
    pub fn source_type(&self, source: &str) -> Option<&str> {
        self.sources.get(source)?.get("type")?.as_str()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayerType {
    Fill,
    Line,
    Symbol,
    Circle,
    Background,
    Raster,
    FillExtrusion,
    Hillshade,
    Heatmap,
    #[serde(other)]
    Unknown,
}

impl LayerType {
    pub fn as_str(self) -> &'static str {
        match self {
            LayerType::Fill => "fill",
            LayerType::Line => "line",
            LayerType::Symbol => "symbol",
            LayerType::Circle => "circle",
            LayerType::Background => "background",
            LayerType::Raster => "raster",
            LayerType::FillExtrusion => "fill-extrusion",
            LayerType::Hillshade => "hillshade",
            LayerType::Heatmap => "heatmap",
            LayerType::Unknown => "unknown",
        }
    }
}

/// Property bag a property lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyBag {
    Layout,
    Paint,
}

impl PropertyBag {
    pub fn as_str(self) -> &'static str {
        match self {
            PropertyBag::Layout => "layout",
            PropertyBag::Paint => "paint",
        }
    }
}

/// A fully materialized (ref-expanded) style layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleLayer {
    pub id: String,
    #[serde(rename = "type")]
    pub layer_type: LayerType,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(rename = "source-layer", default)]
    pub source_layer: Option<String>,
    #[serde(default)]
    pub minzoom: Option<f64>,
    #[serde(default)]
    pub maxzoom: Option<f64>,
    #[serde(default)]
    pub layout: Map<String, Value>,
    #[serde(default)]
    pub paint: Map<String, Value>,
    #[serde(default)]
    pub filter: Option<Value>,
}

impl StyleLayer {
    pub fn bag(&self, bag: PropertyBag) -> &Map<String, Value> {
        match bag {
            PropertyBag::Layout => &self.layout,
            PropertyBag::Paint => &self.paint,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.layout.get("visibility").and_then(Value::as_str) != Some("none")
    }

    /// `minzoom` is inclusive, `maxzoom` exclusive.
    pub fn in_zoom_range(&self, zoom: f64) -> bool {
        let min_ok = self.minzoom.is_none_or(|z| zoom >= z);
        let max_ok = self.maxzoom.is_none_or(|z| zoom < z);
        min_ok && max_ok
    }
}
