//! Layer selection: `ref` expansion, source matching and grouping by source
//! sub-layer.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

use crate::document::{StyleDocument, StyleLayer};
use crate::error::StyleError;

/// Properties a `ref` layer inherits from the layer it references.
const INHERITED: [&str; 7] = [
    "type",
    "source",
    "source-layer",
    "minzoom",
    "maxzoom",
    "filter",
    "layout",
];

/// Which layers of a document a style function renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceSelector {
    /// Every layer using this source.
    Source(String),
    /// These layer ids, which must share one source.
    Layers(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLayer {
    /// Position in the document; the base z-index.
    pub index: usize,
    pub layer: StyleLayer,
}

#[derive(Debug, Clone, Default)]
pub struct ResolvedStyle {
    /// Selected layers in document order.
    pub layers: Vec<ResolvedLayer>,
    by_source_layer: HashMap<String, Vec<usize>>,
    without_source_layer: Vec<usize>,
    pub layer_ids: Vec<String>,
    pub source: String,
    pub source_type: String,
    /// Every layer id of the document, selected or not.
    pub document_layer_ids: Vec<String>,
}

impl ResolvedStyle {
    /// Candidate layers for a feature of `source_layer`, in document order.
    pub fn candidates(&self, source_layer: Option<&str>) -> &[usize] {
        let group = match source_layer {
            Some(name) => self.by_source_layer.get(name),
            None => Some(&self.without_source_layer),
        };
        group.map_or(&[], Vec::as_slice)
    }

    pub fn layer(&self, position: usize) -> Option<&ResolvedLayer> {
        self.layers.get(position)
    }

    pub fn group_count(&self) -> usize {
        self.by_source_layer.len() + usize::from(!self.without_source_layer.is_empty())
    }
}

fn layer_id(raw: &Json) -> Option<&str> {
    raw.get("id").and_then(Json::as_str)
}

/// Materialize every layer, copying inherited properties into `ref` layers.
pub fn expand_refs(document: &StyleDocument) -> Result<Vec<StyleLayer>, StyleError> {
    let by_id: HashMap<&str, &Map<String, Json>> = document
        .layers
        .iter()
        .filter_map(|raw| Some((layer_id(raw)?, raw.as_object()?)))
        .collect();

    let mut layers = Vec::with_capacity(document.layers.len());
    for (index, raw) in document.layers.iter().enumerate() {
        let Some(object) = raw.as_object() else {
            return Err(StyleError::InvalidLayer {
                index,
                reason: "layer is not an object".to_string(),
            });
        };
        let mut object = object.clone();
        if let Some(reference) = object.remove("ref") {
            let reference = reference.as_str().unwrap_or_default();
            let Some(parent) = by_id.get(reference) else {
                return Err(StyleError::MissingRef {
                    layer: layer_id(raw).unwrap_or_default().to_string(),
                    reference: reference.to_string(),
                });
            };
            for key in INHERITED {
                if let Some(value) = parent.get(key) {
                    object.insert(key.to_string(), value.clone());
                }
            }
        }
        let layer: StyleLayer = serde_json::from_value(Json::Object(object)).map_err(|err| {
            StyleError::InvalidLayer {
                index,
                reason: err.to_string(),
            }
        })?;
        layers.push(layer);
    }
    Ok(layers)
}

pub fn resolve(document: &StyleDocument, selector: &SourceSelector) -> Result<ResolvedStyle, StyleError> {
    let layers = expand_refs(document)?;
    let document_layer_ids: Vec<String> = layers.iter().map(|l| l.id.clone()).collect();

    let selected: Vec<ResolvedLayer> = layers
        .into_iter()
        .enumerate()
        .filter(|(_, layer)| match selector {
            SourceSelector::Source(source) => layer.source.as_deref() == Some(source.as_str()),
            SourceSelector::Layers(ids) => layer.source.is_some() && ids.contains(&layer.id),
        })
        .map(|(index, layer)| ResolvedLayer { index, layer })
        .collect();

    let source = match selector {
        SourceSelector::Source(source) => source.clone(),
        SourceSelector::Layers(ids) => {
            let Some(source) = selected.first().and_then(|l| l.layer.source.clone()) else {
                return Err(StyleError::NoMatchingLayers(ids.clone()));
            };
            if let Some(other) = selected
                .iter()
                .find(|l| l.layer.source.as_deref() != Some(source.as_str()))
            {
                return Err(StyleError::MixedSources {
                    layer: other.layer.id.clone(),
                    source,
                });
            }
            source
        }
    };

    if !document.sources.contains_key(&source) {
        return Err(StyleError::UndefinedSource(source));
    }
    let source_type = document.source_type(&source).unwrap_or_default().to_string();
    if source_type != "vector" && source_type != "geojson" {
        return Err(StyleError::UnsupportedSourceType {
            source,
            kind: source_type,
        });
    }

    let mut by_source_layer: HashMap<String, Vec<usize>> = HashMap::new();
    let mut without_source_layer = Vec::new();
    for (position, resolved) in selected.iter().enumerate() {
        match &resolved.layer.source_layer {
            Some(name) => by_source_layer.entry(name.clone()).or_default().push(position),
            None => without_source_layer.push(position),
        }
    }
    let layer_ids = selected.iter().map(|l| l.layer.id.clone()).collect();

    tracing::debug!(
        source = %source,
        layers = selected.len(),
        groups = by_source_layer.len(),
        "resolved style layers"
    );

    Ok(ResolvedStyle {
        layers: selected,
        by_source_layer,
        without_source_layer,
        layer_ids,
        source,
        source_type,
        document_layer_ids,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::LayerType;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn document(value: Json) -> StyleDocument {
        StyleDocument::from_value(value).expect("document")
    }

    fn sample() -> StyleDocument {
        document(json!({
            "version": 8,
            "sources": {
                "streets": {"type": "vector", "url": "x"},
                "shapes": {"type": "geojson", "data": {}},
                "satellite": {"type": "raster"}
            },
            "layers": [
                {"id": "background", "type": "background"},
                {"id": "water", "type": "fill", "source": "streets", "source-layer": "water"},
                {"id": "roads", "type": "line", "source": "streets", "source-layer": "road",
                 "minzoom": 5, "filter": ["==", "class", "major"], "layout": {"line-cap": "round"},
                 "paint": {"line-color": "#f00"}},
                {"id": "roads-casing", "ref": "roads", "paint": {"line-color": "#000"}},
                {"id": "drawn", "type": "circle", "source": "shapes"},
                {"id": "imagery", "type": "raster", "source": "satellite"}
            ]
        }))
    }

    #[test]
    fn expands_refs() {
        let layers = expand_refs(&sample()).expect("layers");
        let casing = &layers[3];
        assert_eq!(casing.layer_type, LayerType::Line);
        assert_eq!(casing.source.as_deref(), Some("streets"));
        assert_eq!(casing.source_layer.as_deref(), Some("road"));
        assert_eq!(casing.minzoom, Some(5.0));
        assert_eq!(casing.filter, Some(json!(["==", "class", "major"])));
        assert_eq!(casing.layout.get("line-cap"), Some(&json!("round")));
        assert_eq!(casing.paint.get("line-color"), Some(&json!("#000")));
    }

    #[test]
    fn missing_ref_is_an_error() {
        let doc = document(json!({
            "version": 8,
            "sources": {},
            "layers": [{"id": "orphan", "ref": "nowhere"}]
        }));
        let err = expand_refs(&doc).expect_err("missing ref");
        assert!(matches!(err, StyleError::MissingRef { ref reference, .. } if reference == "nowhere"));
    }

    #[test]
    fn selects_by_source_and_groups() {
        let resolved = resolve(&sample(), &SourceSelector::Source("streets".into())).expect("resolve");
        assert_eq!(resolved.layer_ids, vec!["water", "roads", "roads-casing"]);
        assert_eq!(resolved.source, "streets");
        assert_eq!(resolved.group_count(), 2);
        assert_eq!(resolved.candidates(Some("road")), &[1, 2]);
        assert_eq!(resolved.candidates(Some("water")), &[0]);
        assert!(resolved.candidates(Some("building")).is_empty());
        assert!(resolved.candidates(None).is_empty());
        assert_eq!(resolved.layers[1].index, 2);
        assert_eq!(resolved.document_layer_ids.len(), 6);
    }

    #[test]
    fn selects_by_layer_ids() {
        let ids = SourceSelector::Layers(vec!["roads".into(), "water".into()]);
        let resolved = resolve(&sample(), &ids).expect("resolve");
        // Document order wins over list order.
        assert_eq!(resolved.layer_ids, vec!["water", "roads"]);
        assert_eq!(resolved.source, "streets");

        let resolved =
            resolve(&sample(), &SourceSelector::Layers(vec!["drawn".into()])).expect("resolve");
        assert_eq!(resolved.source_type, "geojson");
        assert_eq!(resolved.candidates(None), &[0]);
    }

    #[test]
    fn rejects_bad_sources() {
        let mixed = SourceSelector::Layers(vec!["water".into(), "drawn".into()]);
        assert!(matches!(
            resolve(&sample(), &mixed),
            Err(StyleError::MixedSources { ref layer, .. }) if layer == "drawn"
        ));
        assert!(matches!(
            resolve(&sample(), &SourceSelector::Source("satellite".into())),
            Err(StyleError::UnsupportedSourceType { .. })
        ));
        assert!(matches!(
            resolve(&sample(), &SourceSelector::Source("nowhere".into())),
            Err(StyleError::UndefinedSource(_))
        ));
        assert!(matches!(
            resolve(&sample(), &SourceSelector::Layers(vec!["background".into()])),
            Err(StyleError::NoMatchingLayers(_))
        ));
    }

    #[test]
    fn selector_deserializes() {
        let selector: SourceSelector = serde_json::from_value(json!({"layers": ["a", "b"]})).expect("selector");
        assert_eq!(selector, SourceSelector::Layers(vec!["a".into(), "b".into()]));
        let selector: SourceSelector = serde_json::from_value(json!({"source": "s"})).expect("selector");
        assert_eq!(selector, SourceSelector::Source("s".into()));
    }
}
