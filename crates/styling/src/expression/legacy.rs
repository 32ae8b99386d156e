//! Conversion of legacy `{stops, base, type, property, default}` functions
//! into expression syntax.

use serde_json::{Map, Value as Json, json};

use crate::spec::{PropertySpec, PropertyType};

/// A legacy function object (as opposed to a constant or an expression).
pub fn is_function(json: &Json) -> bool {
    json.as_object().is_some_and(|obj| {
        obj.contains_key("stops") || obj.get("type").and_then(Json::as_str) == Some("identity")
    })
}

/// Rewrite a legacy function as an equivalent expression.
pub fn convert_function(function: &Map<String, Json>, spec: &PropertySpec) -> Json {
    let stops: Vec<(&Json, &Json)> = function
        .get("stops")
        .and_then(Json::as_array)
        .map(|stops| {
            stops
                .iter()
                .filter_map(|stop| match stop.as_array()?.as_slice() {
                    [input, output] => Some((input, output)),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();
    let property = function.get("property").and_then(Json::as_str);
    let base = function.get("base").and_then(Json::as_f64).unwrap_or(1.0);
    let default = function
        .get("default")
        .cloned()
        .unwrap_or_else(|| spec.default.clone());
    let kind = function
        .get("type")
        .and_then(Json::as_str)
        .unwrap_or_else(|| default_kind(property.is_some(), &stops, spec));

    match property {
        None if kind == "identity" => json!(["zoom"]),
        None if stops.is_empty() => literal(default),
        None => zoom_function(kind, base, &stops),
        Some(property) if stops.first().is_some_and(|(input, _)| input.is_object()) => {
            zoom_and_property_function(property, kind, base, &stops, default, spec)
        }
        Some(property) => property_function(property, kind, base, &stops, default, spec),
    }
}

fn default_kind(has_property: bool, stops: &[(&Json, &Json)], spec: &PropertySpec) -> &'static str {
    let categorical_keys = stops
        .first()
        .is_some_and(|(input, _)| input.is_string() || input.is_boolean());
    if has_property && categorical_keys {
        "categorical"
    } else if spec.kind.is_interpolatable() {
        "exponential"
    } else {
        "interval"
    }
}

/// Arrays and objects must be quoted inside expressions.
fn literal(value: Json) -> Json {
    match value {
        Json::Array(_) | Json::Object(_) => json!(["literal", value]),
        scalar => scalar,
    }
}

fn ramp(kind: &str, base: f64, input: Json, stops: &[(&Json, &Json)]) -> Json {
    let expr = if kind == "exponential" {
        let mut expr = vec![json!("interpolate"), json!(["exponential", base]), input];
        for (stop, output) in stops {
            expr.push((*stop).clone());
            expr.push(literal((*output).clone()));
        }
        expr
    } else {
        let first = stops
            .first()
            .map_or(Json::Null, |(_, output)| literal((*output).clone()));
        let mut expr = vec![json!("step"), input, first];
        for (stop, output) in stops.iter().skip(1) {
            expr.push((*stop).clone());
            expr.push(literal((*output).clone()));
        }
        expr
    };
    Json::Array(expr)
}

fn zoom_function(kind: &str, base: f64, stops: &[(&Json, &Json)]) -> Json {
    ramp(kind, base, json!(["zoom"]), stops)
}

fn type_guard(spec: &PropertySpec) -> Option<&'static str> {
    match spec.kind {
        PropertyType::Number => Some("number"),
        PropertyType::Boolean => Some("boolean"),
        PropertyType::String
        | PropertyType::Enum
        | PropertyType::Color
        | PropertyType::ResolvedImage
        | PropertyType::Formatted => Some("string"),
        _ => None,
    }
}

fn property_function(
    property: &str,
    kind: &str,
    base: f64,
    stops: &[(&Json, &Json)],
    default: Json,
    spec: &PropertySpec,
) -> Json {
    let get = json!(["get", property]);
    let default = literal(default);
    match kind {
        "identity" => match type_guard(spec) {
            Some(ty) => json!(["case", ["==", ["typeof", get], ty], get, default]),
            None => json!(["coalesce", get, default]),
        },
        "categorical" => {
            let mut expr = vec![json!("match"), get];
            let mut seen: Vec<&Json> = Vec::new();
            for (label, output) in stops {
                if seen.contains(label) {
                    continue;
                }
                seen.push(*label);
                expr.push((*label).clone());
                expr.push(literal((*output).clone()));
            }
            if seen.is_empty() {
                return default;
            }
            expr.push(default);
            Json::Array(expr)
        }
        _ if stops.is_empty() => default,
        _ => {
            let ramp = ramp(kind, base, get.clone(), stops);
            json!(["case", ["==", ["typeof", get], "number"], ramp, default])
        }
    }
}

fn zoom_and_property_function(
    property: &str,
    kind: &str,
    base: f64,
    stops: &[(&Json, &Json)],
    default: Json,
    spec: &PropertySpec,
) -> Json {
    let mut by_zoom: Vec<(f64, Vec<(&Json, &Json)>)> = Vec::new();
    for (input, output) in stops {
        let (Some(zoom), Some(value)) = (input.get("zoom").and_then(Json::as_f64), input.get("value"))
        else {
            continue;
        };
        match by_zoom.last_mut() {
            Some((z, group)) if *z == zoom => group.push((value, *output)),
            _ => by_zoom.push((zoom, vec![(value, *output)])),
        }
    }
    if by_zoom.is_empty() {
        return literal(default);
    }

    let interpolated = kind == "exponential";
    let mut expr = if interpolated {
        vec![json!("interpolate"), json!(["linear"]), json!(["zoom"])]
    } else {
        vec![json!("step"), json!(["zoom"])]
    };
    for (index, (zoom, group)) in by_zoom.iter().enumerate() {
        let inner = property_function(property, kind, base, group, default.clone(), spec);
        if !interpolated && index == 0 {
            expr.push(inner);
            continue;
        }
        expr.push(json!(zoom));
        expr.push(inner);
    }
    Json::Array(expr)
}
