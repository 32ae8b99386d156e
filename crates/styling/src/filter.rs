//! Layer filters: legacy syntax detection and conversion, and a per-layer-id
//! cache of compiled predicates.

use std::collections::HashMap;

use serde_json::{Value as Json, json};

use crate::document::StyleLayer;
use crate::expression::{EvalContext, Expression, Value, compile};

/// Whether `filter` uses expression syntax (as opposed to legacy
/// `[op, key, value]` syntax).
pub fn is_expression_filter(filter: &Json) -> bool {
    if filter.is_boolean() {
        return true;
    }
    let Some(items) = filter.as_array() else {
        return false;
    };
    let Some(op) = items.first().and_then(Json::as_str) else {
        return false;
    };
    match op {
        "has" => items.len() >= 2 && !matches!(items[1].as_str(), Some("$id" | "$type")),
        "in" => items.len() >= 3 && (!items[1].is_string() || items[2].is_array()),
        "!in" | "!has" | "none" => false,
        "==" | "!=" | ">" | ">=" | "<" | "<=" => {
            items.len() != 3 || items[1].is_array() || items[2].is_array()
        }
        "any" | "all" => items[1..]
            .iter()
            .all(|f| is_expression_filter(f) || f.is_boolean()),
        _ => true,
    }
}

fn key_expression(key: &Json) -> Json {
    match key.as_str() {
        Some("$type") => json!(["geometry-type"]),
        Some("$id") => json!(["id"]),
        _ => json!(["get", key]),
    }
}

fn literal(value: &Json) -> Json {
    match value {
        Json::Array(_) | Json::Object(_) => json!(["literal", value]),
        scalar => scalar.clone(),
    }
}

/// Rewrite a legacy filter as a boolean expression. Legacy comparisons are
/// strictly typed: a string never matches a number.
pub fn convert_legacy_filter(filter: &Json) -> Json {
    let Some(items) = filter.as_array() else {
        return filter.clone();
    };
    let Some(op) = items.first().and_then(Json::as_str) else {
        return filter.clone();
    };
    let args = &items[1..];
    let children = |args: &[Json]| -> Vec<Json> {
        args.iter()
            .map(|f| {
                if is_expression_filter(f) {
                    f.clone()
                } else {
                    convert_legacy_filter(f)
                }
            })
            .collect()
    };

    match (op, args) {
        ("all" | "any", _) => {
            let mut out = vec![json!(op)];
            out.extend(children(args));
            Json::Array(out)
        }
        ("none", _) => {
            let mut any = vec![json!("any")];
            any.extend(children(args));
            json!(["!", any])
        }
        ("==" | "!=", [key, value]) => json!([op, key_expression(key), literal(value)]),
        ("<" | "<=" | ">" | ">=", [key, value]) => {
            let expected = match value {
                Json::Number(_) => "number",
                Json::String(_) => "string",
                _ => return json!(false),
            };
            let key = key_expression(key);
            json!(["all", ["==", ["typeof", key], expected], [op, key, value]])
        }
        ("in" | "!in", [key, values @ ..]) => {
            let key = key_expression(key);
            let mut any = vec![json!("any")];
            any.extend(values.iter().map(|v| json!(["==", key, literal(v)])));
            if op == "in" {
                Json::Array(any)
            } else {
                json!(["!", any])
            }
        }
        ("has" | "!has", [key]) => {
            let has = match key.as_str() {
                Some("$type") => json!(true),
                Some("$id") => json!(["!=", ["id"], null]),
                _ => json!(["has", key]),
            };
            if op == "has" { has } else { json!(["!", has]) }
        }
        _ => filter.clone(),
    }
}

/// Compile a layer filter. An absent filter compiles to `None` (always true).
pub fn compile_filter(filter: Option<&Json>) -> Result<Option<Expression>, Vec<String>> {
    let Some(filter) = filter else {
        return Ok(None);
    };
    let expr = if is_expression_filter(filter) {
        compile(filter)?
    } else {
        compile(&convert_legacy_filter(filter))?
    };
    Ok(Some(expr))
}

/// Compiled filters keyed by layer id. The filter content is not re-checked
/// on lookup; callers invalidate ids whose document changed.
#[derive(Debug, Default)]
pub struct FilterCache {
    compiled: HashMap<String, Option<Expression>>,
}

impl FilterCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compile_layer(&mut self, layer: &StyleLayer) -> Vec<String> {
        match compile_filter(layer.filter.as_ref()) {
            Ok(expr) => {
                self.compiled.insert(layer.id.clone(), expr);
                Vec::new()
            }
            Err(errors) => errors
                .into_iter()
                .map(|message| format!("layers.{}.filter: {message}", layer.id))
                .collect(),
        }
    }

    pub fn evaluate(&mut self, layer_id: &str, filter: Option<&Json>, ctx: &EvalContext<'_>) -> bool {
        if !self.compiled.contains_key(layer_id) {
            let expr = compile_filter(filter).unwrap_or_else(|errors| {
                tracing::debug!(layer = layer_id, ?errors, "invalid filter rejects every feature");
                Some(Expression::Literal(Value::Bool(false)))
            });
            self.compiled.insert(layer_id.to_string(), expr);
        }
        match self.compiled.get(layer_id) {
            Some(Some(expr)) => matches!(expr.evaluate(ctx), Some(Value::Bool(true))),
            _ => true,
        }
    }

    pub fn invalidate(&mut self, layer_id: &str) {
        self.compiled.remove(layer_id);
    }
}
