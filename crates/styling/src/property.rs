//! Compiled property evaluators, cached per layer id and property name.

use std::collections::HashMap;

use serde_json::Value as Json;

use crate::color::Color;
use crate::document::{PropertyBag, StyleLayer};
use crate::expression::{EvalContext, Expression, Value, compile, is_expression, legacy};
use crate::spec::{PropertySpec, PropertyType, property_spec};

#[derive(Debug, Clone)]
struct CompiledProperty {
    kind: PropertyType,
    default: Value,
    evaluator: Expression,
}

impl CompiledProperty {
    fn evaluate(&self, ctx: &EvalContext<'_>) -> Value {
        if let Expression::Literal(constant) = &self.evaluator {
            return constant.clone();
        }
        self.evaluator
            .evaluate(ctx)
            .and_then(|v| coerce(v, self.kind))
            .unwrap_or_else(|| self.default.clone())
    }
}

fn compile_property(raw: Option<&Json>, spec: &PropertySpec) -> Result<CompiledProperty, Vec<String>> {
    let default = coerce(Value::from_json(&spec.default), spec.kind).unwrap_or(Value::Null);
    let evaluator = match raw {
        None => Expression::Literal(default.clone()),
        Some(json @ Json::Object(function)) if legacy::is_function(json) => {
            let converted = legacy::convert_function(function, spec);
            compile(&converted)?
        }
        Some(json) if is_expression(json) => {
            let compiled = compile(json)?;
            match compiled {
                // Literal expressions are coerced once, like plain constants.
                Expression::Literal(v) => {
                    Expression::Literal(coerce(v, spec.kind).unwrap_or_else(|| default.clone()))
                }
                other => other,
            }
        }
        Some(json) => Expression::Literal(
            coerce(Value::from_json(json), spec.kind).unwrap_or_else(|| default.clone()),
        ),
    };
    Ok(CompiledProperty {
        kind: spec.kind,
        default,
        evaluator,
    })
}

/// Coerce an evaluated value to a property type. `None` means "use the
/// default".
pub fn coerce(value: Value, kind: PropertyType) -> Option<Value> {
    match (kind, value) {
        (_, Value::Null) => None,
        (PropertyType::Any, v) => Some(v),
        (PropertyType::Color, v) => v.to_color().map(Value::Color),
        (PropertyType::Number, Value::Number(n)) if n.is_finite() => Some(Value::Number(n)),
        (PropertyType::Boolean, Value::Bool(b)) => Some(Value::Bool(b)),
        (
            PropertyType::String | PropertyType::Enum | PropertyType::ResolvedImage,
            Value::String(s),
        ) => Some(Value::String(s)),
        (PropertyType::Formatted, v @ (Value::String(_) | Value::Number(_) | Value::Bool(_))) => {
            Some(Value::String(v.to_string()))
        }
        (PropertyType::NumberArray, Value::Array(items))
            if items.iter().all(|v| matches!(v, Value::Number(_))) =>
        {
            Some(Value::Array(items))
        }
        (PropertyType::StringArray, Value::Array(items))
            if items.iter().all(|v| matches!(v, Value::String(_))) =>
        {
            Some(Value::Array(items))
        }
        _ => None,
    }
}

#[derive(Debug, Default)]
struct LayerProperties {
    layout: HashMap<String, CompiledProperty>,
    paint: HashMap<String, CompiledProperty>,
}

impl LayerProperties {
    fn bag(&self, bag: PropertyBag) -> &HashMap<String, CompiledProperty> {
        match bag {
            PropertyBag::Layout => &self.layout,
            PropertyBag::Paint => &self.paint,
        }
    }

    fn bag_mut(&mut self, bag: PropertyBag) -> &mut HashMap<String, CompiledProperty> {
        match bag {
            PropertyBag::Layout => &mut self.layout,
            PropertyBag::Paint => &mut self.paint,
        }
    }
}

/// Per-layer-id cache of compiled property evaluators. Resolved values are
/// never cached, only the evaluators.
#[derive(Debug, Default)]
pub struct PropertyCache {
    layers: HashMap<String, LayerProperties>,
}

impl PropertyCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile every declared property of `layer`, returning all compile
    /// errors.
    pub fn compile_layer(&mut self, layer: &StyleLayer) -> Vec<String> {
        let mut errors = Vec::new();
        let mut compiled = LayerProperties::default();
        for bag in [PropertyBag::Layout, PropertyBag::Paint] {
            for (name, raw) in layer.bag(bag) {
                let spec = property_spec(bag, name);
                let property = match compile_property(Some(raw), &spec) {
                    Ok(property) => property,
                    Err(messages) => {
                        errors.extend(messages.into_iter().map(|message| {
                            format!("layers.{}.{}.{name}: {message}", layer.id, bag.as_str())
                        }));
                        continue;
                    }
                };
                compiled.bag_mut(bag).insert(name.clone(), property);
            }
        }
        self.layers.insert(layer.id.clone(), compiled);
        errors
    }

    pub fn value(
        &mut self,
        layer: &StyleLayer,
        bag: PropertyBag,
        name: &str,
        ctx: &EvalContext<'_>,
    ) -> Value {
        if let Some(compiled) = self
            .layers
            .get(&layer.id)
            .and_then(|props| props.bag(bag).get(name))
        {
            return compiled.evaluate(ctx);
        }

        let spec = property_spec(bag, name);
        let compiled = compile_property(layer.bag(bag).get(name), &spec).unwrap_or_else(|errors| {
            tracing::debug!(layer = %layer.id, property = name, ?errors, "property falls back to default");
            CompiledProperty {
                kind: spec.kind,
                default: Value::Null,
                evaluator: Expression::Literal(
                    coerce(Value::from_json(&spec.default), spec.kind).unwrap_or(Value::Null),
                ),
            }
        });
        let value = compiled.evaluate(ctx);
        self.layers
            .entry(layer.id.clone())
            .or_default()
            .bag_mut(bag)
            .insert(name.to_string(), compiled);
        value
    }

    pub fn number(
        &mut self,
        layer: &StyleLayer,
        bag: PropertyBag,
        name: &str,
        ctx: &EvalContext<'_>,
    ) -> f64 {
        self.value(layer, bag, name, ctx).as_f64().unwrap_or(0.0)
    }

    pub fn color(
        &mut self,
        layer: &StyleLayer,
        bag: PropertyBag,
        name: &str,
        ctx: &EvalContext<'_>,
    ) -> Option<Color> {
        match self.value(layer, bag, name, ctx) {
            Value::Color(c) => Some(c),
            _ => None,
        }
    }

    pub fn string(
        &mut self,
        layer: &StyleLayer,
        bag: PropertyBag,
        name: &str,
        ctx: &EvalContext<'_>,
    ) -> String {
        match self.value(layer, bag, name, ctx) {
            Value::String(s) => s,
            _ => String::new(),
        }
    }

    pub fn boolean(
        &mut self,
        layer: &StyleLayer,
        bag: PropertyBag,
        name: &str,
        ctx: &EvalContext<'_>,
    ) -> bool {
        self.value(layer, bag, name, ctx).as_bool().unwrap_or(false)
    }

    pub fn numbers(
        &mut self,
        layer: &StyleLayer,
        bag: PropertyBag,
        name: &str,
        ctx: &EvalContext<'_>,
    ) -> Vec<f64> {
        match self.value(layer, bag, name, ctx) {
            Value::Array(items) => items.iter().filter_map(Value::as_f64).collect(),
            _ => Vec::new(),
        }
    }

    pub fn strings(
        &mut self,
        layer: &StyleLayer,
        bag: PropertyBag,
        name: &str,
        ctx: &EvalContext<'_>,
    ) -> Vec<String> {
        match self.value(layer, bag, name, ctx) {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// A `[x, y]` pair such as a translate or offset; missing entries are 0.
    pub fn pair(
        &mut self,
        layer: &StyleLayer,
        bag: PropertyBag,
        name: &str,
        ctx: &EvalContext<'_>,
    ) -> [f64; 2] {
        let values = self.numbers(layer, bag, name, ctx);
        [
            values.first().copied().unwrap_or(0.0),
            values.get(1).copied().unwrap_or(0.0),
        ]
    }

    pub fn invalidate(&mut self, layer_id: &str) {
        self.layers.remove(layer_id);
    }

    pub fn contains_layer(&self, layer_id: &str) -> bool {
        self.layers.contains_key(layer_id)
    }
}
