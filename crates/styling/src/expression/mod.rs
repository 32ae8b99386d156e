//! Style expression language.
//!
//! Raw JSON expressions are compiled once into an [`Expression`] tree
//! ([`compile`]) and evaluated per feature against an [`EvalContext`].
//! Evaluation returns `None` on a runtime type error; callers substitute the
//! property default.
//!
//! Supported operator families:
//! - lookup: `get`, `has`, `at`, `in`, `length`, `properties`, `id`,
//!   `geometry-type`, `zoom`, `feature-state`
//! - ramps: `interpolate` (`linear`, `exponential`, `cubic-bezier`), `step`
//! - branching: `match`, `case`, `coalesce`, `let`/`var`
//! - comparison and logic: `==`, `!=`, `<`, `<=`, `>`, `>=`, `all`, `any`, `!`
//! - math, string, type and color conversions

mod compile;
pub mod legacy;
mod value;

use std::cmp::Ordering;

use serde_json::{Map, Value as Json};

use crate::feature::GeometryType;

pub use compile::{compile, is_expression};
pub use value::{Value, format_number};

/// The feature facts an expression may read.
#[derive(Debug, Clone, Copy)]
pub struct FeatureContext<'a> {
    pub id: Option<&'a Json>,
    pub properties: &'a Map<String, Json>,
    pub geometry_type: GeometryType,
    pub state: Option<&'a Map<String, Json>>,
}

#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub zoom: f64,
    pub feature: FeatureContext<'a>,
}

impl<'a> EvalContext<'a> {
    pub fn new(zoom: f64, feature: FeatureContext<'a>) -> Self {
        Self { zoom, feature }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Curve {
    Linear,
    Exponential(f64),
    CubicBezier([f64; 4]),
}

impl Curve {
    /// Interpolation factor in `0..=1` for `input` between two stop inputs.
    pub fn factor(self, input: f64, lower: f64, upper: f64) -> f64 {
        let diff = upper - lower;
        if diff == 0.0 {
            return 0.0;
        }
        let progress = input - lower;
        match self {
            Curve::Linear => progress / diff,
            Curve::Exponential(base) => {
                if base == 1.0 {
                    progress / diff
                } else {
                    (base.powf(progress) - 1.0) / (base.powf(diff) - 1.0)
                }
            }
            Curve::CubicBezier([x1, y1, x2, y2]) => {
                UnitBezier::new(x1, y1, x2, y2).solve(progress / diff, 1e-6)
            }
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MathOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    Min,
    Max,
    Abs,
    Ceil,
    Floor,
    Round,
    Sqrt,
    Ln,
    Log10,
    Log2,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TypeAssertion {
    Number,
    String,
    Boolean,
    Array,
    Object,
}

impl TypeAssertion {
    fn accepts(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (TypeAssertion::Number, Value::Number(_))
                | (TypeAssertion::String, Value::String(_))
                | (TypeAssertion::Boolean, Value::Bool(_))
                | (TypeAssertion::Array, Value::Array(_))
                | (TypeAssertion::Object, Value::Object(_))
        )
    }
}

type Stops = Vec<(f64, Expression)>;

/// A compiled expression tree. `let` bindings are substituted during
/// compilation, so the tree is free of variables.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(Value),
    Get {
        key: Box<Expression>,
        object: Option<Box<Expression>>,
    },
    Has {
        key: Box<Expression>,
        object: Option<Box<Expression>>,
    },
    At {
        index: Box<Expression>,
        array: Box<Expression>,
    },
    In {
        needle: Box<Expression>,
        haystack: Box<Expression>,
    },
    Length(Box<Expression>),
    Properties,
    Id,
    GeometryType,
    Zoom,
    FeatureState(Box<Expression>),
    Interpolate {
        curve: Curve,
        input: Box<Expression>,
        stops: Stops,
    },
    Step {
        input: Box<Expression>,
        first: Box<Expression>,
        stops: Stops,
    },
    Match {
        input: Box<Expression>,
        branches: Vec<(Vec<Value>, Expression)>,
        fallback: Box<Expression>,
    },
    Case {
        branches: Vec<(Expression, Expression)>,
        fallback: Box<Expression>,
    },
    Coalesce(Vec<Expression>),
    Compare(CompareOp, Box<Expression>, Box<Expression>),
    All(Vec<Expression>),
    Any(Vec<Expression>),
    Not(Box<Expression>),
    Math(MathOp, Vec<Expression>),
    Concat(Vec<Expression>),
    Upcase(Box<Expression>),
    Downcase(Box<Expression>),
    Assert(TypeAssertion, Vec<Expression>),
    ToNumber(Vec<Expression>),
    ToString(Box<Expression>),
    ToBoolean(Box<Expression>),
    ToColor(Vec<Expression>),
    TypeOf(Box<Expression>),
    Rgba(Vec<Expression>),
    ToRgba(Box<Expression>),
    Image(Box<Expression>),
    Format(Vec<Expression>),
}

impl Expression {
    /// True when the value does not depend on zoom or feature.
    pub fn is_constant(&self) -> bool {
        matches!(self, Expression::Literal(_))
    }

    pub fn evaluate(&self, ctx: &EvalContext<'_>) -> Option<Value> {
        match self {
            Expression::Literal(v) => Some(v.clone()),
            Expression::Get { key, object } => {
                let key = key.evaluate(ctx)?;
                let key = key.as_str()?;
                match object {
                    Some(object) => match object.evaluate(ctx)? {
                        Value::Object(mut map) => Some(map.remove(key).unwrap_or(Value::Null)),
                        _ => None,
                    },
                    None => Some(
                        ctx.feature
                            .properties
                            .get(key)
                            .map_or(Value::Null, Value::from_json),
                    ),
                }
            }
            Expression::Has { key, object } => {
                let key = key.evaluate(ctx)?;
                let key = key.as_str()?;
                match object {
                    Some(object) => match object.evaluate(ctx)? {
                        Value::Object(map) => Some(Value::Bool(map.contains_key(key))),
                        _ => None,
                    },
                    None => Some(Value::Bool(ctx.feature.properties.contains_key(key))),
                }
            }
            Expression::At { index, array } => {
                let index = index.evaluate(ctx)?.as_f64()?;
                let Value::Array(mut items) = array.evaluate(ctx)? else {
                    return None;
                };
                if index < 0.0 || index.fract() != 0.0 || index as usize >= items.len() {
                    return None;
                }
                Some(items.swap_remove(index as usize))
            }
            Expression::In { needle, haystack } => {
                let needle = needle.evaluate(ctx)?;
                match haystack.evaluate(ctx)? {
                    Value::String(s) => Some(Value::Bool(s.contains(needle.as_str()?))),
                    Value::Array(items) => Some(Value::Bool(items.contains(&needle))),
                    _ => None,
                }
            }
            Expression::Length(inner) => match inner.evaluate(ctx)? {
                Value::String(s) => Some(Value::Number(s.chars().count() as f64)),
                Value::Array(items) => Some(Value::Number(items.len() as f64)),
                _ => None,
            },
            Expression::Properties => Some(Value::Object(
                ctx.feature
                    .properties
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            )),
            Expression::Id => Some(ctx.feature.id.map_or(Value::Null, Value::from_json)),
            Expression::GeometryType => {
                Some(Value::String(ctx.feature.geometry_type.name().to_string()))
            }
            Expression::Zoom => Some(Value::Number(ctx.zoom)),
            Expression::FeatureState(key) => {
                let key = key.evaluate(ctx)?;
                let key = key.as_str()?;
                Some(
                    ctx.feature
                        .state
                        .and_then(|state| state.get(key))
                        .map_or(Value::Null, Value::from_json),
                )
            }
            Expression::Interpolate {
                curve,
                input,
                stops,
            } => evaluate_interpolate(*curve, input, stops, ctx),
            Expression::Step {
                input,
                first,
                stops,
            } => {
                let input = input.evaluate(ctx)?.as_f64()?;
                let mut selected = first.as_ref();
                for (stop, output) in stops {
                    if input < *stop {
                        break;
                    }
                    selected = output;
                }
                selected.evaluate(ctx)
            }
            Expression::Match {
                input,
                branches,
                fallback,
            } => {
                let input = input.evaluate(ctx)?;
                for (labels, output) in branches {
                    if labels.contains(&input) {
                        return output.evaluate(ctx);
                    }
                }
                fallback.evaluate(ctx)
            }
            Expression::Case { branches, fallback } => {
                for (condition, output) in branches {
                    if condition.evaluate(ctx)?.as_bool()? {
                        return output.evaluate(ctx);
                    }
                }
                fallback.evaluate(ctx)
            }
            Expression::Coalesce(args) => Some(
                args.iter()
                    .filter_map(|arg| arg.evaluate(ctx))
                    .find(|v| !v.is_null())
                    .unwrap_or(Value::Null),
            ),
            Expression::Compare(op, lhs, rhs) => {
                let lhs = lhs.evaluate(ctx)?;
                let rhs = rhs.evaluate(ctx)?;
                compare(*op, &lhs, &rhs).map(Value::Bool)
            }
            Expression::All(args) => {
                for arg in args {
                    if !arg.evaluate(ctx)?.as_bool()? {
                        return Some(Value::Bool(false));
                    }
                }
                Some(Value::Bool(true))
            }
            Expression::Any(args) => {
                for arg in args {
                    if arg.evaluate(ctx)?.as_bool()? {
                        return Some(Value::Bool(true));
                    }
                }
                Some(Value::Bool(false))
            }
            Expression::Not(inner) => Some(Value::Bool(!inner.evaluate(ctx)?.as_bool()?)),
            Expression::Math(op, args) => {
                let mut numbers = Vec::with_capacity(args.len());
                for arg in args {
                    numbers.push(arg.evaluate(ctx)?.as_f64()?);
                }
                math(*op, &numbers).map(Value::Number)
            }
            Expression::Concat(args) => {
                let mut out = String::new();
                for arg in args {
                    out.push_str(&arg.evaluate(ctx)?.to_string());
                }
                Some(Value::String(out))
            }
            Expression::Upcase(inner) => {
                Some(Value::String(inner.evaluate(ctx)?.as_str()?.to_uppercase()))
            }
            Expression::Downcase(inner) => {
                Some(Value::String(inner.evaluate(ctx)?.as_str()?.to_lowercase()))
            }
            Expression::Assert(kind, args) => args
                .iter()
                .filter_map(|arg| arg.evaluate(ctx))
                .find(|v| kind.accepts(v)),
            Expression::ToNumber(args) => args.iter().find_map(|arg| match arg.evaluate(ctx)? {
                Value::Number(n) => Some(Value::Number(n)),
                Value::Null => Some(Value::Number(0.0)),
                Value::Bool(b) => Some(Value::Number(if b { 1.0 } else { 0.0 })),
                Value::String(s) => s.trim().parse::<f64>().ok().map(Value::Number),
                _ => None,
            }),
            Expression::ToString(inner) => Some(Value::String(inner.evaluate(ctx)?.to_string())),
            Expression::ToBoolean(inner) => Some(Value::Bool(inner.evaluate(ctx)?.is_truthy())),
            Expression::ToColor(args) => args
                .iter()
                .find_map(|arg| arg.evaluate(ctx)?.to_color())
                .map(Value::Color),
            Expression::TypeOf(inner) => {
                Some(Value::String(inner.evaluate(ctx)?.type_name().to_string()))
            }
            Expression::Rgba(args) => {
                let mut channels = Vec::with_capacity(args.len());
                for arg in args {
                    channels.push(arg.evaluate(ctx)?);
                }
                Value::Array(channels).to_color().map(Value::Color)
            }
            Expression::ToRgba(inner) => {
                let c = inner.evaluate(ctx)?.to_color()?;
                let [r, g, b, _] = c.to_rgba8();
                Some(Value::Array(vec![
                    Value::Number(r as f64),
                    Value::Number(g as f64),
                    Value::Number(b as f64),
                    Value::Number(c.a as f64),
                ]))
            }
            Expression::Image(inner) => match inner.evaluate(ctx)? {
                Value::String(name) => Some(Value::String(name)),
                _ => None,
            },
            Expression::Format(sections) => {
                let mut out = String::new();
                for section in sections {
                    out.push_str(&section.evaluate(ctx)?.to_string());
                }
                Some(Value::String(out))
            }
        }
    }
}

fn evaluate_interpolate(
    curve: Curve,
    input: &Expression,
    stops: &Stops,
    ctx: &EvalContext<'_>,
) -> Option<Value> {
    let input = input.evaluate(ctx)?.as_f64()?;
    let (first, last) = (stops.first()?, stops.last()?);
    if input <= first.0 {
        return first.1.evaluate(ctx);
    }
    if input >= last.0 {
        return last.1.evaluate(ctx);
    }
    let upper = stops.iter().position(|(stop, _)| *stop > input)?;
    let (lower_in, lower_out) = &stops[upper - 1];
    let (upper_in, upper_out) = &stops[upper];
    let t = curve.factor(input, *lower_in, *upper_in);
    let a = lower_out.evaluate(ctx)?;
    let b = upper_out.evaluate(ctx)?;
    interpolate_values(&a, &b, t)
}

/// Blend two stop outputs. Colors blend per RGBA channel.
pub fn interpolate_values(a: &Value, b: &Value, t: f64) -> Option<Value> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => Some(Value::Number(x + (y - x) * t)),
        (Value::Array(xs), Value::Array(ys)) if xs.len() == ys.len() => xs
            .iter()
            .zip(ys)
            .map(|(x, y)| interpolate_values(x, y, t))
            .collect::<Option<Vec<_>>>()
            .map(Value::Array),
        _ => {
            let (ca, cb) = (a.to_color()?, b.to_color()?);
            Some(Value::Color(ca.lerp(cb, t)))
        }
    }
}

fn compare(op: CompareOp, lhs: &Value, rhs: &Value) -> Option<bool> {
    let test: fn(Ordering) -> bool = match op {
        CompareOp::Eq => return Some(lhs == rhs),
        CompareOp::Ne => return Some(lhs != rhs),
        CompareOp::Lt => Ordering::is_lt,
        CompareOp::Le => Ordering::is_le,
        CompareOp::Gt => Ordering::is_gt,
        CompareOp::Ge => Ordering::is_ge,
    };
    // Mismatched types are a runtime error; NaN compares false.
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => Some(a.partial_cmp(b).is_some_and(test)),
        (Value::String(a), Value::String(b)) => Some(test(a.cmp(b))),
        _ => None,
    }
}

fn math(op: MathOp, args: &[f64]) -> Option<f64> {
    let unary = |f: fn(f64) -> f64| args.first().map(|x| f(*x));
    match op {
        MathOp::Add => Some(args.iter().sum()),
        MathOp::Mul => Some(args.iter().product()),
        MathOp::Sub => match args {
            [x] => Some(-x),
            [x, y] => Some(x - y),
            _ => None,
        },
        MathOp::Div => match args {
            [x, y] => Some(x / y),
            _ => None,
        },
        MathOp::Rem => match args {
            [x, y] => Some(x % y),
            _ => None,
        },
        MathOp::Pow => match args {
            [x, y] => Some(x.powf(*y)),
            _ => None,
        },
        MathOp::Min => args.iter().copied().reduce(f64::min),
        MathOp::Max => args.iter().copied().reduce(f64::max),
        MathOp::Abs => unary(f64::abs),
        MathOp::Ceil => unary(f64::ceil),
        MathOp::Floor => unary(f64::floor),
        MathOp::Round => unary(f64::round),
        MathOp::Sqrt => unary(f64::sqrt),
        MathOp::Ln => unary(f64::ln),
        MathOp::Log10 => unary(f64::log10),
        MathOp::Log2 => unary(f64::log2),
        MathOp::Sin => unary(f64::sin),
        MathOp::Cos => unary(f64::cos),
        MathOp::Tan => unary(f64::tan),
        MathOp::Asin => unary(f64::asin),
        MathOp::Acos => unary(f64::acos),
        MathOp::Atan => unary(f64::atan),
    }
}

/// Cubic bezier easing through (0,0), (x1,y1), (x2,y2), (1,1).
struct UnitBezier {
    ax: f64,
    bx: f64,
    cx: f64,
    ay: f64,
    by: f64,
    cy: f64,
}

impl UnitBezier {
    fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        let cx = 3.0 * x1;
        let bx = 3.0 * (x2 - x1) - cx;
        let cy = 3.0 * y1;
        let by = 3.0 * (y2 - y1) - cy;
        Self {
            ax: 1.0 - cx - bx,
            bx,
            cx,
            ay: 1.0 - cy - by,
            by,
            cy,
        }
    }

    fn sample_x(&self, t: f64) -> f64 {
        ((self.ax * t + self.bx) * t + self.cx) * t
    }

    fn sample_y(&self, t: f64) -> f64 {
        ((self.ay * t + self.by) * t + self.cy) * t
    }

    fn sample_dx(&self, t: f64) -> f64 {
        (3.0 * self.ax * t + 2.0 * self.bx) * t + self.cx
    }

    fn solve_x(&self, x: f64, epsilon: f64) -> f64 {
        let mut t = x;
        for _ in 0..8 {
            let err = self.sample_x(t) - x;
            if err.abs() < epsilon {
                return t;
            }
            let d = self.sample_dx(t);
            if d.abs() < 1e-6 {
                break;
            }
            t -= err / d;
        }

        let (mut lo, mut hi) = (0.0, 1.0);
        t = x.clamp(0.0, 1.0);
        for _ in 0..64 {
            let sample = self.sample_x(t);
            if (sample - x).abs() < epsilon {
                break;
            }
            if x > sample {
                lo = t;
            } else {
                hi = t;
            }
            t = (lo + hi) * 0.5;
        }
        t
    }

    fn solve(&self, x: f64, epsilon: f64) -> f64 {
        self.sample_y(self.solve_x(x, epsilon))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(value: Json) -> Map<String, Json> {
        value.as_object().cloned().unwrap_or_default()
    }

    fn eval_with(expr: Json, properties: &Map<String, Json>, zoom: f64) -> Option<Value> {
        let compiled = compile(&expr).expect("compile");
        let ctx = EvalContext::new(
            zoom,
            FeatureContext {
                id: None,
                properties,
                geometry_type: GeometryType::Point,
                state: None,
            },
        );
        compiled.evaluate(&ctx)
    }

    fn eval(expr: Json) -> Option<Value> {
        eval_with(expr, &Map::new(), 0.0)
    }

    #[test]
    fn interpolates_linear_and_exponential() {
        let expr = json!(["interpolate", ["linear"], ["zoom"], 10, 1, 20, 11]);
        assert_eq!(eval_with(expr.clone(), &Map::new(), 15.0), Some(Value::Number(6.0)));
        assert_eq!(eval_with(expr.clone(), &Map::new(), 5.0), Some(Value::Number(1.0)));
        assert_eq!(eval_with(expr, &Map::new(), 25.0), Some(Value::Number(11.0)));

        let expr = json!(["interpolate", ["exponential", 2], ["zoom"], 0, 0, 2, 3]);
        // (2^1 - 1) / (2^2 - 1) = 1/3
        let Some(Value::Number(v)) = eval_with(expr, &Map::new(), 1.0) else {
            panic!("expected number");
        };
        assert!((v - 1.0).abs() < 1e-12);
    }

    #[test]
    fn interpolates_colors() {
        let expr = json!(["interpolate", ["linear"], ["zoom"], 0, "#000000", 10, "#ffffff"]);
        let Some(Value::Color(c)) = eval_with(expr, &Map::new(), 5.0) else {
            panic!("expected color");
        };
        assert!((c.r - 0.5).abs() < 1e-6);
        assert_eq!(c.a, 1.0);
    }

    #[test]
    fn cubic_bezier_endpoints() {
        let curve = Curve::CubicBezier([0.42, 0.0, 0.58, 1.0]);
        assert!(curve.factor(0.0, 0.0, 1.0).abs() < 1e-6);
        assert!((curve.factor(1.0, 0.0, 1.0) - 1.0).abs() < 1e-6);
        assert!((curve.factor(0.5, 0.0, 1.0) - 0.5).abs() < 1e-4);
    }

    #[test]
    fn step_and_match() {
        let expr = json!(["step", ["zoom"], "small", 10, "medium", 15, "large"]);
        assert_eq!(eval_with(expr.clone(), &Map::new(), 5.0), Some(Value::String("small".into())));
        assert_eq!(eval_with(expr.clone(), &Map::new(), 10.0), Some(Value::String("medium".into())));
        assert_eq!(eval_with(expr, &Map::new(), 20.0), Some(Value::String("large".into())));

        let p = props(json!({"type": "street"}));
        let expr = json!(["match", ["get", "type"], ["highway", "motorway"], 1, "street", 2, 0]);
        assert_eq!(eval_with(expr, &p, 0.0), Some(Value::Number(2.0)));
    }

    #[test]
    fn case_coalesce_and_lookup() {
        let p = props(json!({"population": 50000, "alt": "Alt"}));
        let expr = json!([
            "case",
            [">", ["get", "population"], 100000], "large",
            [">", ["get", "population"], 10000], "medium",
            "small"
        ]);
        assert_eq!(eval_with(expr, &p, 0.0), Some(Value::String("medium".into())));

        let expr = json!(["coalesce", ["get", "name"], ["get", "alt"], "Unknown"]);
        assert_eq!(eval_with(expr, &p, 0.0), Some(Value::String("Alt".into())));

        assert_eq!(eval_with(json!(["has", "alt"]), &p, 0.0), Some(Value::Bool(true)));
        assert_eq!(eval_with(json!(["get", "missing"]), &p, 0.0), Some(Value::Null));
    }

    #[test]
    fn math_and_strings() {
        assert_eq!(eval(json!(["+", 1, 2, 3])), Some(Value::Number(6.0)));
        assert_eq!(eval(json!(["-", 5])), Some(Value::Number(-5.0)));
        assert_eq!(eval(json!(["max", 1, 7, 3])), Some(Value::Number(7.0)));
        assert_eq!(eval(json!(["round", 2.5])), Some(Value::Number(3.0)));
        assert_eq!(
            eval(json!(["concat", "a", 1, true])),
            Some(Value::String("a1true".into()))
        );
        assert_eq!(eval(json!(["upcase", "abc"])), Some(Value::String("ABC".into())));
        assert_eq!(eval(json!(["length", "héllo"])), Some(Value::Number(5.0)));
    }

    #[test]
    fn comparisons_are_strictly_typed() {
        assert_eq!(eval(json!(["==", 1, "1"])), Some(Value::Bool(false)));
        assert_eq!(eval(json!(["<", "a", "b"])), Some(Value::Bool(true)));
        assert_eq!(eval(json!(["<", 1, "b"])), None);
        assert_eq!(eval(json!(["!", ["==", 1, 1]])), Some(Value::Bool(false)));
    }

    #[test]
    fn conversions() {
        assert_eq!(eval(json!(["to-number", "4.5"])), Some(Value::Number(4.5)));
        assert_eq!(eval(json!(["to-number", "x", 3])), Some(Value::Number(3.0)));
        assert_eq!(eval(json!(["to-boolean", ""])), Some(Value::Bool(false)));
        assert_eq!(eval(json!(["typeof", ["literal", [1]]])), Some(Value::String("array".into())));
        assert_eq!(
            eval(json!(["to-rgba", ["rgb", 255, 0, 0]])),
            Some(Value::Array(vec![
                Value::Number(255.0),
                Value::Number(0.0),
                Value::Number(0.0),
                Value::Number(1.0)
            ]))
        );
        assert_eq!(eval(json!(["number", "x", 2])), Some(Value::Number(2.0)));
        assert_eq!(eval(json!(["number", "x"])), None);
    }

    #[test]
    fn let_bindings_substitute() {
        let expr = json!(["let", "w", 3, ["*", ["var", "w"], 2]]);
        assert_eq!(eval(expr), Some(Value::Number(6.0)));
    }

    #[test]
    fn feature_state_reads_state() {
        let state = props(json!({"hover": true}));
        let properties = Map::new();
        let compiled = compile(&json!(["feature-state", "hover"])).expect("compile");
        let ctx = EvalContext::new(
            0.0,
            FeatureContext {
                id: None,
                properties: &properties,
                geometry_type: GeometryType::Polygon,
                state: Some(&state),
            },
        );
        assert_eq!(compiled.evaluate(&ctx), Some(Value::Bool(true)));
        let geometry = compile(&json!(["geometry-type"])).expect("compile");
        assert_eq!(geometry.evaluate(&ctx), Some(Value::String("Polygon".into())));
    }
}
