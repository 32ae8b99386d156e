use serde_json::Value as Json;

use super::{CompareOp, Curve, Expression, MathOp, Stops, TypeAssertion, Value};

const OPERATORS: &[&str] = &[
    "literal", "get", "has", "at", "in", "length", "properties", "id", "geometry-type", "zoom",
    "feature-state", "interpolate", "interpolate-hcl", "interpolate-lab", "step", "match", "case",
    "coalesce", "let", "var", "==", "!=", "<", "<=", ">", ">=", "all", "any", "!", "+", "-", "*",
    "/", "%", "^", "abs", "ceil", "floor", "round", "min", "max", "sqrt", "ln", "log10", "log2",
    "sin", "cos", "tan", "asin", "acos", "atan", "pi", "e", "ln2", "concat", "upcase",
    "downcase", "to-number", "to-string", "to-boolean", "to-color", "typeof", "number", "string",
    "boolean", "array", "object", "rgb", "rgba", "to-rgba", "image", "format",
];

/// An array whose head names a known operator. Anything else (constants,
/// plain arrays such as font stacks) is a literal property value.
pub fn is_expression(json: &Json) -> bool {
    json.as_array()
        .and_then(|items| items.first())
        .and_then(Json::as_str)
        .is_some_and(|op| OPERATORS.contains(&op))
}

/// Compile a JSON expression, collecting every error found in it.
pub fn compile(json: &Json) -> Result<Expression, Vec<String>> {
    let mut compiler = Compiler::default();
    let expr = compiler.expression(json);
    if compiler.errors.is_empty() {
        Ok(expr)
    } else {
        Err(compiler.errors)
    }
}

#[derive(Default)]
struct Compiler {
    errors: Vec<String>,
    bindings: Vec<(String, Expression)>,
}

impl Compiler {
    fn error(&mut self, message: String) -> Expression {
        self.errors.push(message);
        Expression::Literal(Value::Null)
    }

    fn expression(&mut self, json: &Json) -> Expression {
        match json {
            Json::Array(items) => self.call(items),
            Json::Object(_) => {
                self.error("bare objects are not expressions, use [\"literal\", {...}]".into())
            }
            scalar => Expression::Literal(Value::from_json(scalar)),
        }
    }

    fn boxed(&mut self, json: &Json) -> Box<Expression> {
        Box::new(self.expression(json))
    }

    fn list(&mut self, args: &[Json]) -> Vec<Expression> {
        args.iter().map(|arg| self.expression(arg)).collect()
    }

    /// Checks `min <= args.len() <= max`, recording an error otherwise.
    fn arity(&mut self, op: &str, args: &[Json], min: usize, max: Option<usize>) -> bool {
        let n = args.len();
        if n < min || max.is_some_and(|max| n > max) {
            let expected = match max {
                Some(max) if max == min => format!("{min}"),
                Some(max) => format!("{min} to {max}"),
                None => format!("at least {min}"),
            };
            self.errors
                .push(format!("\"{op}\" expects {expected} argument(s), found {n}"));
            return false;
        }
        true
    }

    fn call(&mut self, items: &[Json]) -> Expression {
        let Some(op) = items.first().and_then(Json::as_str) else {
            return self.error(
                "expected an operator name as the first array element, wrap array values in \
                 [\"literal\", [...]]"
                    .into(),
            );
        };
        let args = &items[1..];

        match op {
            "literal" => {
                if !self.arity(op, args, 1, Some(1)) {
                    return Expression::Literal(Value::Null);
                }
                Expression::Literal(Value::from_json(&args[0]))
            }
            "get" | "has" => {
                if !self.arity(op, args, 1, Some(2)) {
                    return Expression::Literal(Value::Null);
                }
                let key = self.boxed(&args[0]);
                let object = args.get(1).map(|o| self.boxed(o));
                if op == "get" {
                    Expression::Get { key, object }
                } else {
                    Expression::Has { key, object }
                }
            }
            "at" => {
                if !self.arity(op, args, 2, Some(2)) {
                    return Expression::Literal(Value::Null);
                }
                Expression::At {
                    index: self.boxed(&args[0]),
                    array: self.boxed(&args[1]),
                }
            }
            "in" => {
                if !self.arity(op, args, 2, Some(2)) {
                    return Expression::Literal(Value::Null);
                }
                Expression::In {
                    needle: self.boxed(&args[0]),
                    haystack: self.boxed(&args[1]),
                }
            }
            "properties" | "id" | "geometry-type" | "zoom" | "pi" | "e" | "ln2" => {
                self.arity(op, args, 0, Some(0));
                match op {
                    "properties" => Expression::Properties,
                    "id" => Expression::Id,
                    "geometry-type" => Expression::GeometryType,
                    "zoom" => Expression::Zoom,
                    "pi" => Expression::Literal(Value::Number(std::f64::consts::PI)),
                    "e" => Expression::Literal(Value::Number(std::f64::consts::E)),
                    _ => Expression::Literal(Value::Number(std::f64::consts::LN_2)),
                }
            }
            "interpolate" | "interpolate-hcl" | "interpolate-lab" => self.interpolate(op, args),
            "step" => self.step(args),
            "match" => self.match_expression(args),
            "case" => {
                if args.len() < 3 || args.len() % 2 == 0 {
                    return self.error(format!(
                        "\"case\" expects condition/output pairs and a fallback, found {} argument(s)",
                        args.len()
                    ));
                }
                let (pairs, fallback) = args.split_at(args.len() - 1);
                let branches = pairs
                    .chunks(2)
                    .map(|pair| (self.expression(&pair[0]), self.expression(&pair[1])))
                    .collect();
                Expression::Case {
                    branches,
                    fallback: self.boxed(&fallback[0]),
                }
            }
            "coalesce" => {
                self.arity(op, args, 1, None);
                Expression::Coalesce(self.list(args))
            }
            "let" => self.let_expression(args),
            "var" => {
                let name = match args {
                    [Json::String(name)] => name,
                    _ => return self.error("\"var\" expects a single variable name".into()),
                };
                match self.bindings.iter().rev().find(|(bound, _)| bound == name) {
                    Some((_, expr)) => expr.clone(),
                    None => self.error(format!("unknown variable \"{name}\"")),
                }
            }
            "==" | "!=" | "<" | "<=" | ">" | ">=" => {
                if !self.arity(op, args, 2, Some(2)) {
                    return Expression::Literal(Value::Null);
                }
                let cmp = match op {
                    "==" => CompareOp::Eq,
                    "!=" => CompareOp::Ne,
                    "<" => CompareOp::Lt,
                    "<=" => CompareOp::Le,
                    ">" => CompareOp::Gt,
                    _ => CompareOp::Ge,
                };
                Expression::Compare(cmp, self.boxed(&args[0]), self.boxed(&args[1]))
            }
            "all" => Expression::All(self.list(args)),
            "any" => Expression::Any(self.list(args)),
            "!" => {
                if !self.arity(op, args, 1, Some(1)) {
                    return Expression::Literal(Value::Null);
                }
                Expression::Not(self.boxed(&args[0]))
            }
            "+" | "*" | "min" | "max" => {
                self.arity(op, args, 1, None);
                let math = match op {
                    "+" => MathOp::Add,
                    "*" => MathOp::Mul,
                    "min" => MathOp::Min,
                    _ => MathOp::Max,
                };
                Expression::Math(math, self.list(args))
            }
            "-" => {
                self.arity(op, args, 1, Some(2));
                Expression::Math(MathOp::Sub, self.list(args))
            }
            "/" | "%" | "^" => {
                self.arity(op, args, 2, Some(2));
                let math = match op {
                    "/" => MathOp::Div,
                    "%" => MathOp::Rem,
                    _ => MathOp::Pow,
                };
                Expression::Math(math, self.list(args))
            }
            "abs" | "ceil" | "floor" | "round" | "sqrt" | "ln" | "log10" | "log2" | "sin"
            | "cos" | "tan" | "asin" | "acos" | "atan" => {
                self.arity(op, args, 1, Some(1));
                let math = match op {
                    "abs" => MathOp::Abs,
                    "ceil" => MathOp::Ceil,
                    "floor" => MathOp::Floor,
                    "round" => MathOp::Round,
                    "sqrt" => MathOp::Sqrt,
                    "ln" => MathOp::Ln,
                    "log10" => MathOp::Log10,
                    "log2" => MathOp::Log2,
                    "sin" => MathOp::Sin,
                    "cos" => MathOp::Cos,
                    "tan" => MathOp::Tan,
                    "asin" => MathOp::Asin,
                    "acos" => MathOp::Acos,
                    _ => MathOp::Atan,
                };
                Expression::Math(math, self.list(args))
            }
            "concat" => {
                self.arity(op, args, 1, None);
                Expression::Concat(self.list(args))
            }
            "upcase" | "downcase" | "to-string" | "to-boolean" | "typeof" | "to-rgba"
            | "image" | "length" | "feature-state" => {
                if !self.arity(op, args, 1, Some(1)) {
                    return Expression::Literal(Value::Null);
                }
                let inner = self.boxed(&args[0]);
                match op {
                    "upcase" => Expression::Upcase(inner),
                    "downcase" => Expression::Downcase(inner),
                    "to-string" => Expression::ToString(inner),
                    "to-boolean" => Expression::ToBoolean(inner),
                    "typeof" => Expression::TypeOf(inner),
                    "to-rgba" => Expression::ToRgba(inner),
                    "image" => Expression::Image(inner),
                    "length" => Expression::Length(inner),
                    _ => Expression::FeatureState(inner),
                }
            }
            "number" | "string" | "boolean" | "object" => {
                self.arity(op, args, 1, None);
                let kind = match op {
                    "number" => TypeAssertion::Number,
                    "string" => TypeAssertion::String,
                    "boolean" => TypeAssertion::Boolean,
                    _ => TypeAssertion::Object,
                };
                Expression::Assert(kind, self.list(args))
            }
            "array" => {
                // ["array", value] or ["array", itemType, (length,) value]
                if !self.arity(op, args, 1, Some(3)) {
                    return Expression::Literal(Value::Null);
                }
                let value = self.expression(&args[args.len() - 1]);
                Expression::Assert(TypeAssertion::Array, vec![value])
            }
            "to-number" => {
                self.arity(op, args, 1, None);
                Expression::ToNumber(self.list(args))
            }
            "to-color" => {
                self.arity(op, args, 1, None);
                Expression::ToColor(self.list(args))
            }
            "rgb" => {
                self.arity(op, args, 3, Some(3));
                Expression::Rgba(self.list(args))
            }
            "rgba" => {
                self.arity(op, args, 4, Some(4));
                Expression::Rgba(self.list(args))
            }
            "format" => {
                // Section option objects (font-scale, text-font, text-color) are ignored.
                let sections = args
                    .iter()
                    .filter(|arg| !arg.is_object())
                    .map(|arg| self.expression(arg))
                    .collect();
                Expression::Format(sections)
            }
            unknown => self.error(format!("unknown expression operator \"{unknown}\"")),
        }
    }

    fn curve(&mut self, json: &Json) -> Curve {
        let parts = json.as_array().map(Vec::as_slice).unwrap_or_default();
        match parts {
            [Json::String(kind)] if kind == "linear" => Curve::Linear,
            [Json::String(kind), base] if kind == "exponential" => match base.as_f64() {
                Some(base) => Curve::Exponential(base),
                None => {
                    self.errors
                        .push("exponential interpolation base must be a number".into());
                    Curve::Linear
                }
            },
            [Json::String(kind), x1, y1, x2, y2] if kind == "cubic-bezier" => {
                match (x1.as_f64(), y1.as_f64(), x2.as_f64(), y2.as_f64()) {
                    (Some(x1), Some(y1), Some(x2), Some(y2)) => {
                        Curve::CubicBezier([x1, y1, x2, y2])
                    }
                    _ => {
                        self.errors
                            .push("cubic-bezier control points must be numbers".into());
                        Curve::Linear
                    }
                }
            }
            _ => {
                self.errors.push(format!("unknown interpolation type {json}"));
                Curve::Linear
            }
        }
    }

    fn stops(&mut self, op: &str, pairs: &[Json]) -> Stops {
        if pairs.len() % 2 != 0 {
            self.errors
                .push(format!("\"{op}\" expects input/output stop pairs"));
        }
        let mut stops: Stops = Vec::with_capacity(pairs.len() / 2);
        for pair in pairs.chunks_exact(2) {
            let Some(input) = pair[0].as_f64() else {
                self.errors
                    .push(format!("\"{op}\" stop inputs must be literal numbers"));
                continue;
            };
            if let Some((previous, _)) = stops.last()
                && input <= *previous
            {
                self.errors.push(format!(
                    "\"{op}\" stop inputs must be strictly ascending, found {input} after {previous}"
                ));
                continue;
            }
            let output = self.expression(&pair[1]);
            stops.push((input, output));
        }
        stops
    }

    fn interpolate(&mut self, op: &str, args: &[Json]) -> Expression {
        if args.len() < 4 {
            return self.error(format!(
                "\"{op}\" expects a curve, an input and at least one stop"
            ));
        }
        let curve = self.curve(&args[0]);
        let input = self.boxed(&args[1]);
        let stops = self.stops(op, &args[2..]);
        Expression::Interpolate {
            curve,
            input,
            stops,
        }
    }

    fn step(&mut self, args: &[Json]) -> Expression {
        if args.len() < 2 {
            return self.error("\"step\" expects an input and a default output".into());
        }
        let input = self.boxed(&args[0]);
        let first = self.boxed(&args[1]);
        let stops = self.stops("step", &args[2..]);
        Expression::Step {
            input,
            first,
            stops,
        }
    }

    fn match_expression(&mut self, args: &[Json]) -> Expression {
        if args.len() < 4 || args.len() % 2 != 0 {
            return self.error(format!(
                "\"match\" expects an input, label/output pairs and a fallback, found {} argument(s)",
                args.len()
            ));
        }
        let input = self.boxed(&args[0]);
        let (pairs, fallback) = args[1..].split_at(args.len() - 2);
        let mut seen: Vec<Value> = Vec::new();
        let mut branches = Vec::with_capacity(pairs.len() / 2);
        for pair in pairs.chunks_exact(2) {
            let labels: Vec<Value> = match &pair[0] {
                Json::Array(items) => items.iter().map(Value::from_json).collect(),
                scalar => vec![Value::from_json(scalar)],
            };
            for label in &labels {
                if !matches!(label, Value::String(_) | Value::Number(_) | Value::Bool(_)) {
                    self.errors
                        .push(format!("\"match\" labels must be literals, found {}", label.to_json()));
                } else if seen.contains(label) {
                    self.errors
                        .push(format!("\"match\" label {} is duplicated", label.to_json()));
                } else {
                    seen.push(label.clone());
                }
            }
            let output = self.expression(&pair[1]);
            branches.push((labels, output));
        }
        Expression::Match {
            input,
            branches,
            fallback: self.boxed(&fallback[0]),
        }
    }

    fn let_expression(&mut self, args: &[Json]) -> Expression {
        if args.len() < 3 || args.len() % 2 == 0 {
            return self.error("\"let\" expects name/value pairs and a body".into());
        }
        let (pairs, body) = args.split_at(args.len() - 1);
        let depth = self.bindings.len();
        for pair in pairs.chunks_exact(2) {
            let Some(name) = pair[0].as_str() else {
                self.errors.push("\"let\" binding names must be strings".into());
                continue;
            };
            let value = self.expression(&pair[1]);
            self.bindings.push((name.to_string(), value));
        }
        let body = self.expression(&body[0]);
        self.bindings.truncate(depth);
        body
    }
}
