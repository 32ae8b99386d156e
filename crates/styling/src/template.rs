//! `{property}` placeholders in label text.

use serde_json::{Map, Value as Json};

use crate::expression::Value;

/// Substituted values may themselves contain braces; stop after this many
/// passes.
const MAX_PASSES: usize = 32;

/// Replace the innermost trailing `{key}` with the feature property of that
/// name until no placeholder remains. Missing properties and falsy values
/// (`null`, `false`, `0`, `""`) render as an empty string.
pub fn substitute(template: &str, properties: &Map<String, Json>) -> String {
    let mut text = template.to_string();
    for _ in 0..MAX_PASSES {
        let Some(close) = text.rfind('}') else {
            break;
        };
        let Some(open) = text[..close].rfind('{') else {
            break;
        };
        let value = properties
            .get(&text[open + 1..close])
            .filter(|v| !is_falsy(v))
            .map(|v| Value::from_json(v).to_string())
            .unwrap_or_default();
        text = format!("{}{value}{}", &text[..open], &text[close + 1..]);
    }
    text
}

fn is_falsy(value: &Json) -> bool {
    match value {
        Json::Null | Json::Bool(false) => true,
        Json::Number(n) => n.as_f64() == Some(0.0),
        Json::String(s) => s.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(value: Json) -> Map<String, Json> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn substitutes_properties() {
        let p = props(json!({"name": "Main St", "ref": 12, "oneway": true}));
        assert_eq!(substitute("{name}", &p), "Main St");
        assert_eq!(substitute("{name} ({ref})", &p), "Main St (12)");
        assert_eq!(substitute("one way: {oneway}", &p), "one way: true");
        assert_eq!(substitute("plain", &p), "plain");
    }

    #[test]
    fn missing_properties_are_empty() {
        assert_eq!(substitute("{name}", &Map::new()), "");
        assert_eq!(substitute("a{x}b", &Map::new()), "ab");
    }

    #[test]
    fn falsy_values_are_empty() {
        let p = props(json!({"zero": 0, "off": false, "none": null, "level": 0.5}));
        assert_eq!(substitute("[{zero}|{off}|{none}]", &p), "[||]");
        assert_eq!(substitute("{level}", &p), "0.5");
    }

    #[test]
    fn substituted_values_are_expanded_again() {
        let p = props(json!({"label": "{name}", "name": "Park"}));
        assert_eq!(substitute("{label}", &p), "Park");
    }

    #[test]
    fn self_reference_terminates() {
        let p = props(json!({"loop": "{loop}"}));
        assert_eq!(substitute("{loop}", &p), "{loop}");
    }
}
