//! Property type and default table (style spec v8) for the properties the
//! engine evaluates.

use serde_json::{Value, json};

use crate::document::PropertyBag;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyType {
    Color,
    Number,
    String,
    Boolean,
    Enum,
    NumberArray,
    StringArray,
    ResolvedImage,
    Formatted,
    /// Not in the table; values pass through uncoerced.
    Any,
}

impl PropertyType {
    /// Legacy functions over these types default to exponential interpolation.
    pub fn is_interpolatable(self) -> bool {
        matches!(
            self,
            PropertyType::Color | PropertyType::Number | PropertyType::NumberArray
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertySpec {
    pub kind: PropertyType,
    /// `Value::Null` when the style reference defines no default.
    pub default: Value,
}

impl PropertySpec {
    fn new(kind: PropertyType, default: Value) -> Self {
        Self { kind, default }
    }
}

pub fn property_spec(bag: PropertyBag, name: &str) -> PropertySpec {
    use PropertyType::*;

    let (kind, default) = match (bag, name) {
        (PropertyBag::Layout, "visibility") => (Enum, json!("visible")),

        // fill
        (PropertyBag::Paint, "fill-antialias") => (Boolean, json!(true)),
        (PropertyBag::Paint, "fill-opacity") => (Number, json!(1)),
        (PropertyBag::Paint, "fill-color") => (Color, json!("#000000")),
        (PropertyBag::Paint, "fill-outline-color") => (Color, Value::Null),
        (PropertyBag::Paint, "fill-translate") => (NumberArray, json!([0, 0])),
        (PropertyBag::Paint, "fill-translate-anchor") => (Enum, json!("map")),
        (PropertyBag::Paint, "fill-pattern") => (ResolvedImage, Value::Null),
        (PropertyBag::Paint, "fill-extrusion-opacity") => (Number, json!(1)),
        (PropertyBag::Paint, "fill-extrusion-color") => (Color, json!("#000000")),
        (PropertyBag::Paint, "fill-extrusion-pattern") => (ResolvedImage, Value::Null),
        (PropertyBag::Layout, "fill-sort-key") => (Number, Value::Null),

        // line
        (PropertyBag::Layout, "line-cap") => (Enum, json!("butt")),
        (PropertyBag::Layout, "line-join") => (Enum, json!("miter")),
        (PropertyBag::Layout, "line-miter-limit") => (Number, json!(2)),
        (PropertyBag::Layout, "line-round-limit") => (Number, json!(1.05)),
        (PropertyBag::Paint, "line-opacity") => (Number, json!(1)),
        (PropertyBag::Paint, "line-color") => (Color, json!("#000000")),
        (PropertyBag::Paint, "line-translate") => (NumberArray, json!([0, 0])),
        (PropertyBag::Paint, "line-width") => (Number, json!(1)),
        (PropertyBag::Paint, "line-gap-width") => (Number, json!(0)),
        (PropertyBag::Paint, "line-offset") => (Number, json!(0)),
        (PropertyBag::Paint, "line-blur") => (Number, json!(0)),
        (PropertyBag::Paint, "line-dasharray") => (NumberArray, Value::Null),
        (PropertyBag::Paint, "line-pattern") => (ResolvedImage, Value::Null),

        // circle
        (PropertyBag::Paint, "circle-radius") => (Number, json!(5)),
        (PropertyBag::Paint, "circle-color") => (Color, json!("#000000")),
        (PropertyBag::Paint, "circle-blur") => (Number, json!(0)),
        (PropertyBag::Paint, "circle-opacity") => (Number, json!(1)),
        (PropertyBag::Paint, "circle-translate") => (NumberArray, json!([0, 0])),
        (PropertyBag::Paint, "circle-translate-anchor") => (Enum, json!("map")),
        (PropertyBag::Paint, "circle-pitch-scale") => (Enum, json!("map")),
        (PropertyBag::Paint, "circle-stroke-width") => (Number, json!(0)),
        (PropertyBag::Paint, "circle-stroke-color") => (Color, json!("#000000")),
        (PropertyBag::Paint, "circle-stroke-opacity") => (Number, json!(1)),

        // symbol layout
        (PropertyBag::Layout, "symbol-placement") => (Enum, json!("point")),
        (PropertyBag::Layout, "symbol-spacing") => (Number, json!(250)),
        (PropertyBag::Layout, "symbol-sort-key") => (Number, Value::Null),
        (PropertyBag::Layout, "icon-image") => (ResolvedImage, Value::Null),
        (PropertyBag::Layout, "icon-size") => (Number, json!(1)),
        (PropertyBag::Layout, "icon-rotate") => (Number, json!(0)),
        (PropertyBag::Layout, "icon-padding") => (Number, json!(2)),
        (PropertyBag::Layout, "icon-offset") => (NumberArray, json!([0, 0])),
        (PropertyBag::Layout, "icon-anchor") => (Enum, json!("center")),
        (PropertyBag::Layout, "icon-rotation-alignment") => (Enum, json!("auto")),
        (PropertyBag::Layout, "icon-pitch-alignment") => (Enum, json!("auto")),
        (PropertyBag::Layout, "icon-allow-overlap") => (Boolean, json!(false)),
        (PropertyBag::Layout, "icon-ignore-placement") => (Boolean, json!(false)),
        (PropertyBag::Layout, "icon-optional") => (Boolean, json!(false)),
        (PropertyBag::Layout, "icon-keep-upright") => (Boolean, json!(false)),
        (PropertyBag::Layout, "icon-text-fit") => (Enum, json!("none")),
        (PropertyBag::Layout, "text-field") => (Formatted, json!("")),
        (PropertyBag::Layout, "text-font") => (
            StringArray,
            json!(["Open Sans Regular", "Arial Unicode MS Regular"]),
        ),
        (PropertyBag::Layout, "text-size") => (Number, json!(16)),
        (PropertyBag::Layout, "text-max-width") => (Number, json!(10)),
        (PropertyBag::Layout, "text-line-height") => (Number, json!(1.2)),
        (PropertyBag::Layout, "text-letter-spacing") => (Number, json!(0)),
        (PropertyBag::Layout, "text-justify") => (Enum, json!("center")),
        (PropertyBag::Layout, "text-anchor") => (Enum, json!("center")),
        (PropertyBag::Layout, "text-max-angle") => (Number, json!(45)),
        (PropertyBag::Layout, "text-rotate") => (Number, json!(0)),
        (PropertyBag::Layout, "text-padding") => (Number, json!(2)),
        (PropertyBag::Layout, "text-keep-upright") => (Boolean, json!(true)),
        (PropertyBag::Layout, "text-transform") => (Enum, json!("none")),
        (PropertyBag::Layout, "text-offset") => (NumberArray, json!([0, 0])),
        (PropertyBag::Layout, "text-radial-offset") => (Number, json!(0)),
        (PropertyBag::Layout, "text-rotation-alignment") => (Enum, json!("auto")),
        (PropertyBag::Layout, "text-pitch-alignment") => (Enum, json!("auto")),
        (PropertyBag::Layout, "text-allow-overlap") => (Boolean, json!(false)),
        (PropertyBag::Layout, "text-ignore-placement") => (Boolean, json!(false)),
        (PropertyBag::Layout, "text-optional") => (Boolean, json!(false)),

        // symbol paint
        (PropertyBag::Paint, "icon-opacity") => (Number, json!(1)),
        (PropertyBag::Paint, "icon-color") => (Color, json!("#000000")),
        (PropertyBag::Paint, "icon-halo-color") => (Color, json!("rgba(0, 0, 0, 0)")),
        (PropertyBag::Paint, "icon-halo-width") => (Number, json!(0)),
        (PropertyBag::Paint, "icon-halo-blur") => (Number, json!(0)),
        (PropertyBag::Paint, "icon-translate") => (NumberArray, json!([0, 0])),
        (PropertyBag::Paint, "icon-translate-anchor") => (Enum, json!("map")),
        (PropertyBag::Paint, "text-opacity") => (Number, json!(1)),
        (PropertyBag::Paint, "text-color") => (Color, json!("#000000")),
        (PropertyBag::Paint, "text-halo-color") => (Color, json!("rgba(0, 0, 0, 0)")),
        (PropertyBag::Paint, "text-halo-width") => (Number, json!(0)),
        (PropertyBag::Paint, "text-halo-blur") => (Number, json!(0)),
        (PropertyBag::Paint, "text-translate") => (NumberArray, json!([0, 0])),
        (PropertyBag::Paint, "text-translate-anchor") => (Enum, json!("map")),

        _ => (Any, Value::Null),
    };
    PropertySpec::new(kind, default)
}
