pub mod color;
pub mod document;
pub mod error;
pub mod expression;
pub mod feature;
pub mod filter;
pub mod function;
pub mod primitives;
pub mod property;
pub mod resolver;
pub mod spec;
pub mod sprite;
pub mod template;
pub mod text;

pub use color::Color;
pub use document::{LayerType, PropertyBag, StyleDocument, StyleLayer};
pub use error::StyleError;
pub use feature::{GeometryType, StyleFeature};
pub use function::{StyleFunction, StyleFunctionOptions, default_resolutions, zoom_for_resolution};
pub use primitives::*;
pub use resolver::SourceSelector;
pub use sprite::{SpriteAtlas, SpriteEntry, SpriteError};
pub use text::{EstimatedMeasure, TextMeasure};
