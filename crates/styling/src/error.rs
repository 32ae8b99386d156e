use std::fmt;

/// The only style document version the engine understands.
pub const SUPPORTED_VERSION: u64 = 8;

/// Configuration errors. All of them surface while constructing a style
/// function; per-feature evaluation never fails.
#[derive(Debug)]
pub enum StyleError {
    Parse(serde_json::Error),
    UnsupportedVersion { found: Option<u64> },
    InvalidLayer { index: usize, reason: String },
    MissingRef { layer: String, reference: String },
    UndefinedSource(String),
    UnsupportedSourceType { source: String, kind: String },
    MixedSources { layer: String, source: String },
    NoMatchingLayers(Vec<String>),
    /// Every expression or filter compile error found in the document.
    Expressions(Vec<String>),
}

impl fmt::Display for StyleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StyleError::Parse(err) => write!(f, "style parse error: {err}"),
            StyleError::UnsupportedVersion { found } => match found {
                Some(v) => write!(
                    f,
                    "style version {SUPPORTED_VERSION} required, found version {v}"
                ),
                None => write!(f, "style version {SUPPORTED_VERSION} required"),
            },
            StyleError::InvalidLayer { index, reason } => {
                write!(f, "invalid layer at index {index}: {reason}")
            }
            StyleError::MissingRef { layer, reference } => {
                write!(f, "layer \"{layer}\" references missing layer \"{reference}\"")
            }
            StyleError::UndefinedSource(source) => {
                write!(f, "source \"{source}\" is not defined")
            }
            StyleError::UnsupportedSourceType { source, kind } => write!(
                f,
                "source \"{source}\" is not of type \"vector\" or \"geojson\", but \"{kind}\""
            ),
            StyleError::MixedSources { layer, source } => {
                write!(f, "layer \"{layer}\" does not use source \"{source}\"")
            }
            StyleError::NoMatchingLayers(ids) => {
                write!(f, "no layer matches the ids [{}]", ids.join(", "))
            }
            StyleError::Expressions(errors) => {
                write!(f, "{} invalid expression(s): {}", errors.len(), errors.join("; "))
            }
        }
    }
}

impl std::error::Error for StyleError {}

impl From<serde_json::Error> for StyleError {
    fn from(err: serde_json::Error) -> Self {
        StyleError::Parse(err)
    }
}
