use foundation::{Extent, Vec2};
use formats::{GeometryKind, VectorFeature};
use serde_json::{Map, Value};

/// Geometry class of a feature as seen by styles: `1` point, `2` line,
/// `3` polygon.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum GeometryType {
    Point = 1,
    LineString = 2,
    Polygon = 3,
}

impl GeometryType {
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Name used by `$type` filters and the `geometry-type` expression.
    pub fn name(self) -> &'static str {
        match self {
            GeometryType::Point => "Point",
            GeometryType::LineString => "LineString",
            GeometryType::Polygon => "Polygon",
        }
    }
}

impl From<GeometryKind> for GeometryType {
    fn from(kind: GeometryKind) -> Self {
        match kind {
            GeometryKind::Point => GeometryType::Point,
            GeometryKind::Line => GeometryType::LineString,
            GeometryKind::Polygon => GeometryType::Polygon,
        }
    }
}

/// The minimal view of a rendered feature the style function needs.
pub trait StyleFeature {
    fn id(&self) -> Option<&Value>;
    fn properties(&self) -> &Map<String, Value>;
    fn geometry_type(&self) -> GeometryType;
    /// Bounding box in map units.
    fn extent(&self) -> Extent;
    /// Vertices of the first line part, for line geometries.
    fn first_line(&self) -> Option<&[Vec2]>;

    /// Source sub-layer the feature belongs to. Vector tile readers put it in
    /// the `layer` property.
    fn source_layer(&self) -> Option<&str> {
        self.properties().get("layer").and_then(Value::as_str)
    }
}

impl StyleFeature for VectorFeature {
    fn id(&self) -> Option<&Value> {
        self.id.as_ref()
    }

    fn properties(&self) -> &Map<String, Value> {
        &self.properties
    }

    fn geometry_type(&self) -> GeometryType {
        self.geometry.kind().into()
    }

    fn extent(&self) -> Extent {
        self.geometry.extent()
    }

    fn first_line(&self) -> Option<&[Vec2]> {
        self.geometry.first_line()
    }
}
