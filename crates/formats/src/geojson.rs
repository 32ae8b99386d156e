use foundation::{Extent, Vec2};
use serde_json::{Map, Value};

/// Spherical web mercator radius, the projection the default resolution
/// pyramid is expressed in.
pub const MERCATOR_RADIUS: f64 = 6_378_137.0;

/// How incoming GeoJSON positions are interpreted.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum CoordinateSpace {
    /// Positions are already in map units.
    #[default]
    Map,
    /// Positions are WGS84 lon/lat degrees and get projected to web mercator.
    LonLat,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum GeometryKind {
    Point,
    Line,
    Polygon,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VectorGeometry {
    Point(Vec2),
    MultiPoint(Vec<Vec2>),
    LineString(Vec<Vec2>),
    MultiLineString(Vec<Vec<Vec2>>),
    Polygon(Vec<Vec<Vec2>>),
    MultiPolygon(Vec<Vec<Vec<Vec2>>>),
}

impl VectorGeometry {
    pub fn kind(&self) -> GeometryKind {
        match self {
            VectorGeometry::Point(_) | VectorGeometry::MultiPoint(_) => GeometryKind::Point,
            VectorGeometry::LineString(_) | VectorGeometry::MultiLineString(_) => {
                GeometryKind::Line
            }
            VectorGeometry::Polygon(_) | VectorGeometry::MultiPolygon(_) => GeometryKind::Polygon,
        }
    }

    pub fn extent(&self) -> Extent {
        let mut extent = Extent::empty();
        match self {
            VectorGeometry::Point(p) => extent.extend(*p),
            VectorGeometry::MultiPoint(ps) | VectorGeometry::LineString(ps) => {
                ps.iter().for_each(|p| extent.extend(*p));
            }
            VectorGeometry::MultiLineString(rings) | VectorGeometry::Polygon(rings) => {
                rings.iter().flatten().for_each(|p| extent.extend(*p));
            }
            VectorGeometry::MultiPolygon(polys) => {
                polys.iter().flatten().flatten().for_each(|p| extent.extend(*p));
            }
        }
        extent
    }

    /// Vertices of the first (or only) line string, if this is a line geometry.
    pub fn first_line(&self) -> Option<&[Vec2]> {
        match self {
            VectorGeometry::LineString(ps) => Some(ps.as_slice()),
            VectorGeometry::MultiLineString(lines) => lines.first().map(|l| l.as_slice()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorFeature {
    pub id: Option<Value>,
    pub properties: Map<String, Value>,
    pub geometry: VectorGeometry,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureCollection {
    pub features: Vec<VectorFeature>,
}

#[derive(Debug)]
pub enum FeatureCollectionError {
    Json(serde_json::Error),
    NotAFeatureCollection,
    InvalidFeature { index: usize, reason: String },
}

impl std::fmt::Display for FeatureCollectionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeatureCollectionError::Json(err) => write!(f, "JSON parse error: {err}"),
            FeatureCollectionError::NotAFeatureCollection => {
                write!(f, "expected GeoJSON FeatureCollection")
            }
            FeatureCollectionError::InvalidFeature { index, reason } => {
                write!(f, "invalid feature at index {index}: {reason}")
            }
        }
    }
}

impl std::error::Error for FeatureCollectionError {}

impl FeatureCollection {
    pub fn from_geojson_str(
        payload: &str,
        space: CoordinateSpace,
    ) -> Result<Self, FeatureCollectionError> {
        let value: Value = serde_json::from_str(payload).map_err(FeatureCollectionError::Json)?;
        Self::from_geojson_value(&value, space)
    }

    pub fn from_geojson_value(
        value: &Value,
        space: CoordinateSpace,
    ) -> Result<Self, FeatureCollectionError> {
        let obj = value
            .as_object()
            .ok_or(FeatureCollectionError::NotAFeatureCollection)?;
        let ty = obj
            .get("type")
            .and_then(|v| v.as_str())
            .ok_or(FeatureCollectionError::NotAFeatureCollection)?;
        if ty != "FeatureCollection" {
            return Err(FeatureCollectionError::NotAFeatureCollection);
        }

        let features_val = obj
            .get("features")
            .and_then(|v| v.as_array())
            .ok_or(FeatureCollectionError::NotAFeatureCollection)?;

        let mut features = Vec::with_capacity(features_val.len());
        for (index, feat_val) in features_val.iter().enumerate() {
            let feature = parse_feature(feat_val, space)
                .map_err(|reason| FeatureCollectionError::InvalidFeature { index, reason })?;
            features.push(feature);
        }

        Ok(Self { features })
    }
}

fn parse_feature(value: &Value, space: CoordinateSpace) -> Result<VectorFeature, String> {
    let feat_obj = value
        .as_object()
        .ok_or("feature must be an object".to_string())?;

    let feat_type = feat_obj
        .get("type")
        .and_then(|v| v.as_str())
        .ok_or("feature missing type".to_string())?;
    if feat_type != "Feature" {
        return Err(format!("unexpected feature type: {feat_type}"));
    }

    let id = match feat_obj.get("id") {
        Some(v @ (Value::String(_) | Value::Number(_))) => Some(v.clone()),
        _ => None,
    };

    let properties = feat_obj
        .get("properties")
        .and_then(|v| v.as_object())
        .cloned()
        .unwrap_or_default();

    let geometry_val = feat_obj
        .get("geometry")
        .ok_or("feature missing geometry".to_string())?;
    let geometry = parse_geometry(geometry_val, space)?;

    Ok(VectorFeature {
        id,
        properties,
        geometry,
    })
}

/// Project WGS84 degrees to spherical web mercator meters.
pub fn lon_lat_to_mercator(lon_deg: f64, lat_deg: f64) -> Vec2 {
    // Clamp to the mercator validity range to keep `ln(tan)` finite.
    let lat = lat_deg.clamp(-85.051_128_78, 85.051_128_78).to_radians();
    let x = MERCATOR_RADIUS * lon_deg.to_radians();
    let y = MERCATOR_RADIUS * (std::f64::consts::FRAC_PI_4 + lat * 0.5).tan().ln();
    Vec2::new(x, y)
}

fn parse_geometry(value: &Value, space: CoordinateSpace) -> Result<VectorGeometry, String> {
    let obj = value
        .as_object()
        .ok_or("geometry must be an object".to_string())?;
    let ty = obj
        .get("type")
        .and_then(|v| v.as_str())
        .ok_or("geometry missing type".to_string())?;

    let coords = obj
        .get("coordinates")
        .ok_or("geometry missing coordinates".to_string())?;

    match ty {
        "Point" => Ok(VectorGeometry::Point(parse_point(coords, space)?)),
        "MultiPoint" => Ok(VectorGeometry::MultiPoint(parse_points(coords, space)?)),
        "LineString" => Ok(VectorGeometry::LineString(parse_points(coords, space)?)),
        "MultiLineString" => Ok(VectorGeometry::MultiLineString(parse_rings(coords, space)?)),
        "Polygon" => Ok(VectorGeometry::Polygon(parse_rings(coords, space)?)),
        "MultiPolygon" => {
            let polys = coords
                .as_array()
                .ok_or("MultiPolygon coordinates must be an array of polygons".to_string())?;
            let mut out = Vec::with_capacity(polys.len());
            for poly in polys {
                out.push(parse_rings(poly, space)?);
            }
            Ok(VectorGeometry::MultiPolygon(out))
        }
        other => Err(format!("unsupported geometry type: {other}")),
    }
}

fn parse_point(coords: &Value, space: CoordinateSpace) -> Result<Vec2, String> {
    let arr = coords
        .as_array()
        .ok_or("position must be an array".to_string())?;
    if arr.len() < 2 {
        return Err("position must have at least two numbers".to_string());
    }
    let x = arr[0].as_f64().ok_or("position x must be a number".to_string())?;
    let y = arr[1].as_f64().ok_or("position y must be a number".to_string())?;
    Ok(match space {
        CoordinateSpace::Map => Vec2::new(x, y),
        CoordinateSpace::LonLat => lon_lat_to_mercator(x, y),
    })
}

fn parse_points(coords: &Value, space: CoordinateSpace) -> Result<Vec<Vec2>, String> {
    let arr = coords
        .as_array()
        .ok_or("coordinates must be an array".to_string())?;
    let mut out = Vec::with_capacity(arr.len());
    for item in arr {
        out.push(parse_point(item, space)?);
    }
    Ok(out)
}

fn parse_rings(coords: &Value, space: CoordinateSpace) -> Result<Vec<Vec<Vec2>>, String> {
    let rings = coords
        .as_array()
        .ok_or("coordinates must be an array of rings".to_string())?;
    let mut out = Vec::with_capacity(rings.len());
    for ring in rings {
        out.push(parse_points(ring, space)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "id": 7, "properties": {"layer": "poi", "name": "Alpha"},
             "geometry": {"type": "Point", "coordinates": [10.0, 20.0]}},
            {"type": "Feature", "properties": {"layer": "road"},
             "geometry": {"type": "LineString", "coordinates": [[0, 0], [100, 50]]}},
            {"type": "Feature", "properties": {"layer": "water"},
             "geometry": {"type": "Polygon", "coordinates": [[[0, 0], [4, 0], [4, 4], [0, 0]]]}}
        ]
    }"#;

    #[test]
    fn parses_feature_collection() {
        let fc = FeatureCollection::from_geojson_str(SAMPLE, CoordinateSpace::Map)
            .expect("parse collection");
        assert_eq!(fc.features.len(), 3);
        assert_eq!(fc.features[0].id, Some(Value::from(7)));
        assert_eq!(fc.features[0].geometry.kind(), GeometryKind::Point);
        assert_eq!(fc.features[1].geometry.kind(), GeometryKind::Line);
        assert_eq!(fc.features[2].geometry.kind(), GeometryKind::Polygon);

        let extent = fc.features[1].geometry.extent();
        assert_eq!(extent.width(), 100.0);
        assert_eq!(extent.height(), 50.0);
        assert_eq!(fc.features[1].geometry.first_line().map(|l| l.len()), Some(2));
    }

    #[test]
    fn projects_lon_lat() {
        let origin = lon_lat_to_mercator(0.0, 0.0);
        assert!(origin.x.abs() < 1e-9 && origin.y.abs() < 1e-9);

        let east = lon_lat_to_mercator(180.0, 0.0);
        assert!((east.x - 20_037_508.342_789_244).abs() < 1e-6);
    }

    #[test]
    fn rejects_non_collections() {
        let err = FeatureCollection::from_geojson_str(r#"{"type": "Feature"}"#, CoordinateSpace::Map)
            .expect_err("expect error");
        assert!(matches!(err, FeatureCollectionError::NotAFeatureCollection));
    }

    #[test]
    fn reports_invalid_feature_index() {
        let payload = r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "properties": {}, "geometry": {"type": "Point", "coordinates": [1]}}
        ]}"#;
        let err = FeatureCollection::from_geojson_str(payload, CoordinateSpace::Map)
            .expect_err("expect error");
        match err {
            FeatureCollectionError::InvalidFeature { index, .. } => assert_eq!(index, 0),
            other => panic!("unexpected error: {other}"),
        }
    }
}
