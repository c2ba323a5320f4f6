use foundation::Polygon;
use foundation::math::Vec2;
use serde_json::{Map, Value};

/// Geometry in projected meters (x = easting, y = northing).
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(Vec2),
    MultiPoint(Vec<Vec2>),
    LineString(Vec<Vec2>),
    MultiLineString(Vec<Vec<Vec2>>),
    Polygon(Vec<Vec<Vec2>>),
    MultiPolygon(Vec<Vec<Vec<Vec2>>>),
}

impl Geometry {
    pub fn type_name(&self) -> &'static str {
        match self {
            Geometry::Point(_) => "Point",
            Geometry::MultiPoint(_) => "MultiPoint",
            Geometry::LineString(_) => "LineString",
            Geometry::MultiLineString(_) => "MultiLineString",
            Geometry::Polygon(_) => "Polygon",
            Geometry::MultiPolygon(_) => "MultiPolygon",
        }
    }

    /// Single-part polygons; a multipolygon is exploded in part order.
    /// Non-areal geometries yield nothing.
    pub fn polygons(&self) -> Vec<Polygon> {
        match self {
            Geometry::Polygon(rings) => Polygon::from_rings(rings).into_iter().collect(),
            Geometry::MultiPolygon(polys) => polys
                .iter()
                .filter_map(|rings| Polygon::from_rings(rings))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Structural check applied before a geometry is written out.
    pub fn check_writable(&self) -> Result<(), String> {
        match self {
            Geometry::Point(p) => check_finite(std::slice::from_ref(p)),
            Geometry::MultiPoint(ps) => {
                if ps.is_empty() {
                    return Err("MultiPoint has no points".to_string());
                }
                check_finite(ps)
            }
            Geometry::LineString(ps) => check_line(ps),
            Geometry::MultiLineString(lines) => {
                if lines.is_empty() {
                    return Err("MultiLineString has no parts".to_string());
                }
                lines.iter().try_for_each(|l| check_line(l))
            }
            Geometry::Polygon(rings) => check_polygon(rings),
            Geometry::MultiPolygon(polys) => {
                if polys.is_empty() {
                    return Err("MultiPolygon has no parts".to_string());
                }
                polys.iter().try_for_each(|p| check_polygon(p))
            }
        }
    }
}

fn check_finite(points: &[Vec2]) -> Result<(), String> {
    match points.iter().position(|p| !p.is_finite()) {
        Some(i) => Err(format!("non-finite coordinate at vertex {i}")),
        None => Ok(()),
    }
}

fn check_line(points: &[Vec2]) -> Result<(), String> {
    if points.len() < 2 {
        return Err(format!("line has {} vertices, needs 2", points.len()));
    }
    check_finite(points)
}

fn check_polygon(rings: &[Vec<Vec2>]) -> Result<(), String> {
    if rings.is_empty() {
        return Err("polygon has no rings".to_string());
    }
    for ring in rings {
        if ring.len() < 4 {
            return Err(format!("ring has {} vertices, needs 4", ring.len()));
        }
        check_finite(ring)?;
        if ring[0] != ring[ring.len() - 1] {
            return Err("ring is not closed".to_string());
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Feature {
    pub id: Option<Value>,
    pub properties: Map<String, Value>,
    pub geometry: Option<Geometry>,
}

impl Feature {
    pub fn new(geometry: Geometry) -> Self {
        Self {
            id: None,
            properties: Map::new(),
            geometry: Some(geometry),
        }
    }

    pub fn with_property(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }
}

/// One named table of features.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub name: String,
    pub features: Vec<Feature>,
}

#[derive(Debug)]
pub enum LayerError {
    Parse(serde_json::Error),
    NotAFeatureCollection,
    InvalidFeature { index: usize, reason: String },
    Unwritable { index: usize, reason: String },
}

impl std::fmt::Display for LayerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LayerError::Parse(err) => write!(f, "GeoJSON parse error: {err}"),
            LayerError::NotAFeatureCollection => {
                write!(f, "expected GeoJSON FeatureCollection")
            }
            LayerError::InvalidFeature { index, reason } => {
                write!(f, "invalid feature at index {index}: {reason}")
            }
            LayerError::Unwritable { index, reason } => {
                write!(f, "feature {index} cannot be written: {reason}")
            }
        }
    }
}

impl std::error::Error for LayerError {}

impl Layer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            features: Vec::new(),
        }
    }

    pub fn with_features(name: impl Into<String>, features: Vec<Feature>) -> Self {
        Self {
            name: name.into(),
            features,
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Common geometry type, `"Geometry"` when mixed, `None` when nothing
    /// carries a geometry.
    pub fn geometry_kind(&self) -> Option<&'static str> {
        let mut kinds = self
            .features
            .iter()
            .filter_map(|f| f.geometry.as_ref().map(Geometry::type_name));
        let first = kinds.next()?;
        if kinds.all(|k| k == first) {
            Some(first)
        } else {
            Some("Geometry")
        }
    }

    /// Property keys in first-seen order across all features.
    pub fn columns(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for feat in &self.features {
            for key in feat.properties.keys() {
                if !out.iter().any(|k| k == key) {
                    out.push(key.clone());
                }
            }
        }
        out
    }

    pub fn check_writable(&self) -> Result<(), LayerError> {
        for (index, feat) in self.features.iter().enumerate() {
            if let Some(geom) = &feat.geometry {
                geom.check_writable()
                    .map_err(|reason| LayerError::Unwritable { index, reason })?;
            }
        }
        Ok(())
    }

    pub fn from_geojson_str(name: impl Into<String>, payload: &str) -> Result<Self, LayerError> {
        let value: Value = serde_json::from_str(payload).map_err(LayerError::Parse)?;
        Self::from_geojson_value(name, value)
    }

    pub fn from_geojson_value(name: impl Into<String>, value: Value) -> Result<Self, LayerError> {
        let obj = value.as_object().ok_or(LayerError::NotAFeatureCollection)?;
        let ty = obj
            .get("type")
            .and_then(|v| v.as_str())
            .ok_or(LayerError::NotAFeatureCollection)?;
        if ty != "FeatureCollection" {
            return Err(LayerError::NotAFeatureCollection);
        }

        let features_val = obj
            .get("features")
            .and_then(|v| v.as_array())
            .ok_or(LayerError::NotAFeatureCollection)?;

        let mut features = Vec::with_capacity(features_val.len());
        for (index, feat_val) in features_val.iter().enumerate() {
            let feat_obj = feat_val.as_object().ok_or(LayerError::InvalidFeature {
                index,
                reason: "feature must be an object".to_string(),
            })?;

            let feat_type = feat_obj.get("type").and_then(|v| v.as_str()).ok_or(
                LayerError::InvalidFeature {
                    index,
                    reason: "feature missing type".to_string(),
                },
            )?;
            if feat_type != "Feature" {
                return Err(LayerError::InvalidFeature {
                    index,
                    reason: format!("unexpected feature type: {feat_type}"),
                });
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

            // A null geometry is legal GeoJSON; the feature is kept without one.
            let geometry = match feat_obj.get("geometry") {
                None | Some(Value::Null) => None,
                Some(geometry_val) => Some(
                    parse_geometry(geometry_val)
                        .map_err(|reason| LayerError::InvalidFeature { index, reason })?,
                ),
            };

            features.push(Feature {
                id,
                properties,
                geometry,
            });
        }

        Ok(Self {
            name: name.into(),
            features,
        })
    }

    pub fn to_geojson_value(&self) -> Value {
        let mut root = Map::new();
        root.insert(
            "type".to_string(),
            Value::String("FeatureCollection".to_string()),
        );
        root.insert("name".to_string(), Value::String(self.name.clone()));

        let mut features: Vec<Value> = Vec::with_capacity(self.features.len());
        for feat in &self.features {
            let mut fobj = Map::new();
            fobj.insert("type".to_string(), Value::String("Feature".to_string()));
            if let Some(id) = &feat.id {
                fobj.insert("id".to_string(), id.clone());
            }
            fobj.insert(
                "properties".to_string(),
                Value::Object(feat.properties.clone()),
            );
            fobj.insert(
                "geometry".to_string(),
                feat.geometry
                    .as_ref()
                    .map(geometry_to_geojson_value)
                    .unwrap_or(Value::Null),
            );
            features.push(Value::Object(fobj));
        }

        root.insert("features".to_string(), Value::Array(features));
        Value::Object(root)
    }

    pub fn to_geojson_string_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.to_geojson_value())
    }
}

fn geometry_to_geojson_value(geom: &Geometry) -> Value {
    let coords = match geom {
        Geometry::Point(p) => point_coords(p),
        Geometry::MultiPoint(ps) | Geometry::LineString(ps) => points_coords(ps),
        Geometry::MultiLineString(lines) | Geometry::Polygon(lines) => {
            Value::Array(lines.iter().map(|l| points_coords(l)).collect())
        }
        Geometry::MultiPolygon(polys) => Value::Array(
            polys
                .iter()
                .map(|rings| Value::Array(rings.iter().map(|r| points_coords(r)).collect()))
                .collect(),
        ),
    };

    let mut obj = Map::new();
    obj.insert(
        "type".to_string(),
        Value::String(geom.type_name().to_string()),
    );
    obj.insert("coordinates".to_string(), coords);
    Value::Object(obj)
}

fn point_coords(p: &Vec2) -> Value {
    Value::Array(vec![Value::from(p.x), Value::from(p.y)])
}

fn points_coords(ps: &[Vec2]) -> Value {
    Value::Array(ps.iter().map(point_coords).collect())
}

fn parse_geometry(value: &Value) -> Result<Geometry, String> {
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
        "Point" => Ok(Geometry::Point(parse_point(coords)?)),
        "MultiPoint" => Ok(Geometry::MultiPoint(parse_points(coords)?)),
        "LineString" => Ok(Geometry::LineString(parse_points(coords)?)),
        "MultiLineString" => Ok(Geometry::MultiLineString(parse_rings(coords)?)),
        "Polygon" => Ok(Geometry::Polygon(parse_rings(coords)?)),
        "MultiPolygon" => {
            let polys = coords
                .as_array()
                .ok_or("MultiPolygon coordinates must be an array of polygons".to_string())?;
            let mut out = Vec::with_capacity(polys.len());
            for poly in polys {
                out.push(parse_rings(poly)?);
            }
            Ok(Geometry::MultiPolygon(out))
        }
        other => Err(format!("unsupported geometry type: {other}")),
    }
}

fn parse_point(coords: &Value) -> Result<Vec2, String> {
    let arr = coords
        .as_array()
        .ok_or("position must be an array".to_string())?;
    if arr.len() < 2 {
        return Err("position must have [x, y]".to_string());
    }
    let x = arr[0].as_f64().ok_or("x must be a number".to_string())?;
    let y = arr[1].as_f64().ok_or("y must be a number".to_string())?;
    Ok(Vec2::new(x, y))
}

fn parse_points(coords: &Value) -> Result<Vec<Vec2>, String> {
    let arr = coords
        .as_array()
        .ok_or("coordinates must be an array".to_string())?;
    arr.iter().map(parse_point).collect()
}

fn parse_rings(coords: &Value) -> Result<Vec<Vec<Vec2>>, String> {
    let arr = coords
        .as_array()
        .ok_or("coordinates must be an array of arrays".to_string())?;
    arr.iter().map(parse_points).collect()
}
