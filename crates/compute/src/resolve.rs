//! Ray casting against the target layer.
//!
//! `maj_objet` annotations hit polygons and turn into attribute updates on
//! the nearest one. `cartographie` annotations hit boundary lines and turn
//! into mapped points, later clustered across photos.

use std::collections::BTreeMap;
use std::fmt;

use foundation::bounds::Aabb2;
use foundation::geometry::{Polygon, polyline_distance};
use foundation::math::{Vec2, argmin_by_key};
use formats::config::PipelineConfig;
use formats::inputs::AnnotationMode;
use formats::layer::{Geometry, Layer};
use serde_json::Value;
use tracing::{debug, info};

use crate::boundary::BoundarySegment;
use crate::observation::{Observation, ObservationSet};
use crate::sight::{SightLine, build_sight_line};

/// Identifier of a target-layer feature, as read from its id column or its
/// table position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectId {
    Int(i64),
    Text(String),
}

impl ObjectId {
    /// `null` is no id. Whole floats are folded into integers.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Number(n) => Some(match n.as_i64() {
                Some(i) => ObjectId::Int(i),
                None => match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => ObjectId::Int(f as i64),
                    _ => ObjectId::Text(n.to_string()),
                },
            }),
            Value::String(s) => Some(ObjectId::Text(s.clone())),
            other => Some(ObjectId::Text(other.to_string())),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            ObjectId::Int(i) => Value::from(*i),
            ObjectId::Text(s) => Value::from(s.as_str()),
        }
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectId::Int(i) => write!(f, "{i}"),
            ObjectId::Text(s) => f.write_str(s),
        }
    }
}

pub fn object_id_value(id: Option<&ObjectId>) -> Value {
    id.map(ObjectId::to_value).unwrap_or(Value::Null)
}

/// Nearest point where `line` crosses any boundary part.
///
/// Every crossing of every part is a candidate; the one closest to the line
/// origin wins, earliest candidate on ties.
pub fn nearest_boundary_hit(line: &SightLine, boundaries: &[BoundarySegment]) -> Option<Vec2> {
    let seg = line.segment();
    let candidates: Vec<Vec2> = boundaries.iter().flat_map(|b| b.crossings(&seg)).collect();
    argmin_by_key(&candidates, |p| line.origin.distance(*p)).map(|(i, _)| candidates[i])
}

struct TargetEntry {
    polygons: Vec<Polygon>,
    bounds: Option<Aabb2>,
}

/// Lookup structure over the target layer's features, in table order.
pub struct TargetIndex<'a> {
    layer: &'a Layer,
    entries: Vec<TargetEntry>,
    id_column: Option<&'static str>,
}

impl<'a> TargetIndex<'a> {
    pub fn new(layer: &'a Layer) -> Self {
        let entries = layer
            .features
            .iter()
            .map(|f| {
                let polygons = f.geometry.as_ref().map(Geometry::polygons).unwrap_or_default();
                let bounds = polygons
                    .iter()
                    .filter_map(Polygon::bounds)
                    .reduce(|a, b| a.union(&b));
                TargetEntry { polygons, bounds }
            })
            .collect();
        let columns = layer.columns();
        let id_column = ["id", "ID"]
            .into_iter()
            .find(|name| columns.iter().any(|c| c == name));
        Self {
            layer,
            entries,
            id_column,
        }
    }

    pub fn layer(&self) -> &'a Layer {
        self.layer
    }

    /// Column the object ids are read from, `None` when table positions are
    /// used instead.
    pub fn id_column(&self) -> Option<&'static str> {
        self.id_column
    }

    /// Feature whose polygon the line enters first, with the distance from
    /// the line origin to the entry point.
    pub fn nearest_polygon_hit(&self, line: &SightLine) -> Option<(usize, f64)> {
        let seg = line.segment();
        let seg_bounds = seg.bounds();
        let distances: Vec<f64> = self
            .entries
            .iter()
            .map(|entry| match entry.bounds {
                Some(b) if b.intersects(&seg_bounds) => entry
                    .polygons
                    .iter()
                    .filter_map(|p| p.segment_entry_distance(&seg))
                    .fold(f64::NAN, f64::min),
                _ => f64::NAN,
            })
            .collect();
        argmin_by_key(&distances, |d| *d)
    }

    /// First feature, in table order, lying within `buffer` of `p`.
    pub fn feature_near(&self, p: Vec2, buffer: f64) -> Option<usize> {
        self.layer.features.iter().position(|f| {
            f.geometry
                .as_ref()
                .is_some_and(|g| geometry_distance(g, p) <= buffer)
        })
    }

    pub fn object_id(&self, index: usize) -> Option<ObjectId> {
        match self.id_column {
            Some(column) => self
                .layer
                .features
                .get(index)?
                .property(column)
                .and_then(ObjectId::from_value),
            None => i64::try_from(index).ok().map(ObjectId::Int),
        }
    }
}

fn geometry_distance(geometry: &Geometry, p: Vec2) -> f64 {
    match geometry {
        Geometry::Point(q) => q.distance(p),
        Geometry::MultiPoint(qs) => qs.iter().map(|q| q.distance(p)).fold(f64::INFINITY, f64::min),
        Geometry::LineString(line) => polyline_distance(line, p),
        Geometry::MultiLineString(lines) => lines
            .iter()
            .map(|l| polyline_distance(l, p))
            .fold(f64::INFINITY, f64::min),
        Geometry::Polygon(_) | Geometry::MultiPolygon(_) => geometry
            .polygons()
            .iter()
            .map(|poly| poly.distance_to_point(p))
            .fold(f64::INFINITY, f64::min),
    }
}

/// Sparse attribute edits on the target layer: feature index to
/// `{type_objet: fonction_objet}`. Columns are materialized on write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeUpdates {
    columns: Vec<String>,
    values: BTreeMap<usize, BTreeMap<String, Option<String>>>,
}

impl AttributeUpdates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a column; later calls keep the first position.
    pub fn declare_column(&mut self, name: &str) {
        if !self.columns.iter().any(|c| c == name) {
            self.columns.push(name.to_string());
        }
    }

    /// Set one value. A later write to the same feature and column wins.
    pub fn set(&mut self, feature: usize, column: &str, value: Option<String>) {
        self.declare_column(column);
        self.values
            .entry(feature)
            .or_default()
            .insert(column.to_string(), value);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn get(&self, feature: usize, column: &str) -> Option<&Option<String>> {
        self.values.get(&feature)?.get(column)
    }

    pub fn updated_features(&self) -> impl Iterator<Item = usize> + '_ {
        self.values.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Copy of `layer` with every declared column present on every feature
    /// (null unless already set) and the recorded values written in.
    pub fn apply_to(&self, layer: &Layer) -> Layer {
        let mut out = layer.clone();
        for (index, feature) in out.features.iter_mut().enumerate() {
            for column in &self.columns {
                feature
                    .properties
                    .entry(column.clone())
                    .or_insert(Value::Null);
            }
            if let Some(values) = self.values.get(&index) {
                for (column, value) in values {
                    let v = value.as_deref().map(Value::from).unwrap_or(Value::Null);
                    feature.properties.insert(column.clone(), v);
                }
            }
        }
        out
    }
}

/// A `cartographie` annotation resolved onto a building outline.
#[derive(Debug, Clone, PartialEq)]
pub struct MappedPoint {
    /// Index into [`ObservationSet::observations`].
    pub observation: usize,
    pub photo: String,
    pub uuid: String,
    /// Photo position the ray was cast from.
    pub origin: Vec2,
    pub point: Vec2,
    pub bearing_deg: f64,
    pub type_objet: Option<String>,
    pub fonction_objet: Option<String>,
    pub legacy_id: Option<Value>,
    pub objet_id: Option<ObjectId>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    pub updates: AttributeUpdates,
    pub mapped: Vec<MappedPoint>,
    /// Observations cast in either mode that hit nothing.
    pub unmatched: usize,
    /// Observations of a known mode without a bearing.
    pub without_bearing: usize,
}

/// Resolve every observation against the target layer.
///
/// Attribute updates are processed first, then mapping, each in
/// observation order.
pub fn resolve_observations(
    set: &ObservationSet,
    target: &TargetIndex<'_>,
    boundaries: &[BoundarySegment],
    config: &PipelineConfig,
) -> Resolution {
    let mut out = Resolution::default();

    let updates: Vec<&Observation> = set.with_mode(&AnnotationMode::MajObjet).collect();
    for obs in &updates {
        if let Some(type_objet) = &obs.annotation.type_objet {
            out.updates.declare_column(type_objet);
        }
    }
    for obs in updates {
        let Some(bearing) = obs.bearing_deg() else {
            out.without_bearing += 1;
            continue;
        };
        let Some(column) = obs.annotation.type_objet.as_deref() else {
            debug!(uuid = %obs.annotation.uuid, "update without type_objet ignored");
            continue;
        };
        let line = cast(obs.origin, bearing, config);
        match target.nearest_polygon_hit(&line) {
            Some((feature, _)) => {
                out.updates
                    .set(feature, column, obs.annotation.fonction_objet.clone());
            }
            None => out.unmatched += 1,
        }
    }

    for (index, obs) in set.observations.iter().enumerate() {
        if obs.mode() != &AnnotationMode::Cartographie {
            continue;
        }
        let Some(bearing) = obs.bearing_deg() else {
            out.without_bearing += 1;
            continue;
        };
        let line = cast(obs.origin, bearing, config);
        let Some(point) = nearest_boundary_hit(&line, boundaries) else {
            out.unmatched += 1;
            continue;
        };
        let objet_id = target
            .feature_near(point, config.match_buffer)
            .and_then(|i| target.object_id(i));
        out.mapped.push(MappedPoint {
            observation: index,
            photo: obs.photo.clone(),
            uuid: obs.annotation.uuid.clone(),
            origin: obs.origin,
            point,
            bearing_deg: bearing,
            type_objet: obs.annotation.type_objet.clone(),
            fonction_objet: obs.annotation.fonction_objet.clone(),
            legacy_id: obs.annotation.legacy_id.clone(),
            objet_id,
        });
    }

    info!(
        updated_features = out.updates.updated_features().count(),
        mapped = out.mapped.len(),
        unmatched = out.unmatched,
        without_bearing = out.without_bearing,
        "observations resolved"
    );
    out
}

fn cast(origin: Vec2, bearing: f64, config: &PipelineConfig) -> SightLine {
    build_sight_line(
        origin,
        bearing,
        config.orientation_offset_deg,
        config.sight_line_length,
    )
}
