//! Builds every output layer from the results of one run.

use std::path::Path;

use compute::boundary::BoundarySegment;
use compute::cluster::{Clustering, ReferencePoint};
use compute::observation::ObservationSet;
use compute::resolve::{MappedPoint, Resolution, object_id_value};
use formats::config::PipelineConfig;
use formats::inputs::AnnotationMode;
use formats::layer::{Feature, Geometry, Layer};
use formats::package::LayerPackage;
use serde_json::Value;

use crate::layer::{LayerRole, OutputLayer};

/// Folder, under the image folder, holding the annotated copies of photos.
pub const ANNOTATED_DIR: &str = "resultat";

/// Everything the assembler reads. Nothing here is mutated.
pub struct Assembly<'a> {
    pub source: &'a LayerPackage,
    pub target: &'a Layer,
    pub observations: &'a ObservationSet,
    pub resolution: &'a Resolution,
    pub clustering: &'a Clustering,
    pub references: &'a [ReferencePoint],
    pub boundaries: &'a [BoundarySegment],
    pub config: &'a PipelineConfig,
    pub image_folder: Option<&'a Path>,
}

/// Output layers in write order.
pub fn assemble(a: &Assembly<'_>) -> Vec<OutputLayer> {
    let names = &a.config.layer_names;
    let mut out = vec![OutputLayer::new(
        LayerRole::Target,
        a.resolution.updates.apply_to(a.target),
    )];
    for layer in a.source.layers() {
        if layer.name != a.target.name {
            out.push(OutputLayer::new(LayerRole::Passthrough, layer.clone()));
        }
    }
    out.push(OutputLayer::new(
        LayerRole::Photos,
        photo_layer(&names.photos, a.observations, a.image_folder),
    ));
    out.push(OutputLayer::new(
        LayerRole::RawPoints,
        raw_point_layer(&names.raw_points, a.observations),
    ));
    out.push(OutputLayer::new(
        LayerRole::MappedPoints,
        mapped_point_layer(&names.mapped_points, &a.resolution.mapped, a.clustering),
    ));
    out.push(OutputLayer::new(
        LayerRole::ReferencePoints,
        reference_layer(&names.reference_points, a.references),
    ));
    out.push(OutputLayer::new(
        LayerRole::SightLines,
        sight_line_layer(&names.sight_lines, a.references, a.config),
    ));
    out.push(OutputLayer::new(
        LayerRole::ObjectPoints,
        object_point_layer(&names.object_points, a.references, a.boundaries, a.config),
    ));
    out
}

fn path_text(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn mode_value(mode: &AnnotationMode) -> Value {
    match mode.as_str() {
        "" => Value::Null,
        s => Value::from(s),
    }
}

pub fn photo_layer(name: &str, set: &ObservationSet, image_folder: Option<&Path>) -> Layer {
    let folder = image_folder.unwrap_or(Path::new(""));
    let features = set
        .photos
        .iter()
        .map(|p| {
            Feature::new(Geometry::Point(p.world))
                .with_property("image_name", p.photo.as_str())
                .with_property("photo_original", path_text(&folder.join(&p.photo)))
                .with_property(
                    "photo_annotee",
                    path_text(&folder.join(ANNOTATED_DIR).join(&p.photo)),
                )
                .with_property("latitude", p.geo.lat_deg)
                .with_property("longitude", p.geo.lon_deg)
                .with_property("x_lambert93", p.world.x)
                .with_property("y_lambert93", p.world.y)
                .with_property("direction", p.heading_deg)
        })
        .collect();
    Layer::with_features(name, features)
}

pub fn raw_point_layer(name: &str, set: &ObservationSet) -> Layer {
    let mut features = Vec::with_capacity(set.observations.len());
    for obs in &set.observations {
        let Some(photo) = set.photos.get(obs.photo_index) else {
            continue;
        };
        let ann = &obs.annotation;
        features.push(
            Feature::new(Geometry::Point(obs.origin))
                .with_property("image_name", obs.photo.as_str())
                .with_property("latitude", photo.geo.lat_deg)
                .with_property("longitude", photo.geo.lon_deg)
                .with_property("x_lambert93", obs.origin.x)
                .with_property("y_lambert93", obs.origin.y)
                .with_property("direction", photo.heading_deg)
                .with_property("angle_ajuste", ann.angle_ajuste)
                .with_property("type_objet", ann.type_objet.clone())
                .with_property("fonction_objet", ann.fonction_objet.clone())
                .with_property("mode_annotation", mode_value(&ann.mode_annotation))
                .with_property("ID", ann.legacy_id.clone().unwrap_or(Value::Null))
                .with_property("uuid", ann.uuid.as_str()),
        );
    }
    Layer::with_features(name, features)
}

pub fn mapped_point_layer(name: &str, mapped: &[MappedPoint], clustering: &Clustering) -> Layer {
    let features = mapped
        .iter()
        .enumerate()
        .map(|(i, m)| {
            let (group_attr, subgroup_id) = clustering
                .assignments
                .get(i)
                .map(|&(g, s)| (Value::from(g), Value::from(s)))
                .unwrap_or((Value::Null, Value::Null));
            Feature::new(Geometry::Point(m.point))
                .with_property("image_name", m.photo.as_str())
                .with_property("x_lambert93", m.point.x)
                .with_property("y_lambert93", m.point.y)
                .with_property("angle_ajuste", m.bearing_deg)
                .with_property("type_objet", m.type_objet.clone())
                .with_property("fonction_objet", m.fonction_objet.clone())
                .with_property("ID", m.legacy_id.clone().unwrap_or(Value::Null))
                .with_property("objet_id", object_id_value(m.objet_id.as_ref()))
                .with_property("group_attr", group_attr)
                .with_property("subgroup_id", subgroup_id)
        })
        .collect();
    Layer::with_features(name, features)
}

pub fn reference_layer(name: &str, references: &[ReferencePoint]) -> Layer {
    let features = references
        .iter()
        .map(|r| {
            Feature::new(Geometry::Point(r.position))
                .with_property("objet_id", object_id_value(r.objet_id.as_ref()))
                .with_property("type_objet", r.type_objet.clone())
                .with_property("fonction_objet", r.fonction_objet.clone())
                .with_property("group_attr", r.group_attr)
                .with_property("subgroup_id", r.subgroup_id)
                .with_property("angle_ajuste_ref", r.anchor_bearing_deg)
                .with_property("orientation_moyenne", r.mean_bearing_deg)
        })
        .collect();
    Layer::with_features(name, features)
}

pub fn sight_line_layer(
    name: &str,
    references: &[ReferencePoint],
    config: &PipelineConfig,
) -> Layer {
    let features = references
        .iter()
        .map(|r| {
            let line = r.sight_line(config);
            Feature::new(Geometry::LineString(line.coords()))
                .with_property("objet_id", object_id_value(r.objet_id.as_ref()))
                .with_property("subgroup_id", r.subgroup_id)
                .with_property("angle_utilise", r.mean_bearing_deg)
        })
        .collect();
    Layer::with_features(name, features)
}

/// Extremity points: where each re-cast sight line first meets a building
/// outline. References whose line meets nothing produce no point.
pub fn object_point_layer(
    name: &str,
    references: &[ReferencePoint],
    boundaries: &[BoundarySegment],
    config: &PipelineConfig,
) -> Layer {
    let features = references
        .iter()
        .filter_map(|r| {
            let hit = r.extremity(boundaries, config)?;
            Some(
                Feature::new(Geometry::Point(hit))
                    .with_property("objet_id", object_id_value(r.objet_id.as_ref()))
                    .with_property("subgroup_id", r.subgroup_id)
                    .with_property("angle_utilise", r.mean_bearing_deg)
                    .with_property("type_objet", r.type_objet.clone())
                    .with_property("fonction_objet", r.fonction_objet.clone()),
            )
        })
        .collect();
    Layer::with_features(name, features)
}
