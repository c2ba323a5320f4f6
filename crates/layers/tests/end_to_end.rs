use std::fs;
use std::path::{Path, PathBuf};

use foundation::math::{LatLon, Vec2, to_lambert93};
use formats::config::PipelineConfig;
use formats::layer::{Feature, Geometry, Layer};
use formats::package::{LayerPackage, PackageWriter, WriteMode};
use layers::{ExportError, ExportRequest, LayerStatus, run_export};
use serde_json::{Value, json};

const PHOTO_LAT: f64 = 48.1105;
const PHOTO_LON: f64 = -1.6803;

fn assert_close(a: f64, b: f64, eps: f64) {
    let diff = (a - b).abs();
    assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
}

fn photo_origin() -> Vec2 {
    to_lambert93(LatLon::new(PHOTO_LAT, PHOTO_LON))
}

fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<Vec<Vec2>> {
    vec![vec![
        Vec2::new(x0, y0),
        Vec2::new(x1, y0),
        Vec2::new(x1, y1),
        Vec2::new(x0, y1),
        Vec2::new(x0, y0),
    ]]
}

/// A building whose west wall sits 20 m east of the photo.
fn building() -> Feature {
    let o = photo_origin();
    Feature::new(Geometry::Polygon(rect(o.x + 20.0, o.y - 10.0, o.x + 30.0, o.y + 10.0)))
        .with_property("id", 501)
        .with_property("nature", "maison")
}

fn road() -> Layer {
    let o = photo_origin();
    Layer::with_features(
        "routes",
        vec![
            Feature::new(Geometry::LineString(vec![
                Vec2::new(o.x - 50.0, o.y - 5.0),
                Vec2::new(o.x + 50.0, o.y - 5.0),
            ]))
            .with_property("nom", "rue"),
        ],
    )
}

fn write_json(path: &Path, value: &Value) {
    fs::write(path, serde_json::to_string_pretty(value).expect("json")).expect("write json");
}

fn write_inputs(dir: &Path) -> (PathBuf, PathBuf) {
    let annotations = dir.join("annotations.json");
    write_json(
        &annotations,
        &json!({
            "IMG_0001.jpg": [
                {"uuid": "c-1", "x": 640, "y": 300, "angle_ajuste": 90.0,
                 "type_objet": "porte", "fonction_objet": "entree",
                 "mode_annotation": "cartographie"},
                {"uuid": "m-1", "x": 700, "y": 120, "angle_ajuste": 90.0,
                 "type_objet": "toiture", "fonction_objet": "tuile",
                 "mode_annotation": "maj_objet"}
            ],
            "IMG_0002.jpg": [
                {"uuid": "c-2", "x": 10, "y": 10, "angle_ajuste": 45.0,
                 "type_objet": "porte", "fonction_objet": "entree",
                 "mode_annotation": "cartographie"}
            ]
        }),
    );
    let exif = dir.join("exif.json");
    write_json(
        &exif,
        &json!({
            "IMG_0001.jpg": {"latitude": PHOTO_LAT, "longitude": PHOTO_LON,
                             "direction": 90.0, "image_format": "JPEG",
                             "date_time": "2024:05:01 10:00:00"},
            "IMG_0002.jpg": {"latitude": null, "longitude": null, "direction": null,
                             "image_format": "JPEG", "date_time": null}
        }),
    );
    (annotations, exif)
}

fn request(dir: &Path, source: PathBuf) -> ExportRequest {
    let (annotations, exif) = write_inputs(dir);
    ExportRequest {
        annotations,
        exif,
        source,
        target_layer: "bati".to_string(),
        output: dir.join("out").join("export.pkg"),
        image_folder: Some(dir.join("photos")),
        config: PipelineConfig::default()
            .with_orientation_offset(90)
            .expect("offset"),
    }
}

fn single_point(layer: &Layer) -> Vec2 {
    assert_eq!(layer.len(), 1, "layer {} should hold one feature", layer.name);
    match &layer.features[0].geometry {
        Some(Geometry::Point(p)) => *p,
        other => panic!("expected a point in {}, got {other:?}", layer.name),
    }
}

#[test]
fn known_intersection_yields_one_reference_and_one_object() {
    let dir = tempfile::tempdir().expect("tempdir");
    let source = dir.path().join("source.pkg");
    let mut writer = PackageWriter::open(&source, "EPSG:2154").expect("open source");
    writer
        .write_layer(&Layer::with_features("bati", vec![building()]), WriteMode::Overwrite)
        .expect("bati");
    writer.write_layer(&road(), WriteMode::Overwrite).expect("routes");

    let req = request(dir.path(), source);
    let summary = run_export(&req).expect("export");
    assert!(summary.report.is_complete(), "{:?}", summary.report);
    assert_eq!(summary.counts.photos, 1);
    assert_eq!(summary.counts.skipped_photos, 1);
    assert_eq!(summary.counts.mapped_points, 1);
    assert_eq!(summary.counts.reference_points, 1);
    assert_eq!(summary.counts.object_points, 1);
    assert_eq!(summary.counts.updated_features, 1);

    let out = LayerPackage::load(&req.output).expect("reload output");
    let o = photo_origin();
    let names = &req.config.layer_names;

    let mapped = out.layer(&names.mapped_points).expect("mapped layer");
    let hit = single_point(mapped);
    assert_close(hit.x, o.x + 20.0, 1e-6);
    assert_close(hit.y, o.y, 1e-6);
    assert_eq!(mapped.features[0].property("objet_id"), Some(&json!(501)));

    let reference = single_point(out.layer(&names.reference_points).expect("refs"));
    assert_close(reference.x, o.x, 1e-6);
    assert_close(reference.y, o.y, 1e-6);

    let object = single_point(out.layer(&names.object_points).expect("objects"));
    assert_close(object.x, o.x + 20.0, 1e-6);
    assert_close(object.y, o.y, 1e-6);

    assert_eq!(out.layer(&names.sight_lines).map(Layer::len), Some(1));
    assert_eq!(out.layer(&names.photos).map(Layer::len), Some(1));
    assert_eq!(out.layer(&names.raw_points).map(Layer::len), Some(2));

    let bati = out.layer("bati").expect("target layer");
    assert_eq!(bati.features[0].property("toiture"), Some(&json!("tuile")));
    assert_eq!(bati.features[0].property("nature"), Some(&json!("maison")));
    assert_eq!(out.layer("routes").map(Layer::len), Some(1));

    let log = summary.run_log.expect("run log");
    assert_eq!(log.parent(), req.output.parent());
    let text = fs::read_to_string(log).expect("read run log");
    assert!(text.contains("reference points: 1"));
}

#[test]
fn failed_target_write_leaves_other_layers() {
    let dir = tempfile::tempdir().expect("tempdir");
    let source = dir.path().join("source.pkg");
    fs::create_dir_all(source.join("layers")).expect("mkdir");

    // Written by hand: the second polygon has an open three-vertex ring,
    // which loads fine but cannot be written back.
    let mut bati = Layer::with_features("bati", vec![building()]).to_geojson_value();
    bati["features"].as_array_mut().expect("features").push(json!({
        "type": "Feature",
        "properties": {"id": 502},
        "geometry": {"type": "Polygon",
                     "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]]]}
    }));
    write_json(&source.join("layers/bati.geojson"), &bati);
    write_json(&source.join("layers/routes.geojson"), &road().to_geojson_value());
    write_json(
        &source.join("package.manifest.json"),
        &json!({
            "version": "1.0",
            "crs": "EPSG:2154",
            "layers": [
                {"name": "bati", "path": "layers/bati.geojson", "feature_count": 2},
                {"name": "routes", "path": "layers/routes.geojson", "feature_count": 1}
            ]
        }),
    );

    let req = request(dir.path(), source);
    let summary = run_export(&req).expect("a failing layer does not fail the run");
    let bati_outcome = summary.report.outcome("bati").expect("bati outcome");
    assert!(matches!(bati_outcome.status, LayerStatus::Failed(_)));
    assert_eq!(summary.report.failed().count(), 1);

    let out = LayerPackage::load(&req.output).expect("reload output");
    assert!(out.layer("bati").is_none());
    let names = &req.config.layer_names;
    for name in ["routes"].into_iter().chain(names.all()) {
        assert!(out.layer(name).is_some(), "missing layer {name}");
    }
    let text = fs::read_to_string(summary.run_log.expect("run log")).expect("read run log");
    assert!(text.contains("FAILED"));
}

#[test]
fn unreadable_annotations_abort_before_writing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let source = dir.path().join("source.pkg");
    PackageWriter::open(&source, "EPSG:2154")
        .expect("open")
        .write_layer(&Layer::with_features("bati", vec![building()]), WriteMode::Overwrite)
        .expect("bati");

    let req = request(dir.path(), source);
    fs::write(&req.annotations, "{ not json").expect("corrupt");
    let err = run_export(&req).unwrap_err();
    assert!(matches!(err, ExportError::Annotations(_)), "{err}");
    assert!(!req.output.exists());
}
