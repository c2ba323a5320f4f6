//! One export run: load inputs, resolve, cluster, assemble, write.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::Local;
use compute::boundary::extract_boundaries;
use compute::cluster::{cluster_mapped_points, reference_points};
use compute::observation::collect_observations;
use compute::resolve::{TargetIndex, resolve_observations};
use foundation::math::LAMBERT93_CRS;
use formats::config::PipelineConfig;
use formats::inputs::{ExifDocument, InputError};
use formats::package::{LayerPackage, PackageError, PackageWriter};
use formats::store::AnnotationStore;
use tracing::{info, warn};

use crate::assemble::{Assembly, assemble};
use crate::layer::{LayerRole, OutputLayer};
use crate::runlog::RunLog;
use crate::writer::{WriteReport, write_layers};

#[derive(Debug)]
pub enum ExportError {
    Annotations(InputError),
    Exif(InputError),
    Source(PackageError),
    MissingLayer { name: String, available: Vec<String> },
    Output(PackageError),
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::Annotations(err) => write!(f, "annotations: {err}"),
            ExportError::Exif(err) => write!(f, "EXIF data: {err}"),
            ExportError::Source(err) => write!(f, "source package: {err}"),
            ExportError::MissingLayer { name, available } => write!(
                f,
                "layer '{name}' not in source package (available: {})",
                available.join(", ")
            ),
            ExportError::Output(err) => write!(f, "output package: {err}"),
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExportError::Annotations(err) | ExportError::Exif(err) => Some(err),
            ExportError::Source(err) | ExportError::Output(err) => Some(err),
            ExportError::MissingLayer { .. } => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub annotations: PathBuf,
    pub exif: PathBuf,
    pub source: PathBuf,
    pub target_layer: String,
    pub output: PathBuf,
    pub image_folder: Option<PathBuf>,
    pub config: PipelineConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportCounts {
    pub photos: usize,
    pub skipped_photos: usize,
    pub annotations: usize,
    pub updated_features: usize,
    pub mapped_points: usize,
    pub subgroups: usize,
    pub reference_points: usize,
    pub object_points: usize,
}

/// Every output layer of a run, before anything touches the disk.
#[derive(Debug, Clone)]
pub struct ExportPlan {
    pub layers: Vec<OutputLayer>,
    pub counts: ExportCounts,
}

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub counts: ExportCounts,
    pub report: WriteReport,
    /// `None` when the run log could not be written.
    pub run_log: Option<PathBuf>,
}

/// Compute every output layer from in-memory inputs.
///
/// Fails only when `target_layer` is not part of `source`.
pub fn plan_export(
    store: &AnnotationStore,
    exif: &ExifDocument,
    source: &LayerPackage,
    target_layer: &str,
    config: &PipelineConfig,
    image_folder: Option<&Path>,
) -> Result<ExportPlan, ExportError> {
    let target = source
        .layer(target_layer)
        .ok_or_else(|| ExportError::MissingLayer {
            name: target_layer.to_string(),
            available: source.layer_names().iter().map(|s| s.to_string()).collect(),
        })?;
    if source.crs() != LAMBERT93_CRS {
        warn!(
            "source package CRS is {}, photo positions are computed in {LAMBERT93_CRS}",
            source.crs()
        );
    }

    let observations = collect_observations(store, exif);
    let boundaries = extract_boundaries(target);
    let index = TargetIndex::new(target);
    let resolution = resolve_observations(&observations, &index, &boundaries, config);
    let clustering = cluster_mapped_points(&resolution.mapped, config.cluster_distance);
    let references = reference_points(&resolution.mapped, &clustering);

    let layers = assemble(&Assembly {
        source,
        target,
        observations: &observations,
        resolution: &resolution,
        clustering: &clustering,
        references: &references,
        boundaries: &boundaries,
        config,
        image_folder,
    });

    let object_points = layers
        .iter()
        .find(|l| l.role == LayerRole::ObjectPoints)
        .map(|l| l.layer.len())
        .unwrap_or(0);
    let counts = ExportCounts {
        photos: observations.photos.len(),
        skipped_photos: observations.skipped_photos.len(),
        annotations: observations.observations.len(),
        updated_features: resolution.updates.updated_features().count(),
        mapped_points: resolution.mapped.len(),
        subgroups: clustering.subgroups.len(),
        reference_points: references.len(),
        object_points,
    };
    Ok(ExportPlan { layers, counts })
}

/// Run a full export.
///
/// Unreadable inputs fail the run before anything is written. Once writing
/// starts, a failing layer is reported in the summary and the others are
/// still written.
pub fn run_export(request: &ExportRequest) -> Result<ExportSummary, ExportError> {
    let mut log = RunLog::new(Local::now());

    info!("loading annotations from {}", request.annotations.display());
    let store = AnnotationStore::load(&request.annotations).map_err(ExportError::Annotations)?;
    info!("loading EXIF data from {}", request.exif.display());
    let exif = ExifDocument::load(&request.exif).map_err(ExportError::Exif)?;
    let source = LayerPackage::load(&request.source).map_err(ExportError::Source)?;

    log.line(format!("annotations: {}", request.annotations.display()));
    log.count("annotated photos", store.photos().len());
    log.line(format!("exif: {}", request.exif.display()));
    log.count("exif records", exif.len());
    log.line(format!(
        "source: {} (target layer '{}')",
        request.source.display(),
        request.target_layer
    ));

    let plan = plan_export(
        &store,
        &exif,
        &source,
        &request.target_layer,
        &request.config,
        request.image_folder.as_deref(),
    )?;
    let c = &plan.counts;
    log.count("geolocated photos", c.photos);
    log.count("photos without position", c.skipped_photos);
    log.count("annotations on geolocated photos", c.annotations);
    log.count("features updated", c.updated_features);
    log.count("mapped points", c.mapped_points);
    log.count("spatial sub-groups", c.subgroups);
    log.count("reference points", c.reference_points);
    log.count("object points", c.object_points);

    let mut writer =
        PackageWriter::open(&request.output, source.crs()).map_err(ExportError::Output)?;
    let report = write_layers(&mut writer, &plan.layers);
    log.report(&report);

    let failed = report.failed().count();
    if failed > 0 {
        warn!("{failed} layer(s) failed to write, see the run log");
    }

    let run_log = match log.write_beside(&request.output) {
        Ok(path) => {
            info!("run log written to {}", path.display());
            Some(path)
        }
        Err(err) => {
            warn!("cannot write run log: {err}");
            None
        }
    };

    Ok(ExportSummary {
        counts: plan.counts,
        report,
        run_log,
    })
}

#[cfg(test)]
mod tests {
    use super::{ExportError, plan_export};
    use crate::layer::LayerRole;
    use formats::config::PipelineConfig;
    use formats::inputs::ExifDocument;
    use formats::layer::Layer;
    use formats::package::LayerPackage;
    use formats::store::AnnotationStore;
    use pretty_assertions::assert_eq;

    #[test]
    fn unknown_target_layer_is_fatal() {
        let source = LayerPackage::from_layers("EPSG:2154", vec![Layer::new("bati")]);
        let err = plan_export(
            &AnnotationStore::new(),
            &ExifDocument::default(),
            &source,
            "routes",
            &PipelineConfig::default(),
            None,
        )
        .unwrap_err();
        match err {
            ExportError::MissingLayer { name, available } => {
                assert_eq!(name, "routes");
                assert_eq!(available, vec!["bati"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_inputs_plan_every_role_once() {
        let source = LayerPackage::from_layers(
            "EPSG:2154",
            vec![Layer::new("bati"), Layer::new("routes")],
        );
        let plan = plan_export(
            &AnnotationStore::new(),
            &ExifDocument::default(),
            &source,
            "bati",
            &PipelineConfig::default(),
            None,
        )
        .expect("plan");
        let roles: Vec<LayerRole> = plan.layers.iter().map(|l| l.role).collect();
        assert_eq!(
            roles,
            vec![
                LayerRole::Target,
                LayerRole::Passthrough,
                LayerRole::Photos,
                LayerRole::RawPoints,
                LayerRole::MappedPoints,
                LayerRole::ReferencePoints,
                LayerRole::SightLines,
                LayerRole::ObjectPoints,
            ]
        );
        assert_eq!(plan.layers[1].name(), "routes");
        assert_eq!(plan.layers[3].name(), "phm_point_geom");
    }
}
