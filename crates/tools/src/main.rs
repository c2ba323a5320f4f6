use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use foundation::math::click_bearing;
use formats::config::PipelineConfig;
use formats::inputs::{AnnotationMode, ExifDocument};
use formats::package::LayerPackage;
use formats::store::{AnnotationStore, NewAnnotation};
use layers::{ExportRequest, LayerStatus, run_export};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Turn photo annotations into mapped vector layers")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve annotations against a source package and write the output package
    Export {
        /// Annotation document (photo name -> annotations)
        #[arg(long)]
        annotations: PathBuf,

        /// EXIF document (photo name -> position and heading)
        #[arg(long)]
        exif: PathBuf,

        /// Source layer package
        #[arg(long)]
        source: PathBuf,

        /// Layer of the source package to update and match against
        #[arg(long)]
        layer: String,

        /// Output package directory
        #[arg(long)]
        output: PathBuf,

        /// Heading reference offset in degrees (0 = north), overrides the config
        #[arg(long)]
        offset: Option<u32>,

        /// Pipeline configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Folder holding the photos, used for the photo paths
        #[arg(long)]
        image_folder: Option<PathBuf>,
    },

    /// List the layers of a package
    Layers {
        #[arg(long)]
        source: PathBuf,
    },

    /// Edit an annotation document
    Annotate {
        /// Annotation document, created if missing
        #[arg(long)]
        file: PathBuf,

        #[command(subcommand)]
        action: AnnotateAction,
    },
}

#[derive(Subcommand, Debug)]
enum AnnotateAction {
    /// Record a click on a photo
    Add {
        #[arg(long)]
        photo: String,
        #[arg(long)]
        x: f64,
        #[arg(long)]
        y: f64,
        #[arg(long = "type")]
        type_objet: Option<String>,
        #[arg(long = "function")]
        fonction_objet: Option<String>,
        /// cartographie, maj_objet, or any other label
        #[arg(long, default_value = "cartographie")]
        mode: String,
        /// World bearing of the click, degrees
        #[arg(long, conflicts_with = "image_width")]
        angle: Option<f64>,
        /// Derive the bearing from the photo heading: image width in pixels
        #[arg(long, requires_all = ["fov", "exif"])]
        image_width: Option<f64>,
        /// Horizontal field of view, degrees
        #[arg(long)]
        fov: Option<f64>,
        /// EXIF document providing the photo heading
        #[arg(long)]
        exif: Option<PathBuf>,
    },

    /// Change type, function and mode of an annotation
    Edit {
        #[arg(long)]
        photo: String,
        #[arg(long)]
        uuid: String,
        #[arg(long = "type")]
        type_objet: Option<String>,
        #[arg(long = "function")]
        fonction_objet: Option<String>,
        #[arg(long, default_value = "cartographie")]
        mode: String,
    },

    /// Remove one annotation
    Delete {
        #[arg(long)]
        photo: String,
        #[arg(long)]
        uuid: String,
    },

    /// Remove every annotation of a photo
    Reset {
        #[arg(long)]
        photo: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    match args.command {
        Command::Export {
            annotations,
            exif,
            source,
            layer,
            output,
            offset,
            config,
            image_folder,
        } => {
            let mut pipeline = match config {
                Some(path) => PipelineConfig::load(path)?,
                None => PipelineConfig::default(),
            };
            if let Some(offset) = offset {
                pipeline = pipeline.with_orientation_offset(offset)?;
            }
            export(ExportRequest {
                annotations,
                exif,
                source,
                target_layer: layer,
                output,
                image_folder,
                config: pipeline,
            })?
        }
        Command::Layers { source } => list_layers(&source)?,
        Command::Annotate { file, action } => annotate(&file, action)?,
    }

    Ok(())
}

fn export(request: ExportRequest) -> Result<(), Box<dyn std::error::Error>> {
    let summary = run_export(&request)?;
    for o in &summary.report.outcomes {
        let mark = match o.status {
            LayerStatus::Written => "ok",
            LayerStatus::Skipped(_) => "--",
            LayerStatus::Failed(_) => "!!",
        };
        println!("{mark}\t{}\t{}\t{}", o.name, o.feature_count, o.status);
    }
    let failed = summary.report.failed().count();
    if failed > 0 {
        println!("{failed} layer(s) could not be written");
    }
    if let Some(log) = &summary.run_log {
        println!("run log: {}", log.display());
    }
    Ok(())
}

fn list_layers(source: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let package = LayerPackage::load(source)?;
    println!("crs\t{}", package.crs());
    for entry in &package.manifest().layers {
        println!(
            "{}\t{}\t{}",
            entry.name,
            entry.geometry_kind.as_deref().unwrap_or("-"),
            entry.feature_count
        );
    }
    Ok(())
}

fn annotate(file: &Path, action: AnnotateAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut store = AnnotationStore::load_or_default(file)?;
    match action {
        AnnotateAction::Add {
            photo,
            x,
            y,
            type_objet,
            fonction_objet,
            mode,
            angle,
            image_width,
            fov,
            exif,
        } => {
            let angle_ajuste = match (angle, image_width, fov, exif) {
                (Some(angle), ..) => Some(angle),
                (None, Some(width), Some(fov), Some(exif)) => {
                    let heading = ExifDocument::load(exif)?
                        .get(&photo)
                        .and_then(|r| r.direction);
                    heading.and_then(|h| click_bearing(x, width, h, fov))
                }
                _ => None,
            };
            let click = NewAnnotation {
                x,
                y,
                type_objet,
                fonction_objet,
                mode: AnnotationMode::from(mode),
                angle_ajuste,
            };
            match store.add(&photo, click, None) {
                Some(uuid) => println!("{uuid}"),
                None => {
                    println!("not added: ({x}, {y}) is already annotated on {photo}");
                    return Ok(());
                }
            }
        }
        AnnotateAction::Edit {
            photo,
            uuid,
            type_objet,
            fonction_objet,
            mode,
        } => {
            if !store.edit(&photo, &uuid, type_objet, fonction_objet, AnnotationMode::from(mode)) {
                return Err(format!("no annotation {uuid} on {photo}").into());
            }
        }
        AnnotateAction::Delete { photo, uuid } => {
            if !store.delete(&photo, &uuid) {
                return Err(format!("no annotation {uuid} on {photo}").into());
            }
        }
        AnnotateAction::Reset { photo } => store.reset(&photo),
    }
    store.save(file)?;
    info!("saved {} annotation(s) to {}", store.annotation_count(), file.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{AnnotateAction, Args, Command};
    use clap::Parser;

    #[test]
    fn export_arguments_parse() {
        let args = Args::try_parse_from([
            "photomap", "export", "--annotations", "a.json", "--exif", "e.json",
            "--source", "src.pkg", "--layer", "bati", "--output", "out.pkg", "--offset", "90",
        ])
        .expect("parse");
        match args.command {
            Command::Export { layer, offset, config, .. } => {
                assert_eq!(layer, "bati");
                assert_eq!(offset, Some(90));
                assert!(config.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn annotate_add_rejects_conflicting_bearing_sources() {
        let ok = Args::try_parse_from([
            "photomap", "annotate", "--file", "a.json", "add", "--photo", "p.jpg",
            "--x", "10", "--y", "20", "--type", "porte", "--angle", "45",
        ])
        .expect("parse");
        let Command::Annotate { action: AnnotateAction::Add { angle, mode, .. }, .. } =
            ok.command
        else {
            panic!("expected annotate add");
        };
        assert_eq!(angle, Some(45.0));
        assert_eq!(mode, "cartographie");

        let conflicting = Args::try_parse_from([
            "photomap", "annotate", "--file", "a.json", "add", "--photo", "p.jpg",
            "--x", "10", "--y", "20", "--angle", "45", "--image-width", "1000",
            "--fov", "60", "--exif", "e.json",
        ]);
        assert!(conflicting.is_err());
    }
}
