use std::fmt;

use formats::package::PackageWriter;
use tracing::{error, info};

use crate::layer::{LayerRole, OutputLayer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerStatus {
    Written,
    Skipped(String),
    Failed(String),
}

impl fmt::Display for LayerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerStatus::Written => f.write_str("written"),
            LayerStatus::Skipped(reason) => write!(f, "skipped ({reason})"),
            LayerStatus::Failed(message) => write!(f, "FAILED: {message}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayerOutcome {
    pub name: String,
    pub role: LayerRole,
    pub feature_count: usize,
    pub status: LayerStatus,
}

/// Per-layer result of one export. A run with failures still produced
/// every layer not listed as failed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteReport {
    pub outcomes: Vec<LayerOutcome>,
}

impl WriteReport {
    pub fn outcome(&self, name: &str) -> Option<&LayerOutcome> {
        self.outcomes.iter().find(|o| o.name == name)
    }

    pub fn written(&self) -> impl Iterator<Item = &LayerOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.status == LayerStatus::Written)
    }

    pub fn failed(&self) -> impl Iterator<Item = &LayerOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, LayerStatus::Failed(_)))
    }

    pub fn is_complete(&self) -> bool {
        self.failed().next().is_none()
    }
}

/// Write each layer in turn. A failing layer is recorded and the next one
/// is attempted regardless.
pub fn write_layers(writer: &mut PackageWriter, layers: &[OutputLayer]) -> WriteReport {
    let mut report = WriteReport::default();
    for out in layers {
        let feature_count = out.layer.len();
        let status = if out.layer.is_empty() && !out.role.write_when_empty() {
            LayerStatus::Skipped("no features".to_string())
        } else {
            match writer.write_layer(&out.layer, out.role.write_mode()) {
                Ok(entry) => {
                    info!(
                        "{} layer '{}' written ({} features)",
                        out.role.label(),
                        entry.name,
                        feature_count
                    );
                    LayerStatus::Written
                }
                Err(err) => {
                    error!("{} layer '{}' not written: {err}", out.role.label(), out.name());
                    LayerStatus::Failed(err.to_string())
                }
            }
        };
        report.outcomes.push(LayerOutcome {
            name: out.name().to_string(),
            role: out.role,
            feature_count,
            status,
        });
    }
    report
}
