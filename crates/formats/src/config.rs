use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::inputs::{InputError, read_text};

/// Largest accepted heading-reference offset, degrees.
pub const MAX_ORIENTATION_OFFSET_DEG: u32 = 180;

#[derive(Debug)]
pub enum ConfigError {
    Read(InputError),
    Parse(serde_json::Error),
    OffsetOutOfRange(u32),
    NonPositive { field: &'static str, value: f64 },
    EmptyLayerName { field: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read(err) => write!(f, "cannot read config: {err}"),
            ConfigError::Parse(err) => write!(f, "config parse error: {err}"),
            ConfigError::OffsetOutOfRange(v) => write!(
                f,
                "orientation offset {v} outside [0, {MAX_ORIENTATION_OFFSET_DEG}]"
            ),
            ConfigError::NonPositive { field, value } => {
                write!(f, "{field} must be positive, got {value}")
            }
            ConfigError::EmptyLayerName { field } => write!(f, "layer name {field} is empty"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Names of the layers the pipeline produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerNames {
    pub photos: String,
    pub raw_points: String,
    pub mapped_points: String,
    pub reference_points: String,
    pub sight_lines: String,
    pub object_points: String,
}

impl Default for LayerNames {
    fn default() -> Self {
        Self {
            photos: "phm_photo".to_string(),
            raw_points: "phm_point_geom".to_string(),
            mapped_points: "phm_point_objet_annot".to_string(),
            reference_points: "phm_point_ref".to_string(),
            sight_lines: "phm_ligne_vue".to_string(),
            object_points: "phm_point_objet".to_string(),
        }
    }
}

impl LayerNames {
    pub fn all(&self) -> [&str; 6] {
        [
            self.photos.as_str(),
            self.raw_points.as_str(),
            self.mapped_points.as_str(),
            self.reference_points.as_str(),
            self.sight_lines.as_str(),
            self.object_points.as_str(),
        ]
    }
}

/// Tunables of one export run. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Length of every cast sight line, meters.
    pub sight_line_length: f64,
    /// Two mapped points are neighbours when strictly closer than this.
    pub cluster_distance: f64,
    /// Radius around a mapped point used to find the building it sits on.
    pub match_buffer: f64,
    /// 0 when headings are true-north based; a positive value selects the
    /// alternate sight-line formula.
    pub orientation_offset_deg: u32,
    pub layer_names: LayerNames,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sight_line_length: 150.0,
            cluster_distance: 2.0,
            match_buffer: 0.1,
            orientation_offset_deg: 0,
            layer_names: LayerNames::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_json_str(payload: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(payload).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = read_text(path).map_err(ConfigError::Read)?;
        Self::from_json_str(&text)
    }

    pub fn with_orientation_offset(mut self, offset_deg: u32) -> Result<Self, ConfigError> {
        self.orientation_offset_deg = offset_deg;
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.orientation_offset_deg > MAX_ORIENTATION_OFFSET_DEG {
            return Err(ConfigError::OffsetOutOfRange(self.orientation_offset_deg));
        }
        for (field, value) in [
            ("sight_line_length", self.sight_line_length),
            ("cluster_distance", self.cluster_distance),
            ("match_buffer", self.match_buffer),
        ] {
            if value.is_nan() || value <= 0.0 {
                return Err(ConfigError::NonPositive { field, value });
            }
        }
        let names = &self.layer_names;
        for (field, name) in [
            ("photos", &names.photos),
            ("raw_points", &names.raw_points),
            ("mapped_points", &names.mapped_points),
            ("reference_points", &names.reference_points),
            ("sight_lines", &names.sight_lines),
            ("object_points", &names.object_points),
        ] {
            if name.trim().is_empty() {
                return Err(ConfigError::EmptyLayerName { field });
            }
        }
        Ok(())
    }
}
