//! Input documents produced upstream: per-photo annotations and EXIF records.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug)]
pub enum InputError {
    Io { path: PathBuf, source: std::io::Error },
    Parse { path: Option<PathBuf>, source: serde_json::Error },
    Shape { path: Option<PathBuf>, reason: String },
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let at = |path: &Option<PathBuf>| {
            path.as_ref()
                .map(|p| format!(" in {}", p.display()))
                .unwrap_or_default()
        };
        match self {
            InputError::Io { path, source } => {
                write!(f, "cannot read {}: {source}", path.display())
            }
            InputError::Parse { path, source } => write!(f, "JSON error{}: {source}", at(path)),
            InputError::Shape { path, reason } => {
                write!(f, "unexpected document shape{}: {reason}", at(path))
            }
        }
    }
}

impl std::error::Error for InputError {}

impl InputError {
    pub(crate) fn at(self, path: &Path) -> Self {
        match self {
            InputError::Parse { source, .. } => InputError::Parse {
                path: Some(path.to_path_buf()),
                source,
            },
            InputError::Shape { reason, .. } => InputError::Shape {
                path: Some(path.to_path_buf()),
                reason,
            },
            other => other,
        }
    }
}

pub(crate) fn read_text(path: &Path) -> Result<String, InputError> {
    fs::read_to_string(path).map_err(|source| InputError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// What an annotation asks the pipeline to do.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AnnotationMode {
    /// Map a new point object onto the building outline.
    Cartographie,
    /// Write an attribute onto the building hit by the sight line.
    MajObjet,
    /// Any other mode is carried through untouched.
    Other(String),
}

impl AnnotationMode {
    pub fn as_str(&self) -> &str {
        match self {
            AnnotationMode::Cartographie => "cartographie",
            AnnotationMode::MajObjet => "maj_objet",
            AnnotationMode::Other(s) => s,
        }
    }
}

impl Default for AnnotationMode {
    fn default() -> Self {
        AnnotationMode::Other(String::new())
    }
}

impl From<String> for AnnotationMode {
    fn from(s: String) -> Self {
        match s.as_str() {
            "cartographie" => AnnotationMode::Cartographie,
            "maj_objet" => AnnotationMode::MajObjet,
            _ => AnnotationMode::Other(s),
        }
    }
}

impl From<&str> for AnnotationMode {
    fn from(s: &str) -> Self {
        AnnotationMode::from(s.to_string())
    }
}

impl From<AnnotationMode> for String {
    fn from(mode: AnnotationMode) -> Self {
        match mode {
            AnnotationMode::Other(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for AnnotationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One object marked on one photo.
///
/// Flat photos carry pixel `x`/`y`; panoramas carry `yaw_origin`/`pitch`.
/// Either way `angle_ajuste` is the resolved world bearing in degrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    #[serde(default)]
    pub uuid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yaw_origin: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pitch: Option<f64>,
    #[serde(default)]
    pub angle_ajuste: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angle_vertical: Option<f64>,
    #[serde(default)]
    pub type_objet: Option<String>,
    #[serde(default)]
    pub fonction_objet: Option<String>,
    #[serde(default)]
    pub mode_annotation: AnnotationMode,
    /// Free-form identifier some producers attach.
    #[serde(default, rename = "ID", skip_serializing_if = "Option::is_none")]
    pub legacy_id: Option<Value>,
}

/// EXIF-derived metadata of one photo. Every field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExifRecord {
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    /// Compass heading of the camera, degrees.
    #[serde(default)]
    pub direction: Option<f64>,
    #[serde(default)]
    pub image_format: Option<String>,
    #[serde(default)]
    pub date_time: Option<String>,
}

/// Photo name to EXIF record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExifDocument {
    pub records: BTreeMap<String, ExifRecord>,
}

impl ExifDocument {
    pub fn from_json_str(payload: &str) -> Result<Self, InputError> {
        serde_json::from_str(payload).map_err(|source| InputError::Parse { path: None, source })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, InputError> {
        let path = path.as_ref();
        Self::from_json_str(&read_text(path)?).map_err(|e| e.at(path))
    }

    pub fn get(&self, photo: &str) -> Option<&ExifRecord> {
        self.records.get(photo)
    }

    pub fn insert(&mut self, photo: impl Into<String>, record: ExifRecord) {
        self.records.insert(photo.into(), record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
