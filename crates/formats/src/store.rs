use std::fs;
use std::path::Path;

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::inputs::{Annotation, AnnotationMode, InputError, read_text};

/// Annotations of one photo, in click order.
#[derive(Debug, Clone, PartialEq)]
pub struct PhotoAnnotations {
    pub photo: String,
    pub annotations: Vec<Annotation>,
}

/// A click waiting to become an annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAnnotation {
    pub x: f64,
    pub y: f64,
    pub type_objet: Option<String>,
    pub fonction_objet: Option<String>,
    pub mode: AnnotationMode,
    pub angle_ajuste: Option<f64>,
}

/// Photo name to ordered annotations, keeping photo order as read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationStore {
    photos: Vec<PhotoAnnotations>,
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(payload: &str) -> Result<Self, InputError> {
        let value: Value = serde_json::from_str(payload)
            .map_err(|source| InputError::Parse { path: None, source })?;
        let Value::Object(map) = value else {
            return Err(InputError::Shape {
                path: None,
                reason: "expected an object keyed by photo name".to_string(),
            });
        };

        let mut photos = Vec::with_capacity(map.len());
        for (photo, list) in map {
            let annotations: Vec<Annotation> = serde_json::from_value(list)
                .map_err(|source| InputError::Parse { path: None, source })?;
            photos.push(PhotoAnnotations { photo, annotations });
        }
        Ok(Self { photos })
    }

    /// Strict load: a missing file is an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, InputError> {
        let path = path.as_ref();
        Self::from_json_str(&read_text(path)?).map_err(|e| e.at(path))
    }

    /// Like [`AnnotationStore::load`], but a missing file is an empty store.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, InputError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::new());
        }
        Self::load(path)
    }

    pub fn to_json_value(&self) -> Result<Value, serde_json::Error> {
        let mut map = Map::new();
        for entry in &self.photos {
            map.insert(entry.photo.clone(), serde_json::to_value(&entry.annotations)?);
        }
        Ok(Value::Object(map))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), InputError> {
        let path = path.as_ref();
        let payload = self
            .to_json_value()
            .and_then(|v| serde_json::to_string_pretty(&v))
            .map_err(|source| InputError::Parse {
                path: Some(path.to_path_buf()),
                source,
            })?;
        fs::write(path, payload).map_err(|source| InputError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn photos(&self) -> &[PhotoAnnotations] {
        &self.photos
    }

    pub fn annotations(&self, photo: &str) -> &[Annotation] {
        self.photos
            .iter()
            .find(|p| p.photo == photo)
            .map(|p| p.annotations.as_slice())
            .unwrap_or(&[])
    }

    pub fn annotation_count(&self) -> usize {
        self.photos.iter().map(|p| p.annotations.len()).sum()
    }

    fn entry_mut(&mut self, photo: &str) -> &mut Vec<Annotation> {
        let idx = match self.photos.iter().position(|p| p.photo == photo) {
            Some(idx) => idx,
            None => {
                self.photos.push(PhotoAnnotations {
                    photo: photo.to_string(),
                    annotations: Vec::new(),
                });
                self.photos.len() - 1
            }
        };
        &mut self.photos[idx].annotations
    }

    /// Record a click. Returns the new uuid, or `None` when the click repeats
    /// `last_click` or lands on coordinates already annotated on this photo.
    pub fn add(
        &mut self,
        photo: &str,
        click: NewAnnotation,
        last_click: Option<(f64, f64)>,
    ) -> Option<String> {
        let current = (click.x, click.y);
        if last_click == Some(current) {
            return None;
        }
        let list = self.entry_mut(photo);
        if list
            .iter()
            .any(|a| a.x == Some(current.0) && a.y == Some(current.1))
        {
            return None;
        }

        let uuid = Uuid::new_v4().to_string();
        list.push(Annotation {
            uuid: uuid.clone(),
            x: Some(click.x),
            y: Some(click.y),
            yaw_origin: None,
            pitch: None,
            angle_ajuste: click.angle_ajuste,
            angle_vertical: None,
            type_objet: click.type_objet,
            fonction_objet: click.fonction_objet,
            mode_annotation: click.mode,
            legacy_id: None,
        });
        Some(uuid)
    }

    /// Change type, function and mode. Position is fixed once created.
    pub fn edit(
        &mut self,
        photo: &str,
        uuid: &str,
        type_objet: Option<String>,
        fonction_objet: Option<String>,
        mode: AnnotationMode,
    ) -> bool {
        let Some(ann) = self.get_mut(photo, uuid) else {
            return false;
        };
        ann.type_objet = type_objet;
        ann.fonction_objet = fonction_objet;
        ann.mode_annotation = mode;
        true
    }

    pub fn delete(&mut self, photo: &str, uuid: &str) -> bool {
        let Some(entry) = self.photos.iter_mut().find(|p| p.photo == photo) else {
            return false;
        };
        match entry.annotations.iter().position(|a| a.uuid == uuid) {
            Some(i) => {
                entry.annotations.remove(i);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, photo: &str, uuid: &str) -> Option<&Annotation> {
        self.annotations(photo).iter().find(|a| a.uuid == uuid)
    }

    fn get_mut(&mut self, photo: &str, uuid: &str) -> Option<&mut Annotation> {
        self.photos
            .iter_mut()
            .find(|p| p.photo == photo)?
            .annotations
            .iter_mut()
            .find(|a| a.uuid == uuid)
    }

    /// Drop every annotation of one photo.
    pub fn reset(&mut self, photo: &str) {
        self.entry_mut(photo).clear();
    }
}
