//! Geolocated photos and the annotations made on them.

use foundation::math::{LatLon, Vec2, to_lambert93};
use formats::inputs::{Annotation, AnnotationMode, ExifDocument, ExifRecord};
use formats::store::AnnotationStore;
use tracing::{debug, warn};

/// A photo that made it into geometric processing.
#[derive(Debug, Clone, PartialEq)]
pub struct PhotoPosition {
    pub photo: String,
    pub geo: LatLon,
    /// Projected position, meters.
    pub world: Vec2,
    pub heading_deg: Option<f64>,
    pub exif: ExifRecord,
}

/// One annotation placed at its photo's world position.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Index into [`ObservationSet::photos`].
    pub photo_index: usize,
    pub photo: String,
    pub origin: Vec2,
    pub annotation: Annotation,
}

impl Observation {
    /// World bearing of the annotation, if one was resolved upstream.
    pub fn bearing_deg(&self) -> Option<f64> {
        self.annotation.angle_ajuste.filter(|b| b.is_finite())
    }

    pub fn mode(&self) -> &AnnotationMode {
        &self.annotation.mode_annotation
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservationSet {
    pub photos: Vec<PhotoPosition>,
    pub observations: Vec<Observation>,
    /// Annotated photos left out for lack of a usable position.
    pub skipped_photos: Vec<String>,
}

impl ObservationSet {
    pub fn photo(&self, name: &str) -> Option<&PhotoPosition> {
        self.photos.iter().find(|p| p.photo == name)
    }

    pub fn with_mode<'a>(
        &'a self,
        mode: &'a AnnotationMode,
    ) -> impl Iterator<Item = &'a Observation> + 'a {
        self.observations.iter().filter(move |o| o.mode() == mode)
    }
}

/// Geodetic position of a photo, when its record has a usable one.
pub fn photo_geo(record: &ExifRecord) -> Option<LatLon> {
    let geo = LatLon::new(record.latitude?, record.longitude?);
    geo.is_valid().then_some(geo)
}

/// Place every annotation at its photo's projected position.
///
/// Photos are taken in annotation-document order. A photo without EXIF
/// latitude and longitude is skipped with all its annotations.
pub fn collect_observations(store: &AnnotationStore, exif: &ExifDocument) -> ObservationSet {
    let mut set = ObservationSet::default();

    for entry in store.photos() {
        let Some(record) = exif.get(&entry.photo) else {
            warn!("no EXIF record for {}, skipped", entry.photo);
            set.skipped_photos.push(entry.photo.clone());
            continue;
        };
        let Some(geo) = photo_geo(record) else {
            warn!("no usable position for {}, skipped", entry.photo);
            set.skipped_photos.push(entry.photo.clone());
            continue;
        };

        let world = to_lambert93(geo);
        let photo_index = set.photos.len();
        set.photos.push(PhotoPosition {
            photo: entry.photo.clone(),
            geo,
            world,
            heading_deg: record.direction,
            exif: record.clone(),
        });
        for annotation in &entry.annotations {
            set.observations.push(Observation {
                photo_index,
                photo: entry.photo.clone(),
                origin: world,
                annotation: annotation.clone(),
            });
        }
    }

    debug!(
        photos = set.photos.len(),
        observations = set.observations.len(),
        skipped = set.skipped_photos.len(),
        "observations collected"
    );
    set
}

#[cfg(test)]
mod tests {
    use super::collect_observations;
    use formats::inputs::{AnnotationMode, ExifDocument};
    use formats::store::AnnotationStore;
    use pretty_assertions::assert_eq;

    #[test]
    fn photos_without_position_are_skipped() {
        let store = AnnotationStore::from_json_str(
            r#"{
                "geo.jpg": [
                    {"uuid": "1", "x": 10, "y": 5, "angle_ajuste": 12.0,
                     "type_objet": "porte", "fonction_objet": "entree",
                     "mode_annotation": "cartographie"},
                    {"uuid": "2", "x": 20, "y": 5, "angle_ajuste": null,
                     "type_objet": "toiture", "fonction_objet": "tuile",
                     "mode_annotation": "maj_objet"}
                ],
                "nogeo.jpg": [{"uuid": "3", "x": 1, "y": 1}],
                "noexif.jpg": []
            }"#,
        )
        .expect("annotations");
        let exif = ExifDocument::from_json_str(
            r#"{
                "geo.jpg": {"latitude": 48.11, "longitude": -1.68, "direction": 90.0,
                            "image_format": "JPEG", "date_time": null},
                "nogeo.jpg": {"latitude": null, "longitude": 2.0, "direction": null,
                              "image_format": null, "date_time": null}
            }"#,
        )
        .expect("exif");

        let set = collect_observations(&store, &exif);
        assert_eq!(set.photos.len(), 1);
        assert_eq!(set.observations.len(), 2);
        assert_eq!(set.skipped_photos, vec!["nogeo.jpg", "noexif.jpg"]);

        let photo = set.photo("geo.jpg").expect("photo");
        assert_eq!(photo.heading_deg, Some(90.0));
        assert!(photo.world.x > 100_000.0 && photo.world.y > 6_000_000.0);

        let obs = &set.observations[1];
        assert_eq!(obs.origin, photo.world);
        assert_eq!(obs.bearing_deg(), None);
        assert_eq!(set.with_mode(&AnnotationMode::Cartographie).count(), 1);
    }
}
