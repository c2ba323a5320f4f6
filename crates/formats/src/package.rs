use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::layer::{Layer, LayerError};
use crate::manifest::{LayerEntry, MANIFEST_VERSION, PackageManifest};

pub const MANIFEST_FILE_NAME: &str = "package.manifest.json";
pub const LAYER_DIR: &str = "layers";

#[derive(Debug)]
pub enum PackageError {
    Io { path: PathBuf, source: std::io::Error },
    Parse { path: PathBuf, source: serde_json::Error },
    UnsupportedVersion { found: String },
    Layer { name: String, source: LayerError },
    HashMismatch { name: String },
    NotUtf8 { path: PathBuf },
}

impl fmt::Display for PackageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageError::Io { path, source } => write!(f, "I/O error on {}: {source}", path.display()),
            PackageError::Parse { path, source } => {
                write!(f, "manifest parse error in {}: {source}", path.display())
            }
            PackageError::UnsupportedVersion { found } => {
                write!(f, "unsupported package version: {found}")
            }
            PackageError::Layer { name, source } => write!(f, "layer '{name}': {source}"),
            PackageError::HashMismatch { name } => {
                write!(f, "layer '{name}' does not match its manifest hash")
            }
            PackageError::NotUtf8 { path } => write!(f, "{} is not valid UTF-8", path.display()),
        }
    }
}

impl std::error::Error for PackageError {}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> PackageError + '_ {
    move |source| PackageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn read_manifest(manifest_path: &Path) -> Result<PackageManifest, PackageError> {
    let payload = fs::read_to_string(manifest_path).map_err(io_err(manifest_path))?;
    let manifest: PackageManifest =
        serde_json::from_str(&payload).map_err(|source| PackageError::Parse {
            path: manifest_path.to_path_buf(),
            source,
        })?;
    if manifest.version != MANIFEST_VERSION {
        return Err(PackageError::UnsupportedVersion {
            found: manifest.version,
        });
    }
    Ok(manifest)
}

/// A multi-layer package fully loaded into memory.
#[derive(Debug, Clone)]
pub struct LayerPackage {
    manifest: PackageManifest,
    layers: Vec<Layer>,
}

impl LayerPackage {
    /// Load the manifest and every listed layer. Any unreadable piece fails
    /// the whole load.
    pub fn load(root: impl AsRef<Path>) -> Result<Self, PackageError> {
        let root = root.as_ref();
        let manifest = read_manifest(&root.join(MANIFEST_FILE_NAME))?;

        let mut layers = Vec::with_capacity(manifest.layers.len());
        for entry in &manifest.layers {
            let path = root.join(&entry.path);
            let bytes = fs::read(&path).map_err(io_err(&path))?;
            if let Some(expected) = &entry.content_hash
                && blake3::hash(&bytes).to_hex().as_str() != expected
            {
                return Err(PackageError::HashMismatch {
                    name: entry.name.clone(),
                });
            }
            let text = String::from_utf8(bytes)
                .map_err(|_| PackageError::NotUtf8 { path: path.clone() })?;
            let layer = Layer::from_geojson_str(entry.name.clone(), &text).map_err(|source| {
                PackageError::Layer {
                    name: entry.name.clone(),
                    source,
                }
            })?;
            debug!(layer = %entry.name, features = layer.len(), "loaded layer");
            layers.push(layer);
        }

        Ok(Self { manifest, layers })
    }

    /// In-memory package, mainly for callers that build layers themselves.
    pub fn from_layers(crs: impl Into<String>, layers: Vec<Layer>) -> Self {
        let mut manifest = PackageManifest::new(crs);
        for layer in &layers {
            manifest.upsert(LayerEntry {
                name: layer.name.clone(),
                path: layer_file_path(&layer.name),
                geometry_kind: layer.geometry_kind().map(str::to_string),
                feature_count: layer.len(),
                content_hash: None,
            });
        }
        Self { manifest, layers }
    }

    pub fn manifest(&self) -> &PackageManifest {
        &self.manifest
    }

    pub fn crs(&self) -> &str {
        &self.manifest.crs
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.name == name)
    }

    pub fn layer_names(&self) -> Vec<&str> {
        self.layers.iter().map(|l| l.name.as_str()).collect()
    }
}

/// Relative file path used for a layer name.
///
/// The readable stem keeps ASCII letters, digits, `-` and `_`. A digest of the
/// full name follows it, so names that only differ by accents or letter case
/// still land in distinct files.
pub fn layer_file_path(name: &str) -> String {
    let safe: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let digest = blake3::hash(name.as_bytes()).to_hex();
    format!("{LAYER_DIR}/{safe}-{}.geojson", &digest.as_str()[..12])
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WriteMode {
    /// Add features to the layer if it already exists, create it otherwise.
    Append,
    /// Replace the layer.
    Overwrite,
}

/// Writes layers one at a time into a package directory.
///
/// The manifest is persisted after every successful layer write, so a layer
/// that fails later leaves the earlier ones intact on disk.
#[derive(Debug)]
pub struct PackageWriter {
    root: PathBuf,
    manifest: PackageManifest,
}

impl PackageWriter {
    /// Create the package directory, or reopen an existing package.
    pub fn open(root: impl AsRef<Path>, crs: &str) -> Result<Self, PackageError> {
        let root = root.as_ref().to_path_buf();
        let layer_dir = root.join(LAYER_DIR);
        fs::create_dir_all(&layer_dir).map_err(io_err(&layer_dir))?;

        let manifest_path = root.join(MANIFEST_FILE_NAME);
        let manifest = if manifest_path.exists() {
            read_manifest(&manifest_path)?
        } else {
            PackageManifest::new(crs)
        };

        let writer = Self { root, manifest };
        writer.persist_manifest()?;
        Ok(writer)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest(&self) -> &PackageManifest {
        &self.manifest
    }

    pub fn write_layer(&mut self, layer: &Layer, mode: WriteMode) -> Result<LayerEntry, PackageError> {
        layer.check_writable().map_err(|source| PackageError::Layer {
            name: layer.name.clone(),
            source,
        })?;

        let rel_path = self.path_for(&layer.name);
        let path = self.root.join(&rel_path);

        let merged;
        let to_write = match (mode, self.manifest.entry(&layer.name)) {
            (WriteMode::Append, Some(existing)) => {
                let existing_path = self.root.join(&existing.path);
                let text = fs::read_to_string(&existing_path).map_err(io_err(&existing_path))?;
                let mut current =
                    Layer::from_geojson_str(layer.name.clone(), &text).map_err(|source| {
                        PackageError::Layer {
                            name: layer.name.clone(),
                            source,
                        }
                    })?;
                current.features.extend(layer.features.iter().cloned());
                merged = current;
                &merged
            }
            _ => layer,
        };

        let payload = to_write
            .to_geojson_string_pretty()
            .map_err(|source| PackageError::Parse {
                path: path.clone(),
                source,
            })?;
        let content_hash = blake3::hash(payload.as_bytes()).to_hex().to_string();

        let tmp_path = path.with_extension("geojson.tmp");
        fs::write(&tmp_path, payload.as_bytes()).map_err(io_err(&tmp_path))?;
        fs::rename(&tmp_path, &path).map_err(io_err(&path))?;

        let entry = LayerEntry {
            name: layer.name.clone(),
            path: rel_path,
            geometry_kind: to_write.geometry_kind().map(str::to_string),
            feature_count: to_write.len(),
            content_hash: Some(content_hash),
        };
        self.manifest.upsert(entry.clone());
        self.persist_manifest()?;
        debug!(layer = %entry.name, features = entry.feature_count, "wrote layer");
        Ok(entry)
    }

    /// Path already recorded for `name`, or a fresh one no other layer uses.
    fn path_for(&self, name: &str) -> String {
        if let Some(existing) = self.manifest.entry(name) {
            return existing.path.clone();
        }
        let base = layer_file_path(name);
        let taken = |p: &str| {
            self.manifest
                .layers
                .iter()
                .any(|e| e.path.eq_ignore_ascii_case(p))
        };
        if !taken(&base) {
            return base;
        }
        let stem = base.trim_end_matches(".geojson");
        (2..)
            .map(|n| format!("{stem}-{n}.geojson"))
            .find(|p| !taken(p))
            .unwrap_or(base)
    }

    fn persist_manifest(&self) -> Result<(), PackageError> {
        let path = self.root.join(MANIFEST_FILE_NAME);
        let payload =
            serde_json::to_string_pretty(&self.manifest).map_err(|source| PackageError::Parse {
                path: path.clone(),
                source,
            })?;
        fs::write(&path, payload).map_err(io_err(&path))
    }
}

#[cfg(test)]
mod tests {
    use super::{
        LayerPackage, MANIFEST_FILE_NAME, PackageError, PackageWriter, WriteMode, layer_file_path,
    };
    use crate::layer::{Feature, Geometry, Layer};
    use foundation::math::Vec2;
    use pretty_assertions::assert_eq;
    use std::fs;

    fn points(name: &str, n: usize) -> Layer {
        Layer::with_features(
            name,
            (0..n)
                .map(|i| {
                    Feature::new(Geometry::Point(Vec2::new(i as f64, 0.0))).with_property("i", i)
                })
                .collect(),
        )
    }

    #[test]
    fn written_package_loads_back() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut writer = PackageWriter::open(dir.path(), "EPSG:2154").expect("open");
        writer.write_layer(&points("a", 2), WriteMode::Append).expect("write a");
        writer.write_layer(&points("b c", 1), WriteMode::Append).expect("write b");

        let pkg = LayerPackage::load(dir.path()).expect("load");
        assert_eq!(pkg.crs(), "EPSG:2154");
        assert_eq!(pkg.layer_names(), vec!["a", "b c"]);
        assert_eq!(pkg.layer("a").map(Layer::len), Some(2));
        assert!(pkg.manifest().layers[1].path.starts_with("layers/b_c-"));
    }

    #[test]
    fn append_extends_and_overwrite_replaces() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut writer = PackageWriter::open(dir.path(), "EPSG:2154").expect("open");
        writer.write_layer(&points("a", 2), WriteMode::Append).expect("first");
        let entry = writer.write_layer(&points("a", 3), WriteMode::Append).expect("append");
        assert_eq!(entry.feature_count, 5);
        let entry = writer.write_layer(&points("a", 1), WriteMode::Overwrite).expect("overwrite");
        assert_eq!(entry.feature_count, 1);

        // Reopening keeps what was written before.
        let mut again = PackageWriter::open(dir.path(), "EPSG:2154").expect("reopen");
        let entry = again.write_layer(&points("a", 1), WriteMode::Append).expect("append");
        assert_eq!(entry.feature_count, 2);
    }

    #[test]
    fn unwritable_layer_leaves_package_untouched() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut writer = PackageWriter::open(dir.path(), "EPSG:2154").expect("open");
        writer.write_layer(&points("good", 1), WriteMode::Append).expect("good");

        let bad = Layer::with_features(
            "bad",
            vec![Feature::new(Geometry::LineString(vec![Vec2::new(0.0, 0.0)]))],
        );
        let err = writer.write_layer(&bad, WriteMode::Append).unwrap_err();
        assert!(matches!(err, PackageError::Layer { ref name, .. } if name == "bad"));

        let pkg = LayerPackage::load(dir.path()).expect("load");
        assert_eq!(pkg.layer_names(), vec!["good"]);
    }

    #[test]
    fn accented_and_cased_names_get_their_own_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut writer = PackageWriter::open(dir.path(), "EPSG:2154").expect("open");
        writer.write_layer(&points("bâti", 1), WriteMode::Append).expect("bâti");
        writer.write_layer(&points("béti", 2), WriteMode::Append).expect("béti");
        writer.write_layer(&points("Bati", 3), WriteMode::Append).expect("Bati");
        writer.write_layer(&points("bati", 4), WriteMode::Append).expect("bati");

        let paths: Vec<String> = writer
            .manifest()
            .layers
            .iter()
            .map(|e| e.path.to_ascii_lowercase())
            .collect();
        for (i, p) in paths.iter().enumerate() {
            assert!(!paths[i + 1..].contains(p), "{p} is shared");
        }

        let pkg = LayerPackage::load(dir.path()).expect("load");
        assert_eq!(pkg.layer("bâti").map(Layer::len), Some(1));
        assert_eq!(pkg.layer("béti").map(Layer::len), Some(2));
        assert_eq!(pkg.layer("Bati").map(Layer::len), Some(3));
        assert_eq!(pkg.layer("bati").map(Layer::len), Some(4));
    }

    #[test]
    fn path_taken_by_another_layer_is_not_reused() {
        let dir = tempfile::tempdir().expect("tempdir");
        let squatter = layer_file_path("a");
        fs::write(
            dir.path().join(MANIFEST_FILE_NAME),
            format!(
                r#"{{"version":"1.0","crs":"EPSG:2154","layers":[{{"name":"other","path":"{squatter}"}}]}}"#
            ),
        )
        .expect("write manifest");
        fs::create_dir_all(dir.path().join("layers")).expect("layer dir");
        fs::write(
            dir.path().join(&squatter),
            r#"{"type":"FeatureCollection","features":[]}"#,
        )
        .expect("write other");

        let mut writer = PackageWriter::open(dir.path(), "EPSG:2154").expect("open");
        let entry = writer.write_layer(&points("a", 2), WriteMode::Append).expect("write");
        assert_ne!(entry.path, squatter);

        let pkg = LayerPackage::load(dir.path()).expect("load");
        assert_eq!(pkg.layer("other").map(Layer::len), Some(0));
        assert_eq!(pkg.layer("a").map(Layer::len), Some(2));
    }

    #[test]
    fn non_utf8_layer_fails_the_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(
            dir.path().join(MANIFEST_FILE_NAME),
            r#"{"version":"1.0","crs":"EPSG:2154","layers":[{"name":"bati","path":"layers/bati.geojson"}]}"#,
        )
        .expect("write manifest");
        fs::create_dir_all(dir.path().join("layers")).expect("layer dir");
        let mut bytes = br#"{"type":"FeatureCollection","features":[],"name":""#.to_vec();
        bytes.extend_from_slice(&[0xff, 0xfe]);
        bytes.extend_from_slice(br#""}"#);
        fs::write(dir.path().join("layers/bati.geojson"), bytes).expect("write layer");

        let err = LayerPackage::load(dir.path()).unwrap_err();
        assert!(matches!(err, PackageError::NotUtf8 { .. }), "got {err}");
    }

    #[test]
    fn tampered_layer_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut writer = PackageWriter::open(dir.path(), "EPSG:2154").expect("open");
        let entry = writer.write_layer(&points("a", 1), WriteMode::Append).expect("write");
        fs::write(
            dir.path().join(&entry.path),
            r#"{"type":"FeatureCollection","features":[]}"#,
        )
        .expect("tamper");

        let err = LayerPackage::load(dir.path()).unwrap_err();
        assert!(matches!(err, PackageError::HashMismatch { .. }));
    }

    #[test]
    fn rejects_unsupported_version() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(
            dir.path().join(MANIFEST_FILE_NAME),
            r#"{"version":"2.0","crs":"EPSG:2154","layers":[]}"#,
        )
        .expect("write manifest");

        match LayerPackage::load(dir.path()).unwrap_err() {
            PackageError::UnsupportedVersion { found } => assert_eq!(found, "2.0"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_package_is_an_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = LayerPackage::load(dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, PackageError::Io { .. }));
    }
}
