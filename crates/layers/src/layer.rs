use formats::package::WriteMode;

/// Part an output layer plays in an export. Roles are listed in write order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum LayerRole {
    /// The source layer annotations were resolved against, with its new
    /// attribute columns.
    Target,
    /// Any other source layer, copied verbatim.
    Passthrough,
    Photos,
    /// One row per annotation at its photo position.
    RawPoints,
    MappedPoints,
    ReferencePoints,
    SightLines,
    ObjectPoints,
}

impl LayerRole {
    pub fn write_mode(self) -> WriteMode {
        match self {
            LayerRole::RawPoints => WriteMode::Overwrite,
            _ => WriteMode::Append,
        }
    }

    /// Whether the layer is written even with no features.
    pub fn write_when_empty(self) -> bool {
        matches!(self, LayerRole::RawPoints)
    }

    pub fn label(self) -> &'static str {
        match self {
            LayerRole::Target => "target",
            LayerRole::Passthrough => "passthrough",
            LayerRole::Photos => "photos",
            LayerRole::RawPoints => "raw points",
            LayerRole::MappedPoints => "mapped points",
            LayerRole::ReferencePoints => "reference points",
            LayerRole::SightLines => "sight lines",
            LayerRole::ObjectPoints => "object points",
        }
    }
}

/// A built layer and its role.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputLayer {
    pub role: LayerRole,
    pub layer: formats::layer::Layer,
}

impl OutputLayer {
    pub fn new(role: LayerRole, layer: formats::layer::Layer) -> Self {
        Self { role, layer }
    }

    pub fn name(&self) -> &str {
        &self.layer.name
    }
}
