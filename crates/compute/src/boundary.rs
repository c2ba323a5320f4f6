//! Outline segments of the source polygons that sight lines are cut against.

use foundation::bounds::Aabb2;
use foundation::geometry::{Segment, polyline_crossings};
use foundation::math::Vec2;
use formats::layer::Layer;

/// One outline part of a source polygon.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundarySegment {
    /// Position of the owning feature in the source layer.
    pub feature_index: usize,
    pub line: Vec<Vec2>,
    pub bounds: Aabb2,
}

impl BoundarySegment {
    pub fn crossings(&self, seg: &Segment) -> Vec<Vec2> {
        if !self.bounds.intersects(&seg.bounds()) {
            return Vec::new();
        }
        polyline_crossings(seg, &self.line)
    }
}

/// Outline parts of every valid polygon in `layer`.
///
/// Multipolygons are exploded first and each part is checked on its own, so
/// one broken part does not hide its siblings. Invalid parts and features
/// without areal geometry produce nothing.
pub fn extract_boundaries(layer: &Layer) -> Vec<BoundarySegment> {
    let mut out = Vec::new();
    let mut dropped = 0usize;
    for (feature_index, feature) in layer.features.iter().enumerate() {
        let Some(geometry) = &feature.geometry else {
            continue;
        };
        for polygon in geometry.polygons() {
            if !polygon.is_valid() {
                dropped += 1;
                continue;
            }
            for line in polygon.boundary_parts() {
                let Some(bounds) = Aabb2::from_points(&line) else {
                    continue;
                };
                out.push(BoundarySegment {
                    feature_index,
                    line,
                    bounds,
                });
            }
        }
    }
    if dropped > 0 {
        tracing::debug!("{dropped} invalid polygon part(s) left out of {}", layer.name);
    }
    out
}
