//! Sight lines cast from a camera position along an annotation bearing.

use foundation::geometry::Segment;
use foundation::math::Vec2;

/// Straight ray of finite length from a photo position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SightLine {
    pub origin: Vec2,
    pub end: Vec2,
    /// Bearing the line was built from, degrees.
    pub bearing_deg: f64,
}

impl SightLine {
    pub fn segment(&self) -> Segment {
        Segment::new(self.origin, self.end)
    }

    pub fn length(&self) -> f64 {
        self.origin.distance(self.end)
    }

    pub fn coords(&self) -> Vec<Vec2> {
        vec![self.origin, self.end]
    }
}

/// Angle, radians from +x, of the line cast for `bearing_deg`.
///
/// With a positive offset the angle is `offset - bearing`, otherwise it is
/// `-bearing`. Callers relying on compass semantics choose the offset.
pub fn sight_angle_rad(bearing_deg: f64, orientation_offset_deg: u32) -> f64 {
    if orientation_offset_deg > 0 {
        (f64::from(orientation_offset_deg) - bearing_deg).to_radians()
    } else {
        (-bearing_deg).to_radians()
    }
}

pub fn build_sight_line(
    origin: Vec2,
    bearing_deg: f64,
    orientation_offset_deg: u32,
    length: f64,
) -> SightLine {
    let dir = Vec2::from_angle(sight_angle_rad(bearing_deg, orientation_offset_deg));
    SightLine {
        origin,
        end: origin + dir.scale(length),
        bearing_deg,
    }
}
