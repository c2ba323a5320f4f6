use crate::math::Vec2;

/// Axis-aligned bounding box in projected meters.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Aabb2 {
    pub min: [f64; 2],
    pub max: [f64; 2],
}

impl Aabb2 {
    pub fn new(min: [f64; 2], max: [f64; 2]) -> Self {
        Aabb2 { min, max }
    }

    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Vec2>) -> Option<Self> {
        let mut it = points.into_iter();
        let first = it.next()?;
        let mut min = [first.x, first.y];
        let mut max = [first.x, first.y];
        for p in it {
            min[0] = min[0].min(p.x);
            min[1] = min[1].min(p.y);
            max[0] = max[0].max(p.x);
            max[1] = max[1].max(p.y);
        }
        Some(Aabb2::new(min, max))
    }

    pub fn union(&self, other: &Aabb2) -> Aabb2 {
        Aabb2::new(
            [self.min[0].min(other.min[0]), self.min[1].min(other.min[1])],
            [self.max[0].max(other.max[0]), self.max[1].max(other.max[1])],
        )
    }

    /// Closed-interval overlap test; touching boxes intersect.
    pub fn intersects(&self, other: &Aabb2) -> bool {
        !(other.min[0] > self.max[0]
            || other.max[0] < self.min[0]
            || other.min[1] > self.max[1]
            || other.max[1] < self.min[1])
    }
}
