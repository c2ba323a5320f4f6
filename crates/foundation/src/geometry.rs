//! Planar geometry in projected meters: segments, polylines and polygons.
//!
//! Only what the sight-line pipeline needs: segment/segment intersection,
//! point containment, point distance and a basic validity check.

use crate::bounds::Aabb2;
use crate::math::{Vec2, argmin_by_key};

/// Absolute tolerance (meters) for coincident points.
pub const GEOMETRY_EPS: f64 = 1e-9;

const PARAM_EPS: f64 = 1e-12;

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum SegmentIntersection {
    Point(Vec2),
    /// Collinear overlap, endpoints ordered along the first segment.
    Overlap(Vec2, Vec2),
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Segment {
    pub a: Vec2,
    pub b: Vec2,
}

impl Segment {
    pub fn new(a: Vec2, b: Vec2) -> Self {
        Self { a, b }
    }

    pub fn length(&self) -> f64 {
        self.a.distance(self.b)
    }

    pub fn bounds(&self) -> Aabb2 {
        Aabb2::new(
            [self.a.x.min(self.b.x), self.a.y.min(self.b.y)],
            [self.a.x.max(self.b.x), self.a.y.max(self.b.y)],
        )
    }

    pub fn point_at(&self, t: f64) -> Vec2 {
        self.a + (self.b - self.a).scale(t)
    }

    pub fn distance_to_point(&self, p: Vec2) -> f64 {
        let r = self.b - self.a;
        let len2 = r.dot(r);
        if len2 <= 0.0 {
            return self.a.distance(p);
        }
        let t = ((p - self.a).dot(r) / len2).clamp(0.0, 1.0);
        self.point_at(t).distance(p)
    }

    pub fn intersection(&self, other: &Segment) -> Option<SegmentIntersection> {
        let r = self.b - self.a;
        let s = other.b - other.a;
        let rr = r.dot(r);
        let ss = s.dot(s);

        if rr <= 0.0 {
            return (other.distance_to_point(self.a) <= GEOMETRY_EPS)
                .then_some(SegmentIntersection::Point(self.a));
        }
        if ss <= 0.0 {
            return (self.distance_to_point(other.a) <= GEOMETRY_EPS)
                .then_some(SegmentIntersection::Point(other.a));
        }

        let qp = other.a - self.a;
        let denom = r.cross(s);

        if denom.abs() <= PARAM_EPS * rr.sqrt() * ss.sqrt() {
            // Parallel: only collinear segments can meet.
            if qp.cross(r).abs() > GEOMETRY_EPS * rr.sqrt() {
                return None;
            }
            let t0 = qp.dot(r) / rr;
            let t1 = (other.b - self.a).dot(r) / rr;
            let lo = t0.min(t1).max(0.0);
            let hi = t0.max(t1).min(1.0);
            if hi < lo - PARAM_EPS {
                return None;
            }
            let start = self.point_at(lo);
            let end = self.point_at(hi);
            if start.distance(end) <= GEOMETRY_EPS {
                return Some(SegmentIntersection::Point(start));
            }
            return Some(SegmentIntersection::Overlap(start, end));
        }

        let t = qp.cross(s) / denom;
        let u = qp.cross(r) / denom;
        let range = -PARAM_EPS..=1.0 + PARAM_EPS;
        if range.contains(&t) && range.contains(&u) {
            Some(SegmentIntersection::Point(self.point_at(t.clamp(0.0, 1.0))))
        } else {
            None
        }
    }
}

/// Distinct crossing points of `seg` with an open or closed polyline.
///
/// Collinear overlaps are not points and are left out. A crossing through a
/// shared vertex is reported once.
pub fn polyline_crossings(seg: &Segment, line: &[Vec2]) -> Vec<Vec2> {
    let mut out: Vec<Vec2> = Vec::new();
    for w in line.windows(2) {
        let edge = Segment::new(w[0], w[1]);
        if let Some(SegmentIntersection::Point(p)) = seg.intersection(&edge)
            && !out.iter().any(|q| q.distance(p) <= GEOMETRY_EPS)
        {
            out.push(p);
        }
    }
    out
}

/// Distance from `p` to the nearest point of a polyline.
pub fn polyline_distance(line: &[Vec2], p: Vec2) -> f64 {
    match line {
        [] => f64::INFINITY,
        [only] => only.distance(p),
        _ => line
            .windows(2)
            .map(|w| Segment::new(w[0], w[1]).distance_to_point(p))
            .fold(f64::INFINITY, f64::min),
    }
}

/// Twice the signed area of a closed ring (counter-clockwise positive).
pub fn ring_signed_area2(ring: &[Vec2]) -> f64 {
    ring.windows(2).map(|w| w[0].cross(w[1])).sum()
}

/// Even-odd containment test; boundary points count as inside.
pub fn ring_contains(ring: &[Vec2], p: Vec2) -> bool {
    if polyline_distance(ring, p) <= GEOMETRY_EPS {
        return true;
    }
    let mut inside = false;
    for w in ring.windows(2) {
        let (a, b) = (w[0], w[1]);
        if (a.y > p.y) != (b.y > p.y) {
            let x_cross = a.x + (p.y - a.y) / (b.y - a.y) * (b.x - a.x);
            if p.x < x_cross {
                inside = !inside;
            }
        }
    }
    inside
}

/// Polygon with one exterior ring and optional holes. Rings are closed
/// (first vertex repeated last).
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    pub exterior: Vec<Vec2>,
    pub interiors: Vec<Vec<Vec2>>,
}

impl Polygon {
    pub fn new(exterior: Vec<Vec2>, interiors: Vec<Vec<Vec2>>) -> Self {
        Self {
            exterior,
            interiors,
        }
    }

    /// First ring is the exterior, the rest are holes.
    pub fn from_rings(rings: &[Vec<Vec2>]) -> Option<Self> {
        let (exterior, holes) = rings.split_first()?;
        Some(Self::new(exterior.clone(), holes.to_vec()))
    }

    pub fn rings(&self) -> impl Iterator<Item = &[Vec2]> {
        std::iter::once(self.exterior.as_slice()).chain(self.interiors.iter().map(Vec::as_slice))
    }

    pub fn bounds(&self) -> Option<Aabb2> {
        Aabb2::from_points(&self.exterior)
    }

    /// Boundary as separate line parts: a single part without holes,
    /// exterior then each hole otherwise.
    pub fn boundary_parts(&self) -> Vec<Vec<Vec2>> {
        self.rings()
            .filter(|r| r.len() >= 2)
            .map(<[Vec2]>::to_vec)
            .collect()
    }

    pub fn contains_point(&self, p: Vec2) -> bool {
        if !ring_contains(&self.exterior, p) {
            return false;
        }
        for hole in &self.interiors {
            if polyline_distance(hole, p) <= GEOMETRY_EPS {
                return true;
            }
            if ring_contains(hole, p) {
                return false;
            }
        }
        true
    }

    /// Zero inside, otherwise the distance to the nearest boundary point.
    pub fn distance_to_point(&self, p: Vec2) -> f64 {
        if self.contains_point(p) {
            return 0.0;
        }
        self.rings()
            .map(|r| polyline_distance(r, p))
            .fold(f64::INFINITY, f64::min)
    }

    /// Distance from `seg.a` to the nearest point of `seg` ∩ polygon, if any.
    pub fn segment_entry_distance(&self, seg: &Segment) -> Option<f64> {
        if self.contains_point(seg.a) {
            return Some(0.0);
        }
        let mut hits: Vec<Vec2> = Vec::new();
        for ring in self.rings() {
            for w in ring.windows(2) {
                match seg.intersection(&Segment::new(w[0], w[1])) {
                    Some(SegmentIntersection::Point(p)) => hits.push(p),
                    Some(SegmentIntersection::Overlap(p, q)) => {
                        hits.push(p);
                        hits.push(q);
                    }
                    None => {}
                }
            }
        }
        argmin_by_key(&hits, |p| seg.a.distance(*p)).map(|(_, d)| d)
    }

    /// Basic validity: closed rings of at least four finite vertices, a
    /// non-degenerate exterior, no self-crossing ring, holes inside the
    /// exterior.
    pub fn is_valid(&self) -> bool {
        for ring in self.rings() {
            if ring.len() < 4 || !ring.iter().all(|p| p.is_finite()) {
                return false;
            }
            if ring[0].distance(ring[ring.len() - 1]) > GEOMETRY_EPS {
                return false;
            }
            if ring_self_crosses(ring) {
                return false;
            }
        }
        if ring_signed_area2(&self.exterior).abs() <= GEOMETRY_EPS {
            return false;
        }
        self.interiors
            .iter()
            .all(|hole| hole.iter().all(|p| ring_contains(&self.exterior, *p)))
    }
}

fn ring_self_crosses(ring: &[Vec2]) -> bool {
    let edges: Vec<Segment> = ring.windows(2).map(|w| Segment::new(w[0], w[1])).collect();
    let n = edges.len();
    for i in 0..n {
        for j in (i + 1)..n {
            let adjacent = j == i + 1 || (i == 0 && j == n - 1);
            match edges[i].intersection(&edges[j]) {
                None => {}
                Some(SegmentIntersection::Point(_)) if adjacent => {}
                Some(_) => return true,
            }
        }
    }
    false
}
