//! Multi-view consolidation of mapped points.
//!
//! Points are first partitioned by what they claim to be (matched object,
//! type, function), then split into spatial sub-groups, connected components
//! of the "closer than the cluster distance" graph. Each sub-group becomes a
//! single reference point whose bearing averages every view of it.

use std::collections::HashMap;

use foundation::geometry::GEOMETRY_EPS;
use foundation::math::{Vec2, math_rad_to_bearing};
use formats::config::PipelineConfig;
use tracing::debug;

use crate::analysis::{SpatialAnalysis, Statistics};
use crate::boundary::BoundarySegment;
use crate::resolve::{MappedPoint, ObjectId, nearest_boundary_hit};
use crate::sight::{SightLine, build_sight_line};

/// Identity shared by every point of a semantic group. Missing values are
/// equal to each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SemanticKey {
    pub objet_id: Option<ObjectId>,
    pub type_objet: Option<String>,
    pub fonction_objet: Option<String>,
}

impl SemanticKey {
    pub fn of(point: &MappedPoint) -> Self {
        Self {
            objet_id: point.objet_id.clone(),
            type_objet: point.type_objet.clone(),
            fonction_objet: point.fonction_objet.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubGroup {
    pub id: usize,
    pub group_attr: usize,
    /// Indices into the clustered points, ascending.
    pub members: Vec<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Clustering {
    /// `(group_attr, subgroup_id)` per input point, in input order.
    pub assignments: Vec<(usize, usize)>,
    pub group_count: usize,
    pub subgroups: Vec<SubGroup>,
}

/// Semantic partition then spatial connected components.
///
/// Group ids number semantic groups in order of first appearance. Sub-group
/// ids are global, counted group by group.
pub fn cluster_mapped_points(points: &[MappedPoint], threshold: f64) -> Clustering {
    let mut group_of_key: HashMap<SemanticKey, usize> = HashMap::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for (i, p) in points.iter().enumerate() {
        let next = groups.len();
        let g = *group_of_key.entry(SemanticKey::of(p)).or_insert(next);
        if g == next {
            groups.push(Vec::new());
        }
        groups[g].push(i);
    }

    let mut out = Clustering {
        assignments: vec![(0, 0); points.len()],
        group_count: groups.len(),
        subgroups: Vec::new(),
    };
    for (group_attr, indices) in groups.iter().enumerate() {
        let coords: Vec<Vec2> = indices.iter().map(|&i| points[i].point).collect();
        for component in SpatialAnalysis::connected_components(&coords, threshold) {
            let id = out.subgroups.len();
            let members: Vec<usize> = component.into_iter().map(|local| indices[local]).collect();
            for &m in &members {
                out.assignments[m] = (group_attr, id);
            }
            out.subgroups.push(SubGroup {
                id,
                group_attr,
                members,
            });
        }
    }

    debug!(
        points = points.len(),
        groups = out.group_count,
        subgroups = out.subgroups.len(),
        "mapped points clustered"
    );
    out
}

/// Consolidated view of one sub-group.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferencePoint {
    /// Photo position of the anchor, the sub-group's first member.
    pub position: Vec2,
    pub anchor_photo: String,
    pub objet_id: Option<ObjectId>,
    pub type_objet: Option<String>,
    pub fonction_objet: Option<String>,
    pub group_attr: usize,
    pub subgroup_id: usize,
    /// Bearing of the anchor annotation.
    pub anchor_bearing_deg: f64,
    /// Circular mean over the anchor and every other member.
    pub mean_bearing_deg: f64,
    pub member_count: usize,
}

impl ReferencePoint {
    pub fn sight_line(&self, config: &PipelineConfig) -> SightLine {
        build_sight_line(
            self.position,
            self.mean_bearing_deg,
            config.orientation_offset_deg,
            config.sight_line_length,
        )
    }

    /// Nearest building outline crossed by the re-cast sight line.
    pub fn extremity(&self, boundaries: &[BoundarySegment], config: &PipelineConfig) -> Option<Vec2> {
        nearest_boundary_hit(&self.sight_line(config), boundaries)
    }
}

/// Mean bearing of a sub-group seen from its anchor.
///
/// The anchor contributes its own bearing; every other member contributes
/// the direction from the anchor's photo to that member's mapped point. A
/// member sitting on the anchor position has no direction and is left out.
pub fn subgroup_bearing(anchor: &MappedPoint, others: &[&MappedPoint]) -> f64 {
    let mut bearings = vec![anchor.bearing_deg];
    for m in others {
        let d = m.point - anchor.origin;
        if d.length() <= GEOMETRY_EPS {
            continue;
        }
        bearings.push(math_rad_to_bearing(d.y.atan2(d.x)));
    }
    if bearings.len() == 1 {
        return anchor.bearing_deg;
    }
    Statistics::mean_bearing_deg(&bearings).unwrap_or(anchor.bearing_deg)
}

/// One reference point per sub-group, in sub-group id order.
pub fn reference_points(points: &[MappedPoint], clustering: &Clustering) -> Vec<ReferencePoint> {
    let mut out = Vec::with_capacity(clustering.subgroups.len());
    for sub in &clustering.subgroups {
        let Some((&first, rest)) = sub.members.split_first() else {
            continue;
        };
        let anchor = &points[first];
        let others: Vec<&MappedPoint> = rest.iter().map(|&i| &points[i]).collect();
        let mean_bearing_deg = subgroup_bearing(anchor, &others);
        out.push(ReferencePoint {
            position: anchor.origin,
            anchor_photo: anchor.photo.clone(),
            objet_id: anchor.objet_id.clone(),
            type_objet: anchor.type_objet.clone(),
            fonction_objet: anchor.fonction_objet.clone(),
            group_attr: sub.group_attr,
            subgroup_id: sub.id,
            anchor_bearing_deg: anchor.bearing_deg,
            mean_bearing_deg,
            member_count: sub.members.len(),
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{cluster_mapped_points, reference_points, subgroup_bearing};
    use crate::analysis::statistics::tests::bearing_difference;
    use crate::resolve::{MappedPoint, ObjectId};
    use foundation::math::{Vec2, bearing_to_math_rad};
    use pretty_assertions::assert_eq;

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    fn mapped(photo: &str, objet: Option<i64>, ty: &str, at: Vec2) -> MappedPoint {
        MappedPoint {
            observation: 0,
            photo: photo.to_string(),
            uuid: format!("{photo}-{}-{}", at.x, at.y),
            origin: Vec2::new(0.0, 0.0),
            point: at,
            bearing_deg: 90.0,
            type_objet: Some(ty.to_string()),
            fonction_objet: Some("entree".to_string()),
            legacy_id: None,
            objet_id: objet.map(ObjectId::Int),
        }
    }

    #[test]
    fn chains_form_a_single_subgroup() {
        // A-B and B-C are 1.0 apart; A-C sits on the threshold, which is
        // not adjacent on its own.
        let pts = vec![
            mapped("a", Some(1), "porte", Vec2::new(0.0, 0.0)),
            mapped("b", Some(1), "porte", Vec2::new(1.0, 0.0)),
            mapped("c", Some(1), "porte", Vec2::new(2.0, 0.0)),
        ];
        assert!(pts[0].point.distance(pts[2].point) >= 2.0);

        let c = cluster_mapped_points(&pts, 2.0);
        assert_eq!(c.group_count, 1);
        assert_eq!(c.subgroups.len(), 1);
        assert_eq!(c.subgroups[0].members, vec![0, 1, 2]);
        assert_eq!(c.assignments, vec![(0, 0), (0, 0), (0, 0)]);
    }

    #[test]
    fn distant_chain_members_three_apart_still_join() {
        let pts = vec![
            mapped("a", Some(1), "porte", Vec2::new(0.0, 0.0)),
            mapped("b", Some(1), "porte", Vec2::new(1.0, 0.0)),
            mapped("c", Some(1), "porte", Vec2::new(1.0, 1.0)),
            mapped("d", Some(1), "porte", Vec2::new(3.0, 1.0)),
        ];
        // a-d is 3.16 apart, linked through b and c.
        let c = cluster_mapped_points(&pts, 2.0);
        assert_eq!(c.subgroups.len(), 1);
    }

    #[test]
    fn semantic_groups_are_never_merged() {
        let pts = vec![
            mapped("a", Some(1), "porte", Vec2::new(0.0, 0.0)),
            mapped("b", Some(1), "fenetre", Vec2::new(0.5, 0.0)),
            mapped("c", Some(2), "porte", Vec2::new(0.0, 0.5)),
            mapped("d", None, "porte", Vec2::new(10.0, 0.0)),
            mapped("e", None, "porte", Vec2::new(10.5, 0.0)),
        ];
        let c = cluster_mapped_points(&pts, 2.0);
        assert_eq!(c.group_count, 4);
        assert_eq!(c.subgroups.len(), 4);
        assert_eq!(
            c.assignments,
            vec![(0, 0), (1, 1), (2, 2), (3, 3), (3, 3)]
        );
    }

    #[test]
    fn subgroup_ids_are_global_and_threshold_strict() {
        let pts = vec![
            mapped("a", Some(1), "porte", Vec2::new(0.0, 0.0)),
            mapped("b", Some(1), "porte", Vec2::new(2.0, 0.0)),
            mapped("c", Some(2), "porte", Vec2::new(0.0, 0.0)),
        ];
        let c = cluster_mapped_points(&pts, 2.0);
        assert_eq!(c.assignments, vec![(0, 0), (0, 1), (1, 2)]);
    }

    #[test]
    fn lone_anchor_keeps_its_bearing() {
        let mut a = mapped("a", Some(1), "porte", Vec2::new(5.0, 5.0));
        a.bearing_deg = 123.4;
        assert_eq!(subgroup_bearing(&a, &[]), 123.4);
    }

    #[test]
    fn mean_bearing_blends_anchor_and_member_directions() {
        // Anchor looks due east from the origin; the other view's point
        // lies due north of the anchor's photo.
        let anchor = mapped("a", Some(1), "porte", Vec2::new(10.0, 0.0));
        let other = mapped("b", Some(1), "porte", Vec2::new(0.0, 10.0));
        let mean = subgroup_bearing(&anchor, &[&other]);
        assert_close(mean, 45.0, 1e-9);

        // 10 and 350 average through north, not south.
        let mut wrap = mapped("a", Some(1), "porte", Vec2::new(0.0, 10.0));
        wrap.bearing_deg = 10.0;
        let at_350 = Vec2::from_angle(bearing_to_math_rad(350.0)).scale(10.0);
        let other = mapped("b", Some(1), "porte", at_350);
        let mean = subgroup_bearing(&wrap, &[&other]);
        assert!(bearing_difference(mean, 0.0) < 1e-9, "got {mean}");
    }

    #[test]
    fn reference_points_anchor_on_first_member_photo() {
        let mut pts = vec![
            mapped("a", Some(1), "porte", Vec2::new(10.0, 0.0)),
            mapped("b", Some(1), "porte", Vec2::new(10.5, 0.0)),
            mapped("c", Some(9), "porte", Vec2::new(50.0, 0.0)),
        ];
        pts[0].origin = Vec2::new(0.0, -3.0);
        pts[1].origin = Vec2::new(20.0, -3.0);

        let c = cluster_mapped_points(&pts, 2.0);
        let refs = reference_points(&pts, &c);
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].position, Vec2::new(0.0, -3.0));
        assert_eq!(refs[0].anchor_photo, "a");
        assert_eq!(refs[0].member_count, 2);
        assert_eq!(refs[0].subgroup_id, 0);
        assert_eq!(refs[1].objet_id, Some(ObjectId::Int(9)));
        assert_eq!(refs[1].mean_bearing_deg, 90.0);
    }
}
