//! SAT Narrowphase and Manifold Generation
//!
//! Separating-axis testing over hull face normals and Gauss-map-pruned edge
//! pairs, followed by Sutherland-Hodgman clipping to build a contact manifold
//! of at most four points.
//!
//! # Pipeline
//!
//! 1. Face axes of A against B, face axes of B against A
//! 2. Edge-pair axes (cross products of edge directions)
//! 3. Any positive separation → no contact
//! 4. Axis selection with face bias: the face contact wins unless the edge
//!    axis is strictly deeper than both face axes — near-equal separations
//!    would otherwise flicker between features frame to frame
//!
//! An empty clip result means no contact for the pair; it is not an error.

use crate::hull::Hull;
use crate::math::Vec3;
use std::collections::HashSet;

/// Signed separations above this are treated as disjoint.
const SEPARATION_EPSILON: f32 = 1e-4;

/// Tolerance for the inside test while clipping.
const CLIP_EPSILON: f32 = 1e-5;

/// Quantization scale for manifold point dedup.
const DEDUP_SCALE: f32 = 10000.0;

/// Maximum points in a reduced manifold.
pub const MAX_MANIFOLD_POINTS: usize = 4;

/// Which feature pair produced a manifold.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeatureKind {
    /// Reference-face clip
    Face,
    /// Closest points between two edges
    Edge,
}

/// One contact point of a manifold.
#[derive(Clone, Copy, Debug)]
pub struct ManifoldPoint {
    /// World-space contact position
    pub position: Vec3,
    /// Penetration depth along the manifold normal (non-negative)
    pub depth: f32,
}

/// Contact manifold between two convex hulls: a shared normal (pointing from
/// the first hull toward the second) and up to four contact points.
#[derive(Clone, Debug)]
pub struct Manifold {
    /// Contact normal, oriented from hull A toward hull B
    pub normal: Vec3,
    /// Contact points (1 to 4)
    pub points: Vec<ManifoldPoint>,
    /// Feature pair that generated this manifold
    pub kind: FeatureKind,
}

/// Full SAT contact test between two hulls.
///
/// Returns `None` when a separating axis exists or clipping yields no
/// points.
pub fn collide(a: &Hull, b: &Hull) -> Option<Manifold> {
    let (face_a, dist_a) = a.query_face_directions(b);
    if dist_a > SEPARATION_EPSILON {
        return None;
    }

    let (face_b, dist_b) = b.query_face_directions(a);
    if dist_b > SEPARATION_EPSILON {
        return None;
    }

    let edge_query = a.query_edge_directions(b);
    if edge_query.separation > SEPARATION_EPSILON {
        return None;
    }

    // Face bias: prefer face contacts when separations are comparable.
    if dist_a >= edge_query.separation || dist_b >= edge_query.separation {
        face_contact(a, face_a, dist_a, b, face_b, dist_b)
    } else {
        edge_contact(a, b, &edge_query)
    }
}

// ============================================================================
// Face contact
// ============================================================================

/// Build a face manifold by clipping in both directions and merging.
fn face_contact(
    a: &Hull,
    face_a: usize,
    dist_a: f32,
    b: &Hull,
    face_b: usize,
    dist_b: f32,
) -> Option<Manifold> {
    // The shallower face axis defines the manifold normal, oriented A -> B.
    let normal = if dist_a >= dist_b {
        a.world_normals[face_a]
    } else {
        -b.world_normals[face_b]
    };

    let mut points = clip_reference_face(a, face_a, b);
    points.extend(clip_reference_face(b, face_b, a));

    let points = reduce_manifold(points, normal);
    if points.is_empty() {
        return None;
    }

    Some(Manifold {
        normal,
        points,
        kind: FeatureKind::Face,
    })
}

/// Clip the reference face's world polygon against the side planes of the
/// other hull surrounding its incident face, keeping the points that
/// penetrate the incident plane.
fn clip_reference_face(reference: &Hull, ref_face: usize, other: &Hull) -> Vec<ManifoldPoint> {
    let (ref_normal, _) = reference.face_plane(ref_face);
    let incident = incident_face(other, ref_normal);

    let mut polygon = reference.face_polygon(ref_face);
    for side in side_faces(other, incident) {
        if polygon.is_empty() {
            break;
        }
        let (n, w) = other.face_plane(side);
        polygon = clip_polygon(&polygon, n, w);
    }

    let (inc_normal, inc_offset) = other.face_plane(incident);
    polygon
        .into_iter()
        .filter_map(|p| {
            let depth = inc_offset - inc_normal.dot(p);
            if depth >= -CLIP_EPSILON {
                Some(ManifoldPoint {
                    position: p,
                    depth: depth.max(0.0),
                })
            } else {
                None
            }
        })
        .collect()
}

/// The face of `hull` most anti-parallel to `normal`.
fn incident_face(hull: &Hull, normal: Vec3) -> usize {
    let mut best = 0;
    let mut best_dot = f32::INFINITY;
    for (i, &n) in hull.world_normals.iter().enumerate() {
        let d = n.dot(normal);
        if d < best_dot {
            best_dot = d;
            best = i;
        }
    }
    best
}

/// Faces sharing an edge with `face`.
fn side_faces(hull: &Hull, face: usize) -> Vec<usize> {
    let face = face as u32;
    let mut sides = Vec::new();
    for e in &hull.shape.edges {
        if e.f0 == face {
            sides.push(e.f1 as usize);
        } else if e.f1 == face {
            sides.push(e.f0 as usize);
        }
    }
    sides
}

/// Sutherland-Hodgman clip of a 3D polygon against the half-space
/// `dot(n, p) <= w`. Edge-plane crossings are interpolated parametrically:
/// `t = (w - vkd) / (vjd - vkd)`.
fn clip_polygon(polygon: &[Vec3], n: Vec3, w: f32) -> Vec<Vec3> {
    let mut out = Vec::with_capacity(polygon.len() + 2);

    for k in 0..polygon.len() {
        let vk = polygon[k];
        let vj = polygon[(k + 1) % polygon.len()];
        let vkd = n.dot(vk);
        let vjd = n.dot(vj);
        let k_inside = vkd <= w + CLIP_EPSILON;
        let j_inside = vjd <= w + CLIP_EPSILON;

        if k_inside {
            out.push(vk);
        }
        if k_inside != j_inside {
            let denom = vjd - vkd;
            if denom.abs() > f32::EPSILON {
                let t = ((w - vkd) / denom).clamp(0.0, 1.0);
                out.push(vk + (vj - vk) * t);
            }
        }
    }

    out
}

// ============================================================================
// Manifold reduction
// ============================================================================

/// Reduce a clipped point set to at most four points, then merge points that
/// quantize to the same lattice cell.
///
/// Selection: keep the last point, the point farthest from it, and the two
/// points with extremal signed triangle area against that base pair. The
/// result is stable under winding.
fn reduce_manifold(mut points: Vec<ManifoldPoint>, normal: Vec3) -> Vec<ManifoldPoint> {
    if points.len() > MAX_MANIFOLD_POINTS {
        let a = points[points.len() - 1];

        let b = points
            .iter()
            .copied()
            .max_by(|p, q| {
                let dp = (p.position - a.position).length_squared();
                let dq = (q.position - a.position).length_squared();
                dp.total_cmp(&dq)
            })
            .unwrap_or(a);

        let signed_area = |p: &ManifoldPoint| {
            (b.position - a.position)
                .cross(p.position - a.position)
                .dot(normal)
        };

        let c = points
            .iter()
            .copied()
            .max_by(|p, q| signed_area(p).total_cmp(&signed_area(q)))
            .unwrap_or(a);
        let d = points
            .iter()
            .copied()
            .min_by(|p, q| signed_area(p).total_cmp(&signed_area(q)))
            .unwrap_or(a);

        points = vec![a, b, c, d];
    }

    // Quantized dedup: points collapsing to the same lattice cell merge.
    let mut seen: HashSet<(i64, i64, i64)> = HashSet::with_capacity(points.len());
    points.retain(|p| seen.insert(quantize(p.position)));
    points
}

/// Quantize a position to the ×10000 integer lattice.
#[inline]
fn quantize(v: Vec3) -> (i64, i64, i64) {
    (
        (v.x * DEDUP_SCALE).floor() as i64,
        (v.y * DEDUP_SCALE).floor() as i64,
        (v.z * DEDUP_SCALE).floor() as i64,
    )
}

// ============================================================================
// Edge contact
// ============================================================================

/// Single-point manifold at the closest points between the two witness edges.
fn edge_contact(a: &Hull, b: &Hull, query: &crate::hull::EdgeQuery) -> Option<Manifold> {
    let (p1, p2) = a.query_edge(query.edge_a);
    let (q1, q2) = b.query_edge(query.edge_b);

    let (on_a, on_b) = closest_points_on_segments(p1, p2, q1, q2);

    Some(Manifold {
        normal: query.axis,
        points: vec![ManifoldPoint {
            position: (on_a + on_b) * 0.5,
            depth: (-query.separation).max(0.0),
        }],
        kind: FeatureKind::Edge,
    })
}

/// Closest points between segments `a->b` and `c->d` via the standard pair
/// of cross products, with both parameters clamped to the segments.
pub fn closest_points_on_segments(a: Vec3, b: Vec3, c: Vec3, d: Vec3) -> (Vec3, Vec3) {
    let ab = b - a;
    let cd = d - c;
    let ac = a - c;

    let ab_x_cd = ab.cross(cd);
    let cd_x_ab = cd.cross(ab);

    let denom1 = ab_x_cd.length_squared();
    let t1 = if denom1 > f32::EPSILON {
        (-(ac.cross(cd)).dot(ab_x_cd) / denom1).clamp(0.0, 1.0)
    } else {
        0.0 // Parallel segments: endpoint is as good as any
    };

    let denom2 = cd_x_ab.length_squared();
    let t2 = if denom2 > f32::EPSILON {
        ((ac.cross(ab)).dot(cd_x_ab) / denom2).clamp(0.0, 1.0)
    } else {
        0.0
    };

    (a + ab * t1, c + cd * t2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hull::HullShape;
    use crate::math::{CFrame, Mat3};
    use std::sync::Arc;

    fn cube(transform: CFrame) -> Hull {
        Hull::new(Arc::new(HullShape::cuboid()), &transform, Vec3::ONE)
    }

    fn cube_at(x: f32, y: f32, z: f32) -> Hull {
        cube(CFrame::from_position(Vec3::new(x, y, z)))
    }

    #[test]
    fn test_separated_cubes_no_manifold() {
        let a = cube_at(0.0, 0.0, 0.0);
        let b = cube_at(2.0, 0.0, 0.0);
        assert!(collide(&a, &b).is_none());
    }

    #[test]
    fn test_face_contact_overlapping_cubes() {
        let a = cube_at(0.0, 0.0, 0.0);
        let b = cube_at(0.9, 0.0, 0.0);
        let manifold = collide(&a, &b).expect("overlapping cubes must touch");

        assert_eq!(manifold.kind, FeatureKind::Face);
        assert!(manifold.points.len() <= MAX_MANIFOLD_POINTS);
        assert!(!manifold.points.is_empty());
        // Normal should be ±X from A toward B
        assert!(
            manifold.normal.x > 0.9,
            "normal should point from A to B, got {:?}",
            manifold.normal
        );
        // Depth is the 0.1 overlap
        for p in &manifold.points {
            assert!((p.depth - 0.1).abs() < 1e-3, "depth ~0.1, got {}", p.depth);
        }
    }

    #[test]
    fn test_stacked_cubes_four_point_manifold() {
        let a = cube_at(0.0, 0.0, 0.0);
        let b = cube_at(0.0, 0.95, 0.0);
        let manifold = collide(&a, &b).expect("stacked cubes must touch");

        assert_eq!(manifold.kind, FeatureKind::Face);
        assert_eq!(
            manifold.points.len(),
            4,
            "coplanar square overlap should keep a 4-point manifold"
        );
        assert!(manifold.normal.y > 0.9);
    }

    #[test]
    fn test_edge_contact_crossing_edges() {
        // A rotated 45° about X exposes its top edge along X; B rotated 45°
        // about Z exposes its bottom edge along Z. The edges cross slightly
        // penetrating — the canonical edge-edge contact.
        let rot_x = Mat3::from_axis_angle(Vec3::UNIT_X, core::f32::consts::FRAC_PI_4);
        let a = cube(CFrame::new(Vec3::ZERO, rot_x));
        let rot_z = Mat3::from_axis_angle(Vec3::UNIT_Z, core::f32::consts::FRAC_PI_4);
        let b = cube(CFrame::new(Vec3::new(0.0, 1.41, 0.0), rot_z));

        let manifold = collide(&a, &b).expect("crossing edges should touch");
        assert_eq!(manifold.kind, FeatureKind::Edge);
        assert_eq!(manifold.points.len(), 1);

        let p = manifold.points[0].position;
        assert!(
            p.x.abs() < 0.05 && (p.y - 0.705).abs() < 0.05 && p.z.abs() < 0.05,
            "edge contact near (0, 0.705, 0), got {:?}",
            p
        );
        assert!(
            manifold.normal.y > 0.99,
            "contact normal should point A -> B along +Y, got {:?}",
            manifold.normal
        );
    }

    #[test]
    fn test_clip_polygon_square_against_half_space() {
        let square = vec![
            Vec3::new(-1.0, 0.0, -1.0),
            Vec3::new(1.0, 0.0, -1.0),
            Vec3::new(1.0, 0.0, 1.0),
            Vec3::new(-1.0, 0.0, 1.0),
        ];
        // Keep x <= 0
        let clipped = clip_polygon(&square, Vec3::UNIT_X, 0.0);
        assert_eq!(clipped.len(), 4);
        for p in clipped {
            assert!(p.x <= 1e-5);
        }
    }

    #[test]
    fn test_clip_polygon_fully_outside() {
        let tri = vec![
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::new(3.0, 0.0, 0.0),
            Vec3::new(2.5, 1.0, 0.0),
        ];
        let clipped = clip_polygon(&tri, Vec3::UNIT_X, 1.0);
        assert!(clipped.is_empty());
    }

    #[test]
    fn test_reduce_manifold_caps_at_four() {
        // Octagon of contact points in the XZ plane
        let mut points = Vec::new();
        for i in 0..8 {
            let angle = i as f32 * core::f32::consts::TAU / 8.0;
            points.push(ManifoldPoint {
                position: Vec3::new(angle.cos(), 0.0, angle.sin()),
                depth: 0.05,
            });
        }
        let reduced = reduce_manifold(points, Vec3::UNIT_Y);
        assert!(reduced.len() <= MAX_MANIFOLD_POINTS);
        assert!(reduced.len() >= 3, "a spread octagon should keep a spread");
    }

    #[test]
    fn test_reduce_manifold_dedups_coincident() {
        let p = ManifoldPoint {
            position: Vec3::new(0.123456, 1.0, -2.0),
            depth: 0.01,
        };
        let reduced = reduce_manifold(vec![p, p, p], Vec3::UNIT_Y);
        assert_eq!(reduced.len(), 1);
    }

    #[test]
    fn test_closest_points_crossing_segments() {
        // Skew segments along X and Z, one unit apart in Y
        let (on_a, on_b) = closest_points_on_segments(
            Vec3::new(-1.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, -1.0),
            Vec3::new(0.0, 1.0, 1.0),
        );
        assert!((on_a - Vec3::ZERO).length() < 1e-5);
        assert!((on_b - Vec3::UNIT_Y).length() < 1e-5);
    }

    #[test]
    fn test_closest_points_clamped_to_segment_ends() {
        let (on_a, _) = closest_points_on_segments(
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(5.0, 1.0, 0.0),
            Vec3::new(6.0, 1.0, 0.0),
        );
        assert!((on_a - Vec3::new(1.0, 0.0, 0.0)).length() < 1e-5);
    }
}
