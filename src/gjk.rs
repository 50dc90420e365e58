//! GJK Boolean Overlap
//!
//! Gilbert-Johnson-Keerthi intersection test over Minkowski-difference
//! support points, with Casey Muratori's early-out: a new support point that
//! fails to pass the origin along the search direction proves separation.
//!
//! The simplex update walks the point / line / triangle / tetrahedron cases;
//! the iteration is bounded at eight refinements. [`closest_simplex`] runs
//! the same loop but keeps the search biased toward the origin and returns
//! the terminal simplex for manifold bootstrapping.

use crate::hull::Hull;
use crate::math::Vec3;

/// Progress threshold for the support-point early-out.
const GJK_EPSILON: f32 = 1e-6;

/// Maximum simplex refinements per query.
const MAX_REFINEMENTS: usize = 8;

/// Support-point provider for GJK queries.
pub trait Support {
    /// The point of the shape farthest along `direction`.
    fn support(&self, direction: Vec3) -> Vec3;
}

impl Support for Hull {
    #[inline]
    fn support(&self, direction: Vec3) -> Vec3 {
        Hull::support(self, direction)
    }
}

/// Minkowski difference support: `a.support(d) - b.support(-d)`.
#[inline]
fn minkowski_support<A: Support, B: Support>(a: &A, b: &B, direction: Vec3) -> Vec3 {
    a.support(direction) - b.support(-direction)
}

/// Simplex of up to 4 points; index 0 is always the newest point.
#[derive(Clone, Copy, Debug)]
struct Simplex {
    points: [Vec3; 4],
    size: usize,
}

impl Simplex {
    fn new() -> Self {
        Self {
            points: [Vec3::ZERO; 4],
            size: 0,
        }
    }

    fn push(&mut self, point: Vec3) {
        for i in (1..4).rev() {
            self.points[i] = self.points[i - 1];
        }
        self.points[0] = point;
        self.size = (self.size + 1).min(4);
    }

    fn set(&mut self, points: &[Vec3]) {
        for (i, &p) in points.iter().enumerate().take(4) {
            self.points[i] = p;
        }
        self.size = points.len().min(4);
    }
}

/// Boolean overlap test between two convex shapes.
///
/// `seed_dir` primes the first support direction; the vector between the
/// body centers is a good seed. Returns `true` when the shapes overlap.
pub fn is_colliding<A: Support, B: Support>(a: &A, b: &B, seed_dir: Vec3) -> bool {
    let mut direction = if seed_dir.length_squared() > GJK_EPSILON {
        seed_dir
    } else {
        Vec3::UNIT_X
    };

    let mut simplex = Simplex::new();
    simplex.push(minkowski_support(a, b, direction));
    direction = -simplex.points[0];

    for _ in 0..MAX_REFINEMENTS {
        if direction.length_squared() <= GJK_EPSILON {
            // Origin lies on the current simplex feature.
            return true;
        }

        let point = minkowski_support(a, b, direction);
        if point.dot(direction) <= GJK_EPSILON {
            // The support point never reached the origin: separated.
            return false;
        }

        simplex.push(point);
        if refine_simplex(&mut simplex, &mut direction) {
            return true;
        }
    }

    false
}

/// Run the GJK loop biased toward the origin and return the terminal simplex
/// together with the last search direction. Used to bootstrap manifold
/// generation when a deepest-feature guess is needed.
pub fn closest_simplex<A: Support, B: Support>(
    a: &A,
    b: &B,
    seed_dir: Vec3,
) -> (Vec<Vec3>, Vec3) {
    let mut direction = if seed_dir.length_squared() > GJK_EPSILON {
        seed_dir
    } else {
        Vec3::UNIT_X
    };

    let mut simplex = Simplex::new();
    simplex.push(minkowski_support(a, b, direction));
    direction = -simplex.points[0];

    for _ in 0..MAX_REFINEMENTS {
        if direction.length_squared() <= GJK_EPSILON {
            break;
        }

        let point = minkowski_support(a, b, direction);
        // No progress toward the origin: the current simplex is closest.
        if point.dot(direction) - simplex.points[0].dot(direction) <= GJK_EPSILON {
            break;
        }

        simplex.push(point);
        if refine_simplex(&mut simplex, &mut direction) {
            break;
        }
    }

    (simplex.points[..simplex.size].to_vec(), direction)
}

/// Update the simplex toward the origin. Returns true when the origin is
/// enclosed.
fn refine_simplex(simplex: &mut Simplex, direction: &mut Vec3) -> bool {
    match simplex.size {
        2 => refine_line(simplex, direction),
        3 => refine_triangle(simplex, direction),
        4 => refine_tetrahedron(simplex, direction),
        _ => {
            *direction = -simplex.points[0];
            false
        }
    }
}

fn refine_line(simplex: &mut Simplex, direction: &mut Vec3) -> bool {
    let a = simplex.points[0];
    let b = simplex.points[1];
    let ab = b - a;
    let ao = -a;

    if ab.dot(ao) > 0.0 {
        // Origin is beside the segment.
        *direction = ab.cross(ao).cross(ab);
    } else {
        // Origin is behind the newest point.
        simplex.set(&[a]);
        *direction = ao;
    }

    false
}

fn refine_triangle(simplex: &mut Simplex, direction: &mut Vec3) -> bool {
    let a = simplex.points[0];
    let b = simplex.points[1];
    let c = simplex.points[2];

    let ab = b - a;
    let ac = c - a;
    let ao = -a;
    let abc = ab.cross(ac);

    if abc.cross(ac).dot(ao) > 0.0 {
        if ac.dot(ao) > 0.0 {
            // Edge AC's Voronoi region.
            simplex.set(&[a, c]);
            *direction = ac.cross(ao).cross(ac);
        } else {
            simplex.set(&[a, b]);
            return refine_line(simplex, direction);
        }
    } else if ab.cross(abc).dot(ao) > 0.0 {
        // Edge AB's Voronoi region.
        simplex.set(&[a, b]);
        return refine_line(simplex, direction);
    } else if abc.dot(ao) > 0.0 {
        // Above the triangle face.
        *direction = abc;
    } else {
        // Below: flip the winding so the face keeps pointing at the origin.
        simplex.set(&[a, c, b]);
        *direction = -abc;
    }

    false
}

fn refine_tetrahedron(simplex: &mut Simplex, direction: &mut Vec3) -> bool {
    let a = simplex.points[0];
    let b = simplex.points[1];
    let c = simplex.points[2];
    let d = simplex.points[3];

    let ab = b - a;
    let ac = c - a;
    let ad = d - a;
    let ao = -a;

    let abc = ab.cross(ac);
    let acd = ac.cross(ad);
    let adb = ad.cross(ab);

    // Drop the vertex opposite each outward face the origin is in front of.
    if abc.dot(ao) > 0.0 {
        simplex.set(&[a, b, c]);
        return refine_triangle(simplex, direction);
    }
    if acd.dot(ao) > 0.0 {
        simplex.set(&[a, c, d]);
        return refine_triangle(simplex, direction);
    }
    if adb.dot(ao) > 0.0 {
        simplex.set(&[a, d, b]);
        return refine_triangle(simplex, direction);
    }

    // No face separates the origin: it is enclosed.
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hull::HullShape;
    use crate::math::CFrame;
    use std::sync::Arc;

    fn unit_cube_at(x: f32, y: f32, z: f32) -> Hull {
        Hull::new(
            Arc::new(HullShape::cuboid()),
            &CFrame::from_position(Vec3::new(x, y, z)),
            Vec3::ONE,
        )
    }

    fn seed(a: &Hull, b: &Hull) -> Vec3 {
        b.centroid() - a.centroid()
    }

    #[test]
    fn test_overlapping_cubes() {
        let a = unit_cube_at(0.0, 0.0, 0.0);
        let b = unit_cube_at(0.9, 0.0, 0.0);
        assert!(is_colliding(&a, &b, seed(&a, &b)));
    }

    #[test]
    fn test_separated_cubes() {
        let a = unit_cube_at(0.0, 0.0, 0.0);
        let b = unit_cube_at(1.1, 0.0, 0.0);
        assert!(!is_colliding(&a, &b, seed(&a, &b)));
    }

    #[test]
    fn test_diagonal_separation() {
        let a = unit_cube_at(0.0, 0.0, 0.0);
        let b = unit_cube_at(0.8, 0.8, 0.8);
        assert!(!is_colliding(&a, &b, seed(&a, &b)));

        let c = unit_cube_at(0.6, 0.6, 0.6);
        assert!(is_colliding(&a, &c, seed(&a, &c)));
    }

    #[test]
    fn test_zero_seed_falls_back() {
        let a = unit_cube_at(0.0, 0.0, 0.0);
        let b = unit_cube_at(0.5, 0.0, 0.0);
        assert!(is_colliding(&a, &b, Vec3::ZERO));
    }

    #[test]
    fn test_closest_simplex_separated() {
        let a = unit_cube_at(0.0, 0.0, 0.0);
        let b = unit_cube_at(3.0, 0.0, 0.0);
        let (points, _dir) = closest_simplex(&a, &b, seed(&a, &b));
        assert!(!points.is_empty());
        // Every simplex point lies on the Minkowski difference, at least
        // 2 units from the origin (gap is 2 along x).
        for p in points {
            assert!(p.length() >= 2.0 - 1e-4);
        }
    }
}
