//! Contacts and Sequential Impulses
//!
//! Each contact point carries three Jacobian rows: one normal row and two
//! friction rows over an orthonormal tangent basis. The solver sweeps every
//! contact per iteration, clamping the *accumulated* impulse rather than the
//! per-iteration delta — only the difference enters the velocity update, so
//! repeated sweeps converge instead of overshooting.
//!
//! The normal row's bias combines restitution against the pre-solve relative
//! normal velocity with Baumgarte positional stabilization `β·depth/dt`.
//! Friction rows are clamped to the Coulomb pyramid `±μ·λN` using the
//! current accumulated normal impulse.

use crate::body::{Body, BodyRef};
use crate::math::Vec3;

/// Approach speeds slower than this produce no restitution bounce.
const RESTITUTION_THRESHOLD: f32 = 1.0;

/// Penetration slop absorbed before Baumgarte correction kicks in.
const PENETRATION_SLOP: f32 = 0.005;

/// Row role inside a contact.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JacobianKind {
    /// Non-penetration row along the contact normal
    Normal,
    /// Friction row along a tangent direction
    Tangent,
}

/// One constraint row: linear and angular Jacobian blocks for both bodies,
/// the effective mass, bias, and the accumulated impulse.
#[derive(Clone, Copy, Debug)]
pub struct Jacobian {
    /// Linear block for body A
    pub lin_a: Vec3,
    /// Angular block for body A
    pub ang_a: Vec3,
    /// Linear block for body B
    pub lin_b: Vec3,
    /// Angular block for body B
    pub ang_b: Vec3,
    /// Inverse of `J · M⁻¹ · Jᵀ`
    pub effective_mass: f32,
    /// Velocity bias added to `J·v` before computing the impulse
    pub bias: f32,
    /// Accumulated impulse across iterations
    pub accumulated: f32,
    /// Row role
    pub kind: JacobianKind,
}

impl Jacobian {
    /// Build the row `[-u, -(rA×u), u, (rB×u)]` for direction `u`, with its
    /// effective mass against the two bodies' current mass state.
    fn new(a: &Body, b: &Body, r_a: Vec3, r_b: Vec3, u: Vec3, bias: f32, kind: JacobianKind) -> Self {
        let ra_x_u = r_a.cross(u);
        let rb_x_u = r_b.cross(u);

        let k = a.inv_mass
            + b.inv_mass
            + ra_x_u.dot(a.inv_inertia_world.mul_vec(ra_x_u))
            + rb_x_u.dot(b.inv_inertia_world.mul_vec(rb_x_u));
        let effective_mass = if k > 0.0 { 1.0 / k } else { 0.0 };

        Self {
            lin_a: -u,
            ang_a: -ra_x_u,
            lin_b: u,
            ang_b: rb_x_u,
            effective_mass,
            bias,
            accumulated: 0.0,
            kind,
        }
    }

    /// One sequential-impulse iteration: clamp the accumulated impulse into
    /// `[lo, hi]` and apply only the difference to the body velocities.
    fn solve(&mut self, a: &mut Body, b: &mut Body, lo: f32, hi: f32) {
        let jv = self.lin_a.dot(a.velocity)
            + self.ang_a.dot(a.angular_velocity)
            + self.lin_b.dot(b.velocity)
            + self.ang_b.dot(b.angular_velocity);

        let lambda = -(jv + self.bias) * self.effective_mass;
        let previous = self.accumulated;
        self.accumulated = (previous + lambda).clamp(lo, hi);
        let applied = self.accumulated - previous;

        a.velocity = a.velocity + self.lin_a * (a.inv_mass * applied);
        a.angular_velocity =
            a.angular_velocity + a.inv_inertia_world.mul_vec(self.ang_a * applied);
        b.velocity = b.velocity + self.lin_b * (b.inv_mass * applied);
        b.angular_velocity =
            b.angular_velocity + b.inv_inertia_world.mul_vec(self.ang_b * applied);
    }
}

/// A single contact point between two bodies: normal plus two friction rows.
#[derive(Clone, Debug)]
pub struct Contact {
    /// First body
    pub body_a: BodyRef,
    /// Second body
    pub body_b: BodyRef,
    /// Contact normal, from A toward B
    pub normal: Vec3,
    /// Offset from A's center to the contact point (world space)
    pub r_a: Vec3,
    /// Offset from B's center to the contact point (world space)
    pub r_b: Vec3,
    /// Combined friction coefficient
    pub friction: f32,
    /// Rows: normal first, then tangent and bitangent
    pub jacobians: [Jacobian; 3],
}

impl Contact {
    /// Build the three rows for a manifold point.
    ///
    /// `dt` scales the Baumgarte term: the bias is
    /// `e·dot(vRel, n) − β·depth/dt`, restitution applying only above an
    /// approach-speed threshold.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        a: &Body,
        b: &Body,
        body_a: BodyRef,
        body_b: BodyRef,
        point: Vec3,
        normal: Vec3,
        depth: f32,
        dt: f32,
    ) -> Self {
        let r_a = point - a.transform.position;
        let r_b = point - b.transform.position;

        let combined = a.material.combine(b.material);

        let v_rel = (b.velocity + b.angular_velocity.cross(r_b))
            - (a.velocity + a.angular_velocity.cross(r_a));
        let vn = v_rel.dot(normal);

        let restitution_bias = if vn < -RESTITUTION_THRESHOLD {
            combined.restitution * vn
        } else {
            0.0
        };
        let positional_bias = combined.baumgarte * (depth - PENETRATION_SLOP).max(0.0) / dt;
        let normal_bias = restitution_bias - positional_bias;

        let (tangent, bitangent) = tangent_basis(normal);

        Self {
            body_a,
            body_b,
            normal,
            r_a,
            r_b,
            friction: combined.friction,
            jacobians: [
                Jacobian::new(a, b, r_a, r_b, normal, normal_bias, JacobianKind::Normal),
                Jacobian::new(a, b, r_a, r_b, tangent, 0.0, JacobianKind::Tangent),
                Jacobian::new(a, b, r_a, r_b, bitangent, 0.0, JacobianKind::Tangent),
            ],
        }
    }

    /// One solver iteration over this contact's rows, normal first so the
    /// friction bounds see the freshest accumulated normal impulse.
    pub fn solve(&mut self, a: &mut Body, b: &mut Body) {
        self.jacobians[0].solve(a, b, 0.0, f32::INFINITY);

        let limit = self.friction * self.jacobians[0].accumulated;
        self.jacobians[1].solve(a, b, -limit, limit);
        self.jacobians[2].solve(a, b, -limit, limit);
    }

    /// Accumulated normal impulse (non-negative).
    #[inline]
    pub fn normal_impulse(&self) -> f32 {
        self.jacobians[0].accumulated
    }

    /// Accumulated friction impulses (tangent, bitangent).
    #[inline]
    pub fn friction_impulses(&self) -> (f32, f32) {
        (self.jacobians[1].accumulated, self.jacobians[2].accumulated)
    }
}

/// Orthonormal (tangent, bitangent) pair for a unit normal. Near-vertical
/// normals use the world X/Z axes directly.
pub fn tangent_basis(normal: Vec3) -> (Vec3, Vec3) {
    if normal.y.abs() > 0.99 {
        (Vec3::UNIT_X, Vec3::UNIT_Z)
    } else {
        let tangent = Vec3::new(normal.z, 0.0, -normal.x).normalize();
        let bitangent = tangent.cross(normal).normalize();
        (tangent, bitangent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hull::HullShape;
    use crate::math::CFrame;
    use std::sync::Arc;

    fn dynamic_body(at: Vec3) -> Body {
        Body::new_dynamic(
            Arc::new(HullShape::cuboid()),
            CFrame::from_position(at),
            Vec3::ONE,
            1.0,
        )
        .unwrap()
    }

    fn static_body(at: Vec3) -> Body {
        Body::new_static(
            Arc::new(HullShape::cuboid()),
            CFrame::from_position(at),
            Vec3::ONE,
        )
    }

    #[test]
    fn test_tangent_basis_orthonormal() {
        let normals = [
            Vec3::UNIT_Y,
            Vec3::UNIT_X,
            Vec3::new(0.3, 0.1, -0.9).normalize(),
        ];
        for n in normals {
            let (t, b) = tangent_basis(n);
            assert!((t.length() - 1.0).abs() < 1e-5);
            assert!((b.length() - 1.0).abs() < 1e-5);
            assert!(t.dot(n).abs() < 1e-5);
            assert!(b.dot(n).abs() < 1e-5);
            assert!(t.dot(b).abs() < 1e-5);
        }
    }

    #[test]
    fn test_normal_impulse_stops_approach() {
        // A dynamic cube falling onto a static floor cube.
        let mut floor = static_body(Vec3::ZERO);
        let mut cube = dynamic_body(Vec3::new(0.0, 0.95, 0.0));
        cube.velocity = Vec3::new(0.0, -0.5, 0.0);

        let mut contact = Contact::new(
            &floor,
            &cube,
            0,
            1,
            Vec3::new(0.0, 0.5, 0.0),
            Vec3::UNIT_Y,
            0.05,
            1.0 / 60.0,
        );

        for _ in 0..8 {
            contact.solve(&mut floor, &mut cube);
        }

        assert!(
            cube.velocity.y >= -1e-4,
            "solver should cancel the approach velocity, got {}",
            cube.velocity.y
        );
        assert!(contact.normal_impulse() > 0.0);
        // Static floor never moves
        assert_eq!(floor.velocity, Vec3::ZERO);
    }

    #[test]
    fn test_accumulated_impulse_never_negative() {
        let mut floor = static_body(Vec3::ZERO);
        // Separating body: no impulse should stick.
        let mut cube = dynamic_body(Vec3::new(0.0, 0.95, 0.0));
        cube.velocity = Vec3::new(0.0, 2.0, 0.0);

        let mut contact = Contact::new(
            &floor,
            &cube,
            0,
            1,
            Vec3::new(0.0, 0.5, 0.0),
            Vec3::UNIT_Y,
            0.0,
            1.0 / 60.0,
        );

        for _ in 0..8 {
            contact.solve(&mut floor, &mut cube);
            assert!(contact.normal_impulse() >= 0.0);
        }
        assert!(
            (cube.velocity.y - 2.0).abs() < 1e-4,
            "separating contact should apply nothing"
        );
    }

    #[test]
    fn test_friction_pyramid_bound() {
        let mut floor = static_body(Vec3::ZERO);
        let mut cube = dynamic_body(Vec3::new(0.0, 0.95, 0.0));
        cube.velocity = Vec3::new(3.0, -1.5, 0.0); // sliding and pressing

        let mut contact = Contact::new(
            &floor,
            &cube,
            0,
            1,
            Vec3::new(0.0, 0.5, 0.0),
            Vec3::UNIT_Y,
            0.02,
            1.0 / 60.0,
        );

        for _ in 0..10 {
            contact.solve(&mut floor, &mut cube);
            let (t, b) = contact.friction_impulses();
            let limit = contact.friction * contact.normal_impulse() + 1e-5;
            assert!(t.abs() <= limit, "tangent impulse inside the pyramid");
            assert!(b.abs() <= limit, "bitangent impulse inside the pyramid");
        }

        assert!(
            cube.velocity.x < 3.0,
            "friction should slow the sliding velocity"
        );
    }

    #[test]
    fn test_equal_and_opposite_impulses() {
        // Two dynamic cubes: total momentum must be conserved by the solve.
        let mut a = dynamic_body(Vec3::new(0.0, 0.0, 0.0));
        let mut b = dynamic_body(Vec3::new(0.0, 0.95, 0.0));
        a.velocity = Vec3::new(0.0, 1.0, 0.0);
        b.velocity = Vec3::new(0.0, -1.0, 0.0);

        let before = a.linear_momentum() + b.linear_momentum();

        let mut contact = Contact::new(
            &a,
            &b,
            0,
            1,
            Vec3::new(0.0, 0.475, 0.0),
            Vec3::UNIT_Y,
            0.05,
            1.0 / 60.0,
        );
        for _ in 0..8 {
            contact.solve(&mut a, &mut b);
        }

        let after = a.linear_momentum() + b.linear_momentum();
        assert!(
            (after - before).length() < 1e-4,
            "contact impulses must be equal and opposite"
        );
    }

    #[test]
    fn test_restitution_threshold() {
        let floor = static_body(Vec3::ZERO);

        // Slow approach: no bounce bias.
        let mut slow = dynamic_body(Vec3::new(0.0, 0.95, 0.0));
        slow.velocity = Vec3::new(0.0, -0.2, 0.0);
        let contact = Contact::new(
            &floor,
            &slow,
            0,
            1,
            Vec3::new(0.0, 0.5, 0.0),
            Vec3::UNIT_Y,
            0.0,
            1.0 / 60.0,
        );
        assert_eq!(contact.jacobians[0].bias, 0.0);

        // Fast approach: restitution bias kicks in (negative => bounce).
        let mut fast = dynamic_body(Vec3::new(0.0, 0.95, 0.0));
        fast.velocity = Vec3::new(0.0, -5.0, 0.0);
        let contact = Contact::new(
            &floor,
            &fast,
            0,
            1,
            Vec3::new(0.0, 0.5, 0.0),
            Vec3::UNIT_Y,
            0.0,
            1.0 / 60.0,
        );
        assert!(contact.jacobians[0].bias < 0.0);
    }
}
