//! Rigid Bodies
//!
//! Kinematic and inertial state for static and dynamic bodies, mass property
//! computation for box-like hulls, and the system-properties helper that
//! aggregates several parts into one mass / centroid / inertia triple.
//!
//! Static bodies carry infinite mass (zero inverse mass, zero inverse
//! inertia) and are ignored by integration. Dynamic bodies derive mass from
//! volume × density and use the cube-inertia approximation
//! `I = m/12 · diag(y²+z², x²+z², x²+y²)`.

use std::sync::Arc;

use crate::error::PhysicsError;
use crate::hull::{Aabb, Hull, HullShape};
use crate::material::Material;
use crate::math::{CFrame, Mat3, Vec3};

/// Stable handle to a body inside a [`crate::solver::World`].
pub type BodyRef = usize;

/// Body kind: static geometry or simulated dynamic body.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum BodyKind {
    /// Infinite mass, never integrated
    Static = 0,
    /// Simulated mass, integrated every step
    Dynamic = 1,
}

/// A rigid body: shape instance plus kinematic and inertial state.
#[derive(Clone, Debug)]
pub struct Body {
    /// World-space hull instance (cache of the shape at the current transform)
    pub hull: Hull,
    /// World transform (written by integration, readable between steps)
    pub transform: CFrame,
    /// Per-axis scale applied to the shape's local vertices
    pub size: Vec3,
    /// Linear velocity
    pub velocity: Vec3,
    /// Angular velocity
    pub angular_velocity: Vec3,
    /// Accumulated external force, cleared after each step
    pub force: Vec3,
    /// Accumulated external torque, cleared after each step
    pub torque: Vec3,
    /// Mass (`f32::INFINITY` for static bodies)
    pub mass: f32,
    /// Inverse mass (0 for static bodies)
    pub inv_mass: f32,
    /// Local-space inertia tensor
    inertia_local: Mat3,
    /// Local-space inverse inertia tensor
    inv_inertia_local: Mat3,
    /// World-space inverse inertia tensor, updated from the rotation each step
    pub inv_inertia_world: Mat3,
    /// Surface coefficients (restitution, friction, Baumgarte β)
    pub material: Material,
    /// Seconds spent below the motion threshold. State only — no sleeping
    /// policy acts on it yet.
    pub sleep_timer: f32,
    /// Static or dynamic
    pub kind: BodyKind,
    /// Cached world AABB
    pub aabb: Aabb,
    /// BVH leaf slot owned by this body (0 = not inserted)
    pub(crate) proxy: u32,
}

impl Body {
    /// Create a static body. Infinite mass; velocities are ignored.
    pub fn new_static(shape: Arc<HullShape>, transform: CFrame, size: Vec3) -> Self {
        let hull = Hull::new(shape, &transform, size);
        let aabb = hull.aabb;
        Self {
            hull,
            transform,
            size,
            velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            force: Vec3::ZERO,
            torque: Vec3::ZERO,
            mass: f32::INFINITY,
            inv_mass: 0.0,
            inertia_local: Mat3::ZERO,
            inv_inertia_local: Mat3::ZERO,
            inv_inertia_world: Mat3::ZERO,
            material: Material::default(),
            sleep_timer: 0.0,
            kind: BodyKind::Static,
            aabb,
            proxy: 0,
        }
    }

    /// Create a dynamic body with mass from `volume × density`.
    ///
    /// Fails with [`PhysicsError::SingularMatrix`] when the size is so
    /// degenerate that the inertia tensor cannot be inverted.
    pub fn new_dynamic(
        shape: Arc<HullShape>,
        transform: CFrame,
        size: Vec3,
        density: f32,
    ) -> Result<Self, PhysicsError> {
        let volume = size.x * size.y * size.z;
        let mass = volume * density;

        let inertia_local = cube_inertia(mass, size);
        let inv_inertia_local = inertia_local.inverse()?;

        let hull = Hull::new(shape, &transform, size);
        let aabb = hull.aabb;
        let mut body = Self {
            hull,
            transform,
            size,
            velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            force: Vec3::ZERO,
            torque: Vec3::ZERO,
            mass,
            inv_mass: 1.0 / mass,
            inertia_local,
            inv_inertia_local,
            inv_inertia_world: Mat3::ZERO,
            material: Material::default(),
            sleep_timer: 0.0,
            kind: BodyKind::Dynamic,
            aabb,
            proxy: 0,
        };
        body.update_world_inertia();
        Ok(body)
    }

    /// Check if the body is static
    #[inline]
    pub fn is_static(&self) -> bool {
        self.kind == BodyKind::Static
    }

    /// Check if the body is dynamic
    #[inline]
    pub fn is_dynamic(&self) -> bool {
        self.kind == BodyKind::Dynamic
    }

    /// Linear momentum `m · v` (zero for static bodies)
    #[inline]
    pub fn linear_momentum(&self) -> Vec3 {
        match self.kind {
            BodyKind::Static => Vec3::ZERO,
            BodyKind::Dynamic => self.velocity * self.mass,
        }
    }

    /// Angular momentum `I_world · ω` (zero for static bodies)
    pub fn angular_momentum(&self) -> Vec3 {
        match self.kind {
            BodyKind::Static => Vec3::ZERO,
            BodyKind::Dynamic => {
                let r = self.transform.rotation;
                let inertia_world = r * self.inertia_local * r.transpose();
                inertia_world.mul_vec(self.angular_velocity)
            }
        }
    }

    /// Refresh the world-space inverse inertia from the current rotation:
    /// `I⁻¹_world = R · I⁻¹_local · Rᵀ`.
    pub fn update_world_inertia(&mut self) {
        let r = self.transform.rotation;
        self.inv_inertia_world = r * self.inv_inertia_local * r.transpose();
    }

    /// Recompute the hull cache and AABB after a transform change.
    pub fn update_hull(&mut self) {
        self.hull.update_transform(&self.transform, self.size);
        self.aabb = self.hull.aabb;
    }

    /// Apply an impulse at the center of mass.
    pub fn apply_impulse(&mut self, impulse: Vec3) {
        if self.is_dynamic() {
            self.velocity = self.velocity + impulse * self.inv_mass;
        }
    }

    /// Apply an impulse at a world-space point.
    pub fn apply_impulse_at(&mut self, impulse: Vec3, point: Vec3) {
        if self.is_dynamic() {
            self.velocity = self.velocity + impulse * self.inv_mass;
            let r = point - self.transform.position;
            self.angular_velocity =
                self.angular_velocity + self.inv_inertia_world.mul_vec(r.cross(impulse));
        }
    }

    /// Integrate external forces into tentative velocities.
    pub fn integrate_forces(&mut self, dt: f32, gravity: Vec3) {
        if !self.is_dynamic() {
            return;
        }
        self.velocity = self.velocity + (gravity + self.force * self.inv_mass) * dt;
        self.angular_velocity =
            self.angular_velocity + self.inv_inertia_world.mul_vec(self.torque) * dt;
    }

    /// Integrate velocities into the transform, then refresh cached state.
    pub fn integrate_velocities(&mut self, dt: f32) {
        if !self.is_dynamic() {
            return;
        }

        self.transform.position = self.transform.position + self.velocity * dt;

        let speed = self.angular_velocity.length();
        if speed > f32::EPSILON {
            let axis = self.angular_velocity / speed;
            let delta = Mat3::from_axis_angle(axis, speed * dt);
            self.transform.rotation = (delta * self.transform.rotation).orthonormalized();
        }

        self.update_world_inertia();
        self.update_hull();
    }

    /// Clear accumulated force and torque (end of step).
    #[inline]
    pub fn clear_forces(&mut self) {
        self.force = Vec3::ZERO;
        self.torque = Vec3::ZERO;
    }
}

/// Cube-inertia approximation: `I = m/12 · diag(y²+z², x²+z², x²+y²)`.
#[inline]
pub fn cube_inertia(mass: f32, size: Vec3) -> Mat3 {
    let f = mass / 12.0;
    Mat3::diagonal(
        f * (size.y * size.y + size.z * size.z),
        f * (size.x * size.x + size.z * size.z),
        f * (size.x * size.x + size.y * size.y),
    )
}

// ============================================================================
// System properties
// ============================================================================

/// One part of a composite: its mass, world center, and inertia about that
/// center.
#[derive(Clone, Copy, Debug)]
pub struct MassPart {
    /// Part mass
    pub mass: f32,
    /// Part center of mass
    pub center: Vec3,
    /// Inertia tensor about the part's own center
    pub inertia: Mat3,
}

/// Aggregate mass, centroid, and inertia of a composite.
#[derive(Clone, Copy, Debug)]
pub struct SystemProperties {
    /// Total mass
    pub mass: f32,
    /// Mass-weighted centroid
    pub centroid: Vec3,
    /// Inertia tensor about the centroid
    pub inertia: Mat3,
}

/// Compose parts into an aggregate via the parallel-axis theorem:
/// `I = Σ [ I_part + m·(‖r‖²·E − r⊗r) ]` with `r = center − centroid`.
pub fn system_properties(parts: &[MassPart]) -> SystemProperties {
    let mut mass = 0.0;
    let mut weighted = Vec3::ZERO;
    for p in parts {
        mass += p.mass;
        weighted = weighted + p.center * p.mass;
    }

    let centroid = if mass > 0.0 { weighted / mass } else { Vec3::ZERO };

    let mut inertia = Mat3::ZERO;
    for p in parts {
        let r = p.center - centroid;
        let shift = (Mat3::IDENTITY * r.length_squared() - Mat3::outer(r, r)) * p.mass;
        inertia = inertia + p.inertia + shift;
    }

    SystemProperties {
        mass,
        centroid,
        inertia,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube_shape() -> Arc<HullShape> {
        Arc::new(HullShape::cuboid())
    }

    #[test]
    fn test_static_body() {
        let body = Body::new_static(cube_shape(), CFrame::IDENTITY, Vec3::ONE);
        assert!(body.is_static());
        assert_eq!(body.inv_mass, 0.0);
        assert_eq!(body.inv_inertia_world, Mat3::ZERO);
        assert_eq!(body.linear_momentum(), Vec3::ZERO);
    }

    #[test]
    fn test_dynamic_body_mass_from_density() {
        let body = Body::new_dynamic(
            cube_shape(),
            CFrame::IDENTITY,
            Vec3::new(2.0, 1.0, 1.0),
            3.0,
        )
        .unwrap();
        // volume 2, density 3 -> mass 6
        assert!((body.mass - 6.0).abs() < 1e-6);
        assert!((body.inv_mass - 1.0 / 6.0).abs() < 1e-6);
    }

    #[test]
    fn test_cube_inertia_unit_cube() {
        let i = cube_inertia(12.0, Vec3::ONE);
        // m/12 * (1 + 1) = 2 on every axis
        assert!((i.col0.x - 2.0).abs() < 1e-6);
        assert!((i.col1.y - 2.0).abs() < 1e-6);
        assert!((i.col2.z - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_degenerate_size_rejected() {
        let result = Body::new_dynamic(cube_shape(), CFrame::IDENTITY, Vec3::splat(1e-4), 1.0);
        assert!(matches!(
            result,
            Err(PhysicsError::SingularMatrix { .. })
        ));
    }

    #[test]
    fn test_integrate_forces_gravity() {
        let mut body =
            Body::new_dynamic(cube_shape(), CFrame::IDENTITY, Vec3::ONE, 1.0).unwrap();
        body.integrate_forces(0.5, Vec3::new(0.0, -10.0, 0.0));
        assert!((body.velocity.y + 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_integrate_velocities_moves_hull() {
        let mut body =
            Body::new_dynamic(cube_shape(), CFrame::IDENTITY, Vec3::ONE, 1.0).unwrap();
        body.velocity = Vec3::new(1.0, 0.0, 0.0);
        body.integrate_velocities(1.0);
        assert!((body.transform.position.x - 1.0).abs() < 1e-6);
        assert!((body.aabb.center().x - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_apply_impulse_at_spins() {
        let mut body =
            Body::new_dynamic(cube_shape(), CFrame::IDENTITY, Vec3::ONE, 1.0).unwrap();
        // Impulse along +Y at a point offset along +X spins about +Z
        body.apply_impulse_at(Vec3::UNIT_Y, Vec3::new(0.5, 0.0, 0.0));
        assert!(body.angular_velocity.z > 0.0);
        assert!(body.velocity.y > 0.0);
    }

    #[test]
    fn test_system_properties_two_point_masses() {
        // Two equal point masses at x = ±1: centroid at origin,
        // Izz = 2 * m * r^2 = 2
        let parts = [
            MassPart {
                mass: 1.0,
                center: Vec3::new(1.0, 0.0, 0.0),
                inertia: Mat3::ZERO,
            },
            MassPart {
                mass: 1.0,
                center: Vec3::new(-1.0, 0.0, 0.0),
                inertia: Mat3::ZERO,
            },
        ];
        let sys = system_properties(&parts);
        assert!((sys.mass - 2.0).abs() < 1e-6);
        assert!(sys.centroid.length() < 1e-6);
        assert!((sys.inertia.col2.z - 2.0).abs() < 1e-5);
        // No inertia about the axis through both masses
        assert!(sys.inertia.col0.x.abs() < 1e-5);
    }
}
