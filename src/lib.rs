//! Rigid-Body Physics for Convex Polyhedra
//!
//! A compact real-time physics engine: dynamic bodies collide with each
//! other and with static geometry under gravity, contacts resolve through a
//! sequential-impulse solver, and collision queries accelerate through a
//! dynamic bounding-volume hierarchy.
//!
//! # Features
//!
//! - **Broadphase BVH**: slab-allocated dynamic AABB tree with fat leaves,
//!   binned-SAH bulk build, bonsai re-pruning, sibling-swap rotations, and
//!   queue-driven range/ray traversals
//! - **Narrowphase**: GJK boolean overlap plus face/edge SAT with
//!   Sutherland-Hodgman clipping, producing manifolds of at most four points
//! - **Solver**: per-contact normal and friction Jacobians iterated with
//!   accumulated-impulse clamping, Baumgarte stabilization, and a Coulomb
//!   friction pyramid
//!
//! The engine is single-threaded and non-suspending: a step is one
//! synchronous pass, and iteration order is fixed so identical inputs replay
//! identically on one architecture. The optional `parallel` feature adds
//! Rayon-backed *batch query* helpers only — stepping never spawns threads.
//!
//! # Example
//!
//! ```rust
//! use impulse_physics::prelude::*;
//! use std::sync::Arc;
//!
//! let mut world = World::new(PhysicsConfig::default());
//! let shape = Arc::new(HullShape::cuboid());
//!
//! // A broad static floor and a falling unit cube.
//! world.add_static_body(
//!     Arc::clone(&shape),
//!     CFrame::from_position(Vec3::new(0.0, -0.5, 0.0)),
//!     Vec3::new(100.0, 1.0, 100.0),
//! );
//! let cube = world
//!     .add_dynamic_body(
//!         shape,
//!         CFrame::from_position(Vec3::new(0.0, 5.0, 0.0)),
//!         Vec3::ONE,
//!         1.0,
//!     )
//!     .unwrap();
//!
//! for _ in 0..240 {
//!     world.step(1.0 / 240.0, 8).unwrap();
//! }
//!
//! let body = world.body(cube).unwrap();
//! assert!(body.transform.position.y < 5.0, "the cube fell");
//! ```
//!
//! # Modules
//!
//! - [`math`]: `Vec3`, `Mat3`, and the `CFrame` affine frame
//! - [`hull`]: convex polyhedron shapes and world-space hull instances
//! - [`body`]: static/dynamic rigid bodies and mass properties
//! - [`queue`]: the reusable ring-buffer FIFO behind BVH traversals
//! - [`bvh`] / [`bvh_build`]: the broadphase tree and its bulk builder
//! - [`gjk`]: boolean overlap and closest-simplex queries
//! - [`narrowphase`]: SAT testing and contact-manifold clipping
//! - [`contact`]: Jacobian rows and the sequential-impulse iteration
//! - [`solver`]: the `World` and its step pipeline
//! - [`query`]: batched raycast/overlap helpers (Rayon under `parallel`)
//! - [`material`]: restitution / friction / Baumgarte coefficients
//! - [`debug_render`]: wireframe emission through a caller-supplied sink
//! - [`profiling`]: deterministic per-step counters
//! - [`rng`]: PCG generator for reproducible test scenes
//! - [`error`]: the unified error type

#![warn(missing_docs)]

pub mod body;
pub mod bvh;
pub mod bvh_build;
pub mod contact;
pub mod debug_render;
pub mod error;
pub mod gjk;
pub mod hull;
pub mod material;
pub mod math;
pub mod narrowphase;
pub mod profiling;
pub mod query;
pub mod queue;
pub mod rng;
pub mod solver;

// Re-export commonly used types
pub use body::{cube_inertia, system_properties, Body, BodyKind, BodyRef, MassPart, SystemProperties};
pub use bvh::{Bvh, BvhNode, NodeFlag, TraceHit, AABB_PADDING, NIL};
pub use contact::{tangent_basis, Contact, Jacobian, JacobianKind};
pub use debug_render::{draw_world, DebugBuffer, DebugColor, DebugSink};
pub use error::PhysicsError;
pub use gjk::{closest_simplex, is_colliding, Support};
pub use hull::{Aabb, Edge, EdgeQuery, Face, Hull, HullShape};
pub use material::Material;
pub use math::{CFrame, Mat3, Vec3};
pub use narrowphase::{collide, FeatureKind, Manifold, ManifoldPoint, MAX_MANIFOLD_POINTS};
pub use profiling::{PhysicsProfiler, StepStats};
pub use query::{batch_overlap, batch_raycast, RayQuery};
pub use queue::Queue;
pub use rng::DeterministicRng;
pub use solver::{PhysicsConfig, World};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::body::{Body, BodyKind, BodyRef};
    pub use crate::bvh::{Bvh, TraceHit};
    pub use crate::contact::Contact;
    pub use crate::debug_render::{DebugBuffer, DebugColor, DebugSink};
    pub use crate::error::PhysicsError;
    pub use crate::hull::{Aabb, Hull, HullShape};
    pub use crate::material::Material;
    pub use crate::math::{CFrame, Mat3, Vec3};
    pub use crate::narrowphase::{FeatureKind, Manifold};
    pub use crate::profiling::StepStats;
    pub use crate::solver::{PhysicsConfig, World};
}

#[cfg(test)]
mod compile_smoke_tests {
    //! Verify that core types from the prelude and key modules are
    //! accessible. These tests catch accidental breakage of public
    //! re-exports.

    use super::prelude::*;

    #[test]
    fn test_prelude_types_accessible() {
        let _ = Vec3::ZERO;
        let _ = Mat3::IDENTITY;
        let _ = CFrame::IDENTITY;
        let _ = PhysicsConfig::default();
        let _ = Material::default();
        let _ = StepStats::default();
    }

    #[test]
    fn test_error_type_accessible() {
        let e = PhysicsError::InvalidBodyIndex { index: 0, count: 0 };
        let _ = format!("{}", e);
    }

    #[test]
    fn test_world_constructible() {
        let world = World::new(PhysicsConfig::default());
        assert_eq!(world.body_count(), 0);
    }
}
