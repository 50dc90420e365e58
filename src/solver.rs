//! Physics World and Step Pipeline
//!
//! Owns the bodies, the broadphase BVH, and the traversal queue, and runs
//! the simulation step:
//!
//! 1. Integrate external forces into tentative velocities
//! 2. Refit moved bodies' fat AABBs in the BVH
//! 3. Broadphase range queries collect candidate pairs
//! 4. Narrowphase (GJK reject, then SAT clipping) builds manifolds
//! 5. Contact Jacobians are assembled per manifold point
//! 6. Sequential-impulse sweeps run for the caller-chosen iteration count
//! 7. Velocities integrate into transforms; hull caches refresh
//!
//! A step is synchronous and single-threaded; ordering over contacts and
//! BVH children is fixed, so replays on one architecture reproduce exactly.
//! Per-step failures abort the step with an error.

use std::sync::Arc;

use crate::body::{Body, BodyKind, BodyRef};
use crate::bvh::{Bvh, TraceHit, AABB_PADDING};
use crate::contact::Contact;
use crate::error::PhysicsError;
use crate::gjk;
use crate::hull::HullShape;
use crate::math::{CFrame, Vec3};
use crate::narrowphase;
use crate::profiling::{PhysicsProfiler, StepStats};
use crate::queue::Queue;

/// World-level tuning knobs.
#[derive(Clone, Copy, Debug)]
pub struct PhysicsConfig {
    /// Gravitational acceleration applied to dynamic bodies
    pub gravity: Vec3,
    /// Fat-AABB padding for dynamic BVH leaves
    pub aabb_padding: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -196.2, 0.0),
            aabb_padding: AABB_PADDING,
        }
    }
}

/// The engine instance: bodies, broadphase, and the step pipeline.
pub struct World {
    /// Tuning knobs, readable and writable between steps
    pub config: PhysicsConfig,
    bodies: Vec<Option<Body>>,
    free_bodies: Vec<usize>,
    bvh: Bvh,
    queue: Queue<u32>,
    contacts: Vec<Contact>,
    scratch_hits: Vec<usize>,
    profiler: PhysicsProfiler,
}

impl World {
    /// Create an empty world.
    pub fn new(config: PhysicsConfig) -> Self {
        Self {
            config,
            bodies: Vec::new(),
            free_bodies: Vec::new(),
            bvh: Bvh::new(),
            queue: Queue::with_capacity(256),
            contacts: Vec::new(),
            scratch_hits: Vec::new(),
            profiler: PhysicsProfiler::new(),
        }
    }

    // ========================================================================
    // Body management
    // ========================================================================

    /// Register a static body.
    pub fn add_static_body(
        &mut self,
        shape: Arc<HullShape>,
        transform: CFrame,
        size: Vec3,
    ) -> BodyRef {
        let body = Body::new_static(shape, transform, size);
        self.insert_body(body)
    }

    /// Register a dynamic body with mass from `volume × density`.
    pub fn add_dynamic_body(
        &mut self,
        shape: Arc<HullShape>,
        transform: CFrame,
        size: Vec3,
        density: f32,
    ) -> Result<BodyRef, PhysicsError> {
        let body = Body::new_dynamic(shape, transform, size, density)?;
        Ok(self.insert_body(body))
    }

    fn insert_body(&mut self, mut body: Body) -> BodyRef {
        let index = match self.free_bodies.pop() {
            Some(slot) => slot,
            None => {
                self.bodies.push(None);
                self.bodies.len() - 1
            }
        };

        // Static geometry keeps a tight leaf; only movers get the pad.
        let pad = match body.kind {
            BodyKind::Static => 0.0,
            BodyKind::Dynamic => self.config.aabb_padding,
        };
        body.proxy = self.bvh.insert(body.aabb, index, pad);
        self.bodies[index] = Some(body);
        index
    }

    /// Unregister a body and free its BVH leaf.
    pub fn remove_body(&mut self, body: BodyRef) -> Result<(), PhysicsError> {
        let slot = self
            .bodies
            .get_mut(body)
            .and_then(Option::take)
            .ok_or(PhysicsError::InvalidBodyIndex {
                index: body,
                count: self.bodies.len(),
            })?;
        self.bvh.remove(slot.proxy);
        self.free_bodies.push(body);
        Ok(())
    }

    /// Shared access to a body.
    #[inline]
    pub fn body(&self, body: BodyRef) -> Option<&Body> {
        self.bodies.get(body).and_then(Option::as_ref)
    }

    /// Mutable access to a body between steps. A caller that rewrites the
    /// transform should also call [`Body::update_hull`] so cached world data
    /// stays coherent.
    #[inline]
    pub fn body_mut(&mut self, body: BodyRef) -> Option<&mut Body> {
        self.bodies.get_mut(body).and_then(Option::as_mut)
    }

    /// Number of live bodies.
    pub fn body_count(&self) -> usize {
        self.bodies.iter().filter(|b| b.is_some()).count()
    }

    /// Iterate live bodies as `(handle, body)`.
    pub fn bodies(&self) -> impl Iterator<Item = (BodyRef, &Body)> {
        self.bodies
            .iter()
            .enumerate()
            .filter_map(|(i, b)| b.as_ref().map(|body| (i, body)))
    }

    /// Contacts produced by the most recent step (transient solver state,
    /// useful for debug drawing and tests).
    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    /// Counters from the most recent step.
    pub fn last_step_stats(&self) -> StepStats {
        self.profiler.last
    }

    /// Accumulated profiling counters.
    pub fn profiler(&self) -> &PhysicsProfiler {
        &self.profiler
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Bodies entered by sweeping a box of extents `size` from `origin`
    /// along the displacement `dir` (t in [0, 1]), nearest first.
    pub fn raycast(
        &mut self,
        origin: Vec3,
        dir: Vec3,
        size: Vec3,
    ) -> Result<Vec<BodyRef>, PhysicsError> {
        Ok(self
            .raycast_hits(origin, dir, size)?
            .into_iter()
            .map(|hit| hit.payload)
            .collect())
    }

    /// Like [`World::raycast`] but with entry parameters.
    pub fn raycast_hits(
        &mut self,
        origin: Vec3,
        dir: Vec3,
        size: Vec3,
    ) -> Result<Vec<TraceHit>, PhysicsError> {
        self.reserve_queue();
        let mut hits = Vec::new();
        self.bvh.trace(&mut self.queue, origin, dir, size, &mut hits)?;
        Ok(hits)
    }

    /// Bodies whose (fat) AABB overlaps the box `[min, max]`.
    pub fn overlap_box(&mut self, min: Vec3, max: Vec3) -> Result<Vec<BodyRef>, PhysicsError> {
        self.reserve_queue();
        let mut out = Vec::new();
        self.bvh.query(&mut self.queue, min, max, &mut out)?;
        Ok(out)
    }

    /// Rebuild the broadphase from scratch: binned-SAH bulk build over every
    /// live body followed by the bonsai prune. Useful after loading a scene.
    pub fn rebuild_broadphase(&mut self) -> Result<(), PhysicsError> {
        let mut leaves = Vec::new();
        for (index, body) in self.bodies.iter().enumerate() {
            let Some(body) = body else { continue };
            let aabb = match body.kind {
                BodyKind::Static => body.aabb,
                BodyKind::Dynamic => body.aabb.expanded(self.config.aabb_padding),
            };
            leaves.push((aabb, index));
        }
        if leaves.is_empty() {
            self.bvh.clear();
            return Ok(());
        }

        self.bvh.build(&leaves)?;
        self.bvh.bonsai_prune();

        // Re-point each body at its new leaf slot.
        let mut mapping = Vec::new();
        self.bvh.for_each_leaf(|slot, payload| mapping.push((slot, payload)));
        for (slot, payload) in mapping {
            if let Some(body) = self.bodies[payload].as_mut() {
                body.proxy = slot;
            }
        }
        Ok(())
    }

    // ========================================================================
    // Stepping
    // ========================================================================

    /// Advance the simulation by `dt` seconds with the given number of
    /// solver iterations (typically 4-10).
    pub fn step(&mut self, dt: f32, solver_iterations: usize) -> Result<(), PhysicsError> {
        if dt <= 0.0 {
            return Ok(());
        }

        let mut stats = StepStats::default();

        // 1. External forces -> tentative velocities.
        let gravity = self.config.gravity;
        for body in self.bodies.iter_mut().flatten() {
            body.integrate_forces(dt, gravity);
        }

        // 2. Refit moved leaves.
        let pad = self.config.aabb_padding;
        for body in self.bodies.iter_mut().flatten() {
            if body.kind == BodyKind::Dynamic && self.bvh.update(body.proxy, body.aabb, pad) {
                stats.reinserted_leaves += 1;
            }
        }

        // 3 + 4 + 5. Broadphase pairs -> manifolds -> contacts.
        self.reserve_queue();
        self.contacts.clear();

        for index in 0..self.bodies.len() {
            let Some(body) = self.bodies[index].as_ref() else {
                continue;
            };
            if body.kind != BodyKind::Dynamic {
                continue;
            }

            self.scratch_hits.clear();
            self.bvh.query(
                &mut self.queue,
                body.aabb.min,
                body.aabb.max,
                &mut self.scratch_hits,
            )?;

            for hit_index in 0..self.scratch_hits.len() {
                let other = self.scratch_hits[hit_index];
                if other == index {
                    continue;
                }
                let Some(other_body) = self.bodies[other].as_ref() else {
                    continue;
                };
                // Dynamic pairs are visited once, from the lower index.
                if other_body.kind == BodyKind::Dynamic && other < index {
                    continue;
                }
                stats.pairs += 1;

                let body = self.bodies[index].as_ref().ok_or(
                    PhysicsError::InvalidBodyIndex {
                        index,
                        count: self.bodies.len(),
                    },
                )?;

                let seed = other_body.hull.centroid() - body.hull.centroid();
                if !gjk::is_colliding(&body.hull, &other_body.hull, seed) {
                    continue;
                }

                let Some(manifold) = narrowphase::collide(&body.hull, &other_body.hull) else {
                    continue;
                };
                stats.manifolds += 1;

                for point in &manifold.points {
                    self.contacts.push(Contact::new(
                        body,
                        other_body,
                        index,
                        other,
                        point.position,
                        manifold.normal,
                        point.depth,
                        dt,
                    ));
                    stats.contacts += 1;
                }
            }
        }

        // 6. Sequential-impulse sweeps, normal row first inside each contact.
        for _ in 0..solver_iterations {
            stats.solver_iterations += 1;
            for contact in &mut self.contacts {
                let Some((a, b)) = split_pair(&mut self.bodies, contact.body_a, contact.body_b)
                else {
                    continue;
                };
                contact.solve(a, b);
            }
        }

        // 7. Velocities -> positions; refresh hulls and world inertia.
        for body in self.bodies.iter_mut().flatten() {
            body.integrate_velocities(dt);
            body.clear_forces();
        }

        self.profiler.record(stats);
        Ok(())
    }

    /// Broadphase tree access for debug drawing.
    pub(crate) fn bvh(&self) -> &Bvh {
        &self.bvh
    }

    /// Grow the traversal queue to cover the whole slab.
    fn reserve_queue(&mut self) {
        let needed = self.bvh.slot_count() + 1;
        if self.queue.capacity() < needed {
            self.queue = Queue::with_capacity(needed);
        }
    }
}

/// Disjoint mutable borrows of two live bodies.
fn split_pair(
    bodies: &mut [Option<Body>],
    a: usize,
    b: usize,
) -> Option<(&mut Body, &mut Body)> {
    if a == b || a >= bodies.len() || b >= bodies.len() {
        return None;
    }
    if a < b {
        let (left, right) = bodies.split_at_mut(b);
        match (left[a].as_mut(), right[0].as_mut()) {
            (Some(x), Some(y)) => Some((x, y)),
            _ => None,
        }
    } else {
        let (left, right) = bodies.split_at_mut(a);
        match (right[0].as_mut(), left[b].as_mut()) {
            (Some(x), Some(y)) => Some((x, y)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube_shape() -> Arc<HullShape> {
        Arc::new(HullShape::cuboid())
    }

    fn floor_world() -> (World, BodyRef) {
        let mut world = World::new(PhysicsConfig::default());
        let floor = world.add_static_body(
            cube_shape(),
            CFrame::from_position(Vec3::new(0.0, -0.5, 0.0)),
            Vec3::new(100.0, 1.0, 100.0),
        );
        (world, floor)
    }

    #[test]
    fn test_free_fall() {
        let mut world = World::new(PhysicsConfig::default());
        let body = world
            .add_dynamic_body(
                cube_shape(),
                CFrame::from_position(Vec3::new(0.0, 100.0, 0.0)),
                Vec3::ONE,
                1.0,
            )
            .unwrap();

        let dt = 1.0 / 240.0;
        for _ in 0..240 {
            world.step(dt, 4).unwrap();
        }

        let y = world.body(body).unwrap().transform.position.y;
        // After 1s of free fall at g = 196.2: y ≈ 100 - 98.1
        assert!(y < 5.0, "body should have fallen, y = {y}");
        assert!(y > -5.0, "fall distance should be about g/2, y = {y}");
    }

    #[test]
    fn test_cube_rests_on_floor() {
        let (mut world, _floor) = floor_world();
        let cube = world
            .add_dynamic_body(
                cube_shape(),
                CFrame::from_position(Vec3::new(0.0, 3.0, 0.0)),
                Vec3::ONE,
                1.0,
            )
            .unwrap();

        let dt = 1.0 / 240.0;
        for _ in 0..480 {
            world.step(dt, 8).unwrap();
        }

        let body = world.body(cube).unwrap();
        assert!(
            (body.transform.position.y - 0.5).abs() < 0.1,
            "cube should rest on the floor at y ≈ 0.5, got {}",
            body.transform.position.y
        );
        assert!(
            body.velocity.length() < 0.5,
            "resting cube should be nearly still, |v| = {}",
            body.velocity.length()
        );
    }

    #[test]
    fn test_momentum_conserved_without_external_force() {
        let config = PhysicsConfig {
            gravity: Vec3::ZERO,
            ..Default::default()
        };
        let mut world = World::new(config);

        let a = world
            .add_dynamic_body(
                cube_shape(),
                CFrame::from_position(Vec3::new(-2.0, 0.0, 0.0)),
                Vec3::ONE,
                1.0,
            )
            .unwrap();
        let b = world
            .add_dynamic_body(
                cube_shape(),
                CFrame::from_position(Vec3::new(2.0, 0.0, 0.0)),
                Vec3::ONE,
                1.0,
            )
            .unwrap();

        world.body_mut(a).unwrap().velocity = Vec3::new(3.0, 0.0, 0.0);
        world.body_mut(b).unwrap().velocity = Vec3::new(-3.0, 0.0, 0.0);

        let before = world.body(a).unwrap().linear_momentum()
            + world.body(b).unwrap().linear_momentum();

        let dt = 1.0 / 240.0;
        for _ in 0..240 {
            world.step(dt, 8).unwrap();
        }

        let after = world.body(a).unwrap().linear_momentum()
            + world.body(b).unwrap().linear_momentum();
        assert!(
            (after - before).length() < 1e-2,
            "collision should conserve momentum: {:?} -> {:?}",
            before,
            after
        );
    }

    #[test]
    fn test_overlap_box_query() {
        let (mut world, floor) = floor_world();
        let cube = world
            .add_dynamic_body(
                cube_shape(),
                CFrame::from_position(Vec3::new(0.0, 20.0, 0.0)),
                Vec3::ONE,
                1.0,
            )
            .unwrap();

        let hits = world
            .overlap_box(Vec3::new(-1.0, 18.0, -1.0), Vec3::new(1.0, 22.0, 1.0))
            .unwrap();
        assert!(hits.contains(&cube));
        assert!(!hits.contains(&floor));
    }

    #[test]
    fn test_raycast_floor() {
        let (mut world, floor) = floor_world();

        let hits = world
            .raycast_hits(Vec3::new(0.0, 10.0, 0.0), Vec3::new(0.0, -20.0, 0.0), Vec3::ZERO)
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].payload, floor);
        assert!((hits[0].t - 0.5).abs() < 1e-5, "t = {}", hits[0].t);
    }

    #[test]
    fn test_remove_body() {
        let (mut world, _floor) = floor_world();
        let cube = world
            .add_dynamic_body(
                cube_shape(),
                CFrame::from_position(Vec3::new(0.0, 5.0, 0.0)),
                Vec3::ONE,
                1.0,
            )
            .unwrap();

        assert_eq!(world.body_count(), 2);
        world.remove_body(cube).unwrap();
        assert_eq!(world.body_count(), 1);
        assert!(world.body(cube).is_none());
        assert!(matches!(
            world.remove_body(cube),
            Err(PhysicsError::InvalidBodyIndex { .. })
        ));

        // The freed slot is reused.
        let again = world
            .add_dynamic_body(
                cube_shape(),
                CFrame::from_position(Vec3::new(0.0, 5.0, 0.0)),
                Vec3::ONE,
                1.0,
            )
            .unwrap();
        assert_eq!(again, cube);
    }

    #[test]
    fn test_rebuild_broadphase_preserves_queries() {
        let (mut world, floor) = floor_world();
        for i in 0..20 {
            world
                .add_dynamic_body(
                    cube_shape(),
                    CFrame::from_position(Vec3::new(i as f32 * 3.0, 10.0, 0.0)),
                    Vec3::ONE,
                    1.0,
                )
                .unwrap();
        }

        world.rebuild_broadphase().unwrap();

        let hits = world
            .raycast_hits(Vec3::new(0.0, 50.0, 0.0), Vec3::new(0.0, -100.0, 0.0), Vec3::ZERO)
            .unwrap();
        assert_eq!(hits[0].payload, 1, "nearest body first");
        assert!(hits.iter().any(|h| h.payload == floor));

        // Stepping after a rebuild must keep working (proxies re-pointed).
        world.step(1.0 / 240.0, 4).unwrap();
    }

    #[test]
    fn test_step_stats_populated() {
        let (mut world, _floor) = floor_world();
        world
            .add_dynamic_body(
                cube_shape(),
                CFrame::from_position(Vec3::new(0.0, 0.45, 0.0)),
                Vec3::ONE,
                1.0,
            )
            .unwrap();

        world.step(1.0 / 240.0, 4).unwrap();
        let stats = world.last_step_stats();
        assert!(stats.pairs >= 1);
        assert!(stats.manifolds >= 1);
        assert!(stats.contacts >= 1);
        assert_eq!(stats.solver_iterations, 4);
    }
}
