//! Batched Scene Queries
//!
//! Convenience helpers that run many raycasts or overlap queries against a
//! world's broadphase in one call. With the `parallel` feature enabled the
//! batch fans out over Rayon; the simulation step itself stays
//! single-threaded either way — these helpers are for host-side queries
//! between steps.

use crate::body::BodyRef;
use crate::bvh::TraceHit;
use crate::error::PhysicsError;
use crate::math::Vec3;
use crate::queue::Queue;
use crate::solver::World;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// A single raycast request: origin plus full displacement (t in [0, 1]).
#[derive(Clone, Copy, Debug)]
pub struct RayQuery {
    /// Segment start
    pub origin: Vec3,
    /// Full displacement of the sweep
    pub dir: Vec3,
    /// Extents of the swept box (zero for a thin ray)
    pub size: Vec3,
}

/// Run every ray against the broadphase, returning per-ray hits sorted by
/// entry time.
pub fn batch_raycast(
    world: &World,
    rays: &[RayQuery],
) -> Result<Vec<Vec<TraceHit>>, PhysicsError> {
    let bvh = world.bvh();
    let capacity = bvh.slot_count() + 1;

    #[cfg(feature = "parallel")]
    {
        rays.par_iter()
            .map(|ray| {
                let mut queue = Queue::with_capacity(capacity);
                let mut hits = Vec::new();
                bvh.trace(&mut queue, ray.origin, ray.dir, ray.size, &mut hits)?;
                Ok(hits)
            })
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        let mut queue = Queue::with_capacity(capacity);
        rays.iter()
            .map(|ray| {
                let mut hits = Vec::new();
                bvh.trace(&mut queue, ray.origin, ray.dir, ray.size, &mut hits)?;
                Ok(hits)
            })
            .collect()
    }
}

/// Run every box overlap against the broadphase, returning per-box body
/// lists in traversal order.
pub fn batch_overlap(
    world: &World,
    boxes: &[(Vec3, Vec3)],
) -> Result<Vec<Vec<BodyRef>>, PhysicsError> {
    let bvh = world.bvh();
    let capacity = bvh.slot_count() + 1;

    #[cfg(feature = "parallel")]
    {
        boxes
            .par_iter()
            .map(|&(min, max)| {
                let mut queue = Queue::with_capacity(capacity);
                let mut out = Vec::new();
                bvh.query(&mut queue, min, max, &mut out)?;
                Ok(out)
            })
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        let mut queue = Queue::with_capacity(capacity);
        boxes
            .iter()
            .map(|&(min, max)| {
                let mut out = Vec::new();
                bvh.query(&mut queue, min, max, &mut out)?;
                Ok(out)
            })
            .collect()
    }
}
