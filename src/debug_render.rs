//! Debug Visualization
//!
//! Wireframe emission for hulls, contacts, and the broadphase tree. All
//! output flows through a caller-supplied [`DebugSink`] — the engine holds no
//! global drawing state, so hosts can route primitives to any backend (or
//! several at once).

use crate::bvh::NodeFlag;
use crate::hull::Aabb;
use crate::math::Vec3;
use crate::solver::World;

/// RGBA color for debug rendering (0-255 per channel)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DebugColor {
    /// Red channel
    pub r: u8,
    /// Green channel
    pub g: u8,
    /// Blue channel
    pub b: u8,
    /// Alpha channel
    pub a: u8,
}

impl DebugColor {
    /// Create a new color
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Red
    pub const RED: Self = Self::new(255, 50, 50, 255);
    /// Green
    pub const GREEN: Self = Self::new(50, 255, 50, 255);
    /// Blue
    pub const BLUE: Self = Self::new(50, 50, 255, 255);
    /// Yellow
    pub const YELLOW: Self = Self::new(255, 255, 50, 255);
    /// White
    pub const WHITE: Self = Self::new(255, 255, 255, 255);
    /// Gray
    pub const GRAY: Self = Self::new(128, 128, 128, 255);
}

/// Receiver for debug primitives. Implemented by the host's renderer.
pub trait DebugSink {
    /// Emit a world-space line segment
    fn line(&mut self, start: Vec3, end: Vec3, color: DebugColor);

    /// Emit a world-space point marker
    fn point(&mut self, position: Vec3, color: DebugColor);
}

/// A sink that just records primitives; handy in tests and for batching.
#[derive(Clone, Debug, Default)]
pub struct DebugBuffer {
    /// Recorded lines as (start, end, color)
    pub lines: Vec<(Vec3, Vec3, DebugColor)>,
    /// Recorded points as (position, color)
    pub points: Vec<(Vec3, DebugColor)>,
}

impl DebugSink for DebugBuffer {
    fn line(&mut self, start: Vec3, end: Vec3, color: DebugColor) {
        self.lines.push((start, end, color));
    }

    fn point(&mut self, position: Vec3, color: DebugColor) {
        self.points.push((position, color));
    }
}

/// Draw every body's hull wireframe (edges of the world-space hull).
pub fn draw_hulls<S: DebugSink>(world: &World, sink: &mut S) {
    for (_, body) in world.bodies() {
        let color = if body.is_static() {
            DebugColor::GRAY
        } else {
            DebugColor::WHITE
        };
        for i in 0..body.hull.shape.edges.len() {
            let (a, b) = body.hull.query_edge(i);
            sink.line(a, b, color);
        }
    }
}

/// Draw the most recent step's contact points and normals.
pub fn draw_contacts<S: DebugSink>(world: &World, sink: &mut S) {
    for contact in world.contacts() {
        let Some(body) = world.body(contact.body_a) else {
            continue;
        };
        let point = body.transform.position + contact.r_a;
        sink.point(point, DebugColor::RED);
        sink.line(point, point + contact.normal * 0.5, DebugColor::YELLOW);
    }
}

/// Draw the broadphase tree: leaf boxes green, branch boxes blue.
pub fn draw_bvh<S: DebugSink>(world: &World, sink: &mut S) {
    world.bvh().for_each_node(|node| {
        let color = match node.flag {
            NodeFlag::Leaf => DebugColor::GREEN,
            _ => DebugColor::BLUE,
        };
        draw_aabb(&node.aabb, color, sink);
    });
}

/// Emit the 12 edges of an AABB.
pub fn draw_aabb<S: DebugSink>(aabb: &Aabb, color: DebugColor, sink: &mut S) {
    let (lo, hi) = (aabb.min, aabb.max);
    let corners = [
        Vec3::new(lo.x, lo.y, lo.z),
        Vec3::new(hi.x, lo.y, lo.z),
        Vec3::new(hi.x, hi.y, lo.z),
        Vec3::new(lo.x, hi.y, lo.z),
        Vec3::new(lo.x, lo.y, hi.z),
        Vec3::new(hi.x, lo.y, hi.z),
        Vec3::new(hi.x, hi.y, hi.z),
        Vec3::new(lo.x, hi.y, hi.z),
    ];
    const EDGES: [(usize, usize); 12] = [
        (0, 1),
        (1, 2),
        (2, 3),
        (3, 0),
        (4, 5),
        (5, 6),
        (6, 7),
        (7, 4),
        (0, 4),
        (1, 5),
        (2, 6),
        (3, 7),
    ];
    for (a, b) in EDGES {
        sink.line(corners[a], corners[b], color);
    }
}

/// Convenience: hulls, contacts, and the BVH in one call.
pub fn draw_world<S: DebugSink>(world: &World, sink: &mut S) {
    draw_hulls(world, sink);
    draw_contacts(world, sink);
    draw_bvh(world, sink);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hull::HullShape;
    use crate::math::CFrame;
    use crate::solver::PhysicsConfig;
    use std::sync::Arc;

    fn small_world() -> World {
        let mut world = World::new(PhysicsConfig::default());
        world.add_static_body(
            Arc::new(HullShape::cuboid()),
            CFrame::from_position(Vec3::new(0.0, -0.5, 0.0)),
            Vec3::new(10.0, 1.0, 10.0),
        );
        world
            .add_dynamic_body(
                Arc::new(HullShape::cuboid()),
                CFrame::from_position(Vec3::new(0.0, 0.45, 0.0)),
                Vec3::ONE,
                1.0,
            )
            .unwrap();
        world
    }

    #[test]
    fn test_draw_hulls_emits_edges() {
        let world = small_world();
        let mut buffer = DebugBuffer::default();
        draw_hulls(&world, &mut buffer);
        // Two cuboids, 12 edges each
        assert_eq!(buffer.lines.len(), 24);
    }

    #[test]
    fn test_draw_contacts_after_step() {
        let mut world = small_world();
        world.step(1.0 / 240.0, 4).unwrap();

        let mut buffer = DebugBuffer::default();
        draw_contacts(&world, &mut buffer);
        assert!(
            !buffer.points.is_empty(),
            "penetrating bodies should produce contact markers"
        );
        assert_eq!(buffer.points.len(), buffer.lines.len());
    }

    #[test]
    fn test_draw_aabb_edge_count() {
        let mut buffer = DebugBuffer::default();
        draw_aabb(
            &Aabb::new(Vec3::ZERO, Vec3::ONE),
            DebugColor::GREEN,
            &mut buffer,
        );
        assert_eq!(buffer.lines.len(), 12);
    }

    #[test]
    fn test_draw_world_covers_bvh() {
        let world = small_world();
        let mut buffer = DebugBuffer::default();
        draw_world(&world, &mut buffer);
        // 24 hull edges + at least 3 nodes * 12 box edges
        assert!(buffer.lines.len() >= 24 + 36);
    }
}
