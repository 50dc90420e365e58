#![no_main]
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use impulse_physics::{CFrame, HullShape, PhysicsConfig, Vec3, World};
use std::sync::Arc;

#[derive(Debug, Arbitrary)]
struct StepInput {
    /// Number of bodies to add (capped)
    body_count: u8,
    /// Position components (i16 to keep values reasonable)
    positions: Vec<(i16, i16, i16)>,
    /// Density numerators (> 0 after clamping)
    densities: Vec<u8>,
    /// Number of simulation steps (capped)
    step_count: u8,
}

// Fuzz the full pipeline: add random bodies, step, and require every body
// to stay finite. Must never panic regardless of input.
fuzz_target!(|input: StepInput| {
    let mut world = World::new(PhysicsConfig::default());
    let shape = Arc::new(HullShape::cuboid());

    // Static floor so the pile has something to land on.
    world.add_static_body(
        Arc::clone(&shape),
        CFrame::from_position(Vec3::new(0.0, -0.5, 0.0)),
        Vec3::new(200.0, 1.0, 200.0),
    );

    let body_count = (input.body_count as usize).min(12);
    for i in 0..body_count {
        let (px, py, pz) = input.positions.get(i).copied().unwrap_or((0, 10, 0));
        let density = input.densities.get(i).copied().unwrap_or(1).max(1);

        let _ = world.add_dynamic_body(
            Arc::clone(&shape),
            CFrame::from_position(Vec3::new(px as f32 * 0.1, py as f32 * 0.1, pz as f32 * 0.1)),
            Vec3::ONE,
            density as f32,
        );
    }

    let steps = (input.step_count as usize).min(32);
    for _ in 0..steps {
        if world.step(1.0 / 120.0, 4).is_err() {
            return;
        }
    }

    for (_, body) in world.bodies() {
        assert!(body.transform.position.is_finite());
        assert!(body.velocity.is_finite());
    }
});
