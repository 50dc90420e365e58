//! Stacked Cubes Example
//!
//! Drops a stack of unit cubes onto a static floor and prints the stack
//! state once per simulated quarter second.
//!
//! ```bash
//! cargo run --example stacked_cubes
//! ```

use impulse_physics::{CFrame, HullShape, PhysicsConfig, Vec3, World};
use std::sync::Arc;

fn main() {
    let mut world = World::new(PhysicsConfig::default());
    let shape = Arc::new(HullShape::cuboid());

    // Static floor at y = 0.
    world.add_static_body(
        Arc::clone(&shape),
        CFrame::from_position(Vec3::new(0.0, -0.5, 0.0)),
        Vec3::new(100.0, 1.0, 100.0),
    );

    // Five unit cubes stacked along +Y with a small starting gap.
    let mut cubes = Vec::new();
    for i in 0..5 {
        let cube = world
            .add_dynamic_body(
                Arc::clone(&shape),
                CFrame::from_position(Vec3::new(0.0, 1.0 + 1.1 * i as f32, 0.0)),
                Vec3::ONE,
                1.0,
            )
            .expect("unit cube has valid inertia");
        cubes.push(cube);
    }

    println!("impulse-physics stacked cubes");
    println!("=============================");
    println!("bodies: {}", world.body_count());
    println!();

    let dt = 1.0 / 240.0;
    for step in 0..=960 {
        if step % 60 == 0 {
            let stats = world.last_step_stats();
            println!(
                "t = {:>4.2}s  pairs = {:>2}  contacts = {:>2}",
                step as f32 * dt,
                stats.pairs,
                stats.contacts
            );
            for (k, &cube) in cubes.iter().enumerate() {
                let body = world.body(cube).expect("cube is alive");
                println!(
                    "  cube {}: y = {:>6.3}  |v| = {:>6.3}",
                    k,
                    body.transform.position.y,
                    body.velocity.length()
                );
            }
        }
        world.step(dt, 8).expect("step");
    }

    println!();
    println!("done — the stack should be at rest near y = 0.5, 1.5, 2.5, ...");
}
