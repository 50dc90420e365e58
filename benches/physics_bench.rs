//! Benchmarks for the physics engine
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use impulse_physics::{
    Aabb, Bvh, CFrame, DeterministicRng, HullShape, PhysicsConfig, Queue, Vec3, World,
};
use std::sync::Arc;

// ============================================================================
// Physics step benchmarks
// ============================================================================

fn bench_physics_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("physics_step");

    group.bench_function("stack_of_10_cubes_60_steps", |b| {
        b.iter(|| {
            let mut world = World::new(PhysicsConfig::default());
            let shape = Arc::new(HullShape::cuboid());
            world.add_static_body(
                Arc::clone(&shape),
                CFrame::from_position(Vec3::new(0.0, -0.5, 0.0)),
                Vec3::new(100.0, 1.0, 100.0),
            );
            for i in 0..10 {
                world
                    .add_dynamic_body(
                        Arc::clone(&shape),
                        CFrame::from_position(Vec3::new(0.0, 0.5 + i as f32, 0.0)),
                        Vec3::ONE,
                        1.0,
                    )
                    .unwrap();
            }
            for _ in 0..60 {
                world.step(black_box(1.0 / 240.0), 8).unwrap();
            }
            world.body(1).unwrap().transform.position
        });
    });

    group.finish();
}

// ============================================================================
// Broadphase benchmarks
// ============================================================================

fn random_leaves(count: usize) -> Vec<(Aabb, usize)> {
    let mut rng = DeterministicRng::new(42);
    (0..count)
        .map(|i| {
            let center = rng.next_point(0.0, 100.0);
            let half = Vec3::splat(rng.next_range(0.2, 1.0));
            (Aabb::new(center - half, center + half), i)
        })
        .collect()
}

fn bench_bvh(c: &mut Criterion) {
    let mut group = c.benchmark_group("bvh");

    group.bench_function("bulk_build_4096", |b| {
        let leaves = random_leaves(4096);
        b.iter(|| {
            let mut bvh = Bvh::new();
            bvh.build(black_box(&leaves)).unwrap();
            bvh.slot_count()
        });
    });

    group.bench_function("bulk_build_and_prune_4096", |b| {
        let leaves = random_leaves(4096);
        b.iter(|| {
            let mut bvh = Bvh::new();
            bvh.build(black_box(&leaves)).unwrap();
            bvh.bonsai_prune();
            bvh.slot_count()
        });
    });

    group.bench_function("incremental_insert_4096", |b| {
        let leaves = random_leaves(4096);
        b.iter(|| {
            let mut bvh = Bvh::new();
            for &(aabb, payload) in &leaves {
                bvh.insert(black_box(aabb), payload, 0.5);
            }
            bvh.slot_count()
        });
    });

    group.bench_function("query_1000x_in_4096", |b| {
        let leaves = random_leaves(4096);
        let mut bvh = Bvh::new();
        bvh.build(&leaves).unwrap();
        bvh.bonsai_prune();
        let mut queue = Queue::with_capacity(bvh.slot_count() + 1);
        let mut rng = DeterministicRng::new(7);

        b.iter(|| {
            let mut total = 0;
            for _ in 0..1000 {
                let min = rng.next_point(0.0, 90.0);
                let max = min + Vec3::splat(10.0);
                let mut out = Vec::new();
                bvh.query(&mut queue, min, max, &mut out).unwrap();
                total += out.len();
            }
            total
        });
    });

    group.finish();
}

// ============================================================================
// Narrowphase benchmarks
// ============================================================================

fn bench_narrowphase(c: &mut Criterion) {
    use impulse_physics::{collide, is_colliding, Hull, Mat3};

    let mut group = c.benchmark_group("narrowphase");

    let shape = Arc::new(HullShape::cuboid());
    let a = Hull::new(Arc::clone(&shape), &CFrame::IDENTITY, Vec3::ONE);
    let rot = Mat3::from_axis_angle(Vec3::new(0.3, 0.8, 0.5).normalize(), 0.7);
    let b = Hull::new(
        Arc::clone(&shape),
        &CFrame::new(Vec3::new(0.8, 0.3, 0.2), rot),
        Vec3::ONE,
    );

    group.bench_function("gjk_boolean", |bch| {
        bch.iter(|| is_colliding(black_box(&a), black_box(&b), Vec3::UNIT_X));
    });

    group.bench_function("sat_manifold", |bch| {
        bch.iter(|| collide(black_box(&a), black_box(&b)).map(|m| m.points.len()));
    });

    group.finish();
}

criterion_group!(benches, bench_physics_step, bench_bvh, bench_narrowphase);
criterion_main!(benches);
