//! Physics core benchmarks (criterion - wall-clock time).
//!
//! Run all:    cargo bench --manifest-path benchmarks/Cargo.toml --bench physics
//! Filter:     cargo bench --manifest-path benchmarks/Cargo.toml --bench physics -- narrowphase

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::Vec2;
use rein2d::block_allocator::BlockAllocator;
use rein2d::collision::{collide_polygons, distance, DistanceInput, DistanceProxy, SimplexCache};
use rein2d::dynamics::{solve_island, ContactSolver, ContactSolverInput, TimeStep};
use rein2d::world::BruteForceBroadphase;
use rein2d::{collide, CircleShape, PolygonShape, Shape, Transform};
use rein2d_bench::*;

// ---------------------------------------------------------------------------
// Allocator
// ---------------------------------------------------------------------------

fn bench_allocator(c: &mut Criterion) {
    let mut group = c.benchmark_group("allocator/churn");
    for &size in &[16usize, 176, 640] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let mut allocator = BlockAllocator::default();
            b.iter(|| {
                let blocks: Vec<_> = (0..64).filter_map(|_| allocator.allocate(size)).collect();
                for block in blocks {
                    let _ = allocator.free(block, size);
                }
            });
        });
    }
    group.finish();
}

// ---------------------------------------------------------------------------
// Broadphase
// ---------------------------------------------------------------------------

fn bench_broadphase(c: &mut Criterion) {
    {
        let mut group = c.benchmark_group("broadphase/stacked_boxes");
        for &n in &[100, 500, 1000] {
            let (world, _) = setup_scene(n);
            let broadphase = BruteForceBroadphase::new();
            group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
                b.iter(|| broadphase.find_pairs(&world));
            });
        }
        group.finish();
    }

    {
        let mut group = c.benchmark_group("broadphase/sparse");
        for &n in &[100, 500, 1000] {
            let world = setup_sparse_world(n);
            let broadphase = BruteForceBroadphase::new();
            group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
                b.iter(|| broadphase.find_pairs(&world));
            });
        }
        group.finish();
    }
}

// ---------------------------------------------------------------------------
// Narrowphase
// ---------------------------------------------------------------------------

fn bench_narrowphase(c: &mut Criterion) {
    {
        let mut group = c.benchmark_group("narrowphase/polygons");
        let poly = PolygonShape::new_box(0.5, 0.5);
        let xf_a = Transform::IDENTITY;

        let xf_hit = Transform::from_translation(Vec2::new(0.9, 0.0));
        group.bench_function("intersecting", |b| {
            b.iter(|| collide_polygons(&poly, &xf_a, &poly, &xf_hit));
        });

        let xf_miss = Transform::from_translation(Vec2::new(5.0, 0.0));
        group.bench_function("separated", |b| {
            b.iter(|| collide_polygons(&poly, &xf_a, &poly, &xf_miss));
        });

        let xf_rot = Transform::new(Vec2::new(0.9, 0.2), 0.785);
        group.bench_function("rotated", |b| {
            b.iter(|| collide_polygons(&poly, &xf_a, &poly, &xf_rot));
        });
        group.finish();
    }

    {
        let mut group = c.benchmark_group("narrowphase/dispatch");
        let xf_a = Transform::IDENTITY;
        let xf_b = Transform::from_translation(Vec2::new(0.9, 0.1));

        let circle = Shape::from(CircleShape::new(Vec2::ZERO, 0.5));
        let bbox = Shape::from(PolygonShape::new_box(0.5, 0.5));
        group.bench_function("circle_circle", |b| {
            b.iter(|| collide(&circle, 0, &xf_a, &circle, 0, &xf_b));
        });
        group.bench_function("box_box", |b| {
            b.iter(|| collide(&bbox, 0, &xf_a, &bbox, 0, &xf_b));
        });
        group.bench_function("box_circle", |b| {
            b.iter(|| collide(&bbox, 0, &xf_a, &circle, 0, &xf_b));
        });
        group.bench_function("circle_box", |b| {
            b.iter(|| collide(&circle, 0, &xf_a, &bbox, 0, &xf_b));
        });
        group.finish();
    }
}

// ---------------------------------------------------------------------------
// Distance
// ---------------------------------------------------------------------------

fn bench_distance(c: &mut Criterion) {
    let mut group = c.benchmark_group("distance/octagons");
    let points: Vec<Vec2> = (0..8)
        .map(|i| {
            let t = i as f32 * std::f32::consts::TAU / 8.0;
            Vec2::new(t.cos(), t.sin())
        })
        .collect();
    let octagon = Shape::from(PolygonShape::new(&points).expect("octagon hull"));
    let input = DistanceInput {
        proxy_a: DistanceProxy::from_shape(&octagon, 0),
        proxy_b: DistanceProxy::from_shape(&octagon, 0),
        transform_a: Transform::IDENTITY,
        transform_b: Transform::new(Vec2::new(3.0, 0.4), 0.3),
        use_radii: true,
    };

    group.bench_function("cold", |b| {
        b.iter(|| {
            let mut cache = SimplexCache::default();
            distance(&mut cache, &input)
        });
    });

    let mut warm = SimplexCache::default();
    distance(&mut warm, &input);
    group.bench_function("warm", |b| {
        b.iter(|| {
            let mut cache = warm;
            distance(&mut cache, &input)
        });
    });
    group.finish();
}

// ---------------------------------------------------------------------------
// Solver
// ---------------------------------------------------------------------------

fn bench_solver(c: &mut Criterion) {
    let mut group = c.benchmark_group("solver/contact_count");
    for &n in &[10, 50, 100, 500] {
        let scene = setup_contacts(n);
        let mut allocator = BlockAllocator::default();
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter_batched(
                || (scene.positions.clone(), scene.velocities.clone()),
                |(mut positions, mut velocities)| {
                    let step = TimeStep::new(1.0 / 60.0, 60.0, 8, 3);
                    let inputs: Vec<_> = scene
                        .manifolds
                        .iter()
                        .enumerate()
                        .map(|(i, manifold)| ContactSolverInput {
                            manifold,
                            index_a: 0,
                            index_b: i + 1,
                            radius_a: scene.radius,
                            radius_b: scene.radius,
                            friction: 0.6,
                            restitution: 0.0,
                        })
                        .collect();
                    let Ok(mut contacts) = ContactSolver::new(&mut allocator, step, &inputs) else {
                        return;
                    };
                    solve_island(
                        &step,
                        Vec2::new(0.0, -10.0),
                        &scene.bodies,
                        &scene.motions,
                        &mut positions,
                        &mut velocities,
                        &mut [&mut contacts],
                    );
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

// ---------------------------------------------------------------------------
// Full pipeline
// ---------------------------------------------------------------------------

fn bench_pipeline(c: &mut Criterion) {
    {
        let mut group = c.benchmark_group("pipeline/step");
        group.sample_size(30);
        for &n in &[50, 100, 500] {
            group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
                b.iter_batched(
                    || setup_scene(n),
                    |(mut world, mut physics)| {
                        let _ = physics.step(&mut world, 1.0 / 60.0);
                    },
                    criterion::BatchSize::LargeInput,
                );
            });
        }
        group.finish();
    }

    {
        let mut group = c.benchmark_group("pipeline/sustained_10steps");
        group.sample_size(20);
        for &n in &[100, 500] {
            group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
                b.iter_batched(
                    || setup_scene(n),
                    |(mut world, mut physics)| {
                        for _ in 0..10 {
                            let _ = physics.step(&mut world, 1.0 / 60.0);
                        }
                    },
                    criterion::BatchSize::LargeInput,
                );
            });
        }
        group.finish();
    }
}

criterion_group!(
    benches,
    bench_allocator,
    bench_broadphase,
    bench_narrowphase,
    bench_distance,
    bench_solver,
    bench_pipeline
);
criterion_main!(benches);
