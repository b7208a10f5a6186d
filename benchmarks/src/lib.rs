//! Scene builders shared by the physics benchmarks.

use glam::Vec2;
use rein2d::collision::Manifold;
use rein2d::dynamics::{BodyMotion, Position, SolverBody, Velocity};
use rein2d::world::{Collider2D, PhysicsWorld, RigidBody2D};
use rein2d::{collide, PhysicsConfig, PolygonShape, Shape, Transform};

/// A static ground with `n` boxes stacked in columns of ten above it.
pub fn setup_scene(n: usize) -> (hecs::World, PhysicsWorld) {
    let mut world = hecs::World::new();
    let width = (n / 10 + 1) as f32 * 1.5;
    world.spawn((
        RigidBody2D::new_static(Vec2::ZERO),
        Collider2D::new(PolygonShape::new_box(width, 0.5)).with_friction(0.6),
    ));

    for i in 0..n {
        let column = (i / 10) as f32;
        let row = (i % 10) as f32;
        let collider = Collider2D::new(PolygonShape::new_box(0.5, 0.5)).with_friction(0.6);
        let body = RigidBody2D::new_dynamic(Vec2::new(column * 1.5 - width * 0.5, 1.0 + row * 1.05))
            .with_mass_from(&collider);
        world.spawn((body, collider));
    }

    (world, PhysicsWorld::new(PhysicsConfig::default()))
}

/// Boxes scattered far apart so the broadphase finds no pairs.
pub fn setup_sparse_world(n: usize) -> hecs::World {
    let mut world = hecs::World::new();
    for i in 0..n {
        let collider = Collider2D::new(PolygonShape::new_box(0.5, 0.5));
        let body = RigidBody2D::new_dynamic(Vec2::new(i as f32 * 10.0, 0.0));
        world.spawn((body, collider));
    }
    world
}

/// Island arrays and manifolds for `n` independent box-on-ground contacts.
pub struct ContactScene {
    pub bodies: Vec<SolverBody>,
    pub motions: Vec<BodyMotion>,
    pub positions: Vec<Position>,
    pub velocities: Vec<Velocity>,
    pub manifolds: Vec<Manifold>,
    pub radius: f32,
}

pub fn setup_contacts(n: usize) -> ContactScene {
    let ground = Shape::from(PolygonShape::new_box(0.5, 0.5));
    let body = Shape::from(PolygonShape::new_box(0.5, 0.5));
    let mass = body.compute_mass(1.0);

    let mut scene = ContactScene {
        bodies: vec![SolverBody::STATIC],
        motions: vec![BodyMotion {
            dynamic: false,
            ..Default::default()
        }],
        positions: vec![Position::default()],
        velocities: vec![Velocity::default()],
        manifolds: Vec::with_capacity(n),
        radius: body.radius(),
    };

    for i in 0..n {
        let x = i as f32 * 0.001;
        let xf = Transform::from_translation(Vec2::new(x, 0.95));
        scene
            .manifolds
            .push(collide(&ground, 0, &Transform::IDENTITY, &body, 0, &xf));
        scene.bodies.push(SolverBody {
            inv_mass: 1.0 / mass.mass,
            inv_inertia: 1.0 / mass.inertia,
            local_center: Vec2::ZERO,
        });
        scene.motions.push(BodyMotion::default());
        scene.positions.push(Position {
            c: xf.p,
            a: 0.0,
        });
        scene.velocities.push(Velocity {
            v: Vec2::new(0.0, -1.0),
            w: 0.0,
        });
    }
    scene
}
