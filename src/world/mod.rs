//! hecs-backed reference world driving the collision and solver core.
//!
//! # Architecture
//!
//! The pipeline runs in a fixed timestep loop:
//!
//! 1. Broadphase (brute-force AABB overlap over collider children)
//! 2. Narrowphase and contact persistence ([`ContactCache`])
//! 3. Gather bodies into island arrays
//! 4. Solve the island (gravity, joints, contacts, position correction)
//! 5. Write positions and velocities back to [`RigidBody2D`]
//!
//! Every body is part of a single island. There is no sleeping.

pub mod broadphase;
pub mod components;
pub mod contact;

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::block_allocator::BlockAllocator;
use crate::collision::Manifold;
use crate::dynamics::{
    solve_island, BodyMotion, Constraint, ContactSolver, ContactSolverInput, IslandReport,
    Position, SolverBody, TimeStep, Velocity, WeldJoint,
};
use crate::error::Result;
use crate::math::Rot;
use crate::settings::PhysicsConfig;

pub use self::broadphase::{BruteForceBroadphase, ProxyKey};
pub use self::components::{Collider2D, RigidBody2D, RigidBodyType, WeldJoint2D};
pub use self::contact::{Contact, ContactCache, ContactEvent};

/// The main physics world managing simulation state.
pub struct PhysicsWorld {
    config: PhysicsConfig,
    accumulator: f64,
    prev_inv_dt: f32,
    broadphase: BruteForceBroadphase,
    contacts: ContactCache,
    allocator: BlockAllocator,
    last_report: Option<IslandReport>,
}

impl PhysicsWorld {
    /// Create a new physics world with the given configuration.
    pub fn new(config: PhysicsConfig) -> Self {
        Self {
            allocator: BlockAllocator::new(config.allocator),
            config,
            accumulator: 0.0,
            prev_inv_dt: 0.0,
            broadphase: BruteForceBroadphase::new(),
            contacts: ContactCache::new(),
            last_report: None,
        }
    }

    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    pub fn contacts(&self) -> &ContactCache {
        &self.contacts
    }

    /// Solver outcome of the most recent fixed step.
    pub fn last_report(&self) -> Option<IslandReport> {
        self.last_report
    }

    /// Step the physics simulation forward by `delta_time` seconds.
    ///
    /// Uses a fixed timestep accumulator to ensure deterministic simulation.
    /// Returns the number of fixed steps taken.
    pub fn step(&mut self, world: &mut hecs::World, delta_time: f64) -> Result<u32> {
        self.accumulator += delta_time;

        let mut substeps = 0u32;
        while self.accumulator >= self.config.fixed_timestep && substeps < self.config.max_substeps
        {
            self.fixed_step(world, self.config.fixed_timestep as f32)?;
            self.accumulator -= self.config.fixed_timestep;
            substeps += 1;
        }

        // Clamp accumulator to avoid spiral of death
        if self.accumulator > self.config.fixed_timestep * self.config.max_substeps as f64 {
            debug!(dropped = self.accumulator, "physics falling behind");
            self.accumulator = 0.0;
        }

        Ok(substeps)
    }

    /// Despawn a body along with its contacts and any weld joints attached
    /// to it.
    pub fn destroy_body(&mut self, world: &mut hecs::World, entity: hecs::Entity) {
        let welds: Vec<hecs::Entity> = world
            .query::<&WeldJoint2D>()
            .iter()
            .filter(|(_, weld)| weld.body_a == entity || weld.body_b == entity)
            .map(|(joint, _)| joint)
            .collect();
        for joint in welds {
            let _ = world.despawn(joint);
        }
        self.contacts.remove_entity(entity);
        let _ = world.despawn(entity);
    }

    /// Advance the world by exactly one step of `dt` seconds.
    pub fn fixed_step(&mut self, world: &mut hecs::World, dt: f32) -> Result<()> {
        // 1. Broadphase
        let pairs = self.broadphase.find_pairs(world);

        // 2. Narrowphase
        self.contacts.update(world, &pairs);

        // 3. Island arrays
        let mut island = Island::default();
        for (entity, rb) in world.query::<&RigidBody2D>().iter() {
            island.push(entity, rb);
        }
        if island.entities.is_empty() {
            return Ok(());
        }

        let mut step = TimeStep::new(
            dt,
            self.prev_inv_dt,
            self.config.velocity_iterations,
            self.config.position_iterations,
        );
        step.warm_starting = self.config.warm_starting;

        let mut manifolds: Vec<Manifold> = Vec::new();
        let mut rows = Vec::new();
        for contact in self.contacts.iter().filter(|c| solvable(c)) {
            let (Some(&index_a), Some(&index_b)) = (
                island.index.get(&contact.key_a.entity),
                island.index.get(&contact.key_b.entity),
            ) else {
                continue;
            };
            manifolds.push(contact.manifold);
            rows.push((index_a, index_b, contact));
        }
        let inputs: Vec<ContactSolverInput<'_>> = rows
            .iter()
            .zip(&manifolds)
            .map(|((index_a, index_b, contact), manifold)| ContactSolverInput {
                manifold,
                index_a: *index_a,
                index_b: *index_b,
                radius_a: contact.radius_a,
                radius_b: contact.radius_b,
                friction: contact.friction,
                restitution: contact.restitution,
            })
            .collect();

        let mut contact_solver = ContactSolver::new(&mut self.allocator, step, &inputs)?;
        drop(inputs);
        drop(rows);

        // 4. Solve
        let mut joints: Vec<&mut WeldJoint> = Vec::new();
        for (_, weld) in world.query_mut::<&mut WeldJoint2D>() {
            let (Some(&index_a), Some(&index_b)) = (
                island.index.get(&weld.body_a),
                island.index.get(&weld.body_b),
            ) else {
                debug!("skipping weld joint with a missing body");
                continue;
            };
            weld.joint.set_island_indices(index_a, index_b);
            joints.push(&mut weld.joint);
        }

        let mut constraints: Vec<&mut dyn Constraint> = joints
            .into_iter()
            .map(|joint| joint as &mut dyn Constraint)
            .collect();
        constraints.push(&mut contact_solver);

        let report = solve_island(
            &step,
            self.config.gravity,
            &island.bodies,
            &island.motions,
            &mut island.positions,
            &mut island.velocities,
            &mut constraints,
        );
        drop(constraints);

        contact_solver.store_impulses(&mut manifolds);
        drop(contact_solver);

        for (contact, manifold) in self
            .contacts
            .iter_mut()
            .filter(|c| solvable(c) && island.index.contains_key(&c.key_a.entity))
            .zip(&manifolds)
        {
            contact.manifold = *manifold;
        }

        // 5. Write back
        island.write_back(world);

        self.prev_inv_dt = step.inv_dt;
        self.last_report = Some(report);
        trace!(
            bodies = island.entities.len(),
            contacts = manifolds.len(),
            "fixed step"
        );
        Ok(())
    }
}

fn solvable(contact: &Contact) -> bool {
    contact.is_touching() && !contact.is_sensor
}

/// Bodies gathered into the flat arrays the solver works on.
#[derive(Default)]
struct Island {
    entities: Vec<hecs::Entity>,
    index: HashMap<hecs::Entity, usize>,
    bodies: Vec<SolverBody>,
    motions: Vec<BodyMotion>,
    positions: Vec<Position>,
    velocities: Vec<Velocity>,
}

impl Island {
    fn push(&mut self, entity: hecs::Entity, rb: &RigidBody2D) {
        self.index.insert(entity, self.entities.len());
        self.entities.push(entity);
        self.bodies.push(rb.solver_body());
        self.motions.push(rb.motion());
        self.positions.push(Position {
            c: rb.world_center(),
            a: rb.angle,
        });
        let velocity = if rb.body_type == RigidBodyType::Static {
            Velocity::default()
        } else {
            Velocity {
                v: rb.linear_velocity,
                w: rb.angular_velocity,
            }
        };
        self.velocities.push(velocity);
    }

    fn write_back(&self, world: &mut hecs::World) {
        for (i, &entity) in self.entities.iter().enumerate() {
            let Ok(mut rb) = world.get::<&mut RigidBody2D>(entity) else {
                continue;
            };
            if rb.body_type == RigidBodyType::Static {
                continue;
            }
            let Position { c, a } = self.positions[i];
            rb.angle = a;
            rb.position = c - Rot::new(a).apply(self.bodies[i].local_center);
            rb.linear_velocity = self.velocities[i].v;
            rb.angular_velocity = self.velocities[i].w;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::{CircleShape, PolygonShape};
    use glam::Vec2;

    fn ground(world: &mut hecs::World) -> hecs::Entity {
        world.spawn((
            RigidBody2D::new_static(Vec2::ZERO),
            Collider2D::new(PolygonShape::new_box(5.0, 0.5)).with_friction(0.6),
        ))
    }

    fn dynamic_box(world: &mut hecs::World, position: Vec2) -> hecs::Entity {
        let collider = Collider2D::new(PolygonShape::new_box(0.5, 0.5)).with_friction(0.6);
        let body = RigidBody2D::new_dynamic(position).with_mass_from(&collider);
        world.spawn((body, collider))
    }

    #[test]
    fn test_physics_world_free_fall() {
        let mut world = hecs::World::new();
        let mut physics = PhysicsWorld::new(PhysicsConfig::default());

        let entity = world.spawn((RigidBody2D::new_dynamic(Vec2::new(0.0, 10.0)),));

        // Simulate ~1 second
        for _ in 0..60 {
            physics.step(&mut world, 1.0 / 60.0).unwrap();
        }

        let rb = world.get::<&RigidBody2D>(entity).unwrap();
        assert!((rb.linear_velocity.y + 10.0).abs() < 0.2);
        assert!(rb.position.y < 5.2 && rb.position.y > 4.6, "y = {}", rb.position.y);
    }

    #[test]
    fn test_accumulator_caps_substeps() {
        let mut world = hecs::World::new();
        let mut physics = PhysicsWorld::new(PhysicsConfig::default());
        let entity = world.spawn((RigidBody2D::new_dynamic(Vec2::ZERO),));

        assert_eq!(physics.step(&mut world, 0.001).unwrap(), 0);
        assert_eq!(physics.step(&mut world, 0.5).unwrap(), 4);
        // The backlog was discarded rather than replayed.
        assert_eq!(physics.step(&mut world, 0.0).unwrap(), 0);

        let rb = world.get::<&RigidBody2D>(entity).unwrap();
        assert!((rb.linear_velocity.y + 4.0 * 10.0 / 60.0).abs() < 1e-4);
    }

    #[test]
    fn test_physics_world_box_rests_on_ground() {
        let mut world = hecs::World::new();
        let mut physics = PhysicsWorld::new(PhysicsConfig::default());
        ground(&mut world);
        let body = dynamic_box(&mut world, Vec2::new(0.0, 2.0));

        // Simulate 3 seconds
        for _ in 0..180 {
            physics.step(&mut world, 1.0 / 60.0).unwrap();
        }

        let rb = world.get::<&RigidBody2D>(body).unwrap();
        assert!((rb.position.y - 1.0).abs() < 0.03, "y = {}", rb.position.y);
        assert!(rb.linear_velocity.length() < 0.05);
        assert!(rb.angle.abs() < 0.01);
        assert!(physics.contacts().iter().any(|c| c.is_touching()));
        assert!(physics.last_report().is_some_and(|r| r.position_solved));
    }

    #[test]
    fn test_sensor_does_not_stop_bodies() {
        let mut world = hecs::World::new();
        let mut physics = PhysicsWorld::new(PhysicsConfig::default());
        world.spawn((
            RigidBody2D::new_static(Vec2::ZERO),
            Collider2D::new(PolygonShape::new_box(5.0, 0.5)).sensor(),
        ));
        let body = dynamic_box(&mut world, Vec2::new(0.0, 1.5));

        let mut began = false;
        for _ in 0..60 {
            physics.step(&mut world, 1.0 / 60.0).unwrap();
            began |= physics
                .contacts()
                .events()
                .iter()
                .any(|e| matches!(e, ContactEvent::Begin(..)));
        }

        assert!(began);
        let rb = world.get::<&RigidBody2D>(body).unwrap();
        assert!(rb.position.y < -1.0);
    }

    #[test]
    fn test_weld_holds_bodies_together() {
        let mut world = hecs::World::new();
        let mut physics = PhysicsWorld::new(PhysicsConfig::default());

        let anchor_body = RigidBody2D::new_static(Vec2::ZERO);
        let anchor = world.spawn((anchor_body.clone(),));
        let collider = Collider2D::new(PolygonShape::new_box(0.5, 0.5));
        let hanging_body = RigidBody2D::new_dynamic(Vec2::new(1.0, 0.0)).with_mass_from(&collider);
        let hanging = world.spawn((hanging_body.clone(), collider));

        let weld = WeldJoint2D::at_anchor(
            (anchor, &anchor_body),
            (hanging, &hanging_body),
            Vec2::new(0.5, 0.0),
        );
        world.spawn((weld,));

        for _ in 0..120 {
            physics.step(&mut world, 1.0 / 60.0).unwrap();
        }

        let rb = world.get::<&RigidBody2D>(hanging).unwrap();
        assert!((rb.position - Vec2::new(1.0, 0.0)).length() < 0.05);
        assert!(rb.angle.abs() < 0.1);
    }

    #[test]
    fn test_destroy_body_removes_welds_and_contacts() {
        let mut world = hecs::World::new();
        let mut physics = PhysicsWorld::new(PhysicsConfig::default());
        let a = ground(&mut world);
        let b = world.spawn((
            RigidBody2D::new_dynamic(Vec2::new(0.0, 0.9)),
            Collider2D::new(CircleShape::new(Vec2::ZERO, 0.5)),
        ));
        world.spawn((WeldJoint2D::new(a, b, &Default::default()),));
        let free = dynamic_box(&mut world, Vec2::new(3.0, 0.95));

        physics.step(&mut world, 1.0 / 60.0).unwrap();
        assert!(!physics.contacts().is_empty());

        physics.destroy_body(&mut world, a);
        assert!(physics.contacts().is_empty());
        assert_eq!(world.query::<&WeldJoint2D>().iter().count(), 0);
        assert!(world.contains(b) && world.contains(free));
        assert!(physics.step(&mut world, 1.0 / 60.0).is_ok());
    }
}
