//! Rein 2D Physics
//!
//! Rigid body collision and constraint solving in the plane.
//!
//! # Architecture
//!
//! The library is organized into layers:
//!
//! 1. **block_allocator** - Size-class pooled memory for per-step solver scratch
//! 2. **math** - Rotations, transforms and small linear solves over glam
//! 3. **shape** - Circles, polygons, edges and chains with mass and bounds
//! 4. **collision** - Support proxies, GJK distance, SAT manifolds with contact ids
//! 5. **dynamics** - Sequential impulse contact solver, weld joint, island stepping
//! 6. **world** - hecs-backed bodies, broadphase and contact persistence (feature = "ecs")

pub mod block_allocator;
pub mod collision;
pub mod dynamics;
pub mod error;
pub mod math;
pub mod settings;
pub mod shape;

#[cfg(feature = "ecs")]
pub mod world;

// Re-export commonly used types
pub use block_allocator::{Block, BlockAllocator};

pub use collision::{
    collide, distance, test_overlap, ContactId, DistanceInput, DistanceOutput, DistanceProxy,
    Manifold, ManifoldType, SimplexCache, WorldManifold,
};

pub use dynamics::{
    solve_island, Constraint, ContactSolver, ContactSolverInput, TimeStep, WeldJoint,
    WeldJointDef, WeldSolveMode,
};

pub use error::{PhysicsError, Result};
pub use math::{Rot, Transform};
pub use settings::{AllocatorConfig, PhysicsConfig};
pub use shape::{Aabb, ChainShape, CircleShape, EdgeShape, MassData, PolygonShape, Shape};

#[cfg(feature = "ecs")]
pub use world::{Collider2D, PhysicsWorld, RigidBody2D, RigidBodyType, WeldJoint2D};

pub use glam;
