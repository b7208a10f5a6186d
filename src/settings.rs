//! Global tuning constants and configuration structs.

use std::f32::consts::PI;

use glam::Vec2;

/// Maximum number of contact points between two convex shapes.
pub const MAX_MANIFOLD_POINTS: usize = 2;

/// Maximum number of vertices on a convex polygon.
pub const MAX_POLYGON_VERTICES: usize = 8;

/// Collision and constraint tolerance in meters.
pub const LINEAR_SLOP: f32 = 0.005;

/// Angular constraint tolerance in radians.
pub const ANGULAR_SLOP: f32 = 2.0 / 180.0 * PI;

/// Skin radius around polygons. Keeps polygons slightly apart so that
/// continuous contact stays in the cheaper face/clip regime.
pub const POLYGON_RADIUS: f32 = 2.0 * LINEAR_SLOP;

/// Maximum linear position correction applied per position iteration.
pub const MAX_LINEAR_CORRECTION: f32 = 0.2;

/// Maximum angular position correction applied per position iteration.
pub const MAX_ANGULAR_CORRECTION: f32 = 8.0 / 180.0 * PI;

/// Maximum translation of a body per step.
pub const MAX_TRANSLATION: f32 = 2.0;

/// Maximum rotation of a body per step.
pub const MAX_ROTATION: f32 = 0.5 * PI;

/// Fraction of overlap resolved per position iteration.
pub const BAUMGARTE: f32 = 0.2;

/// Relative approach speed below which collisions are treated as inelastic.
pub const VELOCITY_THRESHOLD: f32 = 1.0;

/// Iteration cap for the GJK distance query.
pub const GJK_MAX_ITERATIONS: u32 = 20;

/// Block allocator configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocatorConfig {
    /// Check every freed block against the chunk table and fill freed
    /// memory with a marker pattern. Default: on in debug builds.
    pub validate: bool,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            validate: cfg!(debug_assertions),
        }
    }
}

/// Configuration for the physics simulation.
#[derive(Debug, Clone)]
pub struct PhysicsConfig {
    /// Gravity vector. Default: (0, -10).
    pub gravity: Vec2,
    /// Fixed timestep for physics updates in seconds. Default: 1/60.
    pub fixed_timestep: f64,
    /// Maximum number of sub-steps per frame. Default: 4.
    pub max_substeps: u32,
    /// Velocity solver iterations per step. Default: 8.
    pub velocity_iterations: u32,
    /// Position solver iterations per step. Default: 3.
    pub position_iterations: u32,
    /// Carry accumulated impulses across steps. Default: true.
    pub warm_starting: bool,
    /// Allocator used for per-step solver scratch.
    pub allocator: AllocatorConfig,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: Vec2::new(0.0, -10.0),
            fixed_timestep: 1.0 / 60.0,
            max_substeps: 4,
            velocity_iterations: 8,
            position_iterations: 3,
            warm_starting: true,
            allocator: AllocatorConfig::default(),
        }
    }
}
