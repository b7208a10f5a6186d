//! Island stepping: integrate, solve constraints, integrate again.

use glam::Vec2;
use tracing::trace;

use super::constraint::Constraint;
use super::time_step::{Position, SolverBody, SolverData, TimeStep, Velocity};
use crate::settings::{MAX_ROTATION, MAX_TRANSLATION};

/// Per-body integration parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyMotion {
    /// Whether gravity and damping apply. Static and kinematic bodies are not
    /// accelerated.
    pub dynamic: bool,
    pub gravity_scale: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
}

impl Default for BodyMotion {
    fn default() -> Self {
        Self {
            dynamic: true,
            gravity_scale: 1.0,
            linear_damping: 0.0,
            angular_damping: 0.0,
        }
    }
}

/// Outcome of one island step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IslandReport {
    /// Every constraint reported its position error within tolerance.
    pub position_solved: bool,
    /// Position iterations actually run.
    pub position_iterations: u32,
}

/// Advance one island by `step.dt`.
///
/// Velocities are integrated first, then every constraint is initialised
/// and solved `step.velocity_iterations` times. Positions are integrated
/// with per-step translation and rotation caps, then position iterations run
/// until all constraints are satisfied or the budget is spent.
///
/// Contact impulses should be stored back to their manifolds after this
/// returns; position iterations do not change them.
pub fn solve_island(
    step: &TimeStep,
    gravity: Vec2,
    bodies: &[SolverBody],
    motions: &[BodyMotion],
    positions: &mut [Position],
    velocities: &mut [Velocity],
    constraints: &mut [&mut dyn Constraint],
) -> IslandReport {
    debug_assert_eq!(bodies.len(), motions.len());
    debug_assert_eq!(bodies.len(), positions.len());
    debug_assert_eq!(bodies.len(), velocities.len());

    let h = step.dt;

    for (motion, vel) in motions.iter().zip(velocities.iter_mut()) {
        if !motion.dynamic {
            continue;
        }
        vel.v += h * motion.gravity_scale * gravity;

        // Pade approximation of exp(-c h), stable for large damping.
        vel.v *= 1.0 / (1.0 + h * motion.linear_damping);
        vel.w *= 1.0 / (1.0 + h * motion.angular_damping);
    }

    let mut data = SolverData {
        step: *step,
        bodies,
        positions,
        velocities,
    };

    for constraint in constraints.iter_mut() {
        constraint.init_velocity_constraints(&mut data);
    }

    for _ in 0..step.velocity_iterations {
        for constraint in constraints.iter_mut() {
            constraint.solve_velocity_constraints(&mut data);
        }
    }

    for (pos, vel) in data.positions.iter_mut().zip(data.velocities.iter_mut()) {
        let translation = h * vel.v;
        if translation.length_squared() > MAX_TRANSLATION * MAX_TRANSLATION {
            vel.v *= MAX_TRANSLATION / translation.length();
        }

        let rotation = h * vel.w;
        if rotation * rotation > MAX_ROTATION * MAX_ROTATION {
            vel.w *= MAX_ROTATION / rotation.abs();
        }

        pos.c += h * vel.v;
        pos.a += h * vel.w;
    }

    let mut position_solved = false;
    let mut position_iterations = 0;
    for _ in 0..step.position_iterations {
        position_iterations += 1;
        let mut all_ok = true;
        for constraint in constraints.iter_mut() {
            // Every constraint runs even after one fails.
            let ok = constraint.solve_position_constraints(&mut data);
            all_ok = all_ok && ok;
        }
        if all_ok {
            position_solved = true;
            break;
        }
    }

    trace!(
        bodies = bodies.len(),
        constraints = constraints.len(),
        position_iterations,
        position_solved,
        "island solved"
    );

    IslandReport {
        position_solved,
        position_iterations,
    }
}
