//! Per-step solver inputs shared by every constraint.

use glam::Vec2;

/// Timing and iteration settings for one solver step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeStep {
    /// Time step in seconds.
    pub dt: f32,
    /// Inverse time step, 0 when `dt` is 0.
    pub inv_dt: f32,
    /// `dt * inv_dt` of the previous step, used to rescale warm-start impulses
    /// when the step size changes.
    pub dt_ratio: f32,
    pub velocity_iterations: u32,
    pub position_iterations: u32,
    pub warm_starting: bool,
}

impl TimeStep {
    /// Step of length `dt` following a step whose inverse length was
    /// `prev_inv_dt`.
    pub fn new(dt: f32, prev_inv_dt: f32, velocity_iterations: u32, position_iterations: u32) -> Self {
        let inv_dt = if dt > 0.0 { 1.0 / dt } else { 0.0 };
        Self {
            dt,
            inv_dt,
            dt_ratio: prev_inv_dt * dt,
            velocity_iterations,
            position_iterations,
            warm_starting: true,
        }
    }
}

/// Center of mass position and angle of a body.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub c: Vec2,
    pub a: f32,
}

/// Linear and angular velocity of a body.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Velocity {
    pub v: Vec2,
    pub w: f32,
}

/// Constant mass properties of a body for the duration of a step.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SolverBody {
    pub inv_mass: f32,
    pub inv_inertia: f32,
    /// Center of mass in body coordinates.
    pub local_center: Vec2,
}

impl SolverBody {
    /// A body that constraints cannot move.
    pub const STATIC: Self = Self {
        inv_mass: 0.0,
        inv_inertia: 0.0,
        local_center: Vec2::ZERO,
    };
}

/// Everything a constraint reads and writes during a solver call. Bodies are
/// addressed by island index.
#[derive(Debug)]
pub struct SolverData<'a> {
    pub step: TimeStep,
    pub bodies: &'a [SolverBody],
    pub positions: &'a mut [Position],
    pub velocities: &'a mut [Velocity],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_step_ratio() {
        let step = TimeStep::new(1.0 / 120.0, 60.0, 8, 3);
        assert!((step.inv_dt - 120.0).abs() < 1e-3);
        assert!((step.dt_ratio - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_zero_dt_has_zero_inverse() {
        let step = TimeStep::new(0.0, 60.0, 8, 3);
        assert_eq!(step.inv_dt, 0.0);
        assert_eq!(step.dt_ratio, 0.0);
    }
}
