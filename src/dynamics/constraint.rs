use super::time_step::SolverData;

/// A velocity/position constraint driven by the island solver.
///
/// Per step the solver calls `init_velocity_constraints` once,
/// `solve_velocity_constraints` once per velocity iteration, then
/// `solve_position_constraints` until every constraint reports success or
/// the position iteration budget runs out.
pub trait Constraint {
    /// Compute effective masses and apply warm-start impulses.
    fn init_velocity_constraints(&mut self, data: &mut SolverData<'_>);

    /// One sequential-impulse pass over the velocity constraint.
    fn solve_velocity_constraints(&mut self, data: &mut SolverData<'_>);

    /// One pass of position correction. Returns `true` when the remaining
    /// error is within tolerance.
    fn solve_position_constraints(&mut self, data: &mut SolverData<'_>) -> bool;
}
