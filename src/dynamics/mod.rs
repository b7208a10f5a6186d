//! Sequential impulse constraint solving.
//!
//! Constraints address bodies by island index into the arrays carried by
//! [`SolverData`]. The island driver owns the call order; see
//! [`solve_island`].

pub mod constraint;
pub mod contact_solver;
pub mod island;
pub mod time_step;
pub mod weld_joint;

pub use constraint::Constraint;
pub use contact_solver::{ContactSolver, ContactSolverInput};
pub use island::{solve_island, BodyMotion, IslandReport};
pub use time_step::{Position, SolverBody, SolverData, TimeStep, Velocity};
pub use weld_joint::{WeldJoint, WeldJointDef, WeldSolveMode};
