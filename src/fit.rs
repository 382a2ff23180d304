//! The FIT/FDTD field solver core.

mod boundary;
mod em_solver;
mod field;

pub use boundary::Boundary;
pub use em_solver::{EmSolver, EmSolverDescriptor, GhostSlice, SolverKind, ZEnd};
pub use field::{Axis, Field};
