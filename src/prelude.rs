//! Includes commonly used library components.

pub use crate::{
    Error,
    RunDescriptor,
    SaveSettings,
    SaveType,
    Simulation,
    SimulationDescriptor,
    Solver,
};
pub use crate::fit::{
    Axis, Boundary, EmSolver, EmSolverDescriptor, Field, SolverKind,
};
pub use crate::grid::{Grid3D, Grid3DDescriptor, SolidSpec};
pub use crate::materials::{Material, MaterialMap};
pub use crate::sources::{Beam, Source};
pub use crate::wake::{WakeResults, WakeSolver, WakeSolverDescriptor};
