//! A framework for simulating beam-coupling wakefields in 3D accelerator
//! structures with a staggered-grid FIT/FDTD electromagnetic solver.
//!
//! The field solver advances Maxwell's equations with an explicit leapfrog
//! scheme on a structured mesh. Embedded conductor geometry is handled with
//! the Finite Integration Technique: faces and edges cut by a conductor keep
//! fractional areas and lengths, so curved surfaces stay on a structured grid
//! without a body-fitted mesh. A moving line-charge beam is injected as a
//! current source, and the longitudinal electric field sampled behind it is
//! integrated into wake potentials and impedances.

mod simulation;

pub mod fit;
pub mod geometry;
pub mod grid;
pub mod materials;
pub mod prelude;
pub mod sources;
pub mod wake;

pub use simulation::{
    RunDescriptor, SaveSettings, SaveType, Simulation, SimulationDescriptor,
};

use crate::fit::{Axis, Boundary, Field};
use crate::grid::Grid3D;
use crate::sources::Source;

/// Represents an error in the simulation.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Domain bounds on the {axis} axis are malformed \
        ( min: {min}, max: {max} )")]
    BadBounds { axis: char, min: f64, max: f64 },
    #[error("Cell count on the {axis} axis must be at least 1")]
    BadCellCount { axis: char },
    #[error("Solid '{name}' extends outside the domain bounds")]
    SolidOutsideDomain { name: String },
    #[error("Surface mesh '{name}' is not closed \
        ( {open_edges} edges are not shared by exactly two triangles )")]
    OpenSurface { name: String, open_edges: usize },
    #[error("Init {array_name} array does not have expected shape \
        ( {array_name} array shape: {input_shape:?}, \
        expected shape: {expected_shape:?} )")]
    BadInit {
        array_name: String,
        input_shape: (usize, usize, usize),
        expected_shape: (usize, usize, usize),
    },
    #[error("Unsupported boundary pairing on the {axis} axis \
        ( low: {low:?}, high: {high:?} )")]
    UnsupportedBoundary {
        axis: char,
        low: Boundary,
        high: Boundary,
    },
    #[error("Degenerate cut cell at ({i}, {j}, {k}) on the {axis:?} face: \
        interior flag set but cut area vanishes")]
    DegenerateCell {
        i: usize,
        j: usize,
        k: usize,
        axis: Axis,
    },
    #[error("Field index ({i}, {j}, {k}) out of range for grid {shape:?}")]
    OutOfRange {
        i: usize,
        j: usize,
        k: usize,
        shape: (usize, usize, usize),
    },
    #[error("Beam source offset ({x}, {y}) lies outside the transverse domain")]
    SourceOutsideDomain { x: f64, y: f64 },
    #[error("Wake potential not ready: recorded {have:.6e} s of field data, \
        need {need:.6e} s for the requested wake length")]
    WakeNotReady { have: f64, need: f64 },
    #[error("Frequency {f:.6e} Hz outside the sampled Nyquist range \
        ( max: {nyquist:.6e} Hz )")]
    FrequencyOutOfRange { f: f64, nyquist: f64 },
    #[error("Field arrays became non-finite at step {step}")]
    NonFiniteFields { step: u64 },
    #[error(transparent)]
    H5Error(#[from] hdf5::Error),
}

/// Manages actual field computations.
///
/// One implementor owns the full field state for one (sub)domain and advances
/// it one leapfrog step at a time. All field access goes through the typed
/// accessors on [`Field`]; nothing else mutates the arrays.
pub trait Solver {
    /// Advances H by half a leapfrog pair and E by the other half, applies
    /// boundary conditions and accumulates time. Never allocates.
    fn one_step(&mut self);

    /// Writes the source's current density into the solver's J array at the
    /// solver's current time.
    fn apply_source(&mut self, source: &dyn Source);

    /// Elapsed simulated time.
    fn time(&self) -> f64;

    /// The leapfrog time step.
    fn dt(&self) -> f64;

    fn grid(&self) -> &Grid3D;

    fn e(&self) -> &Field;
    fn h(&self) -> &Field;
    fn current(&self) -> &Field;

    fn e_mut(&mut self) -> &mut Field;
    fn current_mut(&mut self) -> &mut Field;
}
