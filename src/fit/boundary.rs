//! Outer boundary conditions.

/// Boundary condition on one side of one axis.
///
/// The enum is the substitution seam for further boundary types (open,
/// absorbing); the solver validates pairings at construction and rejects
/// combinations it cannot honor.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Boundary {
    /// Perfect electric conductor: tangential E forced to zero on the
    /// boundary face.
    Pec,
    /// Periodic wrap; must be selected on both sides of an axis.
    Periodic,
    /// No boundary handling: the seam fields evolve from whatever the ghost
    /// layer holds. Used on the interior seams of a z-decomposed run, where
    /// a driver refreshes the ghost planes once per step.
    None,
}
