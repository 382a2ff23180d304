//! Vector field storage on the staggered mesh.

use ndarray::{Array4, ArrayView3, ArrayViewMut3, s};

use crate::Error;

/// Cartesian component tag for field access.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    #[inline]
    pub(crate) fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

/// One vector field (E, H or J) on the staggered mesh.
///
/// Storage is a single `(nx+2, ny+2, nz+2, 3)` array: interior cells live at
/// indices `1..=n` per axis and one ghost layer per side carries boundary
/// state. Public access is in grid coordinates (`0..n`); indices outside the
/// grid are an error, never a clamp.
pub struct Field {
    data: Array4<f64>,
    nx: usize,
    ny: usize,
    nz: usize,
}

impl Field {
    pub fn new(nx: usize, ny: usize, nz: usize) -> Self {
        Self {
            data: Array4::zeros((nx + 2, ny + 2, nz + 2, 3)),
            nx,
            ny,
            nz,
        }
    }

    pub fn dim(&self) -> (usize, usize, usize) {
        (self.nx, self.ny, self.nz)
    }

    #[inline]
    fn check(&self, i: usize, j: usize, k: usize) -> Result<(), Error> {
        if i >= self.nx || j >= self.ny || k >= self.nz {
            return Err(Error::OutOfRange {
                i,
                j,
                k,
                shape: (self.nx, self.ny, self.nz),
            });
        }
        Ok(())
    }

    /// One scalar component at a grid coordinate.
    pub fn get(&self, i: usize, j: usize, k: usize, axis: Axis) -> Result<f64, Error> {
        self.check(i, j, k)?;
        Ok(self.data[[i + 1, j + 1, k + 1, axis.index()]])
    }

    pub fn set(
        &mut self,
        i: usize,
        j: usize,
        k: usize,
        axis: Axis,
        value: f64,
    ) -> Result<(), Error> {
        self.check(i, j, k)?;
        self.data[[i + 1, j + 1, k + 1, axis.index()]] = value;
        Ok(())
    }

    /// Interior view of one component, shaped like the grid.
    pub fn component(&self, axis: Axis) -> ArrayView3<'_, f64> {
        self.data.slice(s![
            1..=self.nx,
            1..=self.ny,
            1..=self.nz,
            axis.index()
        ])
    }

    pub fn component_mut(&mut self, axis: Axis) -> ArrayViewMut3<'_, f64> {
        self.data.slice_mut(s![
            1..=self.nx,
            1..=self.ny,
            1..=self.nz,
            axis.index()
        ])
    }

    /// Whether every entry (ghosts included) is finite.
    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|v| v.is_finite())
    }

    /// Largest absolute component value over the interior.
    pub fn norm_max(&self) -> f64 {
        Axis::ALL
            .iter()
            .flat_map(|&axis| self.component(axis).into_iter().cloned())
            .fold(0.0, |acc: f64, v| acc.max(v.abs()))
    }

    pub fn fill(&mut self, value: f64) {
        self.data.fill(value);
    }

    /// Raw padded storage, for the update loops and ghost exchange.
    #[inline]
    pub(crate) fn data(&self) -> &Array4<f64> {
        &self.data
    }

    #[inline]
    pub(crate) fn data_mut(&mut self) -> &mut Array4<f64> {
        &mut self.data
    }
}
