//! Electromagnetic material assignment.

use ndarray::Array3;

use crate::grid::Grid3D;

/// Electromagnetic material of a mesh region.
///
/// A perfect electric conductor is a distinguished boundary, not a large
/// finite conductivity; the solver pins tangential E instead of damping it.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Material {
    Vacuum,
    Pec,
    /// Linear isotropic material: relative permittivity, relative
    /// permeability, conductivity in S/m.
    Custom {
        eps_r: f64,
        mu_r: f64,
        sigma: f64,
    },
}

impl Material {
    pub fn eps_r(&self) -> f64 {
        match self {
            Material::Custom { eps_r, .. } => *eps_r,
            _ => 1.0,
        }
    }

    pub fn mu_r(&self) -> f64 {
        match self {
            Material::Custom { mu_r, .. } => *mu_r,
            _ => 1.0,
        }
    }

    pub fn sigma(&self) -> f64 {
        match self {
            Material::Custom { sigma, .. } => *sigma,
            _ => 0.0,
        }
    }

    pub fn is_pec(&self) -> bool {
        matches!(self, Material::Pec)
    }
}

/// Per-cell resolved material table.
///
/// Every cell has exactly one material after voxelization: the background,
/// overridden by each containing solid in declaration order (last wins).
pub struct MaterialMap {
    cells: Array3<Material>,
}

impl MaterialMap {
    /// Resolves every cell of the grid by sampling its center.
    pub fn voxelize(grid: &Grid3D) -> Self {
        let (nx, ny, nz) = (grid.nx(), grid.ny(), grid.nz());
        let cells = Array3::from_shape_fn((nx, ny, nz), |(i, j, k)| {
            grid.material_at([
                grid.x()[i] + 0.5 * grid.dx()[i],
                grid.y()[j] + 0.5 * grid.dy()[j],
                grid.zc(k),
            ])
        });
        Self { cells }
    }

    pub fn get(&self, i: usize, j: usize, k: usize) -> Material {
        self.cells[[i, j, k]]
    }

    pub fn dim(&self) -> (usize, usize, usize) {
        self.cells.dim()
    }

    /// Fastest wave-speed factor `min(eps_r * mu_r)` over non-conductor
    /// cells; 1.0 when everything conducts.
    pub fn min_refractive_product(&self) -> f64 {
        let min = self
            .cells
            .iter()
            .filter(|m| !m.is_pec())
            .map(|m| m.eps_r() * m.mu_r())
            .fold(f64::INFINITY, f64::min);
        if min.is_finite() {
            min
        } else {
            1.0
        }
    }
}
