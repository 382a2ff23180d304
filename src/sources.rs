//! External current sources injected into the field solver.

use physical_constants::SPEED_OF_LIGHT_IN_VACUUM as C0;

use crate::fit::{Axis, Field};
use crate::grid::Grid3D;

/// Produces a current density for the solver to subtract in its E update.
///
/// Implementors are pure functions of the passed time: no internal counters,
/// so a z-decomposed run computes each slice's overlap independently.
pub trait Source {
    /// Writes the current density at absolute time `t` into `current`.
    fn inject(&self, current: &mut Field, grid: &Grid3D, t: f64);

    /// Checks the source against the grid it will be injected into.
    fn validate(&self, _grid: &Grid3D) -> Result<(), crate::Error> {
        Ok(())
    }
}

/// A moving line-charge bunch: Gaussian longitudinal profile, delta
/// transverse profile at a fixed offset, travelling in +z at `beta * c`.
pub struct Beam {
    /// Bunch charge in C.
    pub q: f64,
    /// Longitudinal RMS length in m.
    pub sigmaz: f64,
    /// Relativistic velocity fraction.
    pub beta: f64,
    /// Transverse offset of the line charge in m.
    pub xsource: f64,
    pub ysource: f64,
    /// Injection time offset; the default keeps the bunch head outside the
    /// domain at t = 0.
    pub tinj: Option<f64>,
    /// Global domain entry plane for decomposed runs whose local grid does
    /// not start at the true zmin.
    pub z_injection: Option<f64>,
}

impl Beam {
    pub fn velocity(&self) -> f64 {
        self.beta * C0
    }

    pub fn injection_time(&self) -> f64 {
        self.tinj
            .unwrap_or(8.53 * self.sigmaz / (self.beta * C0))
    }

    /// Bunch center position at time `t`, measured from the injection plane.
    pub fn center(&self, zmin: f64, t: f64) -> f64 {
        zmin + self.velocity() * (t - self.injection_time())
    }

    /// Normalized longitudinal charge profile.
    pub fn profile(&self, z: f64, z0: f64) -> f64 {
        let arg = (z - z0) / self.sigmaz;
        (-0.5 * arg * arg).exp() / ((2.0 * std::f64::consts::PI).sqrt() * self.sigmaz)
    }
}

impl Source for Beam {
    fn inject(&self, current: &mut Field, grid: &Grid3D, t: f64) {
        let is = nearest_node(grid.x(), grid.nx(), self.xsource);
        let js = nearest_node(grid.y(), grid.ny(), self.ysource);
        let zmin = self.z_injection.unwrap_or_else(|| grid.zmin());
        let z0 = self.center(zmin, t);
        let cell_area = grid.dx()[is] * grid.dy()[js];
        let v = self.velocity();

        let mut jz = current.component_mut(Axis::Z);
        for k in 0..grid.nz() {
            jz[[is, js, k]] = self.q * v * self.profile(grid.zc(k), z0) / cell_area;
        }
    }

    fn validate(&self, grid: &Grid3D) -> Result<(), crate::Error> {
        let x = grid.x();
        let y = grid.y();
        let inside = self.xsource >= x[0]
            && self.xsource <= x[grid.nx()]
            && self.ysource >= y[0]
            && self.ysource <= y[grid.ny()];
        if !inside {
            return Err(crate::Error::SourceOutsideDomain {
                x: self.xsource,
                y: self.ysource,
            });
        }
        Ok(())
    }
}

/// Index of the edge column whose node is closest to `pos`.
fn nearest_node(nodes: &ndarray::Array1<f64>, n: usize, pos: f64) -> usize {
    (0..n)
        .min_by(|&a, &b| {
            (nodes[a] - pos)
                .abs()
                .partial_cmp(&(nodes[b] - pos).abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Grid3D, Grid3DDescriptor};
    use approx::assert_relative_eq;

    fn channel(nz: usize) -> Grid3D {
        Grid3D::new(Grid3DDescriptor {
            xmin: -0.05,
            xmax: 0.05,
            ymin: -0.05,
            ymax: 0.05,
            zmin: 0.0,
            zmax: 10.0,
            nx: 2,
            ny: 2,
            nz,
            ..Grid3DDescriptor::default()
        })
        .unwrap()
    }

    #[test]
    fn injected_current_integrates_to_beam_current() {
        let grid = channel(400);
        let beam = Beam {
            q: 1e-9,
            sigmaz: 0.5,
            beta: 1.0,
            xsource: 0.0,
            ysource: 0.0,
            tinj: None,
            z_injection: None,
        };
        let mut j = crate::fit::Field::new(2, 2, 400);
        // Pick t so the bunch center sits mid-domain.
        let t = beam.injection_time() + 5.0 / beam.velocity();
        beam.inject(&mut j, &grid, t);

        let jz = j.component(Axis::Z);
        let dv = grid.dx()[0] * grid.dy()[0] * grid.dz()[0];
        let total: f64 = jz.iter().sum::<f64>() * dv;
        assert_relative_eq!(total / beam.velocity(), beam.q, max_relative = 1e-6);
    }

    #[test]
    fn bunch_center_tracks_time() {
        let grid = channel(100);
        let beam = Beam {
            q: 1e-9,
            sigmaz: 0.3,
            beta: 0.5,
            xsource: 0.0,
            ysource: 0.0,
            tinj: Some(0.0),
            z_injection: None,
        };
        let mut j = crate::fit::Field::new(2, 2, 100);
        let t = 7.0 / beam.velocity();
        beam.inject(&mut j, &grid, t);

        let jz = j.component(Axis::Z);
        let peak = (0..100)
            .max_by(|&a, &b| {
                jz[[1, 1, a]]
                    .abs()
                    .partial_cmp(&jz[[1, 1, b]].abs())
                    .unwrap()
            })
            .unwrap();
        assert_relative_eq!(grid.zc(peak), 7.0, epsilon = 0.1);
    }

    #[test]
    fn slices_see_only_their_overlap() {
        // A slice covering z in [5, 10] with the injection plane pinned to
        // the global zmin sees the same local current as the full domain.
        let full = channel(200);
        let slice = Grid3D::new(Grid3DDescriptor {
            xmin: -0.05,
            xmax: 0.05,
            ymin: -0.05,
            ymax: 0.05,
            zmin: 5.0,
            zmax: 10.0,
            nx: 2,
            ny: 2,
            nz: 100,
            ..Grid3DDescriptor::default()
        })
        .unwrap();
        let beam = Beam {
            q: 2e-9,
            sigmaz: 0.4,
            beta: 1.0,
            xsource: 0.0,
            ysource: 0.0,
            tinj: None,
            z_injection: Some(full.zmin()),
        };
        let t = beam.injection_time() + 6.0 / beam.velocity();

        let mut j_full = crate::fit::Field::new(2, 2, 200);
        beam.inject(&mut j_full, &full, t);
        let mut j_slice = crate::fit::Field::new(2, 2, 100);
        beam.inject(&mut j_slice, &slice, t);

        let jf = j_full.component(Axis::Z);
        let js = j_slice.component(Axis::Z);
        for k in 0..100 {
            assert_relative_eq!(js[[1, 1, k]], jf[[1, 1, k + 100]], max_relative = 1e-12);
        }
    }
}
