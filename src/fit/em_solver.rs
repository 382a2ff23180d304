//! The leapfrog FIT/FDTD field update.

use ndarray::{Array1, Array3, Array4, s};

use crate::fit::{Axis, Boundary, Field};
use crate::grid::Grid3D;
use crate::materials::MaterialMap;
use crate::sources::Source;
use crate::{Error, Solver};

use physical_constants::{
    VACUUM_ELECTRIC_PERMITTIVITY as EPS0, VACUUM_MAG_PERMEABILITY as MU0,
};

/// Discretization variant.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SolverKind {
    /// Finite Integration Technique: update coefficients carry the grid's
    /// fractional (cut) face areas and edge lengths.
    Fit,
    /// Classical full-cell Yee update; every face keeps its nominal area.
    /// Ground truth for validating the FIT variant on uncut geometry.
    Fdtd,
}

/// Describes the composition of an [`EmSolver`].
pub struct EmSolverDescriptor {
    pub grid: Grid3D,
    pub materials: MaterialMap,
    /// Boundary condition at the low end of each axis (x, y, z).
    pub bc_low: [Boundary; 3],
    /// Boundary condition at the high end of each axis (x, y, z).
    pub bc_high: [Boundary; 3],
    pub kind: SolverKind,
    /// Fraction of the CFL bound used as the time step.
    pub courant: f64,
}

/// Boundary-adjacent field planes exchanged across a z-decomposition seam.
pub struct GhostSlice {
    pub e: Array3<f64>,
    pub h: Array3<f64>,
}

/// Which z seam of the local subdomain.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ZEnd {
    Low,
    High,
}

/// Owns the full field state of one (sub)domain and advances it one explicit
/// leapfrog step per [`Solver::one_step`] call.
pub struct EmSolver {
    grid: Grid3D,
    materials: MaterialMap,
    kind: SolverKind,
    bc_low: [Boundary; 3],
    bc_high: [Boundary; 3],
    dt: f64,
    time: f64,
    step: u64,
    e: Field,
    h: Field,
    j: Field,
    // Loss-aware E-update coefficients per edge: e' = ca*e + cb*(curl H - J).
    ca: Array4<f64>,
    cb: Array4<f64>,
    // H-update coefficient per face: dt / (mu * area).
    ch: Array4<f64>,
    // Edge lengths entering the E circulation (cut for FIT, nominal for FDTD).
    le: Array4<f64>,
    // Dual spacings between adjacent H positions, per axis plane.
    tdx: Array1<f64>,
    tdy: Array1<f64>,
    tdz: Array1<f64>,
}

impl EmSolver {
    /// Creates a new `EmSolver` instance, allocating the field state and
    /// precomputing all material/geometry update coefficients.
    ///
    /// Every configuration or geometry defect is fatal here: no partial
    /// solver is ever returned.
    pub fn new(desc: EmSolverDescriptor) -> Result<Self, Error> {
        let EmSolverDescriptor {
            grid,
            materials,
            bc_low,
            bc_high,
            kind,
            courant,
        } = desc;

        let (nx, ny, nz) = (grid.nx(), grid.ny(), grid.nz());
        if materials.dim() != (nx, ny, nz) {
            return Err(Error::BadInit {
                array_name: "material".to_string(),
                input_shape: materials.dim(),
                expected_shape: (nx, ny, nz),
            });
        }
        for (a, axis) in ['x', 'y', 'z'].into_iter().enumerate() {
            let periodic_low = bc_low[a] == Boundary::Periodic;
            let periodic_high = bc_high[a] == Boundary::Periodic;
            if periodic_low != periodic_high {
                return Err(Error::UnsupportedBoundary {
                    axis,
                    low: bc_low[a],
                    high: bc_high[a],
                });
            }
        }

        let dt = courant
            * grid.cfl_bound()
            * materials.min_refractive_product().sqrt();

        let mut solver = Self {
            e: Field::new(nx, ny, nz),
            h: Field::new(nx, ny, nz),
            j: Field::new(nx, ny, nz),
            ca: Array4::zeros((nx + 2, ny + 2, nz + 2, 3)),
            cb: Array4::zeros((nx + 2, ny + 2, nz + 2, 3)),
            ch: Array4::zeros((nx + 2, ny + 2, nz + 2, 3)),
            le: Array4::zeros((nx + 2, ny + 2, nz + 2, 3)),
            tdx: dual_spacing(grid.dx(), bc_low[0] == Boundary::Periodic),
            tdy: dual_spacing(grid.dy(), bc_low[1] == Boundary::Periodic),
            tdz: dual_spacing(grid.dz(), bc_low[2] == Boundary::Periodic),
            grid,
            materials,
            kind,
            bc_low,
            bc_high,
            dt,
            time: 0.0,
            step: 0,
        };
        solver.build_edge_lengths();
        solver.build_h_coefficients()?;
        solver.build_e_coefficients()?;
        Ok(solver)
    }

    fn build_edge_lengths(&mut self) {
        let (nx, ny, nz) = (self.grid.nx(), self.grid.ny(), self.grid.nz());
        // Ghost slots default to the clamped nominal spacing; under PEC they
        // multiply a zero field value, under periodic they are rewrapped below.
        for fi in 0..nx + 2 {
            for fj in 0..ny + 2 {
                for fk in 0..nz + 2 {
                    let gi = fi.clamp(1, nx) - 1;
                    let gj = fj.clamp(1, ny) - 1;
                    let gk = fk.clamp(1, nz) - 1;
                    let interior = (1..=nx).contains(&fi)
                        && (1..=ny).contains(&fj)
                        && (1..=nz).contains(&fk);
                    let (lx, ly, lz) = if interior && self.kind == SolverKind::Fit {
                        (
                            self.grid.lx()[[gi, gj, gk]],
                            self.grid.ly()[[gi, gj, gk]],
                            self.grid.lz()[[gi, gj, gk]],
                        )
                    } else {
                        (
                            self.grid.dx()[gi],
                            self.grid.dy()[gj],
                            self.grid.dz()[gk],
                        )
                    };
                    self.le[[fi, fj, fk, 0]] = lx;
                    self.le[[fi, fj, fk, 1]] = ly;
                    self.le[[fi, fj, fk, 2]] = lz;
                }
            }
        }
        self.wrap_periodic(|solver| &mut solver.le);
    }

    fn build_h_coefficients(&mut self) -> Result<(), Error> {
        let (nx, ny, nz) = (self.grid.nx(), self.grid.ny(), self.grid.nz());
        for gi in 0..nx {
            for gj in 0..ny {
                for gk in 0..nz {
                    for axis in Axis::ALL {
                        let c = axis.index();
                        let (flag, area) = match (self.kind, axis) {
                            (SolverKind::Fit, Axis::X) => (
                                self.grid.flag_int_yz()[[gi, gj, gk]],
                                self.grid.syz()[[gi, gj, gk]],
                            ),
                            (SolverKind::Fit, Axis::Y) => (
                                self.grid.flag_int_zx()[[gi, gj, gk]],
                                self.grid.szx()[[gi, gj, gk]],
                            ),
                            (SolverKind::Fit, Axis::Z) => (
                                self.grid.flag_int_xy()[[gi, gj, gk]],
                                self.grid.sxy()[[gi, gj, gk]],
                            ),
                            (SolverKind::Fdtd, Axis::X) => {
                                (true, self.grid.dy()[gj] * self.grid.dz()[gk])
                            }
                            (SolverKind::Fdtd, Axis::Y) => {
                                (true, self.grid.dz()[gk] * self.grid.dx()[gi])
                            }
                            (SolverKind::Fdtd, Axis::Z) => {
                                (true, self.grid.dx()[gi] * self.grid.dy()[gj])
                            }
                        };
                        if !flag {
                            continue;
                        }

                        // Face-averaged permeability over the two straddling
                        // cells; a face between conductors carries no flux.
                        let mut mu_sum = 0.0;
                        let mut count = 0;
                        let mut neighbor = |i: isize, j: isize, k: isize| {
                            if i >= 0 && j >= 0 && k >= 0 {
                                let m = self.materials.get(i as usize, j as usize, k as usize);
                                if !m.is_pec() {
                                    mu_sum += m.mu_r();
                                    count += 1;
                                }
                            }
                        };
                        let (i, j, k) = (gi as isize, gj as isize, gk as isize);
                        match axis {
                            Axis::X => {
                                neighbor(i - 1, j, k);
                                neighbor(i, j, k);
                            }
                            Axis::Y => {
                                neighbor(i, j - 1, k);
                                neighbor(i, j, k);
                            }
                            Axis::Z => {
                                neighbor(i, j, k - 1);
                                neighbor(i, j, k);
                            }
                        }
                        if count == 0 {
                            continue;
                        }

                        let coeff = self.dt / (MU0 * (mu_sum / count as f64) * area);
                        if !coeff.is_finite() {
                            return Err(Error::DegenerateCell {
                                i: gi,
                                j: gj,
                                k: gk,
                                axis,
                            });
                        }
                        self.ch[[gi + 1, gj + 1, gk + 1, c]] = coeff;
                    }
                }
            }
        }
        Ok(())
    }

    fn build_e_coefficients(&mut self) -> Result<(), Error> {
        let (nx, ny, nz) = (self.grid.nx(), self.grid.ny(), self.grid.nz());
        for gi in 0..nx {
            for gj in 0..ny {
                for gk in 0..nz {
                    for axis in Axis::ALL {
                        let c = axis.index();
                        // An edge swallowed by a conductor keeps zero
                        // tangential E; its coefficients stay zero.
                        if self.kind == SolverKind::Fit {
                            let cut = match axis {
                                Axis::X => self.grid.lx()[[gi, gj, gk]],
                                Axis::Y => self.grid.ly()[[gi, gj, gk]],
                                Axis::Z => self.grid.lz()[[gi, gj, gk]],
                            };
                            if cut <= 0.0 {
                                continue;
                            }
                        }

                        // Average permittivity and conductivity over the up
                        // to four cells sharing the edge.
                        let mut eps_sum = 0.0;
                        let mut sig_sum = 0.0;
                        let mut count = 0;
                        let mut pec_neighbor = false;
                        let mut neighbor = |i: isize, j: isize, k: isize| {
                            if i >= 0 && j >= 0 && k >= 0 {
                                let m = self.materials.get(i as usize, j as usize, k as usize);
                                if m.is_pec() {
                                    pec_neighbor = true;
                                } else {
                                    eps_sum += m.eps_r();
                                    sig_sum += m.sigma();
                                    count += 1;
                                }
                            }
                        };
                        let (i, j, k) = (gi as isize, gj as isize, gk as isize);
                        match axis {
                            Axis::X => {
                                neighbor(i, j - 1, k - 1);
                                neighbor(i, j - 1, k);
                                neighbor(i, j, k - 1);
                                neighbor(i, j, k);
                            }
                            Axis::Y => {
                                neighbor(i - 1, j, k - 1);
                                neighbor(i - 1, j, k);
                                neighbor(i, j, k - 1);
                                neighbor(i, j, k);
                            }
                            Axis::Z => {
                                neighbor(i - 1, j - 1, k);
                                neighbor(i - 1, j, k);
                                neighbor(i, j - 1, k);
                                neighbor(i, j, k);
                            }
                        }
                        if count == 0 {
                            continue;
                        }
                        // Voxelized conductors pin their surface edges in the
                        // full-cell variant; FIT resolves them via cut lengths.
                        if self.kind == SolverKind::Fdtd && pec_neighbor {
                            continue;
                        }

                        let eps = EPS0 * eps_sum / count as f64;
                        let sigma = sig_sum / count as f64;
                        let loss = sigma * self.dt / (2.0 * eps);
                        let ca = (1.0 - loss) / (1.0 + loss);
                        let cb = self.dt / (eps * (1.0 + loss));
                        if !ca.is_finite() || !cb.is_finite() {
                            return Err(Error::DegenerateCell {
                                i: gi,
                                j: gj,
                                k: gk,
                                axis,
                            });
                        }
                        self.ca[[gi + 1, gj + 1, gk + 1, c]] = ca;
                        self.cb[[gi + 1, gj + 1, gk + 1, c]] = cb;
                    }
                }
            }
        }
        Ok(())
    }

    /// Copies low/high interior planes into the opposite ghost planes on
    /// every periodic axis of the given padded array.
    fn wrap_periodic<F>(&mut self, pick: F)
    where
        F: Fn(&mut Self) -> &mut Array4<f64>,
    {
        let (nx, ny, nz) = (self.grid.nx(), self.grid.ny(), self.grid.nz());
        let periodic = [
            self.bc_low[0] == Boundary::Periodic,
            self.bc_low[1] == Boundary::Periodic,
            self.bc_low[2] == Boundary::Periodic,
        ];
        let arr = pick(self);
        if periodic[0] {
            for fj in 0..ny + 2 {
                for fk in 0..nz + 2 {
                    for c in 0..3 {
                        arr[[0, fj, fk, c]] = arr[[nx, fj, fk, c]];
                        arr[[nx + 1, fj, fk, c]] = arr[[1, fj, fk, c]];
                    }
                }
            }
        }
        if periodic[1] {
            for fi in 0..nx + 2 {
                for fk in 0..nz + 2 {
                    for c in 0..3 {
                        arr[[fi, 0, fk, c]] = arr[[fi, ny, fk, c]];
                        arr[[fi, ny + 1, fk, c]] = arr[[fi, 1, fk, c]];
                    }
                }
            }
        }
        if periodic[2] {
            for fi in 0..nx + 2 {
                for fj in 0..ny + 2 {
                    for c in 0..3 {
                        arr[[fi, fj, 0, c]] = arr[[fi, fj, nz, c]];
                        arr[[fi, fj, nz + 1, c]] = arr[[fi, fj, 1, c]];
                    }
                }
            }
        }
    }

    fn update_h(&mut self) {
        let (nx, ny, nz) = (self.grid.nx(), self.grid.ny(), self.grid.nz());
        let ed = self.e.data();
        let le = &self.le;
        let ch = &self.ch;
        let hd = self.h.data_mut();
        for i in 1..=nx {
            for j in 1..=ny {
                for k in 1..=nz {
                    let cx = ch[[i, j, k, 0]];
                    if cx != 0.0 {
                        let circ = ed[[i, j + 1, k, 2]] * le[[i, j + 1, k, 2]]
                            - ed[[i, j, k, 2]] * le[[i, j, k, 2]]
                            - ed[[i, j, k + 1, 1]] * le[[i, j, k + 1, 1]]
                            + ed[[i, j, k, 1]] * le[[i, j, k, 1]];
                        hd[[i, j, k, 0]] -= cx * circ;
                    }
                    let cy = ch[[i, j, k, 1]];
                    if cy != 0.0 {
                        let circ = ed[[i, j, k + 1, 0]] * le[[i, j, k + 1, 0]]
                            - ed[[i, j, k, 0]] * le[[i, j, k, 0]]
                            - ed[[i + 1, j, k, 2]] * le[[i + 1, j, k, 2]]
                            + ed[[i, j, k, 2]] * le[[i, j, k, 2]];
                        hd[[i, j, k, 1]] -= cy * circ;
                    }
                    let cz = ch[[i, j, k, 2]];
                    if cz != 0.0 {
                        let circ = ed[[i + 1, j, k, 1]] * le[[i + 1, j, k, 1]]
                            - ed[[i, j, k, 1]] * le[[i, j, k, 1]]
                            - ed[[i, j + 1, k, 0]] * le[[i, j + 1, k, 0]]
                            + ed[[i, j, k, 0]] * le[[i, j, k, 0]];
                        hd[[i, j, k, 2]] -= cz * circ;
                    }
                }
            }
        }
    }

    fn update_e(&mut self) {
        let (nx, ny, nz) = (self.grid.nx(), self.grid.ny(), self.grid.nz());
        let hd = self.h.data();
        let jd = self.j.data();
        let (ca, cb) = (&self.ca, &self.cb);
        let (tdx, tdy, tdz) = (&self.tdx, &self.tdy, &self.tdz);
        let ed = self.e.data_mut();
        for i in 1..=nx {
            for j in 1..=ny {
                for k in 1..=nz {
                    let curl_x = (hd[[i, j, k, 2]] - hd[[i, j - 1, k, 2]]) / tdy[j - 1]
                        - (hd[[i, j, k, 1]] - hd[[i, j, k - 1, 1]]) / tdz[k - 1];
                    ed[[i, j, k, 0]] = ca[[i, j, k, 0]] * ed[[i, j, k, 0]]
                        + cb[[i, j, k, 0]] * (curl_x - jd[[i, j, k, 0]]);

                    let curl_y = (hd[[i, j, k, 0]] - hd[[i, j, k - 1, 0]]) / tdz[k - 1]
                        - (hd[[i, j, k, 2]] - hd[[i - 1, j, k, 2]]) / tdx[i - 1];
                    ed[[i, j, k, 1]] = ca[[i, j, k, 1]] * ed[[i, j, k, 1]]
                        + cb[[i, j, k, 1]] * (curl_y - jd[[i, j, k, 1]]);

                    let curl_z = (hd[[i, j, k, 1]] - hd[[i - 1, j, k, 1]]) / tdx[i - 1]
                        - (hd[[i, j, k, 0]] - hd[[i, j - 1, k, 0]]) / tdy[j - 1];
                    ed[[i, j, k, 2]] = ca[[i, j, k, 2]] * ed[[i, j, k, 2]]
                        + cb[[i, j, k, 2]] * (curl_z - jd[[i, j, k, 2]]);
                }
            }
        }
    }

    /// Forces tangential E to zero on PEC boundary planes and rewraps ghost
    /// planes on periodic axes.
    fn apply_bc_e(&mut self) {
        let (nx, ny, nz) = (self.grid.nx(), self.grid.ny(), self.grid.nz());
        let (bc_low, bc_high) = (self.bc_low, self.bc_high);
        let ed = self.e.data_mut();

        if bc_low[0] == Boundary::Pec {
            for fj in 0..ny + 2 {
                for fk in 0..nz + 2 {
                    ed[[1, fj, fk, 1]] = 0.0;
                    ed[[1, fj, fk, 2]] = 0.0;
                }
            }
        }
        if bc_high[0] == Boundary::Pec {
            for fj in 0..ny + 2 {
                for fk in 0..nz + 2 {
                    ed[[nx + 1, fj, fk, 1]] = 0.0;
                    ed[[nx + 1, fj, fk, 2]] = 0.0;
                }
            }
        }
        if bc_low[1] == Boundary::Pec {
            for fi in 0..nx + 2 {
                for fk in 0..nz + 2 {
                    ed[[fi, 1, fk, 0]] = 0.0;
                    ed[[fi, 1, fk, 2]] = 0.0;
                }
            }
        }
        if bc_high[1] == Boundary::Pec {
            for fi in 0..nx + 2 {
                for fk in 0..nz + 2 {
                    ed[[fi, ny + 1, fk, 0]] = 0.0;
                    ed[[fi, ny + 1, fk, 2]] = 0.0;
                }
            }
        }
        if bc_low[2] == Boundary::Pec {
            for fi in 0..nx + 2 {
                for fj in 0..ny + 2 {
                    ed[[fi, fj, 1, 0]] = 0.0;
                    ed[[fi, fj, 1, 1]] = 0.0;
                }
            }
        }
        if bc_high[2] == Boundary::Pec {
            for fi in 0..nx + 2 {
                for fj in 0..ny + 2 {
                    ed[[fi, fj, nz + 1, 0]] = 0.0;
                    ed[[fi, fj, nz + 1, 1]] = 0.0;
                }
            }
        }

        self.wrap_periodic(|solver| solver.e.data_mut());
    }

    fn apply_bc_h(&mut self) {
        self.wrap_periodic(|solver| solver.h.data_mut());
    }

    /// The largest stable time step for this grid and material fill. The
    /// solver does not enforce it; exceeding it silently diverges, which the
    /// caller detects through [`EmSolver::fields_finite`].
    pub fn cfl_bound(&self) -> f64 {
        self.grid.cfl_bound() * self.materials.min_refractive_product().sqrt()
    }

    /// Whether every E and H entry is still finite.
    pub fn fields_finite(&self) -> bool {
        self.e.is_finite() && self.h.is_finite()
    }

    /// Total electromagnetic field energy `sum(eps|E|^2 + mu|H|^2) * dV / 2`
    /// over non-conductor cells. Diagnostic only; E and H are half a step
    /// apart, so this oscillates at the round-off scale of the leapfrog.
    pub fn energy(&self) -> f64 {
        let (nx, ny, nz) = (self.grid.nx(), self.grid.ny(), self.grid.nz());
        let ed = self.e.data();
        let hd = self.h.data();
        let mut total = 0.0;
        for gi in 0..nx {
            for gj in 0..ny {
                for gk in 0..nz {
                    let m = self.materials.get(gi, gj, gk);
                    if m.is_pec() {
                        continue;
                    }
                    let dv = self.grid.dx()[gi] * self.grid.dy()[gj] * self.grid.dz()[gk];
                    let (i, j, k) = (gi + 1, gj + 1, gk + 1);
                    let e2 = ed[[i, j, k, 0]].powi(2)
                        + ed[[i, j, k, 1]].powi(2)
                        + ed[[i, j, k, 2]].powi(2);
                    let h2 = hd[[i, j, k, 0]].powi(2)
                        + hd[[i, j, k, 1]].powi(2)
                        + hd[[i, j, k, 2]].powi(2);
                    total += 0.5 * dv * (EPS0 * m.eps_r() * e2 + MU0 * m.mu_r() * h2);
                }
            }
        }
        total
    }

    /// Copies the E and H planes adjacent to a z seam, for a decomposition
    /// driver to ship to the neighboring rank.
    pub fn boundary_slice(&self, end: ZEnd) -> GhostSlice {
        let k = match end {
            ZEnd::Low => 1,
            ZEnd::High => self.grid.nz(),
        };
        GhostSlice {
            e: self.e.data().slice(s![.., .., k, ..]).to_owned(),
            h: self.h.data().slice(s![.., .., k, ..]).to_owned(),
        }
    }

    /// Installs a neighbor's seam planes into the local ghost layer.
    ///
    /// Invoked once per time step, after [`Solver::one_step`], so the next H
    /// update reads the neighbor's E at the current step. With a single ghost
    /// layer the neighbor's H plane lags the local E update by half a step;
    /// see DESIGN.md for the seam accuracy consequences.
    pub fn apply_ghost(&mut self, end: ZEnd, ghost: &GhostSlice) -> Result<(), Error> {
        let (nx, ny, nz) = (self.grid.nx(), self.grid.ny(), self.grid.nz());
        let expected = (nx + 2, ny + 2, 3);
        for (name, arr) in [("ghost E", &ghost.e), ("ghost H", &ghost.h)] {
            if arr.dim() != expected {
                return Err(Error::BadInit {
                    array_name: name.to_string(),
                    input_shape: arr.dim(),
                    expected_shape: expected,
                });
            }
        }
        let k = match end {
            ZEnd::Low => 0,
            ZEnd::High => nz + 1,
        };
        self.e
            .data_mut()
            .slice_mut(s![.., .., k, ..])
            .assign(&ghost.e);
        self.h
            .data_mut()
            .slice_mut(s![.., .., k, ..])
            .assign(&ghost.h);
        Ok(())
    }

    pub fn kind(&self) -> SolverKind {
        self.kind
    }

    pub fn step_count(&self) -> u64 {
        self.step
    }

    pub fn materials(&self) -> &MaterialMap {
        &self.materials
    }

    pub fn h_mut(&mut self) -> &mut Field {
        &mut self.h
    }
}

impl Solver for EmSolver {
    fn one_step(&mut self) {
        // Refresh pins and ghost wraps so the curl sees consistent boundary
        // values even right after user seeding.
        self.apply_bc_e();
        self.update_h();
        self.apply_bc_h();
        self.update_e();
        self.apply_bc_e();
        self.time += self.dt;
        self.step += 1;
    }

    fn apply_source(&mut self, source: &dyn Source) {
        source.inject(&mut self.j, &self.grid, self.time);
    }

    fn time(&self) -> f64 {
        self.time
    }

    fn dt(&self) -> f64 {
        self.dt
    }

    fn grid(&self) -> &Grid3D {
        &self.grid
    }

    fn e(&self) -> &Field {
        &self.e
    }

    fn h(&self) -> &Field {
        &self.h
    }

    fn current(&self) -> &Field {
        &self.j
    }

    fn e_mut(&mut self) -> &mut Field {
        &mut self.e
    }

    fn current_mut(&mut self) -> &mut Field {
        &mut self.j
    }
}

/// Spacings between adjacent dual (half-shifted) positions along one axis.
fn dual_spacing(d: &Array1<f64>, periodic: bool) -> Array1<f64> {
    let n = d.len();
    Array1::from_shape_fn(n, |i| {
        if i == 0 {
            if periodic {
                0.5 * (d[0] + d[n - 1])
            } else {
                d[0]
            }
        } else {
            0.5 * (d[i - 1] + d[i])
        }
    })
}
