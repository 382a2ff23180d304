//! Wake potential and impedance postprocessing.
//!
//! The wake solver samples the electric field along the test trajectory once
//! per time step, and after the run integrates the samples into wake
//! potentials on a uniform s-grid, then into impedances by a discrete Fourier
//! transform deconvolved with the analytic Gaussian bunch spectrum.

use ndarray::{Array1, Array2};
use num_complex::Complex64;
use physical_constants::SPEED_OF_LIGHT_IN_VACUUM as C0;

use crate::fit::Axis;
use crate::grid::Grid3D;
use crate::{Error, Solver};

/// Describes the composition of a [`WakeSolver`].
pub struct WakeSolverDescriptor {
    /// Bunch charge in C.
    pub q: f64,
    /// Longitudinal RMS bunch length in m.
    pub sigmaz: f64,
    pub beta: f64,
    /// Transverse position of the source line charge.
    pub xsource: f64,
    pub ysource: f64,
    /// Transverse position of the test trajectory.
    pub xtest: f64,
    pub ytest: f64,
    /// Longitudinal extent of the wake potential, in m behind the bunch.
    pub wakelength: f64,
    /// Cells skipped at each z end of the integration window, removing
    /// boundary artifacts.
    pub add_space: usize,
    /// Injection time offset; must match the beam's.
    pub tinj: Option<f64>,
}

/// Stencil order of the nine sampled Ez lines: `(di + 1) * 3 + (dj + 1)`.
const CENTER: usize = 4;
const XP: usize = 7;
const XM: usize = 1;
const YP: usize = 5;
const YM: usize = 3;

/// Accumulates field samples along the test trajectory and integrates them
/// into wake potentials and impedances. Reads the solver, never mutates it.
pub struct WakeSolver {
    q: f64,
    sigmaz: f64,
    v: f64,
    ti: f64,
    wakelength: f64,
    it: usize,
    jt: usize,
    dxt: f64,
    dyt: f64,
    kmin: usize,
    kmax: usize,
    zmin: f64,
    zc: Array1<f64>,
    dzc: Array1<f64>,
    times: Vec<f64>,
    ez: Vec<Array2<f64>>,
    ex: Vec<Array1<f64>>,
    ey: Vec<Array1<f64>>,
}

/// Finalized wake potentials and impedances.
pub struct WakeResults {
    /// Longitudinal separation behind the bunch, in m.
    pub s: Array1<f64>,
    /// Longitudinal wake potential, V/C.
    pub wp: Array1<f64>,
    /// Transverse wake potentials integrated directly from Ex/Ey, V/C.
    pub wpx: Array1<f64>,
    pub wpy: Array1<f64>,
    /// Transverse wake potentials from the Panofsky-Wenzel construction.
    pub wpx_pw: Array1<f64>,
    pub wpy_pw: Array1<f64>,
    /// Frequencies of the impedance samples, Hz.
    pub f: Array1<f64>,
    /// Longitudinal impedance, Ohm.
    pub z: Array1<Complex64>,
    /// Transverse impedances, Ohm.
    pub zx: Array1<Complex64>,
    pub zy: Array1<Complex64>,
}

impl WakeSolver {
    /// Creates a new `WakeSolver` instance bound to a grid's sampling
    /// geometry.
    pub fn new(desc: WakeSolverDescriptor, grid: &Grid3D) -> Result<Self, Error> {
        let it = nearest_node(grid.x(), grid.nx(), desc.xtest);
        let jt = nearest_node(grid.y(), grid.ny(), desc.ytest);
        // The transverse stencil needs one neighbor on each side.
        if it == 0 || it + 1 >= grid.nx() || jt == 0 || jt + 1 >= grid.ny() {
            return Err(Error::SourceOutsideDomain {
                x: desc.xtest,
                y: desc.ytest,
            });
        }
        let kmin = desc.add_space;
        if kmin * 2 + 1 >= grid.nz() {
            return Err(Error::BadCellCount { axis: 'z' });
        }
        let kmax = grid.nz() - desc.add_space;

        let v = desc.beta * C0;
        let ti = desc
            .tinj
            .unwrap_or(8.53 * desc.sigmaz / (desc.beta * C0));

        Ok(Self {
            q: desc.q,
            sigmaz: desc.sigmaz,
            v,
            ti,
            wakelength: desc.wakelength,
            it,
            jt,
            dxt: grid.dx()[it],
            dyt: grid.dy()[jt],
            kmin,
            kmax,
            zmin: grid.zmin(),
            zc: Array1::from_iter((kmin..kmax).map(|k| grid.zc(k))),
            dzc: Array1::from_iter((kmin..kmax).map(|k| grid.dz()[k])),
            times: Vec::new(),
            ez: Vec::new(),
            ex: Vec::new(),
            ey: Vec::new(),
        })
    }

    /// Number of recorded steps.
    pub fn samples(&self) -> usize {
        self.times.len()
    }

    /// Grid column of the test trajectory.
    pub fn test_column(&self) -> (usize, usize) {
        (self.it, self.jt)
    }

    /// Simulated time needed before [`WakeSolver::finalize`] can cover the
    /// full wake length: injection delay plus bunch traversal of the
    /// integration window plus the wake length itself.
    pub fn required_time(&self) -> f64 {
        let nzw = self.kmax - self.kmin;
        self.ti + (self.zc[nzw - 1] - self.zmin + self.wakelength) / self.v
    }

    /// Samples the solver's E field along the test trajectory at the
    /// solver's current time. Called once per step, after `one_step()`.
    pub fn sample(&mut self, solver: &dyn Solver) {
        let nzw = self.kmax - self.kmin;
        let ez_view = solver.e().component(Axis::Z);
        let ex_view = solver.e().component(Axis::X);
        let ey_view = solver.e().component(Axis::Y);

        let mut ez = Array2::zeros((9, nzw));
        for di in 0..3usize {
            for dj in 0..3usize {
                let (i, j) = (self.it + di - 1, self.jt + dj - 1);
                for k in 0..nzw {
                    ez[[di * 3 + dj, k]] = ez_view[[i, j, k + self.kmin]];
                }
            }
        }
        let ex = Array1::from_iter(
            (0..nzw).map(|k| ex_view[[self.it, self.jt, k + self.kmin]]),
        );
        let ey = Array1::from_iter(
            (0..nzw).map(|k| ey_view[[self.it, self.jt, k + self.kmin]]),
        );
        self.record(solver.time(), ez, ex, ey);
    }

    fn record(&mut self, t: f64, ez: Array2<f64>, ex: Array1<f64>, ey: Array1<f64>) {
        self.times.push(t);
        self.ez.push(ez);
        self.ex.push(ex);
        self.ey.push(ey);
    }

    /// Linear interpolation of one recorded line at absolute time `t`;
    /// `None` outside the recorded window (excluded, not zero-padded).
    fn interp<F: Fn(usize, usize) -> f64>(&self, value: F, t: f64, k: usize) -> Option<f64> {
        let nt = self.times.len();
        if nt < 2 {
            return None;
        }
        let (t0, t1) = (self.times[0], self.times[nt - 1]);
        if t < t0 || t > t1 {
            return None;
        }
        let dt = (t1 - t0) / ((nt - 1) as f64);
        let p = (t - t0) / dt;
        let i0 = (p.floor() as usize).min(nt - 2);
        let frac = p - i0 as f64;
        Some(value(i0, k) * (1.0 - frac) + value(i0 + 1, k) * frac)
    }

    /// Integrates the recorded samples into wake potentials and impedances.
    pub fn finalize(&self) -> Result<WakeResults, Error> {
        let nzw = self.kmax - self.kmin;
        let have = self.times.last().copied().unwrap_or(0.0);
        let need = self.required_time();
        if self.times.len() < 2 || have < need {
            return Err(Error::WakeNotReady { have, need });
        }

        let ds = self.dzc.mean().unwrap_or(self.wakelength);
        let ns = ((self.wakelength / ds).round() as usize).max(2);
        let s = Array1::from_iter((0..ns).map(|m| m as f64 * ds));

        // Longitudinal wake potential for each stencil line.
        let mut wp9 = vec![Array1::<f64>::zeros(ns); 9];
        for (idx, wp) in wp9.iter_mut().enumerate() {
            for (m, wp_m) in wp.iter_mut().enumerate() {
                let sm = s[m];
                let mut acc = 0.0;
                for k in 0..nzw {
                    let t = self.ti + (self.zc[k] - self.zmin + sm) / self.v;
                    if let Some(ez) = self.interp(|n, k| self.ez[n][[idx, k]], t, k) {
                        acc += ez * self.dzc[k];
                    }
                }
                *wp_m = -acc / self.q;
            }
        }

        // Transverse wake potentials directly from the transverse field.
        let mut wpx = Array1::zeros(ns);
        let mut wpy = Array1::zeros(ns);
        for m in 0..ns {
            let sm = s[m];
            let (mut ax, mut ay) = (0.0, 0.0);
            for k in 0..nzw {
                let t = self.ti + (self.zc[k] - self.zmin + sm) / self.v;
                if let Some(ex) = self.interp(|n, k| self.ex[n][k], t, k) {
                    ax += ex * self.dzc[k];
                }
                if let Some(ey) = self.interp(|n, k| self.ey[n][k], t, k) {
                    ay += ey * self.dzc[k];
                }
            }
            wpx[m] = ax / self.q;
            wpy[m] = ay / self.q;
        }

        // Panofsky-Wenzel: dW_perp/ds = -grad_perp W_par, integrated from the
        // bunch head where the transverse wake vanishes.
        let mut wpx_pw = Array1::zeros(ns);
        let mut wpy_pw = Array1::zeros(ns);
        let (mut accx, mut accy) = (0.0, 0.0);
        for m in 0..ns {
            accx -= (wp9[XP][m] - wp9[XM][m]) / (2.0 * self.dxt) * ds;
            accy -= (wp9[YP][m] - wp9[YM][m]) / (2.0 * self.dyt) * ds;
            wpx_pw[m] = accx;
            wpy_pw[m] = accy;
        }

        let wp = wp9[CENTER].clone();
        let f = Array1::from_iter(
            (0..=ns / 2).map(|m| m as f64 * self.v / (ns as f64 * ds)),
        );
        let z = self.impedance(&wp, &f, ds);
        let zx = self.impedance(&wpx, &f, ds);
        let zy = self.impedance(&wpy, &f, ds);

        Ok(WakeResults {
            s,
            wp,
            wpx,
            wpy,
            wpx_pw,
            wpy_pw,
            f,
            z,
            zx,
            zy,
        })
    }

    /// DFT of a wake potential over s, deconvolved with the analytic
    /// Gaussian bunch spectrum.
    fn impedance(&self, wp: &Array1<f64>, f: &Array1<f64>, ds: f64) -> Array1<Complex64> {
        Array1::from_iter(f.iter().map(|&fm| {
            let mut sum = Complex64::new(0.0, 0.0);
            for (m, &w) in wp.iter().enumerate() {
                let phase = -2.0 * std::f64::consts::PI * fm * (m as f64) * ds / self.v;
                sum += Complex64::new(0.0, phase).exp() * w;
            }
            let arg = 2.0 * std::f64::consts::PI * fm * self.sigmaz / self.v;
            let spectrum = (-0.5 * arg * arg).exp();
            sum * ds / (self.v * spectrum)
        }))
    }
}

impl WakeResults {
    /// Highest frequency the s-grid resolves.
    pub fn nyquist(&self) -> f64 {
        self.f[self.f.len() - 1]
    }

    /// Longitudinal impedance interpolated at an arbitrary frequency.
    pub fn impedance_at(&self, f: f64) -> Result<Complex64, Error> {
        let nyquist = self.nyquist();
        if !(0.0..=nyquist).contains(&f) {
            return Err(Error::FrequencyOutOfRange { f, nyquist });
        }
        let df = self.f[1] - self.f[0];
        let p = f / df;
        let i0 = (p.floor() as usize).min(self.f.len() - 2);
        let frac = p - i0 as f64;
        Ok(self.z[i0] * (1.0 - frac) + self.z[i0 + 1] * frac)
    }

    /// Largest normalized mismatch between the directly integrated
    /// transverse wakes and their Panofsky-Wenzel reconstruction.
    pub fn panofsky_wenzel_deviation(&self) -> f64 {
        let norm = |a: &Array1<f64>| a.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
        let scale = norm(&self.wpx_pw)
            .max(norm(&self.wpy_pw))
            .max(norm(&self.wpx))
            .max(norm(&self.wpy))
            .max(f64::MIN_POSITIVE);
        let dev = |a: &Array1<f64>, b: &Array1<f64>| {
            a.iter()
                .zip(b.iter())
                .fold(0.0f64, |acc, (x, y)| acc.max((x - y).abs()))
        };
        dev(&self.wpx, &self.wpx_pw).max(dev(&self.wpy, &self.wpy_pw)) / scale
    }
}

fn nearest_node(nodes: &Array1<f64>, n: usize, pos: f64) -> usize {
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

    fn channel(nz: usize, zmax: f64) -> Grid3D {
        Grid3D::new(Grid3DDescriptor {
            xmin: -0.05,
            xmax: 0.05,
            ymin: -0.05,
            ymax: 0.05,
            zmin: 0.0,
            zmax,
            nx: 4,
            ny: 4,
            nz,
            ..Grid3DDescriptor::default()
        })
        .unwrap()
    }

    fn descriptor(wakelength: f64) -> WakeSolverDescriptor {
        WakeSolverDescriptor {
            q: 1e-9,
            sigmaz: 0.1,
            beta: 1.0,
            xsource: 0.0,
            ysource: 0.0,
            xtest: 0.0,
            ytest: 0.0,
            wakelength,
            add_space: 0,
            tinj: None,
        }
    }

    /// Feeds Ez samples that ride along with the bunch: the integral must
    /// reproduce the bunch's own profile as a function of s.
    #[test]
    fn wake_round_trip_reproduces_bunch_profile() {
        let grid = channel(100, 2.0);
        let desc = descriptor(0.5);
        let (q, sigmaz) = (desc.q, desc.sigmaz);
        let mut wake = WakeSolver::new(desc, &grid).unwrap();

        let v = wake.v;
        let ti = wake.ti;
        let profile = |u: f64| {
            (-0.5 * (u / sigmaz).powi(2)).exp()
                / ((2.0 * std::f64::consts::PI).sqrt() * sigmaz)
        };

        let dt = grid.dz()[0] / (2.0 * v);
        let t_need = ti + (2.0 + 0.5) / v;
        let nt = (t_need / dt).ceil() as usize + 2;
        let nzw = 100;
        for n in 0..nt {
            let t = n as f64 * dt;
            let mut ez = Array2::zeros((9, nzw));
            for idx in 0..9 {
                for k in 0..nzw {
                    let z0 = grid.zmin() + v * (t - ti);
                    ez[[idx, k]] = profile(grid.zc(k) - z0);
                }
            }
            wake.record(t, ez, Array1::zeros(nzw), Array1::zeros(nzw));
        }

        let results = wake.finalize().unwrap();
        let window: f64 = grid.dz().sum();
        for (m, &sm) in results.s.iter().enumerate() {
            let expected = -window / q * profile(sm);
            let tol = 5e-3 * window / q * profile(0.0);
            assert!(
                (results.wp[m] - expected).abs() < tol,
                "s = {}: wp = {}, expected {}",
                sm,
                results.wp[m],
                expected
            );
        }
        // Symmetric samples mean no transverse wake either way.
        assert!(results.panofsky_wenzel_deviation() < 1e-12);

        // Impedance endpoints behave: finite inside the range, error beyond.
        assert!(results.z.iter().all(|z| z.norm().is_finite()));
        assert!(results.impedance_at(results.nyquist() * 0.5).is_ok());
        assert!(matches!(
            results.impedance_at(results.nyquist() * 1.5),
            Err(Error::FrequencyOutOfRange { .. })
        ));
    }

    #[test]
    fn finalize_before_traversal_is_reported() {
        let grid = channel(50, 1.0);
        let mut wake = WakeSolver::new(descriptor(1.0), &grid).unwrap();
        wake.record(
            0.0,
            Array2::zeros((9, 50)),
            Array1::zeros(50),
            Array1::zeros(50),
        );
        wake.record(
            1e-12,
            Array2::zeros((9, 50)),
            Array1::zeros(50),
            Array1::zeros(50),
        );
        assert!(matches!(
            wake.finalize(),
            Err(Error::WakeNotReady { .. })
        ));
    }

    #[test]
    fn test_offset_needs_stencil_room() {
        let grid = channel(50, 1.0);
        let bad = WakeSolverDescriptor {
            xtest: -0.05,
            ..descriptor(0.5)
        };
        assert!(matches!(
            WakeSolver::new(bad, &grid),
            Err(Error::SourceOutsideDomain { .. })
        ));
    }
}
