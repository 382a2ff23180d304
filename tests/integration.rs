//! End-to-end checks of the solver physics and the wakefield pipeline.

use approx::assert_relative_eq;
use ndarray::Array3;
use physical_constants::{
    SPEED_OF_LIGHT_IN_VACUUM as C0, VACUUM_ELECTRIC_PERMITTIVITY as EPS0,
    VACUUM_MAG_PERMEABILITY as MU0,
};
use wakefit::prelude::*;

fn vacuum_cube(n: usize, kind: SolverKind, courant: f64) -> EmSolver {
    let grid = Grid3D::new(Grid3DDescriptor {
        nx: n,
        ny: n,
        nz: n,
        ..Grid3DDescriptor::default()
    })
    .unwrap();
    let materials = MaterialMap::voxelize(&grid);
    EmSolver::new(EmSolverDescriptor {
        grid,
        materials,
        bc_low: [Boundary::Pec; 3],
        bc_high: [Boundary::Pec; 3],
        kind,
        courant,
    })
    .unwrap()
}

/// A unit Ez excitation at the center of a 25^3 vacuum cube must, after one
/// step, magnetize exactly the four in-plane faces around the excited edge,
/// with magnitude dt*E0/(mu0*d).
#[test]
fn single_step_h_pattern_around_point_excitation() {
    let n = 25;
    let c = n / 2;
    let mut solver = vacuum_cube(n, SolverKind::Fit, 1.0);
    let e0 = C0;
    solver.e_mut().set(c, c, c, Axis::Z, e0).unwrap();
    solver.one_step();

    let d = 1.0 / (n as f64);
    let expected = solver.dt() * e0 / (MU0 * d);
    let hx = solver.h().component(Axis::X);
    let hy = solver.h().component(Axis::Y);
    let hz = solver.h().component(Axis::Z);

    assert_relative_eq!(hx[[c, c, c]], expected, max_relative = 1e-12);
    assert_relative_eq!(hx[[c, c - 1, c]], -expected, max_relative = 1e-12);
    assert_relative_eq!(hy[[c, c, c]], -expected, max_relative = 1e-12);
    assert_relative_eq!(hy[[c - 1, c, c]], expected, max_relative = 1e-12);

    let mut nonzero = 0;
    for i in 0..n {
        for j in 0..n {
            for k in 0..n {
                for arr in [&hx, &hy, &hz] {
                    if arr[[i, j, k]] != 0.0 {
                        nonzero += 1;
                    }
                }
            }
        }
    }
    assert_eq!(nonzero, 4);
}

/// Discrete leapfrog energy `eps|E^n|^2 + mu H^{n-1/2}.H^{n+1/2}` is an exact
/// invariant of the lossless update inside PEC walls.
#[test]
fn energy_is_conserved_in_closed_vacuum_cavity() {
    let n = 25;
    let c = n / 2;
    let mut solver = vacuum_cube(n, SolverKind::Fit, 0.5);
    solver.e_mut().set(c, c, c, Axis::Z, 1.0).unwrap();

    let dv = (1.0 / (n as f64)).powi(3);
    let u0 = EPS0 * dv; // eps * E0^2 * dV, H starts at zero

    let snapshot = |solver: &EmSolver| -> [Array3<f64>; 3] {
        [
            solver.h().component(Axis::X).to_owned(),
            solver.h().component(Axis::Y).to_owned(),
            solver.h().component(Axis::Z).to_owned(),
        ]
    };
    let e_squared = |solver: &EmSolver| -> f64 {
        Axis::ALL
            .iter()
            .map(|&a| solver.e().component(a).iter().map(|v| v * v).sum::<f64>())
            .sum()
    };

    let mut e2_prev = e_squared(&solver);
    assert_relative_eq!(EPS0 * e2_prev * dv, u0, max_relative = 1e-12);

    let mut h_prev = snapshot(&solver);
    for _ in 0..20 {
        solver.one_step();
        let h_now = snapshot(&solver);
        let h_cross: f64 = (0..3)
            .map(|a| {
                h_prev[a]
                    .iter()
                    .zip(h_now[a].iter())
                    .map(|(x, y)| x * y)
                    .sum::<f64>()
            })
            .sum();
        let u = (EPS0 * e2_prev + MU0 * h_cross) * dv;
        assert_relative_eq!(u, u0, max_relative = 1e-9);

        e2_prev = e_squared(&solver);
        h_prev = h_now;
    }
}

/// With no embedded conductors the FIT coefficients reduce to the full-cell
/// ones, and the two variants must agree at every step.
#[test]
fn fit_matches_fdtd_on_uncut_grid() {
    let n = 12;
    let c = n / 2;
    let mut fit = vacuum_cube(n, SolverKind::Fit, 0.5);
    let mut fdtd = vacuum_cube(n, SolverKind::Fdtd, 0.5);
    assert_relative_eq!(fit.dt(), fdtd.dt(), max_relative = 1e-15);

    fit.e_mut().set(c, c, c, Axis::Z, 1.0).unwrap();
    fdtd.e_mut().set(c, c, c, Axis::Z, 1.0).unwrap();

    for _ in 0..20 {
        fit.one_step();
        fdtd.one_step();
        for axis in Axis::ALL {
            let (ea, eb) = (fit.e().component(axis), fdtd.e().component(axis));
            let (ha, hb) = (fit.h().component(axis), fdtd.h().component(axis));
            let e_diff = ea
                .iter()
                .zip(eb.iter())
                .map(|(a, b)| (a - b).abs())
                .fold(0.0f64, f64::max);
            let h_diff = ha
                .iter()
                .zip(hb.iter())
                .map(|(a, b)| (a - b).abs())
                .fold(0.0f64, f64::max);
            assert!(e_diff < 1e-13, "E mismatch: {}", e_diff);
            assert!(h_diff < 1e-13, "H mismatch: {}", h_diff);
        }
    }
}

/// Below the CFL bound the fields stay bounded; at twice the bound the
/// update blows up within a bounded number of steps.
#[test]
fn cfl_bound_separates_stable_from_unstable() {
    let n = 12;
    let c = n / 2;

    let mut stable = vacuum_cube(n, SolverKind::Fit, 0.9);
    stable.e_mut().set(c, c, c, Axis::Z, 1.0).unwrap();
    for _ in 0..300 {
        stable.one_step();
    }
    assert!(stable.fields_finite());
    assert!(stable.e().norm_max() < 100.0);

    let mut unstable = vacuum_cube(n, SolverKind::Fit, 2.0);
    unstable.e_mut().set(c, c, c, Axis::Z, 1.0).unwrap();
    for _ in 0..60 {
        unstable.one_step();
    }
    assert!(
        !unstable.fields_finite() || unstable.e().norm_max() > 1e6,
        "update should diverge above the CFL bound"
    );
}

/// A smooth PEC pipe couples no net longitudinal energy to the beam: the
/// wake potential must vanish to numerical noise.
#[test]
fn straight_pec_pipe_has_no_longitudinal_wake() {
    let grid = Grid3D::new(Grid3DDescriptor {
        xmin: -0.06,
        xmax: 0.06,
        ymin: -0.06,
        ymax: 0.06,
        zmin: 0.0,
        zmax: 1.5,
        nx: 8,
        ny: 8,
        nz: 60,
        ..Grid3DDescriptor::default()
    })
    .unwrap();
    let materials = MaterialMap::voxelize(&grid);

    let wake = WakeSolver::new(
        WakeSolverDescriptor {
            q: 1e-9,
            sigmaz: 0.1,
            beta: 1.0,
            xsource: 0.0,
            ysource: 0.0,
            xtest: 0.0,
            ytest: 0.0,
            wakelength: 0.3,
            add_space: 8,
            tinj: None,
        },
        &grid,
    )
    .unwrap();

    let solver = EmSolver::new(EmSolverDescriptor {
        grid,
        materials,
        bc_low: [Boundary::Pec; 3],
        bc_high: [Boundary::Pec; 3],
        kind: SolverKind::Fit,
        courant: 0.9,
    })
    .unwrap();

    let mut simulation = Simulation::new(SimulationDescriptor {
        solver,
        beam: Beam {
            q: 1e-9,
            sigmaz: 0.1,
            beta: 1.0,
            xsource: 0.0,
            ysource: 0.0,
            tinj: None,
            z_injection: None,
        },
        wake: Some(wake),
    })
    .unwrap();

    let results = simulation
        .run(RunDescriptor {
            time_duration: None,
            verbose: false,
            save_settings: None::<SaveSettings<&str>>,
        })
        .unwrap()
        .unwrap();

    // 1e12 V/C is 1 V/pC; a resonant structure at these parameters would
    // show wakes orders of magnitude above this.
    let peak = results.wp.iter().fold(0.0f64, |acc, w| acc.max(w.abs()));
    assert!(peak < 1e12, "longitudinal wake should vanish, peak = {}", peak);
    let peak_t = results
        .wpx
        .iter()
        .chain(results.wpy.iter())
        .fold(0.0f64, |acc, w| acc.max(w.abs()));
    assert!(peak_t < 1e12, "transverse wake should vanish, peak = {}", peak_t);
}
