use std::path::Path;

use ndarray::{Array1, s};

use crate::fit::Axis;
use crate::sources::Source;
use crate::wake::{WakeResults, WakeSolver};
use crate::{Error, Solver};

/// Describes a simulation.
pub struct SimulationDescriptor<S: Solver, B: Source> {
    /// The `Solver` for the simulation.
    pub solver: S,
    /// The beam (or other source) injected each step.
    pub beam: B,
    /// Optional wake postprocessor fed after every step.
    pub wake: Option<WakeSolver>,
}

/// Describes a simulation run.
pub struct RunDescriptor<P: AsRef<Path>> {
    /// How long, in simulated seconds, the run should last. `None` derives
    /// the duration from the wake solver's required traversal time; without
    /// a wake solver it requests no work.
    pub time_duration: Option<f64>,
    /// Whether or not to print information to the console.
    pub verbose: bool,
    /// What, if any, information to save to file.
    pub save_settings: Option<SaveSettings<P>>,
}

/// How data should be saved to file.
#[derive(Debug)]
pub struct SaveSettings<P: AsRef<Path>> {
    /// The path to the save file.
    pub filename: P,
    /// What information to save.
    pub save_type: SaveType,
    /// Whether or not to overwrite any possible saved data.
    pub overwrite: bool,
}

/// Represents what data to save.
#[derive(PartialEq, Debug)]
pub enum SaveType {
    /// Save the Ez line along z at the test column, every step.
    Line,
    /// Save the full Ez volume every step.
    Full,
}

// Steps between finiteness probes of the field state.
const FINITE_CHECK_EVERY: u64 = 50;

/// The main `struct` of the framework: drives source injection, stepping,
/// wake sampling and data capture.
pub struct Simulation<S: Solver, B: Source> {
    solver: S,
    beam: B,
    wake: Option<WakeSolver>,
}

impl<S: Solver, B: Source> Simulation<S, B> {
    /// Creates a new `Simulation` instance.
    #[inline]
    pub fn new(desc: SimulationDescriptor<S, B>) -> Result<Self, Error> {
        desc.beam.validate(desc.solver.grid())?;

        Ok(Self {
            solver: desc.solver,
            beam: desc.beam,
            wake: desc.wake,
        })
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }

    pub fn wake(&self) -> Option<&WakeSolver> {
        self.wake.as_ref()
    }

    /// Does a computational run; returns finalized wake results when a wake
    /// solver is attached.
    pub fn run<P: AsRef<Path>>(
        &mut self,
        desc: RunDescriptor<P>,
    ) -> Result<Option<WakeResults>, Error> {
        let dt = self.solver.dt();
        let duration = match desc.time_duration {
            Some(d) => d,
            None => match &self.wake {
                Some(wake) => (wake.required_time() - self.solver.time()).max(0.0),
                None => 0.0,
            },
        };
        let nsteps = (duration / dt).ceil() as usize;

        let grid = self.solver.grid();
        let (nx, ny, nz) = (grid.nx(), grid.ny(), grid.nz());
        let column = self
            .wake
            .as_ref()
            .map(|w| w.test_column())
            .unwrap_or((nx / 2, ny / 2));

        // Optionally create or extend the save file.
        let mut offset = 0;
        let file = if let Some(SaveSettings {
            ref filename,
            ref save_type,
            overwrite,
        }) = desc.save_settings
        {
            let filename = filename.as_ref();
            let file = if filename.exists() && !overwrite {
                let file = hdf5::File::append(filename)?;

                let previous_size = file.dataset("ez_line")?.shape()[0];
                offset = previous_size;
                file.dataset("ez_line")?
                    .resize((previous_size + nsteps, nz))?;
                if *save_type == SaveType::Full {
                    if let Ok(volume) = file.dataset("ez_volume") {
                        volume.resize((previous_size + nsteps, nx, ny, nz))?;
                    } else {
                        file.new_dataset::<f64>()
                            .shape((
                                hdf5::Extent::resizable(previous_size + nsteps),
                                nx,
                                ny,
                                nz,
                            ))
                            .create("ez_volume")?;
                    }
                }
                file
            } else {
                let file = hdf5::File::create(filename)?;

                file.new_dataset::<f64>()
                    .shape((hdf5::Extent::resizable(nsteps), nz))
                    .create("ez_line")?;
                if *save_type == SaveType::Full {
                    file.new_dataset::<f64>()
                        .shape((hdf5::Extent::resizable(nsteps), nx, ny, nz))
                        .create("ez_volume")?;
                }

                // save steps as file attributes
                let dt_attr = file
                    .new_attr::<f64>()
                    .shape(hdf5::Extents::Scalar)
                    .create("time_step");
                if let Ok(attr) = dt_attr {
                    attr.write_scalar(&dt)?;
                }
                let dz_attr = file
                    .new_attr::<f64>()
                    .shape(hdf5::Extents::Scalar)
                    .create("length_step");
                if let Ok(attr) = dz_attr {
                    attr.write_scalar(&(grid.dz().mean().unwrap_or(0.0)))?;
                }

                file
            };
            Some(file)
        } else {
            None
        };

        // setup output if verbose
        let bar = if desc.verbose {
            println!("# of time steps: {}", nsteps);
            Some(indicatif::ProgressBar::new(nsteps as u64))
        } else {
            None
        };

        for n in 0..nsteps {
            let Self {
                ref mut solver,
                ref beam,
                ref mut wake,
            } = *self;

            solver.apply_source(beam);
            solver.one_step();
            if let Some(wake) = wake {
                wake.sample(solver);
            }

            if let Some(ref file) = file {
                let ez = self.solver.e().component(Axis::Z);
                let line = Array1::from_iter((0..nz).map(|k| ez[[column.0, column.1, k]]));
                file.dataset("ez_line")?.write_slice(
                    line.view().insert_axis(ndarray::Axis(0)),
                    s![(offset + n)..(offset + n + 1), ..],
                )?;
                if let Ok(volume) = file.dataset("ez_volume") {
                    volume.write_slice(
                        ez.insert_axis(ndarray::Axis(0)),
                        s![(offset + n)..(offset + n + 1), .., .., ..],
                    )?;
                }
            }

            let step = (n + 1) as u64;
            if step % FINITE_CHECK_EVERY == 0 || n + 1 == nsteps {
                if !(self.solver.e().is_finite() && self.solver.h().is_finite()) {
                    return Err(Error::NonFiniteFields { step });
                }
            }

            if let Some(ref bar) = bar {
                bar.inc(1)
            }
        }

        if let Some(file) = file {
            file.close()?;
        }
        if let Some(ref bar) = bar {
            bar.finish();
        }

        self.wake.as_ref().map(|w| w.finalize()).transpose()
    }
}
