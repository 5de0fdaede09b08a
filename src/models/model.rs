// src/models/model.rs
//! Two-level path simulation shared by every pricing model
//!
//! A model only describes one time step of its (price, variance) state. The
//! provided methods of [`PricingModel`] turn that step into batches of
//! trajectories: a single fine batch at level 0, and a coupled fine/coarse
//! pair above it, where the coarse path advances once per `M` fine steps with
//! the aggregated driver.

use crate::error::{validation::*, MlmcError, MlmcResult};
use crate::solvers::brownian::BrownianIncrements;
use crate::solvers::discretization::Discretization;
use ndarray::{Array2, Zip};
use rand::Rng;

/// Trajectories of one batch, shape `(num_paths, num_steps)`
///
/// Column `j` holds the state after step `j + 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct PathBatch {
    pub prices: Array2<f64>,
    pub variances: Array2<f64>,
}

impl PathBatch {
    /// Batch with every entry set to the initial state
    pub fn constant(num_paths: usize, num_steps: usize, s0: f64, v0: f64) -> Self {
        Self {
            prices: Array2::from_elem((num_paths, num_steps), s0),
            variances: Array2::from_elem((num_paths, num_steps), v0),
        }
    }

    pub fn num_paths(&self) -> usize {
        self.prices.nrows()
    }

    pub fn num_steps(&self) -> usize {
        self.prices.ncols()
    }
}

/// Output of one simulate call
#[derive(Debug, Clone, PartialEq)]
pub enum LevelPaths {
    /// Level 0: no coarse counterpart
    Base(PathBatch),
    /// Level > 0: fine and coarse paths driven by the same increments
    Coupled { fine: PathBatch, coarse: PathBatch },
}

impl LevelPaths {
    pub fn fine(&self) -> &PathBatch {
        match self {
            LevelPaths::Base(fine) => fine,
            LevelPaths::Coupled { fine, .. } => fine,
        }
    }

    pub fn coarse(&self) -> Option<&PathBatch> {
        match self {
            LevelPaths::Base(_) => None,
            LevelPaths::Coupled { coarse, .. } => Some(coarse),
        }
    }
}

/// Treatment of the base level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BaseLevel {
    /// Level 0 runs its own single-resolution Euler loop
    #[default]
    Simulated,
    /// Level 0 returns the initial state at every step, without time stepping
    Frozen,
}

pub trait PricingModel: Sync {
    /// Initial (price, variance)
    fn initial_state(&self) -> (f64, f64);

    /// Advance the state by one step of length `dt`
    fn advance(&self, s: &mut f64, v: &mut f64, r: f64, dt: f64, dw: f64, dz: f64);

    fn base_level(&self) -> BaseLevel {
        BaseLevel::Simulated
    }

    /// Simulate `num_paths` trajectories at `level` with fresh increments from `rng`
    fn simulate_level<R: Rng + ?Sized>(
        &self,
        r: f64,
        maturity: f64,
        refinement: usize,
        level: usize,
        num_paths: usize,
        rng: &mut R,
    ) -> MlmcResult<LevelPaths> {
        validate_paths(num_paths)?;
        validate_finite("r", r)?;
        let grid = Discretization::new(maturity, refinement, level)?;
        let increments = BrownianIncrements::draw(num_paths, grid.fine_steps, grid.fine_dt(), rng);
        self.evolve(r, &grid, &increments)
    }

    /// Evolve the paths of `grid` along the given fine increments
    fn evolve(
        &self,
        r: f64,
        grid: &Discretization,
        increments: &BrownianIncrements,
    ) -> MlmcResult<LevelPaths> {
        if increments.num_steps() != grid.fine_steps || increments.dz.dim() != increments.dw.dim()
        {
            return Err(MlmcError::InvalidConfiguration {
                field: "increments".to_string(),
                reason: format!(
                    "expected {} fine steps for level {}, got {}",
                    grid.fine_steps,
                    grid.level,
                    increments.num_steps()
                ),
            });
        }

        match (grid.coarse_steps, grid.coarse_dt()) {
            (Some(coarse_steps), Some(coarse_dt)) => Ok(self.evolve_coupled(
                r,
                grid.refinement,
                coarse_steps,
                grid.fine_dt(),
                coarse_dt,
                increments,
            )),
            _ => {
                let fine = match self.base_level() {
                    BaseLevel::Simulated => self.evolve_single(r, grid.fine_dt(), increments),
                    BaseLevel::Frozen => {
                        let (s0, v0) = self.initial_state();
                        PathBatch::constant(increments.num_paths(), grid.fine_steps, s0, v0)
                    }
                };
                Ok(LevelPaths::Base(fine))
            }
        }
    }

    /// Single-resolution Euler loop over every step of `increments`
    fn evolve_single(&self, r: f64, dt: f64, increments: &BrownianIncrements) -> PathBatch {
        let (s0, v0) = self.initial_state();
        let mut batch =
            PathBatch::constant(increments.num_paths(), increments.num_steps(), s0, v0);

        Zip::from(batch.prices.rows_mut())
            .and(batch.variances.rows_mut())
            .and(increments.dw.rows())
            .and(increments.dz.rows())
            .par_for_each(|mut prices, mut variances, dw, dz| {
                let (mut s, mut v) = (s0, v0);
                for step in 0..dw.len() {
                    self.advance(&mut s, &mut v, r, dt, dw[step], dz[step]);
                    prices[step] = s;
                    variances[step] = v;
                }
            });

        batch
    }

    /// Fine and coarse paths advanced together, `refinement` fine steps per coarse step
    fn evolve_coupled(
        &self,
        r: f64,
        refinement: usize,
        coarse_steps: usize,
        fine_dt: f64,
        coarse_dt: f64,
        increments: &BrownianIncrements,
    ) -> LevelPaths {
        let (s0, v0) = self.initial_state();
        let num_paths = increments.num_paths();
        let mut fine = PathBatch::constant(num_paths, increments.num_steps(), s0, v0);
        let mut coarse = PathBatch::constant(num_paths, coarse_steps, s0, v0);

        Zip::from(fine.prices.rows_mut())
            .and(fine.variances.rows_mut())
            .and(coarse.prices.rows_mut())
            .and(coarse.variances.rows_mut())
            .and(increments.dw.rows())
            .and(increments.dz.rows())
            .par_for_each(|mut fine_s, mut fine_v, mut coarse_s, mut coarse_v, dw, dz| {
                let (mut s_f, mut v_f) = (s0, v0);
                let (mut s_c, mut v_c) = (s0, v0);

                for i in 0..coarse_steps {
                    let mut dw_c = 0.0;
                    let mut dz_c = 0.0;
                    for j in 0..refinement {
                        let idx = i * refinement + j;
                        self.advance(&mut s_f, &mut v_f, r, fine_dt, dw[idx], dz[idx]);
                        fine_s[idx] = s_f;
                        fine_v[idx] = v_f;
                        dw_c += dw[idx];
                        dz_c += dz[idx];
                    }

                    self.advance(&mut s_c, &mut v_c, r, coarse_dt, dw_c, dz_c);
                    coarse_s[i] = s_c;
                    coarse_v[i] = v_c;
                }
            });

        LevelPaths::Coupled { fine, coarse }
    }
}
