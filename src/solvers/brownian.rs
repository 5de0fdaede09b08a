// src/solvers/brownian.rs
//! Brownian increments shared by the fine and coarse paths of a level
//!
//! # Coupling
//!
//! The coarse driver is never sampled on its own. Each coarse increment is the
//! pathwise sum of the `M` fine increments falling inside that coarse step:
//! ```text
//! ΔW_c[i] = Σ_{j=0}^{M-1} ΔW_f[i·M + j]
//! ```
//! This is what makes `P_fine - P_coarse` small and its variance decay with
//! the level.

use crate::error::{MlmcError, MlmcResult};
use crate::rng;
use ndarray::Array2;
use rand::Rng;

/// Increments of the two driving Brownian motions, shape `(num_paths, num_steps)`
///
/// `dw` drives the price, `dz` the variance process.
#[derive(Debug, Clone, PartialEq)]
pub struct BrownianIncrements {
    pub dw: Array2<f64>,
    pub dz: Array2<f64>,
}

impl BrownianIncrements {
    /// Draw independent `N(0, dt)` increments, path by path
    pub fn draw<R: Rng + ?Sized>(num_paths: usize, num_steps: usize, dt: f64, rng: &mut R) -> Self {
        let sqrt_dt = dt.sqrt();
        let mut dw = Array2::zeros((num_paths, num_steps));
        let mut dz = Array2::zeros((num_paths, num_steps));

        for path in 0..num_paths {
            for step in 0..num_steps {
                dw[[path, step]] = sqrt_dt * rng::get_normal_draw(rng);
                dz[[path, step]] = sqrt_dt * rng::get_normal_draw(rng);
            }
        }

        Self { dw, dz }
    }

    pub fn num_paths(&self) -> usize {
        self.dw.nrows()
    }

    pub fn num_steps(&self) -> usize {
        self.dw.ncols()
    }

    /// Aggregate consecutive groups of `refinement` steps into coarse increments
    pub fn coarsen(&self, refinement: usize) -> MlmcResult<Self> {
        if refinement == 0 || self.num_steps() % refinement != 0 {
            return Err(MlmcError::InvalidConfiguration {
                field: "refinement_factor".to_string(),
                reason: format!(
                    "{} fine steps cannot be grouped by {}",
                    self.num_steps(),
                    refinement
                ),
            });
        }

        Ok(Self {
            dw: aggregate(&self.dw, refinement),
            dz: aggregate(&self.dz, refinement),
        })
    }
}

fn aggregate(fine: &Array2<f64>, refinement: usize) -> Array2<f64> {
    let coarse_steps = fine.ncols() / refinement;
    Array2::from_shape_fn((fine.nrows(), coarse_steps), |(path, i)| {
        (0..refinement)
            .map(|j| fine[[path, i * refinement + j]])
            .sum::<f64>()
    })
}
