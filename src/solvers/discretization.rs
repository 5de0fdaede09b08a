// src/solvers/discretization.rs
//! Time grids of the multilevel hierarchy
//!
//! Level ℓ resolves the horizon `[0, T]` with `T·M^ℓ` steps of length `1/M^ℓ`,
//! so one coarse step of level ℓ-1 spans exactly `M` fine steps of level ℓ.
//! The allocation weight of a level is `h(ℓ) = T / M^ℓ`.

use crate::error::{validation::*, MlmcError, MlmcResult};

/// Largest number of fine steps a single level may request
pub const MAX_STEPS: usize = 1 << 20;

const INTEGRALITY_TOLERANCE: f64 = 1e-9;

/// Fine (and, above level 0, coarse) grid of one level
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Discretization {
    pub maturity: f64,
    pub refinement: usize,
    pub level: usize,
    pub fine_steps: usize,
    pub coarse_steps: Option<usize>,
}

impl Discretization {
    pub fn new(maturity: f64, refinement: usize, level: usize) -> MlmcResult<Self> {
        validate_positive("maturity", maturity)?;
        validate_finite("maturity", maturity)?;
        validate_refinement(refinement)?;

        let fine_steps = Self::step_count(maturity, refinement, level)?;
        let coarse_steps = if level == 0 {
            None
        } else {
            Some(Self::step_count(maturity, refinement, level - 1)?)
        };

        Ok(Self {
            maturity,
            refinement,
            level,
            fine_steps,
            coarse_steps,
        })
    }

    fn step_count(maturity: f64, refinement: usize, level: usize) -> MlmcResult<usize> {
        let exponent = i32::try_from(level).map_err(|_| MlmcError::InvalidConfiguration {
            field: "level".to_string(),
            reason: format!("level {} is out of range", level),
        })?;
        let steps = maturity * (refinement as f64).powi(exponent);
        let rounded = steps.round();

        if !steps.is_finite()
            || rounded < 1.0
            || (steps - rounded).abs() > INTEGRALITY_TOLERANCE * rounded.max(1.0)
        {
            return Err(MlmcError::InvalidDiscretization {
                maturity,
                refinement,
                level,
                steps,
            });
        }

        if rounded > MAX_STEPS as f64 {
            return Err(MlmcError::InvalidConfiguration {
                field: "level".to_string(),
                reason: format!(
                    "level {} needs {} steps, above the maximum of {}",
                    level, rounded, MAX_STEPS
                ),
            });
        }

        Ok(rounded as usize)
    }

    /// Allocation weight `h(ℓ) = T / M^ℓ`
    pub fn step_size(&self) -> f64 {
        self.maturity / (self.refinement as f64).powi(self.level as i32)
    }

    /// Length of one fine time step
    pub fn fine_dt(&self) -> f64 {
        self.maturity / self.fine_steps as f64
    }

    /// Length of one coarse time step, if the level has a coarse grid
    pub fn coarse_dt(&self) -> Option<f64> {
        self.coarse_steps.map(|steps| self.maturity / steps as f64)
    }
}
