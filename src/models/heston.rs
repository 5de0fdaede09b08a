// src/models/heston.rs
//! Heston Stochastic Volatility Model
//!
//! # Mathematical Framework
//!
//! ```text
//! dS_t = r S_t dt + √V_t S_t dW_t
//! dV_t = κ(θ - V_t) dt + ξ√V_t dZ̃_t,    dZ̃_t = ρ dW_t + √(1-ρ²) dZ_t
//! ```
//!
//! Where:
//! - S_t: Asset price
//! - V_t: Instantaneous variance (volatility squared)
//! - κ: Mean reversion speed for variance
//! - θ: Long-term variance level
//! - ξ: Volatility of variance (vol-of-vol)
//! - ρ: Correlation between the price and variance drivers
//!
//! # Feller Condition
//!
//! The variance stays strictly positive in continuous time when
//! ```text
//! 2κθ > ξ²
//! ```
//! When violated the discretized variance visits negative values more often;
//! the full-truncation scheme keeps the coefficients well defined regardless.
//!
//! # Discretization
//!
//! Full-truncation Euler, see [`crate::solvers::euler_maruyama`]. The
//! correlation is applied to the increments at the point of use, so coarse
//! paths driven by aggregated increments see exactly the same correlation.

use super::model::{BaseLevel, PricingModel};
use crate::error::{validation::*, MlmcError, MlmcResult};
use crate::solvers::euler_maruyama::FullTruncationEuler;
use tracing::warn;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HestonParams {
    pub s0: f64,    // Initial stock price
    pub v0: f64,    // Initial variance
    pub kappa: f64, // Mean reversion speed
    pub theta: f64, // Long-term variance
    pub xi: f64,    // Volatility of variance (vol-of-vol)
    pub rho: f64,   // Correlation between stock and variance
}

impl Default for HestonParams {
    fn default() -> Self {
        HestonParams {
            s0: 100.0,
            v0: 0.04,
            kappa: 2.0,
            theta: 0.04,
            xi: 0.3,
            rho: 0.0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Heston {
    pub params: HestonParams,
    pub base_level: BaseLevel,
    rho_complement: f64,
}

impl Heston {
    pub fn new(params: HestonParams) -> MlmcResult<Self> {
        Self::validate_params(&params)?;

        let feller = 2.0 * params.kappa * params.theta;
        if feller <= params.xi * params.xi {
            warn!(
                kappa = params.kappa,
                theta = params.theta,
                xi = params.xi,
                "Feller condition violated (2κθ ≤ ξ²); variance may hit zero"
            );
        }

        Ok(Heston {
            params,
            base_level: BaseLevel::Simulated,
            rho_complement: (1.0 - params.rho * params.rho).sqrt(),
        })
    }

    /// Select how level 0 is produced
    pub fn with_base_level(mut self, base_level: BaseLevel) -> Self {
        self.base_level = base_level;
        self
    }

    /// Validate Heston parameters
    fn validate_params(params: &HestonParams) -> MlmcResult<()> {
        validate_positive("s0", params.s0)?;
        validate_finite("s0", params.s0)?;
        validate_non_negative("v0", params.v0)?;
        validate_positive("kappa", params.kappa)?;
        validate_positive("theta", params.theta)?;
        validate_positive("xi", params.xi)?;
        validate_correlation("rho", params.rho)?;

        if params.kappa > 100.0 {
            return Err(MlmcError::InvalidParameters {
                parameter: "kappa".to_string(),
                value: params.kappa,
                constraint: "extremely high mean reversion speed (>100) may cause numerical issues"
                    .to_string(),
            });
        }

        if params.xi > 5.0 {
            return Err(MlmcError::InvalidParameters {
                parameter: "xi".to_string(),
                value: params.xi,
                constraint: "extremely high vol-of-vol (>5) may cause numerical issues".to_string(),
            });
        }

        if params.theta > 1.0 {
            return Err(MlmcError::InvalidParameters {
                parameter: "theta".to_string(),
                value: params.theta,
                constraint: "long-term variance >1 (100% vol) is unrealistic".to_string(),
            });
        }

        Ok(())
    }

    pub fn satisfies_feller(&self) -> bool {
        2.0 * self.params.kappa * self.params.theta > self.params.xi * self.params.xi
    }
}

impl PricingModel for Heston {
    fn initial_state(&self) -> (f64, f64) {
        (self.params.s0, self.params.v0)
    }

    fn advance(&self, s: &mut f64, v: &mut f64, r: f64, dt: f64, dw: f64, dz: f64) {
        let dw_v = self.params.rho * dw + self.rho_complement * dz;
        let v_now = *v;

        *v = FullTruncationEuler::variance_step(
            v_now,
            self.params.kappa,
            self.params.theta,
            self.params.xi,
            dt,
            dw_v,
        );
        *s = FullTruncationEuler::price_step(*s, v_now, r, dt, dw);
    }

    fn base_level(&self) -> BaseLevel {
        self.base_level
    }
}
