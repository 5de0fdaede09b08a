// src/models/gbm.rs
use super::model::PricingModel;
use crate::error::{validation::*, MlmcResult};
use crate::solvers::euler_maruyama::FullTruncationEuler;

/// Geometric Brownian motion, Euler-discretized
///
/// The variance buffer stays at `σ²`; only the price driver is used.
#[derive(Clone, Copy, Debug)]
pub struct Gbm {
    pub s0: f64,
    pub sigma: f64,
}

impl Gbm {
    pub fn new(s0: f64, sigma: f64) -> MlmcResult<Self> {
        validate_positive("s0", s0)?;
        validate_positive("sigma", sigma)?;
        validate_finite("sigma", sigma)?;
        Ok(Gbm { s0, sigma })
    }
}

impl PricingModel for Gbm {
    fn initial_state(&self) -> (f64, f64) {
        (self.s0, self.sigma * self.sigma)
    }

    fn advance(&self, s: &mut f64, v: &mut f64, r: f64, dt: f64, dw: f64, _dz: f64) {
        *s = FullTruncationEuler::price_step(*s, *v, r, dt, dw);
    }
}
