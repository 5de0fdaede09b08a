//! Option Payoff Functions
//!
//! # Mathematical Definitions
//!
//! Payoffs operate on the full simulated price path so both terminal-value
//! and path-dependent contracts fit the same interface.
//!
//! ## European Options
//! - **Call**: max(S_T - K, 0)
//! - **Put**: max(K - S_T, 0)
//!
//! ## Path-Dependent Options
//! - **Asian**: arithmetic average of the simulated prices against the strike
//! - **Barrier**: knocked out if the price touches the barrier level
//!
//! # Batch Interface
//!
//! The estimator only sees [`OptionPayoff`]: a batch of paths and a strike in,
//! one discounted payoff per path out.

use ndarray::{Array1, ArrayView1, ArrayView2};

/// Capability consumed by the MLMC estimator
///
/// Implementations must be pure: one scalar per row of `prices`, already
/// discounted to time zero.
pub trait OptionPayoff {
    fn payoff(&self, prices: ArrayView2<f64>, strike: f64) -> Array1<f64>;
}

/// Supported path payoffs, undiscounted
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Payoff {
    /// European call option: max(S_T - K, 0)
    EuropeanCall,

    /// European put option: max(K - S_T, 0)
    EuropeanPut,

    /// Asian call option: max(Avg(S_t) - K, 0)
    AsianCall,

    /// Asian put option: max(K - Avg(S_t), 0)
    AsianPut,

    /// Up-and-out barrier call: max(S_T - K, 0) if max(S_t) < H, else 0
    BarrierCallUpAndOut { h: f64 },

    /// Up-and-out barrier put: max(K - S_T, 0) if max(S_t) < H, else 0
    BarrierPutUpAndOut { h: f64 },
}

impl Payoff {
    /// Payoff of a single path `[S_1, ..., S_N]` for strike `k`
    pub fn calculate(&self, path: ArrayView1<f64>, k: f64) -> f64 {
        if path.is_empty() {
            return 0.0;
        }
        let terminal = path[path.len() - 1];

        match self {
            Payoff::EuropeanCall => (terminal - k).max(0.0),
            Payoff::EuropeanPut => (k - terminal).max(0.0),
            Payoff::AsianCall => (Self::average(path) - k).max(0.0),
            Payoff::AsianPut => (k - Self::average(path)).max(0.0),
            Payoff::BarrierCallUpAndOut { h } => {
                if Self::knocked_out(path, *h) {
                    0.0
                } else {
                    (terminal - k).max(0.0)
                }
            }
            Payoff::BarrierPutUpAndOut { h } => {
                if Self::knocked_out(path, *h) {
                    0.0
                } else {
                    (k - terminal).max(0.0)
                }
            }
        }
    }

    fn average(path: ArrayView1<f64>) -> f64 {
        path.sum() / path.len() as f64
    }

    fn knocked_out(path: ArrayView1<f64>, h: f64) -> bool {
        path.iter().any(|&price| price >= h)
    }
}

/// A path payoff discounted at `exp(-r T)`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PathOption {
    pub payoff: Payoff,
    pub risk_free_rate: f64,
    pub maturity: f64,
}

impl PathOption {
    pub fn new(payoff: Payoff, risk_free_rate: f64, maturity: f64) -> Self {
        Self {
            payoff,
            risk_free_rate,
            maturity,
        }
    }

    /// Arithmetic-average call (`is_call = true`) or put
    pub fn asian(risk_free_rate: f64, maturity: f64, is_call: bool) -> Self {
        let payoff = if is_call {
            Payoff::AsianCall
        } else {
            Payoff::AsianPut
        };
        Self::new(payoff, risk_free_rate, maturity)
    }

    pub fn discount_factor(&self) -> f64 {
        (-self.risk_free_rate * self.maturity).exp()
    }
}

impl OptionPayoff for PathOption {
    fn payoff(&self, prices: ArrayView2<f64>, strike: f64) -> Array1<f64> {
        let discount = self.discount_factor();
        prices
            .rows()
            .into_iter()
            .map(|path| discount * self.payoff.calculate(path, strike))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_asian_call_averages_each_row() {
        let prices = array![[90.0, 110.0, 130.0], [80.0, 90.0, 100.0]];
        let option = PathOption::asian(0.0, 1.0, true);

        let payoffs = option.payoff(prices.view(), 100.0);
        assert_eq!(payoffs, array![10.0, 0.0]);
    }

    #[test]
    fn test_asian_put_is_discounted() {
        let prices = array![[80.0, 90.0, 100.0]];
        let option = PathOption::asian(0.05, 2.0, false);

        let payoffs = option.payoff(prices.view(), 100.0);
        assert_relative_eq!(payoffs[0], 10.0 * (-0.1f64).exp());
    }

    #[test]
    fn test_european_uses_terminal_price() {
        let path = array![150.0, 50.0, 120.0];
        assert_eq!(Payoff::EuropeanCall.calculate(path.view(), 100.0), 20.0);
        assert_eq!(Payoff::EuropeanPut.calculate(path.view(), 130.0), 10.0);
    }

    #[test]
    fn test_barrier_knock_out() {
        let touched = array![100.0, 125.0, 110.0];
        let clean = array![100.0, 115.0, 110.0];
        let payoff = Payoff::BarrierCallUpAndOut { h: 120.0 };

        assert_eq!(payoff.calculate(touched.view(), 100.0), 0.0);
        assert_eq!(payoff.calculate(clean.view(), 100.0), 10.0);
        assert_eq!(
            Payoff::BarrierPutUpAndOut { h: 120.0 }.calculate(clean.view(), 115.0),
            5.0
        );
    }

    #[test]
    fn test_empty_path_pays_nothing() {
        let path = Array1::<f64>::zeros(0);
        assert_eq!(Payoff::AsianCall.calculate(path.view(), 0.0), 0.0);
    }
}
