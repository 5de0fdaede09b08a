// src/solvers/euler_maruyama.rs
//! Full-Truncation Euler-Maruyama Steps
//!
//! # Mathematical Framework
//!
//! For the two-factor system
//! ```text
//! dS_t = r S_t dt + √V_t S_t dW_t
//! dV_t = κ(θ - V_t) dt + ξ√V_t dZ_t
//! ```
//!
//! the full-truncation scheme floors the variance wherever it enters a
//! coefficient, but keeps the unfloored value as state:
//! ```text
//! V⁺_n    = max(V_n, 0)
//! V_{n+1} = V_n + κ(θ - V⁺_n) Δt + ξ√V⁺_n ΔZ_n
//! S_{n+1} = S_n (1 + r Δt + √V⁺_n ΔW_n)
//! ```
//!
//! # Convergence Properties
//!
//! - **Strong convergence**: Order 0.5 in step size
//! - **Weak convergence**: Order 1.0 in step size
//! - Negative variance excursions never feed back into the coefficients

/// Full-truncation Euler-Maruyama scheme
pub struct FullTruncationEuler;

impl FullTruncationEuler {
    /// Variance update; the returned state may be transiently negative
    #[inline]
    pub fn variance_step(v: f64, kappa: f64, theta: f64, xi: f64, dt: f64, dz: f64) -> f64 {
        let v_pos = v.max(0.0);
        v + kappa * (theta - v_pos) * dt + xi * v_pos.sqrt() * dz
    }

    /// Multiplicative price update using the truncated instantaneous variance
    #[inline]
    pub fn price_step(s: f64, v: f64, r: f64, dt: f64, dw: f64) -> f64 {
        s * (1.0 + r * dt + v.max(0.0).sqrt() * dw)
    }
}
