//! # fast-mlmc: Multilevel Monte Carlo for Path-Dependent Options
//!
//! A Rust library estimating the discounted expected payoff of path-dependent
//! options under stochastic volatility with the Multilevel Monte Carlo method.
//!
//! ## Key Features
//!
//! - **Adaptive MLMC**: level selection, optimal per-level sample allocation and
//!   a bias-based stopping rule for a target RMS accuracy
//! - **Coupled Paths**: coarse paths driven by pathwise-aggregated fine increments
//! - **Models**: Heston (full-truncation Euler) and geometric Brownian motion
//! - **Payoffs**: Asian, European and up-and-out barrier calls and puts
//! - **Running Statistics**: per-level moments merged batch by batch
//! - **Reproducible**: disjoint seeded random streams per level and batch
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fast_mlmc::mc::mlmc::mlmc;
//! use fast_mlmc::mc::payoffs::PathOption;
//! use fast_mlmc::models::heston::{Heston, HestonParams};
//!
//! let model = Heston::new(HestonParams::default()).expect("Valid parameters");
//! let option = PathOption::asian(0.0, 1.0, true);
//!
//! // r = 0, T = 1, M = 2, K = 100, eps = 0.01, 10_000 pilot paths per level
//! let (price, variance) =
//!     mlmc(&model, &option, 0.0, 1.0, 2, 100.0, 0.01, 10_000).expect("converges");
//! println!("Asian call: {:.4} (variance {:.2e})", price, variance);
//! ```

// Module declarations
pub mod analytics;
pub mod error;
pub mod math_utils;
pub mod mc;
pub mod models;
pub mod output;
pub mod rng;
pub mod solvers;

// Re-export commonly used types for convenience
pub use error::{MlmcError, MlmcResult};
pub use mc::mlmc::{mlmc, MlmcConfig, MlmcEstimate, MlmcEstimator};
pub use mc::payoffs::{OptionPayoff, PathOption, Payoff};
pub use models::model::{BaseLevel, LevelPaths, PathBatch, PricingModel};
