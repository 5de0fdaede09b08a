//! Adaptive Multilevel Monte Carlo estimator
//!
//! # Mathematical Framework
//!
//! With `P_ℓ` the discounted payoff on the level-ℓ grid, the finest-level
//! expectation telescopes into level corrections:
//! ```text
//! E[P_L] = E[P_0] + Σ_{ℓ=1}^{L} E[P_ℓ - P_{ℓ-1}]
//! ```
//! Each correction is estimated from coupled fine/coarse paths, so its
//! variance `V_ℓ` shrinks with the step size `h_ℓ`.
//!
//! # Algorithm (one outer iteration)
//!
//! 1. **Pilot**: `default_num_paths` samples at every level `0..=L`
//! 2. **Allocation**: with `S = Σ √(V_ℓ / h_ℓ)`,
//!    ```text
//!    N_ℓ = ⌈ (0.5 / ε²) · √(V_ℓ h_ℓ) · S ⌉
//!    ```
//!    minimises cost for a total estimator variance of `ε² / 2`
//! 3. **Top-up**: levels with fewer than `N_ℓ` samples get the difference,
//!    merged through [`crate::mc::stats`]
//! 4. **Stopping rule**:
//!    ```text
//!    |Ŷ_L - Ŷ_{L-1} / M| < (M² - 1) ε / √2
//!    ```
//!    otherwise `L += 1` and the iteration repeats
//!
//! The level, iteration, per-level sample and wall-clock caps turn a run that
//! cannot meet the stopping rule into [`MlmcError::NonConvergence`].

use crate::error::{validation::*, MlmcError, MlmcResult};
use crate::math_utils::{two_sided_z, Timer};
use crate::mc::payoffs::OptionPayoff;
use crate::mc::stats::BatchMoments;
use crate::models::model::PricingModel;
use crate::rng::{RngFactory, StreamId};
use crate::solvers::discretization::Discretization;
use std::f64::consts::SQRT_2;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How the pilot batch of a later iteration treats existing level statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PilotMode {
    /// Replace the level statistics with the new pilot batch
    #[default]
    Fresh,
    /// Fold the new pilot batch into the existing statistics
    Merge,
}

/// How per-level results become the reported `(price, variance)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Aggregation {
    /// `Σ Ŷ_ℓ` and `Σ V_ℓ / N_ℓ`
    #[default]
    TelescopingSum,
    /// Mean of the level means and mean of the level variances
    LevelAverage,
}

#[derive(Debug, Clone)]
pub struct MlmcConfig {
    pub risk_free_rate: f64,
    pub maturity: f64,
    pub refinement_factor: usize,
    pub strike: f64,
    pub target_error: f64,
    pub default_num_paths: usize,
    pub initial_level: usize,
    pub max_level: usize,
    pub max_iterations: usize,
    pub batch_size: usize, // Largest single simulate call during top-up
    pub max_samples_per_level: usize,
    pub time_budget: Option<Duration>,
    pub seed: u64,
    pub pilot_mode: PilotMode,
    pub aggregation: Aggregation,
}

impl MlmcConfig {
    /// Validate the estimator configuration
    pub fn validate(&self) -> MlmcResult<()> {
        validate_finite("risk_free_rate", self.risk_free_rate)?;
        validate_positive("maturity", self.maturity)?;
        validate_finite("maturity", self.maturity)?;
        validate_refinement(self.refinement_factor)?;
        validate_non_negative("strike", self.strike)?;
        validate_finite("strike", self.strike)?;
        validate_positive("target_error", self.target_error)?;
        validate_finite("target_error", self.target_error)?;
        validate_paths(self.default_num_paths)?;
        validate_paths(self.batch_size)?;

        if self.initial_level == 0 {
            return Err(MlmcError::InvalidConfiguration {
                field: "initial_level".to_string(),
                reason: "the stopping rule compares levels L and L-1, so L must be at least 1"
                    .to_string(),
            });
        }
        if self.max_level < self.initial_level {
            return Err(MlmcError::InvalidConfiguration {
                field: "max_level".to_string(),
                reason: format!(
                    "must be at least initial_level ({}), got {}",
                    self.initial_level, self.max_level
                ),
            });
        }
        if self.max_iterations == 0 {
            return Err(MlmcError::InvalidConfiguration {
                field: "max_iterations".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.max_samples_per_level < self.default_num_paths {
            return Err(MlmcError::InvalidConfiguration {
                field: "max_samples_per_level".to_string(),
                reason: format!(
                    "must cover at least one pilot batch ({} paths)",
                    self.default_num_paths
                ),
            });
        }

        // Every level up to the cap must have an integral grid
        for level in 0..=self.max_level {
            Discretization::new(self.maturity, self.refinement_factor, level)?;
        }

        Ok(())
    }
}

impl Default for MlmcConfig {
    fn default() -> Self {
        MlmcConfig {
            risk_free_rate: 0.0,
            maturity: 1.0,
            refinement_factor: 2,
            strike: 100.0,
            target_error: 0.01,
            default_num_paths: 10_000,
            initial_level: 2,
            max_level: 10,
            max_iterations: 16,
            batch_size: 100_000,
            max_samples_per_level: 50_000_000,
            time_budget: None,
            seed: 12345,
            pilot_mode: PilotMode::Fresh,
            aggregation: Aggregation::TelescopingSum,
        }
    }
}

/// Accumulated statistics of one active level
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelSummary {
    pub level: usize,
    pub step_size: f64,
    pub samples: usize,
    pub mean: f64,
    pub variance: f64,
}

impl LevelSummary {
    fn new(level: usize, step_size: f64, moments: BatchMoments) -> Self {
        Self {
            level,
            step_size,
            samples: moments.count,
            mean: moments.mean,
            variance: moments.variance,
        }
    }

    fn moments(&self) -> BatchMoments {
        BatchMoments::new(self.samples, self.mean, self.variance)
    }

    fn set_moments(&mut self, moments: BatchMoments) {
        self.samples = moments.count;
        self.mean = moments.mean;
        self.variance = moments.variance;
    }
}

/// Result of a converged run
#[derive(Debug, Clone, PartialEq)]
pub struct MlmcEstimate {
    pub price: f64,
    pub variance: f64,
    pub levels: Vec<LevelSummary>,
    pub iterations: usize,
    pub finest_level: usize,
    pub elapsed: Duration,
    pub aggregation: Aggregation,
}

impl MlmcEstimate {
    /// Standard error of the telescoping estimator, `√(Σ V_ℓ / N_ℓ)`
    pub fn standard_error(&self) -> f64 {
        self.levels
            .iter()
            .map(|l| l.moments().mean_variance())
            .sum::<f64>()
            .sqrt()
    }

    /// Normal confidence interval around `price`
    pub fn confidence_interval(&self, confidence: f64) -> Option<(f64, f64)> {
        let half_width = two_sided_z(confidence)? * self.standard_error();
        Some((self.price - half_width, self.price + half_width))
    }

    pub fn total_samples(&self) -> usize {
        self.levels.iter().map(|l| l.samples).sum()
    }

    /// Cost in units of base-level steps, `Σ N_ℓ / h_ℓ`
    pub fn cost(&self) -> f64 {
        self.levels
            .iter()
            .map(|l| l.samples as f64 / l.step_size)
            .sum()
    }
}

pub struct MlmcEstimator<'a, P: PricingModel, O: OptionPayoff> {
    model: &'a P,
    option: &'a O,
    config: MlmcConfig,
    rng_factory: RngFactory,
}

impl<'a, P: PricingModel, O: OptionPayoff> MlmcEstimator<'a, P, O> {
    pub fn new(model: &'a P, option: &'a O, config: MlmcConfig) -> MlmcResult<Self> {
        config.validate()?;
        let rng_factory = RngFactory::new(config.seed);
        Ok(Self {
            model,
            option,
            config,
            rng_factory,
        })
    }

    pub fn config(&self) -> &MlmcConfig {
        &self.config
    }

    /// Run the level loop until the stopping rule holds
    pub fn run(&self) -> MlmcResult<MlmcEstimate> {
        let cfg = &self.config;
        let timer = Timer::new();
        let mut finest = cfg.initial_level;
        let mut levels: Vec<LevelSummary> = Vec::with_capacity(cfg.max_level + 1);
        let mut iteration = 0;

        loop {
            if iteration == cfg.max_iterations {
                return Err(self.non_convergence(
                    iteration,
                    finest,
                    format!("iteration cap of {} reached", cfg.max_iterations),
                ));
            }
            iteration += 1;
            self.check_budget(&timer, iteration, finest)?;
            info!(iteration, finest_level = finest, "starting MLMC iteration");

            self.pilot_pass(&mut levels, iteration, finest)?;
            let optimal = self.optimal_samples(&levels)?;
            self.top_up_pass(&mut levels, &optimal, iteration, finest, &timer)?;

            let (gap, tolerance) = self.bias_check(&levels, finest);
            if gap < tolerance {
                info!(
                    iteration,
                    finest_level = finest,
                    gap,
                    tolerance,
                    "MLMC converged"
                );
                break;
            }

            debug!(finest_level = finest, gap, tolerance, "bias test failed");
            if finest >= cfg.max_level {
                return Err(self.non_convergence(
                    iteration,
                    finest,
                    format!(
                        "maximum level {} reached with |Y_L - Y_(L-1)/M| = {:.6} ≥ {:.6}",
                        cfg.max_level, gap, tolerance
                    ),
                ));
            }
            if finest + 1 == cfg.max_level {
                warn!(max_level = cfg.max_level, "MLMC entering its last allowed level");
            }
            finest += 1;
        }

        Ok(self.aggregate(levels, iteration, finest, timer.elapsed()))
    }

    /// Simulate `num_paths` coupled samples of `P_ℓ - P_{ℓ-1}` (or `P_0`) and summarise them
    pub fn sample_level(
        &self,
        level: usize,
        num_paths: usize,
        stream: StreamId,
    ) -> MlmcResult<BatchMoments> {
        let cfg = &self.config;
        let mut rng = self.rng_factory.create_stream(stream);
        let paths = self.model.simulate_level(
            cfg.risk_free_rate,
            cfg.maturity,
            cfg.refinement_factor,
            level,
            num_paths,
            &mut rng,
        )?;

        let fine = self.option.payoff(paths.fine().prices.view(), cfg.strike);
        let differences = match paths.coarse() {
            Some(coarse) => &fine - &self.option.payoff(coarse.prices.view(), cfg.strike),
            None => fine,
        };

        if let Some(bad) = differences.iter().find(|x| !x.is_finite()) {
            return Err(MlmcError::NumericalInstability {
                method: format!("level {} payoff", level),
                reason: format!("non-finite payoff difference {}", bad),
            });
        }

        let moments = BatchMoments::from_samples(differences.view())?;
        debug!(
            level,
            paths = num_paths,
            mean = moments.mean,
            variance = moments.variance,
            "sampled level batch"
        );
        Ok(moments)
    }

    fn pilot_pass(
        &self,
        levels: &mut Vec<LevelSummary>,
        iteration: usize,
        finest: usize,
    ) -> MlmcResult<()> {
        let cfg = &self.config;

        for level in 0..=finest {
            let pilot =
                self.sample_level(level, cfg.default_num_paths, StreamId::new(iteration, level, 0))?;

            match levels.get_mut(level) {
                Some(summary) => {
                    let moments = match cfg.pilot_mode {
                        PilotMode::Fresh => pilot,
                        PilotMode::Merge => summary.moments().merge(&pilot)?,
                    };
                    summary.set_moments(moments);
                }
                None => {
                    let grid = Discretization::new(cfg.maturity, cfg.refinement_factor, level)?;
                    levels.push(LevelSummary::new(level, grid.step_size(), pilot));
                }
            }
        }

        Ok(())
    }

    /// `N_ℓ = ⌈(0.5/ε²) √(V_ℓ h_ℓ) Σ √(V_k / h_k)⌉` for every active level
    fn optimal_samples(&self, levels: &[LevelSummary]) -> MlmcResult<Vec<usize>> {
        let eps = self.config.target_error;
        let total: f64 = levels
            .iter()
            .map(|l| (l.variance / l.step_size).sqrt())
            .sum();
        let scale = 0.5 / (eps * eps);

        levels
            .iter()
            .map(|l| {
                let n = (scale * (l.variance * l.step_size).sqrt() * total).ceil();
                if n.is_finite() && n >= 0.0 {
                    Ok(n as usize)
                } else {
                    Err(MlmcError::NumericalInstability {
                        method: "MLMC sample allocation".to_string(),
                        reason: format!("optimal sample count {} at level {}", n, l.level),
                    })
                }
            })
            .collect()
    }

    fn top_up_pass(
        &self,
        levels: &mut [LevelSummary],
        optimal: &[usize],
        iteration: usize,
        finest: usize,
        timer: &Timer,
    ) -> MlmcResult<()> {
        let cfg = &self.config;

        for (summary, &target) in levels.iter_mut().zip(optimal) {
            if target <= summary.samples {
                continue;
            }
            if target > cfg.max_samples_per_level {
                return Err(self.non_convergence(
                    iteration,
                    finest,
                    format!(
                        "level {} needs {} samples, above the cap of {}",
                        summary.level, target, cfg.max_samples_per_level
                    ),
                ));
            }

            debug!(
                level = summary.level,
                current = summary.samples,
                target,
                "topping up level"
            );

            let mut remaining = target - summary.samples;
            let mut batch = 1;
            while remaining > 0 {
                self.check_budget(timer, iteration, finest)?;
                let n = remaining.min(cfg.batch_size);
                let extra =
                    self.sample_level(summary.level, n, StreamId::new(iteration, summary.level, batch))?;
                summary.set_moments(summary.moments().merge(&extra)?);
                remaining -= n;
                batch += 1;
            }
        }

        Ok(())
    }

    /// `(|Ŷ_L - Ŷ_{L-1}/M|, (M² - 1) ε / √2)`
    fn bias_check(&self, levels: &[LevelSummary], finest: usize) -> (f64, f64) {
        let m = self.config.refinement_factor as f64;
        let gap = (levels[finest].mean - levels[finest - 1].mean / m).abs();
        let tolerance = (m * m - 1.0) * self.config.target_error / SQRT_2;
        (gap, tolerance)
    }

    fn check_budget(&self, timer: &Timer, iteration: usize, finest: usize) -> MlmcResult<()> {
        match self.config.time_budget {
            Some(budget) if timer.elapsed() >= budget => Err(self.non_convergence(
                iteration,
                finest,
                format!("wall-clock budget of {:?} exhausted", budget),
            )),
            _ => Ok(()),
        }
    }

    fn non_convergence(&self, iterations: usize, level: usize, reason: String) -> MlmcError {
        warn!(iterations, level, %reason, "MLMC stopped without converging");
        MlmcError::NonConvergence {
            iterations,
            level,
            reason,
        }
    }

    fn aggregate(
        &self,
        levels: Vec<LevelSummary>,
        iterations: usize,
        finest_level: usize,
        elapsed: Duration,
    ) -> MlmcEstimate {
        let count = levels.len() as f64;
        let (price, variance) = match self.config.aggregation {
            Aggregation::TelescopingSum => (
                levels.iter().map(|l| l.mean).sum::<f64>(),
                levels.iter().map(|l| l.moments().mean_variance()).sum::<f64>(),
            ),
            Aggregation::LevelAverage => (
                levels.iter().map(|l| l.mean).sum::<f64>() / count,
                levels.iter().map(|l| l.variance).sum::<f64>() / count,
            ),
        };

        MlmcEstimate {
            price,
            variance,
            levels,
            iterations,
            finest_level,
            elapsed,
            aggregation: self.config.aggregation,
        }
    }
}

/// One-call MLMC price: returns `(price, variance)` with default caps
#[allow(clippy::too_many_arguments)]
pub fn mlmc<P: PricingModel, O: OptionPayoff>(
    model: &P,
    option: &O,
    risk_free_rate: f64,
    maturity: f64,
    refinement_factor: usize,
    strike: f64,
    target_error: f64,
    default_num_paths: usize,
) -> MlmcResult<(f64, f64)> {
    let config = MlmcConfig {
        risk_free_rate,
        maturity,
        refinement_factor,
        strike,
        target_error,
        default_num_paths,
        max_samples_per_level: MlmcConfig::default()
            .max_samples_per_level
            .max(default_num_paths),
        ..Default::default()
    };
    let estimate = MlmcEstimator::new(model, option, config)?.run()?;
    Ok((estimate.price, estimate.variance))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::heston::{Heston, HestonParams};
    use approx::assert_relative_eq;
    use ndarray::{Array1, ArrayView2};

    /// Pays `value` on every path regardless of the prices
    struct Constant {
        value: f64,
    }

    impl OptionPayoff for Constant {
        fn payoff(&self, prices: ArrayView2<f64>, _strike: f64) -> Array1<f64> {
            Array1::from_elem(prices.nrows(), self.value)
        }
    }

    /// Pays the number of time steps, so `Y_ℓ = M^(ℓ-1)` with zero variance
    struct StepCount;

    impl OptionPayoff for StepCount {
        fn payoff(&self, prices: ArrayView2<f64>, _strike: f64) -> Array1<f64> {
            Array1::from_elem(prices.nrows(), prices.ncols() as f64)
        }
    }

    /// Pays 1 on a 4-step grid, 1.5 on an 8-step grid and nothing otherwise
    struct Staircase;

    impl OptionPayoff for Staircase {
        fn payoff(&self, prices: ArrayView2<f64>, _strike: f64) -> Array1<f64> {
            let value = match prices.ncols() {
                4 => 1.0,
                8 => 1.5,
                _ => 0.0,
            };
            Array1::from_elem(prices.nrows(), value)
        }
    }

    /// Pays the terminal price
    struct Terminal;

    impl OptionPayoff for Terminal {
        fn payoff(&self, prices: ArrayView2<f64>, _strike: f64) -> Array1<f64> {
            prices.column(prices.ncols() - 1).to_owned()
        }
    }

    fn heston() -> Heston {
        Heston::new(HestonParams::default()).expect("Valid parameters")
    }

    fn small_config() -> MlmcConfig {
        MlmcConfig {
            default_num_paths: 200,
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(MlmcConfig::default().validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let bad = [
            MlmcConfig {
                target_error: 0.0,
                ..Default::default()
            },
            MlmcConfig {
                refinement_factor: 1,
                ..Default::default()
            },
            MlmcConfig {
                initial_level: 0,
                ..Default::default()
            },
            MlmcConfig {
                max_level: 1,
                ..Default::default()
            },
            MlmcConfig {
                default_num_paths: 0,
                ..Default::default()
            },
            MlmcConfig {
                maturity: 0.3,
                ..Default::default()
            },
        ];

        for cfg in &bad {
            assert!(cfg.validate().is_err(), "expected rejection of {:?}", cfg);
        }
    }

    #[test]
    fn test_constant_payoff_converges_on_first_pass() {
        let model = heston();
        let option = Constant { value: 3.0 };
        let estimator = MlmcEstimator::new(&model, &option, small_config()).unwrap();

        let estimate = estimator.run().expect("converges");

        assert_eq!(estimate.iterations, 1);
        assert_eq!(estimate.finest_level, 2);
        assert_eq!(estimate.levels.len(), 3);
        assert!(estimate.levels.iter().all(|l| l.samples == 200));
        assert_relative_eq!(estimate.price, 3.0);
        assert_eq!(estimate.variance, 0.0);
    }

    #[test]
    fn test_level_average_aggregation() {
        let model = heston();
        let option = Constant { value: 3.0 };
        let config = MlmcConfig {
            aggregation: Aggregation::LevelAverage,
            ..small_config()
        };

        let estimate = MlmcEstimator::new(&model, &option, config)
            .unwrap()
            .run()
            .unwrap();

        // Level means are [3, 0, 0]
        assert_relative_eq!(estimate.price, 1.0);
        assert_eq!(estimate.aggregation, Aggregation::LevelAverage);
    }

    #[test]
    fn test_sample_cap_raises_non_convergence() {
        let model = heston();
        let config = MlmcConfig {
            target_error: 1e-3,
            max_samples_per_level: 1_000,
            ..small_config()
        };

        let err = MlmcEstimator::new(&model, &Terminal, config)
            .unwrap()
            .run()
            .unwrap_err();
        assert!(matches!(err, MlmcError::NonConvergence { iterations: 1, .. }));
    }

    #[test]
    fn test_level_cap_raises_non_convergence() {
        let model = heston();
        let config = MlmcConfig {
            max_level: 3,
            ..small_config()
        };

        let err = MlmcEstimator::new(&model, &StepCount, config)
            .unwrap()
            .run()
            .unwrap_err();
        assert!(matches!(
            err,
            MlmcError::NonConvergence {
                iterations: 2,
                level: 3,
                ..
            }
        ));
        assert!(err.to_string().contains("maximum level 3"));
    }

    #[test]
    fn test_iteration_cap() {
        let model = heston();
        let config = MlmcConfig {
            max_iterations: 1,
            ..small_config()
        };

        let err = MlmcEstimator::new(&model, &StepCount, config)
            .unwrap()
            .run()
            .unwrap_err();
        assert!(matches!(
            err,
            MlmcError::NonConvergence {
                iterations: 1,
                level: 3,
                ..
            }
        ));

        // A run converging inside its first iteration never reaches the cap
        let config = MlmcConfig {
            max_iterations: 1,
            ..small_config()
        };
        let estimator = MlmcEstimator::new(&model, &Constant { value: 1.0 }, config).unwrap();
        assert!(estimator.run().is_ok());
    }

    #[test]
    fn test_zero_time_budget() {
        let model = heston();
        let config = MlmcConfig {
            time_budget: Some(Duration::ZERO),
            ..small_config()
        };
        let err = MlmcEstimator::new(&model, &Constant { value: 1.0 }, config)
            .unwrap()
            .run()
            .unwrap_err();
        assert!(err.to_string().contains("wall-clock budget"));
    }

    #[test]
    fn test_pilot_modes() {
        let model = heston();

        // Y = [0, 0, 1, 0.5]: the bias test fails at L = 2 and holds at L = 3
        let fresh = MlmcEstimator::new(&model, &Staircase, small_config())
            .unwrap()
            .run()
            .unwrap();
        assert_eq!(fresh.iterations, 2);
        assert_eq!(fresh.finest_level, 3);
        assert_eq!(fresh.total_samples(), 4 * 200);
        assert_relative_eq!(fresh.price, 1.5);

        let merged = MlmcEstimator::new(
            &model,
            &Staircase,
            MlmcConfig {
                pilot_mode: PilotMode::Merge,
                ..small_config()
            },
        )
        .unwrap()
        .run()
        .unwrap();
        let samples: Vec<usize> = merged.levels.iter().map(|l| l.samples).collect();
        assert_eq!(samples, vec![400, 400, 400, 200]);
        assert_relative_eq!(merged.price, 1.5);
    }

    #[test]
    fn test_sample_level_is_reproducible() {
        let model = heston();
        let option = Terminal;
        let estimator = MlmcEstimator::new(&model, &option, small_config()).unwrap();
        let stream = StreamId::new(1, 2, 0);

        let a = estimator.sample_level(2, 500, stream).unwrap();
        let b = estimator.sample_level(2, 500, stream).unwrap();
        let c = estimator.sample_level(2, 500, StreamId::new(1, 2, 1)).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.count, 500);
    }

    #[test]
    fn test_optimal_samples_formula() {
        let model = heston();
        let option = Terminal;
        let config = MlmcConfig {
            target_error: 0.1,
            ..small_config()
        };
        let estimator = MlmcEstimator::new(&model, &option, config).unwrap();
        let levels = vec![
            LevelSummary::new(0, 1.0, BatchMoments::new(10, 0.0, 4.0)),
            LevelSummary::new(1, 0.5, BatchMoments::new(10, 0.0, 0.5)),
        ];

        // S = √4 + √1 = 3; N_0 = ⌈50 · 2 · 3⌉, N_1 = ⌈50 · 0.5 · 3⌉
        let optimal = estimator.optimal_samples(&levels).unwrap();
        assert_eq!(optimal, vec![300, 75]);
    }
}
