// tests/mlmc_test.rs
use fast_mlmc::analytics::bs_analytic::bs_call_price;
use fast_mlmc::mc::mlmc::{mlmc, Aggregation, MlmcConfig, MlmcEstimator, PilotMode};
use fast_mlmc::mc::payoffs::{PathOption, Payoff};
use fast_mlmc::models::gbm::Gbm;
use fast_mlmc::models::heston::{Heston, HestonParams};
use fast_mlmc::MlmcError;

fn asian_config(target_error: f64) -> MlmcConfig {
    MlmcConfig {
        risk_free_rate: 0.0,
        maturity: 1.0,
        refinement_factor: 2,
        strike: 100.0,
        target_error,
        default_num_paths: 10_000,
        ..Default::default()
    }
}

#[test]
fn test_heston_asian_call_converges() {
    let model = Heston::new(HestonParams::default()).expect("Valid parameters");
    let option = PathOption::asian(0.0, 1.0, true);
    let config = asian_config(0.01);

    let estimate = MlmcEstimator::new(&model, &option, config)
        .expect("valid configuration")
        .run()
        .expect("converges");

    println!(
        "Asian call: {:.5} ± {:.5} (L = {}, {} iterations, {} samples)",
        estimate.price,
        estimate.standard_error(),
        estimate.finest_level,
        estimate.iterations,
        estimate.total_samples()
    );

    assert!(estimate.finest_level <= 10);
    assert!(estimate.price.is_finite());
    assert!(estimate.price >= 0.0);
    // ATM Asian call at roughly 20% volatility
    assert!(estimate.price > 2.0 && estimate.price < 8.0, "price {}", estimate.price);

    assert_eq!(estimate.levels.len(), estimate.finest_level + 1);
    assert!(estimate.levels.iter().all(|l| l.samples >= 1));
    assert!(estimate.standard_error() < 2.0 * 0.01);

    // The coarsest level carries most of the variance
    let v0 = estimate.levels[0].variance;
    assert!(estimate.levels[1..].iter().all(|l| l.variance < v0));

    let (lo, hi) = estimate.confidence_interval(0.95).expect("valid confidence");
    assert!(lo < estimate.price && estimate.price < hi);
}

#[test]
fn test_mlmc_function_matches_estimator() {
    let model = Heston::new(HestonParams::default()).expect("Valid parameters");
    let option = PathOption::asian(0.0, 1.0, true);

    let (price, variance) =
        mlmc(&model, &option, 0.0, 1.0, 2, 100.0, 0.05, 10_000).expect("converges");
    let estimate = MlmcEstimator::new(&model, &option, asian_config(0.05))
        .unwrap()
        .run()
        .unwrap();

    assert_eq!(price, estimate.price);
    assert_eq!(variance, estimate.variance);
    assert!(variance > 0.0);
}

#[test]
fn test_runs_are_reproducible_for_a_seed() {
    let model = Heston::new(HestonParams {
        rho: -0.5,
        ..HestonParams::default()
    })
    .expect("Valid parameters");
    let option = PathOption::asian(0.0, 1.0, true);

    let run = |seed: u64| {
        let config = MlmcConfig {
            seed,
            ..asian_config(0.05)
        };
        MlmcEstimator::new(&model, &option, config)
            .unwrap()
            .run()
            .unwrap()
    };

    let first = run(7);
    let second = run(7);
    let other = run(8);

    assert_eq!(first.price, second.price);
    assert_eq!(first.levels, second.levels);
    assert_ne!(first.price, other.price);
}

#[test]
fn test_gbm_european_call_matches_black_scholes() {
    let (s0, sigma, r, t, k) = (100.0, 0.2, 0.05, 1.0, 100.0);
    let model = Gbm::new(s0, sigma).expect("Valid parameters");
    let option = PathOption::new(Payoff::EuropeanCall, r, t);
    let config = MlmcConfig {
        risk_free_rate: r,
        maturity: t,
        strike: k,
        target_error: 0.05,
        ..Default::default()
    };

    let estimate = MlmcEstimator::new(&model, &option, config)
        .unwrap()
        .run()
        .unwrap();
    let exact = bs_call_price(s0, k, r, sigma, t);

    println!("MLMC {:.4} vs Black-Scholes {:.4}", estimate.price, exact);
    assert!((estimate.price - exact).abs() < 0.3);
}

#[test]
fn test_merge_pilot_and_level_average_aggregation() {
    let model = Heston::new(HestonParams::default()).expect("Valid parameters");
    let option = PathOption::asian(0.0, 1.0, true);
    let config = MlmcConfig {
        pilot_mode: PilotMode::Merge,
        aggregation: Aggregation::LevelAverage,
        ..asian_config(0.05)
    };

    let estimate = MlmcEstimator::new(&model, &option, config)
        .unwrap()
        .run()
        .unwrap();

    let count = estimate.levels.len() as f64;
    let mean_of_means = estimate.levels.iter().map(|l| l.mean).sum::<f64>() / count;
    let mean_of_vars = estimate.levels.iter().map(|l| l.variance).sum::<f64>() / count;
    assert!((estimate.price - mean_of_means).abs() < 1e-12);
    assert!((estimate.variance - mean_of_vars).abs() < 1e-12);
}

#[test]
fn test_invalid_grid_is_reported_before_sampling() {
    let model = Heston::new(HestonParams::default()).expect("Valid parameters");
    let option = PathOption::asian(0.0, 0.3, true);
    let config = MlmcConfig {
        maturity: 0.3,
        ..asian_config(0.05)
    };

    let result = MlmcEstimator::new(&model, &option, config);
    assert!(matches!(result, Err(MlmcError::InvalidDiscretization { .. })));
}
