// src/error.rs
use thiserror::Error;

/// Error types for the fast-mlmc library
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MlmcError {
    /// Invalid parameter values
    #[error("Invalid parameter '{parameter}' = {value}: {constraint}")]
    InvalidParameters {
        parameter: String,
        value: f64,
        constraint: String,
    },

    /// Invalid configuration
    #[error("Invalid configuration for '{field}': {reason}")]
    InvalidConfiguration { field: String, reason: String },

    /// Step count implied by (maturity, refinement factor, level) is not an integer
    #[error(
        "Invalid discretization at level {level}: maturity {maturity} with refinement factor {refinement} implies {steps} steps"
    )]
    InvalidDiscretization {
        maturity: f64,
        refinement: usize,
        level: usize,
        steps: f64,
    },

    /// Pooled-variance denominator vanished
    #[error("Degenerate sample: n1 = {n1}, n2 = {n2} with ddof = {ddof}")]
    DegenerateSample { n1: usize, n2: usize, ddof: usize },

    /// Estimator hit one of its caps before the stopping rule held
    #[error("MLMC did not converge after {iterations} iterations (finest level {level}): {reason}")]
    NonConvergence {
        iterations: usize,
        level: usize,
        reason: String,
    },

    /// Numerical instability during simulation or aggregation
    #[error("Numerical instability in {method}: {reason}")]
    NumericalInstability { method: String, reason: String },
}

/// Result type alias for fast-mlmc operations
pub type MlmcResult<T> = Result<T, MlmcError>;

/// Validation utilities
pub mod validation {
    use super::{MlmcError, MlmcResult};

    /// Validate that a parameter is positive
    pub fn validate_positive(name: &str, value: f64) -> MlmcResult<()> {
        if value.is_nan() || value <= 0.0 {
            Err(MlmcError::InvalidParameters {
                parameter: name.to_string(),
                value,
                constraint: "must be positive (> 0)".to_string(),
            })
        } else {
            Ok(())
        }
    }

    /// Validate that a parameter is non-negative
    pub fn validate_non_negative(name: &str, value: f64) -> MlmcResult<()> {
        if value.is_nan() || value < 0.0 {
            Err(MlmcError::InvalidParameters {
                parameter: name.to_string(),
                value,
                constraint: "must be non-negative (≥ 0)".to_string(),
            })
        } else {
            Ok(())
        }
    }

    /// Validate that a parameter is within a range
    pub fn validate_range(name: &str, value: f64, min: f64, max: f64) -> MlmcResult<()> {
        if value.is_nan() || value < min || value > max {
            Err(MlmcError::InvalidParameters {
                parameter: name.to_string(),
                value,
                constraint: format!("must be in range [{}, {}]", min, max),
            })
        } else {
            Ok(())
        }
    }

    /// Validate correlation parameter
    pub fn validate_correlation(name: &str, rho: f64) -> MlmcResult<()> {
        validate_range(name, rho, -1.0, 1.0)
    }

    /// Validate that a value is finite and not NaN
    pub fn validate_finite(name: &str, value: f64) -> MlmcResult<()> {
        if !value.is_finite() {
            Err(MlmcError::InvalidParameters {
                parameter: name.to_string(),
                value,
                constraint: "must be finite (not NaN or infinite)".to_string(),
            })
        } else {
            Ok(())
        }
    }

    /// Validate paths count
    pub fn validate_paths(paths: usize) -> MlmcResult<()> {
        if paths == 0 {
            Err(MlmcError::InvalidConfiguration {
                field: "paths".to_string(),
                reason: "must be greater than 0".to_string(),
            })
        } else if paths > 1_000_000_000 {
            Err(MlmcError::InvalidConfiguration {
                field: "paths".to_string(),
                reason: "exceeds maximum allowed (1 billion)".to_string(),
            })
        } else {
            Ok(())
        }
    }

    /// Validate the refinement factor between consecutive levels
    pub fn validate_refinement(refinement: usize) -> MlmcResult<()> {
        if refinement < 2 {
            Err(MlmcError::InvalidConfiguration {
                field: "refinement_factor".to_string(),
                reason: format!("must be at least 2, got {}", refinement),
            })
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::validation::*;
    use super::*;

    #[test]
    fn test_validate_positive() {
        assert!(validate_positive("maturity", 1.0).is_ok());
        assert!(validate_positive("maturity", 0.0).is_err());
        assert!(validate_positive("maturity", -0.1).is_err());
        assert!(validate_positive("maturity", f64::NAN).is_err());
    }

    #[test]
    fn test_validate_correlation() {
        assert!(validate_correlation("rho", 0.5).is_ok());
        assert!(validate_correlation("rho", -1.0).is_ok());
        assert!(validate_correlation("rho", 1.0).is_ok());
        assert!(validate_correlation("rho", 1.1).is_err());
        assert!(validate_correlation("rho", -1.1).is_err());
    }

    #[test]
    fn test_validate_refinement() {
        assert!(validate_refinement(2).is_ok());
        assert!(validate_refinement(4).is_ok());
        assert!(validate_refinement(1).is_err());
        assert!(validate_refinement(0).is_err());
    }

    #[test]
    fn test_validate_paths() {
        assert!(validate_paths(1).is_ok());
        assert!(validate_paths(0).is_err());
    }

    #[test]
    fn test_discretization_error_display() {
        let error = MlmcError::InvalidDiscretization {
            maturity: 0.3,
            refinement: 2,
            level: 1,
            steps: 0.6,
        };

        let display = format!("{}", error);
        assert!(display.contains("level 1"));
        assert!(display.contains("0.6"));
    }

    #[test]
    fn test_non_convergence_display() {
        let error = MlmcError::NonConvergence {
            iterations: 9,
            level: 10,
            reason: "maximum level reached".to_string(),
        };

        let display = format!("{}", error);
        assert!(display.contains("9 iterations"));
        assert!(display.contains("maximum level"));
    }
}
