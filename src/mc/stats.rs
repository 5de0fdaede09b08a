//! Running batch statistics
//!
//! Per-level moments are never recomputed from the full sample history. A new
//! batch is summarised by `(n, mean, variance)` and pooled into the existing
//! summary:
//! ```text
//! mean = (n₁m₁ + n₂m₂) / (n₁ + n₂)
//! var  = ((n₁-d)v₁ + (n₂-d)v₂) / (n₁+n₂-d) + n₁n₂(m₁-m₂)² / ((n₁+n₂)(n₁+n₂-d))
//! ```
//! with `d` the degrees-of-freedom adjustment. With `d = 0` the pooled
//! population variance is exact, and merging is associative and commutative up
//! to rounding, so batches may be folded in any order.

use crate::error::{MlmcError, MlmcResult};
use ndarray::ArrayView1;

/// Mean of the union of two batches
pub fn combine_mean(n1: usize, mean1: f64, n2: usize, mean2: f64) -> MlmcResult<f64> {
    let total = n1 + n2;
    if total == 0 {
        return Err(MlmcError::DegenerateSample { n1, n2, ddof: 0 });
    }
    Ok((n1 as f64 * mean1 + n2 as f64 * mean2) / total as f64)
}

/// Pooled variance of the union of two batches
pub fn combine_variance(
    n1: usize,
    mean1: f64,
    var1: f64,
    n2: usize,
    mean2: f64,
    var2: f64,
    ddof: usize,
) -> MlmcResult<f64> {
    let total = n1 + n2;
    if total <= ddof {
        return Err(MlmcError::DegenerateSample { n1, n2, ddof });
    }

    let (n1f, n2f, d) = (n1 as f64, n2 as f64, ddof as f64);
    let nf = total as f64;
    let within = ((n1f - d) * var1 + (n2f - d) * var2) / (nf - d);
    let between = n1f * n2f * (mean1 - mean2).powi(2) / (nf * (nf - d));
    Ok(within + between)
}

/// Count, mean and population variance of a batch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchMoments {
    pub count: usize,
    pub mean: f64,
    pub variance: f64,
}

impl BatchMoments {
    pub fn new(count: usize, mean: f64, variance: f64) -> Self {
        Self {
            count,
            mean,
            variance,
        }
    }

    /// Two-pass moments of `samples` (variance with `ddof = 0`)
    pub fn from_samples(samples: ArrayView1<f64>) -> MlmcResult<Self> {
        let count = samples.len();
        if count == 0 {
            return Err(MlmcError::DegenerateSample {
                n1: 0,
                n2: 0,
                ddof: 0,
            });
        }

        let n = count as f64;
        let mean = samples.sum() / n;
        let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        Ok(Self::new(count, mean, variance))
    }

    /// Summary of the union of `self` and `other`
    pub fn merge(&self, other: &BatchMoments) -> MlmcResult<Self> {
        let mean = combine_mean(self.count, self.mean, other.count, other.mean)?;
        let variance = combine_variance(
            self.count,
            self.mean,
            self.variance,
            other.count,
            other.mean,
            other.variance,
            0,
        )?;
        Ok(Self::new(self.count + other.count, mean, variance))
    }

    /// Variance of the sample mean, `variance / count`
    pub fn mean_variance(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.variance / self.count as f64
        }
    }
}
