//! LOND: online FDR control by counting discoveries.
//!
//! LOND ("significance Levels based On Number of Discoveries") spends the
//! budget sequence beta and scales each test's share by the number of
//! discoveries made so far, so early discoveries raise later thresholds.
//! Valid for independent p-values; the `dependent` mode divides each
//! beta_i by the i-th harmonic number, which restores validity under
//! arbitrary dependence at a cost in power.

use crate::error::Result;
use crate::result::{check_alpha, check_pvals, TestResults};
use crate::weights::{harmonic_numbers, lond_beta, validate_weights};
use serde::{Deserialize, Serialize};

/// LOND procedure configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lond {
    /// Overall significance level, in (0, 1].
    pub alpha: f64,
    /// Budget sequence; `None` selects the default generator.
    pub betai: Option<Vec<f64>>,
    /// Apply the harmonic-number penalty for arbitrary dependence.
    pub dependent: bool,
}

impl Default for Lond {
    fn default() -> Self {
        Lond::new(0.05)
    }
}

impl Lond {
    /// Create a LOND procedure at level `alpha` with default settings.
    pub fn new(alpha: f64) -> Self {
        Lond {
            alpha,
            betai: None,
            dependent: false,
        }
    }

    /// Supply a custom beta sequence (validated against the stream at run time).
    pub fn with_weights(mut self, betai: Vec<f64>) -> Self {
        self.betai = Some(betai);
        self
    }

    /// Enable or disable the arbitrary-dependence mode.
    pub fn dependent(mut self, dependent: bool) -> Self {
        self.dependent = dependent;
        self
    }

    /// Run the procedure over an ordered p-value stream.
    ///
    /// threshold_i = beta'_i * (D(i-1) + 1), where D(n) counts discoveries
    /// among the first n decisions and beta' is the (possibly
    /// harmonic-penalized) budget sequence.
    pub fn run(&self, pvals: &[f64]) -> Result<TestResults> {
        check_alpha(self.alpha)?;
        check_pvals(pvals)?;
        let n = pvals.len();

        let betai = match &self.betai {
            Some(b) => {
                validate_weights(b, n, 1.0, "betai")?;
                b.clone()
            }
            None => lond_beta(n, self.alpha),
        };

        let betai = if self.dependent {
            let h = harmonic_numbers(n);
            betai.iter().zip(&h).map(|(b, h)| b / h).collect()
        } else {
            betai
        };

        let mut thresholds = Vec::with_capacity(n);
        let mut rejected = Vec::with_capacity(n);
        let mut discoveries = 0usize;
        for (i, &p) in pvals.iter().enumerate() {
            let alphai = betai[i] * (discoveries as f64 + 1.0);
            let reject = p <= alphai;
            thresholds.push(alphai);
            rejected.push(reject);
            if reject {
                discoveries += 1;
            }
        }

        Ok(TestResults::new(pvals, thresholds, rejected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FdrError;
    use approx::assert_relative_eq;

    const FIXTURE: [f64; 4] = [1e-7, 3e-4, 0.1, 5e-4];

    #[test]
    fn test_fixture_decisions() {
        let res = Lond::new(0.05).run(&FIXTURE).unwrap();
        assert_eq!(res.decisions(), vec![1, 1, 0, 1]);
    }

    #[test]
    fn test_thresholds_scale_with_discovery_count() {
        let res = Lond::new(0.05).run(&FIXTURE).unwrap();
        let beta = lond_beta(4, 0.05);
        // One discovery before test 2, two before tests 3 and 4.
        assert_relative_eq!(res.thresholds[0], beta[0], epsilon = 1e-15);
        assert_relative_eq!(res.thresholds[1], 2.0 * beta[1], epsilon = 1e-15);
        assert_relative_eq!(res.thresholds[2], 3.0 * beta[2], epsilon = 1e-15);
        assert_relative_eq!(res.thresholds[3], 3.0 * beta[3], epsilon = 1e-15);
    }

    #[test]
    fn test_threshold_decision_consistency() {
        let pvals = [0.0001, 0.2, 0.003, 0.9, 0.01, 0.04];
        let res = Lond::new(0.05).run(&pvals).unwrap();
        for i in 0..pvals.len() {
            assert_eq!(res.rejected[i], pvals[i] <= res.thresholds[i]);
        }
    }

    #[test]
    fn test_dependent_mode_never_more_generous() {
        let pvals = [1e-6, 2e-4, 0.3, 1e-4, 0.02, 0.6, 1e-5];
        let ind = Lond::new(0.05).run(&pvals).unwrap();
        let dep = Lond::new(0.05).dependent(true).run(&pvals).unwrap();
        for i in 0..pvals.len() {
            assert!(dep.thresholds[i] <= ind.thresholds[i]);
        }
    }

    #[test]
    fn test_causality_under_truncation() {
        let pvals = [1e-6, 0.4, 2e-4, 0.03, 0.7, 1e-3];
        let full = Lond::new(0.05).run(&pvals).unwrap();
        for cut in 1..=pvals.len() {
            let prefix = Lond::new(0.05).run(&pvals[..cut]).unwrap();
            assert_eq!(prefix.thresholds, full.thresholds[..cut]);
            assert_eq!(prefix.rejected, full.rejected[..cut]);
        }
    }

    #[test]
    fn test_rejects_bad_parameters() {
        assert!(Lond::new(0.0).run(&FIXTURE).is_err());
        assert!(Lond::new(1.5).run(&FIXTURE).is_err());
        assert!(matches!(
            Lond::new(0.05).with_weights(vec![-0.1; 4]).run(&FIXTURE),
            Err(FdrError::InvalidWeights(_))
        ));
        assert!(matches!(
            Lond::new(0.05).with_weights(vec![0.3; 4]).run(&FIXTURE),
            Err(FdrError::InvalidWeights(_))
        ));
        assert!(matches!(
            Lond::new(0.05).with_weights(vec![0.01; 2]).run(&FIXTURE),
            Err(FdrError::LengthMismatch { .. })
        ));
    }
}
