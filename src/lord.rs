//! LORD: online FDR control driven by the times of recent discoveries.
//!
//! Four update rules share one parameter surface, selected once at
//! construction through [`LordVersion`]:
//!
//! - `PlusPlus` (default): the monotone rule, provably valid for
//!   independent p-values when w0 <= alpha.
//! - `Three`: the non-monotone wealth-recursion rule.
//! - `Discard { tau }`: D-LORD, which drops p-values above `tau` from the
//!   budget accounting before applying the `PlusPlus`-style formula.
//! - `Dep`: valid under arbitrary dependence, pairing the wealth recursion
//!   with a dedicated xi sequence.

use crate::error::{FdrError, Result};
use crate::result::{check_alpha, check_pvals, TestResults};
use crate::weights::{dep_xi, lord_gamma, validate_dep_xi, validate_weights};
use serde::{Deserialize, Serialize};

/// Update rule for the LORD procedure, fixed for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LordVersion {
    /// LORD++, the monotone default.
    PlusPlus,
    /// LORD 3, wealth recursion keyed to the most recent discovery.
    Three,
    /// D-LORD with discard threshold `tau` in (0, 1).
    Discard { tau: f64 },
    /// Arbitrary-dependence variant using the xi sequence.
    Dep,
}

/// LORD procedure configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lord {
    /// Overall significance level, in (0, 1].
    pub alpha: f64,
    /// Update rule.
    pub version: LordVersion,
    /// Weighting sequence; `None` selects the version's default generator.
    pub gammai: Option<Vec<f64>>,
    /// Initial wealth, 0 <= w0 <= alpha.
    pub w0: f64,
    /// Payout credited per discovery (versions `Three` and `Dep` only).
    pub b0: f64,
}

impl Default for Lord {
    fn default() -> Self {
        Lord::new(0.05)
    }
}

impl Lord {
    /// Create a LORD++ procedure at level `alpha` with the package defaults
    /// w0 = alpha/10 and b0 = alpha - w0.
    pub fn new(alpha: f64) -> Self {
        Lord {
            alpha,
            version: LordVersion::PlusPlus,
            gammai: None,
            w0: alpha / 10.0,
            b0: alpha - alpha / 10.0,
        }
    }

    /// Select the update rule.
    pub fn version(mut self, version: LordVersion) -> Self {
        self.version = version;
        self
    }

    /// Supply a custom gamma (or xi, for `Dep`) sequence.
    pub fn with_weights(mut self, gammai: Vec<f64>) -> Self {
        self.gammai = Some(gammai);
        self
    }

    /// Set the initial wealth.
    pub fn w0(mut self, w0: f64) -> Self {
        self.w0 = w0;
        self
    }

    /// Set the per-discovery payout.
    pub fn b0(mut self, b0: f64) -> Self {
        self.b0 = b0;
        self
    }

    fn validate(&self) -> Result<()> {
        check_alpha(self.alpha)?;
        if !self.w0.is_finite() || self.w0 < 0.0 || self.w0 > self.alpha {
            return Err(FdrError::InvalidParameter(format!(
                "w0 must satisfy 0 <= w0 <= alpha, got w0 = {}",
                self.w0
            )));
        }
        match self.version {
            LordVersion::Three | LordVersion::Dep => {
                if !self.b0.is_finite() || self.b0 <= 0.0 {
                    return Err(FdrError::InvalidParameter(format!(
                        "b0 must be positive, got {}",
                        self.b0
                    )));
                }
                if self.w0 + self.b0 > self.alpha {
                    return Err(FdrError::InvalidParameter(format!(
                        "w0 + b0 must not exceed alpha, got {} + {} > {}",
                        self.w0, self.b0, self.alpha
                    )));
                }
            }
            LordVersion::Discard { tau } => {
                if !(tau > 0.0 && tau < 1.0) {
                    return Err(FdrError::InvalidParameter(format!(
                        "the discard threshold tau must be in (0, 1), got {}",
                        tau
                    )));
                }
            }
            LordVersion::PlusPlus => {}
        }
        Ok(())
    }

    fn weights(&self, n: usize) -> Result<Vec<f64>> {
        match (&self.gammai, self.version) {
            (Some(g), LordVersion::Dep) => {
                validate_dep_xi(g, n, self.alpha, self.b0)?;
                Ok(g.clone())
            }
            (Some(g), _) => {
                validate_weights(g, n, 1.0, "gammai")?;
                Ok(g.clone())
            }
            (None, LordVersion::Dep) => Ok(dep_xi(n, self.alpha, self.b0)),
            (None, _) => Ok(lord_gamma(n)),
        }
    }

    /// Run the procedure over an ordered p-value stream.
    pub fn run(&self, pvals: &[f64]) -> Result<TestResults> {
        self.validate()?;
        check_pvals(pvals)?;
        let gammai = self.weights(pvals.len())?;

        let (thresholds, rejected) = match self.version {
            LordVersion::PlusPlus => self.run_plus_plus(pvals, &gammai),
            LordVersion::Three | LordVersion::Dep => self.run_wealth(pvals, &gammai),
            LordVersion::Discard { tau } => self.run_discard(pvals, &gammai, tau),
        };

        Ok(TestResults::new(pvals, thresholds, rejected))
    }

    /// alpha_t = gamma_t w0 + (alpha - w0) gamma_{t - tau_1}
    ///           + alpha * sum_{j >= 2} gamma_{t - tau_j}.
    fn run_plus_plus(&self, pvals: &[f64], gammai: &[f64]) -> (Vec<f64>, Vec<bool>) {
        let g = |idx: usize| gammai[idx - 1];
        let n = pvals.len();
        let mut thresholds = Vec::with_capacity(n);
        let mut rejected = Vec::with_capacity(n);
        let mut taus: Vec<usize> = Vec::new();

        for t in 1..=n {
            let mut alphai = self.w0 * g(t);
            if let Some((&first, rest)) = taus.split_first() {
                alphai += (self.alpha - self.w0) * g(t - first);
                for &tj in rest {
                    alphai += self.alpha * g(t - tj);
                }
            }
            let reject = pvals[t - 1] <= alphai;
            thresholds.push(alphai);
            rejected.push(reject);
            if reject {
                taus.push(t);
            }
        }
        (thresholds, rejected)
    }

    /// alpha_t = gamma_{t - tau(t)} * W(tau(t)), with the wealth recursion
    /// W(0) = w0, W(t) = W(t-1) - alpha_t + b0 * R_t.
    fn run_wealth(&self, pvals: &[f64], gammai: &[f64]) -> (Vec<f64>, Vec<bool>) {
        let g = |idx: usize| gammai[idx - 1];
        let n = pvals.len();
        let mut thresholds = Vec::with_capacity(n);
        let mut rejected = Vec::with_capacity(n);
        // Wealth after each step; index 0 holds W(0) = w0.
        let mut wealth = Vec::with_capacity(n + 1);
        wealth.push(self.w0);
        let mut last_rejection = 0usize;

        for t in 1..=n {
            let alphai = g(t - last_rejection) * wealth[last_rejection];
            let reject = pvals[t - 1] <= alphai;
            wealth.push(wealth[t - 1] - alphai + if reject { self.b0 } else { 0.0 });
            thresholds.push(alphai);
            rejected.push(reject);
            if reject {
                last_rejection = t;
            }
        }
        (thresholds, rejected)
    }

    /// D-LORD: the PlusPlus formula with discovery times re-indexed by the
    /// count of tests that survived discarding, capped at tau.
    fn run_discard(&self, pvals: &[f64], gammai: &[f64], tau: f64) -> (Vec<f64>, Vec<bool>) {
        let g = |idx: usize| gammai[idx - 1];
        let n = pvals.len();
        let mut thresholds = Vec::with_capacity(n);
        let mut rejected = Vec::with_capacity(n);
        // Selected count: #{k <= t : p_k <= tau}, updated after each step.
        let mut selected = 0usize;
        // kappa*_j: selected count at the time of the j-th discovery, inclusive.
        let mut kappa_star: Vec<usize> = Vec::new();

        for t in 1..=n {
            let s_t = selected + 1;
            let mut alphai = self.w0 * g(s_t);
            if let Some((&first, rest)) = kappa_star.split_first() {
                alphai += (self.alpha - self.w0) * g(s_t - first);
                for &kj in rest {
                    alphai += self.alpha * g(s_t - kj);
                }
            }
            let alphai = alphai.min(tau);
            let reject = pvals[t - 1] <= alphai;
            thresholds.push(alphai);
            rejected.push(reject);
            if pvals[t - 1] <= tau {
                selected += 1;
            }
            if reject {
                // A rejection always passes the discard filter (alphai <= tau).
                kappa_star.push(selected);
            }
        }
        (thresholds, rejected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const FIXTURE: [f64; 4] = [1e-7, 3e-4, 0.1, 5e-4];

    #[test]
    fn test_plus_plus_fixture_thresholds() {
        let res = Lord::new(0.05).run(&FIXTURE).unwrap();
        assert_eq!(res.decisions(), vec![1, 1, 0, 1]);

        let g = lord_gamma(4);
        let (alpha, w0) = (0.05, 0.005);
        assert_relative_eq!(res.thresholds[0], w0 * g[0], epsilon = 1e-15);
        // Discovery at t = 1 feeds the differential credit at t = 2.
        assert_relative_eq!(
            res.thresholds[1],
            w0 * g[1] + (alpha - w0) * g[0],
            epsilon = 1e-15
        );
        // Discoveries at t = 1, 2 contribute at t = 3.
        assert_relative_eq!(
            res.thresholds[2],
            w0 * g[2] + (alpha - w0) * g[1] + alpha * g[0],
            epsilon = 1e-15
        );
        assert_relative_eq!(
            res.thresholds[3],
            w0 * g[3] + (alpha - w0) * g[2] + alpha * g[1],
            epsilon = 1e-15
        );
    }

    #[test]
    fn test_wealth_recursion_spends_and_earns() {
        let lord = Lord::new(0.05).version(LordVersion::Three);
        let res = lord.run(&FIXTURE).unwrap();
        let g = lord_gamma(4);
        let (w0, b0) = (0.005, 0.045);

        // t = 1: no discovery yet, alpha_1 = gamma_1 * W(0).
        assert_relative_eq!(res.thresholds[0], g[0] * w0, epsilon = 1e-15);
        assert!(res.rejected[0]);
        // t = 2: last discovery at 1, W(1) = w0 - alpha_1 + b0.
        let w1 = w0 - res.thresholds[0] + b0;
        assert_relative_eq!(res.thresholds[1], g[0] * w1, epsilon = 1e-15);
    }

    #[test]
    fn test_dep_uses_xi_sequence() {
        let lord = Lord::new(0.05).version(LordVersion::Dep);
        let res = lord.run(&FIXTURE).unwrap();
        let xi = dep_xi(4, 0.05, 0.045);
        assert_relative_eq!(res.thresholds[0], xi[0] * 0.005, epsilon = 1e-15);
        for i in 0..4 {
            assert_eq!(res.rejected[i], FIXTURE[i] <= res.thresholds[i]);
        }
    }

    #[test]
    fn test_discard_matches_plus_plus_when_nothing_is_discarded() {
        // All p-values below tau: the discard re-indexing is the identity,
        // so D-LORD is exactly min(tau, LORD++).
        let pvals = [1e-7, 3e-4, 0.1, 5e-4, 0.2, 1e-3];
        let tau = 0.5;
        let plus = Lord::new(0.05).run(&pvals).unwrap();
        let disc = Lord::new(0.05)
            .version(LordVersion::Discard { tau })
            .run(&pvals)
            .unwrap();
        for i in 0..pvals.len() {
            assert_relative_eq!(
                disc.thresholds[i],
                plus.thresholds[i].min(tau),
                epsilon = 1e-15
            );
        }
    }

    #[test]
    fn test_discard_skips_discarded_tests_in_the_indexing() {
        // A p-value above tau must not advance the budget indexing.
        let tau = 0.5;
        let with_discard = [1e-7, 0.9, 3e-4];
        let without = [1e-7, 3e-4];
        let lord = Lord::new(0.05).version(LordVersion::Discard { tau });
        let a = lord.run(&with_discard).unwrap();
        let b = lord.run(&without).unwrap();
        // Test 3 of the first stream sees the same budget state as test 2
        // of the second: the discarded p-value is invisible.
        assert_relative_eq!(a.thresholds[2], b.thresholds[1], epsilon = 1e-15);
    }

    #[test]
    fn test_discard_caps_at_tau() {
        let tau = 0.001;
        let res = Lord::new(0.05)
            .version(LordVersion::Discard { tau })
            .run(&FIXTURE)
            .unwrap();
        for &a in &res.thresholds {
            assert!(a <= tau);
        }
    }

    #[test]
    fn test_causality_under_truncation() {
        for version in [
            LordVersion::PlusPlus,
            LordVersion::Three,
            LordVersion::Dep,
            LordVersion::Discard { tau: 0.5 },
        ] {
            let pvals = [1e-6, 0.4, 2e-4, 0.03, 0.7, 1e-3];
            let full = Lord::new(0.05).version(version).run(&pvals).unwrap();
            for cut in 1..=pvals.len() {
                let prefix = Lord::new(0.05).version(version).run(&pvals[..cut]).unwrap();
                assert_eq!(prefix.thresholds, full.thresholds[..cut]);
            }
        }
    }

    #[test]
    fn test_rejects_inconsistent_parameters() {
        assert!(Lord::new(0.05).w0(0.06).run(&FIXTURE).is_err());
        assert!(Lord::new(0.05).w0(-0.01).run(&FIXTURE).is_err());
        assert!(Lord::new(0.05)
            .version(LordVersion::Three)
            .b0(0.0)
            .run(&FIXTURE)
            .is_err());
        assert!(Lord::new(0.05)
            .version(LordVersion::Three)
            .w0(0.03)
            .b0(0.03)
            .run(&FIXTURE)
            .is_err());
        assert!(Lord::new(0.05)
            .version(LordVersion::Discard { tau: 1.0 })
            .run(&FIXTURE)
            .is_err());
        assert!(Lord::new(0.05)
            .version(LordVersion::Discard { tau: 0.0 })
            .run(&FIXTURE)
            .is_err());
    }
}
