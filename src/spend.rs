//! FWER control by online alpha-spending: Alpha-spending, online fallback,
//! and ADDIS-spending.
//!
//! These procedures spend a fixed error budget along the gamma sequence
//! with at most one step of feedback (online fallback rolls the previous
//! threshold forward after a rejection). All are strongly valid under
//! arbitrary dependence, and all generalize to k-FWER by substituting
//! min(1, k * alpha) for alpha.

use crate::error::{FdrError, Result};
use crate::result::{check_alpha, check_len, check_pvals, TestResults};
use crate::weights::{lord_gamma, validate_weights};
use serde::{Deserialize, Serialize};

/// Effective level for k-FWER control: min(1, k * alpha).
fn kfwer_level(alpha: f64, k: usize) -> f64 {
    (k as f64 * alpha).min(1.0)
}

fn check_k(k: usize) -> Result<()> {
    if k == 0 {
        return Err(FdrError::InvalidParameter(
            "k must be a positive integer".to_string(),
        ));
    }
    Ok(())
}

fn resolve_gamma(gammai: &Option<Vec<f64>>, n: usize) -> Result<Vec<f64>> {
    match gammai {
        Some(g) => {
            validate_weights(g, n, 1.0, "gammai")?;
            Ok(g.clone())
        }
        None => Ok(lord_gamma(n)),
    }
}

/// Alpha-spending: threshold_t = alpha * gamma_t, with no feedback from
/// decisions (a Bonferroni-style allocation over the stream).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlphaSpending {
    /// Overall significance level, in (0, 1].
    pub alpha: f64,
    /// Spending sequence; `None` selects the LORD default.
    pub gammai: Option<Vec<f64>>,
    /// Number of false rejections tolerated (k-FWER); 1 is plain FWER.
    pub k: usize,
}

impl Default for AlphaSpending {
    fn default() -> Self {
        AlphaSpending::new(0.05)
    }
}

impl AlphaSpending {
    /// Create an Alpha-spending procedure at level `alpha`.
    pub fn new(alpha: f64) -> Self {
        AlphaSpending {
            alpha,
            gammai: None,
            k: 1,
        }
    }

    /// Supply a custom gamma sequence.
    pub fn with_weights(mut self, gammai: Vec<f64>) -> Self {
        self.gammai = Some(gammai);
        self
    }

    /// Control k-FWER instead of FWER.
    pub fn k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    /// Run the procedure over an ordered p-value stream.
    pub fn run(&self, pvals: &[f64]) -> Result<TestResults> {
        check_alpha(self.alpha)?;
        check_k(self.k)?;
        check_pvals(pvals)?;
        let n = pvals.len();
        let gammai = resolve_gamma(&self.gammai, n)?;
        let level = kfwer_level(self.alpha, self.k);

        let thresholds: Vec<f64> = gammai[..n].iter().map(|&g| level * g).collect();
        let rejected: Vec<bool> = pvals
            .iter()
            .zip(&thresholds)
            .map(|(&p, &a)| p <= a)
            .collect();
        Ok(TestResults::new(pvals, thresholds, rejected))
    }
}

/// Online fallback: threshold_t = alpha * gamma_t + R_{t-1} * threshold_{t-1}.
/// The previous test's budget rolls forward iff it was rejected, so the
/// procedure dominates Alpha-spending under the same dependence guarantee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnlineFallback {
    /// Overall significance level, in (0, 1].
    pub alpha: f64,
    /// Spending sequence; `None` selects the LORD default.
    pub gammai: Option<Vec<f64>>,
    /// Number of false rejections tolerated (k-FWER); 1 is plain FWER.
    pub k: usize,
}

impl Default for OnlineFallback {
    fn default() -> Self {
        OnlineFallback::new(0.05)
    }
}

impl OnlineFallback {
    /// Create an online fallback procedure at level `alpha`.
    pub fn new(alpha: f64) -> Self {
        OnlineFallback {
            alpha,
            gammai: None,
            k: 1,
        }
    }

    /// Supply a custom gamma sequence.
    pub fn with_weights(mut self, gammai: Vec<f64>) -> Self {
        self.gammai = Some(gammai);
        self
    }

    /// Control k-FWER instead of FWER.
    pub fn k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    /// Run the procedure over an ordered p-value stream.
    pub fn run(&self, pvals: &[f64]) -> Result<TestResults> {
        check_alpha(self.alpha)?;
        check_k(self.k)?;
        check_pvals(pvals)?;
        let n = pvals.len();
        let gammai = resolve_gamma(&self.gammai, n)?;
        let level = kfwer_level(self.alpha, self.k);

        let mut thresholds = Vec::with_capacity(n);
        let mut rejected = Vec::with_capacity(n);
        let mut carryover = 0.0;
        for (i, &p) in pvals.iter().enumerate() {
            let alphai = level * gammai[i] + carryover;
            let reject = p <= alphai;
            thresholds.push(alphai);
            rejected.push(reject);
            carryover = if reject { alphai } else { 0.0 };
        }
        Ok(TestResults::new(pvals, thresholds, rejected))
    }
}

/// ADDIS-spending: Alpha-spending scaled by (tau - lambda), with the
/// spending index advanced only by p-values that are selected (p <= tau)
/// but not candidates (p <= lambda). A `dep` mode delays the counters by
/// per-test lags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddisSpending {
    /// Overall significance level, in (0, 1].
    pub alpha: f64,
    /// Spending sequence; `None` selects the LORD default.
    pub gammai: Option<Vec<f64>>,
    /// Candidacy threshold, 0 < lambda < tau.
    pub lambda: f64,
    /// Selection (discard) threshold, lambda < tau <= 1.
    pub tau: f64,
    /// Per-test lags for local dependence; `None` is the independent mode.
    pub lags: Option<Vec<usize>>,
    /// Number of false rejections tolerated (k-FWER); 1 is plain FWER.
    pub k: usize,
}

impl Default for AddisSpending {
    fn default() -> Self {
        AddisSpending::new(0.05)
    }
}

impl AddisSpending {
    /// Create an ADDIS-spending procedure at level `alpha` with the package
    /// defaults lambda = 0.25 and tau = 0.5.
    pub fn new(alpha: f64) -> Self {
        AddisSpending {
            alpha,
            gammai: None,
            lambda: 0.25,
            tau: 0.5,
            lags: None,
            k: 1,
        }
    }

    /// Supply a custom gamma sequence.
    pub fn with_weights(mut self, gammai: Vec<f64>) -> Self {
        self.gammai = Some(gammai);
        self
    }

    /// Set the candidacy threshold.
    pub fn lambda(mut self, lambda: f64) -> Self {
        self.lambda = lambda;
        self
    }

    /// Set the selection threshold.
    pub fn tau(mut self, tau: f64) -> Self {
        self.tau = tau;
        self
    }

    /// Enable the local-dependence mode with per-test lags.
    pub fn with_lags(mut self, lags: Vec<usize>) -> Self {
        self.lags = Some(lags);
        self
    }

    /// Control k-FWER instead of FWER.
    pub fn k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    /// Run the procedure over an ordered p-value stream.
    ///
    /// threshold_t = (tau - lambda) * alpha * gamma_{S(t) - C(t) + 1},
    /// where S and C count selected and candidate p-values among the tests
    /// visible to t (all earlier tests, or those older than the lag).
    pub fn run(&self, pvals: &[f64]) -> Result<TestResults> {
        check_alpha(self.alpha)?;
        check_k(self.k)?;
        if !(self.tau > 0.0 && self.tau <= 1.0) {
            return Err(FdrError::InvalidParameter(format!(
                "tau must be in (0, 1], got {}",
                self.tau
            )));
        }
        if !(self.lambda > 0.0 && self.lambda < self.tau) {
            return Err(FdrError::InvalidParameter(format!(
                "lambda must satisfy 0 < lambda < tau, got lambda = {}, tau = {}",
                self.lambda, self.tau
            )));
        }
        check_pvals(pvals)?;
        let n = pvals.len();
        if let Some(lags) = &self.lags {
            check_len("lags", lags.len(), n)?;
        }
        let gammai = resolve_gamma(&self.gammai, n)?;
        let level = kfwer_level(self.alpha, self.k);
        let scale = (self.tau - self.lambda) * level;

        // Prefix counts of selected / candidate p-values.
        let mut sel_prefix = vec![0usize; n + 1];
        let mut cand_prefix = vec![0usize; n + 1];
        let mut thresholds = Vec::with_capacity(n);
        let mut rejected = Vec::with_capacity(n);

        for t in 1..=n {
            let horizon = match &self.lags {
                Some(lags) => (t - 1).saturating_sub(lags[t - 1]),
                None => t - 1,
            };
            let idx = sel_prefix[horizon] - cand_prefix[horizon] + 1;
            let alphai = scale * gammai[idx - 1];
            let p = pvals[t - 1];
            let reject = p <= alphai;
            thresholds.push(alphai);
            rejected.push(reject);
            sel_prefix[t] = sel_prefix[t - 1] + (p <= self.tau) as usize;
            cand_prefix[t] = cand_prefix[t - 1] + (p <= self.lambda) as usize;
        }

        let mut results = TestResults::new(pvals, thresholds, rejected);
        results.lags = self.lags.clone();
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const FIXTURE: [f64; 4] = [1e-7, 3e-4, 0.1, 5e-4];

    #[test]
    fn test_spending_is_pure_budget_allocation() {
        let res = AlphaSpending::new(0.05).run(&FIXTURE).unwrap();
        let g = lord_gamma(4);
        for i in 0..4 {
            assert_relative_eq!(res.thresholds[i], 0.05 * g[i], epsilon = 1e-15);
            assert_eq!(res.rejected[i], FIXTURE[i] <= res.thresholds[i]);
        }
    }

    #[test]
    fn test_spending_ignores_decisions() {
        // Identical thresholds for wildly different streams.
        let a = AlphaSpending::new(0.05).run(&[1e-9, 1e-9, 1e-9]).unwrap();
        let b = AlphaSpending::new(0.05).run(&[0.9, 0.9, 0.9]).unwrap();
        assert_eq!(a.thresholds, b.thresholds);
    }

    #[test]
    fn test_fallback_rolls_budget_forward_after_rejection() {
        let res = OnlineFallback::new(0.05).run(&FIXTURE).unwrap();
        let g = lord_gamma(4);
        assert!(res.rejected[0]);
        assert_relative_eq!(res.thresholds[0], 0.05 * g[0], epsilon = 1e-15);
        assert_relative_eq!(
            res.thresholds[1],
            0.05 * g[1] + res.thresholds[0],
            epsilon = 1e-15
        );
    }

    #[test]
    fn test_fallback_dominates_spending() {
        let pvals = [1e-7, 3e-4, 0.1, 5e-4, 0.2, 1e-3, 0.6];
        let spend = AlphaSpending::new(0.05).run(&pvals).unwrap();
        let fall = OnlineFallback::new(0.05).run(&pvals).unwrap();
        for i in 0..pvals.len() {
            assert!(fall.thresholds[i] >= spend.thresholds[i]);
            let prev_rejected = i > 0 && fall.rejected[i - 1];
            if prev_rejected {
                assert!(fall.thresholds[i] > spend.thresholds[i]);
            } else {
                assert_relative_eq!(fall.thresholds[i], spend.thresholds[i], epsilon = 1e-15);
            }
        }
    }

    #[test]
    fn test_kfwer_scales_the_level() {
        let g = lord_gamma(4);
        let res = AlphaSpending::new(0.05).k(3).run(&FIXTURE).unwrap();
        for i in 0..4 {
            assert_relative_eq!(res.thresholds[i], 0.15 * g[i], epsilon = 1e-15);
        }
        // The level saturates at 1.
        let capped = AlphaSpending::new(0.05).k(100).run(&FIXTURE).unwrap();
        for i in 0..4 {
            assert_relative_eq!(capped.thresholds[i], g[i], epsilon = 1e-15);
        }
    }

    #[test]
    fn test_addis_spending_index_moves_only_on_selected_non_candidates() {
        let g = lord_gamma(8);
        let scale = (0.5 - 0.25) * 0.05;
        // Candidates (p <= 0.25) and discarded tests (p > 0.5) leave the
        // index alone; p in (0.25, 0.5] advances it.
        let pvals = [0.01, 0.9, 0.3, 0.02, 0.4, 0.7];
        let res = AddisSpending::new(0.05).run(&pvals).unwrap();
        let expected_idx = [1, 1, 1, 2, 2, 3];
        for i in 0..pvals.len() {
            assert_relative_eq!(
                res.thresholds[i],
                scale * g[expected_idx[i] - 1],
                epsilon = 1e-15
            );
        }
    }

    #[test]
    fn test_addis_spending_lags_delay_the_counters() {
        let pvals = [0.3, 0.4, 0.01, 0.02];
        let plain = AddisSpending::new(0.05).run(&pvals).unwrap();
        let lagged = AddisSpending::new(0.05)
            .with_lags(vec![0, 1, 2, 3])
            .run(&pvals)
            .unwrap();
        let g = lord_gamma(4);
        let scale = (0.5 - 0.25) * 0.05;
        // With lag_t = t - 1 nothing is ever visible: every threshold is
        // the first spending step.
        for i in 0..pvals.len() {
            assert_relative_eq!(lagged.thresholds[i], scale * g[0], epsilon = 1e-15);
        }
        // The unlagged run advances on the two selected non-candidates.
        assert_relative_eq!(plain.thresholds[2], scale * g[2], epsilon = 1e-15);
        assert_eq!(lagged.lags, Some(vec![0, 1, 2, 3]));
    }

    #[test]
    fn test_rejects_inconsistent_parameters() {
        assert!(AlphaSpending::new(0.05).k(0).run(&FIXTURE).is_err());
        assert!(AddisSpending::new(0.05)
            .lambda(0.5)
            .tau(0.5)
            .run(&FIXTURE)
            .is_err());
        assert!(AddisSpending::new(0.05).tau(1.5).run(&FIXTURE).is_err());
        assert!(AddisSpending::new(0.05)
            .with_lags(vec![0, 1])
            .run(&FIXTURE)
            .is_err());
    }
}
