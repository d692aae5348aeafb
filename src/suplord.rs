//! supLORD: online FDX control (and stopping-time FDR control).
//!
//! supLORD bounds the probability that the false discovery proportion ever
//! exceeds `eps` once at least `r` rejections have been made:
//! P(FDP > eps at any time with >= r rejections) <= delta. Internally it is
//! a LORD-3-style wealth recursion whose payout and spending schedule are
//! set by (eps, r, delta) and paced by (eta, rho) instead of a fixed b0:
//! the initial budget is worth r discoveries, so the exceedance guarantee
//! only binds once r discoveries have accumulated.

use crate::error::{FdrError, Result};
use crate::result::{check_pvals, TestResults};
use crate::weights::{lord_gamma, validate_weights};
use serde::{Deserialize, Serialize};

/// supLORD procedure configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupLord {
    /// Bound on the probability of the FDP exceeding `eps`.
    pub delta: f64,
    /// False discovery proportion bound.
    pub eps: f64,
    /// Number of rejections required before the guarantee binds.
    pub r: usize,
    /// Wealth-spend pace: the fraction of current wealth spent between
    /// consecutive rejections, in (0, 1].
    pub eta: f64,
    /// Decay length of the spending sequence: each gamma weight is
    /// stretched over `rho` steps.
    pub rho: usize,
    /// Weighting sequence; `None` selects the LORD default.
    pub gammai: Option<Vec<f64>>,
}

impl SupLord {
    /// Create a supLORD procedure with exceedance bound `eps` at
    /// probability `delta`, binding after `r` rejections.
    pub fn new(delta: f64, eps: f64, r: usize) -> Self {
        SupLord {
            delta,
            eps,
            r,
            eta: 0.05,
            rho: 30,
            gammai: None,
        }
    }

    /// Set the wealth-spend pace.
    pub fn eta(mut self, eta: f64) -> Self {
        self.eta = eta;
        self
    }

    /// Set the spend-sequence decay length.
    pub fn rho(mut self, rho: usize) -> Self {
        self.rho = rho;
        self
    }

    /// Supply a custom gamma sequence.
    pub fn with_weights(mut self, gammai: Vec<f64>) -> Self {
        self.gammai = Some(gammai);
        self
    }

    fn validate(&self) -> Result<()> {
        if !(self.delta > 0.0 && self.delta < 1.0) {
            return Err(FdrError::InvalidParameter(format!(
                "delta must be in (0, 1), got {}",
                self.delta
            )));
        }
        if !(self.eps > 0.0 && self.eps < 1.0) {
            return Err(FdrError::InvalidParameter(format!(
                "eps must be in (0, 1), got {}",
                self.eps
            )));
        }
        if self.r == 0 {
            return Err(FdrError::InvalidParameter(
                "r must be a positive integer".to_string(),
            ));
        }
        if !(self.eta > 0.0 && self.eta <= 1.0) {
            return Err(FdrError::InvalidParameter(format!(
                "eta must be in (0, 1], got {}",
                self.eta
            )));
        }
        if self.rho == 0 {
            return Err(FdrError::InvalidParameter(
                "rho must be a positive integer".to_string(),
            ));
        }
        Ok(())
    }

    /// Run the procedure over an ordered p-value stream.
    ///
    /// With a = delta^(1/r), the wealth starts at w0 = eps * r * a, each
    /// rejection pays out b = eps * (1 - a), and the spend sequence is
    /// psi_j = (eta / rho) * gamma_ceil(j / rho), so the total fraction of
    /// wealth spent between rejections is eta. The recursion is LORD-3's:
    /// alpha_t = psi_{t - tau(t)} * W(tau(t)).
    pub fn run(&self, pvals: &[f64]) -> Result<TestResults> {
        self.validate()?;
        check_pvals(pvals)?;
        let n = pvals.len();
        let gammai = match &self.gammai {
            Some(g) => {
                validate_weights(g, n, 1.0, "gammai")?;
                g.clone()
            }
            None => lord_gamma(n),
        };
        // Spend sequence, stretched by rho: psi(j) for j >= 1.
        let psi = |j: usize| self.eta / self.rho as f64 * gammai[(j - 1) / self.rho];

        let a = self.delta.powf(1.0 / self.r as f64);
        let w0 = self.eps * self.r as f64 * a;
        let payout = self.eps * (1.0 - a);

        let mut thresholds = Vec::with_capacity(n);
        let mut rejected = Vec::with_capacity(n);
        let mut wealth = Vec::with_capacity(n + 1);
        wealth.push(w0);
        let mut last_rejection = 0usize;

        for t in 1..=n {
            let alphai = psi(t - last_rejection) * wealth[last_rejection];
            let reject = pvals[t - 1] <= alphai;
            wealth.push(wealth[t - 1] - alphai + if reject { payout } else { 0.0 });
            thresholds.push(alphai);
            rejected.push(reject);
            if reject {
                last_rejection = t;
            }
        }
        Ok(TestResults::new(pvals, thresholds, rejected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn suplord() -> SupLord {
        SupLord::new(0.05, 0.15, 30).eta(0.05).rho(30)
    }

    #[test]
    fn test_seed_threshold_spends_from_initial_wealth() {
        let pvals = [0.5; 5];
        let res = suplord().run(&pvals).unwrap();
        let g = lord_gamma(5);
        let a = 0.05f64.powf(1.0 / 30.0);
        let w0 = 0.15 * 30.0 * a;
        assert_relative_eq!(res.thresholds[0], 0.05 / 30.0 * g[0] * w0, epsilon = 1e-12);
    }

    #[test]
    fn test_thresholds_decay_between_rejections() {
        let pvals = [0.9; 50];
        let res = suplord().run(&pvals).unwrap();
        assert_eq!(res.n_rejected(), 0);
        for w in res.thresholds.windows(2) {
            assert!(w[1] <= w[0]);
        }
    }

    #[test]
    fn test_rejection_resets_the_spend_clock() {
        // A very small p-value deep into the stream gets rejected and the
        // threshold jumps back up afterwards.
        let mut pvals = vec![0.9; 40];
        pvals[20] = 1e-12;
        let res = suplord().run(&pvals).unwrap();
        assert!(res.rejected[20]);
        assert!(res.thresholds[21] > res.thresholds[20]);
    }

    #[test]
    fn test_wealth_never_goes_negative() {
        let mut pvals = vec![0.9; 100];
        for i in (0..100).step_by(7) {
            pvals[i] = 1e-12;
        }
        let res = suplord().run(&pvals).unwrap();
        // Thresholds stay positive throughout; a bankrupt wealth would
        // produce a non-positive threshold.
        for &a in &res.thresholds {
            assert!(a > 0.0);
        }
    }

    #[test]
    fn test_larger_eta_spends_faster() {
        let pvals = [0.5; 5];
        let slow = suplord().eta(0.01).run(&pvals).unwrap();
        let fast = suplord().eta(0.10).run(&pvals).unwrap();
        assert!(fast.thresholds[0] > slow.thresholds[0]);
    }

    #[test]
    fn test_threshold_decision_consistency_and_causality() {
        let pvals = [1e-9, 0.3, 1e-6, 0.04, 0.8, 1e-3];
        let full = suplord().run(&pvals).unwrap();
        for i in 0..pvals.len() {
            assert_eq!(full.rejected[i], pvals[i] <= full.thresholds[i]);
        }
        for cut in 1..=pvals.len() {
            let prefix = suplord().run(&pvals[..cut]).unwrap();
            assert_eq!(prefix.thresholds, full.thresholds[..cut]);
        }
    }

    #[test]
    fn test_rejects_out_of_range_parameters() {
        let pvals = [0.1, 0.2];
        assert!(SupLord::new(0.0, 0.15, 30).run(&pvals).is_err());
        assert!(SupLord::new(0.05, 1.0, 30).run(&pvals).is_err());
        assert!(SupLord::new(0.05, 0.15, 0).run(&pvals).is_err());
        assert!(suplord().eta(0.0).run(&pvals).is_err());
        assert!(suplord().eta(1.5).run(&pvals).is_err());
        assert!(suplord().rho(0).run(&pvals).is_err());
    }
}
