//! Adaptive, candidate-based FDR control: SAFFRON, Alpha-investing, ADDIS.
//!
//! All three track how many "candidate" p-values (p <= lambda) have arrived
//! between consecutive discoveries and use those counts to slow the decay of
//! the weighting sequence. ADDIS additionally discards p-values above a
//! selection threshold tau, removing them from the accounting entirely;
//! SAFFRON is the tau = 1 case of the same skeleton. Alpha-investing sets
//! the candidacy threshold to the running threshold itself, which makes
//! candidates coincide with rejections.

use crate::error::{FdrError, Result};
use crate::result::{check_alpha, check_pvals, TestResults};
use crate::weights::{adaptive_gamma, validate_weights};
use serde::{Deserialize, Serialize};

/// SAFFRON procedure configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Saffron {
    /// Overall significance level, in (0, 1].
    pub alpha: f64,
    /// Weighting sequence; `None` selects the adaptive default.
    pub gammai: Option<Vec<f64>>,
    /// Initial wealth, 0 <= w0 <= alpha.
    pub w0: f64,
    /// Candidacy threshold, in (0, 1).
    pub lambda: f64,
}

impl Default for Saffron {
    fn default() -> Self {
        Saffron::new(0.05)
    }
}

impl Saffron {
    /// Create a SAFFRON procedure at level `alpha` with the package
    /// defaults w0 = alpha/2 and lambda = 0.5.
    pub fn new(alpha: f64) -> Self {
        Saffron {
            alpha,
            gammai: None,
            w0: alpha / 2.0,
            lambda: 0.5,
        }
    }

    /// Supply a custom gamma sequence.
    pub fn with_weights(mut self, gammai: Vec<f64>) -> Self {
        self.gammai = Some(gammai);
        self
    }

    /// Set the initial wealth.
    pub fn w0(mut self, w0: f64) -> Self {
        self.w0 = w0;
        self
    }

    /// Set the candidacy threshold.
    pub fn lambda(mut self, lambda: f64) -> Self {
        self.lambda = lambda;
        self
    }

    /// Run the procedure over an ordered p-value stream.
    pub fn run(&self, pvals: &[f64]) -> Result<TestResults> {
        check_alpha(self.alpha)?;
        check_w0(self.w0, self.alpha)?;
        if !(self.lambda > 0.0 && self.lambda < 1.0) {
            return Err(FdrError::InvalidParameter(format!(
                "lambda must be in (0, 1), got {}",
                self.lambda
            )));
        }
        check_pvals(pvals)?;
        let gammai = resolve_weights(&self.gammai, pvals.len())?;
        let (thresholds, rejected) =
            run_adaptive(pvals, &gammai, self.alpha, self.w0, self.lambda, 1.0);
        Ok(TestResults::new(pvals, thresholds, rejected))
    }
}

/// ADDIS procedure configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Addis {
    /// Overall significance level, in (0, 1].
    pub alpha: f64,
    /// Weighting sequence; `None` selects the adaptive default.
    pub gammai: Option<Vec<f64>>,
    /// Initial wealth, 0 <= w0 <= alpha.
    pub w0: f64,
    /// Candidacy threshold, 0 < lambda < tau.
    pub lambda: f64,
    /// Selection (discard) threshold, in (0, 1).
    pub tau: f64,
}

impl Default for Addis {
    fn default() -> Self {
        Addis::new(0.05)
    }
}

impl Addis {
    /// Create an ADDIS procedure at level `alpha` with the package defaults
    /// lambda = 0.25, tau = 0.5 and w0 = tau * lambda * alpha / 2.
    pub fn new(alpha: f64) -> Self {
        Addis {
            alpha,
            gammai: None,
            w0: 0.5 * 0.25 * alpha / 2.0,
            lambda: 0.25,
            tau: 0.5,
        }
    }

    /// Supply a custom gamma sequence.
    pub fn with_weights(mut self, gammai: Vec<f64>) -> Self {
        self.gammai = Some(gammai);
        self
    }

    /// Set the initial wealth.
    pub fn w0(mut self, w0: f64) -> Self {
        self.w0 = w0;
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

    /// Run the procedure over an ordered p-value stream.
    pub fn run(&self, pvals: &[f64]) -> Result<TestResults> {
        check_alpha(self.alpha)?;
        check_w0(self.w0, self.alpha)?;
        if !(self.tau > 0.0 && self.tau < 1.0) {
            return Err(FdrError::InvalidParameter(format!(
                "tau must be in (0, 1), got {}",
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
        let gammai = resolve_weights(&self.gammai, pvals.len())?;
        let (thresholds, rejected) =
            run_adaptive(pvals, &gammai, self.alpha, self.w0, self.lambda, self.tau);
        Ok(TestResults::new(pvals, thresholds, rejected))
    }
}

/// Alpha-investing procedure configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlphaInvesting {
    /// Overall significance level, in (0, 1].
    pub alpha: f64,
    /// Weighting sequence; `None` selects the adaptive default.
    pub gammai: Option<Vec<f64>>,
    /// Initial wealth, 0 <= w0 <= alpha.
    pub w0: f64,
}

impl Default for AlphaInvesting {
    fn default() -> Self {
        AlphaInvesting::new(0.05)
    }
}

impl AlphaInvesting {
    /// Create an Alpha-investing procedure at level `alpha` with the
    /// package default w0 = alpha/2.
    pub fn new(alpha: f64) -> Self {
        AlphaInvesting {
            alpha,
            gammai: None,
            w0: alpha / 2.0,
        }
    }

    /// Supply a custom gamma sequence.
    pub fn with_weights(mut self, gammai: Vec<f64>) -> Self {
        self.gammai = Some(gammai);
        self
    }

    /// Set the initial wealth.
    pub fn w0(mut self, w0: f64) -> Self {
        self.w0 = w0;
        self
    }

    /// Run the procedure over an ordered p-value stream.
    ///
    /// SAFFRON's rule with lambda_t = alpha_t: candidates coincide with
    /// rejections and the self-referential cap resolves in closed form to
    /// alpha_t = w_t / (1 + w_t).
    pub fn run(&self, pvals: &[f64]) -> Result<TestResults> {
        check_alpha(self.alpha)?;
        check_w0(self.w0, self.alpha)?;
        check_pvals(pvals)?;
        let n = pvals.len();
        let gammai = resolve_weights(&self.gammai, n)?;
        let g = |idx: usize| gammai[idx - 1];

        let mut thresholds = Vec::with_capacity(n);
        let mut rejected = Vec::with_capacity(n);
        let mut taus: Vec<usize> = Vec::new();
        // Rejections falling strictly after each discovery time.
        let mut rej_after: Vec<usize> = Vec::new();
        let mut rej_total = 0usize;

        for t in 1..=n {
            let mut w = self.w0 * g(t - rej_total);
            if !taus.is_empty() {
                w += (self.alpha - self.w0) * g(t - taus[0] - rej_after[0]);
                for j in 1..taus.len() {
                    w += self.alpha * g(t - taus[j] - rej_after[j]);
                }
            }
            let alphai = w / (1.0 + w);
            let reject = pvals[t - 1] <= alphai;
            thresholds.push(alphai);
            rejected.push(reject);
            if reject {
                rej_total += 1;
                for r in rej_after.iter_mut() {
                    *r += 1;
                }
                taus.push(t);
                rej_after.push(0);
            }
        }
        Ok(TestResults::new(pvals, thresholds, rejected))
    }
}

fn check_w0(w0: f64, alpha: f64) -> Result<()> {
    if !w0.is_finite() || w0 < 0.0 || w0 > alpha {
        return Err(FdrError::InvalidParameter(format!(
            "w0 must satisfy 0 <= w0 <= alpha, got w0 = {}",
            w0
        )));
    }
    Ok(())
}

fn resolve_weights(gammai: &Option<Vec<f64>>, n: usize) -> Result<Vec<f64>> {
    match gammai {
        Some(g) => {
            validate_weights(g, n, 1.0, "gammai")?;
            Ok(g.clone())
        }
        None => Ok(adaptive_gamma(n)),
    }
}

/// Shared SAFFRON/ADDIS update. With tau = 1 every test is selected and
/// this is exactly SAFFRON; with tau < 1 p-values above tau vanish from
/// both the budget indexing and candidacy.
///
/// alpha_t = min(lambda, w0 * gamma_{S - C0 + 1}
///               + ((1 - lambda/tau) alpha - w0) * gamma_{S - kappa*_1 - C1 + 1}
///               + (1 - lambda/tau) alpha * sum_{j>=2} gamma_{S - kappa*_j - Cj + 1})
///
/// where S counts selected tests before t, kappa*_j the selected count up
/// to (and including) the j-th discovery, and Cj the candidates arriving
/// strictly after it.
fn run_adaptive(
    pvals: &[f64],
    gammai: &[f64],
    alpha: f64,
    w0: f64,
    lambda: f64,
    tau: f64,
) -> (Vec<f64>, Vec<bool>) {
    let g = |idx: usize| gammai[idx - 1];
    let n = pvals.len();
    let coef = (1.0 - lambda / tau) * alpha;

    let mut thresholds = Vec::with_capacity(n);
    let mut rejected = Vec::with_capacity(n);
    let mut selected = 0usize;
    let mut cand_total = 0usize;
    let mut kappa_star: Vec<usize> = Vec::new();
    let mut cand_after: Vec<usize> = Vec::new();

    for t in 1..=n {
        let mut w = w0 * g(selected - cand_total + 1);
        if !kappa_star.is_empty() {
            w += (coef - w0) * g(selected - kappa_star[0] - cand_after[0] + 1);
            for j in 1..kappa_star.len() {
                w += coef * g(selected - kappa_star[j] - cand_after[j] + 1);
            }
        }
        let alphai = w.min(lambda);
        let p = pvals[t - 1];
        let reject = p <= alphai;
        thresholds.push(alphai);
        rejected.push(reject);

        // Counters update once per step, after the decision.
        if p <= tau {
            selected += 1;
        }
        if p <= lambda {
            cand_total += 1;
            for c in cand_after.iter_mut() {
                *c += 1;
            }
        }
        if reject {
            // The cap guarantees a rejection is both selected and a candidate.
            kappa_star.push(selected);
            cand_after.push(0);
        }
    }
    (thresholds, rejected)
}
