//! LORDstar: LORD++ under asynchronous, lagged, or batched dependence.

use crate::error::{FdrError, Result};
use crate::result::{check_alpha, check_pvals, TestResults};
use crate::star::{Resolver, Topology};
use crate::weights::{lord_gamma, validate_weights};
use serde::{Deserialize, Serialize};

/// LORDstar procedure configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LordStar {
    /// Overall significance level, in (0, 1].
    pub alpha: f64,
    /// Weighting sequence; `None` selects the LORD default.
    pub gammai: Option<Vec<f64>>,
    /// Initial wealth, 0 <= w0 <= alpha.
    pub w0: f64,
    /// Dependency structure of the testing process.
    pub topology: Topology,
}

impl LordStar {
    /// Create a LORDstar procedure at level `alpha` under `topology`, with
    /// the package default w0 = alpha/10.
    pub fn new(alpha: f64, topology: Topology) -> Self {
        LordStar {
            alpha,
            gammai: None,
            w0: alpha / 10.0,
            topology,
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
    /// threshold_t = gamma_t w0 + (alpha - w0) gamma_{t - c_1}
    ///               + alpha * sum_{y >= 2} gamma_{t - c_y},
    /// where c_y is the step credit at which the y-th resolved discovery
    /// first became visible.
    pub fn run(&self, pvals: &[f64]) -> Result<TestResults> {
        check_alpha(self.alpha)?;
        if !self.w0.is_finite() || self.w0 < 0.0 || self.w0 > self.alpha {
            return Err(FdrError::InvalidParameter(format!(
                "w0 must satisfy 0 <= w0 <= alpha, got w0 = {}",
                self.w0
            )));
        }
        check_pvals(pvals)?;
        let n = pvals.len();
        self.topology.validate(n)?;

        let gammai = match &self.gammai {
            Some(g) => {
                validate_weights(g, n, 1.0, "gammai")?;
                g.clone()
            }
            None => lord_gamma(n),
        };
        let g = |idx: usize| gammai[idx - 1];

        let mut resolver = Resolver::new(&self.topology);
        let mut thresholds = Vec::with_capacity(n);
        let mut rejected = Vec::with_capacity(n);

        for t in 1..=n {
            resolver.begin_step(t);
            let mut alphai = self.w0 * g(t);
            if let Some((&first, rest)) = resolver.crossings().split_first() {
                alphai += (self.alpha - self.w0) * g(t - first);
                for &cy in rest {
                    alphai += self.alpha * g(t - cy);
                }
            }
            let reject = pvals[t - 1] <= alphai;
            thresholds.push(alphai);
            rejected.push(reject);
            resolver.record(t, reject, false);
        }

        let mut results = TestResults::new(pvals, thresholds, rejected);
        results.lags = self.topology.lags();
        results.batch_ids = self.topology.batch_ids();
        Ok(results)
    }
}
