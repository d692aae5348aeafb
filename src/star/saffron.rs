//! SAFFRONstar: adaptive FDR control under asynchronous, lagged, or
//! batched dependence.
//!
//! SAFFRON's candidate windows are restricted to conflict-set-resolved
//! tests: a p-value contributes candidacy only once its decision is
//! visible under the topology, and discovery lags are measured from the
//! watermark crossings rather than raw discovery times.

use crate::error::{FdrError, Result};
use crate::result::{check_alpha, check_pvals, TestResults};
use crate::star::{Resolver, Topology};
use crate::weights::{adaptive_gamma, validate_weights};
use serde::{Deserialize, Serialize};

/// SAFFRONstar procedure configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaffronStar {
    /// Overall significance level, in (0, 1].
    pub alpha: f64,
    /// Weighting sequence; `None` selects the adaptive default.
    pub gammai: Option<Vec<f64>>,
    /// Initial wealth, 0 <= w0 <= alpha.
    pub w0: f64,
    /// Candidacy threshold, in (0, 1).
    pub lambda: f64,
    /// Dependency structure of the testing process.
    pub topology: Topology,
}

impl SaffronStar {
    /// Create a SAFFRONstar procedure at level `alpha` under `topology`,
    /// with the package defaults w0 = alpha/2 and lambda = 0.5.
    pub fn new(alpha: f64, topology: Topology) -> Self {
        SaffronStar {
            alpha,
            gammai: None,
            w0: alpha / 2.0,
            lambda: 0.5,
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

    /// Set the candidacy threshold.
    pub fn lambda(mut self, lambda: f64) -> Self {
        self.lambda = lambda;
        self
    }

    /// Run the procedure over an ordered p-value stream.
    ///
    /// threshold_t = min(lambda, w0 gamma_{t - C0}
    ///               + ((1 - lambda) alpha - w0) gamma_{t - c_1 - C_1}
    ///               + (1 - lambda) alpha sum_{y >= 2} gamma_{t - c_y - C_y}),
    /// with C0 the resolved candidates before t and C_y the resolved
    /// candidates after the y-th crossing c_y.
    pub fn run(&self, pvals: &[f64]) -> Result<TestResults> {
        check_alpha(self.alpha)?;
        if !self.w0.is_finite() || self.w0 < 0.0 || self.w0 > self.alpha {
            return Err(FdrError::InvalidParameter(format!(
                "w0 must satisfy 0 <= w0 <= alpha, got w0 = {}",
                self.w0
            )));
        }
        if !(self.lambda > 0.0 && self.lambda < 1.0) {
            return Err(FdrError::InvalidParameter(format!(
                "lambda must be in (0, 1), got {}",
                self.lambda
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
            None => adaptive_gamma(n),
        };
        let g = |idx: usize| gammai[idx - 1];
        let coef = (1.0 - self.lambda) * self.alpha;

        let mut resolver = Resolver::new(&self.topology);
        let mut thresholds = Vec::with_capacity(n);
        let mut rejected = Vec::with_capacity(n);

        for t in 1..=n {
            resolver.begin_step(t);
            let c0 = resolver.resolved_candidates();
            let mut w = self.w0 * g(t - c0);
            if let Some((&first, rest)) = resolver.crossings().split_first() {
                w += (coef - self.w0) * g(t - first - resolver.candidates_after(first));
                for &cy in rest {
                    w += coef * g(t - cy - resolver.candidates_after(cy));
                }
            }
            let alphai = w.min(self.lambda);
            let p = pvals[t - 1];
            let reject = p <= alphai;
            thresholds.push(alphai);
            rejected.push(reject);
            resolver.record(t, reject, p <= self.lambda);
        }

        let mut results = TestResults::new(pvals, thresholds, rejected);
        results.lags = self.topology.lags();
        results.batch_ids = self.topology.batch_ids();
        Ok(results)
    }
}
