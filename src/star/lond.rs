//! LONDstar: LOND under asynchronous, lagged, or batched dependence.

use crate::error::Result;
use crate::result::{check_alpha, check_pvals, TestResults};
use crate::star::{Resolver, Topology};
use crate::weights::{lond_beta, validate_weights};
use serde::{Deserialize, Serialize};

/// LONDstar procedure configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LondStar {
    /// Overall significance level, in (0, 1].
    pub alpha: f64,
    /// Budget sequence; `None` selects the default generator.
    pub betai: Option<Vec<f64>>,
    /// Dependency structure of the testing process.
    pub topology: Topology,
}

impl LondStar {
    /// Create a LONDstar procedure at level `alpha` under `topology`.
    pub fn new(alpha: f64, topology: Topology) -> Self {
        LondStar {
            alpha,
            betai: None,
            topology,
        }
    }

    /// Supply a custom beta sequence.
    pub fn with_weights(mut self, betai: Vec<f64>) -> Self {
        self.betai = Some(betai);
        self
    }

    /// Run the procedure over an ordered p-value stream.
    ///
    /// threshold_t = beta_t * (d_t + 1), where d_t counts the discoveries
    /// resolved relative to test t.
    pub fn run(&self, pvals: &[f64]) -> Result<TestResults> {
        check_alpha(self.alpha)?;
        check_pvals(pvals)?;
        let n = pvals.len();
        self.topology.validate(n)?;

        let betai = match &self.betai {
            Some(b) => {
                validate_weights(b, n, 1.0, "betai")?;
                b.clone()
            }
            None => lond_beta(n, self.alpha),
        };

        let mut resolver = Resolver::new(&self.topology);
        let mut thresholds = Vec::with_capacity(n);
        let mut rejected = Vec::with_capacity(n);

        for t in 1..=n {
            let d = resolver.begin_step(t);
            let alphai = betai[t - 1] * (d as f64 + 1.0);
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
