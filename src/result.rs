//! Result types for online testing procedures.

use crate::error::{FdrError, Result};
use serde::{Deserialize, Serialize};

/// Output of one procedure run: per-test thresholds and decisions, in
/// input order.
///
/// The invariant `rejected[i] == (pvals[i] <= thresholds[i])` holds for
/// every procedure in the crate; decisions are never derived any other way.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResults {
    /// Original p-values, echoed in input order.
    pub pvals: Vec<f64>,
    /// Adjusted significance thresholds (alphai), one per test.
    pub thresholds: Vec<f64>,
    /// Rejection decisions: `true` means the null at that index is rejected.
    pub rejected: Vec<bool>,
    /// Per-test lag, echoed by lagged-dependence variants.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lags: Option<Vec<usize>>,
    /// Per-test batch id (0-based), echoed by batched variants.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_ids: Option<Vec<usize>>,
}

impl TestResults {
    /// Assemble results from parallel threshold/decision vectors.
    pub(crate) fn new(pvals: &[f64], thresholds: Vec<f64>, rejected: Vec<bool>) -> Self {
        TestResults {
            pvals: pvals.to_vec(),
            thresholds,
            rejected,
            lags: None,
            batch_ids: None,
        }
    }

    /// Number of tests.
    pub fn len(&self) -> usize {
        self.pvals.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.pvals.is_empty()
    }

    /// Number of rejections (discoveries).
    pub fn n_rejected(&self) -> usize {
        self.rejected.iter().filter(|&&r| r).count()
    }

    /// Indices (0-based) of the rejected hypotheses.
    pub fn rejected_indices(&self) -> Vec<usize> {
        self.rejected
            .iter()
            .enumerate()
            .filter(|(_, &r)| r)
            .map(|(i, _)| i)
            .collect()
    }

    /// Decisions as 0/1 integers, convenient for comparisons in reports.
    pub fn decisions(&self) -> Vec<u8> {
        self.rejected.iter().map(|&r| r as u8).collect()
    }

    /// Serialize to a JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Validate a p-value stream: non-empty and every entry in [0, 1].
pub(crate) fn check_pvals(pvals: &[f64]) -> Result<()> {
    if pvals.is_empty() {
        return Err(FdrError::EmptyData(
            "the p-value stream must contain at least one test".to_string(),
        ));
    }
    for (index, &value) in pvals.iter().enumerate() {
        if !(0.0..=1.0).contains(&value) {
            return Err(FdrError::InvalidPValue { index, value });
        }
    }
    Ok(())
}

/// Validate a significance level: alpha must lie in (0, 1].
pub(crate) fn check_alpha(alpha: f64) -> Result<()> {
    if !(alpha > 0.0 && alpha <= 1.0) {
        return Err(FdrError::InvalidParameter(format!(
            "alpha must be in (0, 1], got {}",
            alpha
        )));
    }
    Ok(())
}

/// Validate an auxiliary per-test array length against the stream length.
pub(crate) fn check_len(name: &'static str, actual: usize, expected: usize) -> Result<()> {
    if actual != expected {
        return Err(FdrError::LengthMismatch {
            name,
            expected,
            actual,
        });
    }
    Ok(())
}
