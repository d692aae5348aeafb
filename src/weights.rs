//! Default weighting sequences and their validation.
//!
//! Every online procedure spends its error budget according to a
//! non-negative weighting sequence whose (conceptually infinite) sum is at
//! most one. The generators here produce the canonical defaults used when
//! the caller does not supply a custom sequence; `validate_weights` checks
//! the invariants on whatever sequence ends up being used.

use crate::error::{FdrError, Result};

/// Normalizing constant for the LORD-family default sequence
/// gamma_j = C * log(max(j, 2)) / (j * exp(sqrt(log j))).
const LORD_GAMMA_C: f64 = 0.07720838;

/// Normalizing constant for the adaptive (SAFFRON-family) default
/// gamma_j = C / j^1.6, i.e. 1/zeta(1.6).
const ADAPTIVE_GAMMA_C: f64 = 0.437_490_165_8;

/// Constant for the LORD `dep` default xi_j = C * alpha / (b0 * j * log(max(j,2))^3),
/// chosen so that sum xi_j * (1 + log j) <= alpha / b0.
const DEP_XI_C: f64 = 0.139307;

/// Slack allowed when checking floating-point prefix sums against a bound.
const SUM_TOLERANCE: f64 = 1e-8;

/// Default gamma sequence for LORD, the spending procedures, and supLORD.
///
/// Non-increasing, non-negative, with infinite sum equal to one.
pub fn lord_gamma(n: usize) -> Vec<f64> {
    (1..=n)
        .map(|j| {
            let jf = j as f64;
            LORD_GAMMA_C * (jf.max(2.0)).ln() / (jf * jf.ln().sqrt().exp())
        })
        .collect()
}

/// Default beta sequence for LOND: the LORD gamma scaled by `alpha`, so the
/// infinite sum equals `alpha`.
pub fn lond_beta(n: usize, alpha: f64) -> Vec<f64> {
    lord_gamma(n).into_iter().map(|g| alpha * g).collect()
}

/// Default xi sequence for LORD under arbitrary dependence, satisfying
/// sum xi_j * (1 + log j) <= alpha / b0.
pub fn dep_xi(n: usize, alpha: f64, b0: f64) -> Vec<f64> {
    (1..=n)
        .map(|j| {
            let jf = j as f64;
            DEP_XI_C * alpha / (b0 * jf * (jf.max(2.0)).ln().powi(3))
        })
        .collect()
}

/// Default gamma sequence for the adaptive procedures (SAFFRON,
/// Alpha-investing, ADDIS and their star variants): gamma_j = C / j^1.6.
pub fn adaptive_gamma(n: usize) -> Vec<f64> {
    (1..=n)
        .map(|j| ADAPTIVE_GAMMA_C / (j as f64).powf(1.6))
        .collect()
}

/// Harmonic numbers H(1)..H(n), the divisors for LOND's dependent mode.
pub(crate) fn harmonic_numbers(n: usize) -> Vec<f64> {
    let mut h = Vec::with_capacity(n);
    let mut sum = 0.0;
    for j in 1..=n {
        sum += 1.0 / j as f64;
        h.push(sum);
    }
    h
}

/// Validate a weighting sequence: length at least `n`, all entries
/// non-negative, and total sum at most `cap`.
pub(crate) fn validate_weights(weights: &[f64], n: usize, cap: f64, name: &'static str) -> Result<()> {
    if weights.len() < n {
        return Err(FdrError::LengthMismatch {
            name,
            expected: n,
            actual: weights.len(),
        });
    }
    if weights.iter().any(|&w| w < 0.0 || !w.is_finite()) {
        return Err(FdrError::InvalidWeights(format!(
            "all elements of {} must be non-negative and finite",
            name
        )));
    }
    let sum: f64 = weights.iter().sum();
    if sum > cap + SUM_TOLERANCE {
        return Err(FdrError::InvalidWeights(format!(
            "the elements of {} sum to {:.6}, which exceeds {}",
            name, sum, cap
        )));
    }
    Ok(())
}

/// Validate a xi sequence for LORD `dep`: non-negative and
/// sum xi_j * (1 + log j) <= alpha / b0.
pub(crate) fn validate_dep_xi(xi: &[f64], n: usize, alpha: f64, b0: f64) -> Result<()> {
    if xi.len() < n {
        return Err(FdrError::LengthMismatch {
            name: "gammai",
            expected: n,
            actual: xi.len(),
        });
    }
    if xi.iter().any(|&w| w < 0.0 || !w.is_finite()) {
        return Err(FdrError::InvalidWeights(
            "all elements of gammai must be non-negative and finite".to_string(),
        ));
    }
    let weighted: f64 = xi
        .iter()
        .enumerate()
        .map(|(i, &w)| w * (1.0 + ((i + 1) as f64).ln()))
        .sum();
    if weighted > alpha / b0 + SUM_TOLERANCE {
        return Err(FdrError::InvalidWeights(format!(
            "sum of gammai * (1 + log j) is {:.6}, which exceeds alpha / b0 = {:.6}",
            weighted,
            alpha / b0
        )));
    }
    Ok(())
}
