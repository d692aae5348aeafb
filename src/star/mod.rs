//! Asynchronous ("star") variants: LONDstar, LORDstar, SAFFRONstar.
//!
//! The synchronous procedures assume every earlier decision is known when a
//! test arrives. The star variants relax this: a discovery at time j only
//! influences test t once it is *resolved* relative to t, under one of
//! three dependency topologies described by [`Topology`]. Resolution order
//! is tracked with visibility watermarks: the y-th crossing records when
//! the y-th resolved discovery first became visible, and the earliest
//! crossing carries the differential (alpha - w0) wealth credit while later
//! crossings earn the flat alpha credit. Discoveries resolving
//! simultaneously share a single crossing step and hence a single weight
//! index.

mod lond;
mod lord;
mod saffron;

pub use lond::LondStar;
pub use lord::LordStar;
pub use saffron::SaffronStar;

use crate::error::{FdrError, Result};
use crate::result::check_len;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Dependency structure of the testing process.
///
/// All auxiliary data is fixed before the stream starts and is read-only
/// during the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Topology {
    /// Tests finish out of order: entry i holds the decision (finish) time
    /// of test i+1, an integer >= 1. A discovery at j is resolved for test
    /// t iff its decision time is <= t - 1.
    Async(Vec<usize>),
    /// Local dependence: entry i holds the lag of test i+1. A discovery at
    /// j is resolved for test t iff j <= t - 1 - lag_t.
    Dep(Vec<usize>),
    /// Mini-batches: contiguous batch sizes summing to the stream length.
    /// Discoveries in strictly earlier batches are resolved; same-batch
    /// discoveries never are.
    Batch(Vec<usize>),
}

impl Topology {
    pub(crate) fn validate(&self, n: usize) -> Result<()> {
        match self {
            Topology::Async(times) => {
                check_len("decision times", times.len(), n)?;
                if times.iter().any(|&e| e < 1) {
                    return Err(FdrError::InvalidParameter(
                        "decision times must be integers >= 1".to_string(),
                    ));
                }
            }
            Topology::Dep(lags) => {
                check_len("lags", lags.len(), n)?;
            }
            Topology::Batch(sizes) => {
                if sizes.is_empty() || sizes.iter().any(|&s| s == 0) {
                    return Err(FdrError::InvalidParameter(
                        "batch sizes must be positive integers".to_string(),
                    ));
                }
                let total: usize = sizes.iter().sum();
                if total != n {
                    return Err(FdrError::InvalidParameter(format!(
                        "batch sizes sum to {}, but the stream has {} p-values",
                        total, n
                    )));
                }
            }
        }
        Ok(())
    }

    /// Per-test batch ids (0-based), echoed in the output of batch runs.
    pub(crate) fn batch_ids(&self) -> Option<Vec<usize>> {
        match self {
            Topology::Batch(sizes) => {
                let mut ids = Vec::with_capacity(sizes.iter().sum());
                for (b, &size) in sizes.iter().enumerate() {
                    ids.extend(std::iter::repeat(b).take(size));
                }
                Some(ids)
            }
            _ => None,
        }
    }

    /// Per-test lags, echoed in the output of dep runs.
    pub(crate) fn lags(&self) -> Option<Vec<usize>> {
        match self {
            Topology::Dep(lags) => Some(lags.clone()),
            _ => None,
        }
    }
}

/// Visibility watermark: `times[y]` is the step credit for the (y+1)-th
/// resolved discovery, recorded the first time the resolved count reached
/// that level. Crossings only ever advance; they are never revoked even if
/// an irregular lag later shrinks the resolved set.
#[derive(Debug, Default)]
struct Watermark {
    times: Vec<usize>,
}

impl Watermark {
    fn advance(&mut self, level: usize, time: usize) {
        while self.times.len() < level {
            self.times.push(time);
        }
    }

    fn times(&self) -> &[usize] {
        &self.times
    }
}

/// Streaming view of the conflict sets for one run: which discoveries and
/// candidates are resolved relative to the current test, and when each
/// discovery first became visible.
pub(crate) struct Resolver<'a> {
    watermark: Watermark,
    kind: ResolverKind<'a>,
}

enum ResolverKind<'a> {
    Async {
        times: &'a [usize],
        /// Decision times of discoveries not yet resolved.
        pending_rej: BinaryHeap<Reverse<usize>>,
        /// (decision time, position) of candidates not yet resolved.
        pending_cand: BinaryHeap<Reverse<(usize, usize)>>,
        resolved_rej: usize,
        /// Sorted positions of resolved candidates.
        cand_pos: Vec<usize>,
    },
    Dep {
        lags: &'a [usize],
        rej_prefix: Vec<usize>,
        cand_prefix: Vec<usize>,
        horizon: usize,
    },
    Batch {
        /// Cumulative batch sizes: 1-based index of each batch's last test.
        ends: Vec<usize>,
        rej_prefix: Vec<usize>,
        cand_prefix: Vec<usize>,
        /// End of the last fully decided batch.
        horizon: usize,
        /// Next batch to fold into the horizon.
        next_batch: usize,
    },
}

impl<'a> Resolver<'a> {
    pub(crate) fn new(topology: &'a Topology) -> Self {
        let kind = match topology {
            Topology::Async(times) => ResolverKind::Async {
                times,
                pending_rej: BinaryHeap::new(),
                pending_cand: BinaryHeap::new(),
                resolved_rej: 0,
                cand_pos: Vec::new(),
            },
            Topology::Dep(lags) => ResolverKind::Dep {
                lags,
                rej_prefix: vec![0],
                cand_prefix: vec![0],
                horizon: 0,
            },
            Topology::Batch(sizes) => {
                let mut ends = Vec::with_capacity(sizes.len());
                let mut sum = 0;
                for &s in sizes {
                    sum += s;
                    ends.push(sum);
                }
                ResolverKind::Batch {
                    ends,
                    rej_prefix: vec![0],
                    cand_prefix: vec![0],
                    horizon: 0,
                    next_batch: 0,
                }
            }
        };
        Resolver {
            watermark: Watermark::default(),
            kind,
        }
    }

    /// Prepare for test `t` (1-based): resolve whatever the topology says
    /// is now visible, advance the watermark, and return the resolved
    /// discovery count d_t.
    pub(crate) fn begin_step(&mut self, t: usize) -> usize {
        match &mut self.kind {
            ResolverKind::Async {
                pending_rej,
                pending_cand,
                resolved_rej,
                cand_pos,
                ..
            } => {
                while pending_rej.peek().is_some_and(|&Reverse(e)| e <= t - 1) {
                    pending_rej.pop();
                    *resolved_rej += 1;
                }
                while let Some(&Reverse((e, pos))) = pending_cand.peek() {
                    if e > t - 1 {
                        break;
                    }
                    pending_cand.pop();
                    let at = cand_pos.partition_point(|&p| p < pos);
                    cand_pos.insert(at, pos);
                }
                self.watermark.advance(*resolved_rej, t - 1);
                *resolved_rej
            }
            ResolverKind::Dep {
                lags,
                rej_prefix,
                horizon,
                ..
            } => {
                *horizon = (t - 1).saturating_sub(lags[t - 1]);
                let d = rej_prefix[*horizon];
                self.watermark.advance(d, t - 1);
                d
            }
            ResolverKind::Batch {
                ends,
                rej_prefix,
                horizon,
                next_batch,
                ..
            } => {
                while *next_batch < ends.len() && ends[*next_batch] < t {
                    *horizon = ends[*next_batch];
                    self.watermark.advance(rej_prefix[*horizon], *horizon);
                    *next_batch += 1;
                }
                rej_prefix[*horizon]
            }
        }
    }

    /// Crossing steps of the resolved discoveries, earliest first.
    pub(crate) fn crossings(&self) -> &[usize] {
        self.watermark.times()
    }

    /// Number of resolved candidates (p <= lambda) relative to the current test.
    pub(crate) fn resolved_candidates(&self) -> usize {
        match &self.kind {
            ResolverKind::Async { cand_pos, .. } => cand_pos.len(),
            ResolverKind::Dep {
                cand_prefix,
                horizon,
                ..
            }
            | ResolverKind::Batch {
                cand_prefix,
                horizon,
                ..
            } => cand_prefix[*horizon],
        }
    }

    /// Resolved candidates positioned strictly after crossing step `c`.
    pub(crate) fn candidates_after(&self, c: usize) -> usize {
        match &self.kind {
            ResolverKind::Async { cand_pos, .. } => {
                cand_pos.len() - cand_pos.partition_point(|&p| p <= c)
            }
            ResolverKind::Dep {
                cand_prefix,
                horizon,
                ..
            }
            | ResolverKind::Batch {
                cand_prefix,
                horizon,
                ..
            } => cand_prefix[*horizon] - cand_prefix[c.min(*horizon)],
        }
    }

    /// Record the decision for test `t` after it is finalized.
    pub(crate) fn record(&mut self, t: usize, rejected: bool, candidate: bool) {
        match &mut self.kind {
            ResolverKind::Async {
                times,
                pending_rej,
                pending_cand,
                ..
            } => {
                if rejected {
                    pending_rej.push(Reverse(times[t - 1]));
                }
                if candidate {
                    pending_cand.push(Reverse((times[t - 1], t)));
                }
            }
            ResolverKind::Dep {
                rej_prefix,
                cand_prefix,
                ..
            }
            | ResolverKind::Batch {
                rej_prefix,
                cand_prefix,
                ..
            } => {
                rej_prefix.push(rej_prefix[t - 1] + rejected as usize);
                cand_prefix.push(cand_prefix[t - 1] + candidate as usize);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topology_validation() {
        assert!(Topology::Async(vec![1, 2, 3]).validate(3).is_ok());
        assert!(Topology::Async(vec![1, 2]).validate(3).is_err());
        assert!(Topology::Async(vec![1, 0, 3]).validate(3).is_err());
        assert!(Topology::Dep(vec![0, 0, 4]).validate(3).is_ok());
        assert!(Topology::Dep(vec![0]).validate(3).is_err());
        assert!(Topology::Batch(vec![2, 1]).validate(3).is_ok());
        assert!(Topology::Batch(vec![2, 2]).validate(3).is_err());
        assert!(Topology::Batch(vec![3, 0]).validate(3).is_err());
    }

    #[test]
    fn test_batch_ids_follow_sizes() {
        let ids = Topology::Batch(vec![2, 1, 3]).batch_ids().unwrap();
        assert_eq!(ids, vec![0, 0, 1, 2, 2, 2]);
    }

    #[test]
    fn test_async_resolver_counts_resolved_discoveries() {
        // Discoveries at t = 1 (finishes at 3) and t = 2 (finishes at 2).
        let topo = Topology::Async(vec![3, 2, 5, 5, 5]);
        let mut r = Resolver::new(&topo);
        assert_eq!(r.begin_step(1), 0);
        r.record(1, true, true);
        assert_eq!(r.begin_step(2), 0);
        r.record(2, true, true);
        // At t = 3 only test 2 (decision time 2) has resolved.
        assert_eq!(r.begin_step(3), 1);
        r.record(3, false, false);
        // At t = 4 test 1 has resolved as well.
        assert_eq!(r.begin_step(4), 2);
        assert_eq!(r.crossings(), &[2, 3]);
        assert_eq!(r.resolved_candidates(), 2);
        // Candidate at position 2 sits after crossing step 2? No: 2 <= 2.
        assert_eq!(r.candidates_after(2), 0);
        assert_eq!(r.candidates_after(1), 1);
    }

    #[test]
    fn test_dep_resolver_applies_lag() {
        let topo = Topology::Dep(vec![0, 0, 2, 0]);
        let mut r = Resolver::new(&topo);
        assert_eq!(r.begin_step(1), 0);
        r.record(1, true, true);
        assert_eq!(r.begin_step(2), 1);
        r.record(2, true, true);
        // Test 3 has lag 2: horizon is 3 - 1 - 2 = 0, nothing resolved.
        assert_eq!(r.begin_step(3), 0);
        r.record(3, false, false);
        // Test 4 has lag 0: both discoveries visible.
        assert_eq!(r.begin_step(4), 2);
    }

    #[test]
    fn test_batch_resolver_sees_only_earlier_batches() {
        let topo = Topology::Batch(vec![2, 2]);
        let mut r = Resolver::new(&topo);
        assert_eq!(r.begin_step(1), 0);
        r.record(1, true, true);
        // Test 2 shares the batch with test 1: its discovery is invisible.
        assert_eq!(r.begin_step(2), 0);
        r.record(2, true, true);
        // Batch 0 is complete; both discoveries resolve at its end and
        // share the crossing step.
        assert_eq!(r.begin_step(3), 2);
        assert_eq!(r.crossings(), &[2, 2]);
        r.record(3, false, false);
        assert_eq!(r.begin_step(4), 2);
    }
}
