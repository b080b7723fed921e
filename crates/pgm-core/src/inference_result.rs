//! Per-replica mutable inference/learning state.
//!
//! Everything here is read and written by a replica's worker threads
//! without locks, following the Hogwild! design: each worker writes a
//! disjoint variable range, but weight slots alias across workers by
//! design. Rust has no well-defined non-atomic data race, so every shared
//! slot is an atomic with `Ordering::Relaxed` accesses — preserving "no
//! fence, no serialization" while making every individual load/store
//! well-defined. See DESIGN.md for the full rationale.

use crate::compact_graph::CompactFactorGraph;
use crate::ids::{VariableId, VariableValue, WeightId};
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};

const RELAXED: Ordering = Ordering::Relaxed;

/// Atomic `f64` via bit-cast, since `f64` itself has no atomic type in std.
#[derive(Debug)]
struct AtomicF64(AtomicU64);

impl AtomicF64 {
    fn new(v: f64) -> Self {
        Self(AtomicU64::new(v.to_bits()))
    }

    #[inline]
    fn load(&self) -> f64 {
        f64::from_bits(self.0.load(RELAXED))
    }

    #[inline]
    fn store(&self, v: f64) {
        self.0.store(v.to_bits(), RELAXED);
    }

    /// Non-atomic read-modify-write: acceptable here because weight updates
    /// are intentionally racy (small, epoch-averaged gradients); see the
    /// module doc.
    #[inline]
    fn add(&self, delta: f64) {
        let current = self.load();
        self.store(current + delta);
    }
}

/// Mutable, per-replica state: current assignments (both views), weight
/// values, and sampling tallies. One instance per NUMA replica.
pub struct InferenceResult {
    pub nvars: usize,
    pub nweights: usize,
    ntallies: usize,

    assignments_free: Vec<AtomicI32>,
    assignments_evid: Vec<AtomicI32>,
    weight_values: Vec<AtomicF64>,
    weights_isfixed: Vec<bool>,
    agg_nsamples: Vec<AtomicU64>,
    sample_tallies: Vec<AtomicU64>,
}

impl InferenceResult {
    pub fn new(graph: &CompactFactorGraph) -> Self {
        let assignments_free = graph
            .variables
            .iter()
            .map(|v| AtomicI32::new(v.initial_value))
            .collect();
        let assignments_evid = graph
            .variables
            .iter()
            .map(|v| AtomicI32::new(v.initial_value))
            .collect();
        let weight_values = graph.weights.iter().map(|w| AtomicF64::new(w.initial_value)).collect();
        let weights_isfixed = graph.weights.iter().map(|w| w.is_fixed).collect();
        let agg_nsamples = graph.variables.iter().map(|_| AtomicU64::new(0)).collect();
        let ntallies = graph.total_tally_slots as usize;
        let sample_tallies = (0..ntallies).map(|_| AtomicU64::new(0)).collect();

        InferenceResult {
            nvars: graph.variables.len(),
            nweights: graph.weights.len(),
            ntallies,
            assignments_free,
            assignments_evid,
            weight_values,
            weights_isfixed,
            agg_nsamples,
            sample_tallies,
        }
    }

    #[inline]
    pub fn assignment_free(&self, v: VariableId) -> VariableValue {
        self.assignments_free[v.index()].load(RELAXED)
    }

    #[inline]
    pub fn set_assignment_free(&self, v: VariableId, value: VariableValue) {
        self.assignments_free[v.index()].store(value, RELAXED);
    }

    #[inline]
    pub fn assignment_evid(&self, v: VariableId) -> VariableValue {
        self.assignments_evid[v.index()].load(RELAXED)
    }

    #[inline]
    pub fn set_assignment_evid(&self, v: VariableId, value: VariableValue) {
        self.assignments_evid[v.index()].store(value, RELAXED);
    }

    #[inline]
    pub fn weight_value(&self, w: WeightId) -> f64 {
        self.weight_values[w.index()].load()
    }

    #[inline]
    pub fn set_weight_value(&self, w: WeightId, value: f64) {
        self.weight_values[w.index()].store(value);
    }

    #[inline]
    pub fn add_weight_delta(&self, w: WeightId, delta: f64) {
        self.weight_values[w.index()].add(delta);
    }

    #[inline]
    pub fn is_weight_fixed(&self, w: WeightId) -> bool {
        self.weights_isfixed[w.index()]
    }

    #[inline]
    pub fn increment_nsamples(&self, v: VariableId) {
        self.agg_nsamples[v.index()].fetch_add(1, RELAXED);
    }

    #[inline]
    pub fn nsamples(&self, v: VariableId) -> u64 {
        self.agg_nsamples[v.index()].load(RELAXED)
    }

    #[inline]
    pub fn increment_tally(&self, slot: u64) {
        self.sample_tallies[slot as usize].fetch_add(1, RELAXED);
    }

    #[inline]
    pub fn tally(&self, slot: u64) -> u64 {
        self.sample_tallies[slot as usize].load(RELAXED)
    }

    /// Resets all sampling tallies and sample counts; called between the
    /// learning and inference phases.
    pub fn clear_variable_tally(&self) {
        for t in &self.sample_tallies {
            t.store(0, RELAXED);
        }
        for n in &self.agg_nsamples {
            n.store(0, RELAXED);
        }
    }

    /// Sums `other`'s weight values into `self`, the first step of merging
    /// every replica's weights into replica 0.
    pub fn merge_weights_from(&self, other: &InferenceResult) {
        for i in 0..self.nweights {
            let w = WeightId::from(i);
            self.add_weight_delta(w, other.weight_value(w));
        }
    }

    /// Divides every non-fixed weight by `replica_count` and applies the
    /// optional regularization shrink, completing the merge/average step.
    pub fn average_regularize_weights(
        &self,
        replica_count: usize,
        current_stepsize: f64,
        regularization: Option<crate::options::Regularization>,
        reg_param: f64,
    ) {
        for i in 0..self.nweights {
            let w = WeightId::from(i);
            if self.is_weight_fixed(w) {
                continue;
            }
            let averaged = self.weight_value(w) / replica_count as f64;
            let regularized = match regularization {
                Some(crate::options::Regularization::L2) if reg_param > 0.0 => {
                    averaged / (1.0 + reg_param * current_stepsize)
                }
                Some(crate::options::Regularization::L1) if reg_param > 0.0 => {
                    let shrink = reg_param * current_stepsize;
                    if averaged > shrink {
                        averaged - shrink
                    } else if averaged < -shrink {
                        averaged + shrink
                    } else {
                        0.0
                    }
                }
                _ => averaged,
            };
            self.set_weight_value(w, regularized);
        }
    }

    /// Broadcasts `self`'s weight values into `other`, the replica
    /// resynchronization step that follows averaging.
    pub fn copy_weights_to(&self, other: &InferenceResult) {
        for i in 0..self.nweights {
            let w = WeightId::from(i);
            other.set_weight_value(w, self.weight_value(w));
        }
    }

    /// Adds `other`'s per-value tallies and sample counts into `self`,
    /// aggregating every replica's marginal counts into replica 0.
    pub fn aggregate_marginals_from(&self, other: &InferenceResult) {
        for i in 0..self.ntallies {
            let count = other.sample_tallies[i].load(RELAXED);
            self.sample_tallies[i].fetch_add(count, RELAXED);
        }
        for i in 0..self.nvars {
            let n = other.agg_nsamples[i].load(RELAXED);
            self.agg_nsamples[i].fetch_add(n, RELAXED);
        }
    }

    /// Per-weight max-abs-delta and L2 norm of `(self - prev)`, both divided
    /// by `stepsize` — the `lmax`/`l2` convergence diagnostics logged once
    /// per learning epoch.
    pub fn weight_deltas(&self, prev: &[f64], stepsize: f64) -> (f64, f64) {
        let mut lmax = f64::NEG_INFINITY;
        let mut l2 = 0.0;
        for i in 0..self.nweights {
            let diff = (prev[i] - self.weight_value(WeightId::from(i))).abs();
            l2 += diff * diff;
            if diff > lmax {
                lmax = diff;
            }
        }
        (lmax / stepsize, l2.sqrt() / stepsize)
    }

    pub fn snapshot_weights(&self) -> Vec<f64> {
        (0..self.nweights).map(|i| self.weight_value(WeightId::from(i))).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factor::{CompactFactor, FactorKind};
    use crate::ids::{EdgeIndex, FactorId};
    use crate::variable::{DomainType, EvidenceKind, Variable};
    use crate::weight::Weight;

    fn trivial_graph() -> CompactFactorGraph {
        CompactFactorGraph {
            variables: vec![Variable {
                id: VariableId(0),
                domain_type: DomainType::Boolean,
                evidence: EvidenceKind::Query,
                cardinality: 2,
                n_start_i_factors: EdgeIndex(0),
                n_factors: 0,
                n_start_i_tally: 0,
                domain_map: None,
                initial_value: 0,
            }],
            factors: vec![CompactFactor {
                id: FactorId(0),
                kind: FactorKind::And,
                n_variables: 0,
                n_start_i_vif: EdgeIndex(0),
                weight_id: WeightId(0),
            }],
            weights: vec![
                Weight {
                    id: WeightId(0),
                    is_fixed: false,
                    initial_value: 1.0,
                },
                Weight {
                    id: WeightId(1),
                    is_fixed: true,
                    initial_value: 5.0,
                },
            ],
            vifs: vec![],
            factor_ids: vec![],
            compact_factors_weightids: vec![],
            num_edges: 0,
            total_tally_slots: 2,
            categorical_weight_maps: std::collections::HashMap::new(),
        }
    }

    #[test]
    fn merge_weights_identity_is_idempotent() {
        let graph = trivial_graph();
        let a = InferenceResult::new(&graph);
        let identity = InferenceResult::new(&graph);
        identity.set_weight_value(WeightId(0), 0.0);
        identity.set_weight_value(WeightId(1), 0.0);

        let before = a.snapshot_weights();
        a.merge_weights_from(&identity);
        assert_eq!(a.snapshot_weights(), before);
    }

    #[test]
    fn average_regularize_skips_fixed_weights() {
        let graph = trivial_graph();
        let infrs = InferenceResult::new(&graph);
        infrs.set_weight_value(WeightId(0), 10.0);
        infrs.set_weight_value(WeightId(1), 5.0);
        infrs.average_regularize_weights(2, 0.1, None, 0.0);
        assert_eq!(infrs.weight_value(WeightId(0)), 5.0);
        assert_eq!(infrs.weight_value(WeightId(1)), 5.0); // fixed, untouched
    }

    #[test]
    fn replica_merge_averages_then_broadcasts() {
        let graph = trivial_graph();
        let replica_a = InferenceResult::new(&graph);
        let replica_b = InferenceResult::new(&graph);
        replica_a.set_weight_value(WeightId(0), 2.0);
        replica_b.set_weight_value(WeightId(0), 4.0);
        replica_a.set_weight_value(WeightId(1), 5.0);
        replica_b.set_weight_value(WeightId(1), 5.0);

        replica_a.merge_weights_from(&replica_b);
        replica_a.average_regularize_weights(2, 0.1, None, 0.0);
        replica_a.copy_weights_to(&replica_b);

        assert_eq!(replica_a.weight_value(WeightId(0)), 3.0);
        assert_eq!(replica_b.weight_value(WeightId(0)), 3.0);
    }

    #[test]
    fn tally_consistency_matches_nsamples() {
        let graph = trivial_graph();
        let infrs = InferenceResult::new(&graph);
        infrs.increment_nsamples(VariableId(0));
        infrs.increment_tally(1);
        infrs.increment_nsamples(VariableId(0));
        infrs.increment_tally(0);

        let sum: u64 = (0..2).map(|k| infrs.tally(k)).sum();
        assert_eq!(sum, infrs.nsamples(VariableId(0)));
    }

    #[test]
    fn clear_resets_tallies_and_counts() {
        let graph = trivial_graph();
        let infrs = InferenceResult::new(&graph);
        infrs.increment_nsamples(VariableId(0));
        infrs.increment_tally(1);
        infrs.clear_variable_tally();
        assert_eq!(infrs.nsamples(VariableId(0)), 0);
        assert_eq!(infrs.tally(1), 0);
    }
}
