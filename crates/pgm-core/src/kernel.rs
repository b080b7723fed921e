//! The single-variable Gibbs sampling kernel, and the learning/inference
//! steps built on top of it.

use crate::compact_graph::CompactFactorGraph;
use crate::factor::{CompactFactor, FactorKind};
use crate::ids::{VariableId, VariableValue, WeightId};
use crate::inference_result::InferenceResult;
use crate::potential::potential;
use crate::rng::Lcg48;
use crate::variable::Variable;
use crate::weight_select::mixed_radix_key;
use pgm_error::{PgmError, PgmResult};

/// Which of the two per-replica assignment arrays a sampling draw reads
/// from and writes back into.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum View {
    /// The contrastive sample, always drawn regardless of evidence.
    Free,
    /// The evidence-conditioned sample; pinned when the variable is
    /// evidence and sampling-evidence is disabled.
    Evidence,
}

impl View {
    #[inline]
    fn read(self, infrs: &InferenceResult, v: VariableId) -> VariableValue {
        match self {
            View::Free => infrs.assignment_free(v),
            View::Evidence => infrs.assignment_evid(v),
        }
    }

    #[inline]
    fn write(self, infrs: &InferenceResult, v: VariableId, value: VariableValue) {
        match self {
            View::Free => infrs.set_assignment_free(v, value),
            View::Evidence => infrs.set_assignment_evid(v, value),
        }
    }
}

/// The weight id (and whether the factor is active) contributing to a
/// candidate assignment.
fn resolve_weight(
    graph: &CompactFactorGraph,
    infrs: &InferenceResult,
    view: View,
    factor: &CompactFactor,
    vid: VariableId,
    candidate: VariableValue,
) -> Option<WeightId> {
    match factor.kind {
        FactorKind::Categorical | FactorKind::AndCategorical => {
            let slots = graph.factor_slots(factor);
            let mut dense_indices = Vec::with_capacity(slots.len());
            let mut cardinalities = Vec::with_capacity(slots.len());
            for slot in slots {
                let var = graph.variable(slot.vid);
                let value = if slot.vid == vid {
                    candidate
                } else {
                    view.read(infrs, slot.vid)
                };
                dense_indices.push(var.dense_index(value));
                cardinalities.push(var.cardinality);
            }
            let key = mixed_radix_key(&dense_indices, &cardinalities);
            if factor.kind == FactorKind::AndCategorical {
                graph.sparse_weight_id(factor.id, key)
            } else {
                Some(crate::raw_graph::dense_categorical_weight(factor.weight_id, &dense_indices, &cardinalities))
            }
        }
        _ => Some(factor.weight_id),
    }
}

/// `score(x) = sum over incident factors f of w_f(x) * potential(f, ..., v, x)`.
///
/// Walks `compact_factors` directly rather than resolving factor ids
/// through `graph.factor`, since the variable-view edge array already
/// carries each incident factor's full record.
fn score(
    graph: &CompactFactorGraph,
    infrs: &InferenceResult,
    view: View,
    variable: &Variable,
    candidate: VariableValue,
) -> f64 {
    let mut total = 0.0;
    for factor in graph.incident_compact_factors(variable) {
        let Some(weight_id) = resolve_weight(graph, infrs, view, factor, variable.id, candidate) else {
            continue; // sparse miss: inactive, contributes zero
        };
        let slots = graph.factor_slots(factor);
        let pot = potential(
            factor.kind,
            slots,
            |other| view.read(infrs, other),
            variable.id,
            candidate,
        );
        total += infrs.weight_value(weight_id) * pot;
    }
    total
}

/// Numerically-stable softmax over `scores`, needed whenever the score
/// range would otherwise risk `exp` overflow, but applied unconditionally
/// since it is exact and cheap for small domains.
fn softmax(scores: &[f64]) -> PgmResult<Vec<f64>> {
    let max = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max.is_nan() {
        return Err(PgmError::Runtime {
            message: "NaN score encountered during sampling".into(),
        });
    }
    let exps: Vec<f64> = scores.iter().map(|&s| (s - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    Ok(exps.iter().map(|&e| e / sum).collect())
}

/// Draws a sample for `variable` from its conditional distribution under
/// `view`, writes the result back into `infrs`, and returns the sampled
/// value. An evidence variable sampled through `View::Evidence` with
/// `should_sample_evidence` disabled is never actually drawn, so its
/// pinned value stays put.
pub fn sample(
    graph: &CompactFactorGraph,
    infrs: &InferenceResult,
    rng: &mut Lcg48,
    variable: &Variable,
    view: View,
    should_sample_evidence: bool,
) -> PgmResult<VariableValue> {
    if view == View::Evidence && variable.is_evidence() && (variable.is_observation() || !should_sample_evidence) {
        return Ok(infrs.assignment_evid(variable.id));
    }

    let cardinality = variable.cardinality;
    let mut scores = Vec::with_capacity(cardinality as usize);
    for dense in 0..cardinality {
        let candidate = variable.value_at(dense);
        scores.push(score(graph, infrs, view, variable, candidate));
    }

    let probs = softmax(&scores)?;
    let chosen_dense = rng.sample_categorical(&probs) as u32;
    let chosen_value = variable.value_at(chosen_dense);
    view.write(infrs, variable.id, chosen_value);
    Ok(chosen_value)
}

/// Categorical weight ids active at `view`'s current assignment for
/// `variable`'s incident factor `factor_id`, used by the learning step's
/// per-factor weight update.
fn active_weight(
    graph: &CompactFactorGraph,
    infrs: &InferenceResult,
    view: View,
    factor: &CompactFactor,
    variable: &Variable,
) -> Option<WeightId> {
    let value = view.read(infrs, variable.id);
    resolve_weight(graph, infrs, view, factor, variable.id, value)
}

/// Learning step for one variable: draws both contrastive samples and
/// applies the SGD update to every non-fixed incident weight.
pub fn learn_variable(
    graph: &CompactFactorGraph,
    infrs: &InferenceResult,
    rng: &mut Lcg48,
    variable: &Variable,
    stepsize: f64,
    should_sample_evidence: bool,
    should_learn_non_evidence: bool,
) -> PgmResult<()> {
    let _x_free = sample(graph, infrs, rng, variable, View::Free, true)?;

    if variable.is_evidence() && !should_learn_non_evidence {
        // Still advance the evidence view so state stays consistent, but
        // skip the weight update.
        let _x_evid = sample(graph, infrs, rng, variable, View::Evidence, should_sample_evidence)?;
        return Ok(());
    }

    let _x_evid = sample(graph, infrs, rng, variable, View::Evidence, should_sample_evidence)?;

    for factor in graph.incident_compact_factors(variable) {
        match factor.kind {
            FactorKind::Categorical | FactorKind::AndCategorical => {
                let w1 = active_weight(graph, infrs, View::Evidence, factor, variable);
                let w2 = active_weight(graph, infrs, View::Free, factor, variable);
                let eq = w1.is_some() && w1 == w2;

                let slots = graph.factor_slots(factor);
                let pot_evid = potential(
                    factor.kind,
                    slots,
                    |other| View::Evidence.read(infrs, other),
                    variable.id,
                    View::Evidence.read(infrs, variable.id),
                );
                let pot_free = potential(
                    factor.kind,
                    slots,
                    |other| View::Free.read(infrs, other),
                    variable.id,
                    View::Free.read(infrs, variable.id),
                );

                if let Some(w1) = w1 {
                    if !infrs.is_weight_fixed(w1) {
                        let eq_term = if eq { pot_free } else { 0.0 };
                        infrs.add_weight_delta(w1, stepsize * (pot_evid - eq_term));
                    }
                }
                if let Some(w2) = w2 {
                    if !infrs.is_weight_fixed(w2) {
                        let eq_term = if eq { pot_evid } else { 0.0 };
                        infrs.add_weight_delta(w2, stepsize * (eq_term - pot_free));
                    }
                }
            }
            _ => {
                let weight_id = factor.weight_id;
                if infrs.is_weight_fixed(weight_id) {
                    continue;
                }
                let slots = graph.factor_slots(factor);
                let pot_evid = potential(
                    factor.kind,
                    slots,
                    |other| View::Evidence.read(infrs, other),
                    variable.id,
                    View::Evidence.read(infrs, variable.id),
                );
                let pot_free = potential(
                    factor.kind,
                    slots,
                    |other| View::Free.read(infrs, other),
                    variable.id,
                    View::Free.read(infrs, variable.id),
                );
                infrs.add_weight_delta(weight_id, stepsize * (pot_evid - pot_free));
            }
        }
    }

    Ok(())
}

/// Inference step for one variable: draws the evidence-view sample and
/// updates its tally.
pub fn infer_variable(
    graph: &CompactFactorGraph,
    infrs: &InferenceResult,
    rng: &mut Lcg48,
    variable: &Variable,
    should_sample_evidence: bool,
) -> PgmResult<()> {
    let value = sample(graph, infrs, rng, variable, View::Evidence, should_sample_evidence)?;
    infrs.increment_nsamples(variable.id);
    let dense = variable.dense_index(value);
    infrs.increment_tally(variable.n_start_i_tally + dense as u64);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factor::{RawFactor, VariableInFactor};
    use crate::ids::{FactorId, WeightId};
    use crate::raw_graph::{RawFactorGraph, RawVariable, RawWeight};
    use crate::variable::{DomainType, EvidenceKind};

    /// 18-boolean-variable biased-coin graph: ids 0..7 evidence=true, id 8
    /// evidence=false, 9..17 query, one shared-weight `And` factor per
    /// variable. Exercises the kernel's wiring; the full statistical claim
    /// (learned weight ~= logit(8/9)) is asserted by the integration test
    /// in `tests/seed_scenarios.rs`.
    fn biased_coin_graph() -> CompactFactorGraph {
        let mut g = RawFactorGraph::new();
        g.add_weight(RawWeight {
            id: WeightId(0),
            is_fixed: false,
            initial_value: 0.0,
        });
        for i in 0..18u64 {
            let (evidence, initial) = if i < 8 {
                (EvidenceKind::Evidence, 1)
            } else if i == 8 {
                (EvidenceKind::Evidence, 0)
            } else {
                (EvidenceKind::Query, 0)
            };
            g.add_variable(RawVariable {
                id: VariableId(i),
                domain_type: DomainType::Boolean,
                evidence,
                cardinality: 2,
                domain_values: None,
                initial_value: initial,
            })
            .unwrap();
        }
        for i in 0..18u64 {
            g.add_factor(RawFactor {
                id: FactorId(i),
                kind: FactorKind::And,
                tmp_variables: vec![VariableInFactor {
                    vid: VariableId(i),
                    n_position: 0,
                    is_positive: true,
                    equal_to: 1,
                }],
                weight_ids: None,
                weight_id: Some(WeightId(0)),
            })
            .unwrap();
        }
        g.compile().unwrap()
    }

    #[test]
    fn sampling_stays_within_domain() {
        let graph = biased_coin_graph();
        let infrs = InferenceResult::new(&graph);
        let mut rng = Lcg48::for_worker(1, 0);
        for v in &graph.variables {
            let value = sample(&graph, &infrs, &mut rng, v, View::Free, true).unwrap();
            assert!(value == 0 || value == 1);
        }
    }

    #[test]
    fn evidence_pinned_view_never_moves_when_sampling_evidence_disabled() {
        let graph = biased_coin_graph();
        let infrs = InferenceResult::new(&graph);
        let mut rng = Lcg48::for_worker(1, 0);
        let v0 = &graph.variables[0];
        let before = infrs.assignment_evid(v0.id);
        for _ in 0..50 {
            sample(&graph, &infrs, &mut rng, v0, View::Evidence, false).unwrap();
        }
        assert_eq!(infrs.assignment_evid(v0.id), before);
    }

    #[test]
    fn observation_variable_never_resampled_even_with_sampling_evidence_enabled() {
        let mut g = RawFactorGraph::new();
        g.add_weight(RawWeight {
            id: WeightId(0),
            is_fixed: false,
            initial_value: 0.0,
        });
        g.add_variable(RawVariable {
            id: VariableId(0),
            domain_type: DomainType::Boolean,
            evidence: EvidenceKind::Observation,
            cardinality: 2,
            domain_values: None,
            initial_value: 1,
        })
        .unwrap();
        g.add_factor(RawFactor {
            id: FactorId(0),
            kind: FactorKind::And,
            tmp_variables: vec![VariableInFactor {
                vid: VariableId(0),
                n_position: 0,
                is_positive: true,
                equal_to: 1,
            }],
            weight_ids: None,
            weight_id: Some(WeightId(0)),
        })
        .unwrap();
        let graph = g.compile().unwrap();
        let infrs = InferenceResult::new(&graph);
        let mut rng = Lcg48::for_worker(2, 0);
        let v0 = &graph.variables[0];
        let before = infrs.assignment_evid(v0.id);
        for _ in 0..50 {
            sample(&graph, &infrs, &mut rng, v0, View::Evidence, true).unwrap();
        }
        assert_eq!(infrs.assignment_evid(v0.id), before);
    }

    #[test]
    fn learning_moves_shared_weight_toward_the_evidence_bias() {
        let graph = biased_coin_graph();
        let infrs = InferenceResult::new(&graph);
        let mut rng = Lcg48::for_worker(7, 0);

        for _epoch in 0..200 {
            for v in &graph.variables {
                learn_variable(&graph, &infrs, &mut rng, v, 0.1, false, true).unwrap();
            }
        }

        // 8/9 of the evidence-driving variables are pinned true, so the
        // learned weight should be solidly positive (an exact bound isn't
        // asserted here; the statistical claim belongs to the seed test).
        assert!(infrs.weight_value(WeightId(0)) > 0.5);
    }

    #[test]
    fn inference_tally_matches_sample_count() {
        let graph = biased_coin_graph();
        let infrs = InferenceResult::new(&graph);
        let mut rng = Lcg48::for_worker(3, 0);
        let v = &graph.variables[9];

        for _ in 0..100 {
            infer_variable(&graph, &infrs, &mut rng, v, false).unwrap();
        }

        let total: u64 = (0..2).map(|k| infrs.tally(v.n_start_i_tally + k)).sum();
        assert_eq!(total, infrs.nsamples(v.id));
        assert_eq!(infrs.nsamples(v.id), 100);
    }
}
