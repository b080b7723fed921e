//! Mutable staging representation used while ingesting a graph.
//!
//! Accepts variables, weights, and factors in any order and resolves
//! categorical weight maps; `compile()` consumes it once to produce an
//! immutable [`CompactFactorGraph`].

use crate::compact_graph::CompactFactorGraph;
use crate::factor::{CompactFactor, FactorKind, RawFactor, VariableInFactor};
use crate::ids::{EdgeIndex, FactorId, VariableId, VariableValue, WeightId};
use crate::variable::{DomainMap, DomainType, EvidenceKind, Variable};
use crate::weight::Weight;
use crate::weight_select::{dense_weight_id, mixed_radix_key};
use pgm_error::{PgmResult, ensure, pgm_err};
use std::collections::HashMap;

/// Staged, not-yet-compiled variable.
pub struct RawVariable {
    pub id: VariableId,
    pub domain_type: DomainType,
    pub evidence: EvidenceKind,
    pub cardinality: u32,
    /// Present only for Categorical variables whose wire values are not
    /// already `0..cardinality`.
    pub domain_values: Option<Vec<VariableValue>>,
    pub initial_value: VariableValue,
}

/// Staged, not-yet-compiled weight.
pub struct RawWeight {
    pub id: WeightId,
    pub is_fixed: bool,
    pub initial_value: f64,
}

#[derive(Default)]
pub struct RawFactorGraph {
    variables: Vec<RawVariable>,
    weights: Vec<RawWeight>,
    factors: Vec<RawFactor>,
}

impl RawFactorGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_variable(&mut self, variable: RawVariable) -> PgmResult<()> {
        ensure!(
            variable.cardinality >= 2,
            Schema: "variable {} has cardinality {} (< 2)",
            variable.id,
            variable.cardinality
        );
        if variable.domain_type == DomainType::Boolean {
            ensure!(
                variable.cardinality == 2,
                Schema: "boolean variable {} has cardinality {} (!= 2)",
                variable.id,
                variable.cardinality
            );
        }
        self.variables.push(variable);
        Ok(())
    }

    pub fn add_weight(&mut self, weight: RawWeight) {
        self.weights.push(weight);
    }

    pub fn add_factor(&mut self, factor: RawFactor) -> PgmResult<()> {
        ensure!(
            !factor.tmp_variables.is_empty(),
            Schema: "factor {} has no incident variables",
            factor.id
        );
        match factor.kind {
            FactorKind::AndCategorical => ensure!(
                factor.weight_ids.is_some(),
                Invariant: "AndCategorical factor {} missing sparse weight map",
                factor.id
            ),
            _ => ensure!(
                factor.weight_id.is_some(),
                Invariant: "factor {} missing static weight id",
                factor.id
            ),
        }
        self.factors.push(factor);
        Ok(())
    }

    /// Consumes the builder, producing an immutable, edge-indexed
    /// [`CompactFactorGraph`]. One-shot: `RawFactorGraph` has no further
    /// use after this call.
    pub fn compile(mut self) -> PgmResult<CompactFactorGraph> {
        self.variables.sort_by_key(|v| v.id.0);
        self.weights.sort_by_key(|w| w.id.0);
        self.factors.sort_by_key(|f| f.id.0);

        for (i, v) in self.variables.iter().enumerate() {
            ensure!(
                v.id.index() == i,
                Invariant: "variables are not a contiguous id-ordered sequence at index {}",
                i
            );
        }
        for (i, w) in self.weights.iter().enumerate() {
            ensure!(
                w.id.index() == i,
                Invariant: "weights are not a contiguous id-ordered sequence at index {}",
                i
            );
        }
        for (i, f) in self.factors.iter().enumerate() {
            ensure!(
                f.id.index() == i,
                Invariant: "factors are not a contiguous id-ordered sequence at index {}",
                i
            );
        }

        let domain_maps: Vec<Option<DomainMap>> = self
            .variables
            .iter()
            .map(|v| v.domain_values.as_ref().map(|values| DomainMap::new(values)))
            .collect();

        // --- factor-view edges (vifs), grouped by factor, n_position order ---
        let mut vifs = Vec::with_capacity(self.factors.iter().map(|f| f.n_variables()).sum());
        let mut compiled_factors = Vec::with_capacity(self.factors.len());

        // --- variable-view incidence, built up per-variable then flattened ---
        let mut incidence: Vec<Vec<(FactorId, WeightId)>> =
            (0..self.variables.len()).map(|_| Vec::new()).collect();

        let mut categorical_weight_maps = HashMap::new();

        for factor in &self.factors {
            let mut slots = factor.tmp_variables.clone();
            slots.sort_by_key(|s| s.n_position);
            for slot in &slots {
                ensure!(
                    slot.vid.index() < self.variables.len(),
                    Invariant: "factor {} references unknown variable {}",
                    factor.id,
                    slot.vid
                );
            }

            let base_weight_id = match factor.kind {
                FactorKind::AndCategorical => {
                    let map = factor.weight_ids.clone().unwrap();
                    categorical_weight_maps.insert(factor.id, map);
                    WeightId::INVALID
                }
                _ => factor.weight_id.unwrap(),
            };

            let n_start_i_vif = EdgeIndex::from(vifs.len());
            for slot in &slots {
                vifs.push(*slot);
                incidence[slot.vid.index()].push((factor.id, base_weight_id));
            }

            compiled_factors.push(CompactFactor {
                id: factor.id,
                kind: factor.kind,
                n_variables: slots.len() as u32,
                n_start_i_vif,
                weight_id: base_weight_id,
            });
        }

        // --- flatten variable-view incidence into the edge arrays ---
        let mut factor_ids = Vec::with_capacity(vifs.len());
        let mut compact_factors = Vec::with_capacity(vifs.len());
        let mut compact_factors_weightids = Vec::with_capacity(vifs.len());
        let mut compiled_variables = Vec::with_capacity(self.variables.len());
        let mut tally_cursor: u64 = 0;

        for (i, raw_var) in self.variables.iter().enumerate() {
            let n_start_i_factors = EdgeIndex::from(factor_ids.len());
            for &(fid, wid) in &incidence[i] {
                factor_ids.push(fid);
                compact_factors.push(compiled_factors[fid.index()]);
                compact_factors_weightids.push(wid);
            }
            let n_factors = incidence[i].len() as u64;

            // Every variable gets a tally slot range, not just Categorical:
            // a Boolean's running "sum of x" is exactly its tallies[1]
            // count under this unified array, so one mechanism serves both
            // instead of two separate tally arrays (see DESIGN.md).
            let n_start_i_tally = tally_cursor;
            tally_cursor += raw_var.cardinality as u64;

            compiled_variables.push(Variable {
                id: raw_var.id,
                domain_type: raw_var.domain_type,
                evidence: raw_var.evidence,
                cardinality: raw_var.cardinality,
                n_start_i_factors,
                n_factors,
                n_start_i_tally,
                domain_map: domain_maps[i].clone(),
                initial_value: raw_var.initial_value,
            });
        }

        let weights: Vec<Weight> = self
            .weights
            .iter()
            .map(|w| Weight {
                id: w.id,
                is_fixed: w.is_fixed,
                initial_value: w.initial_value,
            })
            .collect();

        let num_edges = vifs.len() as u64;

        let graph = CompactFactorGraph {
            variables: compiled_variables,
            factors: compiled_factors,
            weights,
            vifs,
            factor_ids,
            compact_factors,
            compact_factors_weightids,
            num_edges,
            total_tally_slots: tally_cursor,
            categorical_weight_maps,
        };

        graph.check_invariants()?;
        Ok(graph)
    }
}

/// Convenience for computing a dense `Categorical` factor's weight id at a
/// candidate assignment, given the factor's base weight id and the
/// candidate dense indices/cardinalities in slot order. Exposed from the
/// builder module since it's purely a function of compiled data, used by
/// both the kernel and tests.
pub fn dense_categorical_weight(base: WeightId, dense_indices: &[u32], cardinalities: &[u32]) -> WeightId {
    dense_weight_id(base, mixed_radix_key(dense_indices, cardinalities))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bool_var(id: u64, evidence: EvidenceKind, initial: VariableValue) -> RawVariable {
        RawVariable {
            id: VariableId(id),
            domain_type: DomainType::Boolean,
            evidence,
            cardinality: 2,
            domain_values: None,
            initial_value: initial,
        }
    }

    #[test]
    fn compile_rejects_non_contiguous_ids() {
        let mut g = RawFactorGraph::new();
        g.add_variable(bool_var(0, EvidenceKind::Query, 0)).unwrap();
        g.add_variable(bool_var(2, EvidenceKind::Query, 0)).unwrap();
        let err = g.compile().unwrap_err();
        assert_eq!(err.code(), pgm_error::ErrorCode::Invariant);
    }

    #[test]
    fn compile_builds_edge_arrays_with_matching_totals() {
        let mut g = RawFactorGraph::new();
        g.add_variable(bool_var(0, EvidenceKind::Query, 0)).unwrap();
        g.add_variable(bool_var(1, EvidenceKind::Query, 0)).unwrap();
        g.add_weight(RawWeight {
            id: WeightId(0),
            is_fixed: false,
            initial_value: 0.0,
        });
        g.add_factor(RawFactor {
            id: FactorId(0),
            kind: FactorKind::And,
            tmp_variables: vec![
                VariableInFactor {
                    vid: VariableId(0),
                    n_position: 0,
                    is_positive: true,
                    equal_to: 1,
                },
                VariableInFactor {
                    vid: VariableId(1),
                    n_position: 1,
                    is_positive: true,
                    equal_to: 1,
                },
            ],
            weight_ids: None,
            weight_id: Some(WeightId(0)),
        })
        .unwrap();

        let compiled = g.compile().unwrap();
        assert_eq!(compiled.num_edges, 2);
        assert_eq!(compiled.variable(VariableId(0)).n_factors, 1);
        assert_eq!(compiled.variable(VariableId(1)).n_factors, 1);
        compiled.check_invariants().unwrap();
    }

    #[test]
    fn factor_with_no_variables_is_rejected() {
        let mut g = RawFactorGraph::new();
        let err = g
            .add_factor(RawFactor {
                id: FactorId(0),
                kind: FactorKind::And,
                tmp_variables: vec![],
                weight_ids: None,
                weight_id: Some(WeightId(0)),
            })
            .unwrap_err();
        assert_eq!(err.code(), pgm_error::ErrorCode::Schema);
    }
}
