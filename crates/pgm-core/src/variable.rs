//! Static, compile-time variable attributes.
//!
//! The mutable per-replica state a variable carries at runtime — its
//! evidence-view and free-view assignments — lives in
//! [`crate::inference_result::InferenceResult`], not here; see that
//! module's doc comment for why the split follows this shape.

use crate::ids::{EdgeIndex, VariableId, VariableValue};
use std::collections::HashMap;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DomainType {
    Boolean,
    Categorical,
}

/// How an evidence variable is treated during sampling.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EvidenceKind {
    /// Not evidence; a query variable.
    Query,
    /// Evidence, but resamplable if `should_sample_evidence` is enabled.
    Evidence,
    /// Evidence that must never be resampled regardless of options.
    Observation,
}

impl EvidenceKind {
    pub fn is_evidence(self) -> bool {
        !matches!(self, EvidenceKind::Query)
    }
}

/// A sparse mapping from on-the-wire domain values to dense `[0, cardinality)`
/// indices, used by categorical variables whose domain values aren't already
/// `0..cardinality`.
#[derive(Clone, Debug, Default)]
pub struct DomainMap {
    to_dense: HashMap<VariableValue, u32>,
    to_value: Vec<VariableValue>,
}

impl DomainMap {
    pub fn new(values: &[VariableValue]) -> Self {
        let mut sorted = values.to_vec();
        sorted.sort_unstable();
        let to_dense = sorted
            .iter()
            .enumerate()
            .map(|(i, &v)| (v, i as u32))
            .collect();
        DomainMap {
            to_dense,
            to_value: sorted,
        }
    }

    pub fn dense_index(&self, value: VariableValue) -> Option<u32> {
        self.to_dense.get(&value).copied()
    }

    pub fn value_of(&self, dense: u32) -> Option<VariableValue> {
        self.to_value.get(dense as usize).copied()
    }

    pub fn cardinality(&self) -> usize {
        self.to_value.len()
    }

    /// True iff `to_dense` values form a permutation of `[0, cardinality)`.
    pub fn is_bijective(&self) -> bool {
        let mut seen = vec![false; self.to_value.len()];
        for &dense in self.to_dense.values() {
            match seen.get_mut(dense as usize) {
                Some(slot) if !*slot => *slot = true,
                _ => return false,
            }
        }
        seen.into_iter().all(|s| s)
    }
}

/// A compiled variable's static attributes; immutable once the graph is built.
#[derive(Clone, Debug)]
pub struct Variable {
    pub id: VariableId,
    pub domain_type: DomainType,
    pub evidence: EvidenceKind,
    pub cardinality: u32,
    /// Base offset into the variable-view edge arrays.
    pub n_start_i_factors: EdgeIndex,
    pub n_factors: u64,
    /// Base offset into the per-value tally array (Categorical only).
    pub n_start_i_tally: u64,
    pub domain_map: Option<DomainMap>,
    /// Initial value loaded from the source data, used to seed both
    /// assignment views before the first epoch.
    pub initial_value: VariableValue,
}

impl Variable {
    #[inline]
    pub fn is_evidence(&self) -> bool {
        self.evidence.is_evidence()
    }

    #[inline]
    pub fn is_observation(&self) -> bool {
        matches!(self.evidence, EvidenceKind::Observation)
    }

    /// Dense index of `value` within this variable's domain.
    #[inline]
    pub fn dense_index(&self, value: VariableValue) -> u32 {
        match &self.domain_map {
            Some(map) => map.dense_index(value).unwrap_or(0),
            None => value as u32,
        }
    }

    /// The application-visible value at dense index `i`.
    #[inline]
    pub fn value_at(&self, dense: u32) -> VariableValue {
        match &self.domain_map {
            Some(map) => map.value_of(dense).unwrap_or(dense as VariableValue),
            None => dense as VariableValue,
        }
    }
}
