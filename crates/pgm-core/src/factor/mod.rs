//! Factor types: the static, compile-time shape of a factor, independent of
//! the potential-evaluation logic in [`crate::potential`].

use crate::ids::{EdgeIndex, FactorId, VariableId, VariableValue, WeightId};
use std::collections::HashMap;

/// Factor-function tag. Mirrors the dispatch table of
/// [`crate::potential::potential`] 1:1 — every variant here has exactly one
/// arm there, and the evaluator has no arm without a variant here.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FactorKind {
    And,
    Or,
    Equal,
    ImplyMln,
    ImplyNeg1_1,
    OneIsTrue,
    Linear,
    Ratio,
    Logical,
    /// Dense categorical-product factor: `compact_factors_weightids[edge] + key`
    /// gives the weight id directly.
    Categorical,
    /// Sparse categorical-product factor: the weight id is looked up by
    /// mixed-radix key in `RawFactor::weight_ids`; a missing key means the
    /// factor is inactive at that assignment.
    AndCategorical,
}

/// One edge: a variable's appearance inside a factor.
///
/// `vid` is "satisfied" in this slot iff `is_positive == (value == equal_to)`.
#[derive(Copy, Clone, Debug)]
pub struct VariableInFactor {
    pub vid: VariableId,
    pub n_position: u32,
    pub is_positive: bool,
    pub equal_to: VariableValue,
}

impl VariableInFactor {
    #[inline]
    pub fn is_satisfied(&self, value: VariableValue) -> bool {
        self.is_positive == (value == self.equal_to)
    }
}

/// The compiled, immutable factor record stored in `CompactFactorGraph`.
#[derive(Copy, Clone, Debug)]
pub struct CompactFactor {
    pub id: FactorId,
    pub kind: FactorKind,
    pub n_variables: u32,
    /// Base offset into the factor-view `vifs` edge array.
    pub n_start_i_vif: EdgeIndex,
    /// For non-categorical factors, and for dense `Categorical`, the
    /// factor's base weight id (`compact_factors_weightids[edge]` stores
    /// this same value for every edge of the factor).
    pub weight_id: WeightId,
}

/// Mixed-radix key over a categorical-product factor's variable values, in
/// slot order: `key = sum_i(domain_index(v_i)) * product_{j>i} cardinality(v_j)`.
/// Ordering matters; see `crate::weight_select::mixed_radix_key`.
pub type WeightKey = u64;

/// Staging representation of a factor while the graph is being built.
/// Dropped once `RawFactorGraph::compile` produces the immutable
/// `CompactFactorGraph`; `tmp_variables` has no further use after that.
#[derive(Clone, Debug)]
pub struct RawFactor {
    pub id: FactorId,
    pub kind: FactorKind,
    pub tmp_variables: Vec<VariableInFactor>,
    /// Present only for `AndCategorical`; sparse weight lookup by mixed-radix
    /// key. Absence of a key means the factor is inactive at that
    /// assignment — not an error.
    pub weight_ids: Option<HashMap<WeightKey, WeightId>>,
    /// Present for every other kind (including dense `Categorical`, where
    /// this is the base weight id that `key` is added to).
    pub weight_id: Option<WeightId>,
}

impl RawFactor {
    pub fn n_variables(&self) -> usize {
        self.tmp_variables.len()
    }
}
