//! Weight selection for categorical-product factors.

use crate::factor::WeightKey;
use crate::ids::WeightId;
use std::collections::HashMap;

/// Computes the mixed-radix key over a factor's variables in slot order:
/// `key = sum_i(dense_index_i) * product_{j>i}(cardinality_j)`.
///
/// `dense_indices` and `cardinalities` must be parallel slices in slot
/// (`n_position`) order.
pub fn mixed_radix_key(dense_indices: &[u32], cardinalities: &[u32]) -> WeightKey {
    debug_assert_eq!(dense_indices.len(), cardinalities.len());
    let mut key: u64 = 0;
    for (&index, &card) in dense_indices.iter().zip(cardinalities) {
        key = key * card as u64 + index as u64;
    }
    key
}

/// Resolves the weight id for a sparse `AndCategorical` factor. A missing
/// key means the factor is inactive at this assignment: `None`, not an
/// error.
pub fn sparse_weight_id(weight_ids: &HashMap<WeightKey, WeightId>, key: WeightKey) -> Option<WeightId> {
    weight_ids.get(&key).copied()
}

/// Resolves the weight id for a dense `Categorical` factor:
/// `compact_factors_weightids[edge] + key`.
pub fn dense_weight_id(base: WeightId, key: WeightKey) -> WeightId {
    WeightId(base.0 + key)
}
