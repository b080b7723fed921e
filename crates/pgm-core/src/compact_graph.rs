//! The immutable, edge-indexed factor graph produced once by
//! [`crate::raw_graph::RawFactorGraph::compile`].
//!
//! Flat arrays keyed by a single `edge_index` give stride-1 traversal during
//! sampling from both the factor's view (`vifs`) and the variable's view
//! (`factor_ids`/`compact_factors`/`compact_factors_weightids`) — the same
//! edge appears once in each view.

use crate::factor::{CompactFactor, VariableInFactor, WeightKey};
use crate::ids::{FactorId, VariableId, WeightId};
use crate::variable::Variable;
use crate::weight::Weight;
use std::collections::HashMap;

/// Immutable, compiled factor graph. Read concurrently by every sampler
/// thread within a replica; never mutated after `compile` returns it.
///
/// `Clone` gives the orchestrator a NUMA-local copy of every array for each
/// replica (spec §5: "Each replica's CompactFactorGraph ... MUST be
/// allocated on the memory domain that runs its workers") — `compile()`
/// runs once, and each replica then gets its own deep copy built on its
/// bound thread, rather than every replica sharing one `Arc` to a single
/// allocation.
#[derive(Clone)]
pub struct CompactFactorGraph {
    pub variables: Vec<Variable>,
    pub factors: Vec<CompactFactor>,
    pub weights: Vec<Weight>,

    /// Factor-view edge array: `vifs[n_start_i_vif .. n_start_i_vif + n_variables]`
    /// for a factor is that factor's slots in `n_position` order.
    pub vifs: Vec<VariableInFactor>,

    /// Variable-view edge arrays, grouped by variable:
    /// `factor_ids[v.n_start_i_factors .. v.n_start_i_factors + v.n_factors]`
    /// lists every factor incident to `v`, `compact_factors` is a direct
    /// copy of that same factor's record at that edge (so sampling never
    /// has to bounce through `factors` by id), and `compact_factors_weightids`
    /// is the weight id of that factor at that variable-view slot (for
    /// dense `Categorical` this is the *base* id the per-candidate key is
    /// added to; see `crate::weight_select`).
    pub factor_ids: Vec<FactorId>,
    pub compact_factors: Vec<CompactFactor>,
    pub compact_factors_weightids: Vec<crate::ids::WeightId>,

    pub num_edges: u64,

    /// Total width of the per-value sample-tally array every
    /// `InferenceResult` must allocate: `sum over variables of cardinality`.
    pub total_tally_slots: u64,

    /// Sparse weight lookup for `AndCategorical` factors, keyed by factor
    /// id. Weight selection happens during sampling against this compiled
    /// graph, after `RawFactorGraph` (where the map is first built) has
    /// been dropped, so `compile` carries it forward here. See DESIGN.md.
    pub categorical_weight_maps: HashMap<FactorId, HashMap<WeightKey, WeightId>>,
}

impl CompactFactorGraph {
    pub fn variable(&self, id: VariableId) -> &Variable {
        &self.variables[id.index()]
    }

    pub fn factor(&self, id: FactorId) -> &CompactFactor {
        &self.factors[id.index()]
    }

    /// The slots (in `n_position` order) belonging to `factor`.
    pub fn factor_slots(&self, factor: &CompactFactor) -> &[VariableInFactor] {
        let start = factor.n_start_i_vif.index();
        let end = start + factor.n_variables as usize;
        &self.vifs[start..end]
    }

    /// The factors incident to `variable`, in variable-view edge order.
    pub fn incident_factors(&self, variable: &Variable) -> &[FactorId] {
        let start = variable.n_start_i_factors.index();
        let end = start + variable.n_factors as usize;
        &self.factor_ids[start..end]
    }

    /// The same factors as [`CompactFactorGraph::incident_factors`], as
    /// direct `CompactFactor` copies rather than ids — avoids the
    /// id-to-`factors`-array indirection on the sampling hot path.
    pub fn incident_compact_factors(&self, variable: &Variable) -> &[CompactFactor] {
        let start = variable.n_start_i_factors.index();
        let end = start + variable.n_factors as usize;
        &self.compact_factors[start..end]
    }

    /// The weight-id base for each of `variable`'s incident factors, in the
    /// same order as [`CompactFactorGraph::incident_factors`].
    pub fn incident_weight_bases(&self, variable: &Variable) -> &[crate::ids::WeightId] {
        let start = variable.n_start_i_factors.index();
        let end = start + variable.n_factors as usize;
        &self.compact_factors_weightids[start..end]
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_factors(&self) -> usize {
        self.factors.len()
    }

    pub fn num_weights(&self) -> usize {
        self.weights.len()
    }

    /// Looks up the sparse weight id for an `AndCategorical` factor at
    /// mixed-radix key `key`; `None` means the factor is inactive there.
    pub fn sparse_weight_id(&self, factor: FactorId, key: WeightKey) -> Option<WeightId> {
        self.categorical_weight_maps.get(&factor).and_then(|m| m.get(&key)).copied()
    }

    /// Structural invariants of a well-formed compiled graph, checked
    /// eagerly at compile time and re-checkable at any later point (e.g. in
    /// tests) since the graph never mutates after compilation.
    pub fn check_invariants(&self) -> pgm_error::PgmResult<()> {
        use pgm_error::ensure;

        let edges_by_factor: u64 = self.factors.iter().map(|f| f.n_variables as u64).sum();
        ensure!(
            edges_by_factor == self.num_edges,
            Invariant: "sum of factor arities {} != num_edges {}",
            edges_by_factor,
            self.num_edges
        );

        let edges_by_variable: u64 = self.variables.iter().map(|v| v.n_factors).sum();
        ensure!(
            edges_by_variable == self.num_edges,
            Invariant: "sum of variable incidence counts {} != num_edges {}",
            edges_by_variable,
            self.num_edges
        );

        ensure!(
            self.compact_factors.len() == self.factor_ids.len(),
            Invariant: "compact_factors len {} != factor_ids len {}",
            self.compact_factors.len(),
            self.factor_ids.len()
        );
        for (edge, (fid, cf)) in self.factor_ids.iter().zip(self.compact_factors.iter()).enumerate() {
            ensure!(
                cf.id == *fid,
                Invariant: "compact_factors[{}] id {} != factor_ids[{}] {}",
                edge,
                cf.id,
                edge,
                fid
            );
        }

        for (i, v) in self.variables.iter().enumerate() {
            ensure!(
                v.id.index() == i,
                Invariant: "variable {} stored out of id order (index {})",
                v.id,
                i
            );
            if let Some(map) = &v.domain_map {
                ensure!(
                    map.is_bijective(),
                    Invariant: "domain_map for variable {} is not a bijection onto [0, cardinality)",
                    v.id
                );
            }
        }

        for (i, f) in self.factors.iter().enumerate() {
            ensure!(
                f.id.index() == i,
                Invariant: "factor {} stored out of id order (index {})",
                f.id,
                i
            );
        }

        for (i, w) in self.weights.iter().enumerate() {
            ensure!(
                w.id.index() == i,
                Invariant: "weight {} stored out of id order (index {})",
                w.id,
                i
            );
        }

        Ok(())
    }
}
