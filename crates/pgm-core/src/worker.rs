//! Worker partitioning: each replica's variable set is split into `P`
//! contiguous, disjoint ranges, one per worker thread, so Hogwild! writes
//! never race on assignments (only on weights).

use crate::compact_graph::CompactFactorGraph;
use crate::inference_result::InferenceResult;
use crate::kernel;
use crate::rng::Lcg48;
use pgm_error::PgmResult;

/// The contiguous `[start, end)` range of variable indices worker `index`
/// owns out of `n_variables` total, split `P` ways.
///
/// `chunk = ceil(n_variables / n_workers)`; worker `i` owns
/// `[chunk*i, min(n_variables, chunk*(i+1)))`. The last worker's range may
/// be shorter than `chunk` (and empty if `P` doesn't divide evenly near the
/// tail), never longer.
pub fn partition_range(n_variables: usize, n_workers: usize, index: usize) -> std::ops::Range<usize> {
    debug_assert!(n_workers > 0);
    debug_assert!(index < n_workers);
    let chunk = n_variables.div_ceil(n_workers);
    let start = (chunk * index).min(n_variables);
    let end = (chunk * (index + 1)).min(n_variables);
    start..end
}

/// One replica's worker: owns a disjoint variable range and a private RNG
/// stream, and drives that range's share of a learning or inference epoch.
pub struct Worker {
    pub index: usize,
    pub range: std::ops::Range<usize>,
    rng: Lcg48,
}

impl Worker {
    /// Builds the `n_workers` workers for a replica with `replica_seed` as
    /// the base seed their RNG streams are mixed from — distinct per
    /// replica so replicas don't share a sample stream, distinct per worker
    /// within a replica so workers don't either.
    pub fn build_for_replica(n_workers: usize, replica_seed: u64, n_variables: usize) -> Vec<Worker> {
        (0..n_workers)
            .map(|index| Worker {
                index,
                range: partition_range(n_variables, n_workers, index),
                rng: Lcg48::for_worker(replica_seed, index),
            })
            .collect()
    }

    /// Runs one learning epoch's worth of variables for this worker's range.
    pub fn run_learn_epoch(
        &mut self,
        graph: &CompactFactorGraph,
        infrs: &InferenceResult,
        stepsize: f64,
        should_sample_evidence: bool,
        should_learn_non_evidence: bool,
    ) -> PgmResult<()> {
        for i in self.range.clone() {
            let variable = &graph.variables[i];
            kernel::learn_variable(
                graph,
                infrs,
                &mut self.rng,
                variable,
                stepsize,
                should_sample_evidence,
                should_learn_non_evidence,
            )?;
        }
        Ok(())
    }

    /// Runs one inference epoch's worth of variables for this worker's range.
    pub fn run_infer_epoch(
        &mut self,
        graph: &CompactFactorGraph,
        infrs: &InferenceResult,
        should_sample_evidence: bool,
    ) -> PgmResult<()> {
        for i in self.range.clone() {
            let variable = &graph.variables[i];
            kernel::infer_variable(graph, infrs, &mut self.rng, variable, should_sample_evidence)?;
        }
        Ok(())
    }
}
