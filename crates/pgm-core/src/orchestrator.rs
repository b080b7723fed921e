//! Drives learning and inference across the replica/worker grid. The
//! `Engine` shape is an epoch-stepping trait with a single `next()` the
//! caller drives in a loop, rather than a method that runs to completion
//! on its own.

use std::sync::Arc;

use crate::compact_graph::CompactFactorGraph;
use crate::inference_result::InferenceResult;
use crate::numa::NumaAffinity;
use crate::options::Options;
use crate::thread_pool::ThreadPool;
use crate::worker::Worker;
use pgm_error::PgmResult;

/// The type representing one step of an orchestrator's progress.
pub trait Engine {
    type Epoch;
    fn next(&mut self) -> PgmResult<Self::Epoch>;
}

/// `ceil(n_epoch / n_datacopy)`: each call advances every replica through
/// one round together, so `n_datacopy` replicas' worth of samples are
/// produced per round.
pub fn compute_n_epochs(n_epoch: usize, n_datacopy: usize) -> usize {
    n_epoch.div_ceil(n_datacopy.max(1))
}

/// One NUMA-domain copy of the graph plus everything that runs its workers.
/// `graph` and `infrs` are built on a thread bound to this replica's domain
/// (see `build_replicas`), and `pool`'s own worker OS threads re-bind
/// themselves to that same domain before picking up their first job — so
/// both the data and the threads that touch it live on one domain, not just
/// the transient thread that constructed them.
struct Replica {
    graph: Arc<CompactFactorGraph>,
    infrs: Arc<InferenceResult>,
    workers: Vec<Worker>,
    pool: ThreadPool,
}

fn build_replicas(graph: &Arc<CompactFactorGraph>, options: &Options, affinity: &Arc<dyn NumaAffinity>) -> Vec<Replica> {
    let threads = options.threads_per_replica();
    let num_variables = graph.num_variables();

    (0..options.n_datacopy)
        .map(|replica_index| {
            let source = Arc::clone(graph);
            let build_affinity = Arc::clone(affinity);

            // Build this replica's graph and inference state on a thread
            // bound to its own domain first, so the deep copy and its
            // tallies/assignments are actually allocated there rather than
            // on whatever domain happened to run `build_replicas` itself.
            let (local_graph, infrs) = std::thread::spawn(move || {
                build_affinity.bind(replica_index);
                build_affinity.set_local_alloc();
                let local_graph = Arc::new((*source).clone());
                let infrs = Arc::new(InferenceResult::new(&local_graph));
                (local_graph, infrs)
            })
            .join()
            .expect("replica construction thread panicked");

            let pool_affinity = Arc::clone(affinity);
            let pool = ThreadPool::with_init(threads, move || {
                pool_affinity.bind(replica_index);
                pool_affinity.set_local_alloc();
            });

            let replica_seed = options.seed.wrapping_add(replica_index as u64 * 0x1000_0001);
            let workers = Worker::build_for_replica(threads, replica_seed, num_variables);

            Replica {
                graph: local_graph,
                infrs,
                workers,
                pool,
            }
        })
        .collect()
}

/// Summary of one learning epoch's worth of work, logged via `tracing` and
/// returned to the caller for its own termination logic.
#[derive(Debug, Clone, Copy)]
pub struct LearnEpochSummary {
    pub epoch: usize,
    pub stepsize: f64,
    pub lmax: f64,
    pub l2: f64,
    pub should_stop: bool,
}

/// Drives the weight-learning loop: fans a learning round out across
/// every replica's workers, merges and regularizes weights back
/// into replica 0, broadcasts the averaged weights to the other replicas,
/// optionally consults a parameter server, and decays the stepsize.
pub struct LearnEngine {
    replicas: Vec<Replica>,
    options: Options,
    stepsize: f64,
    epoch: usize,
}

impl LearnEngine {
    pub fn new(graph: Arc<CompactFactorGraph>, options: Options, affinity: Arc<dyn NumaAffinity>) -> PgmResult<Self> {
        options.validate()?;
        let replicas = build_replicas(&graph, &options, &affinity);
        let stepsize = options.stepsize;
        Ok(LearnEngine {
            replicas,
            options,
            stepsize,
            epoch: 0,
        })
    }
}

impl Engine for LearnEngine {
    type Epoch = LearnEpochSummary;

    fn next(&mut self) -> PgmResult<LearnEpochSummary> {
        let should_sample_evidence = self.options.should_sample_evidence;
        let should_learn_non_evidence = self.options.should_learn_non_evidence;
        let stepsize = self.stepsize;

        for replica in &mut self.replicas {
            let graph = Arc::clone(&replica.graph);
            let infrs = Arc::clone(&replica.infrs);
            let pool = &replica.pool;
            let taken_workers = std::mem::take(&mut replica.workers);
            let jobs: Vec<_> = taken_workers
                .into_iter()
                .map(|mut worker| {
                    let graph = Arc::clone(&graph);
                    let infrs = Arc::clone(&infrs);
                    pool.submit_with_result(move || {
                        let result =
                            worker.run_learn_epoch(&graph, &infrs, stepsize, should_sample_evidence, should_learn_non_evidence);
                        (worker, result)
                    })
                })
                .collect();

            let mut rejoined = Vec::with_capacity(jobs.len());
            for job in jobs {
                let (worker, result) = job.result();
                result?;
                rejoined.push(worker);
            }
            replica.workers = rejoined;
        }

        let prev_weights = self.replicas[0].infrs.snapshot_weights();

        for i in 1..self.replicas.len() {
            let (head, rest) = self.replicas.split_at(i);
            head[0].infrs.merge_weights_from(&rest[0].infrs);
        }
        self.replicas[0].infrs.average_regularize_weights(
            self.replicas.len().max(1),
            stepsize,
            self.options.regularization,
            self.options.reg_param,
        );

        let (lmax, l2) = self.replicas[0].infrs.weight_deltas(&prev_weights, stepsize);

        for i in 1..self.replicas.len() {
            self.replicas[0].infrs.copy_weights_to(&self.replicas[i].infrs);
        }

        let mut should_stop = false;
        if let Some(server) = &mut self.options.parameter_server {
            let deltas: Vec<f64> = self
                .replicas[0]
                .infrs
                .snapshot_weights()
                .iter()
                .zip(prev_weights.iter())
                .map(|(now, before)| now - before)
                .collect();
            let reply = server.exchange(self.epoch, &deltas)?;
            for (i, w) in reply.new_weights.iter().enumerate() {
                self.replicas[0].infrs.set_weight_value(crate::ids::WeightId::from(i), *w);
            }
            for replica in &self.replicas[1..] {
                self.replicas[0].infrs.copy_weights_to(&replica.infrs);
            }
            should_stop = reply.should_stop;
        }

        self.epoch += 1;
        self.stepsize *= self.options.decay;

        let summary = LearnEpochSummary {
            epoch: self.epoch,
            stepsize: self.stepsize,
            lmax,
            l2,
            should_stop,
        };

        if !self.options.should_be_quiet {
            tracing::info!(
                epoch = summary.epoch,
                lmax = summary.lmax,
                l2 = summary.l2,
                stepsize = summary.stepsize,
                "learning epoch complete"
            );
        }

        Ok(summary)
    }
}

impl LearnEngine {
    /// Hands back the learned weights, reading from replica 0 (every
    /// replica's weights are kept in sync by `next`'s broadcast step).
    pub fn weights(&self) -> Vec<f64> {
        self.replicas[0].infrs.snapshot_weights()
    }
}

/// Summary of one inference epoch.
#[derive(Debug, Clone, Copy)]
pub struct InferEpochSummary {
    pub epoch: usize,
}

/// Drives the Gibbs-sampling inference loop: fans an inference round out
/// across every replica's workers, then aggregates
/// every replica's tallies into replica 0.
pub struct InferEngine {
    replicas: Vec<Replica>,
    options: Options,
    epoch: usize,
}

impl InferEngine {
    pub fn new(graph: Arc<CompactFactorGraph>, options: Options, affinity: Arc<dyn NumaAffinity>) -> PgmResult<Self> {
        options.validate()?;
        let replicas = build_replicas(&graph, &options, &affinity);
        for replica in &replicas {
            replica.infrs.clear_variable_tally();
        }
        Ok(InferEngine {
            replicas,
            options,
            epoch: 0,
        })
    }
}

impl Engine for InferEngine {
    type Epoch = InferEpochSummary;

    fn next(&mut self) -> PgmResult<InferEpochSummary> {
        let should_sample_evidence = self.options.should_sample_evidence;

        for replica in &mut self.replicas {
            let graph = Arc::clone(&replica.graph);
            let infrs = Arc::clone(&replica.infrs);
            let pool = &replica.pool;
            let taken_workers = std::mem::take(&mut replica.workers);
            let jobs: Vec<_> = taken_workers
                .into_iter()
                .map(|mut worker| {
                    let graph = Arc::clone(&graph);
                    let infrs = Arc::clone(&infrs);
                    pool.submit_with_result(move || {
                        let result = worker.run_infer_epoch(&graph, &infrs, should_sample_evidence);
                        (worker, result)
                    })
                })
                .collect();

            let mut rejoined = Vec::with_capacity(jobs.len());
            for job in jobs {
                let (worker, result) = job.result();
                result?;
                rejoined.push(worker);
            }
            replica.workers = rejoined;
        }

        self.epoch += 1;
        let summary = InferEpochSummary { epoch: self.epoch };
        if !self.options.should_be_quiet {
            tracing::info!(epoch = summary.epoch, "inference epoch complete");
        }
        Ok(summary)
    }
}

impl InferEngine {
    /// Aggregates every replica's tallies and sample counts into replica 0,
    /// called once after the inference loop's last `next()`.
    pub fn finish(self) -> Arc<InferenceResult> {
        let mut replicas = self.replicas.into_iter();
        let head = replicas.next().expect("at least one replica");
        for replica in replicas {
            head.infrs.aggregate_marginals_from(&replica.infrs);
        }
        head.infrs
    }
}
