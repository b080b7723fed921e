//! The orchestrator's options record.
//!
//! Deliberately a plain struct with a `validate()` step rather than an
//! external config-file format — binary/text I/O stays out of scope here,
//! this is only the in-process construction surface the orchestrator
//! consumes.

use crate::sync::WeightSync;
use pgm_error::{PgmResult, ensure};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Regularization {
    L1,
    L2,
}

pub struct Options {
    /// Number of replicas (NUMA-domain copies). Default 1.
    pub n_datacopy: usize,
    /// Total thread budget; per-replica = `max(1, n_threads / n_datacopy)`.
    pub n_threads: usize,
    pub n_learning_epoch: usize,
    pub n_inference_epoch: usize,
    pub stepsize: f64,
    pub decay: f64,
    pub reg_param: f64,
    pub regularization: Option<Regularization>,
    pub should_sample_evidence: bool,
    pub should_learn_non_evidence: bool,
    pub should_be_quiet: bool,
    /// Optional distributed parameter-server sync hook, consulted once per
    /// learning epoch after the local merge/regularize/broadcast sequence.
    pub parameter_server: Option<Box<dyn WeightSync>>,
    /// Base RNG seed; combined with worker index to derive each worker's
    /// LCG state (`crate::rng::Lcg48::for_worker`).
    pub seed: u64,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            n_datacopy: 1,
            n_threads: 1,
            n_learning_epoch: 0,
            n_inference_epoch: 0,
            stepsize: 0.1,
            decay: 1.0,
            reg_param: 0.0,
            regularization: None,
            should_sample_evidence: false,
            should_learn_non_evidence: false,
            should_be_quiet: false,
            parameter_server: None,
            seed: 0,
        }
    }
}

impl Options {
    pub fn validate(&self) -> PgmResult<()> {
        ensure!(self.n_datacopy >= 1, Schema: "n_datacopy must be >= 1, got {}", self.n_datacopy);
        ensure!(self.n_threads >= 1, Schema: "n_threads must be >= 1, got {}", self.n_threads);
        ensure!(self.stepsize > 0.0, Schema: "stepsize must be > 0, got {}", self.stepsize);
        ensure!(self.decay > 0.0, Schema: "decay must be > 0, got {}", self.decay);
        ensure!(self.reg_param >= 0.0, Schema: "reg_param must be >= 0, got {}", self.reg_param);
        Ok(())
    }

    /// Thread count assigned to each replica.
    pub fn threads_per_replica(&self) -> usize {
        (self.n_threads / self.n_datacopy).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_validate() {
        assert!(Options::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_replicas() {
        let mut opts = Options::default();
        opts.n_datacopy = 0;
        let err = opts.validate().unwrap_err();
        assert_eq!(err.code(), pgm_error::ErrorCode::Schema);
    }

    #[test]
    fn rejects_non_positive_stepsize() {
        let mut opts = Options::default();
        opts.stepsize = 0.0;
        assert!(opts.validate().is_err());
    }

    #[test]
    fn rejects_negative_reg_param() {
        let mut opts = Options::default();
        opts.reg_param = -0.1;
        let err = opts.validate().unwrap_err();
        assert_eq!(err.code(), pgm_error::ErrorCode::Schema);
    }

    #[test]
    fn threads_per_replica_floors_at_one() {
        let mut opts = Options::default();
        opts.n_threads = 3;
        opts.n_datacopy = 8;
        assert_eq!(opts.threads_per_replica(), 1);
    }
}
