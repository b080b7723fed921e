//! A factor-graph Gibbs-sampling inference and contrastive-divergence
//! weight-learning engine: load a graph of boolean/categorical variables
//! and weighted logical/arithmetic factors, learn its weights from
//! evidence, then sample marginals for its query variables.
//!
//! The core pipeline: build a graph with [`raw_graph::RawFactorGraph`],
//! compile it into an immutable [`compact_graph::CompactFactorGraph`],
//! construct one [`inference_result::InferenceResult`] per NUMA replica,
//! then drive [`orchestrator::LearnEngine`] and [`orchestrator::InferEngine`]
//! epoch by epoch.

pub mod compact_graph;
pub mod factor;
pub mod ids;
pub mod inference_result;
pub mod kernel;
pub mod logging;
pub mod numa;
pub mod options;
pub mod orchestrator;
pub mod potential;
pub mod raw_graph;
pub mod rng;
pub mod sync;
pub mod thread_pool;
pub mod variable;
pub mod weight;
pub mod weight_select;
pub mod worker;

/// Commonly-used types re-exported for downstream consumers.
pub mod prelude {
    pub use crate::compact_graph::CompactFactorGraph;
    pub use crate::factor::{CompactFactor, FactorKind, RawFactor, VariableInFactor};
    pub use crate::ids::{FactorId, VariableId, VariableValue, WeightId};
    pub use crate::inference_result::InferenceResult;
    pub use crate::numa::{NoAffinity, NumaAffinity};
    pub use crate::options::{Options, Regularization};
    pub use crate::orchestrator::{Engine, InferEngine, LearnEngine};
    pub use crate::raw_graph::{RawFactorGraph, RawVariable, RawWeight};
    pub use crate::sync::{SyncReply, WeightSync};
    pub use crate::variable::{DomainType, EvidenceKind, Variable};
    pub use crate::weight::Weight;
    pub use pgm_error::{PgmError, PgmResult};
}
