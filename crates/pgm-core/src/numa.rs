//! NUMA affinity hook for replica placement.
//!
//! Binding to real hardware topology is platform-specific (`libnuma` on
//! Linux) and not something a portable library should hard-wire, so this
//! crate exposes only the trait; the default is a no-op, and a caller on
//! Linux can supply a `libnuma`-backed implementation. The orchestrator binds
//! once on the thread that builds a replica's `CompactFactorGraph`/
//! `InferenceResult` (so that deep copy actually lands on the target
//! domain), and again on each of that replica's worker OS threads before
//! they pick up their first job — mirroring a `numa_run_on_node(i);
//! numa_set_localalloc();` call placed immediately before both a replica's
//! sampler state is built and its sampler threads start running.

pub trait NumaAffinity: Send + Sync {
    /// Binds the calling thread to the memory domain that will host
    /// replica `replica_index`.
    fn bind(&self, replica_index: usize);

    /// Requests that subsequent allocations on the calling thread use the
    /// local memory domain's pages.
    fn set_local_alloc(&self);
}

/// Default: no real NUMA topology, both operations are no-ops.
pub struct NoAffinity;

impl NumaAffinity for NoAffinity {
    fn bind(&self, _replica_index: usize) {}
    fn set_local_alloc(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_affinity_is_harmless() {
        let affinity = NoAffinity;
        affinity.bind(0);
        affinity.set_local_alloc();
    }
}
