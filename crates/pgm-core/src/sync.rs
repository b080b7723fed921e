//! Optional distributed parameter-server hook.
//!
//! The transport itself is out of scope; this crate only defines the round
//! trip shape the orchestrator calls through.

/// One parameter-server exchange: send this epoch's weight deltas, receive
/// replacement weight values and whether the peer wants learning to stop.
pub trait WeightSync: Send {
    fn exchange(&mut self, epoch: usize, delta_weights: &[f64]) -> pgm_error::PgmResult<SyncReply>;
}

pub struct SyncReply {
    pub new_weights: Vec<f64>,
    pub should_stop: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysStop;
    impl WeightSync for AlwaysStop {
        fn exchange(&mut self, _epoch: usize, delta_weights: &[f64]) -> pgm_error::PgmResult<SyncReply> {
            Ok(SyncReply {
                new_weights: delta_weights.to_vec(),
                should_stop: true,
            })
        }
    }

    #[test]
    fn weight_sync_is_object_safe() {
        let mut hook: Box<dyn WeightSync> = Box::new(AlwaysStop);
        let reply = hook.exchange(0, &[1.0, 2.0]).unwrap();
        assert!(reply.should_stop);
    }
}
