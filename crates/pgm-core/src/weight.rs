//! Static weight metadata. The live, mutable weight *value* array lives in
//! [`crate::inference_result::InferenceResult`] — only `is_fixed` is a
//! compile-time constant, carried here so the learning step can skip a
//! fixed weight without touching the mutable replica state.

use crate::ids::WeightId;

#[derive(Copy, Clone, Debug)]
pub struct Weight {
    pub id: WeightId,
    pub is_fixed: bool,
    pub initial_value: f64,
}
