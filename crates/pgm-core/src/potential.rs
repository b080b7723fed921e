//! Pure factor-potential evaluation: same per-tag arithmetic for every
//! factor kind, same early-return short-circuiting on the first
//! disqualifying slot. Every [`FactorKind`] the builder accepts has exactly
//! one arm here; an unsupported tag is rejected at build time
//! (`SchemaError`), not here, so this dispatch is total.

use crate::factor::{FactorKind, VariableInFactor};
use crate::ids::{VariableId, VariableValue};

/// Returns whether `vif`'s slot is satisfied given the override `(vid, proposal)`
/// and a lookup for every other variable's current value.
#[inline]
fn slot_satisfied(
    vif: &VariableInFactor,
    get_value: &impl Fn(VariableId) -> VariableValue,
    vid: VariableId,
    proposal: VariableValue,
) -> bool {
    if vif.vid == vid {
        vif.is_satisfied(proposal)
    } else {
        vif.is_satisfied(get_value(vif.vid))
    }
}

/// `B`/`H` split shared by `LINEAR`/`RATIO`/`LOGICAL`: `H` is the last slot,
/// `B` is every slot before it. Returns `(body_sum, head_satisfied)` where
/// `body_sum` is `sum over body of (not sat or head_sat)`.
fn linear_body_head(
    slots: &[VariableInFactor],
    get_value: &impl Fn(VariableId) -> VariableValue,
    vid: VariableId,
    proposal: VariableValue,
) -> (f64, bool) {
    let head = slots.last().expect("factor must have at least one slot");
    let head_sat = slot_satisfied(head, get_value, vid, proposal);
    let mut sum = 0.0;
    for slot in &slots[..slots.len() - 1] {
        let sat = slot_satisfied(slot, get_value, vid, proposal);
        if !sat || head_sat {
            sum += 1.0;
        }
    }
    (sum, head_sat)
}

/// Evaluates a factor's potential with variable `vid` fixed to `proposal`
/// and every other incident variable read via `get_value`.
///
/// `slots` must be the factor's `VariableInFactor` block in `n_position`
/// order (i.e. `vifs[n_start_i_vif .. n_start_i_vif + n_variables]`).
pub fn potential(
    kind: FactorKind,
    slots: &[VariableInFactor],
    get_value: impl Fn(VariableId) -> VariableValue,
    vid: VariableId,
    proposal: VariableValue,
) -> f64 {
    match kind {
        FactorKind::And => {
            for slot in slots {
                if !slot_satisfied(slot, &get_value, vid, proposal) {
                    return 0.0;
                }
            }
            1.0
        }
        FactorKind::Or => {
            for slot in slots {
                if slot_satisfied(slot, &get_value, vid, proposal) {
                    return 1.0;
                }
            }
            0.0
        }
        FactorKind::Equal => {
            let first = slot_satisfied(&slots[0], &get_value, vid, proposal);
            for slot in &slots[1..] {
                if slot_satisfied(slot, &get_value, vid, proposal) != first {
                    return 0.0;
                }
            }
            1.0
        }
        FactorKind::ImplyMln => {
            for slot in &slots[..slots.len() - 1] {
                if !slot_satisfied(slot, &get_value, vid, proposal) {
                    return 1.0;
                }
            }
            let head = slots.last().unwrap();
            if slot_satisfied(head, &get_value, vid, proposal) {
                1.0
            } else {
                0.0
            }
        }
        FactorKind::ImplyNeg1_1 => {
            for slot in &slots[..slots.len() - 1] {
                if !slot_satisfied(slot, &get_value, vid, proposal) {
                    return 0.0;
                }
            }
            let head = slots.last().unwrap();
            if slot_satisfied(head, &get_value, vid, proposal) {
                1.0
            } else {
                -1.0
            }
        }
        FactorKind::OneIsTrue => {
            let mut n_satisfied = 0;
            for slot in slots {
                if slot_satisfied(slot, &get_value, vid, proposal) {
                    n_satisfied += 1;
                    if n_satisfied >= 2 {
                        return -1.0;
                    }
                }
            }
            if n_satisfied == 1 { 1.0 } else { -1.0 }
        }
        FactorKind::Linear => {
            if slots.len() == 1 {
                let head_sat = slot_satisfied(&slots[0], &get_value, vid, proposal);
                return if head_sat { 1.0 } else { 0.0 };
            }
            let (sum, _) = linear_body_head(slots, &get_value, vid, proposal);
            sum
        }
        FactorKind::Ratio => {
            // Seeded at 1.0, not 0.0 like LINEAR's sum.
            if slots.len() == 1 {
                let head_sat = slot_satisfied(&slots[0], &get_value, vid, proposal);
                let head = if head_sat { 1.0 } else { 0.0 };
                return (1.0_f64 + head).log2();
            }
            let head = slots.last().unwrap();
            let head_sat = slot_satisfied(head, &get_value, vid, proposal);
            let mut res = 1.0_f64;
            for slot in &slots[..slots.len() - 1] {
                let sat = slot_satisfied(slot, &get_value, vid, proposal);
                if !sat || head_sat {
                    res += 1.0;
                }
            }
            res.log2()
        }
        FactorKind::Logical => {
            if slots.len() == 1 {
                let head_sat = slot_satisfied(&slots[0], &get_value, vid, proposal);
                return if head_sat { 1.0 } else { 0.0 };
            }
            let (sum, _) = linear_body_head(slots, &get_value, vid, proposal);
            if sum > 0.0 { 1.0 } else { 0.0 }
        }
        FactorKind::Categorical | FactorKind::AndCategorical => 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vif(vid: u64, pos: u32, positive: bool, eq: VariableValue) -> VariableInFactor {
        VariableInFactor {
            vid: VariableId(vid),
            n_position: pos,
            is_positive: positive,
            equal_to: eq,
        }
    }

    fn lookup(values: HashMap<VariableId, VariableValue>) -> impl Fn(VariableId) -> VariableValue {
        move |vid| *values.get(&vid).unwrap()
    }

    #[test]
    fn and_short_circuits_on_first_unsatisfied() {
        let slots = vec![vif(0, 0, true, 1), vif(1, 1, true, 1)];
        let values = lookup([(VariableId(1), 0)].into_iter().collect());
        assert_eq!(potential(FactorKind::And, &slots, values, VariableId(0), 1), 0.0);
    }

    #[test]
    fn or_true_if_any_satisfied() {
        let slots = vec![vif(0, 0, true, 1), vif(1, 1, true, 1)];
        let values = lookup([(VariableId(1), 0)].into_iter().collect());
        assert_eq!(potential(FactorKind::Or, &slots, values, VariableId(0), 1), 1.0);
    }

    #[test]
    fn equal_requires_matching_satisfaction_bits() {
        let slots = vec![vif(0, 0, true, 1), vif(1, 1, true, 1), vif(2, 2, true, 1)];
        let values = lookup([(VariableId(1), 1), (VariableId(2), 1)].into_iter().collect());
        assert_eq!(potential(FactorKind::Equal, &slots, values, VariableId(0), 1), 1.0);
        let values = lookup([(VariableId(1), 1), (VariableId(2), 0)].into_iter().collect());
        assert_eq!(potential(FactorKind::Equal, &slots, values, VariableId(0), 1), 0.0);
    }

    #[test]
    fn imply_mln_truth_table() {
        let slots = vec![vif(0, 0, true, 1), vif(1, 1, true, 1)];
        // body false (v0=0) -> 1
        let values = lookup(HashMap::new());
        assert_eq!(
            potential(FactorKind::ImplyMln, &slots, values, VariableId(0), 0),
            1.0
        );
    }

    #[test]
    fn imply_neg1_1_truth_table_all_four_combinations() {
        let slots = vec![vif(0, 0, true, 1), vif(1, 1, true, 1)];
        // body unsatisfied (v0=0) -> 0, regardless of head
        for head in [0, 1] {
            let values = lookup([(VariableId(1), head)].into_iter().collect());
            assert_eq!(
                potential(FactorKind::ImplyNeg1_1, &slots, values, VariableId(0), 0),
                0.0
            );
        }
        // body satisfied (v0=1), head satisfied (v1=1) -> 1
        let values = lookup([(VariableId(1), 1)].into_iter().collect());
        assert_eq!(
            potential(FactorKind::ImplyNeg1_1, &slots, values, VariableId(0), 1),
            1.0
        );
        // body satisfied (v0=1), head unsatisfied (v1=0) -> -1
        let values = lookup([(VariableId(1), 0)].into_iter().collect());
        assert_eq!(
            potential(FactorKind::ImplyNeg1_1, &slots, values, VariableId(0), 1),
            -1.0
        );
    }

    #[test]
    fn one_is_true_exactly_one() {
        let slots = vec![vif(0, 0, true, 1), vif(1, 1, true, 1), vif(2, 2, true, 1)];
        let values = lookup([(VariableId(1), 0), (VariableId(2), 0)].into_iter().collect());
        assert_eq!(
            potential(FactorKind::OneIsTrue, &slots, values, VariableId(0), 1),
            1.0
        );
        let values = lookup([(VariableId(1), 1), (VariableId(2), 0)].into_iter().collect());
        assert_eq!(
            potential(FactorKind::OneIsTrue, &slots, values, VariableId(0), 1),
            -1.0
        );
        let values = lookup([(VariableId(1), 0), (VariableId(2), 0)].into_iter().collect());
        assert_eq!(
            potential(FactorKind::OneIsTrue, &slots, values, VariableId(0), 0),
            -1.0
        );
    }

    #[test]
    fn linear_arity_one_is_head_sat_as_bit() {
        let slots = vec![vif(0, 0, true, 1)];
        let values = lookup(HashMap::new());
        assert_eq!(
            potential(FactorKind::Linear, &slots, values.clone(), VariableId(0), 1),
            1.0
        );
        assert_eq!(potential(FactorKind::Linear, &slots, values, VariableId(0), 0), 0.0);
    }

    #[test]
    fn ratio_arity_one_matches_log2_of_1_plus_head() {
        let slots = vec![vif(0, 0, true, 1)];
        let values = lookup(HashMap::new());
        let r1 = potential(FactorKind::Ratio, &slots, values.clone(), VariableId(0), 1);
        assert!((r1 - 2.0_f64.log2()).abs() < 1e-12);
        let r0 = potential(FactorKind::Ratio, &slots, values, VariableId(0), 0);
        assert!((r0 - 1.0_f64.log2()).abs() < 1e-12);
    }

    #[test]
    fn ratio_arity_two_seeds_at_one() {
        let slots = vec![vif(0, 0, true, 1), vif(1, 1, true, 1)];
        // body satisfied (v0=1) & head satisfied (v1=1): body loop adds 0 terms that are
        // "unsat or head_sat" falsely filtered: sat=true, head_sat=true -> !sat||head_sat = true -> +1
        let values = lookup([(VariableId(1), 1)].into_iter().collect());
        let r = potential(FactorKind::Ratio, &slots, values, VariableId(0), 1);
        assert!((r - 2.0_f64.log2()).abs() < 1e-12);
    }

    #[test]
    fn logical_arity_one_is_head_sat() {
        let slots = vec![vif(0, 0, true, 1)];
        let values = lookup(HashMap::new());
        assert_eq!(
            potential(FactorKind::Logical, &slots, values, VariableId(0), 1),
            1.0
        );
    }

    #[test]
    fn categorical_potential_is_always_one() {
        let slots = vec![vif(0, 0, true, 1)];
        let values = lookup(HashMap::new());
        assert_eq!(
            potential(FactorKind::Categorical, &slots, values.clone(), VariableId(0), 1),
            1.0
        );
        assert_eq!(
            potential(FactorKind::AndCategorical, &slots, values, VariableId(0), 0),
            1.0
        );
    }
}
