use std::collections::HashMap;

use crate::operation::{
    InstrumentationPlan, InstrumentationPoint, InstrumentationRequest, Operation,
};

/// Merges instrumentation requests into one plan per instrumentation point.
///
/// Requests aimed at the program entry collapse into a single entry plan,
/// emitted first, in arrival order. The rest are grouped by
/// `(method, position)` in order of first appearance. Every non-entry plan
/// starts with [`Operation::AllowBlocking`], synthesised when the first
/// requested operation is something else.
#[must_use]
pub fn compile(
    requests: impl IntoIterator<Item = InstrumentationRequest>,
) -> Vec<InstrumentationPlan> {
    let mut entry = InstrumentationPlan::new(InstrumentationPoint::entry());
    let mut plans: Vec<InstrumentationPlan> = Vec::new();
    let mut slots: HashMap<InstrumentationPoint, usize> = HashMap::new();

    for InstrumentationRequest { point, operation } in requests {
        if point.is_entry() {
            entry.operations.push(operation);
            continue;
        }
        let slot = *slots.entry(point.clone()).or_insert_with(|| {
            plans.push(InstrumentationPlan::new(point));
            plans.len() - 1
        });
        plans[slot].operations.push(operation);
    }

    for plan in &mut plans {
        if plan.operations.first() != Some(&Operation::AllowBlocking) {
            plan.operations.insert(0, Operation::AllowBlocking);
        }
    }

    let mut compiled = Vec::with_capacity(plans.len() + 1);
    if !entry.operations.is_empty() {
        compiled.push(entry);
    }
    compiled.extend(plans);
    compiled
}
