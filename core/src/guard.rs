//! Scenario integrity guard.
//!
//! RULE: Every scenario passes through `sanitize` exactly once before it is
//! shown. The guard only fixes answerability: if a correct value is missing
//! from its option list, one pseudo-random slot is overwritten with it.
//! Option count and the order of untouched entries are preserved. Prose
//! fields are never inspected.

use crate::{
    rng::DojoRng,
    scenario::{OptionList, Repair, Scenario, ValidatedScenario},
};

/// Repair both membership invariants and seal the result.
/// Idempotent: a scenario that is already answerable comes back unchanged.
pub fn sanitize(mut raw: Scenario, rng: &mut DojoRng) -> ValidatedScenario {
    let mut repairs = Vec::new();

    let decision = &mut raw.primary_decision;
    if let Some(repair) = ensure_member(
        &decision.correct_answer,
        &mut decision.options,
        OptionList::PrimaryOptions,
        rng,
    ) {
        repairs.push(repair);
    }

    if let Some(repair) = ensure_member(
        &raw.correct_action,
        &mut raw.action_options,
        OptionList::ActionOptions,
        rng,
    ) {
        repairs.push(repair);
    }

    for repair in &repairs {
        log::warn!(
            "scenario {}: correct value missing from {:?}, written to slot {}",
            raw.id,
            repair.list,
            repair.slot
        );
    }

    ValidatedScenario::new(raw, repairs)
}

/// Exact-string membership check; overwrite a random slot on miss.
fn ensure_member(
    correct: &str,
    options: &mut Vec<String>,
    list: OptionList,
    rng: &mut DojoRng,
) -> Option<Repair> {
    if options.iter().any(|o| o == correct) {
        return None;
    }
    if options.is_empty() {
        // Nothing to overwrite; the single option becomes the answer.
        options.push(correct.to_string());
        return Some(Repair { list, slot: 0, displaced: None });
    }
    let slot = rng.next_index(options.len());
    let displaced = std::mem::replace(&mut options[slot], correct.to_string());
    Some(Repair {
        list,
        slot,
        displaced: Some(displaced),
    })
}
