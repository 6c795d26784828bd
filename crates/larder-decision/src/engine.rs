//! `decide`: aggregation, confidence, review, gate.

use chrono::Utc;
use larder_core::{
  conflict::count_needing_attention,
  source::{SourceMetadata, SourceType, clamp_unit},
};
use larder_expiry::{ExpiryResolution, ExpiryStatus, resolve_expiry};
use uuid::Uuid;

use crate::{
  DecisionAudit, DecisionInput, DecisionOutput, ExpiryFacts, aggregate,
  gate::{self, GateFacts, ReviewContext},
};

/// Overall confidence below this always needs a human.
pub const MIN_REVIEW_CONFIDENCE: f64 = 0.6;
/// Overall confidence below this can never be confirmed safe.
pub const MIN_SAFE_CONFIDENCE: f64 = 0.7;

/// Stands in for an ingredient confidence that is zero or missing.
const UNKNOWN_INGREDIENT_CONFIDENCE: f64 = 0.5;
const CONFLICT_DECAY: f64 = 0.9;
const UNKNOWN_INGREDIENT_PENALTY: f64 = 0.7;

pub(crate) const NO_EXPIRY_DATA: &str = "no expiry data supplied";

/// Produce one decision from `input`.
///
/// Deterministic apart from the decision id and timestamp. Expiry is judged
/// at `input.evaluated_at`, or at the decision time when that is absent.
pub fn decide(input: &DecisionInput) -> DecisionOutput {
  let decided_at = Utc::now();
  let evaluated_at = input.evaluated_at.unwrap_or(decided_at);

  let allergens = aggregate::allergens(
    &input.allergen_inputs,
    &input.profile,
    &input.ingredient_inputs,
  );
  let ingredients = aggregate::ingredients(&input.ingredient_inputs);
  let expiry = (!input.expiry_inputs.is_empty())
    .then(|| resolve_expiry(&input.expiry_inputs, evaluated_at));

  let mut conflicts = allergens.conflicts;
  conflicts.extend(ingredients.conflicts);
  if let Some(expiry) = &expiry {
    conflicts.extend(expiry.conflicts.iter().cloned());
  }
  let attention_conflicts = count_needing_attention(&conflicts);

  // Ingredient data is the primary source; allergen reports stand in when
  // no ingredient list was supplied.
  let primary = ingredients.primary.map(|p| &p.source).or_else(|| {
    input
      .allergen_inputs
      .iter()
      .map(|a| &a.source)
      .reduce(|best, next| {
        if next.authority_score() > best.authority_score() { next } else { best }
      })
  });
  let primary_authority = primary.map_or(0, SourceMetadata::authority);

  let overall_confidence = overall_confidence(
    primary.map_or(0.0, SourceMetadata::authority_score),
    ingredients.facts.confidence,
    expiry.as_ref(),
    attention_conflicts,
    ingredients.facts.has_unknown_ingredients,
  );

  let review_reasons = gate::review_reasons(&ReviewContext {
    unknown_ingredients: &ingredients.facts.unknown_ingredients,
    attention_conflicts,
    overall_confidence,
    allergen_count: allergens.facts.allergens.len(),
    ingredient_authority: ingredients.primary.map_or(0, |p| p.source.authority()),
    has_definite_allergen: allergens.facts.has_definite_allergen,
    has_possible_allergen: allergens.facts.has_possible_allergen,
    expiry: expiry.as_ref(),
    has_ingredient_data: ingredients.primary.is_some(),
    profile_len: input.profile.len(),
  });
  let requires_manual_review = !review_reasons.is_empty();

  let expiry_facts = expiry_facts(expiry.as_ref());
  let safe_blocker = gate::safe_blocker(&GateFacts {
    has_definite_allergen: allergens.facts.has_definite_allergen,
    has_possible_allergen: allergens.facts.has_possible_allergen,
    requires_manual_review,
    overall_confidence,
    primary_authority,
    has_unknown_ingredients: ingredients.facts.has_unknown_ingredients,
    has_unresolved_conflicts: attention_conflicts > 0,
    expiry_status: expiry_facts.status,
  });

  let audit = DecisionAudit {
    decision_id: Uuid::new_v4(),
    decided_at,
    evaluated_at,
    allergen_input_count: input.allergen_inputs.len(),
    expiry_input_count: input.expiry_inputs.len(),
    ingredient_input_count: input.ingredient_inputs.len(),
    ignored_allergen_inputs: allergens.ignored,
    snapshot_fingerprint: input.snapshot_fingerprint.clone(),
  };

  if requires_manual_review {
    tracing::debug!(
      decision_id = %audit.decision_id,
      reasons = ?review_reasons,
      "decision requires manual review"
    );
  }
  tracing::debug!(
    decision_id = %audit.decision_id,
    allergens = allergens.facts.allergens.len(),
    conflicts = conflicts.len(),
    overall_confidence,
    can_confirm_safe = safe_blocker.is_none(),
    safe_blocker = ?safe_blocker,
    "decided"
  );

  DecisionOutput {
    product_ref: input.product_ref.clone(),
    allergen_facts: allergens.facts,
    expiry_facts,
    ingredient_facts: ingredients.facts,
    overall_confidence,
    primary_data_source: primary.map(|p| p.source_type),
    primary_authority,
    data_sources: data_sources(input),
    requires_manual_review,
    review_reasons,
    can_confirm_safe: safe_blocker.is_none(),
    safe_blocker,
    conflicts,
    audit,
  }
}

fn overall_confidence(
  primary_authority_score: f64,
  ingredient_confidence: f64,
  expiry: Option<&ExpiryResolution>,
  attention_conflicts: usize,
  has_unknown_ingredients: bool,
) -> f64 {
  let mut confidence = 1.0;
  confidence *= primary_authority_score / 100.0;
  confidence *= if ingredient_confidence > 0.0 {
    ingredient_confidence
  } else {
    UNKNOWN_INGREDIENT_CONFIDENCE
  };
  // Expiry is a secondary signal: it can at most halve the confidence.
  confidence *= expiry.map_or(1.0, |e| 0.5 + 0.5 * e.confidence);
  confidence *= CONFLICT_DECAY.powi(i32::try_from(attention_conflicts).unwrap_or(i32::MAX));
  if has_unknown_ingredients {
    confidence *= UNKNOWN_INGREDIENT_PENALTY;
  }
  clamp_unit(confidence)
}

fn expiry_facts(expiry: Option<&ExpiryResolution>) -> ExpiryFacts {
  match expiry {
    Some(e) => ExpiryFacts {
      status:                 e.status,
      resolved_date:          e.resolved_date,
      days_until_expiry:      e.days_until_expiry,
      primary_source:         e.primary_source,
      confidence:             e.confidence,
      is_inferred:            e.is_inferred,
      has_expiry_data:        true,
      requires_verification:  e.requires_manual_review,
      can_contribute_to_safe: e.can_contribute_to_safe,
      blocked_safe_reason:    e.blocked_safe_reason.clone(),
    },
    None => ExpiryFacts {
      status:                 ExpiryStatus::Unknown,
      resolved_date:          None,
      days_until_expiry:      None,
      primary_source:         None,
      confidence:             0.0,
      is_inferred:            false,
      has_expiry_data:        false,
      requires_verification:  true,
      can_contribute_to_safe: false,
      blocked_safe_reason:    Some(NO_EXPIRY_DATA.to_string()),
    },
  }
}

/// Distinct source types across every input, highest authority first.
fn data_sources(input: &DecisionInput) -> Vec<SourceType> {
  let mut sources: Vec<SourceType> = input
    .allergen_inputs
    .iter()
    .map(|a| a.source.source_type)
    .chain(input.ingredient_inputs.iter().map(|i| i.source.source_type))
    .chain(input.expiry_inputs.iter().map(|e| e.source.source_type))
    .collect();
  sources.sort_by_key(|s| std::cmp::Reverse(s.authority()));
  sources.dedup();
  sources
}
