//! Manual-review triggers and the safe gate.

use larder_core::source::MINIMUM_AUTHORITY;
use larder_expiry::{ExpiryResolution, ExpiryStatus};
use larder_ingredients::unmatched_reason;

use crate::{
  SafeBlocker,
  engine::{MIN_REVIEW_CONFIDENCE, MIN_SAFE_CONFIDENCE, NO_EXPIRY_DATA},
};

pub(crate) struct ReviewContext<'a> {
  pub unknown_ingredients:   &'a [String],
  pub attention_conflicts:   usize,
  pub overall_confidence:    f64,
  pub allergen_count:        usize,
  /// Authority of the primary ingredient source, 0 when there is none.
  pub ingredient_authority:  u8,
  pub has_definite_allergen: bool,
  pub has_possible_allergen: bool,
  /// `None` when no expiry data was supplied, which always needs review.
  pub expiry:                Option<&'a ExpiryResolution>,
  pub has_ingredient_data:   bool,
  pub profile_len:           usize,
}

/// One reason per triggered condition, in a fixed order.
pub(crate) fn review_reasons(ctx: &ReviewContext<'_>) -> Vec<String> {
  let mut reasons = Vec::new();

  if !ctx.unknown_ingredients.is_empty() {
    reasons.push(unmatched_reason(ctx.unknown_ingredients));
  }
  if ctx.attention_conflicts > 0 {
    reasons.push(format!(
      "{} data conflict(s) require manual resolution",
      ctx.attention_conflicts
    ));
  }
  if ctx.overall_confidence < MIN_REVIEW_CONFIDENCE {
    reasons.push(format!(
      "overall confidence {:.2} is below {MIN_REVIEW_CONFIDENCE:.2}",
      ctx.overall_confidence
    ));
  }
  if ctx.allergen_count == 0
    && ctx.ingredient_authority < MINIMUM_AUTHORITY.allow_safe
  {
    reasons.push(format!(
      "no allergens detected, but ingredient data authority {} is below {}",
      ctx.ingredient_authority, MINIMUM_AUTHORITY.allow_safe
    ));
  }
  if ctx.has_possible_allergen && !ctx.has_definite_allergen {
    reasons.push(
      "possible or trace allergen present without a definite one".to_string(),
    );
  }
  match ctx.expiry {
    Some(expiry) if expiry.requires_manual_review => {
      let detail = expiry
        .blocked_safe_reason
        .as_deref()
        .unwrap_or("expiry could not be confirmed");
      reasons.push(format!("expiry needs verification: {detail}"));
    }
    Some(_) => {}
    None => {
      reasons.push(format!("expiry needs verification: {NO_EXPIRY_DATA}"));
    }
  }
  if !ctx.has_ingredient_data && ctx.profile_len > 0 {
    reasons.push(format!(
      "no ingredient data to check against {} profile allergen(s)",
      ctx.profile_len
    ));
  }
  reasons
}

pub(crate) struct GateFacts {
  pub has_definite_allergen:    bool,
  pub has_possible_allergen:    bool,
  pub requires_manual_review:   bool,
  pub overall_confidence:       f64,
  pub primary_authority:        u8,
  pub has_unknown_ingredients:  bool,
  pub has_unresolved_conflicts: bool,
  pub expiry_status:            ExpiryStatus,
}

/// The first failing clause, or `None` when every clause holds. All eight
/// clauses are evaluated on every call.
pub(crate) fn safe_blocker(facts: &GateFacts) -> Option<SafeBlocker> {
  let clauses = [
    (SafeBlocker::DefiniteAllergen, !facts.has_definite_allergen),
    (SafeBlocker::PossibleAllergen, !facts.has_possible_allergen),
    (SafeBlocker::ManualReview, !facts.requires_manual_review),
    (
      SafeBlocker::LowConfidence,
      facts.overall_confidence >= MIN_SAFE_CONFIDENCE,
    ),
    (
      SafeBlocker::LowAuthority,
      facts.primary_authority >= MINIMUM_AUTHORITY.allow_safe,
    ),
    (SafeBlocker::UnknownIngredients, !facts.has_unknown_ingredients),
    (SafeBlocker::UnresolvedConflicts, !facts.has_unresolved_conflicts),
    (SafeBlocker::Expired, facts.expiry_status != ExpiryStatus::Expired),
  ];
  clauses
    .into_iter()
    .find(|(_, holds)| !holds)
    .map(|(blocker, _)| blocker)
}
