//! Ingredient-text normalization and allergen matching for Larder.
//!
//! Converts a raw ingredient list into canonical ingredients and detected
//! risk phrases, then maps those onto a user's allergen profile. Pure
//! synchronous; every call reads an immutable [`OntologySnapshot`] and
//! nothing else.
//!
//! # Quick start
//!
//! ```no_run
//! use larder_core::{OntologySnapshot, profile::AllergenProfile};
//!
//! let snapshot = OntologySnapshot::from_json("{...}").unwrap();
//! let peanut = snapshot.allergen_by_code("PEANUT").unwrap().allergen_id;
//!
//! let normalized = larder_ingredients::normalize("Ingredients: groundnut oil", &snapshot);
//! let detection = larder_ingredients::detect_allergens(
//!   &normalized,
//!   &AllergenProfile::new([peanut]),
//!   &snapshot,
//! );
//! assert!(detection.safety_facts.contains_definite_allergen);
//! ```

mod matcher;
mod normalize;
mod phrases;
mod tokenize;
mod variants;

use larder_core::{
  OntologySnapshot,
  ontology::{AllergenId, IngredientId, RiskPhraseId, RiskType, SynonymType},
  profile::AllergenProfile,
  risk::RiskLevel,
};
pub use normalize::{REVIEW_CONFIDENCE_THRESHOLD, unmatched_reason};
use serde::{Deserialize, Serialize};
use strum::{Display, IntoStaticStr};

// ─── Normalization types ─────────────────────────────────────────────────────

/// Which rung of the match ladder produced a match.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display,
  IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchMethod {
  /// The whole token is a known name or synonym.
  Exact,
  /// A known name after removing a parenthetical or a leading qualifier.
  Synonym,
  /// A known name found as a leading phrase or single word of the token.
  Compound,
  Unmatched,
}

/// One ingredient token and what it resolved to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedIngredient {
  /// The token as written (cleaned of percentages and stray brackets).
  pub original:       String,
  pub normalized:     String,
  /// The synonym-map key that matched.
  pub matched_key:    Option<String>,
  pub ingredient_id:  Option<IngredientId>,
  pub canonical_name: Option<String>,
  pub is_derivative:  bool,
  pub match_method:   MatchMethod,
  pub synonym_type:   Option<SynonymType>,
  pub confidence:     f64,
  /// Direct allergens plus one level of compound expansion.
  pub allergen_ids:   Vec<AllergenId>,
}

/// A risk phrase found in the raw text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedRiskPhrase {
  pub phrase_id:         RiskPhraseId,
  /// The normalized phrase from the ontology.
  pub phrase:            String,
  /// The text that matched, as written.
  pub matched_text:      String,
  /// The phrase and the rest of its sentence, as written.
  pub context:           String,
  /// Character offset of the match in the raw text.
  pub offset:            usize,
  pub risk_type:         RiskType,
  pub output_risk_level: RiskLevel,
  pub allergen_id:       Option<AllergenId>,
  pub confidence:        f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationResult {
  /// Every token in order, matched or not.
  pub normalized:             Vec<NormalizedIngredient>,
  pub matched:                Vec<NormalizedIngredient>,
  /// Unmatched tokens, verbatim.
  pub unmatched:              Vec<String>,
  pub risk_phrases:           Vec<DetectedRiskPhrase>,
  pub match_rate:             f64,
  pub overall_confidence:     f64,
  pub requires_manual_review: bool,
  pub review_reasons:         Vec<String>,
}

// ─── Detection types ─────────────────────────────────────────────────────────

/// What produced an allergen detection.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display,
  IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum DetectionSource {
  Ingredient,
  Derivative,
  Compound,
  /// A phrase bound to a specific allergen.
  RiskPhrase,
  /// A generic phrase attributed through the variant-word table.
  InferredRiskPhrase,
  /// A generic phrase that could not be attributed.
  GenericWarning,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllergenDetection {
  pub allergen_id:       AllergenId,
  pub allergen_code:     String,
  pub risk_level:        RiskLevel,
  pub source:            DetectionSource,
  pub confidence:        f64,
  pub source_ingredient: Option<String>,
  pub risk_phrase:       Option<String>,
  pub explanation:       String,
}

#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize,
)]
pub struct AllergenFlags {
  pub has_definite: bool,
  pub has_derived:  bool,
  pub has_possible: bool,
  pub has_trace:    bool,
}

#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfidenceLevel {
  High,
  Medium,
  #[default]
  Low,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyFacts {
  pub contains_definite_allergen: bool,
  /// Any Possible or Trace detection.
  pub contains_possible_allergen: bool,
  pub has_unknown_ingredients:    bool,
  pub confidence_level:           ConfidenceLevel,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AllergenDetectionResult {
  /// One entry per allergen, ordered by allergen id.
  pub detected:          Vec<AllergenDetection>,
  /// Definite and Derived detections.
  pub definite:          Vec<AllergenDetection>,
  pub possible:          Vec<AllergenDetection>,
  pub trace:             Vec<AllergenDetection>,
  pub flags:             AllergenFlags,
  pub unmatched_warning: Option<String>,
  pub safety_facts:      SafetyFacts,
}

// ─── Public API ──────────────────────────────────────────────────────────────

/// Normalize a raw ingredient list against `snapshot`.
///
/// Never fails: tokens that cannot be matched are returned in
/// [`NormalizationResult::unmatched`] and flagged for review.
pub fn normalize(raw_text: &str, snapshot: &OntologySnapshot) -> NormalizationResult {
  normalize::normalize(raw_text, snapshot)
}

/// Map a normalization result onto `profile`.
///
/// Returns an empty result when the profile lists no allergens.
pub fn detect_allergens(
  result: &NormalizationResult,
  profile: &AllergenProfile,
  snapshot: &OntologySnapshot,
) -> AllergenDetectionResult {
  matcher::detect(result, profile, snapshot)
}

#[cfg(test)]
mod tests;
