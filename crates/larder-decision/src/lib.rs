//! The Larder decision engine.
//!
//! Aggregates allergen, expiry and ingredient-completeness reports from
//! sources of uneven trust into one conservative fact structure, with a
//! single gate, [`DecisionOutput::can_confirm_safe`], that is only ever true
//! when every safety clause holds.
//!
//! ```text
//!   DecisionInput
//!     ├─ allergen_inputs   ─→ aggregate::allergens   ─┐
//!     ├─ expiry_inputs     ─→ larder_expiry           ├─→ gate ─→ DecisionOutput
//!     └─ ingredient_inputs ─→ aggregate::ingredients ─┘
//! ```

mod aggregate;
mod engine;
mod gate;
mod input;
mod pipeline;

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use larder_core::{
  conflict::DataConflict,
  ontology::AllergenId,
  profile::AllergenProfile,
  risk::RiskLevel,
  source::{SourceMetadata, SourceType},
};
use larder_expiry::{ExpirySource, ExpiryStatus};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoStaticStr};
use uuid::Uuid;

pub use engine::{MIN_REVIEW_CONFIDENCE, MIN_SAFE_CONFIDENCE, decide};
pub use pipeline::{AnalyzeRequest, analyze};

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// One source's claim that a product carries an allergen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllergenInput {
  pub allergen_id:       AllergenId,
  pub allergen_code:     String,
  pub risk_level:        RiskLevel,
  pub source:            SourceMetadata,
  #[serde(default)]
  pub source_ingredient: Option<String>,
  #[serde(default)]
  pub explanation:       String,
}

/// One source's view of the ingredient list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientInput {
  pub source:              SourceMetadata,
  /// Recognized ingredients.
  #[serde(default)]
  pub ingredients:         Vec<String>,
  /// Tokens the source could not recognize.
  #[serde(default)]
  pub unknown_ingredients: Vec<String>,
  /// 0 means unknown.
  #[serde(default)]
  pub confidence:          f64,
  /// The full allergen set this source declares, when it declares one.
  /// `None` means the source says nothing about allergens.
  #[serde(default)]
  pub reported_allergens:  Option<BTreeSet<AllergenId>>,
}

impl IngredientInput {
  pub fn ingredient_count(&self) -> usize {
    self.ingredients.len() + self.unknown_ingredients.len()
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecisionInput {
  #[serde(default)]
  pub product_ref:          Option<String>,
  #[serde(default)]
  pub profile:              AllergenProfile,
  #[serde(default)]
  pub allergen_inputs:      Vec<AllergenInput>,
  #[serde(default)]
  pub expiry_inputs:        Vec<ExpirySource>,
  #[serde(default)]
  pub ingredient_inputs:    Vec<IngredientInput>,
  /// The instant expiry is judged against. Defaults to the decision time.
  #[serde(default)]
  pub evaluated_at:         Option<DateTime<Utc>>,
  #[serde(default)]
  pub snapshot_fingerprint: Option<String>,
}

// ─── Facts ───────────────────────────────────────────────────────────────────

/// All reports about one profile allergen, merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedAllergen {
  pub allergen_id:        AllergenId,
  pub allergen_code:      String,
  /// The most severe level any source reported.
  pub risk_level:         RiskLevel,
  /// The source with the highest authority score.
  pub primary_source:     SourceType,
  pub authority_score:    f64,
  pub sources:            Vec<SourceType>,
  pub source_ingredients: Vec<String>,
  pub explanation:        String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AllergenFacts {
  /// Ordered by allergen id.
  pub allergens:             Vec<AggregatedAllergen>,
  /// Any Definite or Derived allergen.
  pub has_definite_allergen: bool,
  /// Any Possible or Trace allergen.
  pub has_possible_allergen: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpiryFacts {
  pub status:                 ExpiryStatus,
  pub resolved_date:          Option<NaiveDate>,
  pub days_until_expiry:      Option<i64>,
  pub primary_source:         Option<SourceType>,
  pub confidence:             f64,
  pub is_inferred:            bool,
  /// False when no expiry data was supplied at all.
  pub has_expiry_data:        bool,
  pub requires_verification:  bool,
  pub can_contribute_to_safe: bool,
  pub blocked_safe_reason:    Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngredientFacts {
  pub primary_source:          Option<SourceType>,
  pub ingredient_count:        usize,
  /// Unrecognized tokens across every source, first occurrence order.
  pub unknown_ingredients:     Vec<String>,
  pub has_unknown_ingredients: bool,
  pub confidence:              f64,
  pub source_count:            usize,
}

/// The clauses of the safe gate, in the order they are checked.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
  EnumIter,
  IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SafeBlocker {
  DefiniteAllergen,
  PossibleAllergen,
  ManualReview,
  LowConfidence,
  LowAuthority,
  UnknownIngredients,
  UnresolvedConflicts,
  Expired,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionAudit {
  pub decision_id:             Uuid,
  pub decided_at:              DateTime<Utc>,
  pub evaluated_at:            DateTime<Utc>,
  pub allergen_input_count:    usize,
  pub expiry_input_count:      usize,
  pub ingredient_input_count:  usize,
  /// Allergen inputs for allergens outside the profile.
  pub ignored_allergen_inputs: usize,
  pub snapshot_fingerprint:    Option<String>,
}

/// One decision. Built once and never changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionOutput {
  pub product_ref:            Option<String>,
  pub allergen_facts:         AllergenFacts,
  pub expiry_facts:           ExpiryFacts,
  pub ingredient_facts:       IngredientFacts,
  pub overall_confidence:     f64,
  pub primary_data_source:    Option<SourceType>,
  /// Base authority of the primary data source, 0 when there is none.
  pub primary_authority:      u8,
  /// Every source type that contributed, highest authority first.
  pub data_sources:           Vec<SourceType>,
  pub requires_manual_review: bool,
  pub review_reasons:         Vec<String>,
  pub can_confirm_safe:       bool,
  /// The first gate clause that failed.
  pub safe_blocker:           Option<SafeBlocker>,
  pub conflicts:              Vec<DataConflict>,
  pub audit:                  DecisionAudit,
}

impl DecisionOutput {
  pub fn has_unresolved_conflicts(&self) -> bool {
    self.conflicts.iter().any(DataConflict::needs_attention)
  }
}

#[cfg(test)]
mod tests;
