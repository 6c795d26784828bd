//! Ontology tables: the raw rows a persistence collaborator hands over.
//!
//! These types mirror the persisted tables one-to-one. They carry no
//! invariants of their own; [`crate::snapshot::OntologySnapshot::build`]
//! validates them and produces the read-only lookup structure.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, IntoStaticStr};

use crate::{Result, risk::RiskLevel};

// ─── Row identifiers ─────────────────────────────────────────────────────────

macro_rules! row_id {
  ($(#[$meta:meta])* $name:ident) => {
    $(#[$meta])*
    #[derive(
      Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
      Deserialize,
    )]
    #[serde(transparent)]
    pub struct $name(pub u32);

    impl fmt::Display for $name {
      fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
      }
    }
  };
}

row_id!(
  /// Primary key of a canonical ingredient row.
  IngredientId
);
row_id!(
  /// Primary key of an allergen category row.
  AllergenId
);
row_id!(
  /// Primary key of a risk phrase row.
  RiskPhraseId
);

// ─── Ingredients ─────────────────────────────────────────────────────────────

/// The single identity that an ingredient's text variants resolve to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalIngredient {
  pub ingredient_id:     IngredientId,
  pub canonical_name:    String,
  pub display_name:      String,
  /// Produced from an allergen source without being the allergen itself.
  #[serde(default)]
  pub is_derivative:     bool,
  #[serde(default)]
  pub parent_ingredient: Option<IngredientId>,
}

#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display,
  IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SynonymType {
  #[default]
  Exact,
  Spelling,
  Regional,
  Scientific,
  Abbreviation,
  Translation,
  Brand,
}

/// A text variant that resolves to exactly one canonical ingredient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientSynonym {
  pub synonym:       String,
  pub ingredient_id: IngredientId,
  #[serde(default = "full_confidence")]
  pub confidence:    f64,
  #[serde(default)]
  pub synonym_type:  SynonymType,
}

/// Declares that `ingredient_id` contains `contains_ingredient_id`
/// (e.g. whey protein concentrate contains whey).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompoundIngredient {
  pub ingredient_id:          IngredientId,
  pub contains_ingredient_id: IngredientId,
}

// ─── Allergens ───────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
  Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Severity {
  Mild,
  Moderate,
  Severe,
  LifeThreatening,
}

/// An allergen class such as `PEANUT` or `MILK`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllergenCategory {
  pub allergen_id:       AllergenId,
  pub code:              String,
  pub name:              String,
  pub severity:          Severity,
  /// Regulatory region the category is defined for, e.g. `"EU"`.
  pub region:            String,
  #[serde(default)]
  pub is_major_allergen: bool,
}

/// Associates a canonical ingredient with an allergen category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientAllergen {
  pub ingredient_id: IngredientId,
  pub allergen_id:   AllergenId,
  pub risk_level:    RiskLevel,
  #[serde(default = "full_confidence")]
  pub confidence:    f64,
}

// ─── Risk phrases ────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display,
  IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RiskType {
  MayContain,
  SharedFacility,
  SharedEquipment,
  Traces,
  Other,
}

/// Advisory text such as "may contain traces of" that signals
/// cross-contamination rather than a listed ingredient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskPhrase {
  pub phrase_id:         RiskPhraseId,
  pub phrase:            String,
  pub risk_type:         RiskType,
  pub output_risk_level: RiskLevel,
  /// The allergen this phrase names, if it is specific (e.g. "may contain
  /// peanuts"). `None` for generic warnings.
  #[serde(default)]
  pub allergen_id:       Option<AllergenId>,
  #[serde(default = "full_confidence")]
  pub confidence:        f64,
}

// ─── Table set ───────────────────────────────────────────────────────────────

/// Every table needed to build an [`crate::snapshot::OntologySnapshot`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OntologyTables {
  pub ingredients:          Vec<CanonicalIngredient>,
  #[serde(default)]
  pub synonyms:             Vec<IngredientSynonym>,
  pub allergens:            Vec<AllergenCategory>,
  #[serde(default)]
  pub ingredient_allergens: Vec<IngredientAllergen>,
  #[serde(default)]
  pub compounds:            Vec<CompoundIngredient>,
  #[serde(default)]
  pub risk_phrases:         Vec<RiskPhrase>,
}

impl OntologyTables {
  /// Deserialize a JSON export of the tables.
  pub fn from_json(input: &str) -> Result<Self> {
    Ok(serde_json::from_str(input)?)
  }
}

fn full_confidence() -> f64 { 1.0 }

/// Lowercase, trim, and collapse internal whitespace runs to one space.
///
/// This is the normal form of every key in the synonym lookup and every
/// risk phrase, and the normalizer applies it to each token before lookup.
pub fn normalize_text(text: &str) -> String {
  text
    .split_whitespace()
    .map(str::to_lowercase)
    .collect::<Vec<_>>()
    .join(" ")
}
