//! Error types for `larder-core`.
//!
//! Every variant is a configuration or consistency failure in the ontology
//! tables. Input uncertainty (unmatched ingredients, missing dates) is never
//! an error; it is carried as data by the pipeline crates.

use thiserror::Error;

use crate::ontology::{AllergenId, IngredientId, RiskPhraseId};

#[derive(Debug, Error)]
pub enum Error {
  #[error("no ontology snapshot has been loaded")]
  SnapshotUninitialized,

  #[error("duplicate ingredient id: {0}")]
  DuplicateIngredient(IngredientId),

  #[error("duplicate allergen id: {0}")]
  DuplicateAllergen(AllergenId),

  #[error("duplicate allergen code: {0:?}")]
  DuplicateAllergenCode(String),

  #[error("duplicate risk phrase id: {0}")]
  DuplicateRiskPhrase(RiskPhraseId),

  #[error("{table} references unknown ingredient {id}")]
  UnknownIngredient { table: &'static str, id: IngredientId },

  #[error("{table} references unknown allergen {id}")]
  UnknownAllergen { table: &'static str, id: AllergenId },

  #[error("synonym {synonym:?} maps to both {first} and {second}")]
  AmbiguousSynonym {
    synonym: String,
    first:   IngredientId,
    second:  IngredientId,
  },

  #[error("compound ingredient {0} lists itself as a component")]
  SelfContainingCompound(IngredientId),

  #[error("{table} contains an empty text value")]
  EmptyText { table: &'static str },

  #[error("{table} has confidence {value} outside [0, 1]")]
  InvalidConfidence { table: &'static str, value: f64 },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
