//! Raw text → normalizer → matcher → decision, for one ingredient source.

use chrono::{DateTime, Utc};
use larder_core::{
  OntologySnapshot, profile::AllergenProfile, source::SourceMetadata,
};
use larder_expiry::ExpirySource;
use serde::{Deserialize, Serialize};

use crate::{AllergenInput, DecisionInput, DecisionOutput, IngredientInput, decide};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeRequest {
  #[serde(default)]
  pub product_ref:    Option<String>,
  /// The ingredient list as read from the product.
  pub text:           String,
  /// Where `text` came from.
  pub source:         SourceMetadata,
  #[serde(default)]
  pub profile:        AllergenProfile,
  #[serde(default)]
  pub expiry_sources: Vec<ExpirySource>,
  #[serde(default)]
  pub evaluated_at:   Option<DateTime<Utc>>,
}

/// Run the full pipeline over one ingredient text.
pub fn analyze(request: &AnalyzeRequest, snapshot: &OntologySnapshot) -> DecisionOutput {
  let normalized = larder_ingredients::normalize(&request.text, snapshot);
  let detection =
    larder_ingredients::detect_allergens(&normalized, &request.profile, snapshot);

  decide(&DecisionInput {
    product_ref:          request.product_ref.clone(),
    profile:              request.profile.clone(),
    allergen_inputs:      AllergenInput::from_detections(&detection, &request.source),
    expiry_inputs:        request.expiry_sources.clone(),
    ingredient_inputs:    vec![IngredientInput::from_normalization(
      &normalized,
      request.source.clone(),
    )],
    evaluated_at:         request.evaluated_at,
    snapshot_fingerprint: Some(snapshot.fingerprint().to_string()),
  })
}
