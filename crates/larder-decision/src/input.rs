//! Conversions from normalizer and matcher output into engine inputs.

use larder_core::source::{SourceMetadata, clamp_unit};
use larder_ingredients::{
  AllergenDetection, AllergenDetectionResult, NormalizationResult,
};

use crate::{AllergenInput, IngredientInput};

impl AllergenInput {
  /// An input for one detection. The detection's own confidence scales the
  /// source confidence.
  pub fn from_detection(detection: &AllergenDetection, source: &SourceMetadata) -> Self {
    let mut source = source.clone();
    source.confidence = clamp_unit(source.confidence() * detection.confidence);
    Self {
      allergen_id: detection.allergen_id,
      allergen_code: detection.allergen_code.clone(),
      risk_level: detection.risk_level,
      source,
      source_ingredient: detection.source_ingredient.clone(),
      explanation: detection.explanation.clone(),
    }
  }

  pub fn from_detections(
    result: &AllergenDetectionResult,
    source: &SourceMetadata,
  ) -> Vec<Self> {
    result
      .detected
      .iter()
      .map(|d| Self::from_detection(d, source))
      .collect()
  }
}

impl IngredientInput {
  /// An input describing what the normalizer made of one source's text.
  /// It makes no claim about the full allergen set.
  pub fn from_normalization(result: &NormalizationResult, source: SourceMetadata) -> Self {
    Self {
      source,
      ingredients: result
        .matched
        .iter()
        .map(|m| m.canonical_name.clone().unwrap_or_else(|| m.normalized.clone()))
        .collect(),
      unknown_ingredients: result.unmatched.clone(),
      confidence: result.overall_confidence,
      reported_allergens: None,
    }
  }
}
