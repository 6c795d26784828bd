//! Allergen matching: normalized ingredients + risk phrases → detections
//! against one user's profile.

use std::collections::BTreeMap;

use larder_core::{
  OntologySnapshot, ontology::AllergenId, profile::AllergenProfile,
  risk::RiskLevel,
};

use crate::{
  AllergenDetection, AllergenDetectionResult, AllergenFlags, ConfidenceLevel,
  DetectedRiskPhrase, DetectionSource, MatchMethod, NormalizationResult,
  NormalizedIngredient, SafetyFacts, normalize::unmatched_reason, variants,
};

/// Confidence multiplier for a generic phrase attributed via the variant
/// table.
const INFERRED_PHRASE_FACTOR: f64 = 0.9;
/// Confidence multiplier for a generic phrase fanned out to every profile
/// allergen.
const GENERIC_PHRASE_FACTOR: f64 = 0.7;

const UNMATCHED_PENALTY: f64 = 0.7;
const RISK_PHRASE_PENALTY: f64 = 0.8;
const HIGH_CONFIDENCE: f64 = 0.8;
const MEDIUM_CONFIDENCE: f64 = 0.5;

pub(crate) fn detect(
  result: &NormalizationResult,
  profile: &AllergenProfile,
  snapshot: &OntologySnapshot,
) -> AllergenDetectionResult {
  if profile.is_empty() {
    return AllergenDetectionResult::default();
  }

  let mut raw = Vec::new();
  for ingredient in &result.matched {
    ingredient_detections(ingredient, profile, snapshot, &mut raw);
  }
  for phrase in &result.risk_phrases {
    phrase_detections(phrase, profile, snapshot, &mut raw);
  }

  let detected = deduplicate(raw);
  let definite: Vec<_> = detected
    .iter()
    .filter(|d| d.risk_level.is_definite())
    .cloned()
    .collect();
  let possible: Vec<_> = detected
    .iter()
    .filter(|d| d.risk_level == RiskLevel::Possible)
    .cloned()
    .collect();
  let trace: Vec<_> = detected
    .iter()
    .filter(|d| d.risk_level == RiskLevel::Trace)
    .cloned()
    .collect();

  let flags = AllergenFlags {
    has_definite: detected.iter().any(|d| d.risk_level == RiskLevel::Definite),
    has_derived:  detected.iter().any(|d| d.risk_level == RiskLevel::Derived),
    has_possible: !possible.is_empty(),
    has_trace:    !trace.is_empty(),
  };

  let has_unknown_ingredients = !result.unmatched.is_empty();
  let safety_facts = SafetyFacts {
    contains_definite_allergen: !definite.is_empty(),
    contains_possible_allergen: !possible.is_empty() || !trace.is_empty(),
    has_unknown_ingredients,
    confidence_level: confidence_level(result),
  };

  tracing::debug!(
    detected = detected.len(),
    definite = definite.len(),
    possible = possible.len(),
    trace = trace.len(),
    "matched allergens against profile"
  );

  AllergenDetectionResult {
    unmatched_warning: has_unknown_ingredients
      .then(|| unmatched_reason(&result.unmatched)),
    detected,
    definite,
    possible,
    trace,
    flags,
    safety_facts,
  }
}

// ─── Ingredient detections ───────────────────────────────────────────────────

fn ingredient_detections(
  ingredient: &NormalizedIngredient,
  profile: &AllergenProfile,
  snapshot: &OntologySnapshot,
  out: &mut Vec<AllergenDetection>,
) {
  let (risk_level, source) = if ingredient.is_derivative {
    (RiskLevel::Derived, DetectionSource::Derivative)
  } else if ingredient.match_method == MatchMethod::Compound {
    (RiskLevel::Definite, DetectionSource::Compound)
  } else {
    (RiskLevel::Definite, DetectionSource::Ingredient)
  };
  let name = ingredient
    .canonical_name
    .as_deref()
    .unwrap_or(&ingredient.normalized);

  for &allergen_id in &ingredient.allergen_ids {
    if !profile.contains(allergen_id) {
      continue;
    }
    let code = snapshot.allergen_code(allergen_id);
    let explanation = match source {
      DetectionSource::Derivative => {
        format!("\"{}\" is derived from {code}", ingredient.original)
      }
      DetectionSource::Compound => format!(
        "\"{}\" contains {name}, which contains {code}",
        ingredient.original
      ),
      _ => format!("\"{}\" ({name}) contains {code}", ingredient.original),
    };
    out.push(AllergenDetection {
      allergen_id,
      allergen_code: code,
      risk_level,
      source,
      confidence: ingredient.confidence,
      source_ingredient: Some(ingredient.original.clone()),
      risk_phrase: None,
      explanation,
    });
  }
}

// ─── Risk-phrase detections ──────────────────────────────────────────────────

fn phrase_detections(
  phrase: &DetectedRiskPhrase,
  profile: &AllergenProfile,
  snapshot: &OntologySnapshot,
  out: &mut Vec<AllergenDetection>,
) {
  let mut push = |allergen_id: AllergenId,
                  risk_level: RiskLevel,
                  source: DetectionSource,
                  confidence: f64,
                  explanation: String| {
    out.push(AllergenDetection {
      allergen_id,
      allergen_code: snapshot.allergen_code(allergen_id),
      risk_level,
      source,
      confidence,
      source_ingredient: None,
      risk_phrase: Some(phrase.context.clone()),
      explanation,
    });
  };

  if let Some(allergen_id) = phrase.allergen_id {
    if profile.contains(allergen_id) {
      push(
        allergen_id,
        phrase.output_risk_level,
        DetectionSource::RiskPhrase,
        phrase.confidence,
        format!("warning \"{}\"", phrase.context),
      );
    }
    return;
  }

  let inferred = variants::infer_allergens(&phrase.context, snapshot);
  if !inferred.is_empty() {
    for allergen_id in inferred.into_iter().filter(|id| profile.contains(*id)) {
      push(
        allergen_id,
        phrase.output_risk_level,
        DetectionSource::InferredRiskPhrase,
        phrase.confidence * INFERRED_PHRASE_FACTOR,
        format!(
          "warning \"{}\" refers to {}",
          phrase.context,
          snapshot.allergen_code(allergen_id)
        ),
      );
    }
    return;
  }

  // Nothing names an allergen: the warning cannot exclude any of the user's.
  for allergen_id in profile.iter() {
    push(
      allergen_id,
      RiskLevel::Possible,
      DetectionSource::GenericWarning,
      phrase.confidence * GENERIC_PHRASE_FACTOR,
      format!(
        "unattributed warning \"{}\" may cover {}",
        phrase.context,
        snapshot.allergen_code(allergen_id)
      ),
    );
  }
}

// ─── Deduplication ───────────────────────────────────────────────────────────

/// One detection per allergen: the highest-confidence entry wins (ties go to
/// the more severe, then the first seen), and its risk level is raised to
/// the most severe level reported for that allergen.
fn deduplicate(raw: Vec<AllergenDetection>) -> Vec<AllergenDetection> {
  let mut groups: BTreeMap<AllergenId, (AllergenDetection, RiskLevel)> =
    BTreeMap::new();

  for detection in raw {
    match groups.get_mut(&detection.allergen_id) {
      None => {
        let level = detection.risk_level;
        groups.insert(detection.allergen_id, (detection, level));
      }
      Some((kept, most_severe)) => {
        *most_severe = most_severe.most_severe(detection.risk_level);
        let better = detection.confidence > kept.confidence
          || (detection.confidence == kept.confidence
            && detection.risk_level > kept.risk_level);
        if better {
          *kept = detection;
        }
      }
    }
  }

  groups
    .into_values()
    .map(|(mut kept, most_severe)| {
      if most_severe > kept.risk_level {
        kept.explanation = format!(
          "{}; raised to {most_severe} by another detection",
          kept.explanation
        );
        kept.risk_level = most_severe;
      }
      kept
    })
    .collect()
}

fn confidence_level(result: &NormalizationResult) -> ConfidenceLevel {
  let mut confidence = result.overall_confidence;
  if !result.unmatched.is_empty() {
    confidence *= UNMATCHED_PENALTY;
  }
  if !result.risk_phrases.is_empty() {
    confidence *= RISK_PHRASE_PENALTY;
  }
  if confidence >= HIGH_CONFIDENCE {
    ConfidenceLevel::High
  } else if confidence >= MEDIUM_CONFIDENCE {
    ConfidenceLevel::Medium
  } else {
    ConfidenceLevel::Low
  }
}
