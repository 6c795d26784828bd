//! Decision engine scenarios and properties.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use larder_core::{
  OntologySnapshot,
  conflict::{ConflictResolution, ConflictType},
  ontology::AllergenId,
  profile::AllergenProfile,
  risk::RiskLevel,
  source::{SourceMetadata, SourceType},
};
use larder_expiry::{ExpirySource, ExpiryStatus};
use proptest::prelude::*;
use strum::IntoEnumIterator;

use crate::{
  AllergenInput, AnalyzeRequest, DecisionInput, IngredientInput, SafeBlocker,
  analyze, decide,
};

const PEANUT: AllergenId = AllergenId(1);
const MILK: AllergenId = AllergenId(3);

fn now() -> DateTime<Utc> { Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap() }

fn today() -> NaiveDate { now().date_naive() }

fn seed() -> OntologySnapshot {
  OntologySnapshot::from_json(include_str!("../../../ontology/seed.json"))
    .expect("seed ontology builds")
}

fn meta(source_type: SourceType, confidence: f64) -> SourceMetadata {
  SourceMetadata::new(source_type, confidence, now())
}

fn allergen(
  id: AllergenId,
  code: &str,
  risk_level: RiskLevel,
  source: SourceMetadata,
) -> AllergenInput {
  AllergenInput {
    allergen_id: id,
    allergen_code: code.to_string(),
    risk_level,
    source,
    source_ingredient: None,
    explanation: format!("{code} reported"),
  }
}

fn ingredients(source: SourceMetadata, names: &[&str]) -> IngredientInput {
  IngredientInput {
    source,
    ingredients: names.iter().map(|n| n.to_string()).collect(),
    unknown_ingredients: Vec::new(),
    confidence: 1.0,
    reported_allergens: Some(BTreeSet::new()),
  }
}

/// A fully trusted product with no profile allergens and a good date.
fn clean_input() -> DecisionInput {
  DecisionInput {
    product_ref: Some("5000000000001".to_string()),
    profile: AllergenProfile::new([PEANUT]),
    ingredient_inputs: vec![ingredients(
      meta(SourceType::BarcodeDatabase, 0.98),
      &["sugar", "salt", "rice"],
    )],
    expiry_inputs: vec![ExpirySource::expiry(
      meta(SourceType::BarcodeDatabase, 0.95),
      today() + Duration::days(30),
    )],
    evaluated_at: Some(now()),
    ..Default::default()
  }
}

// ─── Scenarios ───────────────────────────────────────────────────────────────

#[test]
fn derivative_from_trusted_source_is_definite_without_review() {
  let snapshot = seed();
  let out = analyze(
    &AnalyzeRequest {
      product_ref:    None,
      text:           "Ingredients: groundnut oil".to_string(),
      source:         meta(SourceType::BarcodeDatabase, 0.98),
      profile:        AllergenProfile::new([PEANUT]),
      expiry_sources: vec![ExpirySource::expiry(
        meta(SourceType::BarcodeDatabase, 0.95),
        today() + Duration::days(30),
      )],
      evaluated_at:   Some(now()),
    },
    &snapshot,
  );

  assert!(out.allergen_facts.has_definite_allergen);
  assert_eq!(out.allergen_facts.allergens[0].risk_level, RiskLevel::Derived);
  assert!(!out.can_confirm_safe);
  assert_eq!(out.safe_blocker, Some(SafeBlocker::DefiniteAllergen));
  assert!(!out.requires_manual_review, "{:?}", out.review_reasons);
  assert_eq!(out.expiry_facts.status, ExpiryStatus::Valid);
  assert_eq!(
    out.audit.snapshot_fingerprint.as_deref(),
    Some(snapshot.fingerprint())
  );
}

#[test]
fn weak_ocr_with_unknown_tokens_needs_review() {
  let out = decide(&DecisionInput {
    profile: AllergenProfile::new([MILK]),
    ingredient_inputs: vec![IngredientInput {
      source:              meta(SourceType::OcrMedium, 0.6),
      ingredients:         vec!["sugar".to_string()],
      unknown_ingredients: vec!["xzq powder".to_string(), "e4l1".to_string()],
      confidence:          0.33,
      reported_allergens:  None,
    }],
    evaluated_at: Some(now()),
    ..Default::default()
  });

  assert!(!out.can_confirm_safe);
  assert!(out.requires_manual_review);
  assert!(
    out
      .review_reasons
      .contains(&"2 ingredient(s) not recognized: xzq powder, e4l1".to_string())
  );
  assert!(
    out
      .review_reasons
      .iter()
      .any(|r| r.starts_with("no allergens detected, but ingredient data authority 40"))
  );
  assert_eq!(out.primary_authority, 40);
}

#[test]
fn lower_authority_detection_survives_higher_authority_silence() {
  let snapshot = seed();
  let profile = AllergenProfile::new([MILK]);
  let ocr = meta(SourceType::OcrHigh, 0.9);

  let normalized = larder_ingredients::normalize("sugar, whey protein", &snapshot);
  let detection =
    larder_ingredients::detect_allergens(&normalized, &profile, &snapshot);

  let out = decide(&DecisionInput {
    profile,
    allergen_inputs: AllergenInput::from_detections(&detection, &ocr),
    ingredient_inputs: vec![
      ingredients(meta(SourceType::BarcodeDatabase, 0.95), &[
        "sugar",
        "cocoa butter",
      ]),
      IngredientInput::from_normalization(&normalized, ocr),
    ],
    evaluated_at: Some(now()),
    ..Default::default()
  });

  assert!(out.allergen_facts.has_definite_allergen);
  assert_eq!(out.allergen_facts.allergens[0].source_ingredients, vec![
    "whey protein"
  ]);
  let conflict = out
    .conflicts
    .iter()
    .find(|c| c.conflict_type == ConflictType::AllergenPresence)
    .expect("presence conflict recorded");
  assert_eq!(conflict.resolution, ConflictResolution::ManualRequired);
  assert_eq!(conflict.contributing_values[0].value, "ABSENT");
  assert!(out.has_unresolved_conflicts());
  assert!(out.requires_manual_review);
  assert!(!out.can_confirm_safe);
  assert_eq!(out.primary_data_source, Some(SourceType::BarcodeDatabase));
}

#[test]
fn trusted_clean_product_is_safe() {
  let out = decide(&clean_input());
  assert!(out.overall_confidence >= 0.9, "{}", out.overall_confidence);
  assert_eq!(out.expiry_facts.status, ExpiryStatus::Valid);
  assert!(!out.requires_manual_review, "{:?}", out.review_reasons);
  assert!(out.can_confirm_safe);
  assert_eq!(out.safe_blocker, None);
  assert_eq!(out.primary_authority, 100);
}

#[test]
fn expired_product_is_never_safe() {
  let mut input = clean_input();
  input.expiry_inputs = vec![ExpirySource::expiry(
    meta(SourceType::BarcodeDatabase, 0.95),
    today() - Duration::days(1),
  )];
  let out = decide(&input);
  assert_eq!(out.expiry_facts.status, ExpiryStatus::Expired);
  assert!(!out.can_confirm_safe);
  assert_eq!(out.safe_blocker, Some(SafeBlocker::Expired));
}

#[test]
fn inferred_expiry_blocks_safe() {
  let mut input = clean_input();
  input.expiry_inputs = vec![ExpirySource::manufactured(
    meta(SourceType::ManufacturerQr, 1.0),
    today() - Duration::days(5),
  )];
  let out = decide(&input);
  assert!(out.expiry_facts.is_inferred);
  assert!(!out.expiry_facts.can_contribute_to_safe);
  assert!(out.expiry_facts.requires_verification);
  assert!(
    out
      .review_reasons
      .iter()
      .any(|r| r.starts_with("expiry needs verification"))
  );
  assert!(!out.can_confirm_safe);
}

// ─── Aggregation ─────────────────────────────────────────────────────────────

#[test]
fn most_severe_level_wins_over_authority() {
  let out = decide(&DecisionInput {
    profile: AllergenProfile::new([MILK]),
    allergen_inputs: vec![
      allergen(MILK, "MILK", RiskLevel::Trace, meta(SourceType::BarcodeDatabase, 0.99)),
      allergen(MILK, "MILK", RiskLevel::Definite, meta(SourceType::OcrLow, 0.5)),
    ],
    ..Default::default()
  });

  let milk = &out.allergen_facts.allergens[0];
  assert_eq!(milk.risk_level, RiskLevel::Definite);
  assert_eq!(milk.primary_source, SourceType::BarcodeDatabase);
  assert_eq!(milk.sources, vec![SourceType::BarcodeDatabase, SourceType::OcrLow]);
  assert!(milk.explanation.ends_with("raised to DEFINITE by OCR_LOW"));

  let conflict = &out.conflicts[0];
  assert_eq!(conflict.conflict_type, ConflictType::RiskLevelMismatch);
  assert_eq!(conflict.resolution, ConflictResolution::AutoResolved);
  assert_eq!(conflict.resolved_value.as_deref(), Some("DEFINITE"));
  assert!(!out.has_unresolved_conflicts());
}

#[test]
fn allergens_outside_profile_are_counted_not_used() {
  let out = decide(&DecisionInput {
    profile: AllergenProfile::new([MILK]),
    allergen_inputs: vec![allergen(
      PEANUT,
      "PEANUT",
      RiskLevel::Definite,
      meta(SourceType::BarcodeDatabase, 1.0),
    )],
    ..Default::default()
  });
  assert!(out.allergen_facts.allergens.is_empty());
  assert!(!out.allergen_facts.has_definite_allergen);
  assert_eq!(out.audit.ignored_allergen_inputs, 1);
  assert_eq!(out.audit.allergen_input_count, 1);
}

#[test]
fn ingredient_count_gap_over_five_needs_a_human() {
  let mut input = clean_input();
  input.ingredient_inputs.push(IngredientInput {
    reported_allergens: None,
    ..ingredients(meta(SourceType::OcrLow, 0.4), &[
      "a", "b", "c", "d", "e", "f", "g", "h", "i",
    ])
  });
  let out = decide(&input);
  let conflict = &out.conflicts[0];
  assert_eq!(conflict.conflict_type, ConflictType::IngredientCountMismatch);
  assert_eq!(conflict.resolution, ConflictResolution::ManualRequired);
  assert_eq!(conflict.resolved_value.as_deref(), Some("3"));
  assert!(!out.can_confirm_safe);

  // Exactly five apart is tolerated.
  input.ingredient_inputs[1].ingredients.truncate(8);
  assert!(decide(&input).conflicts.is_empty());
}

// ─── Review and confidence ───────────────────────────────────────────────────

#[test]
fn no_ingredient_data_with_profile_needs_review() {
  let out = decide(&DecisionInput {
    profile: AllergenProfile::new([PEANUT, MILK]),
    ..Default::default()
  });
  assert!(
    out
      .review_reasons
      .contains(&"no ingredient data to check against 2 profile allergen(s)".to_string())
  );
  assert_eq!(out.primary_data_source, None);
  assert_eq!(out.overall_confidence, 0.0);
  assert!(!out.can_confirm_safe);
}

#[test]
fn possible_without_definite_needs_review() {
  let mut input = clean_input();
  input.allergen_inputs = vec![allergen(
    PEANUT,
    "PEANUT",
    RiskLevel::Possible,
    meta(SourceType::BarcodeDatabase, 0.95),
  )];
  let out = decide(&input);
  assert!(out.allergen_facts.has_possible_allergen);
  assert!(out.review_reasons.contains(
    &"possible or trace allergen present without a definite one".to_string()
  ));
  assert_eq!(out.safe_blocker, Some(SafeBlocker::PossibleAllergen));
}

#[test]
fn missing_expiry_needs_verification() {
  let mut input = clean_input();
  input.expiry_inputs.clear();
  let out = decide(&input);
  assert!(!out.expiry_facts.has_expiry_data);
  assert!(out.expiry_facts.requires_verification);
  assert_eq!(out.expiry_facts.status, ExpiryStatus::Unknown);
  assert!(out.requires_manual_review);
  assert_eq!(out.review_reasons, vec![
    "expiry needs verification: no expiry data supplied".to_string()
  ]);
  assert!(!out.can_confirm_safe);
  assert_eq!(out.safe_blocker, Some(SafeBlocker::ManualReview));
  // Absent data leaves the confidence alone; review is what blocks safe.
  assert!((out.overall_confidence - 0.98).abs() < 1e-9);
}

#[test]
fn confidence_formula() {
  let out = decide(&DecisionInput {
    ingredient_inputs: vec![IngredientInput {
      source:              meta(SourceType::BarcodeDatabase, 1.0),
      ingredients:         vec!["sugar".to_string()],
      unknown_ingredients: vec!["mystery".to_string()],
      confidence:          0.0,
      reported_allergens:  None,
    }],
    ..Default::default()
  });
  // 1.0 (authority) × 0.5 (unknown ingredient confidence) × 0.7 (unknown tokens)
  assert!((out.overall_confidence - 0.35).abs() < 1e-9);
  assert!(
    out
      .review_reasons
      .contains(&"overall confidence 0.35 is below 0.60".to_string())
  );
}

#[test]
fn every_reason_is_kept() {
  let out = decide(&DecisionInput {
    profile: AllergenProfile::new([MILK]),
    allergen_inputs: vec![allergen(MILK, "MILK", RiskLevel::Trace, meta(SourceType::OcrLow, 0.5))],
    ingredient_inputs: vec![IngredientInput {
      source:              meta(SourceType::OcrLow, 0.5),
      ingredients:         Vec::new(),
      unknown_ingredients: vec!["smudge".to_string()],
      confidence:          0.2,
      reported_allergens:  None,
    }],
    expiry_inputs: vec![ExpirySource::expiry(meta(SourceType::OcrLow, 0.5), today())],
    evaluated_at: Some(now()),
    ..Default::default()
  });
  // Unknown tokens, low confidence, possible-only, expiry verification.
  assert_eq!(out.review_reasons.len(), 4, "{:?}", out.review_reasons);
}

#[test]
fn audit_envelope() {
  let input = DecisionInput {
    snapshot_fingerprint: Some("abc123".to_string()),
    ..clean_input()
  };
  let a = decide(&input);
  let b = decide(&input);
  assert_ne!(a.audit.decision_id, b.audit.decision_id);
  assert_eq!(a.audit.evaluated_at, now());
  assert_eq!(a.audit.ingredient_input_count, 1);
  assert_eq!(a.audit.expiry_input_count, 1);
  assert_eq!(a.audit.snapshot_fingerprint.as_deref(), Some("abc123"));
  assert_eq!(a.data_sources, vec![SourceType::BarcodeDatabase]);
}

#[test]
fn wire_format() {
  let input: DecisionInput = serde_json::from_value(serde_json::json!({
    "profile": { "allergen_ids": [1] },
    "allergen_inputs": [{
      "allergen_id": 1,
      "allergen_code": "PEANUT",
      "risk_level": "DERIVED",
      "source": {
        "source_type": "BARCODE_DATABASE",
        "confidence": 0.98,
        "timestamp": "2024-06-01T12:00:00Z"
      }
    }]
  }))
  .unwrap();
  let json = serde_json::to_value(decide(&input)).unwrap();
  assert_eq!(json["can_confirm_safe"], false);
  assert_eq!(json["safe_blocker"], "DEFINITE_ALLERGEN");
  assert_eq!(json["allergen_facts"]["allergens"][0]["risk_level"], "DERIVED");
}

// ─── Properties ──────────────────────────────────────────────────────────────

fn source_metadata() -> impl Strategy<Value = SourceMetadata> {
  (
    prop::sample::select(SourceType::iter().collect::<Vec<_>>()),
    0.0..=1.0f64,
  )
    .prop_map(|(source_type, confidence)| meta(source_type, confidence))
}

fn allergen_input() -> impl Strategy<Value = AllergenInput> {
  (
    1u32..=6,
    prop::sample::select(RiskLevel::iter().collect::<Vec<_>>()),
    source_metadata(),
  )
    .prop_map(|(id, level, source)| {
      allergen(AllergenId(id), &format!("A{id}"), level, source)
    })
}

fn ingredient_input() -> impl Strategy<Value = IngredientInput> {
  (
    source_metadata(),
    0.0..=1.0f64,
    0usize..12,
    0usize..3,
    prop::option::of(prop::collection::btree_set(1u32..=6, 0..4)),
  )
    .prop_map(|(source, confidence, known, unknown, reported)| IngredientInput {
      source,
      ingredients: (0..known).map(|i| format!("ingredient {i}")).collect(),
      unknown_ingredients: (0..unknown).map(|i| format!("mystery {i}")).collect(),
      confidence,
      reported_allergens: reported.map(|ids| ids.into_iter().map(AllergenId).collect()),
    })
}

fn expiry_input() -> impl Strategy<Value = ExpirySource> {
  (source_metadata(), -10i64..40, any::<bool>(), any::<bool>()).prop_map(
    |(source, offset, dated, is_calculated)| ExpirySource {
      source,
      expiry_date: dated.then(|| today() + Duration::days(offset)),
      manufacturing_date: Some(today() - Duration::days(offset.abs())),
      is_calculated,
    },
  )
}

fn decision_input() -> impl Strategy<Value = DecisionInput> {
  (
    prop::collection::btree_set(1u32..=5, 0..4),
    prop::collection::vec(allergen_input(), 0..6),
    prop::collection::vec(expiry_input(), 0..3),
    prop::collection::vec(ingredient_input(), 0..3),
  )
    .prop_map(|(profile, allergen_inputs, expiry_inputs, ingredient_inputs)| {
      DecisionInput {
        profile: AllergenProfile::new(profile.into_iter().map(AllergenId)),
        allergen_inputs,
        expiry_inputs,
        ingredient_inputs,
        evaluated_at: Some(now()),
        ..Default::default()
      }
    })
}

proptest! {
  #[test]
  fn never_false_safe(input in decision_input()) {
    let out = decide(&input);
    let every_clause_holds = !out.allergen_facts.has_definite_allergen
      && !out.allergen_facts.has_possible_allergen
      && !out.requires_manual_review
      && out.overall_confidence >= 0.7
      && out.primary_authority >= 60
      && !out.ingredient_facts.has_unknown_ingredients
      && !out.has_unresolved_conflicts()
      && out.expiry_facts.status != ExpiryStatus::Expired;
    prop_assert_eq!(out.can_confirm_safe, every_clause_holds);
    prop_assert_eq!(out.can_confirm_safe, out.safe_blocker.is_none());

    let any_profile_allergen_reported = input
      .allergen_inputs
      .iter()
      .any(|a| input.profile.contains(a.allergen_id));
    if any_profile_allergen_reported || input.expiry_inputs.is_empty() {
      prop_assert!(!out.can_confirm_safe);
    }
  }

  #[test]
  fn aggregated_level_is_most_severe(input in decision_input()) {
    let out = decide(&input);
    for aggregated in &out.allergen_facts.allergens {
      let most_severe = input
        .allergen_inputs
        .iter()
        .filter(|a| a.allergen_id == aggregated.allergen_id)
        .map(|a| a.risk_level)
        .max();
      prop_assert_eq!(Some(aggregated.risk_level), most_severe);
    }
  }

  #[test]
  fn confidence_stays_in_unit_range(input in decision_input()) {
    let out = decide(&input);
    prop_assert!((0.0..=1.0).contains(&out.overall_confidence));
  }
}
