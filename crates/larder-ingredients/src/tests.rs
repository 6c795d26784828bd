//! Normalizer and matcher tests against the seed ontology.

use larder_core::{
  OntologySnapshot,
  ontology::IngredientId,
  profile::AllergenProfile,
  risk::RiskLevel,
};

use crate::{
  ConfidenceLevel, DetectionSource, MatchMethod, detect_allergens, normalize,
};

fn seed() -> OntologySnapshot {
  OntologySnapshot::from_json(include_str!("../../../ontology/seed.json"))
    .expect("seed ontology builds")
}

fn profile(snapshot: &OntologySnapshot, codes: &[&str]) -> AllergenProfile {
  AllergenProfile::new(
    codes
      .iter()
      .map(|code| snapshot.allergen_by_code(code).unwrap().allergen_id),
  )
}

fn approx(a: f64, b: f64) -> bool { (a - b).abs() < 1e-9 }

// ─── Match ladder ────────────────────────────────────────────────────────────

#[test]
fn exact_name_match() {
  let s = seed();
  let result = normalize("Groundnut Oil", &s);
  let m = &result.matched[0];
  assert_eq!(m.match_method, MatchMethod::Exact);
  assert!(approx(m.confidence, 1.0));
  assert_eq!(m.ingredient_id, Some(IngredientId(2)));
  assert!(m.is_derivative);
  assert_eq!(m.original, "Groundnut Oil");
}

#[test]
fn parenthetical_suffix_is_stripped() {
  let s = seed();
  let result = normalize("wheat flour (niacin)", &s);
  let m = &result.matched[0];
  assert_eq!(m.match_method, MatchMethod::Synonym);
  assert!(approx(m.confidence, 0.95));
  assert_eq!(m.canonical_name.as_deref(), Some("wheat flour"));
}

#[test]
fn leading_qualifier_is_stripped() {
  let s = seed();
  let result = normalize("organic whole milk", &s);
  let m = &result.matched[0];
  assert_eq!(m.match_method, MatchMethod::Synonym);
  assert!(approx(m.confidence, 0.9));
  assert_eq!(m.canonical_name.as_deref(), Some("milk"));
}

#[test]
fn leading_phrase_compound_match() {
  let s = seed();
  let result = normalize("whey protein concentrate blend", &s);
  let m = &result.matched[0];
  assert_eq!(m.match_method, MatchMethod::Compound);
  assert!(approx(m.confidence, 0.85));
  assert_eq!(m.ingredient_id, Some(IngredientId(5)));
}

#[test]
fn single_word_compound_match() {
  let s = seed();
  let result = normalize("roasted peanuts pieces", &s);
  let m = &result.matched[0];
  assert_eq!(m.match_method, MatchMethod::Compound);
  assert!(approx(m.confidence, 0.75));
  assert_eq!(m.canonical_name.as_deref(), Some("peanut"));
}

#[test]
fn label_after_a_sentence_break_is_not_part_of_the_token() {
  let s = seed();
  let result = normalize("Ingredients: sugar, salt. Contains: milk", &s);
  let last = &result.matched[2];
  assert_eq!(last.normalized, "milk");
  assert_eq!(last.match_method, MatchMethod::Exact);
  assert!(approx(last.confidence, 1.0));
}

#[test]
fn short_words_are_not_matched_alone() {
  let s = seed();
  let result = normalize("soy sauce", &s);
  assert!(result.matched.is_empty());
  assert_eq!(result.unmatched, vec!["soy sauce"]);
}

#[test]
fn no_substring_guessing() {
  let s = seed();
  for text in ["pineapple", "pineapple chunks", "crabapple", "applesauce"] {
    let result = normalize(text, &s);
    assert!(result.matched.is_empty(), "{text} matched {:?}", result.matched);
    assert_eq!(result.unmatched.len(), 1);
  }
  assert_eq!(normalize("apple", &s).matched.len(), 1);
}

#[test]
fn compound_ingredient_inherits_contained_allergens() {
  let s = seed();
  let milk = s.allergen_by_code("MILK").unwrap().allergen_id;
  let result = normalize("whey protein concentrate", &s);
  assert_eq!(result.matched[0].allergen_ids, vec![milk]);
}

#[test]
fn parenthetical_qualifier_keeps_its_allergens() {
  let s = seed();
  let peanut = s.allergen_by_code("PEANUT").unwrap().allergen_id;
  let result = normalize("sunflower oil (peanut)", &s);
  let m = &result.matched[0];
  assert_eq!(m.canonical_name.as_deref(), Some("sunflower oil"));
  assert_eq!(m.allergen_ids, vec![peanut]);
}

// ─── Result aggregates ───────────────────────────────────────────────────────

#[test]
fn unmatched_tokens_are_kept_verbatim() {
  let s = seed();
  let result = normalize("Sugar, Xanthan Gum, salt, milk", &s);
  assert_eq!(result.normalized.len(), 4);
  assert_eq!(result.unmatched, vec!["Xanthan Gum"]);
  assert!(approx(result.match_rate, 0.75));
  assert!(approx(result.overall_confidence, 0.75));
  assert!(result.requires_manual_review);
  assert_eq!(result.review_reasons, vec![
    "1 ingredient(s) not recognized: Xanthan Gum".to_string()
  ]);
}

#[test]
fn fully_matched_list_needs_no_review() {
  let s = seed();
  let result = normalize("Ingredients: water, sugar, sea salt, citric acid.", &s);
  assert_eq!(result.matched.len(), 4);
  assert!(approx(result.match_rate, 1.0));
  assert!(!result.requires_manual_review, "{:?}", result.review_reasons);
}

#[test]
fn low_confidence_is_a_review_reason() {
  let s = seed();
  let result = normalize("roasted peanuts pieces, cocoa butter blend", &s);
  // Two compound matches: 0.75 and 0.85, mean 0.8, match rate 1.0.
  assert!(approx(result.overall_confidence, 0.8));
  assert!(!result.requires_manual_review);

  let result = normalize("", &s);
  assert!(approx(result.overall_confidence, 0.0));
  assert!(result.requires_manual_review);
  assert!(result.review_reasons[0].starts_with("normalization confidence 0.00"));
}

#[test]
fn normalization_is_idempotent() {
  let s = seed();
  let text = "Ingredients: milk chocolate (sugar, cocoa butter, whole milk), \
              hazelnuts (13%), soy lecithin. May contain traces of peanuts.";
  assert_eq!(normalize(text, &s), normalize(text, &s));
}

// ─── Risk phrases ────────────────────────────────────────────────────────────

#[test]
fn longest_phrase_wins_and_offset_is_recorded() {
  let s = seed();
  let result = normalize("Sugar, milk. May contain traces of peanuts.", &s);
  assert_eq!(result.risk_phrases.len(), 1);
  let phrase = &result.risk_phrases[0];
  assert_eq!(phrase.phrase, "may contain traces of");
  assert_eq!(phrase.matched_text, "May contain traces of");
  assert_eq!(phrase.context, "May contain traces of peanuts");
  assert_eq!(phrase.offset, 13);
  assert_eq!(phrase.output_risk_level, RiskLevel::Trace);

  // The advisory sentence is not tokenized as ingredients.
  assert_eq!(result.normalized.len(), 2);
  assert!(result.requires_manual_review);
  assert!(
    result
      .review_reasons
      .contains(&"1 cross-contamination warning(s) detected".to_string())
  );
}

#[test]
fn phrase_spanning_a_line_break_is_found() {
  let s = seed();
  let result = normalize("oats\nProduced in a facility\nthat also processes", &s);
  assert_eq!(result.risk_phrases.len(), 1);
  assert_eq!(
    result.risk_phrases[0].phrase,
    "produced in a facility that also processes"
  );
  assert_eq!(result.risk_phrases[0].offset, 5);
}

#[test]
fn repeated_phrases_are_each_recorded() {
  let s = seed();
  let result = normalize("May contain milk. Salt. May contain milk.", &s);
  let offsets: Vec<usize> = result.risk_phrases.iter().map(|p| p.offset).collect();
  assert_eq!(offsets, vec![0, 24]);
  assert_eq!(result.unmatched.len(), 0);
  assert_eq!(result.matched.len(), 1);
}

#[test]
fn ingredients_after_a_phrase_in_the_same_list_are_kept() {
  let s = seed();
  let milk = profile(&s, &["MILK"]);

  let result =
    normalize("Ingredients: sugar, may contain traces of nuts, sodium caseinate", &s);
  let names: Vec<&str> =
    result.normalized.iter().map(|n| n.normalized.as_str()).collect();
  assert_eq!(names, vec!["sugar", "sodium caseinate"]);
  assert!(result.unmatched.is_empty());
  assert_eq!(result.risk_phrases.len(), 1);

  let detection = detect_allergens(&result, &milk, &s);
  assert_eq!(detection.detected.len(), 1);
  assert_eq!(detection.detected[0].risk_level, RiskLevel::Definite);
  assert_eq!(detection.detected[0].source, DetectionSource::Ingredient);

  let result = normalize(
    "Ingredients: sugar, may contain traces of nuts, sodium caseinate, whey powder",
    &s,
  );
  assert_eq!(result.matched.len(), 3);
  let detection = detect_allergens(&result, &milk, &s);
  assert_eq!(detection.detected[0].risk_level, RiskLevel::Definite);
  assert!(detection.trace.is_empty());
}

// ─── Matcher ─────────────────────────────────────────────────────────────────

#[test]
fn empty_profile_short_circuits() {
  let s = seed();
  let result = normalize("peanut, mystery powder. May contain nuts.", &s);
  let detection = detect_allergens(&result, &AllergenProfile::default(), &s);
  assert!(detection.detected.is_empty());
  assert!(!detection.safety_facts.has_unknown_ingredients);
  assert!(!detection.safety_facts.contains_definite_allergen);
  assert!(detection.unmatched_warning.is_none());
}

#[test]
fn derivative_is_detected_as_derived() {
  let s = seed();
  let result = normalize("groundnut oil", &s);
  let detection = detect_allergens(&result, &profile(&s, &["PEANUT"]), &s);
  assert_eq!(detection.definite.len(), 1);
  let d = &detection.definite[0];
  assert_eq!(d.risk_level, RiskLevel::Derived);
  assert_eq!(d.source, DetectionSource::Derivative);
  assert_eq!(d.allergen_code, "PEANUT");
  assert!(detection.flags.has_derived);
  assert!(!detection.flags.has_definite);
  assert!(detection.safety_facts.contains_definite_allergen);
  assert_eq!(detection.safety_facts.confidence_level, ConfidenceLevel::High);
}

#[test]
fn compound_match_is_tagged_compound() {
  let s = seed();
  let result = normalize("whey protein concentrate blend", &s);
  let detection = detect_allergens(&result, &profile(&s, &["MILK"]), &s);
  assert_eq!(detection.detected[0].source, DetectionSource::Compound);
  assert_eq!(detection.detected[0].risk_level, RiskLevel::Definite);
}

#[test]
fn allergens_outside_profile_are_ignored() {
  let s = seed();
  let result = normalize("milk, egg", &s);
  let detection = detect_allergens(&result, &profile(&s, &["EGG"]), &s);
  assert_eq!(detection.detected.len(), 1);
  assert_eq!(detection.detected[0].allergen_code, "EGG");
}

#[test]
fn specific_phrase_uses_its_own_level() {
  let s = seed();
  let result = normalize("rice. May contain peanuts.", &s);
  let detection = detect_allergens(&result, &profile(&s, &["PEANUT"]), &s);
  assert_eq!(detection.possible.len(), 1);
  let d = &detection.possible[0];
  assert_eq!(d.source, DetectionSource::RiskPhrase);
  assert!(approx(d.confidence, 0.95));
  assert!(detection.safety_facts.contains_possible_allergen);

  // The same warning says nothing about milk.
  let detection = detect_allergens(&result, &profile(&s, &["MILK"]), &s);
  assert!(detection.detected.is_empty());
}

#[test]
fn generic_phrase_with_inferable_allergen() {
  let s = seed();
  let result = normalize("rice. May contain traces of sesame.", &s);
  let detection =
    detect_allergens(&result, &profile(&s, &["SESAME", "MILK"]), &s);
  assert_eq!(detection.detected.len(), 1);
  let d = &detection.trace[0];
  assert_eq!(d.allergen_code, "SESAME");
  assert_eq!(d.source, DetectionSource::InferredRiskPhrase);
  assert!(approx(d.confidence, 0.9 * 0.9));
}

#[test]
fn unattributable_phrase_covers_every_profile_allergen() {
  let s = seed();
  let result = normalize("rice. May contain traces of other allergens.", &s);
  let user = profile(&s, &["MILK", "EGG", "MUSTARD"]);
  let detection = detect_allergens(&result, &user, &s);

  assert_eq!(detection.possible.len(), 3);
  for d in &detection.possible {
    assert_eq!(d.source, DetectionSource::GenericWarning);
    assert_eq!(d.risk_level, RiskLevel::Possible);
    assert!(approx(d.confidence, 0.9 * 0.7));
    assert!(user.contains(d.allergen_id));
  }
}

#[test]
fn dedup_keeps_highest_confidence() {
  let s = seed();
  let result = normalize("milk. May contain milk.", &s);
  let detection = detect_allergens(&result, &profile(&s, &["MILK"]), &s);
  assert_eq!(detection.detected.len(), 1);
  let d = &detection.detected[0];
  assert_eq!(d.source, DetectionSource::Ingredient);
  assert!(approx(d.confidence, 1.0));
  assert_eq!(d.risk_level, RiskLevel::Definite);
}

#[test]
fn dedup_never_lowers_severity() {
  let s = seed();
  // Compound word match at 0.75 (Definite) vs specific phrase at 0.95
  // (Possible): the phrase entry wins on confidence but keeps Definite.
  let result = normalize("roasted peanuts pieces. May contain peanuts.", &s);
  let detection = detect_allergens(&result, &profile(&s, &["PEANUT"]), &s);
  assert_eq!(detection.detected.len(), 1);
  let d = &detection.detected[0];
  assert_eq!(d.source, DetectionSource::RiskPhrase);
  assert!(approx(d.confidence, 0.95));
  assert_eq!(d.risk_level, RiskLevel::Definite);
  assert!(detection.possible.is_empty());
  assert!(detection.flags.has_definite);
}

#[test]
fn unknown_ingredients_lower_confidence_level() {
  let s = seed();
  let result = normalize("milk, xanthan gum", &s);
  let detection = detect_allergens(&result, &profile(&s, &["EGG"]), &s);
  assert!(detection.detected.is_empty());
  assert!(detection.safety_facts.has_unknown_ingredients);
  assert_eq!(detection.safety_facts.confidence_level, ConfidenceLevel::Low);
  assert_eq!(
    detection.unmatched_warning.as_deref(),
    Some("1 ingredient(s) not recognized: xanthan gum")
  );
}

#[test]
fn risk_phrase_penalty_gives_medium() {
  let s = seed();
  // mean(1.0, 0.75) = 0.875, then × 0.8 for the warning.
  let result = normalize("milk, roasted peanuts pieces. May contain milk.", &s);
  let detection = detect_allergens(&result, &profile(&s, &["EGG"]), &s);
  assert_eq!(detection.safety_facts.confidence_level, ConfidenceLevel::Medium);
}

#[test]
fn detection_result_serializes() {
  let s = seed();
  let result = normalize("groundnut oil", &s);
  let detection = detect_allergens(&result, &profile(&s, &["PEANUT"]), &s);
  let json = serde_json::to_value(&detection).unwrap();
  assert_eq!(json["detected"][0]["risk_level"], "DERIVED");
  assert_eq!(json["detected"][0]["source"], "DERIVATIVE");
  assert_eq!(json["safety_facts"]["confidence_level"], "HIGH");
}
