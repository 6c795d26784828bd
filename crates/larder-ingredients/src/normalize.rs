//! Ingredient normalization: tokens → canonical ingredients.
//!
//! Each token walks a fixed ladder of lookups against the synonym map and
//! stops at the first hit. Every rung is an exact key lookup; there is no
//! substring or fuzzy matching, because a silent guess could hide an
//! allergen. A token that reaches the bottom of the ladder is kept verbatim
//! in the unmatched list.

use larder_core::{
  OntologySnapshot,
  ontology::{AllergenId, normalize_text},
  snapshot::SynonymEntry,
};

use crate::{
  MatchMethod, NormalizationResult, NormalizedIngredient, phrases,
  tokenize::{Token, tokenize},
};

const EXACT_CONFIDENCE: f64 = 1.0;
const PARENTHETICAL_CONFIDENCE: f64 = 0.95;
const QUALIFIER_CONFIDENCE: f64 = 0.9;
const LEADING_PHRASE_CONFIDENCE: f64 = 0.85;
const SINGLE_WORD_CONFIDENCE: f64 = 0.75;

/// Below this, normalization output needs a human to check it.
pub const REVIEW_CONFIDENCE_THRESHOLD: f64 = 0.7;

/// Leading words that describe how an ingredient was grown or prepared.
const QUALIFIERS: &[&str] = &[
  "organic", "natural", "pure", "raw", "dried", "powdered", "fresh", "frozen",
];

/// Words of this many characters or fewer are never matched on their own.
const MIN_SINGLE_WORD_CHARS: usize = 3;

pub(crate) fn normalize(
  raw_text: &str,
  snapshot: &OntologySnapshot,
) -> NormalizationResult {
  // Advisory statements are scanned on the untouched text, then blanked out
  // so their words are not mistaken for listed ingredients.
  let hits = phrases::scan(raw_text, snapshot);
  let spans: Vec<(usize, usize)> = hits.iter().map(|h| h.span).collect();
  let ingredient_text = phrases::mask(raw_text, &spans);
  let risk_phrases: Vec<_> = hits.into_iter().map(|h| h.detected).collect();

  let normalized: Vec<NormalizedIngredient> = tokenize(&ingredient_text)
    .into_iter()
    .map(|token| match_token(token, snapshot))
    .collect();

  let matched: Vec<NormalizedIngredient> = normalized
    .iter()
    .filter(|n| n.is_matched())
    .cloned()
    .collect();
  let unmatched: Vec<String> = normalized
    .iter()
    .filter(|n| !n.is_matched())
    .map(|n| n.original.clone())
    .collect();

  let match_rate = if normalized.is_empty() {
    0.0
  } else {
    matched.len() as f64 / normalized.len() as f64
  };
  let overall_confidence = if matched.is_empty() {
    0.0
  } else {
    let mean =
      matched.iter().map(|m| m.confidence).sum::<f64>() / matched.len() as f64;
    mean * match_rate
  };

  let mut review_reasons = Vec::new();
  if !unmatched.is_empty() {
    review_reasons.push(unmatched_reason(&unmatched));
  }
  if overall_confidence < REVIEW_CONFIDENCE_THRESHOLD {
    review_reasons.push(format!(
      "normalization confidence {overall_confidence:.2} is below \
       {REVIEW_CONFIDENCE_THRESHOLD:.2}"
    ));
  }
  if !risk_phrases.is_empty() {
    review_reasons.push(format!(
      "{} cross-contamination warning(s) detected",
      risk_phrases.len()
    ));
  }

  tracing::debug!(
    tokens = normalized.len(),
    matched = matched.len(),
    risk_phrases = risk_phrases.len(),
    overall_confidence,
    "normalized ingredient text"
  );

  NormalizationResult {
    normalized,
    matched,
    unmatched,
    risk_phrases,
    match_rate,
    overall_confidence,
    requires_manual_review: !review_reasons.is_empty(),
    review_reasons,
  }
}

/// The review reason recorded when tokens could not be matched.
pub fn unmatched_reason(unmatched: &[String]) -> String {
  format!(
    "{} ingredient(s) not recognized: {}",
    unmatched.len(),
    unmatched.join(", ")
  )
}

// ─── Match ladder ────────────────────────────────────────────────────────────

fn match_token(token: Token, snapshot: &OntologySnapshot) -> NormalizedIngredient {
  let token_key = token.normalized.clone();
  match ladder(&token_key, snapshot) {
    Some((key, entry, method, confidence)) => {
      let ingredient = snapshot.ingredient(entry.ingredient_id);
      NormalizedIngredient {
        original: token.original,
        normalized: token.normalized,
        matched_key: Some(key),
        ingredient_id: Some(entry.ingredient_id),
        canonical_name: ingredient.map(|i| i.canonical_name.clone()),
        is_derivative: ingredient.is_some_and(|i| i.is_derivative),
        match_method: method,
        synonym_type: Some(entry.synonym_type),
        confidence,
        allergen_ids: allergen_ids(&token_key, entry, snapshot),
      }
    }
    None => NormalizedIngredient {
      original:       token.original,
      normalized:     token.normalized,
      matched_key:    None,
      ingredient_id:  None,
      canonical_name: None,
      is_derivative:  false,
      match_method:   MatchMethod::Unmatched,
      synonym_type:   None,
      confidence:     0.0,
      allergen_ids:   Vec::new(),
    },
  }
}

/// Allergens of the matched ingredient, plus those of a parenthetical
/// qualifier that is itself an exact ingredient name: "vegetable oil
/// (peanut)" must still carry PEANUT after the ladder matched on "vegetable
/// oil".
fn allergen_ids(
  token: &str,
  entry: &SynonymEntry,
  snapshot: &OntologySnapshot,
) -> Vec<AllergenId> {
  let mut ids = snapshot.allergens_for(entry.ingredient_id);
  if let Some(inner) = parenthetical_content(token)
    && let Some(qualifier) = snapshot.lookup_synonym(&inner)
  {
    ids.extend(snapshot.allergens_for(qualifier.ingredient_id));
    ids.sort();
    ids.dedup();
  }
  ids
}

fn parenthetical_content(token: &str) -> Option<String> {
  let open = token.find('(')?;
  let rest = &token[open + 1..];
  let inner = rest.find(')').map_or(rest, |close| &rest[..close]);
  let inner = normalize_text(inner);
  (!inner.is_empty()).then_some(inner)
}

type LadderHit<'a> = (String, &'a SynonymEntry, MatchMethod, f64);

fn ladder<'a>(token: &str, snapshot: &'a OntologySnapshot) -> Option<LadderHit<'a>> {
  let lookup = |key: String, method: MatchMethod, confidence: f64| {
    snapshot
      .lookup_synonym(&key)
      .map(|entry| (key, entry, method, confidence))
  };

  // 1. The whole token.
  if let Some(hit) = lookup(token.to_string(), MatchMethod::Exact, EXACT_CONFIDENCE)
  {
    return Some(hit);
  }

  // 2. Without a parenthetical suffix: "wheat flour (niacin, iron)".
  let base = strip_parenthetical(token);
  if base != token
    && !base.is_empty()
    && let Some(hit) =
      lookup(base.clone(), MatchMethod::Synonym, PARENTHETICAL_CONFIDENCE)
  {
    return Some(hit);
  }

  // 3. Without one leading qualifier: "organic whole milk".
  if let Some(rest) = strip_qualifier(&base)
    && let Some(hit) =
      lookup(rest.to_string(), MatchMethod::Synonym, QUALIFIER_CONFIDENCE)
  {
    return Some(hit);
  }

  // 4. Leading word sequences, longest first, then single long words.
  let words: Vec<&str> = base.split(' ').filter(|w| !w.is_empty()).collect();
  if words.len() > 1 {
    for len in (2..words.len()).rev() {
      if let Some(hit) = lookup(
        words[..len].join(" "),
        MatchMethod::Compound,
        LEADING_PHRASE_CONFIDENCE,
      ) {
        return Some(hit);
      }
    }
    for word in &words {
      if word.chars().count() > MIN_SINGLE_WORD_CHARS
        && let Some(hit) = lookup(
          word.to_string(),
          MatchMethod::Compound,
          SINGLE_WORD_CONFIDENCE,
        )
      {
        return Some(hit);
      }
    }
  }

  None
}

/// Drop everything from the first `(` onwards.
fn strip_parenthetical(token: &str) -> String {
  match token.find('(') {
    Some(i) => normalize_text(&token[..i]),
    None => token.to_string(),
  }
}

fn strip_qualifier(token: &str) -> Option<&str> {
  let (first, rest) = token.split_once(' ')?;
  QUALIFIERS
    .contains(&first)
    .then_some(rest.trim())
    .filter(|r| !r.is_empty())
}

impl NormalizedIngredient {
  pub fn is_matched(&self) -> bool { self.ingredient_id.is_some() }
}
