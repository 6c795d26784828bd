//! Allergen and ingredient aggregation across sources.

use std::collections::BTreeMap;

use larder_core::{
  conflict::{ConflictResolution, ConflictType, ConflictValue, DataConflict},
  ontology::AllergenId,
  profile::AllergenProfile,
  risk::RiskLevel,
  source::{SourceMetadata, SourceType, clamp_unit},
};

use crate::{
  AggregatedAllergen, AllergenFacts, AllergenInput, IngredientFacts,
  IngredientInput,
};

/// Ingredient sources this far apart in count cannot be reconciled silently.
const MAX_INGREDIENT_COUNT_GAP: usize = 5;

// ─── Allergens ───────────────────────────────────────────────────────────────

pub(crate) struct AllergenAggregation {
  pub facts:     AllergenFacts,
  pub conflicts: Vec<DataConflict>,
  /// Inputs for allergens outside the profile.
  pub ignored:   usize,
}

pub(crate) fn allergens(
  inputs: &[AllergenInput],
  profile: &AllergenProfile,
  ingredient_inputs: &[IngredientInput],
) -> AllergenAggregation {
  let mut groups: BTreeMap<AllergenId, Vec<&AllergenInput>> = BTreeMap::new();
  let mut ignored = 0;
  for input in inputs {
    if profile.contains(input.allergen_id) {
      groups.entry(input.allergen_id).or_default().push(input);
    } else {
      ignored += 1;
    }
  }

  let mut conflicts = Vec::new();
  let mut allergens = Vec::with_capacity(groups.len());
  for group in groups.values() {
    let aggregated = merge_group(group);
    if let Some(conflict) = level_conflict(group, &aggregated) {
      conflicts.push(conflict);
    }
    conflicts.extend(presence_conflicts(group, &aggregated, ingredient_inputs));
    allergens.push(aggregated);
  }

  let facts = AllergenFacts {
    has_definite_allergen: allergens.iter().any(|a| a.risk_level.is_definite()),
    has_possible_allergen: allergens.iter().any(|a| {
      matches!(a.risk_level, RiskLevel::Possible | RiskLevel::Trace)
    }),
    allergens,
  };
  AllergenAggregation {
    facts,
    conflicts,
    ignored,
  }
}

/// Identity from the highest authority score, severity from the most severe
/// report.
fn merge_group(group: &[&AllergenInput]) -> AggregatedAllergen {
  let primary = group
    .iter()
    .copied()
    .reduce(|best, next| {
      let score = next.source.authority_score();
      let best_score = best.source.authority_score();
      if score > best_score
        || (score == best_score && next.risk_level > best.risk_level)
      {
        next
      } else {
        best
      }
    })
    .unwrap_or(group[0]);

  let most_severe = group
    .iter()
    .map(|i| i.risk_level)
    .max()
    .unwrap_or(primary.risk_level);

  let mut explanation = primary.explanation.clone();
  if most_severe > primary.risk_level
    && let Some(severe) = group.iter().find(|i| i.risk_level == most_severe)
  {
    explanation = format!(
      "{explanation}; raised to {most_severe} by {}",
      severe.source.source_type
    );
  }

  let mut sources: Vec<SourceType> = group.iter().map(|i| i.source.source_type).collect();
  sources.sort_by_key(|s| std::cmp::Reverse(s.authority()));
  sources.dedup();

  let mut source_ingredients: Vec<String> = Vec::new();
  for name in group.iter().filter_map(|i| i.source_ingredient.as_ref()) {
    if !source_ingredients.contains(name) {
      source_ingredients.push(name.clone());
    }
  }

  AggregatedAllergen {
    allergen_id: primary.allergen_id,
    allergen_code: primary.allergen_code.clone(),
    risk_level: most_severe,
    primary_source: primary.source.source_type,
    authority_score: primary.source.authority_score(),
    sources,
    source_ingredients,
    explanation,
  }
}

fn level_conflict(
  group: &[&AllergenInput],
  aggregated: &AggregatedAllergen,
) -> Option<DataConflict> {
  let first = group.first()?.risk_level;
  if group.iter().all(|i| i.risk_level == first) {
    return None;
  }
  Some(DataConflict {
    field:               format!("allergen.{}.risk_level", aggregated.allergen_code),
    conflict_type:       ConflictType::RiskLevelMismatch,
    contributing_values: group
      .iter()
      .map(|i| ConflictValue {
        source_type: i.source.source_type,
        value:       i.risk_level.to_string(),
        confidence:  i.source.confidence(),
      })
      .collect(),
    resolution:          ConflictResolution::AutoResolved,
    resolved_value:      Some(aggregated.risk_level.to_string()),
    reason:              format!(
      "sources disagree on {}; keeping the most severe level {}",
      aggregated.allergen_code, aggregated.risk_level
    ),
  })
}

/// A source that declares its full allergen set, outranks a source that
/// detected this allergen, and does not list it. The allergen stays present;
/// a human has to settle which source is right.
fn presence_conflicts(
  group: &[&AllergenInput],
  aggregated: &AggregatedAllergen,
  ingredient_inputs: &[IngredientInput],
) -> Vec<DataConflict> {
  let mut conflicts = Vec::new();
  for silent in ingredient_inputs {
    let Some(reported) = &silent.reported_allergens else {
      continue;
    };
    if reported.contains(&aggregated.allergen_id) {
      continue;
    }
    let outranked: Vec<&&AllergenInput> = group
      .iter()
      .filter(|i| i.source.authority() < silent.source.authority())
      .collect();
    if outranked.is_empty() {
      continue;
    }

    let mut contributing_values = vec![absent(&silent.source)];
    contributing_values.extend(outranked.iter().map(|i| ConflictValue {
      source_type: i.source.source_type,
      value:       i.risk_level.to_string(),
      confidence:  i.source.confidence(),
    }));

    tracing::warn!(
      allergen = %aggregated.allergen_code,
      silent_source = %silent.source.source_type,
      detected_by = %outranked[0].source.source_type,
      "higher-authority source omits a detected allergen"
    );
    conflicts.push(DataConflict {
      field: format!("allergen.{}.presence", aggregated.allergen_code),
      conflict_type: ConflictType::AllergenPresence,
      contributing_values,
      resolution: ConflictResolution::ManualRequired,
      resolved_value: Some(aggregated.risk_level.to_string()),
      reason: format!(
        "{} does not list {} but {} detected it as {}; keeping it",
        silent.source.source_type,
        aggregated.allergen_code,
        outranked[0].source.source_type,
        outranked[0].risk_level
      ),
    });
  }
  conflicts
}

fn absent(source: &SourceMetadata) -> ConflictValue {
  ConflictValue {
    source_type: source.source_type,
    value:       "ABSENT".to_string(),
    confidence:  source.confidence(),
  }
}

// ─── Ingredients ─────────────────────────────────────────────────────────────

pub(crate) struct IngredientAggregation<'a> {
  pub facts:     IngredientFacts,
  pub primary:   Option<&'a IngredientInput>,
  pub conflicts: Vec<DataConflict>,
}

pub(crate) fn ingredients(inputs: &[IngredientInput]) -> IngredientAggregation<'_> {
  let primary = inputs.iter().reduce(|best, next| {
    let rank = (next.source.authority(), next.source.authority_score());
    let best_rank = (best.source.authority(), best.source.authority_score());
    if rank > best_rank { next } else { best }
  });

  let mut conflicts = Vec::new();
  if let Some(primary) = primary {
    for other in inputs.iter().filter(|i| !std::ptr::eq(*i, primary)) {
      let gap = primary.ingredient_count().abs_diff(other.ingredient_count());
      if gap <= MAX_INGREDIENT_COUNT_GAP {
        continue;
      }
      tracing::warn!(
        primary = %primary.source.source_type,
        other = %other.source.source_type,
        gap,
        "ingredient lists differ too much to reconcile"
      );
      conflicts.push(DataConflict {
        field:               "ingredient_count".to_string(),
        conflict_type:       ConflictType::IngredientCountMismatch,
        contributing_values: [primary, other]
          .iter()
          .map(|i| ConflictValue {
            source_type: i.source.source_type,
            value:       i.ingredient_count().to_string(),
            confidence:  i.source.confidence(),
          })
          .collect(),
        resolution:          ConflictResolution::ManualRequired,
        resolved_value:      Some(primary.ingredient_count().to_string()),
        reason:              format!(
          "{} lists {} ingredients and {} lists {}",
          primary.source.source_type,
          primary.ingredient_count(),
          other.source.source_type,
          other.ingredient_count()
        ),
      });
    }
  }

  let mut unknown_ingredients: Vec<String> = Vec::new();
  for token in inputs.iter().flat_map(|i| &i.unknown_ingredients) {
    if !unknown_ingredients.contains(token) {
      unknown_ingredients.push(token.clone());
    }
  }

  IngredientAggregation {
    facts: IngredientFacts {
      primary_source: primary.map(|p| p.source.source_type),
      ingredient_count: primary.map_or(0, IngredientInput::ingredient_count),
      has_unknown_ingredients: !unknown_ingredients.is_empty(),
      unknown_ingredients,
      confidence: primary.map_or(0.0, |p| clamp_unit(p.confidence)),
      source_count: inputs.len(),
    },
    primary,
    conflicts,
  }
}
