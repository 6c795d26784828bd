//! The immutable ontology snapshot.
//!
//! Built once from [`OntologyTables`] and then only read. Construction
//! validates every cross-table reference and fails fast on the first
//! inconsistency; a snapshot that exists is internally consistent.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{
  Error, Result,
  ontology::{
    AllergenCategory, AllergenId, CanonicalIngredient, IngredientAllergen,
    IngredientId, OntologyTables, RiskPhrase, SynonymType, normalize_text,
  },
};

/// A synonym-map entry. Canonical and display names share this table with
/// explicit synonyms, so "exact" and "synonym" hits take one lookup path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynonymEntry {
  pub ingredient_id: IngredientId,
  pub confidence:    f64,
  pub synonym_type:  SynonymType,
}

/// Row counts and fingerprint, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotStats {
  pub ingredients:          usize,
  pub synonyms:             usize,
  pub allergens:            usize,
  pub ingredient_allergens: usize,
  pub compounds:            usize,
  pub risk_phrases:         usize,
  pub fingerprint:          String,
}

#[derive(Debug, Clone)]
pub struct OntologySnapshot {
  ingredients:      BTreeMap<IngredientId, CanonicalIngredient>,
  synonyms:         HashMap<String, SynonymEntry>,
  direct_allergens: BTreeMap<IngredientId, Vec<IngredientAllergen>>,
  contains:         BTreeMap<IngredientId, Vec<IngredientId>>,
  allergens:        BTreeMap<AllergenId, AllergenCategory>,
  allergen_codes:   HashMap<String, AllergenId>,
  /// Normalized phrases, longest first.
  risk_phrases:     Vec<RiskPhrase>,
  mapping_count:    usize,
  compound_count:   usize,
  fingerprint:      String,
}

impl OntologySnapshot {
  /// Validate `tables` and build the lookup structure.
  pub fn build(tables: OntologyTables) -> Result<Self> {
    let fingerprint = fingerprint(&tables)?;
    let OntologyTables {
      ingredients,
      synonyms,
      allergens,
      ingredient_allergens,
      compounds,
      risk_phrases,
    } = tables;

    // ── Allergen categories ───────────────────────────────────────────────
    let mut allergen_map = BTreeMap::new();
    let mut allergen_codes = HashMap::new();
    for allergen in allergens {
      let code = allergen.code.trim().to_uppercase();
      if code.is_empty() {
        return Err(Error::EmptyText { table: "allergens" });
      }
      if allergen_codes.insert(code.clone(), allergen.allergen_id).is_some() {
        return Err(Error::DuplicateAllergenCode(code));
      }
      let id = allergen.allergen_id;
      if allergen_map
        .insert(id, AllergenCategory { code, ..allergen })
        .is_some()
      {
        return Err(Error::DuplicateAllergen(id));
      }
    }

    // ── Canonical ingredients ─────────────────────────────────────────────
    let mut ingredient_map = BTreeMap::new();
    for ingredient in ingredients {
      let id = ingredient.ingredient_id;
      if ingredient_map.insert(id, ingredient).is_some() {
        return Err(Error::DuplicateIngredient(id));
      }
    }
    for ingredient in ingredient_map.values() {
      if let Some(parent) = ingredient.parent_ingredient
        && !ingredient_map.contains_key(&parent)
      {
        return Err(Error::UnknownIngredient {
          table: "ingredients.parent_ingredient",
          id:    parent,
        });
      }
    }

    // ── Synonym lookup ────────────────────────────────────────────────────
    // Names first, so an explicit synonym row never downgrades the
    // confidence of a canonical or display name.
    let mut synonym_map: HashMap<String, SynonymEntry> = HashMap::new();
    for ingredient in ingredient_map.values() {
      for name in [&ingredient.canonical_name, &ingredient.display_name] {
        insert_synonym(&mut synonym_map, name, SynonymEntry {
          ingredient_id: ingredient.ingredient_id,
          confidence:    1.0,
          synonym_type:  SynonymType::Exact,
        })?;
      }
    }
    for row in synonyms {
      check_confidence("synonyms", row.confidence)?;
      if !ingredient_map.contains_key(&row.ingredient_id) {
        return Err(Error::UnknownIngredient {
          table: "synonyms",
          id:    row.ingredient_id,
        });
      }
      insert_synonym(&mut synonym_map, &row.synonym, SynonymEntry {
        ingredient_id: row.ingredient_id,
        confidence:    row.confidence,
        synonym_type:  row.synonym_type,
      })?;
    }

    // ── Ingredient → allergen ─────────────────────────────────────────────
    let mapping_count = ingredient_allergens.len();
    let mut direct_allergens: BTreeMap<IngredientId, Vec<IngredientAllergen>> =
      BTreeMap::new();
    for row in ingredient_allergens {
      check_confidence("ingredient_allergens", row.confidence)?;
      if !ingredient_map.contains_key(&row.ingredient_id) {
        return Err(Error::UnknownIngredient {
          table: "ingredient_allergens",
          id:    row.ingredient_id,
        });
      }
      if !allergen_map.contains_key(&row.allergen_id) {
        return Err(Error::UnknownAllergen {
          table: "ingredient_allergens",
          id:    row.allergen_id,
        });
      }
      direct_allergens.entry(row.ingredient_id).or_default().push(row);
    }

    // ── Compound expansion ────────────────────────────────────────────────
    let compound_count = compounds.len();
    let mut contains: BTreeMap<IngredientId, Vec<IngredientId>> =
      BTreeMap::new();
    for row in compounds {
      for id in [row.ingredient_id, row.contains_ingredient_id] {
        if !ingredient_map.contains_key(&id) {
          return Err(Error::UnknownIngredient {
            table: "compounds",
            id,
          });
        }
      }
      if row.ingredient_id == row.contains_ingredient_id {
        return Err(Error::SelfContainingCompound(row.ingredient_id));
      }
      let parts = contains.entry(row.ingredient_id).or_default();
      if !parts.contains(&row.contains_ingredient_id) {
        parts.push(row.contains_ingredient_id);
      }
    }

    // ── Risk phrases ──────────────────────────────────────────────────────
    let mut phrase_ids = BTreeSet::new();
    let mut ordered_phrases = Vec::with_capacity(risk_phrases.len());
    for phrase in risk_phrases {
      check_confidence("risk_phrases", phrase.confidence)?;
      if !phrase_ids.insert(phrase.phrase_id) {
        return Err(Error::DuplicateRiskPhrase(phrase.phrase_id));
      }
      if let Some(allergen_id) = phrase.allergen_id
        && !allergen_map.contains_key(&allergen_id)
      {
        return Err(Error::UnknownAllergen {
          table: "risk_phrases",
          id:    allergen_id,
        });
      }
      let normalized = normalize_text(&phrase.phrase);
      if normalized.is_empty() {
        return Err(Error::EmptyText {
          table: "risk_phrases",
        });
      }
      ordered_phrases.push(RiskPhrase {
        phrase: normalized,
        ..phrase
      });
    }
    ordered_phrases.sort_by(|a, b| {
      b.phrase
        .chars()
        .count()
        .cmp(&a.phrase.chars().count())
        .then_with(|| a.phrase.cmp(&b.phrase))
        .then_with(|| a.phrase_id.cmp(&b.phrase_id))
    });

    Ok(Self {
      ingredients: ingredient_map,
      synonyms: synonym_map,
      direct_allergens,
      contains,
      allergens: allergen_map,
      allergen_codes,
      risk_phrases: ordered_phrases,
      mapping_count,
      compound_count,
      fingerprint,
    })
  }

  /// Build from a JSON export of the tables.
  pub fn from_json(input: &str) -> Result<Self> {
    Self::build(OntologyTables::from_json(input)?)
  }

  // ── Lookups ───────────────────────────────────────────────────────────────

  pub fn ingredient(&self, id: IngredientId) -> Option<&CanonicalIngredient> {
    self.ingredients.get(&id)
  }

  /// Look up an already-normalized text variant. No partial matching.
  pub fn lookup_synonym(&self, normalized: &str) -> Option<&SynonymEntry> {
    self.synonyms.get(normalized)
  }

  /// The ingredient's own allergen associations.
  pub fn direct_allergens(&self, id: IngredientId) -> &[IngredientAllergen] {
    self.direct_allergens.get(&id).map(Vec::as_slice).unwrap_or(&[])
  }

  /// Ingredients that `id` declares it contains (one level only).
  pub fn contained_ingredients(&self, id: IngredientId) -> &[IngredientId] {
    self.contains.get(&id).map(Vec::as_slice).unwrap_or(&[])
  }

  /// Every allergen reachable from `id`: its direct associations plus those
  /// of the ingredients it contains. One level of expansion; a contained
  /// ingredient's own `contains` list is not followed. Sorted and deduped.
  pub fn allergens_for(&self, id: IngredientId) -> Vec<AllergenId> {
    let mut ids: BTreeSet<AllergenId> =
      self.direct_allergens(id).iter().map(|a| a.allergen_id).collect();
    for part in self.contained_ingredients(id) {
      ids.extend(self.direct_allergens(*part).iter().map(|a| a.allergen_id));
    }
    ids.into_iter().collect()
  }

  pub fn allergen(&self, id: AllergenId) -> Option<&AllergenCategory> {
    self.allergens.get(&id)
  }

  /// Case-insensitive lookup by allergen code (e.g. `"peanut"` → `PEANUT`).
  pub fn allergen_by_code(&self, code: &str) -> Option<&AllergenCategory> {
    self
      .allergen_codes
      .get(&code.trim().to_uppercase())
      .and_then(|id| self.allergens.get(id))
  }

  /// The code for `id`, or its numeric id when the allergen is unknown.
  pub fn allergen_code(&self, id: AllergenId) -> String {
    self
      .allergen(id)
      .map(|a| a.code.clone())
      .unwrap_or_else(|| id.to_string())
  }

  pub fn allergens(&self) -> impl Iterator<Item = &AllergenCategory> {
    self.allergens.values()
  }

  /// Risk phrases in scan order: normalized, longest first.
  pub fn risk_phrases(&self) -> &[RiskPhrase] { &self.risk_phrases }

  /// SHA-256 hex digest of the tables this snapshot was built from.
  pub fn fingerprint(&self) -> &str { &self.fingerprint }

  pub fn stats(&self) -> SnapshotStats {
    SnapshotStats {
      ingredients:          self.ingredients.len(),
      synonyms:             self.synonyms.len(),
      allergens:            self.allergens.len(),
      ingredient_allergens: self.mapping_count,
      compounds:            self.compound_count,
      risk_phrases:         self.risk_phrases.len(),
      fingerprint:          self.fingerprint.clone(),
    }
  }
}

fn insert_synonym(
  map: &mut HashMap<String, SynonymEntry>,
  text: &str,
  entry: SynonymEntry,
) -> Result<()> {
  let key = normalize_text(text);
  if key.is_empty() {
    return Err(Error::EmptyText { table: "synonyms" });
  }
  match map.get(&key) {
    Some(existing) if existing.ingredient_id != entry.ingredient_id => {
      Err(Error::AmbiguousSynonym {
        synonym: key,
        first:   existing.ingredient_id,
        second:  entry.ingredient_id,
      })
    }
    Some(_) => Ok(()),
    None => {
      map.insert(key, entry);
      Ok(())
    }
  }
}

fn check_confidence(table: &'static str, value: f64) -> Result<()> {
  if (0.0..=1.0).contains(&value) {
    Ok(())
  } else {
    Err(Error::InvalidConfidence { table, value })
  }
}

/// Hash the tables in a row-order-independent form.
///
/// Each row is serialized to JSON, the rows of a table are sorted, and the
/// digest covers every table in a fixed order.
fn fingerprint(tables: &OntologyTables) -> Result<String> {
  fn rows<T: Serialize>(rows: &[T]) -> Result<Vec<String>> {
    let mut out = rows
      .iter()
      .map(serde_json::to_string)
      .collect::<Result<Vec<_>, _>>()?;
    out.sort();
    Ok(out)
  }

  let mut hasher = Sha256::new();
  for (name, table) in [
    ("ingredients", rows(&tables.ingredients)?),
    ("synonyms", rows(&tables.synonyms)?),
    ("allergens", rows(&tables.allergens)?),
    ("ingredient_allergens", rows(&tables.ingredient_allergens)?),
    ("compounds", rows(&tables.compounds)?),
    ("risk_phrases", rows(&tables.risk_phrases)?),
  ] {
    hasher.update(name.as_bytes());
    hasher.update((table.len() as u64).to_le_bytes());
    for row in table {
      hasher.update(row.as_bytes());
      hasher.update([0u8]);
    }
  }
  Ok(hex::encode(hasher.finalize()))
}
