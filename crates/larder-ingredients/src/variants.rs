//! Allergen inference from free text.
//!
//! Generic advisory statements ("may contain traces of nuts") do not name an
//! allergen row. This table maps allergen codes to the words people use for
//! them so the matcher can attribute such a statement. Matching is by whole
//! words only; "pineapple" never yields "apple".

use larder_core::{OntologySnapshot, ontology::AllergenId};

/// Allergen code → words and word sequences that refer to it. A word may
/// appear under several codes ("nuts" is both PEANUT and TREE_NUT).
const ALLERGEN_VARIANTS: &[(&str, &[&str])] = &[
  ("PEANUT", &["peanut", "peanuts", "groundnut", "groundnuts", "nut", "nuts"]),
  ("TREE_NUT", &[
    "tree nut",
    "tree nuts",
    "nut",
    "nuts",
    "almond",
    "almonds",
    "hazelnut",
    "hazelnuts",
    "walnut",
    "walnuts",
    "cashew",
    "cashews",
    "pecan",
    "pecans",
    "pistachio",
    "pistachios",
    "brazil nut",
    "brazil nuts",
    "macadamia",
    "macadamias",
  ]),
  ("MILK", &["milk", "dairy", "lactose", "whey", "casein"]),
  ("EGG", &["egg", "eggs"]),
  ("WHEAT", &["wheat"]),
  ("GLUTEN", &["gluten", "wheat", "barley", "rye", "oats", "spelt"]),
  ("SOY", &["soy", "soya", "soybean", "soybeans"]),
  ("FISH", &["fish"]),
  ("CRUSTACEAN", &[
    "crustacean",
    "crustaceans",
    "shellfish",
    "shrimp",
    "prawn",
    "prawns",
    "crab",
    "lobster",
  ]),
  ("SHELLFISH", &["shellfish", "shrimp", "prawn", "prawns", "crab", "lobster"]),
  ("MOLLUSC", &[
    "mollusc",
    "molluscs",
    "mollusk",
    "mollusks",
    "shellfish",
    "oyster",
    "oysters",
    "mussel",
    "mussels",
    "squid",
    "clam",
    "clams",
  ]),
  ("SESAME", &["sesame"]),
  ("MUSTARD", &["mustard"]),
  ("CELERY", &["celery", "celeriac"]),
  ("LUPIN", &["lupin", "lupine"]),
  ("SULPHITE", &[
    "sulphite",
    "sulphites",
    "sulfite",
    "sulfites",
    "sulphur dioxide",
    "sulfur dioxide",
  ]),
];

/// Allergens that `text` refers to by a known variant word, restricted to
/// codes present in `snapshot`. Sorted by id, no duplicates.
pub(crate) fn infer_allergens(
  text: &str,
  snapshot: &OntologySnapshot,
) -> Vec<AllergenId> {
  let words = words(text);
  let mut found: Vec<AllergenId> = ALLERGEN_VARIANTS
    .iter()
    .filter(|(_, variants)| {
      variants.iter().any(|variant| {
        let needle: Vec<&str> = variant.split(' ').collect();
        contains_sequence(&words, &needle)
      })
    })
    .filter_map(|(code, _)| snapshot.allergen_by_code(code))
    .map(|allergen| allergen.allergen_id)
    .collect();
  found.sort();
  found.dedup();
  found
}

fn words(text: &str) -> Vec<String> {
  text
    .split(|c: char| !c.is_alphanumeric())
    .filter(|w| !w.is_empty())
    .map(str::to_lowercase)
    .collect()
}

fn contains_sequence(haystack: &[String], needle: &[&str]) -> bool {
  !needle.is_empty()
    && haystack
      .windows(needle.len())
      .any(|window| window.iter().zip(needle).all(|(a, b)| a == b))
}
