//! A user's allergen profile.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::ontology::AllergenId;

/// The allergens a user must avoid. Ordered so every iteration over the
/// profile is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllergenProfile {
  pub allergen_ids: BTreeSet<AllergenId>,
}

impl AllergenProfile {
  pub fn new(ids: impl IntoIterator<Item = AllergenId>) -> Self {
    Self {
      allergen_ids: ids.into_iter().collect(),
    }
  }

  pub fn contains(&self, id: AllergenId) -> bool {
    self.allergen_ids.contains(&id)
  }

  pub fn is_empty(&self) -> bool { self.allergen_ids.is_empty() }

  pub fn len(&self) -> usize { self.allergen_ids.len() }

  pub fn iter(&self) -> impl Iterator<Item = AllergenId> + '_ {
    self.allergen_ids.iter().copied()
  }
}
