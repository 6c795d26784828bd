pub mod analysis;
pub mod ontology;

use larder_core::{OntologySnapshot, profile::AllergenProfile};

use crate::error::ApiError;

/// Resolve allergen codes ("PEANUT", "milk") against `snapshot`.
pub(super) fn resolve_profile(
  snapshot: &OntologySnapshot,
  codes: &[String],
) -> Result<AllergenProfile, ApiError> {
  let ids = codes
    .iter()
    .map(|code| {
      snapshot
        .allergen_by_code(code)
        .map(|allergen| allergen.allergen_id)
        .ok_or_else(|| ApiError::UnknownAllergen(code.clone()))
    })
    .collect::<Result<Vec<_>, _>>()?;
  Ok(AllergenProfile::new(ids))
}
