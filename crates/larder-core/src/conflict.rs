//! Conflict records.
//!
//! A conflict is a recorded disagreement between two or more sources about
//! the same fact. Conflicts are never dropped: every detected disagreement
//! becomes a [`DataConflict`], including those resolved automatically.

use serde::{Deserialize, Serialize};
use strum::{Display, IntoStaticStr};

use crate::source::SourceType;

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictType {
  /// Two sources report different values for the same field.
  ValueMismatch,
  /// Sources agree an allergen is present but disagree on its risk tier.
  RiskLevelMismatch,
  /// A higher-authority source omits an allergen another source detected.
  AllergenPresence,
  /// Ingredient lists differ too much in length to be the same list.
  IngredientCountMismatch,
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictResolution {
  AutoResolved,
  ManualRequired,
  Unresolved,
}

impl ConflictResolution {
  /// `true` unless the conflict was settled without human input.
  pub const fn needs_attention(self) -> bool {
    !matches!(self, Self::AutoResolved)
  }
}

/// One source's side of a conflict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictValue {
  pub source_type: SourceType,
  pub value:       String,
  pub confidence:  f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConflict {
  /// The fact in dispute, e.g. `"expiry_date"` or `"allergen:PEANUT"`.
  pub field:               String,
  pub conflict_type:       ConflictType,
  pub contributing_values: Vec<ConflictValue>,
  pub resolution:          ConflictResolution,
  pub resolved_value:      Option<String>,
  pub reason:              String,
}

impl DataConflict {
  pub fn needs_attention(&self) -> bool { self.resolution.needs_attention() }
}

/// Number of conflicts in `conflicts` that were not auto-resolved.
pub fn count_needing_attention(conflicts: &[DataConflict]) -> usize {
  conflicts.iter().filter(|c| c.needs_attention()).count()
}
