//! Risk tiers and their severity ordering.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// How strongly a product is tied to an allergen.
///
/// Variants are declared in ascending severity so the derived [`Ord`] is the
/// severity order: `Definite > Derived > Possible > Trace`.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  Display,
  EnumIter,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
  /// Cross-contamination at trace level.
  Trace,
  /// The allergen may be present.
  Possible,
  /// An ingredient derived from an allergen source (e.g. refined peanut oil).
  Derived,
  /// The allergen is listed or directly implied by an ingredient.
  Definite,
}

impl RiskLevel {
  /// `true` for the tiers that count as "contains" rather than "may contain".
  pub const fn is_definite(self) -> bool {
    matches!(self, Self::Definite | Self::Derived)
  }

  /// The more severe of the two levels.
  pub fn most_severe(self, other: Self) -> Self { self.max(other) }
}
