//! Source provenance and the fixed authority ranking.
//!
//! Every datum entering the expiry resolver or the decision engine carries a
//! [`SourceMetadata`]. Authority is a pure function of [`SourceType`]; it is
//! never derived from anything else at runtime.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

// ─── Source types ────────────────────────────────────────────────────────────

/// Where a datum came from, ordered from most to least trusted.
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
pub enum SourceType {
  BarcodeDatabase,
  ManufacturerQr,
  UserConfirmed,
  #[serde(alias = "OCR_HIGH_CONFIDENCE")]
  OcrHigh,
  #[serde(alias = "OCR_MEDIUM_CONFIDENCE")]
  OcrMedium,
  #[serde(alias = "OCR_LOW_CONFIDENCE")]
  OcrLow,
  SystemInferred,
  Unknown,
}

impl SourceType {
  /// The fixed authority score for this source type, in `0..=100`.
  pub const fn authority(self) -> u8 {
    match self {
      Self::BarcodeDatabase => 100,
      Self::ManufacturerQr => 95,
      Self::UserConfirmed => 80,
      Self::OcrHigh => 60,
      Self::OcrMedium => 40,
      Self::OcrLow => 20,
      Self::SystemInferred => 10,
      Self::Unknown => 0,
    }
  }

  /// `true` for the three optical-recognition tiers.
  pub const fn is_ocr(self) -> bool {
    matches!(self, Self::OcrHigh | Self::OcrMedium | Self::OcrLow)
  }
}

// ─── Thresholds ──────────────────────────────────────────────────────────────

/// Minimum authority levels that gate policy decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorityThresholds {
  /// Primary data must reach this authority before "safe" can be confirmed.
  pub allow_safe:       u8,
  /// Below this, data is too weak to be shown without a caveat.
  pub display:          u8,
  /// An expiry date from a source below this needs verification.
  pub expiry_trust:     u8,
  /// An authority gap at least this wide resolves a conflict automatically.
  pub auto_resolve_gap: u8,
}

pub const MINIMUM_AUTHORITY: AuthorityThresholds = AuthorityThresholds {
  allow_safe:       60,
  display:          40,
  expiry_trust:     60,
  auto_resolve_gap: 80,
};

// ─── Metadata ────────────────────────────────────────────────────────────────

/// Provenance attached to every datum: who said it, how sure they were, and
/// when.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceMetadata {
  pub source_type: SourceType,
  /// Self-reported confidence in `[0, 1]`. Out-of-range values are clamped
  /// wherever the value is consumed.
  pub confidence:  f64,
  pub timestamp:   DateTime<Utc>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub raw_value:   Option<String>,
}

impl SourceMetadata {
  pub fn new(
    source_type: SourceType,
    confidence: f64,
    timestamp: DateTime<Utc>,
  ) -> Self {
    Self {
      source_type,
      confidence,
      timestamp,
      raw_value: None,
    }
  }

  pub fn authority(&self) -> u8 { self.source_type.authority() }

  /// The clamped confidence of this source.
  pub fn confidence(&self) -> f64 { clamp_unit(self.confidence) }

  /// Authority weighted by confidence: `authority × confidence`, in
  /// `0..=100`.
  pub fn authority_score(&self) -> f64 {
    f64::from(self.authority()) * self.confidence()
  }
}

/// Clamp `value` into `[0, 1]`, mapping NaN to zero.
pub fn clamp_unit(value: f64) -> f64 {
  if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}
