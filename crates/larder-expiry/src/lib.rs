//! Expiry resolution for Larder.
//!
//! Reconciles expiry and manufacturing dates reported by several
//! authority-ranked sources (product database, manufacturer QR code, user
//! confirmation, OCR) into one expiry status, the conflicts found on the way,
//! and whether the result is trustworthy enough to support a "safe" call.

mod resolve;

use chrono::NaiveDate;
use larder_core::{
  conflict::DataConflict,
  source::{SourceMetadata, SourceType},
};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

pub use resolve::{
  CONFLICT_TOLERANCE_DAYS, DEFAULT_SHELF_LIFE_DAYS, EXPIRING_SOON_DAYS,
  MIN_EXPIRY_CONFIDENCE, resolve_expiry,
};

/// One reported date pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpirySource {
  pub source:             SourceMetadata,
  #[serde(default)]
  pub expiry_date:        Option<NaiveDate>,
  #[serde(default)]
  pub manufacturing_date: Option<NaiveDate>,
  /// The expiry date was computed by the source rather than read.
  #[serde(default)]
  pub is_calculated:      bool,
}

impl ExpirySource {
  pub fn expiry(source: SourceMetadata, expiry_date: NaiveDate) -> Self {
    Self {
      source,
      expiry_date: Some(expiry_date),
      manufacturing_date: None,
      is_calculated: false,
    }
  }

  pub fn manufactured(source: SourceMetadata, manufacturing_date: NaiveDate) -> Self {
    Self {
      source,
      expiry_date: None,
      manufacturing_date: Some(manufacturing_date),
      is_calculated: false,
    }
  }

  pub fn authority(&self) -> u8 { self.source.authority() }
}

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ExpiryStatus {
  Valid,
  ExpiringSoon,
  Expired,
  #[default]
  Unknown,
}

impl ExpiryStatus {
  /// Classify by whole days left until the expiry date.
  pub const fn from_days(days_until_expiry: i64) -> Self {
    if days_until_expiry < 0 {
      Self::Expired
    } else if days_until_expiry <= EXPIRING_SOON_DAYS {
      Self::ExpiringSoon
    } else {
      Self::Valid
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpiryResolution {
  pub status:                 ExpiryStatus,
  pub resolved_date:          Option<NaiveDate>,
  pub days_until_expiry:      Option<i64>,
  pub primary_source:         Option<SourceType>,
  /// Base authority of the primary source, 0 when there is none.
  pub primary_authority:      u8,
  pub confidence:             f64,
  /// The date was derived from a manufacturing date.
  pub is_inferred:            bool,
  pub conflicts:              Vec<DataConflict>,
  pub requires_manual_review: bool,
  pub review_reasons:         Vec<String>,
  pub can_contribute_to_safe: bool,
  /// The first of [`Self::blocking_reasons`].
  pub blocked_safe_reason:    Option<String>,
  pub blocking_reasons:       Vec<String>,
}

impl ExpiryResolution {
  pub fn is_expired(&self) -> bool { self.status == ExpiryStatus::Expired }
}
