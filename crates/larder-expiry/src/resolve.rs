//! Source ranking, conflict detection and safe-blocking for expiry dates.

use std::cmp::Ordering;

use chrono::{DateTime, Days, NaiveDate, Utc};
use larder_core::{
  conflict::{
    ConflictResolution, ConflictType, ConflictValue, DataConflict,
    count_needing_attention,
  },
  source::{MINIMUM_AUTHORITY, clamp_unit},
};

use crate::{ExpiryResolution, ExpirySource, ExpiryStatus};

/// Shelf life assumed when only a manufacturing date is known.
pub const DEFAULT_SHELF_LIFE_DAYS: u64 = 30;
/// At most this many days left counts as expiring soon.
pub const EXPIRING_SOON_DAYS: i64 = 7;
/// Dates this close are treated as agreeing.
pub const CONFLICT_TOLERANCE_DAYS: i64 = 1;
/// Primary confidence below this blocks a safe contribution.
pub const MIN_EXPIRY_CONFIDENCE: f64 = 0.7;

const INFERRED_CONFIDENCE_FACTOR: f64 = 0.5;

/// Resolve one expiry status from `sources` as of `now`.
///
/// The primary date is the expiry date of the highest-ranked source that has
/// one. Failing that, an expiry is inferred from the highest-ranked
/// manufacturing date; an inferred expiry is always flagged for review and
/// never supports a safe call.
pub fn resolve_expiry(sources: &[ExpirySource], now: DateTime<Utc>) -> ExpiryResolution {
  let ranked = rank(sources);
  let conflicts = find_conflicts(&ranked);
  let today = now.date_naive();

  let primary = ranked
    .iter()
    .find_map(|&s| s.expiry_date.map(|date| Primary::read(s, date)))
    .or_else(|| {
      ranked
        .iter()
        .find_map(|&s| s.manufacturing_date.and_then(|m| Primary::inferred(s, m)))
    });

  let Some(primary) = primary else {
    return unknown(conflicts);
  };

  let days_until_expiry = (primary.date - today).num_days();
  let status = ExpiryStatus::from_days(days_until_expiry);
  let blocking_reasons = blocking_reasons(&primary, &conflicts);

  if count_needing_attention(&conflicts) > 0 {
    tracing::warn!(
      conflicts = conflicts.len(),
      resolved_date = %primary.date,
      "expiry sources disagree and need manual resolution"
    );
  }
  tracing::debug!(
    sources = sources.len(),
    %status,
    days_until_expiry,
    is_inferred = primary.is_inferred,
    blocked = !blocking_reasons.is_empty(),
    "resolved expiry"
  );

  finish(ExpiryResolution {
    status,
    resolved_date: Some(primary.date),
    days_until_expiry: Some(days_until_expiry),
    primary_source: Some(primary.source.source.source_type),
    primary_authority: primary.source.authority(),
    confidence: primary.confidence,
    is_inferred: primary.is_inferred,
    conflicts,
    requires_manual_review: false,
    review_reasons: Vec::new(),
    can_contribute_to_safe: false,
    blocked_safe_reason: None,
    blocking_reasons,
  })
}

struct Primary<'a> {
  source:      &'a ExpirySource,
  date:        NaiveDate,
  confidence:  f64,
  is_inferred: bool,
}

impl<'a> Primary<'a> {
  fn read(source: &'a ExpirySource, date: NaiveDate) -> Self {
    Self {
      source,
      date,
      confidence: source.source.confidence(),
      is_inferred: false,
    }
  }

  fn inferred(source: &'a ExpirySource, manufactured: NaiveDate) -> Option<Self> {
    let date = manufactured.checked_add_days(Days::new(DEFAULT_SHELF_LIFE_DAYS))?;
    Some(Self {
      source,
      date,
      confidence: clamp_unit(source.source.confidence() * INFERRED_CONFIDENCE_FACTOR),
      is_inferred: true,
    })
  }
}

/// Authority descending, then confidence descending, then newest first.
fn rank(sources: &[ExpirySource]) -> Vec<&ExpirySource> {
  let mut ranked: Vec<&ExpirySource> = sources.iter().collect();
  ranked.sort_by(|a, b| {
    b.authority()
      .cmp(&a.authority())
      .then_with(|| {
        b.source
          .confidence()
          .partial_cmp(&a.source.confidence())
          .unwrap_or(Ordering::Equal)
      })
      .then_with(|| b.source.timestamp.cmp(&a.source.timestamp))
  });
  ranked
}

/// Every pair of dated sources more than a day apart. `ranked` is ordered so
/// the first of each pair has the higher (or equal) authority, and its date
/// is the resolved value.
fn find_conflicts(ranked: &[&ExpirySource]) -> Vec<DataConflict> {
  let dated: Vec<(&ExpirySource, NaiveDate)> = ranked
    .iter()
    .filter_map(|s| s.expiry_date.map(|d| (*s, d)))
    .collect();

  let mut conflicts = Vec::new();
  for (i, &(high, high_date)) in dated.iter().enumerate() {
    for &(low, low_date) in &dated[i + 1..] {
      let apart = (high_date - low_date).num_days().abs();
      if apart <= CONFLICT_TOLERANCE_DAYS {
        continue;
      }
      let gap = high.authority().abs_diff(low.authority());
      let resolution = if gap >= MINIMUM_AUTHORITY.auto_resolve_gap {
        ConflictResolution::AutoResolved
      } else {
        ConflictResolution::ManualRequired
      };
      let reason = match resolution {
        ConflictResolution::AutoResolved => format!(
          "{} outranks {} by {gap}; using {high_date}",
          high.source.source_type, low.source.source_type
        ),
        _ => format!(
          "{} and {} disagree by {apart} days and are only {gap} authority \
           apart",
          high.source.source_type, low.source.source_type
        ),
      };
      conflicts.push(DataConflict {
        field: "expiry_date".to_string(),
        conflict_type: ConflictType::ValueMismatch,
        contributing_values: vec![
          conflict_value(high, high_date),
          conflict_value(low, low_date),
        ],
        resolution,
        resolved_value: Some(high_date.to_string()),
        reason,
      });
    }
  }
  conflicts
}

fn conflict_value(source: &ExpirySource, date: NaiveDate) -> ConflictValue {
  ConflictValue {
    source_type: source.source.source_type,
    value:       date.to_string(),
    confidence:  source.source.confidence(),
  }
}

fn blocking_reasons(primary: &Primary<'_>, conflicts: &[DataConflict]) -> Vec<String> {
  let mut reasons = Vec::new();

  let unresolved = count_needing_attention(conflicts);
  if unresolved > 0 {
    reasons.push(format!("{unresolved} unresolved expiry conflict(s)"));
  }

  let authority = primary.source.authority();
  if authority < MINIMUM_AUTHORITY.expiry_trust {
    reasons.push(format!(
      "expiry source {} has authority {authority}, below {}",
      primary.source.source.source_type, MINIMUM_AUTHORITY.expiry_trust
    ));
  }

  if primary.is_inferred {
    reasons.push(format!(
      "expiry inferred from manufacturing date plus {DEFAULT_SHELF_LIFE_DAYS} \
       days"
    ));
  } else if primary.source.is_calculated {
    reasons.push("expiry date was calculated, not read from the product".to_string());
  }

  if primary.confidence < MIN_EXPIRY_CONFIDENCE {
    reasons.push(format!(
      "expiry confidence {:.2} is below {MIN_EXPIRY_CONFIDENCE:.2}",
      primary.confidence
    ));
  }
  reasons
}

fn unknown(conflicts: Vec<DataConflict>) -> ExpiryResolution {
  tracing::debug!("no expiry or manufacturing date available");
  finish(ExpiryResolution {
    status: ExpiryStatus::Unknown,
    resolved_date: None,
    days_until_expiry: None,
    primary_source: None,
    primary_authority: 0,
    confidence: 0.0,
    is_inferred: false,
    conflicts,
    requires_manual_review: false,
    review_reasons: Vec::new(),
    can_contribute_to_safe: false,
    blocked_safe_reason: None,
    blocking_reasons: vec!["no expiry or manufacturing date available".to_string()],
  })
}

/// Derive the review and safe-contribution fields from the blocking reasons.
fn finish(mut resolution: ExpiryResolution) -> ExpiryResolution {
  resolution.requires_manual_review = !resolution.blocking_reasons.is_empty();
  resolution.review_reasons = resolution.blocking_reasons.clone();
  resolution.can_contribute_to_safe = resolution.blocking_reasons.is_empty();
  resolution.blocked_safe_reason = resolution.blocking_reasons.first().cloned();
  resolution
}
