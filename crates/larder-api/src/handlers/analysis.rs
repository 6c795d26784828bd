//! Handlers for the decision pipeline endpoints.
//!
//! | Method | Path | Body |
//! |--------|------|------|
//! | `POST` | `/normalize` | `{"text": ...}` |
//! | `POST` | `/detect` | `{"text": ..., "profile": ["PEANUT"]}` |
//! | `POST` | `/expiry/resolve` | `{"sources": [...], "now": ...}` |
//! | `POST` | `/decide` | a `DecisionInput` |
//! | `POST` | `/analyze` | text, source, profile codes, expiry sources |
//!
//! Profiles on this surface are allergen codes; unknown codes are a 400.

use axum::{
  Json,
  extract::{State, rejection::JsonRejection},
};
use chrono::{DateTime, Utc};
use larder_core::source::SourceMetadata;
use larder_decision::{AnalyzeRequest, DecisionInput, DecisionOutput};
use larder_expiry::{ExpiryResolution, ExpirySource};
use larder_ingredients::{AllergenDetectionResult, NormalizationResult};
use serde::Deserialize;

use super::resolve_profile;
use crate::{AppState, error::ApiError};

// ─── Normalize ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct NormalizeBody {
  pub text: String,
}

/// `POST /normalize`
pub async fn normalize(
  State(state): State<AppState>,
  body: Result<Json<NormalizeBody>, JsonRejection>,
) -> Result<Json<NormalizationResult>, ApiError> {
  let Json(body) = body?;
  let snapshot = state.snapshot.current()?;
  Ok(Json(larder_ingredients::normalize(&body.text, &snapshot)))
}

// ─── Detect ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct DetectBody {
  pub text:    String,
  #[serde(default)]
  pub profile: Vec<String>,
}

/// `POST /detect`
pub async fn detect(
  State(state): State<AppState>,
  body: Result<Json<DetectBody>, JsonRejection>,
) -> Result<Json<AllergenDetectionResult>, ApiError> {
  let Json(body) = body?;
  let snapshot = state.snapshot.current()?;
  let profile = resolve_profile(&snapshot, &body.profile)?;
  let normalized = larder_ingredients::normalize(&body.text, &snapshot);
  Ok(Json(larder_ingredients::detect_allergens(
    &normalized,
    &profile,
    &snapshot,
  )))
}

// ─── Expiry ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ResolveExpiryBody {
  #[serde(default)]
  pub sources: Vec<ExpirySource>,
  pub now:     Option<DateTime<Utc>>,
}

/// `POST /expiry/resolve`
pub async fn resolve_expiry(
  body: Result<Json<ResolveExpiryBody>, JsonRejection>,
) -> Result<Json<ExpiryResolution>, ApiError> {
  let Json(body) = body?;
  let now = body.now.unwrap_or_else(Utc::now);
  Ok(Json(larder_expiry::resolve_expiry(&body.sources, now)))
}

// ─── Decide ───────────────────────────────────────────────────────────────────

/// `POST /decide`. The input already carries allergen ids; the current
/// snapshot's fingerprint is recorded when the caller did not supply one.
pub async fn decide(
  State(state): State<AppState>,
  body: Result<Json<DecisionInput>, JsonRejection>,
) -> Result<Json<DecisionOutput>, ApiError> {
  let Json(mut input) = body?;
  if input.snapshot_fingerprint.is_none()
    && let Ok(snapshot) = state.snapshot.current()
  {
    input.snapshot_fingerprint = Some(snapshot.fingerprint().to_string());
  }
  Ok(Json(larder_decision::decide(&input)))
}

// ─── Analyze ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AnalyzeBody {
  #[serde(default)]
  pub product_ref:    Option<String>,
  pub text:           String,
  pub source:         SourceMetadata,
  #[serde(default)]
  pub profile:        Vec<String>,
  #[serde(default)]
  pub expiry_sources: Vec<ExpirySource>,
  #[serde(default)]
  pub evaluated_at:   Option<DateTime<Utc>>,
}

/// `POST /analyze`: normalize, match, resolve expiry and decide in one call.
pub async fn analyze(
  State(state): State<AppState>,
  body: Result<Json<AnalyzeBody>, JsonRejection>,
) -> Result<Json<DecisionOutput>, ApiError> {
  let Json(body) = body?;
  let snapshot = state.snapshot.current()?;
  let request = AnalyzeRequest {
    product_ref:    body.product_ref,
    text:           body.text,
    source:         body.source,
    profile:        resolve_profile(&snapshot, &body.profile)?,
    expiry_sources: body.expiry_sources,
    evaluated_at:   body.evaluated_at,
  };
  Ok(Json(larder_decision::analyze(&request, &snapshot)))
}
