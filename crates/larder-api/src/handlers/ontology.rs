//! Handlers for health and ontology endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/health` | Always 200 |
//! | `GET`  | `/ontology` | 503 if no snapshot is loaded |
//! | `POST` | `/ontology/reload` | 422 and old snapshot kept on failure |

use axum::{Json, extract::State};
use larder_core::snapshot::SnapshotStats;
use serde::Serialize;

use crate::{AppState, error::ApiError, load_snapshot};

// ─── Health ───────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct Health {
  pub status:      &'static str,
  pub fingerprint: Option<String>,
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<Health> {
  let fingerprint = state
    .snapshot
    .current()
    .ok()
    .map(|snapshot| snapshot.fingerprint().to_string());
  Json(Health {
    status: if fingerprint.is_some() { "ok" } else { "no_snapshot" },
    fingerprint,
  })
}

// ─── Stats ────────────────────────────────────────────────────────────────────

/// `GET /ontology`
pub async fn stats(State(state): State<AppState>) -> Result<Json<SnapshotStats>, ApiError> {
  Ok(Json(state.snapshot.current()?.stats()))
}

// ─── Reload ───────────────────────────────────────────────────────────────────

/// `POST /ontology/reload`: re-read the configured tables file and swap it
/// in. In-flight requests finish on the snapshot they started with.
pub async fn reload(State(state): State<AppState>) -> Result<Json<SnapshotStats>, ApiError> {
  let path = &state.config.ontology_path;
  let snapshot = match load_snapshot(path).await {
    Ok(snapshot) => snapshot,
    Err(error) => {
      tracing::warn!(path = %path.display(), %error, "ontology reload rejected");
      return Err(error);
    }
  };

  let stats = snapshot.stats();
  let previous = state.snapshot.replace(snapshot);
  tracing::info!(
    fingerprint = %stats.fingerprint,
    previous = ?previous.as_ref().map(|s| s.fingerprint()),
    ingredients = stats.ingredients,
    "ontology reloaded"
  );
  Ok(Json(stats))
}
