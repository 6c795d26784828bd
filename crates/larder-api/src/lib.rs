//! HTTP host for the Larder decision core.
//!
//! Exposes an axum [`Router`] over a swappable [`OntologySnapshot`]. Every
//! handler takes the current snapshot at the start of the request and uses
//! that one snapshot throughout, so a concurrent reload never mixes two
//! ontologies inside one answer.

pub mod error;
pub mod handlers;

pub use error::ApiError;

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use axum::{
  Router,
  routing::{get, post},
};
use larder_core::{OntologySnapshot, SnapshotHandle};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml`.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  pub host:          String,
  pub port:          u16,
  /// JSON file holding the ontology tables.
  pub ontology_path: PathBuf,
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
#[derive(Clone)]
pub struct AppState {
  pub snapshot: Arc<SnapshotHandle>,
  pub config:   Arc<ServerConfig>,
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build an axum [`Router`] for the decision API.
pub fn router(state: AppState) -> Router {
  Router::new()
    .route("/health",          get(handlers::ontology::health))
    .route("/ontology",        get(handlers::ontology::stats))
    .route("/ontology/reload", post(handlers::ontology::reload))
    .route("/normalize",       post(handlers::analysis::normalize))
    .route("/detect",          post(handlers::analysis::detect))
    .route("/expiry/resolve",  post(handlers::analysis::resolve_expiry))
    .route("/decide",          post(handlers::analysis::decide))
    .route("/analyze",         post(handlers::analysis::analyze))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

/// Read and build the ontology snapshot at `path`.
pub async fn load_snapshot(path: &Path) -> Result<OntologySnapshot, ApiError> {
  let json = tokio::fs::read_to_string(path).await.map_err(|source| {
    ApiError::OntologyFile {
      path: path.display().to_string(),
      source,
    }
  })?;
  Ok(OntologySnapshot::from_json(&json)?)
}
