//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  extract::rejection::JsonRejection,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("unknown allergen code: {0}")]
  UnknownAllergen(String),

  #[error("no ontology snapshot is loaded")]
  SnapshotUnavailable,

  #[error("failed to read ontology file {path}: {source}")]
  OntologyFile {
    path:   String,
    #[source]
    source: std::io::Error,
  },

  #[error("ontology rejected: {0}")]
  Ontology(#[source] larder_core::Error),
}

impl From<larder_core::Error> for ApiError {
  fn from(error: larder_core::Error) -> Self {
    match error {
      larder_core::Error::SnapshotUninitialized => ApiError::SnapshotUnavailable,
      other => ApiError::Ontology(other),
    }
  }
}

impl From<JsonRejection> for ApiError {
  fn from(rejection: JsonRejection) -> Self {
    ApiError::BadRequest(rejection.body_text())
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match &self {
      ApiError::BadRequest(_) | ApiError::UnknownAllergen(_) => {
        StatusCode::BAD_REQUEST
      }
      ApiError::SnapshotUnavailable => StatusCode::SERVICE_UNAVAILABLE,
      ApiError::OntologyFile { .. } | ApiError::Ontology(_) => {
        StatusCode::UNPROCESSABLE_ENTITY
      }
    };
    (status, Json(json!({ "error": self.to_string() }))).into_response()
  }
}
