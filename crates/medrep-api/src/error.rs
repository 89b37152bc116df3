//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("authentication required")]
  Unauthorized,

  #[error("forbidden: {0}")]
  Forbidden(String),

  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  /// Convert any store error through the core taxonomy.
  pub fn store<E: Into<medrep_core::Error>>(err: E) -> Self {
    let err: medrep_core::Error = err.into();
    err.into()
  }
}

impl From<medrep_core::Error> for ApiError {
  fn from(err: medrep_core::Error) -> Self {
    use medrep_core::Error as E;
    match err {
      E::Unauthorized => ApiError::Unauthorized,
      E::Forbidden(m) => ApiError::Forbidden(m),
      e @ E::NotFound { .. } => ApiError::NotFound(e.to_string()),
      E::Validation(m) => ApiError::BadRequest(m),
      e @ E::ArchivalInconsistency(_) => ApiError::Store(Box::new(e)),
      E::Store(e) => ApiError::Store(e),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match &self {
      ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
      ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Store(e) => {
        tracing::error!(error = %e, "request failed in the store");
        StatusCode::INTERNAL_SERVER_ERROR
      }
    };
    let message = match &self {
      ApiError::Unauthorized => self.to_string(),
      ApiError::Forbidden(m) | ApiError::NotFound(m) | ApiError::BadRequest(m) => {
        m.clone()
      }
      ApiError::Store(e) => e.to_string(),
    };

    let mut res = (status, Json(json!({ "ok": false, "error": message }))).into_response();
    if status == StatusCode::UNAUTHORIZED {
      res.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Basic realm=\"medrep\""),
      );
    }
    res
  }
}
