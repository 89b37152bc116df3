//! HTTP Basic-auth extractor backed by the rep registry.

use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use medrep_core::{rep::Actor, store::SalesStore};
use tracing::debug;

use crate::error::ApiError;

/// The authenticated caller. Present in a handler means the request carried
/// valid credentials for a registered rep or manager.
pub struct Authenticated(pub Actor);

/// Split a `Basic` authorization header into username and password.
pub fn basic_credentials(headers: &HeaderMap) -> Result<(String, String), ApiError> {
  let value = headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(ApiError::Unauthorized)?;
  let encoded = value.strip_prefix("Basic ").ok_or(ApiError::Unauthorized)?;

  let decoded = B64.decode(encoded.trim()).map_err(|_| ApiError::Unauthorized)?;
  let creds = String::from_utf8(decoded).map_err(|_| ApiError::Unauthorized)?;
  let (username, password) = creds.split_once(':').ok_or(ApiError::Unauthorized)?;
  Ok((username.to_owned(), password.to_owned()))
}

/// Check `password` against an argon2 PHC string.
pub fn verify_password(password: &str, phc: &str) -> Result<(), ApiError> {
  let parsed = PasswordHash::new(phc).map_err(|_| ApiError::Unauthorized)?;
  Argon2::default()
    .verify_password(password.as_bytes(), &parsed)
    .map_err(|_| ApiError::Unauthorized)
}

impl<S> FromRequestParts<Arc<S>> for Authenticated
where
  S: SalesStore + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    store: &Arc<S>,
  ) -> Result<Self, Self::Rejection> {
    let (username, password) = basic_credentials(&parts.headers)?;
    let Some(creds) = store
      .find_credentials(username.clone())
      .await
      .map_err(ApiError::store)?
    else {
      debug!(%username, "unknown user");
      return Err(ApiError::Unauthorized);
    };
    verify_password(&password, &creds.password_hash).inspect_err(|_| {
      debug!(%username, "password mismatch");
    })?;
    Ok(Authenticated(creds.actor))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use argon2::{PasswordHasher, password_hash::SaltString};
  use axum::http::HeaderValue;
  use rand_core::OsRng;

  fn headers(value: &str) -> HeaderMap {
    let mut map = HeaderMap::new();
    map.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
    map
  }

  fn basic(user: &str, pass: &str) -> String {
    format!("Basic {}", B64.encode(format!("{user}:{pass}")))
  }

  #[test]
  fn decodes_basic_header() {
    let (user, pass) = basic_credentials(&headers(&basic("rami", "s3:cret"))).unwrap();
    assert_eq!(user, "rami");
    assert_eq!(pass, "s3:cret");
  }

  #[test]
  fn rejects_malformed_headers() {
    assert!(matches!(basic_credentials(&HeaderMap::new()), Err(ApiError::Unauthorized)));
    let no_colon = format!("Basic {}", B64.encode("nocolon"));
    for value in ["Bearer abc", "Basic !!!not-base64!!!", no_colon.as_str()] {
      assert!(
        matches!(basic_credentials(&headers(value)), Err(ApiError::Unauthorized)),
        "{value}"
      );
    }
  }

  #[test]
  fn verifies_argon2_hashes() {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(b"secret", &salt)
      .unwrap()
      .to_string();
    assert!(verify_password("secret", &hash).is_ok());
    assert!(verify_password("wrong", &hash).is_err());
    assert!(verify_password("secret", "not a phc string").is_err());
  }
}
