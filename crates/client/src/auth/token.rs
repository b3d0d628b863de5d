//! Bearer token inspection.
//!
//! Tokens are JWTs issued by the backend. The client never verifies the
//! signature; it only peeks at the `exp` claim to skip a doomed profile
//! check and to decide when to refresh.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;

#[derive(Deserialize)]
struct Claims {
    exp: Option<i64>,
}

/// Expiry time encoded in the token, if it is a JWT with an `exp` claim.
#[must_use]
pub fn expires_at(token: &str) -> Option<DateTime<Utc>> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: Claims = serde_json::from_slice(&bytes).ok()?;
    DateTime::from_timestamp(claims.exp?, 0)
}

/// Whether the token is known to have expired at `now`.
///
/// Opaque tokens and tokens without `exp` are never considered expired.
#[must_use]
pub fn is_expired(token: &str, now: DateTime<Utc>) -> bool {
    expires_at(token).is_some_and(|exp| exp <= now)
}

/// Whether the token expires within `window` of `now`.
#[must_use]
pub fn expires_within(token: &str, now: DateTime<Utc>, window: TimeDelta) -> bool {
    expires_at(token).is_some_and(|exp| exp - now <= window)
}

/// Build an unsigned JWT carrying `exp`, for tests.
#[cfg(test)]
pub(crate) fn unsigned_jwt(exp: DateTime<Utc>) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"u1","exp":{}}}"#, exp.timestamp()));
    format!("{header}.{payload}.sig")
}
