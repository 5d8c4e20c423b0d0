//! Shared-password session auth — a signed, expiring cookie.
//!
//! Every viewer uses the same password; a successful login sets
//! `flix_auth=authenticated:<expiry>.<sig>` where the signature is the hex
//! SHA-256 of the cookie secret concatenated with the payload. Protected
//! routes run through [`require_auth`] before any handler sees the request.

use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::debug;

use crate::api::AppState;
use crate::config::AuthConfig;

/// Name of the session cookie.
pub const COOKIE_NAME: &str = "flix_auth";

const PAYLOAD_PREFIX: &str = "authenticated:";

fn sign(secret: &str, payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(payload.as_bytes());
    hex::encode(hasher.finalize())
}

/// Build the `Set-Cookie` value for a fresh session.
pub fn issue_cookie(auth: &AuthConfig) -> String {
    let max_age = auth.session_hours * 3600;
    let expiry = Utc::now().timestamp() + max_age as i64;
    let payload = format!("{PAYLOAD_PREFIX}{expiry}");
    let sig = sign(&auth.cookie_secret, &payload);
    format!("{COOKIE_NAME}={payload}.{sig}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}")
}

/// Build the `Set-Cookie` value that clears the session.
pub fn clear_cookie() -> String {
    format!("{COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

/// Verify a raw `Cookie` header value: signature must match and the session
/// must not be expired.
pub fn verify_cookie_header(auth: &AuthConfig, cookie_header: &str) -> bool {
    let Some(value) = extract_cookie(cookie_header, COOKIE_NAME) else {
        return false;
    };
    verify_value(auth, value)
}

fn extract_cookie<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header.split(';').find_map(|pair| {
        let (k, v) = pair.trim().split_once('=')?;
        (k == name).then_some(v)
    })
}

fn verify_value(auth: &AuthConfig, value: &str) -> bool {
    // The payload holds no '.'; the signature follows the last one.
    let Some((payload, sig)) = value.rsplit_once('.') else {
        return false;
    };
    let Some(expiry_s) = payload.strip_prefix(PAYLOAD_PREFIX) else {
        return false;
    };
    let Ok(expiry) = expiry_s.parse::<i64>() else {
        return false;
    };
    if expiry <= Utc::now().timestamp() {
        return false;
    }
    let expected = sign(&auth.cookie_secret, payload);
    // Both sides are fixed-length hex digests; compare without short-circuit.
    sig.len() == expected.len()
        && sig
            .bytes()
            .zip(expected.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

/// Axum middleware guarding every protected route. The streamer itself never
/// authenticates; requests that reach it have already passed this gate.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let authorized = request
        .headers()
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .map(|h| verify_cookie_header(&state.config.auth, h))
        .unwrap_or(false);

    if !authorized {
        debug!(path = %request.uri().path(), "Rejected unauthenticated request");
        return crate::error::FlixError::Unauthorized.into_response();
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth_config() -> AuthConfig {
        AuthConfig {
            shared_password: "hunter2".to_string(),
            cookie_secret: "super-secret".to_string(),
            session_hours: 24,
        }
    }

    fn cookie_value(set_cookie: &str) -> &str {
        set_cookie
            .split(';')
            .next()
            .and_then(|kv| kv.split_once('='))
            .map(|(_, v)| v)
            .expect("cookie value")
    }

    #[test]
    fn issued_cookie_verifies() {
        let auth = auth_config();
        let set = issue_cookie(&auth);
        assert!(set.starts_with("flix_auth=authenticated:"));
        assert!(set.contains("HttpOnly"));
        assert!(set.contains("SameSite=Lax"));
        assert!(set.contains("Max-Age=86400"));

        let header = format!("other=1; {COOKIE_NAME}={}", cookie_value(&set));
        assert!(verify_cookie_header(&auth, &header));
    }

    #[test]
    fn tampered_payload_fails() {
        let auth = auth_config();
        let set = issue_cookie(&auth);
        let value = cookie_value(&set);
        let (_, sig) = value.rsplit_once('.').expect("signature");
        // Keep the valid signature but claim a different expiry.
        let forged = format!("{COOKIE_NAME}=authenticated:9999999999.{sig}");
        assert!(!verify_cookie_header(&auth, &forged));
    }

    #[test]
    fn wrong_secret_fails() {
        let auth = auth_config();
        let set = issue_cookie(&auth);
        let other = AuthConfig {
            cookie_secret: "different".to_string(),
            ..auth
        };
        let header = format!("{COOKIE_NAME}={}", cookie_value(&set));
        assert!(!verify_cookie_header(&other, &header));
    }

    #[test]
    fn expired_session_fails() {
        let auth = auth_config();
        let expired = Utc::now().timestamp() - 10;
        let payload = format!("{PAYLOAD_PREFIX}{expired}");
        let sig = sign(&auth.cookie_secret, &payload);
        let header = format!("{COOKIE_NAME}={payload}.{sig}");
        assert!(!verify_cookie_header(&auth, &header));
    }

    #[test]
    fn missing_or_malformed_cookie_fails() {
        let auth = auth_config();
        assert!(!verify_cookie_header(&auth, "other=1"));
        assert!(!verify_cookie_header(&auth, &format!("{COOKIE_NAME}=nodots")));
        assert!(!verify_cookie_header(&auth, &format!("{COOKIE_NAME}=bad:0.sig")));
    }

    #[test]
    fn clear_cookie_expires_immediately() {
        assert!(clear_cookie().contains("Max-Age=0"));
    }
}
