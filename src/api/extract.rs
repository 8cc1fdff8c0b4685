//! Request extractors shared by the handlers: bearer authentication,
//! admission keys, and the admin key check.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use sha2::{Digest, Sha256};

use crate::app_state::AppState;
use crate::dispatch::RateGate;
use crate::dispatch::rate_gate::ANONYMOUS_KEY;
use crate::error::{GatewayError, ServiceError};

/// Header carrying the admin dashboard secret.
pub const ADMIN_KEY_HEADER: &str = "x-admin-api-key";

/// Subject of a verified bearer token.
///
/// Rejects with `401` when the `Authorization` header is missing, uses a
/// scheme other than `Bearer` (any case), or carries an unknown token.
#[derive(Debug, Clone)]
pub struct AuthSubject(pub String);

impl FromRequestParts<AppState> for AuthSubject {
    type Rejection = GatewayError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        let token = bearer_token(header).ok_or(ServiceError::Unauthorized)?;
        let subject = state.auth.verify_token(token)?;
        Ok(Self(subject))
    }
}

fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Admission key for the rate gates.
///
/// First `X-Forwarded-For` entry, else the peer IP, else the shared
/// anonymous key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientKey(pub String);

impl<S: Send + Sync> FromRequestParts<S> for ClientKey {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty());
        let key = match forwarded {
            Some(ip) => ip.to_string(),
            None => parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map_or_else(|| ANONYMOUS_KEY.to_string(), |info| info.0.ip().to_string()),
        };
        Ok(Self(key))
    }
}

impl ClientKey {
    /// Consumes one admission from `gate`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::RateLimited`] when the key has no budget left.
    pub fn admit(&self, gate: &RateGate) -> Result<(), GatewayError> {
        if gate.allow(&self.0) {
            Ok(())
        } else {
            tracing::info!(key = %self.0, "request rejected by rate gate");
            Err(GatewayError::RateLimited)
        }
    }
}

/// Authenticated caller allowed to read the admin dashboard.
///
/// When an admin key is configured the `X-Admin-Api-Key` header must match
/// it, otherwise the request is rejected with `403`.
#[derive(Debug, Clone)]
pub struct AdminAccess(pub String);

impl FromRequestParts<AppState> for AdminAccess {
    type Rejection = GatewayError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthSubject(subject) = AuthSubject::from_request_parts(parts, state).await?;
        if let Some(expected) = state.admin_api_key.as_deref() {
            let provided = parts
                .headers
                .get(ADMIN_KEY_HEADER)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .unwrap_or_default();
            if !keys_match(provided, expected) {
                tracing::warn!(subject = %subject, "admin key mismatch");
                return Err(GatewayError::Forbidden);
            }
        }
        Ok(Self(subject))
    }
}

/// Compares fixed-length digests so the check does not leak key length
/// or prefix matches through timing.
fn keys_match(provided: &str, expected: &str) -> bool {
    let provided = Sha256::digest(provided.as_bytes());
    let expected = Sha256::digest(expected.as_bytes());
    provided
        .iter()
        .zip(expected.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_scheme_is_case_insensitive() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("bearer   abc "), Some("abc"));
        assert_eq!(bearer_token("BEARER abc"), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer"), None);
        assert_eq!(bearer_token("Bearer  "), None);
        assert_eq!(bearer_token(""), None);
    }

    #[test]
    fn admin_keys_compare_exactly() {
        assert!(keys_match("s3cret", "s3cret"));
        assert!(!keys_match("s3cre", "s3cret"));
        assert!(!keys_match("", "s3cret"));
    }

    async fn key_for(request: axum::http::Request<()>) -> ClientKey {
        let (mut parts, ()) = request.into_parts();
        match ClientKey::from_request_parts(&mut parts, &()).await {
            Ok(key) => key,
            Err(never) => match never {},
        }
    }

    #[tokio::test]
    async fn client_key_prefers_forwarded_header() {
        let request = axum::http::Request::builder()
            .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
            .body(())
            .unwrap_or_default();
        assert_eq!(key_for(request).await, ClientKey("203.0.113.9".to_string()));
    }

    #[tokio::test]
    async fn client_key_falls_back_to_peer_then_anonymous() {
        let mut request = axum::http::Request::new(());
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 7], 5555))));
        assert_eq!(key_for(request).await, ClientKey("192.0.2.7".to_string()));

        let request = axum::http::Request::new(());
        assert_eq!(key_for(request).await, ClientKey(ANONYMOUS_KEY.to_string()));
    }
}
