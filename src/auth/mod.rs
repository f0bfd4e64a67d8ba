/**
 * Authentication
 * JWT session tokens, password hashing, cookies, and the request guard
 */
pub mod cookies;
pub mod guard;

use axum::{extract::FromRequestParts, http::request::Parts};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Admin sessions last two hours.
pub fn admin_session_ttl() -> Duration {
    Duration::hours(2)
}

/// General user sessions last a week.
pub fn user_session_ttl() -> Duration {
    Duration::days(7)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::User => write!(f, "user"),
        }
    }
}

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

/// The authenticated caller, attached to the request by the guard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: String,
    pub email: String,
    pub role: Role,
}

impl From<Claims> for Identity {
    fn from(claims: Claims) -> Self {
        Identity {
            user_id: claims.sub,
            email: claims.email,
            role: claims.role,
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Identity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .ok_or(ApiError::Unauthenticated)
    }
}

/// Signing and verification keys for session tokens.
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenKeys {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    pub fn issue(
        &self,
        identity: &Identity,
        ttl: Duration,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let claims = Claims {
            sub: identity.user_id.clone(),
            email: identity.email.clone(),
            role: identity.role,
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding)
    }

    /// Checks signature and expiry.
    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let token_data = decode::<Claims>(token, &self.decoding, &Validation::default())?;
        Ok(token_data.claims)
    }
}

/// bcrypt is CPU-bound; run it off the async executor.
pub async fn hash_password(password: String, cost: u32) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| ApiError::Internal(format!("hash task failed: {e}")))?
        .map_err(|e| ApiError::Internal(format!("failed to hash password: {e}")))
}

/// `false` for any mismatch, including a malformed stored hash.
pub async fn verify_password(password: String, hash: String) -> bool {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash).unwrap_or(false))
        .await
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin() -> Identity {
        Identity {
            user_id: "admin".into(),
            email: "admin@site.dev".into(),
            role: Role::Admin,
        }
    }

    #[test]
    fn test_issue_then_verify() {
        let keys = TokenKeys::new(b"test-secret");
        let token = keys.issue(&admin(), admin_session_ttl()).unwrap();
        let claims = keys.verify(&token).unwrap();
        assert_eq!(Identity::from(claims), admin());
    }

    #[test]
    fn test_verify_rejects_other_secret() {
        let token = TokenKeys::new(b"one")
            .issue(&admin(), admin_session_ttl())
            .unwrap();
        assert!(TokenKeys::new(b"two").verify(&token).is_err());
    }

    #[test]
    fn test_verify_rejects_expired() {
        let keys = TokenKeys::new(b"test-secret");
        let token = keys.issue(&admin(), Duration::hours(-2)).unwrap();
        assert!(keys.verify(&token).is_err());
    }

    #[test]
    fn test_verify_rejects_garbage() {
        assert!(TokenKeys::new(b"s").verify("invalid.jwt.token").is_err());
    }

    #[tokio::test]
    async fn test_password_round_trip() {
        let hash = hash_password("hunter22".into(), 4).await.unwrap();
        assert!(verify_password("hunter22".into(), hash.clone()).await);
        assert!(!verify_password("wrong".into(), hash).await);
        assert!(!verify_password("x".into(), "not-a-hash".into()).await);
    }
}
