/**
 * Request Guard
 * One authenticator interface shared by the API guard and the dashboard gate
 */
use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;

use super::{cookies, Identity, Role, TokenKeys};
use crate::error::ApiError;

/// Why a request carries no usable identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unauthenticated {
    Missing,
    Invalid,
}

pub trait Authenticator: Send + Sync {
    fn authenticate(&self, headers: &HeaderMap) -> Result<Identity, Unauthenticated>;
}

fn verify(keys: &TokenKeys, token: &str) -> Result<Identity, Unauthenticated> {
    keys.verify(token).map(Identity::from).map_err(|e| {
        tracing::debug!(error = %e, "token verification failed");
        Unauthenticated::Invalid
    })
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// `Authorization: Bearer` first, then the session cookies.
///
/// A bearer token that fails verification is final; cookies are not consulted.
/// Each present cookie is tried in turn and the first that verifies wins.
pub struct TokenAuthenticator {
    keys: Arc<TokenKeys>,
}

impl TokenAuthenticator {
    pub fn new(keys: Arc<TokenKeys>) -> Self {
        Self { keys }
    }
}

impl Authenticator for TokenAuthenticator {
    fn authenticate(&self, headers: &HeaderMap) -> Result<Identity, Unauthenticated> {
        if let Some(token) = bearer_token(headers) {
            return verify(&self.keys, token);
        }
        let mut outcome = Err(Unauthenticated::Missing);
        for name in [cookies::ADMIN_SESSION, cookies::USER_TOKEN] {
            if let Some(token) = cookies::read_cookie(headers, name) {
                outcome = verify(&self.keys, token);
                if outcome.is_ok() {
                    break;
                }
            }
        }
        outcome
    }
}

/// The `admin_session` cookie only; used for page loads.
pub struct SessionCookieAuthenticator {
    keys: Arc<TokenKeys>,
}

impl SessionCookieAuthenticator {
    pub fn new(keys: Arc<TokenKeys>) -> Self {
        Self { keys }
    }
}

impl Authenticator for SessionCookieAuthenticator {
    fn authenticate(&self, headers: &HeaderMap) -> Result<Identity, Unauthenticated> {
        let token =
            cookies::read_cookie(headers, cookies::ADMIN_SESSION).ok_or(Unauthenticated::Missing)?;
        verify(&self.keys, token)
    }
}

/// Authentication plus an optional role requirement, run before a handler.
#[derive(Clone)]
pub struct Guard {
    authenticator: Arc<dyn Authenticator>,
    required_role: Option<Role>,
}

impl Guard {
    pub fn new(authenticator: Arc<dyn Authenticator>, required_role: Option<Role>) -> Self {
        Self {
            authenticator,
            required_role,
        }
    }

    /// API guard for admin-only mutations.
    pub fn admin(keys: Arc<TokenKeys>) -> Self {
        Self::new(Arc::new(TokenAuthenticator::new(keys)), Some(Role::Admin))
    }

    /// API guard accepting any signed-in identity.
    pub fn signed_in(keys: Arc<TokenKeys>) -> Self {
        Self::new(Arc::new(TokenAuthenticator::new(keys)), None)
    }

    /// Page gate for the dashboard.
    pub fn dashboard(keys: Arc<TokenKeys>) -> Self {
        Self::new(
            Arc::new(SessionCookieAuthenticator::new(keys)),
            Some(Role::Admin),
        )
    }

    pub fn check(&self, headers: &HeaderMap) -> Result<Identity, ApiError> {
        let identity = self
            .authenticator
            .authenticate(headers)
            .map_err(|_| ApiError::Unauthenticated)?;
        match self.required_role {
            Some(role) if identity.role != role => {
                tracing::warn!(
                    user = %identity.email,
                    role = %identity.role,
                    required = %role,
                    "insufficient role"
                );
                Err(ApiError::Forbidden)
            }
            _ => Ok(identity),
        }
    }
}

/// API middleware: 401/403 without invoking the handler, otherwise attaches
/// the [`Identity`] and returns the handler's response untouched.
pub async fn enforce(
    State(guard): State<Guard>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let identity = guard.check(request.headers())?;
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

/// Page middleware: unauthenticated loads are redirected to the login page.
pub async fn gate_dashboard(State(guard): State<Guard>, request: Request, next: Next) -> Response {
    match guard.check(request.headers()) {
        Ok(_) => next.run(request).await,
        Err(_) => Redirect::to("/Login").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::admin_session_ttl;
    use axum::http::{header, HeaderValue};

    fn keys() -> Arc<TokenKeys> {
        Arc::new(TokenKeys::new(b"guard-test-secret"))
    }

    fn token(keys: &TokenKeys, role: Role) -> String {
        keys.issue(
            &Identity {
                user_id: "u1".into(),
                email: "u1@site.dev".into(),
                role,
            },
            admin_session_ttl(),
        )
        .unwrap()
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    fn cookie(name: &str, token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("{name}={token}")).unwrap(),
        );
        headers
    }

    #[test]
    fn test_missing_token_is_unauthenticated() {
        let auth = TokenAuthenticator::new(keys());
        assert_eq!(
            auth.authenticate(&HeaderMap::new()),
            Err(Unauthenticated::Missing)
        );
    }

    #[test]
    fn test_bearer_token_accepted() {
        let keys = keys();
        let auth = TokenAuthenticator::new(keys.clone());
        let identity = auth.authenticate(&bearer(&token(&keys, Role::Admin))).unwrap();
        assert_eq!(identity.role, Role::Admin);
    }

    #[test]
    fn test_invalid_bearer_does_not_fall_back_to_cookie() {
        let keys = keys();
        let mut headers = cookie(cookies::ADMIN_SESSION, &token(&keys, Role::Admin));
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer broken"),
        );
        let auth = TokenAuthenticator::new(keys);
        assert_eq!(auth.authenticate(&headers), Err(Unauthenticated::Invalid));
    }

    #[test]
    fn test_stale_admin_cookie_does_not_shadow_user_token() {
        let keys = keys();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!(
                "{}=expired; {}={}",
                cookies::ADMIN_SESSION,
                cookies::USER_TOKEN,
                token(&keys, Role::User)
            ))
            .unwrap(),
        );
        let auth = TokenAuthenticator::new(keys);
        assert_eq!(auth.authenticate(&headers).unwrap().role, Role::User);

        let only_stale = cookie(cookies::ADMIN_SESSION, "expired");
        assert_eq!(auth.authenticate(&only_stale), Err(Unauthenticated::Invalid));
    }

    #[test]
    fn test_session_cookie_authenticator_ignores_bearer() {
        let keys = keys();
        let auth = SessionCookieAuthenticator::new(keys.clone());
        assert!(auth.authenticate(&bearer(&token(&keys, Role::Admin))).is_err());
        assert!(auth
            .authenticate(&cookie(cookies::ADMIN_SESSION, &token(&keys, Role::Admin)))
            .is_ok());
    }

    #[test]
    fn test_session_cookie_must_be_signed() {
        let auth = SessionCookieAuthenticator::new(keys());
        assert_eq!(
            auth.authenticate(&cookie(cookies::ADMIN_SESSION, "anything")),
            Err(Unauthenticated::Invalid)
        );
    }

    #[test]
    fn test_guard_role_checks() {
        let keys = keys();
        let guard = Guard::admin(keys.clone());
        assert!(matches!(
            guard.check(&HeaderMap::new()),
            Err(ApiError::Unauthenticated)
        ));
        assert!(matches!(
            guard.check(&bearer(&token(&keys, Role::User))),
            Err(ApiError::Forbidden)
        ));
        assert!(guard.check(&bearer(&token(&keys, Role::Admin))).is_ok());
        assert!(Guard::signed_in(keys.clone())
            .check(&bearer(&token(&keys, Role::User)))
            .is_ok());
    }
}
