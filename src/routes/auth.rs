/**
 * Authentication Routes
 * Admin session login/logout/verify plus end-user registration and login
 */
use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{AppendHeaders, IntoResponse},
    Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::Payload;
use crate::{
    auth::{
        admin_session_ttl,
        cookies::{self, CookieOptions},
        guard::{Authenticator, SessionCookieAuthenticator},
        hash_password, user_session_ttl, verify_password, Identity, Role,
    },
    db::{
        models::{Record, User, UserProfile},
        Collection,
    },
    error::ApiError,
    state::AppState,
};

/// Subject of admin session tokens; the admin has no user record.
const ADMIN_SUBJECT: &str = "admin";

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1))]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub authenticated: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserLoginResponse {
    pub token: String,
    pub user: UserProfile,
}

// ============================================================================
// Helper Functions
// ============================================================================

fn cookie_options(state: &AppState, http_only: bool) -> CookieOptions {
    CookieOptions {
        http_only,
        secure: state.config.is_production(),
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

// ============================================================================
// Admin session
// ============================================================================

/// POST /api/auth/login
/// Checks the configured admin credential and opens a two hour session
pub async fn admin_login(
    State(state): State<AppState>,
    Payload(payload): Payload<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email_matches = normalize_email(&payload.email) == state.config.admin.email;
    // bcrypt runs even for a wrong email
    let password_matches =
        verify_password(payload.password, state.config.admin.password_hash.clone()).await;

    if !(email_matches && password_matches) {
        tracing::warn!(email = %payload.email, "admin login failed");
        return Err(ApiError::Unauthenticated);
    }

    let identity = Identity {
        user_id: ADMIN_SUBJECT.to_string(),
        email: state.config.admin.email.clone(),
        role: Role::Admin,
    };
    let ttl = admin_session_ttl();
    let token = state
        .keys
        .issue(&identity, ttl)
        .map_err(|e| ApiError::Internal(format!("failed to sign session token: {e}")))?;

    tracing::info!(email = %identity.email, "admin logged in");

    Ok((
        AppendHeaders([
            (
                SET_COOKIE,
                cookies::set_cookie(
                    cookies::ADMIN_SESSION,
                    &token,
                    ttl,
                    cookie_options(&state, true),
                ),
            ),
            (
                SET_COOKIE,
                cookies::set_cookie(
                    cookies::ADMIN_ACCESS,
                    "true",
                    ttl,
                    cookie_options(&state, false),
                ),
            ),
        ]),
        Json(SessionResponse {
            success: true,
            message: "Login successful".to_string(),
        }),
    ))
}

/// POST /api/auth/logout
pub async fn admin_logout(State(state): State<AppState>) -> impl IntoResponse {
    (
        AppendHeaders([
            (
                SET_COOKIE,
                cookies::clear_cookie(cookies::ADMIN_SESSION, cookie_options(&state, true)),
            ),
            (
                SET_COOKIE,
                cookies::clear_cookie(cookies::ADMIN_ACCESS, cookie_options(&state, false)),
            ),
        ]),
        Json(SessionResponse {
            success: true,
            message: "Logged out".to_string(),
        }),
    )
}

/// GET /api/auth/verify
/// 200 only for a signed, unexpired admin session cookie
pub async fn verify_session(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let authenticated = SessionCookieAuthenticator::new(state.keys.clone())
        .authenticate(&headers)
        .is_ok_and(|identity| identity.role == Role::Admin);

    let status = if authenticated {
        StatusCode::OK
    } else {
        StatusCode::UNAUTHORIZED
    };
    (status, Json(VerifyResponse { authenticated }))
}

// ============================================================================
// End users
// ============================================================================

/// POST /api/register
pub async fn register(
    State(state): State<AppState>,
    Payload(payload): Payload<RegisterRequest>,
) -> Result<(StatusCode, Json<UserProfile>), ApiError> {
    let email = normalize_email(&payload.email);
    if state
        .store
        .find_by_field(Collection::Users, "email", &email)
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict("Email already registered".to_string()));
    }

    let user = User {
        name: payload.name.trim().to_string(),
        email,
        password_hash: hash_password(payload.password, state.config.bcrypt_cost).await?,
        role: Role::User,
    };
    let body = serde_json::to_value(&user)
        .map_err(|e| ApiError::Internal(format!("failed to encode user: {e}")))?;
    let doc = state.store.insert(Collection::Users, body).await?;

    tracing::info!(id = %doc.id, email = %user.email, "user registered");
    let record = Record::<User>::from_document(doc)
        .map_err(|e| ApiError::Internal(format!("stored user is malformed: {e}")))?;
    Ok((StatusCode::CREATED, Json(UserProfile::from(record))))
}

/// POST /api/users/login
/// Opens a seven day session carried by the `token` cookie
pub async fn user_login(
    State(state): State<AppState>,
    Payload(payload): Payload<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = normalize_email(&payload.email);
    let record = match state
        .store
        .find_by_field(Collection::Users, "email", &email)
        .await?
    {
        Some(doc) => Record::<User>::from_document(doc)
            .map_err(|e| ApiError::Internal(format!("stored user is malformed: {e}")))?,
        None => {
            tracing::warn!(%email, "login for unknown user");
            return Err(ApiError::Unauthenticated);
        }
    };

    if !verify_password(payload.password, record.data.password_hash.clone()).await {
        tracing::warn!(%email, "user login failed");
        return Err(ApiError::Unauthenticated);
    }

    let identity = Identity {
        user_id: record.id.to_string(),
        email: record.data.email.clone(),
        role: record.data.role,
    };
    let ttl = user_session_ttl();
    let token = state
        .keys
        .issue(&identity, ttl)
        .map_err(|e| ApiError::Internal(format!("failed to sign session token: {e}")))?;

    tracing::info!(%email, "user logged in");
    Ok((
        AppendHeaders([(
            SET_COOKIE,
            cookies::set_cookie(cookies::USER_TOKEN, &token, ttl, cookie_options(&state, true)),
        )]),
        Json(UserLoginResponse {
            token,
            user: UserProfile::from(record),
        }),
    ))
}

/// GET /api/users/me
pub async fn me(identity: Identity) -> Json<Identity> {
    Json(identity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::{app, ADMIN_EMAIL, ADMIN_PASSWORD};
    use axum::{
        body::Body,
        http::{header, Method, Request},
    };
    use serde_json::json;

    fn post_json(uri: &str, json: &serde_json::Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(json).unwrap()))
            .unwrap()
    }

    fn set_cookies(headers: &HeaderMap) -> Vec<String> {
        headers
            .get_all(SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_admin_login_sets_both_cookies() {
        let app = app();
        let (status, headers, _) = app
            .send(post_json(
                "/api/auth/login",
                &json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD }),
            ))
            .await;
        assert_eq!(status, StatusCode::OK);

        let cookies = set_cookies(&headers);
        let session = cookies
            .iter()
            .find(|c| c.starts_with("admin_session="))
            .unwrap();
        assert!(session.contains("HttpOnly"));
        assert!(session.contains("Max-Age=7200"));
        let access = cookies.iter().find(|c| c.starts_with("adminAccess=")).unwrap();
        assert!(access.starts_with("adminAccess=true;"));
        assert!(!access.contains("HttpOnly"));
    }

    #[tokio::test]
    async fn test_admin_login_wrong_password() {
        let app = app();
        let (status, body) = app
            .call(
                Method::POST,
                "/api/auth/login",
                Some(json!({ "email": ADMIN_EMAIL, "password": "nope" })),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Unauthorized");
    }

    #[tokio::test]
    async fn test_admin_login_missing_fields() {
        let app = app();
        let (status, _) = app
            .call(
                Method::POST,
                "/api/auth/login",
                Some(json!({ "email": ADMIN_EMAIL })),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_verify_requires_signed_cookie() {
        let app = app();
        let (status, body) = app.get("/api/auth/verify").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["authenticated"], false);

        let forged = Request::get("/api/auth/verify")
            .header(header::COOKIE, "admin_session=forged")
            .body(Body::empty())
            .unwrap();
        let (status, _, _) = app.send(forged).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let valid = Request::get("/api/auth/verify")
            .header(
                header::COOKIE,
                format!("admin_session={}", app.admin_token()),
            )
            .body(Body::empty())
            .unwrap();
        let (status, _, bytes) = app.send(valid).await;
        assert_eq!(status, StatusCode::OK);
        let body: VerifyResponse = serde_json::from_slice(&bytes).unwrap();
        assert!(body.authenticated);
    }

    #[tokio::test]
    async fn test_logout_clears_cookies() {
        let app = app();
        let (status, headers, _) = app
            .send(Request::post("/api/auth/logout").body(Body::empty()).unwrap())
            .await;
        assert_eq!(status, StatusCode::OK);
        let cookies = set_cookies(&headers);
        assert_eq!(cookies.len(), 2);
        assert!(cookies.iter().all(|c| c.contains("Max-Age=0")));
    }

    #[tokio::test]
    async fn test_register_then_duplicate() {
        let app = app();
        let payload = json!({ "name": "A", "email": "a@x.com", "password": "p" });
        let (status, body) = app
            .call(Method::POST, "/api/register", Some(payload.clone()), None)
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["email"], "a@x.com");
        assert!(body.get("passwordHash").is_none());
        assert!(body.get("password").is_none());

        let (status, body) = app
            .call(Method::POST, "/api/register", Some(payload), None)
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "Email already registered");
    }

    #[tokio::test]
    async fn test_register_rejects_bad_email() {
        let app = app();
        let (status, body) = app
            .call(
                Method::POST,
                "/api/register",
                Some(json!({ "name": "A", "email": "not-an-email", "password": "p" })),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid email format");
    }

    #[tokio::test]
    async fn test_user_login_and_me() {
        let app = app();
        app.call(
            Method::POST,
            "/api/register",
            Some(json!({ "name": "B", "email": "B@x.com", "password": "secret" })),
            None,
        )
        .await;

        let (status, headers, bytes) = app
            .send(post_json(
                "/api/users/login",
                &json!({ "email": "b@x.com", "password": "secret" }),
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert!(set_cookies(&headers)
            .iter()
            .any(|c| c.starts_with("token=") && c.contains("Max-Age=604800")));
        let login: UserLoginResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(login.user.role, Role::User);

        let (status, body) = app
            .call(Method::GET, "/api/users/me", None, Some(&login.token))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["email"], "b@x.com");
        assert_eq!(body["role"], "user");

        let (status, _) = app.get("/api/users/me").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_user_login_unknown_email() {
        let app = app();
        let (status, _) = app
            .call(
                Method::POST,
                "/api/users/login",
                Some(json!({ "email": "ghost@x.com", "password": "p" })),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
