/**
 * Routes Module
 * API route handlers
 */
pub mod auth;
pub mod blogs;
pub mod contact;
pub mod health;
pub mod newsletter;
pub mod payload;
pub mod resource;
pub mod sitemap;

use axum::{middleware, routing::MethodRouter};
use uuid::Uuid;

pub use payload::Payload;

use crate::{
    auth::guard::{self, Guard},
    error::ApiError,
    state::AppState,
};

/// Parses a path or query id before any store call is made.
pub fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::invalid_id())
}

/// Runs `guard` in front of the given method handlers only.
pub fn guarded(route: MethodRouter<AppState>, guard: &Guard) -> MethodRouter<AppState> {
    route.route_layer(middleware::from_fn_with_state(guard.clone(), guard::enforce))
}

#[cfg(test)]
pub(crate) mod test_support {
    use axum::{
        body::{Body, Bytes},
        http::{header, HeaderMap, Method, Request, StatusCode},
        Router,
    };
    use serde_json::Value;
    use std::{path::PathBuf, sync::Arc};
    use tower::ServiceExt;

    use crate::{
        auth::{admin_session_ttl, Identity, Role, TokenKeys},
        config::{AdminCredentials, Config, Environment, MailConfig},
        db::{DbConfig, MemoryStore},
        mail::testing::RecordingMailer,
        state::AppState,
    };

    pub const ADMIN_EMAIL: &str = "admin@site.dev";
    pub const ADMIN_PASSWORD: &str = "correct-horse";

    pub fn test_config() -> Config {
        Config {
            environment: Environment::Development,
            host: "127.0.0.1".into(),
            port: 0,
            database: DbConfig {
                url: "postgres://unused".into(),
                max_connections: 1,
                min_connections: 0,
                connect_timeout_secs: 1,
                idle_timeout_secs: 1,
            },
            admin: AdminCredentials {
                email: ADMIN_EMAIL.into(),
                password_hash: bcrypt::hash(ADMIN_PASSWORD, 4).unwrap(),
            },
            jwt_secret: "router-test-secret".into(),
            public_base_url: "https://site.dev".into(),
            allowed_origins: Vec::new(),
            mail: MailConfig {
                from: "site <noreply@site.dev>".into(),
                notify_to: Some("inbox@site.dev".into()),
                ..MailConfig::default()
            },
            dashboard_dir: PathBuf::from("dashboard"),
            bcrypt_cost: 4,
        }
    }

    /// The full application router over an in-memory store and recording mailer.
    pub struct TestApp {
        pub router: Router,
        pub store: Arc<MemoryStore>,
        pub mailer: Arc<RecordingMailer>,
        pub keys: Arc<TokenKeys>,
    }

    pub fn app() -> TestApp {
        let store = Arc::new(MemoryStore::new());
        let mailer = Arc::new(RecordingMailer::default());
        let state = AppState::new(test_config(), store.clone(), mailer.clone());
        let keys = state.keys.clone();
        TestApp {
            router: crate::create_app(state),
            store,
            mailer,
            keys,
        }
    }

    impl TestApp {
        pub fn token_for(&self, role: Role) -> String {
            self.keys
                .issue(
                    &Identity {
                        user_id: "test-user".into(),
                        email: "someone@site.dev".into(),
                        role,
                    },
                    admin_session_ttl(),
                )
                .unwrap()
        }

        pub fn admin_token(&self) -> String {
            self.token_for(Role::Admin)
        }

        pub async fn send(&self, req: Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
            let res = self.router.clone().oneshot(req).await.unwrap();
            let status = res.status();
            let headers = res.headers().clone();
            let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
                .await
                .unwrap();
            (status, headers, bytes)
        }

        /// JSON request with an optional bearer token; a non-JSON body reads as `Null`.
        pub async fn call(
            &self,
            method: Method,
            uri: &str,
            body: Option<Value>,
            token: Option<&str>,
        ) -> (StatusCode, Value) {
            let mut builder = Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
            }
            let req = match body {
                Some(json) => builder
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(serde_json::to_vec(&json).unwrap()))
                    .unwrap(),
                None => builder.body(Body::empty()).unwrap(),
            };
            let (status, _, bytes) = self.send(req).await;
            (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
        }

        pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
            self.call(Method::GET, uri, None, None).await
        }

        pub async fn admin(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
            let token = self.admin_token();
            self.call(method, uri, body, Some(&token)).await
        }
    }
}
