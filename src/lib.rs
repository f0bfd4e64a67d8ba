//! Portfolio CMS - library for app logic and testing

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod mail;
pub mod routes;
pub mod slug;
pub mod state;

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware,
    routing::{get, patch, post},
    Router,
};
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tokio::signal;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    services::ServeDir,
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use auth::guard::{self, Guard};
use config::{Config, ConfigError};
use db::{
    models::{BlogPost, Event, LinkedInPost, Project, Service, Statistic},
    PgStore, Store, StoreError,
};
use routes::{auth as auth_routes, blogs, contact, guarded, health, newsletter, resource, sitemap};
use state::AppState;

/// CORS for the API.
/// An empty origin list mirrors the request origin; credentials are always allowed.
pub fn configure_cors(allowed_origins: &[String]) -> CorsLayer {
    let origin = if allowed_origins.is_empty() {
        AllowOrigin::mirror_request()
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|origin| match origin.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(%origin, "ignoring unparsable CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::DELETE,
            Method::PATCH,
            Method::POST,
            Method::PUT,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        .allow_credentials(true)
        .max_age(Duration::from_secs(24 * 60 * 60))
}

/// Create and configure the application router.
pub fn create_app(state: AppState) -> Router {
    let cors = configure_cors(&state.config.allowed_origins);
    let admin = Guard::admin(state.keys.clone());
    let signed_in = Guard::signed_in(state.keys.clone());

    let dashboard = Router::new()
        .nest_service(
            "/dashboard",
            ServeDir::new(&state.config.dashboard_dir).append_index_html_on_directories(true),
        )
        .layer(middleware::from_fn_with_state(
            Guard::dashboard(state.keys.clone()),
            guard::gate_dashboard,
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-robots-tag"),
            HeaderValue::from_static("noindex, nofollow"),
        ));

    Router::new()
        // auth
        .route("/api/auth/login", post(auth_routes::admin_login))
        .route("/api/auth/logout", post(auth_routes::admin_logout))
        .route("/api/auth/verify", get(auth_routes::verify_session))
        .route("/api/register", post(auth_routes::register))
        .route("/api/users/login", post(auth_routes::user_login))
        .route("/api/users/me", guarded(get(auth_routes::me), &signed_in))
        // blogs
        .route(
            "/api/blogs",
            get(resource::list::<BlogPost>)
                .merge(guarded(post(resource::create::<BlogPost>), &admin)),
        )
        .route(
            "/api/blogs/{id}",
            get(blogs::get_blog).merge(guarded(
                patch(blogs::update_blog).delete(resource::remove::<BlogPost>),
                &admin,
            )),
        )
        .route(
            "/api/blogs/{id}/suggested",
            get(resource::suggested::<BlogPost>),
        )
        // other resources
        .merge(resource::routes::<Event>("/api/events", &admin))
        .route(
            "/api/events/{id}/suggested",
            get(resource::suggested::<Event>),
        )
        .merge(resource::routes::<Project>("/api/projects", &admin))
        .route(
            "/api/projects/{id}/suggested",
            get(resource::suggested::<Project>),
        )
        .merge(resource::routes::<Service>("/api/services", &admin))
        .merge(resource::routes::<Statistic>("/api/statistics", &admin))
        .merge(resource::routes::<LinkedInPost>("/api/linkedin", &admin))
        // contact
        .route(
            "/api/contact",
            post(contact::submit).merge(guarded(get(contact::list), &admin)),
        )
        .route("/api/Contact", post(contact::submit))
        // newsletter
        .route(
            "/api/newsletter/subscribers",
            post(newsletter::subscribe).merge(guarded(
                get(newsletter::list_subscribers)
                    .put(newsletter::update_subscriber)
                    .delete(newsletter::delete_subscriber),
                &admin,
            )),
        )
        .route(
            "/api/newsletter/send",
            guarded(post(newsletter::send_to_one), &admin),
        )
        .route(
            "/api/newsletter/send-all",
            guarded(post(newsletter::send_to_all), &admin),
        )
        .route(
            "/api/newsletter/preview",
            guarded(get(newsletter::preview), &admin),
        )
        .route(
            "/api/newsletter/test",
            guarded(post(newsletter::send_test), &admin),
        )
        .route("/api/newsletter/unsubscribe", get(newsletter::unsubscribe))
        // site
        .route("/sitemap.xml", get(sitemap::sitemap_xml))
        .route("/robots.txt", get(sitemap::robots_txt))
        .route("/health", get(health::health_ping))
        .route("/health/detailed", get(health::health_detailed))
        .route("/health/database", get(health::health_database))
        .route("/health/ready", get(health::health_ready))
        .merge(dashboard)
        .layer(logging::middleware::propagate_request_id_layer())
        .layer(middleware::from_fn(logging::middleware::log_request))
        .layer(logging::middleware::request_id_layer())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        // global 2 MB request body cap
        .layer(RequestBodyLimitLayer::new(2 * 1024 * 1024))
        .layer(cors)
        .with_state(state)
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Run the server (used by main).
pub async fn run() -> Result<(), StartupError> {
    dotenvy::dotenv().ok();

    let _log_guards = logging::init();
    routes::health::init_start_time();

    let config = Config::from_env()
        .inspect_err(|e| tracing::error!(error = %e, "invalid configuration"))?;

    let pg = PgStore::connect(&config.database).await?;
    pg.run_migrations().await?;
    tracing::info!("database ready");
    let store: Arc<dyn Store> = Arc::new(pg);

    let mailer = mail::from_config(&config.mail);
    let address = config.server_address();
    let state = AppState::new(config, store.clone(), mailer);
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(%address, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    store.close().await;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        tracing::info!("received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                tracing::info!("received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install terminate handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
