//! Environment configuration, loaded once at startup and shared through state.

use std::{path::PathBuf, str::FromStr};

use thiserror::Error;

use crate::db::DbConfig;

/// Placeholder some deployments ship with; never accepted in production.
const INSECURE_SECRET: &str = "default-jwt-secret-change-in-production";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl FromStr for Environment {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Ok(Environment::Production),
            _ => Ok(Environment::Development),
        }
    }
}

/// The single shared admin credential gating the dashboard.
#[derive(Clone)]
pub struct AdminCredentials {
    pub email: String,
    pub password_hash: String,
}

impl std::fmt::Debug for AdminCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminCredentials")
            .field("email", &self.email)
            .field("password_hash", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MailConfig {
    /// HTTP endpoint of the mail provider; `None` disables outbound mail.
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub from: String,
    /// Inbox receiving contact form notifications.
    pub notify_to: Option<String>,
}

#[derive(Clone)]
pub struct Config {
    pub environment: Environment,
    pub host: String,
    pub port: u16,
    pub database: DbConfig,
    pub admin: AdminCredentials,
    pub jwt_secret: String,
    pub public_base_url: String,
    /// Empty means "echo the request origin".
    pub allowed_origins: Vec<String>,
    pub mail: MailConfig,
    pub dashboard_dir: PathBuf,
    pub bcrypt_cost: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment: Environment = optional("ENVIRONMENT")
            .unwrap_or_default()
            .parse()
            .unwrap_or(Environment::Development);

        let jwt_secret = required("JWT_SECRET")?;
        if environment == Environment::Production
            && (jwt_secret.len() < 32 || jwt_secret == INSECURE_SECRET)
        {
            return Err(ConfigError::Invalid {
                key: "JWT_SECRET",
                reason: "must be a unique value of at least 32 bytes in production".to_string(),
            });
        }

        let bcrypt_cost = parsed("BCRYPT_COST", bcrypt::DEFAULT_COST)?;
        let admin = AdminCredentials {
            email: required("ADMIN_EMAIL")?.trim().to_lowercase(),
            password_hash: admin_password_hash(bcrypt_cost)?,
        };

        let database = DbConfig {
            url: required("DATABASE_URL")?,
            max_connections: parsed("DB_POOL_MAX", 10)?,
            min_connections: parsed("DB_POOL_MIN", 2)?,
            connect_timeout_secs: parsed("DB_CONNECT_TIMEOUT", 10)?,
            idle_timeout_secs: parsed("DB_IDLE_TIMEOUT", 300)?,
        };

        let allowed_origins = optional("ALLOWED_ORIGINS")
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let mail = MailConfig {
            api_url: optional("MAIL_API_URL"),
            api_key: optional("MAIL_API_KEY"),
            from: optional("MAIL_FROM").unwrap_or_else(|| "Portfolio <noreply@localhost>".into()),
            notify_to: optional("CONTACT_NOTIFY_EMAIL").or_else(|| Some(admin.email.clone())),
        };

        Ok(Config {
            environment,
            host: optional("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parsed("PORT", 3001)?,
            database,
            admin,
            jwt_secret,
            public_base_url: required("PUBLIC_BASE_URL")?
                .trim_end_matches('/')
                .to_string(),
            allowed_origins,
            mail,
            dashboard_dir: optional("DASHBOARD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("dashboard")),
            bcrypt_cost,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    optional(key).ok_or(ConfigError::Missing(key))
}

fn parsed<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

/// `ADMIN_HASH_PASSWORD` wins; a plain `ADMIN_PASSWORD` is hashed once here.
fn admin_password_hash(cost: u32) -> Result<String, ConfigError> {
    if let Some(hash) = optional("ADMIN_HASH_PASSWORD") {
        return Ok(hash);
    }
    let plain = optional("ADMIN_PASSWORD").ok_or(ConfigError::Missing("ADMIN_PASSWORD"))?;
    bcrypt::hash(plain, cost).map_err(|e| ConfigError::Invalid {
        key: "ADMIN_PASSWORD",
        reason: e.to_string(),
    })
}
