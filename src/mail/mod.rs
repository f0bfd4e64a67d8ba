/**
 * Outbound Mail
 * Provider-agnostic delivery behind a trait; the HTTP provider is the default
 */
pub mod templates;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};

use crate::config::MailConfig;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutgoingEmail {
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
}

/// Outcome of one delivery attempt. Nothing is retried automatically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Delivered { id: Option<String> },
    Failed { reason: String },
}

impl Delivery {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Delivery::Delivered { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Delivery::Delivered { .. } => "delivered",
            Delivery::Failed { .. } => "failed",
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Delivery;
}

/// Builds the mailer for the configured provider.
pub fn from_config(config: &MailConfig) -> Arc<dyn Mailer> {
    match &config.api_url {
        Some(url) => Arc::new(HttpMailer::new(
            url.clone(),
            config.api_key.clone(),
            config.from.clone(),
        )),
        None => {
            tracing::warn!("MAIL_API_URL not set; outbound email is disabled");
            Arc::new(DisabledMailer)
        }
    }
}

#[derive(Debug, Serialize)]
struct ProviderRequest<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    html: &'a str,
}

#[derive(Debug, Deserialize)]
struct ProviderResponse {
    id: Option<String>,
}

/// Posts `{from, to, subject, html}` to a transactional mail HTTP API.
pub struct HttpMailer {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    from: String,
}

impl HttpMailer {
    pub fn new(endpoint: String, api_key: Option<String>, from: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint,
            api_key,
            from,
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: OutgoingEmail) -> Delivery {
        let mut request = self.client.post(&self.endpoint).json(&ProviderRequest {
            from: &self.from,
            to: &email.to,
            subject: &email.subject,
            html: &email.html,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(error = %e, to = ?email.to, "mail provider request failed");
                return Delivery::Failed {
                    reason: format!("mail provider unreachable: {e}"),
                };
            }
        };

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, detail = %detail, "mail provider rejected message");
            return Delivery::Failed {
                reason: format!("mail provider returned {status}: {detail}"),
            };
        }

        let id = response
            .json::<ProviderResponse>()
            .await
            .ok()
            .and_then(|r| r.id);
        tracing::info!(to = ?email.to, subject = %email.subject, "email delivered");
        Delivery::Delivered { id }
    }
}

/// Used when no provider is configured; every send fails with a clear reason.
pub struct DisabledMailer;

#[async_trait]
impl Mailer for DisabledMailer {
    async fn send(&self, email: OutgoingEmail) -> Delivery {
        tracing::warn!(to = ?email.to, subject = %email.subject, "email not sent: mail disabled");
        Delivery::Failed {
            reason: "mail provider not configured".to_string(),
        }
    }
}
