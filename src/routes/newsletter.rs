/**
 * Newsletter Routes
 * Subscriber management plus single, bulk, preview and test sends
 */
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::Html,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use super::{parse_id, Payload};
use crate::{
    db::{
        models::{decode_all, BlogPost, Event, EventCategory, NewSubscriber, Record, Subscriber},
        Collection,
    },
    error::ApiError,
    mail::{templates::Newsletter, Delivery},
    state::AppState,
};

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub is_active: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl Pagination {
    fn new(page: i64, limit: i64, total: i64) -> Self {
        Pagination {
            page,
            limit,
            total,
            total_pages: (total + limit - 1) / limit,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSubscriber {
    #[validate(length(min = 1))]
    pub id: String,
    /// Absent means "toggle".
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct IdQuery {
    pub id: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    #[validate(length(min = 1))]
    pub user_id: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TestSendRequest {
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendFailure {
    pub email: String,
    pub reason: String,
}

/// Aggregate outcome of a bulk send; one failure never aborts the batch.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendReport {
    pub sent: usize,
    pub failed: usize,
    pub total_subscribers: usize,
    pub errors: Vec<SendFailure>,
}

// ============================================================================
// Helper Functions
// ============================================================================

fn unsubscribe_url(state: &AppState, id: Uuid) -> String {
    format!(
        "{}/api/newsletter/unsubscribe?id={}",
        state.config.public_base_url, id
    )
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

async fn load_subscriber(state: &AppState, id: Uuid) -> Result<Record<Subscriber>, ApiError> {
    let doc = state
        .store
        .get(Collection::Subscribers, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Subscriber not found".to_string()))?;
    Record::from_document(doc)
        .map_err(|e| ApiError::Internal(format!("stored subscriber is malformed: {e}")))
}

/// Latest posts and upcoming events, rendered once per send.
async fn current_issue(state: &AppState) -> Result<Newsletter, ApiError> {
    let posts = decode_all::<BlogPost>(state.store.list(Collection::Blogs).await?);
    let events: Vec<Record<Event>> = decode_all::<Event>(state.store.list(Collection::Events).await?)
        .into_iter()
        .filter(|e| e.data.category == EventCategory::Upcoming)
        .collect();
    Ok(Newsletter::build(
        &state.config.public_base_url,
        &posts,
        &events,
    ))
}

/// Records a successful delivery on the subscriber.
async fn record_delivery(state: &AppState, id: Uuid) -> Result<(), ApiError> {
    state
        .store
        .merge(
            Collection::Subscribers,
            id,
            json!({ "lastNewsletterSent": Utc::now() }),
        )
        .await?;
    state
        .store
        .increment(Collection::Subscribers, id, "newslettersSent")
        .await?;
    Ok(())
}

// ============================================================================
// Subscribers
// ============================================================================

/// POST /api/newsletter/subscribers
/// Public subscribe; an inactive address is reactivated instead of duplicated
pub async fn subscribe(
    State(state): State<AppState>,
    Payload(payload): Payload<NewSubscriber>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let subscriber = Subscriber::from(payload);

    if let Some(existing) = state
        .store
        .find_by_field(Collection::Subscribers, "email", &subscriber.email)
        .await?
    {
        if existing.body.get("isActive") == Some(&Value::Bool(true)) {
            return Err(ApiError::Conflict("Email already subscribed".to_string()));
        }
        state
            .store
            .merge(
                Collection::Subscribers,
                existing.id,
                json!({ "isActive": true }),
            )
            .await?;
        tracing::info!(id = %existing.id, "subscriber reactivated");
        return Ok((
            StatusCode::OK,
            Json(json!({
                "message": "Subscription reactivated",
                "subscriberId": existing.id,
            })),
        ));
    }

    let body = serde_json::to_value(&subscriber)
        .map_err(|e| ApiError::Internal(format!("failed to encode subscriber: {e}")))?;
    let doc = state.store.insert(Collection::Subscribers, body).await?;
    tracing::info!(id = %doc.id, "new newsletter subscriber");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Subscribed successfully",
            "subscriberId": doc.id,
        })),
    ))
}

/// GET /api/newsletter/subscribers?page=&limit=&isActive=
pub async fn list_subscribers(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::Validation(e.body_text()))?;
    let page = query.page.unwrap_or(1).max(1);
    let limit = query
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let filter = query
        .is_active
        .as_deref()
        .and_then(parse_flag)
        .map(|active| json!({ "isActive": active }));

    let offset = (page - 1)
        .checked_mul(limit)
        .ok_or_else(|| ApiError::Validation("Page out of range".to_string()))?;

    let (docs, total) = state
        .store
        .list_page(Collection::Subscribers, filter, offset, limit)
        .await?;

    Ok(Json(json!({
        "subscribers": decode_all::<Subscriber>(docs),
        "pagination": Pagination::new(page, limit, total),
    })))
}

/// PUT /api/newsletter/subscribers
pub async fn update_subscriber(
    State(state): State<AppState>,
    Payload(payload): Payload<UpdateSubscriber>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&payload.id)?;
    let current = load_subscriber(&state, id).await?;
    let is_active = payload.is_active.unwrap_or(!current.data.is_active);

    let updated = match state
        .store
        .merge(
            Collection::Subscribers,
            id,
            json!({ "isActive": is_active }),
        )
        .await?
    {
        Some(doc) => Record::<Subscriber>::from_document(doc)
            .map_err(|e| ApiError::Internal(format!("stored subscriber is malformed: {e}")))?,
        None => current,
    };

    tracing::info!(%id, is_active, "subscriber updated");
    Ok(Json(json!({
        "message": "Subscriber updated",
        "subscriber": updated,
    })))
}

/// DELETE /api/newsletter/subscribers?id=
pub async fn delete_subscriber(
    State(state): State<AppState>,
    query: Result<Query<IdQuery>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Query(query) = query.map_err(|_| ApiError::invalid_id())?;
    let id = parse_id(&query.id)?;
    if !state.store.delete(Collection::Subscribers, id).await? {
        return Err(ApiError::NotFound("Subscriber not found".to_string()));
    }
    tracing::info!(%id, "subscriber deleted");
    Ok(Json(json!({ "success": true, "message": "Subscriber deleted" })))
}

/// GET /api/newsletter/unsubscribe?id=
/// Target of the link in every newsletter
pub async fn unsubscribe(
    State(state): State<AppState>,
    query: Result<Query<IdQuery>, QueryRejection>,
) -> Result<Html<&'static str>, ApiError> {
    let Query(query) = query.map_err(|_| ApiError::invalid_id())?;
    let id = parse_id(&query.id)?;
    load_subscriber(&state, id).await?;
    state
        .store
        .merge(Collection::Subscribers, id, json!({ "isActive": false }))
        .await?;
    tracing::info!(%id, "subscriber unsubscribed");
    Ok(Html(
        "<!doctype html><title>Unsubscribed</title><p>You have been unsubscribed.</p>",
    ))
}

// ============================================================================
// Sending
// ============================================================================

/// POST /api/newsletter/send
pub async fn send_to_one(
    State(state): State<AppState>,
    Payload(payload): Payload<SendRequest>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&payload.user_id)?;
    let subscriber = load_subscriber(&state, id).await?;
    if !subscriber.data.is_active {
        return Err(ApiError::Validation("Subscriber is inactive".to_string()));
    }

    let issue = current_issue(&state).await?;
    let email = issue.email_to(&subscriber.data.email, &unsubscribe_url(&state, id));
    match state.mailer.send(email).await {
        Delivery::Delivered { id: message_id } => {
            record_delivery(&state, id).await?;
            tracing::info!(%id, "newsletter sent");
            Ok(Json(json!({
                "success": true,
                "message": "Newsletter sent",
                "messageId": message_id,
            })))
        }
        Delivery::Failed { reason } => Err(ApiError::Dependency(reason)),
    }
}

/// POST /api/newsletter/send-all
pub async fn send_to_all(State(state): State<AppState>) -> Result<Json<SendReport>, ApiError> {
    let subscribers: Vec<Record<Subscriber>> =
        decode_all::<Subscriber>(state.store.list(Collection::Subscribers).await?)
            .into_iter()
            .filter(|s| s.data.is_active)
            .collect();
    let issue = current_issue(&state).await?;

    let mut report = SendReport {
        total_subscribers: subscribers.len(),
        ..SendReport::default()
    };
    for subscriber in subscribers {
        let email = issue.email_to(&subscriber.data.email, &unsubscribe_url(&state, subscriber.id));
        match state.mailer.send(email).await {
            Delivery::Delivered { .. } => {
                report.sent += 1;
                if let Err(e) = record_delivery(&state, subscriber.id).await {
                    tracing::warn!(id = %subscriber.id, error = %e, "failed to record delivery");
                }
            }
            Delivery::Failed { reason } => {
                report.failed += 1;
                report.errors.push(SendFailure {
                    email: subscriber.data.email,
                    reason,
                });
            }
        }
    }

    tracing::info!(
        sent = report.sent,
        failed = report.failed,
        total = report.total_subscribers,
        "bulk newsletter finished"
    );
    Ok(Json(report))
}

/// GET /api/newsletter/preview
pub async fn preview(State(state): State<AppState>) -> Result<Html<String>, ApiError> {
    let issue = current_issue(&state).await?;
    Ok(Html(issue.html_for("#")))
}

/// POST /api/newsletter/test
pub async fn send_test(
    State(state): State<AppState>,
    Payload(payload): Payload<TestSendRequest>,
) -> Result<Json<Value>, ApiError> {
    let issue = current_issue(&state).await?;
    let mut email = issue.email_to(&payload.email, "#");
    email.subject = format!("[Test] {}", email.subject);

    match state.mailer.send(email).await {
        Delivery::Delivered { .. } => Ok(Json(json!({
            "success": true,
            "message": format!("Test newsletter sent to {}", payload.email),
        }))),
        Delivery::Failed { reason } => Err(ApiError::Dependency(reason)),
    }
}
