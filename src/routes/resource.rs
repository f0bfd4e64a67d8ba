/**
 * Resource Routes
 * Generic list/create/read/delete handlers shared by every admin-managed collection
 */
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Map, Value};

use super::{guarded, parse_id, Payload};
use crate::{
    auth::{guard::Guard, Identity},
    db::models::{decode_all, Record, Resource},
    error::ApiError,
    state::AppState,
};

/// Maximum number of items returned by a `suggested` listing.
pub const SUGGESTED_LIMIT: usize = 6;

/// `{ <key>: <value> }`
pub(crate) fn keyed(key: &str, value: impl Serialize) -> Result<Json<Value>, ApiError> {
    let value = serde_json::to_value(value)
        .map_err(|e| ApiError::Internal(format!("failed to encode response: {e}")))?;
    let mut body = Map::new();
    body.insert(key.to_string(), value);
    Ok(Json(Value::Object(body)))
}

/// Routes for `base` and `base/{id}`: reads are public, mutations go through `admin`.
pub fn routes<R: Resource>(base: &str, admin: &Guard) -> Router<AppState> {
    Router::new()
        .route(
            base,
            get(list::<R>).merge(guarded(post(create::<R>), admin)),
        )
        .route(
            &format!("{base}/{{id}}"),
            get(get_one::<R>).merge(guarded(delete(remove::<R>), admin)),
        )
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/<resource>
pub async fn list<R: Resource>(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let docs = state.store.list(R::COLLECTION).await?;
    keyed(R::LIST_KEY, decode_all::<R>(docs))
}

/// POST /api/<resource>
pub async fn create<R: Resource>(
    State(state): State<AppState>,
    identity: Identity,
    Payload(mut item): Payload<R>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    item.prepare_insert();
    let body = serde_json::to_value(&item)
        .map_err(|e| ApiError::Internal(format!("failed to encode {}: {e}", R::LABEL)))?;
    let doc = state.store.insert(R::COLLECTION, body).await?;

    tracing::info!(
        collection = %R::COLLECTION,
        id = %doc.id,
        by = %identity.email,
        "{} created",
        R::LABEL
    );

    let mut body = Map::new();
    body.insert(R::ID_KEY.to_string(), json!(doc.id));
    body.insert(
        "message".to_string(),
        json!(format!("{} created successfully", R::LABEL)),
    );
    Ok((StatusCode::CREATED, Json(Value::Object(body))))
}

/// GET /api/<resource>/{id}
pub async fn get_one<R: Resource>(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Record<R>>, ApiError> {
    let id = parse_id(&id)?;
    let doc = state
        .store
        .get(R::COLLECTION, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("{} not found", R::LABEL)))?;
    let record = Record::from_document(doc)
        .map_err(|e| ApiError::Internal(format!("stored {} is malformed: {e}", R::LABEL)))?;
    Ok(Json(record))
}

/// DELETE /api/<resource>/{id}
pub async fn remove<R: Resource>(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&id)?;
    if !state.store.delete(R::COLLECTION, id).await? {
        return Err(ApiError::NotFound(format!("{} not found", R::LABEL)));
    }

    tracing::info!(collection = %R::COLLECTION, %id, by = %identity.email, "{} deleted", R::LABEL);
    Ok(Json(json!({
        "success": true,
        "message": format!("{} deleted successfully", R::LABEL),
    })))
}

/// GET /api/<resource>/{id}/suggested
///
/// Other items of the same kind, newest first, without any ranking.
pub async fn suggested<R: Resource>(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&id)?;
    let docs = state.store.list(R::COLLECTION).await?;
    let others: Vec<Record<R>> = decode_all::<R>(docs)
        .into_iter()
        .filter(|record| record.id != id)
        .take(SUGGESTED_LIMIT)
        .collect();
    keyed(R::LIST_KEY, others)
}

#[cfg(test)]
mod tests {
    use crate::db::Collection;
    use crate::routes::test_support::app;
    use axum::http::{Method, StatusCode};
    use serde_json::json;
    use uuid::Uuid;

    fn event() -> serde_json::Value {
        json!({
            "name": "Rust Meetup",
            "host": "Rust Lagos",
            "date": "2025-03-01",
            "location": "Online",
            "image": "/uploads/meetup.png",
            "skills": ["rust", "axum"],
            "category": "upcoming"
        })
    }

    #[tokio::test]
    async fn test_create_then_read_event() {
        let app = app();
        let (status, body) = app.admin(Method::POST, "/api/events", Some(event())).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = body["eventId"].as_str().unwrap().to_string();

        let (status, body) = app.get(&format!("/api/events/{id}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], id);
        assert!(body.get("createdAt").is_some());
        for (key, value) in event().as_object().unwrap() {
            assert_eq!(&body[key], value, "field {key}");
        }
    }

    #[tokio::test]
    async fn test_missing_field_is_rejected_without_insert() {
        let app = app();
        let mut payload = event();
        payload.as_object_mut().unwrap().remove("host");
        let (status, body) = app.admin(Method::POST, "/api/events", Some(payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing required fields");
        assert_eq!(app.store.len(Collection::Events).await, 0);
    }

    #[tokio::test]
    async fn test_null_or_empty_field_is_rejected_as_missing() {
        let app = app();
        for (field, value) in [("image", json!(null)), ("category", json!("")), ("host", json!("  "))] {
            let mut payload = event();
            payload[field] = value;
            let (status, body) = app.admin(Method::POST, "/api/events", Some(payload)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{field}");
            assert_eq!(body["error"], "Missing required fields", "{field}");
        }
        assert_eq!(app.store.len(Collection::Events).await, 0);
    }

    #[tokio::test]
    async fn test_malformed_id_never_reaches_store() {
        let app = app();
        let before = app.store.operation_count();
        let (status, _) = app.get("/api/services/not-an-id").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = app.admin(Method::DELETE, "/api/services/42", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(app.store.operation_count(), before);
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found() {
        let app = app();
        let (status, body) = app.get(&format!("/api/projects/{}", Uuid::new_v4())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Project not found");
    }

    #[tokio::test]
    async fn test_statistic_lifecycle() {
        let app = app();
        let (status, body) = app
            .admin(
                Method::POST,
                "/api/statistics",
                Some(json!({ "title": "Visitors", "value": "100", "description": "d" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = body["statisticId"].as_str().unwrap().to_string();

        let (_, body) = app.get("/api/statistics").await;
        assert_eq!(body["statistics"][0]["id"], id);

        let uri = format!("/api/statistics/{id}");
        let (status, body) = app.call(Method::DELETE, &uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Unauthorized");

        let (status, _) = app.admin(Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = app.admin(Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = app.get(&uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_user_role_cannot_create() {
        let app = app();
        let token = app.token_for(crate::auth::Role::User);
        let (status, body) = app
            .call(
                Method::POST,
                "/api/linkedin",
                Some(json!({ "title": "t", "description": "d" })),
                Some(&token),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Insufficient permissions");
        assert_eq!(app.store.len(Collection::LinkedInPosts).await, 0);
    }

    #[tokio::test]
    async fn test_reads_are_public() {
        let app = app();
        for uri in [
            "/api/events",
            "/api/services",
            "/api/statistics",
            "/api/projects",
            "/api/linkedin",
            "/api/blogs",
        ] {
            let (status, _) = app.get(uri).await;
            assert_eq!(status, StatusCode::OK, "{uri}");
        }
    }

    #[tokio::test]
    async fn test_suggested_excludes_current_and_caps() {
        let app = app();
        let mut ids = Vec::new();
        for i in 0..8 {
            let (_, body) = app
                .admin(
                    Method::POST,
                    "/api/projects",
                    Some(json!({ "title": format!("P{i}"), "description": "d" })),
                )
                .await;
            ids.push(body["projectId"].as_str().unwrap().to_string());
        }

        let (status, body) = app.get(&format!("/api/projects/{}/suggested", ids[0])).await;
        assert_eq!(status, StatusCode::OK);
        let items = body["projects"].as_array().unwrap();
        assert_eq!(items.len(), super::SUGGESTED_LIMIT);
        assert!(items.iter().all(|p| p["id"] != ids[0].as_str()));
    }
}
