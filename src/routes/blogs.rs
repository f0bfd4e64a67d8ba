/**
 * Blog Routes
 * Blog reads count views; posts are the one resource editable in place
 */
use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};

use super::{parse_id, Payload};
use crate::{
    auth::Identity,
    db::{
        models::{BlogPatch, BlogPost, Record},
        Collection,
    },
    error::ApiError,
    state::AppState,
};

fn decode(doc: crate::db::Document) -> Result<Record<BlogPost>, ApiError> {
    Record::from_document(doc)
        .map_err(|e| ApiError::Internal(format!("stored blog post is malformed: {e}")))
}

/// GET /api/blogs/{id}
/// Returns the post with its view counter already incremented
pub async fn get_blog(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Record<BlogPost>>, ApiError> {
    let id = parse_id(&id)?;
    let doc = state
        .store
        .increment(Collection::Blogs, id, "views")
        .await?
        .ok_or_else(|| ApiError::NotFound("Blog not found".to_string()))?;
    Ok(Json(decode(doc)?))
}

/// PATCH /api/blogs/{id}
pub async fn update_blog(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
    Payload(patch): Payload<BlogPatch>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&id)?;
    let fields = serde_json::to_value(&patch)
        .map_err(|e| ApiError::Internal(format!("failed to encode blog patch: {e}")))?;

    let doc = state
        .store
        .merge(Collection::Blogs, id, fields)
        .await?
        .ok_or_else(|| ApiError::NotFound("Blog not found or no changes made".to_string()))?;

    tracing::info!(%id, by = %identity.email, "blog updated");
    Ok(Json(json!({
        "message": "Blog updated successfully",
        "blog": decode(doc)?,
    })))
}
