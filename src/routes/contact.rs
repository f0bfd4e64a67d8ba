/**
 * Contact Routes
 * Stores visitor messages and notifies the site owner by email
 */
use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use super::{resource::keyed, Payload};
use crate::{
    db::{
        models::{decode_all, ContactMessage},
        Collection,
    },
    error::ApiError,
    mail::{templates::contact_notification, Delivery},
    state::AppState,
};

/// POST /api/contact
/// Accepts JSON or a multipart form; responds 201 with the delivery outcome
pub async fn submit(
    State(state): State<AppState>,
    Payload(message): Payload<ContactMessage>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let body = serde_json::to_value(&message)
        .map_err(|e| ApiError::Internal(format!("failed to encode contact message: {e}")))?;
    let doc = state.store.insert(Collection::Contacts, body).await?;
    tracing::info!(id = %doc.id, kind = %message.kind, "contact message stored");

    let delivery = notify(&state, &message).await;
    match &delivery {
        Delivery::Delivered { id } => {
            tracing::info!(contact = %doc.id, message_id = ?id, "contact notification sent")
        }
        Delivery::Failed { reason } => {
            tracing::warn!(contact = %doc.id, %reason, "contact notification failed")
        }
    }

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "contactId": doc.id,
            "message": "Message received",
            "notification": delivery.label(),
        })),
    ))
}

/// Delivery runs on its own task so a client disconnect cannot cancel it.
async fn notify(state: &AppState, message: &ContactMessage) -> Delivery {
    let Some(to) = state.config.mail.notify_to.as_deref() else {
        return Delivery::Failed {
            reason: "no notification address configured".to_string(),
        };
    };
    let email = contact_notification(to, message);
    let mailer = state.mailer.clone();
    tokio::spawn(async move { mailer.send(email).await })
        .await
        .unwrap_or_else(|e| Delivery::Failed {
            reason: format!("notification task failed: {e}"),
        })
}

/// GET /api/contact
pub async fn list(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let docs = state.store.list(Collection::Contacts).await?;
    keyed("contacts", decode_all::<ContactMessage>(docs))
}

#[cfg(test)]
mod tests {
    use crate::db::Collection;
    use crate::routes::test_support::app;
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
    };
    use serde_json::{json, Value};

    fn message() -> Value {
        json!({
            "firstName": "Ada",
            "lastName": "Lovelace",
            "email": "ada@x.com",
            "description": "Let's talk",
            "type": "appointment",
            "appointmentDate": "2025-02-01"
        })
    }

    #[tokio::test]
    async fn test_submit_stores_and_notifies() {
        let app = app();
        let (status, body) = app
            .call(Method::POST, "/api/contact", Some(message()), None)
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(body["contactId"].is_string());
        assert_eq!(body["notification"], "delivered");

        let sent = app.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, vec!["inbox@site.dev"]);
        assert_eq!(app.store.len(Collection::Contacts).await, 1);
    }

    #[tokio::test]
    async fn test_failed_notification_still_stores() {
        let app = app();
        app.mailer.reject("inbox@site.dev");
        let (status, body) = app
            .call(Method::POST, "/api/Contact", Some(message()), None)
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["notification"], "failed");
        assert_eq!(app.store.len(Collection::Contacts).await, 1);
    }

    #[tokio::test]
    async fn test_multipart_submission() {
        let app = app();
        let boundary = "XBOUNDARY";
        let fields = [
            ("firstName", "Grace"),
            ("lastName", "Hopper"),
            ("email", "grace@x.com"),
            ("description", "Hello"),
        ];
        let mut form = String::new();
        for (name, value) in fields {
            form.push_str(&format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            ));
        }
        form.push_str(&format!("--{boundary}--\r\n"));

        let req = Request::post("/api/Contact")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(form))
            .unwrap();
        let (status, _, _) = app.send(req).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_missing_fields_rejected() {
        let app = app();
        let (status, body) = app
            .call(
                Method::POST,
                "/api/contact",
                Some(json!({ "firstName": "Ada", "email": "ada@x.com" })),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing required fields");
        assert!(app.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_listing_is_admin_only() {
        let app = app();
        app.call(Method::POST, "/api/contact", Some(message()), None)
            .await;

        let (status, _) = app.get("/api/contact").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = app.admin(Method::GET, "/api/contact", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["contacts"][0]["firstName"], "Ada");
    }
}
