use axum::{
    extract::{FromRequest, Multipart, Request},
    http::header,
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use validator::Validate;

use crate::error::ApiError;

/// A validated request body, accepted as JSON or `multipart/form-data`.
///
/// Missing or blank required fields are a 400 `Missing required fields`;
/// a malformed email is a 400 `Invalid email format`. File parts are ignored.
pub struct Payload<T>(pub T);

impl<T, S> FromRequest<S> for Payload<T>
where
    T: DeserializeOwned + Validate + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("multipart/form-data"));

        let value = if is_multipart {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| ApiError::Validation(format!("Invalid form data: {}", e.body_text())))?;
            form_to_value(multipart).await?
        } else {
            let Json(value) = Json::<Value>::from_request(req, state)
                .await
                .map_err(|e| ApiError::Validation(format!("Invalid JSON body: {}", e.body_text())))?;
            value
        };

        let parsed = decode::<T>(value)?;
        Ok(Payload(parsed))
    }
}

/// Deserializes and validates a JSON value into `T`.
///
/// Top-level `null` and blank-string fields count as absent.
pub fn decode<T: DeserializeOwned + Validate>(mut value: Value) -> Result<T, ApiError> {
    if let Value::Object(fields) = &mut value {
        fields.retain(|_, field| match field {
            Value::Null => false,
            Value::String(text) => !text.trim().is_empty(),
            _ => true,
        });
    }

    let parsed: T = serde_json::from_value(value).map_err(|e| {
        tracing::debug!(error = %e, "payload rejected");
        if e.to_string().starts_with("missing field") {
            ApiError::missing_fields()
        } else {
            ApiError::Validation("Invalid request body".to_string())
        }
    })?;

    if let Err(errors) = parsed.validate() {
        let bad_email = errors
            .field_errors()
            .values()
            .flat_map(|errs| errs.iter())
            .any(|e| e.code == "email");
        return Err(if bad_email {
            ApiError::Validation("Invalid email format".to_string())
        } else {
            ApiError::missing_fields()
        });
    }
    Ok(parsed)
}

/// Text fields become strings; repeated names become arrays.
async fn form_to_value(mut multipart: Multipart) -> Result<Value, ApiError> {
    let mut fields = Map::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("Invalid form data: {}", e.body_text())))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if field.file_name().is_some() {
            tracing::debug!(field = %name, "ignoring file part");
            continue;
        }
        let text = field
            .text()
            .await
            .map_err(|e| ApiError::Validation(format!("Invalid form data: {}", e.body_text())))?;

        match fields.remove(&name) {
            None => {
                fields.insert(name, Value::String(text));
            }
            Some(Value::Array(mut items)) => {
                items.push(Value::String(text));
                fields.insert(name, Value::Array(items));
            }
            Some(existing) => {
                fields.insert(name, Value::Array(vec![existing, Value::String(text)]));
            }
        }
    }
    Ok(Value::Object(fields))
}
