//! Typed records for every collection (serde + validator at the boundary).

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
use validator::Validate;

use super::{Collection, Document};

/// A stored record: generated id and creation stamp around the typed fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Record<T> {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub data: T,
}

impl<T: DeserializeOwned> Record<T> {
    pub fn from_document(doc: Document) -> Result<Self, serde_json::Error> {
        Ok(Record {
            id: doc.id,
            created_at: doc.created_at,
            data: serde_json::from_value(doc.body)?,
        })
    }
}

/// Decodes documents, skipping (and logging) any that no longer fit the type.
pub fn decode_all<T: DeserializeOwned>(docs: Vec<Document>) -> Vec<Record<T>> {
    docs.into_iter()
        .filter_map(|doc| {
            let id = doc.id;
            Record::from_document(doc)
                .map_err(|e| tracing::warn!(%id, error = %e, "skipping undecodable document"))
                .ok()
        })
        .collect()
}

/// An admin-managed CRUD resource.
pub trait Resource:
    Serialize + DeserializeOwned + Validate + Clone + Send + Sync + 'static
{
    const COLLECTION: Collection;
    /// Field wrapping the list response, e.g. `{ "events": [...] }`.
    const LIST_KEY: &'static str;
    /// Field carrying the new id in the create response, e.g. `eventId`.
    const ID_KEY: &'static str;
    /// Human-readable name used in messages.
    const LABEL: &'static str;

    /// Applies creation-time defaults before insert.
    fn prepare_insert(&mut self) {}
}

// ============================================================================
// Lenient field decoding (multipart forms carry everything as text)
// ============================================================================

pub(crate) mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    /// Accepts a JSON array, a JSON-encoded array string, or a comma-separated string.
    pub fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(list_from_value(Value::deserialize(deserializer)?))
    }

    pub(crate) fn list_from_value(value: Value) -> Vec<String> {
        match value {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s.trim().to_string()),
                    Value::Null => None,
                    other => Some(other.to_string()),
                })
                .filter(|s| !s.is_empty())
                .collect(),
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.starts_with('[') {
                    if let Ok(items) = serde_json::from_str::<Value>(trimmed) {
                        return list_from_value(items);
                    }
                }
                trimmed
                    .split(',')
                    .map(|part| part.trim().to_string())
                    .filter(|part| !part.is_empty())
                    .collect()
            }
            _ => Vec::new(),
        }
    }

    /// Accepts a bool or the strings `true`/`false`/`on`/`1`.
    pub fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::Bool(b) => b,
            Value::String(s) => matches!(s.trim().to_lowercase().as_str(), "true" | "on" | "1"),
            Value::Number(n) => n.as_i64() == Some(1),
            _ => false,
        })
    }

    /// Accepts a string or a number, keeping the textual form.
    pub fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(serde::de::Error::custom(format!(
                "expected text, found {}",
                other
            ))),
        }
    }
}

// ============================================================================
// Blog posts
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BlogPost {
    #[validate(length(min = 1))]
    pub title: String,
    /// Markdown source.
    #[validate(length(min = 1))]
    pub content: String,
    #[validate(length(min = 1))]
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub featured_image: Option<String>,
    #[serde(default)]
    pub views: i64,
}

impl Resource for BlogPost {
    const COLLECTION: Collection = Collection::Blogs;
    const LIST_KEY: &'static str = "blogs";
    const ID_KEY: &'static str = "blogId";
    const LABEL: &'static str = "Blog";

    fn prepare_insert(&mut self) {
        self.views = 0;
    }
}

/// PATCH body for a blog post; `views` is not client-writable.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BlogPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1))]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1))]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1))]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub featured_image: Option<String>,
}

// ============================================================================
// Events
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EventCategory {
    Upcoming,
    Past,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(length(min = 1))]
    pub host: String,
    #[validate(length(min = 1))]
    pub date: String,
    #[validate(length(min = 1))]
    pub location: String,
    #[validate(length(min = 1))]
    pub image: String,
    #[serde(deserialize_with = "lenient::string_list")]
    #[validate(length(min = 1))]
    pub skills: Vec<String>,
    pub category: EventCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub register_link: Option<String>,
}

impl Resource for Event {
    const COLLECTION: Collection = Collection::Events;
    const LIST_KEY: &'static str = "events";
    const ID_KEY: &'static str = "eventId";
    const LABEL: &'static str = "Event";
}

// ============================================================================
// Projects
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[validate(length(min = 1))]
    pub title: String,
    #[validate(length(min = 1))]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub live_url: Option<String>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub featured: bool,
}

impl Resource for Project {
    const COLLECTION: Collection = Collection::Projects;
    const LIST_KEY: &'static str = "projects";
    const ID_KEY: &'static str = "projectId";
    const LABEL: &'static str = "Project";
}

// ============================================================================
// Services
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    #[validate(length(min = 1))]
    pub title: String,
    #[validate(length(min = 1))]
    pub description: String,
    #[serde(deserialize_with = "lenient::text")]
    #[validate(length(min = 1))]
    pub price: String,
    #[validate(length(min = 1))]
    pub timeframe: String,
    #[validate(length(min = 1))]
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_path: Option<String>,
}

impl Resource for Service {
    const COLLECTION: Collection = Collection::Services;
    const LIST_KEY: &'static str = "services";
    const ID_KEY: &'static str = "serviceId";
    const LABEL: &'static str = "Service";
}

// ============================================================================
// Statistics
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Statistic {
    #[validate(length(min = 1))]
    pub title: String,
    #[serde(deserialize_with = "lenient::text")]
    #[validate(length(min = 1))]
    pub value: String,
    #[validate(length(min = 1))]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl Resource for Statistic {
    const COLLECTION: Collection = Collection::Statistics;
    const LIST_KEY: &'static str = "statistics";
    const ID_KEY: &'static str = "statisticId";
    const LABEL: &'static str = "Statistic";
}

// ============================================================================
// LinkedIn posts
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LinkedInPost {
    #[validate(length(min = 1))]
    pub title: String,
    #[validate(length(min = 1))]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl Resource for LinkedInPost {
    const COLLECTION: Collection = Collection::LinkedInPosts;
    const LIST_KEY: &'static str = "linkedinPosts";
    const ID_KEY: &'static str = "linkedinPostId";
    const LABEL: &'static str = "LinkedIn post";
}

// ============================================================================
// Contact messages
// ============================================================================

fn default_contact_type() -> String {
    "general".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContactMessage {
    #[validate(length(min = 1))]
    pub first_name: String,
    #[validate(length(min = 1))]
    pub last_name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub description: String,
    #[serde(rename = "type", default = "default_contact_type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appointment_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appointment_time: Option<String>,
}

// ============================================================================
// Newsletter subscribers
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewSubscriber {
    #[validate(email)]
    pub email: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Subscriber {
    pub email: String,
    #[serde(default)]
    pub name: String,
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_newsletter_sent: Option<DateTime<Utc>>,
    #[serde(default)]
    pub newsletters_sent: i64,
}

impl From<NewSubscriber> for Subscriber {
    fn from(new: NewSubscriber) -> Self {
        Subscriber {
            email: new.email.trim().to_lowercase(),
            name: new.name.trim().to_string(),
            is_active: true,
            last_newsletter_sent: None,
            newsletters_sent: 0,
        }
    }
}

// ============================================================================
// Users
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: crate::auth::Role,
}

/// A user as returned to clients; never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: crate::auth::Role,
    pub created_at: DateTime<Utc>,
}

impl From<Record<User>> for UserProfile {
    fn from(record: Record<User>) -> Self {
        UserProfile {
            id: record.id,
            name: record.data.name,
            email: record.data.email,
            role: record.data.role,
            created_at: record.created_at,
        }
    }
}

/// Field value of a JSON body as a string slice, used by aggregation views.
pub fn text_field<'a>(body: &'a Value, field: &str) -> Option<&'a str> {
    body.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_string_list_accepts_every_shape() {
        assert_eq!(
            lenient::list_from_value(json!(["rust", " axum "])),
            vec!["rust", "axum"]
        );
        assert_eq!(
            lenient::list_from_value(json!("rust, axum,")),
            vec!["rust", "axum"]
        );
        assert_eq!(
            lenient::list_from_value(json!("[\"rust\",\"sqlx\"]")),
            vec!["rust", "sqlx"]
        );
        assert!(lenient::list_from_value(json!(null)).is_empty());
    }

    #[test]
    fn test_event_requires_category() {
        let result: Result<Event, _> = serde_json::from_value(json!({
            "name": "Meetup", "host": "Rust Lagos", "date": "2025-01-01",
            "location": "Lagos", "image": "/e.png", "skills": ["rust"]
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_event_empty_skills_fails_validation() {
        let event: Event = serde_json::from_value(json!({
            "name": "Meetup", "host": "Rust Lagos", "date": "2025-01-01",
            "location": "Lagos", "image": "/e.png", "skills": "", "category": "upcoming"
        }))
        .unwrap();
        assert!(event.validate().is_err());
    }

    #[test]
    fn test_statistic_value_accepts_numbers() {
        let stat: Statistic = serde_json::from_value(json!({
            "title": "Visitors", "value": 100, "description": "d"
        }))
        .unwrap();
        assert_eq!(stat.value, "100");
    }

    #[test]
    fn test_project_featured_from_form_text() {
        let project: Project = serde_json::from_value(json!({
            "title": "CMS", "description": "d", "featured": "true", "tags": "rust,web"
        }))
        .unwrap();
        assert!(project.featured);
        assert_eq!(project.tags, vec!["rust", "web"]);
    }

    #[test]
    fn test_blog_prepare_insert_resets_views() {
        let mut post = BlogPost {
            title: "t".into(),
            content: "c".into(),
            author: "a".into(),
            featured_image: None,
            views: 99,
        };
        post.prepare_insert();
        assert_eq!(post.views, 0);
    }

    #[test]
    fn test_record_serializes_flat() {
        let record = Record {
            id: Uuid::nil(),
            created_at: Utc::now(),
            data: LinkedInPost {
                title: "t".into(),
                description: "d".into(),
                link: None,
                image: None,
            },
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["title"], "t");
        assert!(value.get("createdAt").is_some());
        assert!(value.get("link").is_none());
    }

    #[test]
    fn test_contact_email_is_validated() {
        let msg: ContactMessage = serde_json::from_value(json!({
            "firstName": "Ada", "lastName": "L", "email": "nope", "description": "hi"
        }))
        .unwrap();
        assert!(msg.validate().is_err());
        assert_eq!(msg.kind, "general");
    }
}
