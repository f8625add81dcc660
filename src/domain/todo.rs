use bson::Document;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::StoreError;

/// Creation and last-modification timestamps, kept at millisecond precision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Audit {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Audit {
    #[must_use]
    pub fn at(now: DateTime<Utc>) -> Self {
        let now = truncate_millis(now);
        Self { created_at: now, updated_at: now }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    pub id: String,
    pub title: String,
    pub description: String,
    pub is_completed: bool,
    pub audit: Audit,
}

impl Todo {
    pub const COLLECTION: &'static str = "todos";

    /// Stored layout: `{_id, title, description, isCompleted, audit: {createdAt, updatedAt}}`.
    ///
    /// # Errors
    /// `StoreError::Bson` if serialization fails.
    pub fn to_document(&self) -> Result<Document, StoreError> {
        Ok(bson::serialize_to_document(&TodoRecord::from(self))?)
    }

    /// # Errors
    /// `StoreError::Bson` when a field is missing or has the wrong type.
    pub fn from_document(doc: &Document) -> Result<Self, StoreError> {
        let record: TodoRecord = bson::deserialize_from_document(doc.clone())?;
        Ok(record.into())
    }
}

/// BSON shape of a stored todo. Timestamps are native BSON datetimes.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TodoRecord {
    #[serde(rename = "_id")]
    id: String,
    title: String,
    description: String,
    is_completed: bool,
    audit: AuditRecord,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuditRecord {
    created_at: bson::DateTime,
    updated_at: bson::DateTime,
}

impl From<&Todo> for TodoRecord {
    fn from(t: &Todo) -> Self {
        Self {
            id: t.id.clone(),
            title: t.title.clone(),
            description: t.description.clone(),
            is_completed: t.is_completed,
            audit: AuditRecord {
                created_at: bson::DateTime::from_chrono(t.audit.created_at),
                updated_at: bson::DateTime::from_chrono(t.audit.updated_at),
            },
        }
    }
}

impl From<TodoRecord> for Todo {
    fn from(r: TodoRecord) -> Self {
        Self {
            id: r.id,
            title: r.title,
            description: r.description,
            is_completed: r.is_completed,
            audit: Audit { created_at: r.audit.created_at.to_chrono(), updated_at: r.audit.updated_at.to_chrono() },
        }
    }
}

fn truncate_millis(t: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(t.timestamp_millis()).unwrap_or(t)
}

/// Create/update payload. Missing fields deserialize as empty and fail validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TodoDto {
    pub title: String,
    pub description: String,
}

impl TodoDto {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self { title: title.into(), description: description.into() }
    }
}

/// PATCH payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusDto {
    #[serde(default)]
    pub is_completed: bool,
}

/// One page of a list query plus the size of the full match set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
}
