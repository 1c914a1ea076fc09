//! Book model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Book record. `version` starts at 1 and grows by one on every successful update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub published_year: Option<i32>,
    pub isbn: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i32,
}

/// Create book request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(length(min = 1, max = 255))]
    pub author: String,
    #[validate(range(min = 1, max = 9999))]
    pub published_year: Option<i32>,
    #[validate(length(min = 10, max = 17))]
    pub isbn: Option<String>,
}

/// Partial update of a book. Absent fields keep their stored value.
///
/// `version` is the version the client read; when given, the update is
/// rejected with a conflict if the stored book has moved past it.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct BookPatch {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub author: Option<String>,
    #[validate(range(min = 1, max = 9999))]
    pub published_year: Option<i32>,
    #[validate(length(min = 10, max = 17))]
    pub isbn: Option<String>,
    #[validate(range(min = 1))]
    pub version: Option<i32>,
}

/// Column values written by a versioned update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookChanges {
    pub title: String,
    pub author: String,
    pub published_year: Option<i32>,
    pub isbn: Option<String>,
}

impl BookChanges {
    /// Overlay `patch` on the stored `current` values.
    pub fn merge(current: &Book, patch: BookPatch) -> Self {
        Self {
            title: patch.title.unwrap_or_else(|| current.title.clone()),
            author: patch.author.unwrap_or_else(|| current.author.clone()),
            published_year: patch.published_year.or(current.published_year),
            isbn: patch.isbn.or_else(|| current.isbn.clone()),
        }
    }
}
