use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Publication lifecycle of a post. `Scheduled` is produced only by
/// requesting publication with a future `published_at`; the reconciliation
/// job later flips it to `Published`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "post_status", rename_all = "lowercase")]
pub enum PostStatus {
    Draft,
    Scheduled,
    Published,
}

impl PostStatus {
    /// Mirror flags `(is_published, is_draft)` as a pure function of the
    /// status. These are the only values ever persisted for the two columns.
    pub fn flags(self) -> (bool, bool) {
        match self {
            PostStatus::Published => (true, false),
            PostStatus::Draft => (false, true),
            PostStatus::Scheduled => (false, false),
        }
    }

    pub fn is_published(self) -> bool {
        self.flags().0
    }

    pub fn is_draft(self) -> bool {
        self.flags().1
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Scheduled => "scheduled",
            PostStatus::Published => "published",
        }
    }
}

impl std::fmt::Display for PostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub user_id: Uuid,
    pub title: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub status: PostStatus,
    pub is_published: bool,
    pub is_draft: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    pub fn new(
        user_id: Uuid,
        title: String,
        content: String,
        excerpt: Option<String>,
        status: PostStatus,
        published_at: Option<DateTime<Utc>>,
    ) -> Self {
        let now = Utc::now();
        let (is_published, is_draft) = status.flags();
        Self {
            id: 0, // assigned by the store
            user_id,
            title,
            content,
            excerpt,
            status,
            is_published,
            is_draft,
            published_at,
            created_at: now,
            updated_at: now,
        }
    }
}
