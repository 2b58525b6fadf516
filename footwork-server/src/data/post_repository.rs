use crate::domain::error::DomainError;
use crate::domain::post::{Post, PostStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{error, info};

/// Fully resolved update, produced by the service layer. `status`,
/// `published_at` and the mirror flags are always written together so the
/// store never holds a row where the flags disagree with the status.
#[derive(Debug, Clone)]
pub struct PostUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    /// Outer `None` leaves the excerpt alone; `Some(None)` clears it.
    pub excerpt: Option<Option<String>>,
    pub status: PostStatus,
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    pub status: Option<PostStatus>,
    pub search: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn create(&self, post: Post) -> Result<Post, DomainError>;
    async fn find_by_id(&self, id: i64) -> Result<Option<Post>, DomainError>;
    async fn update(&self, id: i64, update: PostUpdate) -> Result<Option<Post>, DomainError>;
    async fn delete(&self, id: i64) -> Result<bool, DomainError>;
    async fn list(&self, filter: PostFilter) -> Result<Vec<Post>, DomainError>;
    /// Match count for `filter`, ignoring its pagination.
    async fn count(&self, filter: &PostFilter) -> Result<i64, DomainError>;
    /// Posts with `status = scheduled` whose `published_at` has passed,
    /// earliest due first.
    async fn find_due_scheduled(&self, now: DateTime<Utc>) -> Result<Vec<Post>, DomainError>;
    /// Conditionally flip one scheduled post to published. Returns `false`
    /// when the row was no longer scheduled (another writer won the race).
    async fn publish_scheduled(&self, id: i64, now: DateTime<Utc>) -> Result<bool, DomainError>;
}

#[derive(Clone)]
pub struct PostgresPostRepository {
    pool: PgPool,
}

impl PostgresPostRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const POST_COLUMNS: &str = "id, user_id, title, content, excerpt, status, is_published, is_draft, published_at, created_at, updated_at";

#[async_trait]
impl PostRepository for PostgresPostRepository {
    async fn create(&self, post: Post) -> Result<Post, DomainError> {
        let now = Utc::now();
        let created = sqlx::query_as::<_, Post>(&format!(
            r#"
            INSERT INTO posts (user_id, title, content, excerpt, status, is_published, is_draft, published_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
            RETURNING {POST_COLUMNS}
            "#,
        ))
        .bind(post.user_id)
        .bind(&post.title)
        .bind(&post.content)
        .bind(&post.excerpt)
        .bind(post.status)
        .bind(post.status.is_published())
        .bind(post.status.is_draft())
        .bind(post.published_at)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("failed to create post: {}", e);
            DomainError::Internal(format!("database error: {}", e))
        })?;

        info!(post_id = created.id, user_id = %created.user_id, status = %created.status, "post created");
        Ok(created)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Post>, DomainError> {
        sqlx::query_as::<_, Post>(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("db error find_by_id {}: {}", id, e);
            DomainError::Internal(e.to_string())
        })
    }

    async fn update(&self, id: i64, update: PostUpdate) -> Result<Option<Post>, DomainError> {
        let now = Utc::now();
        let (is_published, is_draft) = update.status.flags();
        let post = sqlx::query_as::<_, Post>(&format!(
            r#"
            UPDATE posts
            SET
                title = COALESCE($1, title),
                content = COALESCE($2, content),
                excerpt = CASE WHEN $3::bool THEN $4 ELSE excerpt END,
                status = $5,
                is_published = $6,
                is_draft = $7,
                published_at = $8,
                updated_at = $9
            WHERE id = $10
            RETURNING {POST_COLUMNS}
            "#,
        ))
        .bind(update.title)
        .bind(update.content)
        .bind(update.excerpt.is_some())
        .bind(update.excerpt.flatten())
        .bind(update.status)
        .bind(is_published)
        .bind(is_draft)
        .bind(update.published_at)
        .bind(now)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("failed to update post {}: {}", id, e);
            DomainError::Internal(e.to_string())
        })?;

        if post.is_some() {
            info!(post_id = id, "post updated");
        }

        Ok(post)
    }

    async fn delete(&self, id: i64) -> Result<bool, DomainError> {
        let deleted = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::Internal(e.to_string()))?;

        if deleted.rows_affected() > 0 {
            info!(post_id = id, "post deleted");
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn list(&self, filter: PostFilter) -> Result<Vec<Post>, DomainError> {
        let limit = filter.limit.unwrap_or(10).min(100) as i64;
        let offset = filter.offset.unwrap_or(0) as i64;
        let search = filter
            .search
            .as_deref()
            .map(|s| format!("%{}%", s.trim()));

        sqlx::query_as::<_, Post>(&format!(
            r#"
            SELECT {POST_COLUMNS}
            FROM posts
            WHERE ($1::post_status IS NULL OR status = $1)
              AND ($2::text IS NULL OR title ILIKE $2 OR content ILIKE $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        ))
        .bind(filter.status)
        .bind(search)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("db error while fetching posts: {}", e);
            DomainError::Internal(e.to_string())
        })
    }

    async fn count(&self, filter: &PostFilter) -> Result<i64, DomainError> {
        let search = filter
            .search
            .as_deref()
            .map(|s| format!("%{}%", s.trim()));

        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM posts
            WHERE ($1::post_status IS NULL OR status = $1)
              AND ($2::text IS NULL OR title ILIKE $2 OR content ILIKE $2)
            "#,
        )
        .bind(filter.status)
        .bind(search)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("db error while counting posts: {}", e);
            DomainError::Internal(e.to_string())
        })
    }

    async fn find_due_scheduled(&self, now: DateTime<Utc>) -> Result<Vec<Post>, DomainError> {
        sqlx::query_as::<_, Post>(&format!(
            r#"
            SELECT {POST_COLUMNS}
            FROM posts
            WHERE status = 'scheduled' AND published_at <= $1
            ORDER BY published_at ASC
            "#,
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("db error while discovering due scheduled posts: {}", e);
            DomainError::Internal(e.to_string())
        })
    }

    async fn publish_scheduled(&self, id: i64, now: DateTime<Utc>) -> Result<bool, DomainError> {
        // The `status = 'scheduled'` guard is the concurrency control: an
        // overlapping run (or a racing admin edit) that already moved the row
        // makes this a zero-row no-op rather than a double publish.
        let result = sqlx::query(
            r#"
            UPDATE posts
            SET status = 'published', is_published = TRUE, is_draft = FALSE, updated_at = $2
            WHERE id = $1 AND status = 'scheduled'
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("failed to publish scheduled post {}: {}", id, e);
            DomainError::Internal(e.to_string())
        })?;

        Ok(result.rows_affected() > 0)
    }
}
