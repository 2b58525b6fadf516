use std::sync::Arc;

use crate::data::post_repository::{PostFilter, PostRepository, PostUpdate};
use crate::domain::{
    error::DomainError,
    post::{Post, PostStatus},
};
use crate::presentation::dto::{CreatePostRequest, UpdatePostRequest};
use chrono::{DateTime, Utc};
use tracing::instrument;
use uuid::Uuid;

#[derive(Clone)]
pub struct PostService<R: PostRepository + 'static> {
    repo: Arc<R>,
}

impl<R> PostService<R>
where
    R: PostRepository + 'static,
{
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    pub async fn get_post(&self, id: i64) -> Result<Post, DomainError> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or(DomainError::PostNotFound(id))
    }

    /// Public fetch: drafts and scheduled posts are indistinguishable from
    /// missing ones.
    pub async fn get_published_post(&self, id: i64) -> Result<Post, DomainError> {
        let post = self.get_post(id).await?;
        if post.status != PostStatus::Published {
            return Err(DomainError::PostNotFound(id));
        }
        Ok(post)
    }

    /// Returns the requested page plus the total match count, so callers can
    /// paginate without mistaking the page size for the total.
    pub async fn get_published_posts(
        &self,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> Result<(Vec<Post>, i64), DomainError> {
        self.admin_posts(PostFilter {
            status: Some(PostStatus::Published),
            search: None,
            limit,
            offset,
        })
        .await
    }

    pub async fn admin_posts(&self, filter: PostFilter) -> Result<(Vec<Post>, i64), DomainError> {
        let total = self.repo.count(&filter).await?;
        let posts = self.repo.list(filter).await?;
        Ok((posts, total))
    }

    #[instrument(skip(self, request))]
    pub async fn create_post(
        &self,
        author_id: Uuid,
        request: CreatePostRequest,
    ) -> Result<Post, DomainError> {
        let (status, published_at) =
            resolve_status(request.status, request.published_at, None, None, Utc::now())?;
        let post = Post::new(
            author_id,
            request.title,
            request.content,
            request.excerpt,
            status,
            published_at,
        );
        self.repo.create(post).await
    }

    #[instrument(skip(self, request))]
    pub async fn update_post(
        &self,
        post_id: i64,
        request: UpdatePostRequest,
    ) -> Result<Post, DomainError> {
        let current = self.get_post(post_id).await?;
        let now = Utc::now();

        let (status, published_at) = match request.status {
            Some(requested) => resolve_status(
                Some(requested),
                request.published_at,
                Some(current.status),
                current.published_at,
                now,
            )?,
            // No status change requested; the flags are still rewritten from
            // the unchanged status on the way down. Drafts never carry a
            // publish time, and moving a scheduled post's publish time still
            // goes through the future-time check.
            None => match current.status {
                PostStatus::Draft => (PostStatus::Draft, None),
                PostStatus::Scheduled => {
                    let at = match request.published_at {
                        Some(at) if at <= now => {
                            return Err(DomainError::validation(
                                "published_at",
                                "scheduled publish time must be in the future",
                            ));
                        }
                        Some(at) => Some(at),
                        None => current.published_at,
                    };
                    (PostStatus::Scheduled, at)
                }
                PostStatus::Published => (
                    PostStatus::Published,
                    request.published_at.or(current.published_at),
                ),
            },
        };

        let update = PostUpdate {
            title: request.title,
            content: request.content,
            excerpt: request.excerpt,
            status,
            published_at,
        };

        match self.repo.update(post_id, update).await? {
            Some(post) => Ok(post),
            None => Err(DomainError::PostNotFound(post_id)),
        }
    }

    #[instrument(skip(self))]
    pub async fn delete_post(&self, post_id: i64) -> Result<(), DomainError> {
        if self.repo.delete(post_id).await? {
            Ok(())
        } else {
            Err(DomainError::PostNotFound(post_id))
        }
    }
}

/// Resolve the requested status and publish time into the stored pair.
///
/// Publication requested with a future `published_at` lands in `Scheduled`;
/// the reconciliation job performs the `scheduled -> published` transition
/// once the time passes. Explicitly requesting `Scheduled` demands a strictly
/// future `published_at`, rejected before any write otherwise.
///
/// Fallbacks to the post's current publish time are state-aware: an ordinary
/// edit of an already-published post keeps its original publish time, while
/// requesting `Published` on a scheduled post with no time given means
/// publish now, not at the previously scheduled time.
fn resolve_status(
    requested: Option<PostStatus>,
    requested_at: Option<DateTime<Utc>>,
    current_status: Option<PostStatus>,
    current_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<(PostStatus, Option<DateTime<Utc>>), DomainError> {
    match requested.unwrap_or(PostStatus::Draft) {
        PostStatus::Draft => Ok((PostStatus::Draft, None)),
        PostStatus::Scheduled => {
            let fallback = if current_status == Some(PostStatus::Scheduled) {
                current_at
            } else {
                None
            };
            let at = requested_at.or(fallback).ok_or_else(|| {
                DomainError::validation("published_at", "scheduling requires a publish time")
            })?;
            if at <= now {
                return Err(DomainError::validation(
                    "published_at",
                    "scheduled publish time must be in the future",
                ));
            }
            Ok((PostStatus::Scheduled, Some(at)))
        }
        PostStatus::Published => {
            let fallback = if current_status == Some(PostStatus::Published) {
                current_at
            } else {
                None
            };
            let at = requested_at.or(fallback).unwrap_or(now);
            if at > now {
                Ok((PostStatus::Scheduled, Some(at)))
            } else {
                Ok((PostStatus::Published, Some(at)))
            }
        }
    }
}
