use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, instrument};

use crate::data::post_repository::PostRepository;
use crate::domain::error::DomainError;

/// Outcome of one reconciliation run. Observability only; nothing downstream
/// consumes it synchronously.
#[derive(Debug, Clone, Serialize)]
pub struct PublishReport {
    /// Posts discovered as due in this run.
    pub processed: usize,
    pub published: Vec<i64>,
    pub failed: Vec<PublishFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublishFailure {
    pub id: i64,
    pub error: String,
}

/// Promotes posts from `scheduled` to `published` once their publish time
/// has passed. Safe to run concurrently with itself or with admin edits: the
/// per-row `status = 'scheduled'` guard makes the loser of any race a silent
/// zero-row no-op.
#[derive(Clone)]
pub struct ScheduledPublisher<R: PostRepository + 'static> {
    repo: Arc<R>,
    discovery_timeout: Duration,
}

impl<R> ScheduledPublisher<R>
where
    R: PostRepository + 'static,
{
    pub fn new(repo: Arc<R>, discovery_timeout: Duration) -> Self {
        Self {
            repo,
            discovery_timeout,
        }
    }

    /// One reconciliation pass. A discovery failure aborts the whole run
    /// (the next tick retries); a failure on an individual row is collected
    /// in the report and does not stop the remaining rows.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<PublishReport, DomainError> {
        let now = Utc::now();
        let due = tokio::time::timeout(self.discovery_timeout, self.repo.find_due_scheduled(now))
            .await
            .map_err(|_| DomainError::Internal("scheduled post discovery timed out".into()))??;

        let mut report = PublishReport {
            processed: due.len(),
            published: Vec::new(),
            failed: Vec::new(),
        };

        for post in due {
            match self.repo.publish_scheduled(post.id, Utc::now()).await {
                Ok(true) => {
                    info!(post_id = post.id, "scheduled post published");
                    report.published.push(post.id);
                }
                Ok(false) => {
                    // Another writer already moved the row; not a failure.
                    debug!(post_id = post.id, "post no longer scheduled, skipped");
                }
                Err(e) => {
                    error!(post_id = post.id, error = %e, "failed to publish scheduled post");
                    report.failed.push(PublishFailure {
                        id: post.id,
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::memory::InMemoryPostRepository;
    use crate::domain::post::{Post, PostStatus};
    use chrono::Duration as ChronoDuration;
    use std::sync::atomic::Ordering;
    use uuid::Uuid;

    const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(5);

    fn post_with_status(
        status: PostStatus,
        published_at: Option<chrono::DateTime<Utc>>,
    ) -> Post {
        Post::new(
            Uuid::new_v4(),
            "Summer camp dates".into(),
            "Registration opens soon".into(),
            None,
            status,
            published_at,
        )
    }

    #[tokio::test]
    async fn publishes_only_due_scheduled_posts() {
        let repo = Arc::new(InMemoryPostRepository::new());
        let overdue = repo.insert(post_with_status(
            PostStatus::Scheduled,
            Some(Utc::now() - ChronoDuration::hours(1)),
        ));
        let upcoming = repo.insert(post_with_status(
            PostStatus::Scheduled,
            Some(Utc::now() + ChronoDuration::hours(1)),
        ));
        let already_live = repo.insert(post_with_status(
            PostStatus::Published,
            Some(Utc::now() - ChronoDuration::days(1)),
        ));

        let publisher = ScheduledPublisher::new(Arc::clone(&repo), DISCOVERY_TIMEOUT);
        let report = publisher.run().await.unwrap();

        assert_eq!(report.processed, 1);
        assert_eq!(report.published, vec![overdue.id]);
        assert!(report.failed.is_empty());

        let published = repo.get(overdue.id).unwrap();
        assert_eq!(published.status, PostStatus::Published);
        assert!(published.is_published);
        assert!(!published.is_draft);
        assert!(published.updated_at > overdue.updated_at);

        assert_eq!(repo.get(upcoming.id).unwrap().status, PostStatus::Scheduled);
        assert_eq!(repo.get(already_live.id).unwrap().status, PostStatus::Published);
    }

    #[tokio::test]
    async fn second_run_is_a_no_op() {
        let repo = Arc::new(InMemoryPostRepository::new());
        repo.insert(post_with_status(
            PostStatus::Scheduled,
            Some(Utc::now() - ChronoDuration::minutes(1)),
        ));

        let publisher = ScheduledPublisher::new(Arc::clone(&repo), DISCOVERY_TIMEOUT);
        let first = publisher.run().await.unwrap();
        assert_eq!(first.published.len(), 1);

        let second = publisher.run().await.unwrap();
        assert_eq!(second.processed, 0);
        assert!(second.published.is_empty());
        assert!(second.failed.is_empty());
    }

    #[tokio::test]
    async fn earliest_due_posts_are_published_first() {
        let repo = Arc::new(InMemoryPostRepository::new());
        let later = repo.insert(post_with_status(
            PostStatus::Scheduled,
            Some(Utc::now() - ChronoDuration::minutes(10)),
        ));
        let earlier = repo.insert(post_with_status(
            PostStatus::Scheduled,
            Some(Utc::now() - ChronoDuration::hours(3)),
        ));

        let publisher = ScheduledPublisher::new(repo, DISCOVERY_TIMEOUT);
        let report = publisher.run().await.unwrap();
        assert_eq!(report.published, vec![earlier.id, later.id]);
    }

    #[tokio::test]
    async fn row_failure_does_not_abort_the_run() {
        let repo = Arc::new(InMemoryPostRepository::new());
        let failing = repo.insert(post_with_status(
            PostStatus::Scheduled,
            Some(Utc::now() - ChronoDuration::hours(2)),
        ));
        let healthy = repo.insert(post_with_status(
            PostStatus::Scheduled,
            Some(Utc::now() - ChronoDuration::hours(1)),
        ));
        repo.fail_publish_ids.lock().unwrap().insert(failing.id);

        let publisher = ScheduledPublisher::new(Arc::clone(&repo), DISCOVERY_TIMEOUT);
        let report = publisher.run().await.unwrap();

        assert_eq!(report.processed, 2);
        assert_eq!(report.published, vec![healthy.id]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].id, failing.id);
        assert_eq!(repo.get(failing.id).unwrap().status, PostStatus::Scheduled);
    }

    #[tokio::test]
    async fn discovery_failure_aborts_the_run() {
        let repo = Arc::new(InMemoryPostRepository::new());
        repo.insert(post_with_status(
            PostStatus::Scheduled,
            Some(Utc::now() - ChronoDuration::hours(1)),
        ));
        repo.fail_discovery.store(true, Ordering::SeqCst);

        let publisher = ScheduledPublisher::new(Arc::clone(&repo), DISCOVERY_TIMEOUT);
        assert!(publisher.run().await.is_err());

        // Nothing was touched; the next tick picks the post up.
        repo.fail_discovery.store(false, Ordering::SeqCst);
        let report = publisher.run().await.unwrap();
        assert_eq!(report.published.len(), 1);
    }

    #[tokio::test]
    async fn scheduled_post_goes_live_end_to_end() {
        use crate::application::post_service::PostService;
        use crate::presentation::dto::CreatePostRequest;

        let repo = Arc::new(InMemoryPostRepository::new());
        let service = PostService::new(Arc::clone(&repo));
        let publisher = ScheduledPublisher::new(Arc::clone(&repo), DISCOVERY_TIMEOUT);

        let due = Utc::now() + ChronoDuration::milliseconds(500);
        let post = service
            .create_post(
                Uuid::new_v4(),
                CreatePostRequest {
                    title: "Open training night".into(),
                    content: "Bring your own ball".into(),
                    excerpt: Some("Friday at the indoor pitch".into()),
                    status: Some(PostStatus::Published),
                    published_at: Some(due),
                },
            )
            .await
            .unwrap();
        assert_eq!(post.status, PostStatus::Scheduled);
        assert!(!post.is_published);

        // Not due yet: the run leaves it alone.
        let report = publisher.run().await.unwrap();
        assert!(report.published.is_empty());

        tokio::time::sleep(Duration::from_millis(600)).await;
        let report = publisher.run().await.unwrap();
        assert_eq!(report.published, vec![post.id]);

        let live = repo.get(post.id).unwrap();
        assert_eq!(live.status, PostStatus::Published);
        assert!(live.is_published);
        assert!(!live.is_draft);
        assert_eq!(live.published_at, Some(due));
        assert!(live.updated_at > post.updated_at);
    }

    #[tokio::test]
    async fn racing_writer_makes_publish_a_silent_skip() {
        let repo = Arc::new(InMemoryPostRepository::new());
        let post = repo.insert(post_with_status(
            PostStatus::Scheduled,
            Some(Utc::now() - ChronoDuration::seconds(1)),
        ));

        // Simulate a concurrent run that wins the conditional update.
        assert!(repo.publish_scheduled(post.id, Utc::now()).await.unwrap());
        // The losing writer affects zero rows.
        assert!(!repo.publish_scheduled(post.id, Utc::now()).await.unwrap());

        // A full run over the same row reports neither publish nor failure.
        let publisher = ScheduledPublisher::new(Arc::clone(&repo), DISCOVERY_TIMEOUT);
        let report = publisher.run().await.unwrap();
        assert!(report.published.is_empty());
        assert!(report.failed.is_empty());
        assert_eq!(repo.get(post.id).unwrap().status, PostStatus::Published);
    }
}
