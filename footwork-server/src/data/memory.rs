//! In-memory repository implementations for tests. Behavior mirrors the
//! Postgres implementations, including the conditional-update semantics of
//! `publish_scheduled`, so service and job logic can be exercised without a
//! database. Failure injection flags simulate transient store errors.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::error::DomainError;
use crate::domain::post::{Post, PostStatus};
use crate::domain::user::User;

use super::post_repository::{PostFilter, PostRepository, PostUpdate};
use super::rate_limit_repository::{RateLimitRecord, RateLimitStore};
use super::user_repository::UserRepository;

#[derive(Default)]
pub struct InMemoryPostRepository {
    posts: Mutex<Vec<Post>>,
    next_id: AtomicI64,
    pub fail_discovery: AtomicBool,
    pub fail_publish_ids: Mutex<HashSet<i64>>,
}

impl InMemoryPostRepository {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            ..Self::default()
        }
    }

    /// Seed a post exactly as given, assigning only the id.
    pub fn insert(&self, mut post: Post) -> Post {
        post.id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.posts.lock().unwrap().push(post.clone());
        post
    }

    pub fn get(&self, id: i64) -> Option<Post> {
        self.posts.lock().unwrap().iter().find(|p| p.id == id).cloned()
    }
}

#[async_trait]
impl PostRepository for InMemoryPostRepository {
    async fn create(&self, mut post: Post) -> Result<Post, DomainError> {
        post.id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.posts.lock().unwrap().push(post.clone());
        Ok(post)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Post>, DomainError> {
        Ok(self.get(id))
    }

    async fn update(&self, id: i64, update: PostUpdate) -> Result<Option<Post>, DomainError> {
        let mut posts = self.posts.lock().unwrap();
        let Some(post) = posts.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        if let Some(title) = update.title {
            post.title = title;
        }
        if let Some(content) = update.content {
            post.content = content;
        }
        if let Some(excerpt) = update.excerpt {
            post.excerpt = excerpt;
        }
        post.status = update.status;
        let (is_published, is_draft) = update.status.flags();
        post.is_published = is_published;
        post.is_draft = is_draft;
        post.published_at = update.published_at;
        post.updated_at = Utc::now();
        Ok(Some(post.clone()))
    }

    async fn delete(&self, id: i64) -> Result<bool, DomainError> {
        let mut posts = self.posts.lock().unwrap();
        let before = posts.len();
        posts.retain(|p| p.id != id);
        Ok(posts.len() < before)
    }

    async fn list(&self, filter: PostFilter) -> Result<Vec<Post>, DomainError> {
        let posts = self.posts.lock().unwrap();
        let needle = filter.search.as_deref().map(str::to_lowercase);
        let mut matched: Vec<Post> = posts
            .iter()
            .filter(|p| filter.status.map_or(true, |s| p.status == s))
            .filter(|p| {
                needle.as_deref().map_or(true, |n| {
                    p.title.to_lowercase().contains(n) || p.content.to_lowercase().contains(n)
                })
            })
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let offset = filter.offset.unwrap_or(0);
        let limit = filter.limit.unwrap_or(10).min(100);
        Ok(matched.into_iter().skip(offset).take(limit).collect())
    }

    async fn count(&self, filter: &PostFilter) -> Result<i64, DomainError> {
        let posts = self.posts.lock().unwrap();
        let needle = filter.search.as_deref().map(str::to_lowercase);
        let total = posts
            .iter()
            .filter(|p| filter.status.map_or(true, |s| p.status == s))
            .filter(|p| {
                needle.as_deref().map_or(true, |n| {
                    p.title.to_lowercase().contains(n) || p.content.to_lowercase().contains(n)
                })
            })
            .count();
        Ok(total as i64)
    }

    async fn find_due_scheduled(&self, now: DateTime<Utc>) -> Result<Vec<Post>, DomainError> {
        if self.fail_discovery.load(Ordering::SeqCst) {
            return Err(DomainError::Internal("connection reset".into()));
        }
        let posts = self.posts.lock().unwrap();
        let mut due: Vec<Post> = posts
            .iter()
            .filter(|p| p.status == PostStatus::Scheduled)
            .filter(|p| p.published_at.is_some_and(|at| at <= now))
            .cloned()
            .collect();
        due.sort_by_key(|p| p.published_at);
        Ok(due)
    }

    async fn publish_scheduled(&self, id: i64, now: DateTime<Utc>) -> Result<bool, DomainError> {
        if self.fail_publish_ids.lock().unwrap().contains(&id) {
            return Err(DomainError::Internal("write timeout".into()));
        }
        let mut posts = self.posts.lock().unwrap();
        let Some(post) = posts.iter_mut().find(|p| p.id == id) else {
            return Ok(false);
        };
        if post.status != PostStatus::Scheduled {
            return Ok(false);
        }
        post.status = PostStatus::Published;
        post.is_published = true;
        post.is_draft = false;
        post.updated_at = now;
        Ok(true)
    }
}

#[derive(Default)]
pub struct InMemoryRateLimitStore {
    records: Mutex<HashMap<(String, String), RateLimitRecord>>,
    pub failing: AtomicBool,
}

impl InMemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_failure(&self) -> Result<(), DomainError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DomainError::Internal("connection refused".into()));
        }
        Ok(())
    }

    pub fn record_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimitStore {
    async fn find(
        &self,
        ip: &str,
        endpoint: &str,
    ) -> Result<Option<RateLimitRecord>, DomainError> {
        self.check_failure()?;
        let records = self.records.lock().unwrap();
        Ok(records.get(&(ip.to_string(), endpoint.to_string())).cloned())
    }

    async fn start_window(
        &self,
        ip: &str,
        endpoint: &str,
        window_start: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.check_failure()?;
        let mut records = self.records.lock().unwrap();
        records.insert(
            (ip.to_string(), endpoint.to_string()),
            RateLimitRecord {
                ip: ip.to_string(),
                endpoint: endpoint.to_string(),
                requests: 1,
                window_start,
            },
        );
        Ok(())
    }

    async fn increment(&self, ip: &str, endpoint: &str) -> Result<(), DomainError> {
        self.check_failure()?;
        let mut records = self.records.lock().unwrap();
        if let Some(record) = records.get_mut(&(ip.to_string(), endpoint.to_string())) {
            record.requests += 1;
        }
        Ok(())
    }

    async fn delete_expired(&self, cutoff: DateTime<Utc>) -> Result<u64, DomainError> {
        self.check_failure()?;
        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|_, r| r.window_start >= cutoff);
        Ok((before - records.len()) as u64)
    }
}

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: Mutex<Vec<User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, user: User) -> Result<User, DomainError> {
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|u| u.email == user.email) {
            return Err(DomainError::UserAlreadyExists(user.email.clone()));
        }
        users.push(user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: uuid::Uuid) -> Result<Option<User>, DomainError> {
        Ok(self.users.lock().unwrap().iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DomainError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }
}
