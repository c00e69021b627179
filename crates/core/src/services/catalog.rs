//! Poll catalog and comment store.
//!
//! Poll metadata and comments live outside the vote store. The traits here are
//! what the services consume; the database implementations wrap the sea-orm
//! repositories and the in-memory ones back tests and single-process runs.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use pollcast_common::{AppResult, IdGenerator};
use pollcast_db::entities::{comment, poll};
use pollcast_db::repositories::{CommentRepository, PollRepository, UserStatsRepository};
use sea_orm::Set;
use tokio::sync::RwLock;
use tracing::warn;

/// Read/write access to poll metadata.
#[async_trait]
pub trait PollCatalog: Send + Sync {
    /// All polls, newest first.
    async fn list_polls(&self) -> AppResult<Vec<poll::Model>>;

    /// A single poll.
    async fn find_poll(&self, poll_id: &str) -> AppResult<Option<poll::Model>>;

    /// Store a new poll and count it against its creator. Returns the poll id.
    async fn create_poll(&self, poll: poll::Model) -> AppResult<String>;

    /// Bump the poll's vote total and the voter's voted-polls counter.
    async fn record_vote(&self, poll_id: &str, user_id: &str) -> AppResult<()>;
}

/// Append-only comments keyed by poll.
#[async_trait]
pub trait CommentStore: Send + Sync {
    /// Add a comment.
    async fn add_comment(
        &self,
        poll_id: &str,
        user_id: &str,
        user_name: Option<&str>,
        text: &str,
    ) -> AppResult<comment::Model>;

    /// Comments on a poll, oldest first.
    async fn list_comments(&self, poll_id: &str) -> AppResult<Vec<comment::Model>>;
}

/// `PostgreSQL` poll catalog.
#[derive(Clone)]
pub struct DbPollCatalog {
    poll_repo: PollRepository,
    stats_repo: UserStatsRepository,
}

impl DbPollCatalog {
    /// Create a new catalog.
    #[must_use]
    pub const fn new(poll_repo: PollRepository, stats_repo: UserStatsRepository) -> Self {
        Self {
            poll_repo,
            stats_repo,
        }
    }
}

#[async_trait]
impl PollCatalog for DbPollCatalog {
    async fn list_polls(&self) -> AppResult<Vec<poll::Model>> {
        self.poll_repo.find_newest_first(None).await
    }

    async fn find_poll(&self, poll_id: &str) -> AppResult<Option<poll::Model>> {
        self.poll_repo.find_by_id(poll_id).await
    }

    async fn create_poll(&self, poll: poll::Model) -> AppResult<String> {
        let created_by = poll.created_by.clone();
        let model = poll::ActiveModel {
            id: Set(poll.id),
            title: Set(poll.title),
            description: Set(poll.description),
            options: Set(poll.options),
            created_by: Set(poll.created_by),
            category: Set(poll.category),
            image: Set(poll.image),
            total_votes: Set(poll.total_votes),
            created_at: Set(poll.created_at),
        };
        let created = self.poll_repo.create(model).await?;

        if let Err(e) = self.stats_repo.increment_polls_created(&created_by).await {
            warn!(user_id = %created_by, error = %e, "Failed to update polls_created");
        }

        Ok(created.id)
    }

    async fn record_vote(&self, poll_id: &str, user_id: &str) -> AppResult<()> {
        self.poll_repo.increment_total_votes(poll_id).await?;
        self.stats_repo.increment_polls_voted(user_id).await
    }
}

/// `PostgreSQL` comment store.
#[derive(Clone)]
pub struct DbCommentStore {
    comment_repo: CommentRepository,
    id_gen: IdGenerator,
}

impl DbCommentStore {
    /// Create a new comment store.
    #[must_use]
    pub const fn new(comment_repo: CommentRepository) -> Self {
        Self {
            comment_repo,
            id_gen: IdGenerator::new(),
        }
    }
}

#[async_trait]
impl CommentStore for DbCommentStore {
    async fn add_comment(
        &self,
        poll_id: &str,
        user_id: &str,
        user_name: Option<&str>,
        text: &str,
    ) -> AppResult<comment::Model> {
        let model = comment::ActiveModel {
            id: Set(self.id_gen.generate()),
            poll_id: Set(poll_id.to_string()),
            user_id: Set(user_id.to_string()),
            user_name: Set(user_name.map(str::to_string)),
            text: Set(text.to_string()),
            created_at: Set(Utc::now().into()),
        };
        self.comment_repo.create(model).await
    }

    async fn list_comments(&self, poll_id: &str) -> AppResult<Vec<comment::Model>> {
        self.comment_repo.find_by_poll(poll_id).await
    }
}

/// Per-user counters kept by [`InMemoryPollCatalog`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserCounters {
    pub polls_created: i32,
    pub polls_voted: i32,
}

/// Poll catalog held in memory.
#[derive(Default)]
pub struct InMemoryPollCatalog {
    polls: RwLock<Vec<poll::Model>>,
    counters: RwLock<HashMap<String, UserCounters>>,
}

impl InMemoryPollCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Counters for `user_id`.
    pub async fn counters(&self, user_id: &str) -> UserCounters {
        self.counters
            .read()
            .await
            .get(user_id)
            .copied()
            .unwrap_or_default()
    }
}

#[async_trait]
impl PollCatalog for InMemoryPollCatalog {
    async fn list_polls(&self) -> AppResult<Vec<poll::Model>> {
        let mut polls = self.polls.read().await.clone();
        polls.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(polls)
    }

    async fn find_poll(&self, poll_id: &str) -> AppResult<Option<poll::Model>> {
        Ok(self
            .polls
            .read()
            .await
            .iter()
            .find(|p| p.id == poll_id)
            .cloned())
    }

    async fn create_poll(&self, poll: poll::Model) -> AppResult<String> {
        let id = poll.id.clone();
        self.counters
            .write()
            .await
            .entry(poll.created_by.clone())
            .or_default()
            .polls_created += 1;
        self.polls.write().await.push(poll);
        Ok(id)
    }

    async fn record_vote(&self, poll_id: &str, user_id: &str) -> AppResult<()> {
        if let Some(poll) = self.polls.write().await.iter_mut().find(|p| p.id == poll_id) {
            poll.total_votes += 1;
        }
        self.counters
            .write()
            .await
            .entry(user_id.to_string())
            .or_default()
            .polls_voted += 1;
        Ok(())
    }
}

/// Comment store held in memory.
#[derive(Default)]
pub struct InMemoryCommentStore {
    comments: RwLock<HashMap<String, Vec<comment::Model>>>,
    id_gen: IdGenerator,
}

impl InMemoryCommentStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CommentStore for InMemoryCommentStore {
    async fn add_comment(
        &self,
        poll_id: &str,
        user_id: &str,
        user_name: Option<&str>,
        text: &str,
    ) -> AppResult<comment::Model> {
        let model = comment::Model {
            id: self.id_gen.generate(),
            poll_id: poll_id.to_string(),
            user_id: user_id.to_string(),
            user_name: user_name.map(str::to_string),
            text: text.to_string(),
            created_at: Utc::now().into(),
        };
        self.comments
            .write()
            .await
            .entry(poll_id.to_string())
            .or_default()
            .push(model.clone());
        Ok(model)
    }

    async fn list_comments(&self, poll_id: &str) -> AppResult<Vec<comment::Model>> {
        Ok(self
            .comments
            .read()
            .await
            .get(poll_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// Shared handles to the collaborators the services need.
#[derive(Clone)]
pub struct Collaborators {
    pub catalog: Arc<dyn PollCatalog>,
    pub comments: Arc<dyn CommentStore>,
}

impl Collaborators {
    /// Database-backed collaborators sharing one connection.
    #[must_use]
    pub fn database(db: Arc<sea_orm::DatabaseConnection>) -> Self {
        Self {
            catalog: Arc::new(DbPollCatalog::new(
                PollRepository::new(db.clone()),
                UserStatsRepository::new(db.clone()),
            )),
            comments: Arc::new(DbCommentStore::new(CommentRepository::new(db))),
        }
    }

    /// In-memory collaborators.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            catalog: Arc::new(InMemoryPollCatalog::new()),
            comments: Arc::new(InMemoryCommentStore::new()),
        }
    }
}
