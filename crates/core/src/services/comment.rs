//! Comment service.

use std::sync::Arc;

use pollcast_common::{AppError, AppResult};
use pollcast_db::entities::comment;
use tracing::debug;

use super::catalog::{CommentStore, PollCatalog};
use super::vote_store::VoterIdentity;

/// Longest comment accepted, in characters.
pub const MAX_COMMENT_LEN: usize = 500;

/// Comment service for business logic.
#[derive(Clone)]
pub struct CommentService {
    catalog: Arc<dyn PollCatalog>,
    comments: Arc<dyn CommentStore>,
}

impl CommentService {
    /// Create a new comment service.
    #[must_use]
    pub fn new(catalog: Arc<dyn PollCatalog>, comments: Arc<dyn CommentStore>) -> Self {
        Self { catalog, comments }
    }

    async fn ensure_poll(&self, poll_id: &str) -> AppResult<()> {
        match self.catalog.find_poll(poll_id).await? {
            Some(_) => Ok(()),
            None => Err(AppError::PollNotFound(poll_id.to_string())),
        }
    }

    /// Comment on a poll.
    pub async fn add_comment(
        &self,
        poll_id: &str,
        author: &VoterIdentity,
        text: &str,
    ) -> AppResult<comment::Model> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::BadRequest("Comment cannot be empty".to_string()));
        }
        if text.chars().count() > MAX_COMMENT_LEN {
            return Err(AppError::BadRequest(format!(
                "Comment is too long (max {MAX_COMMENT_LEN} chars)"
            )));
        }

        self.ensure_poll(poll_id).await?;

        let comment = self
            .comments
            .add_comment(
                poll_id,
                &author.user_id,
                author.display_name.as_deref(),
                text,
            )
            .await?;
        debug!(poll_id = %poll_id, comment_id = %comment.id, "Comment added");
        Ok(comment)
    }

    /// Comments on a poll, oldest first.
    pub async fn list_comments(&self, poll_id: &str) -> AppResult<Vec<comment::Model>> {
        self.ensure_poll(poll_id).await?;
        self.comments.list_comments(poll_id).await
    }
}
