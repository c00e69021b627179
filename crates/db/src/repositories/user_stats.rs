//! User stats repository.

use std::sync::Arc;

use crate::entities::{UserStats, user_stats};
use chrono::Utc;
use pollcast_common::{AppError, AppResult};
use sea_orm::{
    DatabaseConnection, EntityTrait, Set,
    sea_query::{Expr, OnConflict},
};

/// Repository for per-user poll counters.
#[derive(Clone)]
pub struct UserStatsRepository {
    db: Arc<DatabaseConnection>,
}

impl UserStatsRepository {
    /// Create a new user stats repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find counters for a user.
    pub async fn find_by_user_id(&self, user_id: &str) -> AppResult<Option<user_stats::Model>> {
        UserStats::find_by_id(user_id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Bump `polls_created` for a user, creating the row on first use.
    pub async fn increment_polls_created(&self, user_id: &str) -> AppResult<()> {
        self.increment(user_id, user_stats::Column::PollsCreated, (1, 0))
            .await
    }

    /// Bump `polls_voted` for a user, creating the row on first use.
    pub async fn increment_polls_voted(&self, user_id: &str) -> AppResult<()> {
        self.increment(user_id, user_stats::Column::PollsVoted, (0, 1))
            .await
    }

    /// `initial` is the `(polls_created, polls_voted)` pair used when the row does not exist yet.
    async fn increment(
        &self,
        user_id: &str,
        column: user_stats::Column,
        initial: (i32, i32),
    ) -> AppResult<()> {
        let model = user_stats::ActiveModel {
            user_id: Set(user_id.to_string()),
            polls_created: Set(initial.0),
            polls_voted: Set(initial.1),
            updated_at: Set(Utc::now().into()),
        };

        UserStats::insert(model)
            .on_conflict(
                OnConflict::column(user_stats::Column::UserId)
                    .value(column, Expr::col((UserStats, column)).add(1))
                    .value(user_stats::Column::UpdatedAt, Expr::current_timestamp())
                    .to_owned(),
            )
            .exec_without_returning(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    #[tokio::test]
    async fn test_increment_polls_created() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );

        let repo = UserStatsRepository::new(db);
        assert!(repo.increment_polls_created("user1").await.is_ok());
    }

    #[tokio::test]
    async fn test_find_by_user_id() {
        let stats = user_stats::Model {
            user_id: "user1".to_string(),
            polls_created: 2,
            polls_voted: 5,
            updated_at: Utc::now().into(),
        };

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[stats]])
                .into_connection(),
        );

        let repo = UserStatsRepository::new(db);
        let found = repo.find_by_user_id("user1").await.unwrap().unwrap();
        assert_eq!(found.polls_created, 2);
        assert_eq!(found.polls_voted, 5);
    }
}
