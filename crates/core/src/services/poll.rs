//! Poll service.

use std::sync::Arc;

use chrono::Utc;
use futures::{StreamExt, stream::BoxStream};
use pollcast_common::{AppError, AppResult, IdGenerator};
use pollcast_db::entities::poll::{self, PollCategory, PollOption};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use super::aggregator::{AggregateResult, AvatarPolicy, aggregate};
use super::catalog::PollCatalog;
use super::vote_store::{CastVote, VoteStore, VoterIdentity};

const MIN_OPTIONS: usize = 2;
const MAX_OPTIONS: usize = 10;
const MAX_OPTION_LEN: usize = 100;

/// Poll service for business logic.
#[derive(Clone)]
pub struct PollService {
    catalog: Arc<dyn PollCatalog>,
    votes: VoteStore,
    avatars: Arc<dyn AvatarPolicy>,
    id_gen: IdGenerator,
}

/// Input for creating a poll.
#[derive(Debug, Clone, Default)]
pub struct CreatePollInput {
    pub title: String,
    pub description: String,
    pub options: Vec<String>,
    pub category: PollCategory,
    pub image: Option<String>,
}

/// Which polls to list for a user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteFilter {
    #[default]
    All,
    Voted,
    Unvoted,
}

/// Poll with the requesting user's vote.
#[derive(Debug, Clone)]
pub struct PollWithStatus {
    pub poll: poll::Model,
    pub user_vote: Option<String>,
}

/// Counts behind the voted/unvoted tabs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VoteFilterStats {
    pub voted: usize,
    pub unvoted: usize,
    pub total: usize,
}

/// Filtered poll listing.
#[derive(Debug, Clone)]
pub struct PollListing {
    pub polls: Vec<PollWithStatus>,
    pub stats: VoteFilterStats,
}

impl PollService {
    /// Create a new poll service.
    #[must_use]
    pub fn new(
        catalog: Arc<dyn PollCatalog>,
        votes: VoteStore,
        avatars: Arc<dyn AvatarPolicy>,
    ) -> Self {
        Self {
            catalog,
            votes,
            avatars,
            id_gen: IdGenerator::new(),
        }
    }

    /// The underlying vote store.
    #[must_use]
    pub const fn votes(&self) -> &VoteStore {
        &self.votes
    }

    /// Create a poll.
    pub async fn create_poll(
        &self,
        creator_id: &str,
        input: CreatePollInput,
    ) -> AppResult<poll::Model> {
        let title = input.title.trim();
        let description = input.description.trim();
        if title.is_empty() {
            return Err(AppError::BadRequest("Poll title is required".to_string()));
        }
        if description.is_empty() {
            return Err(AppError::BadRequest(
                "Poll description is required".to_string(),
            ));
        }

        let choices: Vec<&str> = input
            .options
            .iter()
            .map(String::as_str)
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .collect();

        if choices.len() < MIN_OPTIONS {
            return Err(AppError::BadRequest(
                "Poll must have at least 2 options".to_string(),
            ));
        }
        if choices.len() > MAX_OPTIONS {
            return Err(AppError::BadRequest(
                "Poll cannot have more than 10 options".to_string(),
            ));
        }
        if choices.iter().any(|c| c.chars().count() > MAX_OPTION_LEN) {
            return Err(AppError::BadRequest(
                "Poll option is too long (max 100 chars)".to_string(),
            ));
        }

        let options: Vec<PollOption> = choices
            .iter()
            .enumerate()
            .map(|(i, text)| PollOption {
                id: self.id_gen.option_id(i),
                text: (*text).to_string(),
            })
            .collect();

        let model = poll::Model {
            id: self.id_gen.generate(),
            title: title.to_string(),
            description: description.to_string(),
            options: json!(options),
            created_by: creator_id.to_string(),
            category: input.category,
            image: input.image.filter(|i| !i.trim().is_empty()),
            total_votes: 0,
            created_at: Utc::now().into(),
        };

        self.catalog.create_poll(model.clone()).await?;
        info!(poll_id = %model.id, created_by = %creator_id, "Poll created");

        Ok(model)
    }

    /// All polls, newest first.
    pub async fn list_polls(&self) -> AppResult<Vec<poll::Model>> {
        self.catalog.list_polls().await
    }

    /// Polls annotated with `user_id`'s votes, narrowed by `filter`.
    ///
    /// The stats always describe the unfiltered list.
    pub async fn list_polls_for_user(
        &self,
        user_id: &str,
        filter: VoteFilter,
    ) -> AppResult<PollListing> {
        let polls = self.catalog.list_polls().await?;

        let mut annotated = Vec::with_capacity(polls.len());
        for poll in polls {
            let user_vote = self.votes.get_user_vote(&poll.id, user_id).await?;
            annotated.push(PollWithStatus { poll, user_vote });
        }

        let voted = annotated.iter().filter(|p| p.user_vote.is_some()).count();
        let stats = VoteFilterStats {
            voted,
            unvoted: annotated.len() - voted,
            total: annotated.len(),
        };

        annotated.retain(|p| match filter {
            VoteFilter::All => true,
            VoteFilter::Voted => p.user_vote.is_some(),
            VoteFilter::Unvoted => p.user_vote.is_none(),
        });

        Ok(PollListing {
            polls: annotated,
            stats,
        })
    }

    /// Get a poll by ID.
    pub async fn get_poll(&self, poll_id: &str) -> AppResult<poll::Model> {
        self.catalog
            .find_poll(poll_id)
            .await?
            .ok_or_else(|| AppError::PollNotFound(poll_id.to_string()))
    }

    async fn poll_options(&self, poll_id: &str) -> AppResult<Vec<PollOption>> {
        self.get_poll(poll_id)
            .await?
            .parsed_options()
            .map_err(|e| AppError::Internal(format!("Invalid poll options: {e}")))
    }

    /// Vote on a poll.
    pub async fn cast_vote(
        &self,
        poll_id: &str,
        option_id: &str,
        voter: &VoterIdentity,
    ) -> AppResult<CastVote> {
        let options = self.poll_options(poll_id).await?;
        if !options.iter().any(|o| o.id == option_id) {
            return Err(AppError::OptionNotFound {
                poll_id: poll_id.to_string(),
                option_id: option_id.to_string(),
            });
        }

        let cast = self.votes.cast_vote(poll_id, option_id, voter).await?;

        if cast.is_new {
            if let Err(e) = self.catalog.record_vote(poll_id, &voter.user_id).await {
                warn!(poll_id = %poll_id, user_id = %voter.user_id, error = %e, "Failed to record vote total");
            }
        }

        Ok(cast)
    }

    /// The option `user_id` picked, if any.
    pub async fn get_user_vote(&self, poll_id: &str, user_id: &str) -> AppResult<Option<String>> {
        self.get_poll(poll_id).await?;
        self.votes.get_user_vote(poll_id, user_id).await
    }

    /// Current results of a poll.
    pub async fn results(&self, poll_id: &str) -> AppResult<AggregateResult> {
        let options = self.poll_options(poll_id).await?;
        let raw = self.votes.snapshot(poll_id).await?;
        Ok(aggregate(poll_id, &options, &raw, self.avatars.as_ref()))
    }

    /// Live results: one aggregate per vote snapshot, starting with the current one.
    pub async fn watch_results(
        &self,
        poll_id: &str,
    ) -> AppResult<BoxStream<'static, AggregateResult>> {
        let options = self.poll_options(poll_id).await?;
        let subscription = self.votes.subscribe(poll_id).await?;
        let avatars = self.avatars.clone();
        let poll_id = poll_id.to_string();

        Ok(subscription
            .into_stream()
            .map(move |raw| aggregate(&poll_id, &options, &raw, avatars.as_ref()))
            .boxed())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::aggregator::PlaceholderAvatarPolicy;
    use crate::services::catalog::InMemoryPollCatalog;
    use crate::services::memory_backend::InMemoryVoteBackend;

    struct Fixture {
        service: PollService,
        catalog: Arc<InMemoryPollCatalog>,
    }

    fn fixture() -> Fixture {
        let catalog = Arc::new(InMemoryPollCatalog::new());
        let service = PollService::new(
            catalog.clone(),
            VoteStore::new(Arc::new(InMemoryVoteBackend::new())),
            Arc::new(PlaceholderAvatarPolicy::default()),
        );
        Fixture { service, catalog }
    }

    fn input(options: &[&str]) -> CreatePollInput {
        CreatePollInput {
            title: "  Lunch  ".to_string(),
            description: "Where should we eat?".to_string(),
            options: options.iter().map(|o| (*o).to_string()).collect(),
            category: PollCategory::Other,
            image: None,
        }
    }

    #[tokio::test]
    async fn test_create_poll_assigns_option_ids() {
        let f = fixture();
        let poll = f
            .service
            .create_poll("creator", input(&["Pizza", " ", "Tacos"]))
            .await
            .unwrap();

        assert_eq!(poll.title, "Lunch");
        assert_eq!(poll.id.len(), 26);
        let options = poll.parsed_options().unwrap();
        assert_eq!(options.len(), 2);
        assert_eq!(options[0].id, "option_0");
        assert_eq!(options[1].id, "option_1");
        assert_eq!(options[1].text, "Tacos");
        assert_eq!(f.catalog.counters("creator").await.polls_created, 1);
    }

    #[tokio::test]
    async fn test_create_poll_validation() {
        let f = fixture();

        let too_few = f.service.create_poll("c", input(&["Only", "  "])).await;
        assert!(matches!(too_few, Err(AppError::BadRequest(_))));

        let many: Vec<String> = (0..11).map(|i| format!("Choice {i}")).collect();
        let many_refs: Vec<&str> = many.iter().map(String::as_str).collect();
        let too_many = f.service.create_poll("c", input(&many_refs)).await;
        assert!(matches!(too_many, Err(AppError::BadRequest(_))));

        let long = "x".repeat(101);
        let too_long = f.service.create_poll("c", input(&["ok", &long])).await;
        assert!(matches!(too_long, Err(AppError::BadRequest(_))));

        let mut untitled = input(&["a", "b"]);
        untitled.title = "   ".to_string();
        assert!(matches!(
            f.service.create_poll("c", untitled).await,
            Err(AppError::BadRequest(_))
        ));

        let mut undescribed = input(&["a", "b"]);
        undescribed.description = String::new();
        assert!(matches!(
            f.service.create_poll("c", undescribed).await,
            Err(AppError::BadRequest(_))
        ));

        assert!(f.service.list_polls().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_poll_not_found() {
        let f = fixture();
        match f.service.get_poll("missing").await {
            Err(AppError::PollNotFound(id)) => assert_eq!(id, "missing"),
            other => panic!("Expected PollNotFound error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cast_vote_validates_option() {
        let f = fixture();
        let poll = f.service.create_poll("c", input(&["a", "b"])).await.unwrap();

        let result = f
            .service
            .cast_vote(&poll.id, "option_7", &VoterIdentity::new("u1"))
            .await;

        assert!(matches!(result, Err(AppError::OptionNotFound { .. })));
    }

    #[tokio::test]
    async fn test_cast_vote_unknown_poll() {
        let f = fixture();
        let result = f
            .service
            .cast_vote("nope", "option_0", &VoterIdentity::new("u1"))
            .await;
        assert!(matches!(result, Err(AppError::PollNotFound(_))));
    }

    #[tokio::test]
    async fn test_cast_vote_records_total_once() {
        let f = fixture();
        let poll = f.service.create_poll("c", input(&["a", "b"])).await.unwrap();
        let voter = VoterIdentity::new("u1").with_display_name("Alice");

        f.service.cast_vote(&poll.id, "option_0", &voter).await.unwrap();
        f.service.cast_vote(&poll.id, "option_0", &voter).await.unwrap();
        let second = f.service.cast_vote(&poll.id, "option_1", &voter).await;

        assert!(matches!(second, Err(AppError::AlreadyVoted(_))));
        assert_eq!(f.service.get_poll(&poll.id).await.unwrap().total_votes, 1);
        assert_eq!(f.catalog.counters("u1").await.polls_voted, 1);
    }

    #[tokio::test]
    async fn test_results_scenarios() {
        let f = fixture();
        let poll = f.service.create_poll("c", input(&["a", "b"])).await.unwrap();

        f.service
            .cast_vote(&poll.id, "option_0", &VoterIdentity::new("u1"))
            .await
            .unwrap();
        let one = f.service.results(&poll.id).await.unwrap();
        assert_eq!(one.total_votes, 1);
        assert_eq!(one.options[0].percentage, 100.0);
        assert_eq!(one.options[1].percentage, 0.0);
        assert_eq!(one.options[0].voters[0].name, "Anonymous");

        f.service
            .cast_vote(&poll.id, "option_1", &VoterIdentity::new("u2"))
            .await
            .unwrap();
        let two = f.service.results(&poll.id).await.unwrap();
        assert_eq!(two.options[0].votes, 1);
        assert_eq!(two.options[1].votes, 1);
        assert_eq!(two.options[0].percentage, 50.0);
        assert_eq!(two.options[1].percentage, 50.0);
    }

    #[tokio::test]
    async fn test_profile_update_shows_in_results() {
        let f = fixture();
        let voter = VoterIdentity::new("u1").with_display_name("Old Name");
        let mut poll_ids = Vec::new();
        for _ in 0..3 {
            let poll = f.service.create_poll("c", input(&["a", "b"])).await.unwrap();
            f.service.cast_vote(&poll.id, "option_1", &voter).await.unwrap();
            poll_ids.push(poll.id);
        }

        let update = crate::services::vote_store::ProfileUpdate {
            display_name: Some("New Name".to_string()),
            avatar_ref: None,
        };
        let updated = f
            .service
            .votes()
            .propagate_profile_update("u1", &update)
            .await
            .unwrap();
        assert_eq!(updated, 3);

        for poll_id in poll_ids {
            let result = f.service.results(&poll_id).await.unwrap();
            assert_eq!(result.options[1].voters[0].name, "New Name");
        }
    }

    #[tokio::test]
    async fn test_list_polls_for_user_filters() {
        let f = fixture();
        let first = f.service.create_poll("c", input(&["a", "b"])).await.unwrap();
        f.service.create_poll("c", input(&["c", "d"])).await.unwrap();
        f.service
            .cast_vote(&first.id, "option_0", &VoterIdentity::new("u1"))
            .await
            .unwrap();

        let voted = f
            .service
            .list_polls_for_user("u1", VoteFilter::Voted)
            .await
            .unwrap();
        assert_eq!(voted.polls.len(), 1);
        assert_eq!(voted.polls[0].poll.id, first.id);
        assert_eq!(voted.polls[0].user_vote.as_deref(), Some("option_0"));
        assert_eq!(
            voted.stats,
            VoteFilterStats {
                voted: 1,
                unvoted: 1,
                total: 2
            }
        );

        let unvoted = f
            .service
            .list_polls_for_user("u1", VoteFilter::Unvoted)
            .await
            .unwrap();
        assert_eq!(unvoted.polls.len(), 1);
        assert!(unvoted.polls[0].user_vote.is_none());

        let all = f
            .service
            .list_polls_for_user("u1", VoteFilter::All)
            .await
            .unwrap();
        assert_eq!(all.polls.len(), 2);
    }

    #[tokio::test]
    async fn test_watch_results_streams_updates() {
        let f = fixture();
        let poll = f.service.create_poll("c", input(&["a", "b"])).await.unwrap();
        let mut results = f.service.watch_results(&poll.id).await.unwrap();

        let initial = results.next().await.unwrap();
        assert_eq!(initial.total_votes, 0);

        f.service
            .cast_vote(&poll.id, "option_1", &VoterIdentity::new("u1"))
            .await
            .unwrap();
        let updated = results.next().await.unwrap();
        assert_eq!(updated.total_votes, 1);
        assert_eq!(updated.options[1].votes, 1);
    }

    #[test]
    fn test_vote_filter_parses() {
        let filter: VoteFilter = serde_json::from_str("\"unvoted\"").unwrap();
        assert_eq!(filter, VoteFilter::Unvoted);
        assert_eq!(VoteFilter::default(), VoteFilter::All);
    }
}
