//! Poll endpoints.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use pollcast_common::{AppError, AppResult};
use pollcast_core::{CreatePollInput, PollWithStatus, VoteFilter, VoteFilterStats};
use pollcast_db::entities::poll::{self, PollCategory, PollOption};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    extractors::{AuthUser, MaybeAuthUser},
    middleware::AppState,
    response::ApiResponse,
};

/// Poll response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollResponse {
    pub id: String,
    pub title: String,
    pub description: String,
    pub options: Vec<PollOption>,
    pub created_by: String,
    pub category: PollCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub total_votes: i32,
    pub created_at: String,
    /// Only present for authenticated requests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_vote: Option<Option<String>>,
}

impl PollResponse {
    pub(crate) fn from_model(model: poll::Model, user_vote: Option<Option<String>>) -> AppResult<Self> {
        let options = model
            .parsed_options()
            .map_err(|e| AppError::Internal(format!("Invalid poll options: {e}")))?;

        Ok(Self {
            id: model.id,
            title: model.title,
            description: model.description,
            options,
            created_by: model.created_by,
            category: model.category,
            image: model.image,
            total_votes: model.total_votes,
            created_at: model.created_at.to_rfc3339(),
            user_vote,
        })
    }
}

/// Poll list response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollListResponse {
    pub polls: Vec<PollResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<VoteFilterStats>,
}

/// List polls query.
#[derive(Debug, Deserialize)]
pub struct ListPollsQuery {
    #[serde(default)]
    pub filter: VoteFilter,
}

/// List polls, newest first.
async fn list_polls(
    MaybeAuthUser(maybe_user): MaybeAuthUser,
    State(state): State<AppState>,
    Query(query): Query<ListPollsQuery>,
) -> AppResult<ApiResponse<PollListResponse>> {
    let Some(user) = maybe_user else {
        if query.filter != VoteFilter::All {
            return Err(AppError::Unauthorized);
        }
        let polls = state
            .poll_service
            .list_polls()
            .await?
            .into_iter()
            .map(|p| PollResponse::from_model(p, None))
            .collect::<AppResult<Vec<_>>>()?;
        return Ok(ApiResponse::ok(PollListResponse { polls, stats: None }));
    };

    let listing = state
        .poll_service
        .list_polls_for_user(&user.user_id, query.filter)
        .await?;

    let polls = listing
        .polls
        .into_iter()
        .map(|PollWithStatus { poll, user_vote }| PollResponse::from_model(poll, Some(user_vote)))
        .collect::<AppResult<Vec<_>>>()?;

    Ok(ApiResponse::ok(PollListResponse {
        polls,
        stats: Some(listing.stats),
    }))
}

/// Create poll request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePollRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 2000))]
    pub description: String,
    #[validate(length(min = 2, max = 10))]
    pub options: Vec<String>,
    #[serde(default)]
    pub category: PollCategory,
    #[serde(default)]
    pub image: Option<String>,
}

/// Create a poll.
async fn create_poll(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<CreatePollRequest>,
) -> AppResult<ApiResponse<PollResponse>> {
    req.validate()?;

    let poll = state
        .poll_service
        .create_poll(
            &user.user_id,
            CreatePollInput {
                title: req.title,
                description: req.description,
                options: req.options,
                category: req.category,
                image: req.image,
            },
        )
        .await?;

    Ok(ApiResponse::ok(PollResponse::from_model(poll, Some(None))?))
}

/// Get a poll.
async fn show_poll(
    MaybeAuthUser(maybe_user): MaybeAuthUser,
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
) -> AppResult<ApiResponse<PollResponse>> {
    let poll = state.poll_service.get_poll(&poll_id).await?;

    let user_vote = match maybe_user {
        Some(user) => Some(
            state
                .poll_service
                .votes()
                .get_user_vote(&poll_id, &user.user_id)
                .await?,
        ),
        None => None,
    };

    Ok(ApiResponse::ok(PollResponse::from_model(poll, user_vote)?))
}

/// Create poll router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_polls).post(create_poll))
        .route("/{id}", get(show_poll))
}
