//! Vote and results endpoints.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use pollcast_common::AppResult;
use pollcast_core::AggregateResult;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

/// Vote request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    #[validate(length(min = 1, max = 64))]
    pub option_id: String,
}

/// Vote response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteResponse {
    pub poll_id: String,
    pub option_id: String,
    pub is_new: bool,
}

/// Cast a vote.
async fn cast_vote(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
    Json(req): Json<VoteRequest>,
) -> AppResult<ApiResponse<VoteResponse>> {
    req.validate()?;

    let cast = state
        .poll_service
        .cast_vote(&poll_id, &req.option_id, &user)
        .await?;

    Ok(ApiResponse::ok(VoteResponse {
        poll_id: cast.record.poll_id,
        option_id: cast.record.option_id,
        is_new: cast.is_new,
    }))
}

/// The caller's vote on a poll.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MyVoteResponse {
    pub option_id: Option<String>,
}

/// Get the caller's vote.
async fn my_vote(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
) -> AppResult<ApiResponse<MyVoteResponse>> {
    let option_id = state
        .poll_service
        .get_user_vote(&poll_id, &user.user_id)
        .await?;

    Ok(ApiResponse::ok(MyVoteResponse { option_id }))
}

/// Current results.
async fn results(
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
) -> AppResult<ApiResponse<AggregateResult>> {
    Ok(ApiResponse::ok(state.poll_service.results(&poll_id).await?))
}

/// Create vote router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}/votes", post(cast_vote))
        .route("/{id}/votes/me", get(my_vote))
        .route("/{id}/results", get(results))
}
