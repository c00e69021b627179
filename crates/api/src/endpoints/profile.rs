//! Profile endpoints.

use axum::{Json, Router, extract::State, routing::post};
use pollcast_common::AppResult;
use pollcast_core::ProfileUpdate;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

/// Propagate profile request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PropagateRequest {
    #[validate(length(min = 1, max = 100))]
    pub display_name: Option<String>,
    #[validate(length(min = 1))]
    pub avatar_ref: Option<String>,
}

/// Propagate profile response.
#[derive(Debug, Serialize)]
pub struct PropagateResponse {
    pub updated: usize,
}

/// Copy the caller's new profile into their existing votes.
async fn propagate(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<PropagateRequest>,
) -> AppResult<ApiResponse<PropagateResponse>> {
    req.validate()?;

    let update = ProfileUpdate {
        display_name: req.display_name,
        avatar_ref: req.avatar_ref,
    };
    let updated = state
        .poll_service
        .votes()
        .propagate_profile_update(&user.user_id, &update)
        .await?;

    Ok(ApiResponse::ok(PropagateResponse { updated }))
}

/// Create profile router.
pub fn router() -> Router<AppState> {
    Router::new().route("/propagate", post(propagate))
}
