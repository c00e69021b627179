//! Comment endpoints.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use pollcast_common::AppResult;
use pollcast_db::entities::comment;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

/// Comment response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentResponse {
    pub id: String,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    pub text: String,
    pub created_at: String,
}

impl From<comment::Model> for CommentResponse {
    fn from(c: comment::Model) -> Self {
        Self {
            id: c.id,
            user_id: c.user_id,
            user_name: c.user_name,
            text: c.text,
            created_at: c.created_at.to_rfc3339(),
        }
    }
}

/// Add comment request.
#[derive(Debug, Deserialize, Validate)]
pub struct AddCommentRequest {
    #[validate(length(min = 1, max = 500))]
    pub text: String,
}

/// Comments on a poll, oldest first.
async fn list_comments(
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
) -> AppResult<ApiResponse<Vec<CommentResponse>>> {
    let comments = state.comment_service.list_comments(&poll_id).await?;
    Ok(ApiResponse::ok(
        comments.into_iter().map(CommentResponse::from).collect(),
    ))
}

/// Comment on a poll.
async fn add_comment(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
    Json(req): Json<AddCommentRequest>,
) -> AppResult<ApiResponse<CommentResponse>> {
    req.validate()?;

    let comment = state
        .comment_service
        .add_comment(&poll_id, &user, &req.text)
        .await?;

    Ok(ApiResponse::ok(comment.into()))
}

/// Create comment router.
pub fn router() -> Router<AppState> {
    Router::new().route("/{id}/comments", get(list_comments).post(add_comment))
}
