//! API middleware.

#![allow(missing_docs)]

use std::sync::Arc;

use axum::{body::Body, http::Request, middleware::Next, response::Response};
use pollcast_core::{
    AvatarPolicy, Collaborators, CommentService, PollService, VoteStore, VoterIdentity,
};

/// Header carrying the authenticated user's id.
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header carrying the user's display name (percent-encoded).
pub const USER_NAME_HEADER: &str = "x-user-name";
/// Header carrying the user's avatar reference.
pub const USER_AVATAR_HEADER: &str = "x-user-avatar";

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub poll_service: PollService,
    pub comment_service: CommentService,
}

impl AppState {
    /// Wire the services over shared collaborators.
    #[must_use]
    pub fn new(
        collaborators: Collaborators,
        votes: VoteStore,
        avatars: Arc<dyn AvatarPolicy>,
    ) -> Self {
        Self {
            poll_service: PollService::new(collaborators.catalog.clone(), votes, avatars),
            comment_service: CommentService::new(collaborators.catalog, collaborators.comments),
        }
    }
}

fn header_value(req: &Request<Body>, name: &str) -> Option<String> {
    let raw = req.headers().get(name)?.to_str().ok()?;
    let decoded = urlencoding::decode(raw).ok()?.trim().to_string();
    (!decoded.is_empty()).then_some(decoded)
}

/// Identity middleware.
///
/// Authentication happens upstream; this only lifts the forwarded identity
/// headers into a [`VoterIdentity`] request extension.
pub async fn auth_middleware(mut req: Request<Body>, next: Next) -> Response {
    if let Some(user_id) = header_value(&req, USER_ID_HEADER) {
        let identity = VoterIdentity {
            user_id,
            display_name: header_value(&req, USER_NAME_HEADER),
            avatar_ref: header_value(&req, USER_AVATAR_HEADER),
        };
        req.extensions_mut().insert(identity);
    }

    next.run(req).await
}
