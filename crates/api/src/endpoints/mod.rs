//! API endpoints.

mod comments;
mod polls;
mod profile;
mod votes;

use axum::Router;

use crate::middleware::AppState;
use crate::sse;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest(
            "/polls",
            polls::router()
                .merge(votes::router())
                .merge(comments::router())
                .merge(sse::router()),
        )
        .nest("/profile", profile::router())
}
