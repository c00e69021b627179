//! Server-Sent Events (SSE) for live poll results.
//!
//! Each connection follows one poll: a `connected` event, then one `results`
//! event per vote snapshot, starting with the current results.

#![allow(missing_docs)]

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
};
use futures::stream::{self, Stream};
use pollcast_common::AppResult;
use pollcast_core::AggregateResult;
use serde::Serialize;
use tokio_stream::StreamExt;
use tracing::debug;

use crate::middleware::AppState;

/// Name of the event carrying a results payload.
pub const RESULTS_EVENT: &str = "results";

/// Connection acknowledgement.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Connected {
    pub poll_id: String,
}

fn results_event(result: &AggregateResult) -> Event {
    Event::default()
        .event(RESULTS_EVENT)
        .json_data(result)
        .unwrap_or_else(|_| Event::default().event(RESULTS_EVENT).data("error"))
}

/// Live results stream for one poll.
async fn results_stream(
    Path(poll_id): Path<String>,
    State(state): State<AppState>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let updates = state.poll_service.watch_results(&poll_id).await?;
    debug!(poll_id = %poll_id, "Results stream opened");

    let connected = Connected {
        poll_id: poll_id.clone(),
    };
    let initial = stream::once(async move {
        Ok(Event::default()
            .event("connected")
            .json_data(&connected)
            .unwrap_or_else(|_| Event::default().data("connected")))
    });

    let stream = updates.map(|result| Ok(results_event(&result)));

    Ok(Sse::new(initial.chain(stream)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(30))
            .text("ping"),
    ))
}

/// Create SSE router.
pub fn router() -> Router<AppState> {
    Router::new().route("/{id}/results/stream", get(results_stream))
}
