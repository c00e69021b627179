//! HTTP API layer for pollcast.
//!
//! This crate provides the REST API and live result streaming:
//!
//! - **Endpoints**: polls, votes, results, comments and profile propagation
//! - **Extractors**: identity forwarded by the upstream gateway
//! - **Middleware**: identity header parsing
//! - **Streaming**: Server-Sent Events for live results
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;
pub mod sse;

pub use endpoints::router;
pub use middleware::{AppState, auth_middleware};
