//! Core business logic for pollcast.
//!
//! The vote store, the aggregator that turns raw votes into tallies, the live
//! subscription channel, and the poll/comment services built on top of them.

pub mod services;

pub use services::*;
