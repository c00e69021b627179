//! Redis-backed vote storage for pollcast.
//!
//! Lets several server instances share one vote store. Writes land in Redis
//! hashes and a change notification on a Pub/Sub channel wakes every
//! instance's local subscribers.

pub mod keys;
pub mod vote_backend;

pub use keys::VoteKeys;
pub use vote_backend::RedisVoteBackend;
